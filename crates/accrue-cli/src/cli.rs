use std::path::PathBuf;

use accrue_types::Acl;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "accrue",
    about = "Append to, merge and consolidate objects in a whole-object store",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Store configuration file (TOML, or JSON with a .json extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the local buckets
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[arg(long, global = true)]
    pub bucket: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Append a line (or JSON values) to an object
    Append(AppendArgs),
    /// Print the current contents of an object
    Cat(CatArgs),
    /// Delete objects
    Rm(RmArgs),
    /// List object keys under a prefix
    Ls(LsArgs),
    /// Merge objects and print the result
    Concat(ConcatArgs),
    /// Merge objects into one and delete the sources
    Consolidate(ConsolidateArgs),
}

#[derive(Args)]
pub struct AppendArgs {
    pub key: String,
    /// Text joined with spaces; with --json each value is appended separately
    #[arg(required = true)]
    pub text: Vec<String>,
    /// Treat the object as a JSON array
    #[arg(long)]
    pub json: bool,
    /// Prefix the line with the current local time
    #[arg(long)]
    pub date: bool,
    /// Positional argument for %s/%d/%j placeholders
    #[arg(long = "arg")]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct CatArgs {
    pub key: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RmArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "")]
    pub prefix: String,
}

#[derive(Args)]
pub struct ConcatArgs {
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct ConsolidateArgs {
    pub keys: Vec<String>,
    /// Destination key for the merged object
    #[arg(long)]
    pub into: String,
    /// Also consolidate every key under this prefix
    #[arg(long)]
    pub prefix: Option<String>,
    #[arg(long, default_value = "private")]
    pub acl: Acl,
}
