use std::path::PathBuf;
use std::sync::Arc;

use accrue_append::{AppendContents, AppendOptions, Appender};
use accrue_consolidate::Consolidator;
use accrue_merge::DefaultSorter;
use accrue_store::{normalize_key, LocalObjectStore, ObjectStore};
use accrue_types::{Format, StoreConfig};
use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::Value;
use tracing::debug;

use crate::cli::*;

const DEFAULT_ROOT: &str = ".accrue";
const DEFAULT_BUCKET: &str = "default";

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(cli.config, cli.root, cli.bucket)?;
    let store: Arc<dyn ObjectStore> = Arc::new(
        LocalObjectStore::open(&config)
            .with_context(|| format!("opening bucket {}", config.bucket))?,
    );
    match cli.command {
        Command::Append(args) => cmd_append(store, args).await,
        Command::Cat(args) => cmd_cat(store, args).await,
        Command::Rm(args) => cmd_rm(store, args).await,
        Command::Ls(args) => cmd_ls(store, args).await,
        Command::Concat(args) => cmd_concat(store, args).await,
        Command::Consolidate(args) => cmd_consolidate(store, args).await,
    }
}

/// Config file first, then flag overrides, then defaults.
fn resolve_config(
    path: Option<PathBuf>,
    root: Option<PathBuf>,
    bucket: Option<String>,
) -> anyhow::Result<StoreConfig> {
    let mut config = match path {
        Some(path) => StoreConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StoreConfig::default(),
    };
    if let Some(root) = root {
        config.root = Some(root);
    }
    if let Some(bucket) = bucket {
        config.bucket = bucket;
    }
    if config.root.is_none() {
        config.root = Some(PathBuf::from(DEFAULT_ROOT));
    }
    if config.bucket.is_empty() {
        config.bucket = DEFAULT_BUCKET.to_string();
    }
    config.validate()?;
    debug!(?config, "resolved store config");
    Ok(config)
}

/// Arguments that parse as JSON are passed as JSON, anything else as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

async fn cmd_append(store: Arc<dyn ObjectStore>, args: AppendArgs) -> anyhow::Result<()> {
    let format = if args.json { Format::Json } else { Format::Text };
    let appender = Appender::new(store, &args.key, format);
    let options = AppendOptions::new().with_args(args.args.iter().map(|a| parse_value(a)));

    let pending: Vec<_> = match format {
        Format::Json => args
            .text
            .iter()
            .map(|raw| appender.append(parse_value(raw), options.clone()))
            .collect(),
        Format::Text => {
            let line = args.text.join(" ");
            if args.date {
                vec![appender.append_with_date(&line, options)]
            } else {
                vec![appender.append(line, options)]
            }
        }
    };
    let count = pending.len();
    for op in pending {
        op.await?;
    }
    appender.flush().await?;
    println!(
        "{} Appended {} {} to {}",
        "✓".green().bold(),
        count,
        if count == 1 { "entry" } else { "entries" },
        appender.key().bold()
    );
    Ok(())
}

async fn cmd_cat(store: Arc<dyn ObjectStore>, args: CatArgs) -> anyhow::Result<()> {
    let format = if args.json { Format::Json } else { Format::Text };
    let appender = Appender::new(store, &args.key, format);
    match appender.get_contents().await? {
        AppendContents::Text(text) => print!("{text}"),
        AppendContents::Json(values) => println!("{}", serde_json::to_string_pretty(&values)?),
    }
    Ok(())
}

async fn cmd_rm(store: Arc<dyn ObjectStore>, args: RmArgs) -> anyhow::Result<()> {
    for key in &args.keys {
        store
            .delete(&normalize_key(key))
            .await
            .with_context(|| format!("deleting {key}"))?;
        println!("Deleted {}", key.yellow());
    }
    Ok(())
}

async fn cmd_ls(store: Arc<dyn ObjectStore>, args: LsArgs) -> anyhow::Result<()> {
    let keys = store.list(&args.prefix).await?;
    if keys.is_empty() {
        println!("No objects.");
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}

async fn cmd_concat(store: Arc<dyn ObjectStore>, args: ConcatArgs) -> anyhow::Result<()> {
    let result = Consolidator::new(store).concatenate(&args.keys).await?;
    debug!(format = %result.format, "concatenated");
    println!("{}", result.contents);
    Ok(())
}

async fn cmd_consolidate(store: Arc<dyn ObjectStore>, args: ConsolidateArgs) -> anyhow::Result<()> {
    let keys = collect_keys(store.as_ref(), args.keys, args.prefix.as_deref()).await?;
    if keys.is_empty() {
        bail!("nothing to consolidate");
    }
    let report = Consolidator::new(store)
        .consolidate_with(&keys, &args.into, &DefaultSorter, &args.acl)
        .await?;

    println!(
        "{} Consolidated {} objects into {} ({})",
        "✓".green().bold(),
        report.merged.len(),
        report.destination.bold(),
        report.format.to_string().cyan()
    );
    for key in &report.missing {
        println!("  {} {}", "missing:".yellow(), key);
    }
    for key in &report.deleted {
        println!("  {} {}", "deleted:".dimmed(), key);
    }
    Ok(())
}

/// Explicit keys followed by every key under `prefix`, without duplicates.
async fn collect_keys(
    store: &dyn ObjectStore,
    mut keys: Vec<String>,
    prefix: Option<&str>,
) -> anyhow::Result<Vec<String>> {
    if let Some(prefix) = prefix {
        for key in store.list(prefix).await? {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}
