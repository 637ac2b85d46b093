//! Foundation types for accrue.
//!
//! This crate provides the data model shared by the appender, the
//! consolidator and the merge algorithm. Every other accrue crate depends on
//! `accrue-types`.
//!
//! # Key Types
//!
//! - [`Format`]: How an object's body is interpreted (plain text or JSON)
//! - [`FileContents`]: Immutable record of one downloaded object
//! - [`MergeResult`]: Output of a merge: the chosen format and merged body
//! - [`StoreConfig`]: Explicit store configuration (credentials, region, bucket)
//! - [`Acl`]: Access policy applied to written objects

pub mod acl;
pub mod config;
pub mod error;
pub mod file;
pub mod format;

pub use acl::Acl;
pub use config::StoreConfig;
pub use error::ConfigError;
pub use file::{FileContents, MergeResult};
pub use format::Format;
