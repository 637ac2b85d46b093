//! Consolidation for accrue.
//!
//! Many writers each producing their own small object is the cheap way to
//! log against a whole-object store. The [`Consolidator`] later folds those
//! objects into one: download all of them concurrently, merge them with a
//! [`Sorter`](accrue_merge::Sorter), write the merged object, then delete
//! the sources.

pub mod consolidator;
pub mod error;

pub use consolidator::{ConsolidateReport, Consolidator};
pub use error::{ConsolidateError, ConsolidateResult};
