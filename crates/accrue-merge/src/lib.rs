//! Merge algorithm for accrue.
//!
//! Given the downloaded contents of several objects, decides whether the
//! batch is JSON or plain text and produces one deterministically ordered
//! body plus the [`Format`](accrue_types::Format) to store it as.
//!
//! - JSON batches are flattened into one array and stable-sorted by the
//!   first date-bearing field of each element.
//! - Anything else falls back to a lexicographic sort of all non-empty lines.
//!
//! The decision is all-or-nothing: one non-JSON file turns the whole batch
//! into text.

pub mod json;
pub mod sorter;
pub mod text;

pub use json::{get_date, is_json, json_compare, sort_json, DATE_FIELDS};
pub use sorter::{sort_contents, DefaultSorter, Sorter};
pub use text::sort_lines;
