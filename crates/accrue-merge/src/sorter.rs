use tracing::debug;

use accrue_types::{FileContents, Format, MergeResult};

use crate::json::sort_json;
use crate::text::sort_lines;

/// Strategy that turns a batch of downloaded files into one merged body.
///
/// Implemented by [`DefaultSorter`] and by any
/// `Fn(&[FileContents]) -> MergeResult`, so callers can pass a closure.
pub trait Sorter: Send + Sync {
    fn sort(&self, files: &[FileContents]) -> MergeResult;
}

impl<F> Sorter for F
where
    F: Fn(&[FileContents]) -> MergeResult + Send + Sync,
{
    fn sort(&self, files: &[FileContents]) -> MergeResult {
        self(files)
    }
}

/// The built-in merge: JSON if every file is JSON, text otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSorter;

impl Sorter for DefaultSorter {
    fn sort(&self, files: &[FileContents]) -> MergeResult {
        sort_contents(files)
    }
}

/// Merge a batch of files.
///
/// If every file is JSON the result is a date-sorted JSON array
/// ([`Format::Json`]); otherwise every non-empty line of every file is sorted
/// into one text body ([`Format::Text`]). An empty batch yields `[]` as JSON.
pub fn sort_contents(files: &[FileContents]) -> MergeResult {
    if let Some(values) = sort_json(files) {
        debug!(files = files.len(), elements = values.len(), "merged as JSON");
        let contents = serde_json::Value::Array(values).to_string();
        return MergeResult::new(Format::Json, contents);
    }
    let contents = sort_lines(files);
    debug!(files = files.len(), "merged as text");
    MergeResult::new(Format::Text, contents)
}
