use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::format::Format;

/// Immutable record of one downloaded object.
///
/// Produced only by a successful download and consumed by the merge step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContents {
    /// The key the object was downloaded from, as the caller supplied it.
    pub key: String,
    /// Store-reported modification time. Absent for hand-built records.
    pub last_modified: Option<DateTime<Utc>>,
    /// Store-reported content-type; may be empty.
    pub content_type: String,
    /// Decoded text body.
    pub contents: String,
}

impl FileContents {
    pub fn new(
        key: impl Into<String>,
        last_modified: Option<DateTime<Utc>>,
        content_type: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            last_modified,
            content_type: content_type.into(),
            contents: contents.into(),
        }
    }

    /// Lower-cased file extension of the key, including the leading dot.
    ///
    /// Only the final path segment is considered, and dot-files such as
    /// `.json` have no extension.
    pub fn extension(&self) -> Option<String> {
        let name = self.key.rsplit('/').next().unwrap_or(&self.key);
        let idx = name.rfind('.')?;
        if idx == 0 {
            return None;
        }
        Some(name[idx..].to_ascii_lowercase())
    }
}

/// Output of a merge: the format to store and the merged body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeResult {
    pub format: Format,
    pub contents: String,
}

impl MergeResult {
    pub fn new(format: Format, contents: impl Into<String>) -> Self {
        Self {
            format,
            contents: contents.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        let file = FileContents::new("logs/Events.JSON", None, "", "");
        assert_eq!(file.extension().as_deref(), Some(".json"));
    }

    #[test]
    fn extension_uses_last_segment() {
        let file = FileContents::new("dir.v2/readme", None, "", "");
        assert_eq!(file.extension(), None);
    }

    #[test]
    fn dotfile_has_no_extension() {
        let file = FileContents::new(".json", None, "", "");
        assert_eq!(file.extension(), None);
    }

    #[test]
    fn extension_keeps_only_final_suffix() {
        let file = FileContents::new("archive.tar.js", None, "", "");
        assert_eq!(file.extension().as_deref(), Some(".js"));
    }
}
