use chrono::{DateTime, Utc};
use serde_json::Value;

use accrue_types::Format;

use crate::error::{AppendError, AppendResult};
use crate::message::format_message;

/// Contents returned by [`Appender::get_contents`](crate::Appender::get_contents).
#[derive(Clone, Debug, PartialEq)]
pub enum AppendContents {
    /// Newline-delimited log of a text appender.
    Text(String),
    /// Accumulated values of a JSON appender.
    Json(Vec<Value>),
}

impl AppendContents {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&[Value]> {
        match self {
            Self::Json(values) => Some(values),
            Self::Text(_) => None,
        }
    }
}

/// In-memory body of a loaded object.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Body {
    Text(String),
    Json { values: Vec<Value>, raw: String },
}

impl Body {
    /// Body for an object that does not exist yet.
    pub(crate) fn empty(format: Format) -> Self {
        match format {
            Format::Text => Self::Text(String::new()),
            Format::Json => Self::Json {
                values: Vec::new(),
                raw: String::new(),
            },
        }
    }

    /// Interpret a fetched object body.
    pub(crate) fn parse(format: Format, key: &str, raw: String) -> AppendResult<Self> {
        match format {
            Format::Text => Ok(Self::Text(raw)),
            Format::Json => {
                if raw.trim().is_empty() {
                    return Ok(Self::Json {
                        values: Vec::new(),
                        raw,
                    });
                }
                match serde_json::from_str::<Value>(&raw)? {
                    Value::Array(values) => Ok(Self::Json { values, raw }),
                    _ => Err(AppendError::NotAnArray {
                        key: key.to_string(),
                    }),
                }
            }
        }
    }

    /// Apply one append.
    ///
    /// Text bodies gain one `\n`-terminated line: string values are run
    /// through [`format_message`], other values are serialized as JSON.
    /// JSON bodies push the value and re-serialize the whole array.
    pub(crate) fn append(&mut self, value: Value, args: &[Value]) -> AppendResult<()> {
        match self {
            Self::Text(contents) => {
                let line = match value {
                    Value::String(template) => format_message(&template, args),
                    other => other.to_string(),
                };
                contents.push_str(&line);
                contents.push('\n');
            }
            Self::Json { values, raw } => {
                values.push(value);
                match serde_json::to_string(values) {
                    Ok(serialized) => *raw = serialized,
                    Err(e) => {
                        values.pop();
                        return Err(e.into());
                    }
                }
            }
        }
        Ok(())
    }

    /// The exact text written to the store.
    pub(crate) fn raw(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Json { raw, .. } => raw,
        }
    }

    pub(crate) fn contents(&self) -> AppendContents {
        match self {
            Self::Text(s) => AppendContents::Text(s.clone()),
            Self::Json { values, .. } => AppendContents::Json(values.clone()),
        }
    }
}

/// A loaded copy of the object.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Snapshot {
    pub(crate) read_at: DateTime<Utc>,
    pub(crate) body: Body,
}

impl Snapshot {
    pub(crate) fn new(body: Body) -> Self {
        Self {
            read_at: Utc::now(),
            body,
        }
    }
}

/// Appender lifecycle.
///
/// A dirty state always carries a snapshot; there is no way to be dirty
/// without having loaded first.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) enum SnapshotState {
    #[default]
    Unloaded,
    Clean(Snapshot),
    Dirty(Snapshot),
}

impl SnapshotState {
    pub(crate) fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Unloaded => None,
            Self::Clean(s) | Self::Dirty(s) => Some(s),
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        !matches!(self, Self::Unloaded)
    }

    pub(crate) fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty(_))
    }

    /// Install a freshly read snapshot.
    pub(crate) fn load(&mut self, snapshot: Snapshot) {
        *self = Self::Clean(snapshot);
    }

    /// Apply an append to the loaded snapshot and move to `Dirty`.
    pub(crate) fn append(&mut self, key: &str, value: Value, args: &[Value]) -> AppendResult<()> {
        let snapshot = match self {
            Self::Unloaded => {
                return Err(AppendError::NotLoaded {
                    key: key.to_string(),
                })
            }
            Self::Clean(s) | Self::Dirty(s) => s,
        };
        snapshot.body.append(value, args)?;
        *self = match std::mem::take(self) {
            Self::Clean(s) | Self::Dirty(s) => Self::Dirty(s),
            Self::Unloaded => Self::Unloaded,
        };
        Ok(())
    }

    /// Body to write if there are unflushed changes.
    pub(crate) fn dirty_body(&self) -> Option<&Body> {
        match self {
            Self::Dirty(s) => Some(&s.body),
            _ => None,
        }
    }

    /// Record a successful write.
    pub(crate) fn mark_clean(&mut self) {
        *self = match std::mem::take(self) {
            Self::Dirty(s) => Self::Clean(s),
            other => other,
        };
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::Unloaded;
    }
}
