use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Content-type written for [`Format::Text`] objects.
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Content-type written for [`Format::Json`] objects.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// How an object's body is interpreted.
///
/// Fixed for the lifetime of an appender; chosen per merge by the
/// consolidator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Newline-delimited text log.
    #[default]
    Text,
    /// A JSON array of accumulated values.
    Json,
}

impl Format {
    /// The content-type stored alongside objects of this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text => TEXT_CONTENT_TYPE,
            Self::Json => JSON_CONTENT_TYPE,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                field: "format",
                value: other.to_string(),
            }),
        }
    }
}
