use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use accrue_types::format::JSON_CONTENT_TYPE;
use accrue_types::FileContents;

/// Fields inspected for an element's date, in priority order.
pub const DATE_FIELDS: [&str; 4] = ["created", "createDate", "creationDate", "date"];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// `null`, `false`, `0` and `""` are falsy; everything else is truthy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parse a file as JSON if it is eligible.
///
/// A file is eligible when its content-type is exactly `application/json`,
/// or its key ends in `.js` / `.json` (any case). Returns `None` for
/// ineligible files, unparseable bodies and falsy documents (`null`,
/// `false`, `0`, `""`).
pub fn is_json(file: &FileContents) -> Option<Value> {
    let eligible = file.content_type == JSON_CONTENT_TYPE
        || matches!(file.extension().as_deref(), Some(".js" | ".json"));
    if !eligible {
        return None;
    }
    serde_json::from_str::<Value>(&file.contents)
        .ok()
        .filter(is_truthy)
}

/// The first present-and-truthy date field of `value`, in [`DATE_FIELDS`]
/// order.
pub fn get_date(value: &Value) -> Option<&Value> {
    let obj = value.as_object()?;
    DATE_FIELDS
        .iter()
        .filter_map(|field| obj.get(*field))
        .find(|v| is_truthy(v))
}

/// A date value projected onto something totally ordered.
///
/// Timestamps (parseable strings and epoch-millisecond numbers) share one
/// axis; other strings sort after them lexicographically; anything else
/// sorts last.
#[derive(Debug, PartialEq, PartialOrd)]
enum DateKey<'a> {
    Millis(f64),
    Text(&'a str),
    Other,
}

fn parse_millis(s: &str) -> Option<f64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis() as f64);
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp_millis() as f64);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

fn date_key(value: &Value) -> DateKey<'_> {
    match value {
        Value::Number(n) => n.as_f64().map_or(DateKey::Other, DateKey::Millis),
        Value::String(s) => parse_millis(s).map_or(DateKey::Text(s), DateKey::Millis),
        _ => DateKey::Other,
    }
}

fn compare_keys(a: &DateKey<'_>, b: &DateKey<'_>) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

/// Date comparator for merged JSON elements.
///
/// Elements with a date sort chronologically; a dated element sorts before
/// an undated one; two undated elements compare equal so a stable sort
/// keeps their relative order.
pub fn json_compare(a: &Value, b: &Value) -> Ordering {
    match (get_date(a), get_date(b)) {
        (Some(a), Some(b)) => compare_keys(&date_key(a), &date_key(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Flatten and date-sort a batch of JSON files.
///
/// Returns `None` as soon as one file is not JSON. Non-array documents are
/// treated as single-element arrays; file order and in-file order are kept
/// for elements that compare equal.
pub fn sort_json(files: &[FileContents]) -> Option<Vec<Value>> {
    let mut values = Vec::new();
    for file in files {
        match is_json(file)? {
            Value::Array(items) => values.extend(items),
            other => values.push(other),
        }
    }
    values.sort_by(json_compare);
    Some(values)
}
