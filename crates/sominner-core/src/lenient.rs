//! Field decoders for rows whose shape the backend does not guarantee.
//!
//! Each helper is meant for `#[serde(deserialize_with = "...")]` and never
//! fails on a wrong JSON type: absent, `null`, or malformed values collapse to
//! the documented fallback. Pair them with `#[serde(default = "...")]` so a
//! missing key resolves to the same fallback as a `null` one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use uuid::Uuid;

/// Parse a backend timestamp. Accepts RFC 3339 and offset-less timestamps
/// (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Parse a calendar date. A full timestamp keeps only its date part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

fn string_value(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

/// Any decodable value, else `T::default()`.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

/// Any decodable value, else `None`.
pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// A string, else the empty string.
pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value).unwrap_or_default())
}

/// A string, else `None`.
pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value))
}

pub fn default_task_status() -> String {
    "To Do".to_string()
}

pub fn default_task_priority() -> String {
    "medium".to_string()
}

/// A string, else `"To Do"`.
pub fn task_status<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value).unwrap_or_else(default_task_status))
}

/// A string, else `"medium"`.
pub fn task_priority<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value).unwrap_or_else(default_task_priority))
}

/// A timestamp string, else the current time.
pub fn timestamp_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value)
        .and_then(|s| parse_timestamp(&s))
        .unwrap_or_else(Utc::now))
}

/// A timestamp string, else `None`.
pub fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value).and_then(|s| parse_timestamp(&s)))
}

/// A date or timestamp string, else `None`.
pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value).and_then(|s| parse_date(&s)))
}

/// A UUID string, else the nil UUID.
pub fn uuid_or_nil<'de, D>(deserializer: D) -> Result<Uuid, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(string_value(value)
        .and_then(|s| Uuid::parse_str(&s).ok())
        .unwrap_or_else(Uuid::nil))
}

/// An embedded to-one relation.
///
/// The backend renders a to-one embed as an object, but a missing foreign
/// key hint turns it into an array; the first decodable element is used.
pub fn embedded_one<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(obj @ Value::Object(_)) => serde_json::from_value(obj).ok(),
        Some(Value::Array(items)) => items
            .into_iter()
            .find_map(|item| serde_json::from_value(item).ok()),
        _ => None,
    })
}

/// An embedded to-many relation. Malformed elements are skipped.
pub fn embedded_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        Some(obj @ Value::Object(_)) => serde_json::from_value(obj).into_iter().collect(),
        _ => Vec::new(),
    })
}
