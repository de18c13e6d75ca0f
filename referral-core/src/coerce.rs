//! Lenient numeric reads from persisted JSON.
//!
//! Stored counts come from hand-edited files and older revisions, so any
//! value that is not a usable non-negative integer reads as zero.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Coerce an arbitrary JSON value to a non-negative count.
///
/// `null`, booleans, arrays, objects, negative numbers and unparsable strings
/// all yield 0. Floats truncate toward zero; numeric strings are trimmed.
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u
            } else if n.is_i64() {
                0
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map(|f| f.trunc() as u64)
                    .unwrap_or(0)
            }
        }
        Value::String(s) => parse_count(s),
        _ => 0,
    }
}

/// Coerce to a positive label number, `None` when the value reads as zero.
pub fn coerce_number(value: &Value) -> Option<u32> {
    u32::try_from(coerce_count(value)).ok().filter(|n| *n > 0)
}

fn parse_count(raw: &str) -> u64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0;
    }
    trimmed
        .parse::<i64>()
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}

/// Serde adapter for count fields: `#[serde(deserialize_with = "deserialize_count")]`.
pub fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_count(&value))
}
