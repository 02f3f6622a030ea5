// Domain models for the expense extraction pipeline.
// Every field is a plain string: amounts keep their currency symbol, dates
// pass through untouched, and nothing is parsed numerically.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One source email, as collected from the user's mailbox.
///
/// Records are read-only inside the pipeline; the only thing ever taken
/// from them after creation is the date backfill during alignment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub message: String,
}

/// One parsed expense produced by the pipeline.
///
/// Fields the model omits decode as empty strings, never as nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    #[serde(default, deserialize_with = "flexible_string")]
    pub date: String,
    #[serde(default, deserialize_with = "flexible_string")]
    pub amount: String,
    #[serde(default, deserialize_with = "flexible_string")]
    pub category: String,
    #[serde(default, deserialize_with = "flexible_string")]
    pub description: String,
}

/// Decodes a string field leniently. Models regularly emit `42` or `true`
/// where a string was asked for: numbers and booleans are stringified and
/// null becomes an empty string. Arrays and objects are still rejected.
pub fn flexible_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(de::Error::custom(format!(
            "cannot decode {} as a string field",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
