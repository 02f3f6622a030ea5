// Request/response contracts for the email push endpoint.

use crate::core::expense::{EmailRecord, ExpenseRecord};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default, deserialize_with = "lenient_email_list")]
    pub emails: Vec<EmailRecord>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub total: usize,
    pub entries: Vec<ExpenseRecord>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Decodes the `emails` array leniently: clients occasionally send entries
/// as JSON-encoded strings instead of objects. A blank string becomes an
/// empty record, a string holding a record's JSON is parsed, and any other
/// string is kept as the record's message text. Non-object, non-string
/// entries are a malformed body.
fn lenient_email_list<'de, D>(deserializer: D) -> Result<Vec<EmailRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|item| match item {
            Value::Object(_) => serde_json::from_value(item).map_err(de::Error::custom),
            Value::String(text) => Ok(email_from_string(text)),
            _ => Err(de::Error::custom("emails entries must be objects or strings")),
        })
        .collect()
}

fn email_from_string(text: String) -> EmailRecord {
    if text.trim().is_empty() {
        return EmailRecord::default();
    }
    match serde_json::from_str::<EmailRecord>(text.trim()) {
        Ok(parsed) => parsed,
        Err(_) => EmailRecord {
            message: text,
            ..EmailRecord::default()
        },
    }
}
