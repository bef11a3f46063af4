//! Structured output: schema definitions and decoding.

use crate::types::{MessageContent, ResponseSchema};
use crate::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const LEAD_SYSTEM_PROMPT: &str = "Extract CRM lead fields from user text. If a field is missing, set it to 'unknown'. Keep summary under 140 characters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// A CRM lead extracted from free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeadRecord {
    pub name: String,
    pub email: String,
    pub company: String,
    pub urgency: Urgency,
    pub summary: String,
}

/// Schema sent as the `json_schema` response format for [`LeadRecord`].
pub fn lead_schema() -> ResponseSchema {
    ResponseSchema::new(
        "lead_record",
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Person name, or 'unknown' if missing"},
                "email": {"type": "string", "description": "Email address, or 'unknown' if missing"},
                "company": {"type": "string", "description": "Company name, or 'unknown' if missing"},
                "urgency": {
                    "type": "string",
                    "enum": ["low", "medium", "high"],
                    "description": "Urgency level inferred from the text"
                },
                "summary": {"type": "string", "description": "One-sentence summary, max 140 characters"}
            },
            "required": ["name", "email", "company", "urgency", "summary"],
            "additionalProperties": false
        }),
    )
    .description("CRM lead fields extracted from user text")
}

/// Parse the text of a structured-output turn.
///
/// Blank text and a JSON `null` mean the model produced no payload.
pub fn parse_payload(content: &MessageContent) -> Result<Option<Value>, Error> {
    let text = match content {
        MessageContent::Text(text) => text.clone(),
        MessageContent::Parts(parts) => parts.iter().filter_map(|p| p.text()).collect(),
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::schema_mismatch(format!("output is not valid JSON ({e})")))?;
    Ok((!value.is_null()).then_some(value))
}

/// Deserialize a structured payload into its typed form.
pub fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, Error> {
    serde_json::from_value(payload).map_err(|e| Error::schema_mismatch(e.to_string()))
}
