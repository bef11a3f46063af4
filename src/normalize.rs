//! Turning responses into display text.

use crate::render::{Renderer, STREAM_COMPLETE};
use crate::response::EventStream;
use crate::types::{MessageContent, StreamEvent};
use crate::Error;
use futures_util::StreamExt;
use serde_json::Value;
use std::io::Write;

/// The normalized result of a dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Text(String),
    /// The answer was already written while streaming.
    Streamed(StreamSummary),
    Structured(Value),
}

/// What a forwarded stream produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Concatenation of every forwarded fragment.
    pub text: String,
    pub fragments: usize,
}

/// Extract trimmed display text from message content.
///
/// Blank parts are dropped and the rest joined with newlines. Content with
/// no visible text is [`Error::NoContent`].
pub fn normalize_text(content: &MessageContent) -> Result<String, Error> {
    let text = match content {
        MessageContent::Text(text) => text.trim().to_string(),
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|part| part.text())
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
    };

    if text.is_empty() {
        return Err(Error::NoContent);
    }
    Ok(text)
}

/// Write answer fragments to the renderer as they arrive.
///
/// `prefix` is written once, right before the first fragment. Update events
/// become `[update] <step>` lines. The completion marker is written after
/// the stream ends, whether or not any text came through.
pub async fn forward_stream<O: Write, E: Write>(
    mut stream: EventStream,
    renderer: &mut Renderer<O, E>,
    prefix: Option<&str>,
) -> Result<StreamSummary, Error> {
    let mut summary = StreamSummary::default();

    while let Some(event) = stream.next().await {
        let event = event?;

        if let StreamEvent::Update { step } = &event {
            renderer.update(step)?;
            continue;
        }

        let Some(text) = event.answer_text() else {
            continue;
        };

        if summary.fragments == 0 {
            if let Some(prefix) = prefix {
                renderer.token(prefix)?;
            }
        }

        renderer.token(text)?;
        summary.text.push_str(text);
        summary.fragments += 1;
    }

    if summary.fragments > 0 {
        renderer.token("\n")?;
    }
    renderer.line(STREAM_COMPLETE)?;

    Ok(summary)
}

/// A structured payload must be present and not `null`.
pub fn require_structured(payload: Option<Value>) -> Result<Value, Error> {
    match payload {
        Some(Value::Null) | None => Err(Error::NoStructuredPayload),
        Some(value) => Ok(value),
    }
}
