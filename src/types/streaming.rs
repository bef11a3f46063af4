//! Types for streaming responses.

use crate::types::{FinishReason, Usage};

/// Node tag of the model generation step. Only tokens from this node
/// make up visible answer text.
pub const MODEL_NODE: &str = "model";

/// Node tag of the tool execution step.
pub const TOOLS_NODE: &str = "tools";

/// A single parsed chunk from a streaming chat completion.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkDelta {
    /// A fragment of assistant text.
    Content(String),
    /// A fragment of a tool call. Fragments with the same index belong together.
    ToolCall(ToolCallDelta),
    /// The choice finished.
    Finish(FinishReason),
    /// Token usage, usually sent with the last chunk.
    Usage(Usage),
}

/// Partial tool call data from a stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// An event surfaced to whoever renders a streamed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A step of the run finished. Carries no answer text.
    Update { step: String },
    /// A text fragment, tagged with the node that produced it.
    MessageToken { text: String, node: String },
}

impl StreamEvent {
    pub fn update(step: impl Into<String>) -> Self {
        StreamEvent::Update { step: step.into() }
    }

    pub fn token(text: impl Into<String>, node: impl Into<String>) -> Self {
        StreamEvent::MessageToken {
            text: text.into(),
            node: node.into(),
        }
    }

    /// Text that belongs to the final answer, if this event carries any.
    pub fn answer_text(&self) -> Option<&str> {
        match self {
            StreamEvent::MessageToken { text, node } if node == MODEL_NODE && !text.is_empty() => {
                Some(text)
            }
            _ => None,
        }
    }
}
