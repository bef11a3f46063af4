//! Response shapes produced by dispatch.

use crate::types::{ChatMessage, FinishReason, MessageContent, StreamEvent, ToolCall, Usage};
use crate::Error;
use futures_util::stream::Stream;
use std::fmt;
use std::pin::Pin;

/// A stream of events for a streamed answer. Single pass: once drained it
/// cannot be replayed.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// A complete, non-streamed assistant turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: MessageContent,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl Completion {
    /// Whether the model asked for tools to be run.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// This turn as a message to append to the conversation.
    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::assistant(self.content.clone()).with_tool_calls(self.tool_calls.clone())
    }
}

/// What dispatch produced. Which variant occurs depends on the mode the
/// request was dispatched in.
pub enum Response {
    PlainText(MessageContent),
    TokenStream(EventStream),
    Structured(Option<serde_json::Value>),
}

impl Response {
    /// Wrap a stream of events.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<StreamEvent, Error>> + Send + 'static,
    {
        Response::TokenStream(Box::pin(stream))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::PlainText(content) => f.debug_tuple("PlainText").field(content).finish(),
            Response::TokenStream(_) => f.write_str("TokenStream(..)"),
            Response::Structured(value) => f.debug_tuple("Structured").field(value).finish(),
        }
    }
}
