//! Delta accumulation logic for streaming responses.

use crate::types::{ChunkDelta, FinishReason, MessageContent, ToolCall, ToolCallDelta, Usage};
use crate::Completion;
use std::collections::BTreeMap;

/// Accumulates streaming deltas into a complete assistant turn.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    content: String,
    /// Partial tool calls keyed by their stream index.
    tool_calls: BTreeMap<u32, PartialToolCall>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl ResponseAccumulator {
    /// Create a new response accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a chunk and update the accumulation.
    pub fn process(&mut self, delta: ChunkDelta) {
        match delta {
            ChunkDelta::Content(text) => self.content.push_str(&text),
            ChunkDelta::ToolCall(ToolCallDelta {
                index,
                id,
                name,
                arguments,
            }) => {
                let call = self.tool_calls.entry(index).or_default();
                // Ids and names arrive once; argument text arrives in pieces.
                if let Some(id) = id {
                    call.id = id;
                }
                if let Some(name) = name {
                    call.name.push_str(&name);
                }
                if let Some(arguments) = arguments {
                    call.arguments.push_str(&arguments);
                }
            }
            ChunkDelta::Finish(reason) => self.finish_reason = Some(reason),
            ChunkDelta::Usage(usage) => self.usage = Some(usage),
        }
    }

    /// Finalize and return the complete turn.
    pub fn finalize(self) -> Completion {
        let tool_calls: Vec<ToolCall> = self
            .tool_calls
            .into_values()
            .map(|call| ToolCall {
                id: call.id,
                name: call.name,
                arguments: if call.arguments.trim().is_empty() {
                    "{}".to_string()
                } else {
                    call.arguments
                },
            })
            .collect();

        let finish_reason = self.finish_reason.unwrap_or(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });

        Completion {
            content: MessageContent::Text(self.content),
            tool_calls,
            finish_reason,
            usage: self.usage.unwrap_or_default(),
        }
    }
}
