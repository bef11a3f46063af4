//! A minimal tool-calling loop.
//!
//! Each step sends the conversation to the model. If the model asks for
//! tools, their results are appended as tool messages and the model is
//! called again, until it answers without tool calls.

use crate::accumulator::ResponseAccumulator;
use crate::provider::ChatBackend;
use crate::response::EventStream;
use crate::tools::ToolRegistry;
use crate::types::{
    ChatMessage, ChatRequest, ChunkDelta, MessageContent, StreamEvent, ToolCall, MODEL_NODE,
    TOOLS_NODE,
};
use crate::{Completion, Error};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_STEPS: usize = 10;

/// Result of a finished agent run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// The content of the final assistant turn.
    pub content: MessageContent,
    /// The whole conversation, including tool traffic.
    pub messages: Vec<ChatMessage>,
    pub steps: usize,
}

#[derive(Clone)]
pub struct Agent {
    backend: Arc<dyn ChatBackend>,
    model: String,
    system_prompt: Option<String>,
    tools: ToolRegistry,
    temperature: Option<f32>,
    max_steps: usize,
}

impl Agent {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            system_prompt: None,
            tools: ToolRegistry::new(),
            temperature: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    fn initial_messages(&self, conversation: Vec<ChatMessage>) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.extend(conversation);
        messages
    }

    fn request(&self, messages: &[ChatMessage]) -> ChatRequest {
        ChatRequest::new(self.model.clone(), messages.to_vec())
            .temperature(self.temperature)
            .tools(self.tools.definitions())
    }

    /// Run a tool call. Failures are reported back to the model as text.
    fn run_tool(&self, call: &ToolCall) -> String {
        match self.tools.call(&call.name, &call.arguments) {
            Ok(output) => {
                debug!(tool = %call.name, "tool call finished");
                output
            }
            Err(e) => {
                debug!(tool = %call.name, error = %e, "tool call failed");
                format!("Error: {e}")
            }
        }
    }

    fn too_many_steps(&self) -> Error {
        Error::Agent(format!(
            "no final answer after {} model steps",
            self.max_steps
        ))
    }

    /// Run the loop to completion and return the final answer.
    pub async fn invoke(&self, conversation: Vec<ChatMessage>) -> Result<AgentRun, Error> {
        let mut messages = self.initial_messages(conversation);

        for step in 1..=self.max_steps {
            let completion: Completion = self
                .backend
                .complete(&self.request(&messages))
                .await
                .map_err(|e| e.context(format!("model step {step} failed")))?;

            messages.push(completion.to_message());

            if !completion.has_tool_calls() {
                info!(steps = step, "agent finished");
                return Ok(AgentRun {
                    content: completion.content,
                    messages,
                    steps: step,
                });
            }

            for call in &completion.tool_calls {
                let output = self.run_tool(call);
                messages.push(ChatMessage::tool_result(call.id.clone(), output));
            }
        }

        Err(self.too_many_steps())
    }

    /// Run the loop, streaming model text and tool output as events.
    ///
    /// Model text is tagged with the `model` node and tool output with the
    /// `tools` node. An update event follows each model step and each round
    /// of tool calls.
    pub fn stream(&self, conversation: Vec<ChatMessage>) -> EventStream {
        let agent = self.clone();
        let mut messages = self.initial_messages(conversation);

        Box::pin(async_stream::try_stream! {
            let mut finished = false;
            for step in 1..=agent.max_steps {
                let context = format!("model step {step} failed");
                let mut deltas = agent
                    .backend
                    .stream(&agent.request(&messages))
                    .await
                    .map_err(|e| e.context(context.clone()))?;

                let mut accumulator = ResponseAccumulator::new();
                while let Some(delta) = deltas.next().await {
                    let delta = delta.map_err(|e| e.context(context.clone()))?;
                    if let ChunkDelta::Content(text) = &delta {
                        yield StreamEvent::token(text.clone(), MODEL_NODE);
                    }
                    accumulator.process(delta);
                }

                let completion = accumulator.finalize();
                messages.push(completion.to_message());
                yield StreamEvent::update(MODEL_NODE);

                if !completion.has_tool_calls() {
                    info!(steps = step, "agent stream finished");
                    finished = true;
                    break;
                }

                for call in &completion.tool_calls {
                    let output = agent.run_tool(call);
                    yield StreamEvent::token(output.clone(), TOOLS_NODE);
                    messages.push(ChatMessage::tool_result(call.id.clone(), output));
                }
                yield StreamEvent::update(TOOLS_NODE);
            }

            if !finished {
                Err::<(), Error>(agent.too_many_steps())?;
            }
        })
    }
}
