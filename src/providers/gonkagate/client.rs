use super::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ErrorBody, ResponseFormat,
    WireFunctionCall, WireMessage, WireTool, WireToolCall,
};
use crate::config::{Config, DEFAULT_BASE_URL};
use crate::provider::{ChatBackend, ChunkStream};
use crate::sse_stream::SseStreamExt;
use crate::types::{
    ChatMessage, ChatRequest, ChunkDelta, FinishReason, Role, ToolCall, ToolCallDelta,
};
use crate::{Completion, Error};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the GonkaGate OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct GonkaGateProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl GonkaGateProvider {
    /// Create a provider for the fixed GonkaGate endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::new_with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a provider with a custom base URL. Used to point tests at a
    /// mock server; configuration never produces another URL.
    pub fn new_with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            api_key: SecretString::new(api_key.into()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a provider from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new_with_base_url(config.api_key(), config.base_url())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert internal request to the chat completions wire format.
    fn convert_request(request: &ChatRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: request.temperature,
            tools: (!request.tools.is_empty()).then(|| {
                request
                    .tools
                    .iter()
                    .map(|tool| WireTool {
                        r#type: "function",
                        function: tool.clone(),
                    })
                    .collect()
            }),
            response_format: request
                .response_schema
                .clone()
                .map(|json_schema| ResponseFormat::JsonSchema { json_schema }),
            stream: stream.then_some(true),
        }
    }

    fn convert_message(message: &ChatMessage) -> WireMessage {
        let tool_calls = (!message.tool_calls.is_empty()).then(|| {
            message
                .tool_calls
                .iter()
                .map(|call| WireToolCall {
                    id: call.id.clone(),
                    r#type: "function".to_string(),
                    function: WireFunctionCall {
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                })
                .collect()
        });

        // Assistant turns that only call tools carry no content.
        let content = if message.role == Role::Assistant
            && tool_calls.is_some()
            && message.content.is_blank()
        {
            None
        } else {
            Some(message.content.clone())
        };

        WireMessage {
            role: message.role.as_str(),
            content,
            tool_calls,
            tool_call_id: message.tool_call_id.clone(),
        }
    }

    async fn post(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response, Error> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(%url, model = %body.model, stream = body.stream.unwrap_or(false), "sending chat completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "chat completion rejected");
            return Err(api_error(status, &body));
        }

        Ok(response)
    }

    /// Convert a streamed chunk into deltas.
    fn convert_chunk(chunk: ChatCompletionChunk) -> Result<Vec<ChunkDelta>, Error> {
        if let Some(error) = chunk.error {
            let message = error
                .message
                .unwrap_or_else(|| "Upstream stream error.".to_string());
            return Err(Error::api(None, message));
        }

        let mut deltas = Vec::new();

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                deltas.push(ChunkDelta::Content(content));
            }
            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or_default();
                deltas.push(ChunkDelta::ToolCall(ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name,
                    arguments,
                }));
            }
            if let Some(reason) = choice.finish_reason {
                deltas.push(ChunkDelta::Finish(reason));
            }
        }

        if let Some(usage) = chunk.usage {
            deltas.push(ChunkDelta::Usage(usage));
        }

        Ok(deltas)
    }
}

/// Build an API error from a rejected response.
fn api_error(status: StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let message = parsed
        .and_then(|b| b.error.and_then(|e| e.message).or(b.message))
        .filter(|m| !m.trim().is_empty())
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });

    Error::api(Some(status.as_u16()), message)
}

#[async_trait::async_trait]
impl ChatBackend for GonkaGateProvider {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, Error> {
        let body = Self::convert_request(request, false);
        let response: ChatCompletionResponse = self.post(&body).await?.json().await?;

        let choice = response.choices.into_iter().next().ok_or(Error::NoContent)?;
        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        let finish_reason = choice.finish_reason.unwrap_or(if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        });

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason,
            usage: response.usage.unwrap_or_default(),
        })
    }

    async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, Error> {
        let body = Self::convert_request(request, true);
        let response = self.post(&body).await?;

        let deltas = response
            .bytes_stream()
            .sse_events()
            .take_while(|event| {
                let done = matches!(event, Ok(e) if e.is_done());
                async move { !done }
            })
            .filter_map(|event| async move {
                match event {
                    Ok(event) => match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                        Ok(chunk) => Some(Self::convert_chunk(chunk)),
                        Err(e) => {
                            debug!(error = %e, "skipping unparseable stream event");
                            None
                        }
                    },
                    Err(e) => Some(Err(e)),
                }
            })
            .flat_map(|result| {
                let items: Vec<Result<ChunkDelta, Error>> = match result {
                    Ok(deltas) => deltas.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                futures_util::stream::iter(items)
            });

        Ok(Box::pin(deltas))
    }
}
