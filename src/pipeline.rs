//! The request pipeline: resolve configuration, dispatch, normalize.

use crate::agent::Agent;
use crate::config::{self, Config, EnvSource};
use crate::factory::Connector;
use crate::normalize::{self, Normalized};
use crate::provider::ChatBackend;
use crate::render::Renderer;
use crate::response::Response;
use crate::structured;
use crate::tools::ToolRegistry;
use crate::types::{ChatMessage, ChatRequest, ChunkDelta, ResponseSchema, StreamEvent, MODEL_NODE};
use crate::Error;
use futures_util::StreamExt;
use std::fmt;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// How a request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Await the full answer.
    Invoke,
    /// Stream the answer as events.
    Stream,
    /// Await an answer constrained by the request's response schema.
    Structured,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Invoke => "invoke",
            Mode::Stream => "stream",
            Mode::Structured => "structured",
        })
    }
}

/// What to ask the model.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub system_prompt: Option<String>,
    /// The conversation after the system prompt; usually one user turn.
    pub messages: Vec<ChatMessage>,
    pub tools: ToolRegistry,
    pub response_schema: Option<ResponseSchema>,
    pub temperature: Option<f32>,
}

impl Request {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self::conversation(vec![ChatMessage::user(user_prompt.into())])
    }

    pub fn conversation(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
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

    pub fn response_schema(mut self, schema: ResponseSchema) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    fn chat_request(&self, model: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(ChatMessage::system(system.as_str()));
        }
        messages.extend(self.messages.iter().cloned());

        ChatRequest::new(model, messages)
            .temperature(self.temperature)
            .response_schema(self.response_schema.clone())
    }

    fn agent(&self, backend: Arc<dyn ChatBackend>, model: &str) -> Agent {
        let agent = Agent::new(backend, model)
            .tools(self.tools.clone())
            .temperature(self.temperature);
        match &self.system_prompt {
            Some(prompt) => agent.system_prompt(prompt.as_str()),
            None => agent,
        }
    }
}

/// A backend bound to validated configuration.
#[derive(Clone)]
pub struct Pipeline {
    config: Config,
    backend: Arc<dyn ChatBackend>,
}

impl Pipeline {
    pub fn new(config: Config, backend: Arc<dyn ChatBackend>) -> Self {
        Self { config, backend }
    }

    /// Build the backend for `config` through a connector.
    pub fn connect(config: Config, connector: &dyn Connector) -> Result<Self, Error> {
        let backend = connector.connect(&config)?;
        Ok(Self::new(config, backend))
    }

    /// Resolve validated configuration from the environment.
    pub fn resolve_configuration(env: &impl EnvSource) -> Result<Config, Error> {
        config::resolve_configuration(env)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The same backend, sending requests for another model.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            config: self.config.with_model(model),
            backend: self.backend.clone(),
        }
    }

    /// Send one request. Requests with tools run the agent loop.
    ///
    /// Failures are returned unchanged; nothing is retried.
    pub async fn dispatch(&self, request: &Request, mode: Mode) -> Result<Response, Error> {
        let model = self.config.model();
        debug!(%mode, model, tools = request.tools.len(), "dispatching request");

        match mode {
            Mode::Structured => {
                if request.response_schema.is_none() {
                    return Err(Error::config("structured mode needs a response schema"));
                }
                let completion = self.backend.complete(&request.chat_request(model)).await?;
                Ok(Response::Structured(structured::parse_payload(
                    &completion.content,
                )?))
            }
            Mode::Invoke if !request.tools.is_empty() => {
                let run = request
                    .agent(self.backend.clone(), model)
                    .invoke(request.messages.clone())
                    .await?;
                Ok(Response::PlainText(run.content))
            }
            Mode::Invoke => {
                let completion = self.backend.complete(&request.chat_request(model)).await?;
                Ok(Response::PlainText(completion.content))
            }
            Mode::Stream if !request.tools.is_empty() => Ok(Response::TokenStream(
                request
                    .agent(self.backend.clone(), model)
                    .stream(request.messages.clone()),
            )),
            Mode::Stream => {
                let deltas = self.backend.stream(&request.chat_request(model)).await?;
                let events = deltas.filter_map(|delta| async move {
                    match delta {
                        Ok(ChunkDelta::Content(text)) => {
                            Some(Ok(StreamEvent::token(text, MODEL_NODE)))
                        }
                        Ok(_) => None,
                        Err(e) => Some(Err(e)),
                    }
                });
                Ok(Response::from_stream(events))
            }
        }
    }

    /// Turn a response into display output.
    ///
    /// Text and structured answers are returned for the caller to print;
    /// streams are forwarded to `renderer` as they arrive, with
    /// `stream_prefix` written before the first fragment.
    pub async fn normalize<O: Write, E: Write>(
        response: Response,
        renderer: &mut Renderer<O, E>,
        stream_prefix: Option<&str>,
    ) -> Result<Normalized, Error> {
        match response {
            Response::PlainText(content) => Ok(Normalized::Text(normalize::normalize_text(
                &content,
            )?)),
            Response::TokenStream(events) => Ok(Normalized::Streamed(
                normalize::forward_stream(events, renderer, stream_prefix).await?,
            )),
            Response::Structured(payload) => Ok(Normalized::Structured(
                normalize::require_structured(payload)?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{API_KEY_VAR, MODEL_VAR};
    use crate::provider::ChunkStream;
    use crate::types::{FinishReason, MessageContent, Role, Usage};
    use crate::Completion;
    use futures_util::stream;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Answers every call with the same text and records requests.
    struct EchoBackend {
        answer: String,
        seen: Mutex<Vec<ChatRequest>>,
    }

    impl EchoBackend {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                seen: Mutex::default(),
            })
        }
    }

    #[async_trait::async_trait]
    impl ChatBackend for EchoBackend {
        async fn complete(&self, request: &ChatRequest) -> Result<Completion, Error> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(Completion {
                content: MessageContent::from(self.answer.as_str()),
                tool_calls: vec![],
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
            })
        }

        async fn stream(&self, request: &ChatRequest) -> Result<ChunkStream, Error> {
            self.seen.lock().unwrap().push(request.clone());
            let deltas = vec![
                Ok(ChunkDelta::Content(self.answer.clone())),
                Ok(ChunkDelta::Finish(FinishReason::Stop)),
            ];
            Ok(Box::pin(stream::iter(deltas)))
        }
    }

    fn pipeline(backend: Arc<EchoBackend>) -> Pipeline {
        let env: HashMap<&str, &str> = [(API_KEY_VAR, "k"), (MODEL_VAR, "qwen")].into_iter().collect();
        Pipeline::new(Pipeline::resolve_configuration(&env).unwrap(), backend)
    }

    #[tokio::test]
    async fn test_invoke_and_normalize() {
        let backend = EchoBackend::new("  Hi from GonkaGate!  ");
        let pipeline = pipeline(backend.clone());
        let request = Request::new("Say hi").system_prompt("You are a concise assistant.");

        let response = pipeline.dispatch(&request, Mode::Invoke).await.unwrap();
        let mut renderer = Renderer::new(Vec::new(), Vec::new());
        let normalized = Pipeline::normalize(response, &mut renderer, None).await.unwrap();

        assert_eq!(normalized, Normalized::Text("Hi from GonkaGate!".to_string()));
        let seen = backend.seen.lock().unwrap();
        assert_eq!(seen[0].model, "qwen");
        assert_eq!(seen[0].messages[0].role, Role::System);
        assert_eq!(seen[0].messages[1].content, MessageContent::from("Say hi"));
    }

    #[tokio::test]
    async fn test_stream_skips_non_text_deltas() {
        let pipeline = pipeline(EchoBackend::new("Hello"));
        let response = pipeline
            .dispatch(&Request::new("hi"), Mode::Stream)
            .await
            .unwrap();

        let mut renderer = Renderer::new(Vec::new(), Vec::new());
        let normalized = Pipeline::normalize(response, &mut renderer, None).await.unwrap();

        assert!(matches!(normalized, Normalized::Streamed(ref s) if s.text == "Hello"));
        let (out, _) = renderer.into_parts();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello\n[stream complete]\n");
    }

    #[tokio::test]
    async fn test_structured_dispatch() {
        let backend = EchoBackend::new(r#"{"name":"Alice","urgency":"high"}"#);
        let pipeline = pipeline(backend.clone());
        let request = Request::new("extract").response_schema(structured::lead_schema());

        let response = pipeline.dispatch(&request, Mode::Structured).await.unwrap();
        let mut renderer = Renderer::new(Vec::new(), Vec::new());
        let normalized = Pipeline::normalize(response, &mut renderer, None).await.unwrap();

        assert_eq!(
            normalized,
            Normalized::Structured(json!({"name": "Alice", "urgency": "high"}))
        );
        assert!(backend.seen.lock().unwrap()[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_structured_null_is_no_payload() {
        let pipeline = pipeline(EchoBackend::new("null"));
        let request = Request::new("extract").response_schema(structured::lead_schema());

        let response = pipeline.dispatch(&request, Mode::Structured).await.unwrap();
        let mut renderer = Renderer::new(Vec::new(), Vec::new());
        let result = Pipeline::normalize(response, &mut renderer, None).await;
        assert!(matches!(result, Err(Error::NoStructuredPayload)));
    }

    #[tokio::test]
    async fn test_structured_requires_schema() {
        let pipeline = pipeline(EchoBackend::new("{}"));
        let result = pipeline.dispatch(&Request::new("x"), Mode::Structured).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_blank_answer_is_no_content() {
        let pipeline = pipeline(EchoBackend::new(" "));
        let response = pipeline
            .dispatch(&Request::new("hi"), Mode::Invoke)
            .await
            .unwrap();
        let mut renderer = Renderer::new(Vec::new(), Vec::new());
        let result = Pipeline::normalize(response, &mut renderer, None).await;
        assert!(matches!(result, Err(Error::NoContent)));
    }
}
