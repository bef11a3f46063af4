//! HTTP chat endpoint streaming answers in the UI message stream format.

use crate::classify::classify;
use crate::config::Settings;
use crate::factory::Connector;
use crate::pipeline::{Mode, Pipeline, Request};
use crate::response::Response as DispatchResponse;
use crate::types::{ChatMessage, MessageContent, Role};
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const SYSTEM_PROMPT: &str =
    "You are a concise and helpful assistant. Keep answers direct and practical.";

const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

/// Shared state: settings loaded once at startup plus the backend connector.
#[derive(Clone)]
pub struct AppState {
    settings: Arc<Settings>,
    connector: Arc<dyn Connector>,
}

impl AppState {
    pub fn new(settings: Settings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings: Arc::new(settings),
            connector,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/chat", post(chat))
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "chat server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub messages: Vec<UiMessage>,
}

/// A chat turn as sent by the browser. Text comes either from `content`
/// or from the `text` parts.
#[derive(Debug, Deserialize)]
pub struct UiMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub parts: Vec<UiPart>,
}

#[derive(Debug, Deserialize)]
pub struct UiPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl UiMessage {
    fn into_chat_message(self) -> ChatMessage {
        let content = match self.content {
            Some(content) if !content.is_blank() => content,
            _ => MessageContent::Text(
                self.parts
                    .into_iter()
                    .filter(|p| p.kind == "text")
                    .filter_map(|p| p.text)
                    .collect(),
            ),
        };
        ChatMessage::new(self.role, content)
    }
}

/// A failure returned as `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Missing configuration maps to fixed codes; anything else is
    /// classified and keeps the upstream status, defaulting to 500.
    fn from_error(error: &Error) -> Self {
        match error {
            Error::MissingApiKey => Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string()),
            Error::MissingModel => Self::new(StatusCode::BAD_REQUEST, error.to_string()),
            _ => {
                let classification = classify(error);
                let status = classification
                    .status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                Self::new(status, classification.message)
            }
        }
    }
}

impl ApiError {
    fn from_rejection(rejection: JsonRejection) -> Self {
        warn!(status = rejection.status().as_u16(), error = %rejection, "rejected chat body");
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::from_error(&error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Configuration is checked before the body, so a missing key wins over a
/// bad request.
async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let config = state.settings.validate()?;
    let Json(body) = body.map_err(ApiError::from_rejection)?;
    let pipeline = Pipeline::connect(config, state.connector.as_ref())?;

    let messages = body
        .messages
        .into_iter()
        .map(UiMessage::into_chat_message)
        .collect();
    let request = Request::conversation(messages).system_prompt(SYSTEM_PROMPT);

    let events = match pipeline.dispatch(&request, Mode::Stream).await {
        Ok(DispatchResponse::TokenStream(events)) => events,
        Ok(other) => {
            error!(response = ?other, "stream dispatch returned a non-stream response");
            return Err(ApiError::from(Error::streaming("expected a token stream")));
        }
        Err(e) => {
            let api_error = ApiError::from_error(&e);
            warn!(status = api_error.status.as_u16(), error = %e, "chat request failed");
            return Err(api_error);
        }
    };

    let message_id = format!("msg-{}", uuid::Uuid::new_v4().simple());
    let text_id = format!("text-{}", uuid::Uuid::new_v4().simple());

    let payloads = async_stream::stream! {
        yield json!({"type": "start", "messageId": message_id});
        yield json!({"type": "text-start", "id": text_id});

        let mut events = events;
        let mut failed = false;
        while let Some(event) = events.next().await {
            match event {
                Ok(event) => {
                    if let Some(delta) = event.answer_text() {
                        yield json!({"type": "text-delta", "id": text_id, "delta": delta});
                    }
                }
                Err(e) => {
                    warn!(error = %e, "chat stream failed");
                    yield json!({"type": "error", "errorText": classify(&e).message});
                    failed = true;
                    break;
                }
            }
        }

        if !failed {
            yield json!({"type": "text-end", "id": text_id});
            yield json!({"type": "finish"});
        }
    };

    let stream = payloads
        .map(|payload| Ok::<_, Infallible>(Event::default().data(payload.to_string())))
        .chain(futures_util::stream::once(async {
            Ok::<_, Infallible>(Event::default().data("[DONE]"))
        }));

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    response.headers_mut().insert(
        HeaderName::from_static(UI_STREAM_HEADER),
        HeaderValue::from_static("v1"),
    );
    Ok(response)
}
