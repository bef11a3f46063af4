use thiserror::Error;

/// Errors that can occur when talking to GonkaGate.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing API key. Set GONKAGATE_API_KEY (recommended) or OPENAI_API_KEY in your environment.")]
    MissingApiKey,

    #[error("Missing model. Set GONKAGATE_MODEL in your environment.")]
    MissingModel,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream API reported an error. `status` is absent when the error
    /// arrived inside an already open stream.
    #[error("{message}")]
    Api { status: Option<u16>, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Received a response but no message content.")]
    NoContent,

    #[error("Received a response but no structured payload.")]
    NoStructuredPayload,

    #[error("Model returned structured output that did not match the schema: {0}")]
    SchemaMismatch(String),

    #[error("Tool error: {name} - {message}")]
    Tool { name: String, message: String },

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{context}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn api(status: Option<u16>, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn tool(name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Error::SchemaMismatch(message.into())
    }

    /// Wrap this error with a description of the step that failed.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

/// Access to the HTTP status code a failure carries, if any.
pub trait HasStatusCode {
    fn status_code(&self) -> Option<u16>;
}

impl HasStatusCode for Error {
    fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => *status,
            Error::Http(e) => e.status_code(),
            _ => None,
        }
    }
}

impl HasStatusCode for reqwest::Error {
    fn status_code(&self) -> Option<u16> {
        self.status().map(|status| status.as_u16())
    }
}
