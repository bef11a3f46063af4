//! Client pipeline for the GonkaGate OpenAI-compatible chat API.
//!
//! Configuration is resolved from the environment, requests are dispatched
//! as a single completion, a token stream, a tool-calling agent run or a
//! schema-constrained answer, and every response is normalized into display
//! text. Failures are classified into short, actionable messages.

pub mod accumulator;
pub mod agent;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod factory;
pub mod normalize;
pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod render;
pub mod response;
pub mod server;
pub mod session;
pub mod sse_stream;
pub mod structured;
pub mod tools;
pub mod types;

// Re-export core types for easy usage
pub use classify::{classify, ErrorClassification, ErrorKind};
pub use config::{resolve_configuration, Config, Settings};
pub use error::{Error, HasStatusCode};
pub use factory::{Connector, DefaultConnector, FixedUrlConnector};
pub use pipeline::{Mode, Pipeline, Request};
pub use provider::ChatBackend;
pub use providers::GonkaGateProvider;
pub use response::{Completion, EventStream, Response};
pub use types::*;
