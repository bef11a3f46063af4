//! GonkaGate provider (OpenAI-compatible chat completions).

pub mod client;
pub mod types;

pub use client::GonkaGateProvider;
