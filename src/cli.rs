//! Command-line argument definitions.

use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const SMOKE_FLAG: &str = "--smoke";

/// GonkaGate chat examples
#[derive(Parser, Debug)]
#[command(name = "gonkagate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one chat completion and print the answer
    Chat(PromptArgs),

    /// Stream one chat completion as it is generated
    Stream(PromptArgs),

    /// Run a tool-calling agent (add_numbers, get_utc_time)
    Agent(PromptArgs),

    /// Stream a tool-calling agent (multiply_numbers, get_utc_time)
    #[command(name = "agent-stream")]
    AgentStream(PromptArgs),

    /// Extract a CRM lead as structured JSON
    Extract(PromptArgs),

    /// Start an interactive chat session
    Repl(ReplArgs),

    /// Serve the streaming chat endpoint over HTTP
    Serve(ServeArgs),
}

/// Arguments shared by the one-shot commands.
#[derive(Args, Debug, Clone, Default)]
pub struct PromptArgs {
    /// Check that the command starts and configuration parses, without any request
    #[arg(long)]
    pub smoke: bool,

    /// Prompt words; a built-in prompt is used when empty
    #[arg(allow_hyphen_values = true)]
    pub prompt: Vec<String>,
}

impl PromptArgs {
    pub fn is_smoke(&self) -> bool {
        self.smoke || self.prompt.iter().any(|word| is_smoke_flag(word))
    }

    /// The prompt words joined with spaces, or `default` when blank.
    pub fn prompt_or(&self, default: &str) -> String {
        let text = self
            .prompt
            .iter()
            .filter(|word| !is_smoke_flag(word))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let text = text.trim();
        if text.is_empty() {
            default.to_string()
        } else {
            text.to_string()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReplArgs {
    /// Model ID override; GONKAGATE_MODEL is used when empty
    #[arg(long)]
    pub model: Option<String>,

    /// System prompt override
    #[arg(long)]
    pub system: Option<String>,

    /// Temperature between 0 and 2
    #[arg(long, default_value_t = 0.2)]
    pub temperature: f32,

    /// Streaming output: true or false
    #[arg(long, default_value = "true")]
    pub stream: String,

    /// Save the transcript to this path on exit
    #[arg(long)]
    pub save: Option<PathBuf>,

    /// Check that the session starts and configuration parses, without any request
    #[arg(long)]
    pub smoke: bool,
}

impl Default for ReplArgs {
    fn default() -> Self {
        Self {
            model: None,
            system: None,
            temperature: 0.2,
            stream: "true".to_string(),
            save: None,
            smoke: false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "GONKAGATE_ADDR", default_value = "127.0.0.1:3000")]
    pub addr: SocketAddr,
}

/// Log filter directive for the number of `-v` flags.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn is_smoke_flag(word: &str) -> bool {
    word.eq_ignore_ascii_case(SMOKE_FLAG)
}

/// Spell every `--smoke` variant (any letter case) the way clap expects it.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| match arg.to_str() {
            Some(text) if is_smoke_flag(text) => OsString::from(SMOKE_FLAG),
            _ => arg,
        })
        .collect()
}

impl Cli {
    /// Parse arguments after [`normalize_args`].
    pub fn parse_normalized<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::parse_from(normalize_args(args))
    }

    pub fn try_parse_normalized<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }
}
