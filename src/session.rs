//! Interactive chat state: conversation history, slash commands and
//! transcript files.

use crate::types::{ChatMessage, MessageContent, Role};
use crate::Error;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise assistant.";
pub const DEFAULT_SAVE_PATH: &str = "gonkagate-chat-history.json";

pub const HELP_TEXT: &str = "Commands:
  /help                Show available commands
  /model <model-id>    Change model for next requests
  /stream on|off       Toggle streaming mode
  /reset               Reset conversation history (keeps system prompt)
  /save [path]         Save transcript to JSON
  /exit                Exit chat";

/// Conversation history, always starting with the system prompt.
#[derive(Debug, Clone)]
pub struct Session {
    system_prompt: String,
    messages: Vec<ChatMessage>,
}

impl Session {
    pub fn new(system_prompt: Option<&str>) -> Self {
        let system_prompt = system_prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .to_string();

        let mut session = Self {
            system_prompt,
            messages: Vec::new(),
        };
        session.reset();
        session
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn add_user(&mut self, content: &str) {
        self.push(Role::User, content);
    }

    pub fn add_assistant(&mut self, content: &str) {
        self.push(Role::Assistant, content);
    }

    fn push(&mut self, role: Role, content: &str) {
        let content = content.trim();
        if !content.is_empty() {
            self.messages.push(ChatMessage::new(role, content));
        }
    }

    /// Drop the last message if it is a user turn that got no answer.
    pub fn remove_last_user_message(&mut self) {
        if self.messages.last().map(|m| m.role) == Some(Role::User) {
            self.messages.pop();
        }
    }

    /// Forget the conversation but keep the system prompt.
    pub fn reset(&mut self) {
        self.messages = vec![ChatMessage::system(self.system_prompt.as_str())];
    }
}

/// A malformed slash command; the message is shown as is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(String);

impl UsageError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A parsed `/command` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Model(String),
    Stream(bool),
    Reset,
    Save(Option<String>),
    Exit,
}

impl SlashCommand {
    /// Parse a line starting with `/`. Errors are usage messages.
    pub fn parse(input: &str) -> Result<Self, UsageError> {
        let trimmed = input.trim();
        if !trimmed.starts_with('/') {
            return Err(UsageError::new(format!("not a slash command: {input:?}")));
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let Some(first) = fields.first() else {
            return Err(UsageError::new("empty command"));
        };
        let name = first.trim_start_matches('/').to_lowercase();
        let rest = fields[1..].join(" ");

        match name.as_str() {
            "help" | "reset" | "exit" if fields.len() != 1 => Err(UsageError::new(format!(
                "/{name} does not accept arguments"
            ))),
            "help" => Ok(SlashCommand::Help),
            "reset" => Ok(SlashCommand::Reset),
            "exit" => Ok(SlashCommand::Exit),
            "model" if rest.is_empty() => Err(UsageError::new("usage: /model <model-id>")),
            "model" => Ok(SlashCommand::Model(rest)),
            "stream" => match (fields.len(), rest.to_lowercase().as_str()) {
                (2, "on") => Ok(SlashCommand::Stream(true)),
                (2, "off") => Ok(SlashCommand::Stream(false)),
                _ => Err(UsageError::new("usage: /stream on|off")),
            },
            "save" => Ok(SlashCommand::Save((!rest.is_empty()).then_some(rest))),
            _ => Err(UsageError::new(format!("unknown command {first:?}. Use /help"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMeta {
    pub model: String,
    pub base_url: String,
    pub streaming: bool,
    pub temperature: f32,
    pub system_prompt: String,
}

/// A saved chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub saved_at: String,
    pub meta: TranscriptMeta,
    pub messages: Vec<TranscriptMessage>,
}

impl Transcript {
    pub fn new(meta: TranscriptMeta, session: &Session) -> Self {
        let messages = session
            .messages()
            .iter()
            .map(|m| TranscriptMessage {
                role: m.role,
                content: match &m.content {
                    MessageContent::Text(text) => text.clone(),
                    MessageContent::Parts(parts) => {
                        parts.iter().filter_map(|p| p.text()).collect()
                    }
                },
            })
            .collect();

        Self {
            saved_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            meta,
            messages,
        }
    }

    /// Write pretty JSON to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::from(e).context("create save directory"))?;
        }

        let mut data = serde_json::to_string_pretty(self)?;
        data.push('\n');
        fs::write(path, data).map_err(|e| Error::from(e).context("write transcript"))?;
        Ok(())
    }
}
