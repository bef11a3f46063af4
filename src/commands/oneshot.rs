//! Single-request commands: chat, stream, agent, agent-stream, extract.

use crate::cli::PromptArgs;
use crate::config::{EnvSource, Settings};
use crate::factory::Connector;
use crate::normalize::Normalized;
use crate::pipeline::{Mode, Pipeline, Request};
use crate::render::Renderer;
use crate::structured::{self, LeadRecord, LEAD_SYSTEM_PROMPT};
use crate::tools::{self, ToolRegistry};
use crate::Error;
use std::io::Write;
use tracing::info;

pub const SMOKE_PASSED: &str = "Smoke check passed: script can start and parse configuration.";

const CHAT_PROMPT: &str = "Say hi from GonkaGate in one short sentence.";
const AGENT_PROMPT: &str =
    "What is 21 + 21? Use the add_numbers tool and answer in one short sentence.";
const AGENT_STREAM_PROMPT: &str =
    "What is 7 * 8? Use multiply_numbers and answer in one short sentence.";
const EXTRACT_PROMPT: &str = "Extract lead data from: Hi, I'm Alice Johnson from Acme Labs. Reach me at alice@acme.dev. We need onboarding this week.";

const CONCISE_PROMPT: &str = "You are a concise assistant.";
const AGENT_SYSTEM_PROMPT: &str =
    "You are a concise assistant. Use tools when needed and provide the final answer clearly.";
const AGENT_STREAM_SYSTEM_PROMPT: &str =
    "You are a concise assistant. Use tools when needed and keep final answers brief.";

/// The fixed shape of each one-shot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Chat,
    Stream,
    Agent,
    AgentStream,
    Extract,
}

impl Preset {
    pub fn default_prompt(self) -> &'static str {
        match self {
            Preset::Chat | Preset::Stream => CHAT_PROMPT,
            Preset::Agent => AGENT_PROMPT,
            Preset::AgentStream => AGENT_STREAM_PROMPT,
            Preset::Extract => EXTRACT_PROMPT,
        }
    }

    fn system_prompt(self) -> &'static str {
        match self {
            Preset::Chat | Preset::Stream => CONCISE_PROMPT,
            Preset::Agent => AGENT_SYSTEM_PROMPT,
            Preset::AgentStream => AGENT_STREAM_SYSTEM_PROMPT,
            Preset::Extract => LEAD_SYSTEM_PROMPT,
        }
    }

    pub fn mode(self) -> Mode {
        match self {
            Preset::Chat | Preset::Agent => Mode::Invoke,
            Preset::Stream | Preset::AgentStream => Mode::Stream,
            Preset::Extract => Mode::Structured,
        }
    }

    fn temperature(self) -> Option<f32> {
        match self {
            Preset::Chat => None,
            Preset::Stream => Some(0.2),
            Preset::Agent | Preset::AgentStream | Preset::Extract => Some(0.0),
        }
    }

    fn tools(self) -> ToolRegistry {
        match self {
            Preset::Agent => [tools::add_numbers(), tools::get_utc_time()]
                .into_iter()
                .collect(),
            Preset::AgentStream => [tools::multiply_numbers(), tools::get_utc_time()]
                .into_iter()
                .collect(),
            Preset::Chat | Preset::Stream | Preset::Extract => ToolRegistry::new(),
        }
    }

    fn stream_prefix(self) -> Option<&'static str> {
        (self == Preset::AgentStream).then_some("Agent stream: ")
    }

    fn header(self) -> &'static str {
        match self {
            Preset::Agent | Preset::AgentStream => "Agent response:",
            Preset::Extract => "Structured response:",
            Preset::Chat | Preset::Stream => "Model response:",
        }
    }

    /// The request this preset sends for `prompt`.
    pub fn request(self, prompt: impl Into<String>) -> Request {
        let request = Request::new(prompt)
            .system_prompt(self.system_prompt())
            .tools(self.tools())
            .temperature(self.temperature());
        match self {
            Preset::Extract => request.response_schema(structured::lead_schema()),
            _ => request,
        }
    }
}

/// Run one preset end to end.
pub async fn run<Env, O, E>(
    preset: Preset,
    args: &PromptArgs,
    env: &Env,
    connector: &dyn Connector,
    renderer: &mut Renderer<O, E>,
) -> Result<(), Error>
where
    Env: EnvSource,
    O: Write,
    E: Write,
{
    let settings = Settings::load(env);
    if let Some(warning) = settings.warning() {
        renderer.warn(warning)?;
    }

    if args.is_smoke() {
        renderer.line(SMOKE_PASSED)?;
        return Ok(());
    }

    let pipeline = Pipeline::connect(settings.validate()?, connector)?;
    let request = preset.request(args.prompt_or(preset.default_prompt()));
    info!(?preset, model = pipeline.config().model(), "running");

    let response = pipeline.dispatch(&request, preset.mode()).await?;
    match Pipeline::normalize(response, renderer, preset.stream_prefix()).await? {
        Normalized::Text(text) => {
            renderer.line(preset.header())?;
            renderer.line(&text)?;
        }
        Normalized::Streamed(_) => {}
        Normalized::Structured(payload) => {
            let lead: LeadRecord = structured::decode(payload)?;
            renderer.line(preset.header())?;
            renderer.line(&serde_json::to_string_pretty(&lead)?)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let request = Preset::Agent.request("2+2?");
        assert_eq!(request.tools.len(), 2);
        assert!(request.tools.get("add_numbers").is_some());
        assert_eq!(request.temperature, Some(0.0));

        let request = Preset::AgentStream.request("x");
        assert!(request.tools.get("multiply_numbers").is_some());
        assert_eq!(Preset::AgentStream.mode(), Mode::Stream);

        let request = Preset::Extract.request("x");
        assert!(request.response_schema.is_some());
        assert!(request.tools.is_empty());

        assert_eq!(Preset::Stream.request("x").temperature, Some(0.2));
        assert_eq!(Preset::Chat.request("x").temperature, None);
    }
}
