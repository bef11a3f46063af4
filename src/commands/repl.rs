//! Interactive chat over stdin.

use super::oneshot::SMOKE_PASSED;
use crate::classify::classify;
use crate::cli::ReplArgs;
use crate::config::{EnvSource, Settings};
use crate::factory::Connector;
use crate::normalize::Normalized;
use crate::pipeline::{Mode, Pipeline, Request};
use crate::render::Renderer;
use crate::response::Response;
use crate::session::{
    Session, SlashCommand, Transcript, TranscriptMeta, DEFAULT_SAVE_PATH, HELP_TEXT,
};
use crate::Error;
use futures_util::StreamExt;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::debug;

const MAX_TEMPERATURE: f32 = 2.0;

/// Parse a boolean flag value. An empty value means true.
pub fn parse_bool(raw: &str) -> Result<bool, Error> {
    match raw.trim() {
        "" | "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(Error::config(format!(
            "invalid --stream value {raw:?}: expected true or false"
        ))),
    }
}

pub fn check_temperature(temperature: f32) -> Result<f32, Error> {
    if !(0.0..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(Error::config(format!(
            "invalid temperature {temperature:.2}: expected value between 0 and 2"
        )));
    }
    Ok(temperature)
}

/// Mutable per-session options changed by slash commands.
struct ChatState {
    model: String,
    streaming: bool,
    temperature: f32,
    save_path: Option<PathBuf>,
}

impl ChatState {
    fn meta(&self, pipeline: &Pipeline, session: &Session) -> TranscriptMeta {
        TranscriptMeta {
            model: self.model.clone(),
            base_url: pipeline.config().base_url().to_string(),
            streaming: self.streaming,
            temperature: self.temperature,
            system_prompt: session.system_prompt().to_string(),
        }
    }
}

/// Run the chat loop until `/exit` or end of input.
pub async fn run<Env, I, O, E>(
    args: &ReplArgs,
    env: &Env,
    connector: &dyn Connector,
    renderer: &mut Renderer<O, E>,
    input: &mut I,
) -> Result<(), Error>
where
    Env: EnvSource,
    I: BufRead,
    O: Write,
    E: Write,
{
    let streaming = parse_bool(&args.stream)?;
    let temperature = check_temperature(args.temperature)?;

    let settings = Settings::load(env).with_model_override(args.model.as_deref());
    if let Some(warning) = settings.warning() {
        renderer.warn(warning)?;
    }

    if args.smoke {
        renderer.line(SMOKE_PASSED)?;
        return Ok(());
    }

    let pipeline = Pipeline::connect(settings.validate()?, connector)?;
    let mut session = Session::new(args.system.as_deref());
    let mut state = ChatState {
        model: pipeline.config().model().to_string(),
        streaming,
        temperature,
        save_path: args.save.clone(),
    };

    renderer.info("Interactive chat started. Type /help for commands.")?;

    let mut line = String::new();
    loop {
        renderer.prompt()?;
        line.clear();
        if input.read_line(&mut line)? == 0 {
            renderer.newline()?;
            renderer.info("Input closed. Exiting chat.")?;
            break;
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        if text.starts_with('/') {
            let command = match SlashCommand::parse(text) {
                Ok(command) => command,
                Err(usage) => {
                    renderer.error(&usage.to_string())?;
                    continue;
                }
            };

            match command {
                SlashCommand::Help => renderer.line(HELP_TEXT)?,
                SlashCommand::Model(model) => {
                    renderer.info(&format!("Model set to {model}"))?;
                    state.model = model;
                }
                SlashCommand::Stream(on) => {
                    state.streaming = on;
                    renderer.info(&format!("Streaming set to {on}"))?;
                }
                SlashCommand::Reset => {
                    session.reset();
                    renderer.info("Conversation reset.")?;
                }
                SlashCommand::Save(path) => {
                    let path = path
                        .map(PathBuf::from)
                        .or_else(|| state.save_path.clone())
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_PATH));
                    match Transcript::new(state.meta(&pipeline, &session), &session).save(&path)
                    {
                        Ok(()) => {
                            renderer.info(&format!("History saved to {}", path.display()))?;
                            state.save_path = Some(path);
                        }
                        Err(e) => renderer.error(&classify(&e).message)?,
                    }
                }
                SlashCommand::Exit => {
                    renderer.info("Exiting chat.")?;
                    break;
                }
            }
            continue;
        }

        session.add_user(text);
        renderer.assistant_prefix()?;

        match turn(&pipeline, &state, &session, renderer).await {
            Ok(answer) => session.add_assistant(&answer),
            Err(e) => {
                debug!(error = %e, "chat turn failed");
                session.remove_last_user_message();
                renderer.newline()?;
                renderer.error(&classify(&e).message)?;
            }
        }
    }

    if let Some(path) = &args.save {
        Transcript::new(state.meta(&pipeline, &session), &session).save(path)?;
        renderer.info(&format!("History saved to {}", path.display()))?;
    }

    Ok(())
}

/// Send the conversation and print the reply. Returns the reply text.
async fn turn<O: Write, E: Write>(
    pipeline: &Pipeline,
    state: &ChatState,
    session: &Session,
    renderer: &mut Renderer<O, E>,
) -> Result<String, Error> {
    let pipeline = pipeline.with_model(&state.model);
    let request =
        Request::conversation(session.messages().to_vec()).temperature(Some(state.temperature));

    if !state.streaming {
        let response = pipeline.dispatch(&request, Mode::Invoke).await?;
        return match Pipeline::normalize(response, renderer, None).await? {
            Normalized::Text(text) => {
                renderer.line(&text)?;
                Ok(text)
            }
            other => Err(Error::streaming(format!(
                "unexpected response for invoke: {other:?}"
            ))),
        };
    }

    let Response::TokenStream(mut events) = pipeline.dispatch(&request, Mode::Stream).await?
    else {
        return Err(Error::streaming("expected a token stream"));
    };

    let mut answer = String::new();
    while let Some(event) = events.next().await {
        if let Some(text) = event?.answer_text() {
            renderer.token(text)?;
            answer.push_str(text);
        }
    }
    renderer.newline()?;

    if answer.trim().is_empty() {
        return Err(Error::NoContent);
    }
    Ok(answer)
}
