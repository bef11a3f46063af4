//! Subcommand entry points.

pub mod oneshot;
pub mod repl;

use crate::cli::Command;
use crate::config::{EnvSource, Settings};
use crate::factory::Connector;
use crate::render::Renderer;
use crate::server::{self, AppState};
use crate::Error;
use oneshot::Preset;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::debug;

/// Run `command`, returning the first failure.
pub async fn execute<Env, I, O, E>(
    command: Command,
    env: &Env,
    connector: Arc<dyn Connector>,
    renderer: &mut Renderer<O, E>,
    input: &mut I,
) -> Result<(), Error>
where
    Env: EnvSource,
    I: BufRead,
    O: Write,
    E: Write,
{
    let (preset, args) = match command {
        Command::Chat(args) => (Preset::Chat, args),
        Command::Stream(args) => (Preset::Stream, args),
        Command::Agent(args) => (Preset::Agent, args),
        Command::AgentStream(args) => (Preset::AgentStream, args),
        Command::Extract(args) => (Preset::Extract, args),
        Command::Repl(args) => {
            return repl::run(&args, env, connector.as_ref(), renderer, input).await;
        }
        Command::Serve(args) => {
            let settings = Settings::load(env);
            if let Some(warning) = settings.warning() {
                renderer.warn(warning)?;
            }
            return server::serve(args.addr, AppState::new(settings, connector)).await;
        }
    };

    oneshot::run(preset, &args, env, connector.as_ref(), renderer).await
}

/// Run `command` and turn a failure into an `Error: ` line and exit code 1.
pub async fn run<Env, I, O, E>(
    command: Command,
    env: &Env,
    connector: Arc<dyn Connector>,
    renderer: &mut Renderer<O, E>,
    input: &mut I,
) -> u8
where
    Env: EnvSource,
    I: BufRead,
    O: Write,
    E: Write,
{
    match execute(command, env, connector, renderer, input).await {
        Ok(()) => 0,
        Err(e) => {
            debug!(error = ?e, "command failed");
            // Nothing else can be reported if stderr itself is gone.
            let _ = renderer.error(&e.classify().message);
            1
        }
    }
}
