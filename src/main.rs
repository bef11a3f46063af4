//! GonkaGate command-line examples.

use gonkagate::cli::{self, Cli};
use gonkagate::commands;
use gonkagate::config::ProcessEnv;
use gonkagate::factory::DefaultConnector;
use gonkagate::render::Renderer;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_normalized(std::env::args_os());
    init_tracing(cli.verbose);

    let mut renderer = Renderer::stdio();
    let mut input = std::io::stdin().lock();
    let code = commands::run(
        cli.command,
        &ProcessEnv,
        Arc::new(DefaultConnector),
        &mut renderer,
        &mut input,
    )
    .await;

    ExitCode::from(code)
}

/// Logs go to stderr so they never mix with answers. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    use std::io::IsTerminal;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli::log_level(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(verbose > 1)
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .init();
}
