//! whostream - Track who is streaming a game and report viewing sessions

use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use whostream::cli::Cli;
use whostream::commands::run;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Quiet by default; --verbose or RUST_LOG turn on progress output
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("whostream=info"))
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Command failed: {:?}", e);
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(u8::from(e.return_code()))
        }
    }
}
