//! Warpfx CLI
//!
//! Offline renderer for the Warpfx effect chain.

use std::process::ExitCode;

use clap::Parser;
use env_logger::Env;
use log::{error, info};

use warpfx::cli::{commands, Cli, Commands};
use warpfx::Result;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Warpfx v{}", env!("CARGO_PKG_VERSION"));

    match handle_command(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("[{}] {}", e.error_code(), e);
            for suggestion in e.recovery_suggestions() {
                eprintln!("  hint: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Render {
            input,
            output,
            config,
            cc,
        } => commands::render(&input, &output, config.as_deref(), &cc),
        Commands::DefaultConfig => commands::default_config(),
    }
}
