//! CLI Module
//!
//! Offline renderer for the effect chain.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Warpfx - render audio through the delay/half-time chain
#[derive(Parser, Debug)]
#[command(name = "warpfx-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a WAV file through the chain
    #[command(name = "render")]
    Render {
        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file (32-bit float)
        #[arg(short, long)]
        output: PathBuf,

        /// Chain configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Controller value sent with the first block, as CTRL=VALUE
        #[arg(long = "cc", value_parser = parse_cc)]
        cc: Vec<(u8, u8)>,
    },

    /// Print the default chain configuration
    #[command(name = "default-config")]
    DefaultConfig,
}

/// Parse `CTRL=VALUE` with both halves in 0..=127
pub fn parse_cc(arg: &str) -> std::result::Result<(u8, u8), String> {
    let (controller, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected CTRL=VALUE, got '{}'", arg))?;

    let parse = |field: &str, name: &str| -> std::result::Result<u8, String> {
        let parsed: u8 = field
            .trim()
            .parse()
            .map_err(|_| format!("invalid {} '{}'", name, field))?;
        if parsed > 127 {
            return Err(format!("{} {} is outside 0..=127", name, parsed));
        }
        Ok(parsed)
    };

    Ok((parse(controller, "controller")?, parse(value, "value")?))
}
