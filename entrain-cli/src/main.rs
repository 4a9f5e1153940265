//! Entrain CLI: play binaural sessions on a device or render them to WAV.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::debug;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();
    debug!("entrain v{}", env!("CARGO_PKG_VERSION"));

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Play { session, device, sample_rate, limit } => {
            commands::play(config, &session, device, sample_rate, limit)
        }
        Commands::Render { session, out, sample_rate, bits } => {
            commands::render(config, &session, &out, sample_rate, bits)
        }
        Commands::Presets => {
            commands::presets();
            Ok(())
        }
        Commands::Devices => commands::devices(),
    }
}
