//! Scorecast - Main Entry Point
//!
//! With no subcommand, runs the full training pipeline with the defaults.

use clap::Parser;
use scorecast::cli::{cmd_predict, cmd_train, load_config, Cli, Commands};
use scorecast::logging::{init_logging, LOG_DIR};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logging = init_logging(LOG_DIR)?;

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Predict { data, output }) => {
            cmd_predict(&config, &data, output.as_ref())?;
        }
        Some(Commands::Train) | None => {
            cmd_train(config)?;
        }
    }

    Ok(())
}
