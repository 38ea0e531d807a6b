// crates/mocap/src/main.rs

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::convert::{handle_convert, ConvertArgs};
use commands::formats::handle_formats;
use commands::info::{handle_info, InfoArgs};
use commands::wrenches::{handle_wrenches, WrenchesArgs};
use config::{Config, LoggingConfig};

/// Inspect and convert motion-capture trials
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (defaults to $MOCAP_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered file formats
    Formats,
    /// Summarise the content of a trial
    Info(InfoArgs),
    /// Convert every file matching a glob pattern
    Convert(ConvertArgs),
    /// Compute ground reaction wrenches from the force platforms of a trial
    Wrenches(WrenchesArgs),
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Command::Formats => handle_formats(&config),
        Command::Info(args) => handle_info(args, &config),
        Command::Convert(args) => handle_convert(args, &config),
        Command::Wrenches(args) => handle_wrenches(args, &config),
    }
}
