//! Strongroom CLI, maintenance tool for session tables.
//!
//! ```bash
//! strongroom init
//! strongroom gc --watch
//! strongroom stats --json
//! ```
//!
//! Settings come from `strongroom.toml` and `SR_*` environment variables,
//! see `strongroom --help`.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use strongroom_core::config::{StrongroomConfig, CONFIG_FILE};
use strongroom_core::logging::{self, Verbosity};

#[derive(Parser)]
#[command(
    name = "strongroom",
    about = "Strongroom session table maintenance",
    version,
    after_help = "Settings are read from strongroom.toml, then SR_* environment variables."
)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log verbosity: quiet, simple, report or debug
    #[arg(short, long, global = true)]
    verbosity: Option<Verbosity>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the session table and its expiry index
    Init,

    /// Delete expired sessions
    Gc {
        /// Keep running and sweep every N seconds
        #[arg(long, value_name = "SECS")]
        every: Option<u64>,

        /// Keep running and sweep every `session.gc_interval` seconds
        #[arg(long, conflicts_with = "every")]
        watch: bool,
    },

    /// Count active sessions
    Stats {
        /// Print the counts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and probe the database
    Check,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = StrongroomConfig::load_from(&cli.config)?;
    if let Some(verbosity) = cli.verbosity {
        config.logging.verbosity = verbosity;
    }
    logging::init_logging(&config.logging.to_runtime()?)?;

    match cli.command {
        Commands::Init => commands::init::run(&config),
        Commands::Gc { every, watch } => {
            let every = every.or(watch.then_some(config.session.gc_interval));
            commands::gc::run(&config, every)
        }
        Commands::Stats { json } => commands::stats::run(&config, json),
        Commands::Check => commands::check::run(&config),
    }
}
