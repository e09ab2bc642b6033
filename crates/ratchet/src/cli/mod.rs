mod migrate;
mod status;
mod validate;

pub use migrate::MigrateCommand;
pub use status::StatusCommand;
pub use validate::ValidateCommand;

use std::path::Path;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ratchet_core::config::{RunConfig, DEFAULT_CONFIG_FILE};

/// ratchet - forward-only SQL migrations for many databases at once
#[derive(Parser)]
#[command(name = "ratchet")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending migrations to every target.
    Migrate(MigrateCommand),

    /// Show current and pending versions per target.
    Status(StatusCommand),

    /// Check the configuration and migration files without connecting.
    Validate(ValidateCommand),
}

/// Options shared by every command.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Configuration file path.
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Load `.fixture.sql` companions with their migrations. Fixtures are
    /// counted in the output but never applied.
    #[arg(long)]
    pub fixtures: bool,
}

impl CommonArgs {
    /// Load `.env`, set up logging and read the configuration file.
    pub fn init(&self) -> Result<RunConfig> {
        dotenvy::dotenv().ok();
        init_tracing(self.verbose);
        let mut config = load_config(&self.config)?;
        if self.fixtures {
            config.fixtures = true;
        }
        Ok(config)
    }
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Migrate(cmd) => cmd.execute().await,
            Commands::Status(cmd) => cmd.execute().await,
            Commands::Validate(cmd) => cmd.execute().await,
        }
    }
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    // Ignore the error when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
        .with_target(false)
        .try_init();
}

fn load_config(path: &str) -> Result<RunConfig> {
    if !Path::new(path).exists() {
        anyhow::bail!(
            "Configuration file not found: {}\nCreate one or pass `--config <path>`.",
            path
        );
    }

    tracing::debug!("Loading configuration from {}", path);
    Ok(RunConfig::from_file(path)?)
}
