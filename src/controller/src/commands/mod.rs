//! CLI command definitions and dispatch.

mod images;
mod ingest;
mod mutate;
mod rules;
mod serve;
mod validate;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use image_warden_core::{ControllerConfig, LogLevel};
use image_warden_repo::{Repo, RepoOptions};

/// Image Warden: image provenance policy controller.
#[derive(Parser, Debug)]
#[command(name = "image-warden", version, about)]
pub struct Cli {
    /// Controller config file (YAML)
    #[arg(short, long, global = true, env = "IMAGE_WARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite store file
    #[arg(long, global = true, env = "IMAGE_WARDEN_STORE_FILE")]
    pub store_file: Option<PathBuf>,

    /// YAML file that contains engine rules
    #[arg(long, global = true, env = "IMAGE_WARDEN_RULES_FILE")]
    pub rules_file: Option<PathBuf>,

    /// Agent reporting interval, in seconds. Keep it the same as the agent fetch interval.
    #[arg(long, global = true)]
    pub agent_report_interval: Option<u64>,

    /// How long reports are kept, in days (0 = forever)
    #[arg(long, global = true)]
    pub retention: Option<u64>,

    /// Log level (debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the controller: keep the store clean until SIGINT/SIGTERM
    Serve,
    /// Store a node report read from a JSON file
    Ingest(ingest::IngestArgs),
    /// Validate an image reference against the rules
    Validate(validate::ValidateArgs),
    /// Apply mutation rules to an image reference
    Mutate(mutate::MutateArgs),
    /// Print the rule set as YAML
    Rules,
    /// List images known by the controller
    Images(images::ImagesArgs),
}

impl Cli {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn load_config(&self) -> anyhow::Result<ControllerConfig> {
        let mut config = match &self.config {
            Some(path) => ControllerConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ControllerConfig::default(),
        };

        if let Some(ref store_file) = self.store_file {
            config.store_file = store_file.clone();
        }
        if let Some(ref rules_file) = self.rules_file {
            config.rules_file = rules_file.clone();
        }
        if let Some(interval) = self.agent_report_interval {
            config.report_interval_secs = interval;
        }
        if let Some(retention) = self.retention {
            config.retention_days = retention;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }

        config.store_file = expand_home(&config.store_file);
        config.rules_file = expand_home(&config.rules_file);
        config.validate()?;
        Ok(config)
    }
}

/// Expand a leading `~/`.
pub(crate) fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Open the report store alone, for commands that do not evaluate rules.
pub(crate) fn open_repo(config: &ControllerConfig) -> anyhow::Result<Repo> {
    Repo::open(&config.store_file, RepoOptions::from(config))
        .with_context(|| format!("Failed to open store {}", config.store_file.display()))
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, config: ControllerConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve => serve::execute(config).await,
        Command::Ingest(args) => ingest::execute(config, args),
        Command::Validate(args) => validate::execute(config, args).await,
        Command::Mutate(args) => mutate::execute(config, args),
        Command::Rules => rules::execute(config),
        Command::Images(args) => images::execute(config, args),
    }
}
