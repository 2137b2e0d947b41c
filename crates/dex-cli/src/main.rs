//! Dex CLI - Digital Excellence data providers
//!
//! A command-line host for the data provider service: list the registered
//! data sources, link accounts through OAuth, and import projects.

mod commands;
mod output;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use dex_core::{DataProviderService, DataProvidersConfig, DataSourceRegistry};

#[derive(Parser)]
#[command(name = "dex")]
#[command(author, version, about = "Digital Excellence data provider CLI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Data provider configuration file (JSON). Without it, sources are
    /// built from DEX_GITHUB_*, DEX_GITLAB_* and DEX_JSON_FEED_URL
    #[arg(long, env = "DEX_CONFIG", global = true)]
    config: Option<String>,

    /// Override database path (or set DEX_DB_PATH env var)
    #[arg(long, env = "DEX_DB_PATH", global = true)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect registered data sources
    Source {
        #[command(subcommand)]
        action: commands::source::SourceAction,
    },

    /// Link and unlink data sources through OAuth
    Oauth {
        #[command(subcommand)]
        action: commands::oauth::OauthAction,
    },

    /// Import projects from a data source
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
}

fn load_config(path: Option<&str>) -> Result<DataProvidersConfig> {
    match path {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            let content = std::fs::read_to_string(&expanded)
                .with_context(|| format!("Failed to read config file {}", expanded))?;
            Ok(DataProvidersConfig::from_json_str(&content)?)
        }
        None => {
            let config = DataProvidersConfig::from_env();
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Set up database path if provided
    if let Some(db_path) = &cli.db {
        std::env::set_var("DEX_DB_PATH", shellexpand::tilde(db_path).to_string());
    }

    let config = load_config(cli.config.as_deref())?;
    let registry = DataSourceRegistry::from_config(&config)?;
    let service = DataProviderService::new(Arc::new(registry));

    // Initialize database
    let db = dex_core::Database::new().await?;

    // Create context for commands
    let ctx = commands::Context {
        service,
        db,
        format: cli.format,
        quiet: cli.quiet,
    };

    // Execute command
    match cli.command {
        Commands::Source { action } => commands::source::execute(&ctx, action).await,
        Commands::Oauth { action } => commands::oauth::execute(&ctx, action).await,
        Commands::Project { action } => commands::project::execute(&ctx, action).await,
    }
}
