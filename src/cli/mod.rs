pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::config::config;
use crate::database::{DatabaseManager, PgStore, SharedStore};

#[derive(Parser)]
#[command(name = "carelog")]
#[command(about = "CareLog admin CLI - account, token, catalog and ledger maintenance")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Parent account management")]
    Parent {
        #[command(subcommand)]
        cmd: commands::parent::ParentCommands,
    },

    #[command(about = "Development token minting")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Achievement and badge catalogs")]
    Catalog {
        #[command(subcommand)]
        cmd: commands::catalog::CatalogCommands,
    },

    #[command(about = "Coin ledger checks")]
    Ledger {
        #[command(subcommand)]
        cmd: commands::ledger::LedgerCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Postgres-backed store for commands that touch persisted data
pub async fn connect_store() -> anyhow::Result<SharedStore> {
    let database = &config().database;
    if database.url.is_none() {
        anyhow::bail!("DATABASE_URL must be set for this command");
    }
    let pool = DatabaseManager::connect(database).await?;
    DatabaseManager::migrate(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Parent { cmd } => commands::parent::handle(cmd, output_format).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
        Commands::Catalog { cmd } => commands::catalog::handle(cmd, output_format).await,
        Commands::Ledger { cmd } => commands::ledger::handle(cmd, output_format).await,
    }
}
