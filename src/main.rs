//! # CSV Search CLI (`csv-search`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `csv-search init` | Create the table and search index |
//! | `csv-search import <file>` | Ingest a local CSV file |
//! | `csv-search search [query]` | Print one page of results as JSON |
//! | `csv-search serve` | Start the HTTP server and browser UI |
//!
//! Database settings come from `--config` (TOML) and the `POSTGRES_*`
//! environment variables.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use csv_search::{config, ingest, migrate, search, server};

/// Upload CSV files into PostgreSQL and browse them with full-text search.
#[derive(Parser)]
#[command(name = "csv-search", version)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the rows table and full-text index. Idempotent.
    Init,

    /// Ingest a CSV file (plain, .gz, or .zst) through the batch pipeline.
    Import {
        /// Path to the CSV file.
        file: PathBuf,

        /// Override `[ingest].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Search stored rows and print the result page as JSON.
    Search {
        /// Search term. Omit to list all rows.
        query: Option<String>,

        #[arg(long)]
        page: Option<i64>,

        #[arg(long)]
        page_size: Option<i64>,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Init => migrate::run_migrations(&cfg).await?,
        Commands::Import { file, batch_size } => {
            if let Some(n) = batch_size {
                cfg.ingest.batch_size = n.max(1);
            }
            ingest::run_import(&cfg, &file).await?;
        }
        Commands::Search {
            query,
            page,
            page_size,
        } => search::run_search(&cfg, query.as_deref(), page, page_size).await?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
