mod commands;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use acdb::log_format::TargetFirstFormat;
use acdb::workbook::DEFAULT_SHEET;
use acdb::{AircraftDataRepository, AppConfig, db};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "acdb",
    version,
    about = "Import and search the FAA Aircraft Characteristics Database"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import (upsert) every row of the FAA workbook
    Import {
        /// Path to the Aircraft Characteristics .xlsx file
        #[arg(long, env = "ACDB_FILE", default_value = "aircraft_data.xlsx")]
        file: PathBuf,
        /// Worksheet holding the aircraft rows
        #[arg(long, default_value = DEFAULT_SHEET)]
        sheet: String,
    },
    /// Delete every stored aircraft record
    Clear,
    /// Print the number of stored aircraft records
    Count,
    /// Search by ICAO code, FAA designator, manufacturer or model
    Search {
        /// Text to match; omit to list everything
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = 1)]
        page: i64,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show a single record by ICAO code and FAA designator
    Show { icao_code: String, faa_designator: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(TargetFirstFormat::new(std::io::stderr().is_terminal()))
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    if let Err(e) = run(Cli::parse()).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let pool = db::create_pool(&config)?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(
        AircraftDataRepository::new(pool).with_statement_timeout(config.query_timeout),
    );

    match cli.command {
        Commands::Import { file, sheet } => {
            commands::handle_import(store, &config, &file, &sheet).await
        }
        Commands::Clear => commands::handle_clear(store, &config).await,
        Commands::Count => commands::handle_count(store, &config).await,
        Commands::Search { query, page, limit } => {
            commands::handle_search(store, &config, &query, page, limit).await
        }
        Commands::Show {
            icao_code,
            faa_designator,
        } => commands::handle_show(store, &config, icao_code, faa_designator).await,
    }
}
