//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvStockReader;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteStore;
use crate::domain::content::ContentBundle;
use crate::domain::error::PaisaError;
use crate::domain::settings::Settings;
use crate::ports::content_port::ContentPort;
use crate::ports::ledger_port::LedgerPort;

#[derive(Parser, Debug)]
#[command(name = "paisabuddy", about = "Gamified personal finance for young earners")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the database schema
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import or refresh stock listings from a CSV file
    ImportStocks {
        #[arg(short, long)]
        config: PathBuf,
        csv: PathBuf,
    },
    /// Load learning modules, fraud scenarios, coupons and token packages
    LoadContent {
        #[arg(short, long)]
        config: PathBuf,
        content: PathBuf,
    },
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::InitDb { config } => run_init_db(&config),
        Command::ImportStocks { config, csv } => run_import_stocks(&config, &csv),
        Command::LoadContent { config, content } => run_load_content(&config, &content),
        Command::Serve { config } => run_serve(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, PaisaError> {
    eprintln!("Loading config from {}", path.display());
    let config = FileConfigAdapter::from_file(path)?;
    Settings::from_config(&config)
}

/// Opens the configured database, creating any missing tables.
pub fn open_store(settings: &Settings) -> Result<SqliteStore, PaisaError> {
    let store = SqliteStore::from_settings(settings)?;
    store.initialize_schema()?;
    Ok(store)
}

pub fn run_init_db(config_path: &Path) -> Result<(), PaisaError> {
    let settings = load_settings(config_path)?;
    open_store(&settings)?;
    eprintln!("Database ready at {}", settings.database_path);
    Ok(())
}

pub fn run_import_stocks(config_path: &Path, csv_path: &Path) -> Result<(), PaisaError> {
    let settings = load_settings(config_path)?;
    eprintln!("Reading stocks from {}", csv_path.display());
    let listings = CsvStockReader::read_file(csv_path)?;
    let store = open_store(&settings)?;
    let count = store.upsert_stocks(&listings)?;
    eprintln!("Imported {count} stocks");
    Ok(())
}

pub fn run_load_content(config_path: &Path, content_path: &Path) -> Result<(), PaisaError> {
    let settings = load_settings(config_path)?;
    eprintln!("Reading content from {}", content_path.display());
    let bundle = ContentBundle::from_file(content_path)?;
    let store = open_store(&settings)?;
    let summary = store.load_content(&bundle)?;
    eprintln!(
        "Loaded {} modules ({} quiz questions), {} scenarios, {} coupons, {} packages",
        summary.modules, summary.questions, summary.scenarios, summary.coupons, summary.packages
    );
    Ok(())
}

fn run_serve(config_path: &Path) -> Result<(), PaisaError> {
    #[cfg(feature = "web")]
    {
        use crate::adapters::web::{AppState, build_router};
        use std::net::SocketAddr;
        use std::sync::Arc;

        let settings = load_settings(config_path)?;
        let addr: SocketAddr =
            settings
                .listen
                .parse()
                .map_err(|_| PaisaError::ConfigInvalid {
                    section: "web".into(),
                    key: "listen".into(),
                    reason: format!("'{}' is not a socket address", settings.listen),
                })?;
        let store = open_store(&settings)?;

        eprintln!("Starting web server on {addr}");
        let state = AppState {
            store: Arc::new(store),
            settings,
        };

        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let router = build_router(state);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await
        })?;
        Ok(())
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        Err(PaisaError::Internal {
            reason: "web feature is required for serve".into(),
        })
    }
}
