use anyhow::Result;
use clap::Parser;
use sqlcheck_core::config::load_catalog;
use sqlcheck_core::engine::Engine;
use sqlcheck_core::storage::store::Store;
use sqlcheck_server::config;
use sqlcheck_server::server::Server;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Content store; overrides SQLCHECK_DB
    #[arg(long)]
    db: Option<PathBuf>,

    /// Catalog whose `settings` block configures the engine; overrides the imported settings
    #[arg(long)]
    config: Option<PathBuf>,
}

use tracing_subscriber::{fmt, EnvFilter};

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut cfg = config::ServerConfig::from_env();
    if let Some(db) = args.db {
        cfg.db = db;
    }

    init_logging(&cfg.log_level);

    if !cfg.db.exists() {
        anyhow::bail!("store not found at {}", cfg.db.display());
    }
    let store = Store::open(&cfg.db)?;
    store.init_schema()?;
    let settings = match &args.config {
        Some(path) => load_catalog(path, false)?.settings,
        None => store.load_settings()?.unwrap_or_default(),
    };

    tracing::info!(
        event = "server_start",
        config = ?cfg,
        settings = ?settings
    );

    Server::run(Engine::new(store, settings), cfg).await
}
