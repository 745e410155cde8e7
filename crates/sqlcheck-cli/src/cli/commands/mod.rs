pub mod check;
pub mod import;
pub mod init;
pub mod progress;
pub mod run;
pub mod solutions;
pub mod validate;

use crate::cli::args::{Cli, Command, StoreArgs};
use anyhow::Context;
use sqlcheck_core::config::load_catalog;
use sqlcheck_core::engine::Engine;
use sqlcheck_core::storage::store::Store;
use std::path::Path;

pub mod exit_codes {
    pub const OK: i32 = 0;
    /// Incorrect answer, failed query, or validation findings.
    pub const FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Init(args) => init::run(args),
        Command::Import(args) => import::run(args),
        Command::Validate(args) => validate::run(args),
        Command::Run(args) => run::run(args),
        Command::Check(args) => check::run(args),
        Command::Solutions(args) => solutions::run(args),
        Command::Progress(args) => progress::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Opens an existing store. A missing file is an error rather than a fresh empty db.
pub(crate) fn open_store(db: &Path) -> anyhow::Result<Store> {
    if !db.exists() {
        anyhow::bail!(
            "store not found at {} (run `sqlcheck import` first)",
            db.display()
        );
    }
    let store = Store::open(db).with_context(|| format!("failed to open {}", db.display()))?;
    store.init_schema()?;
    Ok(store)
}

/// Opens the store, creating its parent directory and schema when needed.
pub(crate) fn create_store(db: &Path) -> anyhow::Result<Store> {
    if let Some(parent) = db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let store = Store::open(db).with_context(|| format!("failed to open {}", db.display()))?;
    store.init_schema()?;
    Ok(store)
}

/// Engine over an existing store. `--config` overrides the settings saved by the last import.
pub(crate) fn open_engine(args: &StoreArgs) -> anyhow::Result<Engine> {
    let store = open_store(&args.db)?;
    let settings = match &args.config {
        Some(path) => load_catalog(path, false)?.settings,
        None => store.load_settings()?.unwrap_or_default(),
    };
    Ok(Engine::new(store, settings))
}
