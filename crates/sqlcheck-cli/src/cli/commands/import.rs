use super::{create_store, exit_codes};
use crate::cli::args::ImportArgs;
use anyhow::Context;
use sqlcheck_core::config::load_catalog;

pub fn run(args: ImportArgs) -> anyhow::Result<i32> {
    let catalog = match load_catalog(&args.config, args.strict) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let store = create_store(&args.db)?;
    let summary = store
        .import_catalog(&catalog)
        .with_context(|| format!("failed to import {}", args.config.display()))?;

    println!(
        "Imported {} topics, {} questions into {}",
        summary.topics,
        summary.questions,
        args.db.display()
    );

    let stats = store.stats_best_effort()?;
    let show = |n: Option<u64>| n.map(|v| v.to_string()).unwrap_or_else(|| "?".into());
    eprintln!(
        "Store: {} topics, {} questions, {} users, {} completions",
        show(stats.topics),
        show(stats.questions),
        show(stats.users),
        show(stats.completed)
    );
    Ok(exit_codes::OK)
}
