use super::{create_store, exit_codes};
use crate::cli::args::InitArgs;
use sqlcheck_core::config::write_sample_catalog;

pub fn run(args: InitArgs) -> anyhow::Result<i32> {
    if args.config.exists() && !args.force {
        eprintln!(
            "refusing to overwrite {} (use --force)",
            args.config.display()
        );
        return Ok(exit_codes::CONFIG_ERROR);
    }
    write_sample_catalog(&args.config)?;
    create_store(&args.db)?;

    eprintln!("wrote file: {}", args.config.display());
    eprintln!("created store: {}", args.db.display());
    eprintln!(
        "next: sqlcheck import --config {}",
        args.config.display()
    );
    Ok(exit_codes::OK)
}
