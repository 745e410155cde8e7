use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sqlcheck",
    version,
    about = "Seed, run and judge SQL exercises"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write a sample catalog and create the store
    Init(InitArgs),
    /// Load a catalog into the store
    Import(ImportArgs),
    /// Dry-run every checker against its seed
    Validate(ValidateArgs),
    /// Run an ad-hoc query against a topic's dataset
    Run(RunArgs),
    /// Judge a submission for a user
    Check(CheckArgs),
    /// Print the accepted solutions of a question
    Solutions(SolutionsArgs),
    /// Show a user's completion record for a question
    Progress(ProgressArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "SQLCHECK_DB", default_value = ".sqlcheck/sqlcheck.db")]
    pub db: PathBuf,

    /// Catalog whose `settings` block configures the engine (settings saved by `import` otherwise)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InitArgs {
    #[arg(long, default_value = "sqlcheck.yaml")]
    pub config: PathBuf,

    #[arg(long, env = "SQLCHECK_DB", default_value = ".sqlcheck/sqlcheck.db")]
    pub db: PathBuf,

    /// Overwrite an existing catalog
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    #[arg(long, default_value = "sqlcheck.yaml")]
    pub config: PathBuf,

    #[arg(long, env = "SQLCHECK_DB", default_value = ".sqlcheck/sqlcheck.db")]
    pub db: PathBuf,

    /// Reject unknown catalog keys instead of warning
    #[arg(long)]
    pub strict: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    #[arg(long, default_value = "sqlcheck.yaml")]
    pub config: PathBuf,

    #[arg(long)]
    pub strict: bool,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub topic: String,

    #[arg(long)]
    pub sql: String,

    #[arg(long, default_value = "text")]
    pub format: String, // text|json
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub question: String,

    #[arg(long)]
    pub sql: String,

    #[arg(long, env = "SQLCHECK_USER")]
    pub user: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SolutionsArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub question: String,
}

#[derive(clap::Args, Debug, Clone)]
#[command(group(clap::ArgGroup::new("target").required(true).args(["question", "topic"])))]
pub struct ProgressArgs {
    #[arg(long, env = "SQLCHECK_DB", default_value = ".sqlcheck/sqlcheck.db")]
    pub db: PathBuf,

    #[arg(long, env = "SQLCHECK_USER")]
    pub user: String,

    #[arg(long)]
    pub question: Option<String>,

    /// Every active question of this topic, easiest first
    #[arg(long)]
    pub topic: Option<String>,
}
