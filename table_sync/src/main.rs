use anyhow::Context;
use clap::Parser;

use table_sync::utils::logging::init_logging;
use table_sync::{config, SyncClient};

/// Synchronize live MySQL tables with their definition files
#[derive(Debug, Parser)]
#[command(name = "table_sync", version, about)]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, default_value = "table_sync.toml")]
    config: String,

    /// Only synchronize this table; repeatable
    #[arg(short, long = "table")]
    tables: Vec<String>,

    /// Drop columns referenced by other tables and accept row-count mismatches
    #[arg(long)]
    force: bool,

    /// Log planned statements without applying them
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::load_from_file(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config))?;
    if !args.tables.is_empty() {
        config.sync.tables = args.tables;
    }
    config.sync.force |= args.force;
    config.sync.dry_run |= args.dry_run;

    init_logging(&config.logging, args.debug).context("initializing logging")?;

    let client = SyncClient::new(config).await.context("connecting to database")?;
    let summary = client.sync().await?;
    summary.log();

    if summary.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}
