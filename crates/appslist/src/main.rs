//! appslist agent
//!
//! Writes a daily list of installed applications to a network share

use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::{WrapErr, eyre};
use tracing::{error, info};

use appslist_core::{
    Configuration, InventoryPipeline, InventoryPipelineArgs, Job, NetUseMounter, Scheduler,
    SystemClock, run_service,
};
use appslist_exec::LocalExecutor;
use appslist_inventory::{PowerShellStore, WmiCatalogSource};

mod config;
mod lifecycle;
mod logging;

use lifecycle::ConsoleLifecycle;
use logging::LogLevel;

#[derive(Parser)]
#[command(name = "appslist")]
#[command(about = "Daily installed-software inventory agent", long_about = None)]
struct Cli {
    /// Settings file (defaults to $APPSLIST_CONFIG, then Settings.toml next to the executable)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Run the inventory once and exit
    #[arg(long)]
    once: bool,

    /// Log level, overridden by RUST_LOG
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.log_level, cli.json_logs)?;

    let path = config::resolve_path(cli.config)?;
    let settings = Configuration::load(&path)
        .wrap_err_with(|| format!("invalid settings in {}", path.display()))?;
    info!(path = %path.display(), settings = ?settings, "configuration loaded");

    let settings = Arc::new(settings);
    let executor = Arc::new(LocalExecutor::new());
    let clock = Arc::new(SystemClock);

    let pipeline = Arc::new(InventoryPipeline::new(InventoryPipelineArgs {
        config: Arc::clone(&settings),
        mounter: Arc::new(NetUseMounter::new(executor.clone())),
        store: Arc::new(PowerShellStore::new()),
        catalog: Arc::new(WmiCatalogSource::new(executor, settings.catalog_timeout)),
        clock: clock.clone(),
        machine_name: machine_name(),
    }));

    if cli.once {
        return match pipeline.run().await {
            Ok(summary) => {
                info!(path = %summary.path.display(), entries = summary.entries, "done");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, details = ?e, "inventory run failed");
                Err(eyre!(e))
            }
        };
    }

    let scheduler = Scheduler::arm(pipeline, clock, settings.scheduled_hour);
    run_service(&ConsoleLifecycle, scheduler).await;
    Ok(())
}

/// Host name shown in the report title
fn machine_name() -> String {
    ["COMPUTERNAME", "HOSTNAME"]
        .into_iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "unknown".to_string())
}
