//! The daily inventory run
//!
//! mount → catalog → enumerate → write → unmount

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{Dispatch, Span, dispatcher, info, instrument, warn};

use appslist_inventory::{
    CatalogSource, ConfigStore, Enumerator, ProductCatalog, UnavailableCatalog,
};

use crate::config::Configuration;
use crate::error::PipelineError;
use crate::mount::{MountedShare, ShareMounter};
use crate::report::{Report, write_report};
use crate::scheduler::{Clock, Job};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Report file written
    pub path: PathBuf,
    /// Sections in the report
    pub sections: usize,
    /// Entries in the report
    pub entries: usize,
}

/// Arguments for creating an inventory pipeline
pub struct InventoryPipelineArgs {
    /// Service configuration
    pub config: Arc<Configuration>,
    /// Connects the target share
    pub mounter: Arc<dyn ShareMounter>,
    /// Configuration store holding the uninstall registrations
    pub store: Arc<dyn ConfigStore>,
    /// Source of the install location fallback catalog
    pub catalog: Arc<dyn CatalogSource>,
    /// Clock stamping the report
    pub clock: Arc<dyn Clock>,
    /// Machine name shown in the report title
    pub machine_name: String,
}

/// Mounts the share, collects the inventory and writes the report
pub struct InventoryPipeline {
    config: Arc<Configuration>,
    mounter: Arc<dyn ShareMounter>,
    store: Arc<dyn ConfigStore>,
    catalog: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    machine_name: String,
}

impl InventoryPipeline {
    /// Create a pipeline from its collaborators
    pub fn new(args: InventoryPipelineArgs) -> Self {
        Self {
            config: args.config,
            mounter: args.mounter,
            store: args.store,
            catalog: args.catalog,
            clock: args.clock,
            machine_name: args.machine_name,
        }
    }

    async fn load_catalog(&self) -> Arc<dyn ProductCatalog> {
        match self.catalog.load().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "product catalog unavailable, install locations may be Unknown");
                Arc::new(UnavailableCatalog::new(e.to_string()))
            }
        }
    }

    async fn collect_and_write(&self, share: &MountedShare) -> Result<RunSummary, PipelineError> {
        let catalog = self.load_catalog().await;
        let store = Arc::clone(&self.store);
        let machine_name = self.machine_name.clone();
        let generated_at = self.clock.now();

        info!(destination = %share.root().display(), "creating inventory report");

        // Registry reads are blocking; keep the run's span and subscriber on the worker
        let span = Span::current();
        let dispatch = dispatcher::get_default(Dispatch::clone);
        let report = tokio::task::spawn_blocking(move || {
            dispatcher::with_default(&dispatch, || {
                span.in_scope(|| {
                    let enumerator = Enumerator::new(store.as_ref(), catalog.as_ref());
                    Report::collect(machine_name, generated_at, enumerator.entries())
                })
            })
        })
        .await
        .map_err(|e| PipelineError::Worker(e.to_string()))??;

        let path = write_report(&report, share.root()).await?;

        Ok(RunSummary {
            path,
            sections: report.sections().len(),
            entries: report.entry_count(),
        })
    }
}

#[async_trait]
impl Job for InventoryPipeline {
    #[instrument(skip(self), fields(machine = %self.machine_name))]
    async fn run(&self) -> Result<RunSummary, PipelineError> {
        info!("starting inventory run");
        info!(
            share = %self.config.share_unc(),
            mount_point = %self.config.mount_point,
            user = %self.config.username,
            "connecting target share"
        );

        let share = self.mounter.mount(&self.config).await?;
        let outcome = self.collect_and_write(&share).await;

        if let Err(e) = self.mounter.unmount(&share).await {
            warn!(error = %e, mount_point = %share.mount_point(), "failed to disconnect share");
        }

        let summary = outcome?;
        info!(
            path = %summary.path.display(),
            entries = summary.entries,
            "inventory run complete"
        );
        Ok(summary)
    }
}
