//! Console host: Ctrl-C (and SIGTERM on Unix) stops the service

use async_trait::async_trait;
use tracing::{info, warn};

use appslist_core::{Lifecycle, ServiceState};

/// Lifecycle for a foreground console process
///
/// State changes go to the log; Ctrl-C (or SIGTERM on Unix) requests the stop.
pub struct ConsoleLifecycle;

#[async_trait]
impl Lifecycle for ConsoleLifecycle {
    fn report_state(&self, state: ServiceState) {
        info!(state = %state, "service state changed");
    }

    async fn stop_requested(&self) {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("received Ctrl+C"),
                        _ = term.recv() => info!("received SIGTERM"),
                    }
                    return;
                }
                Err(e) => warn!(error = %e, "cannot listen for SIGTERM"),
            }
        }

        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl+C, stopping");
            return;
        }
        info!("received Ctrl+C");
    }
}
