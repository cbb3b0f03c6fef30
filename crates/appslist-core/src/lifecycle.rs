//! Host service lifecycle

use std::fmt;

use async_trait::async_trait;
use tracing::info;

use crate::scheduler::Scheduler;

/// States reported to the host service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Initializing, the scheduler is not running yet
    StartPending,
    /// Scheduler running
    Running,
    /// Stop requested, tearing down
    StopPending,
    /// Fully stopped
    Stopped,
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartPending => "start pending",
            Self::Running => "running",
            Self::StopPending => "stop pending",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Adapter between the service and whatever hosts it
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Tell the host about a state change
    fn report_state(&self, state: ServiceState);

    /// Resolve once the host asks the service to stop
    async fn stop_requested(&self);
}

/// Run `scheduler` until `lifecycle` requests a stop
///
/// The timer task is aborted on stop; a run in progress is not awaited.
pub async fn run_service(lifecycle: &dyn Lifecycle, scheduler: Scheduler) {
    lifecycle.report_state(ServiceState::StartPending);
    info!(next_run = %scheduler.next_fire_time(), "appslist service starting");

    let timer = tokio::spawn(scheduler.run());
    lifecycle.report_state(ServiceState::Running);

    lifecycle.stop_requested().await;

    lifecycle.report_state(ServiceState::StopPending);
    timer.abort();
    info!("appslist service stopped");
    lifecycle.report_state(ServiceState::Stopped);
}
