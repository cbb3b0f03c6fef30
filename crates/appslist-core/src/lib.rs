//! appslist-core: scheduling and the daily inventory pipeline
//!
//! Loads the service configuration, mounts the target share, renders the
//! inventory report and re-arms the daily timer whatever the outcome.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mount;
pub mod pipeline;
pub mod report;
pub mod scheduler;

pub use config::Configuration;
pub use error::{ConfigError, MountError, PipelineError, WriteError};
pub use lifecycle::{Lifecycle, ServiceState, run_service};
pub use mount::{MountedShare, NetUseMounter, ShareMounter};
pub use pipeline::{InventoryPipeline, InventoryPipelineArgs, RunSummary};
pub use report::{Report, Section, write_report};
pub use scheduler::{Clock, Job, ScheduleState, Scheduler, SystemClock};
