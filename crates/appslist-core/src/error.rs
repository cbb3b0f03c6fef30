//! Core error types for appslist-core

use std::path::PathBuf;

use thiserror::Error;

use appslist_exec::ExecError;
use appslist_inventory::InventoryError;

/// Errors loading the service configuration; all of them are fatal at startup
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// A required setting is absent
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A setting is present but unusable
    #[error("malformed setting: {0}")]
    Malformed(String),

    /// The settings file could not be read
    #[error("failed to read {path}: {message}")]
    Read {
        /// Settings file
        path: PathBuf,
        /// Underlying I/O error
        message: String,
    },

    /// The settings file is not valid TOML
    #[error("failed to parse settings: {0}")]
    Parse(String),
}

/// Errors connecting the target share
#[derive(Error, Debug, Clone)]
pub enum MountError {
    /// The mount command could not be run
    #[error("failed to launch mount command: {0}")]
    Launch(#[from] ExecError),

    /// The mount command exited non-zero
    #[error("mounting {share} on {mount_point} failed with exit status {status}")]
    Failed {
        /// Target share
        share: String,
        /// Local mount point
        mount_point: String,
        /// Exit status
        status: i32,
    },
}

/// Errors persisting the rendered report
#[derive(Error, Debug, Clone)]
pub enum WriteError {
    /// I/O failure writing the report file
    #[error("failed to write report to {path}: {message}")]
    Io {
        /// Destination file
        path: PathBuf,
        /// Underlying I/O error
        message: String,
    },
}

/// Errors that abandon a single pipeline run
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    /// Share could not be mounted
    #[error(transparent)]
    Mount(#[from] MountError),

    /// Inventory enumeration failed at scope level
    #[error("inventory enumeration failed: {0}")]
    Inventory(#[from] InventoryError),

    /// Report could not be written
    #[error(transparent)]
    Write(#[from] WriteError),

    /// The run's worker task died
    #[error("pipeline worker failed: {0}")]
    Worker(String),
}
