//! Error types for appslist-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running an external command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Process could not be started (missing binary, permissions)
    #[error("failed to spawn {program}: {message}")]
    SpawnError {
        /// Program that was being launched
        program: String,
        /// Underlying OS error
        message: String,
    },

    /// I/O error while waiting for the process
    #[error("I/O error: {0}")]
    IoError(String),

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },
}

impl ExecError {
    /// Check if the program itself could not be launched
    #[must_use]
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, ExecError::SpawnError { .. })
    }
}
