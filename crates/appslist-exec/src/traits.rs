//! Command executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::{CommandResult, CommandSpec};

/// Runs external programs to completion
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command and wait for it to exit, however long that takes
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError>;

    /// Run a command, killing it if it has not exited within `timeout`
    async fn run_with_timeout(
        &self,
        cmd: &CommandSpec,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Short identifier used in logs
    fn executor_type(&self) -> &'static str;
}
