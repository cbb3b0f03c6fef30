//! Network share mounting through `net use`

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use appslist_exec::{CommandExecutor, CommandSpec};

use crate::config::Configuration;
use crate::error::MountError;

/// A share connected for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedShare {
    mount_point: String,
    root: PathBuf,
}

impl MountedShare {
    /// Share mounted at `mount_point`; a bare drive letter (`Z:`) maps to its root (`Z:\`)
    pub fn new(mount_point: impl Into<String>) -> Self {
        let mount_point = mount_point.into();
        let root = if mount_point.ends_with(':') {
            PathBuf::from(format!("{mount_point}\\"))
        } else {
            PathBuf::from(&mount_point)
        };
        Self { mount_point, root }
    }

    /// Share backed by an arbitrary directory
    pub fn at(mount_point: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
            root: root.into(),
        }
    }

    /// Mount point as given to the mount command
    #[must_use]
    pub fn mount_point(&self) -> &str {
        &self.mount_point
    }

    /// Directory the report is written into
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// Connects and disconnects the target share
#[async_trait]
pub trait ShareMounter: Send + Sync {
    /// Connect the share, waiting for the connection to finish
    ///
    /// # Errors
    /// Returns `MountError` if the share could not be connected
    async fn mount(&self, config: &Configuration) -> Result<MountedShare, MountError>;

    /// Disconnect a share connected by [`ShareMounter::mount`]
    ///
    /// # Errors
    /// Returns `MountError` if the share could not be disconnected
    async fn unmount(&self, share: &MountedShare) -> Result<(), MountError>;
}

/// Mounter invoking `net use`
///
/// No timeout is applied: a hanging `net use` blocks the run until it exits.
pub struct NetUseMounter {
    executor: Arc<dyn CommandExecutor>,
    program: String,
}

impl NetUseMounter {
    /// Create a mounter running `net` from `PATH` through `executor`
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self::with_program(executor, "net")
    }

    /// Create a mounter running an explicit `net` binary
    pub fn with_program(executor: Arc<dyn CommandExecutor>, program: impl Into<String>) -> Self {
        Self {
            executor,
            program: program.into(),
        }
    }

    /// `net use <mount point> \\<share> /user:<name> <password>`
    fn mount_command(&self, config: &Configuration) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg("use")
            .arg(&config.mount_point)
            .arg(config.share_unc())
            .arg(format!("/user:{}", config.username))
            .secret_arg(&config.password)
            .discard_output()
    }

    /// `net use <mount point> /delete /y`
    fn unmount_command(&self, share: &MountedShare) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg("use")
            .arg(share.mount_point())
            .args(["/delete", "/y"])
            .discard_output()
    }
}

#[async_trait]
impl ShareMounter for NetUseMounter {
    #[instrument(skip(self, config), fields(share = %config.share_unc(), mount_point = %config.mount_point))]
    async fn mount(&self, config: &Configuration) -> Result<MountedShare, MountError> {
        let result = self.executor.run(&self.mount_command(config)).await?;

        if !result.success() {
            return Err(MountError::Failed {
                share: config.share_unc(),
                mount_point: config.mount_point.clone(),
                status: result.status,
            });
        }

        info!(duration = ?result.duration, "share connected");
        Ok(MountedShare::new(&config.mount_point))
    }

    #[instrument(skip(self, share), fields(mount_point = %share.mount_point()))]
    async fn unmount(&self, share: &MountedShare) -> Result<(), MountError> {
        let result = self.executor.run(&self.unmount_command(share)).await?;

        if !result.success() {
            return Err(MountError::Failed {
                share: share.mount_point().to_string(),
                mount_point: share.mount_point().to_string(),
                status: result.status,
            });
        }

        info!("share disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use appslist_exec::{CommandResult, ExecError};

    use super::*;

    /// Records every command and answers with a fixed exit status
    struct RecordingExecutor {
        status: i32,
        commands: Mutex<Vec<String>>,
        argv: Mutex<Vec<Vec<String>>>,
        captured: Mutex<Vec<bool>>,
    }

    impl RecordingExecutor {
        fn new(status: i32) -> Self {
            Self {
                status,
                commands: Mutex::new(Vec::new()),
                argv: Mutex::new(Vec::new()),
                captured: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandExecutor for RecordingExecutor {
        async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
            self.commands.lock().unwrap().push(cmd.to_string());
            self.captured.lock().unwrap().push(cmd.captures_output());
            self.argv
                .lock()
                .unwrap()
                .push(cmd.argv().map(ToString::to_string).collect());
            Ok(CommandResult {
                status: self.status,
                stdout: String::new(),
                stderr: String::new(),
                duration: Duration::from_millis(1),
            })
        }

        async fn run_with_timeout(
            &self,
            cmd: &CommandSpec,
            _timeout: Duration,
        ) -> Result<CommandResult, ExecError> {
            self.run(cmd).await
        }

        fn executor_type(&self) -> &'static str {
            "recording"
        }
    }

    struct UnlaunchableExecutor;

    #[async_trait]
    impl CommandExecutor for UnlaunchableExecutor {
        async fn run(&self, cmd: &CommandSpec) -> Result<CommandResult, ExecError> {
            Err(ExecError::SpawnError {
                program: cmd.program().to_string(),
                message: "not found".to_string(),
            })
        }

        async fn run_with_timeout(
            &self,
            cmd: &CommandSpec,
            _timeout: Duration,
        ) -> Result<CommandResult, ExecError> {
            self.run(cmd).await
        }

        fn executor_type(&self) -> &'static str {
            "unlaunchable"
        }
    }

    fn config() -> Configuration {
        Configuration::parse(
            r#"
BackupTime = 1
TargetShare = "nas\\apps"
Username = "svc"
Password = "s3cret"
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_mount_builds_net_use_command() {
        let executor = Arc::new(RecordingExecutor::new(0));
        let mounter = NetUseMounter::new(executor.clone());

        let share = mounter.mount(&config()).await.unwrap();

        assert_eq!(share.mount_point(), "Z:");
        assert_eq!(share.root(), std::path::Path::new("Z:\\"));
        assert_eq!(
            executor.argv.lock().unwrap()[0],
            vec!["use", "Z:", r"\\nas\apps", "/user:svc", "s3cret"]
        );
        assert!(!executor.commands.lock().unwrap()[0].contains("s3cret"));
        assert_eq!(*executor.captured.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn test_mount_non_zero_exit_fails() {
        let mounter = NetUseMounter::new(Arc::new(RecordingExecutor::new(2)));

        let result = mounter.mount(&config()).await;

        assert!(matches!(result, Err(MountError::Failed { status: 2, .. })));
    }

    #[tokio::test]
    async fn test_mount_launch_failure() {
        let mounter = NetUseMounter::new(Arc::new(UnlaunchableExecutor));

        let result = mounter.mount(&config()).await;

        assert!(matches!(result, Err(MountError::Launch(_))));
    }

    #[tokio::test]
    async fn test_unmount_command() {
        let executor = Arc::new(RecordingExecutor::new(0));
        let mounter = NetUseMounter::new(executor.clone());

        mounter.unmount(&MountedShare::new("Z:")).await.unwrap();

        assert_eq!(
            executor.commands.lock().unwrap()[0],
            "net use Z: /delete /y"
        );
    }
}
