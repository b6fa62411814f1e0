// Process launcher implementation
// reason: tokio for async process management, nix for graceful termination
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use autoedit_core::port::{
    ExecutionError, LaunchRequest, LaunchedProcess, ProcessHandle, ProcessLauncher,
};

/// SIGTERM-to-SIGKILL grace period (5 seconds)
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(5);

/// Tokio process launcher
///
/// Spawns the executable directly with the argument vector. No shell is
/// involved, so substituted paths can never be interpreted as shell syntax.
pub struct TokioProcessLauncher {
    executable_overrides: HashMap<String, PathBuf>,
    kill_grace: Duration,
}

impl TokioProcessLauncher {
    pub fn new() -> Self {
        Self {
            executable_overrides: HashMap::new(),
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Run `path` whenever a command's program is `name`
    ///
    /// # Example
    /// ```ignore
    /// let launcher = TokioProcessLauncher::new()
    ///     .with_executable("auto-editor", "/opt/venv/bin/auto-editor");
    /// ```
    pub fn with_executable(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.executable_overrides.insert(name.into(), path.into());
        self
    }

    /// How long a SIGTERM'd process may take to exit before SIGKILL
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    fn resolve<'a>(&'a self, program: &'a str) -> &'a Path {
        self.executable_overrides
            .get(program)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(program))
    }
}

impl Default for TokioProcessLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessLauncher for TokioProcessLauncher {
    fn launch(&self, request: LaunchRequest<'_>) -> Result<LaunchedProcess, ExecutionError> {
        let program = self.resolve(request.program);

        let mut child = Command::new(program)
            .args(request.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecutionError::SpawnFailed(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecutionError::SpawnFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecutionError::SpawnFailed("stderr was not captured".to_string()))?;

        info!(
            pid = ?child.id(),
            program = %program.display(),
            "Spawned child process"
        );

        Ok(LaunchedProcess {
            stdout: Box::new(stdout),
            stderr: Box::new(stderr),
            handle: Box::new(TokioProcessHandle {
                child,
                kill_grace: self.kill_grace,
            }),
        })
    }
}

/// Handle over a tokio child process
struct TokioProcessHandle {
    child: Child,
    #[cfg_attr(not(unix), allow(dead_code))]
    kill_grace: Duration,
}

impl TokioProcessHandle {
    /// Kill process with SIGTERM first, then SIGKILL if needed
    async fn kill_graceful(&mut self) -> Result<(), ExecutionError> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                // Step 1: Send SIGTERM for graceful shutdown
                info!(pid = %pid, "Sending SIGTERM for graceful shutdown");
                match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    Ok(()) => {
                        // Step 2: Give it the grace period to exit and reap it
                        if let Ok(status) = tokio::time::timeout(self.kill_grace, self.child.wait()).await {
                            status.map_err(|e| ExecutionError::IoError(e.to_string()))?;
                            info!(pid = %pid, "Process exited gracefully after SIGTERM");
                            return Ok(());
                        }
                        warn!(pid = %pid, "Process did not exit after SIGTERM, sending SIGKILL");
                    }
                    Err(e) => {
                        warn!(pid = %pid, error = %e, "SIGTERM failed, sending SIGKILL");
                    }
                }
            }
        }

        // Step 3: force kill (also reaps the child)
        self.child
            .kill()
            .await
            .map_err(|e| ExecutionError::Killed(e.to_string()))
    }
}

#[async_trait]
impl ProcessHandle for TokioProcessHandle {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<Option<i32>, ExecutionError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ExecutionError::IoError(e.to_string()))?;
        Ok(status.code())
    }

    async fn kill(&mut self) -> Result<(), ExecutionError> {
        self.kill_graceful().await
    }
}
