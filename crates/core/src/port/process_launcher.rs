// Process Launcher Port
// Abstraction over spawning the external media tool so the runner's
// lifecycle handling can be exercised without real processes

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Captured child output stream (stdout or stderr)
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// What to launch: program and arguments.
/// Working directory and stdin are inherited from the parent; stdout/stderr
/// are piped, so relative paths in `args` resolve as they do for the caller.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub program: &'a str,
    pub args: &'a [String],
}

/// A started child process with its piped streams
pub struct LaunchedProcess {
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    pub handle: Box<dyn ProcessHandle>,
}

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Carries the native error message verbatim
    #[error("{0}")]
    SpawnFailed(String),

    #[error("Process kill failed: {0}")]
    Killed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Handle to a running child process
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id, if the process is still known to the OS
    fn id(&self) -> Option<u32>;

    /// Wait for exit. `None` means the process was terminated by a signal.
    ///
    /// Must be cancel safe: the runner races it against the timeout.
    async fn wait(&mut self) -> Result<Option<i32>, ExecutionError>;

    /// Terminate the process and reap it
    async fn kill(&mut self) -> Result<(), ExecutionError>;
}

/// Process Launcher trait
///
/// Implementations:
/// - TokioProcessLauncher (infra-system): spawns the executable directly, no shell
/// - mocks::ScriptedLauncher: replays a scripted outcome
pub trait ProcessLauncher: Send + Sync {
    /// Start the process
    ///
    /// # Errors
    /// - ExecutionError::SpawnFailed if the executable cannot be started
    fn launch(&self, request: LaunchRequest<'_>) -> Result<LaunchedProcess, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock process behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Emit output, then exit with the given code (None = killed by signal)
        Exit {
            code: Option<i32>,
            stdout: String,
            stderr: String,
            /// Create the file named by the last argument before exiting
            write_output: bool,
        },
        /// Close both streams but never exit until killed
        Hang,
        /// Fail to spawn with the given native message
        SpawnFail(String),
    }

    /// A recorded launch
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedLaunch {
        pub program: String,
        pub args: Vec<String>,
    }

    /// Scripted launcher for testing the runner state machine
    pub struct ScriptedLauncher {
        behavior: MockBehavior,
        launches: Arc<Mutex<Vec<RecordedLaunch>>>,
        kill_count: Arc<AtomicUsize>,
    }

    impl ScriptedLauncher {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                launches: Arc::new(Mutex::new(Vec::new())),
                kill_count: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Exit 0 after writing the output file
        pub fn new_success() -> Self {
            Self::new(MockBehavior::Exit {
                code: Some(0),
                stdout: "mock output".to_string(),
                stderr: String::new(),
                write_output: true,
            })
        }

        /// Exit with `code` and `stderr`, no output file
        pub fn new_exit(code: i32, stderr: impl Into<String>) -> Self {
            Self::new(MockBehavior::Exit {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.into(),
                write_output: false,
            })
        }

        pub fn new_hang() -> Self {
            Self::new(MockBehavior::Hang)
        }

        pub fn new_spawn_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::SpawnFail(message.into()))
        }

        pub fn launches(&self) -> Vec<RecordedLaunch> {
            self.launches.lock().unwrap().clone()
        }

        pub fn kill_count(&self) -> usize {
            self.kill_count.load(Ordering::SeqCst)
        }
    }

    impl ProcessLauncher for ScriptedLauncher {
        fn launch(&self, request: LaunchRequest<'_>) -> Result<LaunchedProcess, ExecutionError> {
            self.launches.lock().unwrap().push(RecordedLaunch {
                program: request.program.to_string(),
                args: request.args.to_vec(),
            });

            let (stdout, stderr) = match &self.behavior {
                MockBehavior::SpawnFail(msg) => return Err(ExecutionError::SpawnFailed(msg.clone())),
                MockBehavior::Exit { stdout, stderr, .. } => (stdout.clone(), stderr.clone()),
                MockBehavior::Hang => (String::new(), String::new()),
            };

            Ok(LaunchedProcess {
                stdout: Box::new(Cursor::new(stdout.into_bytes())),
                stderr: Box::new(Cursor::new(stderr.into_bytes())),
                handle: Box::new(ScriptedHandle {
                    behavior: self.behavior.clone(),
                    output_target: request.args.last().map(PathBuf::from),
                    killed: false,
                    kill_count: Arc::clone(&self.kill_count),
                }),
            })
        }
    }

    struct ScriptedHandle {
        behavior: MockBehavior,
        output_target: Option<PathBuf>,
        killed: bool,
        kill_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProcessHandle for ScriptedHandle {
        fn id(&self) -> Option<u32> {
            if self.killed {
                None
            } else {
                Some(4242)
            }
        }

        async fn wait(&mut self) -> Result<Option<i32>, ExecutionError> {
            if self.killed {
                return Ok(None);
            }
            match &self.behavior {
                MockBehavior::Exit {
                    code, write_output, ..
                } => {
                    if *write_output {
                        if let Some(target) = &self.output_target {
                            tokio::fs::write(target, b"mock media")
                                .await
                                .map_err(|e| ExecutionError::IoError(e.to_string()))?;
                        }
                    }
                    Ok(*code)
                }
                MockBehavior::Hang | MockBehavior::SpawnFail(_) => std::future::pending().await,
            }
        }

        async fn kill(&mut self) -> Result<(), ExecutionError> {
            self.kill_count.fetch_add(1, Ordering::SeqCst);
            self.killed = true;
            Ok(())
        }
    }
}
