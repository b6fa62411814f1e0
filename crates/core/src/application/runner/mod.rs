// Job Runner - drives one auto-editor invocation to a terminal job state

mod capture;
pub mod constants;

pub use capture::CaptureBuffer;
use constants::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::application::template::{CommandTemplate, DEFAULT_TRUSTED_COMMAND};
use crate::application::text::truncate_chars;
use crate::application::tokenizer::tokenize;
use crate::application::workspace::JobWorkspace;
use crate::domain::{JobRecord, JobStatus};
use crate::port::{
    ExecutionError, LaunchRequest, LaunchedProcess, ProcessLauncher, TimeProvider,
};

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Command name templates must start with; also names the tool in errors
    pub trusted_command: String,
    /// Parent of every job workspace
    pub workspace_root: PathBuf,
    /// Hard bound on one run
    pub timeout: Duration,
    /// Retained bytes per captured stream
    pub max_captured_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            trusted_command: DEFAULT_TRUSTED_COMMAND.to_string(),
            workspace_root: std::env::temp_dir(),
            timeout: DEFAULT_TIMEOUT,
            max_captured_bytes: DEFAULT_MAX_CAPTURED_BYTES,
        }
    }
}

/// How a supervised process ended
#[derive(Debug)]
enum Outcome {
    Exited(Option<i32>),
    WaitFailed(ExecutionError),
    TimedOut,
}

/// Runs auto-editor jobs.
///
/// No concurrency limit is imposed; every call to [`JobRunner::run`] is an
/// independent job with its own workspace.
pub struct JobRunner {
    config: RunnerConfig,
    workspace: JobWorkspace,
    launcher: Arc<dyn ProcessLauncher>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobRunner {
    pub fn new(
        config: RunnerConfig,
        launcher: Arc<dyn ProcessLauncher>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let workspace = JobWorkspace::new(config.workspace_root.clone());
        Self {
            config,
            workspace,
            launcher,
            time_provider,
        }
    }

    /// Run on the tokio runtime, detached from the caller.
    ///
    /// The handle yields the record once it reached a terminal state.
    pub fn spawn(
        self: &Arc<Self>,
        template: CommandTemplate,
        input_path: PathBuf,
        output_ext: String,
        mut job: JobRecord,
    ) -> JoinHandle<JobRecord> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner
                .run(&template, &input_path, &output_ext, &mut job)
                .await;
            job
        })
    }

    /// Execute `template` against `input_path` and record the outcome in `job`.
    ///
    /// Never fails: every error is written into the job record. A job that is
    /// not QUEUED on entry is left untouched.
    pub async fn run(
        &self,
        template: &CommandTemplate,
        input_path: &Path,
        output_ext: &str,
        job: &mut JobRecord,
    ) {
        if job.status != JobStatus::Queued {
            error!(job_id = %job.id, status = %job.status, "run_auto_editor: job is not queued");
            return;
        }

        if !is_valid_output_ext(output_ext) {
            error!(job_id = %job.id, output_ext = %output_ext, "run_auto_editor: invalid output extension");
            self.fail_job(job, format!("invalid output extension: {}", output_ext));
            return;
        }

        let job_dir = match self.workspace.allocate(&job.id).await {
            Ok(dir) => dir,
            Err(e) => {
                error!(job_id = %job.id, error = %e, "run_auto_editor: workspace error");
                self.fail_job(job, format!("workspace error: {}", e));
                return;
            }
        };
        let output_file = JobWorkspace::output_file(&job_dir, output_ext);

        let command = template.render(
            &input_path.to_string_lossy(),
            &output_file.to_string_lossy(),
        );
        let args = tokenize(&command);

        let Some((program, program_args)) = args.split_first() else {
            error!(
                job_id = %job.id,
                partial_cmd = %truncate_chars(&command, COMMAND_SNIPPET_CHARS),
                "run_auto_editor: invalid empty command"
            );
            self.fail_job(job, "invalid empty command");
            return;
        };

        if let Err(e) = job.start(self.time_provider.now()) {
            error!(job_id = %job.id, error = %e, "run_auto_editor: cannot start job");
            return;
        }
        info!(
            job_id = %job.id,
            args = ?args,
            args_count = args.len(),
            "run_auto_editor: starting auto-editor"
        );

        let request = LaunchRequest {
            program,
            args: program_args,
        };
        let process = match self.launcher.launch(request) {
            Ok(process) => process,
            Err(e) => {
                error!(job_id = %job.id, err = %e, "run_auto_editor: spawn error");
                self.fail_job(job, format!("spawn error: {}", e));
                return;
            }
        };

        let (outcome, stderr) = self.supervise(&job.id, process).await;
        self.settle(job, outcome, &stderr, output_file, output_ext)
            .await;
    }

    /// Capture both streams, then wait for exit, all under one deadline.
    ///
    /// Whichever of exit and deadline completes first decides the outcome; the
    /// process is killed only when the deadline wins.
    async fn supervise(
        &self,
        job_id: &str,
        process: LaunchedProcess,
    ) -> (Outcome, CaptureBuffer) {
        let LaunchedProcess {
            mut stdout,
            mut stderr,
            mut handle,
        } = process;

        let mut stdout_capture = CaptureBuffer::new(self.config.max_captured_bytes);
        let mut stderr_capture = CaptureBuffer::new(self.config.max_captured_bytes);
        let mut stdout_chunk = vec![0u8; READ_BUFFER_SIZE];
        let mut stderr_chunk = vec![0u8; READ_BUFFER_SIZE];
        let mut stdout_open = true;
        let mut stderr_open = true;

        let deadline = sleep(self.config.timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                read = stdout.read(&mut stdout_chunk), if stdout_open => match read {
                    Ok(0) => stdout_open = false,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&stdout_chunk[..n]);
                        if text.chars().count() < STDOUT_LOG_CHUNK_LIMIT {
                            debug!(job_id = %job_id, data = %text, "auto-editor_stdout");
                        }
                        stdout_capture.push(&text);
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "auto-editor stdout read failed");
                        stdout_open = false;
                    }
                },
                read = stderr.read(&mut stderr_chunk), if stderr_open => match read {
                    Ok(0) => stderr_open = false,
                    Ok(n) => {
                        let text = String::from_utf8_lossy(&stderr_chunk[..n]);
                        debug!(
                            job_id = %job_id,
                            chunk = %truncate_chars(&text, STDERR_LOG_CHUNK_CHARS),
                            "auto-editor_stderr_chunk"
                        );
                        stderr_capture.push(&text);
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "auto-editor stderr read failed");
                        stderr_open = false;
                    }
                },
                status = handle.wait(), if !stdout_open && !stderr_open => break match status {
                    Ok(code) => Outcome::Exited(code),
                    Err(e) => Outcome::WaitFailed(e),
                },
                _ = &mut deadline => break Outcome::TimedOut,
            }
        };

        if let Outcome::TimedOut = outcome {
            warn!(job_id = %job_id, pid = ?handle.id(), "auto-editor timed out, killing");
            if let Err(e) = handle.kill().await {
                error!(job_id = %job_id, error = %e, "failed to kill timed out auto-editor");
            }
        }

        debug!(
            job_id = %job_id,
            stdout_bytes = stdout_capture.as_str().len(),
            stdout_dropped_bytes = stdout_capture.dropped_bytes(),
            stderr_dropped_bytes = stderr_capture.dropped_bytes(),
            "auto-editor streams closed"
        );

        (outcome, stderr_capture)
    }

    /// Apply the terminal transition for `outcome`
    async fn settle(
        &self,
        job: &mut JobRecord,
        outcome: Outcome,
        stderr: &CaptureBuffer,
        output_file: PathBuf,
        output_ext: &str,
    ) {
        match outcome {
            Outcome::TimedOut => {
                error!(job_id = %job.id, "run_auto_editor: timeout killed process");
                let message = format!("Timeout after {}", describe_duration(self.config.timeout));
                self.fail_job(job, message);
            }
            Outcome::WaitFailed(e) => {
                error!(job_id = %job.id, error = %e, "run_auto_editor: wait error");
                self.fail_job(job, format!("wait error: {}", e));
            }
            Outcome::Exited(code) => {
                let output_exists = tokio::fs::try_exists(&output_file)
                    .await
                    .unwrap_or(false);

                if code == Some(0) && output_exists {
                    info!(
                        job_id = %job.id,
                        output = %output_file.display(),
                        "run_auto_editor: finished successfully"
                    );
                    if let Err(e) = job.finish(self.time_provider.now(), output_file, output_ext) {
                        warn!(job_id = %job.id, error = %e, "run_auto_editor: job already terminal");
                    }
                    return;
                }

                let code = code.map_or_else(|| "none".to_string(), |c| c.to_string());
                let stderr_snippet = truncate_chars(stderr.as_str(), ERROR_STDERR_CHARS);
                error!(
                    job_id = %job.id,
                    exit_code = %code,
                    output_exists = output_exists,
                    stderr_snippet = %stderr_snippet,
                    "run_auto_editor: failed"
                );
                self.fail_job(
                    job,
                    format!(
                        "{} exited with code {}. stderr: {}",
                        self.config.trusted_command, code, stderr_snippet
                    ),
                );
            }
        }
    }

    fn fail_job(&self, job: &mut JobRecord, message: impl Into<String>) {
        if let Err(e) = job.fail(self.time_provider.now(), message) {
            warn!(job_id = %job.id, error = %e, "run_auto_editor: job already terminal");
        }
    }
}

/// Short ASCII alphanumeric token such as `mp4`
fn is_valid_output_ext(ext: &str) -> bool {
    !ext.is_empty()
        && ext.len() <= MAX_OUTPUT_EXT_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// "30 minutes", "45 seconds" or "250 ms"
fn describe_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if d.subsec_nanos() == 0 && secs > 0 && secs % 60 == 0 {
        format!("{} minutes", secs / 60)
    } else if d.subsec_nanos() == 0 && secs > 0 {
        format!("{} seconds", secs)
    } else {
        format!("{} ms", d.as_millis())
    }
}
