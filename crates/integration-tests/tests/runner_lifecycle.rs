//! Runner lifecycle against real child processes
//!
//! `auto-editor` is mapped to /bin/sh, so each template carries its own
//! `-c '<script>'` and the placeholders land in $1 (input) and $3 (output).
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use autoedit_core::application::template::DEFAULT_TRUSTED_COMMAND;
use autoedit_core::application::{CommandTemplate, JobRunner, RunnerConfig};
use autoedit_core::domain::{JobRecord, JobStatus};
use autoedit_core::port::time_provider::SystemTimeProvider;
use autoedit_infra_system::TokioProcessLauncher;

fn sh_template(script: &str) -> CommandTemplate {
    let raw = format!(
        "auto-editor -c '{}' auto-editor {{input}} -o {{output}}",
        script
    );
    CommandTemplate::parse(&raw, DEFAULT_TRUSTED_COMMAND).unwrap()
}

fn runner(root: &Path, timeout: Duration, executable: &str) -> Arc<JobRunner> {
    let launcher = TokioProcessLauncher::new()
        .with_executable(DEFAULT_TRUSTED_COMMAND, executable)
        .with_kill_grace(Duration::from_millis(500));
    let config = RunnerConfig {
        workspace_root: root.to_path_buf(),
        timeout,
        ..Default::default()
    };
    Arc::new(JobRunner::new(
        config,
        Arc::new(launcher),
        Arc::new(SystemTimeProvider),
    ))
}

fn input_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"fake media bytes").unwrap();
    path
}

#[tokio::test]
async fn test_successful_run_produces_output() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("success-1");
    runner
        .run(
            &sh_template(r#"echo cutting silence; cp "$1" "$3""#),
            &input,
            "mp4",
            &mut job,
        )
        .await;

    assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
    let output = job.output_path.clone().unwrap();
    assert_eq!(
        output,
        root.path().join("autoeditor-job-success-1").join("output.mp4")
    );
    assert_eq!(std::fs::read(&output).unwrap(), b"fake media bytes");
    assert_eq!(job.output_ext.as_deref(), Some("mp4"));
    assert!(job.finished_at.unwrap() >= job.started_at.unwrap());
}

#[tokio::test]
async fn test_nonzero_exit_reports_code_and_stderr() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("exit-1");
    runner
        .run(
            &sh_template("echo unsupported codec >&2; exit 1"),
            &input,
            "mp4",
            &mut job,
        )
        .await;

    assert_eq!(job.status, JobStatus::Error);
    let error = job.error.unwrap();
    assert!(error.contains("exited with code 1"), "{}", error);
    assert!(error.contains("unsupported codec"), "{}", error);
    assert!(job.output_path.is_none());
}

#[tokio::test]
async fn test_zero_exit_without_output_file_fails() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("no-output-1");
    runner
        .run(&sh_template("exit 0"), &input, "mp4", &mut job)
        .await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().contains("exited with code 0"));
}

#[tokio::test]
async fn test_timeout_kills_process() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_millis(300), "/bin/sh");

    let start = Instant::now();
    let mut job = JobRecord::new("timeout-1");
    runner
        .run(&sh_template("exec sleep 30"), &input, "mp4", &mut job)
        .await;

    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error.as_deref(), Some("Timeout after 300 ms"));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn test_missing_executable_is_spawn_error() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(
        root.path(),
        Duration::from_secs(30),
        "/nonexistent/bin/auto-editor",
    );

    let mut job = JobRecord::new("spawn-1");
    runner
        .run(&sh_template("exit 0"), &input, "mp4", &mut job)
        .await;

    assert_eq!(job.status, JobStatus::Error);
    assert!(job.error.unwrap().starts_with("spawn error:"));
}

#[tokio::test]
async fn test_quoted_placeholders_keep_paths_with_spaces() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "my holiday clip.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");
    let template = CommandTemplate::parse(
        r#"auto-editor -c 'test -f "$1" && cp "$1" "$3"' auto-editor "{input}" -o "{output}""#,
        DEFAULT_TRUSTED_COMMAND,
    )
    .unwrap();

    let mut job = JobRecord::new("spaces-1");
    runner.run(&template, &input, "mkv", &mut job).await;

    assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
    assert!(job.output_path.unwrap().ends_with("output.mkv"));
}

#[tokio::test]
async fn test_substituted_paths_are_not_shell_interpreted() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "$(touch${IFS}pwned).mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("literal-1");
    runner
        .run(
            &sh_template(r#"printf "%s" "$1" > "$3""#),
            &input,
            "txt",
            &mut job,
        )
        .await;

    assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
    let written = std::fs::read_to_string(job.output_path.unwrap()).unwrap();
    assert_eq!(written, input.to_string_lossy());
    assert!(!root.path().join("pwned").exists());
    assert!(!root.path().join("autoeditor-job-literal-1").join("pwned").exists());
    assert!(!Path::new("pwned").exists());
}

#[tokio::test]
async fn test_relative_input_resolves_against_caller_dir() {
    let root = tempfile::tempdir().unwrap();
    let name = format!("relative-input-{}.mp4", std::process::id());
    std::fs::write(&name, b"relative media").unwrap();
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("relative-input-1");
    runner
        .run(&sh_template(r#"cp "$1" "$3""#), Path::new(&name), "mp4", &mut job)
        .await;
    std::fs::remove_file(&name).unwrap();

    assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
    assert_eq!(
        std::fs::read(job.output_path.unwrap()).unwrap(),
        b"relative media"
    );
}

#[tokio::test]
async fn test_relative_workspace_root_resolves_against_caller_dir() {
    let scratch = tempfile::tempdir().unwrap();
    let input = input_file(scratch.path(), "in.mp4");
    let root = PathBuf::from(format!("relative-root-{}", std::process::id()));
    let runner = runner(&root, Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("relative-root-1");
    runner
        .run(&sh_template(r#"cp "$1" "$3""#), &input, "mp4", &mut job)
        .await;

    let output = job.output_path.clone();
    let copied = output.as_ref().map(|p| std::fs::read(p).unwrap());
    std::fs::remove_dir_all(&root).unwrap();

    assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
    assert_eq!(
        output.unwrap(),
        root.join("autoeditor-job-relative-root-1").join("output.mp4")
    );
    assert_eq!(copied.unwrap(), b"fake media bytes");
}

#[tokio::test]
async fn test_concurrent_jobs_use_separate_workspaces() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let handles: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|id| {
            runner.spawn(
                sh_template(r#"sleep 0.1; cp "$1" "$3""#),
                input.clone(),
                "mp4".to_string(),
                JobRecord::new(format!("concurrent-{}", id)),
            )
        })
        .collect();

    let mut outputs = Vec::new();
    for handle in handles {
        let job = handle.await.unwrap();
        assert_eq!(job.status, JobStatus::Finished, "error: {:?}", job.error);
        outputs.push(job.output_path.unwrap());
    }

    outputs.sort();
    outputs.dedup();
    assert_eq!(outputs.len(), 3);
}

#[tokio::test]
async fn test_large_stderr_is_bounded_in_error() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("noisy-1");
    runner
        .run(
            &sh_template("i=0; while [ $i -lt 500 ]; do echo progress line $i >&2; i=$((i+1)); done; exit 4"),
            &input,
            "mp4",
            &mut job,
        )
        .await;

    let error = job.error.unwrap();
    let prefix = "auto-editor exited with code 4. stderr: ";
    assert!(error.starts_with(prefix), "{}", error);
    assert_eq!(error.chars().count(), prefix.len() + 1000);
    assert!(error.contains("progress line 0"));
}

#[tokio::test]
async fn test_job_record_serializes_for_job_store() {
    let root = tempfile::tempdir().unwrap();
    let input = input_file(root.path(), "in.mp4");
    let runner = runner(root.path(), Duration::from_secs(30), "/bin/sh");

    let mut job = JobRecord::new("json-1");
    runner
        .run(&sh_template(r#"cp "$1" "$3""#), &input, "mp4", &mut job)
        .await;

    let value = serde_json::to_value(&job).unwrap();
    assert_eq!(value["status"], "FINISHED");
    assert_eq!(value["outputExt"], "mp4");
    assert!(value["startedAt"].as_str().is_some());
    assert!(value["finishedAt"].as_str().is_some());
    assert!(value.get("error").is_none());
}
