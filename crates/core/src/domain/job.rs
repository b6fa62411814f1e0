// Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};

/// Job ID (UUID v4 when generated by the runner CLI, opaque otherwise)
pub type JobId = String;

/// Job status. Transitions only move forward: QUEUED -> PROCESSING -> terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Finished,
    Error,
}

impl JobStatus {
    /// FINISHED and ERROR accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Finished => write!(f, "FINISHED"),
            JobStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Job Record
///
/// Owned by the caller (usually an external job store). The runner borrows it
/// mutably for the duration of one execution and drives it to a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,

    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Present iff status is ERROR
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Present iff status is FINISHED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_ext: Option<String>,
}

impl JobRecord {
    /// Create a queued job record
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            started_at: None,
            finished_at: None,
            error: None,
            output_path: None,
            output_ext: None,
        }
    }

    /// Transition to PROCESSING with explicit timestamp
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != JobStatus::Queued {
            return Err(self.invalid_transition(JobStatus::Processing));
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition to FINISHED with explicit timestamp and produced output
    pub fn finish(
        &mut self,
        now: DateTime<Utc>,
        output_path: PathBuf,
        output_ext: impl Into<String>,
    ) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.invalid_transition(JobStatus::Finished));
        }
        self.status = JobStatus::Finished;
        self.finished_at = Some(now);
        self.output_path = Some(output_path);
        self.output_ext = Some(output_ext.into());
        Ok(())
    }

    /// Transition to ERROR with explicit timestamp.
    ///
    /// Allowed from QUEUED too: a job whose command cannot be built never
    /// reaches PROCESSING.
    pub fn fail(&mut self, now: DateTime<Utc>, message: impl Into<String>) -> Result<()> {
        if self.status.is_terminal() {
            return Err(self.invalid_transition(JobStatus::Error));
        }
        self.status = JobStatus::Error;
        self.finished_at = Some(now);
        self.error = Some(message.into());
        Ok(())
    }

    fn invalid_transition(&self, to: JobStatus) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
