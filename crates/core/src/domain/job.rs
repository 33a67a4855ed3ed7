// Job Domain Model

use serde::{Deserialize, Serialize};

/// Job ID (UUID v4)
pub type JobId = String;

/// Opaque reference to a remote long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Job Status
///
/// Transitions are monotonic: PENDING -> DONE, never back. The repository
/// enforces the same rule with a conditional update so a stale writer
/// cannot regress a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Done,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Done => write!(f, "DONE"),
        }
    }
}

/// Job Entity
///
/// One row per remote generation operation. Created by the submitter after
/// a successful submission, advanced to DONE by the completion poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    /// Originating shot, if the job came through the admission queue.
    /// Nullable: synced or externally-created jobs have none.
    pub shot_id: Option<String>,
    pub title: Option<String>,
    /// Opaque reference to the remote long-running operation.
    pub operation: OperationHandle,
    pub status: JobStatus,
    pub created_at: i64, // epoch ms
    /// Local path of the downloaded artifact. Set iff status = DONE.
    pub file_path: Option<String>,
}

impl Job {
    /// Create a new PENDING job.
    ///
    /// `id` and `created_at` are injected (not generated) so tests stay
    /// deterministic; production code passes them through IdProvider and
    /// TimeProvider.
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        shot_id: Option<String>,
        title: Option<String>,
        operation: OperationHandle,
    ) -> Self {
        Self {
            id: id.into(),
            shot_id,
            title,
            operation,
            status: JobStatus::Pending,
            created_at,
            file_path: None,
        }
    }

    /// Transition to Done, recording the downloaded artifact path.
    pub fn complete(&mut self, file_path: impl Into<String>) -> crate::domain::error::Result<()> {
        if self.status != JobStatus::Pending {
            return Err(crate::domain::error::DomainError::InvalidStatusTransition {
                from: self.status.to_string(),
                to: "DONE".to_string(),
            });
        }
        self.status = JobStatus::Done;
        self.file_path = Some(file_path.into());
        Ok(())
    }
}

/// Receipt returned by the submitter after one successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub job_id: JobId,
    pub title: Option<String>,
}
