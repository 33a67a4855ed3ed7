// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Repository interface for Job persistence
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// List all jobs, newest first (for the control surface)
    async fn list_all(&self) -> Result<Vec<Job>>;

    /// Find all jobs with the given status, oldest first (poller scan)
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>>;

    /// Count jobs with the given status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Update a job's status and (optionally) its artifact path.
    ///
    /// Monotonic: implementations must refuse to move a DONE job back to
    /// PENDING. Errors with NotFound when the id is unknown and
    /// InvalidState when the transition is refused.
    async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        file_path: Option<&str>,
    ) -> Result<()>;

    /// Delete a job row. Returns true if a row was removed.
    async fn delete(&self, id: &JobId) -> Result<bool>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// In-memory repository for scheduler tests.
    ///
    /// Mirrors the SQLite implementation's semantics, including the
    /// monotonic update guard, so application tests exercise the same
    /// contract the daemon runs against.
    #[derive(Default)]
    pub struct InMemoryJobRepository {
        jobs: Mutex<Vec<Job>>,
        fail_inserts: Mutex<bool>,
    }

    impl InMemoryJobRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make subsequent inserts fail with a database error (simulates
        /// an unavailable store).
        pub fn fail_inserts(&self, fail: bool) {
            *self.fail_inserts.lock().unwrap() = fail;
        }

        pub fn len(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &Job) -> Result<()> {
            if *self.fail_inserts.lock().unwrap() {
                return Err(AppError::Database("store unavailable".to_string()));
            }
            self.jobs.lock().unwrap().push(job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .find(|j| &j.id == id)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<Job>> {
            let mut jobs = self.jobs.lock().unwrap().clone();
            jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(jobs)
        }

        async fn find_by_status(&self, status: JobStatus) -> Result<Vec<Job>> {
            let mut jobs: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.status == status)
                .cloned()
                .collect();
            jobs.sort_by_key(|j| j.created_at);
            Ok(jobs)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.status == status)
                .count() as i64)
        }

        async fn update_status(
            &self,
            id: &JobId,
            status: JobStatus,
            file_path: Option<&str>,
        ) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| &j.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

            if job.status == JobStatus::Done && status != JobStatus::Done {
                return Err(AppError::InvalidState(format!(
                    "Cannot update job {} from {} to {}",
                    id, job.status, status
                )));
            }

            job.status = status;
            if let Some(path) = file_path {
                job.file_path = Some(path.to_string());
            }
            Ok(())
        }

        async fn delete(&self, id: &JobId) -> Result<bool> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|j| &j.id != id);
            Ok(jobs.len() < before)
        }
    }
}
