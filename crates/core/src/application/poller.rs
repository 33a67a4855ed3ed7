// Completion Poller - drives every PENDING job to completion
//
// A single consumer loop wakes for whichever comes first: the next full
// cycle or the earliest due backoff retry. Within a cycle, jobs advance as
// independent concurrent tasks so one slow or rate-limited job never
// delays the others.

use crate::application::backoff::BackoffTracker;
use crate::application::constants::{
    BACKOFF_BASE_DELAY_MS, MAX_BACKOFF_RETRIES, MAX_STATUS_POLLS, POLLER_CYCLE_INTERVAL,
    STATUS_POLL_DELAY,
};
use crate::application::control::{ActorSlot, StopToken};
use crate::domain::{Job, JobStatus, PollerStatus};
use crate::port::{GenerationClient, GenerationError, JobRepository, TimeProvider};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub struct PollerConfig {
    pub cycle_interval: Duration,
    pub poll_delay: Duration,
    pub max_status_polls: u32,
    pub backoff_base_delay_ms: i64,
    pub max_backoff_retries: u32,
    /// Downloaded artifacts land here, addressed by job id.
    pub video_dir: PathBuf,
}

impl PollerConfig {
    pub fn new(video_dir: impl Into<PathBuf>) -> Self {
        Self {
            cycle_interval: POLLER_CYCLE_INTERVAL,
            poll_delay: STATUS_POLL_DELAY,
            max_status_polls: MAX_STATUS_POLLS,
            backoff_base_delay_ms: BACKOFF_BASE_DELAY_MS,
            max_backoff_retries: MAX_BACKOFF_RETRIES,
            video_dir: video_dir.into(),
        }
    }
}

pub struct CompletionPoller {
    job_repo: Arc<dyn JobRepository>,
    client: Arc<dyn GenerationClient>,
    time_provider: Arc<dyn TimeProvider>,
    backoff: BackoffTracker,
    config: PollerConfig,
    slot: ActorSlot,
}

impl CompletionPoller {
    pub fn new(
        job_repo: Arc<dyn JobRepository>,
        client: Arc<dyn GenerationClient>,
        time_provider: Arc<dyn TimeProvider>,
        config: PollerConfig,
    ) -> Self {
        Self {
            job_repo,
            client,
            time_provider,
            backoff: BackoffTracker::new(config.backoff_base_delay_ms, config.max_backoff_retries),
            config,
            slot: ActorSlot::new(),
        }
    }

    pub fn status(&self) -> PollerStatus {
        PollerStatus {
            is_active: self.slot.is_active(),
        }
    }

    /// Arm the poll loop: one immediate cycle, then the fixed interval.
    /// No-op (returns false) when already active.
    pub fn start(self: Arc<Self>) -> bool {
        let poller = Arc::clone(&self);
        self.slot.start(move |token| {
            tokio::spawn(poller.run(token));
        })
    }

    /// Disarm future wakeups. Does not cancel a cycle already executing.
    pub fn stop(&self) -> bool {
        self.slot.stop()
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    async fn run(self: Arc<Self>, mut stop: StopToken) {
        info!(
            interval_secs = self.config.cycle_interval.as_secs(),
            "Completion poller started"
        );
        self.run_cycle().await;

        let cycle_ms = self.config.cycle_interval.as_millis() as i64;
        let mut next_cycle_at = self.time_provider.now_millis() + cycle_ms;
        loop {
            let now = self.time_provider.now_millis();
            // Wake for the next cycle or the earliest deferred retry,
            // whichever comes first
            let wake_at = match self.backoff.next_due_at() {
                Some(due) => due.min(next_cycle_at),
                None => next_cycle_at,
            };
            let sleep_for = Duration::from_millis((wake_at - now).max(0) as u64);

            tokio::select! {
                _ = sleep(sleep_for) => {
                    let now = self.time_provider.now_millis();
                    if now >= next_cycle_at {
                        self.run_cycle().await;
                        next_cycle_at = self.time_provider.now_millis() + cycle_ms;
                    } else {
                        self.run_due_retries(now).await;
                    }
                }
                _ = stop.wait() => break,
            }
        }
        info!("Completion poller stopped");
    }

    /// One full scan: advance every PENDING job whose backoff is due.
    pub async fn run_cycle(&self) {
        let pending = match self.job_repo.find_by_status(JobStatus::Pending).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to list pending jobs; skipping cycle");
                return;
            }
        };
        if pending.is_empty() {
            debug!("No pending jobs");
            return;
        }

        let now = self.time_provider.now_millis();
        let due: Vec<Job> = pending
            .into_iter()
            .filter(|job| self.backoff.is_due(&job.id, now))
            .collect();
        info!(count = due.len(), "Advancing pending jobs");
        self.advance_all(due).await;
    }

    /// Advance just the jobs whose deferred retry has come due.
    async fn run_due_retries(&self, now: i64) {
        let mut jobs = Vec::new();
        for id in self.backoff.due_jobs(now) {
            match self.job_repo.find_by_id(&id).await {
                Ok(Some(job)) if job.status == JobStatus::Pending => jobs.push(job),
                // Deleted or finished through another path: forget it
                Ok(_) => self.backoff.clear(&id),
                Err(e) => {
                    error!(job_id = %id, error = %e, "Failed to load job for deferred retry")
                }
            }
        }
        if !jobs.is_empty() {
            info!(count = jobs.len(), "Running deferred poll retries");
            self.advance_all(jobs).await;
        }
    }

    /// Fan the jobs out as independent concurrent futures. A panic in one
    /// job's advancement must not take down the cycle.
    async fn advance_all(&self, jobs: Vec<Job>) {
        let tasks = jobs.into_iter().map(|job| {
            let job_id = job.id.clone();
            self.backoff.begin_attempt(&job_id);
            async move {
                let result = AssertUnwindSafe(self.advance_job(job)).catch_unwind().await;
                (job_id, result)
            }
        });
        for (job_id, result) in join_all(tasks).await {
            if result.is_err() {
                error!(job_id = %job_id, "Job advancement panicked");
            }
        }
    }

    /// Advance one PENDING job as far as possible this attempt.
    pub async fn advance_job(&self, job: Job) {
        match self.drive_to_completion(&job).await {
            Ok(path) => {
                self.backoff.clear(&job.id);
                let path_str = path.to_string_lossy().into_owned();
                match self
                    .job_repo
                    .update_status(&job.id, JobStatus::Done, Some(&path_str))
                    .await
                {
                    Ok(()) => info!(job_id = %job.id, file = %path_str, "Job completed"),
                    Err(e) => {
                        error!(
                            job_id = %job.id,
                            error = %e,
                            "Failed to persist completion; job stays pending"
                        )
                    }
                }
            }
            Err(GenerationError::RateLimited(msg)) => {
                let now = self.time_provider.now_millis();
                match self.backoff.schedule(&job.id, now) {
                    Some(delay_ms) => warn!(
                        job_id = %job.id,
                        delay_ms,
                        message = %msg,
                        "Rate limited while polling; deferred retry scheduled"
                    ),
                    None => warn!(
                        job_id = %job.id,
                        message = %msg,
                        "Rate limited past the retry ceiling; next cycle retries"
                    ),
                }
            }
            Err(e) => {
                warn!(
                    job_id = %job.id,
                    error = %e,
                    "Poll failed; job stays pending for next cycle"
                )
            }
        }
    }

    /// Poll the operation until done, then download the artifact to a path
    /// addressed by the job id.
    async fn drive_to_completion(&self, job: &Job) -> Result<PathBuf, GenerationError> {
        let mut polls = 0u32;
        let status = loop {
            let status = self.client.poll(&job.operation).await?;
            if status.done {
                break status;
            }
            polls += 1;
            if polls >= self.config.max_status_polls {
                return Err(GenerationError::Transport(format!(
                    "operation {} still running after {} polls",
                    job.operation.as_str(),
                    polls
                )));
            }
            sleep(self.config.poll_delay).await;
        };

        let artifact = status.artifact.ok_or_else(|| {
            GenerationError::Transport("operation completed without an artifact".to_string())
        })?;

        let dest = self.config.video_dir.join(format!("{}.mp4", job.id));
        self.client.download(&artifact, &dest).await?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::generation_client::mocks::MockGenerationClient;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use crate::port::OperationHandle;

    struct Harness {
        poller: Arc<CompletionPoller>,
        client: Arc<MockGenerationClient>,
        repo: Arc<InMemoryJobRepository>,
        clock: Arc<MockTimeProvider>,
        _video_dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let client = Arc::new(MockGenerationClient::new());
        let repo = Arc::new(InMemoryJobRepository::new());
        let clock = Arc::new(MockTimeProvider::new(1_000_000));
        let video_dir = tempfile::tempdir().unwrap();

        let mut config = PollerConfig::new(video_dir.path());
        // Keep tests fast: no real waiting between status polls
        config.poll_delay = Duration::ZERO;
        config.max_status_polls = 10;

        let poller = Arc::new(CompletionPoller::new(
            repo.clone(),
            client.clone(),
            clock.clone(),
            config,
        ));
        Harness {
            poller,
            client,
            repo,
            clock,
            _video_dir: video_dir,
        }
    }

    async fn insert_pending(repo: &InMemoryJobRepository, id: &str) -> Job {
        let job = Job::new(
            id,
            1_000,
            Some(format!("{}-shot", id)),
            Some(format!("{} title", id)),
            OperationHandle::new(format!("operations/{}", id)),
        );
        repo.insert(&job).await.unwrap();
        job
    }

    #[tokio::test]
    async fn cycle_completes_a_pending_job_and_records_the_path() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;

        h.poller.run_cycle().await;

        let job = h.repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        let path = job.file_path.unwrap();
        assert!(path.ends_with("job-1.mp4"));
        assert!(std::path::Path::new(&path).exists());
    }

    #[tokio::test]
    async fn inner_loop_polls_until_done() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        h.client.push_poll_running();
        h.client.push_poll_running();
        h.client.push_poll_done("files/abc");

        h.poller.run_cycle().await;

        let job = h.repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn bounded_spin_leaves_job_pending() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        for _ in 0..=10 {
            h.client.push_poll_running();
        }

        h.poller.run_cycle().await;

        let job = h.repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        // Not a rate limit, so no backoff was engaged
        assert_eq!(h.poller.backoff.tracked(), 0);
    }

    #[tokio::test]
    async fn rate_limited_polls_schedule_growing_deferred_retries() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        let id = "job-1".to_string();

        h.client
            .push_poll_err(GenerationError::RateLimited("quota".to_string()));
        h.poller.run_cycle().await;

        // First retry due 30s out
        assert_eq!(h.poller.backoff.next_due_at(), Some(1_000_000 + 30_000));
        let pending = h.repo.find_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);

        // A cycle before the due time skips the job entirely
        h.client
            .push_poll_err(GenerationError::RateLimited("quota".to_string()));
        h.poller.run_cycle().await;
        assert_eq!(h.poller.backoff.next_due_at(), Some(1_000_000 + 30_000));

        // Once due, the retry runs; second failure doubles the delay
        h.clock.advance(30_000);
        h.poller.run_cycle().await;
        assert_eq!(
            h.poller.backoff.next_due_at(),
            Some(1_000_000 + 30_000 + 60_000)
        );

        // Third attempt succeeds and clears the ladder
        h.clock.advance(60_000);
        h.poller.run_cycle().await;

        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.file_path.is_some());
        assert_eq!(h.poller.backoff.tracked(), 0);
    }

    #[tokio::test]
    async fn rate_limit_on_one_job_does_not_delay_others() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        insert_pending(&h.repo, "job-2").await;

        // Whichever job polls first hits the quota; the other sails through
        h.client
            .push_poll_err(GenerationError::RateLimited("quota".to_string()));

        h.poller.run_cycle().await;

        let done = h.repo.find_by_status(JobStatus::Done).await.unwrap();
        let pending = h.repo.find_by_status(JobStatus::Pending).await.unwrap();
        assert_eq!(done.len() + pending.len(), 2);
        assert_eq!(pending.len(), 1);
        assert_eq!(h.poller.backoff.tracked(), 1);
    }

    #[tokio::test]
    async fn transient_error_leaves_job_pending_without_backoff() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        h.client
            .push_poll_err(GenerationError::Transport("connection reset".to_string()));

        h.poller.run_cycle().await;

        let job = h.repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(h.poller.backoff.tracked(), 0);

        // Next cycle retries and completes
        h.poller.run_cycle().await;
        let job = h.repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn missing_artifact_is_transient() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        h.client.push_poll_done_without_artifact();

        h.poller.run_cycle().await;

        let job = h.repo.find_by_id(&"job-1".to_string()).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn ceiling_exhausted_job_still_retries_at_cycle_cadence() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        let id = "job-1".to_string();

        // Burn through the 5 scheduled retries
        for _ in 0..5 {
            h.client
                .push_poll_err(GenerationError::RateLimited("quota".to_string()));
            if let Some(due) = h.poller.backoff.next_due_at() {
                h.clock.set(due);
            }
            h.poller.run_cycle().await;
        }
        // Ceiling reached: always due, no private timer left
        h.client
            .push_poll_err(GenerationError::RateLimited("quota".to_string()));
        if let Some(due) = h.poller.backoff.next_due_at() {
            h.clock.set(due);
        }
        h.poller.run_cycle().await;
        assert_eq!(h.poller.backoff.next_due_at(), None);
        assert!(h.poller.backoff.is_due(&id, h.clock.now_millis()));

        // Eventually the quota clears and a plain cycle finishes the job
        h.poller.run_cycle().await;
        let job = h.repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
    }

    #[tokio::test]
    async fn due_retries_skip_jobs_deleted_in_the_meantime() {
        let h = harness();
        insert_pending(&h.repo, "job-1").await;
        h.client
            .push_poll_err(GenerationError::RateLimited("quota".to_string()));
        h.poller.run_cycle().await;
        assert_eq!(h.poller.backoff.tracked(), 1);

        h.repo.delete(&"job-1".to_string()).await.unwrap();
        let due = h.poller.backoff.next_due_at().unwrap();
        h.clock.set(due);
        h.poller.run_due_retries(due).await;

        assert_eq!(h.poller.backoff.tracked(), 0);
        assert_eq!(h.client.downloads().len(), 0);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let h = harness();
        assert!(h.poller.clone().start());
        assert!(h.poller.status().is_active);
        assert!(!h.poller.clone().start());

        assert!(h.poller.stop());
        assert!(!h.poller.status().is_active);
        assert!(!h.poller.stop());
    }
}
