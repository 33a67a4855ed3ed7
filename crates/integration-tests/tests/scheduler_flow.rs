//! End-to-end scheduler flow over the real SQLite store:
//! enqueue -> admission ticks -> pending rows -> poller cycle -> done rows.

use std::sync::Arc;

use renderq_core::application::{
    AdmissionConfig, AdmissionQueue, CompletionPoller, PollerConfig, ResumeSchedule, Submitter,
};
use renderq_core::domain::{JobStatus, QueueEntry};
use renderq_core::port::generation_client::mocks::MockGenerationClient;
use renderq_core::port::id_provider::mocks::SequentialIdProvider;
use renderq_core::port::job_repository::mocks::InMemoryJobRepository;
use renderq_core::port::time_provider::mocks::MockTimeProvider;
use renderq_core::port::{GenerationConfig, JobRepository};
use renderq_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

struct System {
    queue: Arc<AdmissionQueue>,
    poller: Arc<CompletionPoller>,
    repo: Arc<dyn JobRepository>,
    client: Arc<MockGenerationClient>,
    clock: Arc<MockTimeProvider>,
    _dir: tempfile::TempDir,
}

/// System over a file-backed SQLite store (in-memory SQLite gives each
/// pooled connection its own database, which breaks under the poller's
/// concurrent fan-out).
async fn sqlite_system() -> System {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("renderq.db");
    let pool = create_pool(db_path.to_str().unwrap()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    system(Arc::new(SqliteJobRepository::new(pool)), dir).await
}

async fn memory_system() -> System {
    system(
        Arc::new(InMemoryJobRepository::new()),
        tempfile::tempdir().unwrap(),
    )
    .await
}

async fn system(repo: Arc<dyn JobRepository>, dir: tempfile::TempDir) -> System {
    let client = Arc::new(MockGenerationClient::new());
    // 2024-06-15 20:00:00 UTC
    let clock = Arc::new(MockTimeProvider::new(1_718_481_600_000));

    let submitter = Submitter::new(
        client.clone(),
        repo.clone(),
        Arc::new(SequentialIdProvider::default()),
        clock.clone(),
        GenerationConfig::default(),
    );
    let queue = Arc::new(AdmissionQueue::new(
        submitter,
        clock.clone(),
        ResumeSchedule::quota_reset(),
        AdmissionConfig::default(),
    ));

    let mut poller_config = PollerConfig::new(dir.path().join("videos"));
    poller_config.poll_delay = std::time::Duration::ZERO;
    let poller = Arc::new(CompletionPoller::new(
        repo.clone(),
        client.clone(),
        clock.clone(),
        poller_config,
    ));

    System {
        queue,
        poller,
        repo,
        client,
        clock,
        _dir: dir,
    }
}

fn shot(n: usize) -> QueueEntry {
    QueueEntry {
        id: format!("shot-{}", n),
        title: format!("Shot {}", n),
        prompt: format!("prompt {}", n),
    }
}

#[tokio::test]
async fn shots_flow_from_queue_to_done_jobs() {
    let sys = sqlite_system().await;

    for n in 1..=3 {
        sys.queue.enqueue(shot(n));
    }

    // Each tick admits exactly one entry, in FIFO order
    for expected_remaining in (0..3).rev() {
        sys.queue.tick().await;
        sys.clock.advance(120_000);
        assert_eq!(sys.queue.status().length, expected_remaining);
    }
    assert_eq!(
        sys.client.submitted_prompts(),
        vec!["prompt 1", "prompt 2", "prompt 3"]
    );

    let pending = sys.repo.find_by_status(JobStatus::Pending).await.unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].shot_id.as_deref(), Some("shot-1"));
    assert_eq!(pending[2].shot_id.as_deref(), Some("shot-3"));

    // One poller cycle drives every job to completion
    sys.poller.run_cycle().await;

    let done = sys.repo.find_by_status(JobStatus::Done).await.unwrap();
    assert_eq!(done.len(), 3);
    for job in &done {
        let path = job.file_path.as_ref().unwrap();
        assert!(path.ends_with(&format!("{}.mp4", job.id)));
        assert!(std::path::Path::new(path).exists());
    }
    assert!(sys
        .repo
        .find_by_status(JobStatus::Pending)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn completed_jobs_survive_a_second_cycle_untouched() {
    let sys = sqlite_system().await;
    sys.queue.enqueue(shot(1));
    sys.queue.tick().await;
    sys.poller.run_cycle().await;

    let done = sys.repo.find_by_status(JobStatus::Done).await.unwrap();
    let first_path = done[0].file_path.clone();

    // Nothing pending: the next cycle is a no-op and DONE never regresses
    sys.poller.run_cycle().await;
    let done = sys.repo.find_by_status(JobStatus::Done).await.unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].file_path, first_path);
}

#[tokio::test]
async fn deleted_jobs_leave_the_store() {
    let sys = sqlite_system().await;
    sys.queue.enqueue(shot(1));
    sys.queue.tick().await;

    let pending = sys.repo.find_by_status(JobStatus::Pending).await.unwrap();
    let id = pending[0].id.clone();

    assert!(sys.repo.delete(&id).await.unwrap());
    assert!(sys.repo.find_by_id(&id).await.unwrap().is_none());
    assert!(!sys.repo.delete(&id).await.unwrap());
}

#[tokio::test]
async fn the_same_flow_holds_over_the_in_memory_store() {
    // The scheduler sees the same repository contract either way
    let sys = memory_system().await;
    sys.queue.enqueue(shot(1));
    sys.queue.tick().await;
    sys.poller.run_cycle().await;

    let done = sys.repo.find_by_status(JobStatus::Done).await.unwrap();
    assert_eq!(done.len(), 1);
}
