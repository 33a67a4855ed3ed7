//! Rate-limit behavior end to end: admission pause/resume around the quota
//! reset, and per-job poll backoff over the real SQLite store.

use std::sync::Arc;

use renderq_core::application::{
    AdmissionConfig, AdmissionQueue, CompletionPoller, PollerConfig, ResumeSchedule, Submitter,
};
use renderq_core::domain::{JobStatus, QueueEntry};
use renderq_core::port::generation_client::mocks::MockGenerationClient;
use renderq_core::port::id_provider::mocks::SequentialIdProvider;
use renderq_core::port::time_provider::mocks::MockTimeProvider;
use renderq_core::port::TimeProvider;
use renderq_core::port::{GenerationConfig, GenerationError, JobRepository};
use renderq_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

struct System {
    queue: Arc<AdmissionQueue>,
    poller: Arc<CompletionPoller>,
    repo: Arc<SqliteJobRepository>,
    client: Arc<MockGenerationClient>,
    clock: Arc<MockTimeProvider>,
    _dir: tempfile::TempDir,
}

async fn system() -> System {
    // File-backed store: in-memory SQLite would hand each pooled
    // connection its own database under concurrent fan-out
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("renderq.db");
    let pool = create_pool(db_path.to_str().unwrap()).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let repo = Arc::new(SqliteJobRepository::new(pool));

    let client = Arc::new(MockGenerationClient::new());
    // 2024-06-15 20:00:00 UTC (13:00 in Los Angeles)
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

#[tokio::test]
async fn rate_limited_submission_pauses_until_the_quota_reset() {
    let sys = system().await;
    sys.queue.enqueue(QueueEntry {
        id: "shot-1".to_string(),
        title: "Shot 1".to_string(),
        prompt: "prompt 1".to_string(),
    });
    sys.client
        .push_submit_err(GenerationError::RateLimited("quota exceeded".to_string()));

    let event_time = sys.clock.now_millis();
    sys.queue.tick().await;

    let status = sys.queue.status();
    assert!(status.is_paused);
    let paused_until = status.paused_until.unwrap();
    assert!(paused_until > event_time);
    // The pause reaches to the next calendar day, not just a fixed delay
    assert!(paused_until - event_time > 60 * 60 * 1000);
    assert_eq!(status.length, 1);
    assert_eq!(
        sys.repo
            .count_by_status(JobStatus::Pending)
            .await
            .unwrap(),
        0
    );

    // Ticks inside the pause window admit nothing
    sys.clock.advance(120_000);
    sys.queue.tick().await;
    assert_eq!(sys.client.submit_count(), 1);

    // Past the reset instant, the same entry is retried and succeeds
    sys.clock.set(paused_until + 1);
    sys.queue.tick().await;

    let status = sys.queue.status();
    assert!(!status.is_paused);
    assert_eq!(status.length, 0);
    assert_eq!(
        sys.repo
            .count_by_status(JobStatus::Pending)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn poll_backoff_defers_only_the_rate_limited_job() {
    let sys = system().await;

    // Two pending jobs via the admission path
    for n in 1..=2 {
        sys.queue.enqueue(QueueEntry {
            id: format!("shot-{}", n),
            title: format!("Shot {}", n),
            prompt: format!("prompt {}", n),
        });
        sys.queue.tick().await;
        sys.clock.advance(120_000);
    }
    assert_eq!(
        sys.repo
            .count_by_status(JobStatus::Pending)
            .await
            .unwrap(),
        2
    );

    // One of them hits the quota on this cycle
    sys.client
        .push_poll_err(GenerationError::RateLimited("quota".to_string()));
    sys.poller.run_cycle().await;

    assert_eq!(sys.repo.count_by_status(JobStatus::Done).await.unwrap(), 1);
    assert_eq!(
        sys.repo
            .count_by_status(JobStatus::Pending)
            .await
            .unwrap(),
        1
    );

    // An immediate follow-up cycle leaves the deferred job untouched
    let polls_before = sys.client.downloads().len();
    sys.poller.run_cycle().await;
    assert_eq!(sys.client.downloads().len(), polls_before);
    assert_eq!(
        sys.repo
            .count_by_status(JobStatus::Pending)
            .await
            .unwrap(),
        1
    );

    // After the 30s backoff the job completes
    sys.clock.advance(30_000);
    sys.poller.run_cycle().await;
    assert_eq!(sys.repo.count_by_status(JobStatus::Done).await.unwrap(), 2);
    assert_eq!(
        sys.repo
            .count_by_status(JobStatus::Pending)
            .await
            .unwrap(),
        0
    );
}
