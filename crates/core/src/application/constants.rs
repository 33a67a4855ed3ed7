// Scheduler constants (no magic values in the loops)

use std::time::Duration;

/// Gap between admission ticks: at most one submission is released per
/// tick, which is what keeps us under the remote rate limit.
pub const QUEUE_TICK_INTERVAL: Duration = Duration::from_secs(120);

/// Gap between completion poller cycles
pub const POLLER_CYCLE_INTERVAL: Duration = Duration::from_secs(150);

/// Delay between consecutive status polls while driving a single job
pub const STATUS_POLL_DELAY: Duration = Duration::from_secs(2);

/// Upper bound on status polls per advancement attempt (~5 minutes);
/// past it the job stays PENDING and the next cycle picks it up again
pub const MAX_STATUS_POLLS: u32 = 150;

/// First backoff delay after a rate-limited poll; doubles per retry
/// (30s, 60s, 120s, 240s, 480s)
pub const BACKOFF_BASE_DELAY_MS: i64 = 30_000;

/// Scheduled backoff retries per job before falling back to cycle cadence
pub const MAX_BACKOFF_RETRIES: u32 = 5;

/// Daily quota reset: wall-clock time in the reference timezone
pub const QUOTA_RESET_TZ: chrono_tz::Tz = chrono_tz::America::Los_Angeles;
pub const QUOTA_RESET_HOUR: u32 = 0;
pub const QUOTA_RESET_MINUTE: u32 = 0;
