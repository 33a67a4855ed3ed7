//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use renderq_core::domain::{EnqueueReceipt, PollerStatus, QueueStatus};
use serde::{Deserialize, Serialize};

/// queue.enqueue.v1 - Queue shots for generation
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub shots: Vec<ShotParam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShotParam {
    pub id: String,
    pub title: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnqueueResponse {
    pub queued: Vec<EnqueueReceipt>,
}

/// queue.status.v1 / poller.status.v1 - No parameters
#[derive(Debug, Default, Deserialize)]
pub struct StatusRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatusResponse {
    #[serde(flatten)]
    pub status: QueueStatus,
    pub is_active: bool,
}

/// queue.start.v1 / queue.stop.v1 / poller.start.v1 / poller.stop.v1
#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleResponse {
    /// Whether this call changed anything (false = already in that state)
    pub changed: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollerStatusResponse {
    #[serde(flatten)]
    pub status: PollerStatus,
}

/// jobs.list.v1
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: String,
    pub title: Option<String>,
    pub status: String,
    pub file: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobSummary>,
}

/// jobs.delete.v1
#[derive(Debug, Deserialize)]
pub struct DeleteJobRequest {
    pub job_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteJobResponse {
    pub job_id: String,
    pub deleted: bool,
}

/// jobs.sync.v1 - No parameters; response is the core SyncSummary
#[derive(Debug, Default, Deserialize)]
pub struct SyncRequest {}

/// admin.stats.v1
#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub pending_jobs: i64,
    pub done_jobs: i64,
    pub queue: QueueStatus,
    pub queue_active: bool,
    pub poller_active: bool,
    pub uptime_seconds: i64,
}
