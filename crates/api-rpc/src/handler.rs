//! RPC Method Handlers
//!
//! Implements the business logic for each JSON-RPC method by delegating to
//! the scheduler's control surface.

use crate::error::to_rpc_error;
use crate::types::{
    DeleteJobRequest, DeleteJobResponse, EnqueueRequest, EnqueueResponse, JobSummary,
    ListJobsRequest, ListJobsResponse, PollerStatusResponse, QueueStatusResponse, StatsRequest,
    StatsResponse, StatusRequest, SyncRequest, ToggleRequest, ToggleResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use renderq_core::application::{AdmissionQueue, ArtifactSync, CompletionPoller, SyncSummary};
use renderq_core::domain::{JobStatus, QueueEntry};
use renderq_core::port::JobRepository;
use std::sync::Arc;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    queue: Arc<AdmissionQueue>,
    poller: Arc<CompletionPoller>,
    job_repo: Arc<dyn JobRepository>,
    sync: Arc<ArtifactSync>,
    start_time: std::time::Instant,
}

impl RpcHandler {
    pub fn new(
        queue: Arc<AdmissionQueue>,
        poller: Arc<CompletionPoller>,
        job_repo: Arc<dyn JobRepository>,
        sync: Arc<ArtifactSync>,
    ) -> Self {
        Self {
            queue,
            poller,
            job_repo,
            sync,
            start_time: std::time::Instant::now(),
        }
    }

    /// queue.enqueue.v1
    pub async fn enqueue(
        &self,
        params: EnqueueRequest,
    ) -> Result<EnqueueResponse, ErrorObjectOwned> {
        let queued = params
            .shots
            .into_iter()
            .map(|shot| {
                self.queue.enqueue(QueueEntry {
                    id: shot.id,
                    title: shot.title,
                    prompt: shot.prompt,
                })
            })
            .collect();

        Ok(EnqueueResponse { queued })
    }

    /// queue.status.v1
    pub async fn queue_status(
        &self,
        _params: StatusRequest,
    ) -> Result<QueueStatusResponse, ErrorObjectOwned> {
        Ok(QueueStatusResponse {
            status: self.queue.status(),
            is_active: self.queue.is_active(),
        })
    }

    /// queue.start.v1
    pub async fn queue_start(
        &self,
        _params: ToggleRequest,
    ) -> Result<ToggleResponse, ErrorObjectOwned> {
        let changed = self.queue.clone().start();
        Ok(ToggleResponse {
            changed,
            is_active: self.queue.is_active(),
        })
    }

    /// queue.stop.v1
    pub async fn queue_stop(
        &self,
        _params: ToggleRequest,
    ) -> Result<ToggleResponse, ErrorObjectOwned> {
        let changed = self.queue.stop();
        Ok(ToggleResponse {
            changed,
            is_active: self.queue.is_active(),
        })
    }

    /// poller.status.v1
    pub async fn poller_status(
        &self,
        _params: StatusRequest,
    ) -> Result<PollerStatusResponse, ErrorObjectOwned> {
        Ok(PollerStatusResponse {
            status: self.poller.status(),
        })
    }

    /// poller.start.v1
    pub async fn poller_start(
        &self,
        _params: ToggleRequest,
    ) -> Result<ToggleResponse, ErrorObjectOwned> {
        let changed = self.poller.clone().start();
        Ok(ToggleResponse {
            changed,
            is_active: self.poller.is_active(),
        })
    }

    /// poller.stop.v1
    pub async fn poller_stop(
        &self,
        _params: ToggleRequest,
    ) -> Result<ToggleResponse, ErrorObjectOwned> {
        let changed = self.poller.stop();
        Ok(ToggleResponse {
            changed,
            is_active: self.poller.is_active(),
        })
    }

    /// jobs.list.v1
    pub async fn list_jobs(
        &self,
        _params: ListJobsRequest,
    ) -> Result<ListJobsResponse, ErrorObjectOwned> {
        let jobs = self.job_repo.list_all().await.map_err(to_rpc_error)?;

        Ok(ListJobsResponse {
            jobs: jobs
                .into_iter()
                .map(|job| JobSummary {
                    id: job.id,
                    title: job.title,
                    status: job.status.to_string(),
                    file: job.file_path,
                    created_at: job.created_at,
                })
                .collect(),
        })
    }

    /// jobs.delete.v1
    pub async fn delete_job(
        &self,
        params: DeleteJobRequest,
    ) -> Result<DeleteJobResponse, ErrorObjectOwned> {
        let deleted = self
            .job_repo
            .delete(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        if !deleted {
            return Err(to_rpc_error(renderq_core::error::AppError::NotFound(
                format!("Job {} not found", params.job_id),
            )));
        }

        Ok(DeleteJobResponse {
            job_id: params.job_id,
            deleted,
        })
    }

    /// jobs.sync.v1
    pub async fn sync_jobs(&self, _params: SyncRequest) -> Result<SyncSummary, ErrorObjectOwned> {
        self.sync.run().await.map_err(to_rpc_error)
    }

    /// admin.stats.v1
    pub async fn stats(&self, _params: StatsRequest) -> Result<StatsResponse, ErrorObjectOwned> {
        let pending = self
            .job_repo
            .count_by_status(JobStatus::Pending)
            .await
            .map_err(to_rpc_error)?;
        let done = self
            .job_repo
            .count_by_status(JobStatus::Done)
            .await
            .map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: pending + done,
            pending_jobs: pending,
            done_jobs: done,
            queue: self.queue.status(),
            queue_active: self.queue.is_active(),
            poller_active: self.poller.is_active(),
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }
}
