//! JSON-RPC Server
//!
//! Serves the scheduler control surface over JSON-RPC 2.0 on localhost TCP
//! (no external access).

use crate::handler::RpcHandler;
use crate::types::{
    DeleteJobRequest, EnqueueRequest, ListJobsRequest, StatsRequest, StatusRequest, SyncRequest,
    ToggleRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use renderq_core::application::{AdmissionQueue, ArtifactSync, CompletionPoller};
use renderq_core::port::JobRepository;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9643;

/// RPC Server Configuration
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(
        config: RpcServerConfig,
        queue: Arc<AdmissionQueue>,
        poller: Arc<CompletionPoller>,
        job_repo: Arc<dyn JobRepository>,
        sync: Arc<ArtifactSync>,
    ) -> Self {
        Self {
            config,
            handler: Arc::new(RpcHandler::new(queue, poller, job_repo, sync)),
        }
    }

    /// Start the JSON-RPC server
    pub async fn start(self) -> Result<ServerHandle, String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server (localhost only)"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;

        let mut module = RpcModule::new(());

        // Queue methods
        let handler = self.handler.clone();
        module
            .register_async_method("queue.enqueue.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: EnqueueRequest = params.parse()?;
                    handler.enqueue(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatusRequest = params.parse().unwrap_or_default();
                    handler.queue_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.start.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ToggleRequest = params.parse().unwrap_or_default();
                    handler.queue_start(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("queue.stop.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ToggleRequest = params.parse().unwrap_or_default();
                    handler.queue_stop(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Poller methods
        let handler = self.handler.clone();
        module
            .register_async_method("poller.status.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatusRequest = params.parse().unwrap_or_default();
                    handler.poller_status(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("poller.start.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ToggleRequest = params.parse().unwrap_or_default();
                    handler.poller_start(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("poller.stop.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ToggleRequest = params.parse().unwrap_or_default();
                    handler.poller_stop(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Job methods
        let handler = self.handler.clone();
        module
            .register_async_method("jobs.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: ListJobsRequest = params.parse().unwrap_or_default();
                    handler.list_jobs(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.delete.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: DeleteJobRequest = params.parse()?;
                    handler.delete_job(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        let handler = self.handler.clone();
        module
            .register_async_method("jobs.sync.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SyncRequest = params.parse().unwrap_or_default();
                    handler.sync_jobs(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        // Admin methods
        let handler = self.handler.clone();
        module
            .register_async_method("admin.stats.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StatsRequest = params.parse().unwrap_or_default();
                    handler.stats(req).await
                }
            })
            .map_err(|e| e.to_string())?;

        info!("JSON-RPC server started");

        let handle = server.start(module);
        Ok(handle)
    }
}
