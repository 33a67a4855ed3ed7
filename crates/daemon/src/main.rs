//! RenderQ Daemon - Main Entry Point
//!
//! Composition root: wires the SQLite job store, the generation API client,
//! the admission queue, the completion poller, and the JSON-RPC control
//! surface, then runs until ctrl-c.

mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use renderq_api_rpc::{RpcServer, RpcServerConfig};
use renderq_core::application::{
    AdmissionConfig, AdmissionQueue, ArtifactSync, CompletionPoller, PollerConfig, ResumeSchedule,
    Submitter,
};
use renderq_core::port::id_provider::UuidProvider;
use renderq_core::port::time_provider::SystemTimeProvider;
use renderq_core::port::{GenerationConfig, ModelTier};
use renderq_infra_genai::GenAiClient;
use renderq_infra_sqlite::{create_pool, run_migrations, SqliteJobRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.renderq/renderq.db";
const DEFAULT_VIDEO_DIR: &str = "~/.renderq/videos";

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("RENDERQ_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("RenderQ daemon v{} starting...", VERSION);

    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let db_path = std::env::var("RENDERQ_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    let rpc_port: u16 = std::env::var("RENDERQ_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9643);

    let api_key = std::env::var("RENDERQ_GENAI_API_KEY")
        .map_err(|_| anyhow::anyhow!("RENDERQ_GENAI_API_KEY env var is required"))?;

    let video_dir = std::env::var("RENDERQ_VIDEO_DIR")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_VIDEO_DIR).into_owned());
    std::fs::create_dir_all(&video_dir)?;

    let generation = GenerationConfig {
        model: match std::env::var("RENDERQ_MODEL").as_deref() {
            Ok("fast") => ModelTier::Fast,
            _ => ModelTier::Preview,
        },
        aspect_ratio: std::env::var("RENDERQ_ASPECT_RATIO").unwrap_or_else(|_| "16:9".to_string()),
        negative_prompt: std::env::var("RENDERQ_NEGATIVE_PROMPT").ok(),
    };

    let resume_schedule = resume_schedule_from_env()?;

    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let job_repo = Arc::new(SqliteJobRepository::new(pool.clone()));
    let client = Arc::new(GenAiClient::new(api_key));

    let submitter = Submitter::new(
        client.clone(),
        job_repo.clone(),
        id_provider,
        time_provider.clone(),
        generation,
    );

    let queue = Arc::new(AdmissionQueue::new(
        submitter,
        time_provider.clone(),
        resume_schedule,
        AdmissionConfig::default(),
    ));

    let poller = Arc::new(CompletionPoller::new(
        job_repo.clone(),
        client.clone(),
        time_provider.clone(),
        PollerConfig::new(&video_dir),
    ));

    let sync = Arc::new(ArtifactSync::new(client, time_provider, &video_dir));

    // 5. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(
        rpc_config,
        queue.clone(),
        poller.clone(),
        job_repo,
        sync,
    );
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 6. Start the scheduler actors
    info!("Starting admission queue and completion poller...");
    queue.clone().start();
    poller.clone().start();

    info!("System ready. Waiting for shots...");
    info!("Press Ctrl+C to shutdown");

    // 7. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 8. Graceful shutdown
    queue.stop();
    poller.stop();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;

    info!("Shutdown complete.");

    Ok(())
}

/// Quota reset schedule, overridable for deployments pinned to a different
/// reset window than the default (midnight America/Los_Angeles).
fn resume_schedule_from_env() -> Result<ResumeSchedule> {
    let tz_var = std::env::var("RENDERQ_RESET_TZ").ok();
    let hour_var = std::env::var("RENDERQ_RESET_HOUR").ok();
    let minute_var = std::env::var("RENDERQ_RESET_MINUTE").ok();

    if tz_var.is_none() && hour_var.is_none() && minute_var.is_none() {
        return Ok(ResumeSchedule::quota_reset());
    }

    let tz: chrono_tz::Tz = tz_var
        .as_deref()
        .unwrap_or("America/Los_Angeles")
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid RENDERQ_RESET_TZ: {}", e))?;
    let hour: u32 = hour_var
        .as_deref()
        .unwrap_or("0")
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid RENDERQ_RESET_HOUR"))?;
    let minute: u32 = minute_var
        .as_deref()
        .unwrap_or("0")
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid RENDERQ_RESET_MINUTE"))?;

    ResumeSchedule::new(tz, hour, minute)
        .map_err(|e| anyhow::anyhow!("Invalid quota reset schedule: {}", e))
}
