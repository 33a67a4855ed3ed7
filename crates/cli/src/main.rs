//! RenderQ CLI - Command-line interface for the RenderQ scheduler daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9643";

#[derive(Parser)]
#[command(name = "renderq")]
#[command(about = "RenderQ scheduler CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "RENDERQ_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Queue a shot for generation
    Submit {
        /// Shot title
        #[arg(short, long)]
        title: String,

        /// Generation prompt
        #[arg(short, long)]
        prompt: String,

        /// Shot id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
    },

    /// Show queue, poller, and job statistics
    Status,

    /// List all generation jobs
    Jobs,

    /// Delete a job
    Delete {
        /// Job ID
        job_id: String,
    },

    /// Download remotely generated videos missing locally
    Sync,

    /// Control the admission queue
    Queue {
        #[command(subcommand)]
        action: ToggleAction,
    },

    /// Control the completion poller
    Poller {
        #[command(subcommand)]
        action: ToggleAction,
    },
}

#[derive(Subcommand)]
enum ToggleAction {
    Start,
    Stop,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct JobDto {
    id: String,
    title: Option<String>,
    status: String,
    file: Option<String>,
    created_at: i64,
}

#[derive(Tabled)]
struct JobRow {
    id: String,
    title: String,
    status: String,
    file: String,
    created_at: i64,
}

impl From<JobDto> for JobRow {
    fn from(dto: JobDto) -> Self {
        Self {
            id: dto.id,
            title: dto.title.unwrap_or_else(|| "-".to_string()),
            status: dto.status,
            file: dto.file.unwrap_or_else(|| "-".to_string()),
            created_at: dto.created_at,
        }
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn fallback_shot_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("shot-{}", millis)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { title, prompt, id } => {
            let shot_id = id.unwrap_or_else(fallback_shot_id);
            let result = call_rpc(
                &cli.rpc_url,
                "queue.enqueue.v1",
                json!({
                    "shots": [{ "id": shot_id, "title": title, "prompt": prompt }]
                }),
            )
            .await?;

            let receipt = &result["queued"][0];
            println!(
                "{} queued at position {} (queue length {})",
                "OK".green().bold(),
                receipt["position"],
                receipt["queue_length"]
            );
        }

        Commands::Status => {
            let stats = call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await?;

            let queue = &stats["queue"];
            let paused = queue["is_paused"].as_bool().unwrap_or(false);
            let queue_state = if !stats["queue_active"].as_bool().unwrap_or(false) {
                "stopped".red().to_string()
            } else if paused {
                "paused".yellow().to_string()
            } else {
                "running".green().to_string()
            };
            let poller_state = if stats["poller_active"].as_bool().unwrap_or(false) {
                "running".green().to_string()
            } else {
                "stopped".red().to_string()
            };

            println!("{}", "RenderQ status".bold());
            println!(
                "  queue:  {} ({} waiting)",
                queue_state,
                queue["length"]
            );
            if paused {
                println!("  resumes at epoch ms {}", queue["paused_until"]);
            }
            println!("  poller: {}", poller_state);
            println!(
                "  jobs:   {} pending, {} done",
                stats["pending_jobs"], stats["done_jobs"]
            );
            println!("  uptime: {}s", stats["uptime_seconds"]);
        }

        Commands::Jobs => {
            let result = call_rpc(&cli.rpc_url, "jobs.list.v1", json!({})).await?;
            let jobs: Vec<JobDto> = serde_json::from_value(result["jobs"].clone())
                .context("Unexpected jobs.list.v1 response")?;

            if jobs.is_empty() {
                println!("No jobs");
            } else {
                let rows: Vec<JobRow> = jobs.into_iter().map(JobRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Delete { job_id } => {
            call_rpc(&cli.rpc_url, "jobs.delete.v1", json!({ "job_id": job_id })).await?;
            println!("{} job {} deleted", "OK".green().bold(), job_id);
        }

        Commands::Sync => {
            let summary = call_rpc(&cli.rpc_url, "jobs.sync.v1", json!({})).await?;
            println!(
                "{} {} remote video(s), {} already present, {} synced, {} failed",
                "OK".green().bold(),
                summary["remote_count"],
                summary["already_have"],
                summary["synced"],
                summary["errors"].as_array().map(|e| e.len()).unwrap_or(0)
            );
        }

        Commands::Queue { action } => {
            let method = match action {
                ToggleAction::Start => "queue.start.v1",
                ToggleAction::Stop => "queue.stop.v1",
            };
            let result = call_rpc(&cli.rpc_url, method, json!({})).await?;
            print_toggle("queue", &result);
        }

        Commands::Poller { action } => {
            let method = match action {
                ToggleAction::Start => "poller.start.v1",
                ToggleAction::Stop => "poller.stop.v1",
            };
            let result = call_rpc(&cli.rpc_url, method, json!({})).await?;
            print_toggle("poller", &result);
        }
    }

    Ok(())
}

fn print_toggle(actor: &str, result: &serde_json::Value) {
    let active = result["is_active"].as_bool().unwrap_or(false);
    let changed = result["changed"].as_bool().unwrap_or(false);
    let state = if active {
        "active".green().to_string()
    } else {
        "inactive".red().to_string()
    };
    if changed {
        println!("{} {} is now {}", "OK".green().bold(), actor, state);
    } else {
        println!("{} {} already {}", "OK".green().bold(), actor, state);
    }
}
