// Generative Language REST client
//
// Implements the generation port over plain REST: submit a long-running
// video operation, poll it by name, stream artifact downloads, list remote
// files. HTTP failures are classified into the scheduler's error taxonomy
// here so the core never sees status codes.

use crate::types::{
    FileListPage, Instance, Operation, OperationError, Parameters, SubmitRequest,
};
use async_trait::async_trait;
use futures::StreamExt;
use renderq_core::port::{
    ArtifactRef, GenerationClient, GenerationConfig, GenerationError, ModelTier, OperationHandle,
    OperationStatus, RemoteArtifact,
};
use reqwest::{Client, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const MODEL_VEO_PREVIEW: &str = "veo-3.0-generate-preview";
const MODEL_VEO_FAST_PREVIEW: &str = "veo-3.0-fast-generate-preview";

const API_KEY_HEADER: &str = "x-goog-api-key";
const FILES_PAGE_SIZE: u32 = 100;

pub struct GenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl GenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn model_name(tier: ModelTier) -> &'static str {
        match tier {
            ModelTier::Preview => MODEL_VEO_PREVIEW,
            ModelTier::Fast => MODEL_VEO_FAST_PREVIEW,
        }
    }

    /// Classify an unsuccessful HTTP response.
    async fn classify(response: reqwest::Response) -> GenerationError {
        let status = response.status();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            GenerationError::RateLimited(message)
        } else if status.is_client_error() {
            GenerationError::Rejected(format!("status {}: {}", status.as_u16(), message))
        } else {
            GenerationError::Transport(format!("status {}: {}", status.as_u16(), message))
        }
    }

    /// Classify an error reported inside a finished operation.
    fn classify_operation_error(err: &OperationError) -> GenerationError {
        let message = err.message.clone().unwrap_or_else(|| "unknown".to_string());
        let exhausted = err.code == Some(429)
            || err.status.as_deref() == Some("RESOURCE_EXHAUSTED");
        if exhausted {
            GenerationError::RateLimited(message)
        } else {
            GenerationError::Transport(format!("operation failed: {}", message))
        }
    }
}

fn transport(err: reqwest::Error) -> GenerationError {
    GenerationError::Transport(err.to_string())
}

#[async_trait]
impl GenerationClient for GenAiClient {
    async fn submit(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<OperationHandle, GenerationError> {
        let model = Self::model_name(config.model);
        let url = format!("{}/models/{}:predictLongRunning", self.base_url, model);

        let body = SubmitRequest {
            instances: vec![Instance {
                prompt: prompt.to_string(),
            }],
            parameters: Parameters {
                aspect_ratio: config.aspect_ratio.clone(),
                enable_audio: false,
                negative_prompt: config.negative_prompt.clone(),
            },
        };

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        let operation: Operation = response.json().await.map_err(transport)?;
        info!(model, operation = %operation.name, "Generation request accepted");
        Ok(OperationHandle::new(operation.name))
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus, GenerationError> {
        let url = format!("{}/{}", self.base_url, handle.as_str());

        let response = self
            .http
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        let operation: Operation = response.json().await.map_err(transport)?;

        if let Some(err) = &operation.error {
            return Err(Self::classify_operation_error(err));
        }
        if !operation.done {
            debug!(operation = %operation.name, "Operation still running");
            return Ok(OperationStatus {
                done: false,
                artifact: None,
            });
        }

        let artifact = operation
            .response
            .as_ref()
            .and_then(|r| r.generated_videos.first())
            .and_then(|v| v.video.as_ref())
            .and_then(|v| v.uri.clone())
            .map(ArtifactRef::new);

        Ok(OperationStatus {
            done: true,
            artifact,
        })
    }

    async fn download(&self, artifact: &ArtifactRef, dest: &Path) -> Result<(), GenerationError> {
        let response = self
            .http
            .get(artifact.as_str())
            // File endpoints require the same auth as the submit call
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            return Err(Self::classify(response).await);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(transport)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        info!(dest = %dest.display(), "Artifact downloaded");
        Ok(())
    }

    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, GenerationError> {
        let mut artifacts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!("{}/files?pageSize={}", self.base_url, FILES_PAGE_SIZE);
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", token));
            }

            let response = self
                .http
                .get(&url)
                .header(API_KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(transport)?;

            if !response.status().is_success() {
                return Err(Self::classify(response).await);
            }

            let page: FileListPage = response.json().await.map_err(transport)?;
            for file in page.files {
                let id = file
                    .name
                    .split('/')
                    .nth(1)
                    .unwrap_or(file.name.as_str())
                    .to_string();
                let uri = format!("{}/{}:download?alt=media", self.base_url, file.name);
                artifacts.push(RemoteArtifact {
                    id,
                    mime_type: file.mime_type.unwrap_or_default(),
                    artifact: ArtifactRef::new(uri),
                });
            }

            page_token = page.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(artifacts)
    }
}
