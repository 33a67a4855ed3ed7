// Generation Client Port
// Abstraction over the remote video generation API: submit a long-running
// operation, poll it, download the resulting artifact.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub use crate::domain::OperationHandle;

/// Opaque reference to a downloadable artifact (a URI in practice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of polling an operation.
#[derive(Debug, Clone)]
pub struct OperationStatus {
    pub done: bool,
    /// Present once `done` is true and the operation produced output.
    pub artifact: Option<ArtifactRef>,
}

/// Remote file entry returned by `list_artifacts` (artifact sync).
#[derive(Debug, Clone)]
pub struct RemoteArtifact {
    /// Bare file id (the `<id>` of `files/<id>`)
    pub id: String,
    pub mime_type: String,
    pub artifact: ArtifactRef,
}

impl RemoteArtifact {
    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video/")
    }
}

/// Which generation model tier to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Preview,
    Fast,
}

/// Per-submission generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: ModelTier,
    pub aspect_ratio: String,
    pub negative_prompt: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: ModelTier::Preview,
            aspect_ratio: "16:9".to_string(),
            negative_prompt: None,
        }
    }
}

/// Generation API errors, pre-classified for scheduler policy.
///
/// The split matters: RateLimited pauses the queue / backs off the poller,
/// Rejected drops the item, Transport is retried on the next cycle.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Rate limited by remote service: {0}")]
    RateLimited(String),

    #[error("Request rejected by remote service: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Generation Client trait
///
/// Implementations:
/// - GenAiClient (infra-genai): REST client for the Generative Language API
/// - mocks::MockGenerationClient: scripted responses for tests
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Submit one generation request.
    async fn submit(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<OperationHandle, GenerationError>;

    /// Poll the status of a previously submitted operation.
    async fn poll(&self, handle: &OperationHandle) -> Result<OperationStatus, GenerationError>;

    /// Download an artifact to `dest`, streaming to disk.
    async fn download(&self, artifact: &ArtifactRef, dest: &Path) -> Result<(), GenerationError>;

    /// List all remote files (artifact sync).
    async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, GenerationError>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    type SubmitResult = Result<OperationHandle, GenerationError>;
    type PollResult = Result<OperationStatus, GenerationError>;

    /// Scripted generation client.
    ///
    /// Queued results are consumed in order; when a queue runs dry the
    /// client falls back to succeeding (submit returns a generated handle,
    /// poll reports done with an artifact). Download writes a small stub
    /// file so completion paths are observable on disk.
    #[derive(Default)]
    pub struct MockGenerationClient {
        submit_results: Mutex<VecDeque<SubmitResult>>,
        poll_results: Mutex<VecDeque<PollResult>>,
        artifacts: Mutex<Vec<RemoteArtifact>>,
        submitted_prompts: Mutex<Vec<String>>,
        downloads: Mutex<Vec<String>>,
        submit_seq: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl MockGenerationClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_submit_ok(&self, handle: impl Into<String>) {
            self.submit_results
                .lock()
                .unwrap()
                .push_back(Ok(OperationHandle::new(handle)));
        }

        pub fn push_submit_err(&self, err: GenerationError) {
            self.submit_results.lock().unwrap().push_back(Err(err));
        }

        pub fn push_poll_running(&self) {
            self.poll_results.lock().unwrap().push_back(Ok(OperationStatus {
                done: false,
                artifact: None,
            }));
        }

        pub fn push_poll_done(&self, artifact: impl Into<String>) {
            self.poll_results.lock().unwrap().push_back(Ok(OperationStatus {
                done: true,
                artifact: Some(ArtifactRef::new(artifact)),
            }));
        }

        pub fn push_poll_done_without_artifact(&self) {
            self.poll_results.lock().unwrap().push_back(Ok(OperationStatus {
                done: true,
                artifact: None,
            }));
        }

        pub fn push_poll_err(&self, err: GenerationError) {
            self.poll_results.lock().unwrap().push_back(Err(err));
        }

        pub fn set_artifacts(&self, artifacts: Vec<RemoteArtifact>) {
            *self.artifacts.lock().unwrap() = artifacts;
        }

        /// Prompts submitted so far, in submission order (FIFO assertions).
        pub fn submitted_prompts(&self) -> Vec<String> {
            self.submitted_prompts.lock().unwrap().clone()
        }

        pub fn submit_count(&self) -> usize {
            self.submitted_prompts.lock().unwrap().len()
        }

        /// Destination paths passed to `download`, in order.
        pub fn downloads(&self) -> Vec<String> {
            self.downloads.lock().unwrap().clone()
        }

        /// Highest number of concurrently in-flight submissions observed
        /// (single-flight assertions).
        pub fn max_in_flight(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerationClient for MockGenerationClient {
        async fn submit(
            &self,
            prompt: &str,
            _config: &GenerationConfig,
        ) -> Result<OperationHandle, GenerationError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            // Yield so overlapping callers would be observable
            tokio::task::yield_now().await;

            self.submitted_prompts
                .lock()
                .unwrap()
                .push(prompt.to_string());

            let result = self.submit_results.lock().unwrap().pop_front();
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match result {
                Some(r) => r,
                None => {
                    let n = self.submit_seq.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok(OperationHandle::new(format!("operations/mock-{}", n)))
                }
            }
        }

        async fn poll(
            &self,
            handle: &OperationHandle,
        ) -> Result<OperationStatus, GenerationError> {
            match self.poll_results.lock().unwrap().pop_front() {
                Some(r) => r,
                None => Ok(OperationStatus {
                    done: true,
                    artifact: Some(ArtifactRef::new(format!("{}/artifact", handle.as_str()))),
                }),
            }
        }

        async fn download(
            &self,
            _artifact: &ArtifactRef,
            dest: &Path,
        ) -> Result<(), GenerationError> {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GenerationError::Transport(e.to_string()))?;
            }
            std::fs::write(dest, b"stub video bytes")
                .map_err(|e| GenerationError::Transport(e.to_string()))?;
            self.downloads
                .lock()
                .unwrap()
                .push(dest.to_string_lossy().into_owned());
            Ok(())
        }

        async fn list_artifacts(&self) -> Result<Vec<RemoteArtifact>, GenerationError> {
            Ok(self.artifacts.lock().unwrap().clone())
        }
    }
}
