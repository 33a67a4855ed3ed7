// Artifact sync - recover remotely generated videos missing locally
//
// Lists every file still held by the remote service, filters for video
// mime types, and downloads whatever this run's directory does not already
// contain. Each run gets its own timestamped directory so filenames from
// different runs cannot collide.

use crate::error::Result;
use crate::port::{GenerationClient, TimeProvider};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub remote_count: usize,
    pub already_have: usize,
    pub synced: usize,
    pub errors: Vec<SyncFailure>,
}

pub struct ArtifactSync {
    client: Arc<dyn GenerationClient>,
    time_provider: Arc<dyn TimeProvider>,
    video_dir: PathBuf,
}

impl ArtifactSync {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        time_provider: Arc<dyn TimeProvider>,
        video_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            time_provider,
            video_dir: video_dir.into(),
        }
    }

    /// Download every remote video not present in this run's sync
    /// directory. Per-file failures are collected in the summary, never
    /// fatal for the run.
    pub async fn run(&self) -> Result<SyncSummary> {
        let remote: Vec<_> = self
            .client
            .list_artifacts()
            .await?
            .into_iter()
            .filter(|a| a.is_video())
            .collect();

        let stamp = chrono::DateTime::from_timestamp_millis(self.time_provider.now_millis())
            .map(|dt| dt.format("%Y%m%d_%H%M%S").to_string())
            .unwrap_or_else(|| "epoch".to_string());
        let sync_dir = self.video_dir.join(format!("sync_{}", stamp));
        tokio::fs::create_dir_all(&sync_dir).await?;

        let mut existing = Vec::new();
        let mut dir = tokio::fs::read_dir(&sync_dir).await?;
        while let Some(dirent) = dir.next_entry().await? {
            existing.push(dirent.file_name().to_string_lossy().into_owned());
        }

        let mut synced = 0;
        let mut errors = Vec::new();
        for artifact in &remote {
            let ext = if artifact.mime_type == "video/mp4" {
                ".mp4"
            } else {
                ".bin"
            };
            let file_name = format!("{}{}", artifact.id, ext);
            if existing.contains(&file_name) {
                continue;
            }

            let dest = sync_dir.join(&file_name);
            match self.client.download(&artifact.artifact, &dest).await {
                Ok(()) => {
                    synced += 1;
                    info!(file = %file_name, "Synced remote video");
                }
                Err(e) => {
                    error!(file = %file_name, error = %e, "Sync download failed");
                    errors.push(SyncFailure {
                        id: artifact.id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            remote = remote.len(),
            already_have = existing.len(),
            synced,
            failed = errors.len(),
            "Artifact sync finished"
        );

        Ok(SyncSummary {
            remote_count: remote.len(),
            already_have: existing.len(),
            synced,
            errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::generation_client::mocks::MockGenerationClient;
    use crate::port::time_provider::mocks::MockTimeProvider;
    use crate::port::{ArtifactRef, RemoteArtifact};

    fn remote(id: &str, mime: &str) -> RemoteArtifact {
        RemoteArtifact {
            id: id.to_string(),
            mime_type: mime.to_string(),
            artifact: ArtifactRef::new(format!("files/{}:download", id)),
        }
    }

    #[tokio::test]
    async fn downloads_missing_videos_and_skips_non_video_files() {
        let client = Arc::new(MockGenerationClient::new());
        client.set_artifacts(vec![
            remote("vid-1", "video/mp4"),
            remote("vid-2", "video/webm"),
            remote("img-1", "image/png"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let sync = ArtifactSync::new(
            client.clone(),
            Arc::new(MockTimeProvider::new(1_700_000_000_000)),
            dir.path(),
        );

        let summary = sync.run().await.unwrap();
        assert_eq!(summary.remote_count, 2);
        assert_eq!(summary.already_have, 0);
        assert_eq!(summary.synced, 2);
        assert!(summary.errors.is_empty());

        let downloads = client.downloads();
        assert!(downloads.iter().any(|p| p.ends_with("vid-1.mp4")));
        assert!(downloads.iter().any(|p| p.ends_with("vid-2.bin")));
    }

    #[tokio::test]
    async fn second_run_in_same_window_skips_existing_files() {
        let client = Arc::new(MockGenerationClient::new());
        client.set_artifacts(vec![remote("vid-1", "video/mp4")]);
        let dir = tempfile::tempdir().unwrap();
        // Fixed clock: both runs share the same timestamped directory
        let clock = Arc::new(MockTimeProvider::new(1_700_000_000_000));
        let sync = ArtifactSync::new(client.clone(), clock, dir.path());

        let first = sync.run().await.unwrap();
        assert_eq!(first.synced, 1);

        let second = sync.run().await.unwrap();
        assert_eq!(second.already_have, 1);
        assert_eq!(second.synced, 0);
    }
}
