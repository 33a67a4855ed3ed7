// Submitter - performs one generation submission and persists the job

use crate::domain::{Job, QueueEntry, SubmissionReceipt};
use crate::error::Result;
use crate::port::{GenerationClient, GenerationConfig, IdProvider, JobRepository, TimeProvider};
use std::sync::Arc;
use tracing::info;

/// Executes a single submission attempt for the admission queue.
///
/// The job row is created only after the remote service accepts the
/// request, so a failed submission leaves no partial state; the error is
/// propagated with enough structure for the queue to classify it.
pub struct Submitter {
    client: Arc<dyn GenerationClient>,
    job_repo: Arc<dyn JobRepository>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    generation: GenerationConfig,
}

impl Submitter {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        job_repo: Arc<dyn JobRepository>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            client,
            job_repo,
            id_provider,
            time_provider,
            generation,
        }
    }

    pub async fn submit(&self, entry: &QueueEntry) -> Result<SubmissionReceipt> {
        info!(shot_id = %entry.id, title = %entry.title, "Submitting generation request");

        let operation = self.client.submit(&entry.prompt, &self.generation).await?;

        info!(
            shot_id = %entry.id,
            operation = operation.as_str(),
            "Submission accepted"
        );

        let job = Job::new(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
            Some(entry.id.clone()),
            Some(entry.title.clone()),
            operation,
        );
        let receipt = SubmissionReceipt {
            job_id: job.id.clone(),
            title: job.title.clone(),
        };

        self.job_repo.insert(&job).await?;

        Ok(receipt)
    }
}
