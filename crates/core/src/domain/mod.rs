// Domain Layer - Entities and value types

pub mod error;
pub mod job;
pub mod queue;

pub use error::DomainError;
pub use job::{Job, JobId, JobStatus, OperationHandle, SubmissionReceipt};
pub use queue::{EnqueueReceipt, PauseState, PollerStatus, QueueEntry, QueuePreview, QueueStatus};
