// Application Layer - the scheduler itself

pub mod admission;
pub mod backoff;
pub mod constants;
pub mod control;
pub mod poller;
pub mod resume;
pub mod submit;
pub mod sync;

// Re-exports
pub use admission::{AdmissionConfig, AdmissionQueue};
pub use backoff::BackoffTracker;
pub use control::{stop_channel, StopHandle, StopToken};
pub use poller::{CompletionPoller, PollerConfig};
pub use resume::ResumeSchedule;
pub use submit::Submitter;
pub use sync::{ArtifactSync, SyncFailure, SyncSummary};
