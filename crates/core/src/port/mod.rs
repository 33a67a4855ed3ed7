// Port Layer - Interfaces for external dependencies

pub mod generation_client;
pub mod id_provider;
pub mod job_repository;
pub mod time_provider;

// Re-exports
pub use generation_client::{
    ArtifactRef, GenerationClient, GenerationConfig, GenerationError, ModelTier, OperationHandle,
    OperationStatus, RemoteArtifact,
};
pub use id_provider::IdProvider;
pub use job_repository::JobRepository;
pub use time_provider::TimeProvider;
