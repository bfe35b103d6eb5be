//! Persistence collaborator boundaries for jobs, documents, and question sets.
//!
//! The pipeline only needs keyed get/put with atomic single-record updates,
//! so the traits here stay deliberately small. [`MemoryStore`] backs tests
//! and embedded use; [`FsStore`] persists everything under a data directory.

use crate::pipeline::types::{Job, JobPatch, JobStatus};
use crate::question::GeneratedSet;
use async_trait::async_trait;
use thiserror::Error;

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Errors raised by storage collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists under the requested key.
    #[error("no record found for job {0}")]
    NotFound(String),
    /// Underlying filesystem operation failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Record could not be encoded or decoded.
    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a conditional job update.
#[derive(Clone, Debug)]
pub enum UpdateOutcome {
    /// The status precondition held; the patch was applied.
    Applied(Job),
    /// The current status was not among the expected ones; nothing changed.
    Rejected(Job),
}

/// Keyed storage of job records with atomic partial updates.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record.
    async fn insert(&self, job: Job) -> Result<(), StoreError>;

    /// Fetch a job record by identifier.
    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError>;

    /// Apply a patch to a job record as one atomic update, returning the
    /// updated record. Unknown identifiers raise [`StoreError::NotFound`].
    async fn update(&self, job_id: &str, patch: JobPatch) -> Result<Job, StoreError>;

    /// Apply `patch` only when the current status is one of `expected`.
    ///
    /// The status comparison and the write happen under the same lock, so
    /// two racing claims on the same record cannot both succeed. The record
    /// comes back unchanged in [`UpdateOutcome::Rejected`] so the caller can
    /// see which status won.
    async fn update_if_status(
        &self,
        job_id: &str,
        expected: &[JobStatus],
        patch: JobPatch,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Whether a job record exists for the identifier.
    async fn exists(&self, job_id: &str) -> Result<bool, StoreError>;
}

/// Storage of raw uploaded document bytes, keyed by job identifier.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store document bytes, returning an opaque reference for the job record.
    async fn write_document(&self, job_id: &str, bytes: &[u8]) -> Result<String, StoreError>;

    /// Read back previously stored document bytes.
    async fn read_document(&self, job_id: &str) -> Result<Vec<u8>, StoreError>;
}

/// Append-only storage of finalized question sets, keyed by job identifier.
#[async_trait]
pub trait QuestionSetStore: Send + Sync {
    /// Persist a generated set as a JSON payload, returning its reference.
    async fn write_set(&self, set: &GeneratedSet) -> Result<String, StoreError>;

    /// Read back a previously persisted set.
    async fn read_set(&self, job_id: &str) -> Result<GeneratedSet, StoreError>;

    /// Whether a persisted set exists for the job.
    async fn exists(&self, job_id: &str) -> Result<bool, StoreError>;
}
