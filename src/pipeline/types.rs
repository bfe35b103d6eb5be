//! Job records, processing statuses, and atomic update patches.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Processing states a job moves through.
///
/// `Ready` and `Failed` are terminal for a run, but a `Failed` job may be
/// re-submitted to extraction or generation to retry from scratch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Document received; nothing processed yet.
    Uploaded,
    /// Extraction collaborator is running.
    Extracting,
    /// Source text is available on the job.
    Extracted,
    /// Question generation loop is in progress.
    Generating,
    /// Generated set persisted; job complete.
    Ready,
    /// Processing stopped with a recorded error.
    Failed,
}

impl JobStatus {
    /// Whether this status ends a pipeline run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}

/// Chunk-level progress counters surfaced to status queries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// 1-based index of the chunk currently being processed.
    pub current: usize,
    /// Total chunks in this run.
    pub total: usize,
}

/// One document's end-to-end processing record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    /// Opaque unique identifier.
    pub id: String,
    /// Key of the stored source document bytes, when retained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    /// Extracted source text; populated after extraction succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    /// Current processing status.
    pub status: JobStatus,
    /// Progress counters for the generation loop.
    #[serde(default)]
    pub progress: Progress,
    /// Human-readable progress message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    /// Error detail; present only when the job is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Key of the persisted generated-question payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    /// Upload timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Job {
    /// Create a freshly uploaded job.
    pub fn new(id: String) -> Self {
        Self {
            id,
            source_ref: None,
            source_text: None,
            status: JobStatus::Uploaded,
            progress: Progress::default(),
            progress_message: None,
            error: None,
            output_ref: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Partial update applied to a job record in a single atomic store write.
#[derive(Clone, Debug, Default)]
pub struct JobPatch {
    /// New status, if changing.
    pub status: Option<JobStatus>,
    /// Extracted source text to record.
    pub source_text: Option<String>,
    /// Source document reference to record.
    pub source_ref: Option<String>,
    /// Progress counters to record.
    pub progress: Option<Progress>,
    /// Progress message to record.
    pub progress_message: Option<String>,
    /// Error detail; only meaningful together with `JobStatus::Failed`.
    pub error: Option<String>,
    /// Output payload reference to record.
    pub output_ref: Option<String>,
}

impl JobPatch {
    /// Patch that only moves the job to a new status.
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Patch that fails the job with the given error detail.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Patch that records generation-loop progress.
    pub fn progress(current: usize, total: usize, message: impl Into<String>) -> Self {
        Self {
            progress: Some(Progress { current, total }),
            progress_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Apply this patch to a job record.
    ///
    /// Moving to any status other than `Failed` clears a stale error so the
    /// "error present only when Failed" invariant holds structurally.
    pub fn apply(self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
            if status != JobStatus::Failed {
                job.error = None;
            }
        }
        if let Some(text) = self.source_text {
            job.source_text = Some(text);
        }
        if let Some(source_ref) = self.source_ref {
            job.source_ref = Some(source_ref);
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(message) = self.progress_message {
            job.progress_message = Some(message);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
        if let Some(output_ref) = self.output_ref {
            job.output_ref = Some(output_ref);
        }
    }
}
