use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing pipeline activity.
#[derive(Default)]
pub struct PipelineMetrics {
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    chunks_processed: AtomicU64,
    chunks_failed: AtomicU64,
    questions_generated: AtomicU64,
}

impl PipelineMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a job that reached `Ready`, with its chunk and question yield.
    pub fn record_completed_job(&self, chunks: u64, failed_chunks: u64, questions: u64) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        self.chunks_processed.fetch_add(chunks, Ordering::Relaxed);
        self.chunks_failed.fetch_add(failed_chunks, Ordering::Relaxed);
        self.questions_generated
            .fetch_add(questions, Ordering::Relaxed);
    }

    /// Record a job that reached `Failed`.
    pub fn record_failed_job(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            chunks_processed: self.chunks_processed.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
            questions_generated: self.questions_generated.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of pipeline counters used for reporting.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Jobs that reached `Ready` since startup.
    pub jobs_completed: u64,
    /// Jobs that reached `Failed` since startup.
    pub jobs_failed: u64,
    /// Chunks attempted across all completed jobs.
    pub chunks_processed: u64,
    /// Chunks that failed and were skipped.
    pub chunks_failed: u64,
    /// Total validated questions produced.
    pub questions_generated: u64,
}
