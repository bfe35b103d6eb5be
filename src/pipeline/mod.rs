//! Pipeline orchestration: status transitions, chunk sequencing, and
//! aggregation of generated questions.
//!
//! One pipeline run owns its job record exclusively. Chunks are processed
//! sequentially and in order; a failing chunk is logged, recorded in the run
//! report, and skipped, so transient provider errors reduce yield instead of
//! aborting the job. Every status transition is a single atomic store update,
//! which keeps abandoned runs resumable from their last persisted state.

pub mod types;

use crate::chunking::{ChunkingError, chunk_text};
use crate::config::Config;
use crate::extraction::{ExtractionError, TextExtractor};
use crate::generation::{CompletionClient, CompletionError, CompletionRequest};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::normalize::{NormalizeError, normalize_response};
use crate::prompt::build_generation_prompt;
use crate::question::{GeneratedSet, QuestionDraft};
use crate::store::{DocumentStore, JobStore, QuestionSetStore, StoreError, UpdateOutcome};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use types::{Job, JobPatch, JobStatus};

/// Errors that fail or reject a pipeline operation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No job exists for the supplied identifier.
    #[error("Job {0} not found")]
    JobNotFound(String),
    /// Extraction collaborator failed or produced no text.
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// Chunking settings or input made segmentation impossible.
    #[error("Failed to chunk source text: {0}")]
    Chunking(#[from] ChunkingError),
    /// Every chunk failed; no questions were generated from the text.
    #[error("No questions were generated from the text")]
    NoValidQuestions,
    /// Operation requested on a job another run currently owns.
    #[error("Job {job_id} is already {status:?}")]
    ConflictingState {
        /// Identifier of the contested job.
        job_id: String,
        /// Status that caused the rejection.
        status: JobStatus,
    },
    /// Storage collaborator failed.
    #[error("Storage operation failed: {0}")]
    Store(#[from] StoreError),
}

/// Reasons a single chunk was skipped.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Gateway invocation failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// Model output could not be normalized into valid questions.
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Per-chunk failure entry preserved for callers.
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    /// 0-based index of the failed chunk.
    pub index: usize,
    /// Human-readable failure reason.
    pub reason: String,
}

/// Summary of one generation run, including partial-failure detail.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    /// Chunks attempted in this run.
    pub chunks_total: usize,
    /// Chunks skipped after a gateway or normalization failure.
    pub chunks_failed: usize,
    /// Ordered failure detail per skipped chunk.
    pub failures: Vec<ChunkFailure>,
}

/// Result of a generation request: the question set plus the run report.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Validated questions in chunk order.
    pub set: GeneratedSet,
    /// Per-chunk accounting for this run; empty when served from cache.
    pub report: GenerationReport,
    /// Whether the set was returned from the persisted output of an earlier run.
    pub from_cache: bool,
}

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on chunk size in bytes.
    pub max_chunk_size: usize,
    /// Overlap carried between adjacent chunks, in bytes.
    pub chunk_overlap: usize,
    /// Questions requested per chunk.
    pub questions_per_chunk: usize,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Time budget imposed on each gateway invocation.
    pub request_timeout: Duration,
    /// Cap on concurrent in-flight gateway requests across jobs.
    pub max_inflight_requests: usize,
}

impl PipelineSettings {
    /// Derive settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_chunk_size: config.max_chunk_size,
            chunk_overlap: config.chunk_overlap,
            questions_per_chunk: config.questions_per_chunk,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            max_inflight_requests: config.max_inflight_requests,
        }
    }
}

/// Coordinates the full generation pipeline for uploaded documents.
///
/// The service owns long-lived handles to the completion gateway, the storage
/// collaborators, and the metrics registry. Construct it once near process
/// start and share it through an `Arc`; each job runs in its own task.
pub struct PipelineService {
    completion_client: Arc<dyn CompletionClient>,
    job_store: Arc<dyn JobStore>,
    document_store: Arc<dyn DocumentStore>,
    question_store: Arc<dyn QuestionSetStore>,
    extractor: Arc<dyn TextExtractor>,
    settings: PipelineSettings,
    gateway_permits: Semaphore,
    metrics: Arc<PipelineMetrics>,
}

impl PipelineService {
    /// Build a pipeline service from explicit collaborators.
    pub fn new(
        completion_client: Arc<dyn CompletionClient>,
        job_store: Arc<dyn JobStore>,
        document_store: Arc<dyn DocumentStore>,
        question_store: Arc<dyn QuestionSetStore>,
        extractor: Arc<dyn TextExtractor>,
        settings: PipelineSettings,
    ) -> Self {
        let permits = settings.max_inflight_requests.max(1);
        Self {
            completion_client,
            job_store,
            document_store,
            question_store,
            extractor,
            settings,
            gateway_permits: Semaphore::new(permits),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Register an uploaded document and create its job record.
    pub async fn submit_document(&self, bytes: &[u8]) -> Result<Job, PipelineError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let source_ref = self.document_store.write_document(&job_id, bytes).await?;

        let mut job = Job::new(job_id);
        job.source_ref = Some(source_ref);
        self.job_store.insert(job.clone()).await?;

        tracing::info!(job_id = %job.id, size = bytes.len(), "Document submitted");
        Ok(job)
    }

    /// Run the extraction collaborator for a job and record its source text.
    pub async fn extract_text(&self, job_id: &str) -> Result<String, PipelineError> {
        let job = self.require_job(job_id).await?;
        if job.status == JobStatus::Generating {
            return Err(PipelineError::ConflictingState {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        self.job_store
            .update(job_id, JobPatch::status(JobStatus::Extracting))
            .await?;

        let bytes = match self.document_store.read_document(job_id).await {
            Ok(bytes) => bytes,
            Err(error) => {
                self.fail_job(job_id, &format!("Extraction failed: {error}"))
                    .await?;
                return Err(error.into());
            }
        };

        let text = self.run_extractor(job_id, &bytes).await?;
        let patch = JobPatch {
            status: Some(JobStatus::Extracted),
            source_text: Some(text.clone()),
            ..JobPatch::default()
        };
        self.job_store.update(job_id, patch).await?;
        tracing::info!(job_id, bytes = text.len(), "Text extracted");
        Ok(text)
    }

    /// Generate the question set for a job.
    ///
    /// The run starts by claiming the record with a conditional transition to
    /// `Generating`: a job another run already owns is rejected without
    /// mutation, and two racing calls can never both reach the gateway. Jobs
    /// already `Ready` return their persisted set without touching the
    /// gateway. Individual chunk failures are skipped and reported; a run in
    /// which no chunk yields a valid question fails the job with no output
    /// persisted.
    pub async fn generate_questions(
        &self,
        job_id: &str,
    ) -> Result<GenerationOutcome, PipelineError> {
        let claim = self
            .job_store
            .update_if_status(
                job_id,
                &[JobStatus::Uploaded, JobStatus::Extracted, JobStatus::Failed],
                JobPatch::status(JobStatus::Generating),
            )
            .await
            .map_err(|error| match error {
                StoreError::NotFound(_) => PipelineError::JobNotFound(job_id.to_string()),
                other => other.into(),
            })?;

        let job = match claim {
            UpdateOutcome::Applied(job) => job,
            UpdateOutcome::Rejected(job) if job.status == JobStatus::Ready => {
                tracing::debug!(job_id, "Returning previously generated set");
                let set = self.question_store.read_set(job_id).await?;
                return Ok(GenerationOutcome {
                    set,
                    report: GenerationReport::default(),
                    from_cache: true,
                });
            }
            UpdateOutcome::Rejected(job) => {
                return Err(PipelineError::ConflictingState {
                    job_id: job_id.to_string(),
                    status: job.status,
                });
            }
        };

        let text = match job.source_text {
            Some(text) => text,
            // The record is already claimed, so extraction runs inline
            // without the Extracting/Extracted status churn.
            None => {
                let bytes = match self.document_store.read_document(job_id).await {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        self.fail_job(job_id, &format!("Extraction failed: {error}"))
                            .await?;
                        return Err(error.into());
                    }
                };
                let text = self.run_extractor(job_id, &bytes).await?;
                let patch = JobPatch {
                    source_text: Some(text.clone()),
                    ..JobPatch::default()
                };
                self.job_store.update(job_id, patch).await?;
                text
            }
        };

        let chunks = match chunk_text(
            &text,
            self.settings.max_chunk_size,
            self.settings.chunk_overlap,
        ) {
            Ok(chunks) => chunks,
            Err(error) => {
                self.fail_job(job_id, &error.to_string()).await?;
                return Err(error.into());
            }
        };

        let total = chunks.len();
        tracing::info!(job_id, chunks = total, "Starting question generation");
        self.job_store
            .update(
                job_id,
                JobPatch::progress(0, total, "Starting question generation..."),
            )
            .await?;

        let mut questions: Vec<QuestionDraft> = Vec::new();
        let mut failures: Vec<ChunkFailure> = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            let current = index + 1;
            self.job_store
                .update(
                    job_id,
                    JobPatch::progress(
                        current,
                        total,
                        format!("Processing chunk {current}/{total}"),
                    ),
                )
                .await?;

            match self.generate_for_chunk(job_id, chunk).await {
                Ok(drafts) => {
                    tracing::debug!(
                        job_id,
                        chunk = current,
                        questions = drafts.len(),
                        "Chunk complete"
                    );
                    questions.extend(drafts);
                }
                Err(error) => {
                    tracing::warn!(job_id, chunk = current, error = %error, "Chunk failed; skipping");
                    failures.push(ChunkFailure {
                        index,
                        reason: error.to_string(),
                    });
                }
            }
        }

        if questions.is_empty() {
            let message = PipelineError::NoValidQuestions.to_string();
            self.fail_job(job_id, &message).await?;
            return Err(PipelineError::NoValidQuestions);
        }

        let set = GeneratedSet {
            job_id: job_id.to_string(),
            questions,
        };
        let output_ref = self.question_store.write_set(&set).await?;

        let patch = JobPatch {
            status: Some(JobStatus::Ready),
            output_ref: Some(output_ref),
            progress_message: Some(format!(
                "Generated {} questions from {} chunks ({} failed)",
                set.questions.len(),
                total,
                failures.len()
            )),
            ..JobPatch::default()
        };
        self.job_store.update(job_id, patch).await?;

        self.metrics.record_completed_job(
            total as u64,
            failures.len() as u64,
            set.questions.len() as u64,
        );
        tracing::info!(
            job_id,
            questions = set.questions.len(),
            failed_chunks = failures.len(),
            "Question generation complete"
        );

        Ok(GenerationOutcome {
            set,
            report: GenerationReport {
                chunks_total: total,
                chunks_failed: failures.len(),
                failures,
            },
            from_cache: false,
        })
    }

    /// Fetch the persisted question set for a job, if generation completed.
    pub async fn get_generated_set(
        &self,
        job_id: &str,
    ) -> Result<Option<GeneratedSet>, PipelineError> {
        let job = self.require_job(job_id).await?;
        if job.output_ref.is_none() {
            return Ok(None);
        }
        Ok(Some(self.question_store.read_set(job_id).await?))
    }

    /// Fetch the current job record; status queries read the durable state.
    pub async fn get_job(&self, job_id: &str) -> Result<Job, PipelineError> {
        self.require_job(job_id).await
    }

    /// Return the current pipeline metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn require_job(&self, job_id: &str) -> Result<Job, PipelineError> {
        self.job_store
            .get(job_id)
            .await?
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }

    /// Run the extraction collaborator over stored bytes, failing the job
    /// with the extraction detail when it errors.
    async fn run_extractor(&self, job_id: &str, bytes: &[u8]) -> Result<String, PipelineError> {
        match self.extractor.extract(bytes).await {
            Ok(text) => Ok(text),
            Err(error) => {
                self.fail_job(job_id, &format!("Extraction failed: {error}"))
                    .await?;
                Err(error.into())
            }
        }
    }

    async fn fail_job(&self, job_id: &str, message: &str) -> Result<(), PipelineError> {
        self.metrics.record_failed_job();
        self.job_store
            .update(job_id, JobPatch::failed(message))
            .await?;
        Ok(())
    }

    /// Run prompt construction, one gateway call, and normalization for a chunk.
    async fn generate_for_chunk(
        &self,
        job_id: &str,
        chunk: &str,
    ) -> Result<Vec<QuestionDraft>, ChunkError> {
        let payload = build_generation_prompt(chunk, self.settings.questions_per_chunk);
        let request = CompletionRequest {
            system: payload.system,
            user: payload.user,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };

        let _permit = self
            .gateway_permits
            .acquire()
            .await
            .expect("gateway semaphore closed");

        let raw = tokio::time::timeout(
            self.settings.request_timeout,
            self.completion_client.complete(request),
        )
        .await
        .map_err(|_| CompletionError::Timeout(self.settings.request_timeout.as_secs()))??;

        Ok(normalize_response(&raw, job_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PlainTextExtractor;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Completion client that replays a fixed script of responses.
    struct ScriptedClient {
        responses: StdMutex<VecDeque<Result<String, CompletionError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                responses: StdMutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .expect("script lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Err(CompletionError::ProviderError("script exhausted".into()))
                })
        }
    }

    /// Job store wrapper that records every progress message it applies.
    struct RecordingJobStore {
        inner: MemoryStore,
        messages: StdMutex<Vec<String>>,
    }

    impl RecordingJobStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                messages: StdMutex::new(Vec::new()),
            }
        }

        fn messages(&self) -> Vec<String> {
            self.messages.lock().expect("messages lock").clone()
        }
    }

    #[async_trait]
    impl JobStore for RecordingJobStore {
        async fn insert(&self, job: Job) -> Result<(), StoreError> {
            self.inner.insert(job).await
        }

        async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.get(job_id).await
        }

        async fn update(&self, job_id: &str, patch: JobPatch) -> Result<Job, StoreError> {
            if let Some(message) = &patch.progress_message {
                self.messages
                    .lock()
                    .expect("messages lock")
                    .push(message.clone());
            }
            self.inner.update(job_id, patch).await
        }

        async fn update_if_status(
            &self,
            job_id: &str,
            expected: &[JobStatus],
            patch: JobPatch,
        ) -> Result<UpdateOutcome, StoreError> {
            self.inner.update_if_status(job_id, expected, patch).await
        }

        async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
            JobStore::exists(&self.inner, job_id).await
        }
    }

    /// Job store whose reads and claims are delayed, mimicking disk latency.
    struct SlowJobStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl JobStore for SlowJobStore {
        async fn insert(&self, job: Job) -> Result<(), StoreError> {
            self.inner.insert(job).await
        }

        async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.get(job_id).await
        }

        async fn update(&self, job_id: &str, patch: JobPatch) -> Result<Job, StoreError> {
            self.inner.update(job_id, patch).await
        }

        async fn update_if_status(
            &self,
            job_id: &str,
            expected: &[JobStatus],
            patch: JobPatch,
        ) -> Result<UpdateOutcome, StoreError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.inner.update_if_status(job_id, expected, patch).await
        }

        async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
            JobStore::exists(&self.inner, job_id).await
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            max_chunk_size: 100,
            chunk_overlap: 0,
            questions_per_chunk: 1,
            max_tokens: 256,
            temperature: 0.0,
            request_timeout: Duration::from_secs(5),
            max_inflight_requests: 2,
        }
    }

    fn service(
        client: Arc<ScriptedClient>,
        job_store: Arc<RecordingJobStore>,
        store: Arc<MemoryStore>,
    ) -> PipelineService {
        PipelineService::new(
            client,
            job_store,
            store.clone(),
            store,
            Arc::new(PlainTextExtractor),
            settings(),
        )
    }

    /// Five ~84-byte paragraphs chunk into exactly five windows at size 100.
    fn five_paragraph_text() -> String {
        (1..=5)
            .map(|index| format!("Fact {index}: {}", "x".repeat(76)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn question_json(marker: usize) -> String {
        format!(
            r#"{{"questions": [{{
                "type": "true_false",
                "prompt_text": "Statement {marker} is from the source.",
                "correct_answer": "True",
                "explanation": "Taken from chunk {marker}.",
                "difficulty": "easy",
                "topic": "Source"
            }}]}}"#
        )
    }

    async fn submitted_job(service: &PipelineService, text: &str) -> String {
        let job = service
            .submit_document(text.as_bytes())
            .await
            .expect("submit");
        service.extract_text(&job.id).await.expect("extract");
        job.id
    }

    #[tokio::test]
    async fn failed_chunks_are_skipped_and_order_preserved() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(question_json(1)),
            Err(CompletionError::ProviderError("backend 500".into())),
            Ok(question_json(3)),
            Err(CompletionError::ProviderError("backend 500".into())),
            Ok(question_json(5)),
        ]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client.clone(), job_store.clone(), store.clone());

        let job_id = submitted_job(&service, &five_paragraph_text()).await;
        let outcome = service.generate_questions(&job_id).await.expect("outcome");

        assert!(!outcome.from_cache);
        assert_eq!(outcome.report.chunks_total, 5);
        assert_eq!(outcome.report.chunks_failed, 2);
        assert_eq!(
            outcome
                .report
                .failures
                .iter()
                .map(|failure| failure.index)
                .collect::<Vec<_>>(),
            vec![1, 3]
        );

        let prompts: Vec<_> = outcome
            .set
            .questions
            .iter()
            .map(|question| question.prompt_text.clone())
            .collect();
        assert_eq!(
            prompts,
            vec![
                "Statement 1 is from the source.",
                "Statement 3 is from the source.",
                "Statement 5 is from the source.",
            ]
        );

        let job = service.get_job(&job_id).await.expect("job");
        assert_eq!(job.status, JobStatus::Ready);
        assert!(job.output_ref.is_some());

        let messages = job_store.messages();
        for current in 1..=5 {
            let expected = format!("Processing chunk {current}/5");
            assert!(messages.contains(&expected), "missing {expected}");
        }
        let positions: Vec<_> = (1..=5)
            .map(|current| {
                messages
                    .iter()
                    .position(|message| message == &format!("Processing chunk {current}/5"))
                    .expect("message present")
            })
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn all_chunks_failing_fails_the_job_without_output() {
        let client = Arc::new(ScriptedClient::new(
            (0..5)
                .map(|_| Err(CompletionError::ProviderError("backend 500".into())))
                .collect(),
        ));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client, job_store, store.clone());

        let job_id = submitted_job(&service, &five_paragraph_text()).await;
        let error = service
            .generate_questions(&job_id)
            .await
            .expect_err("all chunks failed");
        assert!(matches!(error, PipelineError::NoValidQuestions));

        let job = service.get_job(&job_id).await.expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("No questions were generated from the text")
        );
        assert!(!QuestionSetStore::exists(store.as_ref(), &job_id)
            .await
            .expect("exists"));
    }

    #[tokio::test]
    async fn ready_jobs_return_cached_set_without_gateway_calls() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(question_json(1))]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client.clone(), job_store, store);

        let job_id = submitted_job(&service, "A single short document.").await;
        let first = service.generate_questions(&job_id).await.expect("first run");
        assert!(!first.from_cache);
        assert_eq!(client.call_count(), 1);

        let second = service.generate_questions(&job_id).await.expect("cached");
        assert!(second.from_cache);
        assert_eq!(client.call_count(), 1);
        assert_eq!(second.set.questions.len(), first.set.questions.len());
    }

    #[tokio::test]
    async fn generating_jobs_reject_concurrent_generation() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client.clone(), job_store.clone(), store);

        let job_id = submitted_job(&service, "A single short document.").await;
        job_store
            .update(&job_id, JobPatch::status(JobStatus::Generating))
            .await
            .expect("force generating");

        let error = service
            .generate_questions(&job_id)
            .await
            .expect_err("conflict");
        assert!(matches!(error, PipelineError::ConflictingState { .. }));
        assert_eq!(client.call_count(), 0);

        let job = service.get_job(&job_id).await.expect("job");
        assert_eq!(job.status, JobStatus::Generating);
    }

    #[tokio::test]
    async fn concurrent_runs_on_one_job_reach_the_gateway_once() {
        let client = Arc::new(ScriptedClient::new(vec![
            Ok(question_json(1)),
            Ok(question_json(2)),
        ]));
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(PipelineService::new(
            client.clone(),
            Arc::new(SlowJobStore {
                inner: MemoryStore::new(),
            }),
            store.clone(),
            store,
            Arc::new(PlainTextExtractor),
            settings(),
        ));

        let job_id = submitted_job(&service, "A single short document.").await;

        let first = tokio::spawn({
            let service = service.clone();
            let job_id = job_id.clone();
            async move { service.generate_questions(&job_id).await }
        });
        let second = tokio::spawn({
            let service = service.clone();
            let job_id = job_id.clone();
            async move { service.generate_questions(&job_id).await }
        });
        let first = first.await.expect("join");
        let second = second.await.expect("join");

        assert_eq!(client.call_count(), 1, "only one run may reach the gateway");

        let fresh_runs = [&first, &second]
            .iter()
            .filter(|result| matches!(result, Ok(outcome) if !outcome.from_cache))
            .count();
        assert_eq!(fresh_runs, 1);
        for result in [&first, &second] {
            if let Err(error) = result {
                assert!(matches!(error, PipelineError::ConflictingState { .. }));
            }
        }

        let job = service.get_job(&job_id).await.expect("job");
        assert_eq!(job.status, JobStatus::Ready);
    }

    #[tokio::test]
    async fn unknown_jobs_are_reported_not_found() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client, job_store, store);

        let error = service
            .generate_questions("no-such-job")
            .await
            .expect_err("missing");
        assert!(matches!(error, PipelineError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn gateway_timeout_is_a_per_chunk_failure() {
        struct SlowClient;

        #[async_trait]
        impl CompletionClient for SlowClient {
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Result<String, CompletionError> {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Ok(question_json(1))
            }
        }

        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let mut slow_settings = settings();
        slow_settings.request_timeout = Duration::from_millis(20);
        let service = PipelineService::new(
            Arc::new(SlowClient),
            job_store.clone(),
            store.clone(),
            store,
            Arc::new(PlainTextExtractor),
            slow_settings,
        );

        let job_id = submitted_job(&service, "A single short document.").await;
        let error = service
            .generate_questions(&job_id)
            .await
            .expect_err("timed out");
        assert!(matches!(error, PipelineError::NoValidQuestions));

        let job = service.get_job(&job_id).await.expect("job");
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn extraction_failure_fails_the_job_with_detail() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client, job_store, store);

        let job = service
            .submit_document(&[0xff, 0xfe])
            .await
            .expect("submit");
        let error = service.extract_text(&job.id).await.expect_err("binary");
        assert!(matches!(error, PipelineError::Extraction(_)));

        let job = service.get_job(&job.id).await.expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().starts_with("Extraction failed:"));
    }

    #[tokio::test]
    async fn generation_extracts_on_demand_when_text_missing() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(question_json(1))]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client, job_store, store);

        // Submit without calling extract_text first.
        let job = service
            .submit_document("A single short document.".as_bytes())
            .await
            .expect("submit");
        let outcome = service.generate_questions(&job.id).await.expect("outcome");
        assert_eq!(outcome.set.questions.len(), 1);

        let job = service.get_job(&job.id).await.expect("job");
        assert_eq!(job.status, JobStatus::Ready);
        assert!(job.source_text.is_some());
    }

    #[tokio::test]
    async fn failed_jobs_can_retry_generation_from_scratch() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(CompletionError::ProviderUnavailable("down".into())),
            Ok(question_json(1)),
        ]));
        let job_store = Arc::new(RecordingJobStore::new());
        let store = Arc::new(MemoryStore::new());
        let service = service(client, job_store, store);

        let job_id = submitted_job(&service, "A single short document.").await;
        let first = service.generate_questions(&job_id).await;
        assert!(matches!(first, Err(PipelineError::NoValidQuestions)));

        let retry = service.generate_questions(&job_id).await.expect("retry");
        assert_eq!(retry.set.questions.len(), 1);

        let job = service.get_job(&job_id).await.expect("job");
        assert_eq!(job.status, JobStatus::Ready);
        assert!(job.error.is_none());
    }
}
