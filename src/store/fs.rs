//! Filesystem-backed storage rooted at the configured data directory.
//!
//! Layout: `jobs/{id}.json` for job records, `uploads/{id}.bin` for raw
//! documents, `generated/{id}.json` for finalized question payloads. Job
//! updates write to a temporary file and rename over the original so each
//! status transition lands as a single atomic replacement.

use super::{DocumentStore, JobStore, QuestionSetStore, StoreError, UpdateOutcome};
use crate::pipeline::types::{Job, JobPatch, JobStatus};
use crate::question::GeneratedSet;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Directory-tree implementation of all three storage collaborators.
pub struct FsStore {
    jobs_dir: PathBuf,
    uploads_dir: PathBuf,
    generated_dir: PathBuf,
    // Serializes read-modify-write job updates within this process.
    update_lock: Mutex<()>,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = data_dir.as_ref();
        let jobs_dir = root.join("jobs");
        let uploads_dir = root.join("uploads");
        let generated_dir = root.join("generated");
        for dir in [&jobs_dir, &uploads_dir, &generated_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(Self {
            jobs_dir,
            uploads_dir,
            generated_dir,
            update_lock: Mutex::new(()),
        })
    }

    fn job_path(&self, job_id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{job_id}.json"))
    }

    fn upload_path(&self, job_id: &str) -> PathBuf {
        self.uploads_dir.join(format!("{job_id}.bin"))
    }

    fn generated_path(&self, job_id: &str) -> PathBuf {
        self.generated_dir.join(format!("{job_id}.json"))
    }

    async fn write_job(&self, job: &Job) -> Result<(), StoreError> {
        let path = self.job_path(&job.id);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_job(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        match tokio::fs::read(self.job_path(job_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl JobStore for FsStore {
    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        self.write_job(&job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        self.read_job(job_id).await
    }

    async fn update(&self, job_id: &str, patch: JobPatch) -> Result<Job, StoreError> {
        let _guard = self.update_lock.lock().await;
        let mut job = self
            .read_job(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        patch.apply(&mut job);
        self.write_job(&job).await?;
        Ok(job)
    }

    async fn update_if_status(
        &self,
        job_id: &str,
        expected: &[JobStatus],
        patch: JobPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        let _guard = self.update_lock.lock().await;
        let mut job = self
            .read_job(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if !expected.contains(&job.status) {
            return Ok(UpdateOutcome::Rejected(job));
        }
        patch.apply(&mut job);
        self.write_job(&job).await?;
        Ok(UpdateOutcome::Applied(job))
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.job_path(job_id)).await?)
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn write_document(&self, job_id: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.upload_path(job_id);
        tokio::fs::write(&path, bytes).await?;
        Ok(path.display().to_string())
    }

    async fn read_document(&self, job_id: &str) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(self.upload_path(job_id)).await {
            Ok(bytes) => Ok(bytes),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(job_id.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }
}

#[async_trait]
impl QuestionSetStore for FsStore {
    async fn write_set(&self, set: &GeneratedSet) -> Result<String, StoreError> {
        let path = self.generated_path(&set.job_id);
        let payload = serde_json::to_vec_pretty(set)?;
        tokio::fs::write(&path, payload).await?;
        Ok(path.display().to_string())
    }

    async fn read_set(&self, job_id: &str) -> Result<GeneratedSet, StoreError> {
        match tokio::fs::read(self.generated_path(job_id)).await {
            Ok(bytes) => {
                let mut set: GeneratedSet = serde_json::from_slice(&bytes)?;
                set.job_id = job_id.to_string();
                Ok(set)
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(job_id.to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(tokio::fs::try_exists(self.generated_path(job_id)).await?)
    }
}
