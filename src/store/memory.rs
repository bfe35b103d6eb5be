//! In-memory storage used by tests and embedded callers.

use super::{DocumentStore, JobStore, QuestionSetStore, StoreError, UpdateOutcome};
use crate::pipeline::types::{Job, JobPatch, JobStatus};
use crate::question::GeneratedSet;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Map-backed implementation of all three storage collaborators.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<String, Job>>,
    documents: RwLock<HashMap<String, Vec<u8>>>,
    sets: RwLock<HashMap<String, GeneratedSet>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn update(&self, job_id: &str, patch: JobPatch) -> Result<Job, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        patch.apply(job);
        Ok(job.clone())
    }

    async fn update_if_status(
        &self,
        job_id: &str,
        expected: &[JobStatus],
        patch: JobPatch,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        if !expected.contains(&job.status) {
            return Ok(UpdateOutcome::Rejected(job.clone()));
        }
        patch.apply(job);
        Ok(UpdateOutcome::Applied(job.clone()))
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.jobs.read().await.contains_key(job_id))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn write_document(&self, job_id: &str, bytes: &[u8]) -> Result<String, StoreError> {
        self.documents
            .write()
            .await
            .insert(job_id.to_string(), bytes.to_vec());
        Ok(format!("memory://documents/{job_id}"))
    }

    async fn read_document(&self, job_id: &str) -> Result<Vec<u8>, StoreError> {
        self.documents
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }
}

#[async_trait]
impl QuestionSetStore for MemoryStore {
    async fn write_set(&self, set: &GeneratedSet) -> Result<String, StoreError> {
        self.sets
            .write()
            .await
            .insert(set.job_id.clone(), set.clone());
        Ok(format!("memory://generated/{}", set.job_id))
    }

    async fn read_set(&self, job_id: &str) -> Result<GeneratedSet, StoreError> {
        self.sets
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.sets.read().await.contains_key(job_id))
    }
}
