//! Persistence interface the pipeline reads and writes through.
//!
//! Concurrency safety comes from unique keys, not locks: `doc_key`,
//! `external_job_ref`, `(job_id, resume_doc_id)` and
//! `(job_id, resume_doc_id, model_version)` are all upserted.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::document::{Document, Extraction, NewDocument, NewExtraction};
use crate::models::job::{
    Job, JobStatus, NewJob, NewRole, NewScore, Role, Score, WebhookDelivery,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    },
}

impl StoreError {
    pub fn job_not_found(job_id: Uuid) -> Self {
        StoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    // Documents
    async fn find_document(&self, doc_id: Uuid) -> Result<Option<Document>, StoreError>;
    async fn find_document_by_key(&self, doc_key: &str) -> Result<Option<Document>, StoreError>;
    /// Earliest JD document with this content hash.
    async fn find_jd_by_hash(&self, content_hash: &str) -> Result<Option<Document>, StoreError>;
    /// Inserts by `doc_key`; on conflict refreshes `content_hash` and `uploaded_at` only.
    async fn upsert_document(&self, doc: NewDocument) -> Result<Document, StoreError>;

    // Extractions
    async fn create_extraction(&self, extraction: NewExtraction) -> Result<Extraction, StoreError>;
    /// The authoritative extraction: the first PARSED one created for the document.
    async fn find_parsed_extraction(&self, doc_id: Uuid) -> Result<Option<Extraction>, StoreError>;

    // Jobs
    async fn find_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError>;
    async fn find_job_by_ref(&self, external_job_ref: &str) -> Result<Option<Job>, StoreError>;
    /// Get-or-create by `external_job_ref`. The flag is `true` when a row was inserted.
    async fn create_job(&self, job: NewJob) -> Result<(Job, bool), StoreError>;
    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;
    async fn list_jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError>;
    async fn set_job_jd(&self, job_id: Uuid, jd_doc_id: Uuid) -> Result<Job, StoreError>;
    async fn set_job_role(&self, job_id: Uuid, role_id: Uuid) -> Result<Job, StoreError>;
    /// Applies the transition only if the current status is an allowed predecessor.
    async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<Job, StoreError>;

    // Job ↔ resume associations
    /// `true` when the association did not exist before.
    async fn upsert_job_resume(&self, job_id: Uuid, resume_doc_id: Uuid)
        -> Result<bool, StoreError>;
    /// Resume documents in association order.
    async fn list_job_resumes(&self, job_id: Uuid) -> Result<Vec<Document>, StoreError>;

    // Scores
    async fn upsert_score(&self, score: NewScore) -> Result<Score, StoreError>;
    async fn delete_scores(&self, job_id: Uuid) -> Result<u64, StoreError>;
    async fn list_scores(&self, job_id: Uuid, model_version: &str)
        -> Result<Vec<Score>, StoreError>;

    // Roles
    async fn upsert_role(&self, role: NewRole) -> Result<Role, StoreError>;
    async fn find_role_by_ref(&self, external_job_ref: &str) -> Result<Option<Role>, StoreError>;
    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    // Webhook idempotency
    async fn find_webhook_delivery(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<WebhookDelivery>, StoreError>;
    /// First writer wins; a duplicate key is ignored.
    async fn record_webhook_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError>;
}
