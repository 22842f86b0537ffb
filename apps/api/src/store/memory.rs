use std::cmp::Reverse;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::document::{
    DocType, Document, Extraction, ExtractionStatus, NewDocument, NewExtraction,
};
use crate::models::job::{
    Job, JobResume, JobStatus, NewJob, NewRole, NewScore, Role, Score, WebhookDelivery,
};
use crate::store::{Store, StoreError};

/// In-process store with the same uniqueness rules as the PostgreSQL schema.
/// Backs tests and database-less development runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    documents: Vec<Document>,
    extractions: Vec<Extraction>,
    jobs: Vec<Job>,
    job_resumes: Vec<JobResume>,
    scores: Vec<Score>,
    roles: Vec<Role>,
    webhook_deliveries: HashMap<String, WebhookDelivery>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn job_mut(tables: &mut Tables, job_id: Uuid) -> Result<&mut Job, StoreError> {
    tables
        .jobs
        .iter_mut()
        .find(|j| j.id == job_id)
        .ok_or_else(|| StoreError::job_not_found(job_id))
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_document(&self, doc_id: Uuid) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.documents.iter().find(|d| d.id == doc_id).cloned())
    }

    async fn find_document_by_key(&self, doc_key: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.documents.iter().find(|d| d.doc_key == doc_key).cloned())
    }

    async fn find_jd_by_hash(&self, content_hash: &str) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .iter()
            .find(|d| d.doc_type == DocType::Jd && d.content_hash == content_hash)
            .cloned())
    }

    async fn upsert_document(&self, doc: NewDocument) -> Result<Document, StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .documents
            .iter_mut()
            .find(|d| d.doc_key == doc.doc_key)
        {
            existing.content_hash = doc.content_hash;
            existing.uploaded_at = Utc::now();
            return Ok(existing.clone());
        }

        let document = Document {
            id: Uuid::new_v4(),
            doc_key: doc.doc_key,
            doc_type: doc.doc_type,
            job_number: doc.job_number,
            content_hash: doc.content_hash,
            mime_type: doc.mime_type,
            content: doc.content,
            uploaded_at: Utc::now(),
        };
        tables.documents.push(document.clone());
        Ok(document)
    }

    async fn create_extraction(&self, extraction: NewExtraction) -> Result<Extraction, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.documents.iter().any(|d| d.id == extraction.doc_id) {
            return Err(StoreError::NotFound {
                entity: "Document",
                id: extraction.doc_id.to_string(),
            });
        }
        let row = Extraction {
            id: Uuid::new_v4(),
            doc_id: extraction.doc_id,
            idp_request_id: extraction.idp_request_id,
            extraction_json: extraction.extraction_json,
            extraction_version: extraction.extraction_version,
            status: extraction.status,
            created_at: Utc::now(),
        };
        tables.extractions.push(row.clone());
        Ok(row)
    }

    async fn find_parsed_extraction(&self, doc_id: Uuid) -> Result<Option<Extraction>, StoreError> {
        let tables = self.tables.read().await;
        // Vec order is insertion order, so the first match is the first one created.
        Ok(tables
            .extractions
            .iter()
            .find(|e| e.doc_id == doc_id && e.status == ExtractionStatus::Parsed)
            .cloned())
    }

    async fn find_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.jobs.iter().find(|j| j.id == job_id).cloned())
    }

    async fn find_job_by_ref(&self, external_job_ref: &str) -> Result<Option<Job>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .jobs
            .iter()
            .find(|j| j.external_job_ref == external_job_ref)
            .cloned())
    }

    async fn create_job(&self, job: NewJob) -> Result<(Job, bool), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .jobs
            .iter()
            .find(|j| j.external_job_ref == job.external_job_ref)
        {
            return Ok((existing.clone(), false));
        }
        let now = Utc::now();
        let row = Job {
            id: Uuid::new_v4(),
            external_job_ref: job.external_job_ref,
            role_id: job.role_id,
            jd_doc_id: job.jd_doc_id,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.jobs.push(row.clone());
        Ok((row, true))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.read().await;
        let mut jobs = tables.jobs.clone();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn list_jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .jobs
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect())
    }

    async fn set_job_jd(&self, job_id: Uuid, jd_doc_id: Uuid) -> Result<Job, StoreError> {
        let mut tables = self.tables.write().await;
        let job = job_mut(&mut tables, job_id)?;
        job.jd_doc_id = Some(jd_doc_id);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn set_job_role(&self, job_id: Uuid, role_id: Uuid) -> Result<Job, StoreError> {
        let mut tables = self.tables.write().await;
        let job = job_mut(&mut tables, job_id)?;
        job.role_id = Some(role_id);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<Job, StoreError> {
        let mut tables = self.tables.write().await;
        let job = job_mut(&mut tables, job_id)?;
        if !job.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                job_id,
                from: job.status,
                to: status,
            });
        }
        job.status = status;
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn upsert_job_resume(
        &self,
        job_id: Uuid,
        resume_doc_id: Uuid,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let exists = tables
            .job_resumes
            .iter()
            .any(|jr| jr.job_id == job_id && jr.resume_doc_id == resume_doc_id);
        if exists {
            return Ok(false);
        }
        tables.job_resumes.push(JobResume {
            job_id,
            resume_doc_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn list_job_resumes(&self, job_id: Uuid) -> Result<Vec<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .job_resumes
            .iter()
            .filter(|jr| jr.job_id == job_id)
            .filter_map(|jr| {
                tables
                    .documents
                    .iter()
                    .find(|d| d.id == jr.resume_doc_id)
                    .cloned()
            })
            .collect())
    }

    async fn upsert_score(&self, score: NewScore) -> Result<Score, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables.scores.iter_mut().find(|s| {
            s.job_id == score.job_id
                && s.resume_doc_id == score.resume_doc_id
                && s.model_version == score.model_version
        }) {
            existing.final_score = score.final_score;
            existing.reasons_json = score.reasons_json;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let row = Score {
            job_id: score.job_id,
            resume_doc_id: score.resume_doc_id,
            model_version: score.model_version,
            final_score: score.final_score,
            reasons_json: score.reasons_json,
            created_at: now,
            updated_at: now,
        };
        tables.scores.push(row.clone());
        Ok(row)
    }

    async fn delete_scores(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.scores.len();
        tables.scores.retain(|s| s.job_id != job_id);
        Ok((before - tables.scores.len()) as u64)
    }

    async fn list_scores(
        &self,
        job_id: Uuid,
        model_version: &str,
    ) -> Result<Vec<Score>, StoreError> {
        let tables = self.tables.read().await;
        let mut scores: Vec<Score> = tables
            .scores
            .iter()
            .filter(|s| s.job_id == job_id && s.model_version == model_version)
            .cloned()
            .collect();
        // Ties follow association order; unassociated scores go last.
        let position = |doc_id: Uuid| {
            tables
                .job_resumes
                .iter()
                .filter(|jr| jr.job_id == job_id)
                .position(|jr| jr.resume_doc_id == doc_id)
                .unwrap_or(usize::MAX)
        };
        scores.sort_by_key(|s| (Reverse(s.final_score), position(s.resume_doc_id)));
        Ok(scores)
    }

    async fn upsert_role(&self, role: NewRole) -> Result<Role, StoreError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        if let Some(existing) = tables
            .roles
            .iter_mut()
            .find(|r| r.external_job_ref == role.external_job_ref)
        {
            existing.title = role.title;
            existing.description = role.description;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let row = Role {
            id: Uuid::new_v4(),
            external_job_ref: role.external_job_ref,
            title: role.title,
            description: role.description,
            created_at: now,
            updated_at: now,
        };
        tables.roles.push(row.clone());
        Ok(row)
    }

    async fn find_role_by_ref(&self, external_job_ref: &str) -> Result<Option<Role>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .find(|r| r.external_job_ref == external_job_ref)
            .cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        let tables = self.tables.read().await;
        let mut roles = tables.roles.clone();
        roles.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(roles)
    }

    async fn find_webhook_delivery(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.webhook_deliveries.get(idempotency_key).cloned())
    }

    async fn record_webhook_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .webhook_deliveries
            .entry(delivery.idempotency_key.clone())
            .or_insert(delivery);
        Ok(())
    }
}
