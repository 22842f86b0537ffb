use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::document::{DocType, Document, Extraction, NewDocument, NewExtraction};
use crate::models::job::{
    Job, JobStatus, NewJob, NewRole, NewScore, Role, Score, WebhookDelivery,
};
use crate::store::{Store, StoreError};

/// PostgreSQL-backed store. Every upsert is a single `INSERT … ON CONFLICT` statement.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_document(&self, doc_id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(
            sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
                .bind(doc_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_document_by_key(&self, doc_key: &str) -> Result<Option<Document>, StoreError> {
        Ok(
            sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE doc_key = $1")
                .bind(doc_key)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_jd_by_hash(&self, content_hash: &str) -> Result<Option<Document>, StoreError> {
        Ok(sqlx::query_as::<_, Document>(
            r#"
            SELECT * FROM documents
            WHERE content_hash = $1 AND doc_type = $2
            ORDER BY uploaded_at ASC
            LIMIT 1
            "#,
        )
        .bind(content_hash)
        .bind(DocType::Jd.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_document(&self, doc: NewDocument) -> Result<Document, StoreError> {
        Ok(sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (id, doc_key, doc_type, job_number, content_hash, mime_type, content)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (doc_key) DO UPDATE
                SET content_hash = EXCLUDED.content_hash,
                    uploaded_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&doc.doc_key)
        .bind(doc.doc_type.as_str())
        .bind(&doc.job_number)
        .bind(&doc.content_hash)
        .bind(&doc.mime_type)
        .bind(doc.content.as_deref())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn create_extraction(&self, extraction: NewExtraction) -> Result<Extraction, StoreError> {
        Ok(sqlx::query_as::<_, Extraction>(
            r#"
            INSERT INTO extractions
                (id, doc_id, idp_request_id, extraction_json, extraction_version, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, doc_id, idp_request_id, extraction_json, extraction_version, status, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(extraction.doc_id)
        .bind(&extraction.idp_request_id)
        .bind(&extraction.extraction_json)
        .bind(&extraction.extraction_version)
        .bind(extraction.status.as_str())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_parsed_extraction(&self, doc_id: Uuid) -> Result<Option<Extraction>, StoreError> {
        Ok(sqlx::query_as::<_, Extraction>(
            r#"
            SELECT id, doc_id, idp_request_id, extraction_json, extraction_version, status, created_at
            FROM extractions
            WHERE doc_id = $1 AND status = 'PARSED'
            ORDER BY created_at ASC, seq ASC
            LIMIT 1
            "#,
        )
        .bind(doc_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_job(&self, job_id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_job_by_ref(&self, external_job_ref: &str) -> Result<Option<Job>, StoreError> {
        Ok(
            sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE external_job_ref = $1")
                .bind(external_job_ref)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_job(&self, job: NewJob) -> Result<(Job, bool), StoreError> {
        // DO NOTHING returns no row on conflict; fall back to reading the winner.
        let inserted = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (id, external_job_ref, role_id, jd_doc_id, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (external_job_ref) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&job.external_job_ref)
        .bind(job.role_id)
        .bind(job.jd_doc_id)
        .bind(JobStatus::Pending.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(job) = inserted {
            return Ok((job, true));
        }

        let existing = self
            .find_job_by_ref(&job.external_job_ref)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "Job",
                id: job.external_job_ref.clone(),
            })?;
        Ok((existing, false))
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        Ok(
            sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_jobs_with_status(&self, status: JobStatus) -> Result<Vec<Job>, StoreError> {
        Ok(sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE status = $1 ORDER BY updated_at ASC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_job_jd(&self, job_id: Uuid, jd_doc_id: Uuid) -> Result<Job, StoreError> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET jd_doc_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(job_id)
        .bind(jd_doc_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::job_not_found(job_id))
    }

    async fn set_job_role(&self, job_id: Uuid, role_id: Uuid) -> Result<Job, StoreError> {
        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET role_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(job_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::job_not_found(job_id))
    }

    async fn update_job_status(&self, job_id: Uuid, status: JobStatus) -> Result<Job, StoreError> {
        let predecessors: Vec<String> = status
            .allowed_predecessors()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        // Compare-and-set: the WHERE clause carries the transition rule.
        let updated = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = $2, updated_at = now()
            WHERE id = $1 AND status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(&predecessors)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(job) => Ok(job),
            None => {
                let current = self
                    .find_job(job_id)
                    .await?
                    .ok_or_else(|| StoreError::job_not_found(job_id))?;
                Err(StoreError::InvalidTransition {
                    job_id,
                    from: current.status,
                    to: status,
                })
            }
        }
    }

    async fn upsert_job_resume(
        &self,
        job_id: Uuid,
        resume_doc_id: Uuid,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO job_resumes (job_id, resume_doc_id)
            VALUES ($1, $2)
            ON CONFLICT (job_id, resume_doc_id) DO NOTHING
            "#,
        )
        .bind(job_id)
        .bind(resume_doc_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_job_resumes(&self, job_id: Uuid) -> Result<Vec<Document>, StoreError> {
        Ok(sqlx::query_as::<_, Document>(
            r#"
            SELECT d.*
            FROM job_resumes jr
            JOIN documents d ON d.id = jr.resume_doc_id
            WHERE jr.job_id = $1
            ORDER BY jr.seq ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_score(&self, score: NewScore) -> Result<Score, StoreError> {
        Ok(sqlx::query_as::<_, Score>(
            r#"
            INSERT INTO scores (job_id, resume_doc_id, model_version, final_score, reasons_json)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_id, resume_doc_id, model_version) DO UPDATE
                SET final_score = EXCLUDED.final_score,
                    reasons_json = EXCLUDED.reasons_json,
                    updated_at = now()
            RETURNING *
            "#,
        )
        .bind(score.job_id)
        .bind(score.resume_doc_id)
        .bind(&score.model_version)
        .bind(score.final_score)
        .bind(&score.reasons_json)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_scores(&self, job_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM scores WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_scores(
        &self,
        job_id: Uuid,
        model_version: &str,
    ) -> Result<Vec<Score>, StoreError> {
        Ok(sqlx::query_as::<_, Score>(
            r#"
            SELECT s.*
            FROM scores s
            LEFT JOIN job_resumes jr
                ON jr.job_id = s.job_id AND jr.resume_doc_id = s.resume_doc_id
            WHERE s.job_id = $1 AND s.model_version = $2
            ORDER BY s.final_score DESC, jr.seq ASC NULLS LAST, s.created_at ASC
            "#,
        )
        .bind(job_id)
        .bind(model_version)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_role(&self, role: NewRole) -> Result<Role, StoreError> {
        Ok(sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, external_job_ref, title, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (external_job_ref) DO UPDATE
                SET title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    updated_at = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&role.external_job_ref)
        .bind(&role.title)
        .bind(&role.description)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_role_by_ref(&self, external_job_ref: &str) -> Result<Option<Role>, StoreError> {
        Ok(
            sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE external_job_ref = $1")
                .bind(external_job_ref)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(
            sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY title ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn find_webhook_delivery(
        &self,
        idempotency_key: &str,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        Ok(sqlx::query_as::<_, WebhookDelivery>(
            "SELECT * FROM webhook_deliveries WHERE idempotency_key = $1",
        )
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_webhook_delivery(&self, delivery: WebhookDelivery) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_deliveries (idempotency_key, external_job_ref, result_json, received_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(&delivery.idempotency_key)
        .bind(&delivery.external_job_ref)
        .bind(&delivery.result_json)
        .bind(delivery.received_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
