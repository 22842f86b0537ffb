//! Job Processor: drives jobs PENDING → PROCESSING → READY | ERROR.
//!
//! `Pipeline` is the handle the HTTP layer holds. It owns the work queue,
//! performs the PENDING resets for enqueue/rerun, and ingests webhook
//! deliveries. The actual run lives in `processor::JobProcessor`.

pub mod ingest;
pub mod processor;
pub mod queue;
pub mod reports;
pub mod webhook;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::grading::GradingEngine;
use crate::idp::{IdpAdapter, IdpError};
use crate::models::job::{Job, JobStatus};
use crate::store::{Store, StoreError};

pub use processor::{JobOutcome, JobProcessor};
pub use queue::JobQueue;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    #[error("Job {0} has no job description document")]
    MissingJd(Uuid),

    #[error("Job description {doc_id} of job {job_id} has no parsed extraction")]
    JdNotExtracted { job_id: Uuid, doc_id: Uuid },

    #[error("Job {0} has no resume with a parsed extraction")]
    NoParsedResumes(Uuid),

    #[error("No score could be written for job {0}")]
    NoScoresWritten(Uuid),

    #[error("Job {job_id} is {status} and cannot be claimed")]
    NotClaimable { job_id: Uuid, status: JobStatus },

    #[error("Job {0} is currently processing")]
    AlreadyProcessing(Uuid),

    #[error("Job {job_id} is not ready (status {status})")]
    NotReady { job_id: Uuid, status: JobStatus },

    #[error("{0}")]
    Validation(String),

    #[error("Webhook signature is missing or invalid")]
    InvalidSignature,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Idp(#[from] IdpError),
}

/// Shared handle over the store and the running work queue.
#[derive(Clone)]
pub struct Pipeline {
    store: Arc<dyn Store>,
    queue: Arc<JobQueue>,
    model_version: String,
}

impl Pipeline {
    /// Builds the processor and starts `config.worker_pool_size` workers.
    pub fn start(
        store: Arc<dyn Store>,
        idp: Arc<dyn IdpAdapter>,
        grader: Arc<dyn GradingEngine>,
        config: &PipelineConfig,
        fallback_to_fixtures: bool,
    ) -> Self {
        let processor = Arc::new(JobProcessor::new(
            store.clone(),
            idp,
            grader,
            config.model_version.clone(),
            fallback_to_fixtures,
        ));
        let queue = Arc::new(JobQueue::start(processor, config.worker_pool_size));
        Self {
            store,
            queue,
            model_version: config.model_version.clone(),
        }
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobOutcome> {
        self.queue.subscribe()
    }

    async fn load_job(&self, job_id: Uuid) -> Result<Job, PipelineError> {
        self.store
            .find_job(job_id)
            .await?
            .ok_or(PipelineError::JobNotFound(job_id))
    }

    /// Queues a job for processing. READY and ERROR jobs are reset to PENDING
    /// first; a job already PROCESSING is left alone.
    pub async fn enqueue(&self, job_id: Uuid) -> Result<Job, PipelineError> {
        let job = self.load_job(job_id).await?;
        let job = match job.status {
            JobStatus::Processing => {
                info!(%job_id, "Job already processing, not re-queued");
                return Ok(job);
            }
            JobStatus::Pending => job,
            JobStatus::Ready | JobStatus::Error => {
                self.store
                    .update_job_status(job_id, JobStatus::Pending)
                    .await?
            }
        };
        self.queue.submit(job_id)?;
        Ok(job)
    }

    /// Clears the job's scores, resets it to PENDING and queues it again.
    /// Documents and extractions are kept.
    ///
    /// Scores are deleted while the job is still READY or ERROR, where no
    /// worker can claim it. A job that is already PENDING keeps its scores
    /// until its queued run overwrites them.
    pub async fn rerun(&self, job_id: Uuid) -> Result<Job, PipelineError> {
        let job = self.load_job(job_id).await?;
        match job.status {
            JobStatus::Processing => return Err(PipelineError::AlreadyProcessing(job_id)),
            JobStatus::Ready | JobStatus::Error => {
                let deleted = self.store.delete_scores(job_id).await?;
                info!(%job_id, deleted, "Rerun requested, scores cleared");
            }
            JobStatus::Pending => {
                debug!(%job_id, "Rerun requested for a pending job");
            }
        }

        let job = match self
            .store
            .update_job_status(job_id, JobStatus::Pending)
            .await
        {
            Ok(job) => job,
            Err(StoreError::InvalidTransition { .. }) => {
                return Err(PipelineError::AlreadyProcessing(job_id))
            }
            Err(e) => return Err(e.into()),
        };

        self.queue.submit(job_id)?;
        Ok(job)
    }

    /// Marks jobs left PROCESSING by a previous process as ERROR.
    pub async fn recover_interrupted(&self) -> Result<usize, PipelineError> {
        let stuck = self
            .store
            .list_jobs_with_status(JobStatus::Processing)
            .await?;
        for job in &stuck {
            warn!(job_id = %job.id, "Job was interrupted mid-run, marking ERROR");
            self.store
                .update_job_status(job.id, JobStatus::Error)
                .await?;
        }
        Ok(stuck.len())
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::extraction::fixtures;
    use crate::grading::Grader;
    use crate::idp::FixtureIdpAdapter;
    use crate::models::document::{DocType, ExtractionStatus, NewDocument, NewExtraction};
    use crate::models::job::NewJob;
    use crate::store::MemoryStore;

    pub fn pipeline_with(store: Arc<dyn Store>) -> Pipeline {
        Pipeline::start(
            store,
            Arc::new(FixtureIdpAdapter::new(Duration::ZERO)),
            Arc::new(Grader::heuristic_only()),
            &PipelineConfig::default(),
            false,
        )
    }

    pub fn memory_pipeline() -> (Arc<MemoryStore>, Pipeline) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_with(store.clone());
        (store, pipeline)
    }

    pub async fn add_document(
        store: &dyn Store,
        key: &str,
        doc_type: DocType,
        extraction: Option<serde_json::Value>,
    ) -> Uuid {
        let doc = store
            .upsert_document(NewDocument {
                doc_key: key.to_string(),
                doc_type,
                job_number: "JOB-T".to_string(),
                content_hash: format!("hash-{key}"),
                mime_type: "application/json".to_string(),
                content: None,
            })
            .await
            .unwrap();
        if let Some(json) = extraction {
            store
                .create_extraction(NewExtraction {
                    doc_id: doc.id,
                    idp_request_id: "test".to_string(),
                    extraction_json: json,
                    extraction_version: "v1".to_string(),
                    status: ExtractionStatus::Parsed,
                })
                .await
                .unwrap();
        }
        doc.id
    }

    /// A job with the fixture JD and `resumes` fixture resumes, all extracted.
    pub async fn seeded_job(store: &dyn Store, external_ref: &str, resumes: usize) -> Uuid {
        let jd = add_document(
            store,
            &format!("{external_ref}-jd"),
            DocType::Jd,
            Some(fixtures::job_description()),
        )
        .await;
        let (job, _) = store
            .create_job(NewJob {
                external_job_ref: external_ref.to_string(),
                role_id: None,
                jd_doc_id: Some(jd),
            })
            .await
            .unwrap();
        for (i, resume) in fixtures::resumes().into_iter().take(resumes).enumerate() {
            let doc =
                add_document(store, &format!("{external_ref}-r{i}"), DocType::Resume, Some(resume))
                    .await;
            store.upsert_job_resume(job.id, doc).await.unwrap();
        }
        job.id
    }

    pub async fn next_outcome(
        rx: &mut broadcast::Receiver<JobOutcome>,
        job_id: Uuid,
    ) -> JobOutcome {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Ok(outcome) = rx.recv().await {
                    if outcome.job_id == job_id {
                        return outcome;
                    }
                }
            }
        })
        .await
        .expect("job outcome within timeout")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_enqueue_runs_job_to_ready() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-E1", 2).await;
        let mut rx = pipeline.subscribe();

        pipeline.enqueue(job_id).await.unwrap();
        let outcome = next_outcome(&mut rx, job_id).await;

        assert_eq!(outcome.status, JobStatus::Ready);
        assert_eq!(outcome.graded, 2);
        assert_eq!(store.list_scores(job_id, "v1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_twice_does_not_duplicate_scores() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-E2", 3).await;
        let mut rx = pipeline.subscribe();

        pipeline.enqueue(job_id).await.unwrap();
        next_outcome(&mut rx, job_id).await;

        pipeline.rerun(job_id).await.unwrap();
        // The second call may land while the first rerun is already running.
        match pipeline.rerun(job_id).await {
            Ok(_) | Err(PipelineError::AlreadyProcessing(_)) => {}
            Err(e) => panic!("unexpected rerun error: {e}"),
        }

        let outcome = next_outcome(&mut rx, job_id).await;
        assert_eq!(outcome.status, JobStatus::Ready);
        // Let any duplicate queue entry drain.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let job = store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(store.list_scores(job_id, "v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rerun_after_double_enqueue_keeps_every_score() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-E5", 3).await;
        let mut rx = pipeline.subscribe();

        pipeline.enqueue(job_id).await.unwrap();
        pipeline.enqueue(job_id).await.unwrap();
        assert_eq!(next_outcome(&mut rx, job_id).await.status, JobStatus::Ready);

        pipeline.rerun(job_id).await.unwrap();
        let outcome = next_outcome(&mut rx, job_id).await;
        assert_eq!(outcome.status, JobStatus::Ready);
        assert_eq!(outcome.graded, 3);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
        let job = store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Ready);
        assert_eq!(store.list_scores(job_id, "v1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_rerun_clears_scores_of_finished_job() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-E6", 1).await;
        store
            .upsert_score(crate::models::job::NewScore {
                job_id,
                resume_doc_id: Uuid::new_v4(),
                model_version: "v1".to_string(),
                final_score: 10,
                reasons_json: serde_json::json!(["a", "b", "c"]),
            })
            .await
            .unwrap();
        for status in [JobStatus::Processing, JobStatus::Error] {
            store.update_job_status(job_id, status).await.unwrap();
        }
        let mut rx = pipeline.subscribe();

        pipeline.rerun(job_id).await.unwrap();
        assert_eq!(next_outcome(&mut rx, job_id).await.status, JobStatus::Ready);
        // Only the score of the run itself is left.
        assert_eq!(store.list_scores(job_id, "v1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rerun_unknown_job_is_not_found() {
        let (_store, pipeline) = memory_pipeline();
        assert!(matches!(
            pipeline.rerun(Uuid::new_v4()).await,
            Err(PipelineError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_recover_marks_processing_jobs_as_error() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-E3", 1).await;
        store
            .update_job_status(job_id, JobStatus::Processing)
            .await
            .unwrap();

        assert_eq!(pipeline.recover_interrupted().await.unwrap(), 1);
        let job = store.find_job(job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_rerun_rejects_processing_job() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-E4", 1).await;
        store
            .update_job_status(job_id, JobStatus::Processing)
            .await
            .unwrap();
        assert!(matches!(
            pipeline.rerun(job_id).await,
            Err(PipelineError::AlreadyProcessing(_))
        ));
    }
}
