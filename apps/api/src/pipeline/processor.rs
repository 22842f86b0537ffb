use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::extraction::{fixtures, job_description_from, resume_from};
use crate::grading::GradingEngine;
use crate::idp::IdpAdapter;
use crate::models::document::{DocType, Document, Extraction, ExtractionStatus, NewExtraction};
use crate::models::job::{Job, JobStatus, NewScore};
use crate::pipeline::PipelineError;
use crate::store::{Store, StoreError};

pub const EXTRACTION_VERSION: &str = "v1";

/// Why one resume contributed no score. Raised where the failure happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumeFailureKind {
    /// No PARSED extraction: never extracted, or the provider failed.
    Extraction { detail: String },
    /// Graded, but the score could not be stored.
    Grading { detail: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedResume {
    pub resume_doc_id: Uuid,
    #[serde(flatten)]
    pub failure: ResumeFailureKind,
}

/// Result of one `run_job`, broadcast by the queue.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub graded: usize,
    pub skipped: Vec<SkippedResume>,
    pub error: Option<String>,
}

pub struct JobProcessor {
    store: Arc<dyn Store>,
    idp: Arc<dyn IdpAdapter>,
    grader: Arc<dyn GradingEngine>,
    model_version: String,
    fallback_to_fixtures: bool,
}

struct GradingRun {
    graded: usize,
    skipped: Vec<SkippedResume>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        idp: Arc<dyn IdpAdapter>,
        grader: Arc<dyn GradingEngine>,
        model_version: String,
        fallback_to_fixtures: bool,
    ) -> Self {
        Self {
            store,
            idp,
            grader,
            model_version,
            fallback_to_fixtures,
        }
    }

    /// Claims a PENDING job and runs it to READY or ERROR.
    ///
    /// `Err` means the job was never claimed (unknown, or not PENDING). Once
    /// claimed, every failure is absorbed into an ERROR outcome.
    pub async fn run_job(&self, job_id: Uuid) -> Result<JobOutcome, PipelineError> {
        let job = match self
            .store
            .update_job_status(job_id, JobStatus::Processing)
            .await
        {
            Ok(job) => job,
            Err(StoreError::InvalidTransition { from, .. }) => {
                return Err(PipelineError::NotClaimable {
                    job_id,
                    status: from,
                })
            }
            Err(StoreError::NotFound { .. }) => return Err(PipelineError::JobNotFound(job_id)),
            Err(e) => return Err(e.into()),
        };
        info!(%job_id, external_job_ref = %job.external_job_ref, "Processing job");

        match self.grade_job(&job).await {
            Ok(run) => {
                self.store
                    .update_job_status(job_id, JobStatus::Ready)
                    .await?;
                info!(%job_id, graded = run.graded, skipped = run.skipped.len(), "Job ready");
                Ok(JobOutcome {
                    job_id,
                    status: JobStatus::Ready,
                    graded: run.graded,
                    skipped: run.skipped,
                    error: None,
                })
            }
            Err(e) => {
                error!(%job_id, "Job failed: {e}");
                self.store
                    .update_job_status(job_id, JobStatus::Error)
                    .await?;
                Ok(JobOutcome {
                    job_id,
                    status: JobStatus::Error,
                    graded: 0,
                    skipped: Vec::new(),
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Marks a claimed job ERROR when its run ended without an outcome.
    pub async fn abandon(&self, job_id: Uuid, detail: String) -> Result<JobOutcome, PipelineError> {
        self.store
            .update_job_status(job_id, JobStatus::Error)
            .await?;
        error!(%job_id, "Job abandoned: {detail}");
        Ok(JobOutcome {
            job_id,
            status: JobStatus::Error,
            graded: 0,
            skipped: Vec::new(),
            error: Some(detail),
        })
    }

    async fn grade_job(&self, job: &Job) -> Result<GradingRun, PipelineError> {
        let jd_doc_id = job.jd_doc_id.ok_or(PipelineError::MissingJd(job.id))?;
        let jd_doc = self
            .store
            .find_document(jd_doc_id)
            .await?
            .ok_or(PipelineError::MissingJd(job.id))?;
        let jd_extraction =
            self.ensure_extraction(&jd_doc)
                .await?
                .ok_or(PipelineError::JdNotExtracted {
                    job_id: job.id,
                    doc_id: jd_doc_id,
                })?;

        let mut skipped = Vec::new();
        let mut ready = Vec::new();
        for resume_doc in self.store.list_job_resumes(job.id).await? {
            match self.ensure_extraction(&resume_doc).await? {
                Some(extraction) => ready.push((resume_doc.id, extraction)),
                None => {
                    debug!(job_id = %job.id, doc_id = %resume_doc.id, "Resume not extracted, skipping");
                    skipped.push(SkippedResume {
                        resume_doc_id: resume_doc.id,
                        failure: ResumeFailureKind::Extraction {
                            detail: "no parsed extraction".to_string(),
                        },
                    });
                }
            }
        }
        if ready.is_empty() {
            return Err(PipelineError::NoParsedResumes(job.id));
        }

        let jd = job_description_from(&jd_extraction.extraction_json);
        let mut graded = 0;
        for (resume_doc_id, extraction) in ready {
            let resume = resume_from(&extraction.extraction_json);
            let result = self.grader.grade(&jd, &resume).await;
            debug!(
                job_id = %job.id,
                %resume_doc_id,
                score = result.final_score,
                source = ?result.source,
                "Graded resume"
            );

            let stored = self
                .store
                .upsert_score(NewScore {
                    job_id: job.id,
                    resume_doc_id,
                    model_version: self.model_version.clone(),
                    final_score: i32::from(result.final_score),
                    reasons_json: json!(result.top_reasons),
                })
                .await;
            match stored {
                Ok(_) => graded += 1,
                Err(e) => {
                    warn!(job_id = %job.id, %resume_doc_id, "Could not store score: {e}");
                    skipped.push(SkippedResume {
                        resume_doc_id,
                        failure: ResumeFailureKind::Grading {
                            detail: e.to_string(),
                        },
                    });
                }
            }
        }

        if graded == 0 {
            return Err(PipelineError::NoScoresWritten(job.id));
        }
        Ok(GradingRun { graded, skipped })
    }

    /// Returns the document's authoritative extraction, asking the IDP for one
    /// if it has raw content but no PARSED extraction yet.
    async fn ensure_extraction(
        &self,
        doc: &Document,
    ) -> Result<Option<Extraction>, PipelineError> {
        if let Some(existing) = self.store.find_parsed_extraction(doc.id).await? {
            return Ok(Some(existing));
        }
        let Some(content) = doc.content.as_deref() else {
            return Ok(None);
        };

        let (payload, request_id) = match self.idp.extract_document(doc, content).await {
            Ok(payload) => (payload, format!("{}_{}", self.idp.name(), doc.id.simple())),
            Err(e) if self.fallback_to_fixtures => {
                warn!(doc_id = %doc.id, "IDP extraction failed, using fixture data: {e}");
                let payload = match doc.doc_type {
                    DocType::Jd => fixtures::job_description(),
                    DocType::Resume => fixtures::resume_for_hash(&doc.content_hash),
                };
                (payload, format!("fixture_{}", doc.id.simple()))
            }
            Err(e) => {
                warn!(doc_id = %doc.id, "IDP extraction failed: {e}");
                self.store
                    .create_extraction(NewExtraction {
                        doc_id: doc.id,
                        idp_request_id: format!("{}_{}", self.idp.name(), doc.id.simple()),
                        extraction_json: json!({ "error": e.to_string() }),
                        extraction_version: EXTRACTION_VERSION.to_string(),
                        status: ExtractionStatus::Failed,
                    })
                    .await?;
                return Ok(None);
            }
        };

        // Another writer may have won while the provider was working.
        if let Some(existing) = self.store.find_parsed_extraction(doc.id).await? {
            return Ok(Some(existing));
        }
        let extraction = self
            .store
            .create_extraction(NewExtraction {
                doc_id: doc.id,
                idp_request_id: request_id,
                extraction_json: payload,
                extraction_version: EXTRACTION_VERSION.to_string(),
                status: ExtractionStatus::Parsed,
            })
            .await?;
        info!(doc_id = %doc.id, doc_type = %doc.doc_type, "Extraction materialized");
        Ok(Some(extraction))
    }
}
