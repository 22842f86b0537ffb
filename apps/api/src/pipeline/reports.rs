//! Read models for the status, rankings and dashboard views.

use serde::Serialize;
use uuid::Uuid;

use crate::extraction::normalizer::candidate_name;
use crate::extraction::UNKNOWN_CANDIDATE;
use crate::models::job::{JobStatus, Role};
use crate::pipeline::{Pipeline, PipelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    Pending,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Phases {
    pub extract_jd: PhaseState,
    pub extract_resumes: Progress,
    pub grade: Progress,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatusReport {
    pub job_id: Uuid,
    pub external_job_ref: String,
    pub status: JobStatus,
    pub phases: Phases,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub resume_doc_id: Uuid,
    pub candidate: String,
    pub score: i32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleOverview {
    #[serde(flatten)]
    pub role: Role,
    pub job_id: Option<Uuid>,
    pub job_status: Option<JobStatus>,
    pub graded: usize,
}

impl Pipeline {
    pub async fn job_status(&self, job_id: Uuid) -> Result<JobStatusReport, PipelineError> {
        let job = self.load_job(job_id).await?;
        let store = self.store();

        let jd_extracted = match job.jd_doc_id {
            Some(doc_id) => store.find_parsed_extraction(doc_id).await?.is_some(),
            None => false,
        };

        let resumes = store.list_job_resumes(job_id).await?;
        let mut extracted = 0;
        for resume in &resumes {
            if store.find_parsed_extraction(resume.id).await?.is_some() {
                extracted += 1;
            }
        }
        let graded = store.list_scores(job_id, self.model_version()).await?.len();

        Ok(JobStatusReport {
            job_id,
            external_job_ref: job.external_job_ref,
            status: job.status,
            phases: Phases {
                extract_jd: if jd_extracted {
                    PhaseState::Done
                } else {
                    PhaseState::Pending
                },
                extract_resumes: Progress {
                    done: extracted,
                    total: resumes.len(),
                },
                grade: Progress {
                    done: graded,
                    total: extracted,
                },
            },
        })
    }

    /// Scored candidates, best first; equal scores keep association order.
    /// Only served once the job is READY.
    pub async fn rankings(&self, job_id: Uuid) -> Result<Vec<RankingEntry>, PipelineError> {
        let job = self.load_job(job_id).await?;
        if job.status != JobStatus::Ready {
            return Err(PipelineError::NotReady {
                job_id,
                status: job.status,
            });
        }

        let store = self.store();
        let mut entries = Vec::new();
        for score in store.list_scores(job_id, self.model_version()).await? {
            let candidate = match store.find_parsed_extraction(score.resume_doc_id).await? {
                Some(extraction) => candidate_name(&extraction.extraction_json),
                None => UNKNOWN_CANDIDATE.to_string(),
            };
            entries.push(RankingEntry {
                resume_doc_id: score.resume_doc_id,
                candidate,
                score: score.final_score,
                reasons: score.reasons(),
            });
        }
        Ok(entries)
    }

    /// Roles with the status and graded count of their job, if one exists.
    pub async fn role_overview(&self) -> Result<Vec<RoleOverview>, PipelineError> {
        let store = self.store();
        let mut overview = Vec::new();
        for role in store.list_roles().await? {
            let job = store.find_job_by_ref(&role.external_job_ref).await?;
            let graded = match &job {
                Some(job) => store.list_scores(job.id, self.model_version()).await?.len(),
                None => 0,
            };
            overview.push(RoleOverview {
                job_id: job.as_ref().map(|j| j.id),
                job_status: job.map(|j| j.status),
                graded,
                role,
            });
        }
        Ok(overview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::NewRole;
    use crate::pipeline::test_support::{memory_pipeline, next_outcome, seeded_job};
    use crate::store::Store;

    #[tokio::test]
    async fn test_rankings_refused_until_ready() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-R1", 2).await;

        assert!(matches!(
            pipeline.rankings(job_id).await,
            Err(PipelineError::NotReady {
                status: JobStatus::Pending,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_rankings_sorted_descending_with_names() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-R2", 5).await;
        let mut rx = pipeline.subscribe();
        pipeline.enqueue(job_id).await.unwrap();
        next_outcome(&mut rx, job_id).await;

        let ranking = pipeline.rankings(job_id).await.unwrap();
        assert_eq!(ranking.len(), 5);
        assert!(ranking.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(ranking.iter().all(|e| e.reasons.len() == 3));
        assert!(ranking.iter().any(|e| e.candidate == "Sarah Martinez"));
    }

    #[tokio::test]
    async fn test_status_reports_phase_progress() {
        let (store, pipeline) = memory_pipeline();
        let job_id = seeded_job(store.as_ref(), "JOB-R3", 2).await;

        let report = pipeline.job_status(job_id).await.unwrap();
        assert_eq!(report.status, JobStatus::Pending);
        assert_eq!(report.phases.extract_jd, PhaseState::Done);
        assert_eq!(report.phases.extract_resumes, Progress { done: 2, total: 2 });
        assert_eq!(report.phases.grade, Progress { done: 0, total: 2 });

        let mut rx = pipeline.subscribe();
        pipeline.enqueue(job_id).await.unwrap();
        next_outcome(&mut rx, job_id).await;
        let report = pipeline.job_status(job_id).await.unwrap();
        assert_eq!(report.phases.grade, Progress { done: 2, total: 2 });
    }

    #[tokio::test]
    async fn test_role_overview_joins_job_state() {
        let (store, pipeline) = memory_pipeline();
        store
            .upsert_role(NewRole {
                external_job_ref: "JOB-R4".to_string(),
                title: "Analyst".to_string(),
                description: None,
            })
            .await
            .unwrap();
        store
            .upsert_role(NewRole {
                external_job_ref: "JOB-NONE".to_string(),
                title: "Unstaffed".to_string(),
                description: None,
            })
            .await
            .unwrap();
        seeded_job(store.as_ref(), "JOB-R4", 1).await;

        let overview = pipeline.role_overview().await.unwrap();
        let analyst = overview.iter().find(|o| o.role.title == "Analyst").unwrap();
        assert_eq!(analyst.job_status, Some(JobStatus::Pending));
        let empty = overview.iter().find(|o| o.role.title == "Unstaffed").unwrap();
        assert!(empty.job_id.is_none());
        assert_eq!(empty.graded, 0);
    }
}
