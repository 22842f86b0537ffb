use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::UnknownVariant;

/// Job lifecycle: PENDING → PROCESSING → READY | ERROR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    Ready,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Ready => "READY",
            JobStatus::Error => "ERROR",
        }
    }

    /// States a job may be in immediately before moving to `self`.
    ///
    /// PENDING is re-enterable from any state except PROCESSING (enqueue/rerun reset);
    /// a running job is never reset underneath its worker.
    pub fn allowed_predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[JobStatus::Pending, JobStatus::Ready, JobStatus::Error],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Ready | JobStatus::Error => &[JobStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "READY" => Ok(JobStatus::Ready),
            "ERROR" => Ok(JobStatus::Error),
            _ => Err(UnknownVariant {
                kind: "job status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, UnknownVariant> {
        value.parse()
    }
}

/// One hiring-campaign run. `external_job_ref` is the natural idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub external_job_ref: String,
    pub role_id: Option<Uuid>,
    pub jd_doc_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobResume {
    pub job_id: Uuid,
    pub resume_doc_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Grading output for one (job, resume) pair under one model version.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Score {
    pub job_id: Uuid,
    pub resume_doc_id: Uuid,
    pub model_version: String,
    pub final_score: i32,
    /// JSON array of exactly three strings.
    pub reasons_json: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Score {
    pub fn reasons(&self) -> Vec<String> {
        self.reasons_json
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| r.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Descriptive metadata for a position, keyed by `external_job_ref`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub external_job_ref: String,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A processed webhook delivery, replayed when the same idempotency key arrives again.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookDelivery {
    pub idempotency_key: String,
    pub external_job_ref: String,
    pub result_json: Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub external_job_ref: String,
    pub role_id: Option<Uuid>,
    pub jd_doc_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewScore {
    pub job_id: Uuid,
    pub resume_doc_id: Uuid,
    pub model_version: String,
    pub final_score: i32,
    pub reasons_json: Value,
}

#[derive(Debug, Clone)]
pub struct NewRole {
    pub external_job_ref: String,
    pub title: String,
    pub description: Option<String>,
}
