use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::job::{Job, JobStatus, NewJob};
use crate::pipeline::ingest::{attach_jd, attach_resume, ExtractOutcome};
use crate::pipeline::reports::{JobStatusReport, RankingEntry};
use crate::state::AppState;
use crate::store::Store;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub external_job_ref: String,
    pub role_id: Option<Uuid>,
    pub jd_doc_id: Option<Uuid>,
    #[serde(default)]
    pub resume_doc_ids: Vec<Uuid>,
    #[serde(default)]
    pub auto_start: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub created: bool,
    pub status: JobStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResumesRequest {
    pub resume_doc_ids: Vec<Uuid>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResumesResponse {
    pub job_id: Uuid,
    pub attached: usize,
    pub total: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractRequest {
    pub jd_folder_ref: String,
    pub resume_folder_ref: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

async fn attach_resume_ids(
    store: &dyn Store,
    job_id: Uuid,
    resume_doc_ids: &[Uuid],
) -> Result<usize, AppError> {
    let mut attached = 0;
    for doc_id in resume_doc_ids {
        let doc = store
            .find_document(*doc_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Document {doc_id} not found")))?;
        if attach_resume(store, job_id, &doc).await? {
            attached += 1;
        }
    }
    Ok(attached)
}

/// POST /api/jobs
/// Creates the job, or returns the existing one for the same `externalJobRef`.
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<CreateJobResponse>), AppError> {
    let external_ref = req.external_job_ref.trim();
    if external_ref.is_empty() {
        return Err(AppError::Validation("externalJobRef is required".into()));
    }
    let store = state.store.as_ref();

    let jd = match req.jd_doc_id {
        Some(doc_id) => Some(
            store
                .find_document(doc_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Document {doc_id} not found")))?,
        ),
        None => None,
    };

    // A role registered before the job links by its ref.
    let role_id = match req.role_id {
        Some(role_id) => Some(role_id),
        None => store.find_role_by_ref(external_ref).await?.map(|r| r.id),
    };

    let (mut job, created) = store
        .create_job(NewJob {
            external_job_ref: external_ref.to_string(),
            role_id,
            jd_doc_id: None,
        })
        .await?;
    if let Some(jd) = &jd {
        attach_jd(store, job.id, jd).await?;
    }
    if let (Some(role_id), false) = (req.role_id, created) {
        store.set_job_role(job.id, role_id).await?;
    }
    attach_resume_ids(store, job.id, &req.resume_doc_ids).await?;

    if req.auto_start {
        job = state.pipeline.enqueue(job.id).await?;
    }

    info!(job_id = %job.id, external_job_ref = %external_ref, created, "Job create request");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(CreateJobResponse {
            job_id: job.id,
            created,
            status: job.status,
        }),
    ))
}

/// GET /api/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(state.store.list_jobs().await?))
}

/// GET /api/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .store
        .find_job(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))?;
    Ok(Json(job))
}

/// POST /api/jobs/:id/resumes
pub async fn handle_attach_resumes(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttachResumesRequest>,
) -> Result<Json<AttachResumesResponse>, AppError> {
    let store = state.store.as_ref();
    if store.find_job(id).await?.is_none() {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    let attached = attach_resume_ids(store, id, &req.resume_doc_ids).await?;
    let total = store.list_job_resumes(id).await?.len();
    Ok(Json(AttachResumesResponse {
        job_id: id,
        attached,
        total,
    }))
}

/// POST /api/jobs/:id/process
pub async fn handle_process_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let job = state.pipeline.enqueue(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// POST /api/jobs/:id/rerun
pub async fn handle_rerun_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let job = state.pipeline.rerun(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            job_id: job.id,
            status: job.status,
        }),
    ))
}

/// POST /api/jobs/:id/extract
pub async fn handle_extract_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExtractRequest>,
) -> Result<(StatusCode, Json<ExtractOutcome>), AppError> {
    let outcome = state
        .pipeline
        .extract_job(
            state.idp.as_ref(),
            id,
            &req.jd_folder_ref,
            &req.resume_folder_ref,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// GET /api/jobs/:id/status
pub async fn handle_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusReport>, AppError> {
    Ok(Json(state.pipeline.job_status(id).await?))
}

/// GET /api/jobs/:id/rankings
pub async fn handle_rankings(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RankingEntry>>, AppError> {
    Ok(Json(state.pipeline.rankings(id).await?))
}
