use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{job_description_from, resume_from};
use crate::models::document::{DocType, Document, Extraction};
use crate::pipeline::ingest::{
    ingest_manual_extraction, upload_document, ManualExtractionRequest, UploadOutcome,
    UploadRequest,
};
use crate::state::AppState;

const DEFAULT_MIME: &str = "application/pdf";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualExtractionBody {
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub job_number: String,
    pub extraction: Value,
    pub job_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct DocumentView {
    pub document: Document,
    pub extraction: Option<Extraction>,
    /// The extraction mapped onto the canonical JD or resume record.
    pub normalized: Option<Value>,
}

fn text_field(name: &str, value: String) -> Result<String, AppError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }
    Ok(value)
}

/// POST /api/documents
/// Multipart fields: `type`, `jobNumber`, `file`, optional `jobId`.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadOutcome>), AppError> {
    let mut doc_type = None;
    let mut job_number = None;
    let mut job_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "type" => {
                let raw = field.text().await?;
                doc_type = Some(
                    raw.parse::<DocType>()
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                );
            }
            "jobNumber" => job_number = Some(text_field("jobNumber", field.text().await?)?),
            "jobId" => {
                let raw = field.text().await?;
                job_id = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::Validation(format!("Invalid jobId '{raw}'")))?,
                );
            }
            "file" => {
                let mime = field
                    .content_type()
                    .unwrap_or(DEFAULT_MIME)
                    .to_string();
                file = Some((mime, field.bytes().await?));
            }
            _ => {}
        }
    }

    let doc_type = doc_type.ok_or_else(|| AppError::Validation("type is required".into()))?;
    let job_number =
        job_number.ok_or_else(|| AppError::Validation("jobNumber is required".into()))?;
    let (mime_type, content) =
        file.ok_or_else(|| AppError::Validation("file is required".into()))?;

    let outcome = upload_document(
        state.store.as_ref(),
        UploadRequest {
            doc_type,
            job_number,
            mime_type,
            content,
            job_id,
        },
    )
    .await?;

    let status = if outcome.deduplicated {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

/// POST /api/documents/manual
pub async fn handle_manual_extraction(
    State(state): State<AppState>,
    Json(body): Json<ManualExtractionBody>,
) -> Result<(StatusCode, Json<UploadOutcome>), AppError> {
    let outcome = ingest_manual_extraction(
        state.store.as_ref(),
        ManualExtractionRequest {
            doc_type: body.doc_type,
            job_number: body.job_number,
            extraction: body.extraction,
            job_id: body.job_id,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/documents/:id
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentView>, AppError> {
    let document = state
        .store
        .find_document(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Document {id} not found")))?;
    let extraction = state.store.find_parsed_extraction(id).await?;

    let normalized = extraction
        .as_ref()
        .map(|e| match document.doc_type {
            DocType::Jd => serde_json::to_value(job_description_from(&e.extraction_json)),
            DocType::Resume => serde_json::to_value(resume_from(&e.extraction_json)),
        })
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Json(DocumentView {
        document,
        extraction,
        normalized,
    }))
}
