//! Document ingestion: uploads, manual extraction paste, and IDP batches all
//! land here before a job can be processed.

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::extraction::{group_by_job, normalize, validate, JobBatch, NormalizedExtraction};
use crate::idp::{IdpAdapter, IdpError, IdpRequestStatus};
use crate::models::document::{DocType, Document, ExtractionStatus, NewDocument, NewExtraction};
use crate::models::job::Job;
use crate::pipeline::processor::EXTRACTION_VERSION;
use crate::pipeline::{Pipeline, PipelineError};
use crate::store::Store;

pub const JSON_MIME: &str = "application/json";

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Serializes with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.into_iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String(key.clone()).to_string());
                    out.push(':');
                    write(&map[key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            scalar => out.push_str(&scalar.to_string()),
        }
    }

    let mut out = String::new();
    write(value, &mut out);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Request / outcome types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub doc_type: DocType,
    pub job_number: String,
    pub mime_type: String,
    pub content: Bytes,
    /// Attach the document to this job once stored.
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ManualExtractionRequest {
    pub doc_type: DocType,
    pub job_number: String,
    pub extraction: Value,
    pub job_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub document: Document,
    /// `true` when an identical JD was already stored and reused.
    pub deduplicated: bool,
    pub extraction_created: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestCounts {
    pub documents_created: usize,
    pub extractions_created: usize,
    pub job_resumes_created: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractOutcome {
    pub request_id: String,
    pub status: IdpRequestStatus,
    /// Present when the adapter delivered extractions synchronously.
    pub ingested: Option<IngestCounts>,
}

// ────────────────────────────────────────────────────────────────────────────
// Document storage
// ────────────────────────────────────────────────────────────────────────────

/// Stores a JD, reusing an existing JD with the same content hash.
/// Returns the document and whether it was newly created.
pub async fn store_jd(
    store: &dyn Store,
    job_number: &str,
    content_hash: String,
    mime_type: &str,
    content: Vec<u8>,
) -> Result<(Document, bool), PipelineError> {
    if let Some(existing) = store.find_jd_by_hash(&content_hash).await? {
        debug!(doc_id = %existing.id, "JD already stored, reusing");
        return Ok((existing, false));
    }
    let doc = store
        .upsert_document(NewDocument {
            doc_key: format!("jd_{content_hash}"),
            doc_type: DocType::Jd,
            job_number: job_number.to_string(),
            content_hash,
            mime_type: mime_type.to_string(),
            content: Some(content),
        })
        .await?;
    Ok((doc, true))
}

/// Get-or-create a resume by document key.
pub async fn store_resume(
    store: &dyn Store,
    doc_key: String,
    job_number: &str,
    mime_type: &str,
    content: Vec<u8>,
) -> Result<(Document, bool), PipelineError> {
    if let Some(existing) = store.find_document_by_key(&doc_key).await? {
        return Ok((existing, false));
    }
    let doc = store
        .upsert_document(NewDocument {
            doc_key,
            doc_type: DocType::Resume,
            job_number: job_number.to_string(),
            content_hash: sha256_hex(&content),
            mime_type: mime_type.to_string(),
            content: Some(content),
        })
        .await?;
    Ok((doc, true))
}

/// Creates a PARSED extraction unless the document already has one.
pub async fn ensure_parsed_extraction(
    store: &dyn Store,
    doc_id: Uuid,
    idp_request_id: &str,
    extraction_json: Value,
    extraction_version: &str,
) -> Result<bool, PipelineError> {
    if store.find_parsed_extraction(doc_id).await?.is_some() {
        return Ok(false);
    }
    store
        .create_extraction(NewExtraction {
            doc_id,
            idp_request_id: idp_request_id.to_string(),
            extraction_json,
            extraction_version: extraction_version.to_string(),
            status: ExtractionStatus::Parsed,
        })
        .await?;
    Ok(true)
}

pub async fn attach_jd(store: &dyn Store, job_id: Uuid, doc: &Document) -> Result<(), PipelineError> {
    if doc.doc_type != DocType::Jd {
        return Err(PipelineError::Validation(format!(
            "Document {} is not a job description",
            doc.id
        )));
    }
    store.set_job_jd(job_id, doc.id).await?;
    Ok(())
}

pub async fn attach_resume(
    store: &dyn Store,
    job_id: Uuid,
    doc: &Document,
) -> Result<bool, PipelineError> {
    if doc.doc_type != DocType::Resume {
        return Err(PipelineError::Validation(format!(
            "Document {} is not a resume",
            doc.id
        )));
    }
    Ok(store.upsert_job_resume(job_id, doc.id).await?)
}

async fn attach(store: &dyn Store, job_id: Option<Uuid>, doc: &Document) -> Result<(), PipelineError> {
    let Some(job_id) = job_id else {
        return Ok(());
    };
    if store.find_job(job_id).await?.is_none() {
        return Err(PipelineError::JobNotFound(job_id));
    }
    match doc.doc_type {
        DocType::Jd => attach_jd(store, job_id, doc).await,
        DocType::Resume => attach_resume(store, job_id, doc).await.map(|_| ()),
    }
}

/// Stores an uploaded file. Identical JD content dedups to one document;
/// every resume upload is a new document.
pub async fn upload_document(
    store: &dyn Store,
    request: UploadRequest,
) -> Result<UploadOutcome, PipelineError> {
    if request.content.is_empty() {
        return Err(PipelineError::Validation("Uploaded file is empty".into()));
    }
    if request.job_number.trim().is_empty() {
        return Err(PipelineError::Validation("jobNumber is required".into()));
    }

    let (document, created) = match request.doc_type {
        DocType::Jd => {
            let hash = sha256_hex(&request.content);
            store_jd(
                store,
                &request.job_number,
                hash,
                &request.mime_type,
                request.content.to_vec(),
            )
            .await?
        }
        DocType::Resume => {
            let key = format!("resume_{}_{}", request.job_number, Uuid::new_v4().simple());
            store_resume(
                store,
                key,
                &request.job_number,
                &request.mime_type,
                request.content.to_vec(),
            )
            .await?
        }
    };
    attach(store, request.job_id, &document).await?;

    info!(
        doc_id = %document.id,
        doc_type = %document.doc_type,
        deduplicated = !created,
        "Document uploaded"
    );
    Ok(UploadOutcome {
        document,
        deduplicated: !created,
        extraction_created: false,
    })
}

/// Stores pasted extraction JSON as a document with a PARSED extraction.
pub async fn ingest_manual_extraction(
    store: &dyn Store,
    request: ManualExtractionRequest,
) -> Result<UploadOutcome, PipelineError> {
    if !request.extraction.is_object() {
        return Err(PipelineError::Validation(
            "extraction must be a JSON object".into(),
        ));
    }
    if request.job_number.trim().is_empty() {
        return Err(PipelineError::Validation("jobNumber is required".into()));
    }

    let canonical = canonical_json(&request.extraction);
    let (document, created) = match request.doc_type {
        DocType::Jd => {
            store_jd(
                store,
                &request.job_number,
                sha256_hex(canonical.as_bytes()),
                JSON_MIME,
                canonical.into_bytes(),
            )
            .await?
        }
        DocType::Resume => {
            let key = format!("manual_{}_{}", request.job_number, Uuid::new_v4().simple());
            store_resume(store, key, &request.job_number, JSON_MIME, canonical.into_bytes()).await?
        }
    };
    let extraction_created = ensure_parsed_extraction(
        store,
        document.id,
        "manual",
        request.extraction,
        EXTRACTION_VERSION,
    )
    .await?;
    attach(store, request.job_id, &document).await?;

    Ok(UploadOutcome {
        document,
        deduplicated: !created,
        extraction_created,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// IDP batches
// ────────────────────────────────────────────────────────────────────────────

async fn ingest_item(
    store: &dyn Store,
    job: &Job,
    item: &NormalizedExtraction,
    request_id: &str,
    counts: &mut IngestCounts,
) -> Result<Document, PipelineError> {
    let content = canonical_json(&item.extraction_data).into_bytes();
    let (doc, created) = match item.doc_type {
        DocType::Jd => {
            store_jd(
                store,
                &job.external_job_ref,
                sha256_hex(&content),
                JSON_MIME,
                content,
            )
            .await?
        }
        DocType::Resume => {
            let key = format!("{}:{}", job.external_job_ref, item.item_id);
            store_resume(store, key, &job.external_job_ref, JSON_MIME, content).await?
        }
    };
    if created {
        counts.documents_created += 1;
    }

    match item.status {
        ExtractionStatus::Parsed => {
            if ensure_parsed_extraction(
                store,
                doc.id,
                request_id,
                item.extraction_data.clone(),
                &item.extraction_version,
            )
            .await?
            {
                counts.extractions_created += 1;
            }
        }
        ExtractionStatus::Failed => {
            warn!(item_id = %item.item_id, doc_id = %doc.id, "Recording failed extraction");
            store
                .create_extraction(NewExtraction {
                    doc_id: doc.id,
                    idp_request_id: request_id.to_string(),
                    extraction_json: item.extraction_data.clone(),
                    extraction_version: item.extraction_version.clone(),
                    status: ExtractionStatus::Failed,
                })
                .await?;
            counts.extractions_created += 1;
        }
    }
    Ok(doc)
}

/// Persists one job's normalized extractions and links them to the job.
pub async fn ingest_batch(
    store: &dyn Store,
    job: &Job,
    batch: &JobBatch,
    request_id: &str,
) -> Result<IngestCounts, PipelineError> {
    let mut counts = IngestCounts::default();

    if let Some(jd) = &batch.jd {
        let doc = ingest_item(store, job, jd, request_id, &mut counts).await?;
        attach_jd(store, job.id, &doc).await?;
    }
    for resume in &batch.resumes {
        let doc = ingest_item(store, job, resume, request_id, &mut counts).await?;
        if attach_resume(store, job.id, &doc).await? {
            counts.job_resumes_created += 1;
        }
    }

    info!(
        job_id = %job.id,
        documents = counts.documents_created,
        extractions = counts.extractions_created,
        job_resumes = counts.job_resumes_created,
        "Batch ingested"
    );
    Ok(counts)
}

impl Pipeline {
    /// Starts IDP extraction for a job. Synchronous adapters are ingested and
    /// the job enqueued right away; otherwise results arrive by webhook.
    pub async fn extract_job(
        &self,
        idp: &dyn IdpAdapter,
        job_id: Uuid,
        jd_folder_ref: &str,
        resume_folder_ref: &str,
    ) -> Result<ExtractOutcome, PipelineError> {
        let job = self.load_job(job_id).await?;
        let response = idp
            .process_job(&job.external_job_ref, jd_folder_ref, resume_folder_ref)
            .await?;

        if response.status == IdpRequestStatus::Processing {
            info!(%job_id, request_id = %response.request_id, "Extraction started, awaiting callback");
            return Ok(ExtractOutcome {
                request_id: response.request_id,
                status: response.status,
                ingested: None,
            });
        }

        let raw = match idp.get_extractions(&response.request_id).await {
            Ok(raw) => raw,
            Err(IdpError::DeliveredByWebhook { request_id }) => {
                info!(%job_id, %request_id, "Extractions arrive by callback");
                return Ok(ExtractOutcome {
                    request_id,
                    status: IdpRequestStatus::Processing,
                    ingested: None,
                });
            }
            Err(e) => return Err(e.into()),
        };
        let mut batches = group_by_job(normalize(raw));
        let batch = batches.remove(&job.external_job_ref).ok_or_else(|| {
            PipelineError::Validation(format!(
                "IDP returned no extractions for {}",
                job.external_job_ref
            ))
        })?;
        if !validate(&batch) {
            return Err(PipelineError::Validation(
                "Extraction batch needs a job description and at least one resume".into(),
            ));
        }

        let counts = ingest_batch(self.store().as_ref(), &job, &batch, &response.request_id).await?;
        self.enqueue(job_id).await?;
        Ok(ExtractOutcome {
            request_id: response.request_id,
            status: response.status,
            ingested: Some(counts),
        })
    }
}
