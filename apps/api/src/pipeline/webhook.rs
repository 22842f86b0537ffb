//! Inbound extraction-provider callback.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::job::{NewJob, WebhookDelivery};
use crate::pipeline::ingest::{
    attach_jd, attach_resume, canonical_json, ensure_parsed_extraction, sha256_hex, store_jd,
    store_resume, IngestCounts, JSON_MIME,
};
use crate::pipeline::processor::EXTRACTION_VERSION;
use crate::pipeline::{Pipeline, PipelineError};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_FIELD: &str = "hmac";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    #[serde(default)]
    pub external_job_ref: String,
    pub jd: Option<Value>,
    pub resumes: Option<Vec<Value>>,
    pub idempotency_key: Option<String>,
}

fn signing_input(payload: &Value) -> String {
    let mut unsigned = payload.clone();
    if let Some(obj) = unsigned.as_object_mut() {
        obj.remove(SIGNATURE_FIELD);
    }
    canonical_json(&unsigned)
}

fn mac_for(secret: &str, payload: &Value) -> Result<HmacSha256, PipelineError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| PipelineError::InvalidSignature)?;
    mac.update(signing_input(payload).as_bytes());
    Ok(mac)
}

/// Constant-time check of the payload's `hmac` field: hex HMAC-SHA256 over
/// the key-sorted payload without that field.
pub fn verify_signature(secret: &str, payload: &Value) -> Result<(), PipelineError> {
    let signature = payload
        .get(SIGNATURE_FIELD)
        .and_then(Value::as_str)
        .ok_or(PipelineError::InvalidSignature)?;
    let signature = hex::decode(signature).map_err(|_| PipelineError::InvalidSignature)?;
    mac_for(secret, payload)?
        .verify_slice(&signature)
        .map_err(|_| PipelineError::InvalidSignature)
}

impl Pipeline {
    /// Ingests a provider callback and enqueues the job once it has a JD and
    /// at least one resume. A repeated idempotency key replays the stored result.
    pub async fn process_callback(
        &self,
        raw: Value,
        secret: Option<&str>,
    ) -> Result<Value, PipelineError> {
        match secret {
            Some(secret) => verify_signature(secret, &raw)?,
            None if raw.get(SIGNATURE_FIELD).is_some() => {
                debug!("Callback carries a signature but no secret is configured, ignoring it");
            }
            None => {}
        }

        let payload: CallbackPayload = serde_json::from_value(raw)
            .map_err(|e| PipelineError::Validation(format!("Invalid callback payload: {e}")))?;
        let external_ref = payload.external_job_ref.trim().to_string();
        if external_ref.is_empty() {
            return Err(PipelineError::Validation("externalJobRef is required".into()));
        }
        let resumes = payload.resumes.unwrap_or_default();
        if payload.jd.is_none() && resumes.is_empty() {
            return Err(PipelineError::Validation(
                "Callback must include jd or resumes".into(),
            ));
        }

        let store = self.store().as_ref();
        let idempotency_key = payload
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        if let Some(key) = idempotency_key {
            if let Some(delivery) = store.find_webhook_delivery(key).await? {
                info!(idempotency_key = key, "Replaying processed callback");
                return Ok(delivery.result_json);
            }
        }
        let request_id = idempotency_key.unwrap_or("callback");

        let (job, created) = store
            .create_job(NewJob {
                external_job_ref: external_ref.clone(),
                role_id: None,
                jd_doc_id: None,
            })
            .await?;
        if created {
            info!(job_id = %job.id, external_job_ref = %external_ref, "Job created by callback");
        }

        let mut counts = IngestCounts::default();
        if let Some(jd) = payload.jd {
            let content = canonical_json(&jd).into_bytes();
            let (doc, created) =
                store_jd(store, &external_ref, sha256_hex(&content), JSON_MIME, content).await?;
            counts.documents_created += usize::from(created);
            if ensure_parsed_extraction(store, doc.id, request_id, jd, EXTRACTION_VERSION).await? {
                counts.extractions_created += 1;
            }
            attach_jd(store, job.id, &doc).await?;
        }

        for (index, resume) in resumes.into_iter().enumerate() {
            let doc_key = match idempotency_key {
                Some(key) => format!("resume_{key}_{index}"),
                None => format!("resume_{external_ref}_{}", Uuid::new_v4().simple()),
            };
            let content = canonical_json(&resume).into_bytes();
            let (doc, created) = store_resume(store, doc_key, &external_ref, JSON_MIME, content).await?;
            counts.documents_created += usize::from(created);
            if ensure_parsed_extraction(store, doc.id, request_id, resume, EXTRACTION_VERSION)
                .await?
            {
                counts.extractions_created += 1;
            }
            if attach_resume(store, job.id, &doc).await? {
                counts.job_resumes_created += 1;
            }
        }

        let job = self.load_job(job.id).await?;
        if job.jd_doc_id.is_some() && !store.list_job_resumes(job.id).await?.is_empty() {
            self.enqueue(job.id).await?;
        } else {
            warn!(job_id = %job.id, "Callback left job without a JD or resumes, not enqueued");
        }

        let result = json!({
            "status": "success",
            "result": {
                "jobId": job.id,
                "documentsCreated": counts.documents_created,
                "extractionsCreated": counts.extractions_created,
                "jobResumesCreated": counts.job_resumes_created,
            }
        });

        if let Some(key) = idempotency_key {
            store
                .record_webhook_delivery(WebhookDelivery {
                    idempotency_key: key.to_string(),
                    external_job_ref: external_ref,
                    result_json: result.clone(),
                    received_at: Utc::now(),
                })
                .await?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::fixtures;
    use crate::models::job::JobStatus;
    use crate::pipeline::test_support::{memory_pipeline, next_outcome};
    use crate::store::Store;

    fn sign_payload(secret: &str, payload: &Value) -> Result<String, PipelineError> {
        Ok(hex::encode(mac_for(secret, payload)?.finalize().into_bytes()))
    }

    fn payload(external_ref: &str, key: Option<&str>) -> Value {
        let mut payload = json!({
            "externalJobRef": external_ref,
            "jd": fixtures::job_description(),
            "resumes": fixtures::resumes().into_iter().take(2).collect::<Vec<_>>(),
        });
        if let Some(key) = key {
            payload["idempotencyKey"] = json!(key);
        }
        payload
    }

    #[tokio::test]
    async fn test_callback_creates_job_and_runs_it() {
        let (store, pipeline) = memory_pipeline();
        let mut rx = pipeline.subscribe();

        let response = pipeline
            .process_callback(payload("JOB-W1", None), None)
            .await
            .unwrap();
        assert_eq!(response["status"], "success");
        assert_eq!(response["result"]["documentsCreated"], 3);
        assert_eq!(response["result"]["extractionsCreated"], 3);
        assert_eq!(response["result"]["jobResumesCreated"], 2);

        let job = store.find_job_by_ref("JOB-W1").await.unwrap().unwrap();
        assert_eq!(response["result"]["jobId"], json!(job.id));
        assert_eq!(next_outcome(&mut rx, job.id).await.status, JobStatus::Ready);
    }

    #[tokio::test]
    async fn test_callback_requires_ref_and_content() {
        let (_store, pipeline) = memory_pipeline();
        assert!(matches!(
            pipeline
                .process_callback(json!({"jd": {"title": "x"}}), None)
                .await,
            Err(PipelineError::Validation(_))
        ));
        assert!(matches!(
            pipeline
                .process_callback(json!({"externalJobRef": "JOB-W2", "resumes": []}), None)
                .await,
            Err(PipelineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_idempotency_key_replays_result() {
        let (store, pipeline) = memory_pipeline();

        let first = pipeline
            .process_callback(payload("JOB-W3", Some("delivery-1")), None)
            .await
            .unwrap();
        let second = pipeline
            .process_callback(payload("JOB-W3", Some("delivery-1")), None)
            .await
            .unwrap();

        assert_eq!(first, second);
        let job = store.find_job_by_ref("JOB-W3").await.unwrap().unwrap();
        assert_eq!(store.list_job_resumes(job.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_signature_enforced_when_secret_configured() {
        let (_store, pipeline) = memory_pipeline();
        let secret = "s3cret";

        let unsigned = payload("JOB-W4", None);
        assert!(matches!(
            pipeline.process_callback(unsigned.clone(), Some(secret)).await,
            Err(PipelineError::InvalidSignature)
        ));

        let mut signed = unsigned;
        signed["hmac"] = json!(sign_payload(secret, &signed).unwrap());
        let mut tampered = signed.clone();
        tampered["externalJobRef"] = json!("JOB-OTHER");

        assert!(matches!(
            pipeline.process_callback(tampered, Some(secret)).await,
            Err(PipelineError::InvalidSignature)
        ));
        assert!(pipeline.process_callback(signed, Some(secret)).await.is_ok());
    }

    #[test]
    fn test_signature_ignores_key_order_and_hmac_field() {
        let a = json!({"externalJobRef": "J", "jd": {"b": 1, "a": 2}});
        let b = json!({"jd": {"a": 2, "b": 1}, "externalJobRef": "J", "hmac": "junk"});
        assert_eq!(sign_payload("k", &a).unwrap(), sign_payload("k", &b).unwrap());
    }
}
