use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::extraction::{fixtures, RawExtraction};
use crate::idp::{IdpAdapter, IdpError, IdpRequestStatus, ProcessJobResponse};
use crate::models::document::{DocType, Document};

/// Serves the embedded sample JD and resumes after a simulated delay.
/// Results are kept in memory by request id until they are fetched once.
pub struct FixtureIdpAdapter {
    delay: Duration,
    requests: RwLock<HashMap<String, Vec<RawExtraction>>>,
}

impl FixtureIdpAdapter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            requests: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl IdpAdapter for FixtureIdpAdapter {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn process_job(
        &self,
        external_job_ref: &str,
        jd_folder_ref: &str,
        resume_folder_ref: &str,
    ) -> Result<ProcessJobResponse, IdpError> {
        let request_id = format!("mock_{external_job_ref}_{}", Uuid::new_v4().simple());
        info!(
            %request_id,
            jd_folder = jd_folder_ref,
            resume_folder = resume_folder_ref,
            "Fixture IDP processing job {external_job_ref}"
        );

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let now = Utc::now();
        let mut extractions = vec![RawExtraction {
            job_key: external_job_ref.to_string(),
            item_id: format!("{external_job_ref}_jd"),
            extraction_json: fixtures::job_description().to_string(),
            extraction_version: "v1".to_string(),
            status: "PARSED".to_string(),
            created_at: now,
        }];
        extractions.extend(fixtures::resumes().into_iter().enumerate().map(
            |(index, resume)| RawExtraction {
                job_key: external_job_ref.to_string(),
                item_id: format!("{external_job_ref}_resume_{index}"),
                extraction_json: resume.to_string(),
                extraction_version: "v1".to_string(),
                status: "PARSED".to_string(),
                created_at: now,
            },
        ));

        info!(%request_id, count = extractions.len(), "Fixture IDP completed");
        self.requests
            .write()
            .await
            .insert(request_id.clone(), extractions);

        Ok(ProcessJobResponse {
            request_id,
            status: IdpRequestStatus::Completed,
        })
    }

    async fn get_extractions(&self, request_id: &str) -> Result<Vec<RawExtraction>, IdpError> {
        Ok(self
            .requests
            .write()
            .await
            .remove(request_id)
            .unwrap_or_default())
    }

    /// JSON content is taken as already extracted; anything else gets fixture data.
    async fn extract_document(
        &self,
        document: &Document,
        content: &[u8],
    ) -> Result<Value, IdpError> {
        if let Ok(value @ Value::Object(_)) = serde_json::from_slice::<Value>(content) {
            return Ok(value);
        }
        Ok(match document.doc_type {
            DocType::Jd => fixtures::job_description(),
            DocType::Resume => fixtures::resume_for_hash(&document.content_hash),
        })
    }
}
