use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::IdpConfig;
use crate::extraction::RawExtraction;
use crate::idp::{IdpAdapter, IdpError, IdpRequestStatus, ProcessJobResponse};
use crate::models::document::Document;

/// Calls the real extraction provider. Triggering is a POST; batch results come
/// back on `/api/idp/callback`, so `get_extractions` is not available here.
pub struct RemoteIdpAdapter {
    client: Client,
    start_url: String,
    extract_url: Option<String>,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest<'a> {
    external_job_ref: &'a str,
    jd_folder_path: &'a str,
    resume_folder_path: &'a str,
    request_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    request_id: Option<String>,
    status: Option<String>,
}

impl RemoteIdpAdapter {
    pub fn new(config: &IdpConfig) -> Result<Self, IdpError> {
        let start_url = config
            .start_url
            .clone()
            .ok_or_else(|| IdpError::NotConfigured("IDP_START_URL is not set".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| IdpError::NotConfigured("IDP_API_KEY is not set".to_string()))?;

        Ok(Self {
            client: Client::builder().timeout(config.timeout).build()?,
            start_url,
            extract_url: config.extract_url.clone(),
            api_key,
        })
    }

    async fn error_from(response: reqwest::Response) -> IdpError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        IdpError::Api {
            status: status.as_u16(),
            message: if body.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body
            },
        }
    }
}

#[async_trait]
impl IdpAdapter for RemoteIdpAdapter {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn process_job(
        &self,
        external_job_ref: &str,
        jd_folder_ref: &str,
        resume_folder_ref: &str,
    ) -> Result<ProcessJobResponse, IdpError> {
        let fallback_id = format!("idp_{external_job_ref}_{}", Uuid::new_v4().simple());
        info!(
            request_id = %fallback_id,
            jd_folder = jd_folder_ref,
            resume_folder = resume_folder_ref,
            "Starting remote IDP job {external_job_ref}"
        );

        let response = self
            .client
            .post(&self.start_url)
            .bearer_auth(&self.api_key)
            .json(&StartRequest {
                external_job_ref,
                jd_folder_path: jd_folder_ref,
                resume_folder_path: resume_folder_ref,
                request_id: &fallback_id,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::error_from(response).await;
            warn!("Remote IDP rejected job {external_job_ref}: {err}");
            return Err(err);
        }

        // Providers may answer with an empty body.
        let body = response.text().await?;
        let parsed: StartResponse = if body.trim().is_empty() {
            StartResponse::default()
        } else {
            serde_json::from_str(&body)?
        };

        let request_id = parsed.request_id.unwrap_or(fallback_id);
        if let Some(status) = parsed.status.as_deref() {
            debug!(%request_id, "Remote IDP acknowledged job with status {status}");
        }
        // Results for a remote job only ever arrive on the callback.
        Ok(ProcessJobResponse {
            request_id,
            status: IdpRequestStatus::Processing,
        })
    }

    async fn get_extractions(&self, request_id: &str) -> Result<Vec<RawExtraction>, IdpError> {
        Err(IdpError::DeliveredByWebhook {
            request_id: request_id.to_string(),
        })
    }

    async fn extract_document(
        &self,
        document: &Document,
        content: &[u8],
    ) -> Result<Value, IdpError> {
        let url = self.extract_url.as_deref().ok_or_else(|| {
            IdpError::NotConfigured("IDP_EXTRACT_URL is not set".to_string())
        })?;
        debug!(doc_id = %document.id, bytes = content.len(), "Requesting single-document extraction");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, document.mime_type.as_str())
            .header("x-document-type", document.doc_type.as_str())
            .header("x-job-number", document.job_number.as_str())
            .body(content.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserKind;

    #[tokio::test]
    async fn test_get_extractions_points_to_webhook() {
        let config = IdpConfig {
            parser: ParserKind::Remote,
            start_url: Some("http://127.0.0.1:9/start".to_string()),
            api_key: Some("key".to_string()),
            ..IdpConfig::default()
        };
        let adapter = RemoteIdpAdapter::new(&config).unwrap();
        assert!(matches!(
            adapter.get_extractions("req-1").await,
            Err(IdpError::DeliveredByWebhook { .. })
        ));
    }

    #[tokio::test]
    async fn test_process_job_always_awaits_callback() {
        let app = axum::Router::new().route(
            "/start",
            axum::routing::post(|| async {
                axum::Json(serde_json::json!({ "requestId": "req-42", "status": "COMPLETED" }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });

        let config = IdpConfig {
            parser: ParserKind::Remote,
            start_url: Some(format!("http://{addr}/start")),
            api_key: Some("key".to_string()),
            ..IdpConfig::default()
        };
        let adapter = RemoteIdpAdapter::new(&config).unwrap();
        let response = adapter.process_job("JOB-R1", "jd/", "resumes/").await.unwrap();

        assert_eq!(response.request_id, "req-42");
        assert_eq!(response.status, IdpRequestStatus::Processing);
    }

    #[test]
    fn test_new_requires_api_key() {
        let config = IdpConfig {
            parser: ParserKind::Remote,
            start_url: Some("http://127.0.0.1:9/start".to_string()),
            ..IdpConfig::default()
        };
        assert!(matches!(
            RemoteIdpAdapter::new(&config),
            Err(IdpError::NotConfigured(_))
        ));
    }
}
