//! IDP adapters: the pluggable boundary to the document-extraction provider.
//!
//! Both implementations produce `RawExtraction`s of the same shape, so the
//! normalizer never needs to know which one ran.

pub mod fixture;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::config::{IdpConfig, ParserKind};
use crate::extraction::RawExtraction;
use crate::models::document::Document;

pub use fixture::FixtureIdpAdapter;
pub use remote::RemoteIdpAdapter;

#[derive(Debug, Error)]
pub enum IdpError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IDP returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Extractions for request {request_id} are delivered by webhook callback")]
    DeliveredByWebhook { request_id: String },

    #[error("IDP adapter is not configured: {0}")]
    NotConfigured(String),

    #[error("Could not parse IDP response: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdpRequestStatus {
    /// Extractions are ready for `get_extractions`.
    Completed,
    /// Extractions will arrive on the webhook.
    Processing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessJobResponse {
    pub request_id: String,
    pub status: IdpRequestStatus,
}

#[async_trait]
pub trait IdpAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Starts extraction of every document under the two folder references.
    async fn process_job(
        &self,
        external_job_ref: &str,
        jd_folder_ref: &str,
        resume_folder_ref: &str,
    ) -> Result<ProcessJobResponse, IdpError>;

    async fn get_extractions(&self, request_id: &str) -> Result<Vec<RawExtraction>, IdpError>;

    /// Extracts a single stored document from its raw bytes.
    async fn extract_document(
        &self,
        document: &Document,
        content: &[u8],
    ) -> Result<Value, IdpError>;
}

/// Builds the adapter selected by `PARSER`.
pub fn create_idp_adapter(config: &IdpConfig) -> Result<Arc<dyn IdpAdapter>, IdpError> {
    let adapter: Arc<dyn IdpAdapter> = match config.parser {
        ParserKind::Mock => Arc::new(FixtureIdpAdapter::new(config.mock_delay)),
        ParserKind::Remote => Arc::new(RemoteIdpAdapter::new(config)?),
    };
    info!("IDP adapter initialized ({})", adapter.name());
    Ok(adapter)
}
