use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::UnknownVariant;

/// Kind of a stored document. Serialized as `"JD"` / `"RESUME"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    Jd,
    Resume,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Jd => "JD",
            DocType::Resume => "RESUME",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JD" => Ok(DocType::Jd),
            "RESUME" => Ok(DocType::Resume),
            _ => Err(UnknownVariant {
                kind: "document type",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DocType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, UnknownVariant> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtractionStatus {
    Parsed,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Parsed => "PARSED",
            ExtractionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PARSED" | "COMPLETED" => Ok(ExtractionStatus::Parsed),
            "FAILED" => Ok(ExtractionStatus::Failed),
            _ => Err(UnknownVariant {
                kind: "extraction status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ExtractionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, UnknownVariant> {
        value.parse()
    }
}

/// A content-addressed artifact: an uploaded PDF, a webhook payload, or pasted JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: Uuid,
    /// External idempotency key, unique.
    pub doc_key: String,
    #[sqlx(try_from = "String")]
    pub doc_type: DocType,
    pub job_number: String,
    /// SHA-256 hex of the canonical content.
    pub content_hash: String,
    pub mime_type: String,
    /// Raw bytes kept for later extraction. Not part of API responses.
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
    pub uploaded_at: DateTime<Utc>,
}

/// Structured result of extracting one document. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Extraction {
    pub id: Uuid,
    pub doc_id: Uuid,
    pub idp_request_id: String,
    pub extraction_json: Value,
    pub extraction_version: String,
    #[sqlx(try_from = "String")]
    pub status: ExtractionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub doc_key: String,
    pub doc_type: DocType,
    pub job_number: String,
    pub content_hash: String,
    pub mime_type: String,
    pub content: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct NewExtraction {
    pub doc_id: Uuid,
    pub idp_request_id: String,
    pub extraction_json: Value,
    pub extraction_version: String,
    pub status: ExtractionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_serde_uses_upper_case_tags() {
        assert_eq!(serde_json::to_string(&DocType::Jd).unwrap(), r#""JD""#);
        let parsed: DocType = serde_json::from_str(r#""RESUME""#).unwrap();
        assert_eq!(parsed, DocType::Resume);
    }

    #[test]
    fn test_doc_type_from_str_is_case_insensitive() {
        assert_eq!("jd".parse::<DocType>().unwrap(), DocType::Jd);
        assert_eq!(" Resume ".parse::<DocType>().unwrap(), DocType::Resume);
        assert!("cover_letter".parse::<DocType>().is_err());
    }

    #[test]
    fn test_extraction_status_accepts_provider_completed_alias() {
        assert_eq!(
            "COMPLETED".parse::<ExtractionStatus>().unwrap(),
            ExtractionStatus::Parsed
        );
        assert_eq!(ExtractionStatus::Failed.to_string(), "FAILED");
    }
}
