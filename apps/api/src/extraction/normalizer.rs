use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::extraction::schemas::{JobDescriptionPayload, ResumePayload};
use crate::extraction::{
    dedup_preserving_order, JobDescriptionData, ResumeData, UNKNOWN_CANDIDATE, UNKNOWN_POSITION,
};
use crate::models::document::{DocType, ExtractionStatus};

/// One extraction as delivered by an IDP adapter, before classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtraction {
    pub job_key: String,
    pub item_id: String,
    /// Serialized JSON payload; may be malformed.
    pub extraction_json: String,
    pub extraction_version: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedExtraction {
    pub job_key: String,
    pub item_id: String,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    /// `Value::Null` when the payload could not be parsed.
    pub extraction_data: Value,
    pub extraction_version: String,
    pub status: ExtractionStatus,
    pub created_at: DateTime<Utc>,
}

/// Extractions for one job key.
#[derive(Debug, Clone, Default)]
pub struct JobBatch {
    pub jd: Option<NormalizedExtraction>,
    pub resumes: Vec<NormalizedExtraction>,
}

const JD_SIGNATURE: &[&str] = &["Job_Title", "Responsibilities", "Qualifications", "Experience"];
const RESUME_SIGNATURE: &[&str] = &["Full_Name", "Email", "Phone", "Education", "Experience"];

/// Parses and classifies each raw extraction. Never fails: a malformed payload
/// yields a FAILED extraction with null data, typed as a resume.
pub fn normalize(raw: Vec<RawExtraction>) -> Vec<NormalizedExtraction> {
    raw.into_iter().map(normalize_one).collect()
}

fn normalize_one(raw: RawExtraction) -> NormalizedExtraction {
    let parsed = match serde_json::from_str::<Value>(&raw.extraction_json) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                item_id = %raw.item_id,
                job_key = %raw.job_key,
                "Could not parse extraction JSON, treating as failed resume: {e}"
            );
            None
        }
    };

    let doc_type = detect_type(&raw.item_id, parsed.as_ref());
    let status = match (&parsed, raw.status.parse::<ExtractionStatus>()) {
        (None, _) => ExtractionStatus::Failed,
        (Some(_), Ok(status)) => status,
        (Some(_), Err(e)) => {
            warn!(item_id = %raw.item_id, "{e}; recording extraction as failed");
            ExtractionStatus::Failed
        }
    };

    NormalizedExtraction {
        job_key: raw.job_key,
        item_id: raw.item_id,
        doc_type,
        extraction_data: parsed.unwrap_or(Value::Null),
        extraction_version: raw.extraction_version,
        status,
        created_at: raw.created_at,
    }
}

/// Item-id markers first, then the payload's key signature, then RESUME.
fn detect_type(item_id: &str, data: Option<&Value>) -> DocType {
    let id = item_id.to_lowercase();
    if id.contains("_jd") || id.starts_with("jd_") {
        return DocType::Jd;
    }
    if id.contains("_resume") || id.starts_with("resume_") {
        return DocType::Resume;
    }

    if let Some(obj) = data.and_then(Value::as_object) {
        if JD_SIGNATURE.iter().any(|k| obj.contains_key(*k)) {
            return DocType::Jd;
        }
        if RESUME_SIGNATURE.iter().any(|k| obj.contains_key(*k)) {
            return DocType::Resume;
        }
    }

    debug!(item_id, "No type marker or signature, defaulting to RESUME");
    DocType::Resume
}

/// Groups by job key. When a key carries several JDs the last one is kept.
pub fn group_by_job(extractions: Vec<NormalizedExtraction>) -> BTreeMap<String, JobBatch> {
    let mut jobs: BTreeMap<String, JobBatch> = BTreeMap::new();

    for extraction in extractions {
        let batch = jobs.entry(extraction.job_key.clone()).or_default();
        match extraction.doc_type {
            DocType::Jd => {
                if let Some(previous) = &batch.jd {
                    warn!(
                        job_key = %extraction.job_key,
                        replaced = %previous.item_id,
                        kept = %extraction.item_id,
                        "Multiple JD extractions for one job, keeping the last"
                    );
                }
                batch.jd = Some(extraction);
            }
            DocType::Resume => batch.resumes.push(extraction),
        }
    }

    jobs
}

/// A batch is processable when it has a JD and at least one resume.
pub fn validate(batch: &JobBatch) -> bool {
    batch.jd.is_some() && !batch.resumes.is_empty()
}

// ────────────────────────────────────────────────────────────────────────────
// Canonical record construction
// ────────────────────────────────────────────────────────────────────────────

pub fn job_description_from(data: &Value) -> JobDescriptionData {
    match JobDescriptionPayload::classify(data) {
        JobDescriptionPayload::Idp(jd) => jd.into_canonical(),
        JobDescriptionPayload::Simple(jd) => jd.into_canonical(),
        JobDescriptionPayload::Untyped(value) => JobDescriptionData {
            title: job_title(&value),
            description: first_text(&value, &["/description", "/Description", "/Summary", "/summary"])
                .unwrap_or_default(),
            skills: collect_texts(
                &value,
                &[
                    "/Skills/Skills",
                    "/skills",
                    "/Skills",
                    "/required_skills",
                    "/Required_Skills",
                ],
            ),
            experience_level: first_text(&value, &["/experience_level", "/Experience_Level"]),
            education: first_text(&value, &["/Education/Education", "/education", "/Education"]),
            requirements: collect_texts(&value, &["/requirements", "/Requirements"]),
        },
    }
}

pub fn resume_from(data: &Value) -> ResumeData {
    match ResumePayload::classify(data) {
        ResumePayload::Idp(resume) => resume.into_canonical(),
        ResumePayload::Simple(resume) => resume.into_canonical(),
        ResumePayload::Untyped(value) => ResumeData {
            name: candidate_name(&value),
            email: first_text(&value, &["/email", "/Email"]),
            phone: first_text(&value, &["/phone", "/Phone"]),
            skills: collect_texts(
                &value,
                &[
                    "/Skills/Skills",
                    "/skills",
                    "/Skills",
                    "/technical_skills",
                    "/Technical_Skills",
                ],
            ),
            experience: Vec::new(),
            education: Vec::new(),
            summary: first_text(&value, &["/summary", "/Summary", "/fullText"]),
        },
    }
}

/// Display name for a resume payload of any shape.
pub fn candidate_name(data: &Value) -> String {
    first_text(
        data,
        &["/Full_Name", "/name", "/Name", "/candidate_name", "/Candidate_Name"],
    )
    .unwrap_or_else(|| UNKNOWN_CANDIDATE.to_string())
}

/// Display title for a job-description payload of any shape.
pub fn job_title(data: &Value) -> String {
    first_text(
        data,
        &["/Job_Title", "/title", "/Title", "/job_title", "/position"],
    )
    .unwrap_or_else(|| UNKNOWN_POSITION.to_string())
}

/// First non-blank string found at the given JSON pointers, in priority order.
fn first_text(data: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| data.pointer(p))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(String::from)
}

/// Union of every string or string-array found at the given pointers.
fn collect_texts(data: &Value, pointers: &[&str]) -> Vec<String> {
    let mut items = Vec::new();
    for value in pointers.iter().filter_map(|p| data.pointer(p)) {
        match value {
            Value::String(s) => items.push(s.clone()),
            Value::Array(arr) => items.extend(arr.iter().filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })),
            _ => {}
        }
    }
    dedup_preserving_order(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(job_key: &str, item_id: &str, payload: &str) -> RawExtraction {
        RawExtraction {
            job_key: job_key.to_string(),
            item_id: item_id.to_string(),
            extraction_json: payload.to_string(),
            extraction_version: "v1".to_string(),
            status: "PARSED".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_item_id_marker_wins_over_content() {
        let out = normalize(vec![
            raw("J", "J_jd", r#"{"Full_Name":"x"}"#),
            raw("J", "J_Resume_1", r#"{"Job_Title":"x"}"#),
        ]);
        assert_eq!(out[0].doc_type, DocType::Jd);
        assert_eq!(out[1].doc_type, DocType::Resume);
    }

    #[test]
    fn test_job_title_and_responsibilities_classify_as_jd() {
        let payload = json!({
            "Job_Title": "Lab Manager",
            "Responsibilities": { "Responsibility_Duties": ["Run the lab"] }
        })
        .to_string();
        let out = normalize(vec![raw("J", "item-17", &payload)]);
        assert_eq!(out[0].doc_type, DocType::Jd);
    }

    #[test]
    fn test_full_name_and_education_classify_as_resume() {
        let payload = json!({
            "Full_Name": "Ana Li",
            "Education": [{ "Degree": "BS in Biology" }]
        })
        .to_string();
        let out = normalize(vec![raw("J", "item-18", &payload)]);
        assert_eq!(out[0].doc_type, DocType::Resume);
        assert_eq!(out[0].status, ExtractionStatus::Parsed);
    }

    #[test]
    fn test_malformed_json_defaults_to_failed_resume() {
        let out = normalize(vec![raw("J", "item-19", "{not json")]);
        assert_eq!(out[0].doc_type, DocType::Resume);
        assert_eq!(out[0].status, ExtractionStatus::Failed);
        assert!(out[0].extraction_data.is_null());
    }

    #[test]
    fn test_provider_completed_status_is_parsed() {
        let mut item = raw("J", "J_resume_0", "{}");
        item.status = "COMPLETED".to_string();
        assert_eq!(normalize(vec![item])[0].status, ExtractionStatus::Parsed);
    }

    #[test]
    fn test_group_by_job_keeps_last_jd_and_resume_order() {
        let grouped = group_by_job(normalize(vec![
            raw("A", "A_jd_1", "{}"),
            raw("A", "A_resume_0", "{}"),
            raw("B", "B_resume_0", "{}"),
            raw("A", "A_jd_2", "{}"),
            raw("A", "A_resume_1", "{}"),
        ]));
        let a = &grouped["A"];
        assert_eq!(a.jd.as_ref().unwrap().item_id, "A_jd_2");
        let ids: Vec<&str> = a.resumes.iter().map(|r| r.item_id.as_str()).collect();
        assert_eq!(ids, vec!["A_resume_0", "A_resume_1"]);
        assert!(validate(a));
        assert!(!validate(&grouped["B"]));
    }

    #[test]
    fn test_validate_requires_a_resume() {
        let grouped = group_by_job(normalize(vec![raw("C", "C_jd", "{}")]));
        assert!(!validate(&grouped["C"]));
    }

    #[test]
    fn test_missing_names_degrade_to_defaults() {
        assert_eq!(resume_from(&json!({})).name, UNKNOWN_CANDIDATE);
        assert_eq!(job_description_from(&json!({})).title, UNKNOWN_POSITION);
        assert_eq!(candidate_name(&Value::Null), UNKNOWN_CANDIDATE);
        assert_eq!(job_title(&json!({ "Title": "  " })), UNKNOWN_POSITION);
    }

    #[test]
    fn test_untyped_lookup_follows_priority_and_merges_skills() {
        let data = json!({
            "Candidate_Name": "Low Priority",
            "name": 42,
            "Name": "Ravi Shah",
            "skills": ["Go", "Rust"],
            "Technical_Skills": ["Rust", "SQL"]
        });
        let resume = resume_from(&data);
        assert_eq!(resume.name, "Ravi Shah");
        assert_eq!(resume.skills, vec!["Go", "Rust", "SQL"]);

        let jd = job_description_from(&json!({
            "position": "Backend Engineer",
            "required_skills": "Rust"
        }));
        assert_eq!(jd.title, "Backend Engineer");
        assert_eq!(jd.skills, vec!["Rust"]);
    }
}
