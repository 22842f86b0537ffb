//! Extraction normalization: every upstream payload shape (fixture data, the
//! real IDP, manually pasted JSON) is mapped to the two canonical records
//! below before grading ever sees it.

pub mod fixtures;
pub mod normalizer;
pub mod schemas;

use serde::{Deserialize, Serialize};

pub use normalizer::{
    group_by_job, job_description_from, normalize, resume_from, validate, JobBatch,
    NormalizedExtraction, RawExtraction,
};

/// Fallback name when no name field is present in a resume payload.
pub const UNKNOWN_CANDIDATE: &str = "Unknown Candidate";
/// Fallback title when no title field is present in a job-description payload.
pub const UNKNOWN_POSITION: &str = "Unknown Position";

/// Canonical job description consumed by the grading engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptionData {
    pub title: String,
    pub description: String,
    pub skills: Vec<String>,
    /// Free text ("Senior") or a minimum number of years ("3").
    pub experience_level: Option<String>,
    pub education: Option<String>,
    pub requirements: Vec<String>,
}

/// Canonical resume consumed by the grading engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResumeData {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Vec<String>,
    pub experience: Vec<WorkExperience>,
    pub education: Vec<EducationRecord>,
    pub summary: Option<String>,
}

impl ResumeData {
    pub fn total_years(&self) -> u32 {
        self.experience
            .iter()
            .fold(0u32, |total, e| total.saturating_add(e.years))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkExperience {
    pub company: String,
    pub position: String,
    pub years: u32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EducationRecord {
    pub degree: String,
    pub field: String,
    pub institution: Option<String>,
}

/// Order-preserving, case-sensitive dedup of trimmed non-empty strings.
pub(crate) fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
