//! Known provider payload shapes and their adapters to the canonical records.
//!
//! Each shape is a serde struct selected by its signature keys; anything that
//! matches none of them goes through the prioritized-key lookup in
//! `normalizer`.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::extraction::{
    dedup_preserving_order, EducationRecord, JobDescriptionData, ResumeData, WorkExperience,
    UNKNOWN_CANDIDATE, UNKNOWN_POSITION,
};

// ────────────────────────────────────────────────────────────────────────────
// Lenient scalar helpers
// ────────────────────────────────────────────────────────────────────────────

/// A list field that some producers send as a single string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn list(field: Option<OneOrMany>) -> Vec<String> {
    field.map(OneOrMany::into_vec).unwrap_or_default()
}

/// Upper bound for any single years-of-experience value.
pub const MAX_YEARS: u32 = 80;

/// Years of experience as a number (`6`) or text (`"5+"`, `"12 years"`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum YearsValue {
    Number(f64),
    Text(String),
}

impl YearsValue {
    /// Whole years capped at `MAX_YEARS`; text takes its first integer,
    /// unparseable text is 0.
    pub fn whole_years(&self) -> u32 {
        let years = match self {
            YearsValue::Number(n) if n.is_finite() && *n > 0.0 => n.floor() as u32,
            YearsValue::Number(_) => 0,
            YearsValue::Text(text) => first_integer(text).unwrap_or(0),
        };
        years.min(MAX_YEARS)
    }

    fn display(&self) -> String {
        match self {
            YearsValue::Number(n) => format!("{n}"),
            YearsValue::Text(text) => text.trim().to_string(),
        }
    }
}

static RE_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static RE_MIN_YEARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\+?\s*(years|yrs)").unwrap());
static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

fn first_integer(text: &str) -> Option<u32> {
    RE_DIGITS
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Minimum years from the first phrase shaped like `3+ years` / `5 yrs`.
pub fn min_years_from(texts: &[String]) -> Option<u32> {
    texts
        .iter()
        .find_map(|t| RE_MIN_YEARS.captures(t).and_then(|c| c[1].parse().ok()))
}

/// Whole years covered by a date range such as `"2018 - 2021"` or `"2020 - present"`.
pub fn estimate_years(range: &str) -> u32 {
    let years: Vec<i32> = RE_YEAR
        .find_iter(range)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    let Some(&start) = years.first() else {
        return 0;
    };
    let lowered = range.to_lowercase();
    let end = if lowered.contains("present") || lowered.contains("current") {
        Utc::now().year()
    } else {
        *years.last().unwrap_or(&start)
    };
    ((end - start).max(0) as u32).min(MAX_YEARS)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn has_any_key(value: &Value, keys: &[&str]) -> bool {
    value
        .as_object()
        .map(|obj| keys.iter().any(|k| obj.contains_key(*k)))
        .unwrap_or(false)
}

// ────────────────────────────────────────────────────────────────────────────
// IDP job description
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IdpJobDescription {
    #[serde(rename = "Job_Title")]
    pub job_title: Option<String>,
    #[serde(rename = "Summary")]
    pub summary: Option<String>,
    #[serde(rename = "Employment_Type")]
    pub employment_type: Option<String>,
    #[serde(rename = "Travel")]
    pub travel: Option<String>,
    #[serde(rename = "Experience")]
    pub experience: Option<IdpExperience>,
    #[serde(rename = "Qualifications")]
    pub qualifications: Option<IdpQualifications>,
    #[serde(rename = "Skills")]
    pub skills: Option<IdpSkills>,
    #[serde(rename = "Education")]
    pub education: Option<IdpJdEducation>,
    #[serde(rename = "Responsibilities")]
    pub responsibilities: Option<IdpResponsibilities>,
    #[serde(rename = "Compliance")]
    pub compliance: Option<IdpCompliance>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpExperience {
    #[serde(rename = "Required_Experience")]
    pub required_experience: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpQualifications {
    #[serde(rename = "Qualifications_Required")]
    pub required: Option<OneOrMany>,
    #[serde(rename = "Qualifications_Preferred")]
    pub preferred: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpSkills {
    #[serde(rename = "Skills")]
    pub skills: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpJdEducation {
    #[serde(rename = "Education")]
    pub education: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpResponsibilities {
    #[serde(rename = "Responsibility_Duties")]
    pub duties: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpCompliance {
    #[serde(rename = "Compliance_Regulatory")]
    pub regulatory: Option<OneOrMany>,
}

impl IdpJobDescription {
    pub fn into_canonical(self) -> JobDescriptionData {
        let mut description = self.summary.unwrap_or_default();

        if let Some(employment_type) = non_empty(self.employment_type) {
            description.push_str(&format!("\n\nEmployment Type: {employment_type}"));
        }
        if let Some(travel) = non_empty(self.travel).filter(|t| t != "Not Found") {
            description.push_str(&format!("\nTravel Required: {travel}"));
        }
        let duties = list(self.responsibilities.and_then(|r| r.duties));
        if !duties.is_empty() {
            description.push_str(&format!(
                "\n\nKey Responsibilities:\n• {}",
                duties.join("\n• ")
            ));
        }
        let compliance = list(self.compliance.and_then(|c| c.regulatory));
        if !compliance.is_empty() {
            description.push_str(&format!(
                "\n\nCompliance Requirements:\n• {}",
                compliance.join("\n• ")
            ));
        }

        let required_experience = list(self.experience.and_then(|e| e.required_experience));
        let (required, preferred) = match self.qualifications {
            Some(q) => (list(q.required), list(q.preferred)),
            None => (Vec::new(), Vec::new()),
        };

        JobDescriptionData {
            title: non_empty(self.job_title).unwrap_or_else(|| UNKNOWN_POSITION.to_string()),
            description: description.trim().to_string(),
            skills: dedup_preserving_order(list(self.skills.and_then(|s| s.skills))),
            experience_level: min_years_from(&required_experience)
                .or_else(|| min_years_from(&required))
                .map(|y| y.to_string()),
            education: non_empty(self.education.and_then(|e| e.education)),
            requirements: required_experience
                .into_iter()
                .chain(required)
                .chain(preferred)
                .collect(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// IDP resume
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct IdpResume {
    #[serde(rename = "Full_Name")]
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills_core: Option<OneOrMany>,
    pub tools_platforms: Option<OneOrMany>,
    pub total_years_experience: Option<YearsValue>,
    #[serde(rename = "Work_Experience", default)]
    pub work_experience: Vec<IdpWorkExperience>,
    #[serde(rename = "Education", default)]
    pub education: Vec<IdpEducation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpWorkExperience {
    #[serde(rename = "Company")]
    pub company: Option<String>,
    #[serde(rename = "Job_Title")]
    pub job_title: Option<String>,
    #[serde(rename = "Employment_Dates")]
    pub employment_dates: Option<String>,
    #[serde(rename = "Responsibilities")]
    pub responsibilities: Option<OneOrMany>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdpEducation {
    #[serde(rename = "Degree")]
    pub degree: Option<String>,
    #[serde(rename = "Institution")]
    pub institution: Option<String>,
}

/// `"Master of Science in Biology"` → `"Biology"`.
fn field_of_study(degree: &str) -> String {
    degree
        .split_once(" in ")
        .map(|(_, field)| field.trim().to_string())
        .unwrap_or_default()
}

impl IdpResume {
    pub fn into_canonical(self) -> ResumeData {
        let name = non_empty(self.full_name).unwrap_or_else(|| UNKNOWN_CANDIDATE.to_string());
        let core = list(self.skills_core);
        let tools = list(self.tools_platforms);

        let total_years = self
            .total_years_experience
            .as_ref()
            .map(YearsValue::whole_years)
            .unwrap_or(0);
        let roles = self.work_experience.len().max(1) as u32;

        let experience = self
            .work_experience
            .into_iter()
            .map(|w| {
                let years = if total_years > 0 {
                    total_years / roles
                } else {
                    w.employment_dates.as_deref().map(estimate_years).unwrap_or(0)
                };
                let duties = list(w.responsibilities);
                WorkExperience {
                    company: w.company.unwrap_or_default(),
                    position: w.job_title.unwrap_or_default(),
                    years,
                    description: (!duties.is_empty()).then(|| duties.join(" • ")),
                }
            })
            .collect();

        let education = self
            .education
            .into_iter()
            .filter_map(|e| {
                let degree = non_empty(e.degree)?;
                Some(EducationRecord {
                    field: field_of_study(&degree),
                    degree,
                    institution: non_empty(e.institution),
                })
            })
            .collect();

        let focus = if core.is_empty() {
            "relevant fields".to_string()
        } else {
            core.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        };
        let summary = self.total_years_experience.as_ref().map(|years| {
            format!(
                "{name} is a professional with {} years of experience in {focus}.",
                years.display()
            )
        });

        ResumeData {
            email: non_empty(self.email),
            phone: non_empty(self.phone),
            skills: dedup_preserving_order(core.into_iter().chain(tools)),
            experience,
            education,
            summary,
            name,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simple (lowercase) shapes used by manual paste and older producers
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleJobDescription {
    pub title: Option<String>,
    pub description: Option<String>,
    pub skills: Option<OneOrMany>,
    pub experience_level: Option<YearsValue>,
    pub education: Option<String>,
    pub requirements: Option<OneOrMany>,
}

impl SimpleJobDescription {
    pub fn into_canonical(self) -> JobDescriptionData {
        JobDescriptionData {
            title: non_empty(self.title).unwrap_or_else(|| UNKNOWN_POSITION.to_string()),
            description: self.description.unwrap_or_default(),
            skills: dedup_preserving_order(list(self.skills)),
            experience_level: self
                .experience_level
                .map(|level| level.display())
                .filter(|s| !s.is_empty()),
            education: non_empty(self.education),
            requirements: list(self.requirements),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleResume {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub skills: Option<OneOrMany>,
    #[serde(default)]
    pub experience: Vec<SimpleExperience>,
    #[serde(default)]
    pub education: Vec<SimpleEducation>,
    pub summary: Option<String>,
    #[serde(rename = "fullText")]
    pub full_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleExperience {
    pub title: Option<String>,
    pub position: Option<String>,
    pub company: Option<String>,
    pub years: Option<YearsValue>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimpleEducation {
    pub degree: Option<String>,
    pub field: Option<String>,
    pub institution: Option<String>,
}

impl SimpleResume {
    pub fn into_canonical(self) -> ResumeData {
        ResumeData {
            name: non_empty(self.name).unwrap_or_else(|| UNKNOWN_CANDIDATE.to_string()),
            email: non_empty(self.email),
            phone: non_empty(self.phone),
            skills: dedup_preserving_order(list(self.skills)),
            experience: self
                .experience
                .into_iter()
                .map(|e| WorkExperience {
                    company: e.company.unwrap_or_default(),
                    position: e.position.or(e.title).unwrap_or_default(),
                    years: e.years.as_ref().map(YearsValue::whole_years).unwrap_or(0),
                    description: non_empty(e.description),
                })
                .collect(),
            education: self
                .education
                .into_iter()
                .filter_map(|e| {
                    let degree = non_empty(e.degree)?;
                    Some(EducationRecord {
                        field: non_empty(e.field).unwrap_or_else(|| field_of_study(&degree)),
                        degree,
                        institution: non_empty(e.institution),
                    })
                })
                .collect(),
            summary: non_empty(self.summary).or_else(|| non_empty(self.full_text)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shape selection
// ────────────────────────────────────────────────────────────────────────────

/// A job-description payload classified by shape.
#[derive(Debug, Clone)]
pub enum JobDescriptionPayload {
    Idp(IdpJobDescription),
    Simple(SimpleJobDescription),
    Untyped(Value),
}

impl JobDescriptionPayload {
    pub fn classify(value: &Value) -> Self {
        if has_any_key(value, &["Job_Title"]) {
            if let Ok(jd) = serde_json::from_value(value.clone()) {
                return JobDescriptionPayload::Idp(jd);
            }
        } else if has_any_key(value, &["title"]) {
            if let Ok(jd) = serde_json::from_value(value.clone()) {
                return JobDescriptionPayload::Simple(jd);
            }
        }
        JobDescriptionPayload::Untyped(value.clone())
    }
}

/// A resume payload classified by shape.
#[derive(Debug, Clone)]
pub enum ResumePayload {
    Idp(IdpResume),
    Simple(SimpleResume),
    Untyped(Value),
}

impl ResumePayload {
    pub fn classify(value: &Value) -> Self {
        if has_any_key(value, &["Full_Name"])
            && has_any_key(value, &["skills_core", "tools_platforms", "Work_Experience"])
        {
            if let Ok(resume) = serde_json::from_value(value.clone()) {
                return ResumePayload::Idp(resume);
            }
        } else if has_any_key(value, &["name"]) {
            if let Ok(resume) = serde_json::from_value(value.clone()) {
                return ResumePayload::Simple(resume);
            }
        }
        ResumePayload::Untyped(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_min_years_takes_first_match() {
        let texts = vec![
            "Experience with CRM tools".to_string(),
            "At least 3+ years in sales".to_string(),
            "10 yrs preferred".to_string(),
        ];
        assert_eq!(min_years_from(&texts), Some(3));
        assert_eq!(min_years_from(&["no numbers".to_string()]), None);
    }

    #[test]
    fn test_estimate_years_uses_current_year_for_present() {
        assert_eq!(estimate_years("2018 - 2021"), 3);
        assert_eq!(estimate_years("no dates"), 0);
        let expected = (Utc::now().year() - 2020) as u32;
        assert_eq!(estimate_years("2020 - present"), expected);
    }

    #[test]
    fn test_years_value_parses_text() {
        assert_eq!(YearsValue::Text("5+".into()).whole_years(), 5);
        assert_eq!(YearsValue::Number(7.9).whole_years(), 7);
        assert_eq!(YearsValue::Text("n/a".into()).whole_years(), 0);
    }

    #[test]
    fn test_oversized_years_are_capped() {
        assert_eq!(YearsValue::Number(4.0e9).whole_years(), MAX_YEARS);
        assert_eq!(YearsValue::Text("4000000000 years".into()).whole_years(), MAX_YEARS);
        assert_eq!(estimate_years("0001 - 9999"), MAX_YEARS);
    }

    #[test]
    fn test_total_years_saturates() {
        let value = json!({
            "name": "Eve Long",
            "experience": [{ "years": 4000000000u64 }, { "years": 4000000000u64 }]
        });
        let ResumePayload::Simple(resume) = ResumePayload::classify(&value) else {
            panic!("expected simple shape");
        };
        let mut resume = resume.into_canonical();
        assert_eq!(resume.total_years(), 2 * MAX_YEARS);

        resume.experience[0].years = u32::MAX;
        assert_eq!(resume.total_years(), u32::MAX);
    }

    #[test]
    fn test_idp_jd_composes_description_and_requirements() {
        let value = json!({
            "Job_Title": "Account Executive",
            "Summary": "Sell things.",
            "Employment_Type": "Full-time",
            "Travel": "Not Found",
            "Experience": { "Required_Experience": ["4+ years of B2B sales"] },
            "Qualifications": {
                "Qualifications_Required": ["Bachelor's degree"],
                "Qualifications_Preferred": ["MBA"]
            },
            "Skills": { "Skills": ["Negotiation", "CRM", "Negotiation"] },
            "Responsibilities": { "Responsibility_Duties": ["Close deals"] }
        });
        let JobDescriptionPayload::Idp(jd) = JobDescriptionPayload::classify(&value) else {
            panic!("expected IDP shape");
        };
        let jd = jd.into_canonical();
        assert_eq!(jd.title, "Account Executive");
        assert!(jd.description.contains("Employment Type: Full-time"));
        assert!(!jd.description.contains("Travel Required"));
        assert!(jd.description.contains("• Close deals"));
        assert_eq!(jd.experience_level.as_deref(), Some("4"));
        assert_eq!(jd.skills, vec!["Negotiation", "CRM"]);
        assert_eq!(
            jd.requirements,
            vec!["4+ years of B2B sales", "Bachelor's degree", "MBA"]
        );
    }

    #[test]
    fn test_idp_resume_splits_total_years_across_roles() {
        let value = json!({
            "Full_Name": "Ada Park",
            "skills_core": ["Sales", "Excel"],
            "tools_platforms": ["Excel", "Salesforce"],
            "total_years_experience": "6+",
            "Work_Experience": [
                { "Company": "A", "Job_Title": "Rep", "Employment_Dates": "2015 - 2018" },
                { "Company": "B", "Job_Title": "Lead", "Employment_Dates": "2018 - present" }
            ],
            "Education": [{ "Degree": "Bachelor of Arts in Economics", "Institution": "UCLA" }]
        });
        let ResumePayload::Idp(resume) = ResumePayload::classify(&value) else {
            panic!("expected IDP shape");
        };
        let resume = resume.into_canonical();
        assert_eq!(resume.skills, vec!["Sales", "Excel", "Salesforce"]);
        assert_eq!(resume.experience.len(), 2);
        assert!(resume.experience.iter().all(|e| e.years == 3));
        assert_eq!(resume.education[0].field, "Economics");
        assert!(resume.summary.unwrap().contains("6+ years"));
    }

    #[test]
    fn test_idp_resume_estimates_years_without_total() {
        let value = json!({
            "Full_Name": "Ben Ito",
            "Work_Experience": [{ "Company": "C", "Job_Title": "Analyst", "Employment_Dates": "2016 - 2020" }]
        });
        let ResumePayload::Idp(resume) = ResumePayload::classify(&value) else {
            panic!("expected IDP shape");
        };
        assert_eq!(resume.into_canonical().experience[0].years, 4);
    }

    #[test]
    fn test_simple_resume_prefers_position_and_full_text_summary() {
        let value = json!({
            "name": "Cy Diaz",
            "skills": "Python",
            "experience": [{ "title": "Engineer", "company": "D", "years": 2 }],
            "education": [{ "degree": "BS", "field": "Physics" }],
            "fullText": "Engineer with physics background"
        });
        let ResumePayload::Simple(resume) = ResumePayload::classify(&value) else {
            panic!("expected simple shape");
        };
        let resume = resume.into_canonical();
        assert_eq!(resume.skills, vec!["Python"]);
        assert_eq!(resume.experience[0].position, "Engineer");
        assert_eq!(resume.experience[0].years, 2);
        assert_eq!(resume.education[0].field, "Physics");
        assert_eq!(
            resume.summary.as_deref(),
            Some("Engineer with physics background")
        );
    }

    #[test]
    fn test_unrecognized_shape_is_untyped() {
        let value = json!({ "candidate_name": "Dee" });
        assert!(matches!(
            ResumePayload::classify(&value),
            ResumePayload::Untyped(_)
        ));
        assert!(matches!(
            JobDescriptionPayload::classify(&json!("plain text")),
            JobDescriptionPayload::Untyped(_)
        ));
    }
}
