// Prompt constants for resume grading.

use crate::extraction::{EducationRecord, JobDescriptionData, ResumeData, WorkExperience};

/// System prompt for grading: enforces JSON-only output.
pub const GRADING_SYSTEM: &str = "You are an expert resume reviewer and HR professional \
    with 15+ years of experience in talent acquisition. \
    You match candidates to job requirements and give concrete, fair assessments. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Grading prompt template.
/// Replace: {title}, {description}, {skills}, {experience_level}, {education},
///          {requirements}, {name}, {candidate_skills}, {experience},
///          {candidate_education}, {summary}
pub const GRADING_PROMPT_TEMPLATE: &str = r#"Grade this resume against the job description.

JOB DESCRIPTION:
Title: {title}
Description: {description}
Required Skills: {skills}
Experience Level: {experience_level}
Education Requirements: {education}
Additional Requirements: {requirements}

CANDIDATE RESUME:
Name: {name}
Skills: {candidate_skills}
Experience: {experience}
Education: {candidate_education}
Summary: {summary}

GRADING INSTRUCTIONS:
1. Score the candidate from 0 to 100 based on how well they match the job requirements.
2. Consider skills alignment, experience level, education and overall qualifications.
3. Give exactly 3 reasons for the score, each 15-25 words, citing specifics from the resume.

Return a JSON object with this EXACT schema (no extra fields):
{
  "score": 85,
  "reasons": [
    "first reason",
    "second reason",
    "third reason"
  ]
}"#;

fn or_placeholder(items: &[String], placeholder: &str) -> String {
    if items.is_empty() {
        placeholder.to_string()
    } else {
        items.join(", ")
    }
}

fn format_experience(experience: &[WorkExperience]) -> String {
    if experience.is_empty() {
        return "No experience listed".to_string();
    }
    experience
        .iter()
        .map(|e| {
            let mut line = format!("{} at {} ({} years)", e.position, e.company, e.years);
            if let Some(description) = &e.description {
                line.push_str(": ");
                line.push_str(description);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_education(education: &[EducationRecord]) -> String {
    if education.is_empty() {
        return "No education listed".to_string();
    }
    education
        .iter()
        .map(|e| {
            let mut line = e.degree.clone();
            if !e.field.is_empty() && !e.degree.contains(&e.field) {
                line.push_str(&format!(" in {}", e.field));
            }
            if let Some(institution) = &e.institution {
                line.push_str(&format!(" from {institution}"));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn build_grading_prompt(jd: &JobDescriptionData, resume: &ResumeData) -> String {
    GRADING_PROMPT_TEMPLATE
        .replace("{title}", &jd.title)
        .replace("{description}", &jd.description)
        .replace("{skills}", &or_placeholder(&jd.skills, "Not specified"))
        .replace(
            "{experience_level}",
            jd.experience_level.as_deref().unwrap_or("Not specified"),
        )
        .replace(
            "{education}",
            jd.education.as_deref().unwrap_or("Not specified"),
        )
        .replace(
            "{requirements}",
            &or_placeholder(&jd.requirements, "None specified"),
        )
        .replace("{name}", &resume.name)
        .replace(
            "{candidate_skills}",
            &or_placeholder(&resume.skills, "Not specified"),
        )
        .replace("{experience}", &format_experience(&resume.experience))
        .replace(
            "{candidate_education}",
            &format_education(&resume.education),
        )
        .replace(
            "{summary}",
            resume.summary.as_deref().unwrap_or("Not provided"),
        )
}
