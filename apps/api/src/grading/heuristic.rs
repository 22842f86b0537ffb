//! Deterministic rule-based grading. The contractual fallback whenever the
//! LLM path is unavailable or returns something unusable.

use crate::extraction::{JobDescriptionData, ResumeData};
use crate::grading::{GradeResult, GradeSource};

pub const BASE_SCORE: i32 = 50;
pub const POINTS_PER_SKILL: i32 = 8;
pub const MAX_SKILL_POINTS: i32 = 40;
pub const SENIOR_EXPERIENCE_POINTS: i32 = 15;
pub const EXPERIENCE_POINTS: i32 = 10;
pub const EDUCATION_POINTS: i32 = 8;

const SENIOR_MARKERS: &[&str] = &["senior", "lead", "principal", "staff"];
const SENIOR_YEARS: u32 = 5;
const DEFAULT_MIN_YEARS: u32 = 3;

pub const HEURISTIC_PADDING_REASON: &str = "Professional presentation and communication skills";

/// JD skills matched by any resume skill, case-insensitive substring in either direction.
pub fn overlapping_skills(jd_skills: &[String], resume_skills: &[String]) -> Vec<String> {
    let resume_lower: Vec<String> = resume_skills
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let mut seen = std::collections::HashSet::new();
    jd_skills
        .iter()
        .filter(|skill| {
            let needle = skill.trim().to_lowercase();
            !needle.is_empty()
                && resume_lower
                    .iter()
                    .any(|r| r.contains(&needle) || needle.contains(r.as_str()))
                && seen.insert(needle)
        })
        .map(|s| s.trim().to_string())
        .collect()
}

fn leading_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

pub fn heuristic_grade(jd: &JobDescriptionData, resume: &ResumeData) -> GradeResult {
    let mut score = BASE_SCORE;
    let mut reasons = Vec::with_capacity(3);

    let matched = overlapping_skills(&jd.skills, &resume.skills);
    if !matched.is_empty() {
        score += (matched.len() as i32 * POINTS_PER_SKILL).min(MAX_SKILL_POINTS);
        reasons.push(format!("Skills match: {}", matched.join(", ")));
    }

    let years = resume.total_years();
    let level = jd.experience_level.as_deref().unwrap_or_default();
    let min_years = leading_number(level);
    let level_lower = level.to_lowercase();
    let senior_role = SENIOR_MARKERS.iter().any(|m| level_lower.contains(m))
        || min_years.is_some_and(|n| n >= SENIOR_YEARS);

    if senior_role && years >= SENIOR_YEARS {
        score += SENIOR_EXPERIENCE_POINTS;
        reasons.push(format!(
            "{years} years of experience meets the senior-level expectation"
        ));
    } else if years >= min_years.unwrap_or(DEFAULT_MIN_YEARS) && years > 0 {
        score += EXPERIENCE_POINTS;
        reasons.push(format!("{years} years of relevant experience"));
    }

    if let Some(education) = resume.education.first() {
        score += EDUCATION_POINTS;
        let credential = if education.field.is_empty() || education.degree.contains(&education.field)
        {
            education.degree.clone()
        } else {
            format!("{} in {}", education.degree, education.field)
        };
        reasons.push(format!("Educational background: {credential}"));
    }

    GradeResult::new(
        score.clamp(0, 100) as u8,
        reasons,
        HEURISTIC_PADDING_REASON,
        GradeSource::Heuristic,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{EducationRecord, WorkExperience};

    fn skills(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn with_years(years: u32) -> Vec<WorkExperience> {
        vec![WorkExperience {
            company: "Initech".to_string(),
            position: "Engineer".to_string(),
            years,
            description: None,
        }]
    }

    #[test]
    fn test_skill_overlap_raises_score_and_names_skill() {
        let jd = JobDescriptionData {
            skills: skills(&["React", "Node.js"]),
            ..Default::default()
        };
        let resume = ResumeData {
            skills: skills(&["JavaScript", "React"]),
            ..Default::default()
        };
        let result = heuristic_grade(&jd, &resume);
        assert!(result.final_score > 50);
        assert!(result.top_reasons.iter().any(|r| r.contains("React")));
        assert_eq!(result.top_reasons.len(), 3);
        assert_eq!(result.source, GradeSource::Heuristic);
    }

    #[test]
    fn test_overlap_matches_substrings_both_ways_without_duplicates() {
        let matched = overlapping_skills(
            &skills(&["Excel", "Microsoft Excel", "excel", "Go"]),
            &skills(&["Microsoft Excel 365"]),
        );
        assert_eq!(matched, vec!["Excel", "Microsoft Excel"]);
    }

    #[test]
    fn test_skill_points_are_capped() {
        let many = skills(&["a1", "b2", "c3", "d4", "e5", "f6", "g7"]);
        let jd = JobDescriptionData {
            skills: many.clone(),
            ..Default::default()
        };
        let resume = ResumeData {
            skills: many,
            ..Default::default()
        };
        assert_eq!(
            heuristic_grade(&jd, &resume).final_score as i32,
            BASE_SCORE + MAX_SKILL_POINTS
        );
    }

    #[test]
    fn test_senior_role_rewards_five_plus_years_more() {
        let jd = JobDescriptionData {
            experience_level: Some("Senior".to_string()),
            ..Default::default()
        };
        let senior = ResumeData {
            experience: with_years(6),
            ..Default::default()
        };
        let junior = ResumeData {
            experience: with_years(3),
            ..Default::default()
        };
        assert_eq!(
            heuristic_grade(&jd, &senior).final_score as i32,
            BASE_SCORE + SENIOR_EXPERIENCE_POINTS
        );
        assert_eq!(
            heuristic_grade(&jd, &junior).final_score as i32,
            BASE_SCORE + EXPERIENCE_POINTS
        );
    }

    #[test]
    fn test_numeric_level_sets_threshold() {
        let jd = JobDescriptionData {
            experience_level: Some("4".to_string()),
            ..Default::default()
        };
        let short = ResumeData {
            experience: with_years(3),
            ..Default::default()
        };
        let enough = ResumeData {
            experience: with_years(4),
            ..Default::default()
        };
        assert_eq!(heuristic_grade(&jd, &short).final_score as i32, BASE_SCORE);
        assert_eq!(
            heuristic_grade(&jd, &enough).final_score as i32,
            BASE_SCORE + EXPERIENCE_POINTS
        );
    }

    #[test]
    fn test_education_adds_points_and_avoids_repeating_field() {
        let resume = ResumeData {
            education: vec![EducationRecord {
                degree: "Master of Science in Biology".to_string(),
                field: "Biology".to_string(),
                institution: None,
            }],
            ..Default::default()
        };
        let result = heuristic_grade(&JobDescriptionData::default(), &resume);
        assert_eq!(result.final_score as i32, BASE_SCORE + EDUCATION_POINTS);
        assert_eq!(
            result.top_reasons[0],
            "Educational background: Master of Science in Biology"
        );
        assert_eq!(result.top_reasons[1], HEURISTIC_PADDING_REASON);
    }

    #[test]
    fn test_same_inputs_same_score() {
        let jd = JobDescriptionData {
            skills: skills(&["SQL"]),
            experience_level: Some("2".to_string()),
            ..Default::default()
        };
        let resume = ResumeData {
            skills: skills(&["sql"]),
            experience: with_years(2),
            ..Default::default()
        };
        assert_eq!(heuristic_grade(&jd, &resume), heuristic_grade(&jd, &resume));
    }
}
