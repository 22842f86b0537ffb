use serde_json::Value;

use crate::grading::{GradeResult, GradeSource, GradingError};

pub const LLM_PADDING_REASON: &str = "Additional qualifications and potential for growth";

/// Returns the first `{...}` span whose braces balance, ignoring braces
/// inside JSON string literals.
pub fn first_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }
        search_from = start + 1;
    }
    None
}

/// Validates an LLM reply and coerces it into a grade.
///
/// Accepts `score` or `finalScore` (number) and `reasons` or `topReasons` (list).
pub fn parse_grading_response(text: &str) -> Result<GradeResult, GradingError> {
    let json = first_json_object(text).ok_or(GradingError::NoJson)?;
    let value: Value = serde_json::from_str(json)?;

    let score = value
        .get("score")
        .or_else(|| value.get("finalScore"))
        .and_then(Value::as_f64)
        .ok_or_else(|| GradingError::InvalidShape("score is missing or not a number".into()))?;

    let reasons = value
        .get("reasons")
        .or_else(|| value.get("topReasons"))
        .and_then(Value::as_array)
        .ok_or_else(|| GradingError::InvalidShape("reasons is missing or not a list".into()))?;

    let reasons: Vec<String> = reasons
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(String::from)
        .collect();

    Ok(GradeResult::new(
        score.round().clamp(0.0, 100.0) as u8,
        reasons,
        LLM_PADDING_REASON,
        GradeSource::Llm,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_json_object_skips_prose_and_string_braces() {
        let text = r#"Sure! Here you go: {"reasons": ["uses {braces}"], "score": 70} trailing }"#;
        assert_eq!(
            first_json_object(text),
            Some(r#"{"reasons": ["uses {braces}"], "score": 70}"#)
        );
        assert_eq!(first_json_object("no json here"), None);
        assert_eq!(first_json_object("{ unclosed"), None);
    }

    #[test]
    fn test_first_json_object_handles_escaped_quotes() {
        let text = r#"{"a": "say \"}\" now", "b": {"c": 1}}"#;
        assert_eq!(first_json_object(text), Some(text));
    }

    #[test]
    fn test_parse_rounds_clamps_and_pads() {
        let result = parse_grading_response(r#"{"score": 104.6, "reasons": ["Strong fit", "  "]}"#)
            .unwrap();
        assert_eq!(result.final_score, 100);
        assert_eq!(result.top_reasons[0], "Strong fit");
        assert_eq!(result.top_reasons[1], LLM_PADDING_REASON);
        assert_eq!(result.top_reasons[2], LLM_PADDING_REASON);
        assert_eq!(result.source, GradeSource::Llm);
    }

    #[test]
    fn test_parse_accepts_alternate_field_names_and_truncates() {
        let result = parse_grading_response(
            r#"```json
{"finalScore": 66.4, "topReasons": ["a", "b", "c", "d"]}
```"#,
        )
        .unwrap();
        assert_eq!(result.final_score, 66);
        assert_eq!(result.top_reasons, ["a", "b", "c"]);
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(matches!(
            parse_grading_response(r#"{"score": "high", "reasons": []}"#),
            Err(GradingError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_grading_response(r#"{"score": 50, "reasons": "good"}"#),
            Err(GradingError::InvalidShape(_))
        ));
        assert!(matches!(
            parse_grading_response("The candidate looks great, 9/10."),
            Err(GradingError::NoJson)
        ));
        assert!(matches!(
            parse_grading_response("{score: 5}"),
            Err(GradingError::InvalidJson(_))
        ));
    }
}
