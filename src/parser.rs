//! Defensive parsing of generation output.
//!
//! The backend is asked for a JSON record per clause but returns untrusted
//! free text: prose, fenced JSON, arrays, or garbage. This boundary turns
//! that text into a total, typed result — any decode or shape failure
//! yields the deterministic fallback record instead of an error, so the
//! pipeline stays usable when the model ignores the requested shape.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::types::RiskLevel;

/// Sentinel explanation used whenever the backend's output cannot be
/// parsed (or the call itself failed).
pub const FALLBACK_EXPLANATION: &str = "(analysis unavailable)";

/// Typed fields of one clause analysis, as requested from the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClauseFields {
    pub explanation: String,
    pub risk: RiskLevel,
    pub example: String,
    pub law_reference: Option<String>,
}

impl ClauseFields {
    /// The deterministic record substituted on any parse failure.
    pub fn fallback() -> Self {
        Self {
            explanation: FALLBACK_EXPLANATION.to_string(),
            risk: RiskLevel::Medium,
            example: String::new(),
            law_reference: None,
        }
    }
}

/// Wire shape; `risk` stays a string here so an unknown level is a shape
/// failure rather than a panic.
#[derive(Deserialize)]
struct RawClauseFields {
    explanation: String,
    risk: String,
    example: String,
    #[serde(default)]
    law_reference: Option<String>,
}

/// Remove a surrounding Markdown code fence (with or without a `json`
/// info string) if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = rest
            .strip_prefix("json")
            .or_else(|| rest.strip_prefix("JSON"))
            .unwrap_or(rest);
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Parse the backend's raw output into clause fields. Total: never fails,
/// never panics — malformed input produces [`ClauseFields::fallback`].
pub fn parse_clause_fields(raw: &str) -> ClauseFields {
    match try_parse(raw) {
        Some(fields) => fields,
        None => {
            debug!(
                output_len = raw.len(),
                "generation output did not match the requested shape, using fallback record"
            );
            ClauseFields::fallback()
        }
    }
}

fn try_parse(raw: &str) -> Option<ClauseFields> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned).ok()?;

    // Models sometimes wrap the single record in a one-element array.
    let record = match value {
        Value::Array(items) => items.into_iter().next()?,
        other => other,
    };

    let fields: RawClauseFields = serde_json::from_value(record).ok()?;
    let risk = fields.risk.parse::<RiskLevel>().ok()?;

    Some(ClauseFields {
        explanation: fields.explanation,
        risk,
        example: fields.example,
        law_reference: fields.law_reference.filter(|r| !r.trim().is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_record_parses_exactly() {
        let parsed =
            parse_clause_fields(r#"{"explanation":"X","risk":"High","example":"Y"}"#);
        assert_eq!(parsed.explanation, "X");
        assert_eq!(parsed.risk, RiskLevel::High);
        assert_eq!(parsed.example, "Y");
        assert_eq!(parsed.law_reference, None);
    }

    #[test]
    fn law_reference_is_carried_when_present() {
        let parsed = parse_clause_fields(
            r#"{"explanation":"e","risk":"Low","example":"x","law_reference":"Sec 10, Contract Act"}"#,
        );
        assert_eq!(
            parsed.law_reference.as_deref(),
            Some("Sec 10, Contract Act")
        );
    }

    #[test]
    fn blank_law_reference_is_dropped() {
        let parsed = parse_clause_fields(
            r#"{"explanation":"e","risk":"Low","example":"x","law_reference":"  "}"#,
        );
        assert_eq!(parsed.law_reference, None);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"explanation\":\"fenced\",\"risk\":\"medium\",\"example\":\"\"}\n```";
        let parsed = parse_clause_fields(raw);
        assert_eq!(parsed.explanation, "fenced");
        assert_eq!(parsed.risk, RiskLevel::Medium);
    }

    #[test]
    fn bare_fence_without_info_string() {
        let raw = "```\n{\"explanation\":\"ok\",\"risk\":\"Low\",\"example\":\"e\"}\n```";
        assert_eq!(parse_clause_fields(raw).explanation, "ok");
    }

    #[test]
    fn array_wrapped_record_takes_first_element() {
        let raw = r#"[{"explanation":"first","risk":"High","example":"a"},
                      {"explanation":"second","risk":"Low","example":"b"}]"#;
        let parsed = parse_clause_fields(raw);
        assert_eq!(parsed.explanation, "first");
        assert_eq!(parsed.risk, RiskLevel::High);
    }

    #[test]
    fn prose_falls_back() {
        let parsed = parse_clause_fields("not json at all");
        assert_eq!(parsed, ClauseFields::fallback());
        assert_eq!(parsed.explanation, FALLBACK_EXPLANATION);
        assert_eq!(parsed.risk, RiskLevel::Medium);
        assert_eq!(parsed.example, "");
    }

    #[test]
    fn missing_required_field_falls_back() {
        let parsed = parse_clause_fields(r#"{"explanation":"only this"}"#);
        assert_eq!(parsed, ClauseFields::fallback());
    }

    #[test]
    fn wrong_field_type_falls_back() {
        let parsed =
            parse_clause_fields(r#"{"explanation":"e","risk":3,"example":"x"}"#);
        assert_eq!(parsed, ClauseFields::fallback());
    }

    #[test]
    fn unknown_risk_string_falls_back() {
        let parsed =
            parse_clause_fields(r#"{"explanation":"e","risk":"catastrophic","example":"x"}"#);
        assert_eq!(parsed, ClauseFields::fallback());
    }

    #[test]
    fn empty_array_falls_back() {
        assert_eq!(parse_clause_fields("[]"), ClauseFields::fallback());
    }

    #[test]
    fn empty_input_falls_back() {
        assert_eq!(parse_clause_fields(""), ClauseFields::fallback());
        assert_eq!(parse_clause_fields("``````"), ClauseFields::fallback());
    }

    #[test]
    fn fence_stripping_leaves_inner_backticks_alone() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":\"有`tick`\"}"), "{\"a\":\"有`tick`\"}");
        assert_eq!(strip_code_fences("   plain   "), "plain");
    }
}
