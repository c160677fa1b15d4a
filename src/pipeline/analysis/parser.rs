use serde::Deserialize;

use super::types::{ChunkTask, Finding};
use crate::models::enums::SeverityTier;
use crate::pipeline::generation::parse_array_lenient;

/// Finding as the generator writes it. Every field is optional; the
/// normalizing step below fills conservative values.
#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(default, alias = "quote")]
    quoted_span: String,
    #[serde(default)]
    score: Option<serde_json::Value>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    explanation: String,
    #[serde(default, alias = "recommendation")]
    suggestion: String,
    #[serde(default)]
    location: Option<String>,
}

/// Score used when the generator gives neither a score nor a tier.
const DEFAULT_SCORE: u8 = 5;

/// Turn a parsed chunk payload into namespaced findings.
///
/// Accepts `{"findings": [...]}` or a bare array. Malformed items are
/// skipped, as are items with neither a quote nor an explanation.
pub fn findings_from_payload(payload: &serde_json::Value, chunk: &ChunkTask) -> Vec<Finding> {
    let items = match payload {
        serde_json::Value::Array(items) => Some(items.as_slice()),
        serde_json::Value::Object(map) => map
            .get("findings")
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice()),
        _ => None,
    };

    parse_array_lenient::<RawFinding>(items)
        .into_iter()
        .filter(|raw| !raw.quoted_span.trim().is_empty() || !raw.explanation.trim().is_empty())
        .enumerate()
        .map(|(local_index, raw)| normalize(raw, chunk, local_index))
        .collect()
}

fn normalize(raw: RawFinding, chunk: &ChunkTask, local_index: usize) -> Finding {
    let tier_hint = raw.severity.as_deref().and_then(SeverityTier::parse_lenient);
    let score = raw
        .score
        .as_ref()
        .and_then(lenient_score)
        .or_else(|| tier_hint.map(representative_score))
        .unwrap_or(DEFAULT_SCORE);

    let category = match raw.category.trim() {
        "" => "general".to_string(),
        c => c.to_lowercase(),
    };

    Finding {
        id: format!("c{}-f{}", chunk.index, local_index),
        chunk_index: chunk.index,
        local_index,
        quoted_span: raw.quoted_span.trim().to_string(),
        severity: SeverityTier::from_score(score),
        score,
        category,
        explanation: raw.explanation.trim().to_string(),
        suggestion: raw.suggestion.trim().to_string(),
        location_label: raw
            .location
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| chunk.title.clone()),
        span: None,
    }
}

/// Numbers or numeric strings, rounded and clamped to 1-10.
fn lenient_score(value: &serde_json::Value) -> Option<u8> {
    let n = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().split('/').next()?.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(1.0, 10.0) as u8)
}

fn representative_score(tier: SeverityTier) -> u8 {
    match tier {
        SeverityTier::Critical => 9,
        SeverityTier::High => 7,
        SeverityTier::Medium => 5,
        SeverityTier::Low => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunk() -> ChunkTask {
        ChunkTask {
            index: 3,
            title: "ARTICLE 9 INDEMNITY".into(),
            content: String::new(),
            source_offset_hint: 0,
        }
    }

    #[test]
    fn parses_findings_object() {
        let payload = json!({"findings": [
            {"quoted_span": "unlimited liability", "score": 9, "category": "Liability",
             "explanation": "No cap", "suggestion": "Add a cap"},
            {"quoted_span": "30 days", "score": 3, "category": "payment",
             "explanation": "Short", "suggestion": ""}
        ]});
        let findings = findings_from_payload(&payload, &chunk());

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].id, "c3-f0");
        assert_eq!(findings[0].severity, SeverityTier::Critical);
        assert_eq!(findings[0].category, "liability");
        assert_eq!(findings[0].location_label, "ARTICLE 9 INDEMNITY");
        assert_eq!(findings[1].id, "c3-f1");
        assert_eq!(findings[1].severity, SeverityTier::Low);
    }

    #[test]
    fn bare_array_accepted() {
        let payload = json!([{"quote": "sole discretion", "score": "7/10", "explanation": "x"}]);
        let findings = findings_from_payload(&payload, &chunk());
        assert_eq!(findings[0].quoted_span, "sole discretion");
        assert_eq!(findings[0].score, 7);
        assert_eq!(findings[0].severity, SeverityTier::High);
    }

    #[test]
    fn score_clamped_and_tier_fallback() {
        let payload = json!({"findings": [
            {"quoted_span": "a", "score": 42},
            {"quoted_span": "b", "score": -3},
            {"quoted_span": "c", "severity": "HIGH"},
            {"quoted_span": "d"}
        ]});
        let scores: Vec<u8> = findings_from_payload(&payload, &chunk())
            .iter()
            .map(|f| f.score)
            .collect();
        assert_eq!(scores, vec![10, 1, 7, DEFAULT_SCORE]);
    }

    #[test]
    fn empty_and_malformed_items_skipped() {
        let payload = json!({"findings": [
            {"quoted_span": "  ", "explanation": ""},
            "not an object",
            {"quoted_span": "kept", "score": 4}
        ]});
        let findings = findings_from_payload(&payload, &chunk());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].local_index, 0);
        assert_eq!(findings[0].category, "general");
    }

    #[test]
    fn unexpected_shape_yields_nothing() {
        assert!(findings_from_payload(&json!("text"), &chunk()).is_empty());
        assert!(findings_from_payload(&json!({"risks": []}), &chunk()).is_empty());
    }
}
