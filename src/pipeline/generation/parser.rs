use serde::de::DeserializeOwned;

use super::GenerationError;

/// Locate the JSON payload in a generator response.
///
/// Prefers a fenced ```json block; falls back to the outermost `{...}` or
/// `[...]` span when the model skipped the fence.
pub fn extract_json_block(response: &str) -> Result<&str, GenerationError> {
    if let Some(fence_start) = response.find("```json") {
        let content_start = fence_start + 7;
        let content_end = response[content_start..]
            .find("```")
            .ok_or_else(|| GenerationError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(response[content_start..content_start + content_end].trim());
    }

    let object = outer_span(response, '{', '}');
    let array = outer_span(response, '[', ']');
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };

    span.map(|(start, end)| &response[start..=end])
        .ok_or_else(|| GenerationError::MalformedResponse("No JSON block found".into()))
}

fn outer_span(text: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then_some((start, end))
}

/// Parse a typed payload out of a (sanitized) generator response.
pub fn parse_payload<T: DeserializeOwned>(response: &str) -> Result<T, GenerationError> {
    if response.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let json = extract_json_block(response)?;
    serde_json::from_str(json).map_err(|e| GenerationError::JsonParsing(e.to_string()))
}

/// Parse an array leniently: items that fail to deserialize are skipped.
pub fn parse_array_lenient<T: DeserializeOwned>(items: Option<&[serde_json::Value]>) -> Vec<T> {
    match items {
        None => vec![],
        Some(arr) => arr
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect(),
    }
}

/// Salvage prose from a response whose JSON could not be parsed.
///
/// Takes text after a (possibly broken) JSON block, or the whole response
/// when there is no block.
pub fn extract_prose_fallback(response: &str) -> String {
    // ASCII fold keeps byte offsets aligned with `response`.
    let lower = response.to_ascii_lowercase();

    if let Some(json_start) = lower.find("```json") {
        if let Some(end_fence) = response[json_start + 7..].find("```") {
            let after_json = json_start + 7 + end_fence + 3;
            if after_json < response.len() {
                let prose = response[after_json..].trim();
                if !prose.is_empty() {
                    return prose.to_string();
                }
            }
        }
        return String::new();
    }

    response.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
    }

    #[test]
    fn fenced_block_preferred() {
        let resp = "Here you go:\n```json\n{\"name\": \"nda\"}\n```\ntrailing";
        assert_eq!(extract_json_block(resp).unwrap(), "{\"name\": \"nda\"}");
    }

    #[test]
    fn bare_object_accepted() {
        let resp = "Sure. {\"name\": \"lease\"} Hope that helps.";
        let parsed: Sample = parse_payload(resp).unwrap();
        assert_eq!(parsed.name, "lease");
    }

    #[test]
    fn bare_array_accepted() {
        let parsed: Vec<Sample> = parse_payload("[{\"name\": \"a\"}, {\"name\": \"b\"}]").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn unclosed_fence_is_malformed() {
        let err = extract_json_block("```json\n{\"name\": 1").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn no_json_is_malformed() {
        let err = parse_payload::<Sample>("I cannot help with that.").unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn empty_response_detected() {
        assert!(matches!(
            parse_payload::<Sample>("   "),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn wrong_shape_is_json_error() {
        let err = parse_payload::<Sample>("{\"title\": \"x\"}").unwrap_err();
        assert!(matches!(err, GenerationError::JsonParsing(_)));
    }

    #[test]
    fn lenient_array_skips_bad_items() {
        let values = vec![
            serde_json::json!({"name": "ok"}),
            serde_json::json!({"wrong": true}),
        ];
        let items: Vec<Sample> = parse_array_lenient(Some(&values));
        assert_eq!(items, vec![Sample { name: "ok".into() }]);
        assert!(parse_array_lenient::<Sample>(None).is_empty());
    }

    #[test]
    fn prose_fallback_after_json_block() {
        let resp = "```json\n{broken\n```\nThe Supplier shall deliver.";
        assert_eq!(extract_prose_fallback(resp), "The Supplier shall deliver.");
    }

    #[test]
    fn prose_fallback_whole_response() {
        assert_eq!(extract_prose_fallback("  Plain clause text. "), "Plain clause text.");
    }

    #[test]
    fn prose_fallback_empty_when_only_json() {
        assert_eq!(extract_prose_fallback("```json\n{}\n```"), "");
    }

    #[test]
    fn prose_fallback_handles_case_expanding_chars() {
        // 'İ' lowercases to three bytes; offsets must still come from the original.
        assert_eq!(extract_prose_fallback("İİİİİİİİ```json€€€€€€"), "");
        assert_eq!(
            extract_prose_fallback("İİİİ```JSON\n{}\n```\nClause İ applies."),
            "Clause İ applies."
        );
    }
}
