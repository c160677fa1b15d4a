use super::types::ChunkTask;
use crate::pipeline::generation::sanitize_for_prompt;

pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"
You are a contract risk reviewer. You read one excerpt of a contract and report
clauses that expose a party to legal, financial, or operational risk.

RULES:
1. Quote the risky text VERBATIM from the excerpt in "quoted_span".
2. Score each finding from 1 (negligible) to 10 (severe).
3. Report only what the excerpt actually says. Do not invent clauses.
4. If the excerpt carries no notable risk, return an empty findings array.
5. Output MUST be a single JSON object in ```json``` fences.
"#;

/// Build the review prompt for one chunk.
pub fn build_chunk_prompt(chunk: &ChunkTask) -> String {
    let excerpt = sanitize_for_prompt(&chunk.content);
    format!(
        r#"Excerpt: {title}

<excerpt>
{excerpt}
</excerpt>

Review the excerpt above and answer with:

```json
{{
  "findings": [
    {{
      "quoted_span": "exact text from the excerpt",
      "score": 1,
      "severity": "critical | high | medium | low",
      "category": "e.g. liability, termination, payment, confidentiality, ip",
      "explanation": "why this is a risk",
      "suggestion": "how to reduce the risk"
    }}
  ]
}}
```"#,
        title = chunk.title,
    )
}
