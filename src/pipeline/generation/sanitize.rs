// Cleanup on both sides of a generator call: user text going into a prompt,
// and raw model output coming back.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum user-supplied text embedded in a single prompt (characters).
pub const MAX_PROMPT_INPUT_CHARS: usize = 24_000;

/// Strip reasoning artifacts from raw generator output.
///
/// Handles `<think>...</think>` blocks (closed or left open at the end of the
/// response), stray `<unusedN>` tokenizer leftovers, and surrounding whitespace.
pub fn sanitize_llm_output(raw: &str) -> String {
    static THINK_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)<think>.*?(</think>|$)").expect("valid regex"));
    static UNUSED_TOKEN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));

    let text = THINK_BLOCK_RE.replace_all(raw, "");
    let text = UNUSED_TOKEN_RE.replace_all(&text, "");
    text.trim().to_string()
}

/// Prepare user or document text for embedding in a prompt: drop invisible
/// formatting characters and control characters, then truncate on a char
/// boundary.
pub fn sanitize_for_prompt(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| keep_char(*c)).collect();
    truncate_chars(&cleaned, MAX_PROMPT_INPUT_CHARS)
}

fn keep_char(c: char) -> bool {
    if matches!(c, ' ' | '\n' | '\t' | '\r') {
        return true;
    }
    if matches!(
        c,
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' | '\u{FEFF}'
    ) {
        return false;
    }
    !c.is_control()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => {
            tracing::debug!(max_chars, "Prompt input truncated");
            text[..byte_idx].to_string()
        }
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_closed_think_block() {
        let raw = "<think>weighing options</think>\n{\"a\": 1}";
        assert_eq!(sanitize_llm_output(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_unterminated_think_block() {
        let raw = "Answer first.<think>never closed";
        assert_eq!(sanitize_llm_output(raw), "Answer first.");
    }

    #[test]
    fn strips_unused_tokens() {
        assert_eq!(sanitize_llm_output("<unused94>Hello<unused95>"), "Hello");
    }

    #[test]
    fn plain_output_unchanged() {
        assert_eq!(sanitize_llm_output("  The parties agree.  "), "The parties agree.");
    }

    #[test]
    fn prompt_input_drops_invisible_chars() {
        let raw = "Net\u{200B} 30\u{FEFF} days\u{0007}";
        assert_eq!(sanitize_for_prompt(raw), "Net 30 days");
    }

    #[test]
    fn prompt_input_keeps_whitespace() {
        assert_eq!(sanitize_for_prompt("a\n\tb\r\n"), "a\n\tb\r\n");
    }

    #[test]
    fn prompt_input_truncates_on_char_boundary() {
        let raw = "é".repeat(MAX_PROMPT_INPUT_CHARS + 10);
        let out = sanitize_for_prompt(&raw);
        assert_eq!(out.chars().count(), MAX_PROMPT_INPUT_CHARS);
    }
}
