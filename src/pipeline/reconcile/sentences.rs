// Sentence splitting with byte offsets into the source text.

/// A sentence span, trimmed of surrounding whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceSpan {
    pub start: usize,
    pub end: usize,
}

/// Abbreviations that end with a period but are NOT sentence boundaries.
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Inc.", "Ltd.", "Corp.", "Co.", "LLC.", "No.",
    "Sec.", "Art.", "cl.", "para.", "vs.", "etc.", "e.g.", "i.e.", "approx.",
    "U.S.", "St.",
];

fn ends_with_abbreviation(prefix: &str) -> bool {
    ABBREVIATIONS.iter().any(|abbr| {
        prefix.len() >= abbr.len()
            && prefix.is_char_boundary(prefix.len() - abbr.len())
            && prefix[prefix.len() - abbr.len()..].eq_ignore_ascii_case(abbr)
            && prefix[..prefix.len() - abbr.len()]
                .chars()
                .last()
                .map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Split `text` into sentences.
///
/// A boundary is `.`, `!` or `?` followed by whitespace and then an uppercase
/// letter, digit, or opening quote/bracket; a blank line always ends a
/// sentence. Known abbreviations never end one.
pub fn split_sentences(text: &str) -> Vec<SentenceSpan> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        let boundary_end = match c {
            '.' | '!' | '?' => {
                let end = i + c.len_utf8();
                if c == '.'
                    && (ends_with_abbreviation(&text[..end]) || is_enumerator(&text[start..i]))
                {
                    None
                } else if starts_new_sentence(&text[end..]) {
                    Some(end)
                } else {
                    None
                }
            }
            '\n' if text[i + 1..].trim_start_matches([' ', '\t', '\r']).starts_with('\n') => Some(i),
            _ => None,
        };

        if let Some(end) = boundary_end {
            push_trimmed(text, start, end, &mut spans);
            while let Some(&(_, next)) = iter.peek() {
                if !next.is_whitespace() {
                    break;
                }
                iter.next();
            }
            if let Some(&(j, _)) = iter.peek() {
                start = j;
            } else {
                start = text.len();
            }
        }
    }

    push_trimmed(text, start, text.len(), &mut spans);
    spans
}

/// Clause numbers such as "1" or "4.2" before a period.
fn is_enumerator(segment: &str) -> bool {
    let trimmed = segment.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn starts_new_sentence(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_whitespace() => {
            let following = rest.trim_start().chars().next();
            following.map_or(true, |f| {
                f.is_uppercase() || f.is_ascii_digit() || matches!(f, '"' | '\'' | '(' | '[' | '“')
            })
        }
        Some(_) => false,
    }
}

fn push_trimmed(text: &str, start: usize, end: usize, spans: &mut Vec<SentenceSpan>) {
    if start >= end {
        return;
    }
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let s = start + lead;
    spans.push(SentenceSpan {
        start: s,
        end: s + trimmed.len(),
    });
}
