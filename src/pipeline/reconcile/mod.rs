//! Quote reconciliation: map a short fragment quoted by the generator back
//! onto byte offsets in the canonical document.
//!
//! Tiers run in order and the first success wins. The function is pure and
//! deterministic; no tier can fail loudly, the last one always produces the
//! no-match sentinel.

pub mod normalize;
pub mod sentences;

pub use normalize::*;
pub use sentences::*;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Share of significant quote words that must reappear near the anchor.
const ANCHOR_OVERLAP_THRESHOLD: f64 = 0.7;
/// Share of significant quote words a sentence must contain.
const SENTENCE_OVERLAP_THRESHOLD: f64 = 0.5;
/// Words this long or shorter are ignored when measuring overlap.
const SHORT_WORD_LEN: usize = 3;
/// Minimum length of a word anchoring the distinctive-word tier.
const DISTINCTIVE_WORD_LEN: usize = 6;
/// Size of the span reported by the distinctive-word tier (bytes).
const DISTINCTIVE_WINDOW: usize = 100;

/// Which tier produced a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    CaseInsensitive,
    WhitespaceNormalized,
    AnchorVerified,
    BestSentence,
    DistinctiveWord,
    NoMatch,
}

/// Byte offsets `[start, end)` into the canonical document.
///
/// With `tier == NoMatch` the offsets are the sentinel `{0, quote.len()}` and
/// do not point at document content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub start: usize,
    pub end: usize,
    pub tier: MatchTier,
}

impl ReconciliationResult {
    pub fn no_match(quote: &str) -> Self {
        Self {
            start: 0,
            end: quote.len(),
            tier: MatchTier::NoMatch,
        }
    }

    pub fn is_match(&self) -> bool {
        self.tier != MatchTier::NoMatch
    }

    fn found(start: usize, end: usize, tier: MatchTier) -> Self {
        Self { start, end, tier }
    }
}

/// Locate `quote` inside `document`.
pub fn locate(document: &str, quote: &str) -> ReconciliationResult {
    if quote.trim().is_empty() || document.is_empty() {
        return ReconciliationResult::no_match(quote);
    }

    let result = exact(document, quote)
        .or_else(|| case_insensitive(document, quote))
        .or_else(|| whitespace_normalized(document, quote))
        .or_else(|| anchor_verified(document, quote))
        .or_else(|| best_sentence(document, quote))
        .or_else(|| distinctive_word(document, quote))
        .unwrap_or_else(|| ReconciliationResult::no_match(quote));

    tracing::trace!(
        quote_len = quote.len(),
        tier = ?result.tier,
        start = result.start,
        end = result.end,
        "Quote reconciled"
    );
    result
}

fn exact(document: &str, quote: &str) -> Option<ReconciliationResult> {
    let start = document.find(quote)?;
    Some(ReconciliationResult::found(start, start + quote.len(), MatchTier::Exact))
}

fn case_insensitive(document: &str, quote: &str) -> Option<ReconciliationResult> {
    let folded = NormalizedText::new(document, Normalization::CaseFold);
    let needle = normalize_str(quote.trim(), Normalization::CaseFold);
    let (start, end) = folded.find(&needle)?;
    Some(ReconciliationResult::found(start, end, MatchTier::CaseInsensitive))
}

fn whitespace_normalized(document: &str, quote: &str) -> Option<ReconciliationResult> {
    let folded = NormalizedText::new(document, Normalization::CaseFoldWhitespace);
    let needle = normalize_str(quote, Normalization::CaseFoldWhitespace);
    let (start, end) = folded.find(&needle)?;
    Some(ReconciliationResult::found(start, end, MatchTier::WhitespaceNormalized))
}

/// Anchor on the first half of the quote, then verify that the bounded
/// window following the anchor carries most of the quote's words.
fn anchor_verified(document: &str, quote: &str) -> Option<ReconciliationResult> {
    let needle = normalize_str(quote, Normalization::CaseFoldWhitespace);
    let words = significant_words(&needle);
    if words.is_empty() {
        return None;
    }

    let half_chars = needle.chars().count() / 2;
    let anchor: String = needle.chars().take(half_chars).collect();
    let anchor = anchor.trim();
    if anchor.len() <= SHORT_WORD_LEN {
        return None;
    }

    let folded = NormalizedText::new(document, Normalization::CaseFoldWhitespace);
    let text = folded.text.as_str();
    let verify_len = needle.len() + needle.len() / 4;

    for (pos, _) in text.match_indices(anchor) {
        let verify_end = floor_char_boundary(text, pos + verify_len);
        let window_words = significant_words(&text[pos..verify_end]);
        if overlap_ratio(&words, &window_words) < ANCHOR_OVERLAP_THRESHOLD {
            continue;
        }

        let span_end = floor_char_boundary(text, pos + needle.len());
        let span_end = pos + text[pos..span_end].trim_end().len();
        let (start, end) = folded.to_original(pos, span_end)?;
        return Some(ReconciliationResult::found(start, end, MatchTier::AnchorVerified));
    }
    None
}

fn best_sentence(document: &str, quote: &str) -> Option<ReconciliationResult> {
    let words = significant_words(&quote.to_lowercase());
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(f64, SentenceSpan)> = None;
    for span in split_sentences(document) {
        let sentence_words = significant_words(&document[span.start..span.end].to_lowercase());
        let ratio = overlap_ratio(&words, &sentence_words);
        if best.map_or(true, |(best_ratio, _)| ratio > best_ratio) {
            best = Some((ratio, span));
        }
    }

    let (ratio, span) = best?;
    (ratio >= SENTENCE_OVERLAP_THRESHOLD)
        .then(|| ReconciliationResult::found(span.start, span.end, MatchTier::BestSentence))
}

/// Longest quote word (at least `DISTINCTIVE_WORD_LEN` chars) that occurs in
/// the document anchors a fixed-size window.
fn distinctive_word(document: &str, quote: &str) -> Option<ReconciliationResult> {
    let mut candidates: Vec<&str> = quote
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= DISTINCTIVE_WORD_LEN)
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by_key(|w| std::cmp::Reverse(w.chars().count()));

    let folded = NormalizedText::new(document, Normalization::CaseFold);
    let start = candidates
        .iter()
        .find_map(|w| {
            folded
                .find(&normalize_str(w, Normalization::CaseFold))
                .map(|(start, _)| start)
        })?;
    let end = floor_char_boundary(document, start + DISTINCTIVE_WINDOW);
    Some(ReconciliationResult::found(start, end, MatchTier::DistinctiveWord))
}

/// Lowercased words longer than `SHORT_WORD_LEN` characters.
fn significant_words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > SHORT_WORD_LEN)
        .map(|w| w.to_lowercase())
        .collect()
}

fn overlap_ratio(quote_words: &BTreeSet<String>, candidate: &BTreeSet<String>) -> f64 {
    if quote_words.is_empty() {
        return 0.0;
    }
    let shared = quote_words.intersection(candidate).count();
    shared as f64 / quote_words.len() as f64
}
