/// How document and quote text are folded before searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Lowercase every character.
    CaseFold,
    /// Lowercase and collapse every whitespace run to a single space.
    CaseFoldWhitespace,
}

/// A folded copy of a source text that remembers, for every byte it holds,
/// which source character produced it.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    /// Source byte offset where the producing character starts.
    starts: Vec<usize>,
    /// Source byte offset just past the producing character.
    ends: Vec<usize>,
}

impl NormalizedText {
    pub fn new(source: &str, mode: Normalization) -> Self {
        let mut text = String::with_capacity(source.len());
        let mut starts = Vec::with_capacity(source.len());
        let mut ends = Vec::with_capacity(source.len());
        let mut in_whitespace = false;

        for (i, c) in source.char_indices() {
            let end = i + c.len_utf8();

            if mode == Normalization::CaseFoldWhitespace && c.is_whitespace() {
                if !in_whitespace {
                    text.push(' ');
                    starts.push(i);
                    ends.push(end);
                }
                in_whitespace = true;
                continue;
            }
            in_whitespace = false;

            for folded in fold_char(c) {
                text.push(folded);
                for _ in 0..folded.len_utf8() {
                    starts.push(i);
                    ends.push(end);
                }
            }
        }

        Self { text, starts, ends }
    }

    /// Map a `[start, end)` range of the folded text back to source offsets.
    pub fn to_original(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end || end > self.text.len() {
            return None;
        }
        Some((self.starts[start], self.ends[end - 1]))
    }

    /// First occurrence of an already-folded needle, in source offsets.
    pub fn find(&self, needle: &str) -> Option<(usize, usize)> {
        if needle.is_empty() {
            return None;
        }
        let start = self.text.find(needle)?;
        self.to_original(start, start + needle.len())
    }
}

/// Fold a standalone string the same way `NormalizedText` folds a document.
pub fn normalize_str(text: &str, mode: Normalization) -> String {
    match mode {
        Normalization::CaseFold => text.chars().flat_map(fold_char).collect(),
        Normalization::CaseFoldWhitespace => text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .flat_map(fold_char)
            .collect(),
    }
}

/// Context-free lowercase of one char. Final sigma folds to `σ` so word
/// position never changes the result.
fn fold_char(c: char) -> impl Iterator<Item = char> {
    c.to_lowercase().map(|l| if l == 'ς' { 'σ' } else { l })
}

/// Largest char boundary of `text` that is `<= idx`.
pub fn floor_char_boundary(text: &str, idx: usize) -> usize {
    if idx >= text.len() {
        return text.len();
    }
    let mut i = idx;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn case_fold_maps_back() {
        let source = "The LICENSEE shall pay";
        let nt = NormalizedText::new(source, Normalization::CaseFold);
        let (s, e) = nt.find("licensee").unwrap();
        assert_eq!(&source[s..e], "LICENSEE");
    }

    #[test]
    fn whitespace_runs_collapse() {
        let source = "net   thirty\n\tdays";
        let nt = NormalizedText::new(source, Normalization::CaseFoldWhitespace);
        assert_eq!(nt.text, "net thirty days");
        let (s, e) = nt.find("thirty days").unwrap();
        assert_eq!(&source[s..e], "thirty\n\tdays");
    }

    #[test]
    fn multibyte_offsets_stay_on_boundaries() {
        let source = "Zahlung an MÜLLER GmbH";
        let nt = NormalizedText::new(source, Normalization::CaseFold);
        let (s, e) = nt.find("müller").unwrap();
        assert_eq!(&source[s..e], "MÜLLER");
    }

    #[test]
    fn normalize_str_matches_document_folding() {
        assert_eq!(
            normalize_str("  Net \n 30  Days ", Normalization::CaseFoldWhitespace),
            "net 30 days"
        );
        assert_eq!(normalize_str("ABC", Normalization::CaseFold), "abc");
    }

    #[test]
    fn greek_sigma_folds_the_same_on_both_sides() {
        let source = "Διεύθυνση: ΟΔΟΣ ΑΘΗΝΩΝ 12";
        let nt = NormalizedText::new(source, Normalization::CaseFold);
        for quote in ["ΟΔΟΣ αθηνων", "οδος αθηνων"] {
            let needle = normalize_str(quote, Normalization::CaseFold);
            let (s, e) = nt.find(&needle).unwrap();
            assert_eq!(&source[s..e], "ΟΔΟΣ ΑΘΗΝΩΝ");
        }
    }

    #[test]
    fn empty_needle_not_found() {
        let nt = NormalizedText::new("abc", Normalization::CaseFold);
        assert!(nt.find("").is_none());
        assert!(nt.to_original(2, 2).is_none());
    }

    #[test]
    fn floor_boundary_steps_back() {
        let text = "aé";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 10), 3);
    }
}
