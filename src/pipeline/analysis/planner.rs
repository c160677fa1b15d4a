use std::sync::LazyLock;

use regex::Regex;

use super::types::{ChunkPlan, ChunkStrategy, ChunkTask};
use crate::engine_config::EngineConfig;
use crate::pipeline::reconcile::floor_char_boundary;

/// Line patterns that open a new contract section.
static HEADING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Markdown headings
        r"^#{1,6}\s+\S",
        // ARTICLE 4, Section 12, Clause IV
        r"^(?i:article|section|clause)\s+[0-9IVXLCivxlc]+\b",
        // 1. TERM / 4.2 Payment
        r"^\d+(\.\d+)*\.?\s+[A-Z]",
        // Schedules and attachments
        r"^(?i:schedule|exhibit|appendix|annex)\b",
        // DEFINITIONS AND INTERPRETATION
        r"^[A-Z][A-Z0-9 ,&'/()\-]{3,79}$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && HEADING_PATTERNS.iter().any(|re| re.is_match(trimmed))
}

/// A recognized section: byte range of the source plus its heading line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Section {
    title: String,
    start: usize,
    end: usize,
}

/// Splits a document into chunk tasks.
///
/// Structural splitting is tried first; when recognized sections cover less
/// than the configured share of the source, the document is cut into
/// fixed-size overlapping windows instead.
pub struct ChunkPlanner {
    window: usize,
    step: usize,
    min_chunk_len: usize,
    coverage_threshold: f64,
}

impl ChunkPlanner {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window: config.chunk_window.max(1),
            step: config.window_step(),
            min_chunk_len: config.min_chunk_len,
            coverage_threshold: config.structural_coverage_threshold,
        }
    }

    pub fn plan(&self, document: &str) -> ChunkPlan {
        let sections = split_by_headings(document);
        let covered: usize = sections.iter().map(|s| s.end - s.start).sum();
        let coverage = if document.is_empty() {
            0.0
        } else {
            covered as f64 / document.len() as f64
        };

        let (strategy, raw) = if !sections.is_empty() && coverage >= self.coverage_threshold {
            let mut raw = Vec::new();
            for section in &sections {
                if section.end - section.start <= self.window {
                    raw.push((section.title.clone(), section.start, section.end));
                } else {
                    for (part, (s, e)) in self
                        .windows(document, section.start, section.end)
                        .into_iter()
                        .enumerate()
                    {
                        raw.push((format!("{} (part {})", section.title, part + 1), s, e));
                    }
                }
            }
            (ChunkStrategy::Structural, raw)
        } else {
            let raw = self
                .windows(document, 0, document.len())
                .into_iter()
                .enumerate()
                .map(|(i, (s, e))| (format!("Window {}", i + 1), s, e))
                .collect();
            (ChunkStrategy::SlidingWindow, raw)
        };

        let total = raw.len();
        let chunks: Vec<ChunkTask> = raw
            .into_iter()
            .filter(|(_, s, e)| document[*s..*e].trim().len() >= self.min_chunk_len)
            .enumerate()
            .map(|(index, (title, s, e))| ChunkTask {
                index,
                title,
                content: document[s..e].to_string(),
                source_offset_hint: s,
            })
            .collect();

        tracing::debug!(
            doc_len = document.len(),
            strategy = ?strategy,
            coverage,
            chunks = chunks.len(),
            dropped = total - chunks.len(),
            "Chunk plan built"
        );

        ChunkPlan {
            chunks,
            strategy,
            structural_coverage: coverage,
        }
    }

    /// Overlapping windows over `[start, end)`; the last window is anchored
    /// to `end` so the range is covered completely.
    fn windows(&self, text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
        if end - start <= self.window {
            return vec![(start, end)];
        }

        let mut spans = Vec::new();
        let mut s = start;
        loop {
            let e = floor_char_boundary(text, s + self.window);
            if e >= end {
                break;
            }
            spans.push((s, e));
            s += self.step;
            while s < end && !text.is_char_boundary(s) {
                s += 1;
            }
        }

        let last_start = floor_char_boundary(text, end - self.window);
        if spans.last().map_or(true, |(s, _)| *s < last_start) {
            spans.push((last_start, end));
        }
        spans
    }
}

/// Sections opened by heading lines. Text before the first heading belongs
/// to no section.
fn split_by_headings(document: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current: Option<(String, usize)> = None;
    let mut pos = 0;

    for line in document.split_inclusive('\n') {
        if is_heading(line) {
            if let Some((title, start)) = current.take() {
                sections.push(Section { title, start, end: pos });
            }
            current = Some((line.trim().to_string(), pos));
        }
        pos += line.len();
    }

    if let Some((title, start)) = current {
        sections.push(Section {
            title,
            start,
            end: document.len(),
        });
    }
    sections
}
