use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::models::enums::SeverityTier;
use crate::pipeline::reconcile::ReconciliationResult;

/// One independently analyzable slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTask {
    /// Position in the plan; aggregation order follows this, never arrival.
    pub index: usize,
    pub title: String,
    pub content: String,
    /// Byte offset of `content` in the source document.
    pub source_offset_hint: usize,
}

/// How a document was split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    Structural,
    SlidingWindow,
    /// No usable chunks; the whole document went out in one call.
    FullDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<ChunkTask>,
    pub strategy: ChunkStrategy,
    /// Share of the source covered by recognized sections (0.0-1.0).
    pub structural_coverage: f64,
}

/// A single risk finding, namespaced by the chunk that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// `c{chunk_index}-f{local_index}`
    pub id: String,
    pub chunk_index: usize,
    pub local_index: usize,
    pub quoted_span: String,
    pub severity: SeverityTier,
    /// Risk score, 1-10.
    pub score: u8,
    pub category: String,
    pub explanation: String,
    pub suggestion: String,
    pub location_label: String,
    /// Where `quoted_span` sits in the analyzed document.
    pub span: Option<ReconciliationResult>,
}

/// Settled result of one chunk task.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkOutcome {
    pub chunk_index: usize,
    pub findings: Vec<Finding>,
    pub failed: bool,
    /// Byte range of the chunk in the source document.
    pub source: Option<Range<usize>>,
}

impl ChunkOutcome {
    pub fn failed(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            findings: Vec::new(),
            failed: true,
            source: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl TierCounts {
    pub fn add(&mut self, tier: SeverityTier) {
        match tier {
            SeverityTier::Critical => self.critical += 1,
            SeverityTier::High => self.high += 1,
            SeverityTier::Medium => self.medium += 1,
            SeverityTier::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Merged output of a document analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFindings {
    /// Ordered by chunk index, then chunk-local index.
    pub findings: Vec<Finding>,
    /// Mean finding score; 0.0 when there are no findings.
    pub overall_severity: f64,
    pub tier_counts: TierCounts,
    pub executive_summary: String,
    /// Always exactly `EngineConfig::top_recommendations` entries.
    pub top_recommendations: Vec<String>,
    pub strategy: ChunkStrategy,
    pub chunks_analyzed: usize,
    pub chunks_failed: usize,
}

impl AggregatedFindings {
    pub fn used_fallback(&self) -> bool {
        self.strategy == ChunkStrategy::FullDocument
    }
}
