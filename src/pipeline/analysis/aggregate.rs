use std::collections::BTreeSet;
use std::ops::Range;

use super::types::{AggregatedFindings, ChunkOutcome, ChunkStrategy, Finding, TierCounts};
use crate::models::enums::SeverityTier;
use crate::pipeline::reconcile::{locate, MatchTier, ReconciliationResult};

/// Padding for the recommendation list when findings do not supply enough.
const GENERIC_RECOMMENDATIONS: &[&str] = &[
    "Have qualified counsel review the full agreement before signing.",
    "Confirm that liability caps and indemnities are mutual and proportionate.",
    "Check that termination rights and notice periods are clearly defined.",
    "Verify that payment terms, late fees, and currency are stated explicitly.",
    "Ensure governing law and dispute resolution clauses match your jurisdiction.",
    "Confirm confidentiality and data-protection obligations survive termination.",
    "Review intellectual property ownership and licence grants for each deliverable.",
];

/// Merge settled chunk outcomes into one report.
///
/// Outcomes are ordered by chunk index first, so the result does not depend
/// on the order in which tasks finished.
pub fn aggregate(
    document: &str,
    mut outcomes: Vec<ChunkOutcome>,
    strategy: ChunkStrategy,
    top_n: usize,
) -> AggregatedFindings {
    outcomes.sort_by_key(|o| o.chunk_index);

    let chunks_analyzed = outcomes.len();
    let chunks_failed = outcomes.iter().filter(|o| o.failed).count();

    let mut findings: Vec<Finding> = Vec::new();
    for outcome in outcomes {
        let mut chunk_findings = outcome.findings;
        chunk_findings.sort_by_key(|x| x.local_index);
        for mut finding in chunk_findings {
            if !finding.quoted_span.is_empty() {
                finding.span = Some(locate_finding(
                    document,
                    outcome.source.clone(),
                    &finding.quoted_span,
                ));
            }
            findings.push(finding);
        }
    }

    let mut tier_counts = TierCounts::default();
    for finding in &findings {
        tier_counts.add(finding.severity);
    }

    let overall_severity = mean_score(&findings);
    let executive_summary = summarize(
        &findings,
        &tier_counts,
        overall_severity,
        chunks_analyzed,
        chunks_failed,
    );
    let top_recommendations = top_recommendations(&findings, top_n);

    AggregatedFindings {
        findings,
        overall_severity,
        tier_counts,
        executive_summary,
        top_recommendations,
        strategy,
        chunks_analyzed,
        chunks_failed,
    }
}

/// Locate a quote inside the chunk that produced it, so a clause repeated
/// elsewhere resolves to this chunk's occurrence. Only literal tiers are
/// trusted locally; anything weaker is retried against the whole document.
fn locate_finding(document: &str, source: Option<Range<usize>>, quote: &str) -> ReconciliationResult {
    if let Some(range) = source {
        if let Some(chunk) = document.get(range.clone()) {
            let local = locate(chunk, quote);
            if matches!(
                local.tier,
                MatchTier::Exact | MatchTier::CaseInsensitive | MatchTier::WhitespaceNormalized
            ) {
                return ReconciliationResult {
                    start: range.start + local.start,
                    end: range.start + local.end,
                    tier: local.tier,
                };
            }
        }
    }
    locate(document, quote)
}

/// Arithmetic mean of finding scores; 0.0 for no findings.
pub fn mean_score(findings: &[Finding]) -> f64 {
    if findings.is_empty() {
        return 0.0;
    }
    let total: u64 = findings.iter().map(|f| u64::from(f.score)).sum();
    total as f64 / findings.len() as f64
}

fn summarize(
    findings: &[Finding],
    counts: &TierCounts,
    mean: f64,
    chunks_analyzed: usize,
    chunks_failed: usize,
) -> String {
    let mut summary = if findings.is_empty() {
        format!("Reviewed {chunks_analyzed} section(s); no notable risks were identified.")
    } else {
        let overall = SeverityTier::from_score(mean.round() as u8);
        format!(
            "Reviewed {chunks_analyzed} section(s) and found {} risk(s): {} critical, {} high, {} medium, {} low. Overall risk is {} ({:.1}/10).",
            findings.len(),
            counts.critical,
            counts.high,
            counts.medium,
            counts.low,
            overall,
            mean
        )
    };

    if chunks_failed > 0 {
        summary.push_str(&format!(
            " {chunks_failed} section(s) could not be analyzed and should be reviewed manually."
        ));
    }
    summary
}

/// Exactly `n` recommendations: suggestions from the highest-scoring findings
/// first, then generic advice.
fn top_recommendations(findings: &[Finding], n: usize) -> Vec<String> {
    let mut ranked: Vec<&Finding> = findings.iter().collect();
    ranked.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.chunk_index.cmp(&b.chunk_index))
            .then(a.local_index.cmp(&b.local_index))
    });

    let mut seen = BTreeSet::new();
    let mut recommendations: Vec<String> = ranked
        .into_iter()
        .map(|f| f.suggestion.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_lowercase()))
        .take(n)
        .map(str::to_string)
        .collect();

    let mut generic = GENERIC_RECOMMENDATIONS.iter().cycle();
    while recommendations.len() < n {
        match generic.next() {
            Some(g) => recommendations.push((*g).to_string()),
            None => break,
        }
    }
    recommendations
}
