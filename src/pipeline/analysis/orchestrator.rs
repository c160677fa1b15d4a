use std::sync::Arc;

use futures_util::future::join_all;
use tracing::Instrument;

use super::aggregate::aggregate;
use super::parser::findings_from_payload;
use super::planner::ChunkPlanner;
use super::prompt::{build_chunk_prompt, ANALYSIS_SYSTEM_PROMPT};
use super::types::{AggregatedFindings, ChunkOutcome, ChunkStrategy, ChunkTask};
use crate::engine_config::EngineConfig;
use crate::pipeline::generation::{
    generate_payload, GenerationCall, GenerationOptions, LlmClient, Payload,
};

/// Fans a document out to the generator chunk by chunk and merges the
/// findings.
pub struct ParallelAnalyzer {
    llm: Arc<dyn LlmClient>,
    config: Arc<EngineConfig>,
}

impl ParallelAnalyzer {
    pub fn new(llm: Arc<dyn LlmClient>, config: Arc<EngineConfig>) -> Self {
        Self { llm, config }
    }

    /// Analyze `document`. Never fails: chunk failures surface as empty
    /// finding lists and are counted in `chunks_failed`.
    pub async fn analyze_document(&self, document: &str) -> AggregatedFindings {
        let span = tracing::info_span!("analyze_document", doc_len = document.len());
        self.analyze_inner(document).instrument(span).await
    }

    async fn analyze_inner(&self, document: &str) -> AggregatedFindings {
        let plan = ChunkPlanner::new(&self.config).plan(document);

        if plan.chunks.is_empty() {
            tracing::info!("No usable chunks, analyzing full document");
            return self.analyze_full_document(document).await;
        }

        let strategy = plan.strategy;
        let chunk_count = plan.chunks.len();

        let handles: Vec<_> = plan
            .chunks
            .into_iter()
            .map(|chunk| {
                let llm = Arc::clone(&self.llm);
                let config = Arc::clone(&self.config);
                let chunk_index = chunk.index;
                let handle = tokio::task::spawn_blocking(move || {
                    analyze_chunk(llm.as_ref(), &config, &chunk)
                });
                (chunk_index, handle)
            })
            .collect();

        let indices: Vec<usize> = handles.iter().map(|(i, _)| *i).collect();
        let settled = join_all(handles.into_iter().map(|(_, h)| h)).await;

        let mut outcomes = Vec::with_capacity(chunk_count);
        let mut join_failures = 0;
        for (chunk_index, result) in indices.into_iter().zip(settled) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(chunk_index, error = %e, "Chunk task did not settle");
                    join_failures += 1;
                    outcomes.push(ChunkOutcome::failed(chunk_index));
                }
            }
        }

        if join_failures == chunk_count {
            tracing::warn!(chunk_count, "Fan-out failed entirely, analyzing full document");
            return self.analyze_full_document(document).await;
        }

        let result = aggregate(document, outcomes, strategy, self.config.top_recommendations);
        tracing::info!(
            chunks = result.chunks_analyzed,
            failed = result.chunks_failed,
            findings = result.findings.len(),
            overall_severity = result.overall_severity,
            "Document analysis complete"
        );
        result
    }

    /// Single non-chunked call over the whole document.
    async fn analyze_full_document(&self, document: &str) -> AggregatedFindings {
        let chunk = ChunkTask {
            index: 0,
            title: "Full document".into(),
            content: document.to_string(),
            source_offset_hint: 0,
        };
        let llm = Arc::clone(&self.llm);
        let config = Arc::clone(&self.config);

        let outcome = tokio::task::spawn_blocking(move || analyze_chunk(llm.as_ref(), &config, &chunk))
            .await
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Full-document task did not settle");
                ChunkOutcome::failed(0)
            });

        aggregate(
            document,
            vec![outcome],
            ChunkStrategy::FullDocument,
            self.config.top_recommendations,
        )
    }
}

/// Run one chunk through the generator. Failures become an empty, failed
/// outcome; nothing propagates.
pub fn analyze_chunk(llm: &dyn LlmClient, config: &EngineConfig, chunk: &ChunkTask) -> ChunkOutcome {
    let options = GenerationOptions::default()
        .with_token_budget(config.chunk_token_budget(chunk.content.len()));
    let call = GenerationCall::new("chunk", build_chunk_prompt(chunk), ANALYSIS_SYSTEM_PROMPT)
        .with_options(options);

    match generate_payload::<serde_json::Value>(llm, config, &call) {
        Payload::Parsed(value) => {
            let findings = findings_from_payload(&value, chunk);
            tracing::debug!(
                chunk_index = chunk.index,
                findings = findings.len(),
                "Chunk analyzed"
            );
            ChunkOutcome {
                chunk_index: chunk.index,
                findings,
                failed: false,
                source: Some(chunk.source_offset_hint..chunk.source_offset_hint + chunk.content.len()),
            }
        }
        Payload::Failure(e) => {
            tracing::warn!(chunk_index = chunk.index, error = %e, "Chunk analysis failed");
            ChunkOutcome::failed(chunk.index)
        }
    }
}
