//! Engine configuration: generator endpoint, retry budgets, and chunking constants.
//!
//! One `EngineConfig` is handed to the workflow engine, the section-loop
//! controller and the analysis pipeline at construction. Nothing in the
//! orchestration core reads configuration from global state.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the local Ollama instance.
    pub generator_base_url: String,
    /// Model used for every stage and chunk call.
    pub model_name: String,
    /// Per-request timeout for the generator, in seconds.
    pub request_timeout_secs: u64,
    /// Extra attempts after a failed or unparseable generator call.
    pub max_generator_retries: usize,
    /// Consecutive no-progress drafting invocations tolerated before forced compilation.
    pub max_drafting_retries: u32,
    /// Hard ceiling on stage executions across one workflow.
    pub max_stage_executions: u32,
    /// Sliding-window chunk size in bytes.
    pub chunk_window: usize,
    /// Overlap between consecutive sliding-window chunks in bytes.
    pub chunk_overlap: usize,
    /// Chunks shorter than this are dropped.
    pub min_chunk_len: usize,
    /// Minimum share of the source that structural chunks must cover (0.0-1.0).
    pub structural_coverage_threshold: f64,
    /// Smallest `num_predict` budget granted to a chunk call.
    pub chunk_token_floor: i32,
    /// Largest `num_predict` budget granted to a chunk call.
    pub chunk_token_ceiling: i32,
    /// Size of the top-recommendations list in aggregated findings.
    pub top_recommendations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generator_base_url: "http://localhost:11434".into(),
            model_name: "llama3.1:8b".into(),
            request_timeout_secs: 30,
            max_generator_retries: 1,
            max_drafting_retries: 10,
            max_stage_executions: 100,
            chunk_window: 4000,
            chunk_overlap: 400,
            min_chunk_len: 120,
            structural_coverage_threshold: 0.70,
            chunk_token_floor: 512,
            chunk_token_ceiling: 4096,
            top_recommendations: 5,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Derivation
// ═══════════════════════════════════════════════════════════

impl EngineConfig {
    /// Defaults overridden by `CLAUSEWRIGHT_*` environment variables.
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("CLAUSEWRIGHT_GENERATOR_URL") {
            config.generator_base_url = url;
        }
        if let Ok(model) = std::env::var("CLAUSEWRIGHT_MODEL") {
            config.model_name = model;
        }
        override_parsed("CLAUSEWRIGHT_TIMEOUT_SECS", &mut config.request_timeout_secs);
        override_parsed("CLAUSEWRIGHT_CHUNK_WINDOW", &mut config.chunk_window);
        override_parsed("CLAUSEWRIGHT_CHUNK_OVERLAP", &mut config.chunk_overlap);
        override_parsed("CLAUSEWRIGHT_MAX_STAGE_EXECUTIONS", &mut config.max_stage_executions);
        config
    }

    /// Token budget for a chunk of `chunk_len` bytes: roughly one output token
    /// per four input bytes on top of the floor, capped at the ceiling.
    pub fn chunk_token_budget(&self, chunk_len: usize) -> i32 {
        let scaled = i32::try_from(chunk_len / 4).unwrap_or(i32::MAX);
        self.chunk_token_floor
            .saturating_add(scaled)
            .min(self.chunk_token_ceiling)
    }

    /// Distance between the starts of consecutive sliding windows.
    pub fn window_step(&self) -> usize {
        self.chunk_window.saturating_sub(self.chunk_overlap).max(1)
    }
}

fn override_parsed<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(var, value = %raw, "Ignoring unparseable config override"),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
