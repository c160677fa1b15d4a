//! Parallel document risk analysis: chunk planning, concurrent fan-out to
//! the generator, and order-independent aggregation of findings.

pub mod types;
pub mod planner;
pub mod prompt;
pub mod parser;
pub mod aggregate;
pub mod orchestrator;

pub use types::*;
pub use planner::ChunkPlanner;
pub use aggregate::{aggregate, mean_score};
pub use orchestrator::{analyze_chunk, ParallelAnalyzer};
