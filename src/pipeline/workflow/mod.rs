//! Staged contract-drafting workflow: an explicit state machine over
//! `Stage`, a static registry of executors and routers, the section-drafting
//! loop, and the compiler that assembles the final artifact.

pub mod patch;
pub mod registry;
pub mod prompt;
pub mod stages;
pub mod section_loop;
pub mod compiler;
pub mod engine;

pub use patch::StatePatch;
pub use registry::{entry, Route, StageContext, StageEntry};
pub use section_loop::{fallback_plan, route_after_drafting};
pub use compiler::{collect_editable_fields, compile, compile_with_diagnostic};
pub use engine::{RunOutcome, RunStatus, WorkflowEngine};
