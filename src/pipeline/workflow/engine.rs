use chrono::Utc;

use super::compiler::{collect_editable_fields, compile_with_diagnostic};
use super::patch::StatePatch;
use super::registry::{entry, Route, StageContext};
use crate::engine_config::EngineConfig;
use crate::models::enums::{Stage, WorkflowStatus};
use crate::models::workflow::{Message, WorkflowState};
use crate::pipeline::generation::LlmClient;

/// How a run handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Waiting for caller input; the next run starts at `resume_at`.
    Suspended { resume_at: Stage },
    Completed,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: WorkflowState,
    pub status: RunStatus,
    /// Stage executions performed during this run.
    pub executed: u32,
}

/// Drives one workflow instance through the stage registry.
pub struct WorkflowEngine<'a> {
    ctx: StageContext<'a>,
}

impl<'a> WorkflowEngine<'a> {
    pub fn new(llm: &'a dyn LlmClient, config: &'a EngineConfig) -> Self {
        Self {
            ctx: StageContext { llm, config },
        }
    }

    /// Execute `stage` against `state` and ask its router where to go next.
    ///
    /// The router sees the state with the patch already applied.
    pub fn advance(&self, state: &WorkflowState, stage: Stage) -> (StatePatch, Route) {
        let entry = entry(stage);
        let patch = (entry.execute)(state, &self.ctx);

        let mut preview = state.clone();
        patch.clone().apply(&mut preview);
        let route = (entry.route)(&preview);

        (patch, route)
    }

    /// Run from `state.current_step` until the workflow suspends or ends.
    pub fn run(&self, mut state: WorkflowState) -> RunOutcome {
        let _span = tracing::info_span!("workflow_run", session_id = %state.session_id).entered();
        let max = self.ctx.config.max_stage_executions;
        let mut executed = 0;

        loop {
            if state.stage_executions >= max {
                force_terminate(&mut state, max);
                return RunOutcome {
                    state,
                    status: RunStatus::Completed,
                    executed,
                };
            }

            let stage = state.current_step;
            let (patch, route) = self.advance(&state, stage);
            patch.apply(&mut state);
            state.stage_executions += 1;
            executed += 1;

            tracing::debug!(
                stage = %stage,
                route = ?route,
                executions = state.stage_executions,
                "Stage executed"
            );

            match route {
                Route::Stage(next) => {
                    state.current_step = next;
                    state.workflow_status = next.status();
                }
                Route::Suspend { resume_at } => {
                    state.current_step = resume_at;
                    state.workflow_status = resume_at.status();
                    tracing::info!(resume_at = %resume_at, executed, "Workflow suspended for input");
                    return RunOutcome {
                        state,
                        status: RunStatus::Suspended { resume_at },
                        executed,
                    };
                }
                Route::End => {
                    state.current_step = Stage::Complete;
                    state.workflow_status = WorkflowStatus::Complete;
                    tracing::info!(executed, total = state.stage_executions, "Workflow complete");
                    return RunOutcome {
                        state,
                        status: RunStatus::Completed,
                        executed,
                    };
                }
            }
        }
    }
}

/// Stop a workflow that hit the stage-execution ceiling and mark it complete.
///
/// An artifact that is already compiled is kept as is; otherwise whatever
/// exists is compiled with a diagnostic notice.
fn force_terminate(state: &mut WorkflowState, max: u32) {
    tracing::error!(
        stage = %state.current_step,
        max_stage_executions = max,
        has_artifact = state.final_artifact.is_some(),
        "Stage execution ceiling reached, forcing completion"
    );

    let reason = format!("The workflow stopped after reaching its limit of {max} steps.");
    if state.final_artifact.is_none() {
        let artifact = compile_with_diagnostic(state, &reason);
        state.editable_fields = collect_editable_fields(&artifact);
        state.final_artifact = Some(artifact);
    }
    state.messages.push(Message::system(state.current_step, reason));
    state.current_step = Stage::Complete;
    state.workflow_status = WorkflowStatus::Complete;
    state.updated_at = Utc::now();
}
