//! Static transition table: every stage maps to exactly one executor and
//! one router.

use super::patch::StatePatch;
use super::section_loop::{execute_drafting, route_after_drafting};
use super::stages::{
    execute_architecture, execute_collect_info, execute_complete, execute_intake,
    execute_jurisdiction_analysis, execute_legal_review, execute_template_discovery,
};
use crate::engine_config::EngineConfig;
use crate::models::enums::Stage;
use crate::models::workflow::WorkflowState;
use crate::pipeline::generation::LlmClient;

/// Collaborators a stage may use. Passed in; never looked up globally.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub llm: &'a dyn LlmClient,
    pub config: &'a EngineConfig,
}

/// Next step chosen by a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Stage(Stage),
    /// Hand control back to the caller until new input arrives.
    Suspend { resume_at: Stage },
    /// The workflow is finished.
    End,
}

pub type StageExecutor = fn(&WorkflowState, &StageContext<'_>) -> StatePatch;
pub type StageRouter = fn(&WorkflowState) -> Route;

#[derive(Clone, Copy)]
pub struct StageEntry {
    pub stage: Stage,
    pub execute: StageExecutor,
    pub route: StageRouter,
}

/// Registry lookup. Total over `Stage`.
pub fn entry(stage: Stage) -> StageEntry {
    match stage {
        Stage::Intake => StageEntry {
            stage,
            execute: execute_intake,
            route: route_after_info_gate,
        },
        Stage::CollectInfo => StageEntry {
            stage,
            execute: execute_collect_info,
            route: route_after_info_gate,
        },
        Stage::JurisdictionAnalysis => StageEntry {
            stage,
            execute: execute_jurisdiction_analysis,
            route: route_to_template_discovery,
        },
        Stage::TemplateDiscovery => StageEntry {
            stage,
            execute: execute_template_discovery,
            route: route_to_architecture,
        },
        Stage::Architecture => StageEntry {
            stage,
            execute: execute_architecture,
            route: route_to_drafting,
        },
        Stage::Drafting => StageEntry {
            stage,
            execute: execute_drafting,
            route: route_after_drafting,
        },
        Stage::LegalReview => StageEntry {
            stage,
            execute: execute_legal_review,
            route: route_to_complete,
        },
        Stage::Complete => StageEntry {
            stage,
            execute: execute_complete,
            route: route_to_end,
        },
    }
}

fn route_to_template_discovery(_: &WorkflowState) -> Route {
    Route::Stage(Stage::TemplateDiscovery)
}

fn route_to_architecture(_: &WorkflowState) -> Route {
    Route::Stage(Stage::Architecture)
}

fn route_to_drafting(_: &WorkflowState) -> Route {
    Route::Stage(Stage::Drafting)
}

fn route_to_complete(_: &WorkflowState) -> Route {
    Route::Stage(Stage::Complete)
}

fn route_to_end(_: &WorkflowState) -> Route {
    Route::End
}

/// Shared router for intake and collect_info.
///
/// Proceeds once nothing required is missing (or placeholders are allowed),
/// keeps collecting while unread user input exists, otherwise suspends.
pub fn route_after_info_gate(state: &WorkflowState) -> Route {
    if state.allow_placeholders || state.missing_required_info().is_empty() {
        Route::Stage(Stage::JurisdictionAnalysis)
    } else if state.has_unprocessed_input() {
        Route::Stage(Stage::CollectInfo)
    } else {
        Route::Suspend {
            resume_at: Stage::CollectInfo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::workflow::{FieldDescriptor, Message};

    fn state_missing_party() -> WorkflowState {
        let mut state = WorkflowState::new("Draft an NDA", false);
        state.required_info = vec![FieldDescriptor {
            name: "party_b".into(),
            description: "Counterparty".into(),
            required: true,
        }];
        state.input_cursor = state.messages.len();
        state
    }

    #[test]
    fn every_stage_has_an_entry() {
        for stage in Stage::all() {
            assert_eq!(entry(*stage).stage, *stage);
        }
    }

    #[test]
    fn linear_transitions() {
        let state = WorkflowState::new("x", false);
        let next = |stage| (entry(stage).route)(&state);
        assert_eq!(next(Stage::JurisdictionAnalysis), Route::Stage(Stage::TemplateDiscovery));
        assert_eq!(next(Stage::TemplateDiscovery), Route::Stage(Stage::Architecture));
        assert_eq!(next(Stage::Architecture), Route::Stage(Stage::Drafting));
        assert_eq!(next(Stage::LegalReview), Route::Stage(Stage::Complete));
        assert_eq!(next(Stage::Complete), Route::End);
    }

    #[test]
    fn missing_info_without_input_suspends() {
        let state = state_missing_party();
        assert_eq!(
            route_after_info_gate(&state),
            Route::Suspend { resume_at: Stage::CollectInfo }
        );
    }

    #[test]
    fn missing_info_with_input_loops_collect() {
        let mut state = state_missing_party();
        state.messages.push(Message::user("The counterparty is Beta LLC"));
        assert_eq!(route_after_info_gate(&state), Route::Stage(Stage::CollectInfo));
    }

    #[test]
    fn placeholders_skip_collection() {
        let mut state = state_missing_party();
        state.allow_placeholders = true;
        assert_eq!(route_after_info_gate(&state), Route::Stage(Stage::JurisdictionAnalysis));
    }

    #[test]
    fn complete_info_proceeds() {
        let mut state = state_missing_party();
        state.collected_info.insert("party_b".into(), "Beta LLC".into());
        assert_eq!(route_after_info_gate(&state), Route::Stage(Stage::JurisdictionAnalysis));
    }
}
