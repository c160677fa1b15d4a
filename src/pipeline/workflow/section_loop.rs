//! Drafting loop: one section per invocation, re-entered until the plan is
//! exhausted or the no-progress budget runs out.

use serde::Deserialize;

use super::compiler::{collect_editable_fields, compile, compile_with_diagnostic};
use super::patch::StatePatch;
use super::prompt::{build_section_prompt, DRAFTING_SYSTEM_PROMPT};
use super::registry::{Route, StageContext};
use crate::models::enums::{SectionPriority, SectionStatus, Stage};
use crate::models::workflow::{DraftedSection, Message, SectionPlan, WorkflowState};
use crate::pipeline::generation::{
    extract_prose_fallback, generate_payload_or_recover, GenerationCall, Payload,
};

#[derive(Debug, Deserialize)]
struct DraftPayload {
    #[serde(default)]
    content: String,
}

/// Generic plan used when architecture produced nothing.
pub fn fallback_plan() -> Vec<SectionPlan> {
    [
        ("Parties and Recitals", "Identify the parties and the purpose of the agreement.", SectionPriority::Essential),
        ("Definitions", "Defined terms used throughout the agreement.", SectionPriority::Important),
        ("Obligations", "What each party must do.", SectionPriority::Essential),
        ("Payment", "Fees, invoicing, and payment timing.", SectionPriority::Important),
        ("Term and Termination", "Duration and how the agreement ends.", SectionPriority::Essential),
        ("General Provisions", "Governing law, notices, and boilerplate.", SectionPriority::Optional),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (name, description, priority))| SectionPlan {
        name: name.to_string(),
        description: description.to_string(),
        priority,
        order: i as u32 + 1,
    })
    .collect()
}

/// Draft the section at `current_section`, or compile once the loop is done.
pub fn execute_drafting(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let mut patch = StatePatch::default();

    let plan = if state.planned_sections.is_empty() {
        tracing::warn!(session_id = %state.session_id, "Empty section plan, using fallback plan");
        let plan = fallback_plan();
        patch.planned_sections = Some(plan.clone());
        patch.current_section = Some(0);
        patch.messages.push(Message::system(
            Stage::Drafting,
            "No section plan was available; drafting from a generic outline.",
        ));
        plan
    } else {
        state.planned_sections.clone()
    };

    let cursor = if patch.planned_sections.is_some() {
        0
    } else {
        state.current_section.min(plan.len())
    };

    if cursor >= plan.len() {
        if state.final_artifact.is_none() {
            finish(state, &plan, &state.drafted_sections, &mut patch, None);
        }
        return patch;
    }

    let section = &plan[cursor];

    // Re-entry after a partially applied run: never re-draft an existing key.
    if state.drafted_sections.contains_key(&section.name) {
        tracing::debug!(
            session_id = %state.session_id,
            section = %section.name,
            "Section already drafted, advancing"
        );
        patch.current_section = Some(cursor + 1);
        if cursor + 1 >= plan.len() && state.final_artifact.is_none() {
            finish(state, &plan, &state.drafted_sections, &mut patch, None);
        }
        return patch;
    }

    let call = GenerationCall::new(
        "drafting",
        build_section_prompt(state, section),
        DRAFTING_SYSTEM_PROMPT,
    );
    let drafted = match generate_payload_or_recover(ctx.llm, ctx.config, &call, recover_prose) {
        Payload::Parsed(payload) if !payload.content.trim().is_empty() => Some(payload.content),
        Payload::Parsed(_) => None,
        Payload::Failure(e) => {
            tracing::warn!(
                session_id = %state.session_id,
                section = %section.name,
                error = %e,
                "Section drafting failed"
            );
            None
        }
    };

    match drafted {
        Some(content) => {
            let mut sections = state.drafted_sections.clone();
            let sequence = sections.len();
            sections.insert(
                section.name.clone(),
                DraftedSection {
                    content: content.trim().to_string(),
                    status: SectionStatus::Draft,
                    sequence,
                },
            );
            tracing::info!(
                session_id = %state.session_id,
                section = %section.name,
                position = cursor + 1,
                total = plan.len(),
                "Section drafted"
            );

            patch.current_section = Some(cursor + 1);
            patch.drafting_retries = Some(0);
            if cursor + 1 >= plan.len() {
                finish(state, &plan, &sections, &mut patch, None);
            }
            patch.drafted_sections = Some(sections);
        }
        None => {
            let retries = state.drafting_retries + 1;
            patch.drafting_retries = Some(retries);

            if retries > ctx.config.max_drafting_retries {
                tracing::error!(
                    session_id = %state.session_id,
                    section = %section.name,
                    retries,
                    "Drafting made no progress, forcing compilation"
                );
                let reason = format!(
                    "Drafting stopped after {retries} attempts without progress on \"{}\".",
                    section.name
                );
                patch.current_section = Some(plan.len());
                finish(state, &plan, &state.drafted_sections, &mut patch, Some(&reason));
            }
        }
    }

    patch
}

fn recover_prose(raw: &str) -> Option<DraftPayload> {
    let content = extract_prose_fallback(raw);
    (!content.trim().is_empty()).then_some(DraftPayload { content })
}

/// Compile into `patch` using the given plan and drafts.
fn finish(
    state: &WorkflowState,
    plan: &[SectionPlan],
    drafted: &std::collections::BTreeMap<String, DraftedSection>,
    patch: &mut StatePatch,
    diagnostic: Option<&str>,
) {
    let mut view = state.clone();
    view.planned_sections = plan.to_vec();
    view.drafted_sections = drafted.clone();

    let artifact = match diagnostic {
        Some(reason) => compile_with_diagnostic(&view, reason),
        None => compile(&view),
    };
    patch.editable_fields = Some(collect_editable_fields(&artifact));
    patch.messages.push(Message::assistant(
        Stage::Drafting,
        format!(
            "Drafted {} of {} sections; the full draft is ready for review.",
            drafted.len(),
            plan.len()
        ),
    ));
    patch.final_artifact = Some(artifact);
}

/// Router for the drafting stage.
pub fn route_after_drafting(state: &WorkflowState) -> Route {
    if state.section_loop_complete() {
        Route::Stage(Stage::LegalReview)
    } else {
        Route::Stage(Stage::Drafting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_config::EngineConfig;
    use crate::pipeline::generation::{MockLlmClient, ScriptedLlmClient, ScriptedReply};

    fn plan(names: &[(&str, u32)]) -> Vec<SectionPlan> {
        names
            .iter()
            .map(|(n, order)| SectionPlan {
                name: (*n).into(),
                description: format!("About {n}"),
                priority: SectionPriority::Essential,
                order: *order,
            })
            .collect()
    }

    fn drafting_state(sections: Vec<SectionPlan>) -> WorkflowState {
        let mut state = WorkflowState::new("Draft an NDA", true);
        state.current_step = Stage::Drafting;
        state.planned_sections = sections;
        state
    }

    /// One drafting invocation: execute, apply, route.
    fn step(state: &mut WorkflowState, ctx: &StageContext<'_>) -> Route {
        execute_drafting(state, ctx).apply(state);
        route_after_drafting(state)
    }

    #[test]
    fn drafts_plan_in_order_then_routes_to_review() {
        let llm = ScriptedLlmClient::new(ScriptedReply::Text("{\"content\": \"generic\"}".into()))
            .on_text("\"Alpha\"", "{\"content\": \"Alpha text.\"}")
            .on_text("\"Beta\"", "{\"content\": \"Beta text.\"}")
            .on_text("\"Gamma\"", "{\"content\": \"Gamma text.\"}");
        let config = EngineConfig::default();
        let ctx = StageContext { llm: &llm, config: &config };
        let mut state = drafting_state(plan(&[("Alpha", 1), ("Beta", 3), ("Gamma", 2)]));

        assert_eq!(step(&mut state, &ctx), Route::Stage(Stage::Drafting));
        assert_eq!(state.drafted_sections.len(), 1);
        assert_eq!(state.drafted_sections["Alpha"].content, "Alpha text.");

        assert_eq!(step(&mut state, &ctx), Route::Stage(Stage::Drafting));
        assert_eq!(state.drafted_sections["Beta"].sequence, 1);

        assert_eq!(step(&mut state, &ctx), Route::Stage(Stage::LegalReview));
        assert_eq!(state.drafted_sections["Gamma"].sequence, 2);
        assert_eq!(state.current_section, 3);

        let artifact = state.final_artifact.clone().unwrap();
        let a = artifact.find("Alpha text.").unwrap();
        let g = artifact.find("Gamma text.").unwrap();
        let b = artifact.find("Beta text.").unwrap();
        assert!(a < g && g < b);

        // A fourth invocation drafts nothing new and still routes to review.
        assert_eq!(step(&mut state, &ctx), Route::Stage(Stage::LegalReview));
        assert_eq!(state.drafted_sections.len(), 3);
        assert_eq!(state.final_artifact.as_deref(), Some(artifact.as_str()));
        assert_eq!(llm.call_count(), 3);
    }

    #[test]
    fn existing_section_is_not_redrafted() {
        let llm = MockLlmClient::new("{\"content\": \"new text\"}");
        let config = EngineConfig::default();
        let ctx = StageContext { llm: &llm, config: &config };
        let mut state = drafting_state(plan(&[("Alpha", 1), ("Beta", 2)]));
        state.drafted_sections.insert(
            "Alpha".into(),
            DraftedSection { content: "original".into(), status: SectionStatus::Draft, sequence: 0 },
        );

        step(&mut state, &ctx);
        assert_eq!(state.drafted_sections["Alpha"].content, "original");
        assert_eq!(state.current_section, 1);
        assert_eq!(state.drafting_retries, 0);
    }

    #[test]
    fn failures_count_and_success_resets() {
        let failing = ScriptedLlmClient::new(ScriptedReply::Timeout);
        let config = EngineConfig::default();
        let mut state = drafting_state(plan(&[("Alpha", 1)]));

        let ctx = StageContext { llm: &failing, config: &config };
        step(&mut state, &ctx);
        step(&mut state, &ctx);
        assert_eq!(state.drafting_retries, 2);
        assert_eq!(state.current_section, 0);

        let working = MockLlmClient::new("{\"content\": \"Alpha text.\"}");
        let ctx = StageContext { llm: &working, config: &config };
        step(&mut state, &ctx);
        assert_eq!(state.drafting_retries, 0);
        assert_eq!(state.current_section, 1);
    }

    #[test]
    fn adversarial_empty_plan_terminates_within_budget() {
        let llm = ScriptedLlmClient::new(ScriptedReply::Timeout);
        let config = EngineConfig::default();
        let ctx = StageContext { llm: &llm, config: &config };
        let mut state = drafting_state(Vec::new());

        let budget = config.max_drafting_retries + 1;
        let mut invocations = 0;
        loop {
            invocations += 1;
            if step(&mut state, &ctx) == Route::Stage(Stage::LegalReview) {
                break;
            }
            assert!(invocations <= budget, "section loop did not terminate");
        }

        assert!(invocations <= budget);
        assert_eq!(state.planned_sections, fallback_plan());
        let artifact = state.final_artifact.unwrap();
        assert!(artifact.contains("NOTICE: This draft is incomplete."));
        assert!(artifact.contains("[Section not drafted: Parties and Recitals"));
    }

    #[test]
    fn prose_response_is_recovered_as_content() {
        let llm = MockLlmClient::new("The Recipient shall hold all Confidential Information in strict confidence.");
        let config = EngineConfig::default();
        let ctx = StageContext { llm: &llm, config: &config };
        let mut state = drafting_state(plan(&[("Confidentiality", 1), ("Term", 2)]));

        step(&mut state, &ctx);
        assert!(state.drafted_sections["Confidentiality"]
            .content
            .starts_with("The Recipient shall hold"));
    }

    #[test]
    fn non_ascii_broken_reply_counts_as_no_progress() {
        let llm = MockLlmClient::new("İİİİİİİİ```json€€€€€€");
        let config = EngineConfig::default();
        let ctx = StageContext { llm: &llm, config: &config };
        let mut state = drafting_state(plan(&[("Alpha", 1)]));

        assert_eq!(step(&mut state, &ctx), Route::Stage(Stage::Drafting));
        assert!(state.drafted_sections.is_empty());
        assert_eq!(state.drafting_retries, 1);
    }

    #[test]
    fn empty_content_counts_as_no_progress() {
        let llm = MockLlmClient::new("{\"content\": \"   \"}");
        let config = EngineConfig::default();
        let ctx = StageContext { llm: &llm, config: &config };
        let mut state = drafting_state(plan(&[("Alpha", 1)]));

        step(&mut state, &ctx);
        assert!(state.drafted_sections.is_empty());
        assert_eq!(state.drafting_retries, 1);
    }

    #[test]
    fn router_checks_cursor() {
        let mut state = drafting_state(plan(&[("Alpha", 1)]));
        assert_eq!(route_after_drafting(&state), Route::Stage(Stage::Drafting));
        state.current_section = 1;
        assert_eq!(route_after_drafting(&state), Route::Stage(Stage::LegalReview));
    }
}
