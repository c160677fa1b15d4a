//! Stage executors other than drafting.
//!
//! Each executor is a pure function of the state plus its collaborators and
//! returns a `StatePatch`. Generator failures are handled here: the failure
//! arm of every payload match supplies a fixed, conservative default.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::compiler::{collect_editable_fields, compile};
use super::patch::StatePatch;
use super::prompt::{
    build_architecture_prompt, build_collect_prompt, build_intake_prompt,
    build_jurisdiction_prompt, build_review_prompt, build_template_prompt,
    DRAFTING_SYSTEM_PROMPT, REVIEW_SYSTEM_PROMPT,
};
use super::registry::StageContext;
use crate::models::enums::{SectionPriority, Stage, WorkflowStatus};
use crate::models::workflow::{
    ContractMetadata, FieldDescriptor, Message, SectionPlan, WorkflowState,
};
use crate::pipeline::generation::{generate_payload, parse_array_lenient, GenerationCall, Payload};

const DEFAULT_CONTRACT_TYPE: &str = "general agreement";
const DEFAULT_JURISDICTION: &str = "unspecified";
const DEFAULT_COMPLEXITY: &str = "standard";

// ═══════════════════════════════════════════════════════════════════════════
// Intake
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IntakePayload {
    contract_type: String,
    jurisdiction: String,
    complexity: String,
    required_info: Vec<FieldDescriptor>,
    extracted_info: BTreeMap<String, String>,
}

/// Fields every contract needs when the generator cannot say otherwise.
fn default_required_info() -> Vec<FieldDescriptor> {
    [
        ("party_a_name", "Legal name of the first party"),
        ("party_b_name", "Legal name of the second party"),
        ("effective_date", "Date the agreement takes effect"),
    ]
    .into_iter()
    .map(|(name, description)| FieldDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        required: true,
    })
    .collect()
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}

/// Normalize field names and drop duplicates, keeping first occurrence.
fn dedupe_fields(fields: Vec<FieldDescriptor>) -> Vec<FieldDescriptor> {
    let mut out: Vec<FieldDescriptor> = Vec::with_capacity(fields.len());
    for mut field in fields {
        field.name = field_key(&field.name);
        if field.name.is_empty() || out.iter().any(|f| f.name == field.name) {
            continue;
        }
        out.push(field);
    }
    out
}

/// `"Party A Name"` → `"party_a_name"`.
fn field_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Assistant message asking for whatever is still missing.
fn missing_info_question(missing: &[&FieldDescriptor]) -> String {
    let list = missing
        .iter()
        .map(|f| match f.description.trim() {
            "" => format!("- {}", f.name),
            d => format!("- {} ({d})", f.name),
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("To continue drafting I still need:\n{list}")
}

/// Request text from every user message not yet consumed.
fn pending_request(state: &WorkflowState) -> String {
    state
        .unprocessed_user_messages()
        .map(|(_, m)| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn execute_intake(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let request = pending_request(state);
    let call = GenerationCall::new("intake", build_intake_prompt(&request), DRAFTING_SYSTEM_PROMPT);

    let (contract, required_info, extracted) = match generate_payload::<IntakePayload>(ctx.llm, ctx.config, &call) {
        Payload::Parsed(p) => {
            let fields = dedupe_fields(p.required_info);
            let fields = if fields.is_empty() { default_required_info() } else { fields };
            let contract = ContractMetadata {
                contract_type: or_default(&p.contract_type, DEFAULT_CONTRACT_TYPE),
                jurisdiction: or_default(&p.jurisdiction, DEFAULT_JURISDICTION),
                complexity: or_default(&p.complexity, DEFAULT_COMPLEXITY),
            };
            (contract, fields, p.extracted_info)
        }
        Payload::Failure(e) => {
            tracing::warn!(session_id = %state.session_id, error = %e, "Intake degraded to defaults");
            let contract = ContractMetadata {
                contract_type: DEFAULT_CONTRACT_TYPE.to_string(),
                jurisdiction: DEFAULT_JURISDICTION.to_string(),
                complexity: DEFAULT_COMPLEXITY.to_string(),
            };
            (contract, default_required_info(), BTreeMap::new())
        }
    };

    let mut collected = state.collected_info.clone();
    for (key, value) in extracted {
        let key = field_key(&key);
        if !key.is_empty() && !value.trim().is_empty() {
            collected.insert(key, value.trim().to_string());
        }
    }

    let mut next = state.clone();
    next.required_info = required_info.clone();
    next.collected_info = collected.clone();
    let missing = next.missing_required_info();

    let reply = if missing.is_empty() {
        format!("Understood: a {} ({}). I have what I need to start.", contract.contract_type, contract.jurisdiction)
    } else if state.allow_placeholders {
        format!(
            "Understood: a {}. Missing details will be left as placeholders you can fill in later.",
            contract.contract_type
        )
    } else {
        missing_info_question(&missing)
    };

    tracing::info!(
        session_id = %state.session_id,
        required = required_info.len(),
        collected = collected.len(),
        missing = missing.len(),
        "Intake complete"
    );

    StatePatch {
        contract: Some(contract),
        required_info: Some(required_info),
        collected_info: Some(collected),
        input_cursor: Some(state.messages.len()),
        ..StatePatch::default()
    }
    .with_message(Message::assistant(Stage::Intake, reply))
}

// ═══════════════════════════════════════════════════════════════════════════
// Collect info
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CollectPayload {
    values: BTreeMap<String, String>,
}

/// `field: value` lines whose field matches a missing name.
fn parse_field_lines(reply: &str, missing: &[&FieldDescriptor]) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in reply.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = field_key(key);
        if missing.iter().any(|f| f.name == key) && !value.trim().is_empty() {
            values.insert(key, value.trim().to_string());
        }
    }
    values
}

/// Consume exactly one unread user message.
pub fn execute_collect_info(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let Some((index, message)) = state.unprocessed_user_messages().next() else {
        return StatePatch::default();
    };

    let missing = state.missing_required_info();
    let call = GenerationCall::new(
        "collect_info",
        build_collect_prompt(&missing, &message.content),
        DRAFTING_SYSTEM_PROMPT,
    );

    let values = match generate_payload::<CollectPayload>(ctx.llm, ctx.config, &call) {
        Payload::Parsed(p) => p.values,
        Payload::Failure(e) => {
            tracing::warn!(session_id = %state.session_id, error = %e, "Collect info degraded to line parsing");
            parse_field_lines(&message.content, &missing)
        }
    };

    let mut collected = state.collected_info.clone();
    let mut accepted = 0;
    for (key, value) in values {
        let key = field_key(&key);
        if state.required_info.iter().any(|f| f.name == key) && !value.trim().is_empty() {
            collected.insert(key, value.trim().to_string());
            accepted += 1;
        }
    }

    let mut next = state.clone();
    next.collected_info = collected.clone();
    let still_missing = next.missing_required_info();
    let reply = if still_missing.is_empty() {
        "Thanks, I have everything I need.".to_string()
    } else {
        missing_info_question(&still_missing)
    };

    tracing::info!(
        session_id = %state.session_id,
        accepted,
        still_missing = still_missing.len(),
        "User input collected"
    );

    StatePatch {
        collected_info: Some(collected),
        input_cursor: Some(index + 1),
        ..StatePatch::default()
    }
    .with_message(Message::assistant(Stage::CollectInfo, reply))
}

// ═══════════════════════════════════════════════════════════════════════════
// Research
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JurisdictionPayload {
    jurisdiction: String,
    governing_law: String,
    notes: Vec<String>,
}

pub fn execute_jurisdiction_analysis(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let call = GenerationCall::new(
        "jurisdiction_analysis",
        build_jurisdiction_prompt(state),
        DRAFTING_SYSTEM_PROMPT,
    );

    match generate_payload::<JurisdictionPayload>(ctx.llm, ctx.config, &call) {
        Payload::Parsed(p) => {
            let mut notes = Vec::new();
            if !p.governing_law.trim().is_empty() {
                notes.push(format!("Governing law: {}", p.governing_law.trim()));
            }
            notes.extend(p.notes.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()));

            let mut patch = StatePatch {
                jurisdiction_notes: Some(notes),
                ..StatePatch::default()
            };
            let current = state.contract.jurisdiction.trim();
            if (current.is_empty() || current == DEFAULT_JURISDICTION) && !p.jurisdiction.trim().is_empty() {
                patch.contract = Some(ContractMetadata {
                    jurisdiction: p.jurisdiction.trim().to_string(),
                    ..state.contract.clone()
                });
            }
            patch
        }
        Payload::Failure(_) => StatePatch {
            jurisdiction_notes: Some(vec![
                "Jurisdiction-specific requirements could not be researched; verify local law before signing.".into(),
            ]),
            ..StatePatch::default()
        }
        .with_message(Message::system(
            Stage::JurisdictionAnalysis,
            "Jurisdiction research unavailable; continuing with general drafting practice.",
        )),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TemplatePayload {
    reference_clauses: Vec<String>,
    notes: Vec<String>,
}

pub fn execute_template_discovery(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let call = GenerationCall::new(
        "template_discovery",
        build_template_prompt(state),
        DRAFTING_SYSTEM_PROMPT,
    );

    let notes = match generate_payload::<TemplatePayload>(ctx.llm, ctx.config, &call) {
        Payload::Parsed(p) => {
            let mut notes: Vec<String> = p
                .reference_clauses
                .into_iter()
                .map(|c| format!("Reference clause: {}", c.trim()))
                .collect();
            notes.extend(p.notes.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()));
            notes
        }
        Payload::Failure(_) => {
            vec!["No reference template found; drafting from general principles.".into()]
        }
    };

    StatePatch {
        template_notes: Some(notes),
        ..StatePatch::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Architecture
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSectionPlan {
    name: String,
    description: String,
    priority: String,
    order: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ArchitecturePayload {
    sections: Vec<serde_json::Value>,
}

pub fn execute_architecture(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let call = GenerationCall::new(
        "architecture",
        build_architecture_prompt(state),
        DRAFTING_SYSTEM_PROMPT,
    );

    let plan = match generate_payload::<ArchitecturePayload>(ctx.llm, ctx.config, &call) {
        Payload::Parsed(p) => {
            let raw: Vec<RawSectionPlan> = parse_array_lenient(Some(p.sections.as_slice()));
            let mut plan: Vec<SectionPlan> = Vec::with_capacity(raw.len());
            for (i, r) in raw.into_iter().enumerate() {
                let name = r.name.trim().to_string();
                if name.is_empty() || plan.iter().any(|s| s.name == name) {
                    continue;
                }
                plan.push(SectionPlan {
                    name,
                    description: r.description.trim().to_string(),
                    priority: SectionPriority::parse_lenient(&r.priority),
                    order: r.order.unwrap_or(i as u32 + 1),
                });
            }
            plan
        }
        // The drafting loop substitutes a generic plan for an empty one.
        Payload::Failure(_) => Vec::new(),
    };

    tracing::info!(session_id = %state.session_id, sections = plan.len(), "Section plan ready");

    StatePatch {
        planned_sections: Some(plan),
        current_section: Some(0),
        ..StatePatch::default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Review and completion
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReviewPayload {
    summary: String,
    issues: Vec<String>,
}

pub fn execute_legal_review(state: &WorkflowState, ctx: &StageContext<'_>) -> StatePatch {
    let mut patch = StatePatch::default();

    let artifact = match &state.final_artifact {
        Some(a) => a.clone(),
        None => {
            let a = compile(state);
            patch.editable_fields = Some(collect_editable_fields(&a));
            patch.final_artifact = Some(a.clone());
            a
        }
    };

    let call = GenerationCall::new(
        "legal_review",
        build_review_prompt(state, &artifact),
        REVIEW_SYSTEM_PROMPT,
    );

    let (notes, reply) = match generate_payload::<ReviewPayload>(ctx.llm, ctx.config, &call) {
        Payload::Parsed(p) => {
            let summary = or_default(&p.summary, "Review complete.");
            let mut notes = vec![summary.clone()];
            notes.extend(p.issues.into_iter().map(|i| i.trim().to_string()).filter(|i| !i.is_empty()));
            let reply = format!("Legal review: {summary} ({} issue(s) noted)", notes.len() - 1);
            (notes, reply)
        }
        Payload::Failure(_) => {
            let note = "Automated legal review unavailable; have counsel review the draft before use.".to_string();
            (vec![note.clone()], note)
        }
    };

    patch.review_notes = Some(notes);
    patch.with_message(Message::assistant(Stage::LegalReview, reply))
}

pub fn execute_complete(state: &WorkflowState, _ctx: &StageContext<'_>) -> StatePatch {
    let mut patch = StatePatch {
        workflow_status: Some(WorkflowStatus::Complete),
        ..StatePatch::default()
    };

    if state.final_artifact.is_none() {
        let artifact = compile(state);
        patch.editable_fields = Some(collect_editable_fields(&artifact));
        patch.final_artifact = Some(artifact);
    }

    let fields = patch
        .editable_fields
        .as_ref()
        .unwrap_or(&state.editable_fields)
        .len();
    tracing::info!(session_id = %state.session_id, editable_fields = fields, "Workflow complete");

    patch.with_message(Message::assistant(
        Stage::Complete,
        format!(
            "Your {} is ready. {fields} field(s) remain editable.",
            state.contract.contract_type
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_config::EngineConfig;
    use crate::pipeline::generation::{MockLlmClient, ScriptedLlmClient, ScriptedReply};

    fn run_stage(
        exec: fn(&WorkflowState, &StageContext<'_>) -> StatePatch,
        state: &mut WorkflowState,
        llm: &dyn crate::pipeline::generation::LlmClient,
    ) {
        let config = EngineConfig::default();
        let ctx = StageContext { llm, config: &config };
        exec(state, &ctx).apply(state);
    }

    const INTAKE_REPLY: &str = r#"```json
{"contract_type": "mutual NDA", "jurisdiction": "New York", "complexity": "simple",
 "required_info": [
   {"name": "Party A Name", "description": "Disclosing party"},
   {"name": "party_b_name", "description": "Receiving party"},
   {"name": "party_a_name", "description": "duplicate"}
 ],
 "extracted_info": {"party_a_name": "Acme Corp"}}
```"#;

    #[test]
    fn intake_extracts_contract_and_fields() {
        let mut state = WorkflowState::new("NDA between Acme Corp and someone", false);
        run_stage(execute_intake, &mut state, &MockLlmClient::new(INTAKE_REPLY));

        assert_eq!(state.contract.contract_type, "mutual NDA");
        assert_eq!(state.contract.jurisdiction, "New York");
        let names: Vec<&str> = state.required_info.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["party_a_name", "party_b_name"]);
        assert_eq!(state.collected_info["party_a_name"], "Acme Corp");
        assert_eq!(state.input_cursor, 1);
        assert!(state.messages.last().unwrap().content.contains("party_b_name"));
    }

    #[test]
    fn intake_failure_degrades_to_default_fields() {
        let mut state = WorkflowState::new("contract please", false);
        run_stage(execute_intake, &mut state, &ScriptedLlmClient::new(ScriptedReply::Timeout));

        assert_eq!(state.contract.contract_type, DEFAULT_CONTRACT_TYPE);
        assert_eq!(state.required_info, default_required_info());
        assert_eq!(state.input_cursor, 1);
        assert!(state.messages.last().unwrap().content.starts_with("To continue drafting"));
    }

    #[test]
    fn collect_info_consumes_one_message() {
        let mut state = WorkflowState::new("NDA", false);
        state.required_info = default_required_info();
        state.input_cursor = 1;
        state.messages.push(Message::user("Party B is Beta LLC"));
        state.messages.push(Message::user("Effective date is 1 May 2026"));

        let llm = MockLlmClient::new(r#"{"values": {"party_b_name": "Beta LLC", "unrelated": "x"}}"#);
        run_stage(execute_collect_info, &mut state, &llm);

        assert_eq!(state.input_cursor, 2);
        assert_eq!(state.collected_info.len(), 1);
        assert_eq!(state.collected_info["party_b_name"], "Beta LLC");
        assert!(state.has_unprocessed_input());
    }

    #[test]
    fn collect_info_falls_back_to_field_lines() {
        let mut state = WorkflowState::new("NDA", false);
        state.required_info = default_required_info();
        state.input_cursor = 1;
        state.messages.push(Message::user("Party A name: Acme\nEffective date: 2026-05-01\nnote: ignore"));

        run_stage(execute_collect_info, &mut state, &ScriptedLlmClient::new(ScriptedReply::Timeout));

        assert_eq!(state.collected_info["party_a_name"], "Acme");
        assert_eq!(state.collected_info["effective_date"], "2026-05-01");
        assert!(!state.collected_info.contains_key("note"));
        assert_eq!(state.missing_required_info().len(), 1);
    }

    #[test]
    fn collect_info_without_input_is_noop() {
        let mut state = WorkflowState::new("NDA", false);
        state.required_info = default_required_info();
        state.input_cursor = 1;
        let config = EngineConfig::default();
        let llm = MockLlmClient::new("{}");
        let ctx = StageContext { llm: &llm, config: &config };
        assert!(execute_collect_info(&state, &ctx).is_empty());
    }

    #[test]
    fn jurisdiction_notes_recorded() {
        let mut state = WorkflowState::new("x", true);
        state.contract.jurisdiction = DEFAULT_JURISDICTION.into();
        let llm = MockLlmClient::new(
            r#"{"jurisdiction": "Ontario", "governing_law": "Laws of Ontario", "notes": ["French version may be required"]}"#,
        );
        run_stage(execute_jurisdiction_analysis, &mut state, &llm);

        assert_eq!(state.contract.jurisdiction, "Ontario");
        assert_eq!(state.jurisdiction_notes[0], "Governing law: Laws of Ontario");
        assert_eq!(state.jurisdiction_notes.len(), 2);
    }

    #[test]
    fn research_failures_leave_notes() {
        let mut state = WorkflowState::new("x", true);
        let llm = ScriptedLlmClient::new(ScriptedReply::Timeout);
        run_stage(execute_jurisdiction_analysis, &mut state, &llm);
        run_stage(execute_template_discovery, &mut state, &llm);

        assert_eq!(state.jurisdiction_notes.len(), 1);
        assert!(state.template_notes[0].starts_with("No reference template"));
    }

    #[test]
    fn architecture_parses_and_dedupes_plan() {
        let mut state = WorkflowState::new("x", true);
        let llm = MockLlmClient::new(
            r#"{"sections": [
                {"name": "Definitions", "description": "terms", "priority": "essential", "order": 1},
                {"name": "Definitions", "description": "dup"},
                {"name": "", "description": "nameless"},
                {"name": "Term", "priority": "optional"},
                "garbage"
            ]}"#,
        );
        run_stage(execute_architecture, &mut state, &llm);

        assert_eq!(state.planned_sections.len(), 2);
        assert_eq!(state.planned_sections[0].priority, SectionPriority::Essential);
        assert_eq!(state.planned_sections[1].name, "Term");
        assert_eq!(state.planned_sections[1].order, 4);
        assert_eq!(state.planned_sections[1].priority, SectionPriority::Optional);
    }

    #[test]
    fn architecture_failure_yields_empty_plan() {
        let mut state = WorkflowState::new("x", true);
        run_stage(execute_architecture, &mut state, &ScriptedLlmClient::new(ScriptedReply::Timeout));
        assert!(state.planned_sections.is_empty());
        assert_eq!(state.current_section, 0);
    }

    #[test]
    fn architecture_leaves_drafting_retries_alone() {
        let state = WorkflowState::new("x", true);
        let config = EngineConfig::default();
        let llm = MockLlmClient::new(r#"{"sections": [{"name": "Term"}]}"#);
        let ctx = StageContext { llm: &llm, config: &config };

        let patch = execute_architecture(&state, &ctx);
        assert!(patch.drafting_retries.is_none());
        assert_eq!(patch.current_section, Some(0));
    }

    #[test]
    fn legal_review_compiles_when_missing_artifact() {
        let mut state = WorkflowState::new("x", true);
        let llm = MockLlmClient::new(r#"{"summary": "Mostly sound.", "issues": ["No cap on liability"]}"#);
        run_stage(execute_legal_review, &mut state, &llm);

        assert!(state.final_artifact.is_some());
        assert!(!state.editable_fields.is_empty());
        assert_eq!(state.review_notes, vec!["Mostly sound.".to_string(), "No cap on liability".to_string()]);
    }

    #[test]
    fn legal_review_failure_degrades() {
        let mut state = WorkflowState::new("x", true);
        state.final_artifact = Some("# AGREEMENT".into());
        run_stage(execute_legal_review, &mut state, &ScriptedLlmClient::new(ScriptedReply::Timeout));

        assert_eq!(state.final_artifact.as_deref(), Some("# AGREEMENT"));
        assert!(state.review_notes[0].starts_with("Automated legal review unavailable"));
    }

    #[test]
    fn complete_sets_terminal_status() {
        let mut state = WorkflowState::new("x", true);
        state.contract.contract_type = "lease".into();
        run_stage(execute_complete, &mut state, &MockLlmClient::new(""));

        assert_eq!(state.workflow_status, WorkflowStatus::Complete);
        assert!(state.final_artifact.is_some());
        assert!(state.messages.last().unwrap().content.starts_with("Your lease is ready."));
    }

    #[test]
    fn field_keys_are_normalized() {
        assert_eq!(field_key("  Party A Name "), "party_a_name");
        assert_eq!(field_key("effective-date"), "effective_date");
        assert_eq!(field_key("::"), "");
    }
}
