use std::collections::BTreeMap;

use crate::models::workflow::{FieldDescriptor, SectionPlan, WorkflowState};
use crate::pipeline::generation::sanitize_for_prompt;

pub const DRAFTING_SYSTEM_PROMPT: &str = r#"
You are a contract drafting assistant working inside a staged workflow.
Follow the requested output format exactly. When a fact is unknown, write an
uppercase bracketed placeholder such as [PARTY A NAME] instead of inventing it.
Never give advice outside the requested task.
"#;

pub const REVIEW_SYSTEM_PROMPT: &str = r#"
You are a careful legal reviewer. Identify drafting defects, ambiguous terms,
missing protections, and internal inconsistencies in the contract you are given.
Output MUST be a single JSON object in ```json``` fences.
"#;

fn render_collected(info: &BTreeMap<String, String>) -> String {
    if info.is_empty() {
        return "(none yet)".to_string();
    }
    info.iter()
        .map(|(k, v)| format!("- {k}: {}", sanitize_for_prompt(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_fields(fields: &[&FieldDescriptor]) -> String {
    fields
        .iter()
        .map(|f| format!("- {}: {}", f.name, f.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_notes(notes: &[String]) -> String {
    if notes.is_empty() {
        return "(none)".to_string();
    }
    notes.iter().map(|n| format!("- {n}")).collect::<Vec<_>>().join("\n")
}

fn contract_line(state: &WorkflowState) -> String {
    format!(
        "Contract type: {}\nJurisdiction: {}\nComplexity: {}",
        state.contract.contract_type, state.contract.jurisdiction, state.contract.complexity
    )
}

/// Intake: classify the request and list the information the contract needs.
pub fn build_intake_prompt(request: &str) -> String {
    format!(
        r#"<request>
{request}
</request>

Identify the contract the user wants and the facts needed to draft it.
Extract any of those facts the request already states.

```json
{{
  "contract_type": "e.g. mutual NDA, services agreement, residential lease",
  "jurisdiction": "governing jurisdiction or empty string",
  "complexity": "simple | standard | complex",
  "required_info": [
    {{"name": "snake_case_field", "description": "what is needed", "required": true}}
  ],
  "extracted_info": {{"snake_case_field": "value stated in the request"}}
}}
```"#,
        request = sanitize_for_prompt(request),
    )
}

/// Collect info: map one user reply onto the fields still missing.
pub fn build_collect_prompt(missing: &[&FieldDescriptor], reply: &str) -> String {
    format!(
        r#"Fields still needed:
{fields}

<reply>
{reply}
</reply>

Extract values for the fields above that the reply provides. Omit fields it
does not answer.

```json
{{"values": {{"field_name": "value"}}}}
```"#,
        fields = render_fields(missing),
        reply = sanitize_for_prompt(reply),
    )
}

pub fn build_jurisdiction_prompt(state: &WorkflowState) -> String {
    format!(
        r#"{contract}

Known facts:
{facts}

Summarize the governing law and any jurisdiction-specific requirements that
affect this contract (mandatory clauses, formalities, consumer protections).

```json
{{"jurisdiction": "resolved jurisdiction", "governing_law": "short statement", "notes": ["requirement"]}}
```"#,
        contract = contract_line(state),
        facts = render_collected(&state.collected_info),
    )
}

pub fn build_template_prompt(state: &WorkflowState) -> String {
    format!(
        r#"{contract}

Jurisdiction notes:
{notes}

List the standard clauses a well-drafted contract of this type contains and
any reference wording worth following.

```json
{{"reference_clauses": ["clause name"], "notes": ["drafting note"]}}
```"#,
        contract = contract_line(state),
        notes = render_notes(&state.jurisdiction_notes),
    )
}

pub fn build_architecture_prompt(state: &WorkflowState) -> String {
    format!(
        r#"{contract}

Known facts:
{facts}

Template notes:
{notes}

Plan the sections of the contract in the order they should appear.

```json
{{"sections": [
  {{"name": "Definitions", "description": "what it covers", "priority": "essential | important | optional", "order": 1}}
]}}
```"#,
        contract = contract_line(state),
        facts = render_collected(&state.collected_info),
        notes = render_notes(&state.template_notes),
    )
}

pub fn build_section_prompt(state: &WorkflowState, section: &SectionPlan) -> String {
    let placeholder_rule = if state.allow_placeholders {
        "Use uppercase bracketed placeholders for any fact not listed below."
    } else {
        "Use only the facts listed below."
    };

    format!(
        r#"{contract}

Known facts:
{facts}

Jurisdiction notes:
{jurisdiction}

Draft the section "{name}" ({priority}): {description}
{placeholder_rule}

```json
{{"content": "full section text"}}
```"#,
        contract = contract_line(state),
        facts = render_collected(&state.collected_info),
        jurisdiction = render_notes(&state.jurisdiction_notes),
        name = section.name,
        priority = section.priority,
        description = section.description,
    )
}

pub fn build_review_prompt(state: &WorkflowState, artifact: &str) -> String {
    format!(
        r#"{contract}

<contract>
{artifact}
</contract>

Review the contract above.

```json
{{"summary": "one paragraph", "issues": ["issue"]}}
```"#,
        contract = contract_line(state),
        artifact = sanitize_for_prompt(artifact),
    )
}
