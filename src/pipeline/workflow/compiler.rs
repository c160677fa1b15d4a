use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::workflow::{SectionPlan, WorkflowState};

const SIGNATURE_BLOCK: &str = "IN WITNESS WHEREOF, the parties have executed this Agreement as of the Effective Date.

[PARTY A NAME]
Signature: ______________________
Name: [PARTY A SIGNATORY]
Title: [PARTY A TITLE]
Date: [SIGNATURE DATE]

[PARTY B NAME]
Signature: ______________________
Name: [PARTY B SIGNATORY]
Title: [PARTY B TITLE]
Date: [SIGNATURE DATE]
";

/// Assemble the final document from drafted sections in declared `order`.
///
/// Planned sections without a draft are logged and skipped. Output depends
/// only on the state's plan, drafts, and contract metadata.
pub fn compile(state: &WorkflowState) -> String {
    assemble(state, None)
}

/// Like [`compile`], but for forced compilation: a notice is placed under the
/// header and every undrafted section gets an explicit placeholder.
pub fn compile_with_diagnostic(state: &WorkflowState, reason: &str) -> String {
    assemble(state, Some(reason))
}

fn assemble(state: &WorkflowState, diagnostic: Option<&str>) -> String {
    let mut out = header(state);

    if let Some(reason) = diagnostic {
        out.push_str(&format!(
            "> NOTICE: This draft is incomplete. {reason} Sections marked as not drafted must be completed manually.\n\n"
        ));
    }

    let mut ordered: Vec<&SectionPlan> = state.planned_sections.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let mut number = 0;
    for section in ordered {
        match state.drafted_sections.get(&section.name) {
            Some(drafted) => {
                number += 1;
                out.push_str(&format!(
                    "## {number}. {}\n\n{}\n\n",
                    section.name,
                    drafted.content.trim()
                ));
            }
            None if diagnostic.is_some() => {
                number += 1;
                out.push_str(&format!(
                    "## {number}. {}\n\n[Section not drafted: {} could not be generated automatically.]\n\n",
                    section.name, section.name
                ));
            }
            None => {
                tracing::warn!(
                    session_id = %state.session_id,
                    section = %section.name,
                    "Planned section has no draft, skipping"
                );
            }
        }
    }

    out.push_str(SIGNATURE_BLOCK);
    out
}

fn header(state: &WorkflowState) -> String {
    let title = match state.contract.contract_type.trim() {
        "" => "AGREEMENT".to_string(),
        t => t.to_uppercase(),
    };
    let jurisdiction = match state.contract.jurisdiction.trim() {
        "" => "[GOVERNING JURISDICTION]",
        j => j,
    };
    format!(
        "# {title}\n\nThis Agreement is made on [EFFECTIVE DATE] between [PARTY A NAME] and [PARTY B NAME] (each a \"Party\").\nGoverning jurisdiction: {jurisdiction}\n\n"
    )
}

/// Uppercase bracketed placeholders left in the artifact, first-seen order,
/// without duplicates.
pub fn collect_editable_fields(artifact: &str) -> Vec<String> {
    static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[([A-Z][A-Z0-9 _'/&\-]{1,60})\]").expect("valid regex")
    });

    let mut seen = BTreeSet::new();
    PLACEHOLDER_RE
        .captures_iter(artifact)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|f| seen.insert(f.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{SectionPriority, SectionStatus};
    use crate::models::workflow::DraftedSection;

    fn state_with(plan: &[(&str, u32)], drafted: &[&str]) -> WorkflowState {
        let mut state = WorkflowState::new("x", false);
        state.contract.contract_type = "Mutual NDA".into();
        state.contract.jurisdiction = "England and Wales".into();
        state.planned_sections = plan
            .iter()
            .map(|(name, order)| SectionPlan {
                name: (*name).into(),
                description: String::new(),
                priority: SectionPriority::Important,
                order: *order,
            })
            .collect();
        for (i, name) in drafted.iter().enumerate() {
            state.drafted_sections.insert(
                (*name).into(),
                DraftedSection {
                    content: format!("Text of {name}."),
                    status: SectionStatus::Draft,
                    sequence: i,
                },
            );
        }
        state
    }

    #[test]
    fn sections_follow_declared_order() {
        let state = state_with(&[("Term", 3), ("Definitions", 1), ("Confidentiality", 2)], &["Term", "Definitions", "Confidentiality"]);
        let doc = compile(&state);

        let d = doc.find("Text of Definitions.").unwrap();
        let c = doc.find("Text of Confidentiality.").unwrap();
        let t = doc.find("Text of Term.").unwrap();
        assert!(d < c && c < t);
        assert!(doc.starts_with("# MUTUAL NDA"));
        assert!(doc.contains("## 1. Definitions"));
        assert!(doc.contains("IN WITNESS WHEREOF"));
    }

    #[test]
    fn missing_sections_skipped() {
        let state = state_with(&[("A", 1), ("B", 2)], &["B"]);
        let doc = compile(&state);
        assert!(!doc.contains("## 1. A"));
        assert!(doc.contains("## 1. B"));
    }

    #[test]
    fn recompilation_is_idempotent() {
        let state = state_with(&[("A", 1), ("B", 2)], &["A", "B"]);
        assert_eq!(compile(&state), compile(&state));
    }

    #[test]
    fn diagnostic_marks_undrafted_sections() {
        let state = state_with(&[("A", 1), ("B", 2)], &["A"]);
        let doc = compile_with_diagnostic(&state, "Drafting stopped after repeated failures.");
        assert!(doc.contains("NOTICE: This draft is incomplete. Drafting stopped after repeated failures."));
        assert!(doc.contains("## 2. B\n\n[Section not drafted: B could not be generated automatically.]"));
    }

    #[test]
    fn editable_fields_deduplicated_in_order() {
        let state = state_with(&[("A", 1)], &["A"]);
        let fields = collect_editable_fields(&compile(&state));
        assert_eq!(fields[0], "EFFECTIVE DATE");
        assert_eq!(fields[1], "PARTY A NAME");
        assert_eq!(fields.iter().filter(|f| *f == "SIGNATURE DATE").count(), 1);
        assert!(!fields.iter().any(|f| f.starts_with("Section not drafted")));
    }

    #[test]
    fn lowercase_brackets_are_not_fields() {
        assert!(collect_editable_fields("see [note] and [a]").is_empty());
        assert_eq!(collect_editable_fields("[LANDLORD NAME]"), vec!["LANDLORD NAME"]);
    }
}
