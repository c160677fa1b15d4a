use std::collections::BTreeMap;

use chrono::Utc;

use crate::models::enums::WorkflowStatus;
use crate::models::workflow::{
    ContractMetadata, DraftedSection, FieldDescriptor, Message, SectionPlan, WorkflowState,
};

/// Partial update returned by a stage.
///
/// Every `Some` field replaces the state's value wholesale; `None` leaves it
/// alone. `messages` is the exception: its entries are appended to the log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub messages: Vec<Message>,
    pub workflow_status: Option<WorkflowStatus>,
    pub contract: Option<ContractMetadata>,
    pub required_info: Option<Vec<FieldDescriptor>>,
    pub collected_info: Option<BTreeMap<String, String>>,
    pub input_cursor: Option<usize>,
    pub jurisdiction_notes: Option<Vec<String>>,
    pub template_notes: Option<Vec<String>>,
    pub planned_sections: Option<Vec<SectionPlan>>,
    pub drafted_sections: Option<BTreeMap<String, DraftedSection>>,
    pub current_section: Option<usize>,
    pub drafting_retries: Option<u32>,
    pub editable_fields: Option<Vec<String>>,
    pub review_notes: Option<Vec<String>>,
    pub final_artifact: Option<String>,
}

impl StatePatch {
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to `state`. Keeps `current_section` within the plan.
    pub fn apply(self, state: &mut WorkflowState) {
        state.messages.extend(self.messages);

        if let Some(v) = self.workflow_status {
            state.workflow_status = v;
        }
        if let Some(v) = self.contract {
            state.contract = v;
        }
        if let Some(v) = self.required_info {
            state.required_info = v;
        }
        if let Some(v) = self.collected_info {
            state.collected_info = v;
        }
        if let Some(v) = self.input_cursor {
            state.input_cursor = v;
        }
        if let Some(v) = self.jurisdiction_notes {
            state.jurisdiction_notes = v;
        }
        if let Some(v) = self.template_notes {
            state.template_notes = v;
        }
        if let Some(v) = self.planned_sections {
            state.planned_sections = v;
        }
        if let Some(v) = self.drafted_sections {
            state.drafted_sections = v;
        }
        if let Some(v) = self.current_section {
            state.current_section = v;
        }
        if let Some(v) = self.drafting_retries {
            state.drafting_retries = v;
        }
        if let Some(v) = self.editable_fields {
            state.editable_fields = v;
        }
        if let Some(v) = self.review_notes {
            state.review_notes = v;
        }
        if let Some(v) = self.final_artifact {
            state.final_artifact = Some(v);
        }

        state.current_section = state.current_section.min(state.planned_sections.len());
        state.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{SectionPriority, Stage};

    fn plan(names: &[&str]) -> Vec<SectionPlan> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| SectionPlan {
                name: (*n).into(),
                description: String::new(),
                priority: SectionPriority::Essential,
                order: i as u32 + 1,
            })
            .collect()
    }

    #[test]
    fn messages_append_other_fields_replace() {
        let mut state = WorkflowState::new("hello", false);
        state.jurisdiction_notes = vec!["old".into()];

        StatePatch {
            jurisdiction_notes: Some(vec!["new".into()]),
            ..StatePatch::default()
        }
        .with_message(Message::assistant(Stage::JurisdictionAnalysis, "noted"))
        .apply(&mut state);

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.jurisdiction_notes, vec!["new".to_string()]);
    }

    #[test]
    fn none_fields_leave_state_untouched() {
        let mut state = WorkflowState::new("hello", true);
        state.collected_info.insert("party_a".into(), "Acme".into());
        let before = state.clone();

        StatePatch::default().apply(&mut state);

        assert_eq!(state.collected_info, before.collected_info);
        assert_eq!(state.messages, before.messages);
        assert!(state.allow_placeholders);
    }

    #[test]
    fn cursor_clamped_to_plan_length() {
        let mut state = WorkflowState::new("x", false);
        StatePatch {
            planned_sections: Some(plan(&["A", "B"])),
            current_section: Some(7),
            ..StatePatch::default()
        }
        .apply(&mut state);
        assert_eq!(state.current_section, 2);
    }

    #[test]
    fn default_patch_is_empty() {
        assert!(StatePatch::default().is_empty());
        assert!(!StatePatch::default()
            .with_message(Message::user("x"))
            .is_empty());
    }
}
