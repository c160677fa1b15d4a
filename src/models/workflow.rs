use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{MessageRole, SectionPriority, SectionStatus, Stage, WorkflowStatus};

/// The single record threaded through every stage of one drafting workflow.
///
/// Stages never mutate it directly: they return a `StatePatch` that the
/// engine applies field-by-field (replace, not merge). The message log is the
/// only append-only field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: Uuid,
    pub messages: Vec<Message>,
    pub current_step: Stage,
    pub workflow_status: WorkflowStatus,
    pub contract: ContractMetadata,
    pub required_info: Vec<FieldDescriptor>,
    /// Field name → user-supplied value. Keys are unique.
    pub collected_info: BTreeMap<String, String>,
    /// Number of leading messages already consumed by intake/collect_info.
    pub input_cursor: usize,
    /// Draft with bracketed placeholders instead of suspending for missing info.
    pub allow_placeholders: bool,
    pub jurisdiction_notes: Vec<String>,
    pub template_notes: Vec<String>,
    pub planned_sections: Vec<SectionPlan>,
    pub drafted_sections: BTreeMap<String, DraftedSection>,
    /// Cursor into `planned_sections`; always within `0..=planned_sections.len()`.
    pub current_section: usize,
    /// Consecutive drafting invocations that added no section.
    pub drafting_retries: u32,
    /// Total stage executions so far, checked against the engine-wide ceiling.
    pub stage_executions: u32,
    pub editable_fields: Vec<String>,
    pub review_notes: Vec<String>,
    pub final_artifact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowState {
    /// Fresh state for a new session, positioned at intake.
    pub fn new(initial_message: &str, allow_placeholders: bool) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            messages: vec![Message::user(initial_message)],
            current_step: Stage::Intake,
            workflow_status: WorkflowStatus::Planning,
            contract: ContractMetadata::default(),
            required_info: Vec::new(),
            collected_info: BTreeMap::new(),
            input_cursor: 0,
            allow_placeholders,
            jurisdiction_notes: Vec::new(),
            template_notes: Vec::new(),
            planned_sections: Vec::new(),
            drafted_sections: BTreeMap::new(),
            current_section: 0,
            drafting_retries: 0,
            stage_executions: 0,
            editable_fields: Vec::new(),
            review_notes: Vec::new(),
            final_artifact: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Required fields that have no collected value yet, in declared order.
    pub fn missing_required_info(&self) -> Vec<&FieldDescriptor> {
        self.required_info
            .iter()
            .filter(|f| f.required && !self.collected_info.contains_key(&f.name))
            .collect()
    }

    /// User messages not yet consumed by intake/collect_info.
    pub fn unprocessed_user_messages(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .skip(self.input_cursor)
            .filter(|(_, m)| m.role == MessageRole::User)
    }

    pub fn has_unprocessed_input(&self) -> bool {
        self.unprocessed_user_messages().next().is_some()
    }

    /// True once every planned section has been visited by the section loop.
    pub fn section_loop_complete(&self) -> bool {
        self.current_section >= self.planned_sections.len()
    }

    pub fn is_complete(&self) -> bool {
        self.workflow_status == WorkflowStatus::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Stage that produced the message; `None` for caller input.
    pub stage: Option<Stage>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(content: &str) -> Self {
        Self {
            role: MessageRole::User,
            content: content.to_string(),
            stage: None,
            created_at: Utc::now(),
        }
    }

    pub fn assistant(stage: Stage, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            stage: Some(stage),
            created_at: Utc::now(),
        }
    }

    pub fn system(stage: Stage, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            stage: Some(stage),
            created_at: Utc::now(),
        }
    }
}

/// Free-form contract metadata derived at intake.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub contract_type: String,
    pub jurisdiction: String,
    pub complexity: String,
}

/// A piece of information the contract needs from the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// A planned contract section. Immutable once produced by the architecture stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPlan {
    pub name: String,
    pub description: String,
    pub priority: SectionPriority,
    /// Position in the compiled document; authoritative over plan order.
    pub order: u32,
}

/// A drafted section. Created once per section name and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftedSection {
    pub content: String,
    pub status: SectionStatus,
    /// Insertion sequence within the session (0 for the first drafted section).
    pub sequence: usize,
}

/// Caller-supplied input for starting or resuming a workflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub message: String,
    /// `Some` changes the placeholder mode; `None` keeps the current setting.
    #[serde(default)]
    pub allow_placeholders: Option<bool>,
}

impl WorkflowInput {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            allow_placeholders: None,
        }
    }

    pub fn with_placeholders(mut self, allow: bool) -> Self {
        self.allow_placeholders = Some(allow);
        self
    }
}
