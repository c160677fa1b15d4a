//! Transport-agnostic caller surface over the orchestration core.
//!
//! `OrchestrationService` owns the generator client, the engine config, and
//! the session store. Workflow calls are blocking (the generator client is);
//! call them from a plain thread or `spawn_blocking`. Document analysis is
//! async and fans out onto the blocking pool itself.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::db::{self, DatabaseError};
use crate::engine_config::EngineConfig;
use crate::models::enums::{Stage, WorkflowStatus};
use crate::models::workflow::{Message, WorkflowInput, WorkflowState};
use crate::pipeline::analysis::{AggregatedFindings, ParallelAnalyzer};
use crate::pipeline::generation::{GenerationError, LlmClient, OllamaClient};
use crate::pipeline::reconcile::{locate, ReconciliationResult};
use crate::pipeline::workflow::{RunStatus, WorkflowEngine};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Generator error: {0}")]
    Generator(#[from] GenerationError),
}

/// What the caller keeps to address a workflow session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub status: WorkflowStatus,
    pub current_step: Stage,
    /// The workflow is suspended until `resume_workflow` supplies input.
    pub awaiting_input: bool,
}

impl SessionHandle {
    fn from_state(state: &WorkflowState, awaiting_input: bool) -> Self {
        Self {
            session_id: state.session_id,
            status: state.workflow_status,
            current_step: state.current_step,
            awaiting_input,
        }
    }
}

/// Generator reachability as seen by `check_generator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorStatus {
    pub model: String,
    pub model_available: bool,
    pub installed_models: Vec<String>,
}

pub struct OrchestrationService {
    llm: Arc<dyn LlmClient>,
    config: Arc<EngineConfig>,
    store: Mutex<Connection>,
}

impl OrchestrationService {
    pub fn new(llm: Arc<dyn LlmClient>, config: EngineConfig, conn: Connection) -> Self {
        Self {
            llm,
            config: Arc::new(config),
            store: Mutex::new(conn),
        }
    }

    /// Open (or create) the session store at `db_path`.
    pub fn open(
        llm: Arc<dyn LlmClient>,
        config: EngineConfig,
        db_path: &Path,
    ) -> Result<Self, ServiceError> {
        let conn = db::open_database(db_path)?;
        Ok(Self::new(llm, config, conn))
    }

    /// In-memory session store; nothing survives the process.
    pub fn in_memory(llm: Arc<dyn LlmClient>, config: EngineConfig) -> Result<Self, ServiceError> {
        let conn = db::open_memory_database()?;
        Ok(Self::new(llm, config, conn))
    }

    /// Production wiring: environment-derived config, local Ollama, and the
    /// session store under the app data directory.
    pub fn from_env() -> Result<Self, ServiceError> {
        let engine_config = EngineConfig::from_env();
        let llm = OllamaClient::new(
            &engine_config.generator_base_url,
            engine_config.request_timeout_secs,
        )?;
        tracing::info!(
            version = config::APP_VERSION,
            model = %engine_config.model_name,
            "Starting {}",
            config::APP_NAME
        );
        Self::open(Arc::new(llm), engine_config, &config::sessions_db_path())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.store.lock().map_err(|_| ServiceError::LockPoisoned)
    }

    // ── Workflow ────────────────────────────────────────────

    /// Create a session from the caller's first message and run it until it
    /// suspends for input or completes.
    pub fn start_workflow(&self, input: WorkflowInput) -> Result<SessionHandle, ServiceError> {
        let state = WorkflowState::new(&input.message, input.allow_placeholders.unwrap_or(false));
        tracing::info!(
            session_id = %state.session_id,
            allow_placeholders = state.allow_placeholders,
            "Starting workflow"
        );

        let (state, awaiting_input) = self.run_and_persist(state)?;
        Ok(SessionHandle::from_state(&state, awaiting_input))
    }

    /// Append new input and continue from the suspended stage. A completed
    /// session is returned unchanged.
    pub fn resume_workflow(
        &self,
        handle: &SessionHandle,
        input: WorkflowInput,
    ) -> Result<WorkflowState, ServiceError> {
        let mut state = self.load(&handle.session_id)?;

        if state.is_complete() {
            tracing::debug!(session_id = %state.session_id, "Resume on completed session, returning snapshot");
            return Ok(state);
        }

        if let Some(allow) = input.allow_placeholders {
            state.allow_placeholders = allow;
        }
        if !input.message.trim().is_empty() {
            state.messages.push(Message::user(&input.message));
        }

        let (state, _) = self.run_and_persist(state)?;
        Ok(state)
    }

    /// Current persisted state of a session.
    pub fn snapshot(&self, session_id: &Uuid) -> Result<WorkflowState, ServiceError> {
        self.load(session_id)
    }

    pub fn open_sessions(&self) -> Result<Vec<Uuid>, ServiceError> {
        Ok(db::list_open_sessions(&*self.conn()?)?)
    }

    /// Drop a session and everything stored with it.
    pub fn abandon_workflow(&self, session_id: &Uuid) -> Result<(), ServiceError> {
        match db::delete_session(&*self.conn()?, session_id) {
            Ok(()) => {
                tracing::info!(session_id = %session_id, "Workflow abandoned");
                Ok(())
            }
            Err(DatabaseError::NotFound { .. }) => Err(ServiceError::SessionNotFound(*session_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Load a session; drafted sections found only in the cache are restored
    /// so they are never drafted twice.
    fn load(&self, session_id: &Uuid) -> Result<WorkflowState, ServiceError> {
        let conn = self.conn()?;
        let mut state = db::load_workflow_state(&conn, session_id)?
            .ok_or(ServiceError::SessionNotFound(*session_id))?;

        for (name, section) in db::load_drafted_sections(&conn, session_id)? {
            state.drafted_sections.entry(name).or_insert(section);
        }
        Ok(state)
    }

    fn run_and_persist(&self, state: WorkflowState) -> Result<(WorkflowState, bool), ServiceError> {
        let engine = WorkflowEngine::new(self.llm.as_ref(), &self.config);
        let outcome = engine.run(state);
        let awaiting_input = matches!(outcome.status, RunStatus::Suspended { .. });
        self.persist(&outcome.state)?;
        Ok((outcome.state, awaiting_input))
    }

    fn persist(&self, state: &WorkflowState) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        db::save_workflow_state(&conn, state)?;

        let mut cached = 0;
        for (name, section) in &state.drafted_sections {
            if db::insert_drafted_section(&conn, &state.session_id, name, section)? {
                cached += 1;
            }
        }

        let artifact_written = match &state.final_artifact {
            Some(artifact) => db::store_artifact(&conn, &state.session_id, artifact)?,
            None => false,
        };

        tracing::debug!(
            session_id = %state.session_id,
            step = %state.current_step,
            cached_sections = cached,
            artifact_written,
            "Workflow state persisted"
        );
        Ok(())
    }

    // ── Analysis and reconciliation ─────────────────────────

    pub async fn analyze_document(&self, text: &str) -> AggregatedFindings {
        ParallelAnalyzer::new(Arc::clone(&self.llm), Arc::clone(&self.config))
            .analyze_document(text)
            .await
    }

    pub fn reconcile(&self, text: &str, quote: &str) -> ReconciliationResult {
        locate(text, quote)
    }

    /// Ask the generator which models it has and whether ours is one.
    pub fn check_generator(&self) -> Result<GeneratorStatus, ServiceError> {
        let installed_models = self.llm.list_models()?;
        let model_available = self.llm.is_model_available(&self.config.model_name)?;
        Ok(GeneratorStatus {
            model: self.config.model_name.clone(),
            model_available,
            installed_models,
        })
    }
}
