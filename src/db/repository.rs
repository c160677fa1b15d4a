//! Key-value persistence for workflow sessions.
//!
//! The whole `WorkflowState` is stored as JSON keyed by session id, next to
//! two side tables: an insert-once cache of drafted sections and the compiled
//! artifact with its content hash.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::DatabaseError;
use crate::models::{DraftedSection, SectionStatus, WorkflowState};

// ── Sessions ────────────────────────────────────────────────

/// Insert or replace the persisted state of a session.
pub fn save_workflow_state(conn: &Connection, state: &WorkflowState) -> Result<(), DatabaseError> {
    let state_json = serde_json::to_string(state)?;
    conn.execute(
        "INSERT INTO workflow_sessions
         (session_id, current_step, workflow_status, state_json, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(session_id) DO UPDATE SET
            current_step = excluded.current_step,
            workflow_status = excluded.workflow_status,
            state_json = excluded.state_json,
            updated_at = excluded.updated_at",
        params![
            state.session_id.to_string(),
            state.current_step.as_str(),
            state.workflow_status.as_str(),
            state_json,
            state.created_at.to_rfc3339(),
            state.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn load_workflow_state(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<Option<WorkflowState>, DatabaseError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT state_json FROM workflow_sessions WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Session ids that are not yet complete, oldest first.
pub fn list_open_sessions(conn: &Connection) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT session_id FROM workflow_sessions
         WHERE workflow_status != 'complete'
         ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        let raw = row?;
        match Uuid::parse_str(&raw) {
            Ok(id) => ids.push(id),
            Err(_) => tracing::warn!(session_id = %raw, "Skipping session with malformed id"),
        }
    }
    Ok(ids)
}

/// Remove a session and, through cascading keys, its cache and artifact.
pub fn delete_session(conn: &Connection, session_id: &Uuid) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM workflow_sessions WHERE session_id = ?1",
        params![session_id.to_string()],
    )?;
    if affected == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "workflow_session".into(),
            id: session_id.to_string(),
        });
    }
    Ok(())
}

// ── Drafted-section cache ───────────────────────────────────

/// Cache a drafted section. Existing rows are left untouched: a section is
/// written exactly once per session.
pub fn insert_drafted_section(
    conn: &Connection,
    session_id: &Uuid,
    name: &str,
    section: &DraftedSection,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO drafted_sections
         (session_id, section_name, content, status, sequence, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session_id.to_string(),
            name,
            section.content,
            section.status.as_str(),
            section.sequence as i64,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(inserted > 0)
}

pub fn load_drafted_sections(
    conn: &Connection,
    session_id: &Uuid,
) -> Result<BTreeMap<String, DraftedSection>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT section_name, content, status, sequence
         FROM drafted_sections WHERE session_id = ?1
         ORDER BY sequence ASC",
    )?;

    let rows = stmt.query_map(params![session_id.to_string()], |row| {
        Ok(SectionRow {
            name: row.get(0)?,
            content: row.get(1)?,
            status: row.get(2)?,
            sequence: row.get(3)?,
        })
    })?;

    let mut sections = BTreeMap::new();
    for row in rows {
        let row = row?;
        sections.insert(
            row.name,
            DraftedSection {
                content: row.content,
                status: SectionStatus::from_str(&row.status)?,
                sequence: usize::try_from(row.sequence).unwrap_or_default(),
            },
        );
    }
    Ok(sections)
}

struct SectionRow {
    name: String,
    content: String,
    status: String,
    sequence: i64,
}

// ── Artifacts ───────────────────────────────────────────────

/// SHA-256 of an artifact, lowercase hex.
pub fn artifact_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Store the compiled artifact. Returns `false` when identical content is
/// already stored (no write happens).
pub fn store_artifact(
    conn: &Connection,
    session_id: &Uuid,
    content: &str,
) -> Result<bool, DatabaseError> {
    let hash = artifact_hash(content);
    let existing: Option<String> = conn
        .query_row(
            "SELECT content_hash FROM artifacts WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    if existing.as_deref() == Some(hash.as_str()) {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO artifacts (session_id, content, content_hash, written_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(session_id) DO UPDATE SET
            content = excluded.content,
            content_hash = excluded.content_hash,
            written_at = excluded.written_at",
        params![session_id.to_string(), content, hash, Utc::now().to_rfc3339()],
    )?;
    Ok(true)
}

pub fn get_artifact(conn: &Connection, session_id: &Uuid) -> Result<Option<String>, DatabaseError> {
    let content = conn
        .query_row(
            "SELECT content FROM artifacts WHERE session_id = ?1",
            params![session_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(content)
}
