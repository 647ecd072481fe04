//! Run data access object

use super::database::{Database, DatabaseError};
use super::models::{format_timestamp, Run, RunOrigin};
use super::row;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use serde_json::{Map, Value};

const RUN_COLUMNS: &str = "id, agent_name, input_prompt, final_output, total_tokens, total_cost_usd, status, origin, error_message, eval_provider, eval_scores, eval_status, created_at, updated_at";

/// Data access object for Run operations
#[derive(Clone, Debug)]
pub struct RunStore {
    db: Database,
}

impl RunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Get a run by ID
    pub fn get_by_id(&self, id: i64) -> Result<Option<Run>, DatabaseError> {
        self.db.with_connection(|conn| Self::get_in(conn, id))
    }

    /// List runs newest first
    pub fn list(&self, limit: u32, offset: u32) -> Result<Vec<Run>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM agent_runs ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
            ))?;
            let runs = stmt
                .query_map(params![limit, offset], Self::row_to_run)?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(runs)
        })
    }

    pub(crate) fn insert_in(
        conn: &Connection,
        agent_name: &str,
        input_prompt: &str,
        origin: RunOrigin,
        now: DateTime<Utc>,
    ) -> SqliteResult<Run> {
        let ts = format_timestamp(&now);
        conn.execute(
            "INSERT INTO agent_runs (agent_name, input_prompt, status, origin, created_at, updated_at)
             VALUES (?1, ?2, 'running', ?3, ?4, ?4)",
            params![agent_name, input_prompt, origin.as_str(), ts],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_in(conn, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    pub(crate) fn get_in(conn: &Connection, id: i64) -> SqliteResult<Option<Run>> {
        conn.query_row(
            &format!("SELECT {RUN_COLUMNS} FROM agent_runs WHERE id = ?1"),
            params![id],
            Self::row_to_run,
        )
        .optional()
    }

    /// Write every mutable field of the run back to its row
    pub(crate) fn update_in(conn: &Connection, run: &Run) -> SqliteResult<()> {
        conn.execute(
            "UPDATE agent_runs SET final_output = ?2, total_tokens = ?3, total_cost_usd = ?4, status = ?5, error_message = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                run.id,
                run.final_output,
                run.total_tokens,
                run.total_cost_usd,
                run.status.as_str(),
                run.error_message,
                format_timestamp(&run.updated_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn set_eval_snapshot_in(
        conn: &Connection,
        run_id: i64,
        provider: &str,
        scores: &Map<String, Value>,
        status: &str,
        now: DateTime<Utc>,
    ) -> SqliteResult<()> {
        let scores = Value::Object(scores.clone()).to_string();
        conn.execute(
            "UPDATE agent_runs SET eval_provider = ?2, eval_scores = ?3, eval_status = ?4, updated_at = ?5
             WHERE id = ?1",
            params![run_id, provider, scores, status, format_timestamp(&now)],
        )?;
        Ok(())
    }

    /// Delete a run (cascades to steps and evals). Returns whether a row was removed.
    pub(crate) fn delete_in(conn: &Connection, id: i64) -> SqliteResult<bool> {
        let removed = conn.execute("DELETE FROM agent_runs WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    /// Convert a database row to a Run
    fn row_to_run(row: &rusqlite::Row<'_>) -> SqliteResult<Run> {
        Ok(Run {
            id: row.get(0)?,
            agent_name: row.get(1)?,
            input_prompt: row.get(2)?,
            final_output: row.get(3)?,
            total_tokens: row.get(4)?,
            total_cost_usd: row.get(5)?,
            status: row::label(row, 6)?,
            origin: row::label(row, 7)?,
            error_message: row.get(8)?,
            eval_provider: row.get(9)?,
            eval_scores: row::json_object(row, 10)?,
            eval_status: row.get(11)?,
            created_at: row::timestamp(row, 12)?,
            updated_at: row::timestamp(row, 13)?,
        })
    }
}
