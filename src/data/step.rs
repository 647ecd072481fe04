//! Step data access object

use super::database::{Database, DatabaseError};
use super::models::{format_timestamp, NewStep, Step};
use super::row;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};

const STEP_COLUMNS: &str = "id, run_id, step_type, name, input, output, latency_ms, cost_usd, tokens, error_message, created_at";

/// Data access object for Step operations
#[derive(Clone, Debug)]
pub struct StepStore {
    db: Database,
}

impl StepStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All steps of a run in trace order
    pub fn list_for_run(&self, run_id: i64) -> Result<Vec<Step>, DatabaseError> {
        self.db
            .with_connection(|conn| Self::list_for_run_in(conn, run_id))
    }

    /// Number of steps referencing a run
    pub fn count_for_run(&self, run_id: i64) -> Result<i64, DatabaseError> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM agent_steps WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
        })
    }

    pub(crate) fn list_for_run_in(conn: &Connection, run_id: i64) -> SqliteResult<Vec<Step>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {STEP_COLUMNS} FROM agent_steps WHERE run_id = ?1 ORDER BY created_at ASC, id ASC"
        ))?;
        let steps = stmt
            .query_map(params![run_id], Self::row_to_step)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(steps)
    }

    /// Timestamp of the most recent step recorded for a run
    pub(crate) fn latest_created_at_in(
        conn: &Connection,
        run_id: i64,
    ) -> SqliteResult<Option<DateTime<Utc>>> {
        conn.query_row(
            "SELECT created_at FROM agent_steps WHERE run_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            params![run_id],
            |row| row::timestamp(row, 0),
        )
        .optional()
    }

    pub(crate) fn insert_in(
        conn: &Connection,
        run_id: i64,
        step: &NewStep,
        created_at: DateTime<Utc>,
    ) -> SqliteResult<Step> {
        conn.execute(
            "INSERT INTO agent_steps (run_id, step_type, name, input, output, latency_ms, cost_usd, tokens, error_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                run_id,
                step.step_type.as_str(),
                step.name,
                row::encode_json(step.input.as_ref()),
                row::encode_json(step.output.as_ref()),
                step.latency_ms,
                step.cost_usd,
                step.tokens,
                step.error_message,
                format_timestamp(&created_at),
            ],
        )?;

        Ok(Step {
            id: conn.last_insert_rowid(),
            run_id,
            step_type: step.step_type,
            name: step.name.clone(),
            input: step.input.clone(),
            output: step.output.clone(),
            latency_ms: step.latency_ms,
            cost_usd: step.cost_usd,
            tokens: step.tokens,
            error_message: step.error_message.clone(),
            created_at,
        })
    }

    /// Convert a database row to a Step
    fn row_to_step(row: &rusqlite::Row<'_>) -> SqliteResult<Step> {
        Ok(Step {
            id: row.get(0)?,
            run_id: row.get(1)?,
            step_type: row::label(row, 2)?,
            name: row.get(3)?,
            input: row::json(row, 4)?,
            output: row::json(row, 5)?,
            latency_ms: row.get(6)?,
            cost_usd: row.get(7)?,
            tokens: row.get(8)?,
            error_message: row.get(9)?,
            created_at: row::timestamp(row, 10)?,
        })
    }
}
