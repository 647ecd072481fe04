//! Eval data access object

use super::database::{Database, DatabaseError};
use super::models::{format_timestamp, Eval, NewEval};
use super::row;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result as SqliteResult};
use serde_json::Value;

/// Data access object for Eval operations
#[derive(Clone, Debug)]
pub struct EvalStore {
    db: Database,
}

impl EvalStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Eval history for a run, oldest first
    pub fn list_for_run(&self, run_id: i64) -> Result<Vec<Eval>, DatabaseError> {
        self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, run_id, provider, status, scores, notes, created_at
                 FROM run_evals WHERE run_id = ?1 ORDER BY created_at ASC, id ASC",
            )?;
            let evals = stmt
                .query_map(params![run_id], Self::row_to_eval)?
                .collect::<SqliteResult<Vec<_>>>()?;
            Ok(evals)
        })
    }

    /// Number of evals referencing a run
    pub fn count_for_run(&self, run_id: i64) -> Result<i64, DatabaseError> {
        self.db.with_connection(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM run_evals WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
        })
    }

    pub(crate) fn insert_in(
        conn: &Connection,
        run_id: i64,
        eval: &NewEval,
        created_at: DateTime<Utc>,
    ) -> SqliteResult<Eval> {
        conn.execute(
            "INSERT INTO run_evals (run_id, provider, status, scores, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                eval.provider,
                eval.status,
                Value::Object(eval.scores.clone()).to_string(),
                eval.notes,
                format_timestamp(&created_at),
            ],
        )?;

        Ok(Eval {
            id: conn.last_insert_rowid(),
            run_id,
            provider: eval.provider.clone(),
            status: eval.status.clone(),
            scores: eval.scores.clone(),
            notes: eval.notes.clone(),
            created_at,
        })
    }

    fn row_to_eval(row: &rusqlite::Row<'_>) -> SqliteResult<Eval> {
        Ok(Eval {
            id: row.get(0)?,
            run_id: row.get(1)?,
            provider: row.get(2)?,
            status: row.get(3)?,
            scores: row::json_object(row, 4)?.unwrap_or_default(),
            notes: row.get(5)?,
            created_at: row::timestamp(row, 6)?,
        })
    }
}
