//! Evaluation handlers for the OrchestrAI web API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::data::Eval;
use crate::eval::JobState;
use crate::web::error::WebError;
use crate::web::state::WebAppState;

#[derive(Debug, Serialize)]
pub struct EnqueueEvalResponse {
    pub ok: bool,
    pub run_id: i64,
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ListEvalsResponse {
    pub evals: Vec<Eval>,
}

/// Queue an evaluation of the run.
pub async fn evaluate_run(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<EnqueueEvalResponse>), WebError> {
    let core = state.core();
    core.store().find_run(id)?;
    let job_id = core.evals().enqueue(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueEvalResponse {
            ok: true,
            run_id: id,
            job_id,
        }),
    ))
}

/// Eval history, oldest first.
pub async fn list_evals(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
) -> Result<Json<ListEvalsResponse>, WebError> {
    let evals = state.core().store().list_evals(id)?;
    Ok(Json(ListEvalsResponse { evals }))
}

pub async fn get_eval_job(
    State(state): State<WebAppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobState>, WebError> {
    state
        .core()
        .evals()
        .job(job_id)
        .map(Json)
        .ok_or_else(|| WebError::NotFound(format!("Eval job {} not found", job_id)))
}
