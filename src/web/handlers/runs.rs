//! Run and step handlers for the OrchestrAI web API.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{NewStep, Run, RunDetail, RunStatus, RunUpdate, Step, StepType};
use crate::web::error::WebError;
use crate::web::handlers::ApiJson;
use crate::web::state::WebAppState;

fn default_limit() -> u32 {
    50
}

/// Paging parameters for listing runs.
#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

/// Response for listing runs.
#[derive(Debug, Serialize)]
pub struct ListRunsResponse {
    pub runs: Vec<Run>,
}

/// Request to start a run.
#[derive(Debug, Deserialize)]
pub struct CreateRunRequest {
    pub agent_name: String,
    pub input_prompt: String,
}

/// Partial run update. Status arrives as text so unknown values become a 400.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateRunRequest {
    pub status: Option<String>,
    pub final_output: Option<String>,
    pub total_tokens: Option<i64>,
    pub total_cost_usd: Option<f64>,
    pub error_message: Option<String>,
}

impl TryFrom<UpdateRunRequest> for RunUpdate {
    type Error = WebError;

    fn try_from(req: UpdateRunRequest) -> Result<Self, Self::Error> {
        let status = req
            .status
            .map(|s| s.parse::<RunStatus>())
            .transpose()
            .map_err(|e| WebError::BadRequest(e.to_string()))?;
        Ok(RunUpdate {
            status,
            final_output: req.final_output,
            total_tokens: req.total_tokens,
            total_cost_usd: req.total_cost_usd,
            error_message: req.error_message,
        })
    }
}

/// Request to append a step to a run.
#[derive(Debug, Deserialize)]
pub struct AppendStepRequest {
    pub step_type: String,
    pub name: Option<String>,
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub latency_ms: Option<f64>,
    pub cost_usd: Option<f64>,
    pub tokens: Option<i64>,
    pub error_message: Option<String>,
}

impl TryFrom<AppendStepRequest> for NewStep {
    type Error = WebError;

    fn try_from(req: AppendStepRequest) -> Result<Self, Self::Error> {
        let step_type = req
            .step_type
            .parse::<StepType>()
            .map_err(|e| WebError::BadRequest(e.to_string()))?;
        Ok(NewStep {
            step_type,
            name: req.name,
            input: req.input,
            output: req.output,
            latency_ms: req.latency_ms,
            cost_usd: req.cost_usd,
            tokens: req.tokens,
            error_message: req.error_message,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct AppendStepResponse {
    pub ok: bool,
    pub step_id: i64,
    pub step: Step,
}

#[derive(Debug, Serialize)]
pub struct DeleteRunResponse {
    pub ok: bool,
    pub run_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ReplayResponse {
    pub ok: bool,
    pub replay_run_id: i64,
    pub run: Run,
}

/// List runs, newest first.
pub async fn list_runs(
    State(state): State<WebAppState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<ListRunsResponse>, WebError> {
    let runs = state.core().store().list_runs(query.limit, query.offset)?;
    Ok(Json(ListRunsResponse { runs }))
}

/// Start a new run.
pub async fn create_run(
    State(state): State<WebAppState>,
    ApiJson(req): ApiJson<CreateRunRequest>,
) -> Result<(StatusCode, Json<Run>), WebError> {
    let run = state
        .core()
        .store()
        .create_run(&req.agent_name, &req.input_prompt)?;
    Ok((StatusCode::CREATED, Json(run)))
}

/// Get a run with its ordered steps.
pub async fn get_run(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
) -> Result<Json<RunDetail>, WebError> {
    Ok(Json(state.core().store().get_run(id)?))
}

pub async fn update_run(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateRunRequest>,
) -> Result<Json<Run>, WebError> {
    let update = RunUpdate::try_from(req)?;
    Ok(Json(state.core().store().update_run(id, update)?))
}

pub async fn delete_run(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteRunResponse>, WebError> {
    state.core().store().delete_run(id)?;
    Ok(Json(DeleteRunResponse {
        ok: true,
        run_id: id,
    }))
}

/// Record a step and push it to live viewers.
pub async fn append_step(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<AppendStepRequest>,
) -> Result<(StatusCode, Json<AppendStepResponse>), WebError> {
    let new_step = NewStep::try_from(req)?;
    let step = state.core().store().append_step(id, new_step)?;
    Ok((
        StatusCode::CREATED,
        Json(AppendStepResponse {
            ok: true,
            step_id: step.id,
            step,
        }),
    ))
}

/// Produce a derived run by re-execution or trace cloning.
pub async fn replay_run(
    State(state): State<WebAppState>,
    Path(id): Path<i64>,
) -> Result<Json<ReplayResponse>, WebError> {
    let run = state.core().replay_engine().replay(id).await?;
    Ok(Json(ReplayResponse {
        ok: true,
        replay_run_id: run.id,
        run,
    }))
}
