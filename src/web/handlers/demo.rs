//! Demo agent handler.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::replay::DemoAgent;
use crate::web::error::WebError;
use crate::web::state::WebAppState;

#[derive(Debug, Serialize)]
pub struct DemoRunResponse {
    pub ok: bool,
    pub run_id: i64,
}

/// Record a complete demo-agent run.
pub async fn create_demo_run(
    State(state): State<WebAppState>,
) -> Result<(StatusCode, Json<DemoRunResponse>), WebError> {
    let run = DemoAgent::live().run(state.core().store())?;
    Ok((
        StatusCode::CREATED,
        Json(DemoRunResponse {
            ok: true,
            run_id: run.id,
        }),
    ))
}
