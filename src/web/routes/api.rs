//! REST API route definitions.

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::handlers::{demo, evals, runs};
use crate::web::state::WebAppState;

/// Build the API router with all REST endpoints.
pub fn api_routes() -> Router<WebAppState> {
    Router::new()
        // Run routes
        .route("/runs", get(runs::list_runs).post(runs::create_run))
        .route(
            "/runs/{id}",
            get(runs::get_run)
                .patch(runs::update_run)
                .delete(runs::delete_run),
        )
        .route("/runs/{id}/steps", post(runs::append_step))
        .route("/runs/{id}/replay", post(runs::replay_run))
        // Eval routes
        .route("/runs/{id}/evaluate", post(evals::evaluate_run))
        .route("/runs/{id}/evals", get(evals::list_evals))
        .route("/evals/jobs/{job_id}", get(evals::get_eval_job))
        // Demo agent
        .route("/demo/run", post(demo::create_demo_run))
}
