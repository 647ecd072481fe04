//! REST API handlers.

use axum::extract::FromRequest;

use crate::web::error::WebError;

pub mod demo;
pub mod evals;
pub mod runs;

/// JSON body extractor whose rejections use the API error format
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(WebError))]
pub struct ApiJson<T>(pub T);
