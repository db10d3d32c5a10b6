use std::sync::Arc;

use axum::{routing::get, Router};

use crate::api::rest::handlers;
use crate::StreamState;

/// Routes served by this module, ready to merge into the host router.
pub fn router(state: Arc<StreamState>) -> Router {
    Router::new()
        .route("/v1/price-stream", get(handlers::price_stream))
        .with_state(state)
}
