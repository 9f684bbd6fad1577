use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::metrics::record_stats_query;
use super::server::internal_error;
use super::session::Session;
use super::state::{ServerState, SharedStatsEngine};
use crate::user::Permission;

async fn get_global_stats(
    session: Session,
    State(stats_engine): State<SharedStatsEngine>,
) -> Response {
    if !session.has_permission(Permission::ViewStats) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let start = Instant::now();
    let result = stats_engine.global_stats();
    record_stats_query("global", start.elapsed());
    match result {
        Ok(stats) => Json(stats).into_response(),
        Err(err) => internal_error("global_stats", err),
    }
}

pub fn stats_routes() -> Router<ServerState> {
    Router::new().route("/global", get(get_global_stats))
}
