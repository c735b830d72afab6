use axum::extract::State;
use axum::{routing::get, Json, Router};

use crate::error::AppResult;
use crate::producer;
use crate::state::AppState;

/// GET /status -- audit record lines for the dashboard, in file order,
/// or a single placeholder string when nothing has been recorded yet.
async fn delivery_status(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    Ok(Json(producer::query_status(&state.store)?))
}

/// Mount the status route.
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(delivery_status))
}
