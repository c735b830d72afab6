//! HTTP route definitions.

use axum::Router;

use crate::state::AppState;

pub mod health;
pub mod status;
pub mod submit;

/// All pipeline routes, mounted at the root.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(status::router())
        .merge(submit::router())
}
