//! Migration status route.

use crate::error::AppError;
use crate::response::success_many;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Router};

async fn migration_status(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let status = state.migrate.status().await?;
    Ok(success_many(status))
}

/// GET /migrations: every known migration with its applied flag.
pub fn migration_routes(state: AppState) -> Router {
    Router::new()
        .route("/migrations", get(migration_status))
        .with_state(state)
}
