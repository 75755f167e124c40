//! Route registration. Infrastructure routes plus whatever registered route functions return.

mod common;
mod migrations;

pub use common::common_routes;
pub use migrations::migration_routes;

use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this size are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Builds a router for the application. Called once per registered route function.
pub type RouteRegistrar = Box<dyn Fn(&AppState) -> Router + Send + Sync>;

/// Infrastructure routes merged with every registered router, in registration order.
pub fn router(state: &AppState, registrars: &[RouteRegistrar]) -> Router {
    let mut app = Router::new()
        .merge(common_routes(state.clone()))
        .merge(migration_routes(state.clone()));
    for register in registrars {
        app = app.merge(register(state));
    }
    app.layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}
