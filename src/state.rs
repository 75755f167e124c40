//! Shared application state for all routes: the application object and the handles bound to it.

use crate::app::App;
use crate::db::Database;
use crate::migration::Migrate;
use crate::models::ModelRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub app: App,
    pub db: Database,
    pub migrate: Migrate,
    /// Frozen after bootstrap; routes only read it.
    pub models: Arc<ModelRegistry>,
}
