//! appkit: web service bootstrap. Configuration, application object, PostgreSQL handle,
//! migration handle, and explicit model/route registration.

pub mod app;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod migration;
pub mod models;
pub mod response;
pub mod routes;
pub mod state;

pub use app::App;
pub use bootstrap::{Bootstrap, Built};
pub use config::Config;
pub use db::Database;
pub use error::{AppError, ConfigError};
pub use migration::{Migrate, MigrationInfo, MigrationStatus};
pub use models::{verify_schema, Model, ModelInfo, ModelRegistry};
pub use response::success_many;
pub use state::AppState;
