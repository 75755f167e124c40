//! Startup sequence and the process-wide application state.
//!
//! Order is fixed: application object, persistence handle, migration handle, models, routes.
//! Nothing registers itself implicitly; callers pass registration functions to [`Bootstrap`].

use crate::app::App;
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, ConfigError};
use crate::migration::Migrate;
use crate::models::ModelRegistry;
use crate::routes::{self, RouteRegistrar};
use crate::state::AppState;
use axum::Router;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tokio::net::TcpListener;

static STATE: OnceCell<AppState> = OnceCell::new();

type ModelRegistrar = Box<dyn FnOnce(&mut ModelRegistry) -> Result<(), ConfigError> + Send>;

pub struct Bootstrap {
    config: Config,
    models: Vec<ModelRegistrar>,
    routes: Vec<RouteRegistrar>,
}

/// Result of [`Bootstrap::build`]: the wired state and the router serving it.
pub struct Built {
    pub state: AppState,
    pub router: Router,
}

impl Bootstrap {
    pub fn new(config: Config) -> Self {
        Bootstrap {
            config,
            models: Vec::new(),
            routes: Vec::new(),
        }
    }

    pub fn models<F>(mut self, register: F) -> Self
    where
        F: FnOnce(&mut ModelRegistry) -> Result<(), ConfigError> + Send + 'static,
    {
        self.models.push(Box::new(register));
        self
    }

    pub fn routes<F>(mut self, register: F) -> Self
    where
        F: Fn(&AppState) -> Router + Send + Sync + 'static,
    {
        self.routes.push(Box::new(register));
        self
    }

    /// Wire everything without touching the database: the pool connects lazily.
    pub async fn build(self) -> Result<Built, AppError> {
        let app = App::new(self.config)?;
        let db = Database::connect_lazy(&app)?;
        let migrate = Migrate::new(&app, &db).await?;

        let mut registry = ModelRegistry::new();
        for register in self.models {
            register(&mut registry)?;
        }
        tracing::info!(models = registry.len(), "models registered");

        let state = AppState {
            app,
            db,
            migrate,
            models: Arc::new(registry),
        };
        let router = routes::router(&state, &self.routes);
        tracing::info!(route_groups = self.routes.len(), "routes registered");
        Ok(Built { state, router })
    }
}

/// Make `state` the process-wide instance. Only the first call succeeds.
pub fn install(state: AppState) -> Result<&'static AppState, AppError> {
    STATE.set(state).map_err(|_| AppError::AlreadyInitialized)?;
    get()
}

pub fn get() -> Result<&'static AppState, AppError> {
    STATE.get().ok_or(AppError::NotInitialized)
}

/// Prepare the database per config, then serve until Ctrl-C.
pub async fn serve(built: Built) -> Result<(), AppError> {
    let Built { state, router } = built;
    let config = Arc::clone(state.app.config());

    if config.create_database {
        Database::ensure_database_exists(&config.database_url).await?;
    }
    if config.auto_migrate {
        state.migrate.upgrade().await?;
    } else {
        match state.migrate.pending().await {
            Ok(pending) if !pending.is_empty() => {
                tracing::warn!(count = pending.len(), "pending migrations; run `appkit db upgrade`")
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "could not read migration state"),
        }
    }

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
