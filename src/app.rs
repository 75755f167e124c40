//! The application object: owns configuration and is the point other handles bind to.

use crate::config::Config;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct App {
    name: Arc<str>,
    config: Arc<Config>,
    started_at: DateTime<Utc>,
}

impl App {
    /// Validates `config` and takes ownership of it. The application name comes from `APP_NAME`.
    pub fn new(config: Config) -> Result<Self, AppError> {
        config.validate()?;
        let name: Arc<str> = Arc::from(config.app_name.as_str());
        tracing::info!(app = %name, bind = %config.bind_addr, "application created");
        Ok(App {
            name,
            config: Arc::new(config),
            started_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
