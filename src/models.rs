//! Model registry. Models declare the table they own; the registry checks those tables exist.

use crate::db::Database;
use crate::error::{AppError, ConfigError};
use serde::Serialize;

/// A persisted type backed by one table.
pub trait Model {
    const NAME: &'static str;
    /// Table name, optionally schema-qualified (`schema.table`).
    const TABLE: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: &'static str,
    pub table: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Vec<ModelInfo>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<M: Model>(&mut self) -> Result<&mut Self, ConfigError> {
        self.register_info(ModelInfo {
            name: M::NAME,
            table: M::TABLE,
        })
    }

    pub fn register_info(&mut self, info: ModelInfo) -> Result<&mut Self, ConfigError> {
        if let Some(existing) = self.models.iter().find(|m| m.table == info.table) {
            return Err(ConfigError::DuplicateModel {
                table: info.table,
                first: existing.name,
                second: info.name,
            });
        }
        tracing::debug!(model = info.name, table = info.table, "model registered");
        self.models.push(info);
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelInfo> {
        self.models.iter()
    }

    pub fn tables(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.table).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Tables of registered models that are missing from the database, in registration order.
pub async fn verify_schema(db: &Database, models: &ModelRegistry) -> Result<Vec<&'static str>, AppError> {
    let mut missing = Vec::new();
    for m in models.iter() {
        if !db.table_exists(m.table).await? {
            missing.push(m.table);
        }
    }
    if !missing.is_empty() {
        tracing::warn!(?missing, "registered model tables are missing; run `appkit db upgrade`");
    }
    Ok(missing)
}
