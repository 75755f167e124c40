//! Persistence handle: a PostgreSQL pool bound to the application's configuration.

use crate::app::App;
use crate::config::Config;
use crate::error::AppError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    config: Arc<Config>,
}

impl Database {
    fn options(config: &Config) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
    }

    /// Open the pool and establish one connection up front.
    pub async fn connect(app: &App) -> Result<Self, AppError> {
        let config = Arc::clone(app.config());
        let pool = Self::options(&config).connect(&config.database_url).await?;
        tracing::info!(max_connections = config.max_connections, "database pool connected");
        Ok(Database { pool, config })
    }

    /// Build the pool without I/O; connections open on first use.
    pub fn connect_lazy(app: &App) -> Result<Self, AppError> {
        let config = Arc::clone(app.config());
        let pool = Self::options(&config).connect_lazy(&config.database_url)?;
        tracing::debug!(max_connections = config.max_connections, "database pool created (lazy)");
        Ok(Database { pool, config })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// True when `name` (optionally schema-qualified) resolves to a relation.
    pub async fn table_exists(&self, name: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1::text) IS NOT NULL")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Ensure the database in `database_url` exists; create it if not. Connects to the
    /// `postgres` admin database to run CREATE DATABASE. Call before the pool is used.
    pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
        let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
        if db_name.is_empty() || db_name == "postgres" {
            return Ok(());
        }
        let opts = PgConnectOptions::from_str(&admin_url)
            .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
        let mut conn: sqlx::PgConnection = opts.connect().await?;
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await?;
        if !exists.0 {
            sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
                .execute(&mut conn)
                .await?;
            tracing::info!(database = %db_name, "created database");
        }
        Ok(())
    }
}

/// Split a connection URL into (admin URL on the `postgres` database, target database name).
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
    let path_start = url
        .get(scheme_end..)
        .and_then(|rest| rest.find('/'))
        .map(|i| scheme_end + i + 1)
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((name, q)) => (name.trim(), Some(q)),
        None => (path_and_query.trim(), None),
    };
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = match query {
        Some(q) => format!("{}postgres?{}", base, q),
        None => format!("{}postgres", base),
    };
    Ok((admin_url, db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
