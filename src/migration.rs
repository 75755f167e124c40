//! Migration handle: applies and reverts versioned SQL files from the configured directory.
//!
//! Files follow sqlx naming: `<version>_<description>.sql` for forward-only migrations, or
//! `<version>_<description>.up.sql` / `.down.sql` pairs for reversible ones. Applied versions
//! are tracked in `_sqlx_migrations`.

use crate::app::App;
use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::migrate::{Migrate as _, MigrateError, MigrationType, Migrator};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub reversible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

#[derive(Clone)]
pub struct Migrate {
    migrator: Arc<Migrator>,
    db: Database,
    config: Arc<Config>,
}

impl Migrate {
    /// Resolve migrations from `MIGRATIONS_DIR`. Fails if the directory cannot be read.
    pub async fn new(app: &App, db: &Database) -> Result<Self, AppError> {
        let config = Arc::clone(app.config());
        let migrator = Migrator::new(config.migrations_dir.clone()).await?;
        tracing::info!(
            dir = %config.migrations_dir.display(),
            count = migrator.iter().filter(|m| !is_down(&m.migration_type)).count(),
            "migrations resolved"
        );
        Ok(Migrate {
            migrator: Arc::new(migrator),
            db: db.clone(),
            config,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        &self.config.migrations_dir
    }

    /// Every known migration in version order.
    pub fn history(&self) -> Vec<MigrationInfo> {
        let down: BTreeSet<i64> = self
            .migrator
            .iter()
            .filter(|m| is_down(&m.migration_type))
            .map(|m| m.version)
            .collect();
        let mut out: Vec<MigrationInfo> = self
            .migrator
            .iter()
            .filter(|m| !is_down(&m.migration_type))
            .map(|m| MigrationInfo {
                version: m.version,
                description: m.description.to_string(),
                reversible: down.contains(&m.version),
            })
            .collect();
        out.sort_by_key(|m| m.version);
        out
    }

    /// Versions recorded as applied, ascending.
    pub async fn applied(&self) -> Result<Vec<i64>, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        conn.ensure_migrations_table().await?;
        let mut versions: Vec<i64> = conn
            .list_applied_migrations()
            .await?
            .into_iter()
            .map(|m| m.version)
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Highest applied version, if any.
    pub async fn current(&self) -> Result<Option<i64>, AppError> {
        Ok(self.applied().await?.last().copied())
    }

    pub async fn status(&self) -> Result<Vec<MigrationStatus>, AppError> {
        let applied: BTreeSet<i64> = self.applied().await?.into_iter().collect();
        Ok(join_status(self.history(), &applied))
    }

    pub async fn pending(&self) -> Result<Vec<MigrationInfo>, AppError> {
        let applied: BTreeSet<i64> = self.applied().await?.into_iter().collect();
        Ok(self
            .history()
            .into_iter()
            .filter(|m| !applied.contains(&m.version))
            .collect())
    }

    /// Apply all pending migrations. Returns the versions applied by this call.
    /// Fails with `VersionMissing` when the database has a version with no local file.
    pub async fn upgrade(&self) -> Result<Vec<i64>, AppError> {
        let applied: BTreeSet<i64> = self.applied().await?.into_iter().collect();
        let pending = plan_upgrade(&self.history(), &applied)?;
        if pending.is_empty() {
            tracing::info!("schema up to date");
            return Ok(pending);
        }
        self.migrator.run(self.db.pool()).await?;
        tracing::info!(applied = ?pending, "migrations applied");
        Ok(pending)
    }

    /// Revert applied migrations newer than `target`. With `None`, revert only the latest.
    /// Returns the versions reverted, newest first.
    pub async fn downgrade(&self, target: Option<i64>) -> Result<Vec<i64>, AppError> {
        let applied = self.applied().await?;
        let target = match target {
            Some(t) => t,
            None => match applied.len() {
                0 => return Ok(Vec::new()),
                1 => 0,
                n => applied[n - 2],
            },
        };
        let reverting = revert_plan(&applied, target);
        if reverting.is_empty() {
            return Ok(reverting);
        }
        let history = self.history();
        for v in &reverting {
            let reversible = history.iter().any(|m| m.version == *v && m.reversible);
            if !reversible {
                return Err(AppError::Irreversible(*v));
            }
        }
        self.migrator.undo(self.db.pool(), target).await?;
        tracing::info!(reverted = ?reverting, target, "migrations reverted");
        Ok(reverting)
    }
}

fn is_down(ty: &MigrationType) -> bool {
    matches!(ty, MigrationType::ReversibleDown)
}

/// Local migrations joined with applied versions. Applied versions with no local file are
/// listed too, with an empty description.
fn join_status(history: Vec<MigrationInfo>, applied: &BTreeSet<i64>) -> Vec<MigrationStatus> {
    let known: BTreeSet<i64> = history.iter().map(|m| m.version).collect();
    let mut out: Vec<MigrationStatus> = history
        .into_iter()
        .map(|m| MigrationStatus {
            applied: applied.contains(&m.version),
            version: m.version,
            description: m.description,
        })
        .collect();
    out.extend(applied.difference(&known).map(|v| MigrationStatus {
        version: *v,
        description: String::new(),
        applied: true,
    }));
    out.sort_by_key(|s| s.version);
    out
}

/// Versions to apply, ascending. Refuses when an applied version is missing locally.
fn plan_upgrade(history: &[MigrationInfo], applied: &BTreeSet<i64>) -> Result<Vec<i64>, AppError> {
    let known: BTreeSet<i64> = history.iter().map(|m| m.version).collect();
    if let Some(missing) = applied.difference(&known).next() {
        return Err(AppError::Migrate(MigrateError::VersionMissing(*missing)));
    }
    Ok(history
        .iter()
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect())
}

/// Create the migrations directory. Returns false if it already existed.
pub async fn init_dir(dir: &Path) -> Result<bool, AppError> {
    if tokio::fs::try_exists(dir).await? {
        if !tokio::fs::metadata(dir).await?.is_dir() {
            return Err(AppError::BadRequest(format!("{} exists and is not a directory", dir.display())));
        }
        return Ok(false);
    }
    tokio::fs::create_dir_all(dir).await?;
    tracing::info!(dir = %dir.display(), "created migrations directory");
    Ok(true)
}

/// Write empty migration file(s) versioned by `now` (UTC, `YYYYMMDDHHMMSS`).
/// Reversible revisions get an `.up.sql`/`.down.sql` pair, simple ones a single `.sql`.
pub async fn new_revision(
    dir: &Path,
    message: &str,
    reversible: bool,
    now: DateTime<Utc>,
) -> Result<Vec<PathBuf>, AppError> {
    let description = slug(message);
    if description.is_empty() {
        return Err(AppError::BadRequest("revision message must contain letters or digits".into()));
    }
    if !tokio::fs::try_exists(dir).await? {
        return Err(AppError::BadRequest(format!(
            "{} does not exist; run `appkit db init` first",
            dir.display()
        )));
    }
    let version: i64 = now
        .format("%Y%m%d%H%M%S")
        .to_string()
        .parse()
        .map_err(|_| AppError::BadRequest("could not derive migration version".into()))?;

    let prefix = format!("{}_", version);
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            return Err(AppError::BadRequest(format!("migration version {} already exists", version)));
        }
    }

    let stem = format!("{}_{}", version, description);
    let header = format!("-- {}\n", message.trim());
    let files: Vec<(PathBuf, String)> = if reversible {
        vec![
            (dir.join(format!("{}.up.sql", stem)), header.clone()),
            (dir.join(format!("{}.down.sql", stem)), format!("-- revert: {}\n", message.trim())),
        ]
    } else {
        vec![(dir.join(format!("{}.sql", stem)), header)]
    };
    for (path, body) in &files {
        tokio::fs::write(path, body).await?;
        tracing::info!(path = %path.display(), "created migration");
    }
    Ok(files.into_iter().map(|(p, _)| p).collect())
}

fn slug(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Applied versions above `target`, newest first.
fn revert_plan(applied: &[i64], target: i64) -> Vec<i64> {
    let mut out: Vec<i64> = applied.iter().copied().filter(|v| *v > target).collect();
    out.sort_unstable_by(|a, b| b.cmp(a));
    out
}
