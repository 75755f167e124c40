//! Command-line surface: `serve` and the `db` migration commands.

use crate::app::App;
use crate::bootstrap::{self, Bootstrap};
use crate::config::Config;
use crate::db::Database;
use crate::error::AppError;
use crate::migration::{self, Migrate};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "appkit")]
#[command(about = "Web service with PostgreSQL and schema migrations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server
    Serve,
    /// Database migration commands
    Db {
        #[command(subcommand)]
        action: DbCommand,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum DbCommand {
    /// Create the migrations directory
    Init,
    /// Write a new empty migration
    Revision {
        /// Short description, used in the file name
        #[arg(short, long)]
        message: String,
        /// Write a single forward-only file instead of an up/down pair
        #[arg(long)]
        simple: bool,
    },
    /// Apply all pending migrations
    Upgrade,
    /// Revert migrations newer than --target (default: revert the latest only)
    Downgrade {
        #[arg(long)]
        target: Option<i64>,
    },
    /// Print the latest applied version
    Current,
    /// List all known migrations
    History,
    /// List migrations with applied/pending state
    Status,
}

pub async fn run(cli: Cli, config: Config) -> Result<(), AppError> {
    match cli.command {
        Command::Serve => {
            let built = Bootstrap::new(config).build().await?;
            bootstrap::install(built.state.clone())?;
            bootstrap::serve(built).await
        }
        Command::Db { action } => run_db(action, config).await,
    }
}

async fn run_db(action: DbCommand, config: Config) -> Result<(), AppError> {
    let app = App::new(config)?;
    let dir = app.config().migrations_dir.clone();
    match action {
        DbCommand::Init => {
            if migration::init_dir(&dir).await? {
                println!("created {}", dir.display());
            } else {
                println!("{} already exists", dir.display());
            }
            return Ok(());
        }
        DbCommand::Revision { ref message, simple } => {
            for path in migration::new_revision(&dir, message, !simple, chrono::Utc::now()).await? {
                println!("created {}", path.display());
            }
            return Ok(());
        }
        _ => {}
    }

    let migrate = match action {
        DbCommand::History => Migrate::new(&app, &Database::connect_lazy(&app)?).await?,
        _ => {
            if app.config().create_database {
                Database::ensure_database_exists(&app.config().database_url).await?;
            }
            Migrate::new(&app, &Database::connect(&app).await?).await?
        }
    };

    match action {
        DbCommand::Init | DbCommand::Revision { .. } => {}
        DbCommand::Upgrade => {
            let applied = migrate.upgrade().await?;
            if applied.is_empty() {
                println!("already up to date");
            }
            for v in applied {
                println!("applied {}", v);
            }
        }
        DbCommand::Downgrade { target } => {
            let reverted = migrate.downgrade(target).await?;
            if reverted.is_empty() {
                println!("nothing to revert");
            }
            for v in reverted {
                println!("reverted {}", v);
            }
        }
        DbCommand::Current => match migrate.current().await? {
            Some(v) => println!("{}", v),
            None => println!("no migrations applied"),
        },
        DbCommand::History => {
            for m in migrate.history() {
                let kind = if m.reversible { "reversible" } else { "simple" };
                println!("{:>16}  {:<10}  {}", m.version, kind, m.description);
            }
        }
        DbCommand::Status => {
            for s in migrate.status().await? {
                let state = if s.applied { "applied" } else { "pending" };
                println!("{:>16}  {:<8}  {}", s.version, state, s.description);
            }
        }
    }
    Ok(())
}
