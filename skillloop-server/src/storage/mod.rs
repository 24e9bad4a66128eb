pub mod ledger;
pub mod matches;
pub mod models;
pub mod schema;
pub mod sessions;

use chrono::Utc;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use models::{NewUser, User};
use skillloop_shared::auth::Principal;
use tracing::{debug, info};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Structured error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A Diesel ORM error (query failure, constraint violation, etc.)
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// Failed to acquire or build a connection from the pool.
    #[error("pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A database migration failed to apply.
    #[error("migration error: {0}")]
    Migration(String),

    /// The caller supplied invalid input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The entity does not exist or is not visible to the acting user.
    #[error("{0}")]
    NotFound(String),

    /// The entity is in the wrong lifecycle state for the operation.
    #[error("{0}")]
    InvalidState(String),

    /// The operation would overwrite state that may only be written once.
    #[error("{0}")]
    Conflict(String),
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl Store {
    pub async fn connect_sqlite(path: &str) -> Result<Self, StorageError> {
        let url = path.to_string();
        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder().max_size(8).build(manager)?;

        // Run pending Diesel migrations on startup (auto-init empty DBs)
        {
            let pool_clone = pool.clone();
            let applied = tokio::task::spawn_blocking(move || -> Result<usize, StorageError> {
                let mut conn = pool_clone.get()?;
                configure_sqlite_conn(&mut conn)?;
                let versions = conn
                    .run_pending_migrations(MIGRATIONS)
                    .map_err(|e| StorageError::Migration(e.to_string()))?;
                Ok(versions.len())
            })
            .await??;
            if applied > 0 {
                info!(path, applied, "storage: applied migrations");
            }
        }

        Ok(Store { pool })
    }

    /// Runs `f` on a pooled connection inside an `IMMEDIATE` transaction on
    /// the blocking pool. The write lock is taken up front, so read-then-write
    /// sequences inside `f` see no interleaved writers.
    pub(crate) async fn write_tx<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            conn.immediate_transaction(f)
        })
        .await?
    }

    pub(crate) async fn read<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T, StorageError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StorageError> {
            let mut conn = pool.get()?;
            configure_sqlite_conn(&mut conn)?;
            f(&mut conn)
        })
        .await?
    }

    /// Returns the local user for `principal`, creating the row on first sight.
    /// Email and display name follow the latest token.
    pub async fn ensure_user(&self, principal: &Principal) -> Result<User, StorageError> {
        use schema::users::dsl as u;
        let subject = principal.subject.clone();
        let email = principal.email.clone();
        let name = principal.name.clone();
        self.write_tx(move |conn| {
            let now = Utc::now().naive_utc();
            let existing = u::users
                .filter(u::auth_subject.eq(&subject))
                .first::<User>(conn)
                .optional()?;
            match existing {
                Some(user) => {
                    if user.email == email && user.display_name == name {
                        return Ok(user);
                    }
                    Ok(diesel::update(u::users.filter(u::id.eq(&user.id)))
                        .set((
                            u::email.eq(email.as_deref()),
                            u::display_name.eq(name.as_deref()),
                            u::updated_at.eq(now),
                        ))
                        .get_result::<User>(conn)?)
                }
                None => {
                    let id = uuid::Uuid::new_v4().to_string();
                    let row = NewUser {
                        id: &id,
                        auth_subject: &subject,
                        email: email.as_deref(),
                        display_name: name.as_deref(),
                        created_at: now,
                        updated_at: now,
                    };
                    let user = diesel::insert_into(u::users)
                        .values(&row)
                        .get_result::<User>(conn)?;
                    debug!(user_id = %user.id, subject = %subject, "storage: provisioned user");
                    Ok(user)
                }
            }
        })
        .await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, StorageError> {
        use schema::users::dsl::*;
        let uid = user_id.to_string();
        self.read(move |conn| {
            Ok(users
                .filter(id.eq(&uid))
                .first::<User>(conn)
                .optional()?)
        })
        .await
    }
}

pub(crate) fn user_exists(conn: &mut SqliteConnection, user_id: &str) -> QueryResult<bool> {
    use schema::users::dsl::*;
    let count: i64 = users.filter(id.eq(user_id)).count().get_result(conn)?;
    Ok(count > 0)
}

/// Creates the directory holding the database file at `db_path`, if any.
pub fn ensure_parent_dir(db_path: &str) -> std::io::Result<()> {
    match std::path::Path::new(db_path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Applies pending migrations to the database at `path` and returns how many ran.
pub fn migrate_sqlite(path: &str) -> Result<usize, StorageError> {
    let mut conn = SqliteConnection::establish(path).map_err(|e| {
        StorageError::Migration(format!("cannot open {}: {}", path, e))
    })?;
    configure_sqlite_conn(&mut conn)?;
    let versions = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    Ok(versions.len())
}

fn configure_sqlite_conn(conn: &mut SqliteConnection) -> Result<(), diesel::result::Error> {
    // Enable WAL for better read/write concurrency and set a busy timeout
    diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
    diesel::sql_query("PRAGMA synchronous=NORMAL;").execute(conn)?;
    diesel::sql_query("PRAGMA busy_timeout=5000;").execute(conn)?;
    Ok(())
}
