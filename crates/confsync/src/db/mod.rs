//! SQLite persistence for users and their configuration documents.
//!
//! A single rusqlite connection sits behind `Arc<Mutex<_>>`; every
//! repository function borrows it through [`Database::with_conn`].

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod config_repo;
pub mod error;
pub mod migrations;
pub mod user_repo;

pub use error::DatabaseError;

use crate::document::ConfigDocument;
use crate::store::{AccountStore, ConfigurationRepository, StoreError, User};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the account database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database file, creating it and its parent directory when
    /// missing, and migrates it to the current schema.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get(0))?;
        log::debug!("Journal mode {}", mode);
        let db = Self::prepare(conn)?;
        log::info!("Using database {}", path.display());
        Ok(db)
    }

    /// Private in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        migrations::run_all(&conn)?;
        log::debug!("Schema at version {}", migrations::schema_version(&conn)?);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }
}

impl ConfigurationRepository for Database {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(user_repo::find_by_username(self, username)?)
    }

    fn get_configuration(&self, user_id: i64) -> Result<Option<ConfigDocument>, StoreError> {
        Ok(config_repo::find_by_user(self, user_id)?.map(|blob| ConfigDocument::parse(&blob)))
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(user_repo::list(self)?)
    }
}

impl AccountStore for Database {
    fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        user_repo::insert(self, username, password_hash).map_err(|e| {
            if e.is_constraint_violation() {
                StoreError::DuplicateUsername(username.to_string())
            } else {
                StoreError::Database(e)
            }
        })
    }

    fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        if user_repo::update_password(self, user_id, password_hash)? {
            Ok(())
        } else {
            Err(StoreError::UnknownUserId(user_id))
        }
    }

    fn upsert_configuration(
        &self,
        user_id: i64,
        document: &ConfigDocument,
    ) -> Result<(), StoreError> {
        config_repo::upsert(self, user_id, &document.to_blob()).map_err(|e| {
            if e.is_constraint_violation() {
                StoreError::UnknownUserId(user_id)
            } else {
                StoreError::Database(e)
            }
        })
    }
}
