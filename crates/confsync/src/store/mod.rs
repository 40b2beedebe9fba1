//! Store abstractions for users and their configuration documents.
//!
//! The sync engine only ever sees [`ConfigurationRepository`], a read-only
//! capability. Account operations additionally need [`AccountStore`] to
//! commit mutations before triggering a sync.

pub mod memory;

use serde::Serialize;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::document::ConfigDocument;

pub use memory::InMemoryRepository;

/// A registered user. The password hash is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

/// Errors from store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("No user with id {0}")]
    UnknownUserId(i64),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

/// Read-only access to users and their saved configuration.
pub trait ConfigurationRepository: Send + Sync {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Returns the stored document, or `None` when the user never saved one.
    fn get_configuration(&self, user_id: i64) -> Result<Option<ConfigDocument>, StoreError>;

    fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

/// Mutations used by account operations.
pub trait AccountStore: ConfigurationRepository {
    fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;

    fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError>;

    fn upsert_configuration(
        &self,
        user_id: i64,
        document: &ConfigDocument,
    ) -> Result<(), StoreError>;
}
