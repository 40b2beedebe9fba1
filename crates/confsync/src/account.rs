//! Mutating account operations.
//!
//! Each operation commits its change to the store first and only then
//! re-derives the user's export files. An export failure is reported
//! alongside the result and never undoes or fails the committed change.

use std::sync::Arc;

use thiserror::Error;

use crate::document::ConfigDocument;
use crate::storage::ArtifactWriter;
use crate::store::{AccountStore, StoreError, User};
use crate::sync::{SyncEngine, SyncReport};

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Current password incorrect")]
    InvalidCredentials,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result of a committed mutation plus the export report it triggered.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub report: SyncReport,
}

pub struct AccountService<S: AccountStore> {
    store: Arc<S>,
    engine: SyncEngine<S>,
}

impl<S: AccountStore> AccountService<S> {
    pub fn new(store: Arc<S>, engine: SyncEngine<S>) -> Self {
        Self { store, engine }
    }

    /// Convenience constructor with a per-user serialized engine.
    pub fn with_writer(store: Arc<S>, writer: ArtifactWriter) -> Self {
        let engine = SyncEngine::new(Arc::clone(&store), writer);
        Self::new(store, engine)
    }

    pub fn engine(&self) -> &SyncEngine<S> {
        &self.engine
    }

    pub fn register(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<Outcome<User>, AccountError> {
        if self.store.get_user(username)?.is_some() {
            return Err(AccountError::UsernameTaken(username.to_string()));
        }
        let user = self
            .store
            .insert_user(username, password_hash)
            .map_err(|e| match e {
                StoreError::DuplicateUsername(name) => AccountError::UsernameTaken(name),
                other => AccountError::Store(other),
            })?;
        log::info!("Registered user {}", user.username);

        let report = self.engine.sync_user(&user);
        Ok(Outcome {
            value: user,
            report,
        })
    }

    /// Changes the password after `verify` accepts the stored hash.
    /// Verification belongs to the identity provider and is passed in.
    pub fn change_password<F>(
        &self,
        username: &str,
        verify: F,
        new_password_hash: &str,
    ) -> Result<Outcome<()>, AccountError>
    where
        F: FnOnce(&str) -> bool,
    {
        let user = self.require_user(username)?;
        if !verify(&user.password_hash) {
            return Err(AccountError::InvalidCredentials);
        }
        self.set_password(user, new_password_hash)
    }

    /// Sets a new password without checking the old one.
    pub fn reset_password(
        &self,
        username: &str,
        new_password_hash: &str,
    ) -> Result<Outcome<()>, AccountError> {
        let user = self.require_user(username)?;
        self.set_password(user, new_password_hash)
    }

    pub fn save_configuration(
        &self,
        username: &str,
        document: &ConfigDocument,
    ) -> Result<Outcome<()>, AccountError> {
        let user = self.require_user(username)?;
        self.store.upsert_configuration(user.id, document)?;
        log::info!("Saved configuration for {}", user.username);

        let report = self.engine.sync_user(&user);
        Ok(Outcome { value: (), report })
    }

    /// The saved configuration, or the empty document if none was saved.
    pub fn load_configuration(&self, username: &str) -> Result<ConfigDocument, AccountError> {
        let user = self.require_user(username)?;
        Ok(self.store.get_configuration(user.id)?.unwrap_or_default())
    }

    /// Re-derives every user's export files.
    pub fn resync_all(&self) -> Result<Vec<SyncReport>, AccountError> {
        Ok(self.engine.sync_all()?)
    }

    fn require_user(&self, username: &str) -> Result<User, AccountError> {
        self.store
            .get_user(username)?
            .ok_or_else(|| AccountError::UserNotFound(username.to_string()))
    }

    fn set_password(&self, user: User, password_hash: &str) -> Result<Outcome<()>, AccountError> {
        self.store.update_password_hash(user.id, password_hash)?;
        log::info!("Updated password for {}", user.username);

        let user = User {
            password_hash: password_hash.to_string(),
            ..user
        };
        let report = self.engine.sync_user(&user);
        Ok(Outcome { value: (), report })
    }
}
