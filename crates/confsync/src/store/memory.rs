//! In-memory store, for tests and for embedding without SQLite.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{AccountStore, ConfigurationRepository, StoreError, User};
use crate::document::ConfigDocument;

#[derive(Default)]
struct State {
    next_id: i64,
    users: BTreeMap<i64, User>,
    /// Raw blobs, so malformed content can be stored and read back the way
    /// a database column would behave.
    configurations: BTreeMap<i64, String>,
}

#[derive(Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw configuration blob without going through
    /// [`ConfigDocument`].
    pub fn put_raw_configuration(&self, user_id: i64, blob: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        if !state.users.contains_key(&user_id) {
            return Err(StoreError::UnknownUserId(user_id));
        }
        state.configurations.insert(user_id, blob.to_string());
        Ok(())
    }
}

impl ConfigurationRepository for InMemoryRepository {
    fn get_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn get_configuration(&self, user_id: i64) -> Result<Option<ConfigDocument>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state
            .configurations
            .get(&user_id)
            .map(|blob| ConfigDocument::parse(blob)))
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(state.users.values().cloned().collect())
    }
}

impl AccountStore for InMemoryRepository {
    fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        if state.users.values().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }
        state.next_id += 1;
        let user = User {
            id: state.next_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update_password_hash(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::LockPoisoned)?;
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::UnknownUserId(user_id))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    fn upsert_configuration(
        &self,
        user_id: i64,
        document: &ConfigDocument,
    ) -> Result<(), StoreError> {
        self.put_raw_configuration(user_id, &document.to_blob())
    }
}
