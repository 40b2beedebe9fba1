use std::sync::Arc;

use tracing::info_span;

use super::locks::UserLocks;
use super::report::SyncReport;
use crate::config::Settings;
use crate::document::ConfigDocument;
use crate::layout::{self, Artifact, Table};
use crate::storage::ArtifactWriter;
use crate::store::{ConfigurationRepository, StoreError, User};

/// Re-derives a user's export files from their saved configuration.
///
/// The engine holds no state between calls apart from the optional
/// per-user lock table. Every call rebuilds and rewrites all five files.
pub struct SyncEngine<R: ConfigurationRepository + ?Sized> {
    repository: Arc<R>,
    writer: ArtifactWriter,
    locks: Option<UserLocks>,
}

impl<R: ConfigurationRepository + ?Sized> SyncEngine<R> {
    /// Creates an engine that serializes syncs per username.
    pub fn new(repository: Arc<R>, writer: ArtifactWriter) -> Self {
        Self {
            repository,
            writer,
            locks: Some(UserLocks::new()),
        }
    }

    pub fn from_settings(repository: Arc<R>, settings: &Settings) -> Self {
        Self::new(repository, ArtifactWriter::new(&settings.output_root))
            .with_serialization(settings.serialize_per_user)
    }

    /// Enables or disables the per-username lock. Without it, concurrent
    /// syncs for the same user are last-write-wins per file.
    pub fn with_serialization(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(UserLocks::new);
        self
    }

    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Writes all artifacts for `user` from an explicit snapshot.
    pub fn sync(&self, user: &User, snapshot: &ConfigDocument) -> SyncReport {
        self.with_user_lock(&user.username, || self.sync_snapshot(user, snapshot))
    }

    /// Re-reads the user and their configuration under the user's lock and
    /// writes all artifacts. If the user cannot be re-read, `user` is
    /// exported as given. A missing or unreadable configuration is exported
    /// as the empty document.
    pub fn sync_user(&self, user: &User) -> SyncReport {
        self.with_user_lock(&user.username, || {
            let current = self.load_user(user);
            let snapshot = self.load_snapshot(&current);
            self.sync_snapshot(&current, &snapshot)
        })
    }

    /// Syncs every user known to the repository.
    pub fn sync_all(&self) -> Result<Vec<SyncReport>, StoreError> {
        let users = self.repository.list_users()?;
        log::info!("Syncing {} users", users.len());
        Ok(users.iter().map(|user| self.sync_user(user)).collect())
    }

    fn with_user_lock<T>(&self, username: &str, f: impl FnOnce() -> T) -> T {
        match &self.locks {
            Some(locks) => locks.with_lock(username, f),
            None => f(),
        }
    }

    fn load_user(&self, user: &User) -> User {
        match self.repository.get_user(&user.username) {
            Ok(Some(current)) => current,
            Ok(None) => {
                log::debug!("User {} not in repository, exporting as given", user.username);
                user.clone()
            }
            Err(e) => {
                log::warn!(
                    "Failed to reload user {}, exporting as given: {}",
                    user.username,
                    e
                );
                user.clone()
            }
        }
    }

    fn load_snapshot(&self, user: &User) -> ConfigDocument {
        match self.repository.get_configuration(user.id) {
            Ok(Some(document)) => document,
            Ok(None) => ConfigDocument::empty(),
            Err(e) => {
                log::warn!(
                    "Failed to load configuration for {}, exporting defaults: {}",
                    user.username,
                    e
                );
                ConfigDocument::empty()
            }
        }
    }

    fn sync_snapshot(&self, user: &User, snapshot: &ConfigDocument) -> SyncReport {
        let _span = info_span!("sync", username = %user.username).entered();

        let tables: Vec<(Artifact, Table)> = {
            let _step = info_span!("build_layouts").entered();
            layout::build_all(user, snapshot)
        };

        let directory = self.writer.directory_path(&user.username).ok();
        let mut report = SyncReport::new(&user.username, directory);

        {
            let _step = info_span!("write_artifacts", count = tables.len()).entered();
            for (artifact, table) in &tables {
                let file_name = artifact.file_name();
                match self.writer.write(&user.username, file_name, table) {
                    Ok(_) => report.record_success(file_name),
                    Err(e) => {
                        log::warn!(
                            "Failed to sync {} for {}: {}",
                            file_name,
                            user.username,
                            e
                        );
                        report.record_failure(file_name, e);
                    }
                }
            }
        }

        let report = report.finish();
        if report.is_success() {
            log::info!("Synced {} artifacts for {}", report.succeeded.len(), user.username);
        } else {
            log::warn!(
                "Partially synced {}: {} written, {} failed",
                user.username,
                report.succeeded.len(),
                report.failure_count()
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AccountStore, InMemoryRepository};
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<InMemoryRepository>, SyncEngine<InMemoryRepository>) {
        let temp_dir = TempDir::new().unwrap();
        let repo = Arc::new(InMemoryRepository::new());
        let engine = SyncEngine::new(Arc::clone(&repo), ArtifactWriter::new(temp_dir.path()));
        (temp_dir, repo, engine)
    }

    #[test]
    fn test_sync_writes_all_five_files() {
        let (temp_dir, repo, engine) = setup();
        let user = repo.insert_user("alice", "hash").unwrap();

        let report = engine.sync(&user, &ConfigDocument::empty());

        assert!(report.is_success());
        assert_eq!(report.succeeded.len(), 5);
        for artifact in Artifact::ALL {
            assert!(temp_dir.path().join("alice").join(artifact.file_name()).exists());
        }
        assert_eq!(report.directory, Some(temp_dir.path().join("alice")));
    }

    #[test]
    fn test_sync_user_reads_repository() {
        let (_temp_dir, repo, engine) = setup();
        let user = repo.insert_user("alice", "hash").unwrap();
        repo.upsert_configuration(
            user.id,
            &ConfigDocument::from(json!({"device": {"type": "Energy Meter"}})),
        )
        .unwrap();

        engine.sync_user(&user);

        let device = engine.writer().read("alice", "device.xlsx").unwrap();
        assert_eq!(device.rows()[0][0].as_text(), Some("Energy Meter"));
    }

    #[test]
    fn test_sync_user_exports_stored_password_hash() {
        let (_temp_dir, repo, engine) = setup();
        let stale = repo.insert_user("alice", "h1").unwrap();
        repo.update_password_hash(stale.id, "h2").unwrap();

        let report = engine.sync_user(&stale);

        assert!(report.is_success());
        let identity = engine.writer().read("alice", "auth.xlsx").unwrap();
        assert_eq!(identity.rows()[1][0].as_text(), Some("h2"));
    }

    #[test]
    fn test_sync_user_without_configuration_exports_defaults() {
        let (_temp_dir, repo, engine) = setup();
        let user = repo.insert_user("alice", "hash").unwrap();

        let report = engine.sync_user(&user);

        assert!(report.is_success());
        let protocol = engine.writer().read("alice", "protocol.xlsx").unwrap();
        assert_eq!(protocol.len(), 1);
        assert_eq!(protocol.rows()[0][0].as_text(), Some("rtu"));
    }

    #[test]
    fn test_invalid_username_fails_every_artifact() {
        let (_temp_dir, _repo, engine) = setup();
        let user = User {
            id: 1,
            username: "../evil".to_string(),
            password_hash: "h".to_string(),
        };

        let report = engine.sync(&user, &ConfigDocument::empty());

        assert_eq!(report.failure_count(), 5);
        assert!(report.succeeded.is_empty());
        assert!(report.directory.is_none());
    }

    #[test]
    fn test_sync_all_covers_every_user() {
        let (temp_dir, repo, engine) = setup();
        repo.insert_user("alice", "a").unwrap();
        repo.insert_user("bob", "b").unwrap();

        let reports = engine.sync_all().unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(SyncReport::is_success));
        assert!(temp_dir.path().join("alice/auth.xlsx").exists());
        assert!(temp_dir.path().join("bob/auth.xlsx").exists());
    }

    #[test]
    fn test_serialization_toggle() {
        let (_temp_dir, _repo, engine) = setup();
        assert!(engine.locks.is_some());
        let engine = engine.with_serialization(false);
        assert!(engine.locks.is_none());
    }
}
