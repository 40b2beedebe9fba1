//! Test harness for isolated test execution.
//!
//! Each harness owns a temporary output root and an in-memory SQLite
//! database, with an `AccountService` wired over both.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use confsync::{
    AccountService, AccountStore, Artifact, ArtifactWriter, ConfigDocument,
    ConfigurationRepository, Database, SyncEngine, SyncReport, Table, User,
};

pub struct TestHarness {
    temp_dir: TempDir,
    /// Root under which per-user directories are written.
    pub output_dir: PathBuf,
    pub db: Arc<Database>,
    pub service: AccountService<Database>,
}

impl TestHarness {
    /// Create a harness with per-user serialization enabled.
    pub fn new() -> Self {
        Self::with_serialization(true)
    }

    pub fn with_serialization(enabled: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let output_dir = temp_dir.path().join("exports");
        std::fs::create_dir_all(&output_dir).expect("Failed to create output dir");

        let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
        let engine = SyncEngine::new(Arc::clone(&db), ArtifactWriter::new(&output_dir))
            .with_serialization(enabled);
        let service = AccountService::new(Arc::clone(&db), engine);

        Self {
            temp_dir,
            output_dir,
            db,
            service,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn engine(&self) -> &SyncEngine<Database> {
        self.service.engine()
    }

    /// Register a user and assert the initial export succeeded.
    pub fn register(&self, username: &str, password_hash: &str) -> User {
        let outcome = self
            .service
            .register(username, password_hash)
            .expect("Failed to register user");
        assert!(
            outcome.report.is_success(),
            "initial sync failed: {}",
            outcome.report
        );
        outcome.value
    }

    /// Insert a user directly, without triggering a sync.
    pub fn insert_user(&self, username: &str, password_hash: &str) -> User {
        self.db
            .insert_user(username, password_hash)
            .expect("Failed to insert user")
    }

    pub fn save(&self, username: &str, document: &ConfigDocument) -> SyncReport {
        self.service
            .save_configuration(username, document)
            .expect("Failed to save configuration")
            .report
    }

    pub fn sync(&self, username: &str) -> SyncReport {
        let user = self
            .db
            .get_user(username)
            .expect("Failed to query user")
            .expect("User does not exist");
        self.engine().sync_user(&user)
    }

    pub fn user_dir(&self, username: &str) -> PathBuf {
        self.output_dir.join(username)
    }

    pub fn artifact_path(&self, username: &str, artifact: Artifact) -> PathBuf {
        self.user_dir(username).join(artifact.file_name())
    }

    pub fn read(&self, username: &str, artifact: Artifact) -> Table {
        self.engine()
            .writer()
            .read(username, artifact.file_name())
            .expect("Failed to read artifact")
    }

    pub fn read_bytes(&self, username: &str, artifact: Artifact) -> Vec<u8> {
        std::fs::read(self.artifact_path(username, artifact)).expect("Failed to read bytes")
    }

    /// First cell of every row, as text. Empty cells read as `""`.
    pub fn column_text(&self, username: &str, artifact: Artifact) -> Vec<String> {
        self.read(username, artifact)
            .first_column()
            .into_iter()
            .map(|cell| cell.to_string())
            .collect()
    }

    /// Plant a non-empty directory where an artifact file belongs, so the
    /// final rename onto it fails.
    pub fn block_artifact(&self, username: &str, artifact: Artifact) {
        let path = self.artifact_path(username, artifact);
        if path.is_file() {
            std::fs::remove_file(&path).expect("Failed to remove artifact");
        }
        std::fs::create_dir_all(path.join("blocker")).expect("Failed to plant blocker");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
