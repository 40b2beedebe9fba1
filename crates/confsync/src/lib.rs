pub mod account;
pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod layout;
pub mod storage;
pub mod store;
pub mod sync;

pub use account::{AccountError, AccountService, Outcome};
pub use config::{load_settings, LogFormat, Settings};
pub use db::Database;
pub use document::ConfigDocument;
pub use error::{ConfigError, ConfsyncError, Result, StorageError};
pub use layout::{Artifact, Cell, Table};
pub use storage::ArtifactWriter;
pub use store::{AccountStore, ConfigurationRepository, InMemoryRepository, StoreError, User};
pub use sync::{SyncEngine, SyncFailure, SyncReport, SyncStage};
