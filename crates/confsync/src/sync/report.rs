use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StorageError;

/// Stage at which an artifact failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStage {
    Encode,
    Write,
}

impl SyncStage {
    pub fn of(error: &StorageError) -> Self {
        match error {
            StorageError::Encode(_) => SyncStage::Encode,
            _ => SyncStage::Write,
        }
    }
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::Encode => f.write_str("encode"),
            SyncStage::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug)]
pub struct SyncFailure {
    pub stage: SyncStage,
    pub error: StorageError,
}

impl SyncFailure {
    pub fn new(error: StorageError) -> Self {
        Self {
            stage: SyncStage::of(&error),
            error,
        }
    }
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.error)
    }
}

impl Serialize for SyncFailure {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SyncFailure", 2)?;
        state.serialize_field("stage", &self.stage)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.end()
    }
}

/// Outcome of one sync invocation, keyed by artifact file name.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub username: String,
    pub directory: Option<PathBuf>,
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeMap<String, SyncFailure>,
    pub completed_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn new(username: &str, directory: Option<PathBuf>) -> Self {
        Self {
            username: username.to_string(),
            directory,
            succeeded: BTreeSet::new(),
            failed: BTreeMap::new(),
            completed_at: Utc::now(),
        }
    }

    pub fn record_success(&mut self, file_name: &str) {
        self.succeeded.insert(file_name.to_string());
    }

    pub fn record_failure(&mut self, file_name: &str, error: StorageError) {
        self.failed
            .insert(file_name.to_string(), SyncFailure::new(error));
    }

    pub(crate) fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }

    /// True when every artifact was written.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} written, {} failed",
            self.username,
            self.succeeded.len(),
            self.failed.len()
        )?;
        for (file, failure) in &self.failed {
            write!(f, "\n  {}: {}", file, failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_classification() {
        assert_eq!(
            SyncStage::of(&StorageError::Encode("zip".into())),
            SyncStage::Encode
        );
        assert_eq!(
            SyncStage::of(&StorageError::InvalidDirectoryName("..".into())),
            SyncStage::Write
        );
    }

    #[test]
    fn test_report_counts() {
        let mut report = SyncReport::new("alice", None);
        report.record_success("auth.xlsx");
        report.record_success("device.xlsx");
        assert!(report.is_success());

        report.record_failure("connections.xlsx", StorageError::Encode("boom".into()));
        assert!(!report.is_success());
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failed["connections.xlsx"].stage, SyncStage::Encode);
    }

    #[test]
    fn test_report_display_lists_failures() {
        let mut report = SyncReport::new("alice", None);
        report.record_success("auth.xlsx");
        report.record_failure(
            "protocol.xlsx",
            StorageError::InvalidDirectoryName("a/b".into()),
        );
        let text = report.to_string();
        assert!(text.starts_with("alice: 1 written, 1 failed"));
        assert!(text.contains("protocol.xlsx: write failed"));
    }

    #[test]
    fn test_report_serializes_error_text() {
        let mut report = SyncReport::new("alice", None);
        report.record_failure("auth.xlsx", StorageError::Encode("boom".into()));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["failed"]["auth.xlsx"]["stage"], "encode");
        assert_eq!(
            value["failed"]["auth.xlsx"]["error"],
            "Failed to encode workbook: boom"
        );
        assert_eq!(value["username"], "alice");
    }
}
