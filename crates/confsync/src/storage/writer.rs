use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::xlsx;
use crate::error::StorageError;
use crate::layout::Table;

/// Rejects names that would escape the output root or alias another
/// directory: empty, `.`/`..`, or containing a separator or NUL.
pub fn validate_component(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|c| c == '/' || c == '\\' || c == '\0');
    if invalid {
        return Err(StorageError::InvalidDirectoryName(name.to_string()));
    }
    Ok(())
}

/// Writes export tables under `<output_root>/<directory>/<file_name>`.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_root: PathBuf,
}

impl ArtifactWriter {
    pub fn new<P: AsRef<Path>>(output_root: P) -> Self {
        Self {
            output_root: output_root.as_ref().to_path_buf(),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Path of a per-user directory. Does not create it.
    pub fn directory_path(&self, directory: &str) -> Result<PathBuf, StorageError> {
        validate_component(directory)?;
        Ok(self.output_root.join(directory))
    }

    /// Replaces the file's content with `table`. The bytes go to a sibling
    /// temporary file which is synced and then renamed over the target, so
    /// readers see either the old or the new workbook.
    pub fn write(
        &self,
        directory: &str,
        file_name: &str,
        table: &Table,
    ) -> Result<PathBuf, StorageError> {
        validate_component(file_name)?;
        let dir_path = self.directory_path(directory)?;

        let bytes = xlsx::encode_table(table)?;

        self.ensure_directory(&dir_path)?;
        let target = dir_path.join(file_name);
        replace_file(&dir_path, &target, &bytes)?;

        log::debug!(
            "Wrote {} ({} rows, {} bytes)",
            target.display(),
            table.len(),
            bytes.len()
        );
        Ok(target)
    }

    /// Reads a previously written table back.
    pub fn read(&self, directory: &str, file_name: &str) -> Result<Table, StorageError> {
        validate_component(file_name)?;
        let path = self.directory_path(directory)?.join(file_name);
        let bytes = std::fs::read(&path).map_err(|e| StorageError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        xlsx::decode_table(&bytes)
    }

    fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        if !path.is_dir() {
            std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        Ok(())
    }
}

fn replace_file(dir_path: &Path, target: &Path, content: &[u8]) -> Result<(), StorageError> {
    let write_err = |e: std::io::Error| StorageError::WriteFile {
        path: target.to_path_buf(),
        source: e,
    };

    let mut tmp = NamedTempFile::new_in(dir_path).map_err(write_err)?;
    tmp.write_all(content).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    tmp.persist(target).map_err(|e| StorageError::ReplaceFile {
        path: target.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
