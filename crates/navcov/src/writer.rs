//! Durable JSON writer.

use crate::result::{NavcovError, NavcovResult};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Capability: durably write a JSON value to a path.
///
/// Synchronous by contract. A failed write must not leave a partial file at
/// `path`.
pub trait JsonWriter: Send + Sync {
    /// Write `value` to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// `Argument` for an empty path, `Write` for any I/O or serialization
    /// failure.
    fn write_json(&self, path: &Path, value: &Value) -> NavcovResult<()>;
}

/// Filesystem writer using a temp file plus atomic rename
#[derive(Debug, Clone, Copy, Default)]
pub struct FsJsonWriter;

impl FsJsonWriter {
    /// Create a new filesystem writer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl JsonWriter for FsJsonWriter {
    fn write_json(&self, path: &Path, value: &Value) -> NavcovResult<()> {
        if path.as_os_str().is_empty() {
            return Err(NavcovError::argument("must provide a valid file path"));
        }
        let fail = |e: &dyn std::fmt::Display| NavcovError::write(path, e.to_string());

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| fail(&e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| fail(&e))?;
        {
            let mut out = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut out, value).map_err(|e| fail(&e))?;
            out.flush().map_err(|e| fail(&e))?;
        }
        tmp.as_file().sync_all().map_err(|e| fail(&e))?;
        tmp.persist(path).map_err(|e| fail(&e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_writes_object_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snapshot.json");
        let value = json!({"coverage": "object"});

        FsJsonWriter::new().write_json(&path, &value).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, value);
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("some").join("path").join("cov.json");

        FsJsonWriter::new().write_json(&path, &json!(null)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rejects_empty_path() {
        let err = FsJsonWriter::new()
            .write_json(Path::new(""), &json!({}))
            .unwrap_err();
        assert_eq!(err.kind(), "ArgumentError");
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        // A regular file where a directory is expected makes create_dir_all fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();
        let path = blocker.join("cov.json");

        let err = FsJsonWriter::new().write_json(&path, &json!({})).unwrap_err();
        assert_eq!(err.kind(), "WriteError");
        assert!(!path.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cov.json");
        FsJsonWriter::new().write_json(&path, &json!([1, 2])).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
