//! Append-only audit record file.
//!
//! [`AuditStore`] is the pipeline's leaf storage: one UTF-8 text file,
//! one record per line, appended by the audit logger and read by the
//! dashboard's status endpoint. Records are never edited in place.
//!
//! The store is safe only under the single-logger-instance assumption:
//! nothing here takes a file lock, so two concurrent appenders could
//! interleave partial lines.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Default relative path of the audit record file.
pub const DEFAULT_PATH: &str = "relatorio_envios.txt";

/// Placeholder returned by the status query when nothing has been
/// recorded yet.
pub const PLACEHOLDER: &str = "Nenhum envio registrado ainda.";

/// Handle on the append-only audit record file.
#[derive(Debug, Clone)]
pub struct AuditStore {
    path: PathBuf,
}

impl AuditStore {
    /// Open a store handle at the given path. The file itself is created
    /// lazily on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build a store from the environment.
    ///
    /// | Variable         | Required | Default                 |
    /// |------------------|----------|-------------------------|
    /// | `AUDIT_LOG_PATH` | no       | `relatorio_envios.txt`  |
    pub fn from_env() -> Self {
        let path = std::env::var("AUDIT_LOG_PATH").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        Self::new(path)
    }

    /// Path of the underlying record file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record line and flush it durably.
    ///
    /// The fsync completes before this returns, so a caller that
    /// acknowledges a broker delivery afterwards can rely on the line
    /// surviving a crash. A crash *before* the ack makes the broker
    /// redeliver and the line is appended again — duplicates are accepted,
    /// never deduplicated.
    pub fn append_line(&self, line: &str) -> Result<(), CoreError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }

    /// All non-empty record lines, in file order.
    ///
    /// A store whose file does not exist yet reads as empty.
    pub fn read_lines(&self) -> Result<Vec<String>, CoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, AuditStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AuditStore::new(dir.path().join("relatorio_envios.txt"));
        (dir, store)
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let (_dir, store) = temp_store();
        assert!(store.read_lines().unwrap().is_empty());
    }

    #[test]
    fn append_then_read_preserves_order() {
        let (_dir, store) = temp_store();
        store.append_line("first").unwrap();
        store.append_line("second").unwrap();
        store.append_line("third").unwrap();

        assert_eq!(store.read_lines().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn blank_lines_are_filtered_on_read() {
        let (_dir, store) = temp_store();
        store.append_line("record").unwrap();
        store.append_line("").unwrap();
        store.append_line("   ").unwrap();

        assert_eq!(store.read_lines().unwrap(), ["record"]);
    }

    #[test]
    fn line_count_is_monotonic() {
        let (_dir, store) = temp_store();
        let mut previous = 0;
        for i in 0..5 {
            store.append_line(&format!("record {i}")).unwrap();
            let count = store.read_lines().unwrap().len();
            assert!(count > previous);
            previous = count;
        }
    }

    #[test]
    fn duplicate_lines_are_kept() {
        let (_dir, store) = temp_store();
        store.append_line("same").unwrap();
        store.append_line("same").unwrap();
        assert_eq!(store.read_lines().unwrap(), ["same", "same"]);
    }
}
