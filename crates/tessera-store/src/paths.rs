//! On-disk layout, carried as an explicit value instead of process-wide
//! constants so tests can point every component at a temporary directory.

use std::io;
use std::path::{Path, PathBuf};

/// Locations of every file and directory the store owns, all relative to
/// one data directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    data_dir: PathBuf,
}

impl StorePaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Identity ledger: `records.csv`.
    pub fn records_file(&self) -> PathBuf {
        self.data_dir.join("records.csv")
    }

    /// Attendance ledger: `attendance.csv`.
    pub fn attendance_file(&self) -> PathBuf {
        self.data_dir.join("attendance.csv")
    }

    /// Symmetric key: `secret.key`.
    pub fn key_file(&self) -> PathBuf {
        self.data_dir.join("secret.key")
    }

    /// Root of the encrypted sample tree: `certified/`.
    pub fn certified_dir(&self) -> PathBuf {
        self.data_dir.join("certified")
    }

    /// Create the data directory and the certified/ tree root if missing.
    pub fn ensure_layout(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.certified_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_rooted_at_data_dir() {
        let paths = StorePaths::new("/var/lib/tessera");
        assert_eq!(
            paths.records_file(),
            PathBuf::from("/var/lib/tessera/records.csv")
        );
        assert_eq!(
            paths.attendance_file(),
            PathBuf::from("/var/lib/tessera/attendance.csv")
        );
        assert_eq!(paths.key_file(), PathBuf::from("/var/lib/tessera/secret.key"));
        assert_eq!(
            paths.certified_dir(),
            PathBuf::from("/var/lib/tessera/certified")
        );
    }

    #[test]
    fn ensure_layout_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(dir.path().join("nested/data"));
        paths.ensure_layout().unwrap();
        assert!(paths.certified_dir().is_dir());
        // Idempotent.
        paths.ensure_layout().unwrap();
    }
}
