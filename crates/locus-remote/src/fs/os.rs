use super::FileSystem;
use std::fs;
use std::io::{ErrorKind, Result};
use std::path::Path;

/// OS filesystem implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn file_exists_at(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists_at(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
