use super::FileSystem;
use std::collections::BTreeSet;
use std::io::Result;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory filesystem (for testing)
///
/// Directories exist either because they were added explicitly or because a
/// file or directory below them was.
#[derive(Clone, Default, Debug)]
pub struct MemoryFs {
    inner: Arc<Mutex<Entries>>,
}

#[derive(Default, Debug)]
struct Entries {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file.
    pub fn add_file(&self, path: impl AsRef<Path>) {
        self.entries().files.insert(normalize_path(path.as_ref()));
    }

    /// Register a directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.entries().dirs.insert(normalize_path(path.as_ref()));
    }

    fn entries(&self) -> MutexGuard<'_, Entries> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        if let Component::CurDir = component {
            continue;
        }
        normalized.push(component);
    }
    if normalized.as_os_str().is_empty() {
        return PathBuf::from(".");
    }
    normalized
}

impl FileSystem for MemoryFs {
    fn file_exists_at(&self, path: &Path) -> bool {
        self.entries().files.contains(&normalize_path(path))
    }

    fn directory_exists_at(&self, path: &Path) -> bool {
        let path = normalize_path(path);
        let entries = self.entries();
        if entries.dirs.contains(&path) {
            return true;
        }
        entries
            .files
            .iter()
            .chain(entries.dirs.iter())
            .any(|k| k.starts_with(&path) && k != &path)
    }

    fn remove_all(&self, path: &Path) -> Result<()> {
        let path = normalize_path(path);
        let mut entries = self.entries();
        entries.files.retain(|k| !k.starts_with(&path));
        entries.dirs.retain(|k| !k.starts_with(&path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_files_imply_parent_directories() {
        let fs = MemoryFs::new();
        fs.add_file("/cache/key/values.yaml");

        assert!(fs.file_exists_at(Path::new("/cache/key/values.yaml")));
        assert!(fs.directory_exists_at(Path::new("/cache/key")));
        assert!(fs.directory_exists_at(Path::new("/cache")));
        assert!(!fs.directory_exists_at(Path::new("/cache/key/values.yaml")));
        assert!(!fs.file_exists_at(Path::new("/cache/key")));
    }

    #[test]
    fn test_explicit_directory() {
        let fs = MemoryFs::new();
        fs.add_dir("./charts");
        assert!(fs.directory_exists_at(Path::new("charts")));
        assert!(!fs.file_exists_at(Path::new("charts")));
    }

    #[test]
    fn test_remove_all() {
        let fs = MemoryFs::new();
        fs.add_file("/cache/key/a");
        fs.add_file("/cache/other/b");
        fs.remove_all(Path::new("/cache/key")).unwrap();

        assert!(!fs.directory_exists_at(Path::new("/cache/key")));
        assert!(fs.file_exists_at(Path::new("/cache/other/b")));
    }
}
