//! Shared fixtures for integration tests.

#![allow(dead_code)]

use locus_remote::{Getter, OsFs, Remote, RetrievalError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Getter that writes fixed files into the destination and counts calls.
#[derive(Default)]
pub struct CountingGetter {
    calls: AtomicUsize,
    sources: Mutex<Vec<String>>,
    files: Vec<(String, String)>,
    delay: Option<Duration>,
}

impl CountingGetter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `name` with `content` into every destination.
    pub fn with_file(mut self, name: &str, content: &str) -> Self {
        self.files.push((name.to_string(), content.to_string()));
        self
    }

    /// Sleep before writing, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sources(&self) -> Vec<String> {
        self.sources.lock().unwrap().clone()
    }
}

impl Getter for CountingGetter {
    fn get(&self, _wd: &Path, src: &str, dst: &Path) -> Result<(), RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sources.lock().unwrap().push(src.to_string());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        std::fs::create_dir_all(dst)?;
        for (name, content) in &self.files {
            let path = dst.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, content)?;
        }
        Ok(())
    }
}

/// Getter that leaves a partial file behind and then fails.
#[derive(Default)]
pub struct FailingGetter {
    calls: AtomicUsize,
}

impl FailingGetter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Getter for FailingGetter {
    fn get(&self, _wd: &Path, _src: &str, dst: &Path) -> Result<(), RetrievalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::create_dir_all(dst)?;
        std::fs::write(dst.join("partial.tmp"), "half")?;
        Err(RetrievalError::Network("connection reset by peer".to_string()))
    }
}

/// Remote over the real filesystem that routes every strategy to `getter`.
pub fn remote_with(home: &Path, getter: Arc<dyn Getter>) -> Remote {
    Remote::with_getters(home, Arc::new(OsFs), getter.clone(), getter.clone(), getter)
}
