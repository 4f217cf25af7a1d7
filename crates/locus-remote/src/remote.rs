//! Locating and fetching remote sources into the cache.

use crate::cache_key::derive_cache_key;
use crate::config::{DISABLE_INSECURE_FEATURES_ENV, RemoteConfig, parse_bool};
use crate::error::{RemoteError, Result};
use crate::fs::FileSystem;
use crate::getter::{GenericGetter, Getter, HttpGetter, S3Getter, Strategy, select_strategy};
use crate::source::{FORCED_GETTER_SEPARATOR, Source};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Resolves source references to local paths, downloading into a cache
/// under [`Remote::home`] when needed.
///
/// Cache entries live at `<home>/<cache_dir>/<cache key>`. One `Remote` can
/// be shared across threads; concurrent fetches of the same entry are
/// serialized so the entry is retrieved once.
pub struct Remote {
    home: PathBuf,
    getter: Arc<dyn Getter>,
    s3_getter: Arc<dyn Getter>,
    http_getter: Arc<dyn Getter>,
    fs: Arc<dyn FileSystem>,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl Remote {
    /// Create a remote with the default retrieval strategies.
    ///
    /// Fails with [`RemoteError::Disabled`] when
    /// [`RemoteConfig::disable_insecure_features`] is set or the
    /// `LOCUS_DISABLE_INSECURE_FEATURES` variable is true. The variable can
    /// only turn the gate on.
    pub fn new(config: &RemoteConfig, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let env_disabled = std::env::var(DISABLE_INSECURE_FEATURES_ENV)
            .ok()
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false);
        if config.disable_insecure_features || env_disabled {
            return Err(RemoteError::Disabled {
                var: DISABLE_INSECURE_FEATURES_ENV.to_string(),
            });
        }

        let getter = GenericGetter::new(config).map_err(|e| RemoteError::Config(e.to_string()))?;
        let http_getter =
            HttpGetter::new(&config.network).map_err(|e| RemoteError::Config(e.to_string()))?;
        let s3_getter = S3Getter::new(&config.storage);

        let remote = Self::with_getters(
            config.resolve_home(),
            fs,
            Arc::new(getter),
            Arc::new(s3_getter),
            Arc::new(http_getter),
        );
        debug!(home = %remote.home.display(), "Initialized remote");
        Ok(remote)
    }

    /// Create a remote with explicit strategies.
    pub fn with_getters(
        home: impl Into<PathBuf>,
        fs: Arc<dyn FileSystem>,
        getter: Arc<dyn Getter>,
        s3_getter: Arc<dyn Getter>,
        http_getter: Arc<dyn Getter>,
    ) -> Self {
        Self {
            home: home.into(),
            getter,
            s3_getter,
            http_getter,
            fs,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Cache home.
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Directory a reference is cached in, without fetching it.
    pub fn cache_path(&self, reference: &str, cache_dir: Option<&str>) -> Result<PathBuf> {
        let source = Source::parse(reference)?;
        Ok(self.home.join(cache_destination(&derive_cache_key(&source), cache_dir)))
    }

    /// Resolve a reference to a usable local path.
    ///
    /// An existing local file or directory is returned as is. Anything that
    /// is not a remote reference is also returned as is, leaving the "not
    /// found" decision to the caller. Everything else goes through
    /// [`Remote::fetch`].
    pub fn locate(&self, reference: &str, cache_dir: Option<&str>) -> Result<PathBuf> {
        let path = Path::new(reference);
        if self.fs.file_exists_at(path) || self.fs.directory_exists_at(path) {
            debug!("Reference exists locally");
            return Ok(path.to_path_buf());
        }

        match self.fetch(reference, cache_dir) {
            Err(e) if e.is_invalid_url() => {
                debug!(reason = %e, "Not a remote reference, using it as a local path");
                Ok(path.to_path_buf())
            }
            other => other,
        }
    }

    /// Fetch a remote reference into the cache and return the local path of
    /// its file (or of the cache entry when the reference names no file).
    pub fn fetch(&self, reference: &str, cache_dir: Option<&str>) -> Result<PathBuf> {
        let source = Source::parse(reference)?;
        debug!(
            getter = source.getter(),
            scheme = source.scheme(),
            has_user = !source.user().is_empty(),
            host = source.host(),
            dir = source.dir(),
            file = source.file(),
            "Parsed source"
        );

        let key = derive_cache_key(&source);
        let destination = cache_destination(&key, cache_dir);
        let cache_path = self.home.join(&destination);
        debug!(
            home = %self.home.display(),
            destination = %destination.display(),
            cache_path = %cache_path.display(),
            "Resolved cache entry"
        );

        let lock = self.entry_lock(&cache_path)?;
        let result = self.populate(&source, destination, &cache_path, &lock);
        self.release_lock(&cache_path, lock);
        result?;

        Ok(join_relative(&cache_path, source.file()))
    }

    fn populate(
        &self,
        source: &Source,
        destination: PathBuf,
        cache_path: &Path,
        lock: &Mutex<()>,
    ) -> Result<()> {
        let _guard = lock
            .lock()
            .map_err(|e| RemoteError::LockPoisoned(e.to_string()))?;

        if self.fs.file_exists_at(cache_path) {
            return Err(RemoteError::CachePathConflict { path: destination });
        }

        if self.is_cached(source, cache_path) {
            debug!(cache_path = %cache_path.display(), "Cache hit");
            Ok(())
        } else {
            self.retrieve(source, cache_path)
        }
    }

    fn is_cached(&self, source: &Source, cache_path: &Path) -> bool {
        (source.is_normal()
            && self
                .fs
                .file_exists_at(&join_relative(cache_path, source.file())))
            || self.fs.directory_exists_at(cache_path)
    }

    fn retrieve(&self, source: &Source, cache_path: &Path) -> Result<()> {
        let strategy = select_strategy(source.getter(), source.scheme());
        let (getter, src) = match strategy {
            Strategy::ObjectStorage => (&self.s3_getter, source.object_source()),
            Strategy::Http => (&self.http_getter, source.object_source()),
            Strategy::Generic if source.getter().is_empty() => (&self.getter, source.getter_source()),
            Strategy::Generic => (
                &self.getter,
                format!(
                    "{}{}{}",
                    source.getter(),
                    FORCED_GETTER_SEPARATOR,
                    source.getter_source()
                ),
            ),
        };

        info!(source = %source, ?strategy, "Downloading");
        match getter.get(&self.home, &src, cache_path) {
            Ok(()) => {
                info!(source = %source, cache_path = %cache_path.display(), "Downloaded");
                Ok(())
            }
            Err(err) => {
                let reference = source.to_string();
                if let Err(cleanup) = self.fs.remove_all(cache_path) {
                    warn!(
                        cache_path = %cache_path.display(),
                        error = %cleanup,
                        "Failed to remove partial cache entry"
                    );
                    return Err(RemoteError::RetrievalCleanup {
                        reference,
                        source: err,
                        cleanup,
                    });
                }
                Err(RemoteError::Retrieval {
                    reference,
                    source: err,
                })
            }
        }
    }

    fn entry_lock(&self, cache_path: &Path) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| RemoteError::LockPoisoned(e.to_string()))?;
        Ok(Arc::clone(locks.entry(cache_path.to_path_buf()).or_default()))
    }

    /// Drop the entry lock from the map once no other fetch holds it.
    fn release_lock(&self, cache_path: &Path, lock: Arc<Mutex<()>>) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(cache_path);
        }
    }
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

/// `<cache_dir>/<key>`, relative to the cache home even when `cache_dir`
/// is absolute.
fn cache_destination(key: &str, cache_dir: Option<&str>) -> PathBuf {
    join_relative(&join_relative(Path::new(""), cache_dir.unwrap_or_default()), key)
}

/// Join `rel` under `base` keeping only plain name components, so the
/// result never leaves `base`.
fn join_relative(base: &Path, rel: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in Path::new(rel).components() {
        if let Component::Normal(name) = component {
            path.push(name);
        }
    }
    path
}
