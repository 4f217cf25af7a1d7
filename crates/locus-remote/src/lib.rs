//! Remote source resolution for Locus.
//!
//! Turns a source reference into a local path, downloading the referenced
//! content into an on-disk cache the first time it is needed.
//!
//! # Overview
//!
//! Supported references:
//!
//! - **Local paths**: `./values.yaml`, `/etc/app/values.yaml` (returned as is)
//! - **Forced getters**: `git::https://github.com/org/repo.git@path/to/file.yaml?ref=v1.0`
//! - **Object storage**: `s3://bucket/path/to/values.yaml`
//! - **HTTP/HTTPS**: `https://example.com/path/to/values.yaml`
//!
//! For forced-getter references everything before `@` names the unit to
//! retrieve (a repository, an archive, a directory tree) and everything
//! after it the file of interest inside that unit.
//!
//! # Caching
//!
//! Each reference maps to a deterministic cache key derived from its scheme,
//! host, directory and query. Secrets carried in the query (`sshkey`) are
//! redacted before they reach the key, so the key is safe to use as a
//! directory name and to log. Entries live at
//! `<home>/<cache_dir>/<cache key>`; the home directory comes from
//! [`RemoteConfig::resolve_home`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use locus_remote::{OsFs, Remote, RemoteConfig};
//! use std::sync::Arc;
//!
//! let remote = Remote::new(&RemoteConfig::from_env(), Arc::new(OsFs))?;
//!
//! let path = remote.locate(
//!     "git::https://github.com/cloudposse/helmfiles.git@releases/kiam.yaml?ref=0.40.0",
//!     None,
//! )?;
//! ```

pub mod cache_key;
pub mod config;
pub mod error;
pub mod fs;
pub mod getter;
pub mod remote;
pub mod source;

pub use cache_key::derive_cache_key;
pub use config::{GitConfig, NetworkConfig, RemoteConfig, StorageConfig};
pub use error::{RemoteError, Result, RetrievalError};
pub use fs::{FileSystem, MemoryFs, OsFs};
pub use getter::{Getter, Strategy, select_strategy};
pub use remote::Remote;
pub use source::{Source, is_remote};
