//! Retrieval strategies.
//!
//! Every strategy implements [`Getter`]: materialize a source string into a
//! destination directory. [`select_strategy`] decides which one a parsed
//! [`Source`](crate::Source) goes to.

pub mod archive;
pub mod generic;
pub mod git;
pub mod http;
pub mod s3;

pub use generic::GenericGetter;
pub use http::HttpGetter;
pub use s3::{S3Getter, parse_s3_url};

use crate::error::RetrievalError;
use crate::source::NORMAL_GETTER;
use std::fs;
use std::io;
use std::path::Path;

/// Retrieve `src` into the directory `dst`.
///
/// `wd` is the working directory relative sources are resolved against.
/// On success `dst` exists and holds the retrieved content; on failure it
/// may be missing or partially written, and the caller is responsible for
/// removing it.
pub trait Getter: Send + Sync {
    fn get(&self, wd: &Path, src: &str, dst: &Path) -> Result<(), RetrievalError>;
}

/// The retrieval strategy chosen for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Single object from object storage.
    ObjectStorage,
    /// Single file over HTTP(S).
    Http,
    /// Directory tree through the multi-protocol getter.
    Generic,
}

/// Pick a strategy from a source's forced getter and scheme.
pub fn select_strategy(getter: &str, scheme: &str) -> Strategy {
    match (getter, scheme) {
        (NORMAL_GETTER, "s3") => Strategy::ObjectStorage,
        (NORMAL_GETTER, "http" | "https") => Strategy::Http,
        _ => Strategy::Generic,
    }
}

/// Create `path` and its parents, readable by the owner only.
pub(crate) fn create_private_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(path)
}

/// Recursively copy a directory, leaving out `.git`.
pub(crate) fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_name() == ".git" {
            continue;
        }
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}
