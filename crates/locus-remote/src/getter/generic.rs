//! Multi-protocol directory retrieval.
//!
//! Accepts go-getter style sources: an optional `name::` forced getter, a
//! URL, an optional `//subdir` selector and query options. Git
//! repositories, HTTP(S) archives and local `file` trees are supported.
//!
//! Content is materialized in a temporary staging directory first; the
//! destination is only written once retrieval has succeeded.

use super::archive::{self, ArchiveFormat};
use super::git::{GitFetcher, GitOptions};
use super::http::build_client;
use super::{Getter, copy_dir_all};
use crate::config::RemoteConfig;
use crate::error::RetrievalError;
use crate::source::FORCED_GETTER_SEPARATOR;
use std::path::Path;
use tracing::debug;
use url::Url;

/// Retrieval protocol picked for a generic source.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Protocol {
    Git(GitOptions),
    Archive(ArchiveFormat),
    File,
}

/// A generic source split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Request {
    protocol: Protocol,
    url: Url,
    subdir: Option<String>,
}

/// Go-getter style retrieval of whole directory trees.
#[derive(Debug, Clone)]
pub struct GenericGetter {
    git: GitFetcher,
    client: reqwest::blocking::Client,
}

impl GenericGetter {
    pub fn new(config: &RemoteConfig) -> Result<Self, RetrievalError> {
        Ok(Self {
            git: GitFetcher::new(&config.git),
            client: build_client(&config.network)?,
        })
    }
}

impl Getter for GenericGetter {
    fn get(&self, wd: &Path, src: &str, dst: &Path) -> Result<(), RetrievalError> {
        let request = Request::parse(src)?;
        let staging = tempfile::Builder::new().prefix("locus-get-").tempdir()?;
        let root = staging.path().join("root");

        match &request.protocol {
            Protocol::Git(options) => {
                debug!(host = request.url.host_str().unwrap_or_default(), "Cloning git source");
                self.git.clone_repo(request.url.as_str(), options, &root)?;
            }
            Protocol::Archive(format) => {
                debug!(host = request.url.host_str().unwrap_or_default(), "Downloading archive");
                archive::fetch_and_extract(&self.client, request.url.as_str(), *format, &root)?;
            }
            Protocol::File => {
                let path = request.url.to_file_path().map_err(|_| {
                    RetrievalError::UnsupportedGetter(format!(
                        "file source is not a local path: {}",
                        request.url.path()
                    ))
                })?;
                let path = wd.join(path);
                if !path.is_dir() {
                    return Err(RetrievalError::PathNotFound {
                        path: path.display().to_string(),
                        location: "local filesystem".to_string(),
                    });
                }
                copy_dir_all(&path, &root)?;
            }
        }

        let content = match &request.subdir {
            Some(subdir) => {
                let path = root.join(subdir);
                if !path.is_dir() {
                    return Err(RetrievalError::PathNotFound {
                        path: subdir.clone(),
                        location: request.location(),
                    });
                }
                path
            }
            None => root,
        };

        copy_dir_all(&content, dst)?;
        Ok(())
    }
}

impl Request {
    fn parse(src: &str) -> Result<Self, RetrievalError> {
        let (forced, rest) = split_forced(src);
        let (rest, subdir) = split_subdir(rest);

        let mut url = Url::parse(&rest).map_err(|e| {
            RetrievalError::UnsupportedGetter(format!("cannot parse source: {}", e))
        })?;

        let mut reference = None;
        let mut depth = None;
        let mut ssh_key = None;
        let mut archive = None;
        let mut kept = Vec::new();
        for (name, value) in url.query_pairs() {
            match name.as_ref() {
                "ref" => reference = Some(value.into_owned()),
                "depth" => depth = value.parse::<u32>().ok(),
                "sshkey" => ssh_key = Some(value.into_owned()),
                "archive" => archive = Some(value.into_owned()),
                _ => kept.push((name.into_owned(), value.into_owned())),
            }
        }
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(&kept);
        }

        let name = forced.unwrap_or_else(|| detect(&url));
        let protocol = match name {
            "git" => Protocol::Git(GitOptions {
                reference,
                depth,
                ssh_key,
            }),
            "http" | "https" => {
                let format = match &archive {
                    Some(name) => ArchiveFormat::from_name(name),
                    None => ArchiveFormat::from_path(url.path()),
                };
                Protocol::Archive(format.ok_or_else(|| {
                    RetrievalError::UnsupportedGetter(format!(
                        "{} does not name a supported archive",
                        url.path()
                    ))
                })?)
            }
            "file" => Protocol::File,
            "" => {
                return Err(RetrievalError::UnsupportedGetter(format!(
                    "no getter for scheme '{}'",
                    url.scheme()
                )));
            }
            other => return Err(RetrievalError::UnsupportedGetter(other.to_string())),
        };

        Ok(Self {
            protocol,
            url,
            subdir,
        })
    }

    /// Scheme, host and path of the source, without credentials or query.
    fn location(&self) -> String {
        format!(
            "{}://{}{}",
            self.url.scheme(),
            self.url.host_str().unwrap_or_default(),
            self.url.path()
        )
    }
}

/// Protocol name for a source without a forced getter.
fn detect(url: &Url) -> &'static str {
    match url.scheme() {
        "git" | "ssh" => "git",
        "http" | "https" if url.path().ends_with(".git") => "git",
        "http" => "http",
        "https" => "https",
        "file" => "file",
        _ => "",
    }
}

/// Split off a leading `name::` forced getter.
fn split_forced(src: &str) -> (Option<&str>, &str) {
    match src.split_once(FORCED_GETTER_SEPARATOR) {
        Some((name, rest)) if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) => {
            (Some(name), rest)
        }
        _ => (None, src),
    }
}

/// Split a `//subdir` selector off a source, keeping the query on the source.
fn split_subdir(src: &str) -> (String, Option<String>) {
    let stop = src.find('?').unwrap_or(src.len());
    let offset = src[..stop].find("://").map(|i| i + 3).unwrap_or(0);

    let Some(idx) = src[offset..stop].find("//").map(|i| i + offset) else {
        return (src.to_string(), None);
    };

    let mut base = src[..idx].to_string();
    let mut subdir = src[idx + 2..].to_string();
    if let Some(q) = subdir.find('?') {
        base.push_str(&subdir[q..]);
        subdir.truncate(q);
    }

    let subdir = subdir.trim_matches('/').to_string();
    if subdir.is_empty() {
        (base, None)
    } else {
        (base, Some(subdir))
    }
}
