//! Source reference parsing.
//!
//! A reference is a go-getter style string such as
//! `git::https://github.com/org/repo.git//charts@values.yaml?ref=v1.0` or a
//! direct `s3://bucket/key` / `https://host/path` URL. Parsing turns it into a
//! [`Source`] descriptor that the cache key deriver and the retrieval
//! strategies work from.

use crate::cache_key::encode_query;
use crate::error::{RemoteError, Result};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use std::fmt;
use url::Url;

/// Getter name assigned to direct `scheme://` references.
pub const NORMAL_GETTER: &str = "normal";

/// Separator between a forced getter name and the rest of the reference.
pub const FORCED_GETTER_SEPARATOR: &str = "::";

/// Schemes accepted by the direct `scheme://` syntax.
pub const NORMAL_SCHEMES: &[&str] = &["s3", "http", "https"];

/// Characters escaped when a decoded file name goes back into a URL path.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A parsed source reference.
///
/// `dir` identifies the retrievable unit (repository, bucket prefix, base
/// path) and `file` the file of interest inside it. A root directory is
/// stored as the empty string. `dir` keeps the URL's percent-encoding while
/// `file` is decoded, since it names a file on disk.
///
/// Serialization leaves out the user-info and the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    getter: String,
    scheme: String,
    #[serde(skip)]
    user: String,
    host: String,
    dir: String,
    file: String,
    #[serde(skip)]
    raw_query: String,
}

impl Source {
    /// Parse a reference string.
    ///
    /// Fails with [`RemoteError::InvalidUrl`] when the string is not a remote
    /// reference (typically a local path) and with
    /// [`RemoteError::UnsupportedScheme`] when the direct `scheme://` syntax
    /// names something other than s3, http or https.
    pub fn parse(reference: &str) -> Result<Self> {
        let items: Vec<&str> = reference.split(FORCED_GETTER_SEPARATOR).collect();
        let (getter, src) = if items.len() == 2 {
            (items[0], items[1])
        } else if reference.split("://").count() == 2 {
            return Self::parse_normal(reference);
        } else {
            ("", reference)
        };

        let url = parse_permissive(src)?;

        let path = url.path();
        let (dir, file) = match path.split('@').collect::<Vec<_>>().as_slice() {
            [dir, file] => (dir.to_string(), file.to_string()),
            _ => split_dir_file(path),
        };

        Ok(Self {
            getter: getter.to_string(),
            scheme: url.scheme().to_string(),
            user: user_info(&url),
            host: host_with_port(&url, src),
            dir,
            file: decode_file(&file),
            raw_query: url.query().unwrap_or_default().to_string(),
        })
    }

    /// Parse a direct `scheme://` reference restricted to [`NORMAL_SCHEMES`].
    fn parse_normal(reference: &str) -> Result<Self> {
        let scheme = normal_scheme(reference)?;

        let url = Url::parse(reference)
            .map_err(|e| RemoteError::InvalidUrl(format!("parse url {reference}: {e}")))?;
        let (dir, file) = split_dir_file(url.path());

        Ok(Self {
            getter: NORMAL_GETTER.to_string(),
            scheme,
            user: user_info(&url),
            host: host_with_port(&url, reference),
            dir,
            file: decode_file(&file),
            raw_query: url.query().unwrap_or_default().to_string(),
        })
    }

    /// Forced getter name, `"normal"` for direct references, or empty.
    pub fn getter(&self) -> &str {
        &self.getter
    }

    /// Lowercase scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// User-info component, possibly `user:password`.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Host, including a non-default port.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Directory part of the path.
    pub fn dir(&self) -> &str {
        &self.dir
    }

    /// File of interest within the retrieved unit.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Undecoded query string.
    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    /// Whether this source came from the direct `scheme://` syntax.
    pub fn is_normal(&self) -> bool {
        self.getter == NORMAL_GETTER
    }

    /// Canonical `scheme://host/dir` string, without user-info or query.
    pub fn source_dir(&self) -> String {
        format!("{}://{}{}", self.scheme, self.host, self.dir)
    }

    /// Retrieval string for the unit named by `dir`.
    ///
    /// Re-embeds the user-info and the original, unredacted query: the
    /// retrieval itself still needs any secret carried there.
    pub fn getter_source(&self) -> String {
        let mut src = if self.user.is_empty() {
            format!("{}://{}{}", self.scheme, self.host, self.dir)
        } else {
            format!("{}://{}@{}{}", self.scheme, self.user, self.host, self.dir)
        };
        if !self.raw_query.is_empty() {
            src.push('?');
            src.push_str(&self.raw_query);
        }
        src
    }

    /// Retrieval string for the single object named by `dir` and `file`.
    pub fn object_source(&self) -> String {
        let file = utf8_percent_encode(&self.file, PATH_SEGMENT);
        let mut src = if self.user.is_empty() {
            format!("{}://{}{}/{}", self.scheme, self.host, self.dir, file)
        } else {
            format!(
                "{}://{}@{}{}/{}",
                self.scheme, self.user, self.host, self.dir, file
            )
        };
        if !self.raw_query.is_empty() {
            src.push('?');
            src.push_str(&self.raw_query);
        }
        src
    }
}

/// Displays the reference in normalized form with user-info dropped and
/// secrets in the query redacted.
impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.getter.is_empty() && !self.is_normal() {
            write!(f, "{}{}", self.getter, FORCED_GETTER_SEPARATOR)?;
        }
        write!(f, "{}", self.source_dir())?;
        if self.is_normal() {
            write!(f, "/{}", self.file)?;
        } else if !self.file.is_empty() {
            write!(f, "@{}", self.file)?;
        }
        if !self.raw_query.is_empty() {
            write!(f, "?{}", encode_query(&self.raw_query).join("&"))?;
        }
        Ok(())
    }
}

/// Whether `reference` parses as a remote source.
pub fn is_remote(reference: &str) -> bool {
    Source::parse(reference).is_ok()
}

/// Validate the scheme of a direct reference and return it lowercased.
fn normal_scheme(reference: &str) -> Result<String> {
    let scheme = reference
        .split("://")
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if NORMAL_SCHEMES.contains(&scheme.as_str()) {
        Ok(scheme)
    } else {
        Err(RemoteError::UnsupportedScheme {
            scheme,
            reference: reference.to_string(),
        })
    }
}

/// Parse anything that carries a scheme; a missing scheme means a local path.
fn parse_permissive(src: &str) -> Result<Url> {
    let url = Url::parse(src).map_err(|e| match e {
        url::ParseError::RelativeUrlWithoutBase => RemoteError::InvalidUrl(format!(
            "parse url: missing scheme - probably this is a local file path? {src}"
        )),
        e => RemoteError::InvalidUrl(format!("parse url: {e}")),
    })?;

    // `C:\path` and `C:/path` parse with a one-letter scheme.
    if url.scheme().len() == 1 {
        return Err(RemoteError::InvalidUrl(format!(
            "parse url: missing scheme - probably this is a local file path? {src}"
        )));
    }

    Ok(url)
}

fn user_info(url: &Url) -> String {
    match url.password() {
        Some(password) => format!("{}:{}", url.username(), password),
        None => url.username().to_string(),
    }
}

/// Host plus port as written. The `url` crate drops a port equal to the
/// scheme default, so the raw authority decides whether one was given.
fn host_with_port(url: &Url, raw: &str) -> String {
    let host = url.host_str().unwrap_or_default();
    let port = url
        .port()
        .or_else(|| url.port_or_known_default().filter(|_| has_explicit_port(raw)));
    match port {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn has_explicit_port(raw: &str) -> bool {
    let Some((_, rest)) = raw.split_once("://") else {
        return false;
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or_default();
    // `[::1]` has colons but no port.
    match host_port.rsplit_once(':') {
        Some((host, port)) if !host.starts_with('[') || host.ends_with(']') => {
            !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit())
        }
        _ => false,
    }
}

fn decode_file(file: &str) -> String {
    percent_decode_str(file).decode_utf8_lossy().into_owned()
}

/// Split a URL path into its directory (root becomes empty) and base name.
pub(crate) fn split_dir_file(path: &str) -> (String, String) {
    let dir = dirname(path);
    let dir = if dir == "/" { String::new() } else { dir };
    (dir, basename(path))
}

/// Everything but the last element of `path`, cleaned.
pub(crate) fn dirname(path: &str) -> String {
    let head = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "",
    };
    clean_path(head)
}

/// The last element of `path`, ignoring trailing slashes.
pub(crate) fn basename(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Lexically normalize a slash-separated path: collapse repeated slashes,
/// drop `.` elements and resolve `..` where possible.
pub(crate) fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            part => parts.push(part),
        }
    }
    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
