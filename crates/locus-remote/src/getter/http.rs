//! Single-file HTTP(S) retrieval.

use super::{Getter, create_private_dir};
use crate::config::NetworkConfig;
use crate::error::RetrievalError;
use crate::source::basename;
use percent_encoding::percent_decode_str;
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Build a blocking HTTP client from network settings.
pub fn build_client(config: &NetworkConfig) -> Result<reqwest::blocking::Client, RetrievalError> {
    let mut builder = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(
            config.max_redirects as usize,
        ));

    builder = match &config.user_agent {
        Some(ua) => builder.user_agent(ua),
        None => builder.user_agent(format!("locus/{}", env!("CARGO_PKG_VERSION"))),
    };

    if let Some(proxy_url) = &config.http_proxy {
        let proxy = reqwest::Proxy::http(proxy_url)
            .map_err(|e| RetrievalError::Network(format!("Invalid HTTP proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    if let Some(proxy_url) = &config.https_proxy {
        let proxy = reqwest::Proxy::https(proxy_url)
            .map_err(|e| RetrievalError::Network(format!("Invalid HTTPS proxy: {}", e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| RetrievalError::Network(format!("Failed to create HTTP client: {}", e)))
}

/// Downloads a single file into the destination directory.
///
/// The file keeps the base name of the URL path. An existence check (HEAD)
/// runs before the destination directory is created.
#[derive(Debug, Clone)]
pub struct HttpGetter {
    client: reqwest::blocking::Client,
}

impl HttpGetter {
    pub fn new(config: &NetworkConfig) -> Result<Self, RetrievalError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Getter for HttpGetter {
    fn get(&self, _wd: &Path, src: &str, dst: &Path) -> Result<(), RetrievalError> {
        let url = url::Url::parse(src)
            .map_err(|e| RetrievalError::Network(format!("Invalid URL: {}", e)))?;
        let file_name = percent_decode_str(&basename(url.path()))
            .decode_utf8_lossy()
            .into_owned();

        let head = self
            .client
            .head(url.clone())
            .send()
            .map_err(|e| RetrievalError::Network(format!("HEAD request failed: {}", e)))?;
        if !head.status().is_success() {
            return Err(RetrievalError::Http {
                status: head.status().as_u16(),
                url: redact_url(&url),
            });
        }

        create_private_dir(dst)?;

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| RetrievalError::Network(format!("Request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(RetrievalError::Http {
                status: response.status().as_u16(),
                url: redact_url(&url),
            });
        }

        let target = dst.join(&file_name);
        debug!(target = %target.display(), "Writing HTTP response");
        let mut out = File::create(&target)?;
        std::io::copy(&mut response, &mut out)?;

        Ok(())
    }
}

/// URL without user info or query, safe to put in an error message.
fn redact_url(url: &url::Url) -> String {
    let mut clean = url.clone();
    let _ = clean.set_username("");
    let _ = clean.set_password(None);
    clean.set_query(None);
    clean.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client_defaults() {
        assert!(build_client(&NetworkConfig::default()).is_ok());
    }

    #[test]
    fn test_build_client_with_proxy() {
        let config = NetworkConfig {
            https_proxy: Some("http://proxy.internal:3128".to_string()),
            user_agent: Some("ci".to_string()),
            ..Default::default()
        };
        assert!(build_client(&config).is_ok());
    }

    #[test]
    fn test_redact_url() {
        let url = url::Url::parse("https://user:pw@example.com/a/b.yaml?token=x").unwrap();
        assert_eq!(redact_url(&url), "https://example.com/a/b.yaml");
    }

    #[test]
    fn test_invalid_url_fails_before_any_write() {
        let temp = tempfile::tempdir().unwrap();
        let dst = temp.path().join("entry");
        let getter = HttpGetter::new(&NetworkConfig::default()).unwrap();

        assert!(getter.get(temp.path(), "not a url", &dst).is_err());
        assert!(!dst.exists());
    }
}
