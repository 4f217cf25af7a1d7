//! Single-object retrieval from S3 through the AWS CLI.
//!
//! Credentials, regions and profiles resolve the way the AWS CLI resolves
//! them. The bucket region is looked up first so buckets outside the
//! default region work without extra configuration.

use super::{Getter, create_private_dir};
use crate::config::StorageConfig;
use crate::error::RetrievalError;
use crate::source::basename;
use percent_encoding::percent_decode_str;
use std::path::Path;
use std::process::{Command, Output};
use tracing::debug;

/// Region reported for buckets with an empty location constraint.
const DEFAULT_REGION: &str = "us-east-1";

/// Split an `s3://bucket/key` URL into bucket and key.
///
/// The key is percent-decoded.
pub fn parse_s3_url(src: &str) -> Result<(String, String), RetrievalError> {
    let url = url::Url::parse(src)
        .map_err(|e| RetrievalError::Storage(format!("Failed to parse S3 URL: {}", e)))?;
    if url.scheme() != "s3" {
        return Err(RetrievalError::Storage(
            "Invalid URL scheme (expected 's3')".to_string(),
        ));
    }
    let bucket = url.host_str().unwrap_or_default().to_string();
    let key = percent_decode_str(url.path().trim_start_matches('/'))
        .decode_utf8()
        .map_err(|e| RetrievalError::Storage(format!("S3 key is not valid UTF-8: {}", e)))?
        .into_owned();
    Ok((bucket, key))
}

/// Downloads one object into the destination directory.
#[derive(Debug, Clone)]
pub struct S3Getter {
    program: String,
    profile: Option<String>,
    endpoint_url: Option<String>,
}

impl S3Getter {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            program: config.program.clone(),
            profile: non_empty(config.profile.as_deref()),
            endpoint_url: non_empty(config.endpoint_url.as_deref()),
        }
    }

    fn s3api(&self, op: &str, region: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(profile) = &self.profile {
            cmd.arg("--profile").arg(profile);
        }
        if let Some(region) = region {
            cmd.arg("--region").arg(region);
        }
        if let Some(endpoint) = &self.endpoint_url {
            cmd.arg("--endpoint-url").arg(endpoint);
        }
        cmd.arg("s3api").arg(op);
        cmd
    }

    fn bucket_region(&self, bucket: &str) -> Result<String, RetrievalError> {
        let mut cmd = self.s3api("get-bucket-location", None);
        cmd.args(["--bucket", bucket])
            .args(["--query", "LocationConstraint", "--output", "text"]);
        let out = run(&mut cmd, "get-bucket-location")?;
        Ok(region_from_location(&String::from_utf8_lossy(&out.stdout)))
    }
}

impl Default for S3Getter {
    fn default() -> Self {
        Self::new(&StorageConfig::default())
    }
}

impl Getter for S3Getter {
    fn get(&self, _wd: &Path, src: &str, dst: &Path) -> Result<(), RetrievalError> {
        let (bucket, key) = parse_s3_url(src)?;

        let region = self.bucket_region(&bucket)?;
        debug!(%bucket, %region, "Resolved bucket region");

        let mut head = self.s3api("head-object", Some(&region));
        head.args(["--bucket", &bucket, "--key", &key]);
        run(&mut head, "head-object")?;

        create_private_dir(dst)?;

        let target = dst.join(basename(&key));
        let mut get = self.s3api("get-object", Some(&region));
        get.args(["--bucket", &bucket, "--key", &key]).arg(&target);
        run(&mut get, "get-object")?;

        Ok(())
    }
}

fn run(cmd: &mut Command, op: &str) -> Result<Output, RetrievalError> {
    let out = cmd
        .output()
        .map_err(|e| RetrievalError::Storage(format!("Failed to run aws s3api {}: {}", op, e)))?;
    if out.status.success() {
        return Ok(out);
    }
    Err(RetrievalError::Storage(format!(
        "aws s3api {} failed: {}",
        op,
        command_summary(&out)
    )))
}

fn command_summary(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("status {}", out.status)
}

fn region_from_location(output: &str) -> String {
    match output.trim() {
        "" | "None" | "null" => DEFAULT_REGION.to_string(),
        region => region.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
