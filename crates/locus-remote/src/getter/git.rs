//! Git retrieval through the git CLI.
//!
//! Shelling out keeps the user's git configuration (credential helpers,
//! known hosts, proxies) in effect.

use crate::config::GitConfig;
use crate::error::RetrievalError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Options carried in a git source's query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOptions {
    /// Branch, tag or commit to check out (`ref=`).
    pub reference: Option<String>,
    /// Clone depth override (`depth=`).
    pub depth: Option<u32>,
    /// Base64-encoded private key (`sshkey=`).
    pub ssh_key: Option<String>,
}

/// Git operations handler.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    program: String,
    shallow: bool,
    depth: u32,
}

impl GitFetcher {
    pub fn new(config: &GitConfig) -> Self {
        Self {
            program: config.program.clone(),
            shallow: config.shallow,
            depth: config.depth,
        }
    }

    /// Clone `url` into `dest` and check out the requested reference.
    pub fn clone_repo(&self, url: &str, options: &GitOptions, dest: &Path) -> Result<(), RetrievalError> {
        // Held until the clone finishes; the key file is removed on drop.
        let key_file = options.ssh_key.as_deref().map(write_ssh_key).transpose()?;

        let commit = options.reference.as_deref().filter(|r| looks_like_commit(r));

        let mut cmd = self.command();
        cmd.arg("clone");

        if let Some(depth) = self.clone_depth(options, commit.is_some()) {
            cmd.arg("--depth").arg(depth.to_string());
        }
        if let (Some(reference), None) = (&options.reference, commit) {
            cmd.arg("--branch").arg(reference);
        }
        cmd.arg("--quiet").arg(url).arg(dest);

        if let Some(key) = &key_file {
            cmd.env(
                "GIT_SSH_COMMAND",
                format!(
                    "ssh -i {} -o IdentitiesOnly=yes",
                    key.path().display()
                ),
            );
        }

        debug!(dest = %dest.display(), shallow = self.shallow, "Running git clone");
        run(&mut cmd, "clone")?;

        if let Some(sha) = commit {
            let mut checkout = self.command();
            checkout.current_dir(dest).args(["checkout", "--quiet", sha]);
            run(&mut checkout, "checkout")?;
        }

        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd
    }

    fn clone_depth(&self, options: &GitOptions, full_history: bool) -> Option<u32> {
        if full_history {
            return None;
        }
        match options.depth {
            Some(0) => None,
            Some(depth) => Some(depth),
            None if self.shallow && self.depth > 0 => Some(self.depth),
            None => None,
        }
    }
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self::new(&GitConfig::default())
    }
}

fn run(cmd: &mut Command, op: &str) -> Result<(), RetrievalError> {
    let output = cmd
        .output()
        .map_err(|e| RetrievalError::Git(format!("Failed to run git {}: {}", op, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RetrievalError::Git(format!(
            "git {} failed: {}",
            op,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Decode a base64 private key into a temporary file readable only by the owner.
fn write_ssh_key(encoded: &str) -> Result<tempfile::NamedTempFile, RetrievalError> {
    let key = STANDARD
        .decode(encoded.trim())
        .map_err(|e| RetrievalError::Git(format!("sshkey is not valid base64: {}", e)))?;

    let mut file = tempfile::Builder::new().prefix("locus-sshkey-").tempfile()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(&key)?;
    file.flush()?;
    Ok(file)
}

/// Abbreviated or full hex object names are checked out after a full clone.
fn looks_like_commit(reference: &str) -> bool {
    (7..=40).contains(&reference.len()) && reference.chars().all(|c| c.is_ascii_hexdigit())
}
