use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{RadarError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs the `git` binary against one repository. Every call is read-only.
#[derive(Debug, Clone)]
pub struct GitRunner {
    git_binary: String,
}

impl Default for GitRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitRunner {
    pub fn new(git_binary: impl Into<String>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }

    pub fn git_binary(&self) -> &str {
        &self.git_binary
    }

    pub fn validate_repo(&self, repo_path: &Path) -> Result<()> {
        if !repo_path.exists() || !repo_path.is_dir() {
            return Err(RadarError::InvalidRepository(repo_path.to_path_buf()));
        }
        let out = self.exec(repo_path, &["rev-parse", "--is-inside-work-tree"], true)?;
        if out.stdout.trim() == "true" {
            return Ok(());
        }
        Err(RadarError::InvalidRepository(repo_path.to_path_buf()))
    }

    pub fn exec<S: AsRef<str>>(
        &self,
        repo_path: &Path,
        args: &[S],
        allow_non_zero: bool,
    ) -> Result<GitOutput> {
        let mut cmd = Command::new(&self.git_binary);
        cmd.current_dir(repo_path)
            .args(args.iter().map(AsRef::as_ref))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // never refresh the index as a side effect of a query
            .env("GIT_OPTIONAL_LOCKS", "0");

        let output = cmd.output().map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                RadarError::BackendUnavailable(format!(
                    "git binary {:?} not found",
                    self.git_binary
                ))
            } else {
                RadarError::io("running git command", source)
            }
        })?;
        let result = GitOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        };
        if output.status.success() || allow_non_zero {
            return Ok(result);
        }
        Err(RadarError::GitCommandFailed {
            program: self.git_binary.clone(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            exit_code: result.exit_code,
            stderr: result.stderr,
        })
    }

    pub fn discover_repo_root(&self, start_path: &Path) -> Result<PathBuf> {
        let out = self
            .exec(start_path, &["rev-parse", "--show-toplevel"], false)
            .map_err(|err| match err {
                RadarError::GitCommandFailed { .. } => {
                    RadarError::InvalidRepository(start_path.to_path_buf())
                }
                other => other,
            })?;
        let root = out.stdout.trim();
        if root.is_empty() {
            return Err(RadarError::InvalidRepository(start_path.to_path_buf()));
        }
        Ok(PathBuf::from(root))
    }
}
