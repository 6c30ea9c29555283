//! Version-control backend. The orchestrator only sees [`VersionControl`];
//! [`GitCli`] drives the `git` binary.

use crate::error::{MkcdError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

const FALLBACK_NAME: &str = "mkcd user";
const FALLBACK_EMAIL: &str = "user@example.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Abbreviated hash of the new commit.
    Committed(String),
    NothingToCommit,
}

pub trait VersionControl {
    fn is_repository(&self, path: &Path) -> bool;

    /// Initialize a repository whose first branch is `branch`.
    fn init(&self, path: &Path, branch: &str) -> Result<Presence>;

    /// The URL configured for `name`, if the remote exists.
    fn remote_url(&self, path: &Path, name: &str) -> Result<Option<String>>;

    fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<Presence>;

    /// Stage everything and commit. A clean tree is not an error.
    fn commit_all(&self, path: &Path, message: &str) -> Result<CommitOutcome>;
}

// ---------------------------------------------------------------------------
// GitCli
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GitCli {
    user_name: String,
    user_email: String,
}

impl GitCli {
    /// Empty identity fields fall back to git's own config, then to a fixed
    /// placeholder identity.
    pub fn new(user_name: impl Into<String>, user_email: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            user_email: user_email.into(),
        }
    }

    pub fn available() -> bool {
        which::which("git").is_ok()
    }

    fn binary(&self) -> Result<PathBuf> {
        which::which("git").map_err(|_| MkcdError::Vcs {
            command: "lookup".to_string(),
            path: PathBuf::from("git"),
            message: "git executable not found on PATH".to_string(),
        })
    }

    fn run(&self, path: &Path, args: &[&str]) -> Result<String> {
        let git = self.binary()?;
        tracing::debug!(cwd = %path.display(), args = ?args, "running git");
        let output = Command::new(&git)
            .args(args)
            .current_dir(path)
            .output()
            .map_err(|e| MkcdError::Vcs {
                command: args.join(" "),
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MkcdError::Vcs {
                command: args.join(" "),
                path: path.to_path_buf(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn identity(&self, path: &Path) -> (String, String) {
        let pick = |configured: &str, key: &str, fallback: &str| -> String {
            if !configured.is_empty() {
                return configured.to_string();
            }
            match self.run(path, &["config", "--get", key]) {
                Ok(v) if !v.is_empty() => v,
                _ => fallback.to_string(),
            }
        };
        (
            pick(&self.user_name, "user.name", FALLBACK_NAME),
            pick(&self.user_email, "user.email", FALLBACK_EMAIL),
        )
    }
}

impl VersionControl for GitCli {
    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn init(&self, path: &Path, branch: &str) -> Result<Presence> {
        if self.is_repository(path) {
            return Ok(Presence::AlreadyPresent);
        }
        self.run(path, &["init", "--quiet"])?;
        let head = format!("refs/heads/{branch}");
        self.run(path, &["symbolic-ref", "HEAD", &head])?;
        Ok(Presence::Created)
    }

    fn remote_url(&self, path: &Path, name: &str) -> Result<Option<String>> {
        let remotes = self.run(path, &["remote"])?;
        if !remotes.lines().any(|r| r.trim() == name) {
            return Ok(None);
        }
        self.run(path, &["remote", "get-url", name]).map(Some)
    }

    fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<Presence> {
        match self.remote_url(path, name)? {
            Some(existing) if existing == url => Ok(Presence::AlreadyPresent),
            Some(existing) => Err(MkcdError::Conflict(format!(
                "remote '{name}' already points at {existing}"
            ))),
            None => {
                self.run(path, &["remote", "add", name, url])?;
                Ok(Presence::Created)
            }
        }
    }

    fn commit_all(&self, path: &Path, message: &str) -> Result<CommitOutcome> {
        self.run(path, &["add", "-A"])?;
        if self.run(path, &["status", "--porcelain"])?.is_empty() {
            return Ok(CommitOutcome::NothingToCommit);
        }
        let (name, email) = self.identity(path);
        let name_cfg = format!("user.name={name}");
        let email_cfg = format!("user.email={email}");
        self.run(
            path,
            &[
                "-c",
                &name_cfg,
                "-c",
                &email_cfg,
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "-m",
                message,
            ],
        )?;
        let hash = self.run(path, &["rev-parse", "--short", "HEAD"])?;
        Ok(CommitOutcome::Committed(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git() -> Option<GitCli> {
        GitCli::available().then(|| GitCli::new("Test User", "test@example.com"))
    }

    #[test]
    fn init_sets_branch_and_is_idempotent() {
        let Some(git) = git() else { return };
        let dir = TempDir::new().unwrap();
        assert!(!git.is_repository(dir.path()));
        assert_eq!(git.init(dir.path(), "trunk").unwrap(), Presence::Created);
        assert!(git.is_repository(dir.path()));
        assert_eq!(
            git.run(dir.path(), &["symbolic-ref", "HEAD"]).unwrap(),
            "refs/heads/trunk"
        );
        assert_eq!(
            git.init(dir.path(), "trunk").unwrap(),
            Presence::AlreadyPresent
        );
    }

    #[test]
    fn commit_skips_clean_tree() {
        let Some(git) = git() else { return };
        let dir = TempDir::new().unwrap();
        git.init(dir.path(), "main").unwrap();
        assert_eq!(
            git.commit_all(dir.path(), "Initial commit").unwrap(),
            CommitOutcome::NothingToCommit
        );
        std::fs::write(dir.path().join("README.md"), "# x\n").unwrap();
        assert!(matches!(
            git.commit_all(dir.path(), "Initial commit").unwrap(),
            CommitOutcome::Committed(_)
        ));
        assert_eq!(
            git.commit_all(dir.path(), "again").unwrap(),
            CommitOutcome::NothingToCommit
        );
    }

    #[test]
    fn remote_add_detects_existing() {
        let Some(git) = git() else { return };
        let dir = TempDir::new().unwrap();
        git.init(dir.path(), "main").unwrap();
        let url = "https://example.com/me/proj.git";
        assert_eq!(
            git.add_remote(dir.path(), "origin", url).unwrap(),
            Presence::Created
        );
        assert_eq!(
            git.add_remote(dir.path(), "origin", url).unwrap(),
            Presence::AlreadyPresent
        );
        assert!(matches!(
            git.add_remote(dir.path(), "origin", "git@example.com:other.git"),
            Err(MkcdError::Conflict(_))
        ));
    }

    #[test]
    fn failing_command_reports_path() {
        let Some(git) = git() else { return };
        let dir = TempDir::new().unwrap();
        let err = git.remote_url(dir.path(), "origin").unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("git remote failed in"), "{text}");
    }
}
