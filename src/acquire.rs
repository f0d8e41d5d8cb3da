//! Repository acquisition: shallow clone of a GitHub URL into a scratch directory.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, bail};
use coderag_index::repo::RepoId;
use tokio::process::Command;

pub const CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Where the index command reads files from.
#[derive(Debug)]
pub enum Source {
    Remote(RepoId),
    Local(PathBuf),
}

impl Source {
    /// URLs are validated as GitHub repositories, anything else is a local path.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed repository URL.
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let trimmed = input.trim();
        if trimmed.contains("://") {
            Ok(Self::Remote(RepoId::parse(trimmed)?))
        } else {
            Ok(Self::Local(PathBuf::from(trimmed)))
        }
    }

    /// Identifier stored with the generation.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Remote(id) => id.to_string(),
            Self::Local(path) => path.display().to_string(),
        }
    }
}

/// Clone `repo` with `--depth=1` into `dest`, replacing whatever is there.
///
/// # Errors
///
/// Returns an error if git cannot be started, exits non-zero, or runs past
/// `timeout`.
pub async fn shallow_clone(repo: &RepoId, dest: &Path, timeout: Duration) -> anyhow::Result<()> {
    remove_dir_if_present(dest).await?;
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    tracing::info!(repo = %repo, dest = %dest.display(), "cloning repository");
    let child = Command::new("git")
        .arg("clone")
        .arg("--depth=1")
        .arg(repo.as_str())
        .arg(dest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let Ok(output) = tokio::time::timeout(timeout, child).await else {
        bail!("git clone timed out after {}s", timeout.as_secs());
    };
    let output = output.context("failed to run git")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }
    Ok(())
}

/// Delete `dir` recursively; a missing directory is not an error.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be removed.
pub async fn remove_dir_if_present(dir: &Path) -> anyhow::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_remote() {
        let source = Source::parse(" https://github.com/psf/requests/ ").unwrap();
        assert!(matches!(source, Source::Remote(_)));
        assert_eq!(source.label(), "https://github.com/psf/requests");
    }

    #[test]
    fn bad_url_rejected() {
        assert!(Source::parse("https://gitlab.com/a/b").is_err());
    }

    #[test]
    fn plain_path_is_local() {
        let source = Source::parse("./my-project").unwrap();
        assert!(matches!(source, Source::Local(ref p) if p == Path::new("./my-project")));
        assert_eq!(source.label(), "./my-project");
    }

    #[tokio::test]
    async fn removing_missing_dir_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("absent");
        remove_dir_if_present(&target).await.unwrap();

        std::fs::create_dir_all(target.join("nested")).unwrap();
        remove_dir_if_present(&target).await.unwrap();
        assert!(!target.exists());
    }
}
