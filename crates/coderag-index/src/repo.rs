//! Repository identifiers and the per-generation summary record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};
use crate::languages::Lang;

const GITHUB_PREFIX: &str = "https://github.com/";

/// A validated `https://github.com/<owner>/<repo>` URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    url: String,
}

impl RepoId {
    /// Parse a repository URL, trimming whitespace and trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::InvalidRepoId` unless the URL is a GitHub URL
    /// naming both an owner and a repository.
    pub fn parse(input: &str) -> Result<Self> {
        let url = input.trim().trim_end_matches('/');
        let invalid = || IndexError::InvalidRepoId(input.trim().to_owned());

        let path = url.strip_prefix(GITHUB_PREFIX).ok_or_else(invalid)?;
        let mut parts = path.split('/');
        let owner = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        if owner.is_empty() || name.is_empty() || url.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        Ok(Self {
            url: url.to_owned(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        self.segments().0
    }

    /// Repository name, without any `.git` suffix.
    #[must_use]
    pub fn name(&self) -> &str {
        let name = self.segments().1;
        name.strip_suffix(".git").unwrap_or(name)
    }

    fn segments(&self) -> (&str, &str) {
        let path = &self.url[GITHUB_PREFIX.len()..];
        let mut parts = path.split('/');
        (
            parts.next().unwrap_or_default(),
            parts.next().unwrap_or_default(),
        )
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// Summary stored next to each generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    /// Source URL or local path the generation was built from.
    pub repo_url: String,
    pub num_files: usize,
    pub num_chunks: usize,
    /// Sorted by identifier.
    pub languages: Vec<Lang>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_and_strips_slash() {
        let id = RepoId::parse("  https://github.com/tokio-rs/axum/ \n").unwrap();
        assert_eq!(id.as_str(), "https://github.com/tokio-rs/axum");
        assert_eq!(id.owner(), "tokio-rs");
        assert_eq!(id.name(), "axum");
        assert_eq!(id.to_string(), "https://github.com/tokio-rs/axum");
    }

    #[test]
    fn parse_git_suffix() {
        let id = RepoId::parse("https://github.com/rust-lang/regex.git").unwrap();
        assert_eq!(id.name(), "regex");
    }

    #[test]
    fn parse_rejects_other_hosts() {
        for bad in [
            "",
            "github.com/owner/repo",
            "http://github.com/owner/repo",
            "https://gitlab.com/owner/repo",
            "https://github.com/",
            "https://github.com/owner",
            "https://github.com/owner/ repo",
        ] {
            assert!(
                matches!(RepoId::parse(bad), Err(IndexError::InvalidRepoId(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn repo_info_json_shape() {
        let info = RepoInfo {
            repo_url: "https://github.com/a/b".into(),
            num_files: 2,
            num_chunks: 3,
            languages: vec![Lang::Markdown, Lang::Python],
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "repo_url": "https://github.com/a/b",
                "num_files": 2,
                "num_chunks": 3,
                "languages": ["markdown", "python"]
            })
        );
    }
}
