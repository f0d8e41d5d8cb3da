//! Language tags and extension detection.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Closed set of language tags a selected file can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
    Cpp,
    C,
    CSharp,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Markdown,
    Yaml,
    Json,
    Toml,
    Env,
    Bash,
    Dockerfile,
    Sql,
    Html,
    Css,
    Text,
}

impl Lang {
    /// Identifier stored in chunk metadata and used in code fences.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Markdown => "markdown",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Env => "env",
            Self::Bash => "bash",
            Self::Dockerfile => "dockerfile",
            Self::Sql => "sql",
            Self::Html => "html",
            Self::Css => "css",
            Self::Text => "text",
        }
    }

    /// Map a lowercase extension (without the dot) to a language.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let lang = match ext {
            "py" => Self::Python,
            "js" | "jsx" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "java" => Self::Java,
            "go" => Self::Go,
            "rs" => Self::Rust,
            "cpp" | "cc" => Self::Cpp,
            "c" | "h" => Self::C,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "kt" => Self::Kotlin,
            "md" => Self::Markdown,
            "yml" | "yaml" => Self::Yaml,
            "json" => Self::Json,
            "toml" => Self::Toml,
            "env" => Self::Env,
            "sh" | "bash" => Self::Bash,
            "dockerfile" => Self::Dockerfile,
            "sql" => Self::Sql,
            "html" => Self::Html,
            "css" => Self::Css,
            "txt" => Self::Text,
            _ => return None,
        };
        Some(lang)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from a file path.
///
/// `Dockerfile` and `Dockerfile.*` are tagged [`Lang::Dockerfile`] whatever
/// their extension; everything else goes through the extension table.
/// Unrecognized files yield `None`.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let name = path.file_name()?.to_str()?;
    if name == "Dockerfile" || name.starts_with("Dockerfile.") {
        return Some(Lang::Dockerfile);
    }
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Lang::from_extension(&ext)
}
