//! Repository walk: picks the files worth chunking and tags their language.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IndexError, Result};
use crate::languages::{Lang, detect_language};

/// Directory names never descended into. A leading `*` matches by suffix.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    "vendor",
    "target",
    "out",
    "bin",
    "obj",
    ".idea",
    ".vscode",
    "*.egg-info",
];

/// File name suffixes for binary, generated, and minified artifacts.
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".pdf", ".zip", ".tar", ".gz",
    ".whl", ".lock", ".pyc", ".pyo", ".so", ".dylib", ".dll", ".exe", ".min.js", ".min.css",
    ".map",
];

/// File selection limits and exclusion rules.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Files larger than this are skipped (default: 150 000 bytes).
    pub max_file_bytes: u64,
    /// Walk stops once this many files are selected (default: 500).
    pub max_total_files: usize,
    pub skip_dirs: Vec<String>,
    pub skip_extensions: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 150_000,
            max_total_files: 500,
            skip_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| (*s).to_owned()).collect(),
            skip_extensions: DEFAULT_SKIP_EXTENSIONS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
        }
    }
}

/// A file admitted for chunking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    /// Path relative to the repository root.
    pub rel_path: String,
    pub language: Lang,
}

/// Walk `root` in sorted order and return the files to index.
///
/// Excluded directories are pruned, artifacts and oversized files are
/// dropped, files without a known language are ignored, and the walk stops
/// at `max_total_files`. Unreadable entries are skipped. Directory symlinks
/// are not followed; file symlinks are admitted when their target is a
/// regular file inside `root`.
///
/// # Errors
///
/// Returns `IndexError::RootUnreadable` if `root` does not exist or cannot be listed.
pub fn select_files(root: &Path, config: &SelectorConfig) -> Result<Vec<SelectedFile>> {
    let unreadable = |source| IndexError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    };
    std::fs::read_dir(root).map_err(unreadable)?;
    let canonical_root = root.canonicalize().map_err(unreadable)?;

    let skip_dirs: Arc<[String]> = config.skip_dirs.clone().into();
    let walker = ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            entry.depth() == 0
                || !entry.file_type().is_some_and(|ft| ft.is_dir())
                || !is_skipped_dir(&entry.file_name().to_string_lossy(), &skip_dirs)
        })
        .build();

    let mut selected = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        let is_file = match entry.file_type() {
            Some(ft) if ft.is_file() => true,
            Some(ft) if ft.is_symlink() => links_to_file_inside(path, &canonical_root),
            _ => false,
        };
        if !is_file {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_lowercase();
        if has_skipped_extension(&name, &config.skip_extensions) {
            continue;
        }
        let Some(language) = detect_language(path) else {
            continue;
        };
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() <= config.max_file_bytes => {}
            Ok(meta) => {
                tracing::debug!(file = %path.display(), bytes = meta.len(), "file too large, skipped");
                continue;
            }
            Err(_) => continue,
        }

        let rel_path = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string();
        selected.push(SelectedFile {
            path: path.to_path_buf(),
            rel_path,
            language,
        });

        if selected.len() >= config.max_total_files {
            tracing::warn!(
                cap = config.max_total_files,
                "file cap reached, remaining files ignored"
            );
            break;
        }
    }

    tracing::info!(files = selected.len(), "file selection finished");
    Ok(selected)
}

fn links_to_file_inside(link: &Path, canonical_root: &Path) -> bool {
    match link.canonicalize() {
        Ok(target) => target.starts_with(canonical_root) && target.is_file(),
        Err(e) => {
            tracing::debug!(file = %link.display(), "dangling symlink skipped: {e}");
            false
        }
    }
}

fn is_skipped_dir(name: &str, skip_dirs: &[String]) -> bool {
    skip_dirs.iter().any(|pattern| match pattern.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == pattern,
    })
}

fn has_skipped_extension(lower_name: &str, skip_extensions: &[String]) -> bool {
    skip_extensions.iter().any(|ext| {
        let ext = ext.to_lowercase();
        if ext.starts_with('.') {
            lower_name.ends_with(&ext)
        } else {
            lower_name.ends_with(&format!(".{ext}"))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn rel_paths(files: &[SelectedFile]) -> Vec<&str> {
        files.iter().map(|f| f.rel_path.as_str()).collect()
    }

    #[test]
    fn selects_known_languages_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.py", "x = 1\n");
        write(dir.path(), "src/a.ts", "const a = 1;\n");
        write(dir.path(), "README.md", "# hi\n");
        write(dir.path(), "Makefile", "all:\n");

        let files = select_files(dir.path(), &SelectorConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["README.md", "src/a.ts", "src/b.py"]);
        assert_eq!(files[0].language, Lang::Markdown);
        assert_eq!(files[2].language, Lang::Python);
    }

    #[test]
    fn prunes_excluded_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/index.js", "module.exports = 1;\n");
        write(dir.path(), ".git/config.toml", "[core]\n");
        write(dir.path(), "pkg.egg-info/PKG-INFO.txt", "meta\n");
        write(dir.path(), "app/target/gen.rs", "fn x() {}\n");
        write(dir.path(), "app/main.rs", "fn main() {}\n");

        let files = select_files(dir.path(), &SelectorConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["app/main.rs"]);
    }

    #[test]
    fn skips_artifacts_and_minified_assets() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "logo.png", "not really a png");
        write(dir.path(), "static/app.min.js", "var a=1;");
        write(dir.path(), "static/site.MIN.CSS", "a{}");
        write(dir.path(), "static/app.js", "function a() {}\n");

        let files = select_files(dir.path(), &SelectorConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["static/app.js"]);
    }

    #[test]
    fn skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "big.txt", &"a".repeat(200));
        write(dir.path(), "small.txt", "a");

        let config = SelectorConfig {
            max_file_bytes: 100,
            ..SelectorConfig::default()
        };
        let files = select_files(dir.path(), &config).unwrap();
        assert_eq!(rel_paths(&files), vec!["small.txt"]);
    }

    #[test]
    fn dockerfiles_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "Dockerfile", "FROM rust\n");
        write(dir.path(), "deploy/Dockerfile.prod", "FROM alpine\n");

        let files = select_files(dir.path(), &SelectorConfig::default()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.language == Lang::Dockerfile));
    }

    #[test]
    fn stops_at_file_cap() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            write(dir.path(), &format!("f{i}.txt"), "x");
        }
        let config = SelectorConfig {
            max_total_files: 3,
            ..SelectorConfig::default()
        };
        let files = select_files(dir.path(), &config).unwrap();
        assert_eq!(rel_paths(&files), vec!["f0.txt", "f1.txt", "f2.txt"]);
    }

    #[test]
    fn root_named_like_skip_dir_is_still_walked() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("build");
        write(&root, "main.go", "package main\n");

        let files = select_files(&root, &SelectorConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["main.go"]);
    }

    #[cfg(unix)]
    #[test]
    fn file_symlinks_inside_root_are_selected() {
        use std::os::unix::fs::symlink;

        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.py", "token = 1\n");
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "lib/util.py", "def f():\n    pass\n");
        symlink(dir.path().join("lib/util.py"), dir.path().join("alias.py")).unwrap();
        symlink(outside.path().join("secret.py"), dir.path().join("leak.py")).unwrap();
        symlink(dir.path().join("missing.py"), dir.path().join("dangling.py")).unwrap();
        symlink(dir.path().join("lib"), dir.path().join("lib_link")).unwrap();

        let files = select_files(dir.path(), &SelectorConfig::default()).unwrap();
        assert_eq!(rel_paths(&files), vec!["alias.py", "lib/util.py"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = select_files(&dir.path().join("nope"), &SelectorConfig::default()).unwrap_err();
        assert!(matches!(err, IndexError::RootUnreadable { .. }));
    }

    #[test]
    fn skip_extension_without_dot() {
        assert!(has_skipped_extension("data.bin", &["bin".to_owned()]));
        assert!(!has_skipped_extension("cabin", &["bin".to_owned()]));
    }

    #[test]
    fn skip_dir_suffix_pattern() {
        let dirs = vec!["*.egg-info".to_owned(), "dist".to_owned()];
        assert!(is_skipped_dir("mypkg.egg-info", &dirs));
        assert!(is_skipped_dir("dist", &dirs));
        assert!(!is_skipped_dir("distro", &dirs));
    }

    mod proptest_selection {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            #[test]
            fn never_exceeds_cap_or_enters_skip_dirs(
                names in proptest::collection::vec("[a-c]{1,3}", 1..12),
                cap in 1usize..6,
            ) {
                let dir = tempfile::tempdir().unwrap();
                for (i, name) in names.iter().enumerate() {
                    write(dir.path(), &format!("{name}/f{i}.py"), "x = 1\n");
                    write(dir.path(), &format!("vendor/{name}/f{i}.py"), "x = 1\n");
                }
                let config = SelectorConfig {
                    max_total_files: cap,
                    ..SelectorConfig::default()
                };
                let files = select_files(dir.path(), &config).unwrap();
                prop_assert!(files.len() <= cap);
                for f in &files {
                    prop_assert!(!f.rel_path.split('/').any(|part| part == "vendor"));
                }
            }
        }
    }
}
