//! Regex-based detection of top-level definitions.
//!
//! This is a heuristic stand-in for a parser: markers are matched only at
//! the start of a line, so strings and comments are not understood and
//! nested definitions stay inside their enclosing unit. A real parser can
//! replace it per language by implementing [`UnitDetector`].

use std::sync::LazyLock;

use regex::Regex;

use crate::chunker::ChunkKind;
use crate::languages::Lang;

/// Start of one structural unit inside a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitBoundary {
    /// Byte offset of the unit's first character.
    pub offset: usize,
    pub kind: ChunkKind,
    /// Identifier after the marker keyword, empty when none was found.
    pub symbol: String,
}

/// Finds the top-level named units of a source text.
pub trait UnitDetector: Send + Sync {
    /// Return unit starts in strictly increasing offset order.
    fn detect_units(&self, text: &str) -> Vec<UnitBoundary>;
}

static PYTHON_UNIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(?:def |class )").unwrap());
static PYTHON_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:def |class )(\w+)").unwrap());

static JS_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^(?:export\s+)?(?:async\s+)?(?:function\s+\w+|class\s+\w+|const\s+\w+\s*=\s*(?:async\s+)?\()",
    )
    .unwrap()
});
static JS_SYMBOL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:function|class|const)\s+(\w+)").unwrap());

/// Column-zero `def` and `class` statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonDetector;

impl UnitDetector for PythonDetector {
    fn detect_units(&self, text: &str) -> Vec<UnitBoundary> {
        PYTHON_UNIT
            .find_iter(text)
            .map(|m| {
                let line = first_line(&text[m.start()..]);
                let kind = if line.starts_with("def ") {
                    ChunkKind::Function
                } else {
                    ChunkKind::Class
                };
                UnitBoundary {
                    offset: m.start(),
                    kind,
                    symbol: capture_symbol(&PYTHON_SYMBOL, line),
                }
            })
            .collect()
    }
}

/// Line-start function, class, and `const x = (` arrow definitions,
/// optionally behind `export` and `async`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptDetector;

impl UnitDetector for ScriptDetector {
    fn detect_units(&self, text: &str) -> Vec<UnitBoundary> {
        JS_UNIT
            .find_iter(text)
            .map(|m| {
                let line = first_line(&text[m.start()..]);
                let kind = if line.contains("class ") {
                    ChunkKind::Class
                } else {
                    ChunkKind::Function
                };
                UnitBoundary {
                    offset: m.start(),
                    kind,
                    symbol: capture_symbol(&JS_SYMBOL, line),
                }
            })
            .collect()
    }
}

static PYTHON: PythonDetector = PythonDetector;
static SCRIPT: ScriptDetector = ScriptDetector;

/// Structural detector for `lang`, or `None` when only the sliding window applies.
#[must_use]
pub fn detector_for(lang: Lang) -> Option<&'static dyn UnitDetector> {
    match lang {
        Lang::Python => Some(&PYTHON),
        Lang::JavaScript | Lang::TypeScript => Some(&SCRIPT),
        _ => None,
    }
}

fn first_line(text: &str) -> &str {
    text.split('\n').next().unwrap_or_default()
}

fn capture_symbol(re: &Regex, line: &str) -> String {
    re.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
        .unwrap_or_default()
}
