//! Splits file text into chunks: structural units where a detector exists,
//! overlapping line-snapped windows everywhere else.

use serde::{Deserialize, Serialize};

use crate::languages::Lang;
use crate::units::{UnitBoundary, detector_for};

/// What a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    /// Sliding-window slice; no structural unit was found.
    File,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::File => "file",
        }
    }
}

/// One retrievable span of a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub filepath: String,
    pub language: Lang,
    pub chunk_type: ChunkKind,
    pub symbol_name: String,
    /// 1-based line the chunk starts on.
    pub start_line: usize,
}

/// Sliding-window configuration.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Window length in characters (default: 1200).
    pub window_size: usize,
    /// Characters shared by consecutive windows (default: 200).
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window_size: 1200,
            overlap: 200,
        }
    }
}

impl ChunkerConfig {
    /// Distance between consecutive window starts, never zero.
    #[must_use]
    pub fn step(&self) -> usize {
        self.window_size.saturating_sub(self.overlap).max(1)
    }
}

/// Byte offsets of line starts, for offset to line lookups.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.match_indices('\n')
                .map(|(i, _)| i + 1)
                .filter(|&s| s < text.len()),
        );
        Self { starts }
    }

    /// 1-based line of the nearest line start at or before `offset`.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset).max(1)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

/// Chunk one file.
///
/// Languages with a unit detector are split at each detected definition,
/// each chunk running to the next definition or end of file. Text before the
/// first definition is not emitted. When no definition is found, or every
/// unit is blank, the sliding window is used instead, so non-blank input
/// always yields at least one chunk.
#[must_use]
pub fn chunk_file(source: &str, filepath: &str, lang: Lang, config: &ChunkerConfig) -> Vec<Chunk> {
    if source.trim().is_empty() {
        return Vec::new();
    }

    if let Some(detector) = detector_for(lang) {
        let units = detector.detect_units(source);
        let chunks = structural_chunks(source, filepath, lang, &units);
        if !chunks.is_empty() {
            return chunks;
        }
    }

    sliding_window(source, filepath, lang, config)
}

fn structural_chunks(
    source: &str,
    filepath: &str,
    lang: Lang,
    units: &[UnitBoundary],
) -> Vec<Chunk> {
    let lines = LineIndex::new(source);
    let mut chunks = Vec::with_capacity(units.len());

    for (i, unit) in units.iter().enumerate() {
        let end = units.get(i + 1).map_or(source.len(), |next| next.offset);
        let block = source[unit.offset..end].trim_end();
        if block.trim().is_empty() {
            continue;
        }
        chunks.push(Chunk {
            content: block.to_owned(),
            filepath: filepath.to_owned(),
            language: lang,
            chunk_type: unit.kind,
            symbol_name: unit.symbol.clone(),
            start_line: lines.line_of(unit.offset),
        });
    }

    chunks
}

/// Overlapping fixed-size windows over `source`, measured in characters.
///
/// A window that ends inside the text is pulled back to the last newline it
/// contains, unless that would leave more than `overlap` characters between
/// its end and the next window's start or leave the window blank. The last
/// window always reaches the end of the text.
#[must_use]
pub fn sliding_window(source: &str, filepath: &str, lang: Lang, config: &ChunkerConfig) -> Vec<Chunk> {
    let lines = LineIndex::new(source);
    window_spans(source, config)
        .into_iter()
        .filter_map(|(start, end)| {
            let block = source[start..end].trim();
            (!block.is_empty()).then(|| Chunk {
                content: block.to_owned(),
                filepath: filepath.to_owned(),
                language: lang,
                chunk_type: ChunkKind::File,
                symbol_name: String::new(),
                start_line: lines.line_of(start),
            })
        })
        .collect()
}

/// Untrimmed byte ranges of every window, in order.
fn window_spans(source: &str, config: &ChunkerConfig) -> Vec<(usize, usize)> {
    // bounds[i] is the byte offset of char i; bounds[n] == source.len()
    let bounds: Vec<usize> = source
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(source.len()))
        .collect();
    let n = bounds.len() - 1;
    let window = config.window_size.max(1);
    let step = config.step().min(window);

    let mut spans = Vec::with_capacity(n / step + 1);
    let mut start = 0;
    while start < n {
        let start_byte = bounds[start];
        let mut end_byte = bounds[(start + window).min(n)];
        if start + window < n {
            // gap to the next start stays within the effective overlap
            let earliest = bounds[(start + 2 * step).saturating_sub(window).max(start + 1)];
            if let Some(nl) = source[start_byte..end_byte].rfind('\n')
                && start_byte + nl >= earliest
                && !source[start_byte..start_byte + nl].trim().is_empty()
            {
                end_byte = start_byte + nl;
            }
        }
        spans.push((start_byte, end_byte));
        start += step;
    }
    spans
}
