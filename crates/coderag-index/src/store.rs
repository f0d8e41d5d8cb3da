//! On-disk index generations: vectors, chunk metadata, and repo summary.
//!
//! Layout under the store directory:
//!
//! - `vectors.bin`: magic `CRAGVEC1`, `u32` LE dimension, `u64` LE count,
//!   then `count * dimension` LE `f32` values, row-major.
//! - `metadata.json`: chunk records in row order.
//! - `repo_info.json`: [`RepoInfo`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};
use crate::repo::RepoInfo;
use crate::retriever::RetrievedChunk;
use crate::vector::{VectorIndex, round_score};

const MAGIC: &[u8; 8] = b"CRAGVEC1";
const HEADER_LEN: usize = 8 + 4 + 8;

const VECTORS_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.json";
const REPO_INFO_FILE: &str = "repo_info.json";

/// One complete, aligned index build: `metadata[i]` describes row `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    index: VectorIndex,
    metadata: Vec<Chunk>,
    repo_info: RepoInfo,
}

impl Generation {
    /// # Errors
    ///
    /// Returns `IndexError::Corrupt` if the metadata and vector counts differ.
    pub fn new(index: VectorIndex, metadata: Vec<Chunk>, repo_info: RepoInfo) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(IndexError::Corrupt(format!(
                "{} metadata records for {} vectors",
                metadata.len(),
                index.len()
            )));
        }
        Ok(Self {
            index,
            metadata,
            repo_info,
        })
    }

    #[must_use]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[must_use]
    pub fn metadata(&self) -> &[Chunk] {
        &self.metadata
    }

    #[must_use]
    pub fn repo_info(&self) -> &RepoInfo {
        &self.repo_info
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }

    /// Top-`k` chunks by cosine similarity to `query`, with rounded scores
    /// and content lengths attached.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::DimensionMismatch` if `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let hits = self.index.search(query, k)?;
        Ok(hits
            .into_iter()
            .filter_map(|(row, score)| {
                let chunk = self.metadata.get(row)?;
                Some(RetrievedChunk {
                    content: chunk.content.clone(),
                    filepath: chunk.filepath.clone(),
                    language: chunk.language,
                    chunk_type: chunk.chunk_type,
                    symbol_name: chunk.symbol_name.clone(),
                    start_line: chunk.start_line,
                    similarity_score: round_score(score),
                    chunk_length: chunk.content.chars().count(),
                })
            })
            .collect())
    }
}

/// Directory holding the current generation.
#[derive(Debug, Clone)]
pub struct GenerationStore {
    dir: PathBuf,
}

impl GenerationStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a generation appears to be present.
    #[must_use]
    pub fn exists(&self) -> bool {
        [VECTORS_FILE, METADATA_FILE, REPO_INFO_FILE]
            .iter()
            .all(|f| self.dir.join(f).is_file())
    }

    /// Replace the stored generation with `generation`.
    ///
    /// All three artifacts are written to a staging directory first and
    /// swapped in afterwards, so a failed write leaves the previous
    /// generation as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem operation fails.
    pub async fn persist(&self, generation: &Generation) -> Result<()> {
        let staging = self.sibling("staging");
        let backup = self.sibling("old");

        if let Some(parent) = self.dir.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        remove_dir_if_present(&staging).await?;
        tokio::fs::create_dir_all(&staging).await?;

        if let Err(e) = write_artifacts(&staging, generation).await {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }

        remove_dir_if_present(&backup).await?;
        let had_previous = tokio::fs::try_exists(&self.dir).await?;
        if had_previous {
            tokio::fs::rename(&self.dir, &backup).await?;
        }
        if let Err(e) = tokio::fs::rename(&staging, &self.dir).await {
            if had_previous {
                let _ = tokio::fs::rename(&backup, &self.dir).await;
            }
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e.into());
        }
        if had_previous {
            let _ = tokio::fs::remove_dir_all(&backup).await;
        }

        tracing::info!(
            dir = %self.dir.display(),
            vectors = generation.len(),
            "saved index generation"
        );
        Ok(())
    }

    /// Read the stored generation back.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::NotFound` if any artifact is missing,
    /// `IndexError::Corrupt` if the vector file or record counts are
    /// inconsistent, and `IndexError::Json` if a JSON artifact does not parse.
    pub async fn load(&self) -> Result<Generation> {
        let vectors = self.read_artifact(VECTORS_FILE).await?;
        let metadata = self.read_artifact(METADATA_FILE).await?;
        let repo_info = self.read_artifact(REPO_INFO_FILE).await?;

        let index = decode_vectors(&vectors)?;
        let metadata: Vec<Chunk> = serde_json::from_slice(&metadata)?;
        let repo_info: RepoInfo = serde_json::from_slice(&repo_info)?;

        let generation = Generation::new(index, metadata, repo_info)?;
        tracing::debug!(vectors = generation.len(), "loaded index generation");
        Ok(generation)
    }

    /// Summary of the stored generation, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if `repo_info.json` exists but cannot be read or parsed.
    pub async fn repo_info(&self) -> Result<Option<RepoInfo>> {
        match tokio::fs::read(self.dir.join(REPO_INFO_FILE)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Number of stored vectors, read from the vector file header. Zero when absent.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Corrupt` if the header is malformed.
    pub async fn index_size(&self) -> Result<usize> {
        let mut file = match tokio::fs::File::open(self.dir.join(VECTORS_FILE)).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut header = [0u8; HEADER_LEN];
        match file.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(IndexError::Corrupt("vector file header truncated".into()));
            }
            Err(e) => return Err(e.into()),
        }
        let (_, count) = decode_header(&header)?;
        Ok(count)
    }

    async fn read_artifact(&self, name: &str) -> Result<Vec<u8>> {
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(IndexError::NotFound(self.dir.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let name = self
            .dir
            .file_name()
            .map_or_else(|| "index".to_owned(), |n| n.to_string_lossy().into_owned());
        self.dir.with_file_name(format!(".{name}.{suffix}"))
    }
}

async fn write_artifacts(dir: &Path, generation: &Generation) -> Result<()> {
    tokio::fs::write(dir.join(VECTORS_FILE), encode_vectors(&generation.index)?).await?;
    tokio::fs::write(
        dir.join(METADATA_FILE),
        serde_json::to_vec_pretty(&generation.metadata)?,
    )
    .await?;
    tokio::fs::write(
        dir.join(REPO_INFO_FILE),
        serde_json::to_vec_pretty(&generation.repo_info)?,
    )
    .await?;
    Ok(())
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn encode_vectors(index: &VectorIndex) -> Result<Vec<u8>> {
    let dim = u32::try_from(index.dimension())
        .map_err(|_| IndexError::Corrupt("dimension does not fit in u32".into()))?;
    let count = index.len() as u64;
    let data = index.as_slice();

    let mut buf = Vec::with_capacity(HEADER_LEN + data.len() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&dim.to_le_bytes());
    buf.extend_from_slice(&count.to_le_bytes());
    for x in data {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    Ok(buf)
}

fn decode_header(bytes: &[u8]) -> Result<(usize, usize)> {
    if bytes.len() < HEADER_LEN {
        return Err(IndexError::Corrupt("vector file header truncated".into()));
    }
    if &bytes[..8] != MAGIC {
        return Err(IndexError::Corrupt("vector file has bad magic".into()));
    }
    let dim = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let count = u64::from_le_bytes([
        bytes[12], bytes[13], bytes[14], bytes[15], bytes[16], bytes[17], bytes[18], bytes[19],
    ]);
    let dim = usize::try_from(dim).map_err(|_| IndexError::Corrupt("dimension too large".into()))?;
    let count =
        usize::try_from(count).map_err(|_| IndexError::Corrupt("vector count too large".into()))?;
    if dim == 0 && count > 0 {
        return Err(IndexError::Corrupt(format!(
            "{count} vectors of dimension 0"
        )));
    }
    Ok((dim, count))
}

fn decode_vectors(bytes: &[u8]) -> Result<VectorIndex> {
    let (dim, count) = decode_header(bytes)?;
    let payload = &bytes[HEADER_LEN..];
    let expected = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IndexError::Corrupt("vector payload size overflows".into()))?;
    if payload.len() != expected {
        return Err(IndexError::Corrupt(format!(
            "vector payload is {} bytes, expected {expected}",
            payload.len()
        )));
    }
    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    VectorIndex::from_raw(dim, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkKind;
    use crate::languages::Lang;

    fn chunk(i: usize) -> Chunk {
        Chunk {
            content: format!("def f{i}():\n    return {i}"),
            filepath: format!("mod{i}.py"),
            language: Lang::Python,
            chunk_type: ChunkKind::Function,
            symbol_name: format!("f{i}"),
            start_line: i + 1,
        }
    }

    fn sample_generation() -> Generation {
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.3, 0.9, 0.1],
            vec![-0.5, 0.2, 0.8],
            vec![0.7, 0.7, 0.0],
        ];
        let metadata: Vec<Chunk> = (0..vectors.len()).map(chunk).collect();
        let info = RepoInfo {
            repo_url: "https://github.com/acme/widgets".into(),
            num_files: 4,
            num_chunks: 4,
            languages: vec![Lang::Python],
        };
        Generation::new(VectorIndex::build(vectors).unwrap(), metadata, info).unwrap()
    }

    #[test]
    fn generation_rejects_misaligned_metadata() {
        let index = VectorIndex::build(vec![vec![1.0]]).unwrap();
        let info = sample_generation().repo_info().clone();
        let err = Generation::new(index, vec![chunk(0), chunk(1)], info).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    #[test]
    fn search_attaches_score_and_length() {
        let generation = sample_generation();
        let results = generation.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].symbol_name, "f0");
        assert!((results[0].similarity_score - 1.0).abs() < 1e-6);
        assert_eq!(results[0].chunk_length, results[0].content.chars().count());
        assert_eq!(results[1].symbol_name, "f3");
    }

    #[tokio::test]
    async fn round_trip_preserves_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        let generation = sample_generation();
        store.persist(&generation).await.unwrap();
        assert!(store.exists());

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, generation);
        for query in [[1.0_f32, 0.0, 0.0], [0.1, -0.4, 0.9], [0.0, 0.0, 0.0]] {
            assert_eq!(
                loaded.search(&query, 10).unwrap(),
                generation.search(&query, 10).unwrap()
            );
        }
        assert_eq!(store.index_size().await.unwrap(), 4);
        assert_eq!(
            store.repo_info().await.unwrap().unwrap().repo_url,
            "https://github.com/acme/widgets"
        );
    }

    #[tokio::test]
    async fn empty_generation_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vs"));
        let info = RepoInfo {
            repo_url: String::new(),
            num_files: 0,
            num_chunks: 0,
            languages: Vec::new(),
        };
        let generation = Generation::new(VectorIndex::default(), Vec::new(), info).unwrap();
        store.persist(&generation).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.search(&[1.0, 2.0], 6).unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_store_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        assert!(!store.exists());
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
        assert!(err.is_missing_index());
        assert_eq!(store.index_size().await.unwrap(), 0);
        assert!(store.repo_info().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_magic_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        store.persist(&sample_generation()).await.unwrap();

        let path = store.dir().join(VECTORS_FILE);
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] = b'X';
        std::fs::write(&path, bytes).unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)), "{err}");
        assert!(!err.is_missing_index());
    }

    #[tokio::test]
    async fn truncated_payload_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        store.persist(&sample_generation()).await.unwrap();

        let path = store.dir().join(VECTORS_FILE);
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        assert!(matches!(
            store.load().await.unwrap_err(),
            IndexError::Corrupt(_)
        ));
    }

    #[tokio::test]
    async fn unparsable_metadata_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        store.persist(&sample_generation()).await.unwrap();
        std::fs::write(store.dir().join(METADATA_FILE), b"[{").unwrap();

        assert!(matches!(store.load().await.unwrap_err(), IndexError::Json(_)));
    }

    #[tokio::test]
    async fn metadata_count_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        store.persist(&sample_generation()).await.unwrap();
        let short = serde_json::to_vec(&vec![chunk(0)]).unwrap();
        std::fs::write(store.dir().join(METADATA_FILE), short).unwrap();

        assert!(matches!(
            store.load().await.unwrap_err(),
            IndexError::Corrupt(_)
        ));
    }

    #[tokio::test]
    async fn persist_replaces_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        store.persist(&sample_generation()).await.unwrap();

        let info = RepoInfo {
            repo_url: "https://github.com/acme/other".into(),
            num_files: 1,
            num_chunks: 1,
            languages: vec![Lang::Python],
        };
        let next = Generation::new(
            VectorIndex::build(vec![vec![0.0, 1.0]]).unwrap(),
            vec![chunk(9)],
            info,
        )
        .unwrap();
        store.persist(&next).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, next);
        assert_eq!(store.index_size().await.unwrap(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(leftovers, vec!["vectorstore".to_owned()]);
    }

    #[tokio::test]
    async fn failed_persist_keeps_previous_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = GenerationStore::new(dir.path().join("vectorstore"));
        let original = sample_generation();
        store.persist(&original).await.unwrap();

        // a plain file where the staging directory goes makes the write fail
        std::fs::write(dir.path().join(".vectorstore.staging"), b"blocker").unwrap();
        let next = Generation::new(
            VectorIndex::build(vec![vec![0.0, 1.0]]).unwrap(),
            vec![chunk(9)],
            original.repo_info().clone(),
        )
        .unwrap();
        assert!(store.persist(&next).await.is_err());

        assert_eq!(store.load().await.unwrap(), original);
    }

    #[test]
    fn header_round_trip() {
        let index = VectorIndex::build(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        let bytes = encode_vectors(&index).unwrap();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(decode_header(&bytes).unwrap(), (2, 2));
        assert_eq!(decode_vectors(&bytes).unwrap(), index);
    }

    #[test]
    fn short_header_is_corrupt() {
        assert!(matches!(
            decode_header(b"CRAGVEC1\x01"),
            Err(IndexError::Corrupt(_))
        ));
    }
}
