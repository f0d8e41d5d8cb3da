//! Repository chunking, vector indexing, and semantic retrieval.
//!
//! Pipeline: the selector walks a checkout and tags files with a language,
//! the chunker splits each file into definition-level or sliding-window
//! chunks, chunks are embedded and stored in a flat inner-product index, and
//! the retriever answers top-k cosine queries against a persisted generation.

pub mod chunker;
pub mod context;
pub mod error;
pub mod indexer;
pub mod languages;
pub mod repo;
pub mod retriever;
pub mod selector;
pub mod store;
pub mod units;
pub mod vector;

pub use error::{IndexError, Phase, Result};
