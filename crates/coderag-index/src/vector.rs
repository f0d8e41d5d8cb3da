//! Flat inner-product index over L2-normalized vectors.

use crate::error::{IndexError, Result};

/// Scale `v` to unit L2 norm in place. Zero vectors are left unchanged.
#[allow(clippy::cast_possible_truncation)]
pub fn normalize_l2(v: &mut [f32]) {
    // f64 accumulation: squares of large finite f32 values overflow f32
    let norm = v
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x = (f64::from(*x) / norm) as f32;
        }
    }
}

/// Reject vectors with NaN or infinite components. `what` names the vector in the error.
///
/// # Errors
///
/// Returns `IndexError::NonFiniteEmbedding` on the first non-finite component.
pub fn ensure_finite(v: &[f32], what: impl FnOnce() -> String) -> Result<()> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(IndexError::NonFiniteEmbedding(what()))
    }
}

/// Round a similarity score to 4 decimal places.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_score(score: f32) -> f32 {
    ((f64::from(score) * 10_000.0).round() / 10_000.0) as f32
}

/// Exact nearest-neighbor index: a contiguous row-major matrix of unit vectors.
///
/// Row `i` always corresponds to the `i`-th vector passed to [`VectorIndex::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorIndex {
    dim: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Normalize and store `vectors`. An empty input yields an empty index.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::DimensionMismatch` if the vectors differ in length,
    /// `IndexError::ZeroDimension` if they are empty, or
    /// `IndexError::NonFiniteEmbedding` if any component is NaN or infinite.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dim = vectors.first().map_or(0, Vec::len);
        if dim == 0 && !vectors.is_empty() {
            return Err(IndexError::ZeroDimension);
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for (row, mut v) in vectors.into_iter().enumerate() {
            if v.len() != dim {
                return Err(IndexError::DimensionMismatch {
                    expected: dim,
                    got: v.len(),
                });
            }
            ensure_finite(&v, || format!("row {row}"))?;
            normalize_l2(&mut v);
            data.extend_from_slice(&v);
        }
        Ok(Self { dim, data })
    }

    /// Rebuild from already-normalized row-major data, as read back from storage.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Corrupt` if `data` is not a whole number of rows
    /// or holds NaN or infinite values.
    pub fn from_raw(dim: usize, data: Vec<f32>) -> Result<Self> {
        let whole_rows = if dim == 0 {
            data.is_empty()
        } else {
            data.len() % dim == 0
        };
        if !whole_rows {
            return Err(IndexError::Corrupt(format!(
                "{} values do not form rows of dimension {dim}",
                data.len()
            )));
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::Corrupt("vector data holds NaN or infinite values".into()));
        }
        Ok(Self { dim, data })
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major backing storage.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn vector(&self, i: usize) -> Option<&[f32]> {
        (i < self.len()).then(|| &self.data[i * self.dim..(i + 1) * self.dim])
    }

    /// Top-`k` rows by inner product with the normalized `query`.
    ///
    /// Returns `(row, score)` pairs by descending score; equal scores keep
    /// row order. Never returns more than `len()` entries.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::DimensionMismatch` if a non-empty index is queried
    /// with a vector of the wrong length, or `IndexError::NonFiniteEmbedding`
    /// if the query has a NaN or infinite component.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }

        ensure_finite(query, || "query".to_owned())?;

        let mut q = query.to_vec();
        normalize_l2(&mut q);

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(i, row)| (i, dot(row, &q).clamp(-1.0, 1.0)))
            .collect();
        // stable: ties stay in row order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
