//! Flat inner-product index over L2-normalized vectors (cosine similarity).
//!
//! Rows are stored contiguously, row-major. Search is exhaustive; at the
//! corpus sizes this serves, a linear scan is fast and exact.

use std::cmp::Ordering;

use docqa_core::error::{Error, Result};

const MAGIC: &[u8; 4] = b"DQIX";
pub const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 8;
const DIGEST_LEN: usize = 32;

/// One search hit: a row of the index and its inner-product score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

/// Rescale `v` to unit L2 norm in place.
///
/// Returns `false` and leaves `v` untouched when its norm is zero.
pub fn l2_normalize(v: &mut [f32]) -> bool {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Descending score, then ascending row: a total order, so ties stay stable.
fn by_rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.score.total_cmp(&a.score).then(a.row.cmp(&b.row))
}

impl FlatIndex {
    /// Build from a non-empty sequence of equal-dimension vectors, normalizing each row.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = vectors.first() else { return Err(Error::EmptyCorpus) };
        let dim = first.len();
        if dim == 0 {
            return Err(Error::InvalidConfig("embedding vectors have zero dimensions".into()));
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        let mut degenerate = 0usize;
        for (row, mut v) in vectors.into_iter().enumerate() {
            if v.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: v.len() });
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(Error::Provider(format!(
                    "embedding for row {row} contains non-finite values"
                )));
            }
            if !l2_normalize(&mut v) {
                degenerate += 1;
            }
            data.extend_from_slice(&v);
        }
        if degenerate > 0 {
            tracing::warn!(
                degenerate,
                "zero-norm vectors indexed as-is; they score 0 against every query"
            );
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let start = i.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    /// Top `k` rows by inner product with `query`, best first.
    ///
    /// Returns `min(k, len)` neighbors; equal scores keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut hits: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(row, v)| Neighbor { row, score: dot(v, query) })
            .collect();
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_rank);
            hits.truncate(k);
        }
        hits.sort_by(by_rank);
        Ok(hits)
    }

    /// Versioned, checksummed little-endian encoding.
    ///
    /// Layout: magic `DQIX`, `u16` version, `u32` dim, `u64` rows, row-major
    /// `f32` payload, then a BLAKE3 digest of everything before it.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4 + DIGEST_LEN);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dim as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let digest = blake3::hash(&bytes);
        bytes.extend_from_slice(digest.as_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN + DIGEST_LEN {
            return Err(corrupt(format!("index file too short ({} bytes)", bytes.len())));
        }
        if &bytes[..4] != MAGIC {
            return Err(corrupt("index file has wrong magic".into()));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported index format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        let (body, digest) = bytes.split_at(bytes.len() - DIGEST_LEN);
        if blake3::hash(body).as_bytes() != digest {
            return Err(corrupt("index checksum mismatch".into()));
        }

        let dim = u32::from_le_bytes([body[6], body[7], body[8], body[9]]) as usize;
        let mut rows_le = [0u8; 8];
        rows_le.copy_from_slice(&body[10..HEADER_LEN]);
        let rows = usize::try_from(u64::from_le_bytes(rows_le))
            .map_err(|_| corrupt("row count overflows".into()))?;
        if dim == 0 || rows == 0 {
            return Err(corrupt(format!(
                "index header describes an empty index (dim={dim}, rows={rows})"
            )));
        }
        let expected = rows
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("payload length overflows".into()))?;
        let payload = &body[HEADER_LEN..];
        if payload.len() != expected {
            return Err(corrupt(format!(
                "payload is {} bytes, header implies {expected}",
                payload.len()
            )));
        }

        let mut data = Vec::with_capacity(rows * dim);
        for chunk in payload.chunks_exact(4) {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !value.is_finite() {
                return Err(corrupt("index contains non-finite values".into()));
            }
            data.push(value);
        }
        Ok(Self { dim, data })
    }
}

fn corrupt(message: String) -> Error {
    Error::CorruptStore(message)
}
