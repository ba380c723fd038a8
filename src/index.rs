//! Exact inner-product similarity index over L2-normalized vectors.

use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors raised by index construction, search, and persistence.
#[derive(Debug)]
pub enum IndexError {
    /// The index dimension must be non-zero.
    EmptyDimension,
    /// A vector's length did not match the index dimension.
    DimensionMismatch {
        /// Dimension the index was created with.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },
    /// The persisted artifact declared a different vector count than it held.
    CountMismatch {
        /// Count recorded in the artifact header.
        declared: usize,
        /// Vectors actually present.
        actual: usize,
    },
    /// The persisted artifact could not be read or written.
    Io(std::io::Error),
    /// The persisted artifact was not valid index JSON.
    Format(serde_json::Error),
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDimension => write!(f, "index dimension must be non-zero"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "vector has dimension {actual}, index expects {expected}")
            }
            Self::CountMismatch { declared, actual } => {
                write!(f, "artifact declares {declared} vectors but holds {actual}")
            }
            Self::Io(err) => write!(f, "index artifact io error: {err}"),
            Self::Format(err) => write!(f, "index artifact format error: {err}"),
        }
    }
}

impl std::error::Error for IndexError {}

impl From<std::io::Error> for IndexError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for IndexError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err)
    }
}

/// One search result: the ordinal of a stored vector and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Insertion ordinal of the matched vector.
    pub ordinal: usize,
    /// Inner-product score (cosine similarity for normalized inputs).
    pub score: f32,
}

/// Flat exact index scored by inner product.
///
/// Vectors are expected to be L2-normalized before insertion so the inner
/// product equals cosine similarity. Insertion order defines the ordinal
/// used to join search results against the metadata table; the index never
/// stores ids of its own.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// On-disk layout of a persisted index artifact. The corpus checksum is the
/// CRC32 of the metadata text column the vectors were built from; loaders
/// compare it against the metadata table to catch out-of-lockstep rebuilds.
#[derive(Serialize, Deserialize)]
struct IndexArtifact {
    dimension: usize,
    count: usize,
    corpus_checksum: u32,
    vectors: Vec<Vec<f32>>,
}

impl FlatIpIndex {
    /// Creates an empty index for vectors of the given dimension.
    pub fn new(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::EmptyDimension);
        }
        Ok(Self {
            dimension,
            vectors: Vec::new(),
        })
    }

    /// Dimension every stored vector must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when no vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Appends a vector, returning the ordinal it was stored at.
    pub fn add(&mut self, vector: Vec<f32>) -> Result<usize, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Returns up to `top_k` stored vectors ranked by descending inner
    /// product against `query`. Ties break by ascending ordinal, so repeated
    /// searches with the same query return identical orderings. A `top_k`
    /// beyond the stored count returns every vector.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, stored)| SearchHit {
                ordinal,
                score: dot(query, stored),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Persists the index together with the corpus checksum of the metadata
    /// table it was built in lockstep with.
    pub fn save(&self, path: &Path, corpus_checksum: u32) -> Result<(), IndexError> {
        let artifact = IndexArtifact {
            dimension: self.dimension,
            count: self.vectors.len(),
            corpus_checksum,
            vectors: self.vectors.clone(),
        };
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &artifact)?;
        Ok(())
    }

    /// Loads a persisted index, returning it together with the stored corpus
    /// checksum. Rejects artifacts whose declared count or vector dimensions
    /// are inconsistent.
    pub fn load(path: &Path) -> Result<(Self, u32), IndexError> {
        let file = File::open(path)?;
        let artifact: IndexArtifact = serde_json::from_reader(BufReader::new(file))?;
        if artifact.dimension == 0 {
            return Err(IndexError::EmptyDimension);
        }
        if artifact.count != artifact.vectors.len() {
            return Err(IndexError::CountMismatch {
                declared: artifact.count,
                actual: artifact.vectors.len(),
            });
        }
        for vector in &artifact.vectors {
            if vector.len() != artifact.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: artifact.dimension,
                    actual: vector.len(),
                });
            }
        }
        Ok((
            Self {
                dimension: artifact.dimension,
                vectors: artifact.vectors,
            },
            artifact.corpus_checksum,
        ))
    }
}

/// Scales `vector` to unit L2 norm in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(components: &[f32]) -> Vec<f32> {
        let mut vector = components.to_vec();
        l2_normalize(&mut vector);
        vector
    }

    #[test]
    fn l2_normalize_produces_unit_norm() {
        let mut vector = vec![3.0, 4.0];
        l2_normalize(&mut vector);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector() {
        let mut vector = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut vector);
        assert_eq!(vector, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut index = FlatIpIndex::new(3).expect("index");
        match index.add(vec![1.0, 0.0]).expect_err("dimension enforced") {
            IndexError::DimensionMismatch { expected, actual } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected dimension mismatch, got {other}"),
        }
    }

    #[test]
    fn search_ranks_by_descending_similarity() {
        let mut index = FlatIpIndex::new(3).expect("index");
        index.add(unit(&[0.0, 1.0, 0.0])).expect("add");
        index.add(unit(&[1.0, 0.0, 0.0])).expect("add");
        index.add(unit(&[0.7, 0.7, 0.0])).expect("add");

        let hits = index.search(&unit(&[1.0, 0.0, 0.0]), 3).expect("search");
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].ordinal, 1);
        assert_eq!(hits[1].ordinal, 2);
        assert_eq!(hits[2].ordinal, 0);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
    }

    #[test]
    fn search_is_deterministic_and_breaks_ties_by_ordinal() {
        let mut index = FlatIpIndex::new(2).expect("index");
        // two identical vectors tie exactly; the earlier ordinal must win
        index.add(unit(&[1.0, 1.0])).expect("add");
        index.add(unit(&[1.0, 1.0])).expect("add");
        index.add(unit(&[1.0, 0.0])).expect("add");

        let query = unit(&[1.0, 1.0]);
        let first = index.search(&query, 3).expect("search");
        let second = index.search(&query, 3).expect("search");
        assert_eq!(first, second);
        assert_eq!(first[0].ordinal, 0);
        assert_eq!(first[1].ordinal, 1);
    }

    #[test]
    fn top_k_beyond_corpus_returns_corpus_size() {
        let mut index = FlatIpIndex::new(2).expect("index");
        index.add(unit(&[1.0, 0.0])).expect("add");
        let hits = index.search(&unit(&[1.0, 0.0]), 100).expect("search");
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn top_k_zero_returns_nothing() {
        let mut index = FlatIpIndex::new(2).expect("index");
        index.add(unit(&[1.0, 0.0])).expect("add");
        let hits = index.search(&unit(&[1.0, 0.0]), 0).expect("search");
        assert!(hits.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut index = FlatIpIndex::new(2).expect("index");
        index.add(unit(&[1.0, 0.0])).expect("add");
        index.add(unit(&[0.0, 1.0])).expect("add");

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");
        index.save(&path, 0xdead_beef).expect("save");

        let (loaded, checksum) = FlatIpIndex::load(&path).expect("load");
        assert_eq!(checksum, 0xdead_beef);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 2);

        let hits = loaded.search(&unit(&[0.0, 1.0]), 1).expect("search");
        assert_eq!(hits[0].ordinal, 1);
    }

    #[test]
    fn load_rejects_inconsistent_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"{"dimension":2,"count":3,"corpus_checksum":0,"vectors":[[1.0,0.0]]}"#,
        )
        .expect("write artifact");

        match FlatIpIndex::load(&path).expect_err("count enforced") {
            IndexError::CountMismatch { declared, actual } => {
                assert_eq!(declared, 3);
                assert_eq!(actual, 1);
            }
            other => panic!("expected count mismatch, got {other}"),
        }
    }
}
