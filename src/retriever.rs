//! Query-time retrieval pipeline joining embedder, index, and metadata.

use std::path::Path;

use anyhow::{Context, Result};

use crate::embedder::Embedder;
use crate::index::{l2_normalize, FlatIpIndex};
use crate::metadata::MetadataStore;

/// One retrieved match with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMatch {
    /// Source identifier of the match.
    pub match_id: String,
    /// Text representation stored at build time.
    pub text_repr: String,
    /// Cosine similarity between the query and the match.
    pub score: f32,
}

/// Read-only retrieval pipeline over immutable build artifacts.
///
/// Constructed once at process startup and shared for the lifetime of the
/// serving process; nothing here mutates after load.
pub struct Retriever {
    embedder: Box<dyn Embedder>,
    index: FlatIpIndex,
    metadata: MetadataStore,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &"<dyn Embedder>")
            .field("index", &self.index)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl Retriever {
    /// Loads the index and metadata artifacts and verifies they are in
    /// lockstep: equal row counts and matching corpus checksums. Fails fast
    /// on any mismatch rather than serving misaligned metadata.
    pub fn open(
        embedder: Box<dyn Embedder>,
        index_path: &Path,
        metadata_path: &Path,
    ) -> Result<Self> {
        let (index, stored_checksum) = FlatIpIndex::load(index_path)
            .with_context(|| format!("failed to load index artifact {:?}", index_path))?;
        let metadata = MetadataStore::load(metadata_path)
            .with_context(|| format!("failed to load metadata table {:?}", metadata_path))?;
        anyhow::ensure!(
            index.len() == metadata.len(),
            "index holds {} vectors but metadata has {} rows; rebuild both artifacts together",
            index.len(),
            metadata.len()
        );
        let recomputed = metadata.corpus_checksum();
        anyhow::ensure!(
            recomputed == stored_checksum,
            "metadata corpus checksum {:#010x} does not match index checksum {:#010x}; \
             rebuild both artifacts together",
            recomputed,
            stored_checksum
        );
        Ok(Self {
            embedder,
            index,
            metadata,
        })
    }

    /// Builds a retriever from already-loaded parts. The same row-count
    /// check applies; checksum verification only makes sense against a
    /// persisted artifact and happens in [`Retriever::open`].
    pub fn from_parts(
        embedder: Box<dyn Embedder>,
        index: FlatIpIndex,
        metadata: MetadataStore,
    ) -> Result<Self> {
        anyhow::ensure!(
            index.len() == metadata.len(),
            "index holds {} vectors but metadata has {} rows",
            index.len(),
            metadata.len()
        );
        Ok(Self {
            embedder,
            index,
            metadata,
        })
    }

    /// Number of indexed matches.
    pub fn corpus_size(&self) -> usize {
        self.index.len()
    }

    /// Embeds `query` with the build-time embedding model and returns the
    /// `top_k` most similar matches, descending by score.
    ///
    /// `top_k` larger than the corpus yields corpus-size results and
    /// `top_k == 0` yields none; clamping to a sane range is the serving
    /// layer's policy. Query content validation (empty/whitespace) is the
    /// caller's responsibility.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedMatch>> {
        let mut vector = self
            .embedder
            .embed_query(query)
            .context("query embedding failed")?;
        l2_normalize(&mut vector);
        let hits = self
            .index
            .search(&vector, top_k)
            .context("index search failed")?;
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let row = self.metadata.get(hit.ordinal).ok_or_else(|| {
                anyhow::anyhow!("search returned ordinal {} beyond metadata table", hit.ordinal)
            })?;
            results.push(RetrievedMatch {
                match_id: row.match_id.clone(),
                text_repr: row.text_repr.clone(),
                score: hit.score,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexError;
    use crate::metadata::MatchMetadata;
    use crate::summary::MatchSummary;
    use pretty_assertions::assert_eq;

    /// Deterministic stand-in for the network embedding client: hashes
    /// lowercased tokens into a fixed-width bag-of-words vector, so texts
    /// sharing vocabulary land close together.
    struct TokenHashEmbedder {
        dimension: usize,
    }

    impl TokenHashEmbedder {
        fn new(dimension: usize) -> Self {
            Self { dimension }
        }

        fn embed_one(&self, input: &str) -> Vec<f32> {
            let mut vector = vec![0.0f32; self.dimension];
            for token in input
                .split(|ch: char| !ch.is_alphanumeric())
                .filter(|token| !token.is_empty())
            {
                let mut bucket = 0usize;
                for byte in token.to_lowercase().bytes() {
                    bucket = bucket.wrapping_mul(31).wrapping_add(byte as usize);
                }
                vector[bucket % self.dimension] += 1.0;
            }
            vector
        }
    }

    impl Embedder for TokenHashEmbedder {
        fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(inputs.iter().map(|input| self.embed_one(input)).collect())
        }
    }

    fn mcg_summary() -> MatchSummary {
        MatchSummary {
            match_id: "1381218".to_string(),
            date: "2023-03-10".to_string(),
            city: "Melbourne".to_string(),
            venue: "MCG".to_string(),
            season: "2023".to_string(),
            event_name: "Australia tour of India".to_string(),
            match_type: "ODI".to_string(),
            gender: "male".to_string(),
            team1: "India".to_string(),
            team2: "Australia".to_string(),
            toss_winner: "India".to_string(),
            toss_decision: "bat".to_string(),
            winner: "India".to_string(),
            overs: 50,
            player_of_match: "V Kohli".to_string(),
            first_innings_runs: Some(281),
        }
    }

    fn build_retriever(summaries: &[MatchSummary]) -> Retriever {
        let embedder = TokenHashEmbedder::new(64);
        let texts: Vec<String> = summaries.iter().map(MatchSummary::text_repr).collect();
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = embedder.embed_batch(&inputs).expect("embed corpus");

        let mut index = FlatIpIndex::new(64).expect("index");
        let mut metadata = MetadataStore::new();
        for (summary, mut vector) in summaries.iter().zip(vectors) {
            l2_normalize(&mut vector);
            let ordinal = index.add(vector).expect("add vector");
            let row_ordinal = metadata.push(MatchMetadata {
                match_id: summary.match_id.clone(),
                text_repr: summary.text_repr(),
            });
            assert_eq!(ordinal, row_ordinal);
        }
        Retriever::from_parts(Box::new(TokenHashEmbedder::new(64)), index, metadata)
            .expect("retriever")
    }

    #[test]
    fn single_record_corpus_returns_it_top_ranked() {
        let retriever = build_retriever(&[mcg_summary()]);
        let results = retriever
            .retrieve("Who won the India vs Australia match at MCG?", 1)
            .expect("retrieve");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].match_id, "1381218");
        assert_eq!(results[0].text_repr, mcg_summary().text_repr());
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn identical_queries_return_identical_results() {
        let mut other = mcg_summary();
        other.match_id = "333".to_string();
        other.team1 = "England".to_string();
        other.team2 = "Pakistan".to_string();
        other.venue = "Lord's".to_string();
        other.winner = "England".to_string();
        let retriever = build_retriever(&[mcg_summary(), other]);

        let first = retriever.retrieve("England at Lord's", 2).expect("retrieve");
        let second = retriever.retrieve("England at Lord's", 2).expect("retrieve");
        assert_eq!(first, second);
    }

    #[test]
    fn top_k_beyond_corpus_returns_corpus_size() {
        let retriever = build_retriever(&[mcg_summary()]);
        let results = retriever.retrieve("cricket", 50).expect("retrieve");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn results_are_ordered_by_descending_score() {
        let mut far = mcg_summary();
        far.match_id = "far".to_string();
        far.team1 = "Zimbabwe".to_string();
        far.team2 = "Kenya".to_string();
        far.venue = "Harare Sports Club".to_string();
        far.winner = "Zimbabwe".to_string();
        far.city = "Harare".to_string();
        far.player_of_match = "H Masakadza".to_string();
        let retriever = build_retriever(&[far, mcg_summary()]);

        let results = retriever
            .retrieve("India vs Australia at MCG", 2)
            .expect("retrieve");
        assert_eq!(results.len(), 2);
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].match_id, "1381218");
    }

    #[test]
    fn from_parts_rejects_count_mismatch() {
        let mut index = FlatIpIndex::new(4).expect("index");
        index.add(vec![1.0, 0.0, 0.0, 0.0]).expect("add");
        let metadata = MetadataStore::new();
        let err = Retriever::from_parts(Box::new(TokenHashEmbedder::new(4)), index, metadata)
            .expect_err("mismatch rejected");
        assert!(err.to_string().contains("rows"));
    }

    #[test]
    fn open_rejects_artifacts_rebuilt_out_of_lockstep() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.jsonl");

        let embedder = TokenHashEmbedder::new(16);
        let summaries = [mcg_summary()];
        let mut index = FlatIpIndex::new(16).expect("index");
        let mut metadata = MetadataStore::new();
        for summary in &summaries {
            let mut vector = embedder.embed_one(&summary.text_repr());
            l2_normalize(&mut vector);
            index.add(vector).expect("add");
            metadata.push(MatchMetadata {
                match_id: summary.match_id.clone(),
                text_repr: summary.text_repr(),
            });
        }
        index.save(&index_path, metadata.corpus_checksum()).expect("save index");

        // Rewrite the metadata independently, as a stale or reordered
        // rebuild would. The retriever must refuse to serve the pair.
        let mut tampered = MetadataStore::new();
        tampered.push(MatchMetadata {
            match_id: "other".to_string(),
            text_repr: "A different sentence entirely.".to_string(),
        });
        tampered.save(&metadata_path).expect("save metadata");

        let err = Retriever::open(
            Box::new(TokenHashEmbedder::new(16)),
            &index_path,
            &metadata_path,
        )
        .expect_err("checksum mismatch rejected");
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn open_succeeds_on_lockstep_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let index_path = dir.path().join("index.json");
        let metadata_path = dir.path().join("metadata.jsonl");

        let embedder = TokenHashEmbedder::new(16);
        let mut index = FlatIpIndex::new(16).expect("index");
        let mut metadata = MetadataStore::new();
        let summary = mcg_summary();
        let mut vector = embedder.embed_one(&summary.text_repr());
        l2_normalize(&mut vector);
        index.add(vector).expect("add");
        metadata.push(MatchMetadata {
            match_id: summary.match_id.clone(),
            text_repr: summary.text_repr(),
        });
        index.save(&index_path, metadata.corpus_checksum()).expect("save index");
        metadata.save(&metadata_path).expect("save metadata");

        let retriever = Retriever::open(
            Box::new(TokenHashEmbedder::new(16)),
            &index_path,
            &metadata_path,
        )
        .expect("open");
        assert_eq!(retriever.corpus_size(), 1);
    }

    #[test]
    fn query_dimension_mismatch_surfaces_as_error() {
        let index = FlatIpIndex::new(8).expect("index");
        let metadata = MetadataStore::new();
        let retriever =
            Retriever::from_parts(Box::new(TokenHashEmbedder::new(4)), index, metadata)
                .expect("retriever");
        let err = retriever.retrieve("anything", 1).expect_err("dim mismatch");
        assert!(err
            .chain()
            .any(|cause| cause.downcast_ref::<IndexError>().is_some()));
    }
}
