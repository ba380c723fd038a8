#![warn(missing_docs)]
//! Core library for the CricketMind retrieval-augmented cricket QA pipeline.

pub mod answer;
pub mod embedder;
pub mod index;
pub mod llm;
pub mod metadata;
pub mod preprocess;
pub mod retriever;
pub mod summary;

pub use answer::{build_prompt, join_context, AnswerGenerator, GeneratedAnswer, PromptStyle};
pub use embedder::{Embedder, EmbeddingClient, EmbeddingConfig};
pub use index::{l2_normalize, FlatIpIndex, IndexError, SearchHit};
pub use metadata::{MatchMetadata, MetadataStore};
pub use preprocess::{parse_match, SummaryError, UNKNOWN};
pub use retriever::{RetrievedMatch, Retriever};
pub use summary::{MatchSummary, SummaryRow};
