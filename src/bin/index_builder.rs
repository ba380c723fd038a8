use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cricketmind::embedder::{Embedder, EmbeddingClient, EmbeddingConfig};
use cricketmind::index::{l2_normalize, FlatIpIndex};
use cricketmind::metadata::{MatchMetadata, MetadataStore};
use cricketmind::MatchSummary;

#[derive(Parser, Debug)]
#[command(
    name = "cricketmind-indexer",
    about = "Builds the similarity index and metadata table from match summaries"
)]
struct IndexCli {
    /// Summary JSONL produced by cricketmind-preprocess
    #[arg(
        long,
        env = "CRICKETMIND_SUMMARY",
        default_value = "data/matches_summary.jsonl"
    )]
    summaries: PathBuf,

    /// Output path for the similarity index artifact
    #[arg(
        long,
        env = "CRICKETMIND_INDEX",
        default_value = "data/matches_index.json"
    )]
    index: PathBuf,

    /// Output path for the ordinal-aligned metadata table
    #[arg(
        long,
        env = "CRICKETMIND_METADATA",
        default_value = "data/matches_metadata.jsonl"
    )]
    metadata: PathBuf,

    /// API key for the embedding service
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "CRICKETMIND_EMBED_MODEL",
        default_value = "text-embedding-3-small"
    )]
    embedding_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "CRICKETMIND_EMBED_DIMENSIONS")]
    embedding_dimensions: Option<usize>,

    /// Base URL for OpenAI-compatible embedding endpoints
    #[arg(
        long,
        env = "CRICKETMIND_EMBED_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    embedding_base_url: String,

    /// Max summaries per embedding request
    #[arg(long, env = "CRICKETMIND_EMBED_BATCH", default_value_t = 64)]
    batch_size: usize,

    /// Seconds before embedding requests time out
    #[arg(long, env = "CRICKETMIND_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    embedding_timeout_secs: u64,

    /// Retry attempts for transient embedding errors
    #[arg(long, env = "CRICKETMIND_EMBED_MAX_RETRIES", default_value_t = 5)]
    max_retries: usize,
}

fn main() -> Result<()> {
    let cli = IndexCli::parse();
    let embedder = EmbeddingClient::new(EmbeddingConfig {
        api_key: cli.openai_api_key,
        base_url: cli.embedding_base_url,
        model: cli.embedding_model,
        dimensions: cli.embedding_dimensions,
        timeout: Duration::from_secs(cli.embedding_timeout_secs.max(1)),
        max_retries: cli.max_retries.max(1),
        batch_size: cli.batch_size.max(1),
    })?;

    let summaries = load_summaries(&cli.summaries)?;
    anyhow::ensure!(
        !summaries.is_empty(),
        "summary table {:?} contains no usable records",
        cli.summaries
    );
    let texts: Vec<String> = summaries.iter().map(MatchSummary::text_repr).collect();
    eprintln!(
        "embedding {} match summaries in batches of {}...",
        texts.len(),
        embedder.batch_size()
    );

    // Batches are embedded and appended strictly in input order; the ordinal
    // of every vector must equal the ordinal of its metadata row.
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for (batch_no, chunk) in texts.chunks(embedder.batch_size()).enumerate() {
        let inputs: Vec<&str> = chunk.iter().map(String::as_str).collect();
        let mut batch = embedder
            .embed_batch(&inputs)
            .with_context(|| format!("embedding batch {} failed", batch_no + 1))?;
        anyhow::ensure!(
            batch.len() == inputs.len(),
            "embedding batch {} returned {} vectors for {} inputs",
            batch_no + 1,
            batch.len(),
            inputs.len()
        );
        for vector in &mut batch {
            l2_normalize(vector);
        }
        vectors.append(&mut batch);
        eprintln!("embedded {}/{} summaries...", vectors.len(), texts.len());
    }

    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    let mut index =
        FlatIpIndex::new(dimension).context("embedding service returned zero-width vectors")?;
    let mut metadata = MetadataStore::new();
    for ((summary, text), vector) in summaries.iter().zip(&texts).zip(vectors) {
        let ordinal = index.add(vector)?;
        let row_ordinal = metadata.push(MatchMetadata {
            match_id: summary.match_id.clone(),
            text_repr: text.clone(),
        });
        anyhow::ensure!(
            ordinal == row_ordinal,
            "index ordinal {} diverged from metadata ordinal {}",
            ordinal,
            row_ordinal
        );
    }

    let checksum = metadata.corpus_checksum();
    index
        .save(&cli.index, checksum)
        .with_context(|| format!("failed to write index artifact {:?}", cli.index))?;
    metadata
        .save(&cli.metadata)
        .with_context(|| format!("failed to write metadata table {:?}", cli.metadata))?;
    eprintln!(
        "indexed {} matches (dimension {}, corpus checksum {:#010x}).",
        index.len(),
        index.dimension(),
        checksum
    );
    Ok(())
}

/// Reads summary rows in file order. A malformed row is skipped with a
/// warning so one bad record cannot abort the whole build.
fn load_summaries(path: &PathBuf) -> Result<Vec<MatchSummary>> {
    let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
    let reader = BufReader::new(file);
    let mut summaries = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<MatchSummary>(&line) {
            Ok(summary) => summaries.push(summary),
            Err(err) => {
                eprintln!("skipping summary line {}: {}", line_no + 1, err);
                skipped += 1;
            }
        }
    }
    if skipped > 0 {
        eprintln!("skipped {skipped} malformed summary rows.");
    }
    Ok(summaries)
}
