use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cricketmind::embedder::{EmbeddingClient, EmbeddingConfig};
use cricketmind::Retriever;

#[derive(Parser, Debug)]
#[command(
    name = "cricketmind-query",
    about = "Interactive semantic search over indexed cricket matches"
)]
struct QueryCli {
    /// Persisted similarity index produced by cricketmind-indexer
    #[arg(
        long,
        env = "CRICKETMIND_INDEX",
        default_value = "data/matches_index.json"
    )]
    index: PathBuf,

    /// Metadata table produced alongside the index
    #[arg(
        long,
        env = "CRICKETMIND_METADATA",
        default_value = "data/matches_metadata.jsonl"
    )]
    metadata: PathBuf,

    /// Number of matches returned per question
    #[arg(long, default_value_t = 5)]
    top_k: usize,

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

    /// Seconds before embedding requests time out
    #[arg(long, env = "CRICKETMIND_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    embedding_timeout_secs: u64,

    /// Retry attempts for transient embedding errors
    #[arg(long, env = "CRICKETMIND_EMBED_MAX_RETRIES", default_value_t = 5)]
    max_retries: usize,
}

fn main() -> Result<()> {
    let cli = QueryCli::parse();
    let embedder = EmbeddingClient::new(EmbeddingConfig {
        api_key: cli.openai_api_key,
        base_url: cli.embedding_base_url,
        model: cli.embedding_model,
        dimensions: cli.embedding_dimensions,
        timeout: Duration::from_secs(cli.embedding_timeout_secs.max(1)),
        max_retries: cli.max_retries.max(1),
        batch_size: 1,
    })?;
    let retriever = Retriever::open(Box::new(embedder), &cli.index, &cli.metadata)?;
    println!(
        "loaded {} indexed matches. Type a question, or 'exit' to quit.",
        retriever.corpus_size()
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\nEnter your cricket question: ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") {
            break;
        }

        let results = match retriever.retrieve(query, cli.top_k) {
            Ok(results) => results,
            Err(err) => {
                eprintln!("retrieval failed: {err:#}");
                continue;
            }
        };
        println!("\nTop results:");
        for (rank, result) in results.iter().enumerate() {
            println!(
                "{}. ({:.4}) {}: {}",
                rank + 1,
                result.score,
                result.match_id,
                preview(&result.text_repr)
            );
        }
    }
    Ok(())
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 200;
    if text.chars().count() <= MAX_CHARS {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(MAX_CHARS).collect();
    preview.push_str("...");
    preview
}
