use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use cricketmind::answer::{join_context, AnswerGenerator, GeneratedAnswer, PromptStyle};
use cricketmind::embedder::{EmbeddingClient, EmbeddingConfig};
use cricketmind::llm::{AnthropicProvider, ChatProvider, GroqProvider};
use cricketmind::Retriever;

#[derive(Parser, Debug)]
#[command(
    name = "cricketmind-qa",
    about = "Interactive cricket question answering over retrieved match context"
)]
struct QaCli {
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

    /// Number of matches retrieved per question
    #[arg(long, default_value_t = 5)]
    top_k: usize,

    /// Prompt style used for generation
    #[arg(long, value_enum, default_value = "direct")]
    prompt_style: PromptStyle,

    /// Sampling temperature for the answer model
    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    /// Maximum tokens to request from the completion model
    #[arg(long, default_value_t = 512)]
    max_completion_tokens: usize,

    /// Target LLM provider (groq or anthropic)
    #[arg(long, env = "CRICKETMIND_LLM_PROVIDER", default_value = "groq")]
    llm_provider: String,

    /// Groq API key (required for the groq provider)
    #[arg(long, env = "GROQ_API_KEY")]
    groq_api_key: Option<String>,

    /// Groq completion model
    #[arg(
        long,
        env = "CRICKETMIND_GROQ_MODEL",
        default_value = "llama-3.3-70b-versatile"
    )]
    groq_model: String,

    /// Base URL for OpenAI-compatible chat endpoints
    #[arg(
        long,
        env = "CRICKETMIND_GROQ_BASE",
        default_value = "https://api.groq.com/openai/v1"
    )]
    groq_base_url: String,

    /// Anthropic API key (required for the anthropic provider)
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    anthropic_api_key: Option<String>,

    /// Anthropic model identifier
    #[arg(
        long,
        env = "CRICKETMIND_ANTHROPIC_MODEL",
        default_value = "claude-3-5-sonnet-latest"
    )]
    anthropic_model: String,

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
    let cli = QaCli::parse();
    let embedder = EmbeddingClient::new(EmbeddingConfig {
        api_key: cli.openai_api_key.clone(),
        base_url: cli.embedding_base_url.clone(),
        model: cli.embedding_model.clone(),
        dimensions: cli.embedding_dimensions,
        timeout: Duration::from_secs(cli.embedding_timeout_secs.max(1)),
        max_retries: cli.max_retries.max(1),
        batch_size: 1,
    })?;
    let retriever = Retriever::open(Box::new(embedder), &cli.index, &cli.metadata)?;
    let provider = build_provider(&cli)?;
    let generator = AnswerGenerator::new(provider, cli.prompt_style)
        .with_sampling(cli.temperature, cli.max_completion_tokens);

    println!(
        "CricketMind QA ready over {} indexed matches. Type a question, or 'exit' to quit.",
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
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            println!("Exiting CricketMind QA.");
            break;
        }

        println!("\nSearching for relevant matches...");
        let matches = match retriever.retrieve(question, cli.top_k) {
            Ok(matches) => matches,
            Err(err) => {
                eprintln!("retrieval failed: {err:#}");
                continue;
            }
        };
        if matches.is_empty() {
            println!("No matches indexed; cannot answer.");
            continue;
        }
        let context = join_context(matches.iter().map(|result| result.text_repr.as_str()));

        println!("Generating answer...\n");
        match generator.generate(question, &context) {
            GeneratedAnswer::Answer(text) => println!("Answer: {text}"),
            GeneratedAnswer::Failed(reason) => println!("Error calling model API: {reason}"),
        }
    }
    Ok(())
}

fn build_provider(cli: &QaCli) -> Result<Box<dyn ChatProvider>> {
    match cli.llm_provider.to_lowercase().as_str() {
        "groq" => {
            let key = cli
                .groq_api_key
                .clone()
                .ok_or_else(|| anyhow!("GROQ_API_KEY must be set for the groq provider"))?;
            Ok(Box::new(GroqProvider::new(
                key,
                cli.groq_base_url.clone(),
                cli.groq_model.clone(),
            )?))
        }
        "anthropic" => {
            let key = cli.anthropic_api_key.clone().ok_or_else(|| {
                anyhow!("ANTHROPIC_API_KEY must be set for the anthropic provider")
            })?;
            Ok(Box::new(AnthropicProvider::new(
                key,
                cli.anthropic_model.clone(),
            )?))
        }
        other => bail!("unsupported llm provider '{}'; use groq or anthropic", other),
    }
}
