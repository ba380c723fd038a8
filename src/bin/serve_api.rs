use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use cricketmind::answer::{join_context, AnswerGenerator, GeneratedAnswer, PromptStyle};
use cricketmind::embedder::{EmbeddingClient, EmbeddingConfig};
use cricketmind::llm::{AnthropicProvider, ChatProvider, GroqProvider};
use cricketmind::retriever::{RetrievedMatch, Retriever};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, CorsLayer};

#[derive(Parser, Debug)]
#[command(
    name = "cricketmind-api",
    about = "HTTP API answering cricket questions via semantic retrieval and LLM reasoning"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "CRICKETMIND_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// Persisted similarity index produced by cricketmind-indexer.
    #[arg(
        long,
        env = "CRICKETMIND_INDEX",
        default_value = "data/matches_index.json"
    )]
    index: PathBuf,

    /// Metadata table produced alongside the index.
    #[arg(
        long,
        env = "CRICKETMIND_METADATA",
        default_value = "data/matches_metadata.jsonl"
    )]
    metadata: PathBuf,

    /// Default top-k when the client does not override it.
    #[arg(long, default_value_t = 5)]
    default_top_k: usize,

    /// Maximum top-k allowed per request.
    #[arg(long, default_value_t = 50)]
    max_top_k: usize,

    /// Comma-separated origins allowed by CORS.
    #[arg(
        long,
        env = "CRICKETMIND_ALLOWED_ORIGINS",
        default_value = "http://localhost:5173,http://127.0.0.1:5173"
    )]
    allowed_origins: String,

    /// Max cached retrievals kept in memory (0 disables caching).
    #[arg(long, default_value_t = 1024)]
    retrieval_cache_size: usize,

    /// Prompt style used for generation.
    #[arg(long, value_enum, default_value = "reasoning")]
    prompt_style: PromptStyle,

    /// Sampling temperature for the answer model.
    #[arg(long, default_value_t = 0.3)]
    temperature: f32,

    /// Maximum tokens to request from the completion model.
    #[arg(long, default_value_t = 512)]
    max_completion_tokens: usize,

    /// Target LLM provider (groq or anthropic).
    #[arg(long, env = "CRICKETMIND_LLM_PROVIDER", default_value = "groq")]
    llm_provider: String,

    /// Groq API key (required for the groq provider).
    #[arg(long, env = "GROQ_API_KEY")]
    groq_api_key: Option<String>,

    /// Groq completion model.
    #[arg(
        long,
        env = "CRICKETMIND_GROQ_MODEL",
        default_value = "llama-3.3-70b-versatile"
    )]
    groq_model: String,

    /// Base URL for OpenAI-compatible chat endpoints.
    #[arg(
        long,
        env = "CRICKETMIND_GROQ_BASE",
        default_value = "https://api.groq.com/openai/v1"
    )]
    groq_base_url: String,

    /// Anthropic API key (required for the anthropic provider).
    #[arg(long, env = "ANTHROPIC_API_KEY")]
    anthropic_api_key: Option<String>,

    /// Anthropic model identifier.
    #[arg(
        long,
        env = "CRICKETMIND_ANTHROPIC_MODEL",
        default_value = "claude-3-5-sonnet-latest"
    )]
    anthropic_model: String,

    /// API key for the embedding service.
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: String,

    /// Embedding model identifier.
    #[arg(
        long,
        env = "CRICKETMIND_EMBED_MODEL",
        default_value = "text-embedding-3-small"
    )]
    embedding_model: String,

    /// Optional embedding dimension override.
    #[arg(long, env = "CRICKETMIND_EMBED_DIMENSIONS")]
    embedding_dimensions: Option<usize>,

    /// Base URL for OpenAI-compatible embedding endpoints.
    #[arg(
        long,
        env = "CRICKETMIND_EMBED_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    embedding_base_url: String,

    /// Seconds before embedding requests time out.
    #[arg(long, env = "CRICKETMIND_EMBED_TIMEOUT_SECS", default_value_t = 30)]
    embedding_timeout_secs: u64,

    /// Retry attempts for transient embedding errors.
    #[arg(long, env = "CRICKETMIND_EMBED_MAX_RETRIES", default_value_t = 5)]
    max_retries: usize,
}

/// Process-wide context: built once at startup, read-only afterwards.
#[derive(Clone)]
struct AppState {
    retriever: Arc<Retriever>,
    generator: Arc<AnswerGenerator>,
    default_top_k: usize,
    max_top_k: usize,
    retrieval_cache: Option<Arc<Mutex<LruCache<(String, usize), Vec<RetrievedMatch>>>>>,
}

#[derive(Debug, Deserialize)]
struct ReasonParams {
    question: String,
    #[serde(default)]
    top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ReasonResponse {
    final_answer: String,
    retrieved_matches_count: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ApiCli::parse();
    let embedder = EmbeddingClient::new(EmbeddingConfig {
        api_key: cli.openai_api_key.clone(),
        base_url: cli.embedding_base_url.clone(),
        model: cli.embedding_model.clone(),
        dimensions: cli.embedding_dimensions,
        timeout: Duration::from_secs(cli.embedding_timeout_secs.max(1)),
        max_retries: cli.max_retries.max(1),
        batch_size: 1,
    })?;
    let retriever = Arc::new(Retriever::open(
        Box::new(embedder),
        &cli.index,
        &cli.metadata,
    )?);
    let provider = build_provider(&cli)?;
    let generator = Arc::new(
        AnswerGenerator::new(provider, cli.prompt_style)
            .with_sampling(cli.temperature, cli.max_completion_tokens),
    );
    let cors = cors_layer(&cli.allowed_origins)?;
    let state = AppState {
        retriever: Arc::clone(&retriever),
        generator,
        default_top_k: cli.default_top_k.max(1),
        max_top_k: cli.max_top_k.max(1),
        retrieval_cache: build_cache(cli.retrieval_cache_size),
    };
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/reason", get(reason_handler))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    println!(
        "cricketmind-api listening on http://{addr} ({} indexed matches)",
        retriever.corpus_size()
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server shutdown")?;
    Ok(())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn reason_handler(
    State(state): State<AppState>,
    Query(params): Query<ReasonParams>,
) -> Result<Json<ReasonResponse>, (StatusCode, Json<ErrorBody>)> {
    if params.question.trim().is_empty() {
        return Err(bad_request("Question cannot be empty"));
    }
    let top_k = clamp_top_k(params.top_k, state.default_top_k, state.max_top_k);
    let question = params.question;

    let matches = retrieve_cached(&state, question.clone(), top_k)
        .await
        .map_err(internal_error)?;
    let context_block = join_context(matches.iter().map(|result| result.text_repr.as_str()));

    let generator = Arc::clone(&state.generator);
    let generation_question = question.clone();
    let generated =
        tokio::task::spawn_blocking(move || generator.generate(&generation_question, &context_block))
            .await
            .map_err(|err| internal_error(anyhow!("generation task join error: {err}")))?;
    let final_answer = match generated {
        GeneratedAnswer::Answer(text) => text,
        GeneratedAnswer::Failed(reason) => format!("Error calling model API: {reason}"),
    };

    Ok(Json(ReasonResponse {
        final_answer,
        retrieved_matches_count: matches.len(),
    }))
}

/// Missing top_k falls back to the configured default; explicit values are
/// clamped into `[1, max_top_k]`.
fn clamp_top_k(requested: Option<usize>, default_top_k: usize, max_top_k: usize) -> usize {
    requested.unwrap_or(default_top_k).clamp(1, max_top_k)
}

async fn retrieve_cached(
    state: &AppState,
    question: String,
    top_k: usize,
) -> Result<Vec<RetrievedMatch>> {
    let key = (question.clone(), top_k);
    if let Some(cache) = &state.retrieval_cache {
        if let Some(hit) = {
            let mut guard = cache.lock().await;
            guard.get(&key).cloned()
        } {
            return Ok(hit);
        }
    }

    let retriever = Arc::clone(&state.retriever);
    let matches = tokio::task::spawn_blocking(move || retriever.retrieve(&question, top_k))
        .await
        .map_err(|err| anyhow!("retrieval task join error: {err}"))??;

    if let Some(cache) = &state.retrieval_cache {
        let mut guard = cache.lock().await;
        guard.put(key, matches.clone());
    }
    Ok(matches)
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: format!("{err:#}"),
        }),
    )
}

fn build_cache(
    size: usize,
) -> Option<Arc<Mutex<LruCache<(String, usize), Vec<RetrievedMatch>>>>> {
    NonZeroUsize::new(size).map(|capacity| Arc::new(Mutex::new(LruCache::new(capacity))))
}

fn cors_layer(allowed_origins: &str) -> Result<CorsLayer> {
    let origins = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new().allow_origin(AllowOrigin::list(origins)))
}

fn build_provider(cli: &ApiCli) -> Result<Box<dyn ChatProvider>> {
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_body_matches_documented_shape() {
        let body = ErrorBody {
            error: "Question cannot be empty".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            json!({ "error": "Question cannot be empty" })
        );
    }

    #[test]
    fn reason_response_matches_documented_shape() {
        let body = ReasonResponse {
            final_answer: "India won.".to_string(),
            retrieved_matches_count: 5,
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            json!({ "final_answer": "India won.", "retrieved_matches_count": 5 })
        );
    }

    #[test]
    fn top_k_defaults_and_clamps() {
        assert_eq!(clamp_top_k(None, 5, 50), 5);
        assert_eq!(clamp_top_k(Some(3), 5, 50), 3);
        assert_eq!(clamp_top_k(Some(0), 5, 50), 1);
        assert_eq!(clamp_top_k(Some(10_000), 5, 50), 50);
    }
}
