use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cricketmind::llm::{AnthropicProvider, ChatProvider, ChatRequest, GroqProvider};
use cricketmind::MatchSummary;

#[derive(Parser, Debug)]
#[command(
    name = "cricketmind-react",
    about = "ReAct agent answering cricket questions with lookup tools over the summary table"
)]
struct ReactCli {
    /// Question to answer with the lookup tools
    #[arg(long)]
    query: String,

    /// Summary JSONL produced by cricketmind-preprocess
    #[arg(
        long,
        env = "CRICKETMIND_SUMMARY",
        default_value = "data/matches_summary.jsonl"
    )]
    summaries: PathBuf,

    /// Maximum reasoning steps before giving up
    #[arg(long, default_value_t = 4)]
    max_steps: usize,

    /// Sampling temperature for the reasoning model
    #[arg(long, default_value_t = 0.4)]
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
}

fn main() -> Result<()> {
    let cli = ReactCli::parse();
    let table = ToolTable::load(&cli.summaries)?;
    eprintln!("loaded {} match summaries.", table.len());
    let provider = build_provider(&cli)?;

    let mut transcript = react_prompt(&cli.query);
    for step in 0..cli.max_steps.max(1) {
        let request = ChatRequest {
            prompt: &transcript,
            temperature: cli.temperature,
            max_tokens: cli.max_completion_tokens,
        };
        let output = provider.complete(&request)?;
        println!("--- Model Output (step {}) ---", step + 1);
        println!("{}", output.trim());

        if output.contains("Final Answer:") {
            return Ok(());
        }
        let Some(call) = parse_action(&output) else {
            eprintln!("model produced neither an action nor a final answer; stopping.");
            return Ok(());
        };
        let observation = table.dispatch(&call);
        println!("--- Observation ---");
        println!("{observation}");
        transcript.push('\n');
        transcript.push_str(output.trim());
        transcript.push_str(&format!("\nObservation: {observation}\n"));
    }
    eprintln!("reached the step limit without a final answer.");
    Ok(())
}

fn react_prompt(query: &str) -> String {
    format!(
        "You are a cricket data assistant using ReAct reasoning.\n\
         You can use these actions:\n\
         SearchVenue(venue), SearchMatch(venue, team1, team2), SearchWinner(venue)\n\
         \n\
         Use the pattern:\n\
         Thought: <your reasoning>\n\
         Action: <ToolName>(parameters)\n\
         Observation: <tool output>\n\
         Repeat as needed, then conclude with:\n\
         Final Answer: <final answer>\n\
         \n\
         Question: {query}\n"
    )
}

/// One parsed `Action:` line from model output.
#[derive(Debug, PartialEq)]
struct ToolCall {
    name: String,
    args: Vec<String>,
}

/// Finds the first `Action:` line and splits it into a tool name plus
/// comma-separated arguments. Quotes and angle brackets around the call are
/// tolerated since models echo the prompt's placeholder syntax.
fn parse_action(output: &str) -> Option<ToolCall> {
    for line in output.lines() {
        let Some(rest) = line.trim().strip_prefix("Action:") else {
            continue;
        };
        let call = rest.trim().trim_matches(|ch| ch == '<' || ch == '>').trim();
        if call.is_empty() {
            continue;
        }
        let (name, args) = match call.split_once('(') {
            Some((name, tail)) => {
                let inner = tail.trim_end().trim_end_matches(')');
                let args = inner
                    .split(',')
                    .map(|arg| arg.trim().trim_matches(|ch| ch == '"' || ch == '\'').to_string())
                    .filter(|arg| !arg.is_empty())
                    .collect();
                (name.trim(), args)
            }
            None => (call, Vec::new()),
        };
        if name.is_empty() {
            continue;
        }
        return Some(ToolCall {
            name: name.to_string(),
            args,
        });
    }
    None
}

/// Lookup tools over the preprocessed summary table.
struct ToolTable {
    rows: Vec<MatchSummary>,
}

impl ToolTable {
    fn load(path: &PathBuf) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed to read line {}", line_no + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MatchSummary>(&line) {
                Ok(summary) => rows.push(summary),
                Err(err) => eprintln!("skipping summary line {}: {}", line_no + 1, err),
            }
        }
        Ok(Self { rows })
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn dispatch(&self, call: &ToolCall) -> String {
        match call.name.as_str() {
            "SearchVenue" => match call.args.first() {
                Some(venue) => self.search_venue(venue),
                None => "SearchVenue requires a venue argument.".to_string(),
            },
            "SearchMatch" => match call.args.as_slice() {
                [venue, team1, team2] => self.search_match(venue, team1, team2),
                _ => "SearchMatch requires venue, team1, and team2 arguments.".to_string(),
            },
            "SearchWinner" => match call.args.first() {
                Some(venue) => self.search_winner(venue),
                None => "SearchWinner requires a venue argument.".to_string(),
            },
            other => format!("Unknown tool: {other}."),
        }
    }

    /// Matches played at a venue (case-insensitive substring match).
    fn search_venue(&self, venue: &str) -> String {
        let rows = self.rows_at_venue(venue);
        if rows.is_empty() {
            return format!("No matches found at venue '{venue}'.");
        }
        rows.iter()
            .map(|row| {
                format!(
                    "{} vs {} at {}. Winner: {}.",
                    row.team1, row.team2, row.venue, row.winner
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Details for a specific match at a venue between two teams.
    fn search_match(&self, venue: &str, team1: &str, team2: &str) -> String {
        let found = self.rows_at_venue(venue).into_iter().find(|row| {
            has_team(row, team1) && has_team(row, team2)
        });
        match found {
            Some(row) => format!(
                "At {}, {} played {}. Winner: {}.",
                row.venue, row.team1, row.team2, row.winner
            ),
            None => format!("No match found at {venue} between {team1} and {team2}."),
        }
    }

    /// Winners recorded at a venue.
    fn search_winner(&self, venue: &str) -> String {
        let rows = self.rows_at_venue(venue);
        if rows.is_empty() {
            return format!("No matches found at venue '{venue}'.");
        }
        let mut winners: Vec<&str> = Vec::new();
        for row in &rows {
            if !winners.contains(&row.winner.as_str()) {
                winners.push(row.winner.as_str());
            }
        }
        if let [only] = winners.as_slice() {
            format!("{only} won the match at {venue}.")
        } else {
            format!(
                "Matches at {venue} have multiple winners: {}.",
                winners.join(", ")
            )
        }
    }

    fn rows_at_venue(&self, venue: &str) -> Vec<&MatchSummary> {
        let needle = venue.to_lowercase();
        self.rows
            .iter()
            .filter(|row| row.venue.to_lowercase().contains(&needle))
            .collect()
    }
}

fn has_team(row: &MatchSummary, team: &str) -> bool {
    let needle = team.to_lowercase();
    row.team1.to_lowercase().contains(&needle) || row.team2.to_lowercase().contains(&needle)
}

fn build_provider(cli: &ReactCli) -> Result<Box<dyn ChatProvider>> {
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
