use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cricketmind::summary::SummaryRow;
use cricketmind::{parse_match, MatchSummary};

#[derive(Parser, Debug)]
#[command(
    name = "cricketmind-preprocess",
    about = "Summarizes a directory of per-match JSON files into a tabular JSONL file"
)]
struct PreprocessCli {
    /// Directory containing one JSON file per match
    #[arg(long, env = "CRICKETMIND_MATCHES", default_value = "data/all_json_extracted")]
    matches: PathBuf,

    /// Output JSONL containing one summary row per valid match
    #[arg(
        long,
        env = "CRICKETMIND_SUMMARY",
        default_value = "data/matches_summary.jsonl"
    )]
    output: PathBuf,

    /// Flush interval, in files processed
    #[arg(long, default_value_t = 2000)]
    flush_every: usize,
}

fn main() -> Result<()> {
    let cli = PreprocessCli::parse();
    let files = list_match_files(&cli.matches)?;
    anyhow::ensure!(
        !files.is_empty(),
        "no .json match files found under {:?}",
        cli.matches
    );
    eprintln!("found {} match files to process...", files.len());

    let output = File::create(&cli.output)
        .with_context(|| format!("failed to create {:?}", cli.output))?;
    let mut writer = BufWriter::new(output);
    let mut written = 0usize;
    let mut skipped = 0usize;
    let flush_every = cli.flush_every.max(1);

    for (position, path) in files.iter().enumerate() {
        match summarize_file(path) {
            Ok(summary) => {
                let row = SummaryRow::new(summary);
                serde_json::to_writer(&mut writer, &row)?;
                writer.write_all(b"\n")?;
                written += 1;
            }
            Err(err) => {
                eprintln!("skipping {}: {:#}", path.display(), err);
                skipped += 1;
            }
        }
        if (position + 1) % flush_every == 0 {
            writer.flush()?;
            eprintln!("processed {}/{} files...", position + 1, files.len());
        }
    }
    writer.flush()?;

    eprintln!(
        "preprocessing complete: {} summaries written to {:?} ({} files skipped).",
        written, cli.output, skipped
    );
    Ok(())
}

/// Returns every `.json` file directly under `dir`, sorted by path so the
/// summary table order is stable across runs.
fn list_match_files(dir: &PathBuf) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to read directory {:?}", dir))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {:?}", dir))?;
        let path = entry.path();
        if path.is_file() && path.extension() == Some(OsStr::new("json")) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn summarize_file(path: &PathBuf) -> Result<MatchSummary> {
    let raw = fs::read_to_string(path).context("failed to read file")?;
    let fallback_id = path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("unknown");
    let summary = parse_match(&raw, fallback_id)?;
    Ok(summary)
}
