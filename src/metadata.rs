//! Ordinal-aligned metadata table persisted alongside the vector index.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Metadata row describing the match whose vector sits at the same ordinal
/// in the similarity index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    /// Source identifier of the match.
    pub match_id: String,
    /// Text representation that was embedded for this match.
    pub text_repr: String,
}

/// In-memory metadata table. Row order mirrors index insertion order; the
/// ordinal is the sole join key between the two stores.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    rows: Vec<MatchMetadata>,
}

impl MetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row, returning the ordinal it was stored at.
    pub fn push(&mut self, row: MatchMetadata) -> usize {
        self.rows.push(row);
        self.rows.len() - 1
    }

    /// Returns the row at `ordinal`, if any.
    pub fn get(&self, ordinal: usize) -> Option<&MatchMetadata> {
        self.rows.get(ordinal)
    }

    /// Rows in ordinal order.
    pub fn rows(&self) -> &[MatchMetadata] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// CRC32 over every `text_repr` in row order. The index artifact stores
    /// the same value at build time; comparing the two at load catches
    /// stores that were rebuilt or reordered independently.
    pub fn corpus_checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for row in &self.rows {
            hasher.update(row.text_repr.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize()
    }

    /// Writes the table as JSONL in row order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        for row in &self.rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Loads a JSONL table, preserving row order. Blank lines are ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line =
                line.with_context(|| format!("failed to read metadata line {}", line_no + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: MatchMetadata = serde_json::from_str(&line)
                .with_context(|| format!("invalid metadata record at line {}", line_no + 1))?;
            rows.push(row);
        }
        Ok(Self { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(match_id: &str, text_repr: &str) -> MatchMetadata {
        MatchMetadata {
            match_id: match_id.to_string(),
            text_repr: text_repr.to_string(),
        }
    }

    #[test]
    fn push_assigns_sequential_ordinals() {
        let mut store = MetadataStore::new();
        assert_eq!(store.push(row("a", "first")), 0);
        assert_eq!(store.push(row("b", "second")), 1);
        assert_eq!(store.get(1).map(|r| r.match_id.as_str()), Some("b"));
        assert_eq!(store.get(2), None);
    }

    #[test]
    fn save_and_load_preserve_row_order() {
        let mut store = MetadataStore::new();
        store.push(row("m1", "Match one."));
        store.push(row("m2", "Match two."));
        store.push(row("m3", "Match three."));

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.jsonl");
        store.save(&path).expect("save");

        let loaded = MetadataStore::load(&path).expect("load");
        assert_eq!(loaded.rows(), store.rows());
        assert_eq!(loaded.corpus_checksum(), store.corpus_checksum());
    }

    #[test]
    fn checksum_tracks_text_content_and_order() {
        let mut store = MetadataStore::new();
        store.push(row("m1", "Match one."));
        store.push(row("m2", "Match two."));
        let baseline = store.corpus_checksum();

        let mut edited = MetadataStore::new();
        edited.push(row("m1", "Match one!"));
        edited.push(row("m2", "Match two."));
        assert_ne!(edited.corpus_checksum(), baseline);

        let mut reordered = MetadataStore::new();
        reordered.push(row("m2", "Match two."));
        reordered.push(row("m1", "Match one."));
        assert_ne!(reordered.corpus_checksum(), baseline);
    }
}
