//! Match summary records and their fixed-template text representations.

use serde::{Deserialize, Serialize};

/// One summarized cricket match, as produced by the offline preprocessing
/// pass and consumed by the index builder.
///
/// Optional source fields arrive already normalized: absent text fields hold
/// `"Unknown"` and an absent overs count holds 0. Critical fields (both
/// teams, venue, winner) are guaranteed present by construction; records
/// missing them are rejected during preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Source identifier for the match (file stem when the feed omits one).
    pub match_id: String,
    /// First scheduled day of the match.
    pub date: String,
    /// Host city.
    pub city: String,
    /// Ground the match was played at.
    pub venue: String,
    /// Season label, e.g. "2023" or "2007/08".
    pub season: String,
    /// Tournament or series name.
    pub event_name: String,
    /// Format, e.g. "ODI", "T20", "Test".
    pub match_type: String,
    /// Competition gender.
    pub gender: String,
    /// First listed team.
    pub team1: String,
    /// Second listed team.
    pub team2: String,
    /// Toss winner.
    pub toss_winner: String,
    /// Toss decision, "bat" or "field".
    pub toss_decision: String,
    /// Match winner.
    pub winner: String,
    /// Scheduled overs per innings (0 when the feed omits it).
    pub overs: u32,
    /// Player-of-the-match award, comma-joined when shared.
    pub player_of_match: String,
    /// Total runs scored in the first innings, when derivable.
    pub first_innings_runs: Option<u32>,
}

impl MatchSummary {
    /// Renders the fixed-template sentence that gets embedded and indexed
    /// for this match. Pure: identical records produce byte-identical
    /// output, and changing any templated field changes the output.
    pub fn text_repr(&self) -> String {
        format!(
            "Match between {} and {} at {}, on {}. Winner: {}. Player of match: {}. Type: {}, Gender: {}, Season: {}, City: {}.",
            self.team1,
            self.team2,
            self.venue,
            self.date,
            self.winner,
            self.player_of_match,
            self.match_type,
            self.gender,
            self.season,
            self.city,
        )
    }
}

/// Summary row as persisted in the tabular file: the record plus its
/// rendered text representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// The summarized match.
    #[serde(flatten)]
    pub summary: MatchSummary,
    /// Rendered text representation, always equal to `summary.text_repr()`.
    pub text_repr: String,
}

impl SummaryRow {
    /// Builds a row, rendering the text representation from the record.
    pub fn new(summary: MatchSummary) -> Self {
        let text_repr = summary.text_repr();
        Self { summary, text_repr }
    }
}
