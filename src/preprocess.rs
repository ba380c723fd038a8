//! Parsing of structured per-match files into summary records.
//!
//! The source feed is the cricsheet-style layout: an `info` object carrying
//! match facts plus an `innings` array of per-over deliveries. Only the
//! fields the pipeline consumes are modeled; everything else is ignored.

use std::fmt;

use serde::Deserialize;

use crate::summary::MatchSummary;

/// Sentinel stored for optional fields the source feed left blank.
pub const UNKNOWN: &str = "Unknown";

/// Error building a summary record from one match file.
#[derive(Debug)]
pub enum SummaryError {
    /// The file was not valid match JSON.
    Parse(serde_json::Error),
    /// A critical field was absent; the record cannot be summarized.
    MissingField(&'static str),
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid match JSON: {err}"),
            Self::MissingField(field) => write!(f, "missing critical field '{field}'"),
        }
    }
}

impl std::error::Error for SummaryError {}

#[derive(Debug, Default, Deserialize)]
struct RawMatch {
    #[serde(default)]
    info: RawInfo,
    #[serde(default)]
    innings: Vec<RawInnings>,
}

#[derive(Debug, Default, Deserialize)]
struct RawInfo {
    match_id: Option<Label>,
    venue: Option<String>,
    match_type: Option<String>,
    gender: Option<String>,
    city: Option<String>,
    season: Option<Label>,
    event: Option<RawEvent>,
    #[serde(default)]
    dates: Vec<String>,
    #[serde(default)]
    teams: Vec<String>,
    toss: Option<RawToss>,
    outcome: Option<RawOutcome>,
    overs: Option<u32>,
    #[serde(default)]
    player_of_match: Vec<String>,
}

/// Feed values that may arrive as either a string or a bare number
/// (seasons like `"2007/08"` vs `2023`).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Label {
    Text(String),
    Number(serde_json::Number),
}

impl Label {
    fn into_string(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawToss {
    winner: Option<String>,
    decision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOutcome {
    winner: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInnings {
    #[serde(default)]
    overs: Vec<RawOver>,
}

#[derive(Debug, Deserialize)]
struct RawOver {
    #[serde(default)]
    deliveries: Vec<RawDelivery>,
}

#[derive(Debug, Deserialize)]
struct RawDelivery {
    runs: Option<RawRuns>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRuns {
    #[serde(default)]
    total: u32,
}

/// Parses one raw match file into a summary record.
///
/// Critical fields (both teams, venue, winner) must be present or the
/// record is rejected with [`SummaryError::MissingField`]; every other
/// text field falls back to the [`UNKNOWN`] sentinel. `fallback_id` is
/// used as the match id when the feed carries none (typically the source
/// file stem).
pub fn parse_match(raw: &str, fallback_id: &str) -> Result<MatchSummary, SummaryError> {
    let parsed: RawMatch = serde_json::from_str(raw).map_err(SummaryError::Parse)?;
    let info = parsed.info;

    let mut teams = info.teams.into_iter();
    let team1 = required(teams.next(), "team1")?;
    let team2 = required(teams.next(), "team2")?;
    let venue = required(info.venue, "venue")?;
    let winner = required(info.outcome.and_then(|outcome| outcome.winner), "winner")?;

    let match_id = info
        .match_id
        .map(Label::into_string)
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| fallback_id.to_string());
    let (toss_winner, toss_decision) = match info.toss {
        Some(toss) => (or_unknown(toss.winner), or_unknown(toss.decision)),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };
    let player_of_match = if info.player_of_match.is_empty() {
        UNKNOWN.to_string()
    } else {
        info.player_of_match.join(", ")
    };

    Ok(MatchSummary {
        match_id,
        date: or_unknown(info.dates.into_iter().next()),
        city: or_unknown(info.city),
        venue,
        season: or_unknown(info.season.map(Label::into_string)),
        event_name: or_unknown(info.event.and_then(|event| event.name)),
        match_type: or_unknown(info.match_type),
        gender: or_unknown(info.gender),
        team1,
        team2,
        toss_winner,
        toss_decision,
        winner,
        overs: info.overs.unwrap_or(0),
        player_of_match,
        first_innings_runs: first_innings_runs(&parsed.innings),
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, SummaryError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(SummaryError::MissingField(field)),
    }
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Sums the run total of every delivery in the first innings. `None` when
/// the file carries no innings at all; an innings without deliveries sums
/// to zero.
fn first_innings_runs(innings: &[RawInnings]) -> Option<u32> {
    let first = innings.first()?;
    let mut total = 0u32;
    for over in &first.overs {
        for delivery in &over.deliveries {
            if let Some(runs) = &delivery.runs {
                total += runs.total;
            }
        }
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn full_match_json() -> String {
        json!({
            "info": {
                "venue": "MCG",
                "match_type": "ODI",
                "gender": "male",
                "city": "Melbourne",
                "season": "2023",
                "event": { "name": "Australia tour of India" },
                "dates": ["2023-03-10", "2023-03-11"],
                "teams": ["India", "Australia"],
                "toss": { "winner": "India", "decision": "bat" },
                "outcome": { "winner": "India" },
                "overs": 50,
                "player_of_match": ["V Kohli"]
            },
            "innings": [
                {
                    "team": "India",
                    "overs": [
                        { "over": 0, "deliveries": [
                            { "runs": { "batter": 4, "extras": 0, "total": 4 } },
                            { "runs": { "batter": 1, "extras": 1, "total": 2 } }
                        ]},
                        { "over": 1, "deliveries": [
                            { "runs": { "batter": 6, "extras": 0, "total": 6 } }
                        ]}
                    ]
                },
                {
                    "team": "Australia",
                    "overs": [
                        { "over": 0, "deliveries": [
                            { "runs": { "batter": 4, "extras": 0, "total": 4 } }
                        ]}
                    ]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn parses_complete_match() {
        let summary = parse_match(&full_match_json(), "1381218").expect("parse");
        assert_eq!(summary.match_id, "1381218");
        assert_eq!(summary.date, "2023-03-10");
        assert_eq!(summary.venue, "MCG");
        assert_eq!(summary.team1, "India");
        assert_eq!(summary.team2, "Australia");
        assert_eq!(summary.winner, "India");
        assert_eq!(summary.toss_winner, "India");
        assert_eq!(summary.toss_decision, "bat");
        assert_eq!(summary.event_name, "Australia tour of India");
        assert_eq!(summary.overs, 50);
        assert_eq!(summary.player_of_match, "V Kohli");
        assert_eq!(summary.first_innings_runs, Some(12));
    }

    #[test]
    fn missing_winner_is_rejected() {
        let raw = json!({
            "info": {
                "venue": "Eden Gardens",
                "teams": ["India", "England"],
                "outcome": { "result": "no result" }
            }
        })
        .to_string();
        match parse_match(&raw, "x").expect_err("winner required") {
            SummaryError::MissingField(field) => assert_eq!(field, "winner"),
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn missing_second_team_is_rejected() {
        let raw = json!({
            "info": {
                "venue": "Eden Gardens",
                "teams": ["India"],
                "outcome": { "winner": "India" }
            }
        })
        .to_string();
        match parse_match(&raw, "x").expect_err("two teams required") {
            SummaryError::MissingField(field) => assert_eq!(field, "team2"),
            other => panic!("expected missing field, got {other:?}"),
        }
    }

    #[test]
    fn optional_fields_fall_back_to_sentinel() {
        let raw = json!({
            "info": {
                "venue": "Lord's",
                "teams": ["England", "Australia"],
                "outcome": { "winner": "England" }
            }
        })
        .to_string();
        let summary = parse_match(&raw, "ashes-1").expect("parse");
        assert_eq!(summary.match_id, "ashes-1");
        assert_eq!(summary.date, UNKNOWN);
        assert_eq!(summary.city, UNKNOWN);
        assert_eq!(summary.season, UNKNOWN);
        assert_eq!(summary.event_name, UNKNOWN);
        assert_eq!(summary.match_type, UNKNOWN);
        assert_eq!(summary.gender, UNKNOWN);
        assert_eq!(summary.toss_winner, UNKNOWN);
        assert_eq!(summary.toss_decision, UNKNOWN);
        assert_eq!(summary.player_of_match, UNKNOWN);
        assert_eq!(summary.overs, 0);
        assert_eq!(summary.first_innings_runs, None);
    }

    #[test]
    fn numeric_season_and_shared_award_are_normalized() {
        let raw = json!({
            "info": {
                "venue": "Wankhede Stadium",
                "season": 2019,
                "teams": ["Mumbai Indians", "Chennai Super Kings"],
                "outcome": { "winner": "Mumbai Indians" },
                "player_of_match": ["JJ Bumrah", "HH Pandya"]
            }
        })
        .to_string();
        let summary = parse_match(&raw, "ipl-final").expect("parse");
        assert_eq!(summary.season, "2019");
        assert_eq!(summary.player_of_match, "JJ Bumrah, HH Pandya");
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        match parse_match("not json", "x").expect_err("parse must fail") {
            SummaryError::Parse(_) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
