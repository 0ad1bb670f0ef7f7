use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::*;

use crate::data_loader::{RawRecord, RawValue};
use crate::util::win_rate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Loss,
}

impl Outcome {
    pub const ALL: [Outcome; 2] = [Outcome::Win, Outcome::Loss];

    // Row/column index in the transition matrix
    pub fn index(self) -> usize {
        match self {
            Outcome::Win => 0,
            Outcome::Loss => 1,
        }
    }

    pub fn is_win(self) -> bool {
        self == Outcome::Win
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Loss => "LOSS",
        }
    }

    pub fn short(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Loss => 'L',
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Share of wins over all games, None when there are none
pub fn overall_win_rate(outcomes: &[Outcome]) -> Option<f64> {
    let wins = outcomes.iter().filter(|o| o.is_win()).count();
    win_rate(wins as u32, outcomes.len() as u32)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub lp_change: i32,
    pub rank: Option<i32>,     // Total LP after the game, when the source had it

    // Derived by the cleaner
    pub date: NaiveDate,
    pub game_index_that_day: u32,
}

/// Cleaned, chronologically ordered match history.
///
/// Only the cleaner builds one, so every instance upholds the ordering and day-index invariants.
/// There are no mutators; analyses borrow it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchHistory {
    records: Vec<MatchRecord>,
}

impl MatchHistory {
    pub(crate) fn from_cleaned(records: Vec<MatchRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        Self { records }
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn outcomes(&self) -> Vec<Outcome> {
        self.records.iter().map(|r| r.outcome).collect()
    }

    pub fn win_rate(&self) -> Option<f64> {
        overall_win_rate(&self.outcomes())
    }

    // Renders the history back into canonical raw rows. Cleaning these reproduces the history.
    pub fn to_raw_records(&self) -> Vec<RawRecord> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, r)| RawRecord {
                row: idx + 1,
                timestamp: Some(RawValue::Text(r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
                result: Some(r.outcome.label().to_string()),
                lp_change: Some(RawValue::Int(r.lp_change as i64)),
                rank: r.rank.map(|rank| RawValue::Int(rank as i64)),
            })
            .collect()
    }
}
