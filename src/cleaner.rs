use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::analysis_context::{AnalysisContext, DayBoundary};
use crate::data_loader::{RawRecord, RawValue};
use crate::history::{MatchHistory, MatchRecord, Outcome};

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

// Why a raw row did not make it into the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DropReason {
    UnparseableTimestamp,
    MissingResult,
    AmbiguousResult,
    Unranked,
    Duplicate,
}

// Fixes applied to rows that were kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RepairRule {
    NormalizeResultAlias,
    DiscardMalformedRank,
    ReorderChronologically,
    DeriveLpChangeFromRank,
    DefaultMissingLpChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedRow {
    pub row: usize,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub kept: usize,
    pub dropped: Vec<DroppedRow>,
    pub repairs: BTreeMap<RepairRule, usize>,
}

impl CleaningReport {
    pub fn dropped_count(&self, reason: DropReason) -> usize {
        self.dropped.iter().filter(|d| d.reason == reason).count()
    }

    pub fn repair_count(&self, rule: RepairRule) -> usize {
        self.repairs.get(&rule).copied().unwrap_or(0)
    }

    pub fn drop_counts(&self) -> BTreeMap<DropReason, usize> {
        let mut counts = BTreeMap::new();
        for d in &self.dropped {
            *counts.entry(d.reason).or_insert(0) += 1;
        }
        counts
    }

    fn record_repair(&mut self, rule: RepairRule, count: usize) {
        if count == 0 { return; }
        *self.repairs.entry(rule).or_insert(0) += count;
    }

    pub fn log(&self) {
        info!(input = self.input_rows, kept = self.kept, dropped = self.dropped.len(), "cleaned match history");
        for (reason, count) in self.drop_counts() {
            warn!(?reason, count, "dropped rows");
        }
        for (rule, count) in &self.repairs {
            info!(?rule, count, "applied repair");
        }
    }
}

// A row that survived parsing but has not been deduplicated, ordered or indexed yet
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    row: usize,
    timestamp: DateTime<Utc>,
    outcome: Outcome,
    lp_change: Option<i32>,
    rank: Option<i32>,
}

/// Turns raw rows into a [`MatchHistory`].
///
/// Bad rows are dropped and listed in the report, never guessed at. Order of operations matters:
/// duplicates are removed in file order first, so the "first occurrence" is the first one in the file,
/// then the survivors are stable sorted, so equal timestamps keep file order.
pub fn clean(raw: Vec<RawRecord>, ctx: &AnalysisContext) -> (MatchHistory, CleaningReport) {
    let mut report = CleaningReport {
        input_rows: raw.len(),
        ..CleaningReport::default()
    };

    let mut candidates = Vec::with_capacity(raw.len());
    let mut aliased = 0;
    let mut malformed_ranks = 0;

    for r in raw {
        let Some(timestamp) = r.timestamp.as_ref().and_then(parse_timestamp) else {
            report.dropped.push(DroppedRow { row: r.row, reason: DropReason::UnparseableTimestamp });
            continue;
        };

        let outcome = match normalize_result(r.result.as_deref()) {
            Ok(parsed) => {
                if parsed.aliased { aliased += 1; }
                parsed.outcome
            }
            Err(reason) => {
                report.dropped.push(DroppedRow { row: r.row, reason });
                continue;
            }
        };

        let rank = match &r.rank {
            None => None,
            Some(value) => {
                let parsed = parse_integer(value);
                if parsed.is_none() { malformed_ranks += 1; }
                parsed
            }
        };

        if ctx.require_rank && rank.is_none() {
            report.dropped.push(DroppedRow { row: r.row, reason: DropReason::Unranked });
            continue;
        }

        candidates.push(Candidate {
            row: r.row,
            timestamp,
            outcome,
            lp_change: r.lp_change.as_ref().and_then(parse_integer),
            rank,
        });
    }
    report.record_repair(RepairRule::NormalizeResultAlias, aliased);
    report.record_repair(RepairRule::DiscardMalformedRank, malformed_ranks);

    let (mut candidates, duplicates) = deduplicate(candidates);
    for row in duplicates {
        report.dropped.push(DroppedRow { row, reason: DropReason::Duplicate });
    }

    let reordered = sort_chronologically(&mut candidates);
    report.record_repair(RepairRule::ReorderChronologically, reordered);

    let fill = fill_lp_changes(&candidates);
    report.record_repair(RepairRule::DeriveLpChangeFromRank, fill.derived);
    report.record_repair(RepairRule::DefaultMissingLpChange, fill.defaulted);

    let records = assign_day_indices(candidates, &fill.values, ctx.day_boundary);
    report.kept = records.len();
    report.dropped.sort_by_key(|d| d.row);

    debug!(kept = report.kept, "built match history");
    (MatchHistory::from_cleaned(records), report)
}

// Accepts unix seconds (whole or fractional, as numbers or text), RFC 3339, or a naive
// "YYYY-MM-DD HH:MM:SS" which is taken as UTC.
pub fn parse_timestamp(value: &RawValue) -> Option<DateTime<Utc>> {
    match value {
        RawValue::Int(secs) => DateTime::<Utc>::from_timestamp(*secs, 0),
        RawValue::Float(secs) => from_fractional_seconds(*secs),
        RawValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() { return None; }

            if let Ok(secs) = text.parse::<i64>() {
                return DateTime::<Utc>::from_timestamp(secs, 0);
            }
            if let Ok(secs) = text.parse::<f64>() {
                return from_fractional_seconds(secs);
            }
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|naive| naive.and_utc())
        }
    }
}

fn from_fractional_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs.abs() > i64::MAX as f64 { return None; }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedResult {
    pub outcome: Outcome,
    pub aliased: bool,      // Spelled some other way than WIN / LOSS
}

pub fn normalize_result(raw: Option<&str>) -> Result<ParsedResult, DropReason> {
    let token = raw.map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return Err(DropReason::MissingResult);
    }

    let upper = token.to_ascii_uppercase();
    let outcome = match upper.as_str() {
        "WIN" | "WON" | "W" | "VICTORY" | "1" => Outcome::Win,
        "LOSS" | "LOST" | "L" | "DEFEAT" | "0" => Outcome::Loss,
        _ => return Err(DropReason::AmbiguousResult),
    };

    Ok(ParsedResult {
        outcome,
        aliased: token != outcome.label(),
    })
}

pub fn parse_integer(value: &RawValue) -> Option<i32> {
    match value {
        RawValue::Int(i) => i32::try_from(*i).ok(),
        RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= i32::MAX as f64 => Some(*f as i32),
        RawValue::Float(_) => None,
        RawValue::Text(text) => text.trim().parse::<i32>().ok(),
    }
}

// Keeps the first row of every (timestamp, outcome) pair. Returns the survivors and the rows that were dropped.
fn deduplicate(candidates: Vec<Candidate>) -> (Vec<Candidate>, Vec<usize>) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(candidates.len());
    let mut duplicates = Vec::new();

    for c in candidates {
        if seen.insert((c.timestamp, c.outcome)) {
            kept.push(c);
        } else {
            duplicates.push(c.row);
        }
    }
    (kept, duplicates)
}

// Stable sort by timestamp. Returns how many rows were behind an earlier row in the input.
fn sort_chronologically(candidates: &mut [Candidate]) -> usize {
    let mut latest: Option<DateTime<Utc>> = None;
    let mut out_of_order = 0;
    for c in candidates.iter() {
        match latest {
            Some(l) if c.timestamp < l => out_of_order += 1,
            _ => latest = Some(c.timestamp),
        }
    }

    candidates.sort_by_key(|c| c.timestamp);
    out_of_order
}

struct LpFill {
    values: Vec<i32>,
    derived: usize,
    defaulted: usize,
}

// A missing delta comes from the rank difference to the previous game when both ranks are known, else 0.
fn fill_lp_changes(candidates: &[Candidate]) -> LpFill {
    let mut fill = LpFill { values: Vec::with_capacity(candidates.len()), derived: 0, defaulted: 0 };

    for (idx, c) in candidates.iter().enumerate() {
        if let Some(change) = c.lp_change {
            fill.values.push(change);
            continue;
        }

        let previous_rank = idx.checked_sub(1).and_then(|p| candidates[p].rank);
        match (previous_rank, c.rank) {
            (Some(before), Some(after)) => {
                fill.values.push(after.saturating_sub(before));
                fill.derived += 1;
            }
            _ => {
                fill.values.push(0);
                fill.defaulted += 1;
            }
        }
    }
    fill
}

fn assign_day_indices(candidates: Vec<Candidate>, lp_changes: &[i32], boundary: DayBoundary) -> Vec<MatchRecord> {
    let mut records: Vec<MatchRecord> = Vec::with_capacity(candidates.len());

    for (c, &lp_change) in candidates.into_iter().zip(lp_changes) {
        let date = boundary.date_of(&c.timestamp);
        let game_index_that_day = match records.last() {
            Some(prev) if prev.date == date => prev.game_index_that_day + 1,
            _ => 1,
        };

        records.push(MatchRecord {
            timestamp: c.timestamp,
            outcome: c.outcome,
            lp_change,
            rank: c.rank,
            date,
            game_index_that_day,
        });
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ctx() -> AnalysisContext {
        AnalysisContext { day_boundary: DayBoundary::utc(), ..AnalysisContext::default() }
    }

    fn raw(row: usize, ts: i64, result: &str) -> RawRecord {
        RawRecord {
            row,
            timestamp: Some(RawValue::Int(ts)),
            result: Some(result.to_string()),
            ..RawRecord::default()
        }
    }

    fn ranked(row: usize, ts: i64, result: &str, rank: i64) -> RawRecord {
        RawRecord { rank: Some(RawValue::Int(rank)), ..raw(row, ts, result) }
    }

    const DAY: i64 = 24 * 60 * 60;
    const BASE: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z

    #[test]
    fn parses_supported_timestamp_shapes() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let noon = BASE + 12 * 3600;

        assert_eq!(parse_timestamp(&RawValue::Int(noon)), Some(expected));
        assert_eq!(parse_timestamp(&RawValue::Text(format!(" {noon} "))), Some(expected));
        assert_eq!(parse_timestamp(&RawValue::Text("2024-01-01T12:00:00Z".into())), Some(expected));
        assert_eq!(parse_timestamp(&RawValue::Text("2024-01-01T13:00:00+01:00".into())), Some(expected));
        assert_eq!(parse_timestamp(&RawValue::Text("2024-01-01 12:00:00".into())), Some(expected));
        assert_eq!(parse_timestamp(&RawValue::Text("2024-01-01T12:00:00".into())), Some(expected));

        let half = parse_timestamp(&RawValue::Float(noon as f64 + 0.5)).unwrap();
        assert_eq!(half.timestamp(), noon);
        assert_eq!(half.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert_eq!(parse_timestamp(&RawValue::Text("yesterday".into())), None);
        assert_eq!(parse_timestamp(&RawValue::Text("   ".into())), None);
        assert_eq!(parse_timestamp(&RawValue::Text("NaN".into())), None);
        assert_eq!(parse_timestamp(&RawValue::Float(f64::INFINITY)), None);
        assert_eq!(parse_timestamp(&RawValue::Int(i64::MAX)), None);
    }

    #[test]
    fn normalizes_result_aliases() {
        let win = normalize_result(Some("WIN")).unwrap();
        assert_eq!(win.outcome, Outcome::Win);
        assert!(!win.aliased);

        for token in ["WON", "won", " w ", "Victory", "1"] {
            let parsed = normalize_result(Some(token)).unwrap();
            assert_eq!(parsed.outcome, Outcome::Win, "{token}");
            assert!(parsed.aliased);
        }
        for token in ["LOSS", "LOST", "l", "defeat", "0"] {
            assert_eq!(normalize_result(Some(token)).unwrap().outcome, Outcome::Loss, "{token}");
        }
    }

    #[test]
    fn missing_and_ambiguous_results_are_not_guessed() {
        assert_eq!(normalize_result(None), Err(DropReason::MissingResult));
        assert_eq!(normalize_result(Some("  ")), Err(DropReason::MissingResult));
        assert_eq!(normalize_result(Some("REMAKE")), Err(DropReason::AmbiguousResult));
        assert_eq!(normalize_result(Some("draw")), Err(DropReason::AmbiguousResult));
    }

    #[test]
    fn parses_integers_strictly() {
        assert_eq!(parse_integer(&RawValue::Int(-17)), Some(-17));
        assert_eq!(parse_integer(&RawValue::Float(22.0)), Some(22));
        assert_eq!(parse_integer(&RawValue::Float(22.5)), None);
        assert_eq!(parse_integer(&RawValue::Text(" +19 ".into())), Some(19));
        assert_eq!(parse_integer(&RawValue::Text("n/a".into())), None);
        assert_eq!(parse_integer(&RawValue::Int(i64::MAX)), None);
    }

    #[test]
    fn duplicate_rows_collapse_to_first_occurrence() {
        let input = vec![
            ranked(1, BASE, "WON", 100),
            ranked(2, BASE, "WON", 999),
            raw(3, BASE, "LOST"),
        ];

        let (history, report) = clean(input, &ctx());
        assert_eq!(history.len(), 2);
        assert_eq!(history.records()[0].rank, Some(100));
        assert_eq!(history.records()[1].outcome, Outcome::Loss);
        assert_eq!(report.dropped, vec![DroppedRow { row: 2, reason: DropReason::Duplicate }]);
    }

    #[test]
    fn unparseable_timestamp_is_dropped_and_counted() {
        let mut bad = raw(2, 0, "WON");
        bad.timestamp = Some(RawValue::Text("not a date".into()));
        let mut missing_both = RawRecord { row: 3, ..RawRecord::default() };
        missing_both.result = None;

        let (history, report) = clean(vec![raw(1, BASE, "WON"), bad, missing_both], &ctx());
        assert_eq!(history.len(), 1);
        assert_eq!(report.dropped_count(DropReason::UnparseableTimestamp), 2);
        assert_eq!(report.input_rows, 3);
        assert_eq!(report.kept, 1);
    }

    #[test]
    fn ambiguous_results_are_excluded() {
        let mut no_result = raw(2, BASE + 60, "");
        no_result.result = None;
        let input = vec![raw(1, BASE, "WON"), no_result, raw(3, BASE + 120, "REMAKE")];

        let (history, report) = clean(input, &ctx());
        assert_eq!(history.len(), 1);
        assert_eq!(report.dropped_count(DropReason::MissingResult), 1);
        assert_eq!(report.dropped_count(DropReason::AmbiguousResult), 1);
    }

    #[test]
    fn sorts_by_time_and_keeps_file_order_on_ties() {
        let input = vec![
            raw(1, BASE + 300, "WON"),
            raw(2, BASE, "LOST"),
            raw(3, BASE + 300, "LOST"),
            raw(4, BASE + 100, "WON"),
        ];

        let (history, report) = clean(input, &ctx());
        let order: Vec<(i64, Outcome)> = history.records().iter().map(|r| (r.timestamp.timestamp() - BASE, r.outcome)).collect();
        assert_eq!(order, vec![(0, Outcome::Loss), (100, Outcome::Win), (300, Outcome::Win), (300, Outcome::Loss)]);
        assert_eq!(report.repair_count(RepairRule::ReorderChronologically), 2);
    }

    #[test]
    fn day_index_restarts_each_day() {
        let input = vec![
            raw(1, BASE + 10 * 3600, "WON"),
            raw(2, BASE + 11 * 3600, "LOST"),
            raw(3, BASE + 23 * 3600, "WON"),
            raw(4, BASE + DAY + 3600, "LOST"),
            raw(5, BASE + 3 * DAY, "WON"),
            raw(6, BASE + 3 * DAY + 60, "WON"),
        ];

        let (history, _) = clean(input, &ctx());
        let indices: Vec<u32> = history.records().iter().map(|r| r.game_index_that_day).collect();
        assert_eq!(indices, vec![1, 2, 3, 1, 1, 2]);
        assert_eq!(history.records()[3].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn derives_missing_lp_change_from_rank() {
        let mut explicit = ranked(3, BASE + 200, "WON", 140);
        explicit.lp_change = Some(RawValue::Text("25".into()));
        let input = vec![
            ranked(1, BASE, "WON", 100),
            ranked(2, BASE + 100, "WON", 121),
            explicit,
            raw(4, BASE + 300, "LOST"),
        ];

        let (history, report) = clean(input, &ctx());
        let changes: Vec<i32> = history.records().iter().map(|r| r.lp_change).collect();
        assert_eq!(changes, vec![0, 21, 25, 0]);
        assert_eq!(report.repair_count(RepairRule::DeriveLpChangeFromRank), 1);
        assert_eq!(report.repair_count(RepairRule::DefaultMissingLpChange), 2);
    }

    #[test]
    fn malformed_rank_is_discarded_not_fatal() {
        let mut odd = raw(1, BASE, "WON");
        odd.rank = Some(RawValue::Text("Gold II".into()));

        let (history, report) = clean(vec![odd], &ctx());
        assert_eq!(history.records()[0].rank, None);
        assert_eq!(report.repair_count(RepairRule::DiscardMalformedRank), 1);
    }

    #[test]
    fn require_rank_drops_unranked_rows() {
        let ctx = AnalysisContext { require_rank: true, ..ctx() };
        let (history, report) = clean(vec![ranked(1, BASE, "WON", 50), raw(2, BASE + 60, "LOST")], &ctx);
        assert_eq!(history.len(), 1);
        assert_eq!(report.dropped_count(DropReason::Unranked), 1);
    }

    #[test]
    fn cleaning_a_clean_history_is_identity() {
        let input = vec![
            ranked(1, BASE + 500, "won", 120),
            ranked(2, BASE, "LOST", 100),
            ranked(3, BASE + 500, "WON", 120),
            raw(4, BASE + DAY, "L"),
        ];

        let (first, _) = clean(input, &ctx());
        let (second, report) = clean(first.to_raw_records(), &ctx());
        assert_eq!(first, second);
        assert!(report.dropped.is_empty());
        assert!(report.repairs.is_empty());
    }

    #[test]
    fn random_histories_hold_invariants() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let rows = rng.random_range(0..200);
            let input: Vec<RawRecord> = (0..rows)
                .map(|row| {
                    let ts = BASE + rng.random_range(0..10 * DAY);
                    let result = if rng.random_bool(0.5) { "WON" } else { "LOST" };
                    raw(row + 1, ts, result)
                })
                .collect();

            let (a, report) = clean(input.clone(), &ctx());
            let (b, _) = clean(input, &ctx());
            assert_eq!(a, b);
            assert_eq!(report.kept + report.dropped.len(), report.input_rows);

            let records = a.records();
            assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
            for (idx, r) in records.iter().enumerate() {
                let expected = match idx.checked_sub(1).map(|p| &records[p]) {
                    Some(prev) if prev.date == r.date => prev.game_index_that_day + 1,
                    _ => 1,
                };
                assert_eq!(r.game_index_that_day, expected);
            }

            let (again, _) = clean(a.to_raw_records(), &ctx());
            assert_eq!(a, again);
        }
    }
}
