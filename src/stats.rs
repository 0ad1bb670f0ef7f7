use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::*;

use crate::history::{MatchHistory, Outcome};
use crate::util::{mean, win_rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub games: u32,
    pub wins: u32,
}

impl DailyStat {
    pub fn win_rate(&self) -> Option<f64> {
        win_rate(self.wins, self.games)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketStat {
    pub key: u32,
    pub games: u32,
    pub wins: u32,
}

impl BucketStat {
    pub fn win_rate(&self) -> Option<f64> {
        win_rate(self.wins, self.games)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeStat {
    pub games_per_day: u32,
    pub days: u32,
    pub mean_win_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LpPoint {
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub lp_change: i32,
    pub cumulative_lp: i64,
    pub rank: Option<i32>,
}

pub fn daily_stats(history: &MatchHistory) -> Vec<DailyStat> {
    let mut days: BTreeMap<NaiveDate, DailyStat> = BTreeMap::new();
    for r in history.records() {
        let day = days.entry(r.date).or_insert(DailyStat { date: r.date, games: 0, wins: 0 });
        day.games += 1;
        if r.outcome.is_win() { day.wins += 1; }
    }
    days.into_values().collect()
}

pub fn daily_stat_for(history: &MatchHistory, date: NaiveDate) -> Option<DailyStat> {
    daily_stats(history).into_iter().find(|d| d.date == date)
}

// Win rate of the Nth game of the day, for every N that occurs
pub fn fatigue_curve(history: &MatchHistory) -> Vec<BucketStat> {
    let mut buckets: BTreeMap<u32, BucketStat> = BTreeMap::new();
    for r in history.records() {
        let key = r.game_index_that_day;
        let bucket = buckets.entry(key).or_insert(BucketStat { key, games: 0, wins: 0 });
        bucket.games += 1;
        if r.outcome.is_win() { bucket.wins += 1; }
    }
    buckets.into_values().collect()
}

// Days grouped by how many games were played on them. Each day counts once, whatever its volume.
pub fn volume_curve(history: &MatchHistory) -> Vec<VolumeStat> {
    let mut by_volume: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for day in daily_stats(history) {
        if let Some(rate) = day.win_rate() {
            by_volume.entry(day.games).or_default().push(rate);
        }
    }

    by_volume
        .into_iter()
        .filter_map(|(games_per_day, rates)| {
            Some(VolumeStat {
                games_per_day,
                days: rates.len() as u32,
                mean_win_rate: mean(&rates)?,
            })
        })
        .collect()
}

pub fn lp_trend(history: &MatchHistory) -> Vec<LpPoint> {
    let mut cumulative_lp = 0i64;
    history
        .records()
        .iter()
        .map(|r| {
            cumulative_lp += r.lp_change as i64;
            LpPoint {
                timestamp: r.timestamp,
                outcome: r.outcome,
                lp_change: r.lp_change,
                cumulative_lp,
                rank: r.rank,
            }
        })
        .collect()
}
