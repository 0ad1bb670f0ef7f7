use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::error::{AnalysisError, Result};

// Where one calendar day ends and the next begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBoundary {
    Local,
    Fixed(FixedOffset),
}

impl DayBoundary {
    pub fn utc() -> Self {
        DayBoundary::Fixed(Utc.fix())
    }

    pub fn date_of(&self, timestamp: &DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => timestamp.with_timezone(&chrono::Local).date_naive(),
            DayBoundary::Fixed(offset) => timestamp.with_timezone(offset).date_naive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,

    pub day_boundary: DayBoundary,
    pub require_rank: bool,         // Drop rows without an LP snapshot

    pub history_length: usize,      // Depth of the pattern table. 1 is plain "last game"
    pub backtest_warmup: usize,

    pub min_bucket_games: u32,      // Buckets below this are flagged as low-sample
    pub reference_win_rate: f64,

    pub target_date: Option<NaiveDate>,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/match_history.json"),
            output_dir: PathBuf::from("out"),

            day_boundary: DayBoundary::Local,
            require_rank: false,

            history_length: 1,
            backtest_warmup: 10,

            min_bucket_games: 5,
            reference_win_rate: 0.5,

            target_date: None,
        }
    }
}

impl AnalysisContext {
    pub fn validate(&self) -> Result<()> {
        if !(1..=8).contains(&self.history_length) {
            return Err(AnalysisError::Config(format!(
                "history_length must be between 1 and 8, got {}",
                self.history_length
            )));
        }
        if self.backtest_warmup < 2 {
            return Err(AnalysisError::Config(format!(
                "backtest_warmup must be at least 2, got {}",
                self.backtest_warmup
            )));
        }
        if !(0.0..=1.0).contains(&self.reference_win_rate) {
            return Err(AnalysisError::Config(format!(
                "reference_win_rate must be a probability, got {}",
                self.reference_win_rate
            )));
        }
        Ok(())
    }

    pub fn is_low_sample(&self, games: u32) -> bool {
        games < self.min_bucket_games
    }
}
