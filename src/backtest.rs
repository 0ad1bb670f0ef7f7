use crate::history::{MatchHistory, Outcome};
use crate::markov::{predict_next, MIN_HISTORY};

const BUCKET_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationBucket {
    pub predictions: u32,
    pub wins: u32,
    pub predicted_sum: f64,
}

impl CalibrationBucket {
    pub fn realized_win_rate(&self) -> Option<f64> {
        crate::util::win_rate(self.wins, self.predictions)
    }

    pub fn mean_prediction(&self) -> Option<f64> {
        if self.predictions == 0 { return None; }
        Some(self.predicted_sum / self.predictions as f64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSummary {
    pub predictions: u32,
    pub markov_brier: f64,
    pub baseline_brier: f64,
    pub buckets: [CalibrationBucket; BUCKET_COUNT],
}

impl BacktestSummary {
    // Positive when the chain beats "always predict the win rate so far"
    pub fn skill(&self) -> f64 {
        if self.baseline_brier == 0.0 { return 0.0; }
        1.0 - self.markov_brier / self.baseline_brier
    }

    pub fn bucket_floor(index: usize) -> f64 {
        index as f64 / BUCKET_COUNT as f64
    }
}

/// Walk forward through the history. Every game after the first `warmup` is predicted from the games
/// before it only, then scored.
pub fn backtest_momentum(history: &MatchHistory, warmup: usize) -> Option<BacktestSummary> {
    let outcomes = history.outcomes();
    backtest_outcomes(&outcomes, warmup)
}

pub fn backtest_outcomes(outcomes: &[Outcome], warmup: usize) -> Option<BacktestSummary> {
    let start = warmup.max(MIN_HISTORY);
    if outcomes.len() <= start { return None; }

    let mut buckets = [CalibrationBucket::default(); BUCKET_COUNT];
    let mut markov_error = 0.0;
    let mut baseline_error = 0.0;
    let mut predictions = 0;

    for i in start..outcomes.len() {
        let Some(prediction) = predict_next(&outcomes[..i]).prediction().copied() else { continue; };

        let actual = if outcomes[i].is_win() { 1.0 } else { 0.0 };
        let p = prediction.next_win_probability;

        markov_error += (p - actual).powi(2);
        baseline_error += (prediction.baseline_win_rate - actual).powi(2);

        let bucket_index = ((p * BUCKET_COUNT as f64).floor() as usize).min(BUCKET_COUNT - 1);
        let bucket = &mut buckets[bucket_index];
        bucket.predictions += 1;
        bucket.predicted_sum += p;
        if outcomes[i].is_win() { bucket.wins += 1; }

        predictions += 1;
    }

    if predictions == 0 { return None; }

    Some(BacktestSummary {
        predictions,
        markov_brier: markov_error / predictions as f64,
        baseline_brier: baseline_error / predictions as f64,
        buckets,
    })
}
