use std::collections::BTreeMap;

use crate::history::{overall_win_rate, MatchHistory, Outcome};
use crate::util::win_rate;

// Fewest games that contain at least one transition
pub const MIN_HISTORY: usize = 2;

/// First-order transition matrix over {Win, Loss}, fitted by counting consecutive pairs.
///
/// A state that never appears as a predecessor gets the history's overall win rate for its row,
/// so every row is a proper distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionMatrix {
    counts: [[u32; 2]; 2],
    probabilities: [[f64; 2]; 2],
    fallback: [bool; 2],
    base_win_rate: f64,
}

impl TransitionMatrix {
    pub fn fit(outcomes: &[Outcome]) -> Option<Self> {
        if outcomes.len() < MIN_HISTORY { return None; }

        let mut counts = [[0u32; 2]; 2];
        for pair in outcomes.windows(2) {
            counts[pair[0].index()][pair[1].index()] += 1;
        }

        let base = overall_win_rate(outcomes)?;

        let mut probabilities = [[0.0; 2]; 2];
        let mut fallback = [false; 2];
        for from in Outcome::ALL {
            let i = from.index();
            let total = counts[i][0] + counts[i][1];

            if total == 0 {
                probabilities[i] = [base, 1.0 - base];
                fallback[i] = true;
            } else {
                probabilities[i] = [counts[i][0] as f64 / total as f64, counts[i][1] as f64 / total as f64];
            }
        }

        Some(Self { counts, probabilities, fallback, base_win_rate: base })
    }

    pub fn probability(&self, from: Outcome, to: Outcome) -> f64 {
        self.probabilities[from.index()][to.index()]
    }

    pub fn win_probability_after(&self, from: Outcome) -> f64 {
        self.probability(from, Outcome::Win)
    }

    pub fn transitions(&self, from: Outcome, to: Outcome) -> u32 {
        self.counts[from.index()][to.index()]
    }

    pub fn row_total(&self, from: Outcome) -> u32 {
        self.counts[from.index()].iter().sum()
    }

    // Win rate of the fitted games, also what fallback rows use
    pub fn overall_win_rate(&self) -> f64 {
        self.base_win_rate
    }

    // True when the row came from the overall win rate rather than observed transitions
    pub fn is_fallback(&self, from: Outcome) -> bool {
        self.fallback[from.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumPrediction {
    pub matrix: TransitionMatrix,
    pub last_outcome: Outcome,
    pub next_win_probability: f64,
    pub baseline_win_rate: f64,
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MomentumEstimate {
    InsufficientData { observed: usize, required: usize },
    Estimated(MomentumPrediction),
}

impl MomentumEstimate {
    pub fn prediction(&self) -> Option<&MomentumPrediction> {
        match self {
            MomentumEstimate::Estimated(p) => Some(p),
            MomentumEstimate::InsufficientData { .. } => None,
        }
    }
}

pub fn estimate_momentum(history: &MatchHistory) -> MomentumEstimate {
    predict_next(&history.outcomes())
}

pub fn predict_next(outcomes: &[Outcome]) -> MomentumEstimate {
    let (Some(matrix), Some(&last_outcome)) = (TransitionMatrix::fit(outcomes), outcomes.last()) else {
        return MomentumEstimate::InsufficientData { observed: outcomes.len(), required: MIN_HISTORY };
    };

    MomentumEstimate::Estimated(MomentumPrediction {
        matrix,
        last_outcome,
        next_win_probability: matrix.win_probability_after(last_outcome),
        baseline_win_rate: matrix.overall_win_rate(),
        sample_size: outcomes.len(),
    })
}

// Win rate of the next game given the `pattern.len()` games before it. The pattern is most recent first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternStat {
    pub pattern: Vec<Outcome>,
    pub games: u32,
    pub wins: u32,
}

impl PatternStat {
    pub fn win_rate(&self) -> Option<f64> {
        win_rate(self.wins, self.games)
    }

    // "W-L-L" reads newest to oldest
    pub fn label(&self) -> String {
        self.pattern.iter().map(|o| o.short().to_string()).collect::<Vec<_>>().join("-")
    }
}

pub fn pattern_win_rates(outcomes: &[Outcome], depth: usize) -> Option<Vec<PatternStat>> {
    if depth == 0 || outcomes.len() <= depth { return None; }

    let mut table: BTreeMap<Vec<Outcome>, (u32, u32)> = BTreeMap::new();
    for i in depth..outcomes.len() {
        let pattern: Vec<Outcome> = outcomes[i - depth..i].iter().rev().copied().collect();
        let entry = table.entry(pattern).or_insert((0, 0));
        entry.0 += 1;
        if outcomes[i].is_win() { entry.1 += 1; }
    }

    Some(table
        .into_iter()
        .map(|(pattern, (games, wins))| PatternStat { pattern, games, wins })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    pub outcome: Outcome,
    pub length: usize,
}

// The run the history currently ends on
pub fn current_streak(outcomes: &[Outcome]) -> Option<Streak> {
    let &last = outcomes.last()?;
    let length = outcomes.iter().rev().take_while(|&&o| o == last).count();
    Some(Streak { outcome: last, length })
}

pub fn longest_streak(outcomes: &[Outcome], outcome: Outcome) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for &o in outcomes {
        if o == outcome {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}
