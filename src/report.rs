use crate::analysis_context::AnalysisContext;
use crate::backtest::{BacktestSummary, CalibrationBucket};
use crate::cleaner::CleaningReport;
use crate::history::{MatchHistory, Outcome};
use crate::markov::*;
use crate::stats::*;
use crate::util::percent;

fn heading(title: &str) {
    println!();
    println!("{}", "=".repeat(48));
    println!("{title}");
    println!("{}", "=".repeat(48));
}

fn rate_cell(rate: Option<f64>) -> String {
    match rate {
        Some(r) => format!("{:6.2}%", percent(r)),
        None => "    n/a".to_string(),
    }
}

fn sample_flag(games: u32, ctx: &AnalysisContext) -> &'static str {
    if ctx.is_low_sample(games) { " (low sample)" } else { "" }
}

pub fn output_report(
    history: &MatchHistory,
    cleaning: &CleaningReport,
    momentum: &MomentumEstimate,
    backtest: Option<&BacktestSummary>,
    ctx: &AnalysisContext,
) {
    output_cleaning(cleaning);

    if history.is_empty() {
        heading("NO DATA");
        println!("Insufficient data: no games survived cleaning.");
        return;
    }

    output_daily(history, ctx);
    output_game_numbers(history, ctx);
    output_patterns(history, ctx);
    output_volume(history, ctx);
    output_momentum(history, momentum);
    output_backtest(backtest);
}

fn output_cleaning(cleaning: &CleaningReport) {
    heading("0. CLEANING SUMMARY");
    println!("Rows read: {0:5} | Kept: {1:5} | Dropped: {2:5}", cleaning.input_rows, cleaning.kept, cleaning.dropped.len());
    for (reason, count) in cleaning.drop_counts() {
        println!("  dropped  {0:24} {1:5}", format!("{reason:?}"), count);
    }
    for (rule, count) in &cleaning.repairs {
        println!("  repaired {0:24} {1:5}", format!("{rule:?}"), count);
    }
}

fn output_daily(history: &MatchHistory, ctx: &AnalysisContext) {
    match ctx.target_date {
        Some(date) => {
            heading(&format!("1. DAILY WIN RATE STATS (Date: {date})"));
            match daily_stat_for(history, date) {
                Some(d) => println!("{0} | Games {1:3} | Win rate {2}", d.date, d.games, rate_cell(d.win_rate())),
                None => println!("(!) No data found for date: {date}"),
            }
        }
        None => {
            heading("1. DAILY WIN RATE STATS (All Time)");
            for d in daily_stats(history) {
                println!("{0} | Games {1:3} | Win rate {2}", d.date, d.games, rate_cell(d.win_rate()));
            }
        }
    }
}

fn output_game_numbers(history: &MatchHistory, ctx: &AnalysisContext) {
    heading("2. STATS BY GAME SEQUENCE NUMBER");
    for b in fatigue_curve(history) {
        println!("Game {0:3} | Games {1:4} | Win rate {2}{3}", b.key, b.games, rate_cell(b.win_rate()), sample_flag(b.games, ctx));
    }
}

fn output_patterns(history: &MatchHistory, ctx: &AnalysisContext) {
    heading(&format!("3. SEQUENCE PROBABILITIES (History Length: {})", ctx.history_length));
    match pattern_win_rates(&history.outcomes(), ctx.history_length) {
        Some(table) => {
            println!("(most recent game first)");
            for stat in table {
                println!("{0:16} | Games {1:4} | Next win {2}{3}",
                    stat.label(),
                    stat.games,
                    rate_cell(stat.win_rate()),
                    sample_flag(stat.games, ctx),
                );
            }
        }
        None => println!("Insufficient data: need more than {} games.", ctx.history_length),
    }
}

fn output_volume(history: &MatchHistory, ctx: &AnalysisContext) {
    heading("4. WIN RATE BY DAILY VOLUME");
    for v in volume_curve(history) {
        println!("{0:3} games/day | Days {1:4} | Win rate {2}{3}",
            v.games_per_day,
            v.days,
            rate_cell(Some(v.mean_win_rate)),
            sample_flag(v.days, ctx),
        );
    }
}

fn output_momentum(history: &MatchHistory, momentum: &MomentumEstimate) {
    heading("5. MOMENTUM (MARKOV CHAIN)");

    println!("Games {0:5} | Overall win rate {1}", history.len(), rate_cell(history.win_rate()));

    let outcomes = history.outcomes();
    if let Some(streak) = current_streak(&outcomes) {
        println!("Current streak: {} x {}", streak.length, streak.outcome);
    }
    println!("Longest win streak: {} | Longest loss streak: {}",
        longest_streak(&outcomes, Outcome::Win),
        longest_streak(&outcomes, Outcome::Loss),
    );

    match momentum {
        MomentumEstimate::InsufficientData { observed, required } => {
            println!("Insufficient data: {observed} game(s), need at least {required}.");
        }
        MomentumEstimate::Estimated(p) => {
            println!("{0:12} | {1:>8} | {2:>8} | {3:>5}", "After", "P(WIN)", "P(LOSS)", "n");
            for from in Outcome::ALL {
                println!("{0:12} | {1:>8} | {2:>8} | {3:5}{4}",
                    from.label(),
                    rate_cell(Some(p.matrix.probability(from, Outcome::Win))),
                    rate_cell(Some(p.matrix.probability(from, Outcome::Loss))),
                    p.matrix.row_total(from),
                    if p.matrix.is_fallback(from) { " (overall win rate)" } else { "" },
                );
            }
            println!("Fitted on {} games | Last game: {} | Baseline win rate {} | P(next game is WIN) {}",
                p.sample_size,
                p.last_outcome,
                rate_cell(Some(p.baseline_win_rate)),
                rate_cell(Some(p.next_win_probability)),
            );
        }
    }
}

fn output_backtest(backtest: Option<&BacktestSummary>) {
    heading("6. WALK-FORWARD BACKTEST");
    let Some(summary) = backtest else {
        println!("Insufficient data for a backtest.");
        return;
    };

    println!("Predictions {0:5} | Brier (markov) {1:6.4} | Brier (baseline) {2:6.4} | Skill {3:+6.3}",
        summary.predictions,
        summary.markov_brier,
        summary.baseline_brier,
        summary.skill(),
    );
    for (i, bucket) in summary.buckets.iter().enumerate() {
        if bucket.predictions == 0 { continue; }
        print_bucket(i, bucket);
    }
}

fn print_bucket(index: usize, bucket: &CalibrationBucket) {
    println!("P bucket {0:3.1} | Predictions {1:5} | Mean P {2} | Realized {3}",
        BacktestSummary::bucket_floor(index),
        bucket.predictions,
        rate_cell(bucket.mean_prediction()),
        rate_cell(bucket.realized_win_rate()),
    );
}
