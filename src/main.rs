#![allow(dead_code)]

mod analysis_context;
mod backtest;
mod charts;
mod cleaner;
mod data_loader;
mod error;
mod export;
mod history;
mod markov;
mod report;
mod stats;
mod util;

use std::path::PathBuf;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use analysis_context::*;
use backtest::*;
use charts::*;
use cleaner::*;
use data_loader::*;
use export::*;
use markov::*;
use report::*;

/*
    Usage: lp_momentum [input.json|input.csv] [output_dir]
    Everything else is tuned through AnalysisContext below.
*/

fn main() -> anyhow::Result<()> {
    init_logging();

    let mut ctx = AnalysisContext::default();
    let mut args = std::env::args().skip(1);
    if let Some(input) = args.next() {
        ctx.input_path = PathBuf::from(input);
    }
    if let Some(output) = args.next() {
        ctx.output_dir = PathBuf::from(output);
    }
    ctx.validate()?;

    let raw = load_raw_records(&ctx.input_path)
        .with_context(|| format!("could not load match history from {}", ctx.input_path.display()))?;

    let (history, cleaning) = clean(raw, &ctx);
    cleaning.log();

    let momentum = estimate_momentum(&history);
    let backtest = backtest_momentum(&history, ctx.backtest_warmup);

    save_history_csv(&ctx.output_dir.join("cleaned_history.csv"), &history)?;
    let charts = build_charts(&history, &ctx);
    save_charts_json(&ctx.output_dir.join("charts.json"), &charts)?;

    output_report(&history, &cleaning, &momentum, backtest.as_ref(), &ctx);

    info!(games = history.len(), "analysis complete");
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
