use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{NaiveDate, SecondsFormat};
use serde::*;
use tracing::info;

use crate::charts::ChartSeries;
use crate::error::{AnalysisError, Result};
use crate::history::MatchHistory;

// Column layout of the cleaned history. Readable back in by the CSV loader.
#[derive(Serialize, Debug)]
struct HistoryRow {
    timestamp: String,
    result: &'static str,
    lp_change: i32,
    rank: Option<i32>,
    date: NaiveDate,
    game_index_that_day: u32,
}

pub fn write_history_csv<W: io::Write>(writer: W, history: &MatchHistory) -> csv::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for r in history.records() {
        csv_writer.serialize(HistoryRow {
            timestamp: r.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            result: r.outcome.label(),
            lp_change: r.lp_change,
            rank: r.rank,
            date: r.date,
            game_index_that_day: r.game_index_that_day,
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn save_history_csv(path: &Path, history: &MatchHistory) -> Result<()> {
    let file = create(path)?;
    write_history_csv(file, history).map_err(|source| AnalysisError::Write {
        path: path.to_path_buf(),
        source: source.into(),
    })?;
    info!(path = %path.display(), rows = history.len(), "wrote cleaned history");
    Ok(())
}

pub fn save_charts_json(path: &Path, charts: &[ChartSeries]) -> Result<()> {
    let mut file = create(path)?;
    serde_json::to_writer_pretty(&mut file, charts)
        .map_err(io::Error::from)
        .and_then(|_| file.flush())
        .map_err(|source| AnalysisError::Write { path: path.to_path_buf(), source })?;
    info!(path = %path.display(), charts = charts.len(), "wrote chart series");
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let write_error = |source| AnalysisError::Write { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_error)?;
    }
    Ok(BufWriter::new(File::create(path).map_err(write_error)?))
}
