use serde::*;

use crate::analysis_context::AnalysisContext;
use crate::history::MatchHistory;
use crate::markov::pattern_win_rates;
use crate::stats::{daily_stats, fatigue_curve, lp_trend, volume_curve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    Heatmap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: String,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

// Everything the plotting side needs to draw one figure. Rendering is not our business.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub id: &'static str,
    pub kind: ChartKind,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_line: Option<f64>,
    pub points: Vec<ChartPoint>,
}

fn point(x: String, y: f64) -> ChartPoint {
    ChartPoint { x, y, series: None, annotation: None }
}

pub fn build_charts(history: &MatchHistory, ctx: &AnalysisContext) -> Vec<ChartSeries> {
    let mut charts = vec![
        lp_chart(history),
        daily_win_rate_chart(history, ctx),
        game_number_chart(history, ctx),
    ];
    charts.extend(sequence_chart(history, ctx));
    charts.push(volume_chart(history, ctx));
    charts
}

// Total LP when every game has a rank snapshot, otherwise the running sum of deltas
pub fn lp_chart(history: &MatchHistory) -> ChartSeries {
    let trend = lp_trend(history);
    let use_rank = !trend.is_empty() && trend.iter().all(|p| p.rank.is_some());

    let points = trend
        .iter()
        .map(|p| {
            let y = match (use_rank, p.rank) {
                (true, Some(rank)) => rank as f64,
                _ => p.cumulative_lp as f64,
            };
            ChartPoint {
                x: p.timestamp.to_rfc3339(),
                y,
                series: Some(p.outcome.label().to_string()),
                annotation: None,
            }
        })
        .collect();

    ChartSeries {
        id: "lp_over_time",
        kind: ChartKind::Line,
        title: "LP rank over time".to_string(),
        x_label: "Date".to_string(),
        y_label: if use_rank { "Total LP" } else { "Cumulative LP change" }.to_string(),
        reference_line: None,
        points,
    }
}

pub fn daily_win_rate_chart(history: &MatchHistory, ctx: &AnalysisContext) -> ChartSeries {
    let points = daily_stats(history)
        .iter()
        .filter_map(|d| {
            let rate = d.win_rate()?;
            Some(ChartPoint { annotation: Some(d.games.to_string()), ..point(d.date.to_string(), rate * 100.0) })
        })
        .collect();

    ChartSeries {
        id: "daily_win_rate",
        kind: ChartKind::Bar,
        title: "Daily win rate".to_string(),
        x_label: "Date".to_string(),
        y_label: "Win rate (%)".to_string(),
        reference_line: Some(ctx.reference_win_rate * 100.0),
        points,
    }
}

pub fn game_number_chart(history: &MatchHistory, ctx: &AnalysisContext) -> ChartSeries {
    let points = fatigue_curve(history)
        .iter()
        .filter_map(|b| {
            let rate = b.win_rate()?;
            Some(ChartPoint { annotation: Some(format!("n={}", b.games)), ..point(b.key.to_string(), rate * 100.0) })
        })
        .collect();

    ChartSeries {
        id: "win_rate_by_game_number",
        kind: ChartKind::Bar,
        title: "Win rate by game number in day".to_string(),
        x_label: "Game number in session".to_string(),
        y_label: "Win rate (%)".to_string(),
        reference_line: Some(ctx.reference_win_rate * 100.0),
        points,
    }
}

// One cell per observed sequence of `history_length` games: columns are the newest game, rows the ones
// before it, the value is how often the next game was won.
pub fn sequence_chart(history: &MatchHistory, ctx: &AnalysisContext) -> Option<ChartSeries> {
    let table = pattern_win_rates(&history.outcomes(), ctx.history_length)?;

    let points = table
        .iter()
        .filter_map(|stat| {
            let (newest, older) = stat.pattern.split_first()?;
            let older = if older.is_empty() {
                "No prior history".to_string()
            } else {
                older.iter().map(|o| o.short().to_string()).collect::<Vec<_>>().join("-")
            };
            Some(ChartPoint {
                x: format!("Recent: {}", newest.short()),
                y: stat.win_rate()?,
                series: Some(older),
                annotation: Some(format!("n={}", stat.games)),
            })
        })
        .collect();

    Some(ChartSeries {
        id: "sequence_heatmap",
        kind: ChartKind::Heatmap,
        title: format!("Win rate of next game after {} game(s)", ctx.history_length),
        x_label: "Most recent game".to_string(),
        y_label: "Earlier games (newest first)".to_string(),
        reference_line: None,
        points,
    })
}

pub fn volume_chart(history: &MatchHistory, ctx: &AnalysisContext) -> ChartSeries {
    let points = volume_curve(history)
        .iter()
        .map(|v| ChartPoint {
            annotation: Some(format!("days={}", v.days)),
            ..point(v.games_per_day.to_string(), v.mean_win_rate)
        })
        .collect();

    ChartSeries {
        id: "win_rate_by_daily_volume",
        kind: ChartKind::Bar,
        title: "Do I play better when I play less?".to_string(),
        x_label: "Total games played in one day".to_string(),
        y_label: "Average win rate".to_string(),
        reference_line: Some(ctx.reference_win_rate),
        points,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis_context::DayBoundary;
    use crate::cleaner::clean;
    use crate::data_loader::{RawRecord, RawValue};

    fn ctx() -> AnalysisContext {
        AnalysisContext { day_boundary: DayBoundary::utc(), ..AnalysisContext::default() }
    }

    fn sample(with_rank: bool) -> MatchHistory {
        let results = ["WON", "LOST", "WON", "WON"];
        let raw = results
            .iter()
            .enumerate()
            .map(|(idx, result)| RawRecord {
                row: idx + 1,
                timestamp: Some(RawValue::Int(1_704_067_200 + idx as i64 * 3600)),
                result: Some(result.to_string()),
                rank: with_rank.then_some(RawValue::Int(100 + idx as i64)),
                lp_change: Some(RawValue::Int(if idx % 2 == 0 { 20 } else { -15 })),
            })
            .collect();
        clean(raw, &ctx()).0
    }

    #[test]
    fn builds_every_chart_when_there_is_a_sequence() {
        let charts = build_charts(&sample(true), &ctx());

        let ids: Vec<&str> = charts.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["lp_over_time", "daily_win_rate", "win_rate_by_game_number", "sequence_heatmap", "win_rate_by_daily_volume"]);

        // W,L,W,W: after a W the next game was won 1 of 2 times, after the L 1 of 1
        let heatmap = &charts[3];
        assert_eq!(heatmap.kind, ChartKind::Heatmap);
        assert_eq!(heatmap.points.len(), 2);
        assert_eq!(heatmap.points[0].x, "Recent: W");
        assert_eq!(heatmap.points[0].series.as_deref(), Some("No prior history"));
        assert_eq!(heatmap.points[0].y, 0.5);
        assert_eq!(heatmap.points[0].annotation.as_deref(), Some("n=2"));
        assert_eq!(heatmap.points[1].x, "Recent: L");
        assert_eq!(heatmap.points[1].y, 1.0);
    }

    #[test]
    fn sequence_chart_follows_the_configured_history_length() {
        let history = sample(false);
        let deep = AnalysisContext { history_length: 2, ..ctx() };
        let chart = sequence_chart(&history, &deep).unwrap();
        let table = pattern_win_rates(&history.outcomes(), 2).unwrap();

        assert_eq!(chart.points.len(), table.len());
        for (cell, stat) in chart.points.iter().zip(&table) {
            assert_eq!(cell.x, format!("Recent: {}", stat.pattern[0].short()));
            assert_eq!(cell.series.as_deref(), Some(stat.pattern[1].short().to_string().as_str()));
            assert_eq!(Some(cell.y), stat.win_rate());
            assert_eq!(cell.annotation, Some(format!("n={}", stat.games)));
        }

        // Not enough games to fill a sequence of this length
        let too_deep = AnalysisContext { history_length: 4, ..ctx() };
        assert!(sequence_chart(&history, &too_deep).is_none());
        assert_eq!(build_charts(&history, &too_deep).len(), 4);
    }

    #[test]
    fn lp_chart_prefers_rank_then_falls_back_to_running_total() {
        let ranked = lp_chart(&sample(true));
        assert_eq!(ranked.y_label, "Total LP");
        assert_eq!(ranked.points.iter().map(|p| p.y).collect::<Vec<_>>(), vec![100.0, 101.0, 102.0, 103.0]);

        let unranked = lp_chart(&sample(false));
        assert_eq!(unranked.y_label, "Cumulative LP change");
        assert_eq!(unranked.points.iter().map(|p| p.y).collect::<Vec<_>>(), vec![20.0, 5.0, 25.0, 10.0]);
    }

    #[test]
    fn charts_serialize_for_the_plotter() {
        let chart = game_number_chart(&sample(false), &ctx());
        let json = serde_json::to_value(&chart).unwrap();
        assert_eq!(json["kind"], "bar");
        assert_eq!(json["points"][0]["annotation"], "n=1");
        assert!(json["points"][0].get("series").is_none());
    }
}
