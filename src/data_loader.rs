use std::fs;
use std::io;
use std::path::Path;

use serde::*;
use serde_aux::field_attributes::deserialize_default_from_null;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};

// A field exactly as it appeared in the input. Nothing is interpreted here, the cleaner decides.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => n.as_i64().map(RawValue::Int).or_else(|| n.as_f64().map(RawValue::Float)),
            Value::String(s) => Some(RawValue::Text(s.clone())),
            other => Some(RawValue::Text(other.to_string())),
        }
    }

    fn from_cell(cell: Option<String>) -> Option<Self> {
        cell.filter(|c| !c.trim().is_empty()).map(RawValue::Text)
    }
}

// One input row of unknown quality. `row` is the 1-based position in the file and is the tie breaker
// for everything order dependent downstream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    pub row: usize,
    pub timestamp: Option<RawValue>,
    pub result: Option<String>,
    pub lp_change: Option<RawValue>,
    pub rank: Option<RawValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Csv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Ok(InputFormat::Json),
            Some("csv") => Ok(InputFormat::Csv),
            _ => Err(AnalysisError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

pub fn load_raw_records(path: &Path) -> Result<Vec<RawRecord>> {
    let format = InputFormat::from_path(path)?;
    let data = fs::read_to_string(path).map_err(|source| AnalysisError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let records = match format {
        InputFormat::Json => parse_json_records(&data).map_err(|source| AnalysisError::Json {
            path: path.to_path_buf(),
            source,
        })?,
        InputFormat::Csv => parse_csv_records(data.as_bytes()).map_err(|source| AnalysisError::Csv {
            path: path.to_path_buf(),
            source,
        })?,
    };

    info!(path = %path.display(), ?format, rows = records.len(), "loaded raw match rows");
    Ok(records)
}

// The export is a stream of JSON documents written back to back, usually one page per request.
// Each document is either a page with an `items` list or a bare list of items.
pub fn parse_json_records(data: &str) -> serde_json::Result<Vec<RawRecord>> {
    let mut items: Vec<JsonItem> = Vec::new();
    let mut documents = 0;

    for document in serde_json::Deserializer::from_str(data).into_iter::<JsonDocument>() {
        documents += 1;
        match document? {
            JsonDocument::Page(page) => items.extend(page.items),
            JsonDocument::Items(list) => items.extend(list),
        }
    }
    debug!(documents, items = items.len(), "parsed JSON document stream");

    Ok(items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| item.into_raw(idx + 1))
        .collect())
}

pub fn parse_csv_records<R: io::Read>(reader: R) -> csv::Result<Vec<RawRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = shadow_alias_columns(csv_reader.headers()?);
    csv_reader.set_headers(headers);

    let mut records = Vec::new();
    for (idx, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        records.push(RawRecord {
            row: idx + 1,
            timestamp: RawValue::from_cell(row.timestamp),
            result: row.result.filter(|r| !r.trim().is_empty()),
            lp_change: RawValue::from_cell(row.lp_change),
            rank: RawValue::from_cell(row.rank),
        });
    }
    Ok(records)
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum JsonDocument {
    Items(Vec<JsonItem>),
    Page(JsonPage),
}

#[derive(Deserialize, Debug)]
struct JsonPage {
    #[serde(default, deserialize_with = "deserialize_default_from_null")]
    items: Vec<JsonItem>,
}

// Every field is kept as a loose `Value` so one odd item can't take the whole page down with it.
#[derive(Deserialize, Debug, Default)]
struct JsonItem {
    #[serde(default, alias = "outcome")]
    result: Value,
    #[serde(default, rename = "startedAt", alias = "timestamp")]
    started_at: Value,
    #[serde(default)]
    lp: Value,
    #[serde(default, rename = "lpChange", alias = "lp_change")]
    lp_change: Value,
}

impl JsonItem {
    fn into_raw(self, row: usize) -> RawRecord {
        let rank = self.lp.pointer("/after/value").and_then(RawValue::from_json);

        // Without an explicit delta, the before/after snapshots give it to us directly.
        // A delta that doesn't fit is left missing.
        let lp_change = RawValue::from_json(&self.lp_change).or_else(|| {
            let before = self.lp.pointer("/before/value").and_then(Value::as_i64)?;
            let after = self.lp.pointer("/after/value").and_then(Value::as_i64)?;
            after.checked_sub(before).map(RawValue::Int)
        });

        let result = match self.result {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        };

        RawRecord {
            row,
            timestamp: RawValue::from_json(&self.started_at),
            result,
            lp_change,
            rank,
        }
    }
}

// Canonical column name and the other spellings accepted for it
const CSV_COLUMNS: [(&str, &[&str]); 4] = [
    ("timestamp", &["startedAt"]),
    ("result", &["outcome"]),
    ("lp_change", &["lp_diff", "lpChange"]),
    ("rank", &["lp"]),
];

// When a file carries both the canonical column and an alias for it (or two aliases), the canonical
// one wins, then the leftmost alias. The losers are renamed so serde ignores them.
// A canonical name appearing twice is left alone and fails as a duplicate field.
fn shadow_alias_columns(headers: &csv::StringRecord) -> csv::StringRecord {
    let mut claimed: Vec<&str> = headers
        .iter()
        .filter(|h| CSV_COLUMNS.iter().any(|(canonical, _)| canonical == h))
        .collect();

    headers
        .iter()
        .map(|header| {
            let Some((canonical, _)) = CSV_COLUMNS.iter().find(|(_, aliases)| aliases.contains(&header)) else {
                return header.to_string();
            };
            if claimed.contains(canonical) {
                format!("shadowed:{header}")
            } else {
                claimed.push(*canonical);
                header.to_string()
            }
        })
        .collect()
}

#[derive(Deserialize, Debug)]
struct CsvRow {
    #[serde(default, alias = "startedAt")]
    timestamp: Option<String>,
    #[serde(default, alias = "outcome")]
    result: Option<String>,
    #[serde(default, alias = "lp_diff", alias = "lpChange")]
    lp_change: Option<String>,
    #[serde(default, alias = "lp")]
    rank: Option<String>,
}
