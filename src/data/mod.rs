//! Loading of the cumulative-return document into a [`PriceSeries`].
//!
//! The document shape is `{"series": [{"date": "...", "value": {"raw": f64}}]}`
//! where `raw` is the cumulative percent return since inception.

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::error::{ExperimentError, ExperimentResult};
use crate::types::PriceSeries;

#[derive(Debug, Deserialize)]
struct SeriesDocument {
    series: Vec<SeriesRecord>,
}

#[derive(Debug, Deserialize)]
struct SeriesRecord {
    date: String,
    value: SeriesValue,
}

#[derive(Debug, Deserialize)]
struct SeriesValue {
    raw: f64,
}

pub fn load_series(path: &Path) -> ExperimentResult<PriceSeries> {
    if !path.exists() {
        return Err(ExperimentError::DataNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    let series = parse_series(&raw)?;

    if let (Some(first), Some(last)) = (series.first(), series.last()) {
        info!("Loaded {} rows ({} to {})", series.len(), first.date, last.date);
    }
    Ok(series)
}

pub fn parse_series(json: &str) -> ExperimentResult<PriceSeries> {
    let document: SeriesDocument = serde_json::from_str(json)
        .map_err(|e| ExperimentError::MalformedInput(format!("series document: {}", e)))?;

    let observations = document
        .series
        .into_iter()
        .map(|record| Ok((parse_date(&record.date)?, record.value.raw)))
        .collect::<ExperimentResult<Vec<_>>>()?;

    PriceSeries::from_cumulative_returns(observations)
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp
fn parse_date(raw: &str) -> ExperimentResult<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.date_naive());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| ExperimentError::MalformedInput(format!("unparseable date '{}'", raw)))
}
