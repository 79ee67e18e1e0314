use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::catalogue::MetricSpec;

use super::source::{Cell, MetricsTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Reported(String),
    NotAvailable,
}

impl MetricValue {
    /// The reported text, if it reads as a number.
    pub fn numeric(&self) -> Option<&str> {
        match self {
            MetricValue::Reported(v) if v.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
                Some(v.trim())
            }
            _ => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Reported(v) => f.write_str(v),
            MetricValue::NotAvailable => f.write_str("not available"),
        }
    }
}

pub type QuantitativeMetrics = BTreeMap<String, MetricValue>;

/// Reads each metric from `year_column` of the first row labelled with its
/// `row_label`. Lookup misses never fail the table.
#[tracing::instrument(
    name = "pipeline_stage extract_metrics",
    skip(table, metrics),
    fields(
        pipeline.stage = "extract_metrics",
        table.sheet = %table.sheet,
        metrics.found,
    )
)]
pub fn extract_metrics(
    table: &MetricsTable,
    metrics: &[MetricSpec],
    year_column: usize,
) -> QuantitativeMetrics {
    let extracted: QuantitativeMetrics = metrics
        .iter()
        .map(|spec| {
            (
                spec.key.to_string(),
                lookup_metric(table, spec.row_label, year_column),
            )
        })
        .collect();

    let found = extracted
        .values()
        .filter(|v| **v != MetricValue::NotAvailable)
        .count();
    tracing::Span::current().record("metrics.found", found);

    extracted
}

fn lookup_metric(table: &MetricsTable, row_label: &str, year_column: usize) -> MetricValue {
    let Some(row) = table.find_row(row_label) else {
        tracing::debug!(row_label, "Metric row not found");
        return MetricValue::NotAvailable;
    };

    match table.cell(row, year_column) {
        Some(Cell::Number(value)) if value.is_finite() => {
            MetricValue::Reported(format!("{value:.3}"))
        }
        other => {
            tracing::debug!(row_label, row, cell = ?other, "Metric cell is not numeric");
            MetricValue::NotAvailable
        }
    }
}

/// A standalone number; digits inside words such as "tCO2e" do not count.
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("number pattern is valid"));

/// Best-effort recovery of metric values from the quantitative narrative
/// answer, used when no metrics table was uploaded.
#[tracing::instrument(
    name = "pipeline_stage fallback_metrics",
    skip(narrative, metrics),
    fields(pipeline.stage = "fallback_metrics", metrics.found)
)]
pub fn parse_fallback_metrics(narrative: &str, metrics: &[MetricSpec]) -> QuantitativeMetrics {
    let parsed: QuantitativeMetrics = metrics
        .iter()
        .map(|spec| {
            let value = spec
                .narrative_marker
                .and_then(|marker| number_after_marker(narrative, marker))
                .map(MetricValue::Reported)
                .unwrap_or(MetricValue::NotAvailable);
            (spec.key.to_string(), value)
        })
        .collect();

    let found = parsed
        .values()
        .filter(|v| **v != MetricValue::NotAvailable)
        .count();
    tracing::Span::current().record("metrics.found", found);

    parsed
}

fn number_after_marker(narrative: &str, marker: &str) -> Option<String> {
    let line = narrative.lines().find(|line| line.contains(marker))?;
    let start = line.find(marker)? + marker.len();
    NUMBER
        .find(&line[start..])
        .map(|m| m.as_str().to_string())
}
