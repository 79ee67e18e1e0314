use crate::catalogue::{Disclosure, MetricSpec, Pillar};

use super::metrics::{MetricValue, QuantitativeMetrics};
use super::narrative::NarrativeAnswers;

pub const NOT_DISCLOSED: &str = "Information not disclosed in the source report.";

const ABSENCE_MARKERS: [&str; 2] = ["not found", "not provide"];

/// True when a model answer carries no usable disclosure: blank, or a
/// "not found" / "not provided" style refusal.
pub fn is_absent(answer: &str) -> bool {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_lowercase();
    ABSENCE_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn resolve_disclosure(answer: Option<&str>) -> &str {
    match answer {
        Some(text) if !is_absent(text) => text.trim(),
        _ => NOT_DISCLOSED,
    }
}

pub fn format_metric_line(label: &str, value: Option<&MetricValue>, unit: &str) -> String {
    match value.and_then(MetricValue::numeric) {
        Some(number) => format!("- **{label}:** {number} {unit}"),
        None => format!("- **{label}:** Not available"),
    }
}

pub fn absent_disclosures(narrative: &NarrativeAnswers, disclosures: &[Disclosure]) -> usize {
    disclosures
        .iter()
        .filter(|d| narrative.get(d.id).is_none_or(is_absent))
        .count()
}

/// Renders the full generation prompt. Every disclosure and every tracked
/// metric appears exactly once, whatever data was available.
pub fn assemble(
    company_name: &str,
    reporting_year: &str,
    metrics: &QuantitativeMetrics,
    tracked: &[MetricSpec],
    narrative: &NarrativeAnswers,
    disclosures: &[Disclosure],
) -> String {
    let metrics_text = tracked
        .iter()
        .map(|spec| format_metric_line(spec.key, metrics.get(spec.key), spec.unit))
        .collect::<Vec<_>>()
        .join("\n");

    let metrics_carrier = disclosures
        .iter()
        .position(|d| d.carries_metrics)
        .or_else(|| disclosures.len().checked_sub(1));

    let mut prompt = String::new();
    prompt.push_str(&format!(
        "# TASK: Create a professional TCFD Report for {company_name}, {reporting_year}.\n\n"
    ));
    prompt.push_str(
        "**ROLE:** You are an expert ESG analyst from a top-tier consulting firm. \
        Your task is to synthesize the provided raw data points into a polished, investor-grade report \
        that follows the TCFD framework.\n\n",
    );
    prompt.push_str(&format!(
        "**IMPORTANT INSTRUCTION:** If a data point is marked as '{NOT_DISCLOSED}', \
        you must explicitly and professionally state this in the final report. \
        DO NOT ignore missing data. Frame it as a finding of your analysis.\n\n"
    ));
    prompt.push_str("---\n---\n\n");
    prompt.push_str(&format!(
        "# TCFD Report: {company_name} ({reporting_year})\n"
    ));

    for pillar in Pillar::ALL {
        prompt.push_str(&format!(
            "\n---\n## {}\n*{}*\n",
            pillar.title(),
            pillar.description()
        ));

        for (index, disclosure) in disclosures.iter().enumerate() {
            if disclosure.pillar != pillar {
                continue;
            }
            prompt.push_str(&format!(
                "\n**{}:**\n{}\n",
                disclosure.heading,
                resolve_disclosure(narrative.get(disclosure.id))
            ));
            if metrics_carrier == Some(index) {
                prompt.push_str("Key reported emissions data includes:\n");
                prompt.push_str(&metrics_text);
                prompt.push('\n');
            }
        }
    }

    prompt
}
