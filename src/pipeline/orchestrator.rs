use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

use crate::catalogue::{Disclosure, QUANTITATIVE_QUESTION_ID, TRACKED_METRICS};
use crate::config::Config;
use crate::error::AppError;
use crate::gamma::ReportGenerator;
use crate::llm::LlmClient;
use crate::telemetry::metrics::{REPORT_ABSENT_DISCLOSURES, REPORT_DURATION};

use super::assemble::{absent_disclosures, assemble};
use super::metrics::{QuantitativeMetrics, extract_metrics, parse_fallback_metrics};
use super::narrative::{NarrativeAnswers, extract_narrative, questions_for};
use super::source::{MetricsTable, extract_pdf_text, load_metrics_table};

/// Characters stripped from the company name before it becomes a filename.
const UNSAFE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '«', '»'];

#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub disclosures: &'static [Disclosure],
    pub metrics_sheet: String,
    pub year_column: usize,
    pub source_language: Option<String>,
}

impl ExtractionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            disclosures: config.catalogue.disclosures(),
            metrics_sheet: config.metrics_sheet.clone(),
            year_column: config.metrics_year_column,
            source_language: config.source_language.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub company_name: String,
    pub reporting_year: String,
    pub pdf: Vec<u8>,
    pub excel: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsSource {
    Table,
    Narrative,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreparedReport {
    pub id: Uuid,
    pub company_name: String,
    pub reporting_year: String,
    pub metrics_source: MetricsSource,
    pub metrics: QuantitativeMetrics,
    pub disclosures: NarrativeAnswers,
    pub absent_disclosures: usize,
    pub prompt: String,
}

/// Reads the uploads and builds the generation prompt. A broken spreadsheet
/// aborts before any summarization call is made.
#[tracing::instrument(
    name = "pipeline report_prepare",
    skip(llm_client, settings, inputs),
    fields(
        report.id,
        report.company = %inputs.company_name,
        report.year = %inputs.reporting_year,
        report.has_table = inputs.excel.is_some(),
    )
)]
pub async fn prepare_report(
    llm_client: &LlmClient,
    settings: &ExtractionSettings,
    inputs: ReportInputs,
) -> Result<PreparedReport, AppError> {
    let ReportInputs {
        company_name,
        reporting_year,
        pdf,
        excel,
    } = inputs;
    let (source_text, table) = read_sources(pdf, excel, settings.metrics_sheet.clone()).await?;

    prepare_from_sources(
        llm_client,
        settings,
        &company_name,
        &reporting_year,
        &source_text,
        table.as_ref(),
    )
    .await
}

/// Source text plus the metrics sheet, when one was uploaded.
type Sources = (String, Option<MetricsTable>);

/// PDF and workbook parsing run on the blocking pool.
async fn read_sources(
    pdf: Vec<u8>,
    excel: Option<Vec<u8>>,
    sheet: String,
) -> Result<Sources, AppError> {
    let span = tracing::Span::current();
    tokio::task::spawn_blocking(move || -> Result<Sources, AppError> {
        let _entered = span.enter();
        let source_text =
            extract_pdf_text(&pdf).map_err(|e| AppError::SourceDocument(e.to_string()))?;
        let table = excel
            .as_deref()
            .map(|bytes| load_metrics_table(bytes, &sheet))
            .transpose()?;
        Ok((source_text, table))
    })
    .await
    .map_err(|e| AppError::Internal(format!("document parsing task failed: {e}")))?
}

pub async fn prepare_from_sources(
    llm_client: &LlmClient,
    settings: &ExtractionSettings,
    company_name: &str,
    reporting_year: &str,
    source_text: &str,
    table: Option<&MetricsTable>,
) -> Result<PreparedReport, AppError> {
    let start = Instant::now();
    let id = Uuid::new_v4();
    tracing::Span::current().record("report.id", tracing::field::display(id));

    // Stage 1: one summarization call per disclosure
    let questions = questions_for(settings.disclosures, table.is_none());
    let answers = extract_narrative(
        llm_client,
        source_text,
        &questions,
        settings.source_language.as_deref(),
    )
    .await?;

    // Stage 2: metrics from the sheet, or recovered from the narrative
    let (metrics_source, metrics) = match table {
        Some(table) => {
            tracing::info!(sheet = %table.sheet, "Reading metrics from spreadsheet");
            (
                MetricsSource::Table,
                extract_metrics(table, &TRACKED_METRICS, settings.year_column),
            )
        }
        None => {
            tracing::info!("No spreadsheet uploaded, reading metrics from narrative");
            (
                MetricsSource::Narrative,
                parse_fallback_metrics(
                    answers.get(QUANTITATIVE_QUESTION_ID).unwrap_or_default(),
                    &TRACKED_METRICS,
                ),
            )
        }
    };

    // Stage 3: prompt
    let prompt = assemble(
        company_name,
        reporting_year,
        &metrics,
        &TRACKED_METRICS,
        &answers,
        settings.disclosures,
    );
    let absent = absent_disclosures(&answers, settings.disclosures);

    REPORT_ABSENT_DISCLOSURES.record(absent as f64, &[]);
    REPORT_DURATION.record(
        start.elapsed().as_secs_f64(),
        &[opentelemetry::KeyValue::new("report.phase", "prepare")],
    );
    tracing::info!(
        report.id = %id,
        absent_disclosures = absent,
        prompt_chars = prompt.chars().count(),
        "Report prompt assembled"
    );

    Ok(PreparedReport {
        id,
        company_name: company_name.to_string(),
        reporting_year: reporting_year.to_string(),
        metrics_source,
        metrics,
        disclosures: answers,
        absent_disclosures: absent,
        prompt,
    })
}

#[tracing::instrument(
    name = "pipeline report_render",
    skip(generator, prepared),
    fields(report.id = %prepared.id)
)]
pub async fn render_report(
    generator: &ReportGenerator,
    prepared: &PreparedReport,
) -> Result<Vec<u8>, AppError> {
    let start = Instant::now();
    let bytes = generator.generate(&prepared.prompt).await?;

    REPORT_DURATION.record(
        start.elapsed().as_secs_f64(),
        &[opentelemetry::KeyValue::new("report.phase", "render")],
    );

    Ok(bytes)
}

/// Company name made safe for a filename: unsafe characters act as word
/// breaks and words are joined with underscores.
pub fn sanitize_company_name(company_name: &str) -> String {
    let cleaned: String = company_name
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        "report".to_string()
    } else {
        joined
    }
}

pub fn report_filename(company_name: &str) -> String {
    format!("TCFD_Report_{}.pdf", sanitize_company_name(company_name))
}
