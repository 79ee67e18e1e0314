use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use lopdf::Document;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableParseError {
    #[error("could not open workbook: {0}")]
    Workbook(String),

    #[error("worksheet '{0}' not found")]
    MissingSheet(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Empty,
}

impl Cell {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Float(f) => Cell::Number(*f),
            Data::String(s) => Cell::Text(s.clone()),
            Data::Empty => Cell::Empty,
            other => Cell::Text(other.to_string()),
        }
    }
}

/// One worksheet, addressed from A1 regardless of where the data starts.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsTable {
    pub sheet: String,
    pub rows: Vec<Vec<Cell>>,
}

impl MetricsTable {
    pub fn new(sheet: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet: sheet.into(),
            rows,
        }
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// First row whose label cell (column 0) contains `label`, case-sensitive.
    pub fn find_row(&self, label: &str) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.first()
                .and_then(Cell::as_text)
                .is_some_and(|text| text.contains(label))
        })
    }
}

#[tracing::instrument(
    name = "pipeline_stage load_table",
    skip(bytes),
    fields(
        pipeline.stage = "load_table",
        table.bytes = bytes.len(),
        table.rows,
    )
)]
pub fn load_metrics_table(bytes: &[u8], sheet: &str) -> Result<MetricsTable, TableParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| TableParseError::Workbook(e.to_string()))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(TableParseError::MissingSheet(sheet.to_string()));
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| TableParseError::Workbook(e.to_string()))?;

    let mut rows = Vec::new();
    if let Some((last_row, last_col)) = range.end() {
        for r in 0..=last_row {
            let row = (0..=last_col)
                .map(|c| range.get_value((r, c)).map(Cell::from).unwrap_or(Cell::Empty))
                .collect();
            rows.push(row);
        }
    }

    tracing::Span::current().record("table.rows", rows.len());

    Ok(MetricsTable::new(sheet, rows))
}

/// Text of every page, in page order, joined with no separator.
#[tracing::instrument(
    name = "pipeline_stage read_pdf",
    skip(bytes),
    fields(
        pipeline.stage = "read_pdf",
        pdf.bytes = bytes.len(),
        pdf.pages,
        pdf.chars,
    )
)]
pub fn extract_pdf_text(bytes: &[u8]) -> anyhow::Result<String> {
    let document = Document::load_mem(bytes)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();

    let mut text = String::new();
    for page in &pages {
        match document.extract_text(&[*page]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => tracing::warn!(page, error = %e, "Skipping page without extractable text"),
        }
    }

    let span = tracing::Span::current();
    span.record("pdf.pages", pages.len());
    span.record("pdf.chars", text.chars().count());

    if text.trim().is_empty() {
        anyhow::bail!("no extractable text found in {} page(s)", pages.len());
    }

    Ok(text)
}


#[cfg(test)]
mod tests {
    use super::fixtures::{XlsxValue, pdf_with_pages, workbook};
    use super::*;

    fn label_row(label: &str) -> Vec<Cell> {
        vec![Cell::Text(label.to_string()), Cell::Number(1.0)]
    }

    #[test]
    fn test_find_row_substring_match() {
        let table = MetricsTable::new(
            "Environmental",
            vec![
                label_row("Indicator"),
                label_row("Direct (Scope 1) GHG emissions, mln t"),
                label_row("Indirect (Scope 2) GHG emissions"),
            ],
        );
        assert_eq!(table.find_row("Direct (Scope 1) GHG emissions"), Some(1));
        assert_eq!(table.find_row("Scope 2"), Some(2));
    }

    #[test]
    fn test_find_row_is_case_sensitive() {
        let table = MetricsTable::new("Environmental", vec![label_row("Total water withdrawal")]);
        assert_eq!(table.find_row("Total Water Withdrawal"), None);
    }

    #[test]
    fn test_find_row_returns_first_match() {
        let table = MetricsTable::new(
            "Environmental",
            vec![
                label_row("Total water withdrawal"),
                label_row("Total water withdrawal (restated)"),
            ],
        );
        assert_eq!(table.find_row("Total water withdrawal"), Some(0));
    }

    #[test]
    fn test_find_row_ignores_non_text_labels() {
        let table = MetricsTable::new(
            "Environmental",
            vec![vec![Cell::Number(2023.0)], vec![Cell::Empty], vec![]],
        );
        assert_eq!(table.find_row("2023"), None);
    }

    #[test]
    fn test_cell_out_of_range() {
        let table = MetricsTable::new("Environmental", vec![label_row("a")]);
        assert_eq!(table.cell(0, 1), Some(&Cell::Number(1.0)));
        assert_eq!(table.cell(0, 10), None);
        assert_eq!(table.cell(5, 0), None);
    }

    #[test]
    fn test_cell_from_calamine_data() {
        assert_eq!(Cell::from(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(Cell::from(&Data::Float(3.456)), Cell::Number(3.456));
        assert_eq!(
            Cell::from(&Data::String("n/a".to_string())),
            Cell::Text("n/a".to_string())
        );
        assert_eq!(Cell::from(&Data::Empty), Cell::Empty);
    }

    #[test]
    fn test_load_metrics_table_rejects_garbage() {
        let err = load_metrics_table(b"definitely not a workbook", "Environmental").unwrap_err();
        assert!(matches!(err, TableParseError::Workbook(_)));
    }

    #[test]
    fn test_load_metrics_table_missing_sheet() {
        let bytes = workbook("Social", &[(0, 0, XlsxValue::Text("Headcount"))]);
        let err = load_metrics_table(&bytes, "Environmental").unwrap_err();
        assert!(matches!(err, TableParseError::MissingSheet(ref name) if name == "Environmental"));
    }

    #[test]
    fn test_load_metrics_table_reads_year_column() {
        let bytes = fixtures::environmental_workbook(3.456);
        let table = load_metrics_table(&bytes, "Environmental").unwrap();

        assert_eq!(table.sheet, "Environmental");
        let row = table.find_row("Direct (Scope 1) GHG emissions").unwrap();
        assert_eq!(row, 1);
        assert_eq!(table.cell(row, 10), Some(&Cell::Number(3.456)));
        assert_eq!(table.cell(0, 10), Some(&Cell::Text("2023".to_string())));
    }

    #[test]
    fn test_load_metrics_table_addresses_from_a1() {
        // used range starts at row 4; rows above it still count
        let bytes = workbook(
            "Environmental",
            &[
                (3, 0, XlsxValue::Text("Indirect (Scope 2) GHG emissions")),
                (3, 10, XlsxValue::Number(0.75)),
                (5, 0, XlsxValue::Text("Total water withdrawal")),
                (5, 10, XlsxValue::Number(12.0)),
            ],
        );
        let table = load_metrics_table(&bytes, "Environmental").unwrap();

        assert_eq!(table.rows.len(), 6);
        assert_eq!(table.cell(0, 0), Some(&Cell::Empty));
        assert_eq!(table.find_row("Scope 2"), Some(3));
        assert_eq!(table.cell(3, 10), Some(&Cell::Number(0.75)));
        assert_eq!(table.find_row("Total water withdrawal"), Some(5));
        assert_eq!(table.cell(4, 10), Some(&Cell::Empty));
    }

    #[test]
    fn test_extract_pdf_text_rejects_garbage() {
        assert!(extract_pdf_text(b"%PDF-garbage").is_err());
    }

    #[test]
    fn test_extract_pdf_text_concatenates_pages_in_order() {
        let bytes = pdf_with_pages(&["Governance section", "Scope 1 emissions"]);
        let text = extract_pdf_text(&bytes).unwrap();
        let first = text.find("Governance section").unwrap();
        let second = text.find("Scope 1 emissions").unwrap();
        assert!(first < second);
    }
}
