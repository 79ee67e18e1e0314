pub mod assemble;
pub mod metrics;
pub mod narrative;
pub mod orchestrator;
pub mod source;

pub use orchestrator::{
    ExtractionSettings, PreparedReport, ReportInputs, prepare_report, render_report,
    report_filename,
};
