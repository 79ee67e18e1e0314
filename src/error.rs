use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::gamma::GenerationError;
use crate::pipeline::narrative::ExtractionError;
use crate::pipeline::source::TableParseError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Source document error: {0}")]
    SourceDocument(String),

    #[error("Table parse error: {0}")]
    TableParse(#[from] TableParseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Report generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SourceDocument(_) | AppError::TableParse(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Extraction(_) => StatusCode::BAD_GATEWAY,
            AppError::Generation(GenerationError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for logs and the report outcome metric.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::SourceDocument(_) => "source_document",
            AppError::TableParse(_) => "table_parse",
            AppError::Extraction(_) => "extraction",
            AppError::Generation(GenerationError::Submission(_)) => "submission",
            AppError::Generation(GenerationError::Failed(_)) => "generation",
            AppError::Generation(GenerationError::Timeout { .. }) => "timeout",
            AppError::Generation(GenerationError::Download(_)) => "download",
            AppError::Internal(_) => "internal",
        }
    }

    /// Message shown to the caller.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::SourceDocument(msg) => {
                format!("The uploaded PDF could not be read: {msg}")
            }
            AppError::TableParse(e) => {
                format!("The uploaded spreadsheet could not be processed: {e}")
            }
            AppError::Extraction(_) => {
                "The summarization service could not analyze the report. Check the API key and quota, then try again.".to_string()
            }
            AppError::Generation(GenerationError::Submission(_)) => {
                "The document generation service rejected the request. Check the API key and try again.".to_string()
            }
            AppError::Generation(GenerationError::Failed(detail)) => {
                format!("The document generation service failed to build the report: {detail}")
            }
            AppError::Generation(GenerationError::Timeout { polls }) => format!(
                "The report was not ready after {polls} status checks. The job may still finish on the generation service."
            ),
            AppError::Generation(GenerationError::Download(_)) => {
                "The generated report could not be downloaded.".to_string()
            }
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

fn get_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, category = self.category(), "Request failed");
        } else {
            tracing::warn!(error = %self, category = self.category(), "Request rejected");
        }

        let error_message = self.user_message();

        let body = if let Some(trace_id) = get_trace_id() {
            json!({
                "error": error_message,
                "category": self.category(),
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": error_message,
                "category": self.category(),
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
