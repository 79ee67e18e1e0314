use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use opentelemetry::KeyValue;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::gamma::ReportGenerator;
use crate::pipeline::{
    ExtractionSettings, PreparedReport, ReportInputs, prepare_report, render_report,
    report_filename,
};
use crate::telemetry::metrics::REPORT_OUTCOMES;

/// Fields accepted by the report endpoints. Empty text fields and empty file
/// parts count as absent.
#[derive(Debug, Default)]
pub struct ReportForm {
    pub company_name: Option<String>,
    pub reporting_year: Option<String>,
    pub pdf: Option<Vec<u8>>,
    pub excel: Option<Vec<u8>>,
    pub summarizer_api_key: Option<String>,
    pub generation_api_key: Option<String>,
}

impl ReportForm {
    pub async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ReportForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("invalid multipart body: {e}")))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "pdf" | "excel" => {
                    let bytes = field.bytes().await.map_err(|e| {
                        AppError::Validation(format!("could not read upload '{name}': {e}"))
                    })?;
                    let bytes = (!bytes.is_empty()).then(|| bytes.to_vec());
                    if name == "pdf" {
                        form.pdf = bytes;
                    } else {
                        form.excel = bytes;
                    }
                }
                "company_name" | "reporting_year" | "summarizer_api_key"
                | "generation_api_key" => {
                    let text = field.text().await.map_err(|e| {
                        AppError::Validation(format!("could not read field '{name}': {e}"))
                    })?;
                    let value = Some(text.trim().to_string()).filter(|v| !v.is_empty());
                    match name.as_str() {
                        "company_name" => form.company_name = value,
                        "reporting_year" => form.reporting_year = value,
                        "summarizer_api_key" => form.summarizer_api_key = value,
                        _ => form.generation_api_key = value,
                    }
                }
                other => tracing::debug!(field = other, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    pub fn inputs(&mut self) -> AppResult<ReportInputs> {
        let company_name = self
            .company_name
            .take()
            .ok_or_else(|| AppError::Validation("company_name is required".into()))?;
        let reporting_year = self
            .reporting_year
            .take()
            .ok_or_else(|| AppError::Validation("reporting_year is required".into()))?;
        let pdf = self
            .pdf
            .take()
            .ok_or_else(|| AppError::Validation("a PDF report upload is required".into()))?;

        Ok(ReportInputs {
            company_name,
            reporting_year,
            pdf,
            excel: self.excel.take(),
        })
    }
}

/// A key supplied with the request wins over the configured one.
pub fn resolve_key(
    supplied: Option<String>,
    configured: Option<&String>,
    what: &str,
) -> AppResult<String> {
    supplied
        .or_else(|| configured.cloned())
        .ok_or_else(|| AppError::Validation(format!("{what} API key is not configured")))
}

/// `attachment` disposition with an ASCII fallback name and the exact UTF-8
/// name for clients that understand `filename*`.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
        urlencoding::encode(filename)
    )
}

fn record_outcome<T>(endpoint: &'static str, result: &AppResult<T>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.category(),
    };
    REPORT_OUTCOMES.add(
        1,
        &[
            KeyValue::new("report.endpoint", endpoint),
            KeyValue::new("report.outcome", outcome),
        ],
    );
}

async fn prepare(state: &AppState, form: &mut ReportForm) -> AppResult<PreparedReport> {
    let inputs = form.inputs()?;
    let summarizer_key = resolve_key(
        form.summarizer_api_key.take(),
        state.config.summarizer_api_key.as_ref(),
        "summarization",
    )?;

    tracing::info!(
        company = %inputs.company_name,
        year = %inputs.reporting_year,
        pdf_bytes = inputs.pdf.len(),
        has_spreadsheet = inputs.excel.is_some(),
        "Report request received"
    );

    let llm_client = (state.summarizer)(&state.config, &summarizer_key);
    let settings = ExtractionSettings::from_config(&state.config);
    prepare_report(&llm_client, &settings, inputs).await
}

async fn create(state: &AppState, mut form: ReportForm) -> AppResult<Response> {
    // Both credentials are checked before any upstream call.
    let generation_key = resolve_key(
        form.generation_api_key.take(),
        state.config.gamma_api_key.as_ref(),
        "document generation",
    )?;
    if form.summarizer_api_key.is_none() && state.config.summarizer_api_key.is_none() {
        return Err(AppError::Validation(
            "summarization API key is not configured".into(),
        ));
    }

    let prepared = prepare(state, &mut form).await?;

    let generator = ReportGenerator::new(
        (state.generation_api)(&state.config, &generation_key),
        state.pause.clone(),
        state.config.job.clone(),
    );
    let pdf = render_report(&generator, &prepared).await?;

    let disposition = HeaderValue::from_str(&content_disposition(&report_filename(
        &prepared.company_name,
    )))
    .map_err(|e| AppError::Internal(format!("invalid content disposition: {e}")))?;

    tracing::info!(report.id = %prepared.id, pdf_bytes = pdf.len(), "Report delivered");

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

pub async fn create_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = ReportForm::read(multipart).await?;
    let result = create(&state, form).await;
    record_outcome("create", &result);
    result
}

pub async fn preview_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<PreparedReport>> {
    let mut form = ReportForm::read(multipart).await?;
    let result = prepare(&state, &mut form).await;
    record_outcome("preview", &result);
    result.map(Json)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::gamma::{
        GenerationApi, GenerationPayload, JobState, StatusResponse, SubmitResponse,
    };
    use crate::llm::{GenerateRequest, GenerateResponse, LlmClient, Provider};
    use crate::pipeline::source::fixtures::pdf_with_pages;

    const BOUNDARY: &str = "tcfd-test-boundary";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, filename, bytes) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(bytes);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn app(config: Config) -> axum::Router {
        crate::build_router(AppState::new(config))
    }

    struct CannedProvider;

    #[async_trait::async_trait]
    impl Provider for CannedProvider {
        async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            let content = if req.prompt.contains("Find the following key metrics") {
                "- Scope 1 GHG Emissions (in million tCO2e): 12.5\n\
                 - Scope 2 GHG Emissions (in million tCO2e): Not available"
            } else {
                "Disclosed in the source report."
            };
            Ok(GenerateResponse {
                content: content.to_string(),
                model: req.model.clone(),
                input_tokens: 1,
                output_tokens: 1,
                finish_reason: "stop".to_string(),
            })
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    struct InstantGammaApi;

    #[async_trait::async_trait]
    impl GenerationApi for InstantGammaApi {
        async fn submit(&self, payload: &GenerationPayload) -> anyhow::Result<SubmitResponse> {
            assert!(payload.input_text.contains("# TCFD Report: Polyus PJSC (2023)"));
            Ok(SubmitResponse {
                generation_id: Some("gen_42".to_string()),
            })
        }

        async fn status(&self, _generation_id: &str) -> anyhow::Result<StatusResponse> {
            Ok(StatusResponse {
                status: JobState::Completed,
                export_url: Some("https://cdn.example/gen_42.pdf".to_string()),
                error: None,
            })
        }

        async fn download(&self, _export_url: &str) -> anyhow::Result<Vec<u8>> {
            Ok(b"%PDF-1.7 generated".to_vec())
        }
    }

    /// Router with fake upstreams; returns the keys each factory was given.
    fn app_with_fakes(config: Config) -> (axum::Router, Arc<Mutex<Vec<String>>>) {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let summarizer_keys = keys.clone();
        let generation_keys = keys.clone();

        let mut state = AppState::new(config);
        state.summarizer = Arc::new(move |_: &Config, key: &str| {
            summarizer_keys.lock().unwrap().push(format!("summarizer:{key}"));
            LlmClient::new(Arc::new(CannedProvider), "test-model")
        });
        state.generation_api = Arc::new(move |_: &Config, key: &str| {
            generation_keys.lock().unwrap().push(format!("generation:{key}"));
            Arc::new(InstantGammaApi) as Arc<dyn GenerationApi>
        });

        (crate::build_router(state), keys)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(Config::for_tests())
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["service"], "tcfd-report-generator");
    }

    #[tokio::test]
    async fn test_create_without_keys_is_rejected() {
        let request = multipart_request(
            "/api/reports",
            &[
                Part::Text("company_name", "Polyus PJSC"),
                Part::Text("reporting_year", "2023"),
                Part::File("pdf", "report.pdf", b"%PDF-1.5"),
            ],
        );

        let response = app(Config::for_tests()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["category"], "validation");
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .contains("document generation")
        );
    }

    #[tokio::test]
    async fn test_create_missing_summarizer_key_is_rejected() {
        let request = multipart_request(
            "/api/reports",
            &[
                Part::Text("company_name", "Co"),
                Part::Text("reporting_year", "2023"),
                Part::Text("generation_api_key", "sk-gamma"),
                Part::File("pdf", "report.pdf", b"%PDF-1.5"),
            ],
        );

        let response = app(Config::for_tests()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("summarization"));
    }

    #[tokio::test]
    async fn test_create_missing_pdf_is_rejected() {
        let mut config = Config::for_tests();
        config.summarizer_api_key = Some("key".to_string());
        config.gamma_api_key = Some("key".to_string());
        let request = multipart_request(
            "/api/reports",
            &[
                Part::Text("company_name", "Co"),
                Part::Text("reporting_year", "2023"),
                Part::File("pdf", "empty.pdf", b""),
            ],
        );

        let response = app(config).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("PDF"));
    }

    #[tokio::test]
    async fn test_create_unreadable_pdf_is_unprocessable() {
        let request = multipart_request(
            "/api/reports",
            &[
                Part::Text("company_name", "Co"),
                Part::Text("reporting_year", "2023"),
                Part::Text("summarizer_api_key", "key"),
                Part::Text("generation_api_key", "key"),
                Part::File("pdf", "report.pdf", b"this is not a pdf"),
            ],
        );

        let response = app(Config::for_tests()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = json_body(response).await;
        assert_eq!(body["category"], "source_document");
    }

    #[tokio::test]
    async fn test_preview_requires_company_name() {
        let request = multipart_request(
            "/api/reports/preview",
            &[
                Part::Text("company_name", "   "),
                Part::Text("reporting_year", "2023"),
                Part::File("pdf", "report.pdf", b"%PDF-1.5"),
            ],
        );

        let response = app(Config::for_tests()).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"], "company_name is required");
    }

    #[tokio::test]
    async fn test_create_returns_generated_pdf() {
        let mut config = Config::for_tests();
        config.summarizer_api_key = Some("env-summarizer".to_string());
        config.gamma_api_key = Some("env-gamma".to_string());
        let (app, keys) = app_with_fakes(config);
        let pdf = pdf_with_pages(&["Board oversight of climate risk"]);
        let request = multipart_request(
            "/api/reports",
            &[
                Part::Text("company_name", "Polyus PJSC"),
                Part::Text("reporting_year", "2023"),
                Part::Text("generation_api_key", "form-gamma"),
                Part::File("pdf", "report.pdf", &pdf),
            ],
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/pdf"
        );
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"TCFD_Report_Polyus_PJSC.pdf\""));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"%PDF-1.7 generated");
        assert_eq!(
            *keys.lock().unwrap(),
            vec!["summarizer:env-summarizer".to_string(), "generation:form-gamma".to_string()]
        );
    }

    #[tokio::test]
    async fn test_preview_returns_prepared_report() {
        let (app, keys) = app_with_fakes(Config::for_tests());
        let pdf = pdf_with_pages(&["Board oversight of climate risk"]);
        let request = multipart_request(
            "/api/reports/preview",
            &[
                Part::Text("company_name", "Polyus PJSC"),
                Part::Text("reporting_year", "2023"),
                Part::Text("summarizer_api_key", "form-summarizer"),
                Part::File("pdf", "report.pdf", &pdf),
            ],
        );

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["metrics_source"], "narrative");
        assert_eq!(body["metrics"]["Scope 1 GHG Emissions"], "12.5");
        assert!(body["metrics"]["Scope 2 GHG Emissions"].is_null());
        assert_eq!(body["absent_disclosures"], 0);
        let prompt = body["prompt"].as_str().unwrap();
        assert!(prompt.contains("# TCFD Report: Polyus PJSC (2023)"));
        assert!(prompt.contains("- **Scope 1 GHG Emissions:** 12.5 million tCO2e"));
        assert_eq!(body["disclosures"].as_array().unwrap().len(), 12);
        assert_eq!(
            *keys.lock().unwrap(),
            vec!["summarizer:form-summarizer".to_string()]
        );
    }

    #[test]
    fn test_resolve_key_prefers_supplied() {
        let configured = "from-env".to_string();
        assert_eq!(
            resolve_key(Some("from-form".into()), Some(&configured), "summarization").unwrap(),
            "from-form"
        );
        assert_eq!(
            resolve_key(None, Some(&configured), "summarization").unwrap(),
            "from-env"
        );
        assert!(matches!(
            resolve_key(None, None, "summarization"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("TCFD_Report_Polyus_PJSC.pdf"),
            "attachment; filename=\"TCFD_Report_Polyus_PJSC.pdf\"; filename*=UTF-8''TCFD_Report_Polyus_PJSC.pdf"
        );
    }

    #[test]
    fn test_content_disposition_non_ascii_is_header_safe() {
        let value = content_disposition("TCFD_Report_Полюс.pdf");
        assert!(value.contains("filename=\"TCFD_Report______.pdf\""));
        assert!(value.contains("filename*=UTF-8''TCFD_Report_%D0%9F"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }

    #[test]
    fn test_form_inputs_keep_optional_spreadsheet() {
        let mut form = ReportForm {
            company_name: Some("Co".into()),
            reporting_year: Some("2023".into()),
            pdf: Some(b"%PDF".to_vec()),
            excel: Some(b"xlsx".to_vec()),
            ..Default::default()
        };
        let inputs = form.inputs().unwrap();
        assert_eq!(inputs.company_name, "Co");
        assert_eq!(inputs.excel.as_deref(), Some(&b"xlsx"[..]));
    }
}
