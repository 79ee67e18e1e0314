use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};

use crate::catalogue::CatalogueVariant;
use crate::gamma::JobConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizerProvider {
    Google,
    OpenAI,
}

impl SummarizerProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummarizerProvider::Google => "google",
            SummarizerProvider::OpenAI => "openai",
        }
    }
}

impl FromStr for SummarizerProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gemini" => Ok(SummarizerProvider::Google),
            "openai" => Ok(SummarizerProvider::OpenAI),
            other => Err(anyhow!("unknown summarizer provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: String,
    pub summarizer_provider: SummarizerProvider,
    pub summarizer_model: String,
    pub summarizer_api_key: Option<String>,
    pub source_language: Option<String>,
    pub gamma_api_key: Option<String>,
    pub gamma_base_url: String,
    pub job: JobConfig,
    pub metrics_sheet: String,
    pub metrics_year_column: usize,
    pub catalogue: CatalogueVariant,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let summarizer_provider: SummarizerProvider = parse_var("SUMMARIZER_PROVIDER", "google")?;
        let summarizer_api_key = match summarizer_provider {
            SummarizerProvider::Google => non_empty_var("GEMINI_API_KEY"),
            SummarizerProvider::OpenAI => non_empty_var("OPENAI_API_KEY"),
        };
        let default_model = match summarizer_provider {
            SummarizerProvider::Google => "gemini-1.5-pro-latest",
            SummarizerProvider::OpenAI => "gpt-4.1",
        };

        let mut job = JobConfig::default();
        if let Some(theme) = non_empty_var("GAMMA_THEME") {
            job.theme_name = theme;
        }
        if let Some(language) = non_empty_var("GAMMA_LANGUAGE") {
            job.language = language;
        }
        job.poll_interval = Duration::from_secs(parse_var("GAMMA_POLL_INTERVAL_SECS", "10")?);
        job.max_polls = parse_var("GAMMA_MAX_POLLS", "25")?;
        if job.max_polls == 0 {
            return Err(anyhow!("GAMMA_MAX_POLLS must be at least 1"));
        }

        Ok(Self {
            port: parse_var("APP_PORT", "8080")?,
            environment: env::var("APP_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            summarizer_provider,
            summarizer_model: env::var("SUMMARIZER_MODEL")
                .unwrap_or_else(|_| default_model.to_string()),
            summarizer_api_key,
            source_language: non_empty_var("SOURCE_LANGUAGE"),
            gamma_api_key: non_empty_var("GAMMA_API_KEY"),
            gamma_base_url: env::var("GAMMA_BASE_URL")
                .unwrap_or_else(|_| "https://public-api.gamma.app/v0.2".to_string()),
            job,
            metrics_sheet: env::var("METRICS_SHEET")
                .unwrap_or_else(|_| "Environmental".to_string()),
            metrics_year_column: parse_var("METRICS_YEAR_COLUMN", "10")?,
            catalogue: parse_var("DISCLOSURE_CATALOGUE", "tcfd")?,
            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", "52428800")?,
            request_timeout: Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", "900")?),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "tcfd-report-generator".to_string()),
            otel_exporter_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4317".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_value(name, &raw)
}

fn parse_value<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("{name} has an invalid value '{raw}'"))
}

#[cfg(test)]
impl Config {
    /// Defaults with no credentials configured.
    pub fn for_tests() -> Self {
        Self {
            port: 0,
            environment: "test".to_string(),
            summarizer_provider: SummarizerProvider::Google,
            summarizer_model: "gemini-1.5-pro-latest".to_string(),
            summarizer_api_key: None,
            source_language: None,
            gamma_api_key: None,
            gamma_base_url: "http://127.0.0.1:9".to_string(),
            job: JobConfig::default(),
            metrics_sheet: "Environmental".to_string(),
            metrics_year_column: 10,
            catalogue: CatalogueVariant::Tcfd,
            max_upload_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            otel_service_name: "tcfd-report-generator".to_string(),
            otel_exporter_endpoint: "http://localhost:4317".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarizer_provider_parse() {
        assert_eq!(
            "google".parse::<SummarizerProvider>().unwrap(),
            SummarizerProvider::Google
        );
        assert_eq!(
            "Gemini".parse::<SummarizerProvider>().unwrap(),
            SummarizerProvider::Google
        );
        assert_eq!(
            "openai".parse::<SummarizerProvider>().unwrap(),
            SummarizerProvider::OpenAI
        );
        assert!("mistral".parse::<SummarizerProvider>().is_err());
    }

    #[test]
    fn test_parse_value_numbers() {
        let port: u16 = parse_value("APP_PORT", "8080").unwrap();
        assert_eq!(port, 8080);
        let column: usize = parse_value("METRICS_YEAR_COLUMN", " 10 ").unwrap();
        assert_eq!(column, 10);
    }

    #[test]
    fn test_parse_value_reports_variable_name() {
        let err = parse_value::<u16>("APP_PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }

    #[test]
    fn test_parse_value_catalogue() {
        let variant: CatalogueVariant = parse_value("DISCLOSURE_CATALOGUE", "legacy").unwrap();
        assert_eq!(variant, CatalogueVariant::Legacy);
        assert!(parse_value::<CatalogueVariant>("DISCLOSURE_CATALOGUE", "gri").is_err());
    }
}
