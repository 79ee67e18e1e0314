//! Document-generation service: request/response types, the HTTP seam and
//! the polling generator built on top of it.

pub mod client;
pub mod poller;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::GammaClient;
pub use poller::{Pause, ReportGenerator, TokioPause};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("no result after {polls} status polls")]
    Timeout { polls: u32 },

    #[error("download failed: {0}")]
    Download(String),
}

/// Presentation options sent with every job, plus the client-side poll budget.
#[derive(Debug, Clone, PartialEq)]
pub struct JobConfig {
    pub theme_name: String,
    pub additional_instructions: String,
    pub language: String,
    pub amount: String,
    pub image_source: String,
    pub image_style: String,
    pub dimensions: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            theme_name: "ESG_Anna".to_string(),
            additional_instructions: "It is critically important that all text fits neatly within the page boundaries. \
                Adjust layouts or slightly condense the text on each page to prevent any overflow."
                .to_string(),
            language: "en".to_string(),
            amount: "detailed".to_string(),
            image_source: "aiGenerated".to_string(),
            image_style: "photorealistic, corporate, clean".to_string(),
            dimensions: "a4".to_string(),
            poll_interval: Duration::from_secs(10),
            max_polls: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    pub input_text: String,
    pub format: &'static str,
    pub export_as: &'static str,
    pub text_mode: &'static str,
    pub additional_instructions: String,
    pub theme_name: String,
    pub text_options: TextOptions,
    pub image_options: ImageOptions,
    pub card_options: CardOptions,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextOptions {
    pub language: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageOptions {
    pub source: String,
    pub style: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CardOptions {
    pub dimensions: String,
}

impl GenerationPayload {
    pub fn new(prompt: &str, job: &JobConfig) -> Self {
        Self {
            input_text: prompt.to_string(),
            format: "document",
            export_as: "pdf",
            text_mode: "condense",
            additional_instructions: job.additional_instructions.clone(),
            theme_name: job.theme_name.clone(),
            text_options: TextOptions {
                language: job.language.clone(),
                amount: job.amount.clone(),
            },
            image_options: ImageOptions {
                source: job.image_source.clone(),
                style: job.image_style.clone(),
            },
            card_options: CardOptions {
                dimensions: job.dimensions.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub generation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Submitted,
    Running,
    Completed,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub status: JobState,
    #[serde(default)]
    pub export_url: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl StatusResponse {
    /// The service's error detail as plain text.
    pub fn error_detail(&self) -> String {
        match &self.error {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Object(map)) => map
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| serde_json::Value::Object(map.clone()).to_string()),
            Some(other) => other.to_string(),
            None => "no error detail reported".to_string(),
        }
    }
}

/// HTTP operations of the document-generation service.
#[async_trait::async_trait]
pub trait GenerationApi: Send + Sync {
    async fn submit(&self, payload: &GenerationPayload) -> anyhow::Result<SubmitResponse>;
    async fn status(&self, generation_id: &str) -> anyhow::Result<StatusResponse>;
    async fn download(&self, export_url: &str) -> anyhow::Result<Vec<u8>>;
}

/// Generation API client for one request, keyed with `api_key`.
pub fn generation_api(config: &Config, api_key: &str) -> Arc<dyn GenerationApi> {
    Arc::new(GammaClient::new(&config.gamma_base_url, api_key))
}
