pub mod client;
pub mod openai;

use std::sync::Arc;

pub use client::LlmClient;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: String,
}

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse>;
    fn name(&self) -> &str;
}

/// Summarization client for one request, keyed with `api_key`.
pub fn summarizer(config: &Config, api_key: &str) -> LlmClient {
    let provider: Arc<dyn Provider> = Arc::new(openai::OpenAIProvider::new(
        config.summarizer_provider,
        api_key,
    ));

    LlmClient::new(provider, config.summarizer_model.clone())
}
