use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use super::{GenerationApi, GenerationPayload, StatusResponse, SubmitResponse};

/// HTTP client for the Gamma public generations API.
pub struct GammaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GammaClient {
    /// `base_url` is the versioned API root, e.g. `https://public-api.gamma.app/v0.2`.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn generations_url(&self) -> String {
        format!("{}/generations", self.base_url)
    }

    fn status_url(&self, generation_id: &str) -> String {
        format!("{}/generations/{}", self.base_url, generation_id)
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| anyhow::anyhow!("invalid API key header: {e}"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

async fn error_for_status(response: reqwest::Response, what: &str) -> anyhow::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow::anyhow!("{what} returned {status}: {body}"))
}

#[async_trait::async_trait]
impl GenerationApi for GammaClient {
    async fn submit(&self, payload: &GenerationPayload) -> anyhow::Result<SubmitResponse> {
        let url = self.generations_url();
        tracing::info!(url = %url, prompt_chars = payload.input_text.chars().count(), "Submitting generation job");

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(payload)
            .send()
            .await?;
        let response = error_for_status(response, "generation submit").await?;

        Ok(response.json().await?)
    }

    async fn status(&self, generation_id: &str) -> anyhow::Result<StatusResponse> {
        let response = self
            .client
            .get(self.status_url(generation_id))
            .headers(self.headers()?)
            .send()
            .await?;
        let response = error_for_status(response, "generation status").await?;

        Ok(response.json().await?)
    }

    async fn download(&self, export_url: &str) -> anyhow::Result<Vec<u8>> {
        tracing::info!(url = %export_url, "Downloading generated report");

        let response = self.client.get(export_url).send().await?;
        let response = error_for_status(response, "report download").await?;

        Ok(response.bytes().await?.to_vec())
    }
}
