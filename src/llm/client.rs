use std::sync::Arc;
use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::{GenerateRequest, GenerateResponse, Provider};
use crate::telemetry::metrics::{GEN_AI_ERROR_COUNT, GEN_AI_OPERATION_DURATION, GEN_AI_TOKEN_USAGE};

/// Single-provider chat client. Calls are made once; a failure is returned
/// to the caller as-is.
pub struct LlmClient {
    provider: Arc<dyn Provider>,
    model: String,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// One chat call inside a `gen_ai.chat` span. Failures are counted and
    /// returned unchanged.
    pub async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        let provider_name = self.provider.name().to_string();
        let span = chat_span(req, &provider_name);
        span.add_event("gen_ai.user.message", prompt_event(req));

        let start = Instant::now();
        let result = self.provider.generate(req).instrument(span.clone()).await;
        let attrs = [
            KeyValue::new("gen_ai.provider.name", provider_name),
            KeyValue::new("gen_ai.request.model", req.model.clone()),
            KeyValue::new("report.stage", req.stage.clone()),
        ];

        match &result {
            Ok(resp) => record_success(&span, resp, &attrs, start.elapsed().as_secs_f64()),
            Err(err) => record_failure(&span, err, &attrs),
        }
        result
    }
}

fn chat_span(req: &GenerateRequest, provider_name: &str) -> tracing::Span {
    tracing::info_span!(
        "gen_ai.chat",
        otel.name = %format!("gen_ai.chat {}", req.model),
        otel.kind = "client",
        gen_ai.operation.name = "chat",
        gen_ai.provider.name = %provider_name,
        gen_ai.request.model = %req.model,
        gen_ai.request.temperature = f64::from(req.temperature),
        gen_ai.request.max_tokens = i64::from(req.max_tokens),
        gen_ai.response.model = tracing::field::Empty,
        gen_ai.usage.input_tokens = tracing::field::Empty,
        gen_ai.usage.output_tokens = tracing::field::Empty,
        gen_ai.response.finish_reasons = tracing::field::Empty,
        report.stage = %req.stage,
        otel.status_code = tracing::field::Empty,
        error.type = tracing::field::Empty,
    )
}

// The prompt embeds the whole source report; only its head is exported.
fn prompt_event(req: &GenerateRequest) -> Vec<KeyValue> {
    let mut attrs = vec![KeyValue::new("gen_ai.prompt", truncate(&req.prompt, 1000))];
    if !req.system.is_empty() {
        attrs.push(KeyValue::new(
            "gen_ai.system_instructions",
            truncate(&req.system, 500),
        ));
    }
    attrs
}

fn record_success(span: &tracing::Span, resp: &GenerateResponse, attrs: &[KeyValue], secs: f64) {
    span.record("gen_ai.response.model", resp.model.as_str());
    span.record("gen_ai.usage.input_tokens", i64::from(resp.input_tokens));
    span.record("gen_ai.usage.output_tokens", i64::from(resp.output_tokens));
    if !resp.finish_reason.is_empty() {
        span.record("gen_ai.response.finish_reasons", resp.finish_reason.as_str());
    }
    span.add_event(
        "gen_ai.assistant.message",
        vec![KeyValue::new("gen_ai.completion", truncate(&resp.content, 2000))],
    );

    for (kind, tokens) in [("input", resp.input_tokens), ("output", resp.output_tokens)] {
        let mut token_attrs = attrs.to_vec();
        token_attrs.push(KeyValue::new("gen_ai.token.type", kind));
        GEN_AI_TOKEN_USAGE.record(f64::from(tokens), &token_attrs);
    }
    GEN_AI_OPERATION_DURATION.record(secs, attrs);

    if resp.content.trim().is_empty() {
        tracing::warn!(model = %resp.model, "Model returned an empty answer");
    }
}

fn record_failure(span: &tracing::Span, err: &anyhow::Error, attrs: &[KeyValue]) {
    let error_type = classify_error(err);
    span.record("otel.status_code", "ERROR");
    span.record("error.type", error_type);

    let mut error_attrs = attrs.to_vec();
    error_attrs.push(KeyValue::new("error.type", error_type));
    GEN_AI_ERROR_COUNT.add(1, &error_attrs);

    tracing::error!(error = %err, error.type = error_type, "Chat completion failed");
}

pub(crate) fn classify_error(err: &anyhow::Error) -> &'static str {
    let msg = err.to_string().to_lowercase();
    if msg.contains("quota") || msg.contains("rate limit") || msg.contains("429") {
        "rate_limit"
    } else if msg.contains("timeout") || msg.contains("timed out") || msg.contains("deadline") {
        "timeout"
    } else if msg.contains("401")
        || msg.contains("403")
        || msg.contains("auth")
        || msg.contains("api key")
    {
        "auth_error"
    } else if msg.contains("400") || msg.contains("422") || msg.contains("invalid") {
        "invalid_request"
    } else if msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("server")
    {
        "server_error"
    } else if msg.contains("connect")
        || msg.contains("dns")
        || msg.contains("network")
        || msg.contains("reset")
    {
        "network_error"
    } else {
        "unknown_error"
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.char_indices()
            .take_while(|&(i, c)| i + c.len_utf8() <= max)
            .map(|(_, c)| c)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider;

    #[async_trait::async_trait]
    impl Provider for StaticProvider {
        async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
            if req.prompt.is_empty() {
                anyhow::bail!("400 invalid request: empty prompt");
            }
            Ok(GenerateResponse {
                content: format!("echo: {}", req.prompt),
                model: req.model.clone(),
                input_tokens: 10,
                output_tokens: 5,
                finish_reason: "stop".to_string(),
            })
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    fn request(prompt: &str) -> GenerateRequest {
        GenerateRequest {
            model: "test-model".to_string(),
            system: "system".to_string(),
            prompt: prompt.to_string(),
            temperature: 0.3,
            max_tokens: 16,
            stage: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_generate_passes_through_response() {
        let client = LlmClient::new(Arc::new(StaticProvider), "test-model");
        let resp = client.generate(&request("hello")).await.unwrap();
        assert_eq!(resp.content, "echo: hello");
        assert_eq!(client.provider_name(), "static");
        assert_eq!(client.model(), "test-model");
    }

    #[tokio::test]
    async fn test_generate_returns_provider_error() {
        let client = LlmClient::new(Arc::new(StaticProvider), "test-model");
        let err = client.generate(&request("")).await.unwrap_err();
        assert!(err.to_string().contains("empty prompt"));
    }

    #[test]
    fn test_classify_error_categories() {
        let cases = vec![
            ("rate limit exceeded", "rate_limit"),
            ("Quota exceeded for project", "rate_limit"),
            ("status 429: too many requests", "rate_limit"),
            ("request timed out", "timeout"),
            ("401 unauthorized", "auth_error"),
            ("API key not valid", "auth_error"),
            ("400 bad request", "invalid_request"),
            ("503 service unavailable", "server_error"),
            ("connection refused", "network_error"),
            ("something unexpected", "unknown_error"),
        ];

        for (msg, expected) in cases {
            let err = anyhow::anyhow!("{}", msg);
            assert_eq!(
                classify_error(&err),
                expected,
                "classify_error({msg:?}) should be {expected:?}"
            );
        }
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hello");
    }

    #[test]
    fn test_truncate_multibyte_safe() {
        let result = truncate("hé世界!", 3);
        assert_eq!(result, "hé");
        assert!(result.len() <= 3);
    }

    #[test]
    fn test_truncate_never_exceeds_limit() {
        assert_eq!(truncate("a世", 2), "a");
        assert_eq!(truncate("a世", 4), "a世");
        for max in 0..12 {
            assert!(truncate("Полюс 世界", max).len() <= max);
        }
    }
}
