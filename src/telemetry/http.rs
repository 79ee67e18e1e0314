use std::time::Duration;

use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use opentelemetry::KeyValue;
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Span;

use super::metrics::{HTTP_REQUEST_DURATION, HTTP_REQUESTS_TOTAL};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

fn route_of<B>(request: &Request<B>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// Server span per request, named `{method} {route}`.
#[derive(Clone)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let method = request.method().as_str();
        let route = route_of(request);
        let header = |name: &str| {
            request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string()
        };

        tracing::info_span!(
            "HTTP request",
            otel.name = %format!("{method} {route}"),
            otel.kind = "server",
            http.request.method = %method,
            http.route = %route,
            url.path = %request.uri().path(),
            network.protocol.version = ?request.version(),
            user_agent.original = %header("user-agent"),
            request.id = %header(REQUEST_ID_HEADER),
            http.request.body.size = %header("content-length"),
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
        )
    }
}

/// Closes the request span and records the HTTP metrics.
#[derive(Clone)]
pub struct RequestOutcome;

impl<B> OnResponse<B> for RequestOutcome {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        let code = status.as_u16();

        span.record("http.response.status_code", i64::from(code));
        span.record(
            "otel.status_code",
            if status.is_server_error() { "ERROR" } else { "OK" },
        );

        let latency_ms = latency.as_secs_f64() * 1000.0;
        let attrs = [
            KeyValue::new("http.response.status_code", i64::from(code)),
            KeyValue::new("http.status_class", format!("{}xx", code / 100)),
        ];
        HTTP_REQUESTS_TOTAL.add(1, &attrs);
        HTTP_REQUEST_DURATION.record(latency_ms, &attrs);

        if status.is_server_error() {
            tracing::warn!(http.response.status_code = code, latency_ms, "request failed");
        } else {
            tracing::info!(http.response.status_code = code, latency_ms, "request finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_falls_back_to_path() {
        let request = Request::builder()
            .uri("/api/reports/preview?debug=1")
            .body(())
            .unwrap();
        assert_eq!(route_of(&request), "/api/reports/preview");
    }
}
