use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("tcfd-report-generator"));

// --- Summarization (gen_ai) ---

pub static GEN_AI_TOKEN_USAGE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Number of tokens used per summarization call")
        .with_unit("{token}")
        .build()
});

pub static GEN_AI_OPERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("Duration of summarization calls in seconds")
        .with_unit("s")
        .build()
});

pub static GEN_AI_ERROR_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.error.count")
        .with_description("Number of failed summarization calls")
        .with_unit("{error}")
        .build()
});

// --- Document generation ---

pub static GENERATION_POLLS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.generation.polls")
        .with_description("Status polls issued per document generation job")
        .with_unit("{poll}")
        .build()
});

pub static GENERATION_JOB_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.generation.job.duration")
        .with_description("Time from job submission to terminal state in seconds")
        .with_unit("s")
        .build()
});

// --- Domain Metrics ---

pub static REPORT_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.duration")
        .with_description("Total time to prepare or render a report in seconds")
        .with_unit("s")
        .build()
});

pub static REPORT_ABSENT_DISCLOSURES: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.disclosures.absent")
        .with_description("Disclosures replaced by the not-disclosed phrase per report")
        .with_unit("{disclosure}")
        .build()
});

pub static REPORT_OUTCOMES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.outcomes")
        .with_description("Report requests by outcome category")
        .with_unit("{report}")
        .build()
});

// --- HTTP Metrics ---

pub static HTTP_REQUESTS_TOTAL: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("http.requests.total")
        .with_description("Total number of HTTP requests")
        .with_unit("{request}")
        .build()
});

pub static HTTP_REQUEST_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("http.request.duration")
        .with_description("HTTP request duration in milliseconds")
        .with_unit("ms")
        .with_boundaries(vec![
            10.0, 100.0, 1000.0, 5000.0, 15000.0, 30000.0, 60000.0, 120000.0, 300000.0,
            600000.0,
        ])
        .build()
});
