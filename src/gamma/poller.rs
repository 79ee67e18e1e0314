use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{GenerationApi, GenerationError, GenerationPayload, JobConfig, JobState, StatusResponse};
use crate::telemetry::metrics::{GENERATION_JOB_DURATION, GENERATION_POLLS};

/// Wait between status polls.
#[async_trait::async_trait]
pub trait Pause: Send + Sync {
    async fn pause(&self, duration: Duration);
}

pub struct TokioPause;

#[async_trait::async_trait]
impl Pause for TokioPause {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    Polling { generation_id: String, polls: u32 },
    Downloading { export_url: String },
}

/// What a single status response means for the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(String),
    Pending,
}

pub fn interpret_status(response: &StatusResponse) -> Result<PollOutcome, GenerationError> {
    match response.status {
        JobState::Completed => match response.export_url.as_deref() {
            Some(url) if !url.trim().is_empty() => Ok(PollOutcome::Ready(url.to_string())),
            _ => Ok(PollOutcome::Pending),
        },
        JobState::Failed => Err(GenerationError::Failed(response.error_detail())),
        JobState::Submitted | JobState::Running | JobState::Unknown => Ok(PollOutcome::Pending),
    }
}

/// Submits a prompt, polls the job to a terminal state and downloads the file.
pub struct ReportGenerator {
    api: Arc<dyn GenerationApi>,
    pause: Arc<dyn Pause>,
    job: JobConfig,
}

impl ReportGenerator {
    pub fn new(api: Arc<dyn GenerationApi>, pause: Arc<dyn Pause>, job: JobConfig) -> Self {
        Self { api, pause, job }
    }

    #[tracing::instrument(
        name = "pipeline_stage render",
        skip(self, prompt),
        fields(
            pipeline.stage = "render",
            generation.id,
            generation.polls,
            generation.bytes,
        )
    )]
    pub async fn generate(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let span = tracing::Span::current();
        let payload = GenerationPayload::new(prompt, &self.job);

        let submitted = self
            .api
            .submit(&payload)
            .await
            .map_err(|e| GenerationError::Submission(e.to_string()))?;
        let generation_id = submitted
            .generation_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::Submission("response did not include a generationId".to_string())
            })?;

        span.record("generation.id", generation_id.as_str());
        tracing::info!(generation_id = %generation_id, "Generation job accepted");

        let started = Instant::now();
        let mut phase = JobPhase::Polling {
            generation_id,
            polls: 0,
        };

        loop {
            phase = match phase {
                JobPhase::Polling {
                    generation_id,
                    polls,
                } => {
                    if polls >= self.job.max_polls {
                        self.record_job(polls, started, "timeout");
                        return Err(GenerationError::Timeout { polls });
                    }
                    if polls > 0 {
                        self.pause.pause(self.job.poll_interval).await;
                    }

                    let polls = polls + 1;
                    tracing::info!(
                        generation_id = %generation_id,
                        poll = polls,
                        max_polls = self.job.max_polls,
                        "Polling generation status"
                    );

                    let response = match self.api.status(&generation_id).await {
                        Ok(response) => response,
                        Err(e) => {
                            self.record_job(polls, started, "failed");
                            return Err(GenerationError::Failed(format!(
                                "status request failed: {e}"
                            )));
                        }
                    };

                    match interpret_status(&response) {
                        Ok(PollOutcome::Ready(export_url)) => {
                            self.record_job(polls, started, "completed");
                            span.record("generation.polls", polls);
                            JobPhase::Downloading { export_url }
                        }
                        Ok(PollOutcome::Pending) => JobPhase::Polling {
                            generation_id,
                            polls,
                        },
                        Err(e) => {
                            self.record_job(polls, started, "failed");
                            return Err(e);
                        }
                    }
                }
                JobPhase::Downloading { export_url } => {
                    let bytes = self
                        .api
                        .download(&export_url)
                        .await
                        .map_err(|e| GenerationError::Download(e.to_string()))?;
                    span.record("generation.bytes", bytes.len());
                    return Ok(bytes);
                }
            };
        }
    }

    fn record_job(&self, polls: u32, started: Instant, outcome: &'static str) {
        let attrs = [opentelemetry::KeyValue::new("generation.outcome", outcome)];
        GENERATION_POLLS.record(f64::from(polls), &attrs);
        GENERATION_JOB_DURATION.record(started.elapsed().as_secs_f64(), &attrs);
    }
}
