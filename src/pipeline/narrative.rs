use serde::Serialize;
use thiserror::Error;

use crate::catalogue::{Disclosure, QUANTITATIVE_QUESTION, QUANTITATIVE_QUESTION_ID};
use crate::llm::{GenerateRequest, LlmClient};

pub const ANALYST_INSTRUCTION: &str = "You are a professional ESG analyst. Your task is to analyze the following sustainability report text \
and provide a clear, structured summary in ENGLISH based on the user's request. \
Focus only on the information relevant to the specific request. \
The source text may be written in a language other than English.";

#[derive(Error, Debug)]
#[error("summarization failed at '{disclosure}': {message}")]
pub struct ExtractionError {
    pub disclosure: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub text: &'static str,
}

/// Catalogue questions in declared order, followed by the quantitative
/// question when metrics must be recovered from the narrative.
pub fn questions_for(disclosures: &[Disclosure], with_quantitative: bool) -> Vec<Question> {
    let mut questions: Vec<Question> = disclosures
        .iter()
        .map(|d| Question {
            id: d.id,
            text: d.question,
        })
        .collect();
    if with_quantitative {
        questions.push(Question {
            id: QUANTITATIVE_QUESTION_ID,
            text: QUANTITATIVE_QUESTION,
        });
    }
    questions
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeAnswer {
    pub disclosure: String,
    pub answer: String,
}

/// Answers in the order the questions were asked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NarrativeAnswers(Vec<NarrativeAnswer>);

impl NarrativeAnswers {
    pub fn insert(&mut self, disclosure: &str, answer: String) {
        match self.0.iter_mut().find(|a| a.disclosure == disclosure) {
            Some(existing) => existing.answer = answer,
            None => self.0.push(NarrativeAnswer {
                disclosure: disclosure.to_string(),
                answer,
            }),
        }
    }

    pub fn get(&self, disclosure: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.disclosure == disclosure)
            .map(|a| a.answer.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NarrativeAnswer> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for NarrativeAnswers {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut answers = NarrativeAnswers::default();
        for (disclosure, answer) in pairs {
            answers.insert(disclosure, answer.to_string());
        }
        answers
    }
}

pub fn request_prompt(question: &str, source_text: &str, source_language: Option<&str>) -> String {
    let source_heading = match source_language {
        Some(language) => format!("SOURCE TEXT (in {language})"),
        None => "SOURCE TEXT".to_string(),
    };
    format!("REQUEST: {question}\n\n{source_heading}:\n{source_text}")
}

/// One summarization call per question, issued sequentially. The first
/// failed call aborts the batch.
#[tracing::instrument(
    name = "pipeline_stage narrative",
    skip(llm_client, source_text, questions),
    fields(
        pipeline.stage = "narrative",
        narrative.questions = questions.len(),
        narrative.source_chars = source_text.chars().count(),
        narrative.empty_answers,
    )
)]
pub async fn extract_narrative(
    llm_client: &LlmClient,
    source_text: &str,
    questions: &[Question],
    source_language: Option<&str>,
) -> Result<NarrativeAnswers, ExtractionError> {
    let total = questions.len();
    let mut answers = NarrativeAnswers::default();

    for (index, question) in questions.iter().enumerate() {
        tracing::info!(
            index = index + 1,
            total,
            disclosure = question.id,
            "Extracting disclosure"
        );

        let resp = llm_client
            .generate(&GenerateRequest {
                model: llm_client.model().to_string(),
                system: ANALYST_INSTRUCTION.to_string(),
                prompt: request_prompt(question.text, source_text, source_language),
                temperature: 0.3,
                max_tokens: 2048,
                stage: "narrative".to_string(),
            })
            .await
            .map_err(|e| ExtractionError {
                disclosure: question.id.to_string(),
                message: e.to_string(),
            })?;

        answers.insert(question.id, resp.content);
    }

    let empty = answers.iter().filter(|a| a.answer.trim().is_empty()).count();
    tracing::Span::current().record("narrative.empty_answers", empty);
    tracing::info!(
        total,
        empty,
        provider = llm_client.provider_name(),
        model = llm_client.model(),
        "Narrative extraction finished"
    );

    Ok(answers)
}
