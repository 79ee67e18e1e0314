use async_openai::{
    Client,
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        CreateChatCompletionResponse,
    },
};

use super::{GenerateRequest, GenerateResponse, Provider};
use crate::config::SummarizerProvider;

/// Gemini's OpenAI-compatible endpoint.
pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Chat-completions provider for OpenAI and Gemini.
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    kind: SummarizerProvider,
}

impl OpenAIProvider {
    pub fn new(kind: SummarizerProvider, api_key: &str) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if kind == SummarizerProvider::Google {
            config = config.with_api_base(GOOGLE_API_BASE);
        }
        Self {
            client: Client::with_config(config),
            kind,
        }
    }
}

fn chat_messages(req: &GenerateRequest) -> Vec<ChatCompletionRequestMessage> {
    let mut messages = Vec::with_capacity(2);
    if !req.system.is_empty() {
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(req.system.clone()),
                name: None,
            },
        ));
    }
    messages.push(ChatCompletionRequestMessage::User(
        ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(req.prompt.clone()),
            name: None,
        },
    ));
    messages
}

/// A response without choices is an upstream fault; a choice with no text is
/// an empty answer.
fn into_generate_response(
    response: CreateChatCompletionResponse,
) -> anyhow::Result<GenerateResponse> {
    let Some(choice) = response.choices.into_iter().next() else {
        anyhow::bail!("chat completion returned no choices");
    };

    let (input_tokens, output_tokens) = response
        .usage
        .map(|usage| (usage.prompt_tokens, usage.completion_tokens))
        .unwrap_or((0, 0));

    Ok(GenerateResponse {
        content: choice.message.content.unwrap_or_default(),
        model: response.model,
        input_tokens,
        output_tokens,
        finish_reason: choice
            .finish_reason
            .map(|r| format!("{r:?}").to_lowercase())
            .unwrap_or_default(),
    })
}

#[async_trait::async_trait]
impl Provider for OpenAIProvider {
    async fn generate(&self, req: &GenerateRequest) -> anyhow::Result<GenerateResponse> {
        #[allow(deprecated)]
        let request = CreateChatCompletionRequest {
            model: req.model.clone(),
            messages: chat_messages(req),
            temperature: Some(req.temperature),
            max_completion_tokens: Some(req.max_tokens),
            ..Default::default()
        };

        let response = self.client.chat().create(request).await?;
        into_generate_response(response)
    }

    fn name(&self) -> &str {
        self.kind.as_str()
    }
}
