use crate::models::{ConversationTurn, Role};
use async_openai::{
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use tracing::error;

const STRUCTURED_OUTPUT_RULE: &str = "Responde únicamente con un objeto JSON válido, sin texto adicional antes ni después.";

#[derive(Clone)]
pub struct CognitiveService {
    client: Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl CognitiveService {
    pub fn new(api_key: &str, model: &str) -> Self {
        let config = async_openai::config::OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(config);
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// One completion over the full conversation. When `structured` is set
    /// the model is instructed to emit bare JSON; the caller still parses
    /// defensively.
    pub async fn complete(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
        structured: bool,
    ) -> Result<String, anyhow::Error> {
        let system = if structured {
            format!("{}\n\n{}", system_prompt, STRUCTURED_OUTPUT_RULE)
        } else {
            system_prompt.to_string()
        };

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 2);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()?
                .into(),
        );
        for turn in history {
            match turn.role {
                Role::User => messages.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
                Role::Assistant => messages.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(turn.content.clone())
                        .build()?
                        .into(),
                ),
            }
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message.to_string())
                .build()?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            error!("Failed to create chat completion: {}", e);
            e
        })?;

        if let Some(choice) = response.choices.first() {
            if let Some(content) = &choice.message.content {
                Ok(content.clone())
            } else {
                Err(anyhow::anyhow!("No content returned in chat completion"))
            }
        } else {
            Err(anyhow::anyhow!("No choices returned in chat completion"))
        }
    }
}
