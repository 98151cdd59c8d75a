use {
    async_openai::{
        config::OpenAIConfig,
        types::chat::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
    },
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
};

use crate::{
    CompletionService,
    error::{Error, Result},
};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const MODEL_ENV: &str = "OPENAI_MODEL";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Completion service backed by the `async-openai` crate.
///
/// Built once at startup and shared by every sink that needs it.
pub struct OpenAiCompletion {
    model: String,
    client: async_openai::Client<OpenAIConfig>,
}

impl OpenAiCompletion {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key.expose_secret())
            .with_api_base(&base_url);
        Self {
            model,
            client: async_openai::Client::with_config(config),
        }
    }

    /// Build from `OPENAI_API_KEY` (required), `OPENAI_MODEL` and
    /// `OPENAI_BASE_URL` (optional). Explicit overrides win over the
    /// environment.
    pub fn from_env(model: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok(), model, base_url)
    }

    fn from_env_with(
        lookup: impl Fn(&str) -> Option<String>,
        model: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let api_key = lookup(API_KEY_ENV)
            .filter(|key| !key.trim().is_empty())
            .ok_or(Error::MissingApiKey { name: API_KEY_ENV })?;
        let model = model
            .map(str::to_string)
            .or_else(|| lookup(MODEL_ENV))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| lookup(BASE_URL_ENV))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(Secret::new(api_key), model, base_url))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        debug!(
            model = %self.model,
            choices = response.choices.len(),
            "completion received"
        );

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(Error::EmptyResponse)
    }
}
