//! The simulated survey respondent: prompt in, raw reply out.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::ClientConfig;
use crate::gateway::{
    ChatGateway, ChatRequest, FinishReason, Message, ProviderError, ProviderGateway, UsageSink,
};

/// Sends one survey prompt and returns the reply text untouched.
#[async_trait]
pub trait ChoiceClient: Send + Sync {
    async fn query(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// [`ChoiceClient`] backed by a chat gateway.
pub struct LlmRespondent<G: ChatGateway> {
    gateway: G,
    model: String,
    max_reply_tokens: u32,
}

impl<U: UsageSink> LlmRespondent<ProviderGateway<U>> {
    pub fn new(config: &ClientConfig, usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let gateway = ProviderGateway::new(config, usage_sink)?;
        Ok(Self::with_gateway(gateway, &config.model, config.max_reply_tokens))
    }
}

impl<G: ChatGateway> LlmRespondent<G> {
    pub fn with_gateway(gateway: G, model: impl Into<String>, max_reply_tokens: u32) -> Self {
        Self {
            gateway,
            model: model.into(),
            max_reply_tokens,
        }
    }
}

#[async_trait]
impl<G: ChatGateway> ChoiceClient for LlmRespondent<G> {
    async fn query(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::user(prompt)],
            "respondent::query",
        )
        .max_tokens(self.max_reply_tokens);

        let response = self.gateway.chat(request).await?;
        match &response.finish_reason {
            FinishReason::Length => warn!(
                max_reply_tokens = self.max_reply_tokens,
                request_id = ?response.request_id,
                "Reply truncated at the token cap"
            ),
            FinishReason::ContentFilter => warn!(
                request_id = ?response.request_id,
                "Reply cut short by the provider's content filter"
            ),
            FinishReason::Stop | FinishReason::Unknown(_) => {}
        }
        Ok(response.content)
    }
}
