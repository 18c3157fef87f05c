//! Provider gateway for chat completions.

pub mod chat_completions;
pub mod error;
pub mod types;
pub mod usage;

use std::sync::Arc;

use chat_completions::{ChatCompletionsAdapter, ChatProvider};
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

use crate::config::ClientConfig;

pub use error::{ErrorContext, ProviderError};
pub use types::*;
pub use usage::{NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Single-attempt gateway: one request per call, usage recorded either way.
pub struct ProviderGateway<U: UsageSinkTrait> {
    adapter: ChatCompletionsAdapter,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn new(config: &ClientConfig, usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let adapter = ChatCompletionsAdapter::new(config)?;
        Ok(Self::with_adapter(adapter, usage_sink))
    }

    pub fn with_adapter(adapter: ChatCompletionsAdapter, usage_sink: Arc<U>) -> Self {
        Self {
            adapter,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let result = self.adapter.chat(&req).await;

        let record = ProviderCallRecord::new("chat/completions", &req.model, req.caller);
        let record = match &result {
            Ok(resp) => record
                .tokens(resp.input_tokens, resp.output_tokens)
                .latency(resp.latency.as_millis() as u64)
                .request_id(resp.request_id.clone()),
            Err(err) => record
                .error(err.code())
                .request_id(err.request_id().map(str::to_string)),
        };
        self.usage_sink.record(record).await;

        result
    }
}
