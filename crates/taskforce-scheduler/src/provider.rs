//! Provider wrapper that routes completions through the registry.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskforce_protocols::error::ProviderError;
use taskforce_protocols::provider::{CompletionRequest, CompletionResponse, LLMProvider};

use crate::registry::SchedulerRegistry;
use crate::scheduler::RunOptions;

/// An [`LLMProvider`] whose calls are admitted per model.
pub struct ScheduledProvider {
    inner: Arc<dyn LLMProvider>,
    registry: Arc<SchedulerRegistry>,
}

impl ScheduledProvider {
    pub fn new(inner: Arc<dyn LLMProvider>, registry: Arc<SchedulerRegistry>) -> Self {
        Self { inner, registry }
    }

    pub fn registry(&self) -> &Arc<SchedulerRegistry> {
        &self.registry
    }

    /// Like [`LLMProvider::complete`], abandoning the call when `cancel` fires.
    pub async fn complete_cancellable(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<CompletionResponse, ProviderError> {
        self.schedule(request, RunOptions::default().with_cancel(cancel))
            .await
    }

    async fn schedule(
        &self,
        request: CompletionRequest,
        options: RunOptions,
    ) -> Result<CompletionResponse, ProviderError> {
        let key = request.model.clone();
        let inner = self.inner.clone();
        self.registry
            .run(
                Some(&key),
                || {
                    let inner = inner.clone();
                    let request = request.clone();
                    async move { inner.complete(request).await }
                },
                options,
            )
            .await
    }
}

#[async_trait]
impl LLMProvider for ScheduledProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.schedule(request, RunOptions::default()).await
    }
}
