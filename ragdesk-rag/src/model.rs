//! Generative language model seam.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::retry::RetryPolicy;

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.3, top_p: 0.95, top_k: 40, max_output_tokens: 2500 }
    }
}

/// A model that turns a prompt into a complete answer in one blocking call.
///
/// # Example
///
/// ```rust,ignore
/// use ragdesk_rag::{GenerationConfig, LanguageModel};
///
/// let text = model.generate("Say hello.", &GenerationConfig::default()).await?;
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate the full answer text for `prompt`.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// A short name used in logs and errors.
    fn name(&self) -> &str {
        "model"
    }
}

/// Wraps a [`LanguageModel`] so every call is bounded by a [`RetryPolicy`].
pub struct ResilientModel {
    inner: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl ResilientModel {
    pub fn new(inner: Arc<dyn LanguageModel>, retry: RetryPolicy) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl LanguageModel for ResilientModel {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let inner = &self.inner;
        self.retry.run("generate", move || inner.generate(prompt, config)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
