//! Inference providers for article enrichment.
//!
//! Two interchangeable backends produce summaries (with sentiment and
//! category) and embedding vectors: a rate-limited cloud API and a local
//! Ollama-compatible service. Which one runs is a config decision made
//! once at startup via [`Provider::from_config`].

pub mod cloud;
pub mod local;
pub mod prompt;
pub mod rate_limit;
pub mod retry;

pub use cloud::CloudProvider;
pub use local::LocalProvider;
pub use rate_limit::RateLimiter;
pub use retry::RetryPolicy;

use newsloom_shared::{AppConfig, ProviderKind, Result, SummaryResult};

/// The operations the enrichment worker needs from a backend.
///
/// Both operations distinguish three outcomes: success, a per-call
/// failure reported as the empty sentinel (`None` / empty vector), and a
/// hard error that should abort the current record.
#[allow(async_fn_in_trait)]
pub trait Inference {
    /// Summarize an article body into bullet points with a sentiment
    /// score and category. `Ok(None)` means the call failed terminally
    /// and nothing should be persisted for this field.
    async fn summarize(&mut self, text: &str) -> Result<Option<SummaryResult>>;

    /// Produce an embedding vector for the given text. An empty vector
    /// means the call failed terminally.
    async fn embed(&mut self, text: &str) -> Result<Vec<f32>>;
}

/// Configured inference backend.
pub enum Provider {
    Cloud(CloudProvider),
    Local(LocalProvider),
}

impl Provider {
    /// Instantiate the backend selected in config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.provider.kind {
            ProviderKind::Cloud => Ok(Self::Cloud(CloudProvider::new(&config.cloud)?)),
            ProviderKind::Local => Ok(Self::Local(LocalProvider::new(&config.local)?)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cloud(_) => "cloud",
            Self::Local(_) => "local",
        }
    }
}

impl Inference for Provider {
    async fn summarize(&mut self, text: &str) -> Result<Option<SummaryResult>> {
        match self {
            Self::Cloud(p) => p.summarize(text).await,
            Self::Local(p) => p.summarize(text).await,
        }
    }

    async fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        match self {
            Self::Cloud(p) => p.embed(text).await,
            Self::Local(p) => p.embed(text).await,
        }
    }
}
