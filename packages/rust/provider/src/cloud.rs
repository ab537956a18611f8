//! Cloud inference backend (Gemini-style REST API).
//!
//! Every call passes the rate-limiter gate first, and each network
//! request is wrapped in the retry policy keyed on the service's
//! quota-exceeded signature (HTTP 429).

use std::time::Duration;

use newsloom_shared::{CloudConfig, NewsloomError, Result, SummaryResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use crate::Inference;
use crate::prompt::{SUMMARIZE_INPUT_CAP, build_summary_prompt, parse_summary_text, truncate_chars};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Cloud API provider with rate limiting and transient-error retry.
pub struct CloudProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embed_model: String,
    limiter: RateLimiter,
    retry: RetryPolicy,
}

impl CloudProvider {
    /// Build a provider from config, reading the API key from the
    /// configured env var. Fails fast when the credential is absent —
    /// the worker must not start without it.
    pub fn new(config: &CloudConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                NewsloomError::config(format!(
                    "cloud API key not found. Set the {} environment variable.",
                    config.api_key_env
                ))
            })?;
        Self::with_api_key(config, api_key)
    }

    /// Build a provider with an explicit key (used by tests).
    pub fn with_api_key(config: &CloudConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NewsloomError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
            limiter: RateLimiter::new(config.rpm_limit),
            retry: RetryPolicy::default(),
        })
    }

    /// Swap the retry policy (tests use millisecond delays).
    #[cfg(test)]
    pub(crate) fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl Inference for CloudProvider {
    async fn summarize(&mut self, text: &str) -> Result<Option<SummaryResult>> {
        let prompt = build_summary_prompt(truncate_chars(text, SUMMARIZE_INPUT_CAP));
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": 0.3 }
        });

        let CloudProvider {
            client,
            api_key,
            limiter,
            retry,
            ..
        } = self;

        let outcome = retry
            .run("summarize", async || {
                limiter.acquire().await;
                generate_once(client, &url, api_key, &body).await
            })
            .await;

        match outcome {
            Ok(raw) => Ok(Some(parse_summary_text(&raw))),
            Err(e @ NewsloomError::RetriesExhausted { .. }) => Err(e),
            Err(e) => {
                error!(error = %e, "summary generation failed");
                Ok(None)
            }
        }
    }

    async fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let clean = text.replace('\n', " ");
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.base_url, self.embed_model
        );
        let body = serde_json::json!({
            "model": format!("models/{}", self.embed_model),
            "content": { "parts": [{ "text": clean }] }
        });

        let CloudProvider {
            client,
            api_key,
            limiter,
            retry,
            ..
        } = self;

        let outcome = retry
            .run("embed", async || {
                limiter.acquire().await;
                embed_once(client, &url, api_key, &body).await
            })
            .await;

        match outcome {
            Ok(values) => Ok(values),
            Err(e @ NewsloomError::RetriesExhausted { .. }) => Err(e),
            Err(e) => {
                error!(error = %e, "embedding generation failed");
                Ok(Vec::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types and single-request helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbedValues,
}

#[derive(Debug, Deserialize)]
struct EmbedValues {
    #[serde(default)]
    values: Vec<f32>,
}

/// Issue one generateContent request and return the first candidate text.
async fn generate_once(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<String> {
    let response = post_checked(client, url, api_key, body, "summarize").await?;

    let parsed: GenerateResponse = response
        .json()
        .await
        .map_err(|e| NewsloomError::Provider(format!("summarize: invalid response body: {e}")))?;

    parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content.parts.into_iter().next())
        .map(|p| p.text)
        .ok_or_else(|| NewsloomError::Provider("summarize: response had no candidates".into()))
}

/// Issue one embedContent request and return the raw vector.
async fn embed_once(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<Vec<f32>> {
    let response = post_checked(client, url, api_key, body, "embed").await?;

    let parsed: EmbedResponse = response
        .json()
        .await
        .map_err(|e| NewsloomError::Provider(format!("embed: invalid response body: {e}")))?;

    Ok(parsed.embedding.values)
}

/// POST with the credential header and classify the response status:
/// 429 is transient (retryable), any other failure is terminal.
async fn post_checked(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
    operation: &str,
) -> Result<reqwest::Response> {
    debug!(operation, "calling cloud provider");
    let response = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| NewsloomError::Provider(format!("{operation}: {}", e.without_url())))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(NewsloomError::transient(operation, format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(NewsloomError::Provider(format!(
            "{operation}: HTTP {status}"
        )));
    }
    Ok(response)
}
