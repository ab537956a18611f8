//! Local inference backend (Ollama-style REST API).
//!
//! The local service has no quota, so there is no rate limiter and no
//! retry here. Any failure is terminal for the call and surfaces as the
//! empty sentinel so the worker can move on to the next record.

use std::time::Duration;

use newsloom_shared::{LocalConfig, NewsloomError, Result, SummaryResult};
use reqwest::Client;
use serde::Deserialize;
use tracing::error;

use crate::Inference;
use crate::prompt::{SUMMARIZE_INPUT_CAP, build_summary_prompt, parse_summary_text, truncate_chars};

/// Character cap applied to embedding input for the local model.
const EMBED_INPUT_CAP: usize = 6_000;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Local model provider speaking the Ollama HTTP API.
pub struct LocalProvider {
    client: Client,
    base_url: String,
    model: String,
    embed_model: String,
}

impl LocalProvider {
    pub fn new(config: &LocalConfig) -> Result<Self> {
        // Local models can be slow on CPU, so the timeout is generous.
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| NewsloomError::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embed_model: config.embed_model.clone(),
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0.3 }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NewsloomError::Provider(format!("generate: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsloomError::Provider(format!("generate: HTTP {status}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NewsloomError::Provider(format!("generate: invalid response body: {e}")))?;
        Ok(parsed.response)
    }

    async fn embeddings(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.embed_model,
            "prompt": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NewsloomError::Provider(format!("embeddings: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NewsloomError::Provider(format!(
                "embeddings: HTTP {status}"
            )));
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| {
            NewsloomError::Provider(format!("embeddings: invalid response body: {e}"))
        })?;
        Ok(parsed.embedding)
    }
}

impl Inference for LocalProvider {
    async fn summarize(&mut self, text: &str) -> Result<Option<SummaryResult>> {
        let prompt = build_summary_prompt(truncate_chars(text, SUMMARIZE_INPUT_CAP));
        match self.generate(&prompt).await {
            Ok(raw) => Ok(Some(parse_summary_text(&raw))),
            Err(e) => {
                error!(error = %e, "local summary generation failed");
                Ok(None)
            }
        }
    }

    async fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let clean = text.replace('\n', " ");
        match self.embeddings(truncate_chars(&clean, EMBED_INPUT_CAP)).await {
            Ok(values) => Ok(values),
            Err(e) => {
                error!(error = %e, "local embedding generation failed");
                Ok(Vec::new())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> LocalConfig {
        LocalConfig {
            base_url: server.uri(),
            model: "llama3.1:latest".into(),
            embed_model: "nomic-embed-text".into(),
        }
    }

    #[tokio::test]
    async fn summarize_parses_structured_reply() {
        let server = MockServer::start().await;
        let reply = r#"{"summary": "* A\n* B\n* C", "sentiment_score": 0.3, "category": "Local"}"#;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama3.1:latest",
                "stream": false
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": reply })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut p = LocalProvider::new(&test_config(&server)).expect("build provider");
        let result = p.summarize("Article body").await.expect("ok").expect("some");
        assert_eq!(result.category, "Local");
        assert_eq!(result.sentiment_score, 0.3);
    }

    #[tokio::test]
    async fn summarize_degrades_on_non_json_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "response": "plain prose" })),
            )
            .mount(&server)
            .await;

        let mut p = LocalProvider::new(&test_config(&server)).expect("build provider");
        let result = p.summarize("Article body").await.expect("ok").expect("some");
        assert_eq!(result.summary, "plain prose");
        assert_eq!(result.sentiment_score, 0.5);
    }

    #[tokio::test]
    async fn summarize_failure_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let mut p = LocalProvider::new(&test_config(&server)).expect("build provider");
        let result = p.summarize("Article body").await.expect("no error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn embed_returns_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .and(body_partial_json(serde_json::json!({
                "model": "nomic-embed-text"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": [0.5, 0.25]
            })))
            .mount(&server)
            .await;

        let mut p = LocalProvider::new(&test_config(&server)).expect("build provider");
        let vector = p.embed("some summary\ntext").await.expect("ok");
        assert_eq!(vector, vec![0.5, 0.25]);
    }

    #[tokio::test]
    async fn embed_failure_yields_empty_sentinel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embeddings"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut p = LocalProvider::new(&test_config(&server)).expect("build provider");
        let vector = p.embed("text").await.expect("no error");
        assert!(vector.is_empty());
    }
}
