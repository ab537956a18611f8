//! Core domain types for the Newsloom enrichment pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dimension of the embedding vectors produced by both provider backends.
pub const EMBEDDING_DIM: usize = 768;

/// Legacy sentinel written by earlier deployments when summarization
/// failed permanently. Records carrying it are still eligible for retry.
pub const SUMMARY_FAILED_SENTINEL: &str = "(Summary Failed)";

// ---------------------------------------------------------------------------
// ArticleId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for article identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(pub Uuid);

impl ArticleId {
    /// Generate a new time-sortable article identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ArticleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArticleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ArticleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// One ingested news article with its derived enrichment fields.
///
/// Created by the upstream ingestion path with `summary` and `embedding`
/// null; mutated in place by the scheduler as partial results arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique article identifier.
    pub id: ArticleId,
    /// Publication or feed the article came from.
    pub source: String,
    /// Original article URL (unique across the store).
    pub url: String,
    /// Headline, if the ingester extracted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Extracted body text. Immutable input to enrichment.
    pub content_text: String,
    /// LLM-generated bullet-point summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Sentiment in [0, 1]: 0 negative/disaster, 1 positive/development.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<f64>,
    /// One of the prompt's closed category set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Fixed-dimension embedding of the summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// When the article was ingested.
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Create a new article awaiting enrichment.
    pub fn new(
        source: impl Into<String>,
        url: impl Into<String>,
        title: Option<String>,
        content_text: impl Into<String>,
    ) -> Self {
        Self {
            id: ArticleId::new(),
            source: source.into(),
            url: url.into(),
            title,
            content_text: content_text.into(),
            summary: None,
            sentiment_score: None,
            category: None,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// An article is complete iff both derived fields are present and
    /// the summary is not the failure sentinel.
    pub fn is_complete(&self) -> bool {
        !self.needs_summary() && !self.needs_embedding()
    }

    /// Whether the summary still needs to be generated. The legacy
    /// failure sentinel counts as missing.
    pub fn needs_summary(&self) -> bool {
        match self.summary.as_deref() {
            None => true,
            Some(s) => s == SUMMARY_FAILED_SENTINEL,
        }
    }

    /// Whether the embedding still needs to be generated.
    pub fn needs_embedding(&self) -> bool {
        self.embedding.is_none()
    }

    /// Whether there is any body text worth sending to a provider.
    pub fn has_content(&self) -> bool {
        !self.content_text.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// SummaryResult
// ---------------------------------------------------------------------------

/// Structured summarization output from a provider.
///
/// Deserialized from the model's JSON response; also constructed directly
/// for the degraded fallback when that JSON does not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    /// Bullet-point summary, each line prefixed with `* `.
    pub summary: String,
    /// Sentiment in [0, 1].
    pub sentiment_score: f64,
    /// Category label.
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        Article::new(
            "texas_tribune",
            "https://example.com/news/1",
            Some("Headline".into()),
            "Body text.",
        )
    }

    #[test]
    fn article_id_roundtrip() {
        let id = ArticleId::new();
        let s = id.to_string();
        let parsed: ArticleId = s.parse().expect("parse ArticleId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn fresh_article_needs_everything() {
        let a = article();
        assert!(!a.is_complete());
        assert!(a.needs_summary());
        assert!(a.needs_embedding());
        assert!(a.has_content());
    }

    #[test]
    fn failure_sentinel_counts_as_missing_summary() {
        let mut a = article();
        a.summary = Some(SUMMARY_FAILED_SENTINEL.into());
        assert!(a.needs_summary());
        assert!(!a.is_complete());
    }

    #[test]
    fn complete_article() {
        let mut a = article();
        a.summary = Some("* Something happened".into());
        a.embedding = Some(vec![0.0; EMBEDDING_DIM]);
        assert!(a.is_complete());
        assert!(!a.needs_summary());
        assert!(!a.needs_embedding());
    }

    #[test]
    fn whitespace_only_content_is_empty() {
        let mut a = article();
        a.content_text = "  \n\t ".into();
        assert!(!a.has_content());
    }

    #[test]
    fn summary_result_deserializes_from_model_json() {
        let json = r#"{"summary": "* A thing\n* Another thing", "sentiment_score": 0.7, "category": "Politics"}"#;
        let parsed: SummaryResult = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.category, "Politics");
        assert!((parsed.sentiment_score - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_result_accepts_integer_score() {
        // Models occasionally emit `1` instead of `1.0`.
        let json = r#"{"summary": "* Fine", "sentiment_score": 1, "category": "Local"}"#;
        let parsed: SummaryResult = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.sentiment_score, 1.0);
    }
}
