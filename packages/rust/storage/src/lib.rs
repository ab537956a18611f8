//! libSQL storage layer for the Newsloom article store.
//!
//! The [`Storage`] struct wraps a libSQL database holding ingested
//! articles and their derived enrichment fields. One enrichment worker
//! owns a handle exclusively; there is no claim/lease step, so running
//! multiple workers against the same file can double-process records.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};
use newsloom_shared::{Article, ArticleId, NewsloomError, Result, SUMMARY_FAILED_SENTINEL};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| NewsloomError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsloomError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Article operations
    // -----------------------------------------------------------------------

    /// Insert a new article, skipping it if the URL is already stored.
    /// Returns `true` if a row was inserted.
    pub async fn insert_article(&self, article: &Article) -> Result<bool> {
        let embedding_json = embedding_json(article)?;
        let changed = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO articles
                   (id, source, url, title, content_text, summary, sentiment_score,
                    category, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    article.id.to_string(),
                    article.source.as_str(),
                    article.url.as_str(),
                    article.title.as_deref(),
                    article.content_text.as_str(),
                    article.summary.as_deref(),
                    article.sentiment_score,
                    article.category.as_deref(),
                    embedding_json.as_deref(),
                    article.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Persist all mutable fields of one article in a single idempotent
    /// upsert keyed on `url`. One statement, so the write is atomic per
    /// record.
    pub async fn upsert_article(&self, article: &Article) -> Result<()> {
        let embedding_json = embedding_json(article)?;
        self.conn
            .execute(
                "INSERT INTO articles
                   (id, source, url, title, content_text, summary, sentiment_score,
                    category, embedding, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(url) DO UPDATE SET
                   title = excluded.title,
                   summary = excluded.summary,
                   sentiment_score = excluded.sentiment_score,
                   category = excluded.category,
                   embedding = excluded.embedding",
                params![
                    article.id.to_string(),
                    article.source.as_str(),
                    article.url.as_str(),
                    article.title.as_deref(),
                    article.content_text.as_str(),
                    article.summary.as_deref(),
                    article.sentiment_score,
                    article.category.as_deref(),
                    embedding_json.as_deref(),
                    article.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get an article by ID.
    pub async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, url, title, content_text, summary, sentiment_score,
                        category, embedding, created_at
                 FROM articles WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(NewsloomError::Storage(e.to_string())),
        }
    }

    /// Fetch a batch of articles still needing enrichment, oldest first.
    ///
    /// Selection predicate: summary missing (a legacy failure sentinel
    /// counts as missing) or embedding missing, and non-blank body text.
    /// Records with nothing to summarize are never offered, so they
    /// cannot be refetched and re-skipped forever.
    pub async fn fetch_incomplete(&self, limit: u32) -> Result<Vec<Article>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, url, title, content_text, summary, sentiment_score,
                        category, embedding, created_at
                 FROM articles
                 WHERE (summary IS NULL OR summary = ?1 OR embedding IS NULL)
                   AND TRIM(content_text) <> ''
                 ORDER BY created_at
                 LIMIT ?2",
                params![SUMMARY_FAILED_SENTINEL, limit as i64],
            )
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    /// Total number of stored articles.
    pub async fn count_articles(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM articles").await
    }

    /// Number of articles still missing a summary or embedding.
    pub async fn count_incomplete(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM articles
                 WHERE summary IS NULL OR summary = ?1 OR embedding IS NULL",
                params![SUMMARY_FAILED_SENTINEL],
            )
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| NewsloomError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(NewsloomError::Storage(e.to_string())),
        }
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![])
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<u64>(0)
                .map_err(|e| NewsloomError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(NewsloomError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Similarity search
    // -----------------------------------------------------------------------

    /// Brute-force cosine similarity search over stored embeddings.
    ///
    /// Returns up to `limit` articles ordered by descending similarity.
    /// Fine for the single-node deployments this store targets; a vector
    /// index would be the next step at larger scale.
    pub async fn search_similar(
        &self,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<(Article, f32)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, url, title, content_text, summary, sentiment_score,
                        category, embedding, created_at
                 FROM articles WHERE embedding IS NOT NULL",
                params![],
            )
            .await
            .map_err(|e| NewsloomError::Storage(e.to_string()))?;

        let mut scored: Vec<(Article, f32)> = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let article = row_to_article(&row)?;
            if let Some(embedding) = &article.embedding {
                let score = cosine_similarity(query, embedding);
                scored.push((article, score));
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}

/// Cosine similarity of two vectors. Returns 0.0 for mismatched lengths
/// or zero-magnitude inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Encode the embedding vector as a JSON array for the TEXT column.
fn embedding_json(article: &Article) -> Result<Option<String>> {
    match &article.embedding {
        Some(v) => serde_json::to_string(v)
            .map(Some)
            .map_err(|e| NewsloomError::Storage(format!("embedding encode: {e}"))),
        None => Ok(None),
    }
}

/// Convert a database row to an [`Article`].
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    let embedding = match row.get::<String>(8).ok() {
        Some(json) => Some(
            serde_json::from_str::<Vec<f32>>(&json)
                .map_err(|e| NewsloomError::Storage(format!("embedding decode: {e}")))?,
        ),
        None => None,
    };

    Ok(Article {
        id: {
            let s: String = row
                .get(0)
                .map_err(|e| NewsloomError::Storage(e.to_string()))?;
            s.parse()
                .map_err(|e| NewsloomError::Storage(format!("invalid article id: {e}")))?
        },
        source: row
            .get::<String>(1)
            .map_err(|e| NewsloomError::Storage(e.to_string()))?,
        url: row
            .get::<String>(2)
            .map_err(|e| NewsloomError::Storage(e.to_string()))?,
        title: row.get::<String>(3).ok(),
        content_text: row
            .get::<String>(4)
            .map_err(|e| NewsloomError::Storage(e.to_string()))?,
        summary: row.get::<String>(5).ok(),
        sentiment_score: row.get::<f64>(6).ok(),
        category: row.get::<String>(7).ok(),
        embedding,
        created_at: {
            let s: String = row
                .get(9)
                .map_err(|e| NewsloomError::Storage(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| NewsloomError::Storage(format!("invalid date: {e}")))?
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsloom_shared::EMBEDDING_DIM;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("nl_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn article(url: &str, content: &str) -> Article {
        Article::new("texas_tribune", url, Some("Headline".into()), content)
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("nl_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn insert_dedupes_by_url() {
        let storage = test_storage().await;
        let a = article("https://example.com/1", "Body.");
        assert!(storage.insert_article(&a).await.expect("insert"));

        let duplicate = article("https://example.com/1", "Other body.");
        assert!(!storage.insert_article(&duplicate).await.expect("insert dup"));
        assert_eq!(storage.count_articles().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn upsert_roundtrips_enrichment_fields() {
        let storage = test_storage().await;
        let mut a = article("https://example.com/1", "Body.");
        storage.insert_article(&a).await.unwrap();

        a.summary = Some("* A thing happened".into());
        a.sentiment_score = Some(0.8);
        a.category = Some("Politics".into());
        a.embedding = Some(vec![0.25; EMBEDDING_DIM]);
        storage.upsert_article(&a).await.expect("upsert");

        let found = storage
            .get_article(&a.id)
            .await
            .expect("get")
            .expect("exists");
        assert_eq!(found.summary.as_deref(), Some("* A thing happened"));
        assert_eq!(found.sentiment_score, Some(0.8));
        assert_eq!(found.category.as_deref(), Some("Politics"));
        let embedding = found.embedding.clone().expect("embedding");
        assert_eq!(embedding.len(), EMBEDDING_DIM);
        assert_eq!(embedding[0], 0.25);
        assert!(found.is_complete());
    }

    #[tokio::test]
    async fn fetch_incomplete_selects_only_pending_work() {
        let storage = test_storage().await;

        let pending = article("https://example.com/pending", "Body.");
        storage.insert_article(&pending).await.unwrap();

        let mut complete = article("https://example.com/done", "Body.");
        complete.summary = Some("* Done".into());
        complete.embedding = Some(vec![0.0; 4]);
        storage.insert_article(&complete).await.unwrap();

        // Blank content must never be offered to the scheduler.
        let empty = article("https://example.com/empty", "   \n");
        storage.insert_article(&empty).await.unwrap();

        let batch = storage.fetch_incomplete(10).await.expect("fetch");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].url, "https://example.com/pending");
    }

    #[tokio::test]
    async fn fetch_incomplete_offers_failed_summary_sentinel() {
        let storage = test_storage().await;
        let mut a = article("https://example.com/failed", "Body.");
        a.summary = Some(SUMMARY_FAILED_SENTINEL.into());
        a.embedding = Some(vec![0.0; 4]);
        storage.insert_article(&a).await.unwrap();

        let batch = storage.fetch_incomplete(10).await.expect("fetch");
        assert_eq!(batch.len(), 1);
        assert_eq!(storage.count_incomplete().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fetch_incomplete_respects_limit_and_order() {
        let storage = test_storage().await;
        for i in 0..5 {
            let mut a = article(&format!("https://example.com/{i}"), "Body.");
            // Spread creation times so ordering is deterministic.
            a.created_at = chrono::Utc::now() + chrono::Duration::seconds(i);
            storage.insert_article(&a).await.unwrap();
        }

        let batch = storage.fetch_incomplete(3).await.expect("fetch");
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].url, "https://example.com/0");
        assert_eq!(batch[2].url, "https://example.com/2");
    }

    #[tokio::test]
    async fn counts() {
        let storage = test_storage().await;
        let mut a = article("https://example.com/1", "Body.");
        storage.insert_article(&a).await.unwrap();
        assert_eq!(storage.count_articles().await.unwrap(), 1);
        assert_eq!(storage.count_incomplete().await.unwrap(), 1);

        a.summary = Some("* Done".into());
        a.embedding = Some(vec![0.0; 4]);
        storage.upsert_article(&a).await.unwrap();
        assert_eq!(storage.count_incomplete().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn similarity_search_orders_by_cosine() {
        let storage = test_storage().await;

        let mut near = article("https://example.com/near", "Body.");
        near.summary = Some("* Near".into());
        near.embedding = Some(vec![1.0, 0.0, 0.0]);
        storage.insert_article(&near).await.unwrap();

        let mut far = article("https://example.com/far", "Body.");
        far.summary = Some("* Far".into());
        far.embedding = Some(vec![0.0, 1.0, 0.0]);
        storage.insert_article(&far).await.unwrap();

        let results = storage
            .search_similar(&[0.9, 0.1, 0.0], 10)
            .await
            .expect("search");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.url, "https://example.com/near");
        assert!(results[0].1 > results[1].1);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        // Mismatched lengths and zero vectors are defined as 0.
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
