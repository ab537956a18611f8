//! Polling loop that drives article enrichment.
//!
//! The scheduler alternates work cycles with idle sleeps. A cycle fetches
//! a batch of incomplete articles and processes them one by one; each
//! record is summarized if it lacks a summary, embedded if it lacks an
//! embedding, and written back in a single upsert. Consecutive empty
//! fetches escalate the idle sleep once a threshold is crossed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use newsloom_provider::Inference;
use newsloom_shared::{Article, EMBEDDING_DIM, Result, WorkerConfig};
use newsloom_storage::Storage;
use tracing::{debug, error, info, warn};

/// Loop tuning, converted from the `[worker]` config section.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub batch_size: u32,
    pub record_delay: Duration,
    pub idle_sleep: Duration,
    pub idle_backoff_sleep: Duration,
    pub idle_threshold: u32,
    pub error_sleep: Duration,
}

impl From<&WorkerConfig> for SchedulerConfig {
    fn from(w: &WorkerConfig) -> Self {
        Self {
            batch_size: w.batch_size,
            record_delay: Duration::from_secs(w.record_delay_secs),
            idle_sleep: Duration::from_secs(w.idle_sleep_secs),
            idle_backoff_sleep: Duration::from_secs(w.idle_backoff_secs),
            idle_threshold: w.idle_threshold,
            error_sleep: Duration::from_secs(w.error_sleep_secs),
        }
    }
}

/// Sleep to apply after `idle_cycles` consecutive empty fetches.
pub fn idle_sleep_duration(idle_cycles: u32, config: &SchedulerConfig) -> Duration {
    if idle_cycles >= config.idle_threshold {
        config.idle_backoff_sleep
    } else {
        config.idle_sleep
    }
}

/// What [`process_article`] did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// At least one field was computed and persisted.
    Updated { summary: bool, embedding: bool },
    /// Nothing new could be computed; the row was left untouched.
    Unchanged,
    /// The record has no usable content to summarize.
    SkippedEmpty,
}

/// The enrichment worker loop.
pub struct Scheduler<P: Inference> {
    provider: P,
    storage: Storage,
    config: SchedulerConfig,
    stop: Arc<AtomicBool>,
}

impl<P: Inference> Scheduler<P> {
    pub fn new(provider: P, storage: Storage, config: SchedulerConfig, stop: Arc<AtomicBool>) -> Self {
        Self {
            provider,
            storage,
            config,
            stop,
        }
    }

    /// Run until the stop flag is raised. Loop-level errors are logged
    /// and absorbed with a short pause so the worker keeps running.
    pub async fn run(&mut self) -> Result<()> {
        info!(batch_size = self.config.batch_size, "enrichment worker started");
        let mut idle_cycles: u32 = 0;

        while !self.stop.load(Ordering::Relaxed) {
            match self.run_cycle().await {
                Ok(0) => {
                    idle_cycles = idle_cycles.saturating_add(1);
                    let sleep = idle_sleep_duration(idle_cycles, &self.config);
                    debug!(idle_cycles, sleep_secs = sleep.as_secs_f64(), "no pending work");
                    tokio::time::sleep(sleep).await;
                }
                Ok(processed) => {
                    idle_cycles = 0;
                    debug!(processed, "cycle complete");
                }
                Err(e) => {
                    error!(error = %e, "enrichment cycle failed");
                    tokio::time::sleep(self.config.error_sleep).await;
                }
            }
        }

        info!("enrichment worker stopped");
        Ok(())
    }

    /// Fetch one batch and process it. Returns how many records were
    /// attempted. A record that fails is logged and skipped; it stays
    /// incomplete and will be picked up by a later cycle.
    pub async fn run_cycle(&mut self) -> Result<usize> {
        let batch = self.storage.fetch_incomplete(self.config.batch_size).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        info!(count = batch.len(), "processing enrichment batch");
        let mut processed = 0usize;

        for article in batch {
            if self.stop.load(Ordering::Relaxed) {
                break;
            }

            let id = article.id;
            let title = article.title.clone().unwrap_or_default();
            match process_article(&mut self.provider, &self.storage, article).await {
                Ok(RecordOutcome::Updated { summary, embedding }) => {
                    info!(%id, title, summary, embedding, "article enriched");
                }
                Ok(RecordOutcome::Unchanged) => {
                    warn!(%id, title, "no enrichment produced, will retry later");
                }
                Ok(RecordOutcome::SkippedEmpty) => {
                    warn!(%id, title, "article has no content, skipping");
                }
                Err(e) => {
                    error!(%id, title, error = %e, "failed to enrich article");
                }
            }
            processed += 1;

            tokio::time::sleep(self.config.record_delay).await;
        }

        Ok(processed)
    }
}

/// Enrich a single article: fill in whichever of summary and embedding
/// are missing, then persist once if anything changed.
///
/// The embedding input is the summary text, so an article only gets an
/// embedding once it has a real summary. A provider that reports the
/// empty sentinel leaves the field NULL without failing the record.
async fn process_article<P: Inference>(
    provider: &mut P,
    storage: &Storage,
    mut article: Article,
) -> Result<RecordOutcome> {
    if article.needs_summary() && !article.has_content() {
        return Ok(RecordOutcome::SkippedEmpty);
    }

    let mut wrote_summary = false;
    let mut wrote_embedding = false;

    if article.needs_summary() {
        match provider.summarize(&article.content_text).await? {
            Some(result) => {
                article.summary = Some(result.summary);
                article.sentiment_score = Some(result.sentiment_score);
                article.category = Some(result.category);
                wrote_summary = true;
            }
            None => {
                warn!(id = %article.id, "summary unavailable for this record");
            }
        }
    }

    // Embed only once a real summary exists; a failed or sentinel
    // summary leaves the record to be retried whole next cycle.
    if article.needs_embedding() && !article.needs_summary() {
        let summary = article.summary.as_deref().unwrap_or_default().to_string();
        let vector = provider.embed(&summary).await?;
        if vector.is_empty() {
            warn!(id = %article.id, "embedding unavailable for this record");
        } else if vector.len() != EMBEDDING_DIM {
            warn!(
                id = %article.id,
                got = vector.len(),
                expected = EMBEDDING_DIM,
                "embedding has wrong dimension, not persisting"
            );
        } else {
            article.embedding = Some(vector);
            wrote_embedding = true;
        }
    }

    if wrote_summary || wrote_embedding {
        storage.upsert_article(&article).await?;
        Ok(RecordOutcome::Updated {
            summary: wrote_summary,
            embedding: wrote_embedding,
        })
    } else {
        Ok(RecordOutcome::Unchanged)
    }
}
