//! Long-running drivers: scheduled fetch cycles and the re-classification loop.
//!
//! Neither loop exits on errors. Both stop only when their [`Shutdown`] is
//! triggered, which is checked at the top of every iteration and raced
//! against every sleep.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use iw_core::config::LoopConfig;
use iw_core::{ArticleStorage, Error, Result, Shutdown, TimeWindow};
use iw_inference::Categorizer;
use iw_storage::RunJournal;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::fetcher::{FetchSummary, Fetcher};
use crate::sources::ArticleSource;

/// Outcome of one re-classification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Rows were classified; more may be waiting.
    Fetching,
    /// Nothing left to classify.
    Idle,
}

/// Counters returned when [`RunLoop::run`] stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopReport {
    pub batches: usize,
    pub idle_waits: usize,
    pub failures: usize,
}

pub struct RunLoop {
    categorizer: Arc<Categorizer>,
    storage: Arc<dyn ArticleStorage>,
    fetcher: Option<Fetcher>,
    journal: RunJournal,
    config: LoopConfig,
}

impl RunLoop {
    pub fn new(
        categorizer: Arc<Categorizer>,
        storage: Arc<dyn ArticleStorage>,
        journal: RunJournal,
        config: LoopConfig,
    ) -> Self {
        Self {
            categorizer,
            storage,
            fetcher: None,
            journal,
            config,
        }
    }

    /// Enable fetch cycles against `source`. Without one only the
    /// re-classification loop can run.
    pub fn with_source(mut self, source: Arc<dyn ArticleSource>, max_pages: usize) -> Self {
        self.fetcher = Some(Fetcher::new(
            source,
            self.categorizer.clone(),
            self.storage.clone(),
            max_pages,
        ));
        self
    }

    pub fn journal(&self) -> &RunJournal {
        &self.journal
    }

    /// The window a scheduled cycle would fetch right now.
    pub fn default_window(&self) -> TimeWindow {
        TimeWindow::trailing(self.config.window_lag, self.config.window_span)
    }

    /// The window for the next scheduled cycle: from where the last
    /// completed one ended up to `window_lag` before now. Without a
    /// previous window this is [`RunLoop::default_window`].
    fn next_window(&self, resume_from: Option<DateTime<Utc>>) -> TimeWindow {
        let Some(start) = resume_from else {
            return self.default_window();
        };
        TimeWindow::new(start, Utc::now() - self.config.window_lag).unwrap_or_else(|_| {
            warn!(%start, "clock moved backwards, falling back to the trailing window");
            self.default_window()
        })
    }

    /// Fetch one window and, only if it completes, append a run marker.
    ///
    /// A window cut short by shutdown returns its partial summary with
    /// `interrupted` set and writes no marker.
    pub async fn run_cycle(&self, window: &TimeWindow, shutdown: &mut Shutdown) -> Result<FetchSummary> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| Error::Config("no article source configured".to_string()))?;
        let started = Instant::now();
        let summary = match fetcher.fetch_window(window, shutdown).await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, %window, "fetch cycle failed, no run marker written");
                return Err(e);
            }
        };
        if summary.interrupted {
            warn!(processed = summary.processed, %window, "fetch cycle interrupted, no run marker written");
            return Ok(summary);
        }
        let marker = self.journal.append(summary.processed, Utc::now()).await?;
        info!(
            processed = summary.processed,
            inserted = summary.inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            marker = %marker.to_line(),
            "fetch cycle complete"
        );
        Ok(summary)
    }

    /// Run a fetch cycle every `interval` until shutdown. Returns the number
    /// of cycles that completed.
    ///
    /// Each window starts where the last completed one ended, so a slow
    /// cycle or a failed one never leaves a gap. A failed window is folded
    /// into the next attempt.
    pub async fn run_scheduled(&self, interval: Duration, mut shutdown: Shutdown) -> usize {
        let mut completed = 0;
        let mut resume_from: Option<DateTime<Utc>> = None;
        // interval() panics on a zero period
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if shutdown.run_until(ticker.tick()).await.is_none() {
                break;
            }
            let window = self.next_window(resume_from);
            match AssertUnwindSafe(self.run_cycle(&window, &mut shutdown))
                .catch_unwind()
                .await
            {
                Ok(Ok(summary)) if !summary.interrupted => {
                    completed += 1;
                    resume_from = Some(window.end);
                }
                Ok(Ok(_)) => break,
                Ok(Err(_)) => resume_from = Some(window.start),
                Err(_) => {
                    error!(%window, "fetch cycle panicked");
                    resume_from = Some(window.start);
                }
            }
            debug!(interval_secs = interval.as_secs(), "waiting for next cycle");
        }
        info!(completed, "shutdown requested, stopping scheduled fetches");
        completed
    }

    /// Classify up to `db_fetch_limit` uncategorized rows.
    ///
    /// Results are written through bulk updates of `batch_size` rows. A
    /// shutdown between articles flushes what is done and ends the step.
    #[instrument(level = "debug", skip_all)]
    pub async fn step(&self, shutdown: &mut Shutdown) -> Result<LoopState> {
        let storage = &self.storage;
        let categorizer = &self.categorizer;

        let pending = storage.load_unclassified(self.config.db_fetch_limit).await?;
        if pending.is_empty() {
            return Ok(LoopState::Idle);
        }

        let started = Instant::now();
        let total = pending.len();
        let batch_size = self.config.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut updated = 0;
        info!(total, "classifying stored articles");

        for (i, row) in pending.iter().enumerate() {
            let Some(category) = categorizer
                .categorize_until(&row.article.content, shutdown)
                .await
            else {
                warn!(done = i, total, "shutdown requested mid-step");
                break;
            };
            batch.push((row.id, category));
            if batch.len() >= batch_size {
                updated += storage.update_categories(&batch).await?;
                batch.clear();
            }
            if i + 1 < total && !shutdown.sleep(categorizer.config().rate_limit_delay).await {
                warn!(done = i + 1, total, "shutdown requested mid-step");
                break;
            }
        }
        if !batch.is_empty() {
            updated += storage.update_categories(&batch).await?;
        }

        info!(
            updated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "classification step complete"
        );
        Ok(LoopState::Fetching)
    }

    /// Repeat [`RunLoop::step`] until shutdown, pausing `batch_pause` after
    /// work, `idle_wait` when idle and `error_backoff` after a failure.
    pub async fn run(&self, mut shutdown: Shutdown) -> LoopReport {
        let mut report = LoopReport::default();
        info!(
            batch_size = self.config.batch_size,
            db_fetch_limit = self.config.db_fetch_limit,
            "classification loop started"
        );

        loop {
            if shutdown.is_triggered() {
                break;
            }
            let outcome = AssertUnwindSafe(self.step(&mut shutdown)).catch_unwind().await;
            let wait = match outcome {
                Ok(Ok(LoopState::Fetching)) => {
                    report.batches += 1;
                    self.config.batch_pause
                }
                Ok(Ok(LoopState::Idle)) => {
                    report.idle_waits += 1;
                    debug!(wait_secs = self.config.idle_wait.as_secs(), "nothing to classify");
                    self.config.idle_wait
                }
                Ok(Err(e)) => {
                    report.failures += 1;
                    error!(error = %e, "classification step failed, backing off");
                    self.config.error_backoff
                }
                Err(_) => {
                    report.failures += 1;
                    error!("classification step panicked, backing off");
                    self.config.error_backoff
                }
            };
            if !shutdown.sleep(wait).await {
                break;
            }
        }

        info!(
            batches = report.batches,
            idle_waits = report.idle_waits,
            failures = report.failures,
            "classification loop stopped"
        );
        report
    }
}
