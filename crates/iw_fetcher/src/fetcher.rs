//! Paged fetch of one time window.
//!
//! Each page goes through dedup, normalization, categorization and storage
//! before the next page is requested, so an interrupted window keeps whatever
//! it already wrote.

use iw_core::{Article, ArticleStorage, RawArticle, Result, Shutdown, TimeWindow};
use iw_inference::Categorizer;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::dedup::deduplicate;
use crate::sources::ArticleSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub pages: usize,
    /// Records returned by the source before any filtering.
    pub fetched: usize,
    /// Well-formed articles that reached the storage step.
    pub processed: usize,
    /// Rows actually inserted; already-stored URLs are not counted.
    pub inserted: usize,
    /// Shutdown stopped the window before its last page.
    pub interrupted: bool,
}

pub struct Fetcher {
    source: Arc<dyn ArticleSource>,
    categorizer: Arc<Categorizer>,
    storage: Arc<dyn ArticleStorage>,
    max_pages: usize,
}

impl Fetcher {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        categorizer: Arc<Categorizer>,
        storage: Arc<dyn ArticleStorage>,
        max_pages: usize,
    ) -> Self {
        Self {
            source,
            categorizer,
            storage,
            max_pages,
        }
    }

    /// Fetch, classify and store every page of `window`.
    ///
    /// Follows continuation tokens until the source stops returning one or
    /// `max_pages` is reached. Source and storage errors abort the window.
    /// On shutdown the current page is still stored, with any articles the
    /// categorizer did not reach left unclassified, and no further page is
    /// requested.
    #[instrument(level = "info", skip_all, fields(source = self.source.name(), %window))]
    pub async fn fetch_window(&self, window: &TimeWindow, shutdown: &mut Shutdown) -> Result<FetchSummary> {
        let mut summary = FetchSummary::default();
        let mut token: Option<String> = None;

        loop {
            let Some(page) = shutdown
                .run_until(self.source.fetch_page(window, token.as_deref()))
                .await
            else {
                summary.interrupted = true;
                break;
            };
            let page = page?;
            summary.pages += 1;
            summary.fetched += page.results.len();

            let next = page.continuation().map(String::from);
            let mut articles = prepare(page.results);
            debug!(page = summary.pages, kept = articles.len(), "page prepared");

            if !articles.is_empty() {
                self.categorizer.categorize_all(&mut articles, shutdown).await;
                summary.inserted += self.storage.upsert_articles(&articles).await?;
                summary.processed += articles.len();
            }

            if shutdown.is_triggered() {
                summary.interrupted = next.is_some();
                break;
            }
            match next {
                Some(next) if summary.pages < self.max_pages => token = Some(next),
                Some(_) => {
                    warn!(max_pages = self.max_pages, "page limit reached, stopping early");
                    break;
                }
                None => break,
            }
        }

        if summary.interrupted {
            warn!(pages = summary.pages, processed = summary.processed, "shutdown requested, window left incomplete");
        }
        info!(
            pages = summary.pages,
            fetched = summary.fetched,
            processed = summary.processed,
            inserted = summary.inserted,
            "window fetched"
        );
        Ok(summary)
    }
}

/// Deduplicate a raw page and drop records missing a required field.
fn prepare(results: Vec<RawArticle>) -> Vec<Article> {
    let total = results.len();
    let articles: Vec<Article> = deduplicate(results)
        .into_iter()
        .filter_map(|raw| raw.normalize())
        .collect();
    if articles.len() < total {
        debug!(dropped = total - articles.len(), "duplicate or malformed records dropped");
    }
    articles
}
