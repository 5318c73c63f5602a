//! Scripted stand-ins for the source, model and storage seams.

use async_trait::async_trait;
use iw_core::types::CountryField;
use iw_core::{
    Article, ArticleStorage, Category, CompletionModel, CompletionRequest, Error, RawArticle,
    Result, ShutdownTrigger, StoredArticle, TimeWindow,
};
use iw_storage::InMemoryStorage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::sources::{ArticleSource, SourcePage};

pub fn raw(link: &str, title: &str, content: &str) -> RawArticle {
    RawArticle {
        title: Some(title.to_string()),
        link: Some(link.to_string()),
        description: Some(format!("{} (summary)", title)),
        content: Some(content.to_string()),
        pub_date: Some("2025-09-22 08:15:00".to_string()),
        country: Some(CountryField::Many(vec!["united states of america".to_string()])),
        duplicate: Some(false),
    }
}

/// Serves pages keyed by continuation token; the first page is keyed by "".
#[derive(Default)]
pub struct ScriptedSource {
    pages: HashMap<String, SourcePage>,
    fail: AtomicBool,
    fail_on: Option<String>,
    trigger_on: Option<(String, ShutdownTrigger)>,
    pub calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_page(mut self, token: &str, results: Vec<RawArticle>, next: Option<&str>) -> Self {
        self.pages.insert(
            token.to_string(),
            SourcePage {
                results,
                next_page: next.map(String::from),
            },
        );
        self
    }

    pub fn failing() -> Self {
        let source = Self::default();
        source.fail.store(true, Ordering::SeqCst);
        source
    }

    /// Fail only when asked for the page keyed by `token`.
    pub fn failing_on(mut self, token: &str) -> Self {
        self.fail_on = Some(token.to_string());
        self
    }

    /// Fire `trigger` while serving the page keyed by `token`.
    pub fn triggering_on(mut self, token: &str, trigger: ShutdownTrigger) -> Self {
        self.trigger_on = Some((token.to_string(), trigger));
        self
    }
}

#[async_trait]
impl ArticleSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_page(&self, _window: &TimeWindow, page: Option<&str>) -> Result<SourcePage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let token = page.unwrap_or("");
        if self.fail.load(Ordering::SeqCst) || self.fail_on.as_deref() == Some(token) {
            return Err(Error::Source("503 Service Unavailable".to_string()));
        }
        if let Some((_, trigger)) = self.trigger_on.as_ref().filter(|(t, _)| t == token) {
            trigger.trigger();
        }
        Ok(self.pages.get(token).cloned().unwrap_or_default())
    }
}

/// Records every window it is asked for and answers with an empty page
/// after `delay`.
pub struct WindowLog {
    delay: Duration,
    pub windows: Mutex<Vec<TimeWindow>>,
}

impl WindowLog {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            windows: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArticleSource for WindowLog {
    fn name(&self) -> &str {
        "window-log"
    }

    async fn fetch_page(&self, window: &TimeWindow, _page: Option<&str>) -> Result<SourcePage> {
        self.windows.lock().unwrap().push(*window);
        tokio::time::sleep(self.delay).await;
        Ok(SourcePage::default())
    }
}

/// Always answers with the same label and records every prompt.
#[derive(Debug)]
pub struct RecordingModel {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionModel for RecordingModel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.prompts.lock().unwrap().push(request.system_prompt.clone());
        Ok(self.reply.clone())
    }
}

/// In-memory storage that counts bulk updates and can be told to fail.
#[derive(Default)]
pub struct CountingStorage {
    pub inner: InMemoryStorage,
    pub update_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingStorage {
    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Database("database is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ArticleStorage for CountingStorage {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<usize> {
        self.check()?;
        self.inner.upsert_articles(articles).await
    }

    async fn update_categories(&self, updates: &[(i64, Category)]) -> Result<usize> {
        self.check()?;
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_categories(updates).await
    }

    async fn load_unclassified(&self, limit: usize) -> Result<Vec<StoredArticle>> {
        self.check()?;
        self.inner.load_unclassified(limit).await
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        self.inner.get_by_url(url).await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}
