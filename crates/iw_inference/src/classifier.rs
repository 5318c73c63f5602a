//! Taxonomy classification of article content.
//!
//! [`Categorizer`] gates content through [`ContentGate`], asks the model for
//! exactly one taxonomy label, and normalizes the reply. Model failures are
//! retried with linear backoff and then degrade to `N/A`, so classification
//! never fails a run.

use iw_core::config::ClassifierConfig;
use iw_core::{Article, Category, CompletionModel, CompletionRequest, Shutdown};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::gate::ContentGate;

pub struct Categorizer {
    model: Arc<dyn CompletionModel>,
    gate: ContentGate,
    config: ClassifierConfig,
}

impl std::fmt::Debug for Categorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Categorizer")
            .field("model", &self.model.name())
            .field("keywords", &self.gate.keywords().len())
            .field("config", &self.config)
            .finish()
    }
}

impl Categorizer {
    pub fn new(model: Arc<dyn CompletionModel>, config: ClassifierConfig) -> Self {
        Self {
            model,
            gate: ContentGate::default(),
            config,
        }
    }

    pub fn with_gate(mut self, gate: ContentGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn build_request(&self, content: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.config.model_name.clone(),
            system_prompt: self.build_prompt(content),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    fn build_prompt(&self, content: &str) -> String {
        let labels: Vec<String> = Category::taxonomy().iter().map(|c| c.to_string()).collect();
        let labels = serde_json::to_string_pretty(&labels).unwrap_or_default();
        let excerpt: String = content.chars().take(self.config.max_content_length).collect();

        format!(
            "Below is a news article excerpt and a list of allowed categories.\n\
             Choose exactly one category for the article.\n\
             If the article is NOT about a death or an accident caused by, or directly related to, AI, select 'N/A'.\n\
             If you are at all unsure, select 'N/A'.\n\
             \n\
             Categories:\n\
             {labels}\n\
             --------------\n\
             Article content:\n\
             {excerpt}\n\
             --------------\n\
             Output only the single matching category, verbatim, and nothing else.\n\
             In every other case return 'N/A'.\n"
        )
    }

    /// Classify one article body. Never fails: gated-out content, exhausted
    /// retries and off-taxonomy replies all come back as `N/A`.
    pub async fn categorize(&self, content: &str) -> Category {
        self.categorize_until(content, &mut Shutdown::never())
            .await
            .unwrap_or(Category::NotApplicable)
    }

    /// Like [`Categorizer::categorize`], but the retry backoff races
    /// `shutdown`. `None` means shutdown fired before a label was settled.
    #[instrument(level = "debug", skip_all, fields(chars = content.len()))]
    pub async fn categorize_until(&self, content: &str, shutdown: &mut Shutdown) -> Option<Category> {
        if !self.gate.is_eligible(content) {
            debug!("no incident keyword, skipping model");
            return Some(Category::NotApplicable);
        }

        let request = self.build_request(content);
        let max = self.config.max_retries;

        for attempt in 1..=max {
            let started = Instant::now();
            match self.model.complete(&request).await {
                Ok(reply) => {
                    let category = Category::from_model_output(&reply);
                    debug!(
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        %category,
                        "classified"
                    );
                    return Some(category);
                }
                Err(e) => {
                    warn!(attempt, max, error = %e, model = self.model.name(), "classification attempt failed");
                    if attempt < max && !shutdown.sleep(self.config.rate_limit_delay * attempt).await {
                        debug!(attempt, "shutdown during retry backoff");
                        return None;
                    }
                }
            }
        }

        warn!(max, "all classification attempts failed, using N/A");
        Some(Category::NotApplicable)
    }

    /// Classify articles one at a time, pausing `rate_limit_delay` between them.
    ///
    /// Stops early on shutdown; articles not reached keep `category: None`.
    /// Returns how many were classified.
    #[instrument(level = "info", skip_all, fields(count = articles.len()))]
    pub async fn categorize_all(&self, articles: &mut [Article], shutdown: &mut Shutdown) -> usize {
        let total = articles.len();
        let mut done = 0;
        for (i, article) in articles.iter_mut().enumerate() {
            let Some(category) = self.categorize_until(&article.content, shutdown).await else {
                break;
            };
            article.category = Some(category);
            done += 1;
            debug!(index = i, url = %article.url, %category, "article categorized");
            if i + 1 < total && !shutdown.sleep(self.config.rate_limit_delay).await {
                break;
            }
        }
        if done < total {
            warn!(done, total, "shutdown requested, rest of batch left unclassified");
        }
        let incidents = articles
            .iter()
            .filter(|a| a.category.map_or(false, |c| c.is_incident()))
            .count();
        info!(total, incidents, "batch categorized");
        done
    }
}
