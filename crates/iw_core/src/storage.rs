use async_trait::async_trait;

use crate::types::{Article, Category, StoredArticle};
use crate::Result;

#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Insert articles, silently skipping any whose URL is already stored.
    /// Returns the number of rows actually inserted.
    async fn upsert_articles(&self, articles: &[Article]) -> Result<usize>;

    /// Set the category of every listed row in a single transaction.
    /// Ids that do not exist are ignored; returns the number of rows updated.
    async fn update_categories(&self, updates: &[(i64, Category)]) -> Result<usize>;

    /// Rows that still have no category, oldest first.
    async fn load_unclassified(&self, limit: usize) -> Result<Vec<StoredArticle>>;

    async fn get_by_url(&self, url: &str) -> Result<Option<StoredArticle>>;

    async fn count(&self) -> Result<usize>;
}
