use async_trait::async_trait;
use iw_core::config::StorageConfig;
use iw_core::{Article, ArticleStorage, Category, Result, StoredArticle};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Vec<StoredArticle>,
    next_id: i64,
}

impl MemoryStore {
    pub fn upsert_articles(&mut self, articles: &[Article]) -> usize {
        let mut inserted = 0;
        for article in articles {
            if self.rows.iter().any(|row| row.article.url == article.url) {
                continue;
            }
            self.next_id += 1;
            self.rows.push(StoredArticle {
                id: self.next_id,
                article: article.clone(),
            });
            inserted += 1;
        }
        inserted
    }

    pub fn update_categories(&mut self, updates: &[(i64, Category)]) -> usize {
        let mut updated = 0;
        for row in self.rows.iter_mut() {
            // a repeated id takes its last entry
            if let Some((_, category)) = updates.iter().rfind(|(id, _)| *id == row.id) {
                row.article.category = Some(*category);
                updated += 1;
            }
        }
        updated
    }

    pub fn load_unclassified(&self, limit: usize) -> Vec<StoredArticle> {
        self.rows
            .iter()
            .filter(|row| row.article.category.is_none())
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get_by_url(&self, url: &str) -> Option<StoredArticle> {
        self.rows.iter().find(|row| row.article.url == url).cloned()
    }
}

/// Process-local storage with the same semantics as the SQL backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn open(_config: &StorageConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStorage for InMemoryStorage {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<usize> {
        Ok(self.store.write().await.upsert_articles(articles))
    }

    async fn update_categories(&self, updates: &[(i64, Category)]) -> Result<usize> {
        Ok(self.store.write().await.update_categories(updates))
    }

    async fn load_unclassified(&self, limit: usize) -> Result<Vec<StoredArticle>> {
        Ok(self.store.read().await.load_unclassified(limit))
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        Ok(self.store.read().await.get_by_url(url))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.store.read().await.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn article(url: &str, title: &str) -> Article {
        Article {
            url: url.to_string(),
            title: title.to_string(),
            description: "Factory robot arm injures worker".to_string(),
            content: "A worker was injured by an industrial robot.".to_string(),
            published_at: Utc::now(),
            country: vec!["germany".to_string()],
            category: None,
        }
    }

    #[tokio::test]
    async fn test_memory_upsert_keeps_first_seen() {
        let storage = InMemoryStorage::new();
        let first = article("http://test.com/a", "Original");

        assert_eq!(storage.upsert_articles(&[first.clone()]).await.unwrap(), 1);
        assert_eq!(
            storage
                .upsert_articles(&[article("http://test.com/a", "Changed")])
                .await
                .unwrap(),
            0
        );

        assert_eq!(storage.count().await.unwrap(), 1);
        let stored = storage.get_by_url("http://test.com/a").await.unwrap().unwrap();
        assert_eq!(stored.id, 1);
        assert_eq!(stored.article, first);
    }

    #[tokio::test]
    async fn test_memory_update_categories() {
        let storage = InMemoryStorage::new();
        storage
            .upsert_articles(&[article("http://test.com/a", "A"), article("http://test.com/b", "B")])
            .await
            .unwrap();

        let updated = storage
            .update_categories(&[(2, Category::NotApplicable), (42, Category::NotApplicable)])
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let pending = storage.load_unclassified(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].article.url, "http://test.com/a");
    }

    #[tokio::test]
    async fn test_memory_update_categories_last_entry_wins() {
        let storage = InMemoryStorage::new();
        storage
            .upsert_articles(&[article("http://test.com/a", "A")])
            .await
            .unwrap();

        let injury = Category::Incident {
            domain: iw_core::types::IncidentDomain::IndustrialRobotics,
            severity: iw_core::Severity::Accident,
        };
        let updated = storage
            .update_categories(&[(1, Category::NotApplicable), (1, injury)])
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let stored = storage.get_by_url("http://test.com/a").await.unwrap().unwrap();
        assert_eq!(stored.article.category, Some(injury));
    }
}
