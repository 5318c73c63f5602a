use async_trait::async_trait;
use chrono::{DateTime, Utc};
use iw_core::config::StorageConfig;
use iw_core::{Article, ArticleStorage, Category, Error, Result, StoredArticle};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::StorageBackend;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS news (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        url TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL,
        content TEXT NOT NULL,
        pub_date TEXT NOT NULL,
        country TEXT NOT NULL,
        category TEXT,
        severity TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_news_category ON news (category)",
    // Add future migrations here
];

// SQLite caps bound parameters per statement at 999 on older builds; each
// update binds three.
const UPDATE_CHUNK: usize = 250;

pub struct SqliteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SqliteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database path must be writable (set IW_DATABASE)"
    }

    async fn open(config: &StorageConfig) -> Result<Self> {
        Self::new_with_path(&config.database_path).await
    }
}

impl SqliteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| Error::Database(format!("Invalid database path: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Stored labels outside the taxonomy read back as `N/A` rather than as
/// unclassified, which `load_unclassified` would never return.
fn parse_category(id: i64, label: &str) -> Option<Category> {
    if label.is_empty() {
        return None;
    }
    match label.parse::<Category>() {
        Ok(category) => Some(category),
        Err(_) => {
            tracing::warn!(id, label, "stored category outside the taxonomy, reading as N/A");
            Some(Category::NotApplicable)
        }
    }
}

/// Keep only the last update for each id, in first-seen order, so a repeated
/// id never lands in two chunks.
fn last_per_id(updates: &[(i64, Category)]) -> Vec<(i64, Category)> {
    let mut deduped: Vec<(i64, Category)> = Vec::with_capacity(updates.len());
    let mut index = std::collections::HashMap::with_capacity(updates.len());
    for (id, category) in updates {
        match index.get(id) {
            Some(&i) => deduped[i] = (*id, *category),
            None => {
                index.insert(*id, deduped.len());
                deduped.push((*id, *category));
            }
        }
    }
    deduped
}

fn row_to_article(row: &SqliteRow) -> Result<StoredArticle> {
    let read = |e: sqlx::Error| Error::Database(format!("Failed to read row: {}", e));

    let published_at: String = row.try_get("pub_date").map_err(read)?;
    let published_at = DateTime::parse_from_rfc3339(&published_at)
        .map_err(|e| Error::Database(format!("Failed to parse date: {}", e)))?
        .with_timezone(&Utc);
    let country: String = row.try_get("country").map_err(read)?;
    let category: Option<String> = row.try_get("category").map_err(read)?;
    let id: i64 = row.try_get("id").map_err(read)?;

    Ok(StoredArticle {
        id,
        article: Article {
            url: row.try_get("url").map_err(read)?,
            title: row.try_get("title").map_err(read)?,
            description: row.try_get("description").map_err(read)?,
            content: row.try_get("content").map_err(read)?,
            published_at,
            country: serde_json::from_str(&country)?,
            category: category.and_then(|c| parse_category(id, &c)),
        },
    })
}

#[async_trait]
impl ArticleStorage for SqliteStorage {
    async fn upsert_articles(&self, articles: &[Article]) -> Result<usize> {
        let mut inserted = 0;
        for article in articles {
            let country = serde_json::to_string(&article.country)?;
            let result = sqlx::query(
                r#"
                INSERT INTO news (title, url, description, content, pub_date, country, category)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (url) DO NOTHING
                "#,
            )
            .bind(&article.title)
            .bind(&article.url)
            .bind(&article.description)
            .bind(&article.content)
            .bind(article.published_at.to_rfc3339())
            .bind(country)
            .bind(article.category.map(|c| c.to_string()))
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to store article: {}", e)))?;

            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn update_categories(&self, updates: &[(i64, Category)]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let updates = last_per_id(updates);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let mut updated = 0;
        for chunk in updates.chunks(UPDATE_CHUNK) {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE news SET category = CASE id");
            for (id, category) in chunk {
                query
                    .push(" WHEN ")
                    .push_bind(*id)
                    .push(" THEN ")
                    .push_bind(category.to_string());
            }
            query.push(" END WHERE id IN (");
            let mut ids = query.separated(", ");
            for (id, _) in chunk {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");

            let result = query
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::Database(format!("Failed to update categories: {}", e)))?;
            updated += result.rows_affected() as usize;
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit category update: {}", e)))?;

        Ok(updated)
    }

    async fn load_unclassified(&self, limit: usize) -> Result<Vec<StoredArticle>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, url, description, content, pub_date, country, category
            FROM news
            WHERE category IS NULL OR category = ''
            ORDER BY id
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to load unclassified articles: {}", e)))?;

        rows.iter().map(row_to_article).collect()
    }

    async fn get_by_url(&self, url: &str) -> Result<Option<StoredArticle>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, url, description, content, pub_date, country, category
            FROM news
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get article by url: {}", e)))?;

        row.as_ref().map(row_to_article).transpose()
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count articles: {}", e)))?;
        Ok(count as usize)
    }
}
