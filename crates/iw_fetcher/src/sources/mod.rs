use async_trait::async_trait;
use iw_core::{RawArticle, Result, TimeWindow};

pub mod newsdata;

pub use newsdata::NewsDataSource;

/// One page of search results plus the token for the next page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePage {
    pub results: Vec<RawArticle>,
    pub next_page: Option<String>,
}

impl SourcePage {
    /// Continuation token, treating an empty string as the end.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page.as_deref().filter(|p| !p.trim().is_empty())
    }
}

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Returns the name of the news source
    fn name(&self) -> &str;

    /// Fetch one page of articles published within `window`.
    /// `page` is the continuation token from the previous page, if any.
    async fn fetch_page(&self, window: &TimeWindow, page: Option<&str>) -> Result<SourcePage>;
}
