use async_trait::async_trait;
use iw_core::config::SourceConfig;
use iw_core::{Error, RawArticle, Result, TimeWindow};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use url::Url;

use super::{ArticleSource, SourcePage};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Deserialize)]
struct ArchiveResponse {
    status: String,
    #[serde(default)]
    results: serde_json::Value,
    #[serde(rename = "nextPage", default)]
    next_page: Option<String>,
}

/// Client for the newsdata.io archive search endpoint.
pub struct NewsDataSource {
    client: Client,
    api_key: String,
    base_url: Url,
    query: String,
    language: String,
}

impl NewsDataSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("NewsData API key is required".to_string()))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("Failed to parse URL {}: {}", config.base_url, e)))?;
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url,
            query: config.query.clone(),
            language: config.language.clone(),
        })
    }

    /// Full request URL for one page of `window`.
    pub fn page_url(&self, window: &TimeWindow, page: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("apikey", &self.api_key)
                .append_pair("q", &self.query)
                .append_pair("language", &self.language)
                .append_pair("from_date", &window.start.format(DATE_FORMAT).to_string())
                .append_pair("to_date", &window.end.format(DATE_FORMAT).to_string());
            if let Some(page) = page {
                pairs.append_pair("page", page);
            }
        }
        url
    }
}

impl fmt::Debug for NewsDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsDataSource")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .field("query", &self.query)
            .field("language", &self.language)
            .finish()
    }
}

/// Decode an archive response body into a page.
///
/// Anything other than `"status": "success"` is a source error carrying the
/// provider's message.
pub fn parse_response(body: &str) -> Result<SourcePage> {
    let response: ArchiveResponse = serde_json::from_str(body)?;
    if response.status != "success" {
        let message = response
            .results
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| response.results.to_string());
        return Err(Error::Source(format!("NewsData returned {}: {}", response.status, message)));
    }
    let results: Vec<RawArticle> = match response.results {
        serde_json::Value::Null => Vec::new(),
        value => serde_json::from_value(value)?,
    };
    Ok(SourcePage {
        results,
        next_page: response.next_page,
    })
}

#[async_trait]
impl ArticleSource for NewsDataSource {
    fn name(&self) -> &str {
        "NewsData"
    }

    async fn fetch_page(&self, window: &TimeWindow, page: Option<&str>) -> Result<SourcePage> {
        tracing::debug!(%window, page = ?page, "requesting archive page");

        let response = self.client.get(self.page_url(window, page)).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // error bodies still carry {"status":"error","results":{...}}
            return match parse_response(&body) {
                Err(e) => Err(e),
                Ok(_) => Err(Error::Source(format!("NewsData request failed with {}", status))),
            };
        }
        parse_response(&body)
    }
}
