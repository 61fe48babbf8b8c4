//! Public web signals about a company: news, search, and page scraping.
//!
//! Each source sits behind a trait so the pipeline can run against fakes:
//! - [`NewsSource`]: [`GNews`] (search API) and [`GoogleNews`] (news tab HTML)
//! - [`WebSearch`]: [`GoogleSearch`] (first result link)
//! - [`PageScraper`]: [`HttpScraper`] (title, headings, paragraphs)

mod gnews;
mod google_news;
pub mod http;
mod page;
mod search;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use leadscout_shared::{NewsArticle, Result, ScrapedPage, dedup_articles};

pub use gnews::GNews;
pub use google_news::{ARTICLE_CHAR_LIMIT, ARTICLE_UNAVAILABLE, GoogleNews};
pub use page::{HttpScraper, render_page};
pub use search::GoogleSearch;

#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Recent articles mentioning `company`.
    async fn fetch(&self, company: &str) -> Result<Vec<NewsArticle>>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Link of the first search result, if any.
    async fn first_link(&self, query: &str) -> Result<Option<Url>>;
}

#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &Url) -> Result<ScrapedPage>;
}

/// Query every source in order and merge the results by URL.
///
/// A failing source is logged and contributes nothing.
pub async fn collect_news(sources: &[Arc<dyn NewsSource>], company: &str) -> Vec<NewsArticle> {
    let mut batches = Vec::with_capacity(sources.len());
    for source in sources {
        match source.fetch(company).await {
            Ok(articles) => {
                info!(source = source.name(), count = articles.len(), "news fetched");
                batches.push(articles);
            }
            Err(e) => warn!(source = source.name(), error = %e, "news source failed"),
        }
    }
    dedup_articles(batches)
}
