//! GNews search API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use leadscout_shared::{NewsArticle, Result};

use crate::NewsSource;
use crate::http::{USER_AGENT, build_client, send_json};

pub struct GNews {
    client: Client,
    endpoint: String,
    token: String,
    window_days: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<GNewsArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GNewsArticle {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    source: Option<GNewsSource>,
}

#[derive(Debug, Deserialize)]
struct GNewsSource {
    name: Option<String>,
}

impl GNews {
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        window_days: u32,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT, timeout)?,
            endpoint: endpoint.into(),
            token: token.into(),
            window_days,
        })
    }
}

#[async_trait]
impl NewsSource for GNews {
    fn name(&self) -> &'static str {
        "gnews"
    }

    #[instrument(skip_all, fields(source = "gnews", company = %company))]
    async fn fetch(&self, company: &str) -> Result<Vec<NewsArticle>> {
        let today = Utc::now().date_naive();
        let from = today
            .checked_sub_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(today);
        let from = format!("{}T00:00:00Z", from.format("%Y-%m-%d"));
        let to = format!("{}T23:59:59Z", today.format("%Y-%m-%d"));

        let request = self.client.get(&self.endpoint).query(&[
            ("q", company),
            ("from", from.as_str()),
            ("to", to.as_str()),
            ("lang", "en"),
            ("token", self.token.as_str()),
        ]);
        let response: SearchResponse = send_json(request, "gnews search").await?;

        let articles: Vec<NewsArticle> = response
            .articles
            .into_iter()
            .filter(|a| !a.url.is_empty())
            .map(|a| NewsArticle {
                title: a.title,
                description: a.description.unwrap_or_default(),
                url: a.url,
                publisher: a.source.and_then(|s| s.name),
                published_on: a.published_at,
            })
            .collect();

        debug!(count = articles.len(), "gnews articles");
        Ok(articles)
    }
}
