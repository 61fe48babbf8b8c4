//! Custom Search JSON API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use leadscout_shared::Result;

use crate::WebSearch;
use crate::http::{USER_AGENT, build_client, send_json};

pub struct GoogleSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    cx: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
}

impl GoogleSearch {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        cx: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT, timeout)?,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            cx: cx.into(),
        })
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    #[instrument(skip_all, fields(query = %query))]
    async fn first_link(&self, query: &str) -> Result<Option<Url>> {
        let request = self.client.get(&self.endpoint).query(&[
            ("q", query),
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
        ]);
        let response: SearchResponse = send_json(request, "web search").await?;

        let link = response
            .items
            .into_iter()
            .find_map(|item| Url::parse(&item.link).ok());
        debug!(found = link.is_some(), "search complete");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_first_parseable_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Acme company site"))
            .and(query_param("key", "k"))
            .and(query_param("cx", "c"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    { "link": "not a url" },
                    { "link": "https://acme.example.com/" },
                    { "link": "https://other.example.com/" }
                ]
            })))
            .mount(&server)
            .await;

        let search = GoogleSearch::new(server.uri(), "k", "c", Duration::from_secs(5)).unwrap();
        let link = search.first_link("Acme company site").await.unwrap();
        assert_eq!(link.unwrap().as_str(), "https://acme.example.com/");
    }

    #[tokio::test]
    async fn no_items_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "searchInformation": { "totalResults": "0" }
            })))
            .mount(&server)
            .await;

        let search = GoogleSearch::new(server.uri(), "k", "c", Duration::from_secs(5)).unwrap();
        assert!(search.first_link("Nobody").await.unwrap().is_none());
    }
}
