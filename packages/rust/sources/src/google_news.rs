//! News-tab search results scraped from HTML.
//!
//! Each result links to the article itself, which is fetched and rendered to
//! plain text so the model sees more than the two-line snippet.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};

use leadscout_shared::{LeadscoutError, NewsArticle, Result};

use crate::NewsSource;
use crate::http::{BROWSER_USER_AGENT, build_client, send_text};

/// Longest article text kept, in characters.
pub const ARTICLE_CHAR_LIMIT: usize = 10_000;

/// Stands in for an article body that could not be fetched.
pub const ARTICLE_UNAVAILABLE: &str = "Full article not available.";

/// Results per news page.
const PAGE_SIZE: u32 = 10;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

static RESULT: LazyLock<Selector> = LazyLock::new(|| selector("div.SoaBEf"));
static LINK: LazyLock<Selector> = LazyLock::new(|| selector("a[href]"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| selector("div.n0jPhd"));
static SNIPPET: LazyLock<Selector> = LazyLock::new(|| selector("div.GI74Re"));
static PUBLISHER: LazyLock<Selector> = LazyLock::new(|| selector("span.xQ82C"));
static DATE: LazyLock<Selector> = LazyLock::new(|| selector("span[class]:not([class*='xQ82C'])"));

pub struct GoogleNews {
    client: Client,
    endpoint: String,
    pages: u32,
}

impl GoogleNews {
    pub fn new(endpoint: impl Into<String>, pages: u32, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(BROWSER_USER_AGENT, timeout)?,
            endpoint: endpoint.into(),
            pages: pages.max(1),
        })
    }

    async fn article_text(&self, url: &str) -> String {
        match send_text(self.client.get(url), url).await.and_then(|html| html_to_text(&html)) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => ARTICLE_UNAVAILABLE.to_string(),
            Err(e) => {
                debug!(%url, error = %e, "article fetch failed");
                ARTICLE_UNAVAILABLE.to_string()
            }
        }
    }
}

/// One parsed search result, before the article is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NewsHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub publisher: Option<String>,
    pub published_on: Option<String>,
}

fn text_of(el: Option<ElementRef<'_>>) -> Option<String> {
    el.map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Parse a news results page.
pub(crate) fn parse_results(html: &str) -> Vec<NewsHit> {
    let doc = Html::parse_document(html);
    let mut hits: Vec<NewsHit> = Vec::new();

    for result in doc.select(&RESULT) {
        let Some(anchor) = result.select(&LINK).next() else {
            continue;
        };
        let url = anchor.value().attr("href").unwrap_or("").to_string();
        let Some(title) = text_of(anchor.select(&TITLE).next()) else {
            continue;
        };
        if url.is_empty() || hits.iter().any(|h| h.url == url) {
            continue;
        }

        hits.push(NewsHit {
            title,
            snippet: text_of(anchor.select(&SNIPPET).next()).unwrap_or_default(),
            url,
            publisher: text_of(anchor.select(&PUBLISHER).next()),
            published_on: text_of(result.select(&DATE).next()),
        });
    }
    hits
}

/// Render an article page as single-line plain text, truncated.
pub(crate) fn html_to_text(html: &str) -> Result<String> {
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg", "header", "footer"])
        .build();
    let markdown = converter
        .convert(html)
        .map_err(|e| LeadscoutError::parse(format!("htmd conversion failed: {e}")))?;

    let flat = markdown.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(flat.chars().take(ARTICLE_CHAR_LIMIT).collect())
}

#[async_trait]
impl NewsSource for GoogleNews {
    fn name(&self) -> &'static str {
        "google_news"
    }

    #[instrument(skip_all, fields(source = "google_news", company = %company))]
    async fn fetch(&self, company: &str) -> Result<Vec<NewsArticle>> {
        let mut articles: Vec<NewsArticle> = Vec::new();

        for page in 0..self.pages {
            let start = (page * PAGE_SIZE).to_string();
            let request = self.client.get(&self.endpoint).query(&[
                ("q", company),
                ("tbm", "nws"),
                ("start", start.as_str()),
            ]);
            let html = send_text(request, "news search").await?;
            let hits = parse_results(&html);
            if hits.is_empty() {
                warn!(page, "no news results on page");
                break;
            }

            for hit in hits {
                if articles.iter().any(|a| a.url == hit.url) {
                    continue;
                }
                let body = self.article_text(&hit.url).await;
                let description = if body == ARTICLE_UNAVAILABLE && !hit.snippet.is_empty() {
                    hit.snippet
                } else {
                    body
                };
                articles.push(NewsArticle {
                    title: hit.title,
                    description,
                    url: hit.url,
                    publisher: hit.publisher,
                    published_on: hit.published_on,
                });
            }
        }

        debug!(count = articles.len(), "news tab articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn results_page(links: &[(&str, &str)]) -> String {
        let items: String = links
            .iter()
            .map(|(href, title)| {
                format!(
                    r#"<div class="SoaBEf"><a href="{href}">
                        <div class="n0jPhd ynAwRc MBeuO nDgy9d">{title}</div>
                        <div class="GI74Re nDgy9d">Snippet for {title}</div>
                        <span class="xQ82C e8fRJf">Example Wire</span>
                    </a><span class="OSrXXb">2 days ago</span></div>"#
                )
            })
            .collect();
        format!("<html><body><div id=\"search\">{items}</div></body></html>")
    }

    #[test]
    fn parses_result_cards() {
        let html = results_page(&[
            ("https://a.example.com/1", "First"),
            ("https://a.example.com/1", "Duplicate"),
            ("https://b.example.com/2", "Second"),
        ]);
        let hits = parse_results(&html);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "First");
        assert_eq!(hits[0].snippet, "Snippet for First");
        assert_eq!(hits[0].publisher.as_deref(), Some("Example Wire"));
        assert_eq!(hits[0].published_on.as_deref(), Some("2 days ago"));
        assert_eq!(hits[1].url, "https://b.example.com/2");
    }

    #[test]
    fn cards_without_title_are_ignored() {
        let html = r#"<div class="SoaBEf"><a href="https://x.example.com">no title</a></div>"#;
        assert!(parse_results(html).is_empty());
    }

    #[test]
    fn article_text_is_flattened_and_truncated() {
        let long = "word ".repeat(5_000);
        let html = format!(
            "<html><head><script>var x = 1;</script></head><body><h1>Head</h1>\n<p>{long}</p></body></html>"
        );
        let text = html_to_text(&html).unwrap();
        assert!(text.contains("Head"));
        assert!(text.contains("word word"));
        assert!(!text.contains('\n'));
        assert!(!text.contains("var x"));
        assert_eq!(text.chars().count(), ARTICLE_CHAR_LIMIT);
    }

    #[tokio::test]
    async fn fetch_follows_result_links() {
        let server = MockServer::start().await;
        let ok = format!("{}/articles/ok", server.uri());
        let gone = format!("{}/articles/gone", server.uri());

        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("tbm", "nws"))
            .and(query_param("q", "Acme"))
            .and(query_param("start", "0"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(results_page(&[(&ok, "Acme wins"), (&gone, "Acme loses")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/ok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Acme signed a SaaS deal.</p></body></html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/articles/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let news = GoogleNews::new(format!("{}/search", server.uri()), 1, Duration::from_secs(5)).unwrap();
        let articles = news.fetch("Acme").await.expect("fetch");

        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].description, "Acme signed a SaaS deal.");
        // Unreachable article falls back to the result snippet.
        assert_eq!(articles[1].description, "Snippet for Acme loses");
    }
}
