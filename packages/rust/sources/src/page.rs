//! Company page scraping: title, headings and paragraphs as a text block.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use leadscout_shared::{Result, ScrapedPage};

use crate::PageScraper;
use crate::http::{BROWSER_USER_AGENT, build_client, send_text};

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));
static PARAGRAPHS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("valid selector"));

pub struct HttpScraper {
    client: Client,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(BROWSER_USER_AGENT, timeout)?,
        })
    }
}

/// Render fetched HTML into the text block the analysis prompts expect.
pub fn render_page(html: &str, url: &Url) -> ScrapedPage {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let collect = |sel: &Selector| {
        doc.select(sel)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    };
    let headings = collect(&HEADINGS);
    let paragraphs = collect(&PARAGRAPHS);

    let content = format!(
        "**Title:** {}\n\n**Headings:**\n{headings}\n\n**Paragraphs:**\n{paragraphs}\n\n**Source:** {url}",
        title.as_deref().unwrap_or("No title found"),
    );

    ScrapedPage {
        url: url.clone(),
        title,
        content,
    }
}

#[async_trait]
impl PageScraper for HttpScraper {
    #[instrument(skip_all, fields(url = %url))]
    async fn scrape(&self, url: &Url) -> Result<ScrapedPage> {
        let html = send_text(
            self.client
                .get(url.as_str())
                .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
                .header("Accept-Language", "en-US,en;q=0.9"),
            url.as_str(),
        )
        .await?;
        let page = render_page(&html, url);
        debug!(chars = page.content.len(), "page scraped");
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"<html><head><title> Acme Corp </title></head><body>
        <h1>Welcome</h1><h3>Cloud services</h3>
        <p>We build things.</p><p>   </p><p>Now on AWS.</p>
    </body></html>"#;

    #[test]
    fn renders_sections_in_order() {
        let url = Url::parse("https://acme.example.com/").unwrap();
        let page = render_page(PAGE, &url);
        assert_eq!(page.title.as_deref(), Some("Acme Corp"));
        assert_eq!(
            page.content,
            "**Title:** Acme Corp\n\n**Headings:**\nWelcome\nCloud services\n\n\
             **Paragraphs:**\nWe build things.\nNow on AWS.\n\n\
             **Source:** https://acme.example.com/"
        );
    }

    #[test]
    fn missing_title_has_placeholder() {
        let url = Url::parse("https://acme.example.com/").unwrap();
        let page = render_page("<p>x</p>", &url);
        assert!(page.title.is_none());
        assert!(page.content.starts_with("**Title:** No title found"));
    }

    #[tokio::test]
    async fn scrape_fetches_and_renders() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let scraper = HttpScraper::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&format!("{}/about", server.uri())).unwrap();
        let page = scraper.scrape(&url).await.unwrap();
        assert!(page.content.contains("Now on AWS."));
        assert!(page.content.ends_with(&format!("**Source:** {url}")));
    }

    #[tokio::test]
    async fn scrape_surfaces_http_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let scraper = HttpScraper::new(Duration::from_secs(5)).unwrap();
        let url = Url::parse(&server.uri()).unwrap();
        assert!(scraper.scrape(&url).await.is_err());
    }
}
