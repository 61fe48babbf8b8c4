//! Signal types passed between the source, analysis, and pipeline crates.

use serde::{Deserialize, Serialize};
use url::Url;

// ---------------------------------------------------------------------------
// NewsArticle
// ---------------------------------------------------------------------------

/// A news item about a target company, from any news source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    /// Headline.
    pub title: String,
    /// Short description or full article text, whichever the source provides.
    pub description: String,
    /// Canonical article URL, used for deduplication across sources.
    pub url: String,
    /// Publisher name, when the source exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Free-form publication date as shown by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_on: Option<String>,
}

impl NewsArticle {
    /// Render articles into the text block handed to the language model.
    pub fn digest(articles: &[NewsArticle]) -> String {
        articles
            .iter()
            .map(|a| {
                format!(
                    "**Title:** {}\n**Description:** {}\n**URL:** {}",
                    a.title, a.description, a.url
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Merge article lists, keeping the first article seen for each URL.
pub fn dedup_articles(batches: impl IntoIterator<Item = Vec<NewsArticle>>) -> Vec<NewsArticle> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for batch in batches {
        for article in batch {
            if article.url.is_empty() || seen.insert(article.url.clone()) {
                out.push(article);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// ScrapedPage
// ---------------------------------------------------------------------------

/// Text rendition of a scraped web page.
#[derive(Debug, Clone)]
pub struct ScrapedPage {
    /// The page that was fetched.
    pub url: Url,
    /// `<title>` text, if any.
    pub title: Option<String>,
    /// Rendered content block (title, headings, paragraphs, source line).
    pub content: String,
}

// ---------------------------------------------------------------------------
// SourceBundle
// ---------------------------------------------------------------------------

/// Everything gathered for one company in one run.
#[derive(Debug, Clone, Default)]
pub struct SourceBundle {
    /// Company website content.
    pub website: String,
    /// LinkedIn profile content.
    pub linkedin: String,
    /// Rendered news digest.
    pub news: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, url: &str) -> NewsArticle {
        NewsArticle {
            title: title.into(),
            description: format!("about {title}"),
            url: url.into(),
            publisher: None,
            published_on: None,
        }
    }

    #[test]
    fn digest_format() {
        let digest = NewsArticle::digest(&[
            article("One", "https://news.example.com/1"),
            article("Two", "https://news.example.com/2"),
        ]);
        assert!(digest.starts_with("**Title:** One\n**Description:** about One\n**URL:** https://news.example.com/1"));
        assert_eq!(digest.matches("\n\n").count(), 1);
    }

    #[test]
    fn dedup_keeps_first_by_url() {
        let merged = dedup_articles([
            vec![article("A", "https://x/1"), article("B", "https://x/2")],
            vec![article("A again", "https://x/1"), article("C", "https://x/3")],
        ]);
        let titles: Vec<_> = merged.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["A", "B", "C"]);
    }

    #[test]
    fn article_serialization_skips_empty_options() {
        let json = serde_json::to_string(&article("A", "https://x/1")).expect("serialize");
        assert!(!json.contains("publisher"));
        let parsed: NewsArticle = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.url, "https://x/1");
    }
}
