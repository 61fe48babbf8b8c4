//! Report documents and email bodies.

use std::sync::LazyLock;

use regex::Regex;

use leadscout_shared::SourceBundle;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold regex"));

/// A named file sent with an email or CRM submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn markdown(name: impl Into<String>, text: String) -> Self {
        Self {
            name: name.into(),
            content_type: MARKDOWN_CONTENT_TYPE.to_string(),
            bytes: text.into_bytes(),
        }
    }
}

/// Filesystem-safe stem for attachment names.
fn file_stem(company: &str) -> String {
    let stem: String = company
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() { "company".into() } else { stem }
}

/// The area-specific analysis as a Markdown document.
pub fn analysis_report(company: &str, area: &str, analysis: &str) -> Attachment {
    let text = format!(
        "# Lead Analysis for {company}\n\n**Lead Identification Area:** {area}\n\n{}\n",
        analysis.trim()
    );
    Attachment::markdown(format!("{}_lead_analysis.md", file_stem(company)), text)
}

/// Everything gathered for the company, for reviewers who want the raw signals.
pub fn sources_report(company: &str, sources: &SourceBundle) -> Attachment {
    let text = format!(
        "# Company Content and Analysis\n\n\
         ## Company Website Content\n\n{}\n\n\
         ## Company LinkedIn Profile Content\n\n{}\n\n\
         ## Recent News Articles\n\n{}\n",
        sources.website.trim(),
        sources.linkedin.trim(),
        sources.news.trim()
    );
    Attachment::markdown(format!("{}_full_content.md", file_stem(company)), text)
}

pub fn email_subject(company: &str, area: &str) -> String {
    format!("New Lead: {company} - {area}")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape `line` and turn `**bold**` into `<strong>`.
fn render_line(line: &str) -> String {
    BOLD.replace_all(&escape_html(line), "<strong>$1</strong>")
        .into_owned()
}

/// HTML body announcing one new lead area.
pub fn email_body(company: &str, area: &str, details: &str) -> String {
    let mut html = format!(
        "<html><body><p>A new potential lead has been identified for <strong>{}</strong> \
         in the area of <strong>{}</strong>.</p>",
        escape_html(company),
        escape_html(area)
    );
    for line in details.lines().map(str::trim).filter(|l| !l.is_empty()) {
        html.push_str("<p>");
        html.push_str(&render_line(line));
        html.push_str("</p>");
    }
    html.push_str("<p>See attachments for full reports.</p></body></html>");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_names_follow_company() {
        let doc = analysis_report("Acme Corp.", "AI", "  1. **AI**\nYes  ");
        assert_eq!(doc.name, "Acme_Corp__lead_analysis.md");
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.starts_with("# Lead Analysis for Acme Corp.\n"));
        assert!(text.ends_with("1. **AI**\nYes\n"));
    }

    #[test]
    fn sources_report_has_all_sections() {
        let bundle = SourceBundle {
            website: "site".into(),
            linkedin: "li".into(),
            news: "news".into(),
        };
        let doc = sources_report("Acme", &bundle);
        assert_eq!(doc.name, "Acme_full_content.md");
        let text = String::from_utf8(doc.bytes).unwrap();
        assert!(text.contains("## Company LinkedIn Profile Content\n\nli\n"));
    }

    #[test]
    fn body_converts_bold_and_escapes() {
        let body = email_body(
            "A&B",
            "AI",
            "**Customer Name**: A&B\n\n**Lead Identification Area**: <AI>",
        );
        assert!(body.contains("<strong>A&amp;B</strong>"));
        assert!(body.contains("<p><strong>Customer Name</strong>: A&amp;B</p>"));
        assert!(body.contains("<p><strong>Lead Identification Area</strong>: &lt;AI&gt;</p>"));
        assert!(!body.contains("<p></p>"));
        assert!(body.ends_with("</body></html>"));
    }

    #[test]
    fn subject_format() {
        assert_eq!(email_subject("Acme", "SaaS"), "New Lead: Acme - SaaS");
    }
}
