//! Prompt templates.

use leadscout_shared::{SourceBundle, TaxonomyConfig};

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|i| format!("     - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn sources_block(sources: &SourceBundle) -> String {
    format!(
        "**Sources**\n\
         Website Content:\n{}\n\n\
         LinkedIn Profile Content:\n{}\n\n\
         Recent News Articles:\n{}\n",
        sources.website, sources.linkedin, sources.news
    )
}

const EVIDENCE_RULES: &str = "\
Decision rules (strict):
- Answer \"Yes\" only for clear, company-specific evidence of current interest or activity \
found in the Sources below: announcements, press releases, case studies, initiative pages, \
executive statements, tenders, partnerships, hiring posts, or adoption milestones tied to this company.
- Generic capability pages, vague marketing, industry articles not about this company, or old items mean \"No\".
- Use only the Sources block. Do not invent links or content.
- Every \"Yes\" needs at least one exact excerpt plus its source URL (and date if present). \
Without one, answer \"No\".";

/// Broad analysis across the whole taxonomy.
pub fn broad_analysis(taxonomy: &TaxonomyConfig, sources: &SourceBundle) -> String {
    format!(
        "You are a market-intelligence assistant.\n\n\
         Analyze the source materials below (Website, LinkedIn, News) and write a report with three sections.\n\n\
         {EVIDENCE_RULES}\n\n\
         1. **Interest**\n   \
            For each area below, state \"Yes\" or \"No\". For \"Yes\", add one sentence with an inline source tag (Website), (LinkedIn) or (News).\n\n   \
            New Business Development Areas:\n{}\n\n   \
            Large Deal Areas:\n{}\n\n\
         2. **Contacts**\n   \
            List each contact found (email, phone, or name and title) with its source. Only items present in the Sources.\n\n\
         3. **Evidence**\n   \
            Under Website, LinkedIn and News sub-headings, quote the excerpts supporting each \"Yes\" with URL and date.\n\n\
         {}",
        bullet_list(&taxonomy.new_business),
        bullet_list(&taxonomy.large_deal),
        sources_block(sources),
    )
}

/// Yes/No: does the analysis indicate a potential lead at all?
pub fn classification(analysis: &str) -> String {
    format!(
        "You are a proactive lead generation expert.\n\n\
         Given the lead analysis below, decide whether this company shows any sign, direct or indirect, \
         of being a potential lead. Even a slight indication of relevant interest means \"Yes\".\n\n\
         **Lead Analysis:**\n{analysis}\n\n\
         Answer strictly with \"Yes\" or \"No\"."
    )
}

/// Extract the customer name and every lead area from an analysis.
pub fn extraction(analysis: &str, company: &str, taxonomy: &TaxonomyConfig) -> String {
    format!(
        "Given the lead analysis below for the company \"{company}\", extract in plain text:\n\n\
         1. Customer Name\n\
         2. Lead Identification Area(s), only from: {}. Separate several with commas.\n\n\
         Use exactly this format:\n\n\
         **Customer Name**: <value>\n\
         **Lead Identification Area**: <value>\n\n\
         If a field is not found, write \"Not available\".\n\n\
         Lead Analysis:\n{analysis}",
        taxonomy.all().join(", ")
    )
}

/// Focused analysis for one area.
pub fn area_analysis(area: &str, sources: &SourceBundle) -> String {
    format!(
        "You are a market-intelligence assistant. Determine whether the source materials below show \
         evidence of interest in **{area}**.\n\n\
         {EVIDENCE_RULES}\n\n\
         Write a report with these sections:\n\n\
         1. **{area}**\n   \
            Start with \"Yes\" or \"No\". For \"Yes\", explain briefly why this is a potential lead, citing the source.\n\n\
         2. **Contacts**\n   \
            Contacts found (email, phone, or name and title) with source URL. Omit this section if there are none.\n\n\
         3. **Evidence**\n   \
            Under **Website**, **LinkedIn** and **News**, only the sub-headings that have supporting excerpts, \
            each with URL and date if present. Omit the section if there are no excerpts. \
            Never write placeholders such as \"N/A\".\n\n\
         {}",
        sources_block(sources),
    )
}

/// Customer name and the single area of an area-specific analysis.
pub fn area_details(analysis: &str, company: &str, taxonomy: &TaxonomyConfig) -> String {
    format!(
        "Given the lead analysis below for the company \"{company}\", extract in plain text:\n\n\
         1. Customer Name\n\
         2. Lead Identification Area, exactly one of: {}. No details.\n\n\
         Use exactly this format:\n\n\
         **Customer Name**: <value>\n\
         **Lead Identification Area**: <value>\n\n\
         Lead Analysis:\n{analysis}",
        taxonomy.all().join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> SourceBundle {
        SourceBundle {
            website: "WEBSITE".into(),
            linkedin: "LINKEDIN".into(),
            news: "NEWS".into(),
        }
    }

    #[test]
    fn broad_analysis_lists_taxonomy_and_sources() {
        let prompt = broad_analysis(&TaxonomyConfig::default(), &bundle());
        assert!(prompt.contains("     - SFR150"));
        assert!(prompt.contains("     - Partner with IT"));
        assert!(prompt.contains("Website Content:\nWEBSITE"));
        assert!(prompt.contains("Recent News Articles:\nNEWS"));
    }

    #[test]
    fn extraction_asks_for_area_field() {
        let prompt = extraction("analysis text", "Acme", &TaxonomyConfig::default());
        assert!(prompt.contains("**Lead Identification Area**: <value>"));
        assert!(prompt.contains("\"Acme\""));
        assert!(prompt.ends_with("analysis text"));
    }

    #[test]
    fn area_prompt_names_area() {
        let prompt = area_analysis("Cloud Migration", &bundle());
        assert!(prompt.contains("1. **Cloud Migration**"));
        assert!(prompt.contains("LinkedIn Profile Content:\nLINKEDIN"));
    }
}
