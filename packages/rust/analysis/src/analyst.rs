//! Lead analysis on top of a [`ChatModel`].

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument};

use leadscout_shared::{Result, SourceBundle, TaxonomyConfig};

use crate::model::ChatModel;
use crate::prompts;

static YES_NO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(yes|no)\b").expect("verdict regex"));

/// A yes/no judgement read from a model reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
}

impl Verdict {
    /// The first standalone "yes" or "no" in `reply`. Anything else is `No`.
    pub fn parse(reply: &str) -> Self {
        match YES_NO.captures(reply).map(|c| c[1].to_ascii_lowercase()) {
            Some(word) if word == "yes" => Self::Yes,
            _ => Self::No,
        }
    }

    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }
}

/// Result of the broad, whole-taxonomy analysis.
#[derive(Debug, Clone)]
pub struct Assessment {
    pub analysis: String,
    pub verdict: Verdict,
}

/// Result of the focused analysis for one area.
#[derive(Debug, Clone)]
pub struct AreaAssessment {
    pub area: String,
    pub analysis: String,
    pub verdict: Verdict,
}

pub struct LeadAnalyst {
    model: Arc<dyn ChatModel>,
    taxonomy: TaxonomyConfig,
}

impl LeadAnalyst {
    pub fn new(model: Arc<dyn ChatModel>, taxonomy: TaxonomyConfig) -> Self {
        Self { model, taxonomy }
    }

    /// Broad analysis, then a yes/no classification of that analysis.
    #[instrument(skip_all, fields(model = %self.model.name()))]
    pub async fn assess(&self, sources: &SourceBundle) -> Result<Assessment> {
        let analysis = self
            .model
            .complete(&prompts::broad_analysis(&self.taxonomy, sources))
            .await?;
        let reply = self.model.complete(&prompts::classification(&analysis)).await?;
        let verdict = Verdict::parse(&reply);
        info!(?verdict, "lead classified");
        Ok(Assessment { analysis, verdict })
    }

    /// Extraction document containing the `**Lead Identification Area**:` field.
    pub async fn extract_areas(&self, analysis: &str, company: &str) -> Result<String> {
        let extracted = self
            .model
            .complete(&prompts::extraction(analysis, company, &self.taxonomy))
            .await?;
        debug!(%extracted, "raw area extraction");
        Ok(extracted)
    }

    #[instrument(skip_all, fields(area = %area))]
    pub async fn assess_area(&self, area: &str, sources: &SourceBundle) -> Result<AreaAssessment> {
        let analysis = self
            .model
            .complete(&prompts::area_analysis(area, sources))
            .await?;
        let verdict = Verdict::parse(&analysis);
        info!(?verdict, "area assessed");
        Ok(AreaAssessment {
            area: area.to_string(),
            analysis,
            verdict,
        })
    }

    /// Short customer/area summary used in the email body.
    pub async fn area_details(&self, analysis: &str, company: &str) -> Result<String> {
        self.model
            .complete(&prompts::area_details(analysis, company, &self.taxonomy))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies in order and records prompts.
    struct Scripted {
        replies: Mutex<Vec<&'static str>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&'static str]) -> Arc<Self> {
            let mut replies = replies.to_vec();
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.replies.lock().unwrap().pop().unwrap_or("No").to_string())
        }
    }

    #[test]
    fn verdict_reads_first_standalone_word() {
        assert_eq!(Verdict::parse("Yes"), Verdict::Yes);
        assert_eq!(Verdict::parse("  yes."), Verdict::Yes);
        assert_eq!(Verdict::parse("**AI**\nYes, the company announced..."), Verdict::Yes);
        assert_eq!(Verdict::parse("No. Nothing says yes here"), Verdict::No);
        assert_eq!(Verdict::parse("Nobody knows; yesterday"), Verdict::No);
        assert_eq!(Verdict::parse(""), Verdict::No);
    }

    #[tokio::test]
    async fn assess_runs_analysis_then_classification() {
        let model = Scripted::new(&["1. **Interest** AI: Yes", "Yes"]);
        let analyst = LeadAnalyst::new(model.clone(), TaxonomyConfig::default());
        let sources = SourceBundle::default();

        let assessment = analyst.assess(&sources).await.unwrap();
        assert!(assessment.verdict.is_yes());
        assert_eq!(assessment.analysis, "1. **Interest** AI: Yes");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("1. **Interest** AI: Yes"));
    }

    #[tokio::test]
    async fn area_verdict_comes_from_analysis() {
        let model = Scripted::new(&["1. **AWS**\nNo evidence in the sources."]);
        let analyst = LeadAnalyst::new(model, TaxonomyConfig::default());
        let result = analyst.assess_area("AWS", &SourceBundle::default()).await.unwrap();
        assert_eq!(result.verdict, Verdict::No);
        assert_eq!(result.area, "AWS");
    }
}
