//! Lead-generation run: signals → analysis → ledger → delivery → commit.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{Span, error, field, info, instrument, warn};
use uuid::Uuid;

use leadscout_analysis::LeadAnalyst;
use leadscout_ledger::{AreaSet, Ledger, ReconcileOutcome, Reconciliation};
use leadscout_notify::{
    LeadSink, LeadSubmission, MailMessage, Mailer, analysis_report, email_body, email_subject,
    sources_report,
};
use leadscout_shared::{
    CompanyTarget, DefaultsConfig, LeadscoutError, NewsArticle, Result, ScrapedPage, SourceBundle,
};
use leadscout_sources::{NewsSource, PageScraper, WebSearch, collect_news};

/// Everything a run talks to. Each piece is a trait object so tests can swap
/// in fakes.
pub struct Collaborators {
    pub news: Vec<Arc<dyn NewsSource>>,
    pub search: Arc<dyn WebSearch>,
    pub scraper: Arc<dyn PageScraper>,
    pub analyst: Arc<LeadAnalyst>,
    pub mailer: Arc<dyn Mailer>,
    /// `None` when no CRM endpoint is configured.
    pub crm: Option<Arc<dyn LeadSink>>,
    pub ledger: Arc<Ledger>,
}

/// How a company run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No news articles; nothing to analyze.
    NoNews,
    /// The website or LinkedIn search returned no result.
    SourceNotFound(String),
    /// The broad classification said no.
    NotALead,
    /// The extraction named no usable area.
    NoCandidates,
    /// Every candidate area was notified on an earlier run.
    AlreadyNotified,
    /// At least one novel area was processed; see [`RunReport::areas`].
    Processed,
}

/// What happened to one novel area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AreaStatus {
    /// The focused analysis found no evidence; nothing sent.
    NoEvidence,
    /// Sent and recorded in the ledger.
    Delivered,
    /// Analysis, email, or CRM failed. Not recorded; retried next run.
    NotDelivered { reason: String },
    /// Sent, but the ledger write failed. The next run will notify again.
    Unrecorded { reason: String },
}

impl AreaStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NotDelivered { .. } | Self::Unrecorded { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaResult {
    pub area: String,
    #[serde(flatten)]
    pub status: AreaStatus,
}

/// Summary of one company run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub company: String,
    pub outcome: RunOutcome,
    pub areas: Vec<AreaResult>,
    pub elapsed_ms: u64,
}

impl RunReport {
    fn new(
        run_id: Uuid,
        company: &str,
        outcome: RunOutcome,
        areas: Vec<AreaResult>,
        start: Instant,
    ) -> Self {
        Self {
            run_id,
            company: company.to_string(),
            outcome,
            areas,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// True if any novel area failed to deliver or to record.
    pub fn has_failures(&self) -> bool {
        self.areas.iter().any(|a| a.status.is_failure())
    }

    pub fn delivered(&self) -> impl Iterator<Item = &str> {
        self.areas
            .iter()
            .filter(|a| a.status == AreaStatus::Delivered)
            .map(|a| a.area.as_str())
    }
}

/// Result of one company within [`run_all`].
#[derive(Debug)]
pub struct CompanyRun {
    pub company: String,
    pub result: Result<RunReport>,
}

impl CompanyRun {
    pub fn failed(&self) -> bool {
        self.result.as_ref().map_or(true, RunReport::has_failures)
    }
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a company enters a new step.
    fn phase(&self, company: &str, name: &str);
    /// Called when a company run ends, successfully or not.
    fn done(&self, run: &CompanyRun);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _company: &str, _name: &str) {}
    fn done(&self, _run: &CompanyRun) {}
}

/// Run every target, at most `concurrency` at a time.
///
/// One company's failure never stops the others.
pub async fn run_all(
    targets: &[CompanyTarget],
    defaults: &DefaultsConfig,
    collaborators: Arc<Collaborators>,
    concurrency: usize,
    progress: Arc<dyn ProgressReporter>,
) -> Vec<CompanyRun> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(targets.len());

    for target in targets {
        let target = target.clone();
        let defaults = defaults.clone();
        let collaborators = collaborators.clone();
        let progress = progress.clone();
        let sem = semaphore.clone();
        let company = target.name.clone();

        handles.push((
            company,
            tokio::spawn(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let result =
                    run_company(&target, &defaults, &collaborators, progress.as_ref()).await;
                let run = CompanyRun {
                    company: target.name.clone(),
                    result,
                };
                progress.done(&run);
                run
            }),
        ));
    }

    let mut runs = Vec::with_capacity(handles.len());
    for (company, handle) in handles {
        match handle.await {
            Ok(run) => runs.push(run),
            Err(e) => {
                error!(company, error = %e, "run task failed");
                runs.push(CompanyRun {
                    company,
                    result: Err(LeadscoutError::Task(e.to_string())),
                });
            }
        }
    }
    runs
}

/// Run the pipeline for one company.
///
/// 1. News from every source (stop if there is none)
/// 2. Website and LinkedIn pages via web search
/// 3. Broad analysis and yes/no classification
/// 4. Candidate area extraction and ledger reconciliation
/// 5. Per novel area: focused analysis, email, CRM, commit
///
/// Errors before step 5 fail the whole run. Failures inside step 5 are
/// recorded per area and the remaining areas still run.
#[instrument(skip_all, fields(company = %target.name, run_id = field::Empty))]
pub async fn run_company(
    target: &CompanyTarget,
    defaults: &DefaultsConfig,
    collaborators: &Collaborators,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();
    Span::current().record("run_id", field::display(run_id));
    let company = target.name.as_str();

    if target.recipients_or(defaults).is_empty() {
        return Err(LeadscoutError::config(format!(
            "no report recipients configured for {company}"
        )));
    }

    info!("starting lead run");
    let finish = |outcome: RunOutcome, areas: Vec<AreaResult>| {
        let report = RunReport::new(run_id, company, outcome, areas, start);
        info!(
            outcome = ?report.outcome,
            areas = report.areas.len(),
            elapsed_ms = report.elapsed_ms,
            "lead run complete"
        );
        report
    };

    // --- Signals ---
    progress.phase(company, "Fetching news");
    let articles = collect_news(&collaborators.news, company).await;
    if articles.is_empty() {
        warn!("no news found, skipping company");
        return Ok(finish(RunOutcome::NoNews, Vec::new()));
    }

    progress.phase(company, "Scraping company website");
    let Some(website) = find_and_scrape(collaborators, &format!("{company} company site")).await?
    else {
        return Ok(finish(RunOutcome::SourceNotFound("website".into()), Vec::new()));
    };

    progress.phase(company, "Scraping LinkedIn profile");
    let Some(linkedin) = find_and_scrape(collaborators, &format!("{company} LinkedIn")).await?
    else {
        return Ok(finish(RunOutcome::SourceNotFound("linkedin".into()), Vec::new()));
    };

    let sources = SourceBundle {
        website: website.content,
        linkedin: linkedin.content,
        news: NewsArticle::digest(&articles),
    };

    // --- Analysis ---
    progress.phase(company, "Analyzing signals");
    let assessment = collaborators.analyst.assess(&sources).await?;
    if !assessment.verdict.is_yes() {
        info!("not a potential lead");
        return Ok(finish(RunOutcome::NotALead, Vec::new()));
    }

    let extracted = collaborators
        .analyst
        .extract_areas(&assessment.analysis, company)
        .await?;

    // --- Ledger ---
    // Held until the last commit so a concurrent run for the same company
    // sees this run's writes.
    let _guard = collaborators.ledger.lock(company).await;
    let reconciliation = collaborators.ledger.reconcile(company, &extracted).await;
    match reconciliation.outcome {
        ReconcileOutcome::NoCandidates => {
            return Ok(finish(RunOutcome::NoCandidates, Vec::new()));
        }
        ReconcileOutcome::AlreadyNotified => {
            return Ok(finish(RunOutcome::AlreadyNotified, Vec::new()));
        }
        ReconcileOutcome::NewCompany | ReconcileOutcome::NewAreas => {}
    }

    // --- Delivery ---
    let mut areas = Vec::with_capacity(reconciliation.novel.len());
    for area in reconciliation.novel.iter() {
        progress.phase(company, &format!("Processing {area}"));
        let status = process_area(
            area,
            &reconciliation,
            &sources,
            target,
            defaults,
            collaborators,
        )
        .await;
        areas.push(AreaResult {
            area: area.to_string(),
            status,
        });
    }

    Ok(finish(RunOutcome::Processed, areas))
}

/// First search hit for `query`, scraped. `None` if the search found nothing.
async fn find_and_scrape(
    collaborators: &Collaborators,
    query: &str,
) -> Result<Option<ScrapedPage>> {
    let Some(url) = collaborators.search.first_link(query).await? else {
        warn!(query, "search returned no result");
        return Ok(None);
    };
    info!(query, %url, "scraping search result");
    collaborators.scraper.scrape(&url).await.map(Some)
}

#[instrument(skip_all, fields(area = %area))]
async fn process_area(
    area: &str,
    reconciliation: &Reconciliation,
    sources: &SourceBundle,
    target: &CompanyTarget,
    defaults: &DefaultsConfig,
    collaborators: &Collaborators,
) -> AreaStatus {
    match deliver_area(area, sources, target, defaults, collaborators).await {
        Ok(false) => AreaStatus::NoEvidence,
        Err(e) => {
            error!(error = %e, "area not delivered");
            AreaStatus::NotDelivered {
                reason: e.to_string(),
            }
        }
        Ok(true) => {
            let Some(staged) = reconciliation.stage(&AreaSet::from_iter([area])) else {
                return AreaStatus::Delivered;
            };
            match collaborators.ledger.commit(&staged).await {
                Ok(_) => AreaStatus::Delivered,
                Err(e) => {
                    error!(error = %e, "delivered area could not be recorded");
                    AreaStatus::Unrecorded {
                        reason: e.to_string(),
                    }
                }
            }
        }
    }
}

/// Focused analysis, then email and CRM. `Ok(false)` if there is no evidence
/// for the area.
async fn deliver_area(
    area: &str,
    sources: &SourceBundle,
    target: &CompanyTarget,
    defaults: &DefaultsConfig,
    collaborators: &Collaborators,
) -> Result<bool> {
    let company = target.name.as_str();
    let assessment = collaborators.analyst.assess_area(area, sources).await?;
    if !assessment.verdict.is_yes() {
        info!("no evidence for area");
        return Ok(false);
    }

    let details = collaborators
        .analyst
        .area_details(&assessment.analysis, company)
        .await?;
    let report = analysis_report(company, area, &assessment.analysis);

    let message = MailMessage {
        to: target.recipients_or(defaults).to_vec(),
        subject: email_subject(company, area),
        html_body: email_body(company, area, &details),
        attachments: vec![report.clone(), sources_report(company, sources)],
    };
    collaborators.mailer.send(&message).await?;

    if let Some(crm) = &collaborators.crm {
        crm.submit(&LeadSubmission {
            areas: area.to_string(),
            lead_name: defaults.lead_name.clone(),
            account_name: target.account().to_string(),
            document: Some(report),
        })
        .await?;
    }
    Ok(true)
}
