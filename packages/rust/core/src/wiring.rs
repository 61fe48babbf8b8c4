//! Production collaborators built from configuration and environment.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use leadscout_analysis::{AzureOpenAi, LeadAnalyst};
use leadscout_ledger::open_ledger;
use leadscout_notify::{CrmClient, GraphCredentials, GraphMailer, LeadSink};
use leadscout_shared::{AppConfig, Result, env_value, validate_credentials};
use leadscout_sources::{GNews, GoogleNews, GoogleSearch, HttpScraper, NewsSource};

use crate::pipeline::Collaborators;

/// Build every client a run needs. Fails if a required credential is missing.
pub async fn build_collaborators(config: &AppConfig) -> Result<Collaborators> {
    validate_credentials(config)?;
    let timeout = Duration::from_secs(config.defaults.request_timeout_secs);

    let mut news: Vec<Arc<dyn NewsSource>> = vec![Arc::new(GNews::new(
        &config.news.gnews_endpoint,
        env_value(&config.news.gnews_api_key_env)?,
        config.defaults.news_window_days,
        timeout,
    )?)];
    if config.news.google_news {
        news.push(Arc::new(GoogleNews::new(
            &config.news.google_news_endpoint,
            config.defaults.news_pages,
            timeout,
        )?));
    }

    let search = Arc::new(GoogleSearch::new(
        &config.search.endpoint,
        env_value(&config.search.api_key_env)?,
        env_value(&config.search.cx_env)?,
        timeout,
    )?);

    let model = Arc::new(AzureOpenAi::new(
        env_value(&config.llm.endpoint_env)?,
        env_value(&config.llm.api_key_env)?,
        env_value(&config.llm.deployment_env)?,
        &config.llm.api_version,
        timeout,
    )?);

    let mailer = Arc::new(GraphMailer::new(
        &config.mail.authority,
        &config.mail.graph_endpoint,
        GraphCredentials {
            tenant_id: env_value(&config.mail.tenant_id_env)?,
            client_id: env_value(&config.mail.client_id_env)?,
            client_secret: env_value(&config.mail.client_secret_env)?,
        },
        &config.mail.sender,
        timeout,
    )?);

    let crm: Option<Arc<dyn LeadSink>> = match config.crm.url() {
        Some(url) => Some(Arc::new(CrmClient::new(url)?)),
        None => {
            info!(var = %config.crm.url_env, "CRM endpoint not set, submissions disabled");
            None
        }
    };

    let ledger = open_ledger(&config.ledger).await?;
    info!(
        store = ledger.store_name(),
        news_sources = news.len(),
        crm = crm.is_some(),
        "collaborators ready"
    );

    Ok(Collaborators {
        news,
        search,
        scraper: Arc::new(HttpScraper::new(timeout)?),
        analyst: Arc::new(LeadAnalyst::new(model, config.taxonomy.clone())),
        mailer,
        crm,
        ledger: Arc::new(ledger),
    })
}
