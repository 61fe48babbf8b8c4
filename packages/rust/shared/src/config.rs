//! Application configuration for leadscout.
//!
//! User config lives at `~/.leadscout/leadscout.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file; each section names the environment
//! variable that holds them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadscoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadscout";

// ---------------------------------------------------------------------------
// Config structs (matching leadscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Lead ledger storage.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Web search API.
    #[serde(default)]
    pub search: SearchConfig,

    /// News sources.
    #[serde(default)]
    pub news: NewsConfig,

    /// Language model endpoint.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Mail delivery.
    #[serde(default)]
    pub mail: MailConfig,

    /// CRM ingestion endpoint.
    #[serde(default)]
    pub crm: CrmConfig,

    /// Business-area taxonomy the analysis scores against.
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,

    /// Target companies.
    #[serde(default)]
    pub companies: Vec<CompanyTarget>,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// How far back news searches reach, in days.
    #[serde(default = "default_news_window_days")]
    pub news_window_days: u32,

    /// Result pages to scrape from the news search tab.
    #[serde(default = "default_news_pages")]
    pub news_pages: u32,

    /// Timeout for outbound HTTP requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Companies processed in parallel by `run`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Report recipients used when a company has none of its own.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Lead title sent to the CRM.
    #[serde(default = "default_lead_name")]
    pub lead_name: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            news_window_days: default_news_window_days(),
            news_pages: default_news_pages(),
            request_timeout_secs: default_request_timeout(),
            concurrency: default_concurrency(),
            recipients: Vec::new(),
            lead_name: default_lead_name(),
        }
    }
}

fn default_news_window_days() -> u32 {
    30
}
fn default_news_pages() -> u32 {
    1
}
fn default_request_timeout() -> u64 {
    60
}
fn default_concurrency() -> usize {
    2
}
fn default_lead_name() -> String {
    "Lead from Lead Generator Tool".into()
}

/// Which ledger store to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    /// libSQL database, one row per company.
    Sqlite,
    /// CSV table rewritten on every commit.
    Table,
}

/// `[ledger]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Store implementation.
    #[serde(default = "default_backend")]
    pub backend: LedgerBackend,

    /// Database or table file path (`~` is expanded).
    #[serde(default = "default_ledger_path")]
    pub path: String,

    /// Upper bound for any single storage call, in seconds.
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_ledger_path(),
            timeout_secs: default_storage_timeout(),
        }
    }
}

impl LedgerConfig {
    /// The ledger path with `~` expanded.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        expand_home(&self.path)
    }
}

fn default_backend() -> LedgerBackend {
    LedgerBackend::Sqlite
}
fn default_ledger_path() -> String {
    "~/.leadscout/ledger.db".into()
}
fn default_storage_timeout() -> u64 {
    10
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Env var holding the search engine ID.
    #[serde(default = "default_search_cx_env")]
    pub cx_env: String,

    /// Custom Search JSON API endpoint.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            cx_env: default_search_cx_env(),
            endpoint: default_search_endpoint(),
        }
    }
}

fn default_search_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_search_cx_env() -> String {
    "GOOGLE_CX".into()
}
fn default_search_endpoint() -> String {
    "https://www.googleapis.com/customsearch/v1".into()
}

/// `[news]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// Env var holding the GNews API token.
    #[serde(default = "default_gnews_key_env")]
    pub gnews_api_key_env: String,

    /// GNews search endpoint.
    #[serde(default = "default_gnews_endpoint")]
    pub gnews_endpoint: String,

    /// Also scrape the search engine's news tab.
    #[serde(default = "default_true")]
    pub google_news: bool,

    /// News tab search endpoint.
    #[serde(default = "default_google_news_endpoint")]
    pub google_news_endpoint: String,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            gnews_api_key_env: default_gnews_key_env(),
            gnews_endpoint: default_gnews_endpoint(),
            google_news: true,
            google_news_endpoint: default_google_news_endpoint(),
        }
    }
}

fn default_gnews_key_env() -> String {
    "GNEWS_API_KEY".into()
}
fn default_gnews_endpoint() -> String {
    "https://gnews.io/api/v4/search".into()
}
fn default_google_news_endpoint() -> String {
    "https://www.google.com/search".into()
}
fn default_true() -> bool {
    true
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Env var holding the resource endpoint (e.g. `https://x.openai.azure.com`).
    #[serde(default = "default_llm_endpoint_env")]
    pub endpoint_env: String,

    /// Env var holding the API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Env var holding the deployment name.
    #[serde(default = "default_llm_deployment_env")]
    pub deployment_env: String,

    /// REST API version query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint_env: default_llm_endpoint_env(),
            api_key_env: default_llm_key_env(),
            deployment_env: default_llm_deployment_env(),
            api_version: default_api_version(),
        }
    }
}

fn default_llm_endpoint_env() -> String {
    "AZURE_OPENAI_ENDPOINT".into()
}
fn default_llm_key_env() -> String {
    "AZURE_OPENAI_API_KEY".into()
}
fn default_llm_deployment_env() -> String {
    "AZURE_OPENAI_DEPLOYMENT".into()
}
fn default_api_version() -> String {
    "2024-12-01-preview".into()
}

/// `[mail]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Env var holding the directory tenant ID.
    #[serde(default = "default_tenant_env")]
    pub tenant_id_env: String,

    /// Env var holding the application (client) ID.
    #[serde(default = "default_client_id_env")]
    pub client_id_env: String,

    /// Env var holding the client secret.
    #[serde(default = "default_client_secret_env")]
    pub client_secret_env: String,

    /// Mailbox the reports are sent from.
    #[serde(default)]
    pub sender: String,

    /// OAuth2 authority base URL.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Graph API base URL.
    #[serde(default = "default_graph_endpoint")]
    pub graph_endpoint: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            tenant_id_env: default_tenant_env(),
            client_id_env: default_client_id_env(),
            client_secret_env: default_client_secret_env(),
            sender: String::new(),
            authority: default_authority(),
            graph_endpoint: default_graph_endpoint(),
        }
    }
}

fn default_tenant_env() -> String {
    "TENANT_ID".into()
}
fn default_client_id_env() -> String {
    "CLIENT_ID".into()
}
fn default_client_secret_env() -> String {
    "CLIENT_SECRET".into()
}
fn default_authority() -> String {
    "https://login.microsoftonline.com".into()
}
fn default_graph_endpoint() -> String {
    "https://graph.microsoft.com/v1.0".into()
}

/// `[crm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmConfig {
    /// Env var holding the lead ingestion URL. Unset means CRM submission is off.
    #[serde(default = "default_crm_url_env")]
    pub url_env: String,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            url_env: default_crm_url_env(),
        }
    }
}

impl CrmConfig {
    /// The ingestion URL, if the env var is set and non-empty.
    pub fn url(&self) -> Option<String> {
        std::env::var(&self.url_env).ok().filter(|v| !v.is_empty())
    }
}

fn default_crm_url_env() -> String {
    "LEAD_API_URL".into()
}

/// `[taxonomy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    /// New business development areas.
    #[serde(default = "default_new_business")]
    pub new_business: Vec<String>,

    /// Large deal areas.
    #[serde(default = "default_large_deal")]
    pub large_deal: Vec<String>,
}

impl Default for TaxonomyConfig {
    fn default() -> Self {
        Self {
            new_business: default_new_business(),
            large_deal: default_large_deal(),
        }
    }
}

impl TaxonomyConfig {
    /// Every area label, new business first.
    pub fn all(&self) -> Vec<&str> {
        self.new_business
            .iter()
            .chain(self.large_deal.iter())
            .map(String::as_str)
            .collect()
    }
}

fn default_new_business() -> Vec<String> {
    ["SFR150", "Zones", "DYN365", "AI", "AWS"]
        .map(String::from)
        .to_vec()
}
fn default_large_deal() -> Vec<String> {
    [
        "Cost Takeout",
        "Cloud Migration",
        "Data Migration",
        "Platform Migration",
        "SaaS",
        "GCC",
        "Partner with IT",
    ]
    .map(String::from)
    .to_vec()
}

/// One `[[companies]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyTarget {
    /// Company name as searched and as keyed in the ledger (case-sensitive).
    pub name: String,

    /// Account name filed with the CRM (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,

    /// Cron expression for the external trigger. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Recipients for this company's reports (defaults to `[defaults].recipients`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

impl CompanyTarget {
    /// Target with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account_name: None,
            schedule: None,
            recipients: Vec::new(),
        }
    }

    /// CRM account name.
    pub fn account(&self) -> &str {
        self.account_name.as_deref().unwrap_or(&self.name)
    }

    /// Recipients for this company, falling back to the global list.
    pub fn recipients_or<'a>(&'a self, defaults: &'a DefaultsConfig) -> &'a [String] {
        if self.recipients.is_empty() {
            &defaults.recipients
        } else {
            &self.recipients
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadscoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadscout/leadscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| LeadscoutError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LeadscoutError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadscoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadscoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadscoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir()
                .ok_or_else(|| LeadscoutError::config("could not determine home directory"))?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Read a required environment variable named by the config.
pub fn env_value(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(LeadscoutError::config(format!(
            "{var_name} is not set. Export it before running leadscout."
        ))),
    }
}

/// Check that every credential a pipeline run needs is present.
///
/// The CRM URL is optional and therefore not checked here.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    let required = [
        &config.search.api_key_env,
        &config.search.cx_env,
        &config.news.gnews_api_key_env,
        &config.llm.endpoint_env,
        &config.llm.api_key_env,
        &config.llm.deployment_env,
        &config.mail.tenant_id_env,
        &config.mail.client_id_env,
        &config.mail.client_secret_env,
    ];
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| env_value(name).is_err())
        .map(|name| name.as_str())
        .collect();

    if !missing.is_empty() {
        return Err(LeadscoutError::config(format!(
            "missing environment variables: {}",
            missing.join(", ")
        )));
    }
    if config.mail.sender.is_empty() {
        return Err(LeadscoutError::config("[mail].sender is not configured"));
    }
    Ok(())
}
