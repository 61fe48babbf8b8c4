//! HTTP client construction and response helpers shared by the sources.

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use leadscout_shared::{LeadscoutError, Result};

/// User-Agent for API requests.
pub const USER_AGENT: &str = concat!("leadscout/", env!("CARGO_PKG_VERSION"));

/// User-Agent for pages that serve reduced markup to unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Build a client with the given User-Agent and per-request timeout.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(timeout)
        .build()
        .map_err(|e| LeadscoutError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send `request` and return the body, failing on transport errors and
/// non-2xx statuses. `what` names the target in error messages.
pub async fn send_text(request: RequestBuilder, what: &str) -> Result<String> {
    let response = request
        .send()
        .await
        .map_err(|e| LeadscoutError::Network(format!("{what}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LeadscoutError::Network(format!("{what}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| LeadscoutError::Network(format!("{what}: failed to read body: {e}")))
}

/// [`send_text`] followed by JSON decoding.
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
    let body = send_text(request, what).await?;
    serde_json::from_str(&body)
        .map_err(|e| LeadscoutError::parse(format!("{what}: unexpected response: {e}")))
}
