//! Report delivery by email through the Graph API.
//!
//! Authentication uses the OAuth2 client-credentials grant; the token is
//! cached until shortly before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

use leadscout_shared::{LeadscoutError, Result};

use crate::report::Attachment;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Tokens are refreshed this long before they expire.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachments: Vec<Attachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Application credentials for the client-credentials grant.
#[derive(Debug, Clone)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

pub struct GraphMailer {
    client: Client,
    authority: String,
    graph_endpoint: String,
    credentials: GraphCredentials,
    sender: String,
    token: Mutex<Option<CachedToken>>,
}

impl GraphMailer {
    pub fn new(
        authority: impl Into<String>,
        graph_endpoint: impl Into<String>,
        credentials: GraphCredentials,
        sender: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("leadscout/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LeadscoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            authority: authority.into().trim_end_matches('/').to_string(),
            graph_endpoint: graph_endpoint.into().trim_end_matches('/').to_string(),
            credentials,
            sender: sender.into(),
            token: Mutex::new(None),
        })
    }

    /// A valid access token, fetching a new one if the cached one is stale.
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority, self.credentials.tenant_id
        );
        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| LeadscoutError::Network(format!("token request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LeadscoutError::Notification(format!(
                "token request failed: HTTP {status}: {body}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LeadscoutError::parse(format!("token response: {e}")))?;

        debug!(expires_in = token.expires_in, "access token acquired");
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_SLACK);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

fn message_json(message: &MailMessage) -> serde_json::Value {
    let recipients: Vec<_> = message
        .to
        .iter()
        .map(|address| json!({ "emailAddress": { "address": address } }))
        .collect();
    let attachments: Vec<_> = message
        .attachments
        .iter()
        .map(|a| {
            json!({
                "@odata.type": "#microsoft.graph.fileAttachment",
                "name": a.name,
                "contentType": a.content_type,
                "contentBytes": STANDARD.encode(&a.bytes),
            })
        })
        .collect();

    json!({
        "message": {
            "subject": message.subject,
            "body": { "contentType": "HTML", "content": message.html_body },
            "toRecipients": recipients,
            "attachments": attachments,
        },
        "saveToSentItems": true,
    })
}

#[async_trait]
impl Mailer for GraphMailer {
    #[instrument(skip_all, fields(subject = %message.subject, recipients = message.to.len()))]
    async fn send(&self, message: &MailMessage) -> Result<()> {
        if message.to.is_empty() {
            return Err(LeadscoutError::validation("email has no recipients"));
        }
        let token = self.access_token().await?;

        let url = format!("{}/users/{}/sendMail", self.graph_endpoint, self.sender);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&message_json(message))
            .send()
            .await
            .map_err(|e| LeadscoutError::Network(format!("sendMail: {e}")))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "sendMail rejected");
            return Err(LeadscoutError::Notification(format!(
                "sendMail returned HTTP {status}"
            )));
        }
        info!("email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mailer(server: &MockServer) -> GraphMailer {
        GraphMailer::new(
            server.uri(),
            format!("{}/v1.0", server.uri()),
            GraphCredentials {
                tenant_id: "tenant".into(),
                client_id: "app".into(),
                client_secret: "secret".into(),
            },
            "leads@example.com",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn message() -> MailMessage {
        MailMessage {
            to: vec!["sales@example.com".into()],
            subject: "New Lead: Acme - AI".into(),
            html_body: "<p>hi</p>".into(),
            attachments: vec![Attachment::markdown("Acme_lead_analysis.md", "hello".into())],
        }
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3599,
                "access_token": "tok-1"
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn send_posts_message_with_attachment() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/v1.0/users/leads@example.com/sendMail"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_partial_json(serde_json::json!({
                "message": {
                    "subject": "New Lead: Acme - AI",
                    "toRecipients": [{ "emailAddress": { "address": "sales@example.com" } }],
                    "attachments": [{ "name": "Acme_lead_analysis.md", "contentBytes": "aGVsbG8=" }]
                }
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(2)
            .mount(&server)
            .await;

        let mailer = mailer(&server);
        mailer.send(&message()).await.expect("first send");
        // Second send reuses the cached token.
        mailer.send(&message()).await.expect("second send");
    }

    #[tokio::test]
    async fn non_accepted_status_is_failure() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;
        Mock::given(method("POST"))
            .and(path("/v1.0/users/leads@example.com/sendMail"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = mailer(&server).send(&message()).await.unwrap_err();
        assert!(matches!(err, LeadscoutError::Notification(_)));
    }

    #[tokio::test]
    async fn token_failure_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        assert!(mailer(&server).send(&message()).await.is_err());
    }

    #[tokio::test]
    async fn empty_recipients_rejected_without_requests() {
        let server = MockServer::start().await;
        let mut msg = message();
        msg.to.clear();
        assert!(mailer(&server).send(&msg).await.is_err());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
