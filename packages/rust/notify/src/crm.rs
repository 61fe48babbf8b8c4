//! Lead submission to the CRM ingestion endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use tracing::{error, info, instrument};

use leadscout_shared::{LeadscoutError, Result};

use crate::report::Attachment;

/// The ingestion endpoint is slow; give it a full minute.
const CRM_TIMEOUT: Duration = Duration::from_secs(60);

/// One lead as filed with the CRM.
#[derive(Debug, Clone, Serialize)]
pub struct LeadSubmission {
    #[serde(rename = "new_leadidentificationarea")]
    pub areas: String,
    #[serde(rename = "new_name")]
    pub lead_name: String,
    #[serde(rename = "new_accountname")]
    pub account_name: String,
    #[serde(skip)]
    pub document: Option<Attachment>,
}

#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn submit(&self, lead: &LeadSubmission) -> Result<()>;
}

pub struct CrmClient {
    client: Client,
    url: String,
}

impl CrmClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("leadscout/", env!("CARGO_PKG_VERSION")))
            .timeout(CRM_TIMEOUT)
            .build()
            .map_err(|e| LeadscoutError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn form(lead: &LeadSubmission, document: &Attachment) -> Result<Form> {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.name.clone())
            .mime_str(&document.content_type)
            .map_err(|e| LeadscoutError::validation(format!("attachment content type: {e}")))?;
        Ok(Form::new()
            .text("new_leadidentificationarea", lead.areas.clone())
            .text("new_name", lead.lead_name.clone())
            .text("new_accountname", lead.account_name.clone())
            .part("new_supportingdocuments", part))
    }
}

#[async_trait]
impl LeadSink for CrmClient {
    /// Multipart with the supporting document when there is one, JSON otherwise.
    #[instrument(skip_all, fields(account = %lead.account_name, areas = %lead.areas))]
    async fn submit(&self, lead: &LeadSubmission) -> Result<()> {
        let request = self.client.post(&self.url);
        let request = match &lead.document {
            Some(document) => request.multipart(Self::form(lead, document)?),
            None => request.json(lead),
        };

        let response = request
            .send()
            .await
            .map_err(|e| LeadscoutError::Network(format!("CRM submission: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %body, "CRM rejected lead");
            return Err(LeadscoutError::Notification(format!(
                "CRM returned HTTP {status}"
            )));
        }
        info!("lead submitted to CRM");
        Ok(())
    }
}
