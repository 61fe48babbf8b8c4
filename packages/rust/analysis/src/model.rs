//! Chat-completion model access.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use leadscout_shared::{LeadscoutError, Result};

/// A model that answers a single user prompt.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Azure OpenAI chat-completions deployment.
pub struct AzureOpenAi {
    client: Client,
    endpoint: String,
    api_key: String,
    deployment: String,
    api_version: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl AzureOpenAi {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("leadscout/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LeadscoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            deployment: deployment.into(),
            api_version: api_version.into(),
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }
}

#[async_trait]
impl ChatModel for AzureOpenAi {
    fn name(&self) -> &str {
        &self.deployment
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        debug!(deployment = %self.deployment, prompt_chars = prompt.len(), "chat request");

        let response = self
            .client
            .post(self.url())
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadscoutError::Network(format!("chat completion: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(%status, body = %text, "chat completion failed");
            return Err(match status.as_u16() {
                401 | 403 => LeadscoutError::Analysis(format!("authentication failed: {status}")),
                429 => LeadscoutError::Analysis("rate limited".into()),
                _ => LeadscoutError::Analysis(format!("HTTP {status}: {text}")),
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| LeadscoutError::parse(format!("chat completion response: {e}")))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| LeadscoutError::Analysis("model returned no content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn model(server: &MockServer) -> AzureOpenAi {
        AzureOpenAi::new(
            format!("{}/", server.uri()),
            "key-1",
            "gpt-4o",
            "2024-12-01-preview",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn complete_posts_prompt_and_reads_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/openai/deployments/gpt-4o/chat/completions"))
            .and(query_param("api-version", "2024-12-01-preview"))
            .and(header("api-key", "key-1"))
            .and(body_partial_json(serde_json::json!({
                "messages": [{ "role": "user", "content": "Is it?" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "  Yes \n" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(model(&server).complete("Is it?").await.unwrap(), "Yes");
    }

    #[tokio::test]
    async fn auth_failure_is_analysis_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = model(&server).complete("x").await.unwrap_err();
        assert!(matches!(err, LeadscoutError::Analysis(_)));
        assert!(err.to_string().contains("authentication"));
    }

    #[tokio::test]
    async fn empty_choices_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        assert!(model(&server).complete("x").await.is_err());
    }
}
