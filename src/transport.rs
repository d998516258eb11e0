use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;

#[cfg(test)]
use mockall::automock;

use crate::config::GeminiConfig;
use crate::error::{ChatError, Result};
use crate::models::{ApiErrorBody, GenerateRequest, GenerateResponse};

/// One request, one response. No retries happen at this layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(&self, req: &GenerateRequest, api_key: &str) -> Result<GenerateResponse>;
}

pub struct GeminiTransport {
    client: Client,
    url: String,
}

impl GeminiTransport {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            client: Client::new(),
            url: format!(
                "{}/models/{}:generateContent",
                endpoint.trim_end_matches('/'),
                model
            ),
        }
    }

    pub fn from_config(cfg: &GeminiConfig) -> Self {
        Self::new(&cfg.endpoint, &cfg.model)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Build a `ServiceError` from a non-success status and whatever body came back.
fn service_error(status: StatusCode, body: &str) -> ChatError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));

    ChatError::Service {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, req: &GenerateRequest, api_key: &str) -> Result<GenerateResponse> {
        tracing::info!(
            url = %self.url,
            contents = req.contents.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(req)
            .send()
            .await
            // without_url keeps the credential out of the message
            .map_err(|e| {
                ChatError::Other(anyhow::anyhow!(
                    "Failed to reach generation service: {}",
                    e.without_url()
                ))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ChatError::MalformedResponse(format!(
                "failed to read response body: {}",
                e.without_url()
            ))
        })?;

        if !status.is_success() {
            let err = service_error(status, &body);
            tracing::warn!(status = status.as_u16(), error = %err, "Generation service returned an error");
            return Err(err);
        }

        serde_json::from_str::<GenerateResponse>(&body).map_err(|e| {
            ChatError::MalformedResponse(format!("failed to decode response body: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_built_from_endpoint_and_model() {
        let transport = GeminiTransport::new("https://example.test/v1beta/", "gemini-test");
        assert_eq!(
            transport.url(),
            "https://example.test/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn service_error_prefers_the_service_message() {
        let err = service_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"code":500,"message":"quota exceeded","status":"INTERNAL"}}"#,
        );
        match err {
            ChatError::Service { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected service error, got {other:?}"),
        }
    }

    #[test]
    fn service_error_falls_back_to_status_message() {
        for body in ["<html>Bad Gateway</html>", "", r#"{"error":{}}"#] {
            let err = service_error(StatusCode::BAD_GATEWAY, body);
            assert_eq!(
                err.to_string(),
                "Service error (502): Request failed with status 502"
            );
        }
    }
}
