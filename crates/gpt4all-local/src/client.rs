//! HTTP client for llama-server's native completion API.

use serde::{Deserialize, Serialize};

use crate::error::LocalModelError;
use crate::DEFAULT_PORT;

/// Client for communicating with llama-server.
#[derive(Clone)]
pub struct LlamaCppClient {
    client: reqwest::Client,
    base_url: String,
}

/// Raw-prompt completion request for `/completion`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub n_predict: i32,
    pub temperature: f32,
    /// Reuse the slot's KV cache for a shared prompt prefix.
    pub cache_prompt: bool,
    /// Slot to run on; `-1` lets the server pick.
    pub id_slot: i32,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            n_predict: i32::try_from(max_tokens).unwrap_or(i32::MAX),
            temperature,
            cache_prompt: true,
            id_slot: -1,
            stream: false,
        }
    }

    pub fn on_slot(mut self, slot: Option<i32>) -> Self {
        self.id_slot = slot.unwrap_or(-1);
        self
    }
}

/// Response body of `/completion`.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    #[serde(default)]
    pub id_slot: Option<i32>,
    #[serde(default)]
    pub tokens_predicted: Option<u32>,
}

/// Error body llama-server returns on failure.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl LlamaCppClient {
    /// Create a new client with default URL.
    pub fn new() -> Self {
        Self::with_port(DEFAULT_PORT)
    }

    /// Create a new client with a custom URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a new client with a custom port on localhost.
    pub fn with_port(port: u16) -> Self {
        Self::with_url(format!("http://127.0.0.1:{}", port))
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn connect_error(&self, e: reqwest::Error) -> LocalModelError {
        if e.is_connect() || e.is_timeout() {
            LocalModelError::ServerNotRunning(self.base_url.clone())
        } else {
            LocalModelError::Http(e)
        }
    }

    /// Check if the server is running and healthy.
    ///
    /// llama-server answers 503 while the weights are still loading.
    pub async fn check_health(&self) -> Result<(), LocalModelError> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(LocalModelError::ServerNotRunning(self.base_url.clone()))
        }
    }

    /// Run a completion on the server.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LocalModelError> {
        let url = format!("{}/completion", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LocalModelError::Api(format!("{}: {}", status, message)));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Drop the cached state of one slot.
    pub async fn erase_slot(&self, slot: i32) -> Result<(), LocalModelError> {
        let url = format!("{}/slots/{}?action=erase", self.base_url, slot);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.connect_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(LocalModelError::Api(format!("{}: {}", status, text)))
        }
    }
}

impl Default for LlamaCppClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubServer;

    #[test]
    fn test_default_url() {
        let client = LlamaCppClient::new();
        assert_eq!(client.base_url(), "http://127.0.0.1:11436");
    }

    #[test]
    fn test_custom_url() {
        let client = LlamaCppClient::with_url("http://192.168.1.100:8080");
        assert_eq!(client.base_url(), "http://192.168.1.100:8080");
    }

    #[test]
    fn test_request_body() {
        let request = CompletionRequest::new("User: hi", 500, 0.7).on_slot(Some(2));
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["prompt"], "User: hi");
        assert_eq!(body["n_predict"], 500);
        assert_eq!(body["id_slot"], 2);
        assert_eq!(body["cache_prompt"], true);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_response_body() {
        let response: CompletionResponse = serde_json::from_str(
            r#"{"content":" Olá! ","id_slot":0,"tokens_predicted":3,"stop":true}"#,
        )
        .unwrap();
        assert_eq!(response.content, " Olá! ");
        assert_eq!(response.id_slot, Some(0));
        assert_eq!(response.tokens_predicted, Some(3));
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Port 1 is reserved; nothing listens there.
        let client = LlamaCppClient::with_port(1);
        let err = client.check_health().await.unwrap_err();
        assert!(matches!(err, LocalModelError::ServerNotRunning(_)));
    }

    #[tokio::test]
    async fn test_complete_posts_request() {
        let stub = StubServer::start(|_| {
            (
                200,
                br#"{"content":" Selic ","id_slot":1,"tokens_predicted":2}"#.to_vec(),
            )
        })
        .await;
        let client = LlamaCppClient::with_url(stub.url());

        let response = client
            .complete(&CompletionRequest::new("User: taxa?", 64, 0.3))
            .await
            .unwrap();
        assert_eq!(response.content, " Selic ");
        assert_eq!(response.id_slot, Some(1));

        let requests = stub.requests();
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/completion");
        let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
        assert_eq!(body["prompt"], "User: taxa?");
        assert_eq!(body["n_predict"], 64);
        assert_eq!(body["id_slot"], -1);
    }

    #[tokio::test]
    async fn test_complete_maps_error_body() {
        let stub = StubServer::start(|_| {
            (
                500,
                br#"{"error":{"code":500,"message":"context full","type":"server_error"}}"#
                    .to_vec(),
            )
        })
        .await;
        let client = LlamaCppClient::with_url(stub.url());

        let err = client
            .complete(&CompletionRequest::new("x", 10, 0.7))
            .await
            .unwrap_err();
        match err {
            LocalModelError::Api(message) => {
                assert!(message.starts_with("500"), "{message}");
                assert!(message.ends_with(": context full"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_complete_rejects_malformed_body() {
        let stub = StubServer::start(|_| (200, br#"{"tokens_predicted":1}"#.to_vec())).await;
        let client = LlamaCppClient::with_url(stub.url());

        let err = client
            .complete(&CompletionRequest::new("x", 10, 0.7))
            .await
            .unwrap_err();
        assert!(matches!(err, LocalModelError::Json(_)));
    }

    #[tokio::test]
    async fn test_erase_slot_path() {
        let stub = StubServer::start(|_| (200, b"{}".to_vec())).await;
        let client = LlamaCppClient::with_url(stub.url());

        client.erase_slot(4).await.unwrap();
        assert_eq!(stub.requests()[0].path, "/slots/4?action=erase");
    }

    #[tokio::test]
    async fn test_health_while_loading() {
        let stub =
            StubServer::start(|_| (503, br#"{"error":{"message":"Loading model"}}"#.to_vec()))
                .await;
        let client = LlamaCppClient::with_url(stub.url());
        let err = client.check_health().await.unwrap_err();
        assert!(matches!(err, LocalModelError::ServerNotRunning(_)));
        assert_eq!(stub.requests()[0].path, "/health");
    }
}
