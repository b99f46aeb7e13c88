//! Request and response bodies.

use axum::extract::{FromRequest, Request};
use axum::{async_trait, Json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ApiError;
use gpt4all_local::prompt::DEFAULT_SYSTEM_PROMPT;

pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

fn default_system_prompt() -> Option<String> {
    Some(DEFAULT_SYSTEM_PROMPT.to_string())
}

fn default_max_tokens() -> Option<u32> {
    Some(DEFAULT_MAX_TOKENS)
}

fn default_temperature() -> Option<f64> {
    Some(DEFAULT_TEMPERATURE)
}

/// Body of `POST /chat`.
///
/// An absent `system_prompt` gets the default persona; an explicit `null`
/// sends the message without a system prompt. `null` for `max_tokens` or
/// `temperature` falls back to the defaults.
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
    #[serde(default = "default_max_tokens")]
    #[validate(range(min = 50, max = 2000, message = "max_tokens must be between 50 and 2000"))]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_temperature")]
    #[validate(range(min = 0.0, max = 1.0, message = "temperature must be between 0.0 and 1.0"))]
    pub temperature: Option<f64>,
}

impl ChatRequest {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or("")
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE) as f32
    }
}

/// Body of a successful `POST /chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub processing_time_ms: f64,
    pub model_name: String,
}

/// Body of `GET /`.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub chat: &'static str,
    pub health: &'static str,
}

/// JSON extractor that also runs [`Validate`].
///
/// Both deserialization and validation failures become
/// [`ApiError::InvalidRequest`].
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::InvalidRequest(rejection.body_text()))?;
        value
            .validate()
            .map_err(|errors| ApiError::InvalidRequest(errors.to_string()))?;
        Ok(ValidatedJson(value))
    }
}

/// Round to two decimals.
pub fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ChatRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let request = parse(r#"{"message": "Qual é a diferença entre CDB e Tesouro Direto?"}"#);
        assert!(request.validate().is_ok());
        assert_eq!(request.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.max_tokens(), 500);
        assert_eq!(request.temperature(), 0.7);
    }

    #[test]
    fn test_explicit_null_system_prompt() {
        let request = parse(r#"{"message": "oi", "system_prompt": null, "max_tokens": null}"#);
        assert_eq!(request.system_prompt(), "");
        assert_eq!(request.max_tokens(), 500);
    }

    #[test]
    fn test_zero_temperature_is_kept() {
        let request = parse(r#"{"message": "oi", "temperature": 0.0}"#);
        assert!(request.validate().is_ok());
        assert_eq!(request.temperature(), 0.0);
    }

    #[test]
    fn test_bounds_inclusive() {
        assert!(parse(r#"{"message": "a", "max_tokens": 50, "temperature": 1.0}"#)
            .validate()
            .is_ok());
        assert!(parse(r#"{"message": "a", "max_tokens": 2000}"#)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(parse(r#"{"message": ""}"#).validate().is_err());
        assert!(parse(r#"{"message": "a", "max_tokens": 49}"#)
            .validate()
            .is_err());
        assert!(parse(r#"{"message": "a", "max_tokens": 2001}"#)
            .validate()
            .is_err());
        assert!(parse(r#"{"message": "a", "temperature": 1.01}"#)
            .validate()
            .is_err());
        assert!(parse(r#"{"message": "a", "temperature": -0.1}"#)
            .validate()
            .is_err());
    }

    #[test]
    fn test_round_ms() {
        assert_eq!(round_ms(12.3456), 12.35);
        assert_eq!(round_ms(0.0), 0.0);
    }
}
