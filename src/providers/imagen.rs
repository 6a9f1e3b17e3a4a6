//! Imagen image generation client
//!
//! Calls the Generative Language `:predict` endpoint and returns the first
//! prediction's bytes.
//!
//! API Docs: https://ai.google.dev/api/generate-images

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::ProviderSettings;
use crate::providers::http_client::RateLimitedClient;
use crate::providers::traits::{
    classify_upstream, GeneratedImage, ImageProvider, ImageRequest, ProviderError, ProviderResult,
};

const DEFAULT_MIME_TYPE: &str = "image/png";

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters<'a>,
}

#[derive(Debug, Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// Pull a readable message out of an upstream error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.status.is_empty() => {
            format!("{} ({})", envelope.error.message, envelope.error.status)
        }
        Ok(envelope) => envelope.error.message,
        Err(_) => body.chars().take(500).collect(),
    }
}

/// Imagen provider
pub struct ImagenProvider {
    client: RateLimitedClient,
    api_key: String,
    base_url: String,
    model: String,
}

impl ImagenProvider {
    pub fn new(settings: &ProviderSettings) -> ProviderResult<Self> {
        let client = RateLimitedClient::new(
            settings.requests_per_minute,
            Duration::from_secs(settings.timeout_secs.max(1)),
        )?;

        Ok(ImagenProvider {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }

    fn predict_url(&self) -> String {
        format!("{}/models/{}:predict", self.base_url, self.model)
    }
}

#[async_trait]
impl ImageProvider for ImagenProvider {
    fn code(&self) -> &'static str {
        "imagen"
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &ImageRequest) -> ProviderResult<GeneratedImage> {
        if !self.is_configured() {
            return Err(ProviderError::NotConfigured);
        }

        let prompt = request.upstream_prompt();
        let body = PredictRequest {
            instances: [PredictInstance { prompt: &prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: request.size.aspect_ratio(),
            },
        };

        debug!(model = %self.model, size = %request.size, "Imagen predict request");

        let response = self
            .client
            .post(&self.predict_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            warn!(status = status.as_u16(), message = %message, "Imagen request failed");
            return Err(classify_upstream(status.as_u16(), &message));
        }

        let parsed: PredictResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Failed(format!("unreadable response: {}", e)))?;

        let prediction = parsed
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Failed("no images returned".to_string()))?;

        let encoded = prediction
            .bytes_base64_encoded
            .ok_or_else(|| ProviderError::Failed("no image data returned".to_string()))?;

        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| ProviderError::Failed(format!("invalid image payload: {}", e)))?;

        info!(bytes = bytes.len(), "Imagen returned an image");

        Ok(GeneratedImage {
            bytes: Bytes::from(bytes),
            mime_type: prediction
                .mime_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PREDICT_PATH: &str = "/models/imagen-test:predict";

    fn provider(server: &MockServer, api_key: &str) -> ImagenProvider {
        ImagenProvider::new(&ProviderSettings {
            api_key: api_key.to_string(),
            base_url: server.uri(),
            model: "imagen-test".to_string(),
            requests_per_minute: 600,
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn request() -> ImageRequest {
        ImageRequest::new("a lighthouse at dusk", Some("1408x768"), Some("artistic")).unwrap()
    }

    async fn failing_with(status: u16, body: serde_json::Value) -> ProviderError {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PREDICT_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        provider(&server, "k").generate(&request()).await.unwrap_err()
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(PREDICT_PATH))
            .and(header("x-goog-api-key", "secret-key"))
            .and(body_partial_json(json!({
                "instances": [{"prompt": "artistic style: a lighthouse at dusk"}],
                "parameters": {"sampleCount": 1, "aspectRatio": "16:9"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{
                    "bytesBase64Encoded": STANDARD.encode(b"png-bytes"),
                    "mimeType": "image/png"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let image = provider(&server, "secret-key").generate(&request()).await.unwrap();
        assert_eq!(image.bytes.as_ref(), b"png-bytes");
        assert_eq!(image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_missing_api_key_skips_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = provider(&server, "").generate(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured));
    }

    #[tokio::test]
    async fn test_upstream_rate_limit() {
        let err = failing_with(429, json!({"error": {"message": "slow down"}})).await;
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn test_quota_message_on_bad_request() {
        let err = failing_with(
            400,
            json!({"error": {"message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}),
        )
        .await;
        assert!(matches!(err, ProviderError::RateLimited));

        let err = failing_with(
            400,
            json!({"error": {"message": "Too many requests", "status": "RESOURCE_EXHAUSTED"}}),
        )
        .await;
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn test_bad_request() {
        let err = failing_with(
            400,
            json!({"error": {"message": "Prompt was blocked", "status": "INVALID_ARGUMENT"}}),
        )
        .await;
        match err {
            ProviderError::InvalidRequest(message) => assert!(message.contains("Prompt was blocked")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_server_error() {
        let err = failing_with(503, json!({"error": {"message": "overloaded"}})).await;
        assert!(matches!(err, ProviderError::Unavailable));
    }

    #[tokio::test]
    async fn test_empty_predictions() {
        let err = failing_with(200, json!({"predictions": []})).await;
        assert!(matches!(err, ProviderError::Failed(_)));

        let err = failing_with(200, json!({})).await;
        assert!(matches!(err, ProviderError::Failed(_)));
    }

    #[tokio::test]
    async fn test_undecodable_payload() {
        let err = failing_with(
            200,
            json!({"predictions": [{"bytesBase64Encoded": "***not base64***"}]}),
        )
        .await;
        assert!(matches!(err, ProviderError::Failed(_)));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error":{"message":"bad","status":"INVALID_ARGUMENT"}}"#),
            "bad (INVALID_ARGUMENT)"
        );
        assert_eq!(error_message(r#"{"error":{"message":"bad"}}"#), "bad");
        assert_eq!(error_message("plain text"), "plain text");
    }
}
