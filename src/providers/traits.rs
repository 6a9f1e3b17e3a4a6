//! Image provider contract
//!
//! The gateway treats image generation as an external collaborator. Each
//! backend implements [`ImageProvider`] and reports failures as
//! [`ProviderError`], which the HTTP layer maps to status codes.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Longest prompt accepted, in characters
pub const MAX_PROMPT_CHARS: usize = 2000;

// ============================================================================
// Error Types
// ============================================================================

/// Provider error types
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Image generation service not configured")]
    NotConfigured,

    #[error("Upstream rate limit reached")]
    RateLimited,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image service temporarily unavailable")]
    Unavailable,

    #[error("Image generation failed: {0}")]
    Failed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Failed(err.to_string())
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Translate an upstream error status and message
pub fn classify_upstream(status: u16, message: &str) -> ProviderError {
    let lowered = message.to_lowercase();
    let quota = lowered.contains("quota")
        || lowered.contains("resource exhausted")
        || lowered.contains("resource_exhausted");

    match status {
        429 => ProviderError::RateLimited,
        400 if quota => ProviderError::RateLimited,
        400..=499 => ProviderError::InvalidRequest(message.to_string()),
        500..=599 => ProviderError::Unavailable,
        _ => ProviderError::Failed(format!("unexpected status {}: {}", status, message)),
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Output sizes the upstream model supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1280x896")]
    Landscape,
    #[serde(rename = "896x1280")]
    Portrait,
    #[serde(rename = "1408x768")]
    Wide,
    #[serde(rename = "768x1408")]
    Tall,
}

impl ImageSize {
    pub const ALL: [ImageSize; 5] = [
        ImageSize::Square,
        ImageSize::Landscape,
        ImageSize::Portrait,
        ImageSize::Wide,
        ImageSize::Tall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSize::Square => "1024x1024",
            ImageSize::Landscape => "1280x896",
            ImageSize::Portrait => "896x1280",
            ImageSize::Wide => "1408x768",
            ImageSize::Tall => "768x1408",
        }
    }

    /// Aspect ratio understood by the upstream API
    pub fn aspect_ratio(&self) -> &'static str {
        match self {
            ImageSize::Square => "1:1",
            ImageSize::Landscape => "4:3",
            ImageSize::Portrait => "3:4",
            ImageSize::Wide => "16:9",
            ImageSize::Tall => "9:16",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageSize::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| {
                let allowed: Vec<&str> = ImageSize::ALL.iter().map(|s| s.as_str()).collect();
                format!("size must be one of {}", allowed.join(", "))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Natural,
    Artistic,
}

impl FromStr for ImageStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "natural" => Ok(ImageStyle::Natural),
            "artistic" => Ok(ImageStyle::Artistic),
            _ => Err("style must be one of natural, artistic".to_string()),
        }
    }
}

/// A validated generation request
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub prompt: String,
    pub size: ImageSize,
    pub style: ImageStyle,
}

impl ImageRequest {
    /// Validate raw input before any upstream call
    pub fn new(prompt: &str, size: Option<&str>, style: Option<&str>) -> Result<Self, String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err("prompt must not be empty".to_string());
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(format!("prompt must be at most {} characters", MAX_PROMPT_CHARS));
        }

        Ok(ImageRequest {
            prompt: prompt.to_string(),
            size: size.map(str::parse::<ImageSize>).transpose()?.unwrap_or_default(),
            style: style.map(str::parse::<ImageStyle>).transpose()?.unwrap_or_default(),
        })
    }

    /// Prompt as sent upstream, with the style applied
    pub fn upstream_prompt(&self) -> String {
        match self.style {
            ImageStyle::Natural => self.prompt.clone(),
            ImageStyle::Artistic => format!("artistic style: {}", self.prompt),
        }
    }
}

/// Raw image returned by a provider
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub mime_type: String,
}

// ============================================================================
// Provider Trait
// ============================================================================

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider code (e.g., "imagen")
    fn code(&self) -> &'static str;

    /// Whether credentials are present
    fn is_configured(&self) -> bool;

    async fn generate(&self, request: &ImageRequest) -> ProviderResult<GeneratedImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = ImageRequest::new("a red bicycle", None, None).unwrap();
        assert_eq!(request.size, ImageSize::Square);
        assert_eq!(request.style, ImageStyle::Natural);
        assert_eq!(request.upstream_prompt(), "a red bicycle");
    }

    #[test]
    fn test_artistic_prefix() {
        let request = ImageRequest::new("a cat", Some("896x1280"), Some("artistic")).unwrap();
        assert_eq!(request.size, ImageSize::Portrait);
        assert_eq!(request.upstream_prompt(), "artistic style: a cat");
    }

    #[test]
    fn test_request_validation() {
        assert!(ImageRequest::new("   ", None, None).is_err());
        assert!(ImageRequest::new(&"x".repeat(MAX_PROMPT_CHARS + 1), None, None).is_err());
        assert!(ImageRequest::new(&"x".repeat(MAX_PROMPT_CHARS), None, None).is_ok());
        assert!(ImageRequest::new("ok", Some("512x512"), None).is_err());
        assert!(ImageRequest::new("ok", None, Some("cartoon")).is_err());
    }

    #[test]
    fn test_every_size_round_trips() {
        for size in ImageSize::ALL {
            assert_eq!(size.as_str().parse::<ImageSize>().unwrap(), size);
            assert_eq!(
                serde_json::to_string(&size).unwrap(),
                format!("\"{}\"", size.as_str())
            );
        }
    }

    #[test]
    fn test_classify_upstream() {
        assert!(matches!(classify_upstream(429, ""), ProviderError::RateLimited));
        assert!(matches!(
            classify_upstream(400, "Quota exceeded for requests"),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            classify_upstream(400, "Too many requests (RESOURCE_EXHAUSTED)"),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            classify_upstream(400, "prompt blocked"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(classify_upstream(403, "denied"), ProviderError::InvalidRequest(_)));
        assert!(matches!(classify_upstream(503, "overloaded"), ProviderError::Unavailable));
        assert!(matches!(classify_upstream(302, "moved"), ProviderError::Failed(_)));
    }
}
