//! Social link extraction through a cobalt-compatible API

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::errors::ExtractionError;
use crate::resolver::fetcher::describe_transport_error;

#[derive(Debug, Deserialize)]
struct PickerEntry {
    url: Option<String>,
}

/// Loose view of every response shape the API is known to produce
#[derive(Debug, Deserialize)]
struct ExtractorResponse {
    status: Option<String>,
    url: Option<String>,
    picker: Option<Vec<PickerEntry>>,
    text: Option<String>,
}

/// Resolves social/video page links to direct media URLs
pub struct SocialExtractor {
    client: reqwest::Client,
    endpoint: String,
}

impl SocialExtractor {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Ask the API for a direct media URL behind `url`
    pub async fn extract(&self, url: &str) -> Result<String, ExtractionError> {
        debug!(%url, endpoint = %self.endpoint, "Requesting extraction");

        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| ExtractionError::Network(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "Extraction API returned an error status");
            return Err(ExtractionError::Status(status.as_u16()));
        }

        let body: ExtractorResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

        interpret(body)
    }
}

fn interpret(body: ExtractorResponse) -> Result<String, ExtractionError> {
    match body.status.as_deref() {
        Some("stream") | Some("redirect") => body
            .url
            .filter(|u| !u.is_empty())
            .ok_or(ExtractionError::NoMediaUrl),
        Some("picker") => body
            .picker
            .and_then(|entries| entries.into_iter().next())
            .and_then(|entry| entry.url)
            .filter(|u| !u.is_empty())
            .ok_or(ExtractionError::NoMediaUrl),
        Some("error") => Err(ExtractionError::Rejected(
            body.text
                .unwrap_or_else(|| "no video found for this link".to_string()),
        )),
        _ => Err(ExtractionError::NoMediaUrl),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<String, ExtractionError> {
        interpret(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_stream_and_redirect_shapes() {
        assert_eq!(
            parse(r#"{"status":"stream","url":"https://media.example/v.mp4"}"#).unwrap(),
            "https://media.example/v.mp4"
        );
        assert_eq!(
            parse(r#"{"status":"redirect","url":"https://media.example/r.mp4"}"#).unwrap(),
            "https://media.example/r.mp4"
        );
    }

    #[test]
    fn test_picker_uses_first_entry() {
        let json = r#"{"status":"picker","picker":[{"url":"https://a/1.mp4"},{"url":"https://a/2.mp4"}]}"#;
        assert_eq!(parse(json).unwrap(), "https://a/1.mp4");
        assert_eq!(
            parse(r#"{"status":"picker","picker":[]}"#).unwrap_err(),
            ExtractionError::NoMediaUrl
        );
    }

    #[test]
    fn test_error_shape_carries_text() {
        assert_eq!(
            parse(r#"{"status":"error","text":"unsupported platform"}"#).unwrap_err(),
            ExtractionError::Rejected("unsupported platform".to_string())
        );
    }

    #[test]
    fn test_unknown_shapes_fail() {
        assert!(parse(r#"{"status":"rate-limit"}"#).is_err());
        assert!(parse(r#"{}"#).is_err());
        assert!(parse(r#"{"status":"stream"}"#).is_err());
    }
}
