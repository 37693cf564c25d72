//! Remote generative-text classifier.
//!
//! Sends a `generateContent` request to the configured model endpoint and expects a
//! single label back. The whole exchange (request, status, body) is bounded by the
//! configured timeout.

use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::timeout;

use super::{parse_label, ClassifyError};
use crate::config::ClassifierConfig;
use crate::message::Urgency;

const PROMPT: &str = "You triage disaster-relief radio messages. \
Classify the urgency of the message below. \
Answer with exactly one word: HIGH, MEDIUM, or LOW.\n\nMessage: ";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

pub struct RemoteClassifier {
    endpoint: String,
    timeout_seconds: u64,
    client: reqwest::Client,
}

impl RemoteClassifier {
    pub fn new(cfg: &ClassifierConfig) -> Result<Self> {
        let separator = if cfg.api_url.contains('?') { '&' } else { '?' };
        let endpoint = format!(
            "{}{}key={}",
            cfg.api_url,
            separator,
            urlencoding::encode(&cfg.api_key)
        );
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| anyhow!("Failed to build classifier HTTP client: {}", e))?;
        Ok(Self {
            endpoint,
            timeout_seconds: cfg.timeout_seconds.max(1),
            client,
        })
    }

    /// One classification attempt. Errors are for the caller to turn into a fallback.
    pub async fn try_classify(&self, text: &str) -> Result<Urgency, ClassifyError> {
        let prompt = format!("{}{}", PROMPT, text);
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: &prompt }],
            }],
        };
        let call = async {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&body)
                .send()
                .await
                .map_err(|e| ClassifyError::Http(e.without_url().to_string()))?;

            if !response.status().is_success() {
                return Err(ClassifyError::Status(response.status().as_u16()));
            }

            response
                .json::<GenerateResponse>()
                .await
                .map_err(|e| ClassifyError::Malformed(e.without_url().to_string()))
        };

        let reply = timeout(Duration::from_secs(self.timeout_seconds), call)
            .await
            .map_err(|_| ClassifyError::Timeout(self.timeout_seconds))??;

        let answer = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ClassifyError::Malformed("no candidate text".into()))?;

        debug!("Remote classifier answered '{}'", answer.trim());
        parse_label(&answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_is_url_encoded_into_endpoint() {
        let cfg = ClassifierConfig {
            api_url: "http://localhost/gen".into(),
            api_key: "a b&c".into(),
            ..ClassifierConfig::default()
        };
        let c = RemoteClassifier::new(&cfg).unwrap();
        assert_eq!(c.endpoint, "http://localhost/gen?key=a%20b%26c");
    }

    #[test]
    fn request_body_has_generate_content_shape() {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: "hi" }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
    }
}
