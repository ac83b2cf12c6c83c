use crate::config::Config;
use crate::retry::{with_retry_policy, RetryConfig, RetryDecision};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// DeepL translate request body (JSON variant of /v2/translate)
#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formality: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// Character usage for the current billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub character_count: u64,
    pub character_limit: u64,
}

impl Usage {
    pub fn remaining(&self) -> u64 {
        self.character_limit.saturating_sub(self.character_count)
    }
}

/// DeepL's non-standard status for an exhausted character quota
const STATUS_QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug, thiserror::Error)]
pub enum DeepLError {
    #[error("DeepL API rate limit hit (429)")]
    RateLimited { retry_after: Option<Duration> },

    #[error("DeepL character quota exceeded (456)")]
    QuotaExceeded,

    #[error("DeepL API rejected the key ({status}): check deepl_api_key and the endpoint")]
    Unauthorized { status: u16 },

    #[error("DeepL API server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("DeepL API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to reach DeepL API: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid DeepL response: {0}")]
    InvalidResponse(String),

    #[error("DeepL returned {got} translations for {expected} texts")]
    CountMismatch { expected: usize, got: usize },
}

impl DeepLError {
    /// Map a non-success response to an error.
    fn from_status(status: StatusCode, retry_after: Option<Duration>, body: String) -> Self {
        match status.as_u16() {
            429 => DeepLError::RateLimited { retry_after },
            STATUS_QUOTA_EXCEEDED => DeepLError::QuotaExceeded,
            401 | 403 => DeepLError::Unauthorized {
                status: status.as_u16(),
            },
            s if status.is_server_error() => DeepLError::Server { status: s, body },
            s => DeepLError::Api { status: s, body },
        }
    }

    /// Rate limits, 5xx and transport failures are transient; everything else is final.
    pub fn retry_decision(&self) -> RetryDecision {
        match self {
            DeepLError::RateLimited {
                retry_after: Some(wait),
            } => RetryDecision::RetryAfter(*wait),
            DeepLError::RateLimited { retry_after: None } => RetryDecision::Retry,
            DeepLError::Server { .. } => RetryDecision::Retry,
            DeepLError::Network(_) => RetryDecision::Retry,
            // Truncated bodies from proxies; the next attempt usually parses
            DeepLError::InvalidResponse(_) => RetryDecision::Retry,
            DeepLError::QuotaExceeded
            | DeepLError::Unauthorized { .. }
            | DeepLError::Api { .. }
            | DeepLError::CountMismatch { .. } => RetryDecision::Fail,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.retry_decision() != RetryDecision::Fail
    }
}

/// Parse a Retry-After header given in seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[derive(Debug, Clone)]
pub struct DeepLClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    source_lang: String,
    target_lang: String,
    model_type: Option<String>,
    formality: Option<String>,
    glossary_id: Option<String>,
}

impl DeepLClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_base_url(),
            api_key: config.deepl_api_key.clone(),
            source_lang: config.source_language.clone(),
            target_lang: config.target_language.clone(),
            model_type: config.model_type.clone(),
            formality: config.formality.clone(),
            glossary_id: config.glossary_id.clone(),
        })
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }

    /// Translate a batch of texts with a single request.
    ///
    /// The result holds one translation per input, in input order.
    pub async fn translate(&self, texts: &[String]) -> Result<Vec<String>, DeepLError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = TranslateRequest {
            text: texts,
            source_lang: &self.source_lang,
            target_lang: &self.target_lang,
            model_type: self.model_type.as_deref(),
            formality: self.formality.as_deref(),
            glossary_id: self.glossary_id.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/v2/translate", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(DeepLError::from_status(status, retry_after, body));
        }

        let body = response.text().await?;
        let parsed: TranslateResponse = serde_json::from_str(&body)
            .map_err(|e| DeepLError::InvalidResponse(e.to_string()))?;

        if parsed.translations.len() != texts.len() {
            return Err(DeepLError::CountMismatch {
                expected: texts.len(),
                got: parsed.translations.len(),
            });
        }

        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }

    /// [`translate`](Self::translate) with rate-limit aware retries.
    pub async fn translate_with_retry(
        &self,
        texts: &[String],
        retry: &RetryConfig,
    ) -> Result<Vec<String>, DeepLError> {
        with_retry_policy(
            retry,
            &format!("DeepL batch of {}", texts.len()),
            || self.translate(texts),
            DeepLError::retry_decision,
        )
        .await
    }

    /// Fetch character usage for the account.
    pub async fn usage(&self) -> Result<Usage, DeepLError> {
        let response = self
            .client
            .get(format!("{}/v2/usage", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(DeepLError::from_status(status, retry_after, body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| DeepLError::InvalidResponse(e.to_string()))
    }
}
