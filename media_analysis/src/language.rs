use crate::config::TranslationConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tonic::async_trait;
use whatlang::Lang;

pub const UNDETERMINED: &str = "und";

pub fn detect_language(text: &str) -> Option<Lang> {
    whatlang::detect(text).map(|info| info.lang())
}

/// ISO 639-3 code of the detected language, `und` when nothing is detected.
pub fn language_code(lang: Option<Lang>) -> &'static str {
    lang.map(|lang| lang.code()).unwrap_or(UNDETERMINED)
}

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Translation service answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate_to_english(&self, text: &str) -> Result<String, TranslationError>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: String,
}

/// Client for a LibreTranslate compatible `/translate` endpoint.
pub struct LibreTranslateClient {
    http: reqwest::Client,
    endpoint: String,
}

impl LibreTranslateClient {
    pub fn new(config: &TranslationConfig) -> Result<Self, TranslationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/translate", config.url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl Translator for LibreTranslateClient {
    async fn translate_to_english(&self, text: &str) -> Result<String, TranslationError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&TranslateRequest {
                q: text,
                source: "auto",
                target: "en",
                format: "text",
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<TranslateResponse>().await?.translated_text)
    }
}
