//! Backend client: the single point of entry for every call to the résumé
//! backend (template options, gap analysis, generation, save).
//!
//! No other module talks HTTP to the backend. Callers depend on the
//! `ResumeApi` trait so tests can swap in a scripted fake.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::answer::AnswerMap;
use crate::models::question::{questions_from_value, GapQuestion};
use crate::models::resume::ResumeDraft;

/// Used when the backend has no options to offer or cannot be reached.
pub const DEFAULT_EXPERIENCE_OPTIONS: &[&str] = &["Experience 1"];
/// Only idempotent reads are retried.
const MAX_READ_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeGapsRequest {
    pub user_id: String,
    pub job_description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub user_id: String,
    pub job_description: String,
    pub answers: AnswerMap,
    pub questions: Vec<GapQuestion>,
}

#[derive(Debug, Serialize)]
struct SaveResumeRequest<'a> {
    user_id: &'a str,
    resume: &'a ResumeDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub version: u32,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OptionsResponse {
    #[serde(default)]
    options: Option<Vec<String>>,
}

/// Contract the tailoring workflow relies on. Implemented over HTTP by
/// `BackendClient`; the backend's algorithms are opaque to us.
#[async_trait]
pub trait ResumeApi: Send + Sync {
    async fn save_resume(
        &self,
        user_id: &str,
        resume: &ResumeDraft,
    ) -> Result<SaveReceipt, BackendError>;

    /// Experience/education names answers can link to. May be empty.
    async fn fetch_options(&self, user_id: &str) -> Result<Vec<String>, BackendError>;

    async fn analyze_gaps(
        &self,
        request: &AnalyzeGapsRequest,
    ) -> Result<Vec<GapQuestion>, BackendError>;

    /// Returns the tailored résumé as an opaque JSON document.
    async fn generate_resume(&self, request: &GenerateRequest) -> Result<Value, BackendError>;
}

/// Falls back to the built-in option list when the backend offers none.
pub fn options_or_default(options: Vec<String>) -> Vec<String> {
    let options: Vec<String> = options
        .into_iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if options.is_empty() {
        DEFAULT_EXPERIENCE_OPTIONS
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        options
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request and decodes the JSON body. Non-2xx responses carry the
    /// response text in the error.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// GET with exponential backoff on transport errors, 429 and 5xx.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, BackendError> {
        let mut last_error: Option<BackendError> = None;

        for attempt in 0..MAX_READ_RETRIES {
            if attempt > 0 {
                // 250ms, 500ms
                let delay = Duration::from_millis(250 * (1 << (attempt - 1)));
                warn!(
                    "GET {} attempt {} failed, retrying after {}ms...",
                    path,
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self
                .send_json(self.client.get(self.url(path)).query(query))
                .await
            {
                Ok(v) => return Ok(v),
                Err(BackendError::Status { status, body })
                    if status == 429 || status >= 500 =>
                {
                    last_error = Some(BackendError::Status { status, body });
                }
                Err(BackendError::Http(e)) => last_error = Some(BackendError::Http(e)),
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(BackendError::Status {
            status: 503,
            body: format!("no response after {MAX_READ_RETRIES} attempts"),
        }))
    }
}

#[async_trait]
impl ResumeApi for BackendClient {
    async fn save_resume(
        &self,
        user_id: &str,
        resume: &ResumeDraft,
    ) -> Result<SaveReceipt, BackendError> {
        let receipt: SaveReceipt = self
            .send_json(
                self.client
                    .post(self.url("/resume/save"))
                    .json(&SaveResumeRequest { user_id, resume }),
            )
            .await?;
        debug!("Saved resume for {user_id} as v{}", receipt.version);
        Ok(receipt)
    }

    async fn fetch_options(&self, user_id: &str) -> Result<Vec<String>, BackendError> {
        let response: OptionsResponse = self
            .get_json("/template/options", &[("user_id", user_id)])
            .await?;
        Ok(response.options.unwrap_or_default())
    }

    async fn analyze_gaps(
        &self,
        request: &AnalyzeGapsRequest,
    ) -> Result<Vec<GapQuestion>, BackendError> {
        let body: Value = self
            .send_json(self.client.post(self.url("/analyze/gaps")).json(request))
            .await?;
        let questions = questions_from_value(body.get("questions").unwrap_or(&Value::Null));
        debug!("Gap analysis returned {} questions", questions.len());
        Ok(questions)
    }

    async fn generate_resume(&self, request: &GenerateRequest) -> Result<Value, BackendError> {
        self.send_json(self.client.post(self.url("/generate")).json(request))
            .await
    }
}
