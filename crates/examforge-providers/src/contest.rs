//! HTTP contest validator.
//!
//! The validator answers with free-form reasoning that must end in one of
//! the terminal tokens `VALID`, `INVALID`, or `BAD QUESTION`. Parsing
//! lives on [`ContestVerdict`]; a response without a terminal token is a
//! malformed-response error, which the session treats as a consumed,
//! rejected appeal.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use examforge_core::error::GradingError;
use examforge_core::traits::{ContestRequest, ContestValidator, ContestVerdict};

use crate::error::{grading_status, grading_transport};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub struct HttpContestValidator {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpContestValidator {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        HttpContestValidator {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }
}

#[derive(Deserialize)]
struct ContestResponse {
    response: String,
}

#[async_trait]
impl ContestValidator for HttpContestValidator {
    #[instrument(skip(self, request))]
    async fn validate(&self, request: &ContestRequest) -> Result<ContestVerdict, GradingError> {
        let mut req = self
            .client
            .post(format!("{}/api/contest", self.base_url))
            .json(request);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await.map_err(grading_transport)?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(grading_status(status, body));
        }

        let body: ContestResponse = response
            .json()
            .await
            .map_err(|e| GradingError::Malformed(e.to_string()))?;

        ContestVerdict::from_response(&body.response).ok_or_else(|| {
            GradingError::Malformed("validator response has no terminal verdict token".into())
        })
    }
}
