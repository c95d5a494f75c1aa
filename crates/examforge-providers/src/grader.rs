//! HTTP batch grader for free-response answers.
//!
//! One POST per submission with every pending item; the service returns a
//! positionally-aligned score list on the {0, 0.5, 1} rubric. Any failure
//! is returned whole so the pipeline can fall back for the entire batch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use examforge_core::error::GradingError;
use examforge_core::traits::{BatchGrader, FrqItem};

use crate::error::{grading_status, grading_transport};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub struct HttpBatchGrader {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpBatchGrader {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        HttpBatchGrader {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }
}

#[derive(Serialize)]
struct GradeRequest<'a> {
    event: &'a str,
    items: &'a [FrqItem],
}

#[derive(Deserialize)]
struct GradeResponse {
    scores: Vec<f64>,
}

#[async_trait]
impl BatchGrader for HttpBatchGrader {
    #[instrument(skip(self, items), fields(count = items.len()))]
    async fn grade_batch(
        &self,
        event: &str,
        items: &[FrqItem],
    ) -> Result<Vec<f64>, GradingError> {
        let mut req = self
            .client
            .post(format!("{}/api/grade", self.base_url))
            .json(&GradeRequest { event, items });
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req.send().await.map_err(grading_transport)?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(grading_status(status, body));
        }

        let body: GradeResponse = response
            .json()
            .await
            .map_err(|e| GradingError::Malformed(e.to_string()))?;

        if body.scores.len() != items.len() {
            return Err(GradingError::Malformed(format!(
                "expected {} scores, got {}",
                items.len(),
                body.scores.len()
            )));
        }
        Ok(body.scores)
    }
}
