//! HTTP question pool source.
//!
//! Speaks the question service's REST surface: `GET /api/questions` for
//! the base pool and `GET /api/id-questions` for the supplemental
//! identification pool. Rows arrive with 1-based index or literal-text
//! correct answers and an optional image list; decoding keeps only what
//! the composer needs.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use examforge_core::error::SourceError;
use examforge_core::model::{CorrectAnswer, Question, TypeFilter};
use examforge_core::traits::{PoolQuery, QuestionSource};

use crate::error::{source_status, source_transport};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One pool of the question service.
pub struct HttpQuestionSource {
    name: String,
    base_url: String,
    path: &'static str,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpQuestionSource {
    fn with_path(name: &str, base_url: &str, path: &'static str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();
        HttpQuestionSource {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            path,
            api_key,
            client,
        }
    }

    /// The base question pool.
    pub fn base(base_url: &str, api_key: Option<String>) -> Self {
        Self::with_path("questions", base_url, "/api/questions", api_key)
    }

    /// The supplemental identification pool.
    pub fn identification(base_url: &str, api_key: Option<String>) -> Self {
        Self::with_path("id-questions", base_url, "/api/id-questions", api_key)
    }
}

/// One row of the pool response.
#[derive(Debug, Deserialize)]
struct QuestionRow {
    #[serde(default)]
    id: Option<String>,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    answers: Vec<CorrectAnswer>,
    #[serde(default)]
    difficulty: Option<f64>,
    #[serde(default)]
    subtopics: Vec<String>,
    #[serde(default)]
    images: Vec<String>,
}

impl QuestionRow {
    fn into_question(self) -> Question {
        Question {
            id: self.id,
            prompt: self.question,
            options: self.options,
            answers: self.answers,
            difficulty: self.difficulty.unwrap_or(0.5).clamp(0.0, 1.0),
            subtopics: self.subtopics,
            // Identification questions ship several renditions; the first
            // is the canonical one.
            image: self.images.into_iter().next(),
            pool_index: None,
        }
    }
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, query), fields(source = %self.name, event = %query.event, limit = query.limit))]
    async fn fetch(&self, query: &PoolQuery) -> Result<Vec<Question>, SourceError> {
        let mut params: Vec<(&str, String)> = vec![
            ("event", query.event.clone()),
            ("limit", query.limit.to_string()),
        ];
        match query.type_filter {
            TypeFilter::Any => {}
            other => params.push(("types", other.to_string())),
        }
        if let Some(band) = &query.difficulty {
            params.push(("difficulty_min", band.min.to_string()));
            params.push(("difficulty_max", band.max.to_string()));
        }
        if !query.subtopics.is_empty() {
            params.push(("subtopics", query.subtopics.join(",")));
        }

        let mut req = self
            .client
            .get(format!("{}{}", self.base_url, self.path))
            .query(&params);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }

        let response = req
            .send()
            .await
            .map_err(|e| source_transport(e, DEFAULT_TIMEOUT_SECS))?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(source_status(status, body));
        }

        let rows: Vec<QuestionRow> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        Ok(rows.into_iter().map(QuestionRow::into_question).collect())
    }
}
