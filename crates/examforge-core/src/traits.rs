//! Collaborator trait definitions.
//!
//! These async traits are implemented by the `examforge-providers` crate
//! (HTTP backends) and `examforge-store` (durable stores); the engine and
//! tests use mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GradingError, SourceError, StoreError};
use crate::model::{DifficultyBand, Question, SessionSignature, TypeFilter};
use crate::session::SessionRecord;

// ---------------------------------------------------------------------------
// Question sources
// ---------------------------------------------------------------------------

/// A filtered query against one question pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolQuery {
    /// Event name as the pool expects it (composite sub-events included).
    pub event: String,
    /// Number of questions requested. Partial fulfillment is acceptable.
    pub limit: usize,
    #[serde(default)]
    pub type_filter: TypeFilter,
    /// Merged difficulty envelope, when any band was requested.
    #[serde(default)]
    pub difficulty: Option<DifficultyBand>,
    #[serde(default)]
    pub subtopics: Vec<String>,
}

impl PoolQuery {
    pub fn new(event: impl Into<String>, limit: usize) -> Self {
        PoolQuery {
            event: event.into(),
            limit,
            type_filter: TypeFilter::Any,
            difficulty: None,
            subtopics: Vec::new(),
        }
    }
}

/// A queryable source of candidate questions.
///
/// Implementations must be failure-isolated at the call site: the composer
/// treats an `Err` exactly like an empty response from that source.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Human-readable source name for logs.
    fn name(&self) -> &str;

    /// Fetch up to `query.limit` candidate questions.
    async fn fetch(&self, query: &PoolQuery) -> Result<Vec<Question>, SourceError>;
}

// ---------------------------------------------------------------------------
// Remote grading
// ---------------------------------------------------------------------------

/// One pending free-response item in a grading batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrqItem {
    pub question: String,
    pub correct_answers: Vec<String>,
    pub student_answer: String,
}

/// Remote batch grader for free-response answers.
///
/// The rubric is {0 = incorrect, 0.5 = partially correct, 1 = fully
/// correct}; the response must be positionally aligned with the request.
/// Any failure aborts the entire batch.
#[async_trait]
pub trait BatchGrader: Send + Sync {
    async fn grade_batch(
        &self,
        event: &str,
        items: &[FrqItem],
    ) -> Result<Vec<f64>, GradingError>;
}

/// Request for a one-shot contest appeal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestRequest {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub selection: Vec<String>,
}

/// Verdict of a contest appeal, parsed from the validator's terminal token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestVerdict {
    Valid,
    Invalid,
    BadQuestion,
}

impl ContestVerdict {
    /// Whether the verdict overrides the grade to full credit.
    pub fn grants_credit(&self) -> bool {
        matches!(self, ContestVerdict::Valid | ContestVerdict::BadQuestion)
    }

    /// Parse the terminal token from a free-form validator response.
    /// Only the end of the text is considered.
    pub fn from_response(text: &str) -> Option<ContestVerdict> {
        let trimmed = text.trim_end();
        // "INVALID" ends with "VALID", so check it first.
        if trimmed.ends_with("INVALID") {
            Some(ContestVerdict::Invalid)
        } else if trimmed.ends_with("VALID") {
            Some(ContestVerdict::Valid)
        } else if trimmed.ends_with("BAD QUESTION") {
            Some(ContestVerdict::BadQuestion)
        } else {
            None
        }
    }
}

/// Remote semantic validator for contest appeals.
#[async_trait]
pub trait ContestValidator: Send + Sync {
    async fn validate(&self, request: &ContestRequest) -> Result<ContestVerdict, GradingError>;
}

// ---------------------------------------------------------------------------
// Durable session store
// ---------------------------------------------------------------------------

/// Durable store keyed by session signature. Survives reloads; cleared on
/// reset or explicit post-submission cleanup.
pub trait SessionStore: Send + Sync {
    fn load(&self, signature: &SessionSignature)
        -> Result<Option<SessionRecord>, StoreError>;
    fn save(
        &self,
        signature: &SessionSignature,
        record: &SessionRecord,
    ) -> Result<(), StoreError>;
    fn clear(&self, signature: &SessionSignature) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Metrics collaborator
// ---------------------------------------------------------------------------

/// Aggregate result notification, sent once per submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsUpdate {
    pub attempted: usize,
    /// Rounded to the nearest whole question.
    pub correct: usize,
    pub event: String,
}

/// Receives aggregate results after submission.
pub trait MetricsSink: Send + Sync {
    fn record(&self, update: &MetricsUpdate);
}

/// No-op metrics sink.
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&self, _: &MetricsUpdate) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_terminal_token_parse() {
        assert_eq!(
            ContestVerdict::from_response("reasoning...\nVALID"),
            Some(ContestVerdict::Valid)
        );
        assert_eq!(
            ContestVerdict::from_response("reasoning...\nINVALID"),
            Some(ContestVerdict::Invalid)
        );
        assert_eq!(
            ContestVerdict::from_response("this relies on missing context BAD QUESTION"),
            Some(ContestVerdict::BadQuestion)
        );
        assert_eq!(ContestVerdict::from_response("no verdict here."), None);
    }

    #[test]
    fn verdict_only_terminal_token_counts() {
        // A VALID mid-text must not be parsed.
        assert_eq!(
            ContestVerdict::from_response("VALID points were raised, but INVALID"),
            Some(ContestVerdict::Invalid)
        );
    }

    #[test]
    fn verdict_credit_mapping() {
        assert!(ContestVerdict::Valid.grants_credit());
        assert!(ContestVerdict::BadQuestion.grants_credit());
        assert!(!ContestVerdict::Invalid.grants_credit());
    }
}
