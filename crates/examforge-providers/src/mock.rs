//! Mock collaborators for testing the engine without a network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examforge_core::error::{GradingError, SourceError};
use examforge_core::model::Question;
use examforge_core::traits::{
    BatchGrader, ContestRequest, ContestValidator, ContestVerdict, FrqItem, PoolQuery,
    QuestionSource,
};

/// A question source backed by a fixed bank.
pub struct MockSource {
    name: String,
    bank: Vec<Question>,
    fail: bool,
    call_count: AtomicU32,
    last_query: Mutex<Option<PoolQuery>>,
}

impl MockSource {
    pub fn new(name: &str, bank: Vec<Question>) -> Self {
        MockSource {
            name: name.to_string(),
            bank,
            fail: false,
            call_count: AtomicU32::new(0),
            last_query: Mutex::new(None),
        }
    }

    /// A source whose every fetch fails.
    pub fn failing(name: &str) -> Self {
        MockSource {
            fail: true,
            ..Self::new(name, vec![])
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_query(&self) -> Option<PoolQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, query: &PoolQuery) -> Result<Vec<Question>, SourceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_query.lock().unwrap() = Some(query.clone());
        if self.fail {
            return Err(SourceError::Network("mock source failure".into()));
        }
        Ok(self.bank.iter().take(query.limit).cloned().collect())
    }
}

/// A batch grader that returns a fixed score list, or fails.
pub struct MockGrader {
    scores: Vec<f64>,
    fail: bool,
    call_count: AtomicU32,
    last_batch: Mutex<Vec<FrqItem>>,
}

impl MockGrader {
    pub fn with_scores(scores: Vec<f64>) -> Self {
        MockGrader {
            scores,
            fail: false,
            call_count: AtomicU32::new(0),
            last_batch: Mutex::new(vec![]),
        }
    }

    pub fn failing() -> Self {
        MockGrader {
            fail: true,
            ..Self::with_scores(vec![])
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_batch(&self) -> Vec<FrqItem> {
        self.last_batch.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchGrader for MockGrader {
    async fn grade_batch(
        &self,
        _event: &str,
        items: &[FrqItem],
    ) -> Result<Vec<f64>, GradingError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_batch.lock().unwrap() = items.to_vec();
        if self.fail {
            return Err(GradingError::Transport("mock grader failure".into()));
        }
        Ok(self.scores.iter().take(items.len()).cloned().collect())
    }
}

/// A contest validator that parses a canned response text, exactly like
/// the HTTP validator does.
pub struct MockValidator {
    response: String,
    call_count: AtomicU32,
}

impl MockValidator {
    pub fn with_response(response: &str) -> Self {
        MockValidator {
            response: response.to_string(),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ContestValidator for MockValidator {
    async fn validate(&self, _request: &ContestRequest) -> Result<ContestVerdict, GradingError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        ContestVerdict::from_response(&self.response).ok_or_else(|| {
            GradingError::Malformed("mock response has no terminal verdict token".into())
        })
    }
}
