//! The test session engine.
//!
//! A [`TestSession`] owns one attempt: the composed question list, the
//! answer sheet, the countdown timer, the post-submission grades, and the
//! contest log. All remote collaborators are trait objects so the engine is
//! testable without a network.
//!
//! Sessions are durable. Every mutation persists the full [`SessionRecord`]
//! through the configured store; on restart, a record whose signature
//! matches the requested configuration and which is not stale resumes
//! exactly where it left off, otherwise it is cleared and a fresh session
//! begins.
//!
//! Resets bump a generation counter. Any grade report computed under an
//! older generation is rejected when applied, so a reset that races a slow
//! grading call can never write grades into the new attempt.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answers::AnswerSheet;
use crate::compose;
use crate::error::{ContestError, SessionError, StoreError};
use crate::model::{Grade, GradeMethod, Question, QuestionKind, SessionSignature};
use crate::pipeline::{GradeReport, GradingPipeline};
use crate::timer::{SessionTimer, TimerEvent, TimerPhase};
use crate::traits::{
    BatchGrader, ContestRequest, ContestValidator, ContestVerdict, MetricsSink, MetricsUpdate,
    NoopMetrics, SessionStore,
};

/// A persisted record is discarded when it has sat untouched this long.
const STALE_AFTER_MINS: i64 = 30;

/// Minimum spacing between user-triggered remote calls.
const REMOTE_COOLDOWN_SECS: i64 = 2;

/// Everything the store persists for one signature. A reset replaces the
/// whole document in one save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub signature: SessionSignature,
    pub questions: Vec<Question>,
    pub sheet: AnswerSheet,
    pub timer: SessionTimer,
    pub generation: u64,
    pub submitted: bool,
    #[serde(default)]
    pub grades: Option<BTreeMap<usize, Grade>>,
    #[serde(default)]
    pub contested: Vec<usize>,
    pub saved_at: DateTime<Utc>,
}

/// Remote and durable collaborators for a session. All optional except the
/// metrics sink, which defaults to a no-op.
pub struct Collaborators {
    pub grader: Option<Arc<dyn BatchGrader>>,
    pub validator: Option<Arc<dyn ContestValidator>>,
    pub store: Option<Arc<dyn SessionStore>>,
    pub metrics: Arc<dyn MetricsSink>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            grader: None,
            validator: None,
            store: None,
            metrics: Arc::new(NoopMetrics),
        }
    }
}

/// One timed practice attempt.
pub struct TestSession {
    id: Uuid,
    signature: SessionSignature,
    questions: Vec<Question>,
    sheet: AnswerSheet,
    timer: SessionTimer,
    generation: u64,
    submitted: bool,
    grades: Option<BTreeMap<usize, Grade>>,
    contested: Vec<usize>,
    last_remote_call: Option<DateTime<Utc>>,
    pipeline: GradingPipeline,
    validator: Option<Arc<dyn ContestValidator>>,
    store: Option<Arc<dyn SessionStore>>,
    metrics: Arc<dyn MetricsSink>,
}

impl TestSession {
    /// A fresh session over an already-composed question list.
    pub fn new(
        signature: SessionSignature,
        questions: Vec<Question>,
        collaborators: Collaborators,
    ) -> Self {
        let timer = SessionTimer::new(signature.time_limit_secs);
        TestSession {
            id: Uuid::new_v4(),
            signature,
            questions,
            sheet: AnswerSheet::new(),
            timer,
            generation: 0,
            submitted: false,
            grades: None,
            contested: Vec::new(),
            last_remote_call: None,
            pipeline: GradingPipeline::new(collaborators.grader),
            validator: collaborators.validator,
            store: collaborators.store,
            metrics: collaborators.metrics,
        }
    }

    /// Rebuild a session from a persisted record.
    ///
    /// Returns `None` when the record belongs to a different configuration
    /// or has gone stale; the caller should clear it and start fresh.
    pub fn restore(
        record: SessionRecord,
        requested: &SessionSignature,
        now: DateTime<Utc>,
        collaborators: Collaborators,
    ) -> Option<Self> {
        if record.signature != *requested {
            tracing::debug!(
                stored = %record.signature,
                requested = %requested,
                "signature mismatch, discarding persisted session"
            );
            return None;
        }
        if now - record.saved_at > Duration::minutes(STALE_AFTER_MINS) {
            tracing::debug!(saved_at = %record.saved_at, "persisted session is stale");
            return None;
        }

        Some(TestSession {
            id: record.id,
            signature: record.signature,
            questions: record.questions,
            sheet: record.sheet,
            timer: record.timer,
            generation: record.generation,
            submitted: record.submitted,
            grades: record.grades,
            contested: record.contested,
            last_remote_call: None,
            pipeline: GradingPipeline::new(collaborators.grader),
            validator: collaborators.validator,
            store: collaborators.store,
            metrics: collaborators.metrics,
        })
    }

    /// Load-or-discard against a store: resume a matching fresh record,
    /// clear anything else. A corrupt record is cleared too, so one bad
    /// file cannot wedge every subsequent start.
    pub fn resume(
        store: Arc<dyn SessionStore>,
        signature: &SessionSignature,
        now: DateTime<Utc>,
        mut collaborators: Collaborators,
    ) -> Result<Option<Self>, StoreError> {
        collaborators.store = Some(store.clone());
        let record = match store.load(signature) {
            Ok(record) => record,
            Err(StoreError::Corrupt { key, message }) => {
                tracing::warn!(key = %key, error = %message, "clearing corrupt persisted session");
                store.clear(signature)?;
                None
            }
            Err(e) => return Err(e),
        };
        match record {
            Some(record) => match Self::restore(record, signature, now, collaborators) {
                Some(session) => {
                    tracing::info!(session = %session.id, "resumed persisted session");
                    Ok(Some(session))
                }
                None => {
                    store.clear(signature)?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn signature(&self) -> &SessionSignature {
        &self.signature
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn phase(&self) -> TimerPhase {
        self.timer.phase()
    }

    pub fn remaining_secs(&self) -> u64 {
        self.timer.remaining_secs()
    }

    /// Grades by question index, present only after submission.
    pub fn grades(&self) -> Option<&BTreeMap<usize, Grade>> {
        self.grades.as_ref()
    }

    /// Total score in question units, after submission.
    pub fn score(&self) -> Option<f64> {
        self.grades
            .as_ref()
            .map(|g| g.values().map(|grade| grade.score).sum())
    }

    /// Ordered originating-pool indices for the share/replay collaborator.
    pub fn share_indices(&self) -> Vec<usize> {
        compose::share_indices(&self.questions)
    }

    // -----------------------------------------------------------------
    // Timer
    // -----------------------------------------------------------------

    pub fn start(&mut self, now: DateTime<Utc>) {
        self.timer.start(now);
        self.persist(now);
    }

    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.timer.pause(now);
        self.persist(now);
    }

    pub fn resume_timer(&mut self, now: DateTime<Utc>) {
        self.timer.resume(now);
        self.persist(now);
    }

    /// Advance the countdown. The runtime must translate a returned
    /// [`TimerEvent::Expired`] into a call to [`TestSession::submit`].
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        if self.submitted {
            return Vec::new();
        }
        let events = self.timer.tick(now);
        self.persist(now);
        events
    }

    // -----------------------------------------------------------------
    // Answering
    // -----------------------------------------------------------------

    pub fn select(&mut self, index: usize, value: impl Into<String>, now: DateTime<Utc>) {
        if self.submitted {
            return;
        }
        self.sheet.select(index, value);
        self.persist(now);
    }

    pub fn toggle(&mut self, index: usize, value: impl Into<String>, now: DateTime<Utc>) {
        if self.submitted {
            return;
        }
        self.sheet.toggle(index, value);
        self.persist(now);
    }

    pub fn write_text(&mut self, index: usize, text: impl Into<String>, now: DateTime<Utc>) {
        if self.submitted {
            return;
        }
        self.sheet.write_text(index, text);
        self.persist(now);
    }

    pub fn sheet(&self) -> &AnswerSheet {
        &self.sheet
    }

    // -----------------------------------------------------------------
    // Submission and grading
    // -----------------------------------------------------------------

    /// Submit the attempt and grade it. Idempotent by check-and-set: the
    /// submitted flag flips before any await, so a second call (user click
    /// racing timer expiry) returns `AlreadySubmitted` instead of grading
    /// twice.
    pub async fn submit(&mut self, now: DateTime<Utc>) -> Result<f64, SessionError> {
        if self.submitted {
            return Err(SessionError::AlreadySubmitted);
        }
        self.submitted = true;
        self.timer.mark_submitted();
        self.sanitize_selections();
        self.persist(now);

        let report = self
            .pipeline
            .grade(&self.signature.event, &self.questions, &self.sheet, self.generation)
            .await;
        self.apply_report(report, now)?;

        Ok(self.score().unwrap_or(0.0))
    }

    /// Install a grade report, rejecting one computed under a generation
    /// that a reset has since replaced.
    pub fn apply_report(
        &mut self,
        report: GradeReport,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if report.generation != self.generation {
            return Err(SessionError::StaleGeneration {
                got: report.generation,
                current: self.generation,
            });
        }

        self.metrics.record(&MetricsUpdate {
            attempted: report.attempted(),
            correct: report.correct_rounded(),
            event: self.signature.event.clone(),
        });
        tracing::info!(
            session = %self.id,
            score = report.score_sum(),
            attempted = report.attempted(),
            "session graded"
        );

        self.grades = Some(report.grades);
        self.persist(now);
        Ok(())
    }

    /// Drop selected values that are not actual options of their question.
    /// Guards grading against records written by an older question set.
    fn sanitize_selections(&mut self) {
        for (idx, question) in self.questions.iter().enumerate() {
            if question.kind() != QuestionKind::Mcq {
                continue;
            }
            let selections = self.sheet.selections(idx);
            let valid: Vec<String> = selections
                .iter()
                .filter(|s| question.options.contains(s))
                .cloned()
                .collect();
            if valid.len() != selections.len() {
                tracing::warn!(index = idx, "dropping selections not present in options");
                self.sheet.clear_index(idx);
                for v in valid {
                    self.sheet.toggle(idx, v);
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Contest appeals
    // -----------------------------------------------------------------

    /// Appeal one graded question. Strictly one-shot per index: the appeal
    /// is consumed the moment the validator is called, whatever the
    /// outcome. A verdict that grants credit overrides the grade to full
    /// marks.
    pub async fn contest(
        &mut self,
        index: usize,
        now: DateTime<Utc>,
    ) -> Result<ContestVerdict, SessionError> {
        if !self.submitted {
            return Err(SessionError::NotSubmitted);
        }
        if self.contested.contains(&index) {
            return Err(ContestError::AlreadyContested(index).into());
        }
        if let Some(last) = self.last_remote_call {
            if now - last < Duration::seconds(REMOTE_COOLDOWN_SECS) {
                return Err(SessionError::RateLimited);
            }
        }
        let question = self.questions.get(index).ok_or_else(|| {
            ContestError::ValidationFailed(format!("no question at index {index}"))
        })?;
        let validator = self
            .validator
            .as_ref()
            .ok_or_else(|| ContestError::ValidationFailed("no validator configured".into()))?
            .clone();

        let request = ContestRequest {
            question: question.prompt.clone(),
            options: question.options.clone(),
            selection: self.selection_text(index),
        };

        // Consume the appeal before the remote call; a failed call does
        // not restore it.
        self.contested.push(index);
        self.last_remote_call = Some(now);
        self.persist(now);

        let verdict = validator
            .validate(&request)
            .await
            .map_err(|e| ContestError::ValidationFailed(e.to_string()))?;

        tracing::info!(session = %self.id, index, ?verdict, "contest verdict");
        if verdict.grants_credit() {
            if let Some(grades) = &mut self.grades {
                grades.insert(
                    index,
                    Grade {
                        score: 1.0,
                        method: GradeMethod::ContestOverride,
                        skipped: false,
                    },
                );
            }
            self.persist(now);
        }
        Ok(verdict)
    }

    /// The response for an index as text, for the contest payload.
    fn selection_text(&self, index: usize) -> Vec<String> {
        let selections = self.sheet.selections(index);
        if !selections.is_empty() {
            return selections;
        }
        self.sheet
            .free_text(index)
            .map(|t| vec![t.to_string()])
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Reset
    // -----------------------------------------------------------------

    /// Replace the attempt with a fresh one over a new question list.
    /// Bumps the generation so in-flight grade reports for the old attempt
    /// are rejected, and persists the replacement as one document.
    pub fn reset(&mut self, questions: Vec<Question>, now: DateTime<Utc>) {
        self.generation += 1;
        self.questions = questions;
        self.sheet.clear();
        self.timer = SessionTimer::new(self.signature.time_limit_secs);
        self.submitted = false;
        self.grades = None;
        self.contested.clear();
        tracing::info!(session = %self.id, generation = self.generation, "session reset");
        self.persist(now);
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Snapshot the full durable state.
    pub fn record(&self, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: self.id,
            signature: self.signature.clone(),
            questions: self.questions.clone(),
            sheet: self.sheet.clone(),
            timer: self.timer.clone(),
            generation: self.generation,
            submitted: self.submitted,
            grades: self.grades.clone(),
            contested: self.contested.clone(),
            saved_at: now,
        }
    }

    /// Persist the current state. Store failures are logged, never fatal;
    /// the in-memory session stays authoritative.
    fn persist(&self, now: DateTime<Utc>) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.signature, &self.record(now)) {
                tracing::warn!(error = %e, "failed to persist session");
            }
        }
    }

    /// Remove the persisted record (post-submission cleanup).
    pub fn clear_persisted(&self) -> Result<(), StoreError> {
        match &self.store {
            Some(store) => store.clear(&self.signature),
            None => Ok(()),
        }
    }
}
