//! Core data model types for examforge.
//!
//! These are the fundamental types the entire system uses to represent
//! questions, answers, grades, and session identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::text::normalize_text;

/// A canonical correct-answer value, resolved once at composition time.
///
/// Question pools deliver correct answers either as literal option text or
/// as 1-based option indices. `PoolComposer::finalize` converts every
/// `ByIndex` into `ByText` against the option list so the grader never
/// branches on the representation again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CorrectAnswer {
    /// 1-based index into the option list.
    ByIndex(usize),
    /// Literal option (or free-response) text.
    ByText(String),
}

impl CorrectAnswer {
    /// Resolve to canonical text against an option list.
    ///
    /// A `ByIndex` value that falls outside the option list resolves to
    /// `None` and is dropped during composition.
    pub fn resolve(&self, options: &[String]) -> Option<String> {
        match self {
            CorrectAnswer::ByText(text) => Some(text.clone()),
            CorrectAnswer::ByIndex(idx) => {
                if *idx >= 1 {
                    options.get(idx - 1).cloned()
                } else {
                    None
                }
            }
        }
    }

    /// The text value, if already resolved.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CorrectAnswer::ByText(text) => Some(text),
            CorrectAnswer::ByIndex(_) => None,
        }
    }
}

/// A single question in a composed set. Immutable after composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier from the originating pool, when the pool has one.
    #[serde(default)]
    pub id: Option<String>,
    /// The prompt shown to the student. Bank files use the key `question`.
    #[serde(alias = "question")]
    pub prompt: String,
    /// Ordered option list; empty for free-response questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Canonical correct-answer set.
    #[serde(default)]
    pub answers: Vec<CorrectAnswer>,
    /// Difficulty in [0, 1].
    #[serde(default = "default_difficulty")]
    pub difficulty: f64,
    /// Subtopic tags.
    #[serde(default)]
    pub subtopics: Vec<String>,
    /// Optional image reference (identification questions).
    #[serde(default)]
    pub image: Option<String>,
    /// Index within the originating pool, for reproducible share/replay.
    #[serde(default)]
    pub pool_index: Option<usize>,
}

fn default_difficulty() -> f64 {
    0.5
}

impl Question {
    pub fn kind(&self) -> QuestionKind {
        if self.options.is_empty() {
            QuestionKind::Frq
        } else {
            QuestionKind::Mcq
        }
    }

    /// Correct answers resolved to text. Already-canonical sets pass through.
    pub fn correct_texts(&self) -> Vec<String> {
        self.answers
            .iter()
            .filter_map(|a| a.resolve(&self.options))
            .collect()
    }

    /// Normalized prompt used for duplicate detection.
    pub fn normalized_prompt(&self) -> String {
        normalize_text(&self.prompt)
    }
}

/// Whether a question is graded by option comparison or by text similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Mcq,
    Frq,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionKind::Mcq => write!(f, "mcq"),
            QuestionKind::Frq => write!(f, "frq"),
        }
    }
}

/// Question-type filter for pool queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    Mcq,
    Frq,
    #[default]
    Any,
}

impl fmt::Display for TypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeFilter::Mcq => write!(f, "mcq"),
            TypeFilter::Frq => write!(f, "frq"),
            TypeFilter::Any => write!(f, "any"),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcq" | "multiple-choice" => Ok(TypeFilter::Mcq),
            "frq" | "free-response" => Ok(TypeFilter::Frq),
            "any" | "all" => Ok(TypeFilter::Any),
            other => Err(format!("unknown question type filter: {other}")),
        }
    }
}

impl TypeFilter {
    /// Apply the filter to a fetched pool.
    pub fn retain(&self, questions: Vec<Question>) -> Vec<Question> {
        match self {
            TypeFilter::Mcq => questions
                .into_iter()
                .filter(|q| q.kind() == QuestionKind::Mcq)
                .collect(),
            TypeFilter::Frq => questions
                .into_iter()
                .filter(|q| q.kind() == QuestionKind::Frq)
                .collect(),
            TypeFilter::Any => questions,
        }
    }
}

/// Named difficulty band over the [0, 1] difficulty scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyBand {
    pub min: f64,
    pub max: f64,
}

impl DifficultyBand {
    /// Look up a named band ("very-easy" .. "very-hard").
    pub fn named(name: &str) -> Option<DifficultyBand> {
        let (min, max) = match name {
            "very-easy" => (0.0, 0.19),
            "easy" => (0.2, 0.39),
            "medium" => (0.4, 0.59),
            "hard" => (0.6, 0.79),
            "very-hard" => (0.8, 1.0),
            _ => return None,
        };
        Some(DifficultyBand { min, max })
    }

    /// Merge several bands into the single min/max envelope the pool API
    /// accepts. Returns `None` when the list is empty.
    pub fn envelope(bands: &[DifficultyBand]) -> Option<DifficultyBand> {
        let first = bands.first()?;
        let mut merged = *first;
        for band in &bands[1..] {
            merged.min = merged.min.min(band.min);
            merged.max = merged.max.max(band.max);
        }
        Some(merged)
    }
}

/// A student's response to one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Answer {
    /// Selected option values. Single-select: length 1; multi-select: any.
    Selected { values: Vec<String> },
    /// Free-response text.
    FreeText { text: String },
}

impl Answer {
    /// True when the response carries no usable content.
    pub fn is_blank(&self) -> bool {
        match self {
            Answer::Selected { values } => values.is_empty(),
            Answer::FreeText { text } => text.trim().is_empty(),
        }
    }
}

/// Which grading tier produced a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeMethod {
    /// MCQ set comparison.
    McqExact,
    /// FRQ normalized exact match.
    ExactText,
    /// Remote batch grader.
    Remote,
    /// Local similarity fallback.
    Fuzzy,
    /// Accepted contest appeal.
    ContestOverride,
}

/// The grade for one question index. Exists only after submission and is
/// immutable once written except by a successful contest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    /// Score in {0, 0.25, 0.5, 0.75, 1}.
    pub score: f64,
    pub method: GradeMethod,
    /// Unanswered, as opposed to answered wrong.
    #[serde(default)]
    pub skipped: bool,
}

impl Grade {
    pub fn skipped() -> Self {
        Grade {
            score: 0.0,
            method: GradeMethod::McqExact,
            skipped: true,
        }
    }
}

/// The (event, time-limit) pair that identifies one live session.
///
/// A persisted session is resumed when the signature matches the requested
/// configuration and reset otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionSignature {
    pub event: String,
    pub time_limit_secs: u64,
}

impl SessionSignature {
    pub fn new(event: impl Into<String>, time_limit_secs: u64) -> Self {
        SessionSignature {
            event: event.into(),
            time_limit_secs,
        }
    }

    /// Filesystem- and key-safe slug for durable stores.
    pub fn slug(&self) -> String {
        let event: String = self
            .event
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let event = event.trim_matches('-').to_string();
        format!("{}-{}s", event, self.time_limit_secs)
    }
}

impl fmt::Display for SessionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}s)", self.event, self.time_limit_secs)
    }
}
