//! Error taxonomy for the session engine.
//!
//! Defined centrally so the composer and grading pipeline can classify
//! failures for fallback decisions without string matching. Only a handful
//! of these ever reach the user; everything else is absorbed by a
//! documented fallback (source degradation, grading tier advance, timer
//! resync).

use thiserror::Error;

/// A failure fetching from one question source. Per-source and non-fatal:
/// the composer degrades the source to an empty set and proceeds.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// The API returned an error response.
    #[error("pool API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("malformed pool response: {0}")]
    Malformed(String),
}

/// Composition failures. Fatal only when no source produced anything.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Zero questions assembled after all sources and the top-up fetch.
    #[error("no questions available for '{event}'")]
    Exhausted { event: String },
}

/// Remote grading failures. Never surfaced raw: any of these advances the
/// pipeline to the next tier for the whole batch.
#[derive(Debug, Error)]
pub enum GradingError {
    /// Transport-level failure reaching the grader.
    #[error("grading transport error: {0}")]
    Transport(String),

    /// The grader answered but the body was not a positionally-aligned
    /// numeric score list.
    #[error("malformed grading response: {0}")]
    Malformed(String),
}

/// Contest/appeal failures.
#[derive(Debug, Error)]
pub enum ContestError {
    /// The index was appealed before; rejected without a remote call.
    #[error("question {0} has already been contested")]
    AlreadyContested(usize),

    /// The validator could not be reached or returned no terminal token.
    #[error("contest validation failed: {0}")]
    ValidationFailed(String),
}

/// Session-level failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A user-triggered remote action landed inside the cooldown window.
    #[error("rate limited; wait before trying again")]
    RateLimited,

    /// Submission was requested on an already-submitted session.
    #[error("session already submitted")]
    AlreadySubmitted,

    /// Grading results arrived for a generation that no longer exists.
    #[error("stale results for generation {got}, current is {current}")]
    StaleGeneration { got: u64, current: u64 },

    /// A contest was attempted before the session was submitted.
    #[error("cannot contest before submission")]
    NotSubmitted,

    #[error(transparent)]
    Contest(#[from] ContestError),
}

/// Durable-store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt session record for '{key}': {message}")]
    Corrupt { key: String, message: String },
}
