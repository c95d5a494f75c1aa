//! Transport error classification.
//!
//! The core crate owns the error taxonomy; this module maps `reqwest`
//! failures and HTTP statuses onto it so every provider classifies the
//! same way.

use examforge_core::error::{GradingError, SourceError};

pub(crate) fn source_transport(e: reqwest::Error, timeout_secs: u64) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(timeout_secs)
    } else {
        SourceError::Network(e.to_string())
    }
}

pub(crate) fn source_status(status: u16, body: String) -> SourceError {
    SourceError::Api {
        status,
        message: body,
    }
}

pub(crate) fn grading_transport(e: reqwest::Error) -> GradingError {
    GradingError::Transport(e.to_string())
}

pub(crate) fn grading_status(status: u16, body: String) -> GradingError {
    GradingError::Transport(format!("HTTP {status}: {body}"))
}
