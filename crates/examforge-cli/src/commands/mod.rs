//! CLI subcommands.

use serde::{Deserialize, Serialize};

use examforge_core::model::Question;

pub mod compose;
pub mod grade;
pub mod init;

/// The on-disk format of a composed set, written by `compose` and read by
/// `grade`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComposedSet {
    pub event: String,
    pub time_limit_secs: u64,
    pub questions: Vec<Question>,
    /// Ordered originating-pool indices for share/replay.
    pub share_indices: Vec<usize>,
}
