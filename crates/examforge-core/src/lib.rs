//! examforge-core — Session engine, pool composer, and grading pipeline.
//!
//! This crate defines the data model, collaborator traits, and the three
//! pillars of a practice attempt: question-set composition, the timed
//! session state machine, and the multi-tier grading pipeline.

pub mod answers;
pub mod compose;
pub mod error;
pub mod mcq;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod text;
pub mod timer;
pub mod traits;
