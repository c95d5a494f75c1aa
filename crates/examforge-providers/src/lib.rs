//! examforge-providers — Remote service integrations.
//!
//! HTTP implementations of the core collaborator traits (question pools,
//! the batch FRQ grader, the contest validator), mock implementations for
//! engine tests, and TOML configuration loading.

pub mod config;
pub mod contest;
mod error;
pub mod grader;
pub mod http_source;
pub mod mock;

pub use config::{
    batch_grader, contest_validator, load_config, load_config_from, question_source,
    supplemental_source, ExamforgeConfig, ServiceConfig,
};
pub use contest::HttpContestValidator;
pub use grader::HttpBatchGrader;
pub use http_source::HttpQuestionSource;
