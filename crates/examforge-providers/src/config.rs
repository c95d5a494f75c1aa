//! Configuration loading and collaborator factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examforge_core::traits::{BatchGrader, ContestValidator, QuestionSource};

use crate::contest::HttpContestValidator;
use crate::grader::HttpBatchGrader;
use crate::http_source::HttpQuestionSource;

/// Connection details for one remote service. The `Debug` output masks
/// the API key.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Top-level examforge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamforgeConfig {
    /// Remote services keyed by role: "questions", "grader", "contest".
    #[serde(default)]
    pub services: HashMap<String, ServiceConfig>,
    /// Default event when none is given.
    #[serde(default = "default_event")]
    pub default_event: String,
    /// Default question count.
    #[serde(default = "default_count")]
    pub default_count: usize,
    /// Default time limit in seconds.
    #[serde(default = "default_time_limit")]
    pub default_time_limit_secs: u64,
    /// Supplemental identification percentage for supporting events.
    #[serde(default = "default_id_percentage")]
    pub id_percentage: u8,
    /// Output directory for composed sets and grade reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_event() -> String {
    "Entomology".to_string()
}
fn default_count() -> usize {
    25
}
fn default_time_limit() -> u64 {
    1800
}
fn default_id_percentage() -> u8 {
    20
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./examforge-results")
}

impl Default for ExamforgeConfig {
    fn default() -> Self {
        Self {
            services: HashMap::new(),
            default_event: default_event(),
            default_count: default_count(),
            default_time_limit_secs: default_time_limit(),
            id_percentage: default_id_percentage(),
            output_dir: default_output_dir(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_service_config(config: &ServiceConfig) -> ServiceConfig {
    ServiceConfig {
        base_url: resolve_env_vars(&config.base_url),
        api_key: config.api_key.as_ref().map(|k| resolve_env_vars(k)),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examforge.toml` in the current directory
/// 2. `~/.config/examforge/config.toml`
///
/// Environment variable overrides: `EXAMFORGE_QUESTIONS_URL`,
/// `EXAMFORGE_GRADER_URL`, `EXAMFORGE_CONTEST_URL`, `EXAMFORGE_API_KEY`.
pub fn load_config() -> Result<ExamforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamforgeConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examforge.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamforgeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamforgeConfig::default(),
    };

    // Apply env var overrides
    for (role, var) in [
        ("questions", "EXAMFORGE_QUESTIONS_URL"),
        ("grader", "EXAMFORGE_GRADER_URL"),
        ("contest", "EXAMFORGE_CONTEST_URL"),
    ] {
        if let Ok(url) = std::env::var(var) {
            config
                .services
                .entry(role.into())
                .and_modify(|s| s.base_url = url.clone())
                .or_insert(ServiceConfig {
                    base_url: url,
                    api_key: None,
                });
        }
    }
    if let Ok(key) = std::env::var("EXAMFORGE_API_KEY") {
        for service in config.services.values_mut() {
            if service.api_key.is_none() {
                service.api_key = Some(key.clone());
            }
        }
    }

    // Resolve env vars in all service configs
    let resolved: HashMap<String, ServiceConfig> = config
        .services
        .iter()
        .map(|(k, v)| (k.clone(), resolve_service_config(v)))
        .collect();
    config.services = resolved;

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examforge"))
}

/// The base question pool, when a question service is configured.
pub fn question_source(config: &ExamforgeConfig) -> Option<Arc<dyn QuestionSource>> {
    config.services.get("questions").map(|s| {
        Arc::new(HttpQuestionSource::base(&s.base_url, s.api_key.clone()))
            as Arc<dyn QuestionSource>
    })
}

/// The supplemental identification pool, served by the question service.
pub fn supplemental_source(config: &ExamforgeConfig) -> Option<Arc<dyn QuestionSource>> {
    config.services.get("questions").map(|s| {
        Arc::new(HttpQuestionSource::identification(
            &s.base_url,
            s.api_key.clone(),
        )) as Arc<dyn QuestionSource>
    })
}

pub fn batch_grader(config: &ExamforgeConfig) -> Option<Arc<dyn BatchGrader>> {
    config.services.get("grader").map(|s| {
        Arc::new(HttpBatchGrader::new(&s.base_url, s.api_key.clone())) as Arc<dyn BatchGrader>
    })
}

pub fn contest_validator(config: &ExamforgeConfig) -> Option<Arc<dyn ContestValidator>> {
    config.services.get("contest").map(|s| {
        Arc::new(HttpContestValidator::new(&s.base_url, s.api_key.clone()))
            as Arc<dyn ContestValidator>
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMFORGE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMFORGE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMFORGE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_EXAMFORGE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = ExamforgeConfig::default();
        assert_eq!(config.default_count, 25);
        assert_eq!(config.default_time_limit_secs, 1800);
        assert_eq!(config.id_percentage, 20);
        assert!(config.services.is_empty());
    }

    #[test]
    fn parse_service_config() {
        let toml_str = r#"
default_event = "Entomology"
default_count = 10

[services.questions]
base_url = "https://pool.example.org"
api_key = "sk-test"

[services.grader]
base_url = "https://grader.example.org"
"#;
        let config: ExamforgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.default_count, 10);
        assert_eq!(
            config.services.get("questions").unwrap().base_url,
            "https://pool.example.org"
        );
    }

    #[test]
    fn factory_is_none_without_a_service() {
        let config = ExamforgeConfig::default();
        assert!(question_source(&config).is_none());
        assert!(batch_grader(&config).is_none());
        assert!(contest_validator(&config).is_none());
    }

    #[test]
    fn config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examforge.toml");
        std::fs::write(
            &path,
            r#"
default_event = "Rocks and Minerals"

[services.questions]
base_url = "http://localhost:9000"
"#,
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.default_event, "Rocks and Minerals");
        assert!(question_source(&config).is_some());
        assert!(supplemental_source(&config).is_some());
    }

    #[test]
    fn missing_explicit_path_errors() {
        let err = load_config_from(Some(Path::new("/nonexistent/examforge.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn debug_masks_api_key() {
        let service = ServiceConfig {
            base_url: "http://x".into(),
            api_key: Some("secret".into()),
        };
        let rendered = format!("{service:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("***"));
    }
}
