//! The `examforge compose` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use comfy_table::{Cell, Table};

use examforge_core::compose::{ComposeRequest, EventCatalog, PoolComposer};
use examforge_core::error::SourceError;
use examforge_core::model::{DifficultyBand, Question, SessionSignature, TypeFilter};
use examforge_core::session::{Collaborators, TestSession};
use examforge_core::traits::{PoolQuery, QuestionSource};
use examforge_providers::config::{load_config_from, question_source, supplemental_source};
use examforge_store::FileSessionStore;

use super::ComposedSet;

/// A question source backed by a local JSON bank file. Lets `compose` run
/// without a question service.
struct FileBank {
    questions: Vec<Question>,
}

impl FileBank {
    fn load(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read bank: {}", path.display()))?;
        let questions: Vec<Question> = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse bank: {}", path.display()))?;
        Ok(FileBank { questions })
    }
}

#[async_trait]
impl QuestionSource for FileBank {
    fn name(&self) -> &str {
        "file-bank"
    }

    async fn fetch(&self, query: &PoolQuery) -> Result<Vec<Question>, SourceError> {
        Ok(self
            .questions
            .iter()
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    event: Option<String>,
    count: Option<usize>,
    types: String,
    difficulty: Option<String>,
    subtopics: Option<String>,
    id_percentage: Option<u8>,
    time_limit: Option<u64>,
    bank: Option<PathBuf>,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let event = event.unwrap_or_else(|| config.default_event.clone());
    let count = count.unwrap_or(config.default_count);
    anyhow::ensure!(count >= 1, "count must be at least 1");
    let time_limit = time_limit.unwrap_or(config.default_time_limit_secs);

    let type_filter: TypeFilter = types
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let difficulty_bands: Vec<DifficultyBand> = match &difficulty {
        Some(names) => names
            .split(',')
            .map(|name| {
                let name = name.trim();
                DifficultyBand::named(name)
                    .ok_or_else(|| anyhow::anyhow!("unknown difficulty band: '{name}'"))
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let subtopic_list: Vec<String> = subtopics
        .map(|s| s.split(',').map(|t| t.trim().to_string()).collect())
        .unwrap_or_default();

    // Source selection: a local bank for offline runs, else the configured
    // question service (with its supplemental identification pool).
    let (base, supplemental): (Arc<dyn QuestionSource>, Option<Arc<dyn QuestionSource>>) =
        match &bank {
            Some(path) => (Arc::new(FileBank::load(path)?), None),
            None => {
                let base = question_source(&config).ok_or_else(|| {
                    anyhow::anyhow!(
                        "no question service configured; pass --bank or set [services.questions]"
                    )
                })?;
                (base, supplemental_source(&config))
            }
        };

    let signature = SessionSignature::new(event.clone(), time_limit);
    let store: Arc<dyn examforge_core::traits::SessionStore> =
        Arc::new(FileSessionStore::new(config.output_dir.join("sessions")));
    let now = chrono::Utc::now();

    // A fresh matching session on disk is resumed instead of recomposed.
    let session = match TestSession::resume(store.clone(), &signature, now, Collaborators::default())?
    {
        Some(session) => {
            eprintln!("Resuming persisted session {}", session.id());
            session
        }
        None => {
            let mut request = ComposeRequest::new(&event, count);
            request.type_filter = type_filter;
            request.difficulty = difficulty_bands;
            request.subtopics = subtopic_list;
            request.id_percentage = id_percentage.unwrap_or(config.id_percentage);

            let composer = PoolComposer::new(base, supplemental, EventCatalog::standard());
            let questions = composer.compose(&request).await?;

            let collaborators = Collaborators {
                store: Some(store.clone()),
                ..Collaborators::default()
            };
            let session = TestSession::new(signature.clone(), questions, collaborators);
            store.save(&signature, &session.record(now))?;
            session
        }
    };

    let set = ComposedSet {
        event: event.clone(),
        time_limit_secs: time_limit,
        questions: session.questions().to_vec(),
        share_indices: session.share_indices(),
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(&set)?;
    std::fs::write(&output, json)
        .with_context(|| format!("failed to write set: {}", output.display()))?;

    print_summary(&set);
    println!("Set written to: {}", output.display());
    println!(
        "Share indices: {}",
        set.share_indices
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",")
    );

    Ok(())
}

fn print_summary(set: &ComposedSet) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Type", "Difficulty", "Prompt"]);

    for (idx, q) in set.questions.iter().enumerate() {
        let prompt: String = if q.prompt.chars().count() > 60 {
            let truncated: String = q.prompt.chars().take(57).collect();
            format!("{truncated}...")
        } else {
            q.prompt.clone()
        };
        table.add_row(vec![
            Cell::new(idx),
            Cell::new(q.kind()),
            Cell::new(format!("{:.2}", q.difficulty)),
            Cell::new(prompt),
        ]);
    }

    println!(
        "{}: {} questions, {}s limit",
        set.event,
        set.questions.len(),
        set.time_limit_secs
    );
    println!("{table}");
}
