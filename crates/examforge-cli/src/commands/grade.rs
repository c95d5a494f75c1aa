//! The `examforge grade` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examforge_core::answers::AnswerSheet;
use examforge_core::model::{Answer, Grade, GradeMethod};
use examforge_core::pipeline::GradingPipeline;
use examforge_providers::config::{batch_grader, load_config_from};

use super::ComposedSet;

pub async fn execute(
    set_path: PathBuf,
    answers_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let set: ComposedSet = {
        let content = std::fs::read_to_string(&set_path)
            .with_context(|| format!("failed to read set: {}", set_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse set: {}", set_path.display()))?
    };

    let responses: BTreeMap<usize, Answer> = {
        let content = std::fs::read_to_string(&answers_path)
            .with_context(|| format!("failed to read answers: {}", answers_path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse answers: {}", answers_path.display()))?
    };

    let mut sheet = AnswerSheet::new();
    for (index, answer) in responses {
        anyhow::ensure!(
            index < set.questions.len(),
            "answer index {index} is out of range for a {}-question set",
            set.questions.len()
        );
        match answer {
            Answer::Selected { values } => {
                for value in values {
                    sheet.toggle(index, value);
                }
            }
            Answer::FreeText { text } => sheet.write_text(index, text),
        }
    }

    // Without a configured grader the pipeline runs offline: exact match
    // plus the similarity fallback.
    let grader = batch_grader(&config);
    if grader.is_none() {
        eprintln!("No grading service configured; using offline tiers.");
    }
    let pipeline = GradingPipeline::new(grader);
    let report = pipeline.grade(&set.event, &set.questions, &sheet, 0).await;

    print_grades(&set, &report.grades);
    println!(
        "Score: {:.2} / {} ({} attempted)",
        report.score_sum(),
        set.questions.len(),
        report.attempted()
    );

    Ok(())
}

fn print_grades(set: &ComposedSet, grades: &BTreeMap<usize, Grade>) {
    let mut table = Table::new();
    table.set_header(vec!["#", "Type", "Tier", "Score"]);

    for (idx, q) in set.questions.iter().enumerate() {
        let (tier, score) = match grades.get(&idx) {
            Some(g) if g.skipped => ("skipped".to_string(), "-".to_string()),
            Some(g) => (tier_name(g.method).to_string(), format!("{:.2}", g.score)),
            None => ("-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            Cell::new(idx),
            Cell::new(q.kind()),
            Cell::new(tier),
            Cell::new(score),
        ]);
    }

    println!("{table}");
}

fn tier_name(method: GradeMethod) -> &'static str {
    match method {
        GradeMethod::McqExact => "mcq",
        GradeMethod::ExactText => "exact",
        GradeMethod::Remote => "remote",
        GradeMethod::Fuzzy => "fuzzy",
        GradeMethod::ContestOverride => "contest",
    }
}
