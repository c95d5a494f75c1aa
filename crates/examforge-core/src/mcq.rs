//! Fractional multiple-choice scoring.
//!
//! Correct-answer values are resolved to option text before comparison, so
//! this module never sees index-based answers. The partial-credit policy is
//! total and reproducible: identical inputs always produce the identical
//! score.

use crate::model::{Grade, GradeMethod, Question};

/// Cue phrases that mark a prompt as multi-select.
const MULTI_SELECT_CUES: [&str; 8] = [
    "choose all",
    "select all",
    "all that apply",
    "multi select",
    "multiple select",
    "multiple answers",
    "check all",
    "mark all",
];

/// A question is multi-select when its prompt contains a cue phrase or it
/// has more than one correct value.
pub fn is_multi_select(prompt: &str, correct_count: usize) -> bool {
    if correct_count > 1 {
        return true;
    }
    let lowered = prompt.to_lowercase();
    MULTI_SELECT_CUES.iter().any(|cue| lowered.contains(cue))
}

/// Score a multiple-choice response.
///
/// Single-select: 1.0 when the single selection equals any correct value,
/// else 0.0. Multi-select: exact set match 1.0; at least one correct
/// selection with no incorrect inclusion 0.5; at least one correct
/// selection with incorrect inclusions 0.25; otherwise 0.0. No selection
/// scores 0.0 and is tagged skipped.
pub fn score_mcq(question: &Question, selections: &[String]) -> Grade {
    if selections.is_empty() {
        return Grade::skipped();
    }

    let correct = question.correct_texts();
    if correct.is_empty() {
        tracing::warn!(prompt = %question.prompt, "question has no resolvable correct answers");
        return Grade {
            score: 0.0,
            method: GradeMethod::McqExact,
            skipped: false,
        };
    }

    let score = if is_multi_select(&question.prompt, correct.len()) {
        score_multi(&correct, selections)
    } else {
        let hit = selections.len() == 1 && correct.iter().any(|c| c == &selections[0]);
        if hit {
            1.0
        } else {
            0.0
        }
    };

    Grade {
        score,
        method: GradeMethod::McqExact,
        skipped: false,
    }
}

fn score_multi(correct: &[String], selections: &[String]) -> f64 {
    let correct_selected = selections.iter().filter(|s| correct.contains(s)).count();
    let has_incorrect = selections.iter().any(|s| !correct.contains(s));

    if correct_selected == correct.len() && !has_incorrect {
        1.0
    } else if correct_selected > 0 && !has_incorrect {
        0.5
    } else if correct_selected > 0 {
        0.25
    } else {
        0.0
    }
}
