//! Grading pipeline.
//!
//! Grading runs once per submission over the full question list. Multiple
//! choice is scored locally. Free response walks an ordered strategy chain
//! per item: normalized exact match, then the remote batch grader, then the
//! local similarity fallback. A remote failure degrades the whole batch to
//! the fallback; grading never errors out of a submission.
//!
//! Every report carries the generation it was computed for, so a report
//! that arrives after the session was reset can be detected and dropped.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::answers::AnswerSheet;
use crate::mcq::score_mcq;
use crate::model::{Grade, GradeMethod, Question, QuestionKind};
use crate::text::{normalize_text, similarity};
use crate::traits::{BatchGrader, FrqItem};

/// The grades for one submission, tagged with the session generation they
/// were computed under.
#[derive(Debug, Clone)]
pub struct GradeReport {
    pub generation: u64,
    pub grades: BTreeMap<usize, Grade>,
}

impl GradeReport {
    /// Sum of all scores, in question units.
    pub fn score_sum(&self) -> f64 {
        self.grades.values().map(|g| g.score).sum()
    }

    /// Number of non-skipped responses.
    pub fn attempted(&self) -> usize {
        self.grades.values().filter(|g| !g.skipped).count()
    }

    /// Score sum rounded to the nearest whole question, for aggregate
    /// metrics.
    pub fn correct_rounded(&self) -> usize {
        self.score_sum().round().max(0.0) as usize
    }
}

/// Grades a full submission. The remote grader is optional; without one,
/// free response falls straight through to the similarity tiers.
pub struct GradingPipeline {
    grader: Option<Arc<dyn BatchGrader>>,
}

impl GradingPipeline {
    pub fn new(grader: Option<Arc<dyn BatchGrader>>) -> Self {
        GradingPipeline { grader }
    }

    /// Grade every question against the answer sheet.
    pub async fn grade(
        &self,
        event: &str,
        questions: &[Question],
        sheet: &AnswerSheet,
        generation: u64,
    ) -> GradeReport {
        let mut grades = BTreeMap::new();
        let mut pending: Vec<(usize, FrqItem)> = Vec::new();

        for (idx, question) in questions.iter().enumerate() {
            match question.kind() {
                QuestionKind::Mcq => {
                    let selections = sheet.selections(idx);
                    grades.insert(idx, score_mcq(question, &selections));
                }
                QuestionKind::Frq => match sheet.free_text(idx) {
                    None => {
                        grades.insert(idx, Grade::skipped());
                    }
                    Some(text) => {
                        if exact_text_match(question, text) {
                            grades.insert(
                                idx,
                                Grade {
                                    score: 1.0,
                                    method: GradeMethod::ExactText,
                                    skipped: false,
                                },
                            );
                        } else {
                            pending.push((
                                idx,
                                FrqItem {
                                    question: question.prompt.clone(),
                                    correct_answers: question.correct_texts(),
                                    student_answer: text.to_string(),
                                },
                            ));
                        }
                    }
                },
            }
        }

        if !pending.is_empty() {
            self.grade_pending(event, questions, &pending, &mut grades)
                .await;
        }

        GradeReport { generation, grades }
    }

    /// Grade the items the exact-match tier could not settle: remote batch
    /// first, similarity fallback on any failure.
    async fn grade_pending(
        &self,
        event: &str,
        questions: &[Question],
        pending: &[(usize, FrqItem)],
        grades: &mut BTreeMap<usize, Grade>,
    ) {
        if let Some(grader) = &self.grader {
            let items: Vec<FrqItem> = pending.iter().map(|(_, item)| item.clone()).collect();
            match grader.grade_batch(event, &items).await {
                Ok(scores) if scores.len() == items.len() => {
                    for ((idx, _), score) in pending.iter().zip(scores) {
                        grades.insert(
                            *idx,
                            Grade {
                                score: coerce_rubric(score),
                                method: GradeMethod::Remote,
                                skipped: false,
                            },
                        );
                    }
                    return;
                }
                Ok(scores) => {
                    tracing::warn!(
                        expected = items.len(),
                        got = scores.len(),
                        "remote grader returned a misaligned batch, falling back"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "remote grading failed, falling back");
                }
            }
        }

        for (idx, item) in pending {
            grades.insert(*idx, fuzzy_grade(&questions[*idx], &item.student_answer));
        }
    }
}

/// Normalized exact comparison against any correct answer.
fn exact_text_match(question: &Question, text: &str) -> bool {
    let normalized = normalize_text(text);
    if normalized.is_empty() {
        return false;
    }
    question
        .correct_texts()
        .iter()
        .any(|c| normalize_text(c) == normalized)
}

/// Hold a remote score to the {0, 0.5, 1} rubric. Any value not exactly
/// on the rubric coerces to 0.
fn coerce_rubric(score: f64) -> f64 {
    if score == 0.0 || score == 0.5 || score == 1.0 {
        score
    } else {
        0.0
    }
}

/// Local similarity fallback: best similarity across the correct answers,
/// mapped onto partial-credit tiers.
fn fuzzy_grade(question: &Question, answer: &str) -> Grade {
    let student = normalize_text(answer);
    let best = question
        .correct_texts()
        .iter()
        .map(|c| similarity(&normalize_text(c), &student))
        .fold(0.0_f64, f64::max);

    let score = if best >= 0.90 {
        1.0
    } else if best >= 0.75 {
        0.75
    } else if best >= 0.60 {
        0.5
    } else if best >= 0.45 {
        0.25
    } else {
        0.0
    };

    Grade {
        score,
        method: GradeMethod::Fuzzy,
        skipped: false,
    }
}
