//! The answer sheet: question index → response.
//!
//! At most one record per index; records are overwritten on change, never
//! duplicated. The owning session persists the sheet synchronously after
//! every mutation so a reload reconstructs the exact in-progress state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::Answer;

/// Durable map of question index → response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerSheet {
    responses: BTreeMap<usize, Answer>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&Answer> {
        self.responses.get(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Number of answered (non-blank) questions.
    pub fn answered_count(&self) -> usize {
        self.responses.values().filter(|a| !a.is_blank()).count()
    }

    /// Single-select: replace the stored list with exactly the new
    /// selection.
    pub fn select(&mut self, index: usize, value: impl Into<String>) {
        self.responses.insert(
            index,
            Answer::Selected {
                values: vec![value.into()],
            },
        );
    }

    /// Multi-select: toggle membership, leaving other selections intact.
    pub fn toggle(&mut self, index: usize, value: impl Into<String>) {
        let value = value.into();
        let entry = self
            .responses
            .entry(index)
            .or_insert(Answer::Selected { values: vec![] });
        match entry {
            Answer::Selected { values } => {
                if let Some(pos) = values.iter().position(|v| *v == value) {
                    values.remove(pos);
                } else {
                    values.push(value);
                }
            }
            // A free-text record switching to selection replaces outright.
            Answer::FreeText { .. } => {
                *entry = Answer::Selected {
                    values: vec![value],
                };
            }
        }
    }

    /// Free response: replace the stored text.
    pub fn write_text(&mut self, index: usize, text: impl Into<String>) {
        self.responses.insert(
            index,
            Answer::FreeText { text: text.into() },
        );
    }

    /// Remove the record for one index.
    pub fn clear_index(&mut self, index: usize) {
        self.responses.remove(&index);
    }

    /// Remove every record (session reset).
    pub fn clear(&mut self) {
        self.responses.clear();
    }

    /// Selected option values for an index, empty when unanswered.
    pub fn selections(&self, index: usize) -> Vec<String> {
        match self.responses.get(&index) {
            Some(Answer::Selected { values }) => values.clone(),
            _ => Vec::new(),
        }
    }

    /// Free-text response for an index, when one exists and is non-blank.
    pub fn free_text(&self, index: usize) -> Option<&str> {
        match self.responses.get(&index) {
            Some(Answer::FreeText { text }) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }
}
