//! Answer rows per gap question.
//!
//! Invariant: every question index that has an entry has at least one row.
//! It is enforced here, in the mutation operations, not by whoever renders.

use serde::Deserialize;
use thiserror::Error;

use crate::models::answer::{AnswerMap, AnswerRow};
use crate::models::question::GapQuestion;

#[derive(Debug, Error, PartialEq)]
pub enum AnswerError {
    #[error("No question at index {0}")]
    UnknownQuestion(usize),

    #[error("Question {question} has no answer row {row}")]
    UnknownRow { question: usize, row: usize },
}

/// One field of one answer row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum AnswerField {
    Text(String),
    #[serde(alias = "experience")]
    LinkedExperience(String),
    Enhance(bool),
}

#[derive(Debug, Clone)]
pub struct AnswerAggregator {
    rows: AnswerMap,
    options: Vec<String>,
    min_chars: usize,
}

impl AnswerAggregator {
    pub fn new(options: Vec<String>, min_chars: usize) -> Self {
        Self {
            rows: AnswerMap::new(),
            options,
            min_chars,
        }
    }

    pub fn rows(&self) -> &AnswerMap {
        &self.rows
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    fn default_row(&self) -> AnswerRow {
        AnswerRow::linked_to(self.options.first().map(String::as_str).unwrap_or_default())
    }

    /// Option whose name contains the anchor (case-insensitive), else the first.
    fn option_for_anchor(&self, anchor: Option<&str>) -> String {
        let anchor = anchor.map(str::trim).filter(|a| !a.is_empty());
        anchor
            .and_then(|a| {
                let a = a.to_lowercase();
                self.options.iter().find(|o| o.to_lowercase().contains(&a))
            })
            .or_else(|| self.options.first())
            .cloned()
            .unwrap_or_default()
    }

    /// Drops every row and seeds one row per question.
    pub fn rebuild(&mut self, questions: &[GapQuestion]) {
        self.rows = questions
            .iter()
            .enumerate()
            .map(|(i, q)| {
                let link = self.option_for_anchor(q.target_anchor.as_deref());
                (i, vec![AnswerRow::linked_to(&link)])
            })
            .collect();
    }

    /// Adopts persisted rows for the current questions. Indices past the
    /// question count are dropped; missing ones get a seeded row.
    pub fn restore(&mut self, mut persisted: AnswerMap, questions: &[GapQuestion]) {
        self.rebuild(questions);
        for (index, seeded) in self.rows.iter_mut() {
            if let Some(rows) = persisted.remove(index).filter(|r| !r.is_empty()) {
                *seeded = rows;
            }
        }
        self.backfill_links();
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Replaces the link options and fills rows that have no link yet.
    pub fn set_options(&mut self, options: Vec<String>) {
        self.options = options;
        self.backfill_links();
    }

    fn backfill_links(&mut self) {
        let Some(first) = self.options.first().cloned() else {
            return;
        };
        for row in self.rows.values_mut().flatten() {
            if row.linked_experience.is_empty() {
                row.linked_experience = first.clone();
            }
        }
    }

    fn question_rows(&mut self, question: usize) -> Result<&mut Vec<AnswerRow>, AnswerError> {
        self.rows
            .get_mut(&question)
            .ok_or(AnswerError::UnknownQuestion(question))
    }

    pub fn add_row(&mut self, question: usize) -> Result<(), AnswerError> {
        let row = self.default_row();
        self.question_rows(question)?.push(row);
        Ok(())
    }

    /// Removes the last row, or clears the text of the only row.
    pub fn remove_row(&mut self, question: usize) -> Result<(), AnswerError> {
        let rows = self.question_rows(question)?;
        if rows.len() > 1 {
            rows.pop();
        } else if let Some(only) = rows.first_mut() {
            only.text.clear();
        }
        Ok(())
    }

    pub fn set_field(
        &mut self,
        question: usize,
        row: usize,
        field: AnswerField,
    ) -> Result<(), AnswerError> {
        let target = self
            .question_rows(question)?
            .get_mut(row)
            .ok_or(AnswerError::UnknownRow { question, row })?;
        match field {
            AnswerField::Text(text) => target.text = text,
            AnswerField::LinkedExperience(link) => target.linked_experience = link,
            AnswerField::Enhance(on) => target.enhance = on,
        }
        Ok(())
    }

    /// A question is answered once any row carries enough signal.
    pub fn is_answered(&self, question: usize) -> bool {
        self.rows.get(&question).is_some_and(|rows| {
            rows.iter()
                .any(|r| r.text.trim().chars().count() >= self.min_chars)
        })
    }

    /// Indices of questions that are not answered yet.
    pub fn unanswered(&self, question_count: usize) -> Vec<usize> {
        (0..question_count).filter(|&q| !self.is_answered(q)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregator(question_count: usize) -> AnswerAggregator {
        let mut a = AnswerAggregator::new(vec!["Leidos".into(), "City of Mansfield".into()], 8);
        let qs: Vec<GapQuestion> = (0..question_count)
            .map(|i| GapQuestion::from_text(format!("Q{i}")))
            .collect();
        a.rebuild(&qs);
        a
    }

    #[test]
    fn test_rebuild_seeds_one_row_per_question() {
        let a = aggregator(3);
        assert_eq!(a.rows().len(), 3);
        assert!(a.rows().values().all(|r| r.len() == 1));
        assert_eq!(a.rows()[&0][0].linked_experience, "Leidos");
    }

    #[test]
    fn test_rebuild_links_anchor_option() {
        let mut a = aggregator(0);
        let mut q = GapQuestion::from_text("Permitting work?");
        q.target_anchor = Some("mansfield".into());
        a.rebuild(&[q]);
        assert_eq!(a.rows()[&0][0].linked_experience, "City of Mansfield");
    }

    #[test]
    fn test_add_row_uses_first_option() {
        let mut a = aggregator(1);
        a.add_row(0).unwrap();
        assert_eq!(a.rows()[&0].len(), 2);
        assert_eq!(a.rows()[&0][1], AnswerRow::linked_to("Leidos"));
    }

    #[test]
    fn test_remove_last_row_clears_instead_of_deleting() {
        let mut a = aggregator(1);
        a.set_field(0, 0, AnswerField::Text("abc".into())).unwrap();
        a.remove_row(0).unwrap();
        assert_eq!(a.rows()[&0].len(), 1);
        assert_eq!(a.rows()[&0][0].text, "");
        a.remove_row(0).unwrap();
        assert_eq!(a.rows()[&0].len(), 1);
    }

    #[test]
    fn test_remove_row_pops_last_when_several() {
        let mut a = aggregator(1);
        a.add_row(0).unwrap();
        a.set_field(0, 1, AnswerField::Text("second".into())).unwrap();
        a.remove_row(0).unwrap();
        assert_eq!(a.rows()[&0].len(), 1);
        assert_eq!(a.rows()[&0][0].text, "");
    }

    #[test]
    fn test_set_field_touches_one_field_only() {
        let mut a = aggregator(2);
        a.add_row(0).unwrap();
        let before = a.rows().clone();
        a.set_field(0, 1, AnswerField::Enhance(true)).unwrap();

        assert!(a.rows()[&0][1].enhance);
        assert_eq!(a.rows()[&0][1].text, before[&0][1].text);
        assert_eq!(a.rows()[&0][0], before[&0][0]);
        assert_eq!(a.rows()[&1], before[&1]);
    }

    #[test]
    fn test_unknown_indices_change_nothing() {
        let mut a = aggregator(1);
        let before = a.rows().clone();
        assert_eq!(a.add_row(5), Err(AnswerError::UnknownQuestion(5)));
        assert_eq!(
            a.set_field(0, 3, AnswerField::Text("x".into())),
            Err(AnswerError::UnknownRow { question: 0, row: 3 })
        );
        assert_eq!(a.rows(), &before);
    }

    #[test]
    fn test_answered_threshold_is_eight_trimmed_chars() {
        let mut a = aggregator(1);
        a.set_field(0, 0, AnswerField::Text("  1234567  ".into())).unwrap();
        assert!(!a.is_answered(0));
        a.set_field(0, 0, AnswerField::Text(" 12345678 ".into())).unwrap();
        assert!(a.is_answered(0));
    }

    #[test]
    fn test_any_row_can_satisfy_question() {
        let mut a = aggregator(1);
        a.add_row(0).unwrap();
        a.set_field(0, 1, AnswerField::Text("Ran 40 deploys a week".into())).unwrap();
        assert!(a.unanswered(1).is_empty());
    }

    #[test]
    fn test_restore_keeps_rows_for_known_questions() {
        let mut persisted = AnswerMap::new();
        persisted.insert(0, vec![AnswerRow { text: "kept".into(), ..Default::default() }]);
        persisted.insert(1, vec![]);
        persisted.insert(9, vec![AnswerRow::default()]);

        let mut a = AnswerAggregator::new(vec!["Leidos".into()], 8);
        a.restore(persisted, &[GapQuestion::from_text("a"), GapQuestion::from_text("b")]);

        assert_eq!(a.rows().len(), 2);
        assert_eq!(a.rows()[&0][0].text, "kept");
        assert_eq!(a.rows()[&0][0].linked_experience, "Leidos");
        assert_eq!(a.rows()[&1].len(), 1);
    }

    #[test]
    fn test_answer_field_wire_format() {
        let f: AnswerField =
            serde_json::from_str(r#"{"field": "experience", "value": "Leidos"}"#).unwrap();
        assert_eq!(f, AnswerField::LinkedExperience("Leidos".into()));
        let f: AnswerField = serde_json::from_str(r#"{"field": "enhance", "value": true}"#).unwrap();
        assert_eq!(f, AnswerField::Enhance(true));
    }
}
