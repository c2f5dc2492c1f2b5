//! Answers record format and migration of the shapes older editors stored.
//!
//! Version 1 (implicit, no envelope) was a bare `{index: value}` map where a
//! value could be a single answer string or an array of partial row objects.
//! Version 2 wraps a full `AnswerMap` in an envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::models::answer::{AnswerMap, AnswerRow};

pub const ANSWERS_FORMAT_VERSION: u64 = 2;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswersEnvelope {
    pub version: u64,
    pub saved_at: DateTime<Utc>,
    pub answers: AnswerMap,
}

impl AnswersEnvelope {
    pub fn current(answers: AnswerMap) -> Self {
        Self {
            version: ANSWERS_FORMAT_VERSION,
            saved_at: Utc::now(),
            answers,
        }
    }
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("answers record is not JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("answers record has an unsupported shape ({0})")]
    Shape(&'static str),

    #[error("answers record version {0} is newer than supported")]
    FutureVersion(u64),
}

#[derive(Debug, PartialEq)]
pub enum DecodedAnswers {
    /// Already in the current format; nothing to write back.
    Current(AnswerMap),
    /// Coerced from an older shape; the caller persists it immediately.
    Migrated(AnswerMap),
}

/// Decodes a stored answers record, migrating legacy shapes.
pub fn decode_answers(raw: &str) -> Result<DecodedAnswers, MigrationError> {
    let value: Value = serde_json::from_str(raw)?;

    if let Some(version) = value.get("version").and_then(Value::as_u64) {
        if version > ANSWERS_FORMAT_VERSION {
            return Err(MigrationError::FutureVersion(version));
        }
        let answers = value.get("answers").cloned().unwrap_or(Value::Null);
        if version == ANSWERS_FORMAT_VERSION {
            if let Ok(map) = serde_json::from_value::<AnswerMap>(answers.clone()) {
                if map.values().all(|rows| !rows.is_empty()) {
                    return Ok(DecodedAnswers::Current(map));
                }
            }
        }
        return coerce_map(&answers).map(DecodedAnswers::Migrated);
    }

    coerce_map(&value).map(DecodedAnswers::Migrated)
}

fn coerce_map(value: &Value) -> Result<AnswerMap, MigrationError> {
    match value {
        Value::Object(entries) => Ok(entries
            .iter()
            .filter_map(|(key, rows)| match key.trim().parse::<usize>() {
                Ok(index) => Some((index, coerce_rows(rows))),
                Err(_) => {
                    warn!("Dropping answers under non-index key '{key}'");
                    None
                }
            })
            .collect()),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(index, rows)| (index, coerce_rows(rows)))
            .collect()),
        Value::Null => Ok(AnswerMap::new()),
        _ => Err(MigrationError::Shape("expected a map of question index to rows")),
    }
}

/// Every question keeps at least one row, even if the stored value was empty.
fn coerce_rows(value: &Value) -> Vec<AnswerRow> {
    let rows: Vec<AnswerRow> = match value {
        Value::Array(items) => items.iter().filter_map(coerce_row).collect(),
        other => coerce_row(other).into_iter().collect(),
    };
    if rows.is_empty() {
        vec![AnswerRow::default()]
    } else {
        rows
    }
}

fn coerce_row(value: &Value) -> Option<AnswerRow> {
    match value {
        Value::String(s) => Some(AnswerRow {
            text: s.clone(),
            ..Default::default()
        }),
        Value::Number(n) => Some(AnswerRow {
            text: n.to_string(),
            ..Default::default()
        }),
        Value::Object(row) => Some(row_from_object(row)),
        _ => None,
    }
}

fn row_from_object(row: &Map<String, Value>) -> AnswerRow {
    let text_of = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| match row.get(*k) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_default()
    };
    let enhance = match row.get("enhance") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    AnswerRow {
        text: text_of(&["text", "answer"]),
        linked_experience: text_of(&["experience", "linkedExperience"]),
        enhance,
    }
}
