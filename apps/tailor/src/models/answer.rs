use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One user-supplied response to a gap question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRow {
    #[serde(default)]
    pub text: String,
    /// Name of the experience/education entry this answer is linked to.
    #[serde(rename = "experience", default)]
    pub linked_experience: String,
    #[serde(default)]
    pub enhance: bool,
}

impl AnswerRow {
    pub fn linked_to(experience: &str) -> Self {
        Self {
            linked_experience: experience.to_string(),
            ..Default::default()
        }
    }
}

/// Rows per question index. Serialized with string keys (`"0"`, `"1"`, ...).
pub type AnswerMap = BTreeMap<usize, Vec<AnswerRow>>;
