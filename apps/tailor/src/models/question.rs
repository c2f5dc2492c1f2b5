use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageStatus {
    Missing,
    Weak,
}

/// A clarifying prompt produced by gap analysis.
///
/// The backend names the prompt text `question`; `text` is accepted too.
/// Enum-valued fields the backend fills with something unexpected degrade to
/// `None` instead of failing the whole analysis response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapQuestion {
    #[serde(rename = "question", alias = "text", default)]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub skill_tags: BTreeSet<String>,
    #[serde(
        default,
        deserialize_with = "lenient_enum",
        skip_serializing_if = "Option::is_none"
    )]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jd_gap: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_reason: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_enum",
        skip_serializing_if = "Option::is_none"
    )]
    pub coverage_status: Option<CoverageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_bullet: Option<String>,
}

impl GapQuestion {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Analysis responses mix bare strings and full question objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionShape {
    Text(String),
    Full(GapQuestion),
}

/// Decodes a `questions` array entry-by-entry. Entries that are neither a
/// string nor a question object are skipped.
pub fn questions_from_value(value: &Value) -> Vec<GapQuestion> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<QuestionShape>(item.clone()) {
            Ok(QuestionShape::Text(text)) => Some(GapQuestion::from_text(text)),
            Ok(QuestionShape::Full(question)) => Some(question),
            Err(e) => {
                tracing::warn!("Skipping malformed gap question: {e}");
                None
            }
        })
        .collect()
}

fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|v| match v {
        Value::String(s) => serde_json::from_value(Value::String(s.trim().to_lowercase())).ok(),
        _ => None,
    }))
}

fn lenient_tags<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|t| t.as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .collect())
}
