//! Shape-tolerant field readers shared by the section normalizers.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Reads one scalar out of a raw entry, trying each alias in priority order.
/// The first present, non-blank value wins; numbers count as text.
pub fn first_text(entry: &Map<String, Value>, aliases: &[&str]) -> String {
    aliases
        .iter()
        .filter_map(|key| entry.get(*key).and_then(scalar_text))
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
}

/// A bare string entry, held to the same blank rule as `first_text`.
pub fn text(s: &str) -> String {
    if s.trim().is_empty() {
        String::new()
    } else {
        s.to_string()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerces a raw list slot into trimmed, non-empty strings.
/// A bare string counts as a one-element list.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => scalar_text(other)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
        None => Vec::new(),
    }
}

/// Merges several list slots, in the given key order, keeping the first
/// occurrence of each trimmed value.
pub fn merge_unique(entry: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for key in keys {
        for item in string_list(entry.get(*key)) {
            if seen.insert(item.clone()) {
                out.push(item);
            }
        }
    }
    out
}

/// True when the entry marks itself as ongoing (`isCurrent: true` or `"true"`).
pub fn is_current(entry: &Map<String, Value>) -> bool {
    match entry.get("isCurrent") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// End date as emitted downstream; suppressed for current entries.
pub fn end_date(entry: &Map<String, Value>) -> String {
    if is_current(entry) {
        String::new()
    } else {
        first_text(entry, &["endDate"])
    }
}

/// Items of a raw section: arrays map entry-by-entry, a lone object or string
/// is a one-entry section, anything else is empty.
pub fn section_items(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ (Value::Object(_) | Value::String(_))) => vec![v],
        _ => Vec::new(),
    }
}

/// First present section among the aliases, e.g. `work` then `experience`.
pub fn section<'a>(raw: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| raw.get(*key))
        .find(|v| !v.is_null())
}
