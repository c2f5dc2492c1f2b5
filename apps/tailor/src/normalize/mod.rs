//! Normalization engine: the single tolerant boundary between raw editor state
//! and the canonical résumé document.
//!
//! Raw sections arrive as whatever the form collaborators produced over time:
//! bare strings, partial objects, legacy field names (`school`, `degree`,
//! `company`, ...). `normalize` never fails. Malformed or missing fields
//! degrade to empty defaults, and the output is a fixed point:
//! `normalize(to_value(normalize(x))) == normalize(x)`.

pub mod fields;
pub mod handlers;
pub mod sections;

use serde_json::Value;

use crate::models::resume::ResumeDraft;
use fields::{section, section_items};

/// Converts raw editor sections into the canonical résumé document.
pub fn normalize(raw: &Value) -> ResumeDraft {
    ResumeDraft {
        basics: sections::basics(section(raw, &["basics"])),
        work: collect(raw, &["work", "experience"], sections::work),
        education: collect(raw, &["education"], sections::education),
        certificates: collect(
            raw,
            &["certificates", "certifications"],
            sections::certificate,
        ),
        projects: collect(raw, &["projects"], sections::project),
        publications: collect(raw, &["publications"], sections::publication),
        awards: collect(raw, &["awards"], sections::award),
        skills: collect(raw, &["skills"], sections::skill),
    }
}

fn collect<T>(raw: &Value, aliases: &[&str], entry: fn(&Value) -> T) -> Vec<T> {
    section_items(section(raw, aliases))
        .into_iter()
        .map(entry)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messy_draft() -> Value {
        json!({
            "basics": {
                "name": "Ada Lovelace",
                "email": "ada@example.com",
                "location": {"city": "London", "postalCode": 12345},
                "profiles": ["", {"network": "GitHub", "url": "https://github.com/ada"}]
            },
            "experience": [
                {
                    "company": "Analytical Engines",
                    "title": "Programmer",
                    "startDate": "1842-01",
                    "endDate": "Current",
                    "isCurrent": true,
                    "description": ["Wrote note G", "", "Wrote note G"],
                    "bullets": ["Debugged the mill"]
                },
                "Difference Engine Co"
            ],
            "education": [{"school": "Home", "degree": "Tutored", "description": "Mathematics"}],
            "certifications": ["Royal Society"],
            "projects": [{"name": "Bernoulli", "descriptions": ["Computed numbers"]}],
            "publications": [{"title": "Sketch of the Engine", "date": "1843"}],
            "awards": null,
            "skills": ["Mathematics", {"name": "Poetry", "keywords": ["metre"]}, 7]
        })
    }

    #[test]
    fn test_normalize_messy_draft() {
        let r = normalize(&messy_draft());
        assert_eq!(r.basics.name, "Ada Lovelace");
        assert_eq!(r.basics.location.postal_code, "12345");
        assert_eq!(r.basics.profiles.len(), 2);
        assert_eq!(r.basics.profiles[0].url, "");
        assert_eq!(r.work.len(), 2);
        assert_eq!(r.work[0].end_date, "");
        assert_eq!(r.work[0].highlights, vec!["Wrote note G", "Debugged the mill"]);
        assert_eq!(r.work[1].name, "Difference Engine Co");
        assert_eq!(r.education[0].institution, "Home");
        assert_eq!(r.education[0].description, vec!["Mathematics"]);
        assert_eq!(r.certificates[0].name, "Royal Society");
        assert_eq!(r.projects[0].highlights, vec!["Computed numbers"]);
        assert_eq!(r.publications[0].name, "Sketch of the Engine");
        assert_eq!(r.publications[0].release_date, "1843");
        assert!(r.awards.is_empty());
        assert_eq!(r.skills.len(), 3);
        assert_eq!(r.skills[2].name, "");
    }

    fn blank_strings() -> Value {
        json!({
            "work": ["  "],
            "education": [" "],
            "awards": ["\t"],
            "skills": [" "],
            "basics": {"profiles": ["  "], "location": " "}
        })
    }

    #[test]
    fn test_blank_bare_strings_normalize_to_empty() {
        let r = normalize(&blank_strings());
        assert_eq!(r.work[0].name, "");
        assert_eq!(r.education[0].institution, "");
        assert_eq!(r.awards[0].title, "");
        assert_eq!(r.skills[0].name, "");
        assert_eq!(r.basics.profiles[0].url, "");
        assert_eq!(r.basics.location.address, "");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in [messy_draft(), json!({}), json!(null), json!("nonsense"), json!([1, 2]), blank_strings()] {
            let once = normalize(&raw);
            let twice = normalize(&serde_json::to_value(&once).unwrap());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_normalize_empty_input_yields_defaults() {
        let r = normalize(&json!(null));
        assert_eq!(r, ResumeDraft::default());
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["work"], json!([]));
        assert_eq!(v["basics"]["location"]["countryCode"], json!(""));
    }

    #[test]
    fn test_current_entry_never_emits_end_date() {
        for stored in ["2020-01", "Current", ""] {
            let r = normalize(&json!({"work": [{"name": "X", "endDate": stored, "isCurrent": true}]}));
            assert_eq!(r.work[0].end_date, "");
        }
    }

    #[test]
    fn test_canonical_keys_take_priority_over_form_keys() {
        let r = normalize(&json!({
            "work": [{"name": "Canonical"}],
            "experience": [{"company": "Form"}]
        }));
        assert_eq!(r.work.len(), 1);
        assert_eq!(r.work[0].name, "Canonical");
    }
}
