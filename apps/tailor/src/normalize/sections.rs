//! One normalizer per résumé section. Each pattern-matches on the raw entry's
//! shape and produces exactly one canonical record.

use serde_json::{Map, Value};

use super::fields::{end_date, first_text, merge_unique, section_items, text};
use crate::models::resume::{
    AwardEntry, Basics, CertificateEntry, EducationEntry, Location, Profile, ProjectEntry,
    PublicationEntry, SkillEntry, WorkEntry,
};

const WORK_LISTS: &[&str] = &["highlights", "description", "descriptions", "bullets"];
const EDUCATION_LISTS: &[&str] = &["description", "highlights", "descriptions", "bullets"];

pub fn basics(raw: Option<&Value>) -> Basics {
    let Some(Value::Object(b)) = raw else {
        return Basics::default();
    };
    Basics {
        name: first_text(b, &["name"]),
        label: first_text(b, &["label"]),
        email: first_text(b, &["email"]),
        phone: first_text(b, &["phone"]),
        url: first_text(b, &["url"]),
        summary: first_text(b, &["summary"]),
        location: location(b.get("location")),
        profiles: section_items(b.get("profiles"))
            .into_iter()
            .map(profile)
            .collect(),
    }
}

fn location(raw: Option<&Value>) -> Location {
    match raw {
        Some(Value::Object(l)) => Location {
            address: first_text(l, &["address"]),
            city: first_text(l, &["city"]),
            region: first_text(l, &["region"]),
            postal_code: first_text(l, &["postalCode"]),
            country_code: first_text(l, &["countryCode"]),
        },
        Some(Value::String(s)) => Location {
            address: text(s),
            ..Default::default()
        },
        _ => Location::default(),
    }
}

pub fn profile(raw: &Value) -> Profile {
    match raw {
        Value::String(s) => Profile {
            network: String::new(),
            url: text(s),
        },
        Value::Object(p) => Profile {
            network: first_text(p, &["network"]),
            url: first_text(p, &["url"]),
        },
        _ => Profile::default(),
    }
}

pub fn work(raw: &Value) -> WorkEntry {
    match raw {
        Value::String(s) => WorkEntry {
            name: text(s),
            ..Default::default()
        },
        Value::Object(w) => WorkEntry {
            name: first_text(w, &["name", "company"]),
            position: first_text(w, &["position", "title"]),
            start_date: first_text(w, &["startDate"]),
            end_date: end_date(w),
            location: work_location(w),
            highlights: merge_unique(w, WORK_LISTS),
        },
        _ => WorkEntry::default(),
    }
}

// `location` is a plain string on work entries; older forms used `setting`.
fn work_location(w: &Map<String, Value>) -> String {
    first_text(w, &["location", "setting"])
}

pub fn education(raw: &Value) -> EducationEntry {
    match raw {
        Value::String(s) => EducationEntry {
            institution: text(s),
            ..Default::default()
        },
        Value::Object(e) => EducationEntry {
            institution: first_text(e, &["institution", "school"]),
            study_type: first_text(e, &["studyType", "degree"]),
            area: first_text(e, &["area", "field", "focusAreas"]),
            score: first_text(e, &["score", "gpa"]),
            start_date: first_text(e, &["startDate"]),
            end_date: end_date(e),
            description: merge_unique(e, EDUCATION_LISTS),
        },
        _ => EducationEntry::default(),
    }
}

pub fn certificate(raw: &Value) -> CertificateEntry {
    match raw {
        Value::String(s) => CertificateEntry {
            name: text(s),
            ..Default::default()
        },
        Value::Object(c) => CertificateEntry {
            name: first_text(c, &["name"]),
            date: first_text(c, &["date"]),
            issuer: first_text(c, &["issuer", "authority"]),
            url: first_text(c, &["url"]),
        },
        _ => CertificateEntry::default(),
    }
}

pub fn project(raw: &Value) -> ProjectEntry {
    match raw {
        Value::String(s) => ProjectEntry {
            name: text(s),
            ..Default::default()
        },
        Value::Object(p) => ProjectEntry {
            name: first_text(p, &["name"]),
            url: first_text(p, &["url"]),
            highlights: merge_unique(p, WORK_LISTS),
        },
        _ => ProjectEntry::default(),
    }
}

pub fn publication(raw: &Value) -> PublicationEntry {
    match raw {
        Value::String(s) => PublicationEntry {
            name: text(s),
            ..Default::default()
        },
        Value::Object(p) => PublicationEntry {
            name: first_text(p, &["name", "title"]),
            publisher: first_text(p, &["publisher"]),
            release_date: first_text(p, &["releaseDate", "date"]),
            url: first_text(p, &["url"]),
            summary: first_text(p, &["summary"]),
        },
        _ => PublicationEntry::default(),
    }
}

pub fn award(raw: &Value) -> AwardEntry {
    match raw {
        Value::String(s) => AwardEntry {
            title: text(s),
            ..Default::default()
        },
        Value::Object(a) => AwardEntry {
            title: first_text(a, &["title", "name"]),
            awarder: first_text(a, &["awarder", "issuer"]),
            date: first_text(a, &["date"]),
            summary: first_text(a, &["summary", "description"]),
        },
        _ => AwardEntry::default(),
    }
}

pub fn skill(raw: &Value) -> SkillEntry {
    match raw {
        Value::String(s) => SkillEntry {
            name: text(s),
            ..Default::default()
        },
        Value::Object(s) => {
            let level = first_text(s, &["level"]);
            let keywords = merge_unique(s, &["keywords", "items"]);
            SkillEntry {
                name: first_text(s, &["name"]),
                level: (!level.is_empty()).then_some(level),
                keywords: (!keywords.is_empty()).then_some(keywords),
            }
        }
        _ => SkillEntry::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_work_legacy_fields_and_current_role() {
        let w = work(&json!({
            "company": "Leidos",
            "title": "Engineer",
            "startDate": "2021-03",
            "endDate": "Current",
            "isCurrent": true,
            "setting": "Remote",
            "description": ["Built the ingest pipeline", "  "]
        }));
        assert_eq!(w.name, "Leidos");
        assert_eq!(w.position, "Engineer");
        assert_eq!(w.end_date, "");
        assert_eq!(w.location, "Remote");
        assert_eq!(w.highlights, vec!["Built the ingest pipeline"]);
    }

    #[test]
    fn test_work_keeps_end_date_when_not_current() {
        let w = work(&json!({"name": "RAIC Labs", "endDate": "2020-05", "isCurrent": false}));
        assert_eq!(w.end_date, "2020-05");
    }

    #[test]
    fn test_education_aliases() {
        let e = education(&json!({
            "school": "Ohio State",
            "degree": "BS",
            "focusAreas": "CS",
            "gpa": 3.9,
            "isCurrent": true,
            "endDate": "2024-05"
        }));
        assert_eq!(e.institution, "Ohio State");
        assert_eq!(e.study_type, "BS");
        assert_eq!(e.area, "CS");
        assert_eq!(e.score, "3.9");
        assert_eq!(e.end_date, "");
        assert!(e.description.is_empty());
    }

    #[test]
    fn test_bare_strings_become_primary_field() {
        assert_eq!(certificate(&json!("AWS SAA")).name, "AWS SAA");
        assert_eq!(project(&json!("tailor")).name, "tailor");
        assert_eq!(award(&json!("Dean's List")).title, "Dean's List");
        assert_eq!(skill(&json!("Rust")).name, "Rust");
        assert_eq!(profile(&json!("https://github.com/x")).url, "https://github.com/x");
        assert_eq!(profile(&json!("https://github.com/x")).network, "");
    }

    #[test]
    fn test_project_merges_all_bullet_sources() {
        let p = project(&json!({
            "name": "tailor",
            "descriptions": ["Wrote the engine"],
            "highlights": ["Led design", "Wrote the engine"],
            "bullets": "Shipped it"
        }));
        assert_eq!(p.highlights, vec!["Led design", "Wrote the engine", "Shipped it"]);
    }

    #[test]
    fn test_skill_detail_only_when_supplied() {
        let bare = skill(&json!({"name": "Go", "level": "", "keywords": []}));
        assert_eq!(bare.level, None);
        assert_eq!(bare.keywords, None);

        let detailed = skill(&json!({"name": "Go", "level": "Advanced", "items": ["gRPC"]}));
        assert_eq!(detailed.level.as_deref(), Some("Advanced"));
        assert_eq!(detailed.keywords, Some(vec!["gRPC".to_string()]));
    }

    #[test]
    fn test_non_object_entries_degrade_to_defaults() {
        assert_eq!(work(&json!(42)), WorkEntry::default());
        assert_eq!(award(&Value::Null), AwardEntry::default());
    }
}
