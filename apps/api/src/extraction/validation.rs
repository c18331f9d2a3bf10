//! Validation of the model's structured extraction before it becomes part of a profile.
//!
//! Nothing the model returns is trusted as-is: strings are trimmed, lists deduplicated and
//! capped, numbers range-checked. Values that fail a check are dropped, not repaired.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::models::profile::{
    ContactBasics, EducationLevel, EducationSummary, ExperienceSummary, ParsingQuality, Position,
    StructuredProfile,
};

const MAX_SKILLS: usize = 60;
const MAX_POSITIONS: usize = 20;
const MAX_CERTIFICATIONS: usize = 20;
const MAX_FIELD_CHARS: usize = 200;
const MAX_TOTAL_YEARS: f64 = 60.0;

// Every leaf is read leniently: `null` or a value of the wrong JSON type becomes the field's
// default instead of failing the whole extraction.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExtraction {
    #[serde(default, deserialize_with = "lenient")]
    basics: RawBasics,
    #[serde(default, deserialize_with = "lenient")]
    skills: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    experience: RawExperience,
    #[serde(default, deserialize_with = "lenient")]
    education: RawEducation,
    #[serde(default, deserialize_with = "lenient")]
    certifications: Vec<Value>,
    #[serde(default)]
    confidence: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBasics {
    #[serde(default, deserialize_with = "lenient_text")]
    first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    location: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    headline: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExperience {
    #[serde(default)]
    total_years: Option<Value>,
    /// Parsed one by one so a malformed entry only drops itself.
    #[serde(default, deserialize_with = "lenient")]
    positions: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPosition {
    #[serde(default, deserialize_with = "lenient_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    company: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEducation {
    #[serde(default, deserialize_with = "lenient_text")]
    level: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    degree: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    field: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Strings as-is, numbers spelled out (phone numbers come back as numbers), anything else absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedExtraction {
    pub structured: Option<StructuredProfile>,
    pub quality: ParsingQuality,
    pub confidence: u8,
}

pub fn validate(raw: RawExtraction) -> ValidatedExtraction {
    let basics = ContactBasics {
        first_name: clean(raw.basics.first_name),
        last_name: clean(raw.basics.last_name),
        email: clean(raw.basics.email).filter(|e| looks_like_email(e)),
        phone: clean(raw.basics.phone),
        location: clean(raw.basics.location),
        headline: clean(raw.basics.headline),
    };

    let skills = clean_list(raw.skills, MAX_SKILLS);
    let certifications = clean_list(raw.certifications, MAX_CERTIFICATIONS);

    let positions: Vec<Position> = raw
        .experience
        .positions
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawPosition>(v).ok())
        .filter_map(|p| {
            Some(Position {
                title: clean(p.title)?,
                company: clean(p.company).unwrap_or_default(),
                duration: clean(p.duration),
            })
        })
        .take(MAX_POSITIONS)
        .collect();
    let total_years = raw
        .experience
        .total_years
        .as_ref()
        .and_then(number)
        .filter(|y| (0.0..=MAX_TOTAL_YEARS).contains(y))
        .map(|y| y as f32);

    let degree = clean(raw.education.degree);
    let level = raw
        .education
        .level
        .as_deref()
        .and_then(|l| l.trim().to_lowercase().parse::<EducationLevel>().ok())
        .or_else(|| degree.as_deref().and_then(EducationLevel::detect));
    let education = EducationSummary {
        level,
        degree,
        field: clean(raw.education.field),
    };

    let has_experience = !positions.is_empty() || total_years.is_some();
    let has_education = education.level.is_some() || education.degree.is_some();
    let has_contact = basics.email.is_some() || basics.first_name.is_some();

    let quality = if !skills.is_empty() && has_experience && has_education {
        ParsingQuality::Full
    } else if !skills.is_empty() || has_experience || has_education || has_contact {
        ParsingQuality::Partial
    } else {
        ParsingQuality::TextOnly
    };

    let reported = raw
        .confidence
        .as_ref()
        .and_then(number)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 100.0).round() as u8);
    // A partial extraction never claims more confidence than a full one would by default
    let confidence = match quality {
        ParsingQuality::Full => reported.unwrap_or(quality.default_confidence()),
        _ => reported
            .unwrap_or(quality.default_confidence())
            .min(quality.default_confidence()),
    };

    let structured = (quality != ParsingQuality::TextOnly).then(|| StructuredProfile {
        basics,
        skills,
        experience: ExperienceSummary {
            total_years,
            positions,
        },
        education,
        certifications,
    });

    ValidatedExtraction {
        structured,
        quality,
        confidence,
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().chars().take(MAX_FIELD_CHARS).collect::<String>())
        .filter(|v| !v.is_empty())
}

/// Accepts strings and `{"name": ...}` objects, dedupes case-insensitively, keeps first spelling.
fn clean_list(values: Vec<Value>, cap: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            Value::Object(mut map) => match map.remove("name") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            },
            _ => None,
        })
        .filter_map(|s| clean(Some(s)))
        .filter(|s| seen.insert(s.to_lowercase()))
        .take(cap)
        .collect()
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('+').parse().ok(),
        _ => None,
    }
}

fn looks_like_email(s: &str) -> bool {
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !s.contains(' '),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: Value) -> RawExtraction {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_extraction() {
        let v = validate(raw(json!({
            "basics": { "firstName": " Ada ", "email": "ada@example.com" },
            "skills": ["Python", "SQL", "python"],
            "experience": { "totalYears": 6, "positions": [{ "title": "Engineer", "company": "Acme" }] },
            "education": { "degree": "B.S. Computer Science" },
            "confidence": 92
        })));

        assert_eq!(v.quality, ParsingQuality::Full);
        assert_eq!(v.confidence, 92);
        let s = v.structured.unwrap();
        assert_eq!(s.basics.first_name.as_deref(), Some("Ada"));
        assert_eq!(s.skills, vec!["Python", "SQL"]);
        assert_eq!(s.education.level, Some(EducationLevel::Bachelor));
        assert_eq!(s.experience.total_years, Some(6.0));
    }

    #[test]
    fn test_partial_caps_confidence() {
        let v = validate(raw(json!({ "skills": ["Excel"], "confidence": 99 })));
        assert_eq!(v.quality, ParsingQuality::Partial);
        assert_eq!(v.confidence, ParsingQuality::Partial.default_confidence());
    }

    #[test]
    fn test_empty_extraction_is_text_only() {
        let v = validate(RawExtraction::default());
        assert_eq!(v.quality, ParsingQuality::TextOnly);
        assert!(v.structured.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_years_and_bad_email() {
        let v = validate(raw(json!({
            "basics": { "email": "not an email" },
            "skills": ["Go"],
            "experience": { "totalYears": 400 }
        })));
        let s = v.structured.unwrap();
        assert!(s.basics.email.is_none());
        assert!(s.experience.total_years.is_none());
    }

    #[test]
    fn test_lenient_number_and_object_lists() {
        let v = validate(raw(json!({
            "skills": [{ "name": "Welding" }, 7],
            "experience": { "totalYears": "5+" },
            "certifications": [{ "name": "OSHA 30" }]
        })));
        let s = v.structured.unwrap();
        assert_eq!(s.skills, vec!["Welding"]);
        assert_eq!(s.experience.total_years, Some(5.0));
        assert_eq!(s.certifications, vec!["OSHA 30"]);
    }

    #[test]
    fn test_nulls_and_wrong_types_degrade_per_field() {
        let v = validate(raw(json!({
            "basics": null,
            "skills": "Python",
            "experience": {
                "totalYears": 4,
                "positions": [{ "title": "Nurse", "company": 12 }, "Charge Nurse", { "title": null }]
            },
            "education": { "degree": ["BSN"], "level": "bachelor" },
            "certifications": null
        })));

        assert_eq!(v.quality, ParsingQuality::Partial);
        let s = v.structured.unwrap();
        assert_eq!(s.basics, ContactBasics::default());
        assert!(s.skills.is_empty());
        assert_eq!(s.experience.total_years, Some(4.0));
        assert_eq!(s.experience.positions.len(), 1);
        assert_eq!(s.experience.positions[0].title, "Nurse");
        assert_eq!(s.experience.positions[0].company, "12");
        assert!(s.education.degree.is_none());
        assert_eq!(s.education.level, Some(EducationLevel::Bachelor));
    }
}
