use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confidence below this value means the caller should offer manual correction.
pub const LOW_CONFIDENCE_CUTOFF: u8 = 50;

/// How much of a résumé the extraction pass managed to recover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParsingQuality {
    Full,
    Partial,
    TextOnly,
    Failed,
}

impl ParsingQuality {
    /// Confidence assigned when the extractor did not report one itself.
    pub fn default_confidence(self) -> u8 {
        match self {
            ParsingQuality::Full => 90,
            ParsingQuality::Partial => 65,
            ParsingQuality::TextOnly => 35,
            ParsingQuality::Failed => 0,
        }
    }
}

/// Ordered education levels. Ordering is used for requirement comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl EducationLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            EducationLevel::HighSchool => "high_school",
            EducationLevel::Associate => "associate",
            EducationLevel::Bachelor => "bachelor",
            EducationLevel::Master => "master",
            EducationLevel::Doctorate => "doctorate",
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            EducationLevel::HighSchool => 1,
            EducationLevel::Associate => 2,
            EducationLevel::Bachelor => 3,
            EducationLevel::Master => 4,
            EducationLevel::Doctorate => 5,
        }
    }

    /// Loose recognition of free-text degree descriptions ("B.S. Computer Science", "PhD").
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase().replace('.', "");
        let words: Vec<String> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect();
        let has = |w: &str| words.iter().any(|x| x == w);

        if lower.contains("doctor") || has("phd") {
            Some(EducationLevel::Doctorate)
        } else if lower.contains("master") || has("msc") || has("mba") || has("ms") || has("ma") {
            Some(EducationLevel::Master)
        } else if lower.contains("bachelor") || has("bsc") || has("bs") || has("ba") || has("beng")
        {
            Some(EducationLevel::Bachelor)
        } else if lower.contains("associate") {
            Some(EducationLevel::Associate)
        } else if lower.contains("high school") || has("ged") || lower.contains("diploma") {
            Some(EducationLevel::HighSchool)
        } else {
            None
        }
    }
}

impl std::str::FromStr for EducationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high_school" => Ok(EducationLevel::HighSchool),
            "associate" => Ok(EducationLevel::Associate),
            "bachelor" => Ok(EducationLevel::Bachelor),
            "master" => Ok(EducationLevel::Master),
            "doctorate" => Ok(EducationLevel::Doctorate),
            other => Err(format!("unknown education level '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactBasics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub title: String,
    pub company: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_years: Option<f32>,
    #[serde(default)]
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<EducationLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Validated structured fields recovered from a résumé.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredProfile {
    #[serde(default)]
    pub basics: ContactBasics,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: ExperienceSummary,
    #[serde(default)]
    pub education: EducationSummary,
    #[serde(default)]
    pub certifications: Vec<String>,
}

/// Output of the extraction service. Immutable once produced; stored on the owning Application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub resume_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredProfile>,
    pub parsing_quality: ParsingQuality,
    /// 0 to 100. Low values are still returned so the caller can ask for manual correction.
    pub confidence: u8,
    pub parsed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_error: Option<String>,
}

impl CandidateProfile {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            resume_text: String::new(),
            structured: None,
            parsing_quality: ParsingQuality::Failed,
            confidence: 0,
            parsed_at: Utc::now(),
            parsing_error: Some(error.into()),
        }
    }

    pub fn text_only(resume_text: String, parsing_error: Option<String>) -> Self {
        Self {
            resume_text,
            structured: None,
            parsing_quality: ParsingQuality::TextOnly,
            confidence: ParsingQuality::TextOnly.default_confidence(),
            parsed_at: Utc::now(),
            parsing_error,
        }
    }

    pub fn is_low_confidence(&self) -> bool {
        self.confidence < LOW_CONFIDENCE_CUTOFF
    }

    pub fn skills(&self) -> &[String] {
        self.structured
            .as_ref()
            .map(|s| s.skills.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_years(&self) -> Option<f32> {
        self.structured
            .as_ref()
            .and_then(|s| s.experience.total_years)
    }

    pub fn education_level(&self) -> Option<EducationLevel> {
        let education = &self.structured.as_ref()?.education;
        education
            .level
            .or_else(|| education.degree.as_deref().and_then(EducationLevel::detect))
    }

    pub fn position_titles(&self) -> Vec<&str> {
        self.structured
            .as_ref()
            .map(|s| {
                s.experience
                    .positions
                    .iter()
                    .map(|p| p.title.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn certifications(&self) -> &[String] {
        self.structured
            .as_ref()
            .map(|s| s.certifications.as_slice())
            .unwrap_or(&[])
    }
}
