use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::EducationLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Active,
    Draft,
    Closed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Active => "active",
            JobStatus::Draft => "draft",
            JobStatus::Closed => "closed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(JobStatus::Active),
            "draft" => Ok(JobStatus::Draft),
            "closed" => Ok(JobStatus::Closed),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// A job posting as the screening core sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub company_id: Uuid,
    pub company_name: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub min_years_experience: Option<f32>,
    #[serde(default)]
    pub education_level: Option<EducationLevel>,
    #[serde(default)]
    pub requires_resume: bool,
    pub status: JobStatus,
    /// Denormalized applicant counter; maintained by the ledger.
    #[serde(default)]
    pub applicants: i64,
    #[serde(default)]
    pub posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Job {
    pub fn is_open(&self) -> bool {
        self.status == JobStatus::Active
    }

    /// Minimum years of experience, falling back to "N+ years" phrases in the requirement list.
    pub fn required_years(&self) -> Option<f32> {
        self.min_years_experience.or_else(|| {
            self.requirements
                .iter()
                .filter_map(|r| parse_years_phrase(r))
                .fold(None, |acc: Option<f32>, y| Some(acc.map_or(y, |a| a.max(y))))
        })
    }

    /// Required education level, falling back to degree words in the requirement list.
    pub fn required_education(&self) -> Option<EducationLevel> {
        self.education_level.or_else(|| {
            self.requirements
                .iter()
                .filter_map(|r| EducationLevel::detect(r))
                .max()
        })
    }
}

/// Fields accepted when a company creates a posting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub company_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub required_skills: Vec<String>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub min_years_experience: Option<f32>,
    #[serde(default)]
    pub education_level: Option<EducationLevel>,
    #[serde(default)]
    pub requires_resume: bool,
    #[serde(default = "default_new_job_status")]
    pub status: JobStatus,
}

fn default_new_job_status() -> JobStatus {
    JobStatus::Draft
}

/// Finds the number in phrases like "5+ years" or "3 years of experience".
fn parse_years_phrase(text: &str) -> Option<f32> {
    let lower = text.to_lowercase();
    let idx = lower.find("year")?;
    let before = lower[..idx].trim_end().trim_end_matches('+').trim_end();
    let digits: String = before
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse::<f32>().ok().filter(|y| *y > 0.0 && *y < 60.0)
}
