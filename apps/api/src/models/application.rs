use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::CandidateProfile;
use crate::scoring::breakdown::{FitScoreBreakdown, ScoringVersion};

/// Human review status, controlled by company action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Reviewing,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "reviewing" => Ok(ApplicationStatus::Reviewing),
            "accepted" => Ok(ApplicationStatus::Accepted),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("unknown application status '{other}'")),
        }
    }
}

/// Lifecycle of the background scoring task for one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "completed" => Ok(ProcessingStatus::Completed),
            "failed" => Ok(ProcessingStatus::Failed),
            other => Err(format!("unknown processing status '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Applicant-supplied form data
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkHistoryEntry {
    pub job_title: String,
    pub employer_name: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub still_employed: bool,
    #[serde(default)]
    pub duties: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillEntry {
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub years: u32,
    #[serde(default)]
    pub months: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub degree: String,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub institution_name: String,
    #[serde(default)]
    pub graduated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageEntry {
    pub language: String,
    #[serde(default)]
    pub speak: bool,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
}

/// Extended application form. Optional; v2 scoring reads it as verified context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    #[serde(default)]
    pub work_history: Vec<WorkHistoryEntry>,
    #[serde(default)]
    pub skills: Vec<SkillEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub languages: Vec<LanguageEntry>,
}

impl ApplicationForm {
    pub fn is_empty(&self) -> bool {
        self.work_history.is_empty()
            && self.skills.is_empty()
            && self.education.is_empty()
            && self.certifications.is_empty()
            && self.languages.is_empty()
    }

    /// Plain-text rendering handed to the scoring prompt. `None` when nothing was filled in.
    pub fn summary_for_scoring(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut lines = vec!["=== VERIFIED APPLICATION DATA ===".to_string(), String::new()];

        if !self.work_history.is_empty() {
            lines.push("WORK HISTORY:".to_string());
            for (i, work) in self.work_history.iter().enumerate() {
                let end = if work.still_employed {
                    "Present".to_string()
                } else {
                    work.end_date.clone().unwrap_or_default()
                };
                lines.push(format!(
                    "  {}. {} at {} ({} - {})",
                    i + 1,
                    work.job_title,
                    work.employer_name,
                    work.start_date,
                    end
                ));
                if !work.duties.is_empty() {
                    lines.push(format!("     Duties: {}", work.duties));
                }
            }
            lines.push(String::new());
        }

        if !self.skills.is_empty() {
            lines.push("SKILLS & PROFICIENCY:".to_string());
            for skill in &self.skills {
                let total_months = skill.years * 12 + skill.months;
                let (years, months) = (total_months / 12, total_months % 12);
                let exp = match (years, months) {
                    (0, m) => format!("{m}m"),
                    (y, 0) => format!("{y}y"),
                    (y, m) => format!("{y}y {m}m"),
                };
                lines.push(format!("  - {}: {} ({exp})", skill.name, skill.level));
            }
            lines.push(String::new());
        }

        if !self.education.is_empty() {
            lines.push("EDUCATION:".to_string());
            for edu in &self.education {
                let major = edu
                    .major
                    .as_deref()
                    .map(|m| format!(" in {m}"))
                    .unwrap_or_default();
                let status = if edu.graduated { "Graduated" } else { "Attended" };
                lines.push(format!(
                    "  - {}{major} - {} ({status})",
                    edu.degree, edu.institution_name
                ));
            }
            lines.push(String::new());
        }

        if !self.certifications.is_empty() {
            lines.push("CERTIFICATIONS & LICENSES:".to_string());
            lines.extend(self.certifications.iter().map(|c| format!("  - {c}")));
            lines.push(String::new());
        }

        if !self.languages.is_empty() {
            lines.push("LANGUAGES:".to_string());
            for lang in &self.languages {
                let abilities: Vec<&str> = [
                    (lang.speak, "Speak"),
                    (lang.read, "Read"),
                    (lang.write, "Write"),
                ]
                .iter()
                .filter(|(on, _)| *on)
                .map(|(_, label)| *label)
                .collect();
                lines.push(format!("  - {}: {}", lang.language, abilities.join(", ")));
            }
        }

        Some(lines.join("\n").trim_end().to_string())
    }
}

/// Contact fields submitted with an application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicantFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub form: Option<ApplicationForm>,
}

impl ApplicantFields {
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Application record
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeFile {
    pub path: String,
    pub url: String,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub company_id: Uuid,
    pub job_title: String,
    pub company_name: String,

    pub first_name: String,
    pub last_name: String,
    /// Stored normalized (trimmed, lowercase); `(job_id, email)` is unique.
    pub email: String,
    pub phone: Option<String>,
    pub form: Option<ApplicationForm>,
    pub resume: Option<ResumeFile>,

    pub status: ApplicationStatus,
    pub notes: Option<String>,
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    /// Claims taken so far, including the current one.
    pub processing_runs: u32,
    pub eligible_for_second_round: bool,
    pub manual_invite_sent: bool,
    pub manual_invite_sent_at: Option<DateTime<Utc>>,
    pub interview_completed: bool,
    pub interview_completed_at: Option<DateTime<Utc>>,

    pub fit_score: Option<u8>,
    pub fit_score_breakdown: Option<FitScoreBreakdown>,
    pub parsed_resume: Option<CandidateProfile>,
    pub scoring_version: Option<ScoringVersion>,

    pub applied_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub last_accessed_at: Option<DateTime<Utc>>,
    pub access_count: i64,
}

impl Application {
    /// Fresh record as written at submission time.
    pub fn submitted(
        id: Uuid,
        job: &crate::models::job::Job,
        fields: ApplicantFields,
        resume: Option<ResumeFile>,
        now: DateTime<Utc>,
    ) -> Self {
        let email = fields.normalized_email();
        Self {
            id,
            job_id: job.id,
            company_id: job.company_id,
            job_title: job.title.clone(),
            company_name: job.company_name.clone(),
            first_name: fields.first_name.trim().to_string(),
            last_name: fields.last_name.trim().to_string(),
            email,
            phone: fields.phone,
            form: fields.form,
            resume,
            status: ApplicationStatus::Pending,
            notes: None,
            processing_status: ProcessingStatus::Pending,
            processing_error: None,
            processing_runs: 0,
            eligible_for_second_round: false,
            manual_invite_sent: false,
            manual_invite_sent_at: None,
            interview_completed: false,
            interview_completed_at: None,
            fit_score: None,
            fit_score_breakdown: None,
            parsed_resume: None,
            scoring_version: None,
            applied_at: now,
            last_modified: now,
            processing_started_at: None,
            processing_completed_at: None,
            last_accessed_at: None,
            access_count: 0,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Query filters for listing applications.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationFilters {
    pub company_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub status: Option<ApplicationStatus>,
    pub processing_status: Option<ProcessingStatus>,
    /// `None` means unbounded; the HTTP layer always supplies a limit.
    pub limit: Option<u32>,
}

impl ApplicationFilters {
    pub fn matches(&self, app: &Application) -> bool {
        self.company_id.map_or(true, |c| app.company_id == c)
            && self.job_id.map_or(true, |j| app.job_id == j)
            && self.status.map_or(true, |s| app.status == s)
            && self
                .processing_status
                .map_or(true, |p| app.processing_status == p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_form_has_no_summary() {
        assert!(ApplicationForm::default().summary_for_scoring().is_none());
    }

    #[test]
    fn test_form_summary_sections() {
        let form = ApplicationForm {
            work_history: vec![WorkHistoryEntry {
                job_title: "Nurse".into(),
                employer_name: "General Hospital".into(),
                start_date: "2019-01".into(),
                end_date: None,
                still_employed: true,
                duties: "Patient care".into(),
            }],
            skills: vec![SkillEntry {
                name: "Triage".into(),
                level: "Expert".into(),
                years: 2,
                months: 15,
            }],
            languages: vec![LanguageEntry {
                language: "Spanish".into(),
                speak: true,
                read: false,
                write: true,
            }],
            ..Default::default()
        };

        let summary = form.summary_for_scoring().unwrap();
        assert!(summary.contains("1. Nurse at General Hospital (2019-01 - Present)"));
        assert!(summary.contains("- Triage: Expert (3y 3m)"));
        assert!(summary.contains("- Spanish: Speak, Write"));
        assert!(!summary.contains("EDUCATION:"));
    }

    #[test]
    fn test_normalized_email() {
        let fields = ApplicantFields {
            email: "  Jane.Doe@Example.COM ".into(),
            ..Default::default()
        };
        assert_eq!(fields.normalized_email(), "jane.doe@example.com");
    }

    #[test]
    fn test_status_parse_rejects_unknown() {
        assert!("archived".parse::<ApplicationStatus>().is_err());
        assert_eq!(
            "processing".parse::<ProcessingStatus>().unwrap(),
            ProcessingStatus::Processing
        );
    }
}
