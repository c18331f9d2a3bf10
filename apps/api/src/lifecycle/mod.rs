//! Application Lifecycle: the processing state machine and the second-round gate.
//!
//! ```text
//! pending ──claim──▶ processing ──▶ completed
//!    ▲                 │   ▲
//!    │                 ▼   │ stale re-claim
//!    └── (never) ◀── failed ─┘ (re-claimable)
//! ```
//!
//! `completed` is terminal. `status` (human review) is orthogonal and not modelled here.

pub mod processor;
pub mod queue;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::application::{Application, ProcessingStatus};

/// Whether a worker may move a record from `from` into `to`.
pub fn can_transition(from: ProcessingStatus, to: ProcessingStatus) -> bool {
    use ProcessingStatus::*;
    matches!(
        (from, to),
        (Pending, Processing)
            | (Failed, Processing)
            | (Processing, Processing)
            | (Processing, Completed)
            | (Processing, Failed)
    )
}

/// A record may be claimed when the transition is legal and, if it is already
/// `processing`, its claim started before `stale_before`.
pub fn is_claimable(app: &Application, stale_before: DateTime<Utc>) -> bool {
    if !can_transition(app.processing_status, ProcessingStatus::Processing) {
        return false;
    }
    match app.processing_status {
        ProcessingStatus::Processing => app
            .processing_started_at
            .map_or(true, |started| started < stale_before),
        _ => true,
    }
}

/// Automatic eligibility for a freshly computed score. A manual invite always wins.
pub fn eligible_after_scoring(score: u8, threshold: u8, manual_invite_sent: bool) -> bool {
    manual_invite_sent || score >= threshold
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityCheck {
    pub application_id: Uuid,
    /// May the applicant enter the interview flow right now.
    pub eligible: bool,
    pub eligible_for_second_round: bool,
    pub interview_completed: bool,
    pub manual_invite_sent: bool,
    pub processing_status: ProcessingStatus,
    pub fit_score: Option<u8>,
}

/// A completed interview closes the gate even for eligible applicants.
pub fn check_eligibility(app: &Application) -> EligibilityCheck {
    EligibilityCheck {
        application_id: app.id,
        eligible: app.eligible_for_second_round && !app.interview_completed,
        eligible_for_second_round: app.eligible_for_second_round,
        interview_completed: app.interview_completed,
        manual_invite_sent: app.manual_invite_sent,
        processing_status: app.processing_status,
        fit_score: app.fit_score,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::application::ApplicantFields;
    use crate::models::job::{Job, JobStatus};

    fn application() -> Application {
        let job = Job {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            company_name: "Acme".into(),
            title: "Clerk".into(),
            description: String::new(),
            category: None,
            requirements: vec![],
            responsibilities: vec![],
            required_skills: vec![],
            search_keywords: vec![],
            min_years_experience: None,
            education_level: None,
            requires_resume: false,
            status: JobStatus::Active,
            applicants: 0,
            posted_at: None,
            created_at: Utc::now(),
            last_modified: Utc::now(),
        };
        Application::submitted(
            Uuid::new_v4(),
            &job,
            ApplicantFields {
                first_name: "Ada".into(),
                last_name: "L".into(),
                email: "ada@example.com".into(),
                ..Default::default()
            },
            None,
            Utc::now(),
        )
    }

    #[test]
    fn test_completed_never_regresses() {
        for to in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Failed,
        ] {
            assert!(!can_transition(ProcessingStatus::Completed, to));
        }
        assert!(!can_transition(ProcessingStatus::Failed, ProcessingStatus::Pending));
        assert!(!can_transition(ProcessingStatus::Pending, ProcessingStatus::Completed));
    }

    #[test]
    fn test_claimable_states() {
        let now = Utc::now();
        let stale_before = now - Duration::minutes(10);
        let mut app = application();
        assert!(is_claimable(&app, stale_before));

        app.processing_status = ProcessingStatus::Processing;
        app.processing_started_at = Some(now);
        assert!(!is_claimable(&app, stale_before));

        app.processing_started_at = Some(now - Duration::minutes(30));
        assert!(is_claimable(&app, stale_before));

        app.processing_status = ProcessingStatus::Failed;
        assert!(is_claimable(&app, stale_before));

        app.processing_status = ProcessingStatus::Completed;
        assert!(!is_claimable(&app, stale_before));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(!eligible_after_scoring(69, 70, false));
        assert!(eligible_after_scoring(70, 70, false));
        assert!(eligible_after_scoring(10, 70, true));
    }

    #[test]
    fn test_interview_completion_closes_the_gate() {
        let mut app = application();
        app.eligible_for_second_round = true;
        assert!(check_eligibility(&app).eligible);

        app.interview_completed = true;
        let check = check_eligibility(&app);
        assert!(!check.eligible);
        assert!(check.eligible_for_second_round);
        assert!(check.interview_completed);
    }
}
