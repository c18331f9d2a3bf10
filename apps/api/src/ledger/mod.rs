//! Aggregate Ledger: denormalized per-company and per-job counters.
//!
//! Counters are only ever changed through `CounterDelta`s committed in the same store
//! transaction as the record write they describe. They are a cache of what a scan of the
//! records would report; `audit_company` performs that scan.

pub mod saga;

use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::application::{Application, ApplicationStatus};
use crate::models::company::Company;
use crate::models::job::{Job, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum CounterScope {
    Company(Uuid),
    Job(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CounterField {
    TotalApplications,
    PendingApplications,
    ReviewingApplications,
    AcceptedApplications,
    RejectedApplications,
    ActiveJobs,
    TotalJobs,
    Applicants,
}

impl CounterField {
    pub const COMPANY_FIELDS: [CounterField; 7] = [
        CounterField::TotalApplications,
        CounterField::PendingApplications,
        CounterField::ReviewingApplications,
        CounterField::AcceptedApplications,
        CounterField::RejectedApplications,
        CounterField::ActiveJobs,
        CounterField::TotalJobs,
    ];

    /// Column name in the owning table. The only source of column names in counter SQL.
    pub fn column(self) -> &'static str {
        match self {
            CounterField::TotalApplications => "total_applications",
            CounterField::PendingApplications => "pending_applications",
            CounterField::ReviewingApplications => "reviewing_applications",
            CounterField::AcceptedApplications => "accepted_applications",
            CounterField::RejectedApplications => "rejected_applications",
            CounterField::ActiveJobs => "active_jobs_count",
            CounterField::TotalJobs => "total_jobs_count",
            CounterField::Applicants => "applicants",
        }
    }

    pub fn applies_to(self, scope: CounterScope) -> bool {
        match scope {
            CounterScope::Job(_) => self == CounterField::Applicants,
            CounterScope::Company(_) => self != CounterField::Applicants,
        }
    }

    pub fn for_status(status: ApplicationStatus) -> Self {
        match status {
            ApplicationStatus::Pending => CounterField::PendingApplications,
            ApplicationStatus::Reviewing => CounterField::ReviewingApplications,
            ApplicationStatus::Accepted => CounterField::AcceptedApplications,
            ApplicationStatus::Rejected => CounterField::RejectedApplications,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDelta {
    pub scope: CounterScope,
    pub field: CounterField,
    pub amount: i64,
}

/// Accumulates deltas, merging repeats and dropping zeros.
#[derive(Debug, Default)]
pub struct LedgerDelta {
    amounts: BTreeMap<(CounterScope, CounterField), i64>,
}

impl LedgerDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(
        &mut self,
        scope: CounterScope,
        fields: impl IntoIterator<Item = (CounterField, i64)>,
    ) -> &mut Self {
        for (field, amount) in fields {
            debug_assert!(field.applies_to(scope), "{field:?} is not a {scope:?} counter");
            *self.amounts.entry((scope, field)).or_insert(0) += amount;
        }
        self
    }

    pub fn into_deltas(self) -> Vec<CounterDelta> {
        self.amounts
            .into_iter()
            .filter(|(_, amount)| *amount != 0)
            .map(|((scope, field), amount)| CounterDelta {
                scope,
                field,
                amount,
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Delta plans, one per record mutation
// ────────────────────────────────────────────────────────────────────────────

pub fn application_created(app: &Application) -> Vec<CounterDelta> {
    let mut delta = LedgerDelta::new();
    delta
        .apply(
            CounterScope::Company(app.company_id),
            [
                (CounterField::TotalApplications, 1),
                (CounterField::for_status(app.status), 1),
            ],
        )
        .apply(CounterScope::Job(app.job_id), [(CounterField::Applicants, 1)]);
    delta.into_deltas()
}

pub fn application_status_changed(
    app: &Application,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Vec<CounterDelta> {
    let mut delta = LedgerDelta::new();
    delta.apply(
        CounterScope::Company(app.company_id),
        [
            (CounterField::for_status(from), -1),
            (CounterField::for_status(to), 1),
        ],
    );
    delta.into_deltas()
}

pub fn application_deleted(app: &Application) -> Vec<CounterDelta> {
    let mut delta = LedgerDelta::new();
    delta
        .apply(
            CounterScope::Company(app.company_id),
            [
                (CounterField::TotalApplications, -1),
                (CounterField::for_status(app.status), -1),
            ],
        )
        .apply(CounterScope::Job(app.job_id), [(CounterField::Applicants, -1)]);
    delta.into_deltas()
}

fn active(status: JobStatus) -> i64 {
    i64::from(status == JobStatus::Active)
}

pub fn job_created(job: &Job) -> Vec<CounterDelta> {
    let mut delta = LedgerDelta::new();
    delta.apply(
        CounterScope::Company(job.company_id),
        [
            (CounterField::TotalJobs, 1),
            (CounterField::ActiveJobs, active(job.status)),
        ],
    );
    delta.into_deltas()
}

pub fn job_status_changed(job: &Job, from: JobStatus, to: JobStatus) -> Vec<CounterDelta> {
    let mut delta = LedgerDelta::new();
    delta.apply(
        CounterScope::Company(job.company_id),
        [(CounterField::ActiveJobs, active(to) - active(from))],
    );
    delta.into_deltas()
}

pub fn job_deleted(job: &Job) -> Vec<CounterDelta> {
    let mut delta = LedgerDelta::new();
    delta.apply(
        CounterScope::Company(job.company_id),
        [
            (CounterField::TotalJobs, -1),
            (CounterField::ActiveJobs, -active(job.status)),
        ],
    );
    delta.into_deltas()
}

// ────────────────────────────────────────────────────────────────────────────
// Audit
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDrift {
    pub scope: CounterScope,
    pub field: CounterField,
    pub recorded: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub company_id: Uuid,
    pub jobs_scanned: usize,
    pub applications_scanned: usize,
    pub drift: Vec<CounterDrift>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Recounts a company's jobs and applications and reports every counter that disagrees.
pub fn audit_company(company: &Company, jobs: &[Job], applications: &[Application]) -> AuditReport {
    let mut actual: BTreeMap<CounterField, i64> = BTreeMap::new();
    let mut bump = |field: CounterField| *actual.entry(field).or_insert(0) += 1;

    for app in applications.iter().filter(|a| a.company_id == company.id) {
        bump(CounterField::TotalApplications);
        bump(CounterField::for_status(app.status));
    }
    for job in jobs.iter().filter(|j| j.company_id == company.id) {
        bump(CounterField::TotalJobs);
        if job.status == JobStatus::Active {
            bump(CounterField::ActiveJobs);
        }
    }

    let mut drift: Vec<CounterDrift> = CounterField::COMPANY_FIELDS
        .iter()
        .filter_map(|field| {
            let recorded = company.counter(*field)?;
            let actual = actual.get(field).copied().unwrap_or(0);
            (recorded != actual).then_some(CounterDrift {
                scope: CounterScope::Company(company.id),
                field: *field,
                recorded,
                actual,
            })
        })
        .collect();

    for job in jobs.iter().filter(|j| j.company_id == company.id) {
        let count = applications.iter().filter(|a| a.job_id == job.id).count() as i64;
        if job.applicants != count {
            drift.push(CounterDrift {
                scope: CounterScope::Job(job.id),
                field: CounterField::Applicants,
                recorded: job.applicants,
                actual: count,
            });
        }
    }

    AuditReport {
        company_id: company.id,
        jobs_scanned: jobs.len(),
        applications_scanned: applications.len(),
        drift,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::application::ApplicantFields;

    fn job(company_id: Uuid, status: JobStatus) -> Job {
        Job {
            id: Uuid::new_v4(),
            company_id,
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
            status,
            applicants: 0,
            posted_at: None,
            created_at: Utc::now(),
            last_modified: Utc::now(),
        }
    }

    fn company(id: Uuid) -> Company {
        Company {
            id,
            company_name: "Acme".into(),
            email: "hr@acme.test".into(),
            total_applications: 0,
            pending_applications: 0,
            reviewing_applications: 0,
            accepted_applications: 0,
            rejected_applications: 0,
            active_jobs_count: 0,
            total_jobs_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn application(job: &Job) -> Application {
        Application::submitted(
            Uuid::new_v4(),
            job,
            ApplicantFields {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                ..Default::default()
            },
            None,
            Utc::now(),
        )
    }

    fn amount(deltas: &[CounterDelta], scope: CounterScope, field: CounterField) -> i64 {
        deltas
            .iter()
            .filter(|d| d.scope == scope && d.field == field)
            .map(|d| d.amount)
            .sum()
    }

    #[test]
    fn test_application_created_plan() {
        let company_id = Uuid::new_v4();
        let j = job(company_id, JobStatus::Active);
        let app = application(&j);
        let deltas = application_created(&app);

        let c = CounterScope::Company(company_id);
        assert_eq!(amount(&deltas, c, CounterField::TotalApplications), 1);
        assert_eq!(amount(&deltas, c, CounterField::PendingApplications), 1);
        assert_eq!(amount(&deltas, CounterScope::Job(j.id), CounterField::Applicants), 1);
        assert_eq!(deltas.len(), 3);
    }

    #[test]
    fn test_status_change_moves_one_count() {
        let j = job(Uuid::new_v4(), JobStatus::Active);
        let app = application(&j);
        let deltas =
            application_status_changed(&app, ApplicationStatus::Pending, ApplicationStatus::Accepted);
        let c = CounterScope::Company(app.company_id);
        assert_eq!(amount(&deltas, c, CounterField::PendingApplications), -1);
        assert_eq!(amount(&deltas, c, CounterField::AcceptedApplications), 1);
        assert_eq!(amount(&deltas, c, CounterField::TotalApplications), 0);
    }

    #[test]
    fn test_same_status_change_is_empty() {
        let j = job(Uuid::new_v4(), JobStatus::Active);
        let app = application(&j);
        assert!(application_status_changed(
            &app,
            ApplicationStatus::Reviewing,
            ApplicationStatus::Reviewing
        )
        .is_empty());
    }

    #[test]
    fn test_job_plans_track_active_count() {
        let draft = job(Uuid::new_v4(), JobStatus::Draft);
        let created = job_created(&draft);
        let c = CounterScope::Company(draft.company_id);
        assert_eq!(amount(&created, c, CounterField::TotalJobs), 1);
        assert_eq!(amount(&created, c, CounterField::ActiveJobs), 0);

        let opened = job_status_changed(&draft, JobStatus::Draft, JobStatus::Active);
        assert_eq!(amount(&opened, c, CounterField::ActiveJobs), 1);

        let active = job(draft.company_id, JobStatus::Active);
        let deleted = job_deleted(&active);
        assert_eq!(amount(&deleted, c, CounterField::ActiveJobs), -1);
        assert_eq!(amount(&deleted, c, CounterField::TotalJobs), -1);
    }

    #[test]
    fn test_audit_reports_drift() {
        let company_id = Uuid::new_v4();
        let mut c = company(company_id);
        let mut j = job(company_id, JobStatus::Active);
        let apps = vec![application(&j), application(&j)];

        c.total_applications = 2;
        c.pending_applications = 2;
        c.total_jobs_count = 1;
        c.active_jobs_count = 1;
        j.applicants = 2;
        assert!(audit_company(&c, std::slice::from_ref(&j), &apps).is_clean());

        c.pending_applications = 3;
        j.applicants = 1;
        let report = audit_company(&c, std::slice::from_ref(&j), &apps);
        assert_eq!(report.drift.len(), 2);
        assert!(report.drift.contains(&CounterDrift {
            scope: CounterScope::Company(company_id),
            field: CounterField::PendingApplications,
            recorded: 3,
            actual: 2,
        }));
    }
}
