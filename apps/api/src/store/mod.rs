//! Document store contract.
//!
//! `ApplicationStore` is the narrow surface the screening core needs: reads by id and
//! filter, one transactional `commit` for a record write plus its counter deltas, and the
//! compare-and-swap updates of the processing lifecycle.

#[cfg(test)]
pub mod memory;
pub mod objects;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::CounterDelta;
use crate::models::application::{Application, ApplicationFilters, ApplicationStatus};
use crate::models::company::Company;
use crate::models::job::{Job, JobStatus};
use crate::models::profile::CandidateProfile;
use crate::scoring::breakdown::{FitScoreBreakdown, ScoringVersion};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A single record mutation. Status-changing writes carry the status they expect to
/// replace so the counter deltas computed from it stay correct under concurrent edits.
#[derive(Debug, Clone)]
pub enum RecordWrite {
    InsertApplication(Box<Application>),
    UpdateApplicationStatus {
        id: Uuid,
        expected: ApplicationStatus,
        status: ApplicationStatus,
        notes: Option<String>,
        at: DateTime<Utc>,
    },
    DeleteApplication {
        id: Uuid,
        expected: ApplicationStatus,
    },
    InsertJob(Box<Job>),
    UpdateJobStatus {
        id: Uuid,
        expected: JobStatus,
        status: JobStatus,
        posted_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    DeleteJob {
        id: Uuid,
        expected: JobStatus,
    },
}

/// Outcome of a successful background scoring run.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub profile: CandidateProfile,
    pub breakdown: FitScoreBreakdown,
    pub version: ScoringVersion,
    pub threshold: u8,
}

/// A held processing claim. `token` is the `processing_started_at` the store wrote for it;
/// the completing writes only apply while that is still the record's claim.
#[derive(Debug, Clone)]
pub struct Claim {
    pub application: Application,
    pub token: DateTime<Utc>,
}

impl Claim {
    pub fn id(&self) -> Uuid {
        self.application.id
    }
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn get_company(&self, id: Uuid) -> Result<Option<Company>, StoreError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Jobs of a company, most recently posted first.
    async fn list_jobs(
        &self,
        company_id: Uuid,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StoreError>;

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, StoreError>;

    async fn find_application_by_email(
        &self,
        job_id: Uuid,
        email: &str,
    ) -> Result<Option<Application>, StoreError>;

    /// Newest first.
    async fn list_applications(
        &self,
        filters: &ApplicationFilters,
    ) -> Result<Vec<Application>, StoreError>;

    /// Applies `write` and every delta in one transaction. Nothing is visible on failure.
    async fn commit(&self, write: RecordWrite, deltas: &[CounterDelta]) -> Result<(), StoreError>;

    /// Compare-and-swap into `processing`, counting the run. Claimable: `pending`, `failed`,
    /// or `processing` started before `stale_before`. Returns `None` when another worker holds
    /// it or it is done.
    async fn claim_processing(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError>;

    /// `processing` → `completed`. Eligibility becomes `manual invite || score ≥ threshold`.
    /// Fails with `Precondition` once the claim has been taken over.
    async fn complete_processing(
        &self,
        claim: &Claim,
        result: &ProcessingResult,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError>;

    /// `processing` → `failed`. Eligibility is left untouched. Fenced like `complete_processing`.
    async fn fail_processing(
        &self,
        claim: &Claim,
        error: &str,
        profile: Option<&CandidateProfile>,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError>;

    /// Records to hand back to the workers, oldest first: stale `processing` records, `pending`
    /// records with a stored résumé older than `stale_before`, and `failed` records with a
    /// stored résumé that finished before `stale_before` after fewer than `max_runs` runs.
    async fn list_recoverable(
        &self,
        stale_before: DateTime<Utc>,
        max_runs: u32,
        limit: u32,
    ) -> Result<Vec<Application>, StoreError>;

    async fn record_manual_invite(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError>;

    /// Fails with `Precondition` if the interview was already recorded.
    async fn record_interview_completed(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError>;

    async fn record_access(&self, id: Uuid, now: DateTime<Utc>) -> Result<Application, StoreError>;
}
