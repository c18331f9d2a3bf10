//! In-memory fakes for the document and object stores, with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ledger::{CounterDelta, CounterField, CounterScope};
use crate::lifecycle;
use crate::models::application::{Application, ApplicationFilters, ProcessingStatus};
use crate::models::company::Company;
use crate::models::job::{Job, JobStatus};
use crate::models::profile::CandidateProfile;
use crate::store::objects::{ObjectStore, ObjectStoreError, StoredObject};
use crate::store::{ApplicationStore, Claim, ProcessingResult, RecordWrite, StoreError};

#[derive(Debug, Clone, Default)]
struct State {
    companies: HashMap<Uuid, Company>,
    jobs: HashMap<Uuid, Job>,
    applications: HashMap<Uuid, Application>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub async fn insert_company(&self, company: Company) {
        self.state.lock().await.companies.insert(company.id, company);
    }

    /// Seeds a job directly, bypassing the ledger. Tests that care about counters use `commit`.
    pub async fn insert_job(&self, job: Job) {
        self.state.lock().await.jobs.insert(job.id, job);
    }

    pub async fn put_application(&self, app: Application) {
        self.state.lock().await.applications.insert(app.id, app);
    }

    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    pub async fn application_count(&self) -> usize {
        self.state.lock().await.applications.len()
    }
}

fn apply_write(state: &mut State, write: RecordWrite) -> Result<(), StoreError> {
    match write {
        RecordWrite::InsertApplication(app) => {
            let duplicate = state
                .applications
                .values()
                .any(|a| a.job_id == app.job_id && a.email == app.email);
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "application for {} already exists on job {}",
                    app.email, app.job_id
                )));
            }
            state.applications.insert(app.id, *app);
        }
        RecordWrite::UpdateApplicationStatus {
            id,
            expected,
            status,
            notes,
            at,
        } => {
            let app = state
                .applications
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("application {id}")))?;
            if app.status != expected {
                return Err(StoreError::Precondition(format!(
                    "application {id} is {}, expected {}",
                    app.status.as_str(),
                    expected.as_str()
                )));
            }
            app.status = status;
            if notes.is_some() {
                app.notes = notes;
            }
            app.last_modified = at;
        }
        RecordWrite::DeleteApplication { id, expected } => {
            let current = state
                .applications
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("application {id}")))?;
            if current.status != expected {
                return Err(StoreError::Precondition(format!(
                    "application {id} changed status"
                )));
            }
            state.applications.remove(&id);
        }
        RecordWrite::InsertJob(job) => {
            if !state.companies.contains_key(&job.company_id) {
                return Err(StoreError::NotFound(format!("company {}", job.company_id)));
            }
            state.jobs.insert(job.id, *job);
        }
        RecordWrite::UpdateJobStatus {
            id,
            expected,
            status,
            posted_at,
            at,
        } => {
            let job = state
                .jobs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
            if job.status != expected {
                return Err(StoreError::Precondition(format!("job {id} changed status")));
            }
            job.status = status;
            if posted_at.is_some() {
                job.posted_at = posted_at;
            }
            job.last_modified = at;
        }
        RecordWrite::DeleteJob { id, expected } => {
            let job = state
                .jobs
                .get(&id)
                .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
            if job.status != expected {
                return Err(StoreError::Precondition(format!("job {id} changed status")));
            }
            if state.applications.values().any(|a| a.job_id == id) {
                return Err(StoreError::Conflict(format!("job {id} still has applications")));
            }
            state.jobs.remove(&id);
        }
    }
    Ok(())
}

fn apply_delta(state: &mut State, delta: &CounterDelta) -> Result<(), StoreError> {
    match delta.scope {
        CounterScope::Company(id) => {
            let c = state
                .companies
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("company {id}")))?;
            let slot = match delta.field {
                CounterField::TotalApplications => &mut c.total_applications,
                CounterField::PendingApplications => &mut c.pending_applications,
                CounterField::ReviewingApplications => &mut c.reviewing_applications,
                CounterField::AcceptedApplications => &mut c.accepted_applications,
                CounterField::RejectedApplications => &mut c.rejected_applications,
                CounterField::ActiveJobs => &mut c.active_jobs_count,
                CounterField::TotalJobs => &mut c.total_jobs_count,
                CounterField::Applicants => {
                    return Err(StoreError::Precondition("applicants is a job counter".into()))
                }
            };
            *slot += delta.amount;
        }
        CounterScope::Job(id) => {
            let j = state
                .jobs
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
            if delta.field != CounterField::Applicants {
                return Err(StoreError::Precondition(format!(
                    "{:?} is not a job counter",
                    delta.field
                )));
            }
            j.applicants += delta.amount;
        }
    }
    Ok(())
}

impl State {
    fn application_mut(&mut self, id: Uuid) -> Result<&mut Application, StoreError> {
        self.applications
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("application {id}")))
    }
}

fn check_claim(app: &Application, claim: &Claim) -> Result<(), StoreError> {
    if app.processing_status != ProcessingStatus::Processing {
        return Err(StoreError::Precondition(format!(
            "application {} is {}, not processing",
            app.id,
            app.processing_status.as_str()
        )));
    }
    if app.processing_started_at != Some(claim.token) {
        return Err(StoreError::Precondition(format!(
            "claim on application {} was taken over",
            app.id
        )));
    }
    Ok(())
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn get_company(&self, id: Uuid) -> Result<Option<Company>, StoreError> {
        Ok(self.state.lock().await.companies.get(&id).cloned())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.state.lock().await.jobs.get(&id).cloned())
    }

    async fn list_jobs(
        &self,
        company_id: Uuid,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StoreError> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| j.company_id == company_id && status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(a.id.cmp(&b.id)));
        Ok(jobs)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.state.lock().await.applications.get(&id).cloned())
    }

    async fn find_application_by_email(
        &self,
        job_id: Uuid,
        email: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .applications
            .values()
            .find(|a| a.job_id == job_id && a.email == email)
            .cloned())
    }

    async fn list_applications(
        &self,
        filters: &ApplicationFilters,
    ) -> Result<Vec<Application>, StoreError> {
        let state = self.state.lock().await;
        let mut apps: Vec<Application> = state
            .applications
            .values()
            .filter(|a| filters.matches(a))
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.applied_at.cmp(&a.applied_at).then(a.id.cmp(&b.id)));
        if let Some(limit) = filters.limit {
            apps.truncate(limit as usize);
        }
        Ok(apps)
    }

    async fn commit(&self, write: RecordWrite, deltas: &[CounterDelta]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        // Work on a copy so a failing delta leaves nothing behind
        let mut draft = state.clone();
        apply_write(&mut draft, write)?;
        for delta in deltas {
            apply_delta(&mut draft, delta)?;
        }
        *state = draft;
        Ok(())
    }

    async fn claim_processing(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.application_mut(id)?;
        if !lifecycle::is_claimable(app, stale_before) {
            return Ok(None);
        }
        app.processing_status = ProcessingStatus::Processing;
        app.processing_started_at = Some(now);
        app.processing_error = None;
        app.processing_runs += 1;
        app.last_modified = now;
        Ok(Some(Claim {
            application: app.clone(),
            token: now,
        }))
    }

    async fn complete_processing(
        &self,
        claim: &Claim,
        result: &ProcessingResult,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.application_mut(claim.id())?;
        check_claim(app, claim)?;
        let score = result.breakdown.overall_score;
        app.fit_score = Some(score);
        app.fit_score_breakdown = Some(result.breakdown.clone());
        app.parsed_resume = Some(result.profile.clone());
        app.scoring_version = Some(result.version);
        app.eligible_for_second_round =
            lifecycle::eligible_after_scoring(score, result.threshold, app.manual_invite_sent);
        app.processing_status = ProcessingStatus::Completed;
        app.processing_completed_at = Some(now);
        app.processing_error = None;
        app.last_modified = now;
        Ok(app.clone())
    }

    async fn fail_processing(
        &self,
        claim: &Claim,
        error: &str,
        profile: Option<&CandidateProfile>,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.application_mut(claim.id())?;
        check_claim(app, claim)?;
        app.processing_status = ProcessingStatus::Failed;
        app.processing_error = Some(error.to_string());
        if let Some(profile) = profile {
            app.parsed_resume = Some(profile.clone());
        }
        app.processing_completed_at = Some(now);
        app.last_modified = now;
        Ok(app.clone())
    }

    async fn list_recoverable(
        &self,
        stale_before: DateTime<Utc>,
        max_runs: u32,
        limit: u32,
    ) -> Result<Vec<Application>, StoreError> {
        let state = self.state.lock().await;
        let mut apps: Vec<Application> = state
            .applications
            .values()
            .filter(|a| match a.processing_status {
                ProcessingStatus::Processing => {
                    a.processing_started_at.map_or(true, |t| t < stale_before)
                }
                ProcessingStatus::Pending => a.resume.is_some() && a.applied_at < stale_before,
                ProcessingStatus::Failed => {
                    a.resume.is_some()
                        && a.processing_runs < max_runs
                        && a.processing_completed_at.map_or(true, |t| t < stale_before)
                }
                ProcessingStatus::Completed => false,
            })
            .cloned()
            .collect();
        apps.sort_by_key(|a| a.applied_at);
        apps.truncate(limit as usize);
        Ok(apps)
    }

    async fn record_manual_invite(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.application_mut(id)?;
        app.manual_invite_sent = true;
        app.manual_invite_sent_at = Some(now);
        app.eligible_for_second_round = true;
        app.last_modified = now;
        Ok(app.clone())
    }

    async fn record_interview_completed(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.application_mut(id)?;
        if app.interview_completed {
            return Err(StoreError::Precondition(format!(
                "interview for application {id} already completed"
            )));
        }
        app.interview_completed = true;
        app.interview_completed_at = Some(now);
        app.last_modified = now;
        Ok(app.clone())
    }

    async fn record_access(&self, id: Uuid, now: DateTime<Utc>) -> Result<Application, StoreError> {
        let mut state = self.state.lock().await;
        let app = state.application_mut(id)?;
        app.access_count += 1;
        app.last_accessed_at = Some(now);
        Ok(app.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Object store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: std::sync::Mutex<HashMap<String, (Bytes, String)>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("injected upload failure".into()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(StoredObject {
            path: path.to_string(),
            url: format!("memory://{path}"),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), ObjectStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("injected delete failure".into()));
        }
        match self.objects.lock().unwrap().remove(path) {
            Some(_) => Ok(()),
            None => Err(ObjectStoreError::NotFound(path.to_string())),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Bytes, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| ObjectStoreError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::application::{ApplicantFields, ResumeFile};

    async fn seeded() -> (Arc<MemoryStore>, Application) {
        let store = Arc::new(MemoryStore::default());
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
        let app = Application::submitted(
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
        );
        store.put_application(app.clone()).await;
        (store, app)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let (store, app) = seeded().await;
        let now = Utc::now();
        let stale_before = now - chrono::Duration::minutes(10);

        let id = app.id;
        let mut claims = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            claims.spawn(async move { store.claim_processing(id, now, stale_before).await });
        }
        let mut winners = 0;
        while let Some(joined) = claims.join_next().await {
            if joined.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let stored = store.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.processing_runs, 1);
    }

    #[tokio::test]
    async fn test_stale_claim_can_be_taken_over() {
        let (store, app) = seeded().await;
        let started = Utc::now() - chrono::Duration::hours(1);
        assert!(store
            .claim_processing(app.id, started, started - chrono::Duration::minutes(10))
            .await
            .unwrap()
            .is_some());

        let now = Utc::now();
        let reclaimed = store
            .claim_processing(app.id, now, now - chrono::Duration::minutes(10))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.token, now);
        assert_eq!(reclaimed.application.processing_runs, 2);
    }

    #[tokio::test]
    async fn test_superseded_claim_cannot_write_outcome() {
        let (store, app) = seeded().await;
        let started = Utc::now() - chrono::Duration::hours(1);
        let stale = store
            .claim_processing(app.id, started, started - chrono::Duration::minutes(10))
            .await
            .unwrap()
            .unwrap();
        let now = Utc::now();
        let current = store
            .claim_processing(app.id, now, now - chrono::Duration::minutes(10))
            .await
            .unwrap()
            .unwrap();

        let err = store
            .fail_processing(&stale, "timed out", None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Precondition(_)));
        let stored = store.get_application(app.id).await.unwrap().unwrap();
        assert_eq!(stored.processing_status, ProcessingStatus::Processing);
        assert_eq!(stored.processing_started_at, Some(current.token));

        // The current holder still owns the record
        let failed = store
            .fail_processing(&current, "scoring failed", None, Utc::now())
            .await
            .unwrap();
        assert_eq!(failed.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn test_failed_records_recover_until_run_cap() {
        let (store, app) = seeded().await;
        let long_ago = Utc::now() - chrono::Duration::hours(2);
        let mut failed = app.clone();
        failed.resume = Some(ResumeFile {
            path: "resumes/a.pdf".into(),
            url: "memory://resumes/a.pdf".into(),
            file_name: "a.pdf".into(),
            content_type: "application/pdf".into(),
        });
        failed.processing_status = ProcessingStatus::Failed;
        failed.processing_completed_at = Some(long_ago);
        failed.processing_runs = 2;
        store.put_application(failed.clone()).await;

        let stale_before = Utc::now() - chrono::Duration::minutes(10);
        let found = store.list_recoverable(stale_before, 3, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.list_recoverable(stale_before, 2, 10).await.unwrap().is_empty());

        // A run that just failed waits out the staleness window
        failed.processing_completed_at = Some(Utc::now());
        store.put_application(failed).await;
        assert!(store.list_recoverable(stale_before, 3, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interview_completion_recorded_once() {
        let (store, app) = seeded().await;
        store.record_interview_completed(app.id, Utc::now()).await.unwrap();
        let err = store
            .record_interview_completed(app.id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Precondition(_)));
    }
}
