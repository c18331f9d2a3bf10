//! Postgres implementation of `ApplicationStore`.
//!
//! Status columns are plain TEXT with CHECK constraints; rows are read into `*Row` structs
//! and validated into domain types here, so a bad value surfaces as `StoreError::Corrupt`
//! instead of leaking into the core.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use crate::ledger::{CounterDelta, CounterScope};
use crate::lifecycle;
use crate::models::application::{
    Application, ApplicationFilters, ApplicationForm, ApplicationStatus, ProcessingStatus,
    ResumeFile,
};
use crate::models::company::Company;
use crate::models::job::{Job, JobStatus};
use crate::models::profile::{CandidateProfile, EducationLevel};
use crate::scoring::breakdown::{FitScoreBreakdown, ScoringVersion};
use crate::store::{ApplicationStore, Claim, ProcessingResult, RecordWrite, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct CompanyRow {
    id: Uuid,
    company_name: String,
    email: String,
    total_applications: i64,
    pending_applications: i64,
    reviewing_applications: i64,
    accepted_applications: i64,
    rejected_applications: i64,
    active_jobs_count: i64,
    total_jobs_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: row.id,
            company_name: row.company_name,
            email: row.email,
            total_applications: row.total_applications,
            pending_applications: row.pending_applications,
            reviewing_applications: row.reviewing_applications,
            accepted_applications: row.accepted_applications,
            rejected_applications: row.rejected_applications,
            active_jobs_count: row.active_jobs_count,
            total_jobs_count: row.total_jobs_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    company_id: Uuid,
    company_name: String,
    title: String,
    description: String,
    category: Option<String>,
    requirements: Vec<String>,
    responsibilities: Vec<String>,
    required_skills: Vec<String>,
    search_keywords: Vec<String>,
    min_years_experience: Option<f32>,
    education_level: Option<String>,
    requires_resume: bool,
    status: String,
    applicants: i64,
    posted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<JobStatus>().map_err(StoreError::Corrupt)?;
        let education_level = row
            .education_level
            .as_deref()
            .map(str::parse::<EducationLevel>)
            .transpose()
            .map_err(StoreError::Corrupt)?;

        Ok(Job {
            id: row.id,
            company_id: row.company_id,
            company_name: row.company_name,
            title: row.title,
            description: row.description,
            category: row.category,
            requirements: row.requirements,
            responsibilities: row.responsibilities,
            required_skills: row.required_skills,
            search_keywords: row.search_keywords,
            min_years_experience: row.min_years_experience,
            education_level,
            requires_resume: row.requires_resume,
            status,
            applicants: row.applicants,
            posted_at: row.posted_at,
            created_at: row.created_at,
            last_modified: row.last_modified,
        })
    }
}

#[derive(Debug, FromRow)]
struct ApplicationRow {
    id: Uuid,
    job_id: Uuid,
    company_id: Uuid,
    job_title: String,
    company_name: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    form: Option<Json<ApplicationForm>>,
    resume: Option<Json<ResumeFile>>,
    status: String,
    notes: Option<String>,
    processing_status: String,
    processing_error: Option<String>,
    processing_runs: i32,
    eligible_for_second_round: bool,
    manual_invite_sent: bool,
    manual_invite_sent_at: Option<DateTime<Utc>>,
    interview_completed: bool,
    interview_completed_at: Option<DateTime<Utc>>,
    fit_score: Option<i16>,
    fit_score_breakdown: Option<Json<FitScoreBreakdown>>,
    parsed_resume: Option<Json<CandidateProfile>>,
    scoring_version: Option<String>,
    applied_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    processing_started_at: Option<DateTime<Utc>>,
    processing_completed_at: Option<DateTime<Utc>>,
    last_accessed_at: Option<DateTime<Utc>>,
    access_count: i64,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StoreError;

    fn try_from(row: ApplicationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<ApplicationStatus>()
            .map_err(StoreError::Corrupt)?;
        let processing_status = row
            .processing_status
            .parse::<ProcessingStatus>()
            .map_err(StoreError::Corrupt)?;
        let scoring_version = row
            .scoring_version
            .as_deref()
            .map(str::parse::<ScoringVersion>)
            .transpose()
            .map_err(StoreError::Corrupt)?;
        let fit_score = row
            .fit_score
            .map(u8::try_from)
            .transpose()
            .map_err(|_| {
                StoreError::Corrupt(format!("application {} fit score out of range", row.id))
            })?;

        let processing_runs = u32::try_from(row.processing_runs).map_err(|_| {
            StoreError::Corrupt(format!("application {} has a negative run count", row.id))
        })?;

        Ok(Application {
            id: row.id,
            job_id: row.job_id,
            company_id: row.company_id,
            job_title: row.job_title,
            company_name: row.company_name,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            form: row.form.map(|f| f.0),
            resume: row.resume.map(|r| r.0),
            status,
            notes: row.notes,
            processing_status,
            processing_error: row.processing_error,
            processing_runs,
            eligible_for_second_round: row.eligible_for_second_round,
            manual_invite_sent: row.manual_invite_sent,
            manual_invite_sent_at: row.manual_invite_sent_at,
            interview_completed: row.interview_completed,
            interview_completed_at: row.interview_completed_at,
            fit_score,
            fit_score_breakdown: row.fit_score_breakdown.map(|b| b.0),
            parsed_resume: row.parsed_resume.map(|p| p.0),
            scoring_version,
            applied_at: row.applied_at,
            last_modified: row.last_modified,
            processing_started_at: row.processing_started_at,
            processing_completed_at: row.processing_completed_at,
            last_accessed_at: row.last_accessed_at,
            access_count: row.access_count,
        })
    }
}

const JOB_SELECT: &str = r#"
    SELECT j.id, j.company_id, c.company_name, j.title, j.description, j.category,
           j.requirements, j.responsibilities, j.required_skills, j.search_keywords,
           j.min_years_experience, j.education_level, j.requires_resume, j.status,
           j.applicants, j.posted_at, j.created_at, j.last_modified
    FROM jobs j
    JOIN companies c ON c.id = j.company_id
"#;

/// Unique and foreign-key violations are caller errors, everything else stays a database error.
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound(format!("referenced record ({})", db.message()));
        }
    }
    StoreError::Database(err)
}

fn rows<T, R>(raw: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    raw.into_iter().map(T::try_from).collect()
}

async fn exists(
    conn: &mut PgConnection,
    table: &'static str,
    id: Uuid,
) -> Result<bool, StoreError> {
    let found: Option<i32> = sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Turns "no row matched the guarded update" into the right error.
async fn guard_miss(
    conn: &mut PgConnection,
    table: &'static str,
    id: Uuid,
    why: String,
) -> StoreError {
    match exists(conn, table, id).await {
        Ok(true) => StoreError::Precondition(why),
        Ok(false) => StoreError::NotFound(format!("{} {id}", table.trim_end_matches('s'))),
        Err(e) => e,
    }
}

async fn apply_write(conn: &mut PgConnection, write: RecordWrite) -> Result<(), StoreError> {
    match write {
        RecordWrite::InsertApplication(app) => {
            sqlx::query(
                r#"
                INSERT INTO applications
                    (id, job_id, company_id, job_title, company_name, first_name, last_name,
                     email, phone, form, resume, status, processing_status,
                     applied_at, last_modified)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(app.id)
            .bind(app.job_id)
            .bind(app.company_id)
            .bind(&app.job_title)
            .bind(&app.company_name)
            .bind(&app.first_name)
            .bind(&app.last_name)
            .bind(&app.email)
            .bind(&app.phone)
            .bind(app.form.as_ref().map(Json))
            .bind(app.resume.as_ref().map(Json))
            .bind(app.status.as_str())
            .bind(app.processing_status.as_str())
            .bind(app.applied_at)
            .bind(app.last_modified)
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;
        }
        RecordWrite::UpdateApplicationStatus {
            id,
            expected,
            status,
            notes,
            at,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE applications
                SET status = $1, notes = COALESCE($2, notes), last_modified = $3
                WHERE id = $4 AND status = $5
                "#,
            )
            .bind(status.as_str())
            .bind(notes)
            .bind(at)
            .bind(id)
            .bind(expected.as_str())
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() != 1 {
                let why = format!("application {id} is no longer {}", expected.as_str());
                return Err(guard_miss(conn, "applications", id, why).await);
            }
        }
        RecordWrite::DeleteApplication { id, expected } => {
            let result = sqlx::query("DELETE FROM applications WHERE id = $1 AND status = $2")
                .bind(id)
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await?;
            if result.rows_affected() != 1 {
                let why = format!("application {id} changed status");
                return Err(guard_miss(conn, "applications", id, why).await);
            }
        }
        RecordWrite::InsertJob(job) => {
            sqlx::query(
                r#"
                INSERT INTO jobs
                    (id, company_id, title, description, category, requirements,
                     responsibilities, required_skills, search_keywords, min_years_experience,
                     education_level, requires_resume, status, applicants, posted_at,
                     created_at, last_modified)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(job.id)
            .bind(job.company_id)
            .bind(&job.title)
            .bind(&job.description)
            .bind(&job.category)
            .bind(&job.requirements)
            .bind(&job.responsibilities)
            .bind(&job.required_skills)
            .bind(&job.search_keywords)
            .bind(job.min_years_experience)
            .bind(job.education_level.map(EducationLevel::as_str))
            .bind(job.requires_resume)
            .bind(job.status.as_str())
            .bind(job.applicants)
            .bind(job.posted_at)
            .bind(job.created_at)
            .bind(job.last_modified)
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;
        }
        RecordWrite::UpdateJobStatus {
            id,
            expected,
            status,
            posted_at,
            at,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET status = $1, posted_at = COALESCE($2, posted_at), last_modified = $3
                WHERE id = $4 AND status = $5
                "#,
            )
            .bind(status.as_str())
            .bind(posted_at)
            .bind(at)
            .bind(id)
            .bind(expected.as_str())
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() != 1 {
                let why = format!("job {id} is no longer {}", expected.as_str());
                return Err(guard_miss(conn, "jobs", id, why).await);
            }
        }
        RecordWrite::DeleteJob { id, expected } => {
            let result = sqlx::query("DELETE FROM jobs WHERE id = $1 AND status = $2")
                .bind(id)
                .bind(expected.as_str())
                .execute(&mut *conn)
                .await
                .map_err(|e| match map_db_error(e) {
                    StoreError::NotFound(_) => {
                        StoreError::Conflict(format!("job {id} still has applications"))
                    }
                    other => other,
                })?;
            if result.rows_affected() != 1 {
                let why = format!("job {id} changed status");
                return Err(guard_miss(conn, "jobs", id, why).await);
            }
        }
    }
    Ok(())
}

async fn apply_delta(conn: &mut PgConnection, delta: &CounterDelta) -> Result<(), StoreError> {
    if !delta.field.applies_to(delta.scope) {
        return Err(StoreError::Precondition(format!(
            "{:?} is not a {:?} counter",
            delta.field, delta.scope
        )));
    }

    // Column names come from `CounterField::column`, never from input.
    let col = delta.field.column();
    let (sql, id) = match delta.scope {
        CounterScope::Company(id) => (
            format!("UPDATE companies SET {col} = {col} + $1, updated_at = NOW() WHERE id = $2"),
            id,
        ),
        CounterScope::Job(id) => (format!("UPDATE jobs SET {col} = {col} + $1 WHERE id = $2"), id),
    };

    let result = sqlx::query(&sql)
        .bind(delta.amount)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() != 1 {
        return Err(StoreError::NotFound(format!("counter owner {:?}", delta.scope)));
    }
    Ok(())
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn get_company(&self, id: Uuid) -> Result<Option<Company>, StoreError> {
        let row: Option<CompanyRow> = sqlx::query_as("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Company::from))
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(&format!("{JOB_SELECT} WHERE j.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn list_jobs(
        &self,
        company_id: Uuid,
        status: Option<JobStatus>,
    ) -> Result<Vec<Job>, StoreError> {
        let raw: Vec<JobRow> = sqlx::query_as(&format!(
            "{JOB_SELECT} WHERE j.company_id = $1 AND ($2::TEXT IS NULL OR j.status = $2) \
             ORDER BY j.posted_at DESC NULLS LAST, j.id"
        ))
        .bind(company_id)
        .bind(status.map(JobStatus::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows(raw)
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        let row: Option<ApplicationRow> =
            sqlx::query_as("SELECT * FROM applications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Application::try_from).transpose()
    }

    async fn find_application_by_email(
        &self,
        job_id: Uuid,
        email: &str,
    ) -> Result<Option<Application>, StoreError> {
        let row: Option<ApplicationRow> =
            sqlx::query_as("SELECT * FROM applications WHERE job_id = $1 AND email = $2")
                .bind(job_id)
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Application::try_from).transpose()
    }

    async fn list_applications(
        &self,
        filters: &ApplicationFilters,
    ) -> Result<Vec<Application>, StoreError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM applications WHERE TRUE");
        if let Some(company_id) = filters.company_id {
            query.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(job_id) = filters.job_id {
            query.push(" AND job_id = ").push_bind(job_id);
        }
        if let Some(status) = filters.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(processing) = filters.processing_status {
            query
                .push(" AND processing_status = ")
                .push_bind(processing.as_str());
        }
        query.push(" ORDER BY applied_at DESC, id");
        if let Some(limit) = filters.limit {
            query.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let raw: Vec<ApplicationRow> = query.build_query_as().fetch_all(&self.pool).await?;
        rows(raw)
    }

    async fn commit(&self, write: RecordWrite, deltas: &[CounterDelta]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        apply_write(&mut *tx, write).await?;
        for delta in deltas {
            apply_delta(&mut *tx, delta).await?;
        }
        tx.commit().await?;
        debug!(deltas = deltas.len(), "Record write committed");
        Ok(())
    }

    async fn claim_processing(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Claim>, StoreError> {
        // Single guarded UPDATE: Postgres row locking makes this the compare-and-swap.
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            UPDATE applications
            SET processing_status = 'processing', processing_started_at = $2,
                processing_error = NULL, processing_runs = processing_runs + 1,
                last_modified = $2
            WHERE id = $1
              AND (processing_status IN ('pending', 'failed')
                   OR (processing_status = 'processing'
                       AND (processing_started_at IS NULL OR processing_started_at < $3)))
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let application = Application::try_from(row)?;
                // The stored value, at column precision, is what the fenced writes compare
                let token = application.processing_started_at.ok_or_else(|| {
                    StoreError::Corrupt(format!("application {id} claimed without a start time"))
                })?;
                Ok(Some(Claim { application, token }))
            }
            None => {
                let mut conn = self.pool.acquire().await?;
                if exists(&mut conn, "applications", id).await? {
                    Ok(None)
                } else {
                    Err(StoreError::NotFound(format!("application {id}")))
                }
            }
        }
    }

    async fn complete_processing(
        &self,
        claim: &Claim,
        result: &ProcessingResult,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let id = claim.id();
        let score = result.breakdown.overall_score;
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            UPDATE applications
            SET fit_score = $2, fit_score_breakdown = $3, parsed_resume = $4,
                scoring_version = $5,
                eligible_for_second_round = manual_invite_sent OR $6,
                processing_status = 'completed', processing_completed_at = $7,
                processing_error = NULL, last_modified = $7
            WHERE id = $1 AND processing_status = 'processing' AND processing_started_at = $8
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(i16::from(score))
        .bind(Json(&result.breakdown))
        .bind(Json(&result.profile))
        .bind(result.version.as_str())
        .bind(lifecycle::eligible_after_scoring(score, result.threshold, false))
        .bind(now)
        .bind(claim.token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Application::try_from(row),
            None => {
                let mut conn = self.pool.acquire().await?;
                let why = format!("claim on application {id} is no longer held");
                Err(guard_miss(&mut conn, "applications", id, why).await)
            }
        }
    }

    async fn fail_processing(
        &self,
        claim: &Claim,
        error: &str,
        profile: Option<&CandidateProfile>,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let id = claim.id();
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            UPDATE applications
            SET processing_status = 'failed', processing_error = $2,
                parsed_resume = COALESCE($3, parsed_resume),
                processing_completed_at = $4, last_modified = $4
            WHERE id = $1 AND processing_status = 'processing' AND processing_started_at = $5
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(profile.map(Json))
        .bind(now)
        .bind(claim.token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Application::try_from(row),
            None => {
                let mut conn = self.pool.acquire().await?;
                let why = format!("claim on application {id} is no longer held");
                Err(guard_miss(&mut conn, "applications", id, why).await)
            }
        }
    }

    async fn list_recoverable(
        &self,
        stale_before: DateTime<Utc>,
        max_runs: u32,
        limit: u32,
    ) -> Result<Vec<Application>, StoreError> {
        let raw: Vec<ApplicationRow> = sqlx::query_as(
            r#"
            SELECT * FROM applications
            WHERE (processing_status = 'processing'
                   AND (processing_started_at IS NULL OR processing_started_at < $1))
               OR (processing_status = 'pending' AND resume IS NOT NULL AND applied_at < $1)
               OR (processing_status = 'failed' AND resume IS NOT NULL
                   AND processing_runs < $2
                   AND (processing_completed_at IS NULL OR processing_completed_at < $1))
            ORDER BY applied_at
            LIMIT $3
            "#,
        )
        .bind(stale_before)
        .bind(i64::from(max_runs))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows(raw)
    }

    async fn record_manual_invite(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            UPDATE applications
            SET manual_invite_sent = TRUE, manual_invite_sent_at = $2,
                eligible_for_second_round = TRUE, last_modified = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Application::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("application {id}")))
    }

    async fn record_interview_completed(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Application, StoreError> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            UPDATE applications
            SET interview_completed = TRUE, interview_completed_at = $2, last_modified = $2
            WHERE id = $1 AND interview_completed = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Application::try_from(row),
            None => {
                let mut conn = self.pool.acquire().await?;
                let why = format!("interview for application {id} already completed");
                Err(guard_miss(&mut conn, "applications", id, why).await)
            }
        }
    }

    async fn record_access(&self, id: Uuid, now: DateTime<Utc>) -> Result<Application, StoreError> {
        let row: Option<ApplicationRow> = sqlx::query_as(
            r#"
            UPDATE applications
            SET access_count = access_count + 1, last_accessed_at = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Application::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("application {id}")))
    }
}
