//! Job postings and the company counter audit.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ledger::{self, AuditReport};
use crate::models::application::ApplicationFilters;
use crate::models::job::{Job, JobStatus, NewJob};
use crate::store::{ApplicationStore, RecordWrite};

pub struct JobService {
    store: Arc<dyn ApplicationStore>,
}

impl JobService {
    pub fn new(store: Arc<dyn ApplicationStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, AppError> {
        self.store
            .get_job(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
    }

    pub async fn create(&self, new_job: NewJob) -> Result<Job, AppError> {
        let title = new_job.title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Job title is required".to_string()));
        }
        if new_job.min_years_experience.is_some_and(|y| !y.is_finite() || y < 0.0) {
            return Err(AppError::Validation(
                "minYearsExperience must be a non-negative number".to_string(),
            ));
        }

        let company = self
            .store
            .get_company(new_job.company_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Company {} not found", new_job.company_id))
            })?;

        let now = Utc::now();
        let job = Job {
            id: Uuid::new_v4(),
            company_id: company.id,
            company_name: company.company_name,
            title: title.to_string(),
            description: new_job.description,
            category: new_job.category,
            requirements: new_job.requirements,
            responsibilities: new_job.responsibilities,
            required_skills: new_job.required_skills,
            search_keywords: new_job.search_keywords,
            min_years_experience: new_job.min_years_experience,
            education_level: new_job.education_level,
            requires_resume: new_job.requires_resume,
            status: new_job.status,
            applicants: 0,
            posted_at: (new_job.status == JobStatus::Active).then_some(now),
            created_at: now,
            last_modified: now,
        };

        self.store
            .commit(
                RecordWrite::InsertJob(Box::new(job.clone())),
                &ledger::job_created(&job),
            )
            .await?;
        info!(job_id = %job.id, company_id = %job.company_id, status = job.status.as_str(), "Job created");
        Ok(job)
    }

    /// Activation stamps a fresh `posted_at`, which also moves the job up in match tie-breaks.
    pub async fn update_status(&self, id: Uuid, status: JobStatus) -> Result<Job, AppError> {
        let job = self.get(id).await?;
        if job.status == status {
            return Ok(job);
        }

        let now = Utc::now();
        let write = RecordWrite::UpdateJobStatus {
            id,
            expected: job.status,
            status,
            posted_at: (status == JobStatus::Active).then_some(now),
            at: now,
        };
        self.store
            .commit(write, &ledger::job_status_changed(&job, job.status, status))
            .await?;

        info!(
            job_id = %id,
            from = job.status.as_str(),
            to = status.as_str(),
            "Job status updated"
        );
        self.get(id).await
    }

    /// Jobs that still have applications cannot be deleted; close them instead.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let job = self.get(id).await?;
        let filters = ApplicationFilters {
            job_id: Some(id),
            limit: Some(1),
            ..Default::default()
        };
        if !self.store.list_applications(&filters).await?.is_empty() {
            return Err(AppError::Conflict(format!(
                "Job {id} has applications; close it instead of deleting"
            )));
        }

        let write = RecordWrite::DeleteJob {
            id,
            expected: job.status,
        };
        self.store.commit(write, &ledger::job_deleted(&job)).await?;
        info!(job_id = %id, "Job deleted");
        Ok(())
    }

    /// Recounts the company's records and reports counters that disagree.
    pub async fn audit(&self, company_id: Uuid) -> Result<AuditReport, AppError> {
        let company = self
            .store
            .get_company(company_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Company {company_id} not found")))?;
        let jobs = self.store.list_jobs(company_id, None).await?;
        let filters = ApplicationFilters {
            company_id: Some(company_id),
            ..Default::default()
        };
        let applications = self.store.list_applications(&filters).await?;

        let report = ledger::audit_company(&company, &jobs, &applications);
        if !report.is_clean() {
            warn!(
                company_id = %company_id,
                drifted = report.drift.len(),
                "Counter drift detected"
            );
        }
        Ok(report)
    }
}
