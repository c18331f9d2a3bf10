//! Application submission and company-side management.
//!
//! Submission returns as soon as the record and its counters are committed. Scoring runs
//! afterwards on the scoring queue, and its outcome is visible only through
//! `processing_status` on later reads.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{check_upload, ResumeFormat};
use crate::ledger::{self, saga::release_object, saga::Saga};
use crate::lifecycle::queue::{ResumeSource, ScoringQueue, ScoringTask};
use crate::lifecycle::{self, EligibilityCheck};
use crate::models::application::{
    ApplicantFields, Application, ApplicationFilters, ApplicationStatus, ProcessingStatus,
    ResumeFile,
};
use crate::models::job::Job;
use crate::notify::{self, Notification, Notifier};
use crate::store::objects::ObjectStore;
use crate::store::{ApplicationStore, RecordWrite, StoreError};

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const MAX_LIST_LIMIT: u32 = 500;
const MAX_NAME_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 254;

#[derive(Debug, Clone)]
pub struct ResumeUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub job_id: Uuid,
    pub fields: ApplicantFields,
    pub resume: Option<ResumeUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub application_id: Uuid,
    pub processing_status: ProcessingStatus,
}

pub struct ApplicationService {
    store: Arc<dyn ApplicationStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    queue: ScoringQueue,
    max_resume_bytes: usize,
}

impl ApplicationService {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        queue: ScoringQueue,
        max_resume_bytes: usize,
    ) -> Self {
        Self {
            store,
            objects,
            notifier,
            queue,
            max_resume_bytes,
        }
    }

    pub async fn submit(&self, submission: Submission) -> Result<SubmissionReceipt, AppError> {
        let Submission {
            job_id,
            fields,
            resume,
        } = submission;

        validate_applicant(&fields)?;
        let resume = match resume {
            Some(upload) => {
                let format = check_upload(
                    &upload.content_type,
                    upload.bytes.len(),
                    self.max_resume_bytes,
                )?;
                Some((upload, format))
            }
            None => None,
        };

        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {job_id} not found")))?;
        if !job.is_open() {
            return Err(AppError::Validation(format!(
                "Job {job_id} is not accepting applications"
            )));
        }
        if job.requires_resume && resume.is_none() {
            return Err(AppError::Validation(
                "A resume is required for this job".to_string(),
            ));
        }

        let email = fields.normalized_email();
        if self
            .store
            .find_application_by_email(job_id, &email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "An application for this job has already been submitted with this email"
                    .to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let mut saga = Saga::begin(self.objects.as_ref(), "submit_application");
        let stored = match &resume {
            Some((upload, format)) => {
                let path = resume_path(&job, id, *format);
                let object = saga.upload(&path, upload.bytes.clone(), format.mime()).await?;
                Some(ResumeFile {
                    path: object.path,
                    url: object.url,
                    file_name: upload.file_name.clone(),
                    content_type: format.mime().to_string(),
                })
            }
            None => None,
        };

        let app = Application::submitted(id, &job, fields, stored, Utc::now());
        let deltas = ledger::application_created(&app);
        let write = RecordWrite::InsertApplication(Box::new(app.clone()));
        if let Err(e) = self.store.commit(write, &deltas).await {
            let uploaded = app.resume.is_some();
            saga.abort(&e).await;
            return Err(match e {
                StoreError::Conflict(msg) => AppError::Conflict(msg),
                e if uploaded => AppError::PartialFailure(format!(
                    "application {id} could not be recorded after its resume was stored: {e}"
                )),
                e => e.into(),
            });
        }
        saga.complete();

        info!(
            application_id = %app.id,
            job_id = %job.id,
            company_id = %job.company_id,
            has_resume = app.resume.is_some(),
            "Application submitted"
        );

        notify::dispatch(
            self.notifier.clone(),
            Notification::ApplicationReceived {
                application_id: app.id,
                to: app.email.clone(),
                applicant_name: app.full_name(),
                job_title: app.job_title.clone(),
                company_name: app.company_name.clone(),
            },
        );

        if let Some((upload, format)) = resume {
            self.queue.enqueue(ScoringTask {
                application_id: app.id,
                resume: ResumeSource::Inline {
                    bytes: upload.bytes,
                    format,
                },
            });
        }

        Ok(SubmissionReceipt {
            application_id: app.id,
            processing_status: app.processing_status,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Application, AppError> {
        self.store
            .get_application(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application {id} not found")))
    }

    pub async fn list(&self, mut filters: ApplicationFilters) -> Result<Vec<Application>, AppError> {
        filters.limit = Some(
            filters
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT),
        );
        Ok(self.store.list_applications(&filters).await?)
    }

    /// Applicant-facing read; bumps the access audit fields.
    pub async fn track(&self, id: Uuid) -> Result<Application, AppError> {
        Ok(self.store.record_access(id, Utc::now()).await?)
    }

    pub async fn update_status(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        notes: Option<String>,
    ) -> Result<Application, AppError> {
        let app = self.get(id).await?;
        if app.status == status && notes.is_none() {
            return Ok(app);
        }

        let deltas = if app.status == status {
            Vec::new()
        } else {
            ledger::application_status_changed(&app, app.status, status)
        };
        let write = RecordWrite::UpdateApplicationStatus {
            id,
            expected: app.status,
            status,
            notes,
            at: Utc::now(),
        };
        self.store.commit(write, &deltas).await?;

        info!(
            application_id = %id,
            from = app.status.as_str(),
            to = status.as_str(),
            "Application status updated"
        );
        self.get(id).await
    }

    /// Record and counters first; the stored résumé is removed afterwards and a failure
    /// there only leaves an orphaned object.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let app = self.get(id).await?;
        let write = RecordWrite::DeleteApplication {
            id,
            expected: app.status,
        };
        self.store
            .commit(write, &ledger::application_deleted(&app))
            .await?;

        if let Some(file) = &app.resume {
            release_object(self.objects.as_ref(), &file.path, "delete_application").await;
        }
        info!(application_id = %id, "Application deleted");
        Ok(())
    }

    pub async fn check_eligibility(&self, id: Uuid) -> Result<EligibilityCheck, AppError> {
        Ok(lifecycle::check_eligibility(&self.get(id).await?))
    }

    /// Human override: makes the applicant eligible whatever the automatic score said.
    pub async fn send_manual_invite(&self, id: Uuid) -> Result<EligibilityCheck, AppError> {
        let app = self.get(id).await?;
        if app.interview_completed {
            return Err(AppError::Conflict(format!(
                "Interview for application {id} is already completed"
            )));
        }

        let updated = self.store.record_manual_invite(id, Utc::now()).await?;
        info!(application_id = %id, fit_score = ?updated.fit_score, "Manual invite sent");
        notify::dispatch(
            self.notifier.clone(),
            Notification::InterviewInvitation {
                application_id: updated.id,
                to: updated.email.clone(),
                applicant_name: updated.full_name(),
                job_title: updated.job_title.clone(),
                company_name: updated.company_name.clone(),
            },
        );
        Ok(lifecycle::check_eligibility(&updated))
    }

    /// Records the interview once. Repeats and ineligible applicants are rejected.
    pub async fn complete_interview(&self, id: Uuid) -> Result<EligibilityCheck, AppError> {
        let app = self.get(id).await?;
        if app.interview_completed {
            return Err(AppError::Conflict(format!(
                "Interview for application {id} is already completed"
            )));
        }
        if !app.eligible_for_second_round {
            return Err(AppError::Conflict(format!(
                "Application {id} is not eligible for an interview"
            )));
        }

        let updated = self.store.record_interview_completed(id, Utc::now()).await?;
        info!(application_id = %id, "Interview completed");
        Ok(lifecycle::check_eligibility(&updated))
    }
}

fn resume_path(job: &Job, application_id: Uuid, format: ResumeFormat) -> String {
    format!(
        "resumes/{}/{}/{}_resume.{}",
        job.company_id,
        job.id,
        application_id,
        format.extension()
    )
}

fn validate_applicant(fields: &ApplicantFields) -> Result<(), AppError> {
    for (label, value) in [
        ("First name", &fields.first_name),
        ("Last name", &fields.last_name),
    ] {
        let value = value.trim();
        if value.is_empty() {
            return Err(AppError::Validation(format!("{label} is required")));
        }
        if value.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "{label} must be at most {MAX_NAME_LEN} characters"
            )));
        }
    }

    let email = fields.normalized_email();
    if email.len() > MAX_EMAIL_LEN || !is_plausible_email(&email) {
        return Err(AppError::Validation(format!(
            "'{}' is not a valid email address",
            fields.email.trim()
        )));
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !email.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}
