//! Background scoring of one submitted application.
//!
//! Every run ends with the outcome written onto the record: `completed` with a breakdown,
//! or `failed` with `processing_error`. A run that cannot even write `failed` leaves the
//! record in `processing`, and the stale sweep picks it up again later.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::extraction::ResumeExtractor;
use crate::lifecycle::eligible_after_scoring;
use crate::lifecycle::queue::{ResumeSource, ScoringTask};
use crate::models::application::Application;
use crate::models::profile::{CandidateProfile, ParsingQuality};
use crate::notify::{self, Notification, Notifier};
use crate::scoring::breakdown::ScoringVersion;
use crate::scoring::{FitScoringEngine, RetryPolicy, ScoringContext};
use crate::store::objects::ObjectStore;
use crate::store::{ApplicationStore, Claim, ProcessingResult, StoreError};

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub version: ScoringVersion,
    pub threshold: u8,
    pub retry: RetryPolicy,
    /// How long a claim may sit in `processing` before another worker may take it over.
    pub stale_after: chrono::Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed { score: u8, eligible: bool },
    Failed { error: String },
    /// Another worker holds the claim, or the record is already completed.
    Skipped,
    /// The claim went stale and another worker took it over before this run could record
    /// its outcome. Nothing was written.
    Superseded,
}

struct RunFailure {
    error: String,
    profile: Option<CandidateProfile>,
}

impl RunFailure {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            profile: None,
        }
    }
}

pub struct ApplicationProcessor {
    store: Arc<dyn ApplicationStore>,
    objects: Arc<dyn ObjectStore>,
    extractor: Arc<ResumeExtractor>,
    engine: Arc<FitScoringEngine>,
    notifier: Arc<dyn Notifier>,
    settings: ProcessorSettings,
}

impl ApplicationProcessor {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        objects: Arc<dyn ObjectStore>,
        extractor: Arc<ResumeExtractor>,
        engine: Arc<FitScoringEngine>,
        notifier: Arc<dyn Notifier>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            store,
            objects,
            extractor,
            engine,
            notifier,
            settings,
        }
    }

    pub fn stale_after(&self) -> chrono::Duration {
        self.settings.stale_after
    }

    /// Claims, extracts, scores and records. `Err` only when the store rejects the final write.
    pub async fn process(&self, task: ScoringTask) -> Result<ProcessOutcome, StoreError> {
        let now = Utc::now();
        let claimed = self
            .store
            .claim_processing(task.application_id, now, now - self.settings.stale_after)
            .await?;
        let Some(claim) = claimed else {
            debug!(application_id = %task.application_id, "Not claimable, skipping");
            return Ok(ProcessOutcome::Skipped);
        };

        let app = &claim.application;
        info!(
            application_id = %app.id,
            job_id = %app.job_id,
            run = app.processing_runs,
            "Processing application"
        );
        match self.run(app, task.resume).await {
            Ok(result) => self.finish(&claim, result).await,
            Err(failure) => self.fail(&claim, failure).await,
        }
    }

    async fn run(
        &self,
        app: &Application,
        resume: ResumeSource,
    ) -> Result<ProcessingResult, RunFailure> {
        let (bytes, format) = match resume {
            ResumeSource::Inline { bytes, format } => (bytes, format),
            ResumeSource::Stored { path, format } => {
                let bytes = self
                    .objects
                    .fetch(&path)
                    .await
                    .map_err(|e| RunFailure::new(format!("Could not fetch resume: {e}")))?;
                (bytes, format)
            }
        };

        let job = self
            .store
            .get_job(app.job_id)
            .await
            .map_err(|e| RunFailure::new(format!("Could not load job: {e}")))?
            .ok_or_else(|| RunFailure::new(format!("Job {} no longer exists", app.job_id)))?;

        let profile = self.extractor.extract(bytes, format).await;
        let form = app.form.clone().filter(|f| !f.is_empty());
        if profile.parsing_quality == ParsingQuality::Failed && form.is_none() {
            let error = profile
                .parsing_error
                .clone()
                .unwrap_or_else(|| "Resume could not be parsed".to_string());
            return Err(RunFailure {
                error,
                profile: Some(profile),
            });
        }
        if profile.is_low_confidence() {
            debug!(
                application_id = %app.id,
                confidence = profile.confidence,
                "Scoring a low-confidence profile"
            );
        }

        let ctx = ScoringContext {
            interests: Vec::new(),
            application_form: form,
        };
        let scored = self
            .engine
            .score_with_retry(&profile, &job, self.settings.version, &ctx, self.settings.retry)
            .await;
        let breakdown = match scored {
            Ok(breakdown) => breakdown,
            Err(e) => {
                return Err(RunFailure {
                    error: format!("Scoring failed: {e}"),
                    profile: Some(profile),
                })
            }
        };

        Ok(ProcessingResult {
            version: breakdown.version().unwrap_or(self.settings.version),
            profile,
            breakdown,
            threshold: self.settings.threshold,
        })
    }

    async fn finish(
        &self,
        claim: &Claim,
        result: ProcessingResult,
    ) -> Result<ProcessOutcome, StoreError> {
        let app = &claim.application;
        let score = result.breakdown.overall_score;
        let updated = match self.store.complete_processing(claim, &result, Utc::now()).await {
            Ok(updated) => updated,
            Err(StoreError::Precondition(msg)) => return Ok(superseded(app, &msg)),
            Err(e) => {
                error!(application_id = %app.id, "Could not record scoring result: {e}");
                let failure = RunFailure {
                    error: format!("Could not record scoring result: {e}"),
                    profile: Some(result.profile),
                };
                return self.fail(claim, failure).await;
            }
        };

        info!(
            application_id = %app.id,
            score,
            version = %result.version,
            eligible = updated.eligible_for_second_round,
            "Application scored"
        );

        if eligible_after_scoring(score, self.settings.threshold, false)
            && !updated.manual_invite_sent
        {
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
        }

        Ok(ProcessOutcome::Completed {
            score,
            eligible: updated.eligible_for_second_round,
        })
    }

    async fn fail(&self, claim: &Claim, failure: RunFailure) -> Result<ProcessOutcome, StoreError> {
        let app = &claim.application;
        warn!(application_id = %app.id, "Application processing failed: {}", failure.error);
        let written = self
            .store
            .fail_processing(claim, &failure.error, failure.profile.as_ref(), Utc::now())
            .await;
        match written {
            Ok(_) => Ok(ProcessOutcome::Failed {
                error: failure.error,
            }),
            Err(StoreError::Precondition(msg)) => Ok(superseded(app, &msg)),
            Err(e) => Err(e),
        }
    }
}

fn superseded(app: &Application, reason: &str) -> ProcessOutcome {
    warn!(application_id = %app.id, "Dropping run outcome: {reason}");
    ProcessOutcome::Superseded
}
