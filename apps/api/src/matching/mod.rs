//! Matching Orchestrator: one résumé against every open job of a company.
//!
//! Jobs are scored concurrently on a `JoinSet`, bounded by a semaphore. Each task owns its
//! job and returns its own result; a failed task drops that job, never the session.

pub mod cache;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::{check_upload, ResumeExtractor};
use crate::models::job::{Job, JobStatus};
use crate::models::profile::CandidateProfile;
use crate::scoring::breakdown::{FitScoreBreakdown, Recommendation, ScoringVersion};
use crate::scoring::title_match::match_title;
use crate::scoring::{FitScoringEngine, ScoringContext};
use crate::store::ApplicationStore;
use cache::{fingerprint, session_key, MatchCache};

pub const MAX_INTERESTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchConfidence {
    High,
    Medium,
    Low,
}

impl MatchConfidence {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => MatchConfidence::High,
            70..=84 => MatchConfidence::Medium,
            _ => MatchConfidence::Low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedJob {
    pub id: Uuid,
    pub title: String,
    pub company_name: String,
    pub category: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetails {
    /// The interest tag this job lines up with, if any.
    pub interest_alignment: Option<String>,
    pub confidence: MatchConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatchResult {
    pub job: MatchedJob,
    pub match_score: u8,
    pub reasoning: String,
    pub recommendation: Recommendation,
    pub skills_matched: Vec<String>,
    pub skills_missing: Vec<String>,
    pub match_details: MatchDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSession {
    pub session_id: String,
    pub matches: Vec<JobMatchResult>,
    pub total_jobs_analyzed: usize,
    pub processing_time_ms: u64,
    pub method: ScoringVersion,
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub company_id: Uuid,
    pub resume: Bytes,
    pub content_type: String,
    pub interests: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub version: ScoringVersion,
    pub concurrency: usize,
    pub max_results: usize,
    pub cache_ttl: Duration,
    pub max_resume_bytes: usize,
}

pub struct MatchingOrchestrator {
    store: Arc<dyn ApplicationStore>,
    extractor: Arc<ResumeExtractor>,
    engine: Arc<FitScoringEngine>,
    cache: Arc<dyn MatchCache>,
    settings: MatchSettings,
}

impl MatchingOrchestrator {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        extractor: Arc<ResumeExtractor>,
        engine: Arc<FitScoringEngine>,
        cache: Arc<dyn MatchCache>,
        settings: MatchSettings,
    ) -> Self {
        Self {
            store,
            extractor,
            engine,
            cache,
            settings,
        }
    }

    pub async fn match_jobs(&self, request: MatchRequest) -> Result<MatchSession, AppError> {
        let interests = validate_interests(&request.interests)?;
        let format = check_upload(
            &request.content_type,
            request.resume.len(),
            self.settings.max_resume_bytes,
        )?;

        self.store
            .get_company(request.company_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Company {} not found", request.company_id))
            })?;

        let session_id = session_key(
            &fingerprint(&request.resume),
            request.company_id,
            &interests,
        );
        match self.cache.get(&session_id).await {
            Ok(Some(mut session)) => {
                info!(session_id = %session_id, "Serving match session from cache");
                session.cached = true;
                return Ok(session);
            }
            Ok(None) => {}
            Err(e) => warn!(session_id = %session_id, "Match cache read failed, recomputing: {e}"),
        }

        let jobs = self
            .store
            .list_jobs(request.company_id, Some(JobStatus::Active))
            .await?;

        let profile = if jobs.is_empty() {
            None
        } else {
            Some(Arc::new(self.extractor.extract(request.resume, format).await))
        };

        let started = Instant::now();
        let (total_jobs_analyzed, matches) = match profile {
            Some(profile) => self.score_all(jobs, profile, &interests).await,
            None => (0, Vec::new()),
        };
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let session = MatchSession {
            session_id,
            matches,
            total_jobs_analyzed,
            processing_time_ms,
            method: self.settings.version,
            cached: false,
        };

        if let Err(e) = self.cache.put(&session, self.settings.cache_ttl).await {
            warn!(session_id = %session.session_id, "Match cache write failed: {e}");
        }

        info!(
            session_id = %session.session_id,
            company_id = %request.company_id,
            jobs = session.total_jobs_analyzed,
            matches = session.matches.len(),
            elapsed_ms = session.processing_time_ms,
            "Matching complete"
        );
        Ok(session)
    }

    /// Returns the number of distinct jobs analyzed and the ranked, capped matches.
    async fn score_all(
        &self,
        jobs: Vec<Job>,
        profile: Arc<CandidateProfile>,
        interests: &[String],
    ) -> (usize, Vec<JobMatchResult>) {
        let mut seen = HashSet::new();
        let jobs: Vec<Job> = jobs.into_iter().filter(|j| seen.insert(j.id)).collect();
        let total = jobs.len();

        let semaphore = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let ctx = Arc::new(ScoringContext {
            interests: interests.to_vec(),
            application_form: None,
        });
        let mut tasks = JoinSet::new();

        for job in jobs {
            let semaphore = semaphore.clone();
            let engine = self.engine.clone();
            let profile = profile.clone();
            let ctx = ctx.clone();
            let version = self.settings.version;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                match engine.score(&profile, &job, version, &ctx).await {
                    Ok(breakdown) => Some(to_match(&job, breakdown, &ctx.interests)),
                    Err(e) => {
                        warn!(job_id = %job.id, "Skipping job, scoring failed: {e}");
                        None
                    }
                }
            });
        }

        let mut matches = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(result)) => matches.push(result),
                Ok(None) => {}
                Err(e) => warn!("Scoring task aborted: {e}"),
            }
        }

        rank(&mut matches);
        matches.truncate(self.settings.max_results);
        (total, matches)
    }
}

/// 1..=5 distinct, non-blank interests. Duplicates differing only in case or surrounding
/// whitespace count once, as they do in the session key. Anything else is a client error,
/// never silently truncated.
pub fn validate_interests(interests: &[String]) -> Result<Vec<String>, AppError> {
    if interests.iter().any(|i| i.trim().is_empty()) {
        return Err(AppError::UnprocessableEntity(
            "Interests must not be blank".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    let distinct: Vec<String> = interests
        .iter()
        .map(|i| i.trim())
        .filter(|i| seen.insert(i.to_lowercase()))
        .map(str::to_string)
        .collect();
    if distinct.is_empty() || distinct.len() > MAX_INTERESTS {
        return Err(AppError::UnprocessableEntity(format!(
            "Between 1 and {MAX_INTERESTS} interests are required, got {}",
            distinct.len()
        )));
    }
    Ok(distinct)
}

fn to_match(job: &Job, breakdown: FitScoreBreakdown, interests: &[String]) -> JobMatchResult {
    let title = match_title(&job.title, interests).filter(|t| t.score > 0);
    let score = breakdown.overall_score;
    let reasoning = match &title {
        Some(t) if !breakdown.reasoning.is_empty() => {
            format!("{}. {}", t.reasoning(), breakdown.reasoning)
        }
        Some(t) => t.reasoning(),
        None => breakdown.reasoning.clone(),
    };

    JobMatchResult {
        job: MatchedJob {
            id: job.id,
            title: job.title.clone(),
            company_name: job.company_name.clone(),
            category: job.category.clone(),
            posted_at: job.posted_at,
        },
        match_score: score,
        reasoning,
        recommendation: breakdown.recommendation,
        skills_matched: breakdown.skills_matched,
        skills_missing: breakdown.skills_missing,
        match_details: MatchDetails {
            interest_alignment: title.map(|t| t.interest),
            confidence: MatchConfidence::from_score(score),
        },
    }
}

/// Score descending, then most recently posted first, then id for a total order.
fn rank(matches: &mut [JobMatchResult]) {
    matches.sort_by(|a, b| {
        b.match_score
            .cmp(&a.match_score)
            .then_with(|| b.job.posted_at.cmp(&a.job.posted_at))
            .then_with(|| a.job.id.cmp(&b.job.id))
    });
}
