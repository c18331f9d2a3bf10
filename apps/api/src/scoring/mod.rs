//! Fit Scoring Engine: versioned, trait-based strategies behind one lookup table.
//!
//! Each `ScoringVersion` maps to exactly one `ScoringStrategy`. Adding a version means
//! registering a new strategy; existing ones are never touched.
//!
//! Every breakdown leaving the engine is normalized: scores clamped to 0..=100, the overall
//! reproducible from weighted components, and the recommendation derived from the overall.

pub mod breakdown;
pub mod deterministic;
pub mod llm_scorer;
pub mod prompts;
pub mod title_match;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::llm_client::{LanguageModel, LlmError};
use crate::models::application::ApplicationForm;
use crate::models::job::Job;
use crate::models::profile::CandidateProfile;

use self::breakdown::{FitScoreBreakdown, ScoringVersion};
use self::deterministic::{DeterministicScorer, ScoringWeights};
use self::llm_scorer::LlmScorer;

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("scoring service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid scoring response: {0}")]
    InvalidResponse(String),

    #[error("scoring request rejected: {0}")]
    Rejected(String),

    #[error("insufficient input: {0}")]
    InsufficientInput(String),

    #[error("no strategy registered for {0}")]
    UnknownVersion(ScoringVersion),
}

impl ScoringError {
    /// Only upstream unavailability is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScoringError::Unavailable(_))
    }
}

impl From<LlmError> for ScoringError {
    fn from(e: LlmError) -> Self {
        if e.is_transient() {
            return ScoringError::Unavailable(e.to_string());
        }
        match e {
            LlmError::Api { status, message } => {
                ScoringError::Rejected(format!("status {status}: {message}"))
            }
            other => ScoringError::InvalidResponse(other.to_string()),
        }
    }
}

/// Inputs beyond the profile and the job that some versions consider.
#[derive(Debug, Clone, Default)]
pub struct ScoringContext {
    /// Interest tags from a matching request; empty for application scoring.
    pub interests: Vec<String>,
    /// Verified application data; read by v2 and v3.
    pub application_form: Option<ApplicationForm>,
}

#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    fn version(&self) -> ScoringVersion;

    async fn score(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        ctx: &ScoringContext,
    ) -> Result<FitScoreBreakdown, ScoringError>;
}

/// Exponential backoff for retryable scoring failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `n` (1-based retry count): base, 2×base, 4×base...
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}

pub struct FitScoringEngine {
    strategies: HashMap<ScoringVersion, Arc<dyn ScoringStrategy>>,
    fallback: Option<Arc<dyn ScoringStrategy>>,
    timeout: Duration,
}

impl FitScoringEngine {
    pub fn new(timeout: Duration) -> Self {
        Self {
            strategies: HashMap::new(),
            fallback: None,
            timeout,
        }
    }

    /// All three versions, with v3 as the degradation path when `fallback` is set.
    pub fn standard(
        llm: Arc<dyn LanguageModel>,
        weights: ScoringWeights,
        timeout: Duration,
        fallback: bool,
    ) -> Self {
        let deterministic: Arc<dyn ScoringStrategy> = Arc::new(DeterministicScorer::new(weights));
        let engine = Self::new(timeout)
            .register(Arc::new(LlmScorer::simple(llm.clone(), timeout)))
            .register(Arc::new(LlmScorer::enhanced(llm, timeout)))
            .register(deterministic.clone());
        if fallback {
            engine.with_fallback(deterministic)
        } else {
            engine
        }
    }

    pub fn register(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.strategies.insert(strategy.version(), strategy);
        self
    }

    pub fn with_fallback(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        self.fallback = Some(strategy);
        self
    }

    pub fn supports(&self, version: ScoringVersion) -> bool {
        self.strategies.contains_key(&version)
    }

    /// Single attempt, falling back when configured.
    pub async fn score(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        version: ScoringVersion,
        ctx: &ScoringContext,
    ) -> Result<FitScoreBreakdown, ScoringError> {
        self.score_with_retry(profile, job, version, ctx, RetryPolicy::none())
            .await
    }

    /// Retries retryable failures with backoff; once attempts are exhausted (or the error is
    /// not retryable) the fallback strategy, if any, produces the result instead.
    pub async fn score_with_retry(
        &self,
        profile: &CandidateProfile,
        job: &Job,
        version: ScoringVersion,
        ctx: &ScoringContext,
        policy: RetryPolicy,
    ) -> Result<FitScoreBreakdown, ScoringError> {
        let strategy = self
            .strategies
            .get(&version)
            .ok_or(ScoringError::UnknownVersion(version))?;

        let mut attempt = 1;
        let error = loop {
            match self.run(strategy.as_ref(), profile, job, ctx).await {
                Ok(breakdown) => return Ok(breakdown.normalize()),
                Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        job_id = %job.id,
                        version = %version,
                        "Scoring attempt {attempt} failed ({e}), retrying after {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => break e,
            }
        };

        match &self.fallback {
            Some(fallback) if fallback.version() != version => {
                warn!(
                    job_id = %job.id,
                    version = %version,
                    fallback = %fallback.version(),
                    "Scoring failed ({error}), using fallback strategy"
                );
                let mut breakdown = self.run(fallback.as_ref(), profile, job, ctx).await?;
                if let Some(method) = breakdown.scoring_method.as_mut() {
                    method.fallback_from = Some(version);
                }
                Ok(breakdown.normalize())
            }
            _ => Err(error),
        }
    }

    async fn run(
        &self,
        strategy: &dyn ScoringStrategy,
        profile: &CandidateProfile,
        job: &Job,
        ctx: &ScoringContext,
    ) -> Result<FitScoreBreakdown, ScoringError> {
        tokio::time::timeout(self.timeout, strategy.score(profile, job, ctx))
            .await
            .map_err(|_| {
                ScoringError::Unavailable(format!("timed out after {}s", self.timeout.as_secs()))
            })?
    }
}
