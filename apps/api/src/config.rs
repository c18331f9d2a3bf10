use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::scoring::breakdown::ScoringVersion;
use crate::scoring::deterministic::ScoringWeights;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Unset means notifications are only logged.
    pub email_webhook_url: Option<String>,
    pub screening: ScreeningConfig,
}

/// Tunables of the screening pipeline.
#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    pub eligibility_threshold: u8,
    pub application_scoring_version: ScoringVersion,
    pub matching_scoring_version: ScoringVersion,
    pub llm_timeout: Duration,
    pub scoring_fallback: bool,
    pub scoring_max_attempts: u32,
    pub scoring_retry_base: Duration,
    pub processing_stale_after: Duration,
    /// Runs after which a `failed` record is no longer retried automatically.
    pub processing_max_runs: u32,
    pub match_concurrency: usize,
    pub match_max_results: usize,
    pub match_cache_ttl: Duration,
    pub max_resume_bytes: usize,
    pub scoring_weights: ScoringWeights,
    pub worker_concurrency: usize,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            eligibility_threshold: 70,
            application_scoring_version: ScoringVersion::V2EnhancedLlm,
            matching_scoring_version: ScoringVersion::V3Deterministic,
            llm_timeout: Duration::from_secs(30),
            scoring_fallback: true,
            scoring_max_attempts: 3,
            scoring_retry_base: Duration::from_millis(500),
            processing_stale_after: Duration::from_secs(600),
            processing_max_runs: 3,
            match_concurrency: 8,
            match_max_results: 20,
            match_cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            max_resume_bytes: 10 * 1024 * 1024,
            scoring_weights: ScoringWeights::default(),
            worker_concurrency: 4,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            email_webhook_url: std::env::var("EMAIL_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            screening: ScreeningConfig::from_env()?,
        })
    }
}

impl ScreeningConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let d = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let threshold: u8 = parse_or(&get, "ELIGIBILITY_THRESHOLD", d.eligibility_threshold)?;
        if threshold > 100 {
            return Err(anyhow!("ELIGIBILITY_THRESHOLD must be between 0 and 100"));
        }

        let version = |key: &str, default: ScoringVersion| -> Result<ScoringVersion> {
            match get(key) {
                Some(v) => v
                    .trim()
                    .parse::<ScoringVersion>()
                    .map_err(|e| anyhow!("{key}: {e}")),
                None => Ok(default),
            }
        };

        let w = d.scoring_weights;
        let weights = ScoringWeights {
            skills: parse_or(&get, "SCORING_WEIGHT_SKILLS", w.skills)?,
            experience: parse_or(&get, "SCORING_WEIGHT_EXPERIENCE", w.experience)?,
            education: parse_or(&get, "SCORING_WEIGHT_EDUCATION", w.education)?,
            keywords: parse_or(&get, "SCORING_WEIGHT_KEYWORDS", w.keywords)?,
            relevance: parse_or(&get, "SCORING_WEIGHT_RELEVANCE", w.relevance)?,
        };
        let all = [
            weights.skills,
            weights.experience,
            weights.education,
            weights.keywords,
            weights.relevance,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) || all.iter().sum::<f32>() <= 0.0 {
            return Err(anyhow!(
                "SCORING_WEIGHT_* must be non-negative and not all zero"
            ));
        }

        Ok(Self {
            eligibility_threshold: threshold,
            application_scoring_version: version(
                "APPLICATION_SCORING_VERSION",
                d.application_scoring_version,
            )?,
            matching_scoring_version: version(
                "MATCHING_SCORING_VERSION",
                d.matching_scoring_version,
            )?,
            llm_timeout: Duration::from_secs(parse_or(
                &get,
                "LLM_TIMEOUT_SECS",
                d.llm_timeout.as_secs(),
            )?),
            scoring_fallback: parse_or(&get, "SCORING_FALLBACK", d.scoring_fallback)?,
            scoring_max_attempts: parse_or(&get, "SCORING_MAX_ATTEMPTS", d.scoring_max_attempts)?
                .max(1),
            scoring_retry_base: Duration::from_millis(parse_or(
                &get,
                "SCORING_RETRY_BASE_MS",
                u64::try_from(d.scoring_retry_base.as_millis()).unwrap_or(500),
            )?),
            processing_stale_after: Duration::from_secs(parse_or(
                &get,
                "PROCESSING_STALE_AFTER_SECS",
                d.processing_stale_after.as_secs(),
            )?),
            processing_max_runs: parse_or(&get, "PROCESSING_MAX_RUNS", d.processing_max_runs)?
                .max(1),
            match_concurrency: parse_or(&get, "MATCH_CONCURRENCY", d.match_concurrency)?.max(1),
            match_max_results: parse_or(&get, "MATCH_MAX_RESULTS", d.match_max_results)?,
            match_cache_ttl: Duration::from_secs(parse_or(
                &get,
                "MATCH_CACHE_TTL_SECS",
                d.match_cache_ttl.as_secs(),
            )?),
            max_resume_bytes: parse_or(&get, "MAX_RESUME_BYTES", d.max_resume_bytes)?,
            scoring_weights: weights,
            worker_concurrency: parse_or(&get, "WORKER_CONCURRENCY", d.worker_concurrency)?
                .max(1),
        })
    }

    /// `processing_stale_after` as the signed duration the store comparisons use.
    pub fn stale_after(&self) -> chrono::Duration {
        let secs = self.processing_stale_after.as_secs().min(u64::from(u32::MAX));
        chrono::Duration::seconds(secs as i64)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_or(&|k: &str| std::env::var(k).ok(), key, default)
}

fn parse_or<T>(get: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("Environment variable '{key}' is invalid ('{raw}'): {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn screening(vars: &[(&str, &str)]) -> Result<ScreeningConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ScreeningConfig::from_lookup(move |key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_overrides() {
        let cfg = screening(&[]).unwrap();
        assert_eq!(cfg.eligibility_threshold, 70);
        assert_eq!(cfg.application_scoring_version, ScoringVersion::V2EnhancedLlm);
        assert_eq!(cfg.matching_scoring_version, ScoringVersion::V3Deterministic);
        assert_eq!(cfg.match_cache_ttl, Duration::from_secs(604_800));
        assert_eq!(cfg.stale_after(), chrono::Duration::minutes(10));
        assert_eq!(cfg.processing_max_runs, 3);
    }

    #[test]
    fn test_overrides_are_parsed() {
        let cfg = screening(&[
            ("ELIGIBILITY_THRESHOLD", "75"),
            ("MATCHING_SCORING_VERSION", "v1-simple-llm"),
            ("SCORING_FALLBACK", "false"),
            ("SCORING_WEIGHT_SKILLS", "0.5"),
            ("WORKER_CONCURRENCY", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.eligibility_threshold, 75);
        assert_eq!(cfg.matching_scoring_version, ScoringVersion::V1SimpleLlm);
        assert!(!cfg.scoring_fallback);
        assert_eq!(cfg.scoring_weights.skills, 0.5);
        assert_eq!(cfg.worker_concurrency, 1);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        assert!(screening(&[("ELIGIBILITY_THRESHOLD", "120")]).is_err());
        assert!(screening(&[("ELIGIBILITY_THRESHOLD", "high")]).is_err());
        assert!(screening(&[("APPLICATION_SCORING_VERSION", "v9")]).is_err());
        assert!(screening(&[("SCORING_WEIGHT_EDUCATION", "-1")]).is_err());
    }
}
