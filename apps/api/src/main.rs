mod applications;
mod config;
mod db;
mod errors;
mod extraction;
mod jobs;
mod ledger;
mod lifecycle;
mod llm_client;
mod matching;
mod models;
mod notify;
mod routes;
mod scoring;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Result};
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::applications::ApplicationService;
use crate::config::Config;
use crate::db::create_pool;
use crate::extraction::ResumeExtractor;
use crate::jobs::JobService;
use crate::lifecycle::processor::{ApplicationProcessor, ProcessorSettings};
use crate::lifecycle::queue::{recover_stale, spawn_dispatcher, ScoringQueue};
use crate::llm_client::{LanguageModel, LlmClient};
use crate::matching::cache::RedisMatchCache;
use crate::matching::{MatchSettings, MatchingOrchestrator};
use crate::notify::{LogNotifier, Notifier, WebhookNotifier};
use crate::routes::build_router;
use crate::scoring::{FitScoringEngine, RetryPolicy};
use crate::state::AppState;
use crate::store::objects::{ObjectStore, S3ObjectStore};
use crate::store::postgres::PgStore;
use crate::store::ApplicationStore;

const SCORING_QUEUE_CAPACITY: usize = 256;
const RECOVERY_BATCH: u32 = 100;
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;
    let screening = config.screening.clone();

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting screener v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;
    let store: Arc<dyn ApplicationStore> = Arc::new(PgStore::new(db.clone()));

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(
        s3,
        config.s3_bucket.clone(),
        config.s3_endpoint.clone(),
    ));
    info!("S3 client initialized");

    // Initialize LLM client
    // Extraction relies on the client's own retries; the scoring engine retries itself
    let client = LlmClient::new(config.anthropic_api_key.clone(), screening.llm_timeout)?;
    let extraction_budget = client.call_budget();
    let extraction_llm: Arc<dyn LanguageModel> = Arc::new(client.clone());
    let scoring_llm: Arc<dyn LanguageModel> = Arc::new(client.with_max_attempts(1));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let notifier: Arc<dyn Notifier> = match &config.email_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone())?),
        None => {
            info!("EMAIL_WEBHOOK_URL not set, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let extractor = Arc::new(ResumeExtractor::new(extraction_llm, extraction_budget));
    let engine = Arc::new(FitScoringEngine::standard(
        scoring_llm,
        screening.scoring_weights,
        screening.llm_timeout,
        screening.scoring_fallback,
    ));
    for version in [
        screening.application_scoring_version,
        screening.matching_scoring_version,
    ] {
        ensure!(engine.supports(version), "no scoring strategy for {version}");
    }
    info!(
        application = %screening.application_scoring_version,
        matching = %screening.matching_scoring_version,
        fallback = screening.scoring_fallback,
        threshold = screening.eligibility_threshold,
        "Scoring engine ready"
    );

    // Background scoring workers
    let processor = Arc::new(ApplicationProcessor::new(
        store.clone(),
        objects.clone(),
        extractor.clone(),
        engine.clone(),
        notifier.clone(),
        ProcessorSettings {
            version: screening.application_scoring_version,
            threshold: screening.eligibility_threshold,
            retry: RetryPolicy {
                max_attempts: screening.scoring_max_attempts,
                base_delay: screening.scoring_retry_base,
            },
            stale_after: screening.stale_after(),
        },
    ));
    let (queue, rx) = ScoringQueue::new(SCORING_QUEUE_CAPACITY);
    spawn_dispatcher(rx, processor.clone(), screening.worker_concurrency);
    spawn_stale_sweeper(
        store.clone(),
        queue.clone(),
        processor.stale_after(),
        screening.processing_max_runs,
        screening.processing_stale_after.max(MIN_SWEEP_INTERVAL),
    );
    info!(
        workers = screening.worker_concurrency,
        "Scoring queue started"
    );

    let matching = Arc::new(MatchingOrchestrator::new(
        store.clone(),
        extractor,
        engine,
        Arc::new(RedisMatchCache::new(redis)),
        MatchSettings {
            version: screening.matching_scoring_version,
            concurrency: screening.match_concurrency,
            max_results: screening.match_max_results,
            cache_ttl: screening.match_cache_ttl,
            max_resume_bytes: screening.max_resume_bytes,
        },
    ));
    let applications = Arc::new(ApplicationService::new(
        store.clone(),
        objects,
        notifier,
        queue,
        screening.max_resume_bytes,
    ));
    let jobs = Arc::new(JobService::new(store));

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        applications,
        jobs,
        matching,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically re-enqueues orphaned and failed applications. The first sweep runs
/// immediately, which picks up whatever a previous process left in `processing`.
fn spawn_stale_sweeper(
    store: Arc<dyn ApplicationStore>,
    queue: ScoringQueue,
    stale_after: chrono::Duration,
    max_runs: u32,
    every: Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let swept =
                recover_stale(store.as_ref(), &queue, stale_after, max_runs, RECOVERY_BATCH).await;
            if let Err(e) = swept {
                error!("Stale application sweep failed: {e}");
            }
        }
    });
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "screener-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
