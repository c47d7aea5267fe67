pub mod classifier;
pub mod consumer;
pub mod db;
pub mod leaderboard;
pub mod messages;
pub mod metrics;
pub mod pipeline;
pub mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use redis::aio::ConnectionManager;

use classifier::{OpenAiClient, PatternClassifier, UsageLlm};
use consumer::{
    PatternMatchProcessor, RedisBroker, RedisScorePublisher, StreamConfig, StreamConsumer,
    SESSION_SCORE_STREAM,
};
use db::Database;
use leaderboard::{LeaderboardKeyScheme, RedisLeaderboardCache};
use metrics::ProcessingStats;
use pipeline::ClassificationPipeline;
use settings::Settings;

/// Wires every component together and runs the consumer until the process
/// receives SIGINT or SIGTERM.
pub async fn run() -> Result<()> {
    let settings = Settings::new()?;
    info!("starting stream consumer (env: {})", settings.app_env);

    let database = Database::connect(&settings.mongo_uri, &settings.mongo_database).await?;

    let redis_client = redis::Client::open(settings.redis_url())
        .context("invalid Redis address")?;
    let redis_conn = ConnectionManager::new(redis_client)
        .await
        .context("failed to connect to Redis")?;
    ping_redis(redis_conn.clone()).await?;
    info!("connected to Redis at {}", settings.redis_addr);

    let llm: Option<Arc<dyn UsageLlm>> = match &settings.openai_api_key {
        Some(api_key) => Some(Arc::new(OpenAiClient::new(api_key.clone())?)),
        None => {
            warn!("OPENAI_API_KEY not set, LLM fallback disabled");
            None
        }
    };

    let patterns = database
        .load_category_patterns()
        .await
        .context("failed to load category patterns")?;
    let mut classifier = PatternClassifier::new(llm);
    classifier.initialize(&patterns);
    info!("pattern classifier initialized with {} patterns", patterns.len());

    let stats = ProcessingStats::new();
    let scheme = LeaderboardKeyScheme::new(settings.timezone, settings.work_categories.clone());
    let leaderboard = Arc::new(RedisLeaderboardCache::new(redis_conn.clone(), scheme));

    let database = Arc::new(database);
    let pipeline = Arc::new(
        ClassificationPipeline::new(
            Arc::new(classifier),
            database.clone(),
            database.clone(),
            leaderboard,
            database,
            settings.worker_count,
            stats.clone(),
        )
        .await,
    );

    let publisher = Arc::new(RedisScorePublisher::new(
        redis_conn.clone(),
        SESSION_SCORE_STREAM.to_string(),
    ));
    let processor = Arc::new(PatternMatchProcessor::new(pipeline, publisher));
    let broker = Arc::new(RedisBroker::new(redis_conn));

    let mut consumer = StreamConsumer::new(
        broker,
        StreamConfig::pattern_match(),
        processor,
        settings.worker_count,
        settings.batch_size,
        Duration::from_millis(settings.block_time_ms),
    );
    consumer.start().await?;

    wait_for_shutdown().await;
    info!("shutting down...");
    consumer.stop().await;

    let totals = stats.snapshot().await;
    info!(
        "processed {} batches: {} messages, {} llm classified, {} sessions ended",
        totals.batches, totals.messages, totals.llm_classified, totals.sessions_ended
    );
    info!("shutdown complete");
    Ok(())
}

async fn ping_redis(mut conn: ConnectionManager) -> Result<()> {
    let _: String = redis::cmd("PING")
        .query_async(&mut conn)
        .await
        .context("failed to reach Redis")?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            warn!("failed to install SIGTERM handler: {err}");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
