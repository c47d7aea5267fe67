use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, error};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::StreamEntry;
use crate::messages::{ClassifyMessage, SessionScoreMessage};
use crate::pipeline::ClassificationPipeline;

const SESSION_PROCESSED_TTL_SECS: u64 = 600;

/// Handles one checked-out batch. Implementations must tolerate partial
/// failure internally; whatever they return, the engine acknowledges the
/// batch.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process_batch(&self, entries: &[StreamEntry]) -> Result<()>;
}

/// Emits session-score events downstream once a session ends.
#[async_trait]
pub trait ScorePublisher: Send + Sync {
    async fn publish_session_end(&self, msg: &SessionScoreMessage) -> Result<()>;
}

/// Adapts raw stream entries to the classification pipeline and publishes
/// the resulting session-end events.
pub struct PatternMatchProcessor {
    pipeline: Arc<ClassificationPipeline>,
    publisher: Arc<dyn ScorePublisher>,
}

impl PatternMatchProcessor {
    pub fn new(pipeline: Arc<ClassificationPipeline>, publisher: Arc<dyn ScorePublisher>) -> Self {
        Self {
            pipeline,
            publisher,
        }
    }
}

#[async_trait]
impl MessageProcessor for PatternMatchProcessor {
    async fn process_batch(&self, entries: &[StreamEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let msgs: Vec<ClassifyMessage> = entries
            .iter()
            .map(|entry| ClassifyMessage::from_stream_fields(&entry.fields))
            .collect();

        let (_, ended_sessions) = self.pipeline.execute(&msgs).await;

        for msg in &ended_sessions {
            if let Err(err) = self.publisher.publish_session_end(msg).await {
                error!(
                    "error publishing session score for user {} session {}: {err:#}",
                    msg.user_id, msg.session
                );
            }
        }

        debug!("successfully processed batch of {} messages", msgs.len());
        Ok(())
    }
}

/// Short-TTL marker consulted upstream to suppress duplicate session-ended
/// emissions inside a redelivery window. Not authoritative state.
pub fn session_state_key(user_id: &str, session_date: NaiveDate, session: i64) -> String {
    format!(
        "session:processed:{user_id}:{}:{session}",
        session_date.format("%Y-%m-%d")
    )
}

/// Publishes session-score events to the downstream stream and sets the
/// session-processed dedup key beside each one.
pub struct RedisScorePublisher {
    conn: ConnectionManager,
    stream_key: String,
}

impl RedisScorePublisher {
    pub fn new(conn: ConnectionManager, stream_key: String) -> Self {
        Self { conn, stream_key }
    }
}

#[async_trait]
impl ScorePublisher for RedisScorePublisher {
    async fn publish_session_end(&self, msg: &SessionScoreMessage) -> Result<()> {
        let mut conn = self.conn.clone();
        let fields = msg.to_stream_fields();

        let _entry_id: String = conn
            .xadd(&self.stream_key, "*", &fields)
            .await
            .with_context(|| {
                format!(
                    "failed to send session score message for user {} session {}",
                    msg.user_id, msg.session
                )
            })?;

        debug!(
            "session score message sent for user {} session {}",
            msg.user_id, msg.session
        );

        let key = session_state_key(&msg.user_id, msg.session_date, msg.session);
        let marked: redis::RedisResult<()> = conn
            .set_ex(&key, "true", SESSION_PROCESSED_TTL_SECS)
            .await;
        if let Err(err) = marked {
            error!("error setting ended session key {key}: {err}");
        }

        Ok(())
    }
}
