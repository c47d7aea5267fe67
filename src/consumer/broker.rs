use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

/// One checked-out stream entry: the broker id plus its flat string fields.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    pub id: String,
    pub fields: HashMap<String, String>,
}

/// Consumer-group operations the engine needs from the message broker.
///
/// `read_batch` blocks for at most the given duration and returns an empty
/// vec on timeout; only genuine broker failures surface as errors.
#[async_trait]
pub trait StreamBroker: Send + Sync {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;

    async fn read_batch(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>>;

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()>;
}

pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StreamBroker for RedisBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<String> =
            conn.xgroup_create_mkstream(stream, group, "0").await;

        match created {
            Ok(_) => Ok(()),
            // group already exists
            Err(err) if err.code() == Some("BUSYGROUP") => Ok(()),
            Err(err) => Err(err).context("failed to create consumer group"),
        }
    }

    async fn read_batch(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamEntry>> {
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block.as_millis() as usize);

        let mut conn = self.conn.clone();
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[">"], &options)
            .await
            .with_context(|| format!("error reading from stream {stream}"))?;

        let Some(reply) = reply else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::new();
        for stream_key in reply.keys {
            for stream_id in stream_key.ids {
                let entry_id = stream_id.id;
                let mut fields = HashMap::with_capacity(stream_id.map.len());
                for (field, value) in stream_id.map {
                    match redis::from_redis_value::<String>(&value) {
                        Ok(text) => {
                            fields.insert(field, text);
                        }
                        Err(err) => {
                            warn!("dropping unreadable field {field} on entry {entry_id}: {err}");
                        }
                    }
                }
                entries.push(StreamEntry {
                    id: entry_id,
                    fields,
                });
            }
        }
        Ok(entries)
    }

    async fn ack(&self, stream: &str, group: &str, id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _acked: i64 = conn
            .xack(stream, group, &[id])
            .await
            .with_context(|| format!("failed to acknowledge message {id}"))?;
        Ok(())
    }
}
