mod broker;
mod processor;

pub use broker::{RedisBroker, StreamBroker, StreamEntry};
pub use processor::{
    session_state_key, MessageProcessor, PatternMatchProcessor, RedisScorePublisher,
    ScorePublisher,
};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, error, info};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const PATTERN_MATCH_STREAM: &str = "pattern_match_stream";
pub const PATTERN_MATCH_GROUP: &str = "pattern_match_group";
pub const PATTERN_MATCH_CONSUMER: &str = "pattern_match_consumer";
pub const SESSION_SCORE_STREAM: &str = "session_score_stream";

const READ_ERROR_BACKOFF: Duration = Duration::from_secs(3);

/// Names the stream, consumer group and consumer this engine checks out as.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub stream_key: String,
    pub group: String,
    pub consumer: String,
}

impl StreamConfig {
    pub fn pattern_match() -> Self {
        Self {
            stream_key: PATTERN_MATCH_STREAM.to_string(),
            group: PATTERN_MATCH_GROUP.to_string(),
            consumer: PATTERN_MATCH_CONSUMER.to_string(),
        }
    }
}

/// Consumer-group engine: one reader task checks batches out of the stream
/// and fans them to a pool of batch workers over a bounded channel.
///
/// Workers acknowledge every message of a batch after handing it to the
/// processor, whether processing succeeded or not: the processor is
/// internally resilient to per-sink failure, and holding messages back
/// would only cause redelivery storms.
pub struct StreamConsumer {
    broker: Arc<dyn StreamBroker>,
    config: StreamConfig,
    processor: Arc<dyn MessageProcessor>,
    worker_count: usize,
    batch_size: usize,
    block_time: Duration,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StreamConsumer {
    pub fn new(
        broker: Arc<dyn StreamBroker>,
        config: StreamConfig,
        processor: Arc<dyn MessageProcessor>,
        worker_count: usize,
        batch_size: usize,
        block_time: Duration,
    ) -> Self {
        Self {
            broker,
            config,
            processor,
            worker_count,
            batch_size,
            block_time,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    /// Ensures the consumer group exists, then spawns the workers and the
    /// reader. Returns once everything is running.
    pub async fn start(&mut self) -> Result<()> {
        if !self.tasks.is_empty() {
            bail!("consumer already started");
        }
        self.cancel = CancellationToken::new();

        self.broker
            .ensure_group(&self.config.stream_key, &self.config.group)
            .await
            .context("failed to create consumer group")?;

        let (batch_tx, batch_rx) = mpsc::channel::<Vec<StreamEntry>>(self.worker_count * 2);
        let batch_rx = Arc::new(Mutex::new(batch_rx));

        for worker_id in 0..self.worker_count {
            self.tasks.push(tokio::spawn(batch_worker(
                worker_id,
                Arc::clone(&self.broker),
                self.config.clone(),
                Arc::clone(&self.processor),
                Arc::clone(&batch_rx),
                self.cancel.clone(),
            )));
        }

        self.tasks.push(tokio::spawn(read_loop(
            Arc::clone(&self.broker),
            self.config.clone(),
            self.batch_size,
            self.block_time,
            batch_tx,
            self.cancel.clone(),
        )));

        info!(
            "consumer started for stream {} with {} workers",
            self.config.stream_key, self.worker_count
        );
        Ok(())
    }

    /// Cancels the shared token and joins the reader and every worker.
    pub async fn stop(&mut self) {
        info!("stopping consumer for stream {}...", self.config.stream_key);
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                error!("consumer task failed to join: {err}");
            }
        }
        info!("consumer for stream {} stopped", self.config.stream_key);
    }
}

async fn read_loop(
    broker: Arc<dyn StreamBroker>,
    config: StreamConfig,
    batch_size: usize,
    block_time: Duration,
    batch_tx: mpsc::Sender<Vec<StreamEntry>>,
    cancel: CancellationToken,
) {
    loop {
        let read = tokio::select! {
            _ = cancel.cancelled() => break,
            read = broker.read_batch(
                &config.stream_key,
                &config.group,
                &config.consumer,
                batch_size,
                block_time,
            ) => read,
        };

        match read {
            Ok(entries) if entries.is_empty() => continue,
            Ok(entries) => {
                debug!("sending batch of {} messages to workers", entries.len());
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = batch_tx.send(entries) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            Err(err) => {
                error!("error reading from stream {}: {err:#}", config.stream_key);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(READ_ERROR_BACKOFF) => {}
                }
            }
        }
    }
    // dropping batch_tx closes the channel so workers drain and exit
}

async fn batch_worker(
    worker_id: usize,
    broker: Arc<dyn StreamBroker>,
    config: StreamConfig,
    processor: Arc<dyn MessageProcessor>,
    batch_rx: Arc<Mutex<mpsc::Receiver<Vec<StreamEntry>>>>,
    cancel: CancellationToken,
) {
    debug!("worker {worker_id} started for stream {}", config.stream_key);

    loop {
        let batch = {
            let mut rx = batch_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => None,
                received = rx.recv() => received,
            }
        };
        let Some(batch) = batch else {
            break;
        };

        debug!("worker {worker_id} processing batch of {} messages", batch.len());
        if let Err(err) = processor.process_batch(&batch).await {
            error!("error processing batch: {err:#}");
        }

        for entry in &batch {
            if let Err(err) = broker
                .ack(&config.stream_key, &config.group, &entry.id)
                .await
            {
                error!("error acknowledging message {}: {err:#}", entry.id);
            }
        }
    }

    debug!("worker {worker_id} stopping for stream {}", config.stream_key);
}
