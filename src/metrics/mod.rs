use std::sync::Arc;

use tokio::sync::Mutex;

/// Running totals for the consumer, reported at shutdown.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub batches: u64,
    pub messages: u64,
    pub llm_classified: u64,
    pub sessions_ended: u64,
}

pub struct ProcessingStats {
    inner: Arc<Mutex<StatsSnapshot>>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatsSnapshot::default())),
        }
    }

    pub async fn record_batch(&self, messages: usize, llm_classified: usize, sessions_ended: usize) {
        let mut state = self.inner.lock().await;
        state.batches += 1;
        state.messages += messages as u64;
        state.llm_classified += llm_classified as u64;
        state.sessions_ended += sessions_ended as u64;
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().await.clone()
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ProcessingStats {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
