pub mod ports;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bson::oid::ObjectId;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::classifier::PatternClassifier;
use crate::leaderboard::LeaderboardEntry;
use crate::messages::{ClassifyMessage, SessionScoreMessage};
use crate::metrics::ProcessingStats;
use ports::{CategorizedDataStore, CategoryMappingSource, LeaderboardCache, UsageLogStore};

pub const DEFAULT_WORKER_COUNT: usize = 10;

const FALLBACK_CATEGORY: &str = "Uncategorized";

#[derive(Debug, Clone, Default)]
struct ClassificationResult {
    index: usize,
    category: String,
    llm_used: bool,
}

/// Batch classification: fans a message batch out across classification
/// workers, resolves category ids from the process-local snapshot, then
/// writes the three sinks in a fixed order.
///
/// Sink failures are logged and never abort the batch; the caller
/// acknowledges the whole batch either way.
pub struct ClassificationPipeline {
    classifier: Arc<PatternClassifier>,
    usage_logs: Arc<dyn UsageLogStore>,
    categorized_data: Arc<dyn CategorizedDataStore>,
    leaderboard: Arc<dyn LeaderboardCache>,
    category_source: Arc<dyn CategoryMappingSource>,
    category_to_id: RwLock<HashMap<String, ObjectId>>,
    worker_count: usize,
    stats: ProcessingStats,
}

impl ClassificationPipeline {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        classifier: Arc<PatternClassifier>,
        usage_logs: Arc<dyn UsageLogStore>,
        categorized_data: Arc<dyn CategorizedDataStore>,
        leaderboard: Arc<dyn LeaderboardCache>,
        category_source: Arc<dyn CategoryMappingSource>,
        worker_count: usize,
        stats: ProcessingStats,
    ) -> Self {
        let category_to_id = match category_source.category_to_id_map().await {
            Ok(map) => {
                info!("loaded category to id map with {} categories", map.len());
                map
            }
            Err(err) => {
                warn!("failed to load category to id map: {err:#}");
                HashMap::new()
            }
        };

        Self {
            classifier,
            usage_logs,
            categorized_data,
            leaderboard,
            category_source,
            category_to_id: RwLock::new(category_to_id),
            worker_count,
            stats,
        }
    }

    /// Classifies a batch and writes every sink, returning the leaderboard
    /// entries in input order plus one session-score message per record that
    /// ended a session.
    pub async fn execute(
        &self,
        msgs: &[ClassifyMessage],
    ) -> (Vec<LeaderboardEntry>, Vec<SessionScoreMessage>) {
        if msgs.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let results = self.classify_batch(msgs).await;

        let mut usage_log_updates = HashMap::new();
        let mut categorized_updates = HashMap::new();
        let mut entries = Vec::with_capacity(msgs.len());
        let mut ended_sessions = Vec::new();
        let mut llm_count = 0usize;

        for (msg, result) in msgs.iter().zip(&results) {
            let category = if result.category.is_empty() {
                warn!(
                    "classification failed for app={}, title={}, url={}, using default category",
                    msg.app, msg.title, msg.url
                );
                FALLBACK_CATEGORY.to_string()
            } else {
                result.category.clone()
            };
            if result.llm_used {
                llm_count += 1;
            }

            entries.push(LeaderboardEntry::new(
                msg.user_id.clone(),
                category.clone(),
                msg.duration,
                msg.timestamp,
            ));

            let category_id = self.category_id(&category);
            if category_id == zero_category_id() {
                warn!("no document id found for category {category}, using zero id");
            }
            usage_log_updates.insert(msg.usage_log_id.clone(), category_id);
            categorized_updates.insert(msg.categorized_data_id.clone(), category_id);

            if msg.is_end {
                ended_sessions.push(SessionScoreMessage::new(
                    msg.user_id.clone(),
                    msg.session_date,
                    msg.session,
                ));
            }
        }

        if let Err(err) = self.usage_logs.update_category_ids(&usage_log_updates).await {
            error!("error updating usage log data: {err:#}");
        }
        if let Err(err) = self
            .categorized_data
            .update_category_ids(&categorized_updates)
            .await
        {
            error!("error updating categorized data: {err:#}");
        }
        if let Err(err) = self.leaderboard.batch_increase_score(&entries).await {
            error!("error increasing leaderboard score: {err:#}");
        }

        self.stats
            .record_batch(msgs.len(), llm_count, ended_sessions.len())
            .await;

        (entries, ended_sessions)
    }

    /// Replaces the category snapshot from the document store. Never
    /// scheduled; callers decide when a refresh is worth it.
    pub async fn refresh_category_mapping(&self) -> anyhow::Result<()> {
        let map = self.category_source.category_to_id_map().await?;
        let size = map.len();
        *self.category_to_id.write().unwrap() = map;
        info!("refreshed category to id map with {size} categories");
        Ok(())
    }

    /// Parallel map over the batch: an ephemeral pool of `worker_count`
    /// permits, with results slotted back by input index so completion order
    /// never reorders the batch.
    async fn classify_batch(&self, msgs: &[ClassifyMessage]) -> Vec<ClassificationResult> {
        let limiter = Arc::new(Semaphore::new(self.worker_count));
        let mut tasks = JoinSet::new();

        for (index, msg) in msgs.iter().enumerate() {
            let limiter = Arc::clone(&limiter);
            let classifier = Arc::clone(&self.classifier);
            let app = msg.app.clone();
            let title = msg.title.clone();
            let url = msg.url.clone();

            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await.ok();
                let (category, llm_used) = classifier.classify(&app, &title, &url).await;
                ClassificationResult {
                    index,
                    category,
                    llm_used,
                }
            });
        }

        let mut results = vec![ClassificationResult::default(); msgs.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    let index = result.index;
                    results[index] = result;
                }
                Err(err) => error!("classification task failed: {err}"),
            }
        }
        results
    }

    fn category_id(&self, category: &str) -> ObjectId {
        self.category_to_id
            .read()
            .unwrap()
            .get(category)
            .copied()
            .unwrap_or_else(zero_category_id)
    }
}

fn zero_category_id() -> ObjectId {
    ObjectId::from_bytes([0; 12])
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use crate::db::models::CategoryPattern;

    struct RecordingStore {
        calls: AtomicUsize,
        updates: Mutex<Vec<HashMap<String, ObjectId>>>,
        fail: bool,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                updates: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                updates: Mutex::new(Vec::new()),
                fail: true,
            })
        }

        fn record(&self, updates: &HashMap<String, ObjectId>) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.updates.lock().unwrap().push(updates.clone());
            if self.fail {
                bail!("store unavailable");
            }
            Ok(())
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_update(&self) -> HashMap<String, ObjectId> {
            self.updates.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl UsageLogStore for RecordingStore {
        async fn update_category_ids(&self, updates: &HashMap<String, ObjectId>) -> anyhow::Result<()> {
            self.record(updates)
        }
    }

    #[async_trait]
    impl CategorizedDataStore for RecordingStore {
        async fn update_category_ids(&self, updates: &HashMap<String, ObjectId>) -> anyhow::Result<()> {
            self.record(updates)
        }
    }

    struct RecordingLeaderboard {
        calls: AtomicUsize,
        entries: Mutex<Vec<LeaderboardEntry>>,
    }

    impl RecordingLeaderboard {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                entries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LeaderboardCache for RecordingLeaderboard {
        async fn batch_increase_score(&self, entries: &[LeaderboardEntry]) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().unwrap().extend_from_slice(entries);
            Ok(())
        }
    }

    struct FixedMapping {
        map: HashMap<String, ObjectId>,
    }

    impl FixedMapping {
        fn with(categories: &[(&str, ObjectId)]) -> Arc<Self> {
            Arc::new(Self {
                map: categories
                    .iter()
                    .map(|(name, id)| (name.to_string(), *id))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl CategoryMappingSource for FixedMapping {
        async fn category_to_id_map(&self) -> anyhow::Result<HashMap<String, ObjectId>> {
            Ok(self.map.clone())
        }
    }

    fn rule(category: &str, apps: &[&str]) -> CategoryPattern {
        CategoryPattern {
            id: ObjectId::new(),
            category: category.to_string(),
            app_patterns: apps.iter().map(|s| s.to_string()).collect(),
            domain_patterns: Vec::new(),
        }
    }

    fn classifier(rules: &[CategoryPattern]) -> Arc<PatternClassifier> {
        let mut classifier = PatternClassifier::new(None);
        classifier.initialize(rules);
        Arc::new(classifier)
    }

    fn msg(user: &str, app: &str, duration: f64, is_end: bool) -> ClassifyMessage {
        ClassifyMessage {
            user_id: user.to_string(),
            categorized_data_id: ObjectId::new().to_hex(),
            usage_log_id: ObjectId::new().to_hex(),
            app: app.to_string(),
            session: 4,
            session_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            duration,
            timestamp: 1_700_000_000.0,
            is_end,
            ..Default::default()
        }
    }

    struct Harness {
        pipeline: ClassificationPipeline,
        usage_logs: Arc<RecordingStore>,
        categorized: Arc<RecordingStore>,
        leaderboard: Arc<RecordingLeaderboard>,
    }

    async fn harness(rules: &[CategoryPattern], mapping: Arc<FixedMapping>) -> Harness {
        harness_with_stores(rules, mapping, RecordingStore::new()).await
    }

    async fn harness_with_stores(
        rules: &[CategoryPattern],
        mapping: Arc<FixedMapping>,
        usage_logs: Arc<RecordingStore>,
    ) -> Harness {
        let categorized = RecordingStore::new();
        let leaderboard = RecordingLeaderboard::new();
        let pipeline = ClassificationPipeline::new(
            classifier(rules),
            usage_logs.clone(),
            categorized.clone(),
            leaderboard.clone(),
            mapping,
            DEFAULT_WORKER_COUNT,
            ProcessingStats::new(),
        )
        .await;

        Harness {
            pipeline,
            usage_logs,
            categorized,
            leaderboard,
        }
    }

    #[tokio::test]
    async fn test_empty_batch_touches_no_sink() {
        let harness = harness(&[], FixedMapping::with(&[])).await;

        let (entries, ended) = harness.pipeline.execute(&[]).await;

        assert!(entries.is_empty());
        assert!(ended.is_empty());
        assert_eq!(harness.usage_logs.call_count(), 0);
        assert_eq!(harness.categorized.call_count(), 0);
        assert_eq!(harness.leaderboard.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_entries_align_with_input_order() {
        let rules = vec![rule("Development", &["code"]), rule("Design", &["figma"])];
        let harness = harness(&rules, FixedMapping::with(&[])).await;

        let msgs: Vec<ClassifyMessage> = (0..20)
            .map(|i| {
                let app = if i % 2 == 0 { "code" } else { "figma" };
                msg(&format!("u{i}"), app, i as f64, false)
            })
            .collect();

        let (entries, _) = harness.pipeline.execute(&msgs).await;

        assert_eq!(entries.len(), msgs.len());
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.user_id, msgs[i].user_id);
            assert_eq!(entry.duration, msgs[i].duration);
            let expected = if i % 2 == 0 { "Development" } else { "Design" };
            assert_eq!(entry.category, expected);
        }
    }

    #[tokio::test]
    async fn test_session_end_messages_in_input_order() {
        let rules = vec![rule("Development", &["code"])];
        let harness = harness(&rules, FixedMapping::with(&[])).await;

        let msgs = vec![
            msg("u3", "code", 10.0, false),
            msg("u3", "code", 20.0, true),
            msg("u5", "code", 30.0, true),
        ];

        let (_, ended) = harness.pipeline.execute(&msgs).await;

        assert_eq!(ended.len(), 2);
        assert_eq!(ended[0].user_id, "u3");
        assert_eq!(ended[0].session, 4);
        assert_eq!(
            ended[0].session_date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
        );
        assert_eq!(ended[1].user_id, "u5");
    }

    #[tokio::test]
    async fn test_category_ids_resolved_from_snapshot() {
        let development_id = ObjectId::new();
        let rules = vec![rule("Development", &["code"])];
        let harness = harness(
            &rules,
            FixedMapping::with(&[("Development", development_id)]),
        )
        .await;

        let message = msg("u1", "code", 100.0, false);
        harness.pipeline.execute(std::slice::from_ref(&message)).await;

        assert_eq!(
            harness.usage_logs.last_update()[&message.usage_log_id],
            development_id
        );
        assert_eq!(
            harness.categorized.last_update()[&message.categorized_data_id],
            development_id
        );
    }

    #[tokio::test]
    async fn test_unknown_category_still_writes_zero_id() {
        let harness = harness(&[], FixedMapping::with(&[])).await;

        // no rule and no llm: classification falls back to Uncategorized
        let message = msg("u1", "mystery-app", 50.0, false);
        let (entries, _) = harness.pipeline.execute(std::slice::from_ref(&message)).await;

        assert_eq!(entries[0].category, "Uncategorized");
        assert_eq!(
            harness.usage_logs.last_update()[&message.usage_log_id],
            zero_category_id()
        );
        assert_eq!(
            harness.categorized.last_update()[&message.categorized_data_id],
            zero_category_id()
        );
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_stop_later_sinks() {
        let rules = vec![rule("Development", &["code"])];
        let harness = harness_with_stores(
            &rules,
            FixedMapping::with(&[]),
            RecordingStore::failing(),
        )
        .await;

        let msgs = vec![msg("u1", "code", 10.0, true)];
        let (entries, ended) = harness.pipeline.execute(&msgs).await;

        assert_eq!(harness.usage_logs.call_count(), 1);
        assert_eq!(harness.categorized.call_count(), 1);
        assert_eq!(harness.leaderboard.calls.load(Ordering::SeqCst), 1);
        assert_eq!(entries.len(), 1);
        assert_eq!(ended.len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_category_mapping_replaces_snapshot() {
        let first_id = ObjectId::new();
        let rules = vec![rule("Development", &["code"])];
        let harness = harness(&rules, FixedMapping::with(&[("Development", first_id)])).await;

        assert_eq!(harness.pipeline.category_id("Development"), first_id);

        harness.pipeline.refresh_category_mapping().await.unwrap();
        assert_eq!(harness.pipeline.category_id("Development"), first_id);
        assert_eq!(harness.pipeline.category_id("Unknown"), zero_category_id());
    }
}
