use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;

use super::{LeaderboardEntry, LeaderboardKeyScheme};
use crate::pipeline::ports::LeaderboardCache;

/// Sorted-set leaderboard sink backed by the cache's increment pipeline.
pub struct RedisLeaderboardCache {
    conn: ConnectionManager,
    scheme: LeaderboardKeyScheme,
}

impl RedisLeaderboardCache {
    pub fn new(conn: ConnectionManager, scheme: LeaderboardKeyScheme) -> Self {
        Self { conn, scheme }
    }
}

#[async_trait]
impl LeaderboardCache for RedisLeaderboardCache {
    async fn batch_increase_score(&self, entries: &[LeaderboardEntry]) -> Result<()> {
        let increments = coalesce_increments(&self.scheme, entries);
        if increments.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for ((key, member), delta) in &increments {
            pipe.zincr(key, member, *delta).ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .context("failed to execute batch score increase")?;
        Ok(())
    }
}

/// Sums deltas per (key, member) so a batch issues at most one increment per
/// sorted-set member, bounding the pipeline size.
fn coalesce_increments(
    scheme: &LeaderboardKeyScheme,
    entries: &[LeaderboardEntry],
) -> HashMap<(String, String), f64> {
    let mut increments: HashMap<(String, String), f64> = HashMap::new();
    for entry in entries {
        for key in scheme.all_keys(entry) {
            *increments
                .entry((key, entry.user_id.clone()))
                .or_insert(0.0) += entry.duration;
        }
    }
    increments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::DEFAULT_WORK_CATEGORIES;

    fn scheme() -> LeaderboardKeyScheme {
        let work = DEFAULT_WORK_CATEGORIES
            .iter()
            .map(|s| s.to_string())
            .collect();
        LeaderboardKeyScheme::new(chrono_tz::UTC, work)
    }

    fn entry(user: &str, category: &str, duration: f64) -> LeaderboardEntry {
        // all on 2024-02-01 UTC
        LeaderboardEntry::new(user.to_string(), category.to_string(), duration, 1_706_788_800.0)
    }

    #[test]
    fn test_same_user_same_window_coalesces_to_one_increment() {
        let entries = vec![
            entry("u4", "Design", 10.0),
            entry("u4", "Design", 20.0),
            entry("u4", "Design", 30.0),
            entry("u4", "Design", 40.0),
            entry("u4", "Design", 50.0),
        ];

        let increments = coalesce_increments(&scheme(), &entries);

        // Design is a work category: three category keys plus three work keys
        assert_eq!(increments.len(), 6);
        for delta in increments.values() {
            assert_eq!(*delta, 150.0);
        }
        assert_eq!(
            increments[&(
                "leaderboard:Design:2024-02-01".to_string(),
                "u4".to_string()
            )],
            150.0
        );
    }

    #[test]
    fn test_distinct_users_stay_separate() {
        let entries = vec![entry("u1", "SNS", 60.0), entry("u2", "SNS", 30.0)];

        let increments = coalesce_increments(&scheme(), &entries);

        assert_eq!(increments.len(), 6);
        assert_eq!(
            increments[&("leaderboard:SNS:2024-02-01".to_string(), "u1".to_string())],
            60.0
        );
        assert_eq!(
            increments[&("leaderboard:SNS:2024-02-01".to_string(), "u2".to_string())],
            30.0
        );
    }

    #[test]
    fn test_empty_batch_produces_no_increments() {
        assert!(coalesce_increments(&scheme(), &[]).is_empty());
    }
}
