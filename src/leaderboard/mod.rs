mod cache;

pub use cache::RedisLeaderboardCache;

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

/// Categories that additionally feed the shared "work" aggregate boards.
/// Overridable through configuration; this is the shipped default.
pub const DEFAULT_WORK_CATEGORIES: [&str; 13] = [
    "Development",
    "LLM",
    "Documentation",
    "Design",
    "Video Editing",
    "Education",
    "Productivity",
    "Finance",
    "File Management",
    "Browsing",
    "Marketing",
    "System & Utilities",
    "Meetings",
];

/// One score delta destined for the leaderboard sorted sets.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub category: String,
    pub duration: f64,
    pub timestamp: f64,
}

impl LeaderboardEntry {
    pub fn new(user_id: String, category: String, duration: f64, timestamp: f64) -> Self {
        Self {
            user_id,
            category,
            duration,
            timestamp,
        }
    }
}

/// Derives the sorted-set keys an entry increments.
///
/// Keys follow `leaderboard:{category}:{bucket}` with daily, ISO-week and
/// monthly buckets computed from the entry timestamp in the configured
/// timezone. Entries whose category belongs to the work set also hit the
/// three `leaderboard:work:*` aggregates.
#[derive(Debug, Clone)]
pub struct LeaderboardKeyScheme {
    timezone: Tz,
    work_categories: HashSet<String>,
}

impl LeaderboardKeyScheme {
    pub fn new(timezone: Tz, work_categories: HashSet<String>) -> Self {
        Self {
            timezone,
            work_categories,
        }
    }

    pub fn is_work_category(&self, category: &str) -> bool {
        self.work_categories.contains(category)
    }

    /// The three keys scoped to the entry's own category.
    pub fn category_leaderboard_keys(&self, entry: &LeaderboardEntry) -> Vec<String> {
        self.keys_for(&entry.category, entry.timestamp)
    }

    /// The three shared "work" aggregate keys for the entry's time windows.
    pub fn work_leaderboard_keys(&self, entry: &LeaderboardEntry) -> Vec<String> {
        self.keys_for("work", entry.timestamp)
    }

    /// Every key the entry increments: three, or six for work categories.
    pub fn all_keys(&self, entry: &LeaderboardEntry) -> Vec<String> {
        let mut keys = self.category_leaderboard_keys(entry);
        if self.is_work_category(&entry.category) {
            keys.extend(self.work_leaderboard_keys(entry));
        }
        keys
    }

    fn keys_for(&self, category: &str, timestamp: f64) -> Vec<String> {
        let day = self.local_day(timestamp);
        vec![
            daily_key(category, &day),
            weekly_key(category, &day),
            monthly_key(category, &day),
        ]
    }

    fn local_day(&self, timestamp: f64) -> DateTime<Tz> {
        DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
            .unwrap_or_default()
            .with_timezone(&self.timezone)
    }
}

fn daily_key(category: &str, day: &DateTime<Tz>) -> String {
    format!("leaderboard:{category}:{}", day.format("%Y-%m-%d"))
}

fn weekly_key(category: &str, day: &DateTime<Tz>) -> String {
    let week = day.iso_week();
    format!("leaderboard:{category}:{}-W{}", week.year(), week.week())
}

fn monthly_key(category: &str, day: &DateTime<Tz>) -> String {
    format!("leaderboard:{category}:{}-M{}", day.year(), day.month())
}
