use std::collections::HashSet;
use std::env;

use anyhow::{anyhow, Result};
use chrono_tz::Tz;

use crate::leaderboard::DEFAULT_WORK_CATEGORIES;
use crate::pipeline::DEFAULT_WORKER_COUNT;

const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MONGO_DATABASE: &str = "pomostream";
const DEFAULT_REDIS_ADDR: &str = "localhost:6379";
const DEFAULT_BATCH_SIZE: usize = 50;
const DEFAULT_BLOCK_MS: u64 = 2000;
const DEFAULT_TIMEZONE: &str = "Asia/Seoul";

/// Service configuration, loaded from the environment (a `.env` file is
/// honoured when present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub redis_addr: String,
    pub redis_password: String,
    /// Absent key disables the LLM fallback entirely.
    pub openai_api_key: Option<String>,
    pub app_env: String,
    pub worker_count: usize,
    pub batch_size: usize,
    pub block_time_ms: u64,
    /// Timezone used for leaderboard window bucketing.
    pub timezone: Tz,
    /// Categories that also feed the shared "work" leaderboards.
    pub work_categories: HashSet<String>,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenvy::dotenv().ok();

        let timezone_name = env_or("LEADERBOARD_TIMEZONE", DEFAULT_TIMEZONE);
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| anyhow!("invalid LEADERBOARD_TIMEZONE {timezone_name}"))?;

        let work_categories = match env::var("WORK_CATEGORIES") {
            Ok(raw) if !raw.trim().is_empty() => parse_work_categories(&raw),
            _ => DEFAULT_WORK_CATEGORIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        Ok(Self {
            mongo_uri: env_or("MONGO_URI", DEFAULT_MONGO_URI),
            mongo_database: env_or("MONGO_DATABASE", DEFAULT_MONGO_DATABASE),
            redis_addr: env_or("REDIS_ADDR", DEFAULT_REDIS_ADDR),
            redis_password: env_or("REDIS_PASSWORD", ""),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|key| !key.is_empty()),
            app_env: env_or("APP_ENV", "production"),
            worker_count: env_parsed("CLASSIFY_WORKER_COUNT", DEFAULT_WORKER_COUNT),
            batch_size: env_parsed("CLASSIFY_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            block_time_ms: env_parsed("CLASSIFY_BLOCK_MS", DEFAULT_BLOCK_MS),
            timezone,
            work_categories,
        })
    }

    pub fn redis_url(&self) -> String {
        if self.redis_password.is_empty() {
            format!("redis://{}", self.redis_addr)
        } else {
            format!("redis://:{}@{}", self.redis_password, self.redis_addr)
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self.app_env.as_str(), "prod" | "production")
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn parse_work_categories(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
