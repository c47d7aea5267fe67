mod aho_corasick;
mod llm;
mod trie;

pub use aho_corasick::AhoCorasick;
pub use llm::{OpenAiClient, UsageLlm, VALID_CATEGORIES};
pub use trie::AppTrie;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, warn};

use crate::db::models::CategoryPattern;

/// Two-stage literal classifier with a remote fallback.
///
/// Lookup order is strict and short-circuits on the first hit: exact app
/// match, URL substring match, memoised LLM answer, live LLM call. The memo
/// cache lives for the whole process and only ever holds validated
/// categories.
pub struct PatternClassifier {
    app_trie: AppTrie,
    url_matcher: AhoCorasick,
    cache: RwLock<HashMap<String, String>>,
    llm: Option<Arc<dyn UsageLlm>>,
    initialized: bool,
}

impl PatternClassifier {
    pub fn new(llm: Option<Arc<dyn UsageLlm>>) -> Self {
        Self {
            app_trie: AppTrie::new(),
            url_matcher: AhoCorasick::new(),
            cache: RwLock::new(HashMap::new()),
            llm,
            initialized: false,
        }
    }

    /// Builds both matchers from the loaded pattern rules.
    pub fn initialize(&mut self, patterns: &[CategoryPattern]) {
        let mut app_trie = AppTrie::new();
        let mut url_matcher = AhoCorasick::new();

        for pattern in patterns {
            for app in &pattern.app_patterns {
                app_trie.insert(app, &pattern.category);
            }
            for domain in &pattern.domain_patterns {
                url_matcher.insert(domain, &pattern.category);
            }
        }
        url_matcher.connect();

        self.app_trie = app_trie;
        self.url_matcher = url_matcher;
        self.initialized = true;
    }

    /// Returns the category for one activity record and whether the LLM was
    /// consulted. An empty category means nothing matched and the fallback
    /// produced no usable answer.
    ///
    /// Panics when called before [`initialize`](Self::initialize).
    pub async fn classify(&self, app: &str, title: &str, url: &str) -> (String, bool) {
        assert!(
            self.initialized,
            "pattern classifier used before initialization"
        );

        let app = app.to_lowercase();

        if let Some(category) = self.app_trie.search(&app) {
            return (category.to_string(), false);
        }

        if let Some(category) = self.url_matcher.search(url) {
            return (category.to_string(), false);
        }

        let query = format!("app: {app}, title: {title}, url: {url}");
        if let Some(category) = self.lookup_cache(&query) {
            return (category, true);
        }

        if let Some(llm) = &self.llm {
            debug!("calling llm for classification: app={app}, title={title}, url={url}");
            match llm.classify_usage(&app, title, url).await {
                Ok(category) if !category.is_empty() => {
                    self.cache
                        .write()
                        .unwrap()
                        .insert(query, category.clone());
                    return (category, true);
                }
                Ok(_) => debug!("llm returned no usable category for app={app}"),
                Err(err) => warn!("llm classification failed: {err:#}"),
            }
        }

        (String::new(), true)
    }

    /// Exact app lookup only; no fallback.
    pub fn classify_from_app(&self, app: &str) -> Option<String> {
        self.app_trie.search(app).map(str::to_string)
    }

    /// URL substring lookup only; no fallback.
    pub fn classify_from_url(&self, url: &str) -> Option<String> {
        self.url_matcher.search(url).map(str::to_string)
    }

    fn lookup_cache(&self, query: &str) -> Option<String> {
        self.cache.read().unwrap().get(query).cloned()
    }
}
