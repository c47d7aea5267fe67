use std::collections::HashMap;

#[derive(Default)]
struct TrieNode {
    children: HashMap<char, TrieNode>,
    category: Option<String>,
}

/// Exact-match dictionary over app identifiers.
///
/// Literals are lowercased on insert and lookup, so matching is
/// case-insensitive. Only a full-length walk that ends on a tagged node
/// hits; a lookup that is a prefix (or extension) of a stored literal
/// misses.
pub struct AppTrie {
    root: TrieNode,
}

impl AppTrie {
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
        }
    }

    pub fn insert(&mut self, literal: &str, category: &str) {
        let mut now = &mut self.root;
        for ch in literal.to_lowercase().chars() {
            now = now.children.entry(ch).or_default();
        }
        now.category = Some(category.to_string());
    }

    pub fn search(&self, app: &str) -> Option<&str> {
        let mut now = &self.root;
        for ch in app.to_lowercase().chars() {
            now = now.children.get(&ch)?;
        }
        now.category.as_deref()
    }
}

impl Default for AppTrie {
    fn default() -> Self {
        Self::new()
    }
}
