use std::collections::{HashMap, VecDeque};

const ROOT: usize = 0;

struct Node {
    children: HashMap<char, usize>,
    fail: usize,
    category: Option<String>,
}

impl Node {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            fail: ROOT,
            category: None,
        }
    }
}

/// Substring multi-pattern matcher over URL strings.
///
/// All patterns are laid into a single trie; `connect` then computes each
/// node's failure link (the deepest proper suffix present in the trie) with a
/// breadth-first pass and propagates category tags down failure chains so a
/// scan can report a match the moment it reaches any terminal. Matching is
/// case-sensitive.
pub struct AhoCorasick {
    nodes: Vec<Node>,
}

impl AhoCorasick {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new()],
        }
    }

    pub fn insert(&mut self, pattern: &str, category: &str) {
        let mut now = ROOT;
        for ch in pattern.chars() {
            let existing = self.nodes[now].children.get(&ch).copied();
            now = match existing {
                Some(next) => next,
                None => {
                    self.nodes.push(Node::new());
                    let next = self.nodes.len() - 1;
                    self.nodes[now].children.insert(ch, next);
                    next
                }
            };
        }
        self.nodes[now].category = Some(category.to_string());
    }

    /// Computes failure links breadth-first. Must run after the last
    /// `insert` and before the first `search`.
    pub fn connect(&mut self) {
        let mut queue = VecDeque::new();
        queue.push_back(ROOT);

        while let Some(now) = queue.pop_front() {
            let children: Vec<(char, usize)> = self.nodes[now]
                .children
                .iter()
                .map(|(&ch, &next)| (ch, next))
                .collect();

            for (key, next) in children {
                let fail = if now == ROOT {
                    ROOT
                } else {
                    let mut dst = self.nodes[now].fail;
                    while dst != ROOT && !self.nodes[dst].children.contains_key(&key) {
                        dst = self.nodes[dst].fail;
                    }
                    match self.nodes[dst].children.get(&key) {
                        Some(&child) => child,
                        None => dst,
                    }
                };
                self.nodes[next].fail = fail;

                // Inherit the tag of the nearest suffix pattern so search can
                // stop at the first terminal it touches.
                if self.nodes[next].category.is_none() {
                    if let Some(category) = self.nodes[fail].category.clone() {
                        self.nodes[next].category = Some(category);
                    }
                }

                queue.push_back(next);
            }
        }
    }

    /// Scans `url` and returns the tag of the first pattern whose end is
    /// reached, or `None` when no pattern occurs as a substring.
    pub fn search(&self, url: &str) -> Option<&str> {
        let mut now = ROOT;
        for ch in url.chars() {
            while now != ROOT && !self.nodes[now].children.contains_key(&ch) {
                now = self.nodes[now].fail;
            }

            if let Some(&child) = self.nodes[now].children.get(&ch) {
                now = child;

                if let Some(category) = self.nodes[now].category.as_deref() {
                    return Some(category);
                }

                let mut temp = self.nodes[now].fail;
                while temp != ROOT && self.nodes[temp].category.is_none() {
                    temp = self.nodes[temp].fail;
                }
                if let Some(category) = self.nodes[temp].category.as_deref() {
                    return Some(category);
                }
            }
        }
        None
    }
}

impl Default for AhoCorasick {
    fn default() -> Self {
        Self::new()
    }
}
