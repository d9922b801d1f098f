//! Tag Reverse Index and the glob-pattern matching half of the
//! invalidator. The map shape and the glob-to-regex translation are
//! grounded on `harborgrid-justin-caddy`'s
//! `enterprise::cache::invalidation::{TagInvalidator, PatternInvalidator}`.

use dashmap::{DashMap, DashSet};
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_MAX_TAG_MAPPINGS: usize = 100_000;

pub struct TagIndex {
    index: DashMap<String, DashSet<String>>,
    current_mappings: AtomicUsize,
    max_mappings: usize,
    sweeping: std::sync::atomic::AtomicBool,
}

impl TagIndex {
    pub fn new(max_mappings: usize) -> Self {
        TagIndex {
            index: DashMap::new(),
            current_mappings: AtomicUsize::new(0),
            max_mappings,
            sweeping: std::sync::atomic::AtomicBool::new(false),
        }
    }

    pub fn current_mappings(&self) -> usize {
        self.current_mappings.load(Ordering::Relaxed)
    }

    pub fn is_over_capacity(&self) -> bool {
        self.current_mappings() >= self.max_mappings
    }

    /// Indexes `key` under every tag in `tags`, counting only net-new
    /// (tag, key) pairs toward `current_mappings`.
    pub fn add(&self, key: &str, tags: &std::collections::HashSet<String>) {
        for tag in tags {
            let set = self.index.entry(tag.clone()).or_insert_with(DashSet::new);
            if set.insert(key.to_string()) {
                self.current_mappings.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// De-indexes `key` from every tag in `tags`, dropping the tag entry
    /// entirely once its key set is empty.
    pub fn remove(&self, key: &str, tags: &std::collections::HashSet<String>) {
        for tag in tags {
            let mut drop_tag = false;
            if let Some(set) = self.index.get(tag) {
                if set.remove(key).is_some() {
                    self.current_mappings.fetch_sub(1, Ordering::Relaxed);
                }
                drop_tag = set.is_empty();
            }
            if drop_tag {
                self.index.remove_if(tag, |_, s| s.is_empty());
            }
        }
    }

    /// All fingerprints currently tagged with any of `tags`, deduplicated.
    pub fn keys_for_tags(&self, tags: &[String]) -> std::collections::HashSet<String> {
        let mut out = std::collections::HashSet::new();
        for tag in tags {
            if let Some(set) = self.index.get(tag) {
                out.extend(set.iter().map(|k| k.clone()));
            }
        }
        out
    }

    /// Tags currently present in the index whose name matches `pattern`
    /// (`*` = any run, `?` = single char, both anchored).
    pub fn tags_matching(&self, pattern: &str) -> Vec<String> {
        let regex = match compile_glob(pattern) {
            Some(r) => r,
            None => {
                tracing::debug!(pattern, "invalid tag pattern, treating as no-op");
                return Vec::new();
            }
        };
        self.index
            .iter()
            .filter(|entry| regex.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Drops (tag, key) pairs whose key is no longer present in the entry table, per
    /// the caller-supplied membership check. Runs at most one sweep at a
    /// time.
    pub fn sweep_stale(&self, still_present: impl Fn(&str) -> bool) {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let tags: Vec<String> = self.index.iter().map(|e| e.key().clone()).collect();
        for tag in tags {
            if let Some(set) = self.index.get(&tag) {
                let stale: Vec<String> = set
                    .iter()
                    .filter(|k| !still_present(k.as_str()))
                    .map(|k| k.clone())
                    .collect();
                for key in stale {
                    if set.remove(&key).is_some() {
                        self.current_mappings.fetch_sub(1, Ordering::Relaxed);
                    }
                }
            }
            self.index.remove_if(&tag, |_, s| s.is_empty());
        }
        self.sweeping.store(false, Ordering::Release);
    }

    pub fn clear(&self) {
        self.index.clear();
        self.current_mappings.store(0, Ordering::Relaxed);
    }
}

impl Default for TagIndex {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAG_MAPPINGS)
    }
}

/// Compiles a `*`/`?` glob into an anchored regex. Returns `None` on an
/// unparsable pattern so the caller can fail soft.
fn compile_glob(pattern: &str) -> Option<Regex> {
    let escaped = pattern
        .replace('.', "\\.")
        .replace('*', ".*")
        .replace('?', ".");
    Regex::new(&format!("^{}$", escaped)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn set(tags: &[&str]) -> HashSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn add_then_lookup_by_tag() {
        let idx = TagIndex::default();
        idx.add("a", &set(&["shared", "t1"]));
        idx.add("b", &set(&["shared", "t2"]));
        let hits = idx.keys_for_tags(&["shared".to_string()]);
        assert_eq!(hits.len(), 2);
        assert!(hits.contains("a") && hits.contains("b"));
    }

    #[test]
    fn remove_drops_empty_tag_entries() {
        let idx = TagIndex::default();
        idx.add("a", &set(&["only"]));
        idx.remove("a", &set(&["only"]));
        assert_eq!(idx.current_mappings(), 0);
        assert!(idx.keys_for_tags(&["only".to_string()]).is_empty());
    }

    #[test]
    fn glob_pattern_matches_prefix_wildcard() {
        let idx = TagIndex::default();
        idx.add("a", &set(&["user:1"]));
        idx.add("b", &set(&["user:2"]));
        idx.add("c", &set(&["order:1"]));
        let mut matched = idx.tags_matching("user:*");
        matched.sort();
        assert_eq!(matched, vec!["user:1".to_string(), "user:2".to_string()]);
    }

    #[test]
    fn invalid_pattern_is_a_no_op() {
        let idx = TagIndex::default();
        idx.add("a", &set(&["t1"]));
        assert!(idx.tags_matching("(unclosed").is_empty());
    }

    #[test]
    fn sweep_stale_drops_orphaned_mappings() {
        let idx = TagIndex::default();
        idx.add("gone", &set(&["t"]));
        idx.add("kept", &set(&["t"]));
        idx.sweep_stale(|k| k == "kept");
        let hits = idx.keys_for_tags(&["t".to_string()]);
        assert_eq!(hits.len(), 1);
        assert!(hits.contains("kept"));
    }
}
