//! Memoized exclusion decisions with dependency-based invalidation.

use std::{
   path::{Path, PathBuf},
   sync::Arc,
};

use moka::sync::Cache;

/// A cached exclusion verdict for one absolute path.
///
/// Valid only while none of its dependency rule files change and while the
/// compiled rule set it was computed against is still current; either
/// condition failing turns the lookup into a miss, never into a stale answer.
#[derive(Debug, Clone)]
pub struct Decision {
   pub ignored:    bool,
   /// Rule file whose pattern decided the outcome, if any.
   pub source:     Option<Arc<PathBuf>>,
   /// Original text of the winning pattern, if any.
   pub pattern:    Option<String>,
   /// Rule files this decision depends on.
   pub deps:       Arc<[PathBuf]>,
   /// Generation of the compiled rule set the decision was computed against.
   pub generation: u64,
}

/// Bounded LRU cache of [`Decision`]s keyed by absolute path.
pub struct DecisionCache {
   inner: Cache<PathBuf, Decision>,
}

impl DecisionCache {
   pub fn new(capacity: u64) -> Self {
      let inner = Cache::builder()
         .max_capacity(capacity)
         .support_invalidation_closures()
         .build();
      Self { inner }
   }

   pub fn get(&self, path: &Path) -> Option<Decision> {
      self.inner.get(path)
   }

   pub fn insert(&self, path: PathBuf, decision: Decision) {
      self.inner.insert(path, decision);
   }

   /// Purges every cached decision depending on `rule_file`, and nothing
   /// else.
   pub fn invalidate_file(&self, rule_file: &Path) {
      let rule_file = rule_file.to_path_buf();
      if self
         .inner
         .invalidate_entries_if(move |_path, decision| decision.deps.contains(&rule_file))
         .is_err()
      {
         // Predicate registration can only fail when closure support is
         // disabled; purge everything rather than risk a stale answer.
         self.inner.invalidate_all();
      }
   }

   /// Purges every cached decision for paths at or beneath `dir`. Used when
   /// a rule file appears or disappears, which changes which paths are
   /// "deeper" than previously cached decisions.
   pub fn invalidate_dir(&self, dir: &Path) {
      let dir = dir.to_path_buf();
      if self
         .inner
         .invalidate_entries_if(move |path, _decision| path.starts_with(&dir))
         .is_err()
      {
         self.inner.invalidate_all();
      }
   }

   pub fn invalidate_all(&self) {
      self.inner.invalidate_all();
   }

   pub fn entry_count(&self) -> u64 {
      self.inner.run_pending_tasks();
      self.inner.entry_count()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn decision(deps: &[&Path], ignored: bool) -> Decision {
      Decision {
         ignored,
         source: None,
         pattern: None,
         deps: deps.iter().map(|p| p.to_path_buf()).collect(),
         generation: 1,
      }
   }

   #[test]
   fn invalidate_file_purges_only_dependents() {
      let cache = DecisionCache::new(128);
      let rules_a = Path::new("/ws/.gitignore");
      let rules_b = Path::new("/ws/sub/.gitignore");

      cache.insert(PathBuf::from("/ws/a.log"), decision(&[rules_a], true));
      cache.insert(PathBuf::from("/ws/sub/b.log"), decision(&[rules_a, rules_b], true));
      cache.insert(PathBuf::from("/ws/c.rs"), decision(&[rules_a], false));

      cache.invalidate_file(rules_b);

      assert!(cache.get(Path::new("/ws/a.log")).is_some());
      assert!(cache.get(Path::new("/ws/sub/b.log")).is_none());
      assert!(cache.get(Path::new("/ws/c.rs")).is_some());
   }

   #[test]
   fn invalidate_dir_purges_subtree() {
      let cache = DecisionCache::new(128);
      let rules = Path::new("/ws/.gitignore");

      cache.insert(PathBuf::from("/ws/sub/a.log"), decision(&[rules], true));
      cache.insert(PathBuf::from("/ws/sub/deep/b.log"), decision(&[rules], true));
      cache.insert(PathBuf::from("/ws/other/c.log"), decision(&[rules], true));

      cache.invalidate_dir(Path::new("/ws/sub"));

      assert!(cache.get(Path::new("/ws/sub/a.log")).is_none());
      assert!(cache.get(Path::new("/ws/sub/deep/b.log")).is_none());
      assert!(cache.get(Path::new("/ws/other/c.log")).is_some());
   }

   #[test]
   fn capacity_bound_evicts_rather_than_grows() {
      let cache = DecisionCache::new(4);
      let rules = Path::new("/ws/.gitignore");

      for i in 0..64 {
         cache.insert(PathBuf::from(format!("/ws/f{i}.log")), decision(&[rules], true));
      }

      assert!(cache.entry_count() <= 4);
   }
}
