//! Exclusion engine facade: compiled rules + decision cache + live reload.

use std::{
   path::{Path, PathBuf},
   sync::{
      Arc,
      atomic::{AtomicU64, Ordering},
   },
};

use parking_lot::RwLock;

use crate::{
   Result, config,
   error::Error,
   exclude::{
      cache::{Decision, DecisionCache},
      loader::{self, is_rule_file},
      pattern::ParsedRuleFile,
      ruleset::CompiledRuleSet,
   },
};

/// Decides whether paths are excluded from indexing and search for one
/// project, with memoization and live invalidation driven by rule-file
/// change events.
pub struct ExclusionEngine {
   root:             PathBuf,
   include_defaults: bool,
   max_depth:        usize,
   rules:            RwLock<Arc<CompiledRuleSet>>,
   cache:            DecisionCache,
   generation:       AtomicU64,
}

impl ExclusionEngine {
   /// Builds the engine for a workspace root, discovering and compiling all
   /// rule files up to the configured depth bound.
   pub fn new(root: &Path) -> Result<Self> {
      let root = root
         .canonicalize()
         .map_err(|_| Error::WorkspaceUnavailable(root.to_path_buf()))?;

      let cfg = config::get();
      let include_defaults = !cfg.disable_default_excludes;
      let max_depth = cfg.effective_rule_discovery_depth();

      let files = loader::load_all(&root, max_depth);
      if files.is_empty() {
         tracing::warn!(
            "no ignore rule files found under {}; baseline exclusions apply",
            root.display()
         );
      }

      let ruleset = CompiledRuleSet::compile(&root, files, include_defaults, 1)?;

      Ok(Self {
         root,
         include_defaults,
         max_depth,
         rules: RwLock::new(Arc::new(ruleset)),
         cache: DecisionCache::new(cfg.effective_decision_cache_capacity()),
         generation: AtomicU64::new(1),
      })
   }

   pub fn root(&self) -> &Path {
      &self.root
   }

   /// Current compiled rule set (cheap snapshot).
   pub fn snapshot(&self) -> Arc<CompiledRuleSet> {
      Arc::clone(&self.rules.read())
   }

   /// Decides whether `path` is excluded, consulting the cache first.
   ///
   /// A cached decision is used only when its generation matches the current
   /// rule set, so a lookup racing a reload recomputes instead of trusting a
   /// possibly-stale entry.
   pub fn decide(&self, path: &Path) -> Decision {
      let path = if path.is_absolute() {
         path.to_path_buf()
      } else {
         self.root.join(path)
      };

      let rules = self.snapshot();
      if let Some(cached) = self.cache.get(&path)
         && cached.generation == rules.generation()
      {
         return cached;
      }

      let is_dir = path.is_dir();
      let outcome = rules.match_path(&path, is_dir);
      let decision = Decision {
         ignored:    outcome.ignored,
         source:     outcome.source,
         pattern:    outcome.pattern,
         deps:       outcome.deps,
         generation: rules.generation(),
      };
      self.cache.insert(path, decision.clone());
      decision
   }

   pub fn is_excluded(&self, path: &Path) -> bool {
      self.decide(path).ignored
   }

   /// Reloads one rule file in place, leaving every other level untouched,
   /// then purges exactly the cached decisions depending on it.
   pub fn reload_file(&self, rule_path: &Path) -> Result<()> {
      let reloaded = loader::load_rule_file(&self.root, rule_path);

      let current = self.snapshot();
      let mut known = false;
      let mut files: Vec<ParsedRuleFile> = current
         .rule_files()
         .map(|f| {
            if f.path == rule_path {
               known = true;
               reloaded.clone()
            } else {
               f.as_ref().clone()
            }
         })
         .collect();

      if !known {
         files.push(reloaded);
      }

      self.install(files)?;
      self.cache.invalidate_file(rule_path);
      Ok(())
   }

   /// Rediscovers every rule file and purges cached decisions at or beneath
   /// `scope`. Used when a rule file is added or removed, since that changes
   /// which paths have a deeper level than previously cached decisions.
   pub fn rescan(&self, scope: &Path) -> Result<()> {
      let files = loader::load_all(&self.root, self.max_depth);
      self.install(files)?;
      self.cache.invalidate_dir(scope);
      Ok(())
   }

   /// Routes one file-change notification into the right invalidation path.
   /// Returns `true` when the event concerned a rule file.
   ///
   /// Must run to completion before the change is handed to the indexing
   /// queue's dirty set, so no stale decision survives into a dependent
   /// reindex.
   pub fn handle_event(&self, changed: &Path) -> Result<bool> {
      if !is_rule_file(changed) {
         return Ok(false);
      }

      let known = self
         .snapshot()
         .rule_files()
         .any(|f| f.path == changed);

      if changed.exists() && known {
         self.reload_file(changed)?;
      } else {
         // Added or removed: which paths sit beneath the deepest level has
         // changed, so the whole subtree under its directory is suspect.
         let scope = changed.parent().unwrap_or(&self.root).to_path_buf();
         self.rescan(&scope)?;
      }

      Ok(true)
   }

   /// Parsed rule files in effect, shallow to deep (diagnostics surface).
   pub fn rule_files(&self) -> Vec<Arc<ParsedRuleFile>> {
      self.snapshot().rule_files().cloned().collect()
   }

   /// Fingerprint over every rule file's path and content, used by the
   /// indexer to detect that exclusion rules changed since the last pass.
   pub fn rules_fingerprint(&self) -> String {
      use sha2::{Digest, Sha256};

      let mut entries: Vec<(PathBuf, PathBuf)> = self
         .snapshot()
         .rule_files()
         .map(|f| {
            let key = f.path.strip_prefix(&self.root).unwrap_or(&f.path).to_path_buf();
            (key, f.path.clone())
         })
         .collect();
      entries.sort_by(|a, b| a.0.as_os_str().cmp(b.0.as_os_str()));

      let mut hasher = Sha256::new();
      if self.include_defaults {
         hasher.update(b"builtin\0");
      }
      for (key, path) in entries {
         let bytes = std::fs::read(&path).unwrap_or_default();
         hasher.update(key.to_string_lossy().as_bytes());
         hasher.update([0u8]);
         hasher.update(bytes);
      }

      hex::encode(hasher.finalize())
   }

   fn install(&self, files: Vec<ParsedRuleFile>) -> Result<()> {
      let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
      let ruleset =
         CompiledRuleSet::compile(&self.root, files, self.include_defaults, generation)?;
      *self.rules.write() = Arc::new(ruleset);
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use std::fs;

   use tempfile::TempDir;

   use super::*;

   fn engine_for(tmp: &TempDir) -> ExclusionEngine {
      ExclusionEngine::new(tmp.path()).unwrap()
   }

   #[test]
   fn decisions_are_cached_and_reused() {
      let tmp = TempDir::new().unwrap();
      fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
      let engine = engine_for(&tmp);

      let target = tmp.path().canonicalize().unwrap().join("x.log");
      let first = engine.decide(&target);
      let second = engine.decide(&target);
      assert!(first.ignored);
      assert_eq!(first.generation, second.generation);
   }

   #[test]
   fn reload_reflects_new_rule_content() {
      let tmp = TempDir::new().unwrap();
      let rule_path = tmp.path().join(".gitignore");
      fs::write(&rule_path, "*.log\n").unwrap();
      let engine = engine_for(&tmp);
      let rule_path = engine.root().join(".gitignore");

      let target = engine.root().join("keep.log");
      assert!(engine.decide(&target).ignored);

      fs::write(&rule_path, "*.log\n!keep.log\n").unwrap();
      engine.reload_file(&rule_path).unwrap();

      assert!(!engine.decide(&target).ignored);
   }

   #[test]
   fn added_rule_file_changes_nested_decisions() {
      let tmp = TempDir::new().unwrap();
      fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
      fs::create_dir_all(tmp.path().join("sub")).unwrap();
      let engine = engine_for(&tmp);

      let nested = engine.root().join("sub/important.log");
      assert!(engine.decide(&nested).ignored);

      let new_rules = engine.root().join("sub/.gitignore");
      fs::write(&new_rules, "!important.log\n").unwrap();
      assert!(engine.handle_event(&new_rules).unwrap());

      assert!(!engine.decide(&nested).ignored);
   }

   #[test]
   fn non_rule_file_event_is_ignored() {
      let tmp = TempDir::new().unwrap();
      let engine = engine_for(&tmp);
      let source = engine.root().join("main.rs");
      assert!(!engine.handle_event(&source).unwrap());
   }

   #[test]
   fn rules_fingerprint_tracks_content() {
      let tmp = TempDir::new().unwrap();
      let rule_path = tmp.path().join(".gitignore");
      fs::write(&rule_path, "*.log\n").unwrap();
      let engine = engine_for(&tmp);

      let fp1 = engine.rules_fingerprint();
      fs::write(&rule_path, "*.tmp\n").unwrap();
      let fp2 = engine.rules_fingerprint();
      assert_ne!(fp1, fp2);
   }
}
