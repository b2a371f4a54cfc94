//! Decision-cache invalidation driven by rule-file change events.

use std::fs;

use cindex::exclude::ExclusionEngine;
use tempfile::TempDir;

#[test]
fn modified_rule_file_invalidates_dependent_decisions() {
   let tmp = TempDir::new().unwrap();
   let rule_path = tmp.path().join(".gitignore");
   fs::write(&rule_path, "*.log\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();
   let rule_path = root.join(".gitignore");
   let target = root.join("keep.log");

   // Prime the cache with the old verdict.
   let before = engine.decide(&target);
   assert!(before.ignored);
   assert!(before.deps.contains(&rule_path));

   // Relax the rule and deliver the change event.
   fs::write(&rule_path, "*.log\n!keep.log\n").unwrap();
   assert!(engine.handle_event(&rule_path).unwrap());

   // The next lookup recomputes and reflects the new content.
   let after = engine.decide(&target);
   assert!(!after.ignored);
   assert!(after.generation > before.generation);
}

#[test]
fn removed_rule_file_clears_its_subtree_decisions() {
   let tmp = TempDir::new().unwrap();
   fs::create_dir_all(tmp.path().join("sub")).unwrap();
   fs::write(tmp.path().join("sub/.gitignore"), "*.tmp\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();
   let rule_path = root.join("sub/.gitignore");
   let target = root.join("sub/scratch.tmp");

   assert!(engine.is_excluded(&target));

   fs::remove_file(&rule_path).unwrap();
   assert!(engine.handle_event(&rule_path).unwrap());

   assert!(!engine.is_excluded(&target));
}

#[test]
fn unrelated_rule_file_change_leaves_other_decisions_valid() {
   let tmp = TempDir::new().unwrap();
   fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
   fs::create_dir_all(tmp.path().join("sub")).unwrap();
   fs::write(tmp.path().join("sub/.gitignore"), "*.tmp\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();

   assert!(engine.is_excluded(&root.join("a.log")));
   assert!(engine.is_excluded(&root.join("sub/b.tmp")));

   // Touch only the nested file; the root decision must stay correct.
   fs::write(root.join("sub/.gitignore"), "!*.tmp\n").unwrap();
   engine.handle_event(&root.join("sub/.gitignore")).unwrap();

   assert!(engine.is_excluded(&root.join("a.log")));
   assert!(!engine.is_excluded(&root.join("sub/b.tmp")));
}

#[test]
fn unreadable_rule_file_degrades_without_blocking_other_levels() {
   let tmp = TempDir::new().unwrap();
   fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();

   // Deliver an event for a rule file that never existed; the engine must
   // keep answering from the levels it has.
   let ghost = root.join("sub/.gitignore");
   engine.handle_event(&ghost).unwrap();

   assert!(engine.is_excluded(&root.join("x.log")));
   assert!(!engine.is_excluded(&root.join("x.rs")));
}
