//! Hierarchical exclusion precedence against a real workspace.

use std::fs;

use cindex::exclude::ExclusionEngine;
use tempfile::TempDir;

#[test]
fn nested_negation_reenables_file_excluded_by_ancestor() {
   let tmp = TempDir::new().unwrap();
   fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
   fs::create_dir_all(tmp.path().join("sub")).unwrap();
   fs::write(tmp.path().join("sub/.gitignore"), "!important.log\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();

   assert!(engine.is_excluded(&root.join("x.log")));
   assert!(!engine.is_excluded(&root.join("sub/important.log")));
   assert!(engine.is_excluded(&root.join("sub/other.log")));
}

#[test]
fn unmatched_paths_are_included() {
   let tmp = TempDir::new().unwrap();
   fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let decision = engine.decide(&engine.root().join("src/main.rs"));
   assert!(!decision.ignored);
   assert!(decision.pattern.is_none());
}

#[test]
fn builtin_defaults_apply_without_any_rule_file() {
   let tmp = TempDir::new().unwrap();
   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();

   assert!(engine.is_excluded(&root.join("node_modules/pkg/index.js")));
   assert!(engine.is_excluded(&root.join("target/debug/app")));
   assert!(engine.is_excluded(&root.join(".git/HEAD")));
   assert!(!engine.is_excluded(&root.join("src/lib.rs")));
}

#[test]
fn malformed_line_keeps_remaining_patterns_effective() {
   let tmp = TempDir::new().unwrap();
   // Nine valid lines around one invalid (unclosed character class).
   let content = "*.log\n*.tmp\nbuild/\ndist/\n**/a[/**\n*.o\n*.obj\ncache/\n*.bak\n*.orig\n";
   fs::write(tmp.path().join(".gitignore"), content).unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let files = engine.rule_files();
   assert_eq!(files.len(), 1);
   assert_eq!(files[0].stats.valid, 9);
   assert_eq!(files[0].stats.warnings, 1);
   assert_eq!(files[0].rejected.len(), 1);

   // The valid patterns still protect the tree.
   let root = engine.root().to_path_buf();
   assert!(engine.is_excluded(&root.join("trace.log")));
   assert!(engine.is_excluded(&root.join("cache/entry")));
}

#[test]
fn dir_only_pattern_excludes_contents() {
   let tmp = TempDir::new().unwrap();
   fs::write(tmp.path().join(".gitignore"), "generated/\n").unwrap();
   fs::create_dir_all(tmp.path().join("generated")).unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();

   assert!(engine.is_excluded(&root.join("generated/out.rs")));
   assert!(!engine.is_excluded(&root.join("src/generated.rs")));
}

#[test]
fn deeper_level_wins_even_when_shallower_matches_later_lines() {
   let tmp = TempDir::new().unwrap();
   fs::write(tmp.path().join(".gitignore"), "!special.tmp\n*.tmp\n").unwrap();
   fs::create_dir_all(tmp.path().join("deep")).unwrap();
   fs::write(tmp.path().join("deep/.gitignore"), "!special.tmp\n").unwrap();

   let engine = ExclusionEngine::new(tmp.path()).unwrap();
   let root = engine.root().to_path_buf();

   // At the root level the later `*.tmp` line overrides the negation.
   assert!(engine.is_excluded(&root.join("special.tmp")));
   // The deeper level's negation wins for its subtree.
   assert!(!engine.is_excluded(&root.join("deep/special.tmp")));
   assert!(engine.is_excluded(&root.join("deep/other.tmp")));
}
