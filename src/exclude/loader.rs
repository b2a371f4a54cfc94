//! Rule-file discovery and loading.

use std::{
   fs,
   path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::exclude::pattern::{ParsedRuleFile, RuleFileStats, parse_rules};

/// Recognized rule-file names, in within-directory precedence order
/// (`.cindexignore` overrides `.gitignore` at the same level).
pub const IGNORE_FILENAMES: &[&str] = &[".gitignore", ".cindexignore"];

/// Directories never descended into during rule discovery. Their contents
/// are excluded by the builtin defaults anyway, so rule files inside them
/// can never take effect.
const SKIP_DIRS: &[&str] = &[
   ".git",
   ".hg",
   ".svn",
   "node_modules",
   "dist",
   "build",
   "out",
   "target",
   "__pycache__",
   ".venv",
   "venv",
   "coverage",
   ".pytest_cache",
];

/// Whether a path names a recognized rule file.
pub fn is_rule_file(path: &Path) -> bool {
   path
      .file_name()
      .and_then(|n| n.to_str())
      .is_some_and(|name| IGNORE_FILENAMES.iter().any(|f| *f == name))
}

/// Discovers rule files under `root`, walking at most `max_depth` directory
/// levels. Results are sorted for deterministic compile ordering.
pub fn discover_rule_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
   let mut files = Vec::new();

   let walker = WalkDir::new(root)
      .follow_links(false)
      .max_depth(max_depth.saturating_add(1))
      .into_iter()
      .filter_entry(|entry| {
         if !entry.file_type().is_dir() {
            return true;
         }
         let name = entry.file_name().to_string_lossy();
         !SKIP_DIRS.iter().any(|d| *d == name)
      });

   for entry in walker.filter_map(|e| e.ok()) {
      if entry.file_type().is_file() && is_rule_file(entry.path()) {
         files.push(entry.path().to_path_buf());
      }
   }

   files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
   files
}

/// Loads and parses one rule file.
///
/// A file that cannot be read degrades to an empty level carrying a single
/// warning in its statistics; it never blocks matching with other levels.
pub fn load_rule_file(root: &Path, path: &Path) -> ParsedRuleFile {
   let dir = path.parent().unwrap_or(root).to_path_buf();
   let depth = dir
      .strip_prefix(root)
      .map(|rel| rel.components().count())
      .unwrap_or(0);

   match fs::read_to_string(path) {
      Ok(content) => parse_rules(&dir, path, depth, &content),
      Err(e) => {
         tracing::warn!("failed to read rule file {}: {}", path.display(), e);
         ParsedRuleFile {
            path: path.to_path_buf(),
            dir,
            depth,
            patterns: Vec::new(),
            rejected: Vec::new(),
            stats: RuleFileStats { warnings: 1, ..RuleFileStats::default() },
         }
      },
   }
}

/// Discovers and loads every rule file under `root`.
pub fn load_all(root: &Path, max_depth: usize) -> Vec<ParsedRuleFile> {
   discover_rule_files(root, max_depth)
      .iter()
      .map(|path| load_rule_file(root, path))
      .collect()
}

#[cfg(test)]
mod tests {
   use std::fs;

   use tempfile::TempDir;

   use super::*;

   #[test]
   fn discovers_nested_rule_files() {
      let tmp = TempDir::new().unwrap();
      fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
      fs::create_dir_all(tmp.path().join("sub/deep")).unwrap();
      fs::write(tmp.path().join("sub/.cindexignore"), "*.tmp\n").unwrap();
      fs::write(tmp.path().join("sub/deep/.gitignore"), "*.o\n").unwrap();

      let files = discover_rule_files(tmp.path(), 16);
      assert_eq!(files.len(), 3);
   }

   #[test]
   fn skips_dependency_directories() {
      let tmp = TempDir::new().unwrap();
      fs::create_dir_all(tmp.path().join("node_modules/pkg")).unwrap();
      fs::write(tmp.path().join("node_modules/pkg/.gitignore"), "*.js\n").unwrap();

      let files = discover_rule_files(tmp.path(), 16);
      assert!(files.is_empty());
   }

   #[test]
   fn depth_bound_is_honored() {
      let tmp = TempDir::new().unwrap();
      fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
      fs::write(tmp.path().join("a/.gitignore"), "*.log\n").unwrap();
      fs::write(tmp.path().join("a/b/c/.gitignore"), "*.log\n").unwrap();

      let files = discover_rule_files(tmp.path(), 1);
      assert_eq!(files.len(), 1);
      assert!(files[0].ends_with("a/.gitignore"));
   }

   #[test]
   fn unreadable_file_degrades_with_warning() {
      let tmp = TempDir::new().unwrap();
      let missing = tmp.path().join(".gitignore");

      let parsed = load_rule_file(tmp.path(), &missing);
      assert!(parsed.patterns.is_empty());
      assert_eq!(parsed.stats.warnings, 1);
   }

   #[test]
   fn load_all_records_depth() {
      let tmp = TempDir::new().unwrap();
      fs::create_dir_all(tmp.path().join("sub")).unwrap();
      fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
      fs::write(tmp.path().join("sub/.gitignore"), "!keep.log\n").unwrap();

      let root = tmp.path().canonicalize().unwrap();
      let files = load_all(&root, 16);
      let depths: Vec<usize> = files.iter().map(|f| f.depth).collect();
      assert!(depths.contains(&0));
      assert!(depths.contains(&1));
   }
}
