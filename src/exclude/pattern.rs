//! Gitignore-style pattern parsing and per-line validation.

use std::path::{Path, PathBuf};

use ignore::gitignore::GitignoreBuilder;
use serde::Serialize;

/// One accepted pattern line from a rule file, in file order.
#[derive(Debug, Clone, Serialize)]
pub struct RulePattern {
   pub line:     usize,
   pub raw:      String,
   pub negated:  bool,
   pub dir_only: bool,
}

/// One rejected pattern line with the reason it was refused.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedPattern {
   pub line:   usize,
   pub raw:    String,
   pub reason: String,
}

/// Line-level statistics for one parsed rule file.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RuleFileStats {
   pub comments: usize,
   pub blanks:   usize,
   pub valid:    usize,
   pub warnings: usize,
}

/// One parsed ignore-pattern file.
///
/// Superseded (not mutated) on reload: the loader builds a fresh value and
/// the engine swaps it into the compiled set.
#[derive(Debug, Clone)]
pub struct ParsedRuleFile {
   /// Filesystem path of the rule file. Empty for the synthetic builtin set.
   pub path:     PathBuf,
   /// Directory at which the file's patterns take effect.
   pub dir:      PathBuf,
   /// Depth of `dir` below the project root (root itself is 0).
   pub depth:    usize,
   pub patterns: Vec<RulePattern>,
   pub rejected: Vec<RejectedPattern>,
   pub stats:    RuleFileStats,
}

/// Validates a single gitignore pattern.
///
/// Accepts everything standard gitignore syntax accepts; returns the parser's
/// reason otherwise. Comments and blank lines are not patterns and are
/// rejected here (the file parser counts them separately and never feeds
/// them in).
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
   let trimmed = pattern.trim_end();
   if trimmed.is_empty() {
      return Err("blank line".to_string());
   }
   if trimmed.starts_with('#') {
      return Err("comment".to_string());
   }

   let mut scratch = GitignoreBuilder::new(Path::new("/"));
   scratch
      .add_line(None, trimmed)
      .map(|_| ())
      .map_err(|e| e.to_string())
}

/// Parses rule-file content line by line.
///
/// A malformed line is recorded with its reason and skipped; it never aborts
/// the rest of the file, so one bad line cannot disable a file's remaining
/// protections.
pub fn parse_rules(dir: &Path, source: &Path, depth: usize, content: &str) -> ParsedRuleFile {
   let mut patterns = Vec::new();
   let mut rejected = Vec::new();
   let mut stats = RuleFileStats::default();

   for (idx, raw_line) in content.lines().enumerate() {
      let line_no = idx + 1;
      let line = raw_line.trim_end();

      if line.is_empty() {
         stats.blanks += 1;
         continue;
      }
      if line.starts_with('#') {
         stats.comments += 1;
         continue;
      }

      match validate_pattern(line) {
         Ok(()) => {
            let negated = line.starts_with('!');
            let body = line.strip_prefix('!').unwrap_or(line);
            patterns.push(RulePattern {
               line: line_no,
               raw: line.to_string(),
               negated,
               dir_only: body.ends_with('/'),
            });
            stats.valid += 1;
         },
         Err(reason) => {
            tracing::warn!(
               "invalid pattern at {}:{}: {} ({})",
               source.display(),
               line_no,
               line,
               reason
            );
            rejected.push(RejectedPattern { line: line_no, raw: line.to_string(), reason });
            stats.warnings += 1;
         },
      }
   }

   ParsedRuleFile {
      path: source.to_path_buf(),
      dir: dir.to_path_buf(),
      depth,
      patterns,
      rejected,
      stats,
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn accepts_standard_syntax() {
      for pattern in ["*.log", "!important.log", "build/", "/anchored", "**/generated/**", "a?c"] {
         assert!(validate_pattern(pattern).is_ok(), "{pattern} should be valid");
      }
   }

   #[test]
   fn rejects_blank_and_comment() {
      assert!(validate_pattern("").is_err());
      assert!(validate_pattern("# comment").is_err());
   }

   #[test]
   fn one_bad_line_does_not_poison_the_rest() {
      let content = "# header\n\n*.log\n*.tmp\nbuild/\n!keep.log\ntarget/\ndist/\n**/a[/**\n*.o\nnode_modules/\n*.pyc\n";
      let parsed = parse_rules(Path::new("/ws"), Path::new("/ws/.gitignore"), 0, content);

      assert_eq!(parsed.stats.valid, 9);
      assert_eq!(parsed.stats.warnings, 1);
      assert_eq!(parsed.stats.comments, 1);
      assert_eq!(parsed.stats.blanks, 1);
      assert_eq!(parsed.patterns.len(), 9);
      assert_eq!(parsed.rejected.len(), 1);
      assert_eq!(parsed.rejected[0].raw, "**/a[/**");
   }

   #[test]
   fn records_negation_and_dir_only() {
      let parsed = parse_rules(
         Path::new("/ws"),
         Path::new("/ws/.gitignore"),
         0,
         "!keep.log\nbuild/\n",
      );
      assert!(parsed.patterns[0].negated);
      assert!(!parsed.patterns[0].dir_only);
      assert!(!parsed.patterns[1].negated);
      assert!(parsed.patterns[1].dir_only);
   }
}
