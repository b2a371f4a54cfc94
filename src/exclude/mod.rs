//! Hierarchical file-exclusion engine.
//!
//! Decides whether a path is excluded from indexing and search using
//! gitignore-style rule files layered across the workspace hierarchy, with
//! deterministic precedence (deepest rule level wins), per-line validation,
//! and a dependency-tracking decision cache with live invalidation.

mod cache;
mod engine;
mod loader;
mod pattern;
mod ruleset;

pub use cache::{Decision, DecisionCache};
pub use engine::ExclusionEngine;
pub use loader::{IGNORE_FILENAMES, discover_rule_files, is_rule_file, load_all, load_rule_file};
pub use pattern::{ParsedRuleFile, RejectedPattern, RuleFileStats, RulePattern, validate_pattern};
pub use ruleset::{CompiledRuleSet, DEFAULT_EXCLUDE_PATTERNS, MatchOutcome, RuleLevel, RuleSource};
