//! Compiled rule levels and hierarchical matching.

use std::{
   path::{Path, PathBuf},
   sync::Arc,
};

use ignore::{
   Match,
   gitignore::{Gitignore, GitignoreBuilder},
};

use crate::{
   Result,
   error::Error,
   exclude::pattern::{ParsedRuleFile, parse_rules},
};

/// Baseline exclusions always logically present beneath user-supplied rules:
/// build artifacts, dependency directories, VCS metadata, and OS/editor
/// droppings.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
   "**/node_modules/**",
   "**/dist/**",
   "**/build/**",
   "**/out/**",
   "**/target/**",
   "**/__pycache__/**",
   "**/.git/**",
   "**/.hg/**",
   "**/.svn/**",
   "**/.venv/**",
   "**/venv/**",
   "**/coverage/**",
   "**/.pytest_cache/**",
   "**/.idea/**",
   "**/.vscode/**",
   "*.lock",
   "*.bin",
   "*.pyc",
   "*.o",
   "*.a",
   "*.so",
   "*.min.js",
   "*.min.css",
   "*.map",
   "*.swp",
   ".DS_Store",
   "Thumbs.db",
];

/// Where a rule level's patterns came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
   /// The built-in baseline set.
   Builtin,
   /// An on-disk rule file.
   File(Arc<PathBuf>),
}

/// One rule level: a parsed file compiled into a matcher rooted at its
/// directory.
pub struct RuleLevel {
   pub source: RuleSource,
   pub file:   Arc<ParsedRuleFile>,
   matcher:    Gitignore,
}

impl RuleLevel {
   fn applies_to(&self, path: &Path) -> bool {
      path.starts_with(&self.file.dir)
   }
}

/// Verdict of one hierarchical match.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
   pub ignored: bool,
   /// Rule file whose pattern decided the outcome (`None` for the builtin
   /// level or when nothing matched).
   pub source:  Option<Arc<PathBuf>>,
   /// Original text of the winning pattern.
   pub pattern: Option<String>,
   /// Every on-disk rule file consulted; a change to any of them can change
   /// this outcome.
   pub deps:    Arc<[PathBuf]>,
}

impl MatchOutcome {
   fn unmatched(deps: Arc<[PathBuf]>) -> Self {
      Self { ignored: false, source: None, pattern: None, deps }
   }
}

/// The union of all rule files along one ownership hierarchy, ordered from
/// the shallowest to the deepest directory.
///
/// Ordering is total and deterministic: `(depth, directory, filename rank)`,
/// with the builtin level pinned first. Matching applies levels in that order
/// and the **last level producing any match — positive or negated — wins**,
/// so a nested rule file can re-enable a file excluded by an ancestor.
pub struct CompiledRuleSet {
   root:       PathBuf,
   levels:     Vec<RuleLevel>,
   generation: u64,
}

impl CompiledRuleSet {
   /// Compiles parsed rule files into an ordered set.
   ///
   /// Input directories need not be contiguous. Fails only on structurally
   /// invalid input (a rule file outside the root); unusual but syntactically
   /// valid patterns never fail here. A file whose matcher cannot be built
   /// degrades to an empty level with a warning.
   pub fn compile(
      root: &Path,
      mut files: Vec<ParsedRuleFile>,
      include_defaults: bool,
      generation: u64,
   ) -> Result<Self> {
      for file in &files {
         if !file.dir.starts_with(root) {
            return Err(Error::InvalidRuleSet(format!(
               "rule file {} lies outside the project root {}",
               file.path.display(),
               root.display()
            )));
         }
      }

      files.sort_by(|a, b| {
         (a.depth, a.dir.as_os_str(), filename_rank(&a.path)).cmp(&(
            b.depth,
            b.dir.as_os_str(),
            filename_rank(&b.path),
         ))
      });

      let mut levels = Vec::with_capacity(files.len() + 1);
      if include_defaults {
         levels.push(builtin_level(root));
      }

      for file in files {
         let Some(matcher) = build_matcher(&file) else {
            continue;
         };
         levels.push(RuleLevel {
            source: RuleSource::File(Arc::new(file.path.clone())),
            file: Arc::new(file),
            matcher,
         });
      }

      Ok(Self { root: root.to_path_buf(), levels, generation })
   }

   pub fn root(&self) -> &Path {
      &self.root
   }

   pub const fn generation(&self) -> u64 {
      self.generation
   }

   pub fn levels(&self) -> &[RuleLevel] {
      &self.levels
   }

   /// Parsed rule files backing this set, shallow to deep (builtin excluded).
   pub fn rule_files(&self) -> impl Iterator<Item = &Arc<ParsedRuleFile>> {
      self
         .levels
         .iter()
         .filter(|l| matches!(l.source, RuleSource::File(_)))
         .map(|l| &l.file)
   }

   /// Evaluates every applicable rule level for `path`, shallow to deep.
   ///
   /// Within a level the usual gitignore semantics apply (later pattern in
   /// file order overrides an earlier one, `!` negates); across levels the
   /// deepest level that produced any match wins. A path with no matching
   /// pattern at any level is not excluded.
   pub fn match_path(&self, path: &Path, is_dir: bool) -> MatchOutcome {
      let deps: Arc<[PathBuf]> = self
         .levels
         .iter()
         .filter(|l| l.applies_to(path))
         .filter_map(|l| match &l.source {
            RuleSource::File(p) => Some(p.as_ref().clone()),
            RuleSource::Builtin => None,
         })
         .collect();

      if !path.starts_with(&self.root) {
         // Out-of-root paths are never eligible for indexing or search.
         return MatchOutcome { ignored: true, source: None, pattern: None, deps };
      }

      let mut outcome = MatchOutcome::unmatched(Arc::clone(&deps));

      for level in &self.levels {
         if !level.applies_to(path) {
            continue;
         }
         let Ok(relative) = path.strip_prefix(&level.file.dir) else {
            continue;
         };
         if relative.as_os_str().is_empty() {
            continue;
         }

         match level.matcher.matched_path_or_any_parents(relative, is_dir) {
            Match::Ignore(glob) => {
               outcome = MatchOutcome {
                  ignored: true,
                  source:  level_source(level),
                  pattern: Some(glob.original().to_string()),
                  deps:    Arc::clone(&deps),
               };
            },
            Match::Whitelist(glob) => {
               outcome = MatchOutcome {
                  ignored: false,
                  source:  level_source(level),
                  pattern: Some(glob.original().to_string()),
                  deps:    Arc::clone(&deps),
               };
            },
            Match::None => {},
         }
      }

      outcome
   }
}

fn level_source(level: &RuleLevel) -> Option<Arc<PathBuf>> {
   match &level.source {
      RuleSource::File(p) => Some(Arc::clone(p)),
      RuleSource::Builtin => None,
   }
}

/// Orders rule files within one directory: `.gitignore` first, then the
/// project-specific `.cindexignore`, so project rules win at equal depth.
fn filename_rank(path: &Path) -> u8 {
   match path.file_name().and_then(|n| n.to_str()) {
      Some(".gitignore") => 0,
      Some(".cindexignore") => 1,
      _ => 2,
   }
}

fn builtin_level(root: &Path) -> RuleLevel {
   let content = DEFAULT_EXCLUDE_PATTERNS.join("\n");
   let file = parse_rules(root, Path::new(""), 0, &content);

   let mut builder = GitignoreBuilder::new(root);
   for pattern in DEFAULT_EXCLUDE_PATTERNS {
      let _ = builder.add_line(None, pattern);
   }
   let matcher = builder.build().unwrap_or_else(|_| Gitignore::empty());

   RuleLevel { source: RuleSource::Builtin, file: Arc::new(file), matcher }
}

fn build_matcher(file: &ParsedRuleFile) -> Option<Gitignore> {
   if file.patterns.is_empty() {
      return Some(Gitignore::empty());
   }

   let mut builder = GitignoreBuilder::new(&file.dir);
   for pattern in &file.patterns {
      if let Err(e) = builder.add_line(Some(file.path.clone()), &pattern.raw) {
         // Already validated at parse time; a failure here is unexpected but
         // must not block the file's remaining patterns.
         tracing::warn!(
            "pattern rejected at compile: {}:{}: {}",
            file.path.display(),
            pattern.line,
            e
         );
      }
   }

   match builder.build() {
      Ok(matcher) => Some(matcher),
      Err(e) => {
         tracing::warn!(
            "rule file {} contributed no rules (matcher build failed: {})",
            file.path.display(),
            e
         );
         None
      },
   }
}
