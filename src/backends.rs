//! External collaborator seams.
//!
//! Symbol extraction, embedding computation, and vector similarity are not
//! implemented here; the daemon consumes them behind these traits. The regex
//! searcher is the one built-in implementation, and the no-op variants stand
//! in wherever a heavy backend is not wired up (and in tests).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One extracted symbol (function, type, ...) from a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRecord {
   pub name: String,
   pub kind: String,
   pub line: u32,
}

/// Extracts symbol records from file content.
pub trait SymbolExtractor: Send + Sync {
   fn extract(&self, path: &Path, content: &str) -> Vec<SymbolRecord>;
}

/// Extractor that produces no symbols; used when no AST collaborator is
/// configured.
pub struct NullSymbolExtractor;

impl SymbolExtractor for NullSymbolExtractor {
   fn extract(&self, _path: &Path, _content: &str) -> Vec<SymbolRecord> {
      Vec::new()
   }
}

/// Receives per-file content for embedding-vector computation.
#[async_trait]
pub trait VectorBackend: Send + Sync {
   async fn index_file(&self, path: &Path, content: &str) -> Result<()>;
   async fn remove_files(&self, paths: &[PathBuf]) -> Result<()>;
   async fn clear(&self) -> Result<()>;
}

/// Vector backend that drops everything on the floor.
pub struct NullVectorBackend;

#[async_trait]
impl VectorBackend for NullVectorBackend {
   async fn index_file(&self, _path: &Path, _content: &str) -> Result<()> {
      Ok(())
   }

   async fn remove_files(&self, _paths: &[PathBuf]) -> Result<()> {
      Ok(())
   }

   async fn clear(&self) -> Result<()> {
      Ok(())
   }
}

/// One match produced by the search executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
   /// Workspace-relative path.
   pub path: PathBuf,
   pub line: u32,
   pub text: String,
}

/// Executes a pattern over a prepared set of files.
///
/// The caller owns eligibility: the path set handed in has already passed
/// the exclusion engine.
#[async_trait]
pub trait SearchBackend: Send + Sync {
   async fn search(
      &self,
      root: &Path,
      pattern: &str,
      files: &[PathBuf],
      limit: usize,
   ) -> Result<Vec<SearchMatch>>;
}

/// Built-in regex executor reading files directly from the workspace.
pub struct RegexSearchBackend;

#[async_trait]
impl SearchBackend for RegexSearchBackend {
   async fn search(
      &self,
      root: &Path,
      pattern: &str,
      files: &[PathBuf],
      limit: usize,
   ) -> Result<Vec<SearchMatch>> {
      let regex = regex::Regex::new(pattern)?;
      let mut matches = Vec::new();

      for rel in files {
         if matches.len() >= limit {
            break;
         }

         let abs = root.join(rel);
         let Ok(content) = tokio::fs::read_to_string(&abs).await else {
            // Binary or vanished mid-search; local failure, not fatal.
            continue;
         };

         for (idx, line) in content.lines().enumerate() {
            if regex.is_match(line) {
               matches.push(SearchMatch {
                  path: rel.clone(),
                  line: idx as u32 + 1,
                  text: line.to_string(),
               });
               if matches.len() >= limit {
                  break;
               }
            }
         }
      }

      Ok(matches)
   }
}

#[cfg(test)]
mod tests {
   use std::fs;

   use tempfile::TempDir;

   use super::*;

   #[tokio::test]
   async fn regex_backend_finds_lines() {
      let tmp = TempDir::new().unwrap();
      fs::write(tmp.path().join("a.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
      fs::write(tmp.path().join("b.rs"), "fn gamma() {}\n").unwrap();

      let backend = RegexSearchBackend;
      let files = vec![PathBuf::from("a.rs"), PathBuf::from("b.rs")];
      let matches = backend
         .search(tmp.path(), r"fn \w+a\(", &files, 10)
         .await
         .unwrap();

      assert_eq!(matches.len(), 2);
      assert_eq!(matches[0].path, PathBuf::from("a.rs"));
      assert_eq!(matches[1].path, PathBuf::from("b.rs"));
   }

   #[tokio::test]
   async fn regex_backend_honors_limit() {
      let tmp = TempDir::new().unwrap();
      fs::write(tmp.path().join("a.txt"), "x\nx\nx\nx\n").unwrap();

      let backend = RegexSearchBackend;
      let matches = backend
         .search(tmp.path(), "x", &[PathBuf::from("a.txt")], 2)
         .await
         .unwrap();
      assert_eq!(matches.len(), 2);
   }

   #[tokio::test]
   async fn invalid_pattern_is_an_error() {
      let backend = RegexSearchBackend;
      let result = backend.search(Path::new("/"), "(unclosed", &[], 10).await;
      assert!(result.is_err());
   }
}
