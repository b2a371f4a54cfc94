//! Search dispatch over the eligible file set.
//!
//! The daemon does not execute search itself beyond the built-in regex
//! collaborator; what it owns is eligibility: every candidate file passes
//! the exclusion engine before the backend sees it, and results come back in
//! deterministic order.

use std::{
   path::{Path, PathBuf},
   sync::Arc,
};

use walkdir::WalkDir;

use crate::{
   Result,
   backends::{SearchBackend, SearchMatch},
   config,
   error::Error,
   exclude::ExclusionEngine,
   project::Project,
};

/// Runs search commands for one project.
pub struct SearchDispatcher {
   project: Project,
   engine:  Arc<ExclusionEngine>,
   backend: Arc<dyn SearchBackend>,
}

impl SearchDispatcher {
   pub fn new(
      project: Project,
      engine: Arc<ExclusionEngine>,
      backend: Arc<dyn SearchBackend>,
   ) -> Self {
      Self { project, engine, backend }
   }

   /// Executes `pattern` over every eligible file, optionally narrowed to a
   /// workspace-relative `scope`. Returns the matches and whether the result
   /// set was truncated at `limit`.
   pub async fn search(
      &self,
      pattern: &str,
      scope: Option<&Path>,
      limit: usize,
   ) -> Result<(Vec<SearchMatch>, bool)> {
      let root = &self.project.workspace_path;
      if !root.is_dir() {
         return Err(Error::WorkspaceUnavailable(root.clone()));
      }

      let walk_root = match scope {
         Some(scope) => {
            let abs = if scope.is_absolute() { scope.to_path_buf() } else { root.join(scope) };
            let abs = abs.canonicalize().map_err(|_| Error::Server {
               op:     "search",
               reason: format!("scope {} does not exist", scope.display()),
            })?;
            if !abs.starts_with(root) {
               return Err(Error::Server {
                  op:     "search",
                  reason: format!("scope {} is outside the workspace", scope.display()),
               });
            }
            abs
         },
         None => root.clone(),
      };

      let files = self.eligible_files(&walk_root);

      let limit = limit.min(config::get().max_search_results).max(1);
      let mut matches = self
         .backend
         .search(root, pattern, &files, limit + 1)
         .await?;

      let truncated = matches.len() > limit;
      matches.truncate(limit);
      Ok((matches, truncated))
   }

   /// Workspace-relative eligible files under `walk_root`, sorted so result
   /// ordering is stable across runs.
   fn eligible_files(&self, walk_root: &Path) -> Vec<PathBuf> {
      let root = &self.project.workspace_path;
      let max_size = config::get().effective_max_file_size_bytes();
      let engine = Arc::clone(&self.engine);

      let mut files: Vec<PathBuf> = WalkDir::new(walk_root)
         .follow_links(false)
         .into_iter()
         .filter_entry(move |entry| {
            if !entry.file_type().is_dir() {
               return true;
            }
            entry.depth() == 0 || !engine.is_excluded(entry.path())
         })
         .filter_map(|e| e.ok())
         .filter(|e| e.file_type().is_file())
         .filter(|e| {
            !e.file_name()
               .to_str()
               .is_some_and(|name| name.starts_with('.'))
         })
         .filter(|e| e.metadata().map(|m| m.len() <= max_size).unwrap_or(true))
         .filter(|e| !self.engine.is_excluded(e.path()))
         .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
         .collect();

      files.sort();
      files
   }
}

#[cfg(test)]
mod tests {
   use std::fs;

   use tempfile::TempDir;

   use super::*;
   use crate::backends::RegexSearchBackend;

   fn dispatcher_for(tmp: &TempDir) -> SearchDispatcher {
      let workspace = tmp.path().join("ws");
      fs::create_dir_all(&workspace).unwrap();
      let workspace = workspace.canonicalize().unwrap();

      let project = Project {
         project_id:     "cidx_test_0000000000000000".to_string(),
         owner_id:       "test".to_string(),
         display_name:   "ws".to_string(),
         workspace_path: workspace.clone(),
      };
      let engine = Arc::new(ExclusionEngine::new(&workspace).unwrap());
      SearchDispatcher::new(project, engine, Arc::new(RegexSearchBackend))
   }

   #[tokio::test]
   async fn excluded_files_never_surface_in_results() {
      let tmp = TempDir::new().unwrap();
      let dispatcher = dispatcher_for(&tmp);
      let ws = dispatcher.project.workspace_path.clone();

      fs::write(ws.join(".gitignore"), "*.log\n").unwrap();
      fs::write(ws.join("app.rs"), "needle here\n").unwrap();
      fs::write(ws.join("trace.log"), "needle here too\n").unwrap();
      dispatcher.engine.handle_event(&ws.join(".gitignore")).unwrap();

      let (matches, truncated) = dispatcher.search("needle", None, 10).await.unwrap();
      assert!(!truncated);
      assert_eq!(matches.len(), 1);
      assert_eq!(matches[0].path, PathBuf::from("app.rs"));
   }

   #[tokio::test]
   async fn scope_narrows_the_search() {
      let tmp = TempDir::new().unwrap();
      let dispatcher = dispatcher_for(&tmp);
      let ws = dispatcher.project.workspace_path.clone();

      fs::create_dir_all(ws.join("sub")).unwrap();
      fs::write(ws.join("top.rs"), "needle\n").unwrap();
      fs::write(ws.join("sub/inner.rs"), "needle\n").unwrap();

      let (matches, _) = dispatcher
         .search("needle", Some(Path::new("sub")), 10)
         .await
         .unwrap();
      assert_eq!(matches.len(), 1);
      assert_eq!(matches[0].path, PathBuf::from("sub/inner.rs"));
   }

   #[tokio::test]
   async fn out_of_workspace_scope_is_rejected() {
      let tmp = TempDir::new().unwrap();
      let dispatcher = dispatcher_for(&tmp);

      let result = dispatcher
         .search("needle", Some(Path::new("/etc")), 10)
         .await;
      assert!(result.is_err());
   }
}
