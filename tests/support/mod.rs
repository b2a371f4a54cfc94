//! Shared fixtures for integration tests.

#![allow(dead_code, reason = "each test binary uses a subset of the fixtures")]

use std::{fs, path::PathBuf, sync::Arc};

use cindex::{
   backends::{NullSymbolExtractor, NullVectorBackend},
   exclude::ExclusionEngine,
   project::Project,
   queue::IndexQueue,
   store::JsonlIndexStore,
   tasks::TaskSupervisor,
};
use tempfile::TempDir;

pub struct QueueFixture {
   pub tmp:        TempDir,
   pub workspace:  PathBuf,
   pub engine:     Arc<ExclusionEngine>,
   pub store:      Arc<JsonlIndexStore>,
   pub supervisor: Arc<TaskSupervisor>,
   pub queue:      Arc<IndexQueue>,
}

/// Builds a queue over a real temp workspace with the null collaborators.
pub fn queue_fixture() -> QueueFixture {
   let tmp = TempDir::new().unwrap();
   let workspace = tmp.path().join("ws");
   fs::create_dir_all(&workspace).unwrap();
   let workspace = workspace.canonicalize().unwrap();

   let project = test_project(&workspace);
   let engine = Arc::new(ExclusionEngine::new(&workspace).unwrap());
   let store = Arc::new(JsonlIndexStore::open(&tmp.path().join("data")).unwrap());
   let supervisor = TaskSupervisor::new();

   let queue = Arc::new(IndexQueue::new(
      project,
      tmp.path().join("meta.json"),
      Arc::clone(&engine),
      Arc::clone(&store) as Arc<dyn cindex::store::IndexStore>,
      Arc::new(NullSymbolExtractor),
      Arc::new(NullVectorBackend),
      Arc::clone(&supervisor),
   ));

   QueueFixture { tmp, workspace, engine, store, supervisor, queue }
}

/// Same fixture shape, but pointed at a workspace path that does not exist,
/// so every index pass fails with a workspace error.
pub fn broken_queue_fixture() -> QueueFixture {
   let fixture = queue_fixture();
   let missing = fixture.tmp.path().join("gone");

   let project = test_project(&missing);
   let queue = Arc::new(IndexQueue::new(
      project,
      fixture.tmp.path().join("meta.json"),
      Arc::clone(&fixture.engine),
      Arc::clone(&fixture.store) as Arc<dyn cindex::store::IndexStore>,
      Arc::new(NullSymbolExtractor),
      Arc::new(NullVectorBackend),
      Arc::clone(&fixture.supervisor),
   ));

   QueueFixture { queue, ..fixture }
}

pub fn test_project(workspace: &std::path::Path) -> Project {
   Project {
      project_id:     "cidx_test_0123456789abcdef".to_string(),
      owner_id:       "test".to_string(),
      display_name:   "ws".to_string(),
      workspace_path: workspace.to_path_buf(),
   }
}
