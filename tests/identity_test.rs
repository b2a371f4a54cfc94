//! Project identifier determinism and distinctness.

use std::{fs, path::Path};

use cindex::project::{Project, project_id};
use tempfile::TempDir;

#[test]
fn same_inputs_reproduce_the_same_id() {
   let a = project_id("alice", Path::new("/home/alice/repo"));
   let b = project_id("alice", Path::new("/home/alice/repo"));
   assert_eq!(a, b);
}

#[test]
fn different_paths_yield_different_ids() {
   let owner = "alice";
   let ids: Vec<String> = (0..64)
      .map(|i| project_id(owner, Path::new(&format!("/srv/repo{i}"))))
      .collect();

   let mut deduped = ids.clone();
   deduped.sort();
   deduped.dedup();
   assert_eq!(deduped.len(), ids.len(), "no collisions across distinct paths");
}

#[test]
fn id_embeds_owner_and_sixteen_hex_chars() {
   let id = project_id("bob", Path::new("/srv/repo"));
   let mut parts = id.splitn(3, '_');
   assert_eq!(parts.next(), Some("cidx"));
   assert_eq!(parts.next(), Some("bob"));
   let digest = parts.next().unwrap();
   assert_eq!(digest.len(), 16);
   assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn resolve_is_stable_across_path_spellings() {
   let tmp = TempDir::new().unwrap();
   let workspace = tmp.path().join("proj");
   fs::create_dir_all(workspace.join("sub")).unwrap();

   let direct = Project::resolve(&workspace).unwrap();
   let dotted = Project::resolve(&workspace.join("sub").join("..")).unwrap();

   assert_eq!(direct.project_id, dotted.project_id);
   assert_eq!(direct.workspace_path, dotted.workspace_path);
}
