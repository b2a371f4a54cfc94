//! Project identity and per-project storage layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Result, config, error::Error};

const PROJECT_ID_PREFIX: &str = "cidx";
const PROJECT_ID_HASH_LEN: usize = 16;

/// One (owner, workspace) pairing with its own isolated index and metadata.
///
/// The id is a pure function of `(owner_id, absolute workspace path)`:
/// recomputing it for the same inputs always reproduces the same value, so a
/// client and a daemon independently derive the same socket and data paths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
   pub project_id:     String,
   pub owner_id:       String,
   pub display_name:   String,
   pub workspace_path: PathBuf,
}

impl Project {
   /// Resolves a project from a workspace path, canonicalizing it first.
   ///
   /// Fails with [`Error::WorkspaceUnavailable`] when the path does not exist
   /// or cannot be resolved.
   pub fn resolve(path: &Path) -> Result<Self> {
      let workspace_path = path
         .canonicalize()
         .map_err(|_| Error::WorkspaceUnavailable(path.to_path_buf()))?;

      let cfg = config::init_for_root(&workspace_path);
      let owner_id = cfg.owner_id.clone();
      let display_name = cfg.display_name.clone().unwrap_or_else(|| {
         workspace_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string()
      });

      Ok(Self {
         project_id: project_id(&owner_id, &workspace_path),
         owner_id,
         display_name,
         workspace_path,
      })
   }

   /// Exclusive storage directory for this project's index and metadata.
   pub fn data_dir(&self) -> PathBuf {
      config::data_dir().join(&self.project_id)
   }

   /// Path of the persisted fingerprint registry for this project.
   pub fn meta_path(&self) -> PathBuf {
      config::meta_dir().join(format!("{}.json", self.project_id))
   }
}

/// Computes the stable project identifier `cidx_{owner}_{hex16}`.
///
/// `hex16` is the first 16 hex characters of the SHA-256 digest of the UTF-8
/// string `"{owner}:{absolute_path}"`.
pub fn project_id(owner_id: &str, workspace_path: &Path) -> String {
   let mut hasher = Sha256::new();
   hasher.update(owner_id.as_bytes());
   hasher.update(b":");
   hasher.update(workspace_path.to_string_lossy().as_bytes());
   let digest = hex::encode(hasher.finalize());
   format!("{PROJECT_ID_PREFIX}_{owner_id}_{}", &digest[..PROJECT_ID_HASH_LEN])
}
