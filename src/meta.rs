//! File fingerprint tracking for incremental indexing

use std::{
   collections::HashMap,
   fmt, fs,
   path::{Path, PathBuf},
};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Result, config};

/// Fingerprint for a single file: content hash plus a modification signature
/// (mtime seconds and size) used as the cheap staleness check before hashing.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct FileMeta {
   pub hash:  FileHash,
   pub mtime: u64,
   #[serde(default)]
   pub size:  u64,
}

/// SHA-256 hash of file contents
#[derive(Serialize, Deserialize, Copy, Clone, Default, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct FileHash([u8; 32]);

impl FileHash {
   /// Creates a hash from a byte slice, verifying length
   pub fn from_slice(slice: &[u8]) -> Option<Self> {
      let (this, rem) = slice.split_first_chunk()?;
      rem.is_empty().then_some(Self(*this))
   }

   pub const fn new(hash: [u8; 32]) -> Self {
      Self(hash)
   }

   /// Computes SHA-256 hash of data
   pub fn sum(dat: impl AsRef<[u8]>) -> Self {
      Self(Sha256::digest(dat.as_ref()).into())
   }
}

impl AsRef<[u8]> for FileHash {
   fn as_ref(&self) -> &[u8] {
      &self.0
   }
}

impl fmt::Display for FileHash {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}", hex::encode(self.0))
   }
}

impl fmt::Debug for FileHash {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "Hash({})", hex::encode(self.0))
   }
}

/// Persistent registry of file fingerprints for one project.
///
/// The indexer diffs the current workspace against this registry to find the
/// minimal changed subset, and compares `rules_fingerprint` against the
/// exclusion engine's to detect that ignore rules changed since the last
/// completed pass.
#[derive(Serialize, Deserialize, Default)]
pub struct MetaStore {
   #[serde(default)]
   files:                  HashMap<PathBuf, FileMeta>,
   #[serde(default)]
   rules_fingerprint:      Option<String>,
   #[serde(default)]
   last_index_at:          Option<String>,
   #[serde(default)]
   last_index_result:      Option<String>,
   #[serde(default)]
   last_index_duration_ms: Option<u64>,
   #[serde(skip)]
   path:                   PathBuf,
   #[serde(skip)]
   dirty:                  bool,
   #[serde(skip)]
   existed:                bool,
}

impl MetaStore {
   /// Loads the registry for a project id from the global meta directory.
   pub fn load(project_id: &str) -> Result<Self> {
      let path = config::meta_dir().join(format!("{project_id}.json"));
      Self::load_from(path)
   }

   /// Loads the registry from an explicit path, creating an empty one if the
   /// file does not exist.
   pub fn load_from(path: PathBuf) -> Result<Self> {
      let existed = path.exists();

      let mut store = if existed {
         let content = fs::read_to_string(&path)?;
         let mut store: Self = serde_json::from_str(&content)?;
         store.path = path;
         store
      } else {
         Self { path, ..Self::default() }
      };

      store.existed = existed;
      Ok(store)
   }

   /// Whether a previous completed index recorded anything here.
   pub const fn existed(&self) -> bool {
      self.existed
   }

   pub fn get_meta(&self, path: &Path) -> Option<&FileMeta> {
      self.files.get(path)
   }

   pub fn get_hash(&self, path: &Path) -> Option<FileHash> {
      self.files.get(path).map(|m| m.hash)
   }

   /// Sets the fingerprint for a file
   pub fn set_meta(&mut self, path: PathBuf, hash: FileHash, mtime: u64, size: u64) {
      self.files.insert(path, FileMeta { hash, mtime, size });
      self.dirty = true;
   }

   /// Removes the fingerprint for a file
   pub fn remove(&mut self, path: &Path) {
      if self.files.remove(path).is_some() {
         self.dirty = true;
      }
   }

   /// Returns an iterator over all tracked file paths
   pub fn all_paths(&self) -> impl Iterator<Item = &PathBuf> {
      self.files.keys()
   }

   pub fn file_count(&self) -> usize {
      self.files.len()
   }

   /// Clears all tracked fingerprints (full rebuild).
   pub fn clear(&mut self) {
      if !self.files.is_empty() {
         self.files.clear();
         self.dirty = true;
      }
   }

   pub fn rules_fingerprint(&self) -> Option<&str> {
      self.rules_fingerprint.as_deref()
   }

   pub fn set_rules_fingerprint(&mut self, fingerprint: String) {
      if self.rules_fingerprint.as_deref() != Some(fingerprint.as_str()) {
         self.rules_fingerprint = Some(fingerprint);
         self.dirty = true;
      }
   }

   pub fn last_index_at(&self) -> Option<&str> {
      self.last_index_at.as_deref()
   }

   pub fn last_index_result(&self) -> Option<&str> {
      self.last_index_result.as_deref()
   }

   pub fn record_index(&mut self, result: &str, duration_ms: u64) {
      let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
      self.last_index_at = Some(now);
      self.last_index_result = Some(result.to_string());
      self.last_index_duration_ms = Some(duration_ms);
      self.dirty = true;
   }

   /// Saves the registry to disk if dirty
   pub fn save(&mut self) -> Result<()> {
      if !self.dirty {
         return Ok(());
      }

      if let Some(parent) = self.path.parent() {
         fs::create_dir_all(parent)?;
      }

      let content = serde_json::to_string(&self)?;
      fs::write(&self.path, content)?;

      self.dirty = false;
      self.existed = true;
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use tempfile::TempDir;

   use super::*;

   #[test]
   fn load_nonexistent_creates_empty() {
      let tmp = TempDir::new().unwrap();
      let store = MetaStore::load_from(tmp.path().join("meta.json")).unwrap();
      assert_eq!(store.file_count(), 0);
      assert!(!store.existed());
   }

   #[test]
   fn save_and_load_roundtrip() {
      let tmp = TempDir::new().unwrap();
      let path = tmp.path().join("meta.json");

      let mut store = MetaStore::load_from(path.clone()).unwrap();
      let hash = FileHash::sum(b"content");
      store.set_meta(PathBuf::from("src/lib.rs"), hash, 42, 7);
      store.set_rules_fingerprint("fp1".to_string());
      store.save().unwrap();

      let loaded = MetaStore::load_from(path).unwrap();
      assert!(loaded.existed());
      assert_eq!(loaded.get_hash(Path::new("src/lib.rs")), Some(hash));
      assert_eq!(loaded.rules_fingerprint(), Some("fp1"));
   }

   #[test]
   fn remove_clears_entry() {
      let tmp = TempDir::new().unwrap();
      let mut store = MetaStore::load_from(tmp.path().join("meta.json")).unwrap();
      store.set_meta(PathBuf::from("a.rs"), FileHash::sum(b"a"), 1, 1);
      store.remove(Path::new("a.rs"));
      assert_eq!(store.get_hash(Path::new("a.rs")), None);
   }

   #[test]
   fn record_index_marks_dirty_and_persists() {
      let tmp = TempDir::new().unwrap();
      let path = tmp.path().join("meta.json");

      let mut store = MetaStore::load_from(path.clone()).unwrap();
      store.record_index("completed", 12);
      store.save().unwrap();

      let loaded = MetaStore::load_from(path).unwrap();
      assert_eq!(loaded.last_index_result(), Some("completed"));
      assert!(loaded.last_index_at().is_some());
   }
}
