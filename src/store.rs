//! Persisted index storage owned by the daemon.
//!
//! The heavy search backends (vectors, symbols) are external collaborators;
//! what the daemon itself owns is the record of what has been indexed, stored
//! as JSON lines inside the project's exclusive data directory. The indexing
//! queue's contract — never clear storage unless a full rebuild is actually
//! required — is enforced against this trait.

use std::{
   collections::HashMap,
   fs,
   io::Write,
   path::{Path, PathBuf},
};

use async_trait::async_trait;
use fs4::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{Result, backends::SymbolRecord, error::Error};

const INDEX_FILE: &str = "index.jsonl";
const LOCK_FILE: &str = "writer.lock";

/// One indexed file's stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
   /// Workspace-relative path.
   pub path:    PathBuf,
   /// Hex content hash at index time.
   pub hash:    String,
   pub symbols: Vec<SymbolRecord>,
}

/// Persisted index storage for one project.
#[async_trait]
pub trait IndexStore: Send + Sync {
   async fn upsert_file(&self, record: FileRecord) -> Result<()>;
   async fn delete_files(&self, paths: &[PathBuf]) -> Result<()>;
   /// Deletes every record. Only the indexer's full-rebuild path calls this.
   async fn clear(&self) -> Result<()>;
   async fn is_empty(&self) -> Result<bool>;
   async fn file_count(&self) -> Result<usize>;
   /// Persists buffered mutations to disk.
   async fn flush(&self) -> Result<()>;
}

/// JSON-lines implementation of [`IndexStore`] living in the project data
/// directory.
pub struct JsonlIndexStore {
   path:    PathBuf,
   records: Mutex<HashMap<PathBuf, FileRecord>>,
}

impl JsonlIndexStore {
   /// Opens (or creates) the store inside `data_dir`.
   pub fn open(data_dir: &Path) -> Result<Self> {
      fs::create_dir_all(data_dir)?;
      let path = data_dir.join(INDEX_FILE);

      let mut records = HashMap::new();
      if path.exists() {
         let content = fs::read_to_string(&path)?;
         for line in content.lines() {
            if line.trim().is_empty() {
               continue;
            }
            match serde_json::from_str::<FileRecord>(line) {
               Ok(record) => {
                  records.insert(record.path.clone(), record);
               },
               Err(e) => {
                  tracing::warn!("skipping corrupt index record: {e}");
               },
            }
         }
      }

      Ok(Self { path, records: Mutex::new(records) })
   }

   fn write_all(&self) -> Result<()> {
      let records = self.records.lock();
      let mut entries: Vec<&FileRecord> = records.values().collect();
      entries.sort_by(|a, b| a.path.cmp(&b.path));

      let tmp = self.path.with_extension("jsonl.tmp");
      let mut out = fs::File::create(&tmp)?;
      for record in entries {
         serde_json::to_writer(&mut out, record)?;
         out.write_all(b"\n")?;
      }
      out.sync_all()?;
      fs::rename(&tmp, &self.path)?;
      Ok(())
   }
}

#[async_trait]
impl IndexStore for JsonlIndexStore {
   async fn upsert_file(&self, record: FileRecord) -> Result<()> {
      self.records.lock().insert(record.path.clone(), record);
      Ok(())
   }

   async fn delete_files(&self, paths: &[PathBuf]) -> Result<()> {
      let mut records = self.records.lock();
      for path in paths {
         records.remove(path);
      }
      Ok(())
   }

   async fn clear(&self) -> Result<()> {
      self.records.lock().clear();
      self.flush().await
   }

   async fn is_empty(&self) -> Result<bool> {
      Ok(self.records.lock().is_empty())
   }

   async fn file_count(&self) -> Result<usize> {
      Ok(self.records.lock().len())
   }

   async fn flush(&self) -> Result<()> {
      self.write_all()
   }
}

/// Exclusive writer lock on a project's data directory.
///
/// The socket bind is the primary mutual-exclusion mechanism between
/// daemons; this lock additionally fails fast if a second writer reaches the
/// same data directory some other way.
pub struct DataDirLock {
   _file: fs::File,
}

impl DataDirLock {
   pub fn acquire(data_dir: &Path) -> Result<Self> {
      fs::create_dir_all(data_dir)?;
      let path = data_dir.join(LOCK_FILE);
      let file = fs::OpenOptions::new()
         .create(true)
         .truncate(false)
         .write(true)
         .open(&path)?;

      file
         .try_lock_exclusive()
         .map_err(|_| Error::DataDirLocked(data_dir.to_path_buf()))?;

      Ok(Self { _file: file })
   }
}
