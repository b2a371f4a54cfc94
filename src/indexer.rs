//! One index pass over a project's eligible files.

use std::{
   collections::HashSet,
   path::{Path, PathBuf},
   sync::Arc,
   time::Instant,
};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::{
   Result,
   backends::{SymbolExtractor, VectorBackend},
   config,
   error::Error,
   exclude::ExclusionEngine,
   meta::{FileHash, MetaStore},
   project::Project,
   store::{FileRecord, IndexStore},
};

/// Who asked for an index pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
   Manual,
   Watch,
   Startup,
}

/// Result summary of one index pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexSummary {
   pub processed:    usize,
   pub indexed:      usize,
   pub skipped:      usize,
   pub deleted:      usize,
   /// Whether persisted storage was rebuilt from scratch (forced mode,
   /// changed ignore rules, or first-time indexing).
   pub full_rebuild: bool,
   pub duration_ms:  u64,
}

/// Gets file modification time as Unix seconds
async fn get_mtime(path: &Path) -> u64 {
   let Ok(metadata) = tokio::fs::metadata(path).await else {
      return 0;
   };
   metadata
      .modified()
      .ok()
      .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
      .map_or(0, |d| d.as_secs())
}

/// Runs index passes for one project.
///
/// The eligible file set comes from the exclusion engine; fingerprints from
/// the meta registry decide the minimal changed subset in incremental mode.
/// Cancellation is checked after each file unit of work, so a cancelled pass
/// leaves storage and fingerprints mutually consistent.
pub struct Indexer {
   project:   Project,
   meta_path: PathBuf,
   engine:    Arc<ExclusionEngine>,
   store:     Arc<dyn IndexStore>,
   symbols:   Arc<dyn SymbolExtractor>,
   vectors:   Arc<dyn VectorBackend>,
}

impl Indexer {
   pub fn new(
      project: Project,
      meta_path: PathBuf,
      engine: Arc<ExclusionEngine>,
      store: Arc<dyn IndexStore>,
      symbols: Arc<dyn SymbolExtractor>,
      vectors: Arc<dyn VectorBackend>,
   ) -> Self {
      Self { project, meta_path, engine, store, symbols, vectors }
   }

   /// Performs one pass. `force` treats every eligible file as changed and
   /// rebuilds storage; otherwise only the fingerprint delta is processed.
   pub async fn run(&self, force: bool, token: &CancellationToken) -> Result<IndexSummary> {
      const SAVE_INTERVAL: usize = 25;

      let started = Instant::now();
      let root = &self.project.workspace_path;
      if !root.is_dir() {
         return Err(Error::WorkspaceUnavailable(root.clone()));
      }

      let mut meta = MetaStore::load_from(self.meta_path.clone())?;

      let rules_fingerprint = self.engine.rules_fingerprint();
      let rules_changed = meta
         .rules_fingerprint()
         .is_some_and(|fp| fp != rules_fingerprint);
      let first_time = !meta.existed() || self.store.is_empty().await?;

      // Storage is cleared only when a full rebuild is actually required;
      // clearing it on an ordinary incremental pass would throw away valid
      // records and force needless rework.
      let full_rebuild = force || rules_changed || first_time;
      if full_rebuild {
         self.store.clear().await?;
         self.vectors.clear().await?;
         meta.clear();
      }
      meta.set_rules_fingerprint(rules_fingerprint);

      let files = self.eligible_files();
      let file_set: HashSet<&PathBuf> = files.iter().map(|(_, rel)| rel).collect();

      let deleted_paths: Vec<PathBuf> = meta
         .all_paths()
         .filter(|p| !file_set.contains(p))
         .cloned()
         .collect();

      if !deleted_paths.is_empty() {
         self.store.delete_files(&deleted_paths).await?;
         if let Err(e) = self.vectors.remove_files(&deleted_paths).await {
            tracing::warn!("vector backend failed to drop deleted files: {e}");
         }
         for path in &deleted_paths {
            meta.remove(path);
         }
      }

      let mut summary = IndexSummary {
         deleted: deleted_paths.len(),
         full_rebuild,
         ..IndexSummary::default()
      };
      let mut since_save = 0usize;

      for (abs_path, rel_path) in files {
         // Safe checkpoint between file units of work.
         if token.is_cancelled() {
            self.store.flush().await?;
            meta.record_index("cancelled", started.elapsed().as_millis() as u64);
            meta.save()?;
            return Err(Error::IndexCancelled);
         }

         summary.processed += 1;

         let mtime = get_mtime(&abs_path).await;
         let size = tokio::fs::metadata(&abs_path).await.map_or(0, |m| m.len());

         if !force
            && let Some(stored) = meta.get_meta(&rel_path)
            && stored.mtime == mtime
            && stored.size == size
         {
            summary.skipped += 1;
            continue;
         }

         let content = match tokio::fs::read(&abs_path).await {
            Ok(c) => c,
            Err(e) => {
               tracing::warn!("failed to read {}: {}", abs_path.display(), e);
               continue;
            },
         };

         let hash = FileHash::sum(&content);

         // Content unchanged but mtime differs; refresh the stored signature
         // so future passes can skip the file without hashing it again.
         if !force && meta.get_hash(&rel_path) == Some(hash) {
            summary.skipped += 1;
            meta.set_meta(rel_path, hash, mtime, size);
            since_save += 1;
            if since_save >= SAVE_INTERVAL {
               meta.save()?;
               since_save = 0;
            }
            continue;
         }

         let text = String::from_utf8_lossy(&content);
         let symbols = self.symbols.extract(&rel_path, &text);

         self
            .store
            .upsert_file(FileRecord {
               path: rel_path.clone(),
               hash: hash.to_string(),
               symbols,
            })
            .await?;

         if let Err(e) = self.vectors.index_file(&rel_path, &text).await {
            tracing::warn!("vector backend failed for {}: {}", rel_path.display(), e);
         }

         meta.set_meta(rel_path, hash, mtime, size);
         summary.indexed += 1;
         since_save += 1;

         if since_save >= SAVE_INTERVAL {
            self.store.flush().await?;
            meta.save()?;
            since_save = 0;
         }
      }

      self.store.flush().await?;
      summary.duration_ms = started.elapsed().as_millis() as u64;
      meta.record_index("completed", summary.duration_ms);
      meta.save()?;

      Ok(summary)
   }

   /// Walks the workspace and returns every eligible file as
   /// `(absolute, workspace-relative)`, sorted for deterministic processing.
   ///
   /// Excluded directories are pruned without descending; hidden files and
   /// oversized files are skipped.
   fn eligible_files(&self) -> Vec<(PathBuf, PathBuf)> {
      let root = &self.project.workspace_path;
      let max_size = config::get().effective_max_file_size_bytes();
      let engine = Arc::clone(&self.engine);

      let mut files: Vec<(PathBuf, PathBuf)> = WalkDir::new(root)
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
         .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?.to_path_buf();
            Some((e.path().to_path_buf(), rel))
         })
         .collect();

      files.sort_by(|a, b| a.1.cmp(&b.1));
      files
   }
}
