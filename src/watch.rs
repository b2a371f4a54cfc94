//! Debounced file watching.
//!
//! Wraps the notify debouncer so the rest of the daemon only ever sees
//! already-batched change sets: rapid edit bursts collapse into one delivery
//! after a quiet period, keeping the indexing queue free of timing concerns.

use std::{path::PathBuf, time::Duration};

use notify_debouncer_mini::{
   DebounceEventResult, Debouncer, new_debouncer, notify::RecommendedWatcher,
   notify::RecursiveMode,
};

use crate::Result;

/// Watches a workspace recursively and delivers debounced change batches.
///
/// Dropping the watcher stops delivery.
pub struct FileWatcher {
   _debouncer: Debouncer<RecommendedWatcher>,
}

impl FileWatcher {
   /// Starts watching `root`. `on_batch` receives each debounced batch of
   /// changed absolute paths on the watcher's thread; keep it cheap and hand
   /// off to a channel.
   pub fn new<F>(root: PathBuf, debounce: Duration, on_batch: F) -> Result<Self>
   where
      F: Fn(Vec<PathBuf>) + Send + 'static,
   {
      let mut debouncer = new_debouncer(debounce, move |result: DebounceEventResult| {
         match result {
            Ok(events) => {
               let mut paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
               paths.sort();
               paths.dedup();
               if !paths.is_empty() {
                  on_batch(paths);
               }
            },
            Err(e) => {
               tracing::warn!("file watcher error: {e:?}");
            },
         }
      })?;

      debouncer.watcher().watch(&root, RecursiveMode::Recursive)?;
      tracing::debug!("watching {} (debounce {:?})", root.display(), debounce);

      Ok(Self { _debouncer: debouncer })
   }
}

#[cfg(test)]
mod tests {
   use std::{
      fs,
      sync::mpsc,
      time::{Duration, Instant},
   };

   use tempfile::TempDir;

   use super::*;

   #[test]
   fn burst_of_edits_arrives_as_one_batch() {
      let tmp = TempDir::new().unwrap();
      let root = tmp.path().canonicalize().unwrap();
      let (tx, rx) = mpsc::channel();

      let _watcher = FileWatcher::new(root.clone(), Duration::from_millis(100), move |batch| {
         let _ = tx.send(batch);
      })
      .unwrap();

      // Give the backend a moment to arm before generating events.
      std::thread::sleep(Duration::from_millis(200));

      for i in 0..5 {
         fs::write(root.join(format!("f{i}.txt")), "x").unwrap();
      }

      let deadline = Instant::now() + Duration::from_secs(5);
      let mut seen = std::collections::HashSet::new();
      while Instant::now() < deadline && seen.len() < 5 {
         if let Ok(batch) = rx.recv_timeout(Duration::from_millis(250)) {
            for path in batch {
               if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                  if name.starts_with('f') {
                     seen.insert(name.to_string());
                  }
               }
            }
         }
      }

      assert_eq!(seen.len(), 5, "all edited files should be reported");
   }
}
