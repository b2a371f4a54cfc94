//! Single-flight indexing queue.
//!
//! All index passes for a project start here and nowhere else. A request
//! arriving while a pass is pending or running never spawns a second pass:
//! it coalesces onto the in-flight one and shares its outcome, success or
//! failure alike. A forced request may upgrade a pass that is still queued,
//! but never interrupts one that is already running.

use std::{
   collections::HashSet,
   path::PathBuf,
   sync::Arc,
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{
   Result,
   backends::{SymbolExtractor, VectorBackend},
   error::Error,
   exclude::ExclusionEngine,
   indexer::{IndexSource, IndexSummary, Indexer},
   project::Project,
   store::IndexStore,
   tasks::{TaskKind, TaskSupervisor},
};

/// Shared outcome of one index pass.
pub type IndexOutcome = Result<IndexSummary, Arc<Error>>;

/// Snapshot of the in-flight pass for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InflightInfo {
   pub task_id: String,
   pub source:  IndexSource,
   pub force:   bool,
   pub running: bool,
}

struct RunFlags {
   force:   bool,
   started: bool,
}

struct Inflight {
   task_id: String,
   source:  IndexSource,
   flags:   Arc<Mutex<RunFlags>>,
   rx:      watch::Receiver<Option<IndexOutcome>>,
}

impl Inflight {
   fn done(&self) -> bool {
      self.rx.borrow().is_some()
   }
}

/// Accepts index requests for one project and serializes their execution.
pub struct IndexQueue {
   project:    Project,
   meta_path:  PathBuf,
   engine:     Arc<ExclusionEngine>,
   store:      Arc<dyn IndexStore>,
   symbols:    Arc<dyn SymbolExtractor>,
   vectors:    Arc<dyn VectorBackend>,
   supervisor: Arc<TaskSupervisor>,
   inflight:   Mutex<Option<Inflight>>,
   dirty:      Mutex<HashSet<PathBuf>>,
}

impl IndexQueue {
   #[allow(clippy::too_many_arguments, reason = "constructor wires every collaborator once")]
   pub fn new(
      project: Project,
      meta_path: PathBuf,
      engine: Arc<ExclusionEngine>,
      store: Arc<dyn IndexStore>,
      symbols: Arc<dyn SymbolExtractor>,
      vectors: Arc<dyn VectorBackend>,
      supervisor: Arc<TaskSupervisor>,
   ) -> Self {
      Self {
         project,
         meta_path,
         engine,
         store,
         symbols,
         vectors,
         supervisor,
         inflight: Mutex::new(None),
         dirty: Mutex::new(HashSet::new()),
      }
   }

   /// Records an already-debounced batch of changed paths.
   ///
   /// Callers must have completed exclusion-cache invalidation for the batch
   /// before calling this, so no stale decision can leak into the reindex
   /// the batch triggers.
   pub fn note_changes<I: IntoIterator<Item = PathBuf>>(&self, paths: I) {
      let mut dirty = self.dirty.lock();
      dirty.extend(paths);
   }

   /// Number of changed paths awaiting the next pass.
   pub fn pending_changes(&self) -> usize {
      self.dirty.lock().len()
   }

   /// Snapshot of the in-flight pass, if any.
   pub fn current(&self) -> Option<InflightInfo> {
      let slot = self.inflight.lock();
      slot.as_ref().filter(|i| !i.done()).map(|i| {
         let flags = i.flags.lock();
         InflightInfo {
            task_id: i.task_id.clone(),
            source:  i.source,
            force:   flags.force,
            running: flags.started,
         }
      })
   }

   /// Submits an index request.
   ///
   /// Returns the task id, whether the request coalesced onto an existing
   /// pass, and a receiver resolving to the shared outcome.
   pub fn request(
      &self,
      source: IndexSource,
      force: bool,
   ) -> (String, bool, watch::Receiver<Option<IndexOutcome>>) {
      let mut slot = self.inflight.lock();

      if let Some(inflight) = slot.as_ref()
         && !inflight.done()
      {
         if force {
            let mut flags = inflight.flags.lock();
            if !flags.started && !flags.force {
               tracing::debug!("upgrading queued index run to forced");
               flags.force = true;
            }
         }
         return (inflight.task_id.clone(), true, inflight.rx.clone());
      }

      let (tx, rx) = watch::channel(None);
      let flags = Arc::new(Mutex::new(RunFlags { force, started: false }));

      let indexer = Indexer::new(
         self.project.clone(),
         self.meta_path.clone(),
         Arc::clone(&self.engine),
         Arc::clone(&self.store),
         Arc::clone(&self.symbols),
         Arc::clone(&self.vectors),
      );

      let run_flags = Arc::clone(&flags);

      // The pass consumes the dirty set accumulated so far; changes arriving
      // after this point belong to the next pass. The fingerprint diff inside
      // the pass covers the batch, so the set itself is only bookkeeping.
      self.dirty.lock().clear();

      let task_id = self.supervisor.spawn(TaskKind::Index, move |token| async move {
         let force = {
            let mut f = run_flags.lock();
            f.started = true;
            f.force
         };

         let outcome: IndexOutcome = indexer.run(force, &token).await.map_err(Arc::new);

         let result = match &outcome {
            Ok(summary) => {
               tracing::info!(
                  "index pass finished: {} indexed, {} skipped, {} deleted{}",
                  summary.indexed,
                  summary.skipped,
                  summary.deleted,
                  if summary.full_rebuild { " (full rebuild)" } else { "" }
               );
               Ok(())
            },
            Err(e) if matches!(e.as_ref(), Error::IndexCancelled) => Err(Error::IndexCancelled),
            Err(e) => Err(Error::IndexFailed(e.to_string())),
         };

         let _ = tx.send(Some(outcome));
         result
      });

      tracing::debug!("queued index pass {task_id} (source {source:?}, force {force})");
      *slot = Some(Inflight { task_id: task_id.clone(), source, flags, rx: rx.clone() });
      (task_id, false, rx)
   }

   /// Submits a request and waits for the (possibly shared) outcome.
   pub async fn request_and_wait(&self, source: IndexSource, force: bool) -> Result<IndexSummary> {
      let (_task_id, _coalesced, mut rx) = self.request(source, force);

      loop {
         let current = rx.borrow_and_update().clone();
         if let Some(outcome) = current {
            return outcome.map_err(Error::from);
         }
         if rx.changed().await.is_err() {
            return Err(Error::Server {
               op:     "index",
               reason: "index task dropped without reporting an outcome".to_string(),
            });
         }
      }
   }
}
