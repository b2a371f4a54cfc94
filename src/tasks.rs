//! Supervision of named background operations.
//!
//! Index runs and other long operations execute as cooperative tokio tasks
//! registered here, so they survive client disconnects and can be polled and
//! cancelled later — by the client that started them or by any other client.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Result, error::Error};

/// What a supervised task is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
   Index,
   Init,
}

/// Lifecycle state of a supervised task. Terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
   Queued,
   Running,
   Completed,
   Failed,
   Cancelled,
}

impl TaskState {
   pub const fn is_terminal(self) -> bool {
      matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
   }
}

/// Snapshot of one task for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusInfo {
   pub id:          String,
   pub kind:        TaskKind,
   pub state:       TaskState,
   pub started_at:  String,
   pub finished_at: Option<String>,
   pub error:       Option<String>,
}

struct TaskEntry {
   info:  TaskStatusInfo,
   token: CancellationToken,
}

/// Registry of supervised tasks for one project's daemon.
pub struct TaskSupervisor {
   tasks: Mutex<HashMap<String, TaskEntry>>,
}

impl TaskSupervisor {
   pub fn new() -> Arc<Self> {
      Arc::new(Self { tasks: Mutex::new(HashMap::new()) })
   }

   /// Begins cooperative execution of `work` immediately and returns its id
   /// without blocking.
   ///
   /// The work future receives a [`CancellationToken`]; it is expected to
   /// check it at safe checkpoints and return [`Error::IndexCancelled`] when
   /// it observes a request, which moves the task to `cancelled`. Any other
   /// error moves it to `failed` with the message retained.
   pub fn spawn<F, Fut>(self: &Arc<Self>, kind: TaskKind, work: F) -> String
   where
      F: FnOnce(CancellationToken) -> Fut,
      Fut: Future<Output = Result<()>> + Send + 'static,
   {
      let id = Uuid::new_v4().to_string();
      let token = CancellationToken::new();
      let now = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

      {
         let mut tasks = self.tasks.lock();
         tasks.insert(id.clone(), TaskEntry {
            info:  TaskStatusInfo {
               id: id.clone(),
               kind,
               state: TaskState::Queued,
               started_at: now,
               finished_at: None,
               error: None,
            },
            token: token.clone(),
         });
      }

      let fut = work(token.clone());
      let supervisor = Arc::clone(self);
      let task_id = id.clone();
      tokio::spawn(async move {
         supervisor.transition(&task_id, TaskState::Running, None);
         let outcome = fut.await;
         match outcome {
            Ok(()) => supervisor.transition(&task_id, TaskState::Completed, None),
            Err(Error::IndexCancelled) => {
               supervisor.transition(&task_id, TaskState::Cancelled, None);
            },
            Err(e) => supervisor.transition(&task_id, TaskState::Failed, Some(e.to_string())),
         }
      });

      id
   }

   /// Status of one task, or of every non-terminal task when `id` is `None`.
   pub fn status(&self, id: Option<&str>) -> Vec<TaskStatusInfo> {
      let tasks = self.tasks.lock();
      match id {
         Some(id) => tasks.get(id).map(|e| e.info.clone()).into_iter().collect(),
         None => {
            let mut list: Vec<TaskStatusInfo> = tasks
               .values()
               .filter(|e| !e.info.state.is_terminal())
               .map(|e| e.info.clone())
               .collect();
            list.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
            list
         },
      }
   }

   /// Requests cooperative cancellation of one task, or of every non-terminal
   /// task when `id` is `None`. Returns how many tasks were signalled.
   ///
   /// Cancellation is advisory: the task transitions to `cancelled` only once
   /// it reaches a safe checkpoint, never by abrupt termination.
   pub fn cancel(&self, id: Option<&str>) -> usize {
      let tasks = self.tasks.lock();
      let mut signalled = 0;
      for entry in tasks.values() {
         if entry.info.state.is_terminal() {
            continue;
         }
         if id.is_none_or(|id| id == entry.info.id) {
            entry.token.cancel();
            signalled += 1;
         }
      }
      signalled
   }

   /// Whether any non-terminal task of the given kind exists.
   pub fn has_active(&self, kind: TaskKind) -> bool {
      self
         .tasks
         .lock()
         .values()
         .any(|e| e.info.kind == kind && !e.info.state.is_terminal())
   }

   fn transition(&self, id: &str, state: TaskState, error: Option<String>) {
      let mut tasks = self.tasks.lock();
      let Some(entry) = tasks.get_mut(id) else {
         return;
      };

      // Terminal states are immutable; a late transition (e.g. a completion
      // racing a cancellation that already landed) is dropped.
      if entry.info.state.is_terminal() {
         return;
      }
      if state == TaskState::Running && entry.info.state != TaskState::Queued {
         return;
      }

      entry.info.state = state;
      entry.info.error = error;
      if state.is_terminal() {
         entry.info.finished_at =
            Some(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
      }
   }
}
