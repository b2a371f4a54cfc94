//! Long-running daemon server for one project.
//!
//! Owns the project's socket endpoint, dispatches protocol commands to the
//! indexing queue, task supervisor, search dispatcher, and exclusion engine,
//! and shuts down cleanly: `Listening → Draining → Stopped`, letting
//! in-flight commands finish while refusing new connections.

use std::{
   path::{Path, PathBuf},
   sync::{
      Arc,
      atomic::{AtomicU64, AtomicUsize, Ordering},
   },
   time::{Duration, Instant},
};

use console::style;
use tokio::{
   signal,
   sync::{mpsc, watch},
   time,
};

use crate::{
   Result,
   backends::{NullSymbolExtractor, NullVectorBackend, RegexSearchBackend},
   config,
   error::Error,
   exclude::ExclusionEngine,
   indexer::IndexSource,
   ipc::{
      self, DaemonStatus, ExclusionReport, IndexReport, RejectedLine, Request, Response,
      ResponseData, RuleFileReport, SearchReport,
   },
   project::Project,
   queue::IndexQueue,
   search::SearchDispatcher,
   store::{DataDirLock, IndexStore, JsonlIndexStore},
   tasks::{TaskKind, TaskSupervisor},
   usock,
   watch::FileWatcher,
};

/// Daemon lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
   NotStarted,
   Listening,
   Draining,
   Stopped,
}

/// How long draining waits for in-flight commands before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

struct Daemon {
   project:       Project,
   engine:        Arc<ExclusionEngine>,
   queue:         Arc<IndexQueue>,
   supervisor:    Arc<TaskSupervisor>,
   search:        SearchDispatcher,
   store:         Arc<dyn IndexStore>,
   state:         watch::Sender<DaemonState>,
   connections:   AtomicUsize,
   launch_time:   Instant,
   last_activity: AtomicU64,
}

struct PidFileGuard {
   project_id: String,
}

impl Drop for PidFileGuard {
   fn drop(&mut self) {
      usock::remove_pid(&self.project_id);
   }
}

struct ConnectionGuard(Arc<Daemon>);

impl Drop for ConnectionGuard {
   fn drop(&mut self) {
      self.0.connections.fetch_sub(1, Ordering::SeqCst);
   }
}

impl Daemon {
   fn clock(&self) -> u64 {
      self.launch_time.elapsed().as_millis() as u64
   }

   fn touch(&self) {
      self.last_activity.fetch_max(self.clock(), Ordering::Relaxed);
   }

   fn idle_duration(&self) -> Duration {
      let elapsed = self
         .clock()
         .saturating_sub(self.last_activity.load(Ordering::Relaxed));
      Duration::from_millis(elapsed)
   }

   fn indexing(&self) -> bool {
      self.supervisor.has_active(TaskKind::Index)
   }

   fn begin_drain(&self) {
      let _ = self.state.send_if_modified(|state| {
         if *state == DaemonState::Listening {
            *state = DaemonState::Draining;
            true
         } else {
            false
         }
      });
   }
}

/// Runs the daemon for a workspace until it is stopped or idles out.
pub async fn run(workspace: Option<PathBuf>) -> Result<()> {
   let cwd = std::env::current_dir()?;
   let workspace = workspace.unwrap_or(cwd);
   let project = Project::resolve(&workspace)?;

   let cfg = config::init_for_root(&project.workspace_path);
   config::validate_repo_config(cfg)?;

   // Binding is the mutual exclusion between daemons: a second daemon for
   // the same project must fail fast here instead of double-indexing.
   let listener = usock::Listener::bind(&project.project_id).await?;

   usock::write_pid(&project.project_id);
   let _pid_guard = PidFileGuard { project_id: project.project_id.clone() };
   let _data_lock = DataDirLock::acquire(&project.data_dir())?;

   println!("{}", style("Starting cindex daemon...").green().bold());
   println!("Listening: {}", style(listener.local_addr()).cyan());
   println!("Project: {}", style(&project.display_name).dim());
   println!("Project ID: {}", style(&project.project_id).cyan());

   let engine = Arc::new(ExclusionEngine::new(&project.workspace_path)?);
   let store: Arc<dyn IndexStore> = Arc::new(JsonlIndexStore::open(&project.data_dir())?);
   let supervisor = TaskSupervisor::new();

   let queue = Arc::new(IndexQueue::new(
      project.clone(),
      project.meta_path(),
      Arc::clone(&engine),
      Arc::clone(&store),
      Arc::new(NullSymbolExtractor),
      Arc::new(NullVectorBackend),
      Arc::clone(&supervisor),
   ));

   let search = SearchDispatcher::new(
      project.clone(),
      Arc::clone(&engine),
      Arc::new(RegexSearchBackend),
   );

   let (state_tx, state_rx) = watch::channel(DaemonState::NotStarted);

   let daemon = Arc::new(Daemon {
      project,
      engine,
      queue,
      supervisor,
      search,
      store,
      state: state_tx,
      connections: AtomicUsize::new(0),
      launch_time: Instant::now(),
      last_activity: AtomicU64::new(0),
   });

   if !cfg.skip_startup_index {
      let _ = daemon.queue.request(IndexSource::Startup, false);
   }

   let _watcher = start_watcher(&daemon, cfg.watch_debounce_ms)?;
   start_idle_monitor(&daemon, cfg.idle_timeout_secs, cfg.idle_check_interval_secs);

   let _ = daemon.state.send(DaemonState::Listening);
   println!("\n{}", style("Daemon listening").green());
   println!("{}", style("Press Ctrl+C to stop").dim());

   let accept_daemon = Arc::clone(&daemon);
   let mut accept_state = state_rx.clone();
   let accept_handle = tokio::spawn(async move {
      loop {
         tokio::select! {
            result = listener.accept() => {
               match result {
                  Ok(stream) => {
                     let client_daemon = Arc::clone(&accept_daemon);
                     client_daemon.connections.fetch_add(1, Ordering::SeqCst);
                     tokio::spawn(async move { handle_client(client_daemon, stream).await });
                  }
                  Err(e) => {
                     tracing::error!("accept error: {e}");
                  }
               }
            }
            _ = accept_state.changed() => {
               if *accept_state.borrow() != DaemonState::Listening {
                  break;
               }
            }
         }
      }
      // Dropping the listener unlinks the socket, so no new client can
      // connect while in-flight commands drain.
      drop(listener);
   });

   let mut shutdown_state = state_rx.clone();
   tokio::select! {
      _ = signal::ctrl_c() => {
         println!("\n{}", style("Shutting down...").yellow());
         daemon.begin_drain();
      }
      () = async {
         loop {
            if *shutdown_state.borrow() == DaemonState::Draining {
               break;
            }
            if shutdown_state.changed().await.is_err() {
               break;
            }
         }
      } => {}
   }

   let _ = accept_handle.await;

   let drain_deadline = Instant::now() + DRAIN_TIMEOUT;
   while daemon.connections.load(Ordering::SeqCst) > 0 && Instant::now() < drain_deadline {
      time::sleep(Duration::from_millis(50)).await;
   }

   let _ = daemon.store.flush().await;
   let _ = daemon.state.send(DaemonState::Stopped);
   usock::remove_socket(&daemon.project.project_id);

   println!("{}", style("Daemon stopped").green());
   Ok(())
}

/// Bridges debounced watcher batches into the daemon.
///
/// For each batch, exclusion-engine invalidation runs to completion before
/// the queue's dirty set is updated and a reindex is requested, so a
/// just-changed rule file is always reflected in the pass it triggers.
fn start_watcher(daemon: &Arc<Daemon>, debounce_ms: u64) -> Result<FileWatcher> {
   let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();

   let watcher = FileWatcher::new(
      daemon.project.workspace_path.clone(),
      Duration::from_millis(debounce_ms),
      move |batch| {
         let _ = tx.send(batch);
      },
   )?;

   let daemon = Arc::clone(daemon);
   tokio::spawn(async move {
      while let Some(batch) = rx.recv().await {
         daemon.touch();

         let mut rules_changed = false;
         for path in &batch {
            match daemon.engine.handle_event(path) {
               Ok(was_rule_file) => rules_changed |= was_rule_file,
               Err(e) => {
                  tracing::warn!("rule reload failed for {}: {}", path.display(), e);
               },
            }
         }

         daemon.queue.note_changes(batch);
         let (_task, coalesced, _rx) = daemon.queue.request(IndexSource::Watch, false);
         tracing::debug!(
            "change batch handled (rules_changed {rules_changed}, coalesced {coalesced})"
         );
      }
   });

   Ok(watcher)
}

fn start_idle_monitor(daemon: &Arc<Daemon>, timeout_secs: u64, check_interval_secs: u64) {
   let daemon = Arc::clone(daemon);
   let idle_timeout = Duration::from_secs(timeout_secs);
   let check_interval = Duration::from_secs(check_interval_secs.max(1));

   tokio::spawn(async move {
      loop {
         time::sleep(check_interval).await;
         if *daemon.state.borrow() != DaemonState::Listening {
            break;
         }
         if daemon.indexing() {
            continue;
         }
         if daemon.idle_duration() > idle_timeout {
            println!("{}", style("Idle timeout reached, shutting down...").yellow());
            daemon.begin_drain();
            break;
         }
      }
   });
}

async fn handle_client(daemon: Arc<Daemon>, mut stream: usock::Stream) {
   let _guard = ConnectionGuard(Arc::clone(&daemon));
   daemon.touch();

   let max_request = config::get().effective_max_request_bytes();
   let mut buffer = ipc::SocketBuffer::new();
   let mut shutting_down = false;

   loop {
      let request: Request = match buffer.recv_with_limit(&mut stream, max_request).await {
         Ok(req) => req,
         Err(e) => {
            // Clean disconnect reads as an unexpected-EOF error; anything
            // else is worth a debug line.
            tracing::debug!("client read ended: {e}");
            break;
         },
      };

      daemon.touch();

      let response = match request.command.as_str() {
         "shutdown" => {
            shutting_down = true;
            Response::ok_message("draining")
         },
         _ => dispatch(&daemon, &request).await,
      };

      if let Err(e) = buffer.send(&mut stream, &response).await {
         tracing::debug!("client write error: {e}");
         break;
      }

      if shutting_down {
         daemon.begin_drain();
         break;
      }
   }
}

/// Maps one command to the component that owns it. Malformed input produces
/// a structured error response, never a failure of the connection.
async fn dispatch(daemon: &Arc<Daemon>, request: &Request) -> Response {
   match request.command.as_str() {
      "hello" => handle_hello(daemon, &request.args),
      "ping" => Response::ok_message("pong"),
      "index" => handle_index(daemon, &request.args).await,
      "status" => handle_status(daemon).await,
      "tasks" => {
         let id = request.args.first().map(String::as_str);
         Response::ok_data(ResponseData::Tasks(daemon.supervisor.status(id)))
      },
      "cancel" => {
         let id = request.args.first().map(String::as_str);
         let signalled = daemon.supervisor.cancel(id);
         if id.is_some() && signalled == 0 {
            Response::error("not_found", "no such non-terminal task")
         } else {
            Response::ok_message(format!("{signalled} task(s) signalled"))
         }
      },
      "search" => handle_search(daemon, &request.args).await,
      "exclusions" => handle_exclusions(daemon, &request.args),
      "rules" => handle_rules(daemon),
      "" => Response::error("malformed", "empty command"),
      other => Response::error("unknown_command", format!("unknown command: {other}")),
   }
}

fn handle_hello(daemon: &Arc<Daemon>, args: &[String]) -> Response {
   let client_versions: Vec<u32> = args
      .first()
      .map(|csv| csv.split(',').filter_map(|v| v.trim().parse().ok()).collect())
      .unwrap_or_else(|| ipc::PROTOCOL_VERSIONS.to_vec());

   match ipc::negotiate_protocol(&client_versions) {
      Some(version) => Response::ok_data(ResponseData::Hello {
         protocol_version:  version,
         protocol_versions: ipc::PROTOCOL_VERSIONS.to_vec(),
         daemon_version:    env!("CARGO_PKG_VERSION").to_string(),
         project_id:        daemon.project.project_id.clone(),
      }),
      None => Response::error("incompatible", "no common protocol version"),
   }
}

async fn handle_index(daemon: &Arc<Daemon>, args: &[String]) -> Response {
   let mut force = false;
   let mut wait = false;
   for arg in args {
      match arg.as_str() {
         "--force" => force = true,
         "--wait" => wait = true,
         other => {
            return Response::error("bad_argument", format!("unknown index argument: {other}"));
         },
      }
   }

   if wait {
      match daemon.queue.request_and_wait(IndexSource::Manual, force).await {
         Ok(summary) => Response::ok_data(ResponseData::Index(IndexReport {
            task_id:   String::new(),
            coalesced: false,
            summary:   Some(summary),
         })),
         Err(e) => error_response(&e),
      }
   } else {
      let (task_id, coalesced, _rx) = daemon.queue.request(IndexSource::Manual, force);
      Response::ok_data(ResponseData::Index(IndexReport { task_id, coalesced, summary: None }))
   }
}

async fn handle_status(daemon: &Arc<Daemon>) -> Response {
   let indexed_files = daemon.store.file_count().await.unwrap_or(0);

   Response::ok_data(ResponseData::Status(DaemonStatus {
      project_id:      daemon.project.project_id.clone(),
      display_name:    daemon.project.display_name.clone(),
      workspace_path:  daemon.project.workspace_path.clone(),
      indexing:        daemon.indexing(),
      indexed_files,
      pending_changes: daemon.queue.pending_changes(),
      uptime_secs:     daemon.launch_time.elapsed().as_secs(),
      inflight:        daemon.queue.current(),
      tasks:           daemon.supervisor.status(None),
   }))
}

async fn handle_search(daemon: &Arc<Daemon>, args: &[String]) -> Response {
   let mut pattern: Option<&str> = None;
   let mut scope: Option<PathBuf> = None;
   let mut limit = config::get().max_search_results;

   let mut iter = args.iter();
   while let Some(arg) = iter.next() {
      match arg.as_str() {
         "--scope" => match iter.next() {
            Some(value) => scope = Some(PathBuf::from(value)),
            None => return Response::error("bad_argument", "--scope requires a path"),
         },
         "--limit" => match iter.next().and_then(|v| v.parse().ok()) {
            Some(value) => limit = value,
            None => return Response::error("bad_argument", "--limit requires a number"),
         },
         value if pattern.is_none() => pattern = Some(value),
         other => {
            return Response::error("bad_argument", format!("unexpected argument: {other}"));
         },
      }
   }

   let Some(pattern) = pattern else {
      return Response::error("bad_argument", "search requires a pattern");
   };

   match daemon.search.search(pattern, scope.as_deref(), limit).await {
      Ok((matches, truncated)) => Response::ok_data(ResponseData::Search(SearchReport {
         matches,
         indexing: daemon.indexing(),
         truncated,
      })),
      Err(e) => error_response(&e),
   }
}

fn handle_exclusions(daemon: &Arc<Daemon>, args: &[String]) -> Response {
   let Some(raw_path) = args.first() else {
      return Response::error("bad_argument", "exclusions requires a path");
   };

   let path = Path::new(raw_path);
   let decision = daemon.engine.decide(path);
   let absolute = if path.is_absolute() {
      path.to_path_buf()
   } else {
      daemon.project.workspace_path.join(path)
   };

   Response::ok_data(ResponseData::Exclusion(ExclusionReport {
      path:    absolute,
      ignored: decision.ignored,
      source:  decision.source.map(|s| s.as_ref().clone()),
      pattern: decision.pattern,
   }))
}

fn handle_rules(daemon: &Arc<Daemon>) -> Response {
   let reports: Vec<RuleFileReport> = daemon
      .engine
      .rule_files()
      .iter()
      .map(|file| RuleFileReport {
         path:     file.path.clone(),
         depth:    file.depth,
         valid:    file.stats.valid,
         comments: file.stats.comments,
         blanks:   file.stats.blanks,
         warnings: file.stats.warnings,
         rejected: file
            .rejected
            .iter()
            .map(|r| RejectedLine { line: r.line, raw: r.raw.clone(), reason: r.reason.clone() })
            .collect(),
      })
      .collect();

   Response::ok_data(ResponseData::Rules(reports))
}

/// Maps component errors to stable wire codes.
fn error_response(error: &Error) -> Response {
   let inner: &Error = match error {
      Error::Shared(shared) => shared.as_ref(),
      other => other,
   };

   let code = match inner {
      Error::IndexFailed(_) => "index_failed",
      Error::IndexCancelled => "cancelled",
      Error::WorkspaceUnavailable(_) => "workspace_unavailable",
      Error::Regex(_) => "bad_pattern",
      Error::Server { .. } => "bad_argument",
      _ => "internal",
   };

   Response::error(code, inner.to_string())
}
