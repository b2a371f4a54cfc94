//! End-to-end daemon lifecycle over a real socket.
//!
//! Single test function: the whole file shares one isolated HOME so socket,
//! config, and data paths stay inside the temp directory.

use std::{fs, time::Duration};

use cindex::{
   cmd::daemon::roundtrip,
   error::Error,
   ipc::{Request, ResponseData},
   project::Project,
   server,
   usock::{self, SocketError},
};
use tempfile::TempDir;
use tokio::time;

async fn connect_with_retry(project_id: &str) -> usock::Stream {
   for _ in 0..100 {
      if let Ok(stream) = usock::Stream::connect(project_id).await {
         return stream;
      }
      time::sleep(Duration::from_millis(50)).await;
   }
   panic!("daemon never came up");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn daemon_serves_commands_and_drains_cleanly() {
   let home = TempDir::new().unwrap();
   // SAFETY: this test binary runs exactly one test, so no other thread
   // reads the environment concurrently.
   unsafe {
      std::env::set_var("HOME", home.path());
   }

   let ws = home.path().join("ws");
   fs::create_dir_all(&ws).unwrap();
   fs::write(ws.join("a.rs"), "fn alpha() {}\n").unwrap();
   fs::write(ws.join("noise.log"), "alpha noise\n").unwrap();
   fs::write(ws.join(".gitignore"), "*.log\n").unwrap();

   let project = Project::resolve(&ws).unwrap();
   let project_id = project.project_id.clone();

   let server_ws = ws.clone();
   let server_handle = tokio::spawn(async move { server::run(Some(server_ws)).await });

   let mut stream = connect_with_retry(&project_id).await;

   // Hello negotiates a protocol version and reports the project id.
   let hello = roundtrip(&mut stream, &Request::new("hello", vec!["1".to_string()]))
      .await
      .unwrap();
   assert!(hello.success);
   match hello.data {
      Some(ResponseData::Hello { project_id: reported, .. }) => {
         assert_eq!(reported, project_id);
      },
      other => panic!("unexpected hello payload: {other:?}"),
   }

   // A second daemon for the same project must fail fast.
   let conflict = server::run(Some(ws.clone())).await;
   assert!(matches!(
      conflict,
      Err(Error::Socket(SocketError::AlreadyRunning))
   ));

   // Index synchronously; the ignored log file must not be picked up.
   let index = roundtrip(
      &mut stream,
      &Request::new("index", vec!["--wait".to_string()]),
   )
   .await
   .unwrap();
   assert!(index.success, "index failed: {:?}", index.error);
   match index.data {
      Some(ResponseData::Index(report)) => {
         // The startup pass may already have indexed the file, in which case
         // this waited pass observes it as unchanged.
         let summary = report.summary.expect("waited index returns a summary");
         assert!(summary.indexed + summary.skipped >= 1);
      },
      other => panic!("unexpected index payload: {other:?}"),
   }

   // Search honors exclusions: only the source file matches.
   let search = roundtrip(&mut stream, &Request::new("search", vec!["alpha".to_string()]))
      .await
      .unwrap();
   assert!(search.success);
   match search.data {
      Some(ResponseData::Search(report)) => {
         assert_eq!(report.matches.len(), 1);
         assert_eq!(report.matches[0].path, std::path::PathBuf::from("a.rs"));
      },
      other => panic!("unexpected search payload: {other:?}"),
   }

   // Exclusion diagnostics over the wire.
   let excl = roundtrip(
      &mut stream,
      &Request::new("exclusions", vec!["noise.log".to_string()]),
   )
   .await
   .unwrap();
   match excl.data {
      Some(ResponseData::Exclusion(report)) => {
         assert!(report.ignored);
         assert_eq!(report.pattern.as_deref(), Some("*.log"));
      },
      other => panic!("unexpected exclusions payload: {other:?}"),
   }

   // Status reflects the indexed workspace.
   let status = roundtrip(&mut stream, &Request::new("status", Vec::new()))
      .await
      .unwrap();
   match status.data {
      Some(ResponseData::Status(status)) => {
         assert_eq!(status.project_id, project_id);
         assert!(status.indexed_files >= 1);
      },
      other => panic!("unexpected status payload: {other:?}"),
   }

   // Malformed commands get a structured error; the connection stays open.
   let bad = roundtrip(&mut stream, &Request::new("frobnicate", Vec::new()))
      .await
      .unwrap();
   assert!(!bad.success);
   assert_eq!(bad.error.unwrap().code, "unknown_command");

   let ping = roundtrip(&mut stream, &Request::new("ping", Vec::new()))
      .await
      .unwrap();
   assert!(ping.success);

   // Shutdown drains and removes the endpoint.
   let shutdown = roundtrip(&mut stream, &Request::new("shutdown", Vec::new()))
      .await
      .unwrap();
   assert!(shutdown.success);

   let result = time::timeout(Duration::from_secs(10), server_handle)
      .await
      .expect("daemon did not stop in time")
      .unwrap();
   assert!(result.is_ok(), "daemon exited with error: {result:?}");
   assert!(!usock::socket_path(&project_id).exists());
}
