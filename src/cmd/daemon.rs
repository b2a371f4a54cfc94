//! Daemon connection and lifecycle management.
//!
//! Handles connecting to an existing daemon for a project, spawning one when
//! none is running, and performing the hello handshake to ensure protocol
//! compatibility.

use std::{
   path::Path,
   process::{Command, Stdio},
   time::Duration,
};

use tokio::time;

use crate::{
   Result,
   error::Error,
   ipc::{self, Request, Response, ResponseData, SocketBuffer},
   project::Project,
   usock,
};

/// Timeout when establishing a socket connection.
const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
/// Timeout for handshake / control-plane exchanges.
const RPC_TIMEOUT: Duration = Duration::from_millis(5000);

/// Maximum number of connection retry attempts when waiting for daemon startup.
const RETRY_COUNT: usize = 50;
/// Delay between retry attempts.
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Connects to a protocol-compatible daemon for the project, spawning one if
/// needed.
pub async fn connect_or_spawn(project: &Project) -> Result<usock::Stream> {
   if let Some(stream) = try_connect_existing(&project.project_id).await? {
      return Ok(stream);
   }

   spawn_daemon(&project.workspace_path)?;
   wait_for_daemon(&project.project_id).await
}

/// Spawns a new daemon process in the background for the given workspace.
pub fn spawn_daemon(workspace: &Path) -> Result<()> {
   let exe = std::env::current_exe()?;
   let workspace = workspace
      .canonicalize()
      .unwrap_or_else(|_| workspace.to_path_buf());

   Command::new(&exe)
      .arg("serve")
      .arg("--path")
      .arg(workspace)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .map_err(Error::DaemonSpawn)?;

   Ok(())
}

/// Sends one request and receives one response over an open stream.
pub async fn roundtrip(stream: &mut usock::Stream, request: &Request) -> Result<Response> {
   let mut buffer = SocketBuffer::new();
   match time::timeout(RPC_TIMEOUT, buffer.send(stream, request)).await {
      Ok(Ok(())) => {},
      Ok(Err(e)) => return Err(e),
      Err(_) => {
         return Err(
            Error::Server { op: "request", reason: "timeout sending request".to_string() }.into(),
         );
      },
   }

   match time::timeout(RPC_TIMEOUT, buffer.recv(stream)).await {
      Ok(Ok(response)) => Ok(response),
      Ok(Err(e)) => Err(e),
      Err(_) => Err(
         Error::Server { op: "request", reason: "timeout receiving response".to_string() }.into(),
      ),
   }
}

/// Waits for a newly spawned daemon to come up and answer the handshake.
async fn wait_for_daemon(project_id: &str) -> Result<usock::Stream> {
   for _ in 0..RETRY_COUNT {
      time::sleep(RETRY_DELAY).await;
      if let Some(stream) = try_connect_existing(project_id).await? {
         return Ok(stream);
      }
   }

   Err(Error::Server {
      op:     "handshake",
      reason: "daemon did not start with a compatible protocol".to_string(),
   })
}

/// Attempts to connect to an existing daemon and verify protocol
/// compatibility via the hello handshake. An incompatible daemon is shut
/// down so a fresh one can take its place.
async fn try_connect_existing(project_id: &str) -> Result<Option<usock::Stream>> {
   let stream = match time::timeout(CONNECT_TIMEOUT, usock::Stream::connect(project_id)).await {
      Ok(Ok(s)) => s,
      Ok(Err(_)) | Err(_) => return Ok(None),
   };

   let mut stream = stream;

   let compatible = match handshake(&mut stream).await {
      Ok(v) => v,
      Err(e) => {
         return Err(
            Error::Server {
               op:     "handshake",
               reason: format!("daemon unresponsive during handshake: {e}"),
            }
            .into(),
         );
      },
   };

   if compatible {
      Ok(Some(stream))
   } else {
      force_shutdown(Some(stream), project_id).await?;
      Ok(None)
   }
}

async fn handshake(stream: &mut usock::Stream) -> Result<bool> {
   let versions = ipc::PROTOCOL_VERSIONS
      .iter()
      .map(|v| v.to_string())
      .collect::<Vec<_>>()
      .join(",");
   let response = roundtrip(stream, &Request::new("hello", vec![versions])).await?;

   match response.data {
      Some(ResponseData::Hello { protocol_version, .. }) => {
         Ok(ipc::PROTOCOL_VERSIONS.contains(&protocol_version))
      },
      _ if !response.success => Ok(false),
      _ => Err(Error::UnexpectedResponse("handshake")),
   }
}

/// Forces a daemon to shut down and removes its socket artifacts.
pub async fn force_shutdown(existing: Option<usock::Stream>, project_id: &str) -> Result<()> {
   let shutdown = Request::new("shutdown", Vec::new());

   if let Some(mut stream) = existing {
      let _ = roundtrip(&mut stream, &shutdown).await;
   } else if let Ok(Ok(mut stream)) =
      time::timeout(CONNECT_TIMEOUT, usock::Stream::connect(project_id)).await
   {
      let _ = roundtrip(&mut stream, &shutdown).await;
   }

   // If the daemon can't be shut down cleanly, try to terminate it using the
   // pid file so we don't leave orphaned processes behind.
   #[cfg(unix)]
   {
      if let Some(pid) = usock::read_pid(project_id)
         && looks_like_cindex_serve(pid)
      {
         let _ = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .status();
      }
   }

   usock::remove_socket(project_id);
   usock::remove_pid(project_id);
   Ok(())
}

pub(crate) fn looks_like_cindex_serve(pid: u32) -> bool {
   let Ok(bytes) = std::fs::read(format!("/proc/{pid}/cmdline")) else {
      return false;
   };
   let cmdline = String::from_utf8_lossy(&bytes);
   cmdline.contains("cindex") && cmdline.contains("serve")
}
