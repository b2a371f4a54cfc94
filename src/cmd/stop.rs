//! Stop command.
//!
//! Gracefully shuts down the running daemon for a project.

use std::{env, path::PathBuf, time::Duration};

use console::style;
use tokio::time;

use crate::{Result, cmd::daemon, ipc::Request, project::Project, usock};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

fn force_kill_if_possible(project_id: &str) -> bool {
   let Some(pid) = usock::read_pid(project_id) else {
      return false;
   };
   if !daemon::looks_like_cindex_serve(pid) {
      return false;
   }

   #[cfg(unix)]
   {
      std::process::Command::new("kill")
         .arg("-TERM")
         .arg(pid.to_string())
         .status()
         .map(|s| s.success())
         .unwrap_or(false)
   }

   #[cfg(not(unix))]
   {
      false
   }
}

pub async fn execute(path: Option<PathBuf>) -> Result<()> {
   let root = env::current_dir()?;
   let target = path.unwrap_or(root);
   let project = Project::resolve(&target)?;
   let project_id = &project.project_id;

   if !usock::socket_path(project_id).exists() {
      println!("{}", style("No daemon running for this project").yellow());
      return Ok(());
   }

   let stream = match time::timeout(CONNECT_TIMEOUT, usock::Stream::connect(project_id)).await {
      Ok(Ok(s)) => Some(s),
      Ok(Err(_)) | Err(_) => None,
   };

   if let Some(mut stream) = stream {
      match daemon::roundtrip(&mut stream, &Request::new("shutdown", Vec::new())).await {
         Ok(response) if response.success => {
            println!("{}", style("Daemon stopped").green());
         },
         Ok(_) => {
            println!("{}", style("Unexpected response from daemon").yellow());
         },
         Err(_) => {
            _ = force_kill_if_possible(project_id);
            usock::remove_socket(project_id);
            usock::remove_pid(project_id);
            println!("{}", style("Daemon unresponsive; removed socket").yellow());
         },
      }
   } else {
      _ = force_kill_if_possible(project_id);
      usock::remove_socket(project_id);
      usock::remove_pid(project_id);
      println!("{}", style("Removed stale socket").yellow());
   }

   Ok(())
}
