//! Status command: daemon state for one project, or all running daemons.

use std::{path::PathBuf, time::Duration};

use console::style;
use tokio::time;

use crate::{
   Result,
   cmd::daemon,
   ipc::{Request, ResponseData},
   project::Project,
   usock,
};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

pub async fn execute(path: Option<PathBuf>, all: bool, json: bool) -> Result<()> {
   if all {
      return list_all().await;
   }

   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let stream =
      match time::timeout(CONNECT_TIMEOUT, usock::Stream::connect(&project.project_id)).await {
         Ok(Ok(s)) => Some(s),
         Ok(Err(_)) | Err(_) => None,
      };

   let Some(mut stream) = stream else {
      if json {
         println!("{{\"running\": false}}");
      } else {
         println!("{}", style("No daemon running for this project").dim());
      }
      return Ok(());
   };

   let response = daemon::roundtrip(&mut stream, &Request::new("status", Vec::new())).await?;

   if let Some(ResponseData::Status(status)) = response.data {
      if json {
         println!("{}", serde_json::to_string_pretty(&status)?);
         return Ok(());
      }

      let state = if status.indexing { "indexing" } else { "ready" };
      println!("{} {}", style("●").green(), style(&status.project_id).bold());
      println!("  name: {}", status.display_name);
      println!("  workspace: {}", status.workspace_path.display());
      println!("  state: {state}");
      println!("  indexed files: {}", status.indexed_files);
      println!("  pending changes: {}", status.pending_changes);
      println!("  uptime: {}s", status.uptime_secs);
      if let Some(inflight) = &status.inflight {
         let phase = if inflight.running { "running" } else { "queued" };
         println!(
            "  index task: {} ({phase}, source {:?}, force {})",
            inflight.task_id, inflight.source, inflight.force
         );
      }
      for task in &status.tasks {
         println!(
            "  task {} {:?} {:?} (started {})",
            task.id, task.kind, task.state, task.started_at
         );
      }
   } else {
      println!("{}", style("Unexpected response from daemon").yellow());
   }

   Ok(())
}

async fn list_all() -> Result<()> {
   let daemons = usock::list_running_daemons();

   if daemons.is_empty() {
      println!("{}", style("No daemons running").dim());
      return Ok(());
   }

   println!("{}", style("Running daemons:").bold());
   println!();

   for project_id in daemons {
      let stream =
         match time::timeout(CONNECT_TIMEOUT, usock::Stream::connect(&project_id)).await {
            Ok(Ok(s)) => s,
            Ok(Err(_)) | Err(_) => {
               println!("  {} {} {}", style("●").red(), project_id, style("(stale)").dim());
               continue;
            },
         };

      let mut stream = stream;
      let response = daemon::roundtrip(&mut stream, &Request::new("status", Vec::new())).await;

      match response {
         Ok(r) => match r.data {
            Some(ResponseData::Status(status)) => {
               let state = if status.indexing { "indexing" } else { "ready" };
               println!(
                  "  {} {} {}",
                  style("●").green(),
                  project_id,
                  style(format!("({state}, files: {})", status.indexed_files)).dim()
               );
            },
            _ => {
               println!("  {} {} {}", style("●").yellow(), project_id, style("(unknown)").dim());
            },
         },
         Err(_) => {
            println!(
               "  {} {} {}",
               style("●").yellow(),
               project_id,
               style("(unresponsive)").dim()
            );
         },
      }
   }

   Ok(())
}
