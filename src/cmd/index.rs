//! Index command: asks the daemon for an index pass.

use std::path::PathBuf;

use console::style;

use crate::{
   Result,
   cmd::daemon,
   error::Error,
   ipc::{Request, ResponseData},
   project::Project,
};

pub async fn execute(path: Option<PathBuf>, force: bool, no_wait: bool, json: bool) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let mut stream = daemon::connect_or_spawn(&project).await?;

   let mut args = Vec::new();
   if force {
      args.push("--force".to_string());
   }
   if !no_wait {
      args.push("--wait".to_string());
   }

   let response = daemon::roundtrip(&mut stream, &Request::new("index", args)).await?;

   if let Some(error) = response.error {
      return Err(Error::Reported {
         message:   format!("index failed: {} ({})", error.message, error.code),
         exit_code: 1,
      });
   }

   match response.data {
      Some(ResponseData::Index(report)) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
         }

         match report.summary {
            Some(summary) => {
               let rebuild = if summary.full_rebuild { " (full rebuild)" } else { "" };
               println!(
                  "{} {} indexed, {} skipped, {} deleted in {}ms{}",
                  style("Done:").green().bold(),
                  summary.indexed,
                  summary.skipped,
                  summary.deleted,
                  summary.duration_ms,
                  style(rebuild).dim()
               );
            },
            None => {
               let note = if report.coalesced {
                  "joined in-flight index task"
               } else {
                  "index task started"
               };
               println!("{} {} ({})", style("Queued:").green(), report.task_id, style(note).dim());
            },
         }
         Ok(())
      },
      _ => Err(Error::UnexpectedResponse("index")),
   }
}
