//! Search command: runs a pattern through the daemon.

use std::path::PathBuf;

use console::style;

use crate::{
   Result,
   cmd::daemon,
   error::Error,
   ipc::{Request, ResponseData},
   project::Project,
};

pub async fn execute(
   pattern: String,
   path: Option<PathBuf>,
   scope: Option<PathBuf>,
   limit: usize,
   json: bool,
) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let mut stream = daemon::connect_or_spawn(&project).await?;

   let mut args = vec![pattern];
   if let Some(scope) = scope {
      args.push("--scope".to_string());
      args.push(scope.to_string_lossy().to_string());
   }
   args.push("--limit".to_string());
   args.push(limit.to_string());

   let response = daemon::roundtrip(&mut stream, &Request::new("search", args)).await?;

   if let Some(error) = response.error {
      return Err(Error::Reported {
         message:   format!("search failed: {} ({})", error.message, error.code),
         exit_code: 1,
      });
   }

   match response.data {
      Some(ResponseData::Search(report)) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
         }

         if report.matches.is_empty() {
            println!("{}", style("No matches").dim());
         }
         for m in &report.matches {
            println!(
               "{}:{}: {}",
               style(m.path.display()).cyan(),
               style(m.line).green(),
               m.text.trim_end()
            );
         }
         if report.truncated {
            println!("{}", style("(results truncated)").dim());
         }
         if report.indexing {
            println!("{}", style("(index pass in progress; results may lag)").yellow());
         }
         Ok(())
      },
      _ => Err(Error::UnexpectedResponse("search")),
   }
}
