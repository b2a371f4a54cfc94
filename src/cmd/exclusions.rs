//! Exclusions command: asks the daemon why a path is (not) excluded.

use std::path::PathBuf;

use console::style;

use crate::{
   Result,
   cmd::daemon,
   error::Error,
   ipc::{Request, ResponseData},
   project::Project,
};

pub async fn execute(target: PathBuf, path: Option<PathBuf>, json: bool) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let mut stream = daemon::connect_or_spawn(&project).await?;

   let args = vec![target.to_string_lossy().to_string()];
   let response = daemon::roundtrip(&mut stream, &Request::new("exclusions", args)).await?;

   match response.data {
      Some(ResponseData::Exclusion(report)) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
         }

         let verdict = if report.ignored {
            style("excluded").red().bold()
         } else {
            style("included").green().bold()
         };
         println!("{}: {}", report.path.display(), verdict);

         match (&report.source, &report.pattern) {
            (Some(source), Some(pattern)) => {
               println!("  rule: {} ({})", pattern, style(source.display()).dim());
            },
            (None, Some(pattern)) => {
               println!("  rule: {} ({})", pattern, style("builtin defaults").dim());
            },
            _ => {
               println!("  {}", style("no rule matched").dim());
            },
         }
         Ok(())
      },
      _ => Err(Error::UnexpectedResponse("exclusions")),
   }
}
