//! Rules command: lists discovered rule files with line statistics.

use std::path::PathBuf;

use console::style;

use crate::{
   Result,
   cmd::daemon,
   error::Error,
   ipc::{Request, ResponseData},
   project::Project,
};

pub async fn execute(path: Option<PathBuf>, json: bool) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let mut stream = daemon::connect_or_spawn(&project).await?;
   let response = daemon::roundtrip(&mut stream, &Request::new("rules", Vec::new())).await?;

   match response.data {
      Some(ResponseData::Rules(reports)) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
            return Ok(());
         }

         if reports.is_empty() {
            println!("{}", style("No rule files found (builtin defaults apply)").dim());
         }
         for report in reports {
            println!(
               "{} {}",
               style(report.path.display()).cyan(),
               style(format!("(depth {})", report.depth)).dim()
            );
            println!(
               "  {} valid, {} comments, {} blanks, {} warnings",
               report.valid, report.comments, report.blanks, report.warnings
            );
            for rejected in report.rejected {
               println!(
                  "  {} line {}: {} ({})",
                  style("!").red(),
                  rejected.line,
                  rejected.raw,
                  rejected.reason
               );
            }
         }
         Ok(())
      },
      _ => Err(Error::UnexpectedResponse("rules")),
   }
}
