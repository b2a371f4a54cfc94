//! Cancel command: requests cooperative cancellation of daemon tasks.

use std::path::PathBuf;

use console::style;

use crate::{Result, cmd::daemon, error::Error, ipc::Request, project::Project};

pub async fn execute(path: Option<PathBuf>, task_id: Option<String>) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let mut stream = daemon::connect_or_spawn(&project).await?;

   let args = task_id.into_iter().collect();
   let response = daemon::roundtrip(&mut stream, &Request::new("cancel", args)).await?;

   if let Some(error) = response.error {
      return Err(Error::Reported {
         message:   format!("cancel failed: {} ({})", error.message, error.code),
         exit_code: 1,
      });
   }

   println!(
      "{}",
      style(response.message.unwrap_or_else(|| "cancellation requested".to_string())).green()
   );
   Ok(())
}
