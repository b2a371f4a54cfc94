//! Tasks command: lists supervised tasks on the daemon.

use std::path::PathBuf;

use console::style;

use crate::{
   Result,
   cmd::daemon,
   error::Error,
   ipc::{Request, ResponseData},
   project::Project,
};

pub async fn execute(path: Option<PathBuf>, task_id: Option<String>, json: bool) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   let mut stream = daemon::connect_or_spawn(&project).await?;

   let args = task_id.into_iter().collect();
   let response = daemon::roundtrip(&mut stream, &Request::new("tasks", args)).await?;

   match response.data {
      Some(ResponseData::Tasks(tasks)) => {
         if json {
            println!("{}", serde_json::to_string_pretty(&tasks)?);
            return Ok(());
         }

         if tasks.is_empty() {
            println!("{}", style("No tasks").dim());
         }
         for task in tasks {
            let error = task
               .error
               .map(|e| format!(" error: {e}"))
               .unwrap_or_default();
            println!(
               "{} {:?} {:?} started {}{}",
               style(&task.id).cyan(),
               task.kind,
               task.state,
               task.started_at,
               style(error).red()
            );
         }
         Ok(())
      },
      _ => Err(Error::UnexpectedResponse("tasks")),
   }
}
