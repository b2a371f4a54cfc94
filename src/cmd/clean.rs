//! Clean command: removes a project's index data and metadata.

use std::{fs, path::PathBuf};

use console::style;

use crate::{Result, project::Project, usock};

pub fn execute(path: Option<PathBuf>) -> Result<()> {
   let workspace = match path {
      Some(p) => p,
      None => std::env::current_dir()?,
   };
   let project = Project::resolve(&workspace)?;

   if usock::socket_path(&project.project_id).exists() {
      println!(
         "{}",
         style("Daemon appears to be running; stop it first (cindex stop)").yellow()
      );
      return Ok(());
   }

   let data_dir = project.data_dir();
   let mut removed = false;

   if data_dir.exists() {
      fs::remove_dir_all(&data_dir)?;
      removed = true;
   }

   let meta_path = project.meta_path();
   if meta_path.exists() {
      fs::remove_file(&meta_path)?;
      removed = true;
   }

   if removed {
      println!("{} {}", style("Removed data for").green(), project.project_id);
   } else {
      println!("{}", style("Nothing to remove").dim());
   }

   Ok(())
}
