//! Serve command: runs the daemon in the foreground.

use std::path::PathBuf;

use console::style;

use crate::{Result, error::Error, server, usock::SocketError};

pub async fn execute(path: Option<PathBuf>) -> Result<()> {
   match server::run(path).await {
      Err(Error::Socket(SocketError::AlreadyRunning)) => {
         println!("{}", style("Daemon already running").yellow());
         Ok(())
      },
      other => other,
   }
}
