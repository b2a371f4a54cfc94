//! Stop-all command: shuts down every running daemon.

use std::time::Duration;

use console::style;
use tokio::time;

use crate::{Result, cmd::daemon, ipc::Request, usock};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

pub async fn execute() -> Result<()> {
   let daemons = usock::list_running_daemons();

   if daemons.is_empty() {
      println!("{}", style("No daemons running").dim());
      return Ok(());
   }

   for project_id in daemons {
      let stream =
         match time::timeout(CONNECT_TIMEOUT, usock::Stream::connect(&project_id)).await {
            Ok(Ok(s)) => Some(s),
            Ok(Err(_)) | Err(_) => None,
         };

      match stream {
         Some(mut stream) => {
            match daemon::roundtrip(&mut stream, &Request::new("shutdown", Vec::new())).await {
               Ok(_) => println!("{} {}", style("Stopped:").green(), project_id),
               Err(_) => {
                  usock::remove_socket(&project_id);
                  usock::remove_pid(&project_id);
                  println!("{} {}", style("Unresponsive, cleaned:").yellow(), project_id);
               },
            }
         },
         None => {
            usock::remove_socket(&project_id);
            usock::remove_pid(&project_id);
            println!("{} {}", style("Stale, cleaned:").yellow(), project_id);
         },
      }
   }

   Ok(())
}
