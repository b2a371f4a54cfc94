use std::path::PathBuf;

use cindex::{Error, Result, cmd};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the cindex application
#[derive(Parser)]
#[command(name = "cindex")]
#[command(about = "Local per-project code-intelligence daemon")]
#[command(version)]
struct Cli {
   #[command(subcommand)]
   command: Cmd,
}

/// Available subcommands for cindex
#[derive(Subcommand)]
enum Cmd {
   #[command(about = "Run the daemon for a workspace in the foreground")]
   Serve {
      #[arg(long, help = "Workspace to serve (default: cwd)")]
      path: Option<PathBuf>,
   },

   #[command(about = "Request an index pass")]
   Index {
      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,

      #[arg(short = 'f', long, help = "Treat every eligible file as changed")]
      force: bool,

      #[arg(long, help = "Return immediately instead of waiting for completion")]
      no_wait: bool,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Search the workspace with a regex pattern")]
   Search {
      #[arg(help = "Regex pattern")]
      pattern: String,

      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,

      #[arg(long, help = "Limit search to a workspace subdirectory")]
      scope: Option<PathBuf>,

      #[arg(short = 'm', long, default_value = "50", help = "Maximum results")]
      max: usize,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Show daemon status")]
   Status {
      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,

      #[arg(long, help = "List every running daemon")]
      all: bool,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "List supervised tasks")]
   Tasks {
      #[arg(help = "Task id (default: all non-terminal tasks)")]
      task_id: Option<String>,

      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Cancel a supervised task")]
   Cancel {
      #[arg(help = "Task id (default: every non-terminal task)")]
      task_id: Option<String>,

      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,
   },

   #[command(about = "Explain whether a path is excluded and by which rule")]
   Exclusions {
      #[arg(help = "Path to check (workspace-relative or absolute)")]
      target: PathBuf,

      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "List discovered exclusion rule files with statistics")]
   Rules {
      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,

      #[arg(long, help = "JSON output")]
      json: bool,
   },

   #[command(about = "Stop the daemon for a workspace")]
   Stop {
      #[arg(long, help = "Workspace of daemon to stop (default: cwd)")]
      path: Option<PathBuf>,
   },

   #[command(name = "stop-all", about = "Stop all running daemons")]
   StopAll,

   #[command(about = "Remove index data and metadata for a workspace")]
   Clean {
      #[arg(short = 'p', long, help = "Workspace (default: cwd)")]
      path: Option<PathBuf>,
   },
}

#[tokio::main]
async fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env().add_directive(Level::WARN.into()))
      .init();

   let cli = Cli::parse();
   if let Err(err) = run(cli).await {
      if !matches!(err, Error::Reported { .. }) {
         eprintln!("{err}");
      }
      std::process::exit(err.exit_code());
   }
}

async fn run(cli: Cli) -> Result<()> {
   match cli.command {
      Cmd::Serve { path } => cmd::serve::execute(path).await,
      Cmd::Index { path, force, no_wait, json } => {
         cmd::index::execute(path, force, no_wait, json).await
      },
      Cmd::Search { pattern, path, scope, max, json } => {
         cmd::search::execute(pattern, path, scope, max, json).await
      },
      Cmd::Status { path, all, json } => cmd::status::execute(path, all, json).await,
      Cmd::Tasks { task_id, path, json } => cmd::tasks::execute(path, task_id, json).await,
      Cmd::Cancel { task_id, path } => cmd::cancel::execute(path, task_id).await,
      Cmd::Exclusions { target, path, json } => {
         cmd::exclusions::execute(target, path, json).await
      },
      Cmd::Rules { path, json } => cmd::rules::execute(path, json).await,
      Cmd::Stop { path } => cmd::stop::execute(path).await,
      Cmd::StopAll => cmd::stop_all::execute().await,
      Cmd::Clean { path } => cmd::clean::execute(path),
   }
}
