use std::{io, path::PathBuf, sync::Arc};

use thiserror::Error;

use crate::usock::SocketError;

/// Main error type for the cindex application.
///
/// Covers I/O, configuration, protocol, socket, and indexing failures. Errors
/// local to a single rule line or a single file during indexing are absorbed
/// at the call site with a warning and never surface through this type.
#[derive(Debug, Error)]
pub enum Error {
   /// Shared error (coalesced index waiters all see the same failure).
   #[error(transparent)]
   Shared(#[from] Arc<Self>),

   /// I/O error occurred during file or socket operations.
   #[error("io error: {0}")]
   Io(#[from] io::Error),

   /// Configuration-related error occurred.
   #[error("config error: {0}")]
   Config(#[from] ConfigError),

   /// JSON serialization or deserialization error occurred.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),

   /// TOML serialization or deserialization error occurred.
   #[error("toml error: {0}")]
   Toml(#[from] toml::de::Error),

   /// Postcard serialization or deserialization error occurred.
   #[error("postcard error: {0}")]
   Postcard(#[from] postcard::Error),

   /// Inter-process communication error occurred.
   #[error("ipc error: {0}")]
   Ipc(#[from] IpcError),

   /// Socket communication error occurred.
   #[error("socket error: {0}")]
   Socket(#[from] SocketError),

   /// Regex compilation error occurred.
   #[error("regex error: {0}")]
   Regex(#[from] regex::Error),

   /// The workspace root disappeared or cannot be read.
   #[error("workspace unavailable: {path}", path = _0.display())]
   WorkspaceUnavailable(PathBuf),

   /// An exclusion rule set could not be compiled from structurally invalid
   /// input (not from unusual-but-valid patterns).
   #[error("invalid rule set: {0}")]
   InvalidRuleSet(String),

   /// An index pass failed; retained on the task and shared with every
   /// coalesced waiter.
   #[error("index task failed: {0}")]
   IndexFailed(String),

   /// An index pass observed a cancellation request at a checkpoint.
   #[error("index task cancelled")]
   IndexCancelled,

   /// Another writer holds the project's data directory.
   #[error("project data directory locked by another process: {path}", path = _0.display())]
   DataDirLocked(PathBuf),

   /// Server error occurred during a specific operation.
   #[error("server error during {op}: {reason}")]
   Server { op: &'static str, reason: String },

   /// Unexpected response received from the daemon during an operation.
   #[error("unexpected response from daemon during {0}")]
   UnexpectedResponse(&'static str),

   /// Failed to spawn the daemon process.
   #[error("failed to spawn daemon: {0}")]
   DaemonSpawn(#[source] io::Error),

   /// Error already reported to the user (e.g., JSON output emitted).
   #[error("{message}")]
   Reported { message: String, exit_code: i32 },
}

impl Error {
   pub fn exit_code(&self) -> i32 {
      if let Error::Reported { exit_code, .. } = self {
         return *exit_code;
      }

      let reason = match self {
         Error::Server { reason, .. } => reason.to_lowercase(),
         Error::UnexpectedResponse(op) => op.to_string().to_lowercase(),
         other => other.to_string().to_lowercase(),
      };

      if reason.contains("already running") || reason.contains("locked") {
         10
      } else if reason.contains("timeout") {
         11
      } else if reason.contains("cancel") {
         12
      } else if reason.contains("incompatible") {
         13
      } else {
         1
      }
   }
}

/// Errors that can occur during inter-process communication (IPC).
///
/// These errors are related to message framing, serialization, and I/O when
/// communicating between the client and the daemon.
#[derive(Debug, Error)]
pub enum IpcError {
   /// The message size exceeds the maximum allowed size.
   #[error("message too large: {0} bytes")]
   MessageTooLarge(usize),

   /// Failed to serialize a message for IPC transmission.
   #[error("failed to serialize: {0}")]
   Serialize(#[source] postcard::Error),

   /// Failed to deserialize a message received via IPC.
   #[error("failed to deserialize: {0}")]
   Deserialize(#[source] postcard::Error),

   /// Failed to read data from the IPC channel.
   #[error("failed to read: {0}")]
   Read(#[source] io::Error),

   /// Failed to write data to the IPC channel.
   #[error("failed to write: {0}")]
   Write(#[source] io::Error),
}

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
   /// Failed to retrieve user directories (e.g., home directory).
   #[error("failed to get user directories")]
   GetUserDirectories,

   /// Repo config is invalid or exceeds safety caps.
   #[error("invalid repo config: {0}")]
   InvalidRepoConfig(String),
}

impl From<notify::Error> for Error {
   fn from(e: notify::Error) -> Self {
      Self::Io(io::Error::other(e))
   }
}

/// Standard result type using [`enum@Error`] as the default error type
pub type Result<T, E = Error> = std::result::Result<T, E>;
