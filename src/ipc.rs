//! Wire protocol for client-daemon communication over sockets.
//!
//! One exchange per command: the client sends `{command, args[]}` and the
//! daemon answers `{success, message?, data?, error?}`. Frames are
//! length-prefixed postcard. The argument list stays stringly at the wire so
//! the protocol surface is stable; the server router turns it into typed
//! commands and answers malformed input with a structured error.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
   Result,
   backends::SearchMatch,
   error::IpcError,
   indexer::IndexSummary,
   queue::InflightInfo,
   tasks::TaskStatusInfo,
};

pub const PROTOCOL_VERSIONS: &[u32] = &[1];

pub fn negotiate_protocol(client_versions: &[u32]) -> Option<u32> {
   let mut best: Option<u32> = None;
   for &version in client_versions {
      if PROTOCOL_VERSIONS.contains(&version) {
         best = Some(best.map_or(version, |current| current.max(version)));
      }
   }
   best
}

/// One client command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
   pub command: String,
   pub args:    Vec<String>,
}

impl Request {
   pub fn new(command: &str, args: Vec<String>) -> Self {
      Self { command: command.to_string(), args }
   }
}

/// Structured error carried in a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
   pub code:    String,
   pub message: String,
}

/// One daemon reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
   pub success: bool,
   pub message: Option<String>,
   pub data:    Option<ResponseData>,
   pub error:   Option<ErrorBody>,
}

impl Response {
   pub const fn ok() -> Self {
      Self { success: true, message: None, data: None, error: None }
   }

   pub fn ok_message(message: impl Into<String>) -> Self {
      Self { success: true, message: Some(message.into()), data: None, error: None }
   }

   pub const fn ok_data(data: ResponseData) -> Self {
      Self { success: true, message: None, data: Some(data), error: None }
   }

   pub fn error(code: &str, message: impl Into<String>) -> Self {
      Self {
         success: false,
         message: None,
         data:    None,
         error:   Some(ErrorBody { code: code.to_string(), message: message.into() }),
      }
   }
}

/// Typed payloads carried in successful responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
   Hello {
      protocol_version:  u32,
      protocol_versions: Vec<u32>,
      daemon_version:    String,
      project_id:        String,
   },
   Index(IndexReport),
   Tasks(Vec<TaskStatusInfo>),
   Search(SearchReport),
   Exclusion(ExclusionReport),
   Rules(Vec<RuleFileReport>),
   Status(DaemonStatus),
}

/// Reply to an `index` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
   pub task_id:   String,
   /// Whether the request coalesced onto an already in-flight pass.
   pub coalesced: bool,
   /// Present when the client asked to wait for completion.
   pub summary:   Option<IndexSummary>,
}

/// Reply to a `search` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
   pub matches:   Vec<SearchMatch>,
   /// An index pass was running while this search executed.
   pub indexing:  bool,
   pub truncated: bool,
}

/// Reply to an `exclusions` diagnostic command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExclusionReport {
   pub path:    PathBuf,
   pub ignored: bool,
   /// Rule file whose pattern decided the outcome (absent for the builtin
   /// defaults or when nothing matched).
   pub source:  Option<PathBuf>,
   pub pattern: Option<String>,
}

/// One rejected pattern line in a rule-file report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedLine {
   pub line:   usize,
   pub raw:    String,
   pub reason: String,
}

/// Per-rule-file statistics for the `rules` diagnostic command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFileReport {
   pub path:     PathBuf,
   pub depth:    usize,
   pub valid:    usize,
   pub comments: usize,
   pub blanks:   usize,
   pub warnings: usize,
   pub rejected: Vec<RejectedLine>,
}

/// Reply to a `status` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
   pub project_id:      String,
   pub display_name:    String,
   pub workspace_path:  PathBuf,
   pub indexing:        bool,
   pub indexed_files:   usize,
   pub pending_changes: usize,
   pub uptime_secs:     u64,
   pub inflight:        Option<InflightInfo>,
   pub tasks:           Vec<TaskStatusInfo>,
}

/// Stack-allocated buffer for socket I/O operations
pub struct SocketBuffer {
   buf: SmallVec<[u8; 2048]>,
}

const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

impl Extend<u8> for &mut SocketBuffer {
   fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
      self.buf.extend(iter);
   }
}

impl Default for SocketBuffer {
   fn default() -> Self {
      Self::new()
   }
}

impl SocketBuffer {
   pub fn new() -> Self {
      Self { buf: SmallVec::new() }
   }

   #[allow(
      clippy::future_not_send,
      reason = "Generic async function with references - Send bound would be too restrictive for \
                trait"
   )]
   /// Serializes and sends a message with length prefix
   pub async fn send<W, T>(&mut self, writer: &mut W, msg: &T) -> Result<()>
   where
      W: AsyncWrite + Unpin,
      T: Serialize,
   {
      self.buf.clear();
      self.buf.resize(4, 0u8);
      _ = postcard::to_extend(msg, &mut *self).map_err(IpcError::Serialize)?;
      let payload_len = (self.buf.len() - 4) as u32;
      *self.buf.first_chunk_mut().unwrap() = payload_len.to_le_bytes();
      writer.write_all(&self.buf).await.map_err(IpcError::Write)?;
      writer.flush().await.map_err(IpcError::Write)?;
      Ok(())
   }

   /// Receives and deserializes a message with length prefix
   pub async fn recv<'de, R, T>(&'de mut self, reader: &mut R) -> Result<T>
   where
      R: AsyncRead + Unpin,
      T: Deserialize<'de>,
   {
      self
         .recv_with_limit(reader, DEFAULT_MAX_MESSAGE_BYTES)
         .await
   }

   pub async fn recv_with_limit<'de, R, T>(
      &'de mut self,
      reader: &mut R,
      max_len: usize,
   ) -> Result<T>
   where
      R: AsyncRead + Unpin,
      T: Deserialize<'de>,
   {
      let mut len_buf = [0u8; 4];
      reader
         .read_exact(&mut len_buf)
         .await
         .map_err(IpcError::Read)?;
      let len = u32::from_le_bytes(len_buf) as usize;

      if len > max_len {
         return Err(IpcError::MessageTooLarge(len).into());
      }

      self.buf.resize(len, 0u8);
      reader
         .read_exact(self.buf.as_mut_slice())
         .await
         .map_err(IpcError::Read)?;
      postcard::from_bytes(&self.buf).map_err(|e| IpcError::Deserialize(e).into())
   }
}
