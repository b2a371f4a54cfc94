//! cindex — a local, per-project code-intelligence daemon.
//!
//! One daemon process owns one workspace: it keeps the project's search index
//! current while files are edited, and answers index/search/status commands
//! from thin clients over a Unix domain socket. The heavy lifting lives in
//! three parts that the protocol server ties together: the hierarchical
//! exclusion engine ([`exclude`]), the single-flight indexing queue
//! ([`queue`]), and the task supervisor ([`tasks`]).

pub mod backends;
pub mod cmd;
pub mod config;
pub mod error;
pub mod exclude;
pub mod indexer;
pub mod ipc;
pub mod meta;
pub mod project;
pub mod queue;
pub mod search;
pub mod server;
pub mod store;
pub mod tasks;
pub mod usock;
pub mod watch;

pub use error::{Error, Result};

/// Protocol name reported in hello exchanges and used for the pid file stem.
pub const DAEMON_NAME: &str = "cindex";
