//! Configuration management for daemon behavior, exclusion limits, and paths.

use std::{
   fs,
   path::{Path, PathBuf},
   sync::OnceLock,
};

use directories::BaseDirs;
use figment::{
   Figment,
   providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

static CONFIG: OnceLock<Config> = OnceLock::new();

pub const MAX_FILE_SIZE_BYTES_CAP: u64 = 10_485_760;
pub const RULE_DISCOVERY_DEPTH_CAP: usize = 64;
pub const DECISION_CACHE_CAPACITY_CAP: u64 = 1_048_576;
pub const MAX_REQUEST_BYTES_CAP: usize = 16_777_216;

/// Application configuration loaded from config files and environment
/// variables (`CINDEX_` prefix).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
   /// Owner identity folded into the project id. Defaults to `$USER`.
   pub owner_id: String,

   /// Override for the project display name (final path segment otherwise).
   pub display_name: Option<String>,

   pub max_file_size_bytes:     u64,
   pub rule_discovery_depth:    usize,
   pub decision_cache_capacity: u64,
   pub max_request_bytes:       usize,
   pub max_search_results:      usize,

   pub watch_debounce_ms:        u64,
   pub idle_timeout_secs:        u64,
   pub idle_check_interval_secs: u64,

   /// Disables the built-in baseline exclusion patterns.
   pub disable_default_excludes: bool,
   /// Skips the startup index pass when the daemon boots.
   pub skip_startup_index:       bool,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         owner_id: std::env::var("USER").unwrap_or_else(|_| "local".to_string()),
         display_name: None,
         max_file_size_bytes: MAX_FILE_SIZE_BYTES_CAP,
         rule_discovery_depth: 16,
         decision_cache_capacity: 16_384,
         max_request_bytes: 1_048_576,
         max_search_results: 200,
         watch_debounce_ms: 250,
         idle_timeout_secs: 30 * 60,
         idle_check_interval_secs: 60,
         disable_default_excludes: false,
         skip_startup_index: false,
      }
   }
}

impl Config {
   pub fn load() -> Self {
      Self::load_with_repo_path(None)
   }

   pub fn load_with_repo(root: &Path) -> Self {
      Self::load_with_repo_path(Some(root))
   }

   fn load_with_repo_path(repo_root: Option<&Path>) -> Self {
      let config_path = ensure_global_config();

      let mut figment =
         Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(config_path));

      if let Some(root) = repo_root {
         let repo_path = repo_config_path(root);
         if repo_path.exists() {
            figment = figment.merge(Toml::file(repo_path));
         }
      }

      figment
         .merge(Env::prefixed("CINDEX_").lowercase(true))
         .extract()
         .inspect_err(|e| tracing::warn!("failed to parse config: {e}"))
         .unwrap_or_default()
   }

   fn create_default_config(path: &Path) {
      if let Some(parent) = path.parent() {
         let _ = fs::create_dir_all(parent);
      }
      let default_config = Self::default();
      if let Ok(toml) = toml::to_string_pretty(&default_config) {
         let _ = fs::write(path, toml);
      }
   }

   pub fn effective_max_file_size_bytes(&self) -> u64 {
      self.max_file_size_bytes.min(MAX_FILE_SIZE_BYTES_CAP)
   }

   pub fn effective_rule_discovery_depth(&self) -> usize {
      self.rule_discovery_depth.min(RULE_DISCOVERY_DEPTH_CAP).max(1)
   }

   pub fn effective_decision_cache_capacity(&self) -> u64 {
      self
         .decision_cache_capacity
         .min(DECISION_CACHE_CAPACITY_CAP)
         .max(1)
   }

   pub fn effective_max_request_bytes(&self) -> usize {
      self.max_request_bytes.min(MAX_REQUEST_BYTES_CAP).max(1024)
   }
}

/// Returns the global configuration instance
pub fn get() -> &'static Config {
   CONFIG.get_or_init(Config::load)
}

/// Initializes config using a workspace-root `.cindex.toml` if present.
pub fn init_for_root(root: &Path) -> &'static Config {
   let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
   CONFIG.get_or_init(|| Config::load_with_repo(&root))
}

/// Returns the base directory for cindex data and configuration
pub fn base_dir() -> &'static PathBuf {
   static ONCE: OnceLock<PathBuf> = OnceLock::new();
   ONCE.get_or_init(|| resolve_base_dir(".cindex"))
}

fn ensure_global_config() -> PathBuf {
   let config_path = config_file_path();
   if !config_path.exists() {
      Config::create_default_config(config_path);
   }
   config_path.to_path_buf()
}

pub fn repo_config_path(root: &Path) -> PathBuf {
   root.join(".cindex.toml")
}

pub fn validate_repo_config(cfg: &Config) -> Result<()> {
   if cfg.max_file_size_bytes > MAX_FILE_SIZE_BYTES_CAP {
      return Err(
         ConfigError::InvalidRepoConfig(format!(
            "max_file_size_bytes {} exceeds hard cap {}",
            cfg.max_file_size_bytes, MAX_FILE_SIZE_BYTES_CAP
         ))
         .into(),
      );
   }
   if cfg.rule_discovery_depth > RULE_DISCOVERY_DEPTH_CAP {
      return Err(
         ConfigError::InvalidRepoConfig(format!(
            "rule_discovery_depth {} exceeds hard cap {}",
            cfg.rule_discovery_depth, RULE_DISCOVERY_DEPTH_CAP
         ))
         .into(),
      );
   }
   if cfg.decision_cache_capacity > DECISION_CACHE_CAPACITY_CAP {
      return Err(
         ConfigError::InvalidRepoConfig(format!(
            "decision_cache_capacity {} exceeds hard cap {}",
            cfg.decision_cache_capacity, DECISION_CACHE_CAPACITY_CAP
         ))
         .into(),
      );
   }
   if cfg.max_request_bytes > MAX_REQUEST_BYTES_CAP {
      return Err(
         ConfigError::InvalidRepoConfig(format!(
            "max_request_bytes {} exceeds hard cap {}",
            cfg.max_request_bytes, MAX_REQUEST_BYTES_CAP
         ))
         .into(),
      );
   }
   Ok(())
}

fn resolve_base_dir(dir_name: &str) -> PathBuf {
   BaseDirs::new()
      .map(|d| d.home_dir().join(dir_name))
      .or_else(|| {
         std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join(dir_name))
      })
      .unwrap_or_else(|| {
         std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(dir_name)
      })
}

macro_rules! define_paths {
   ($($fn_name:ident: $path:literal),* $(,)?) => {
      $(
         pub fn $fn_name() -> &'static PathBuf {
            static ONCE: OnceLock<PathBuf> = OnceLock::new();
            ONCE.get_or_init(|| base_dir().join($path))
         }
      )*
   };
}

define_paths! {
   config_file_path: "config.toml",
   data_dir: "data",
   socket_dir: "sockets",
   meta_dir: "meta",
}
