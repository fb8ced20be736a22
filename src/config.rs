//! Configuration for query compilation, cursors and logging.
//!
//! Precedence when loading: explicit overrides (CLI) > environment > config file > defaults.

use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Limits applied while compiling and running queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Maximum number of members in an `$in`, `$nin` or `$all` set.
    pub max_set_size: usize,
    /// Maximum length in bytes of a regex pattern.
    pub max_pattern_len: usize,
    /// Maximum `$elemMatch` nesting and dotted-path depth.
    pub max_nesting_depth: usize,
    /// Documents per cursor batch when `FindOptions::batch_size` is unset.
    pub default_batch_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_set_size: 1000,
            max_pattern_len: 512,
            max_nesting_depth: 32,
            default_batch_size: 101,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub dir: Option<PathBuf>,
    /// error|warn|info|debug|trace
    pub level: Option<String>,
    pub retention: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub query: QueryConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// # Errors
    /// Returns `DbError::Config` if the TOML text is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        toml::from_str(s).map_err(|e| DbError::Config(e.to_string()))
    }

    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, DbError> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Loads `path` when given (or `NEXUSMATCH_CONFIG`, or `./nexusmatch.toml` when
    /// present), then applies environment overrides.
    ///
    /// # Errors
    /// Returns an error if an explicitly named config file cannot be loaded.
    pub fn resolve(path: Option<&Path>) -> Result<Self, DbError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("NEXUSMATCH_CONFIG").ok().map(PathBuf::from));
        let mut cfg = match explicit {
            Some(p) => Self::load(&p)?,
            None => {
                let local = PathBuf::from("nexusmatch.toml");
                if local.exists() { Self::load(&local)? } else { Self::default() }
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    /// Overlay values from `NEXUSMATCH_*` environment variables.
    pub fn apply_env(&mut self) {
        fn env_usize(key: &str) -> Option<usize> {
            std::env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
        }
        if let Some(v) = env_usize("NEXUSMATCH_MAX_SET_SIZE") {
            self.query.max_set_size = v;
        }
        if let Some(v) = env_usize("NEXUSMATCH_MAX_PATTERN_LEN") {
            self.query.max_pattern_len = v;
        }
        if let Some(v) = env_usize("NEXUSMATCH_MAX_NESTING_DEPTH") {
            self.query.max_nesting_depth = v;
        }
        if let Some(v) = env_usize("NEXUSMATCH_BATCH_SIZE").filter(|v| *v > 0) {
            self.query.default_batch_size = v;
        }
        if let Ok(s) = std::env::var("NEXUSMATCH_LOG_DIR") {
            self.log.dir = Some(PathBuf::from(s));
        }
        if let Ok(s) = std::env::var("NEXUSMATCH_LOG_LEVEL") {
            self.log.level = Some(s);
        }
        if let Some(v) = env_usize("NEXUSMATCH_LOG_RETENTION") {
            self.log.retention = Some(v);
        }
    }
}
