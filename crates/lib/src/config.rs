use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_LOCK_DIR, LOCK_DIR_ENV, VERBOSITY_ENV};
use crate::error::Result;
use crate::log::{LogLevel, parse_verbosity};

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Most verbose level reported; `None` silences the engine.
  pub verbosity: Option<LogLevel>,
  /// Directory holding named locks.
  pub lock_dir: PathBuf,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      verbosity: Some(LogLevel::Error),
      lock_dir: PathBuf::from(DEFAULT_LOCK_DIR),
    }
  }
}

impl EngineConfig {
  /// Reads `CONVERGEFS_VERBOSITY` and `CONVERGEFS_LOCK_DIR`, falling back to
  /// the defaults for unset or empty variables.
  pub fn from_env() -> Result<Self> {
    let mut config = Self::default();

    if let Ok(value) = std::env::var(VERBOSITY_ENV)
      && !value.trim().is_empty()
    {
      config.verbosity = parse_verbosity(&value)?;
    }
    if let Ok(value) = std::env::var(LOCK_DIR_ENV)
      && !value.is_empty()
    {
      config.lock_dir = PathBuf::from(value);
    }

    Ok(config)
  }
}
