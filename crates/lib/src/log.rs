//! Run reporting.
//!
//! The engine reports every decision through a [`Logger`] handed to it at
//! construction, instead of consulting process-wide verbosity. Levels are
//! ordered from least to most verbose: a logger configured at
//! [`LogLevel::Action`] reports errors and actions but not "no action"
//! confirmations.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::ReconcileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
  /// Something went wrong.
  Error,
  /// State was changed.
  Action,
  /// State was checked and already matched.
  NoAction,
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LogLevel::Error => "error",
      LogLevel::Action => "action",
      LogLevel::NoAction => "no_action",
    };
    write!(f, "{}", name)
  }
}

impl FromStr for LogLevel {
  type Err = ReconcileError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "error" => Ok(LogLevel::Error),
      "action" => Ok(LogLevel::Action),
      "no_action" | "no-action" => Ok(LogLevel::NoAction),
      other => Err(ReconcileError::config(format!("unknown log level: {other}"))),
    }
  }
}

/// Parses a verbosity setting, where `none` silences all output.
pub fn parse_verbosity(s: &str) -> Result<Option<LogLevel>, ReconcileError> {
  if s.trim().eq_ignore_ascii_case("none") {
    return Ok(None);
  }
  s.parse().map(Some)
}

/// Sink for the engine's decisions. Implementations must never fail.
pub trait Logger {
  fn emit(&self, level: LogLevel, message: &str);
}

/// Forwards messages to `tracing`, dropping those above `verbosity`.
#[derive(Debug, Clone, Copy)]
pub struct TracingLogger {
  verbosity: Option<LogLevel>,
}

impl TracingLogger {
  pub fn new(verbosity: Option<LogLevel>) -> Self {
    Self { verbosity }
  }

  pub fn enabled(&self, level: LogLevel) -> bool {
    self.verbosity.is_some_and(|v| level <= v)
  }
}

impl Default for TracingLogger {
  fn default() -> Self {
    Self::new(Some(LogLevel::Error))
  }
}

impl Logger for TracingLogger {
  fn emit(&self, level: LogLevel, message: &str) {
    if !self.enabled(level) {
      return;
    }
    match level {
      LogLevel::Error => error!("{}", message),
      LogLevel::Action => info!("{}", message),
      LogLevel::NoAction => debug!("{}", message),
    }
  }
}

/// Keeps every message in memory, regardless of level.
#[derive(Debug, Default)]
pub struct MemoryLogger {
  entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn entries(&self) -> Vec<(LogLevel, String)> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  pub fn messages(&self, level: LogLevel) -> Vec<String> {
    self
      .entries()
      .into_iter()
      .filter(|(l, _)| *l == level)
      .map(|(_, m)| m)
      .collect()
  }

  pub fn clear(&self) {
    self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
  }
}

impl Logger for MemoryLogger {
  fn emit(&self, level: LogLevel, message: &str) {
    self
      .entries
      .lock()
      .unwrap_or_else(|e| e.into_inner())
      .push((level, message.to_string()));
  }
}
