use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

/// Which of an object's timestamps an age check reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timestamp {
  #[default]
  Modified,
  Accessed,
  StatusChanged,
}

impl Timestamp {
  pub fn read(self, meta: &Metadata) -> SystemTime {
    let (secs, nsecs) = match self {
      Timestamp::Modified => (meta.mtime(), meta.mtime_nsec()),
      Timestamp::Accessed => (meta.atime(), meta.atime_nsec()),
      Timestamp::StatusChanged => (meta.ctime(), meta.ctime_nsec()),
    };
    let nanos = Duration::from_nanos(u64::try_from(nsecs).unwrap_or(0));
    match u64::try_from(secs) {
      Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs) + nanos,
      Err(_) => UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + nanos,
    }
  }
}

/// Decides whether a single object should be removed.
#[derive(Debug, Clone)]
pub enum RemovalPredicate {
  Always,
  Never,
  /// Objects whose chosen timestamp is at least `threshold` in the past.
  /// Without a threshold every object matches.
  OlderThan {
    threshold: Option<Duration>,
    timestamp: Timestamp,
  },
  /// Objects whose full path contains a match for the expression.
  NameMatches(Regex),
}

impl RemovalPredicate {
  pub fn older_than(threshold: Duration, timestamp: Timestamp) -> Self {
    RemovalPredicate::OlderThan {
      threshold: Some(threshold),
      timestamp,
    }
  }

  pub fn name_matches(pattern: &str) -> Result<Self> {
    Regex::new(pattern)
      .map(RemovalPredicate::NameMatches)
      .map_err(|e| ReconcileError::config(format!("bad removal pattern {pattern:?}: {e}")))
  }

  pub fn matches(&self, path: &Path, meta: &Metadata, now: SystemTime) -> bool {
    match self {
      RemovalPredicate::Always => true,
      RemovalPredicate::Never => false,
      RemovalPredicate::OlderThan { threshold: None, .. } => true,
      RemovalPredicate::OlderThan {
        threshold: Some(threshold),
        timestamp,
      } => now
        .duration_since(timestamp.read(meta))
        .is_ok_and(|age| age >= *threshold),
      RemovalPredicate::NameMatches(pattern) => pattern.is_match(&path.to_string_lossy()),
    }
  }
}
