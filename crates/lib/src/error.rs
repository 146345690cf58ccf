//! Error taxonomy shared by the reconciliation engine.
//!
//! Internal helpers propagate every variant with `?`. The public entry points
//! on [`crate::engine::Engine`] downgrade [`ReconcileError::Io`] to a logged
//! "no change" outcome and hand everything else back to the caller.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T, E = ReconcileError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ReconcileError {
  /// The desired state is malformed or contradictory. Never retried.
  #[error("configuration error: {0}")]
  Config(String),

  /// A device, pipe, socket or other object the engine cannot copy.
  #[error("{} is not a regular file, a symlink, or a directory", .path.display())]
  UnsupportedKind { path: PathBuf },

  /// An object changed kind between being inspected and being acted on.
  #[error("{} changed as we were watching (expected {expected})", .path.display())]
  ChangedWhileWatching { path: PathBuf, expected: &'static str },

  /// The underlying filesystem refused an operation.
  #[error("{}: {source}", .path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl ReconcileError {
  pub fn config(message: impl Into<String>) -> Self {
    Self::Config(message.into())
  }

  /// Whether this is an environment failure that public operations absorb.
  pub fn is_environment(&self) -> bool {
    matches!(self, Self::Io { .. })
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
  }
}

/// Attaches the offending path to an I/O error.
pub trait IoResultExt<T> {
  fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
  fn at(self, path: &Path) -> Result<T> {
    self.map_err(|source| ReconcileError::Io {
      path: path.to_path_buf(),
      source,
    })
  }
}
