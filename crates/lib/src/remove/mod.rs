//! Deleting or archiving filesystem objects.
//!
//! An object is either renamed aside to `<name>.<ISO-8601 timestamp>` (a
//! backup) or deleted, recursively for directories. [`remove_where`] prunes
//! the contents of a directory selectively using a [`RemovalPredicate`].

mod predicate;
mod walk;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::debug;
use walkdir::WalkDir;

use crate::consts::BACKUP_TIMESTAMP_FORMAT;
use crate::error::{IoResultExt, Result};
use crate::fsobj::lstat_opt;
use crate::log::{LogLevel, Logger};

pub use predicate::{RemovalPredicate, Timestamp};
pub use walk::{RemoveOptions, remove_where};

/// The sibling path a backup of `path` taken at `at` is renamed to.
pub fn backup_path(path: &Path, at: DateTime<Local>) -> PathBuf {
  let mut name = OsString::from(path.as_os_str());
  name.push(".");
  name.push(at.format(BACKUP_TIMESTAMP_FORMAT).to_string());
  PathBuf::from(name)
}

/// Backs up or deletes `path`. A missing path is not an error.
///
/// Returns whether anything was removed.
pub fn remove_backed(path: &Path, backup: bool, log: &dyn Logger) -> Result<bool> {
  let Some(meta) = lstat_opt(path)? else {
    return Ok(false);
  };

  if backup {
    let target = backup_path(path, Local::now());
    log.emit(
      LogLevel::Action,
      &format!("Backing up {} to {}", path.display(), target.display()),
    );
    fs::rename(path, &target).at(path)?;
  } else {
    log.emit(LogLevel::Action, &format!("Deleting {}", path.display()));
    if meta.is_dir() {
      delete_tree(path)?;
    } else {
      fs::remove_file(path).at(path)?;
    }
  }
  Ok(true)
}

/// Deletes a directory and everything beneath it without following links.
fn delete_tree(path: &Path) -> Result<()> {
  debug!(path = %path.display(), "deleting tree");

  for entry in WalkDir::new(path).follow_links(false).contents_first(true) {
    let entry = entry.map_err(walk_error).at(path)?;
    if entry.file_type().is_dir() {
      fs::remove_dir(entry.path()).at(entry.path())?;
    } else {
      fs::remove_file(entry.path()).at(entry.path())?;
    }
  }
  Ok(())
}

fn walk_error(err: walkdir::Error) -> io::Error {
  err.into_io_error().unwrap_or_else(|| io::Error::other("filesystem loop while walking tree"))
}
