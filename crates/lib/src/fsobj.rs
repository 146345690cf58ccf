//! Fresh, uncached snapshots of filesystem objects.
//!
//! Every helper here re-reads the filesystem; nothing is cached between calls.

use std::ffi::OsString;
use std::fs::{self, FileType, Metadata};
use std::io;
use std::path::Path;

use crate::error::{IoResultExt, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
  File,
  Symlink,
  Dir,
  /// Devices, pipes and sockets.
  Other,
}

impl ObjectKind {
  pub fn of(file_type: FileType) -> Self {
    if file_type.is_symlink() {
      Self::Symlink
    } else if file_type.is_dir() {
      Self::Dir
    } else if file_type.is_file() {
      Self::File
    } else {
      Self::Other
    }
  }

  pub fn describe(self) -> &'static str {
    match self {
      Self::File => "a regular file",
      Self::Symlink => "a symlink",
      Self::Dir => "a directory",
      Self::Other => "a special file",
    }
  }
}

/// `lstat` the path. Symlinks are never followed.
pub fn lstat(path: &Path) -> Result<Metadata> {
  fs::symlink_metadata(path).at(path)
}

/// Like [`lstat`], but a missing object is `None` rather than an error.
pub fn lstat_opt(path: &Path) -> Result<Option<Metadata>> {
  match fs::symlink_metadata(path) {
    Ok(meta) => Ok(Some(meta)),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e).at(path),
  }
}

/// `stat` the path, falling back to `lstat` for dangling symlinks.
pub fn stat_following(path: &Path) -> Result<Metadata> {
  match fs::metadata(path) {
    Ok(meta) => Ok(meta),
    Err(e) if e.kind() == io::ErrorKind::NotFound => lstat(path),
    Err(e) => Err(e).at(path),
  }
}

/// Child names of a directory in byte-wise lexicographic order.
pub fn sorted_children(dir: &Path) -> Result<Vec<OsString>> {
  let mut names = Vec::new();
  for entry in fs::read_dir(dir).at(dir)? {
    names.push(entry.at(dir)?.file_name());
  }
  names.sort();
  Ok(names)
}
