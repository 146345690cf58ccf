//! Content equality for regular files and symlinks.
//!
//! Files compare by length first, then by a SHA-256 digest of their whole
//! contents. Symlinks compare by their raw target bytes. Objects of
//! different kinds are never equal.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::consts::DIGEST_BUF_SIZE;
use crate::error::{IoResultExt, Result};
use crate::fsobj::lstat;

/// SHA-256 of a file's contents.
pub fn digest_file(path: &Path) -> Result<Vec<u8>> {
  let mut file = File::open(path).at(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; DIGEST_BUF_SIZE];

  loop {
    let bytes_read = file.read(&mut buffer).at(path)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hasher.finalize().to_vec())
}

/// Whether `a` and `b` are both regular files with identical contents.
pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
  let meta_a = lstat(a)?;
  let meta_b = lstat(b)?;
  if !meta_a.is_file() || !meta_b.is_file() {
    return Ok(false);
  }
  if meta_a.len() != meta_b.len() {
    return Ok(false);
  }
  Ok(digest_file(a)? == digest_file(b)?)
}

/// Whether `a` and `b` are both symlinks with byte-identical targets.
pub fn links_equal(a: &Path, b: &Path) -> Result<bool> {
  let meta_a = lstat(a)?;
  let meta_b = lstat(b)?;
  if !meta_a.file_type().is_symlink() || !meta_b.file_type().is_symlink() {
    return Ok(false);
  }
  Ok(fs::read_link(a).at(a)? == fs::read_link(b).at(b)?)
}
