use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use crate::attrs::{AttrSpec, LabelStore, reconcile_attributes};
use crate::error::{IoResultExt, Result};
use crate::fsobj::lstat_opt;
use crate::log::{LogLevel, Logger};
use crate::remove::remove_backed;

/// Ensures `dst` is a symlink whose target is exactly `target`.
///
/// Anything else at `dst` is backed up or deleted first. Only attributes set
/// explicitly in `attrs` are enforced on the link afterwards.
pub fn ensure_symlink(
  target: &Path,
  dst: &Path,
  attrs: &AttrSpec,
  backup: bool,
  labels: &dyn LabelStore,
  log: &dyn Logger,
) -> Result<bool> {
  let existing = lstat_opt(dst)?;
  let linked = match &existing {
    Some(meta) if meta.file_type().is_symlink() => fs::read_link(dst).at(dst)? == target,
    _ => false,
  };

  let mut changed = false;
  if linked {
    log.emit(
      LogLevel::NoAction,
      &format!("{} is already symlinked to {}", dst.display(), target.display()),
    );
  } else {
    if existing.is_some() {
      remove_backed(dst, backup, log)?;
    }
    log.emit(
      LogLevel::Action,
      &format!("Symlinking {} to {}", dst.display(), target.display()),
    );
    symlink(target, dst).at(dst)?;
    changed = true;
  }

  changed |= reconcile_attributes(dst, attrs, labels, log)?;
  Ok(changed)
}
