use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt, lchown};
use std::path::Path;

use tracing::trace;

use crate::attrs::{AttrSpec, LabelStore, Mode};
use crate::error::{IoResultExt, Result};
use crate::fsobj::lstat;
use crate::log::{LogLevel, Logger};

/// Brings the owner, group, permission bits and security label of `path` in
/// line with `spec`, returning whether anything changed.
///
/// The object itself is inspected and modified, never a symlink's target.
/// Owner and group are applied together in a single `lchown`. Permission
/// bits are not reconciled on symlinks, which have none of their own.
pub fn reconcile_attributes(
  path: &Path,
  spec: &AttrSpec,
  labels: &dyn LabelStore,
  log: &dyn Logger,
) -> Result<bool> {
  spec.validate(labels)?;

  let mut meta = lstat(path)?;
  let mut changed = false;

  let current_uid = meta.uid();
  let current_gid = meta.gid();
  let uid = spec.owner.as_ref().map(|p| p.resolve_user()).transpose()?.unwrap_or(current_uid);
  let gid = spec.group.as_ref().map(|p| p.resolve_group()).transpose()?.unwrap_or(current_gid);

  if uid != current_uid || gid != current_gid {
    log.emit(
      LogLevel::Action,
      &format!("Changing owner of {} to ({}, {})", path.display(), uid, gid),
    );
    lchown(path, Some(uid), Some(gid)).at(path)?;
    changed = true;
    // The kernel clears setuid and setgid on an ownership change.
    meta = lstat(path)?;
  }

  if let Some(mode) = spec.mode
    && !meta.file_type().is_symlink()
  {
    let current = Mode::from_st_mode(meta.mode());
    trace!(path = %path.display(), current = %current, wanted = %mode, "checking permissions");
    if current != mode {
      log.emit(
        LogLevel::Action,
        &format!("Changing permissions of {} to {}", path.display(), mode),
      );
      fs::set_permissions(path, fs::Permissions::from_mode(mode.bits())).at(path)?;
      changed = true;
    }
  }

  if spec.label.is_requested() {
    let current = labels.get(path)?;
    let wanted = spec.label.compose(&current);
    if wanted != current {
      log.emit(
        LogLevel::Action,
        &format!("Changing security label of {} to {}", path.display(), wanted),
      );
      labels.set(path, &wanted)?;
      changed = true;
    }
  }

  Ok(changed)
}
