//! Making a destination tree match a source tree.
//!
//! Regular files and symlinks are copied only when the destination differs.
//! Directories are merged: both child lists are sorted and walked side by
//! side, every source child is synchronized (so attribute drift is corrected
//! even when contents already match), and destination-only children are
//! purged on request. Attributes are reconciled after content converges.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::symlink;
use std::path::Path;

use tracing::debug;

use crate::attrs::{LabelStore, SyncPolicy, reconcile_attributes};
use crate::compare::{files_equal, links_equal};
use crate::error::{IoResultExt, ReconcileError, Result};
use crate::fsobj::{ObjectKind, lstat, lstat_opt, sorted_children};
use crate::log::{LogLevel, Logger};
use crate::remove::remove_backed;

pub struct Synchronizer<'a> {
  policy: &'a SyncPolicy,
  labels: &'a dyn LabelStore,
  log: &'a dyn Logger,
}

impl<'a> Synchronizer<'a> {
  pub fn new(policy: &'a SyncPolicy, labels: &'a dyn LabelStore, log: &'a dyn Logger) -> Self {
    Self { policy, labels, log }
  }

  /// Synchronizes `dst` with `src`, returning whether anything changed.
  pub fn synchronize(&self, src: &Path, dst: &Path) -> Result<bool> {
    let kind = ObjectKind::of(lstat(src)?.file_type());
    let changed = self.sync_entry(src, dst, kind, true)?;
    if !changed {
      self.log.emit(
        LogLevel::NoAction,
        &format!("{} is already the same as {}", dst.display(), src.display()),
      );
    }
    Ok(changed)
  }

  /// Copies one object of the given kind and reconciles its attributes.
  fn sync_entry(&self, src: &Path, dst: &Path, kind: ObjectKind, top: bool) -> Result<bool> {
    let copied = match kind {
      ObjectKind::File => self.copy_file(src, dst)?,
      ObjectKind::Symlink => self.copy_link(src, dst)?,
      ObjectKind::Dir => return self.sync_dir(src, dst, top),
      ObjectKind::Other => {
        return Err(ReconcileError::UnsupportedKind { path: src.to_path_buf() });
      }
    };
    let fixed = self.reconcile_from(src, dst)?;
    Ok(copied | fixed)
  }

  fn copy_file(&self, src: &Path, dst: &Path) -> Result<bool> {
    expect_kind(src, ObjectKind::File)?;
    let existing = lstat_opt(dst)?;
    if existing.as_ref().is_some_and(|m| m.is_file()) && files_equal(src, dst)? {
      return Ok(false);
    }
    if existing.is_some() {
      remove_backed(dst, self.policy.backup_on_replace, self.log)?;
    }

    self.log.emit(
      LogLevel::Action,
      &format!("Copying {} to {}", src.display(), dst.display()),
    );
    let mut reader = File::open(src).at(src)?;
    let mut writer = File::create(dst).at(dst)?;
    io::copy(&mut reader, &mut writer).at(dst)?;
    Ok(true)
  }

  fn copy_link(&self, src: &Path, dst: &Path) -> Result<bool> {
    expect_kind(src, ObjectKind::Symlink)?;
    let existing = lstat_opt(dst)?;
    if existing.as_ref().is_some_and(|m| m.file_type().is_symlink()) && links_equal(src, dst)? {
      return Ok(false);
    }
    if existing.is_some() {
      remove_backed(dst, self.policy.backup_on_replace, self.log)?;
    }

    let target = fs::read_link(src).at(src)?;
    self.log.emit(
      LogLevel::Action,
      &format!("Copying {} to {}", src.display(), dst.display()),
    );
    symlink(&target, dst).at(dst)?;
    Ok(true)
  }

  fn sync_dir(&self, src: &Path, dst: &Path, top: bool) -> Result<bool> {
    expect_kind(src, ObjectKind::Dir)?;
    let mut changed = false;

    match lstat_opt(dst)? {
      Some(meta) if meta.is_dir() => {}
      existing => {
        if existing.is_some() {
          // A non-directory cannot be kept beside its replacement.
          remove_backed(dst, false, self.log)?;
        }
        self.log.emit(
          LogLevel::Action,
          &format!("Copying {} to {}", src.display(), dst.display()),
        );
        fs::create_dir(dst).at(dst)?;
        changed = true;
      }
    }
    changed |= self.reconcile_from(src, dst)?;

    let src_names = sorted_children(src)?;
    let dst_names = sorted_children(dst)?;
    debug!(
      src = %src.display(),
      dst = %dst.display(),
      src_entries = src_names.len(),
      dst_entries = dst_names.len(),
      top,
      "merging directory"
    );

    let (mut i, mut j) = (0, 0);
    loop {
      let order = match (src_names.get(i), dst_names.get(j)) {
        (None, None) => break,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(s), Some(d)) => s.cmp(d),
      };

      match order {
        Ordering::Less | Ordering::Equal => {
          let name = &src_names[i];
          changed |= self.sync_child(&src.join(name), &dst.join(name))?;
          i += 1;
          if order == Ordering::Equal {
            j += 1;
          }
        }
        Ordering::Greater => {
          if self.policy.purge_extras {
            changed |= remove_backed(&dst.join(&dst_names[j]), false, self.log)?;
          }
          j += 1;
        }
      }
    }

    Ok(changed)
  }

  fn sync_child(&self, src: &Path, dst: &Path) -> Result<bool> {
    let kind = ObjectKind::of(lstat(src)?.file_type());
    self.sync_entry(src, dst, kind, false)
  }

  /// Reconciles `dst`'s attributes against values derived from `src`.
  fn reconcile_from(&self, src: &Path, dst: &Path) -> Result<bool> {
    let desired = self.policy.attrs.derive_from(&lstat(src)?);
    reconcile_attributes(dst, &desired, self.labels, self.log)
  }
}

/// Re-checks the kind of `path` immediately before acting on it.
fn expect_kind(path: &Path, expected: ObjectKind) -> Result<()> {
  let actual = ObjectKind::of(lstat(path)?.file_type());
  if actual == expected {
    Ok(())
  } else if actual == ObjectKind::Other {
    Err(ReconcileError::UnsupportedKind { path: path.to_path_buf() })
  } else {
    Err(ReconcileError::ChangedWhileWatching {
      path: path.to_path_buf(),
      expected: expected.describe(),
    })
  }
}
