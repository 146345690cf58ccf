use std::collections::HashSet;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ReconcileError, Result};
use crate::fsobj::{lstat, lstat_opt, sorted_children, stat_following};
use crate::log::{LogLevel, Logger};

use super::{RemovalPredicate, remove_backed};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveOptions {
  /// Evaluate predicates against symlink targets and descend through links
  /// to directories.
  pub follow_links: bool,
  /// Rename matches aside instead of deleting them.
  pub backup: bool,
  /// Deepest level examined; 1 means immediate children only.
  pub max_depth: Option<usize>,
}

/// Removes every object beneath `root` that `predicate` selects.
///
/// `root` itself is never removed. A directory that does not match is
/// descended into instead, and kept even if it ends up empty.
pub fn remove_where(root: &Path, predicate: &RemovalPredicate, options: RemoveOptions, log: &dyn Logger) -> Result<bool> {
  let meta = match lstat_opt(root)? {
    Some(meta) if options.follow_links => stat_following(root).unwrap_or(meta),
    Some(meta) => meta,
    None => return Err(ReconcileError::config(format!("{} does not exist", root.display()))),
  };
  if !meta.is_dir() {
    return Err(ReconcileError::config(format!("{} is not a directory", root.display())));
  }

  let mut pruner = Pruner {
    predicate,
    options,
    now: SystemTime::now(),
    log,
    visited: HashSet::new(),
  };
  pruner.visited.insert((meta.dev(), meta.ino()));

  let changed = pruner.prune(root, 1)?;
  if !changed {
    log.emit(LogLevel::NoAction, &format!("Nothing to remove in {}", root.display()));
  }
  Ok(changed)
}

struct Pruner<'a> {
  predicate: &'a RemovalPredicate,
  options: RemoveOptions,
  now: SystemTime,
  log: &'a dyn Logger,
  /// Directories already entered, guarding against link cycles.
  visited: HashSet<(u64, u64)>,
}

impl Pruner<'_> {
  fn prune(&mut self, dir: &Path, depth: usize) -> Result<bool> {
    let mut changed = false;

    for name in sorted_children(dir)? {
      let path = dir.join(&name);
      let meta = if self.options.follow_links {
        stat_following(&path)?
      } else {
        lstat(&path)?
      };

      if self.predicate.matches(&path, &meta, self.now) {
        changed |= remove_backed(&path, self.options.backup, self.log)?;
        continue;
      }

      let descend = meta.is_dir() && self.options.max_depth.is_none_or(|max| depth < max);
      if descend && self.visited.insert((meta.dev(), meta.ino())) {
        trace!(path = %path.display(), depth, "descending");
        changed |= self.prune(&path, depth + 1)?;
      }
    }

    Ok(changed)
  }
}
