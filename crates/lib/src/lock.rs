//! PID-stamped lock files for serializing reconciliation runs.
//!
//! A lock is a file created with `O_CREAT | O_EXCL` holding the ASCII
//! decimal PID of its holder. A lock whose holder is no longer running is
//! stale and is reclaimed, with exactly one retry, by the next acquirer.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::consts::LOCK_EXTENSION;

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "lock {} is held by process {pid}\n\
     If you're sure that process is gone, remove the lock file.",
    .lock_path.display()
  )]
  Contention { pid: u32, lock_path: PathBuf },

  #[error(
    "lock {} is held (could not read holder PID)\n\
     If no reconciliation run is active, remove the lock file.",
    .lock_path.display()
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to create lock directory {}: {source}", .path.display())]
  CreateDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to create lock {}: {source}", .lock_path.display())]
  Create {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write PID to lock {}: {source}", .lock_path.display())]
  WritePid {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to remove stale lock {}: {source}", .lock_path.display())]
  RemoveStale {
    lock_path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// A held lock. Dropping the handle releases it.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the handle is dropped"]
pub struct LockHandle {
  lock_path: PathBuf,
  pid: u32,
  released: bool,
}

impl LockHandle {
  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }

  pub fn pid(&self) -> u32 {
    self.pid
  }

  fn unlink(&mut self) -> io::Result<()> {
    self.released = true;
    match fs::remove_file(&self.lock_path) {
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
      other => other,
    }
  }
}

impl Drop for LockHandle {
  fn drop(&mut self) {
    if !self.released
      && let Err(e) = self.unlink()
    {
      warn!(lock = %self.lock_path.display(), error = %e, "failed to release lock on drop");
    }
  }
}

/// Recorded holder of an existing lock file.
enum Holder {
  Pid(u32),
  Gone,
  Unreadable,
}

#[derive(Debug, Clone)]
pub struct LockManager {
  lock_dir: PathBuf,
}

impl LockManager {
  /// A manager whose named locks live in `lock_dir`.
  pub fn new(lock_dir: impl Into<PathBuf>) -> Self {
    Self {
      lock_dir: lock_dir.into(),
    }
  }

  pub fn lock_dir(&self) -> &Path {
    &self.lock_dir
  }

  /// Path of the named lock `name` inside the lock directory.
  pub fn named_path(&self, name: &str) -> PathBuf {
    self.lock_dir.join(format!("{name}.{LOCK_EXTENSION}"))
  }

  /// Acquires `<lock_dir>/<name>.lock`, creating the lock directory if needed.
  pub fn acquire_named(&self, name: &str) -> Result<LockHandle, LockError> {
    if !self.lock_dir.exists() {
      fs::create_dir_all(&self.lock_dir).map_err(|source| LockError::CreateDir {
        path: self.lock_dir.clone(),
        source,
      })?;
    }
    self.acquire(&self.named_path(name))
  }

  /// Claims the lock file at `lock_path`.
  ///
  /// An existing lock whose recorded process is no longer alive is removed
  /// and the claim retried once.
  pub fn acquire(&self, lock_path: &Path) -> Result<LockHandle, LockError> {
    if let Some(handle) = try_create(lock_path)? {
      return Ok(handle);
    }

    match read_holder(lock_path) {
      Holder::Pid(pid) if process_alive(pid) => {
        return Err(LockError::Contention {
          pid,
          lock_path: lock_path.to_path_buf(),
        });
      }
      Holder::Pid(pid) => {
        warn!(lock = %lock_path.display(), pid, "removing stale lock");
        match fs::remove_file(lock_path) {
          Ok(()) => {}
          Err(e) if e.kind() == io::ErrorKind::NotFound => {}
          Err(source) => {
            return Err(LockError::RemoveStale {
              lock_path: lock_path.to_path_buf(),
              source,
            });
          }
        }
      }
      Holder::Gone => {}
      Holder::Unreadable => {
        return Err(LockError::ContentionUnknown {
          lock_path: lock_path.to_path_buf(),
        });
      }
    }

    match try_create(lock_path)? {
      Some(handle) => Ok(handle),
      None => Err(contention(lock_path)),
    }
  }

  /// Deletes the lock file. A lock that is already gone is not an error.
  pub fn release(&self, mut handle: LockHandle) -> io::Result<()> {
    debug!(lock = %handle.lock_path.display(), "releasing lock");
    handle.unlink()
  }
}

/// Exclusively creates the lock file. `None` means it already exists.
fn try_create(lock_path: &Path) -> Result<Option<LockHandle>, LockError> {
  let mut file = match OpenOptions::new().write(true).create_new(true).open(lock_path) {
    Ok(file) => file,
    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(None),
    Err(source) => {
      return Err(LockError::Create {
        lock_path: lock_path.to_path_buf(),
        source,
      });
    }
  };

  let pid = std::process::id();
  if let Err(source) = write_pid(&mut file, pid) {
    let _ = fs::remove_file(lock_path);
    return Err(LockError::WritePid {
      lock_path: lock_path.to_path_buf(),
      source,
    });
  }

  debug!(lock = %lock_path.display(), pid, "acquired lock");
  Ok(Some(LockHandle {
    lock_path: lock_path.to_path_buf(),
    pid,
    released: false,
  }))
}

fn write_pid(file: &mut File, pid: u32) -> io::Result<()> {
  write!(file, "{}", pid)?;
  file.flush()
}

fn read_holder(lock_path: &Path) -> Holder {
  match fs::read_to_string(lock_path) {
    Ok(contents) => match contents.trim().parse::<u32>() {
      Ok(pid) => Holder::Pid(pid),
      Err(_) => Holder::Unreadable,
    },
    Err(e) if e.kind() == io::ErrorKind::NotFound => Holder::Gone,
    Err(_) => Holder::Unreadable,
  }
}

fn contention(lock_path: &Path) -> LockError {
  match read_holder(lock_path) {
    Holder::Pid(pid) => LockError::Contention {
      pid,
      lock_path: lock_path.to_path_buf(),
    },
    _ => LockError::ContentionUnknown {
      lock_path: lock_path.to_path_buf(),
    },
  }
}

/// Whether a process with this PID exists.
///
/// Uses `kill(pid, 0)`; a permission error still means the process exists.
pub fn process_alive(pid: u32) -> bool {
  use rustix::io::Errno;
  use rustix::process::{Pid, test_kill_process};

  let Some(pid) = i32::try_from(pid).ok().and_then(Pid::from_raw) else {
    return false;
  };
  match test_kill_process(pid) {
    Ok(()) => true,
    Err(Errno::PERM) => true,
    Err(_) => false,
  }
}
