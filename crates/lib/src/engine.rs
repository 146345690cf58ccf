//! Public entry points.
//!
//! Every operation here reports its decisions through the engine's
//! [`Logger`]. Environment failures (I/O errors from the filesystem or from
//! spawning commands) are logged at [`LogLevel::Error`] and reported as "no
//! change" so a run can carry on with its next object. Configuration errors,
//! unsupported object kinds and objects that changed while being inspected
//! are returned to the caller.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::attrs::{AttrSpec, LabelStore, NoLabels, SyncPolicy, XattrLabels, reconcile_attributes};
use crate::command::{CommandRunner, ShellRunner};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::link::ensure_symlink;
use crate::lock::{LockHandle, LockManager};
use crate::log::{LogLevel, Logger, TracingLogger};
use crate::remove::{RemovalPredicate, RemoveOptions, remove_backed, remove_where};
use crate::service::{self, ServiceError};
use crate::sync::Synchronizer;

pub struct Engine {
  logger: Arc<dyn Logger>,
  labels: Arc<dyn LabelStore>,
  runner: Arc<dyn CommandRunner>,
  locks: LockManager,
}

impl Engine {
  /// An engine for this host: tracing output at the configured verbosity,
  /// SELinux labels when selinuxfs is mounted, and `/bin/sh` for commands.
  pub fn new(config: &EngineConfig) -> Self {
    let labels: Arc<dyn LabelStore> = if XattrLabels.available() {
      Arc::new(XattrLabels)
    } else {
      Arc::new(NoLabels)
    };
    Self {
      logger: Arc::new(TracingLogger::new(config.verbosity)),
      labels,
      runner: Arc::new(ShellRunner::default()),
      locks: LockManager::new(&config.lock_dir),
    }
  }

  pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
    self.logger = logger;
    self
  }

  pub fn with_labels(mut self, labels: Arc<dyn LabelStore>) -> Self {
    self.labels = labels;
    self
  }

  pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
    self.runner = runner;
    self
  }

  pub fn logger(&self) -> &dyn Logger {
    self.logger.as_ref()
  }

  /// Makes `dst` a copy of the file, symlink or directory tree at `src`.
  pub fn synchronize(&self, src: &Path, dst: &Path, policy: &SyncPolicy) -> Result<bool> {
    debug!(src = %src.display(), dst = %dst.display(), "synchronize");
    let outcome = policy
      .attrs
      .validate(self.labels.as_ref())
      .and_then(|()| Synchronizer::new(policy, self.labels.as_ref(), self.logger.as_ref()).synchronize(src, dst));
    self.settle(outcome)
  }

  /// Makes `dst` a symlink to `target`.
  pub fn link(&self, target: &Path, dst: &Path, attrs: &AttrSpec, backup: bool) -> Result<bool> {
    let outcome = ensure_symlink(target, dst, attrs, backup, self.labels.as_ref(), self.logger.as_ref());
    self.settle(outcome)
  }

  /// Makes sure nothing exists at `dst`, optionally keeping a backup.
  pub fn remove(&self, dst: &Path, backup: bool) -> Result<bool> {
    let outcome = remove_backed(dst, backup, self.logger.as_ref());
    if let Ok(false) = outcome {
      self
        .logger
        .emit(LogLevel::NoAction, &format!("{} is already absent", dst.display()));
    }
    self.settle(outcome)
  }

  /// Removes everything below `dst` selected by `predicate`.
  pub fn remove_where(&self, dst: &Path, predicate: &RemovalPredicate, options: RemoveOptions) -> Result<bool> {
    let outcome = remove_where(dst, predicate, options, self.logger.as_ref());
    self.settle(outcome)
  }

  /// Brings the metadata of `path` in line with `attrs`.
  pub fn reconcile_attributes(&self, path: &Path, attrs: &AttrSpec) -> Result<bool> {
    let outcome = reconcile_attributes(path, attrs, self.labels.as_ref(), self.logger.as_ref());
    self.settle(outcome)
  }

  /// Claims the lock file at `lock_path`, or returns `None` if it is held or
  /// cannot be created.
  pub fn acquire_lock(&self, lock_path: &Path) -> Option<LockHandle> {
    self.claim(lock_path, self.locks.acquire(lock_path))
  }

  /// Claims a lock by name inside the configured lock directory.
  pub fn acquire_named_lock(&self, name: &str) -> Option<LockHandle> {
    let path = self.locks.named_path(name);
    self.claim(&path, self.locks.acquire_named(name))
  }

  pub fn release_lock(&self, handle: LockHandle) {
    let path = handle.lock_path().to_path_buf();
    match self.locks.release(handle) {
      Ok(()) => self
        .logger
        .emit(LogLevel::Action, &format!("Released lock {}", path.display())),
      Err(e) => self
        .logger
        .emit(LogLevel::Error, &format!("Error: {}: {}", path.display(), e)),
    }
  }

  pub fn enable_service(&self, name: &str) -> std::result::Result<bool, ServiceError> {
    let outcome = service::enable_service(self.runner.as_ref(), self.logger.as_ref(), name);
    self.settle_command(outcome)
  }

  pub fn disable_service(&self, name: &str) -> std::result::Result<bool, ServiceError> {
    let outcome = service::disable_service(self.runner.as_ref(), self.logger.as_ref(), name);
    self.settle_command(outcome)
  }

  pub fn install_package(&self, name: &str) -> std::result::Result<bool, ServiceError> {
    let outcome = service::install_package(self.runner.as_ref(), self.logger.as_ref(), name);
    self.settle_command(outcome)
  }

  /// Runs a command line and returns its exit status, or `None` if it could
  /// not be started.
  pub fn shell_command(&self, command_line: &str) -> Option<i32> {
    self
      .logger
      .emit(LogLevel::Action, &format!("Running \"{}\"", command_line));
    match self.runner.run(command_line) {
      Ok(code) => Some(code),
      Err(e) => {
        self
          .logger
          .emit(LogLevel::Error, &format!("Error: {}: {}", command_line, e));
        None
      }
    }
  }

  fn claim<E: std::fmt::Display>(&self, path: &Path, outcome: std::result::Result<LockHandle, E>) -> Option<LockHandle> {
    match outcome {
      Ok(handle) => {
        self
          .logger
          .emit(LogLevel::Action, &format!("Acquired lock {}", path.display()));
        Some(handle)
      }
      Err(e) => {
        self.logger.emit(
          LogLevel::Error,
          &format!("Error: unable to acquire lock {}: {}", path.display(), e),
        );
        None
      }
    }
  }

  fn settle(&self, outcome: Result<bool>) -> Result<bool> {
    match outcome {
      Err(e) if e.is_environment() => {
        self.logger.emit(LogLevel::Error, &format!("Error: {}", e));
        Ok(false)
      }
      Err(e) => {
        self.logger.emit(LogLevel::Error, &format!("Error: {}", e));
        Err(e)
      }
      ok => ok,
    }
  }

  fn settle_command(&self, outcome: std::result::Result<bool, ServiceError>) -> std::result::Result<bool, ServiceError> {
    match outcome {
      Err(e @ ServiceError::Run { .. }) => {
        self.logger.emit(LogLevel::Error, &format!("Error: {}", e));
        Ok(false)
      }
      other => other,
    }
  }
}
