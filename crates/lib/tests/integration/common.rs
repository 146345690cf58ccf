//! Shared test helpers for library integration tests.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use convergefs_lib::attrs::NoLabels;
use convergefs_lib::{Engine, EngineConfig, LogLevel, MemoryLogger};
use tempfile::TempDir;

/// Isolated test environment.
///
/// Each test gets its own temporary directory with `src`, `dst` and `locks`
/// paths beneath it, and an engine reporting into memory.
pub struct TestEnv {
  pub temp: TempDir,
  pub engine: Engine,
  pub log: Arc<MemoryLogger>,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let log = Arc::new(MemoryLogger::new());
    let config = EngineConfig {
      verbosity: Some(LogLevel::NoAction),
      lock_dir: temp.path().join("locks"),
    };
    let engine = Engine::new(&config)
      .with_logger(log.clone())
      .with_labels(Arc::new(NoLabels));
    Self { temp, engine, log }
  }

  pub fn src(&self) -> PathBuf {
    self.temp.path().join("src")
  }

  pub fn dst(&self) -> PathBuf {
    self.temp.path().join("dst")
  }

  pub fn path(&self, relative_path: &str) -> PathBuf {
    self.temp.path().join(relative_path)
  }

  /// Write a file relative to the temp directory, creating parents.
  pub fn write_file(&self, relative_path: &str, content: &str) -> PathBuf {
    let path = self.path(relative_path);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
  }

  pub fn read_file(&self, relative_path: &str) -> String {
    std::fs::read_to_string(self.path(relative_path)).unwrap()
  }
}

/// Sorted child names of a directory.
pub fn child_names(dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = std::fs::read_dir(dir)
    .unwrap()
    .map(|e| e.unwrap().file_name().into_string().unwrap())
    .collect();
  names.sort();
  names
}

/// Permission bits of an object, without following links.
pub fn mode_of(path: &Path) -> u32 {
  std::fs::symlink_metadata(path).unwrap().mode() & 0o7777
}
