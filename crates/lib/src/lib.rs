//! convergefs-lib: convergent filesystem reconciliation.
//!
//! Every operation checks the current state of a filesystem object, acts
//! only where it diverges from the desired state, and reports whether
//! anything changed. Running an operation twice leaves the second run with
//! nothing to do.
//!
//! - `sync`: make a destination file, symlink or directory tree match a source
//! - `attrs`: converge owner, group, permission bits and security label
//! - `remove`: delete or back up objects, optionally selected by a predicate
//! - `lock`: PID-stamped lock files serializing runs
//! - `engine`: the public entry points, which log decisions and absorb
//!   environment failures
//!
//! Unix only.

pub mod attrs;
pub mod command;
pub mod compare;
pub mod config;
pub mod consts;
pub mod engine;
pub mod error;
pub mod fsobj;
pub mod link;
pub mod lock;
pub mod log;
pub mod remove;
pub mod service;
pub mod sync;

pub use attrs::{AttrSpec, LabelSpec, Mode, Principal, SecurityLabel, SyncPolicy};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ReconcileError, Result};
pub use lock::{LockError, LockHandle, LockManager};
pub use log::{LogLevel, Logger, MemoryLogger, TracingLogger};
pub use remove::{RemovalPredicate, RemoveOptions, Timestamp};
