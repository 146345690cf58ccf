//! Service and package state, converged through probe commands.
//!
//! Each helper probes the current state with a status command and only runs
//! the changing command when the probe says it is needed.

use std::io;

use thiserror::Error;

use crate::command::CommandRunner;
use crate::log::{LogLevel, Logger};

#[derive(Debug, Error)]
pub enum ServiceError {
  #[error("invalid service or package name: {0:?}")]
  InvalidName(String),

  #[error("failed to run {command:?}: {source}")]
  Run {
    command: String,
    #[source]
    source: io::Error,
  },
}

/// Names are interpolated into shell command lines, so only a conservative
/// character set is accepted.
fn check_name(name: &str) -> Result<(), ServiceError> {
  let valid = !name.is_empty()
    && !name.starts_with('-')
    && name
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | '+' | ':'));
  if valid {
    Ok(())
  } else {
    Err(ServiceError::InvalidName(name.to_string()))
  }
}

fn run(runner: &dyn CommandRunner, log: &dyn Logger, command: String, quiet: bool) -> Result<i32, ServiceError> {
  if !quiet {
    log.emit(LogLevel::Action, &format!("Running \"{}\"", command));
  }
  runner.run(&command).map_err(|source| ServiceError::Run { command, source })
}

/// Ensures the service is running now and starts on boot.
pub fn enable_service(runner: &dyn CommandRunner, log: &dyn Logger, name: &str) -> Result<bool, ServiceError> {
  check_name(name)?;
  let mut changed = false;

  if run(runner, log, format!("/sbin/service {name} status > /dev/null"), true)? != 0 {
    log.emit(LogLevel::Action, &format!("Starting {}", name));
    run(runner, log, format!("/sbin/service {name} start"), false)?;
    changed = true;
  } else {
    log.emit(LogLevel::NoAction, &format!("{} is already running", name));
  }

  if run(runner, log, format!("/sbin/chkconfig --list {name} | grep -q \":on\""), true)? != 0 {
    log.emit(LogLevel::Action, &format!("Turning on {}", name));
    run(runner, log, format!("/sbin/chkconfig {name} on"), false)?;
    changed = true;
  } else {
    log.emit(LogLevel::NoAction, &format!("{} is already on", name));
  }

  Ok(changed)
}

/// Ensures the service is stopped now and does not start on boot.
pub fn disable_service(runner: &dyn CommandRunner, log: &dyn Logger, name: &str) -> Result<bool, ServiceError> {
  check_name(name)?;
  let mut changed = false;

  if run(runner, log, format!("/sbin/service {name} status > /dev/null"), true)? == 0 {
    log.emit(LogLevel::Action, &format!("Stopping {}", name));
    run(runner, log, format!("/sbin/service {name} stop"), false)?;
    changed = true;
  } else {
    log.emit(LogLevel::NoAction, &format!("{} is already stopped", name));
  }

  if run(runner, log, format!("/sbin/chkconfig --list {name} | grep -q \":on\""), true)? == 0 {
    log.emit(LogLevel::Action, &format!("Turning off {}", name));
    run(runner, log, format!("/sbin/chkconfig {name} off"), false)?;
    changed = true;
  } else {
    log.emit(LogLevel::NoAction, &format!("{} is already off", name));
  }

  Ok(changed)
}

/// Installs the package unless the package database already knows it.
pub fn install_package(runner: &dyn CommandRunner, log: &dyn Logger, name: &str) -> Result<bool, ServiceError> {
  check_name(name)?;

  if run(runner, log, format!("/bin/rpm -q {name} > /dev/null"), true)? == 0 {
    log.emit(LogLevel::NoAction, &format!("{} is already installed", name));
    return Ok(false);
  }

  log.emit(LogLevel::Action, &format!("Installing {}", name));
  run(runner, log, format!("/usr/bin/yum -e 0 -d 0 -y install {name}"), false)?;
  Ok(true)
}
