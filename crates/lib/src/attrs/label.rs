//! Mandatory-access-control security labels.
//!
//! A label is the SELinux-style `user:role:type:level` tuple. The engine
//! reads and writes labels through a [`LabelStore`], so hosts without a
//! label subsystem (and tests) can plug in their own.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SecurityLabel {
  pub user: String,
  pub role: String,
  pub kind: String,
  /// Sensitivity level; may itself contain colons (`s0:c0.c1023`).
  pub level: String,
}

impl SecurityLabel {
  pub fn new(
    user: impl Into<String>,
    role: impl Into<String>,
    kind: impl Into<String>,
    level: impl Into<String>,
  ) -> Self {
    Self {
      user: user.into(),
      role: role.into(),
      kind: kind.into(),
      level: level.into(),
    }
  }
}

impl FromStr for SecurityLabel {
  type Err = ReconcileError;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim_end_matches('\0');
    let mut parts = s.splitn(4, ':');
    let (Some(user), Some(role), Some(kind)) = (parts.next(), parts.next(), parts.next()) else {
      return Err(ReconcileError::config(format!("malformed security label: {s:?}")));
    };
    if user.is_empty() || role.is_empty() || kind.is_empty() {
      return Err(ReconcileError::config(format!("malformed security label: {s:?}")));
    }
    Ok(Self::new(user, role, kind, parts.next().unwrap_or_default()))
  }
}

impl TryFrom<String> for SecurityLabel {
  type Error = ReconcileError;

  fn try_from(s: String) -> Result<Self> {
    s.parse()
  }
}

impl From<SecurityLabel> for String {
  fn from(label: SecurityLabel) -> String {
    label.to_string()
  }
}

impl fmt::Display for SecurityLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}:{}", self.user, self.role, self.kind)?;
    if !self.level.is_empty() {
      write!(f, ":{}", self.level)?;
    }
    Ok(())
  }
}

/// Individual label components to override; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelComponents {
  pub user: Option<String>,
  pub role: Option<String>,
  pub kind: Option<String>,
  pub level: Option<String>,
}

impl LabelComponents {
  fn is_empty(&self) -> bool {
    self.user.is_none() && self.role.is_none() && self.kind.is_none() && self.level.is_none()
  }
}

/// Requested label state. A full label and per-component overrides cannot
/// both be given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LabelSpecRepr", into = "LabelSpecRepr")]
pub enum LabelSpec {
  #[default]
  Inherit,
  Full(SecurityLabel),
  PerComponent(LabelComponents),
}

impl LabelSpec {
  pub fn is_requested(&self) -> bool {
    !matches!(self, LabelSpec::Inherit)
  }

  /// The label an object should carry, given the one it carries now.
  pub fn compose(&self, current: &SecurityLabel) -> SecurityLabel {
    match self {
      LabelSpec::Inherit => current.clone(),
      LabelSpec::Full(label) => label.clone(),
      LabelSpec::PerComponent(parts) => SecurityLabel {
        user: parts.user.clone().unwrap_or_else(|| current.user.clone()),
        role: parts.role.clone().unwrap_or_else(|| current.role.clone()),
        kind: parts.kind.clone().unwrap_or_else(|| current.kind.clone()),
        level: parts.level.clone().unwrap_or_else(|| current.level.clone()),
      },
    }
  }
}

/// Flat serialized form: `{"full": "..."}` or `{"user": ..., "type": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LabelSpecRepr {
  #[serde(skip_serializing_if = "Option::is_none")]
  full: Option<SecurityLabel>,
  #[serde(skip_serializing_if = "Option::is_none")]
  user: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  kind: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  level: Option<String>,
}

impl TryFrom<LabelSpecRepr> for LabelSpec {
  type Error = ReconcileError;

  fn try_from(repr: LabelSpecRepr) -> Result<Self> {
    let parts = LabelComponents {
      user: repr.user,
      role: repr.role,
      kind: repr.kind,
      level: repr.level,
    };
    match (repr.full, parts.is_empty()) {
      (Some(_), false) => Err(ReconcileError::config(
        "a full security label cannot be combined with per-component overrides",
      )),
      (Some(full), true) => Ok(LabelSpec::Full(full)),
      (None, false) => Ok(LabelSpec::PerComponent(parts)),
      (None, true) => Ok(LabelSpec::Inherit),
    }
  }
}

impl From<LabelSpec> for LabelSpecRepr {
  fn from(spec: LabelSpec) -> Self {
    match spec {
      LabelSpec::Inherit => LabelSpecRepr::default(),
      LabelSpec::Full(label) => LabelSpecRepr {
        full: Some(label),
        ..Default::default()
      },
      LabelSpec::PerComponent(parts) => LabelSpecRepr {
        full: None,
        user: parts.user,
        role: parts.role,
        kind: parts.kind,
        level: parts.level,
      },
    }
  }
}

/// Reads and writes security labels of single objects, never following
/// symlinks.
pub trait LabelStore {
  fn available(&self) -> bool;
  fn get(&self, path: &Path) -> Result<SecurityLabel>;
  fn set(&self, path: &Path, label: &SecurityLabel) -> Result<()>;
}

/// A host without a label subsystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabels;

impl LabelStore for NoLabels {
  fn available(&self) -> bool {
    false
  }

  fn get(&self, _path: &Path) -> Result<SecurityLabel> {
    Err(unavailable())
  }

  fn set(&self, _path: &Path, _label: &SecurityLabel) -> Result<()> {
    Err(unavailable())
  }
}

fn unavailable() -> ReconcileError {
  ReconcileError::config("the security label subsystem is unavailable")
}

/// SELinux labels stored in the `security.selinux` extended attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct XattrLabels;

#[cfg(target_os = "linux")]
impl LabelStore for XattrLabels {
  fn available(&self) -> bool {
    Path::new(crate::consts::SELINUX_ENFORCE_PATH).exists()
  }

  fn get(&self, path: &Path) -> Result<SecurityLabel> {
    use crate::error::IoResultExt;

    let mut buf = vec![0u8; 4096];
    let len = rustix::fs::lgetxattr(path, crate::consts::SELINUX_XATTR, &mut buf[..])
      .map_err(|e| std::io::Error::from_raw_os_error(e.raw_os_error()))
      .at(path)?;
    String::from_utf8_lossy(&buf[..len]).parse()
  }

  fn set(&self, path: &Path, label: &SecurityLabel) -> Result<()> {
    use crate::error::IoResultExt;
    use rustix::fs::XattrFlags;

    let mut value = label.to_string().into_bytes();
    value.push(0);
    rustix::fs::lsetxattr(path, crate::consts::SELINUX_XATTR, &value, XattrFlags::empty())
      .map_err(|e| std::io::Error::from_raw_os_error(e.raw_os_error()))
      .at(path)
  }
}

#[cfg(not(target_os = "linux"))]
impl LabelStore for XattrLabels {
  fn available(&self) -> bool {
    false
  }

  fn get(&self, _path: &Path) -> Result<SecurityLabel> {
    Err(unavailable())
  }

  fn set(&self, _path: &Path, _label: &SecurityLabel) -> Result<()> {
    Err(unavailable())
  }
}

/// Labels kept in memory, keyed by path. Unlabelled paths report `default`.
#[derive(Debug)]
pub struct MemoryLabels {
  default: SecurityLabel,
  labels: Mutex<HashMap<PathBuf, SecurityLabel>>,
}

impl MemoryLabels {
  pub fn new(default: SecurityLabel) -> Self {
    Self {
      default,
      labels: Mutex::new(HashMap::new()),
    }
  }
}

impl LabelStore for MemoryLabels {
  fn available(&self) -> bool {
    true
  }

  fn get(&self, path: &Path) -> Result<SecurityLabel> {
    let labels = self.labels.lock().unwrap_or_else(|e| e.into_inner());
    Ok(labels.get(path).cloned().unwrap_or_else(|| self.default.clone()))
  }

  fn set(&self, path: &Path, label: &SecurityLabel) -> Result<()> {
    let mut labels = self.labels.lock().unwrap_or_else(|e| e.into_inner());
    labels.insert(path.to_path_buf(), label.clone());
    Ok(())
  }
}
