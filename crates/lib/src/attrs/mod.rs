//! Desired ownership, permission and security-label state.
//!
//! An [`AttrSpec`] names what an object's metadata should be. Fields left as
//! `None` are not enforced; [`AttrSpec::derive_from`] fills them from a source
//! object so a copy inherits its original's metadata.

pub mod label;
pub mod reconcile;

use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::PERMISSION_BITS;
use crate::error::{ReconcileError, Result};

pub use label::{LabelComponents, LabelSpec, LabelStore, MemoryLabels, NoLabels, SecurityLabel, XattrLabels};
pub use reconcile::reconcile_attributes;

/// A user or group, given either numerically or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
  Id(u32),
  Name(String),
}

impl Principal {
  /// Resolves the principal as a user to a uid.
  pub fn resolve_user(&self) -> Result<u32> {
    match self {
      Principal::Id(id) => Ok(*id),
      Principal::Name(name) => {
        if let Ok(id) = name.parse::<u32>() {
          return Ok(id);
        }
        match nix::unistd::User::from_name(name) {
          Ok(Some(user)) => Ok(user.uid.as_raw()),
          Ok(None) => Err(ReconcileError::config(format!("bad uid specification: unknown user {name}"))),
          Err(e) => Err(ReconcileError::config(format!("bad uid specification: {name}: {e}"))),
        }
      }
    }
  }

  /// Resolves the principal as a group to a gid.
  pub fn resolve_group(&self) -> Result<u32> {
    match self {
      Principal::Id(id) => Ok(*id),
      Principal::Name(name) => {
        if let Ok(id) = name.parse::<u32>() {
          return Ok(id);
        }
        match nix::unistd::Group::from_name(name) {
          Ok(Some(group)) => Ok(group.gid.as_raw()),
          Ok(None) => Err(ReconcileError::config(format!("bad gid specification: unknown group {name}"))),
          Err(e) => Err(ReconcileError::config(format!("bad gid specification: {name}: {e}"))),
        }
      }
    }
  }
}

impl FromStr for Principal {
  type Err = ReconcileError;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    if s.is_empty() {
      return Err(ReconcileError::config("empty user or group specification"));
    }
    Ok(match s.parse::<u32>() {
      Ok(id) => Principal::Id(id),
      Err(_) => Principal::Name(s.to_string()),
    })
  }
}

impl fmt::Display for Principal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Principal::Id(id) => write!(f, "{}", id),
      Principal::Name(name) => write!(f, "{}", name),
    }
  }
}

/// Permission bits: the low 12 bits of a file mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ModeRepr", into = "u32")]
pub struct Mode(u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum ModeRepr {
  Bits(u32),
  Octal(String),
}

impl Mode {
  pub fn new(bits: u32) -> Result<Self> {
    if bits & !PERMISSION_BITS != 0 {
      return Err(ReconcileError::config(format!("bad perm specification: {bits:o}")));
    }
    Ok(Self(bits))
  }

  /// Keeps only the permission bits of a raw `st_mode`.
  pub fn from_st_mode(st_mode: u32) -> Self {
    Self(st_mode & PERMISSION_BITS)
  }

  pub fn bits(self) -> u32 {
    self.0
  }

  pub fn masked(self, mask: Mode) -> Mode {
    Self(self.0 & mask.0)
  }
}

impl FromStr for Mode {
  type Err = ReconcileError;

  fn from_str(s: &str) -> Result<Self> {
    let digits = s.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    let bits = u32::from_str_radix(digits, 8)
      .map_err(|_| ReconcileError::config(format!("bad perm specification: {s:?}")))?;
    Self::new(bits)
  }
}

impl TryFrom<ModeRepr> for Mode {
  type Error = ReconcileError;

  fn try_from(repr: ModeRepr) -> Result<Self> {
    match repr {
      ModeRepr::Bits(bits) => Mode::new(bits),
      ModeRepr::Octal(s) => s.parse(),
    }
  }
}

impl From<Mode> for u32 {
  fn from(mode: Mode) -> u32 {
    mode.0
  }
}

impl fmt::Display for Mode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:04o}", self.0)
  }
}

/// Desired metadata for a filesystem object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttrSpec {
  /// Owner; inherited from the source when copying, untouched otherwise.
  pub owner: Option<Principal>,
  pub group: Option<Principal>,
  /// Explicit permission bits. Masks are not applied to an explicit mode.
  pub mode: Option<Mode>,
  /// Mask applied to inherited permissions of non-directories.
  pub file_mask: Option<Mode>,
  /// Mask applied to inherited permissions of directories.
  pub dir_mask: Option<Mode>,
  pub label: LabelSpec,
}

impl AttrSpec {
  /// Fills unspecified owner, group and mode from `source`.
  ///
  /// An inherited mode is masked by `dir_mask` or `file_mask` depending on
  /// the kind of `source`.
  pub fn derive_from(&self, source: &Metadata) -> AttrSpec {
    let mask = if source.is_dir() { self.dir_mask } else { self.file_mask };
    let inherited = Mode::from_st_mode(source.mode());
    let mode = self
      .mode
      .unwrap_or_else(|| mask.map_or(inherited, |m| inherited.masked(m)));

    AttrSpec {
      owner: Some(self.owner.clone().unwrap_or(Principal::Id(source.uid()))),
      group: Some(self.group.clone().unwrap_or(Principal::Id(source.gid()))),
      mode: Some(mode),
      file_mask: None,
      dir_mask: None,
      label: self.label.clone(),
    }
  }

  /// Checks that every explicit value resolves, before anything is touched.
  pub fn validate(&self, labels: &dyn LabelStore) -> Result<()> {
    if let Some(owner) = &self.owner {
      owner.resolve_user()?;
    }
    if let Some(group) = &self.group {
      group.resolve_group()?;
    }
    if self.label.is_requested() && !labels.available() {
      return Err(ReconcileError::config(
        "security label requested but the security label subsystem is unavailable",
      ));
    }
    Ok(())
  }
}

/// How a destination is brought in line with its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
  #[serde(flatten)]
  pub attrs: AttrSpec,
  /// Rename a replaced destination aside instead of deleting it.
  pub backup_on_replace: bool,
  /// Delete destination entries that have no counterpart in the source.
  pub purge_extras: bool,
}

impl Default for SyncPolicy {
  fn default() -> Self {
    Self {
      attrs: AttrSpec::default(),
      backup_on_replace: true,
      purge_extras: false,
    }
  }
}
