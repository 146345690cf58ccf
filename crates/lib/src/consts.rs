pub const APP_NAME: &str = "convergefs";

/// Environment variable selecting the engine's verbosity.
pub const VERBOSITY_ENV: &str = "CONVERGEFS_VERBOSITY";

/// Environment variable overriding the directory used for named locks.
pub const LOCK_DIR_ENV: &str = "CONVERGEFS_LOCK_DIR";

pub const DEFAULT_LOCK_DIR: &str = "/var/lock/convergefs";

/// Extension appended to named locks inside the lock directory.
pub const LOCK_EXTENSION: &str = "lock";

/// Read buffer size used when digesting file contents.
pub const DIGEST_BUF_SIZE: usize = 8192;

/// Timestamp suffix for backups, matching ISO-8601 with microseconds.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Extended attribute holding the SELinux security context.
pub const SELINUX_XATTR: &str = "security.selinux";

/// Marker file present when selinuxfs is mounted.
pub const SELINUX_ENFORCE_PATH: &str = "/sys/fs/selinux/enforce";

/// The low 12 bits of `st_mode`: setuid, setgid, sticky and rwx triplets.
pub const PERMISSION_BITS: u32 = 0o7777;
