use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt, lchown, symlink};
use std::path::Path;

use convergefs_lib::{AttrSpec, LogLevel, Mode, SyncPolicy};

use super::common::{TestEnv, child_names, mode_of};

fn policy(purge_extras: bool) -> SyncPolicy {
  SyncPolicy {
    attrs: AttrSpec::default(),
    backup_on_replace: false,
    purge_extras,
  }
}

#[test]
fn tree_copy_scenario() {
  let env = TestEnv::new();
  env.write_file("src/a", "X");
  env.write_file("src/b/c", "Y");
  fs::create_dir(env.dst()).unwrap();

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
  assert_eq!(env.read_file("dst/a"), "X");
  assert_eq!(env.read_file("dst/b/c"), "Y");

  assert!(!env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());

  env.write_file("dst/z", "extra");
  assert!(!env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
  assert!(env.path("dst/z").exists());

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(true)).unwrap());
  assert!(!env.path("dst/z").exists());
}

#[test]
fn purge_makes_child_lists_identical() {
  let env = TestEnv::new();
  env.write_file("src/keep", "k");
  env.write_file("src/nested/leaf", "l");
  symlink("keep", env.path("src/alias")).unwrap();
  env.write_file("dst/zz-extra", "e");
  env.write_file("dst/nested/stray/deep", "d");
  env.write_file("dst/0-first", "f");

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(true)).unwrap());
  assert_eq!(child_names(&env.dst()), child_names(&env.src()));
  assert_eq!(child_names(&env.path("dst/nested")), vec!["leaf"]);
  assert_eq!(fs::read_link(env.path("dst/alias")).unwrap(), Path::new("keep"));

  assert!(!env.engine.synchronize(&env.src(), &env.dst(), &policy(true)).unwrap());
}

#[test]
fn interrupted_copy_is_completed() {
  let env = TestEnv::new();
  env.write_file("src/one", "1");
  env.write_file("src/two/three", "3");
  env.write_file("src/two/four", "4");
  // Simulate a run that died halfway through the second directory.
  env.write_file("dst/one", "1");
  env.write_file("dst/two/four", "4");

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
  assert_eq!(env.read_file("dst/two/three"), "3");
  assert!(!env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
}

#[test]
fn changed_content_is_replaced() {
  let env = TestEnv::new();
  env.write_file("src/motd", "welcome");
  env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap();

  env.write_file("src/motd", "goodbye");
  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
  assert_eq!(env.read_file("dst/motd"), "goodbye");
}

#[test]
fn explicit_mode_applies_to_every_object() {
  let env = TestEnv::new();
  env.write_file("src/f", "x");
  env.write_file("src/d/g", "y");
  let policy = SyncPolicy {
    attrs: AttrSpec {
      mode: Some(Mode::new(0o750).unwrap()),
      ..Default::default()
    },
    backup_on_replace: false,
    purge_extras: false,
  };

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy).unwrap());
  for path in ["dst", "dst/f", "dst/d", "dst/d/g"] {
    assert_eq!(mode_of(&env.path(path)), 0o750, "{path}");
  }
}

#[test]
fn only_permission_drift_is_corrected() {
  let env = TestEnv::new();
  let file = env.write_file("src/f", "x");
  fs::set_permissions(&file, fs::Permissions::from_mode(0o644)).unwrap();
  env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap();

  fs::set_permissions(env.path("dst/f"), fs::Permissions::from_mode(0o600)).unwrap();
  env.log.clear();
  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
  assert_eq!(mode_of(&env.path("dst/f")), 0o644);

  let actions = env.log.messages(LogLevel::Action);
  assert_eq!(actions.len(), 1);
  assert!(actions[0].starts_with("Changing permissions"));
}

#[test]
fn single_file_synchronize_logs_no_action_when_settled() {
  let env = TestEnv::new();
  let src = env.write_file("src.conf", "setting = 1");
  let dst = env.path("dst.conf");

  assert!(env.engine.synchronize(&src, &dst, &SyncPolicy::default()).unwrap());
  env.log.clear();
  assert!(!env.engine.synchronize(&src, &dst, &SyncPolicy::default()).unwrap());
  assert_eq!(env.log.messages(LogLevel::NoAction).len(), 1);
  assert!(env.log.messages(LogLevel::Action).is_empty());
}

#[test]
fn policy_from_json_drives_synchronize() {
  let env = TestEnv::new();
  env.write_file("src/f", "x");
  let policy: SyncPolicy = serde_json::from_str(r#"{"file_mask": "0640", "purge_extras": true}"#).unwrap();
  fs::set_permissions(env.path("src/f"), fs::Permissions::from_mode(0o666)).unwrap();

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy).unwrap());
  assert_eq!(mode_of(&env.path("dst/f")), 0o640);
}

#[test]
fn setuid_leaf_converges_in_one_run_when_owner_drifts() {
  if !nix::unistd::geteuid().is_root() {
    return;
  }
  let env = TestEnv::new();
  let src = env.write_file("src/bin/helper", "#!/bin/sh\n");
  lchown(&src, Some(0), Some(0)).unwrap();
  fs::set_permissions(&src, fs::Permissions::from_mode(0o4755)).unwrap();
  let dst = env.write_file("dst/bin/helper", "#!/bin/sh\n");
  lchown(&dst, Some(1000), Some(1000)).unwrap();
  fs::set_permissions(&dst, fs::Permissions::from_mode(0o4755)).unwrap();

  assert!(env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
  let meta = fs::symlink_metadata(&dst).unwrap();
  assert_eq!((meta.uid(), meta.gid()), (0, 0));
  assert_eq!(mode_of(&dst), 0o4755);

  assert!(!env.engine.synchronize(&env.src(), &env.dst(), &policy(false)).unwrap());
}
