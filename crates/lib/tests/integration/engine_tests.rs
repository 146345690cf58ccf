use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use std::sync::Arc;

use convergefs_lib::attrs::{LabelComponents, LabelStore, MemoryLabels};
use convergefs_lib::{AttrSpec, Engine, EngineConfig, LabelSpec, LogLevel, MemoryLogger, ReconcileError, SyncPolicy};

use super::common::TestEnv;

#[test]
fn link_creates_and_settles() {
  let env = TestEnv::new();
  let dst = env.path("current");

  assert!(env.engine.link(Path::new("releases/7"), &dst, &AttrSpec::default(), false).unwrap());
  assert_eq!(fs::read_link(&dst).unwrap(), Path::new("releases/7"));

  env.log.clear();
  assert!(!env.engine.link(Path::new("releases/7"), &dst, &AttrSpec::default(), false).unwrap());
  assert!(env.log.messages(LogLevel::Action).is_empty());
  assert_eq!(env.log.messages(LogLevel::NoAction).len(), 1);
}

#[test]
fn link_backs_up_a_regular_file() {
  let env = TestEnv::new();
  let dst = env.write_file("etc/resolv.conf", "nameserver 10.0.0.1");

  assert!(env.engine.link(Path::new("/run/resolv.conf"), &dst, &AttrSpec::default(), true).unwrap());
  assert!(fs::symlink_metadata(&dst).unwrap().file_type().is_symlink());

  let backups: Vec<_> = fs::read_dir(env.path("etc"))
    .unwrap()
    .map(|e| e.unwrap().file_name().into_string().unwrap())
    .filter(|name| name.starts_with("resolv.conf."))
    .collect();
  assert_eq!(backups.len(), 1);
  assert_eq!(env.read_file(&format!("etc/{}", backups[0])), "nameserver 10.0.0.1");
}

#[test]
fn link_into_missing_directory_is_logged_not_raised() {
  let env = TestEnv::new();
  let dst = env.path("no/such/dir/link");

  assert!(!env.engine.link(Path::new("target"), &dst, &AttrSpec::default(), false).unwrap());
  let errors = env.log.messages(LogLevel::Error);
  assert_eq!(errors.len(), 1);
  assert!(errors[0].starts_with("Error:"));
}

#[test]
fn remove_backs_up_directory_tree() {
  let env = TestEnv::new();
  env.write_file("old/conf/a", "a");
  env.write_file("old/conf/b", "b");

  assert!(env.engine.remove(&env.path("old/conf"), true).unwrap());
  assert!(!env.path("old/conf").exists());
  let names: Vec<_> = fs::read_dir(env.path("old")).unwrap().collect();
  assert_eq!(names.len(), 1);

  assert!(!env.engine.remove(&env.path("old/conf"), true).unwrap());
}

#[test]
fn remove_deletes_dangling_symlink() {
  let env = TestEnv::new();
  let link = env.path("dangling");
  symlink("nowhere", &link).unwrap();

  assert!(env.engine.remove(&link, false).unwrap());
  assert!(fs::symlink_metadata(&link).is_err());
}

#[test]
fn remove_where_requires_existing_directory() {
  let env = TestEnv::new();
  let err = env
    .engine
    .remove_where(&env.path("missing"), &convergefs_lib::RemovalPredicate::Always, Default::default())
    .unwrap_err();
  assert!(matches!(err, ReconcileError::Config(_)));
  assert_eq!(env.log.messages(LogLevel::Error).len(), 1);
}

#[test]
fn reconcile_attributes_of_missing_path_is_no_change() {
  let env = TestEnv::new();
  let attrs: AttrSpec = serde_json::from_str(r#"{"mode": "0600"}"#).unwrap();

  assert!(!env.engine.reconcile_attributes(&env.path("ghost"), &attrs).unwrap());
  assert_eq!(env.log.messages(LogLevel::Error).len(), 1);
}

#[test]
fn security_label_follows_policy() {
  let temp = tempfile::TempDir::new().unwrap();
  let log = Arc::new(MemoryLogger::new());
  let labels = Arc::new(MemoryLabels::new("system_u:object_r:default_t:s0".parse().unwrap()));
  let config = EngineConfig {
    verbosity: Some(LogLevel::NoAction),
    lock_dir: temp.path().join("locks"),
  };
  let engine = Engine::new(&config).with_logger(log.clone()).with_labels(labels.clone());

  let src = temp.path().join("src");
  fs::create_dir(&src).unwrap();
  fs::write(src.join("httpd.conf"), "Listen 80").unwrap();
  let dst = temp.path().join("dst");

  let policy = SyncPolicy {
    attrs: AttrSpec {
      label: LabelSpec::PerComponent(LabelComponents {
        kind: Some("httpd_config_t".to_string()),
        ..Default::default()
      }),
      ..Default::default()
    },
    ..Default::default()
  };

  assert!(engine.synchronize(&src, &dst, &policy).unwrap());
  for path in [dst.clone(), dst.join("httpd.conf")] {
    assert_eq!(labels.get(&path).unwrap().to_string(), "system_u:object_r:httpd_config_t:s0");
  }

  log.clear();
  assert!(!engine.synchronize(&src, &dst, &policy).unwrap());
  assert!(log.messages(LogLevel::Action).is_empty());
}

#[test]
fn verbosity_none_still_runs_operations() {
  let temp = tempfile::TempDir::new().unwrap();
  let config = EngineConfig {
    verbosity: None,
    lock_dir: temp.path().join("locks"),
  };
  let engine = Engine::new(&config);
  let target = temp.path().join("f");
  fs::write(&target, "x").unwrap();

  assert!(engine.remove(&target, false).unwrap());
  assert!(!target.exists());
}
