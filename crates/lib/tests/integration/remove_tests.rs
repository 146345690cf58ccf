use std::fs::File;
use std::os::unix::fs::symlink;
use std::time::{Duration, SystemTime};

use convergefs_lib::{LogLevel, RemovalPredicate, RemoveOptions, Timestamp};

use super::common::{TestEnv, child_names};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn age(env: &TestEnv, relative_path: &str, by: Duration) {
  let file = File::options().write(true).open(env.path(relative_path)).unwrap();
  file.set_modified(SystemTime::now() - by).unwrap();
}

#[test]
fn age_threshold_removes_only_old_objects() {
  let env = TestEnv::new();
  env.write_file("tmp/old.dat", "o");
  env.write_file("tmp/new.dat", "n");
  env.write_file("tmp/cache/stale.dat", "s");
  age(&env, "tmp/old.dat", 10 * DAY);
  age(&env, "tmp/cache/stale.dat", 10 * DAY);

  let predicate = RemovalPredicate::older_than(7 * DAY, Timestamp::Modified);
  assert!(env.engine.remove_where(&env.path("tmp"), &predicate, RemoveOptions::default()).unwrap());
  assert_eq!(child_names(&env.path("tmp")), vec!["cache", "new.dat"]);
  assert!(child_names(&env.path("tmp/cache")).is_empty());

  env.log.clear();
  assert!(!env.engine.remove_where(&env.path("tmp"), &predicate, RemoveOptions::default()).unwrap());
  assert!(env.log.messages(LogLevel::Action).is_empty());
}

#[test]
fn always_keeps_the_root() {
  let env = TestEnv::new();
  env.write_file("spool/a", "a");
  env.write_file("spool/b/c", "c");
  symlink("a", env.path("spool/link")).unwrap();

  assert!(env.engine.remove_where(&env.path("spool"), &RemovalPredicate::Always, RemoveOptions::default()).unwrap());
  assert!(env.path("spool").is_dir());
  assert!(child_names(&env.path("spool")).is_empty());
}

#[test]
fn never_changes_nothing() {
  let env = TestEnv::new();
  env.write_file("spool/a", "a");

  assert!(!env.engine.remove_where(&env.path("spool"), &RemovalPredicate::Never, RemoveOptions::default()).unwrap());
  assert_eq!(env.log.messages(LogLevel::NoAction).len(), 1);
}

#[test]
fn pattern_with_backup_renames_matches_aside() {
  let env = TestEnv::new();
  env.write_file("conf/app.bak", "previous");
  env.write_file("conf/app.conf", "current");
  let predicate = RemovalPredicate::name_matches(r"\.bak$").unwrap();
  let options = RemoveOptions {
    backup: true,
    ..Default::default()
  };

  assert!(env.engine.remove_where(&env.path("conf"), &predicate, options).unwrap());
  let names = child_names(&env.path("conf"));
  assert_eq!(names.len(), 2);
  assert!(names.contains(&"app.conf".to_string()));
  assert!(names.iter().any(|name| name.starts_with("app.bak.")));

  assert!(!env.engine.remove_where(&env.path("conf"), &predicate, options).unwrap());
}

#[test]
fn max_depth_limits_descent() {
  let env = TestEnv::new();
  env.write_file("logs/top.log", "t");
  env.write_file("logs/nested/inner.log", "i");
  let predicate = RemovalPredicate::name_matches(r"\.log$").unwrap();
  let options = RemoveOptions {
    max_depth: Some(1),
    ..Default::default()
  };

  assert!(env.engine.remove_where(&env.path("logs"), &predicate, options).unwrap());
  assert!(!env.path("logs/top.log").exists());
  assert!(env.path("logs/nested/inner.log").exists());
}

#[test]
fn links_are_removed_not_followed_by_default() {
  let env = TestEnv::new();
  env.write_file("outside/keep.log", "k");
  env.write_file("area/own.txt", "o");
  symlink(env.path("outside"), env.path("area/out.log")).unwrap();
  let predicate = RemovalPredicate::name_matches(r"\.log$").unwrap();

  assert!(env.engine.remove_where(&env.path("area"), &predicate, RemoveOptions::default()).unwrap());
  assert_eq!(child_names(&env.path("area")), vec!["own.txt"]);
  assert!(env.path("outside/keep.log").exists());
}

#[test]
fn followed_links_are_descended_once() {
  let env = TestEnv::new();
  env.write_file("area/sub/x.tmp", "x");
  symlink(env.path("area"), env.path("area/sub/loop")).unwrap();
  let predicate = RemovalPredicate::name_matches(r"\.tmp$").unwrap();
  let options = RemoveOptions {
    follow_links: true,
    ..Default::default()
  };

  assert!(env.engine.remove_where(&env.path("area"), &predicate, options).unwrap());
  assert!(!env.path("area/sub/x.tmp").exists());
  assert!(env.path("area/sub/loop").exists());
}
