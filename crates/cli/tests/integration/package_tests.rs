//! Package and collect command integration tests.

use predicates::prelude::*;

use super::common::{LABELS, TestEnv};

#[test]
fn package_lays_out_every_target() {
  let env = TestEnv::new();
  let out = env.out();

  env
    .natpack_cmd()
    .arg("package")
    .arg("--out")
    .arg(&out)
    .assert()
    .success()
    .stdout(predicate::str::contains("Collected 5 artifact(s)"));

  let native = out.join("native");
  assert!(native.join("Linux-x86_64").join("libengine.so").exists());
  assert!(native.join("Linux-aarch64").join("libengine.so").exists());
  assert!(native.join("Windows-x86_64").join("engine.dll").exists());
  assert!(native.join("macOS-x86_64").join("libengine.dylib").exists());
  assert!(native.join("macOS-aarch64").join("libengine.dylib").exists());

  // intermediate copies under deps/ are not packaged
  assert!(!native.join("Linux-x86_64").join("deps").exists());

  let same_name_a = std::fs::read_to_string(native.join("Linux-x86_64").join("libengine.so")).unwrap();
  let same_name_b = std::fs::read_to_string(native.join("Linux-aarch64").join("libengine.so")).unwrap();
  assert_eq!(same_name_a, "engine for x86_64-unknown-linux-gnu");
  assert_eq!(same_name_b, "engine for aarch64-unknown-linux-gnu");
}

#[test]
fn package_writes_index() {
  let env = TestEnv::new();
  let out = env.out();

  env.natpack_cmd().arg("package").arg("--out").arg(&out).assert().success();

  let index: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(out.join("native").join("index.json")).unwrap()).unwrap();
  assert_eq!(index["version"], 1);
  for (label, triple) in LABELS {
    assert_eq!(index["targets"][label]["triple"], triple);
  }
  assert_eq!(
    index["targets"]["Windows-x86_64"]["libraries"][0]["path"],
    "Windows-x86_64/engine.dll"
  );
  assert_eq!(index["targets"]["macOS-aarch64"]["os"], "darwin");
}

#[test]
fn package_twice_is_idempotent() {
  let env = TestEnv::new();
  let out = env.out();
  let lib = out.join("native").join("macOS-x86_64").join("libengine.dylib");

  env.natpack_cmd().arg("package").arg("--out").arg(&out).assert().success();
  let first = std::fs::read(&lib).unwrap();

  env
    .natpack_cmd()
    .arg("package")
    .arg("--out")
    .arg(&out)
    .assert()
    .success()
    .stdout(predicate::str::contains("unchanged"));
  assert_eq!(std::fs::read(&lib).unwrap(), first);
}

#[test]
fn package_collects_targets_that_built() {
  let env = TestEnv::new();
  let out = env.out();

  env
    .natpack_cmd()
    .args(["--env", "FAKE_CARGO_FAIL=aarch64-unknown-linux-gnu", "package", "--out"])
    .arg(&out)
    .assert()
    .failure()
    .stdout(predicate::str::contains("Collected 4 artifact(s)"));

  assert!(!out.join("native").join("Linux-aarch64").exists());
  assert!(out.join("native").join("Linux-x86_64").join("libengine.so").exists());
}

#[test]
fn collect_after_subset_build() {
  let env = TestEnv::new();
  let out = env.out();

  env
    .natpack_cmd()
    .args(["--target", "Windows-x86_64", "build"])
    .assert()
    .success();

  env
    .natpack_cmd()
    .args(["--target", "Windows-x86_64", "collect", "--out"])
    .arg(&out)
    .assert()
    .success();

  assert!(out.join("native").join("Windows-x86_64").join("engine.dll").exists());
  assert!(!out.join("native").join("Linux-x86_64").exists());
}
