//! Build and clean command integration tests.

use std::process::Stdio;
use std::time::{Duration, Instant};

use predicates::prelude::*;
use rustix::process::{Pid, Signal, kill_process};

use super::common::{LABELS, TestEnv, wait_for_exit, wait_for_pid};

#[test]
fn build_all_targets_succeeds() {
  let env = TestEnv::new();

  let mut assert = env.natpack_cmd().arg("build").assert().success();
  for (label, _) in LABELS {
    assert = assert.stdout(predicate::str::contains(label));
  }
  assert.stdout(predicate::str::contains("Succeeded: 5"));

  assert!(env.release_dir("x86_64-unknown-linux-gnu").join("libengine.so").exists());
  assert!(env.release_dir("x86_64-pc-windows-gnu").join("engine.dll").exists());
  assert!(env.release_dir("aarch64-apple-darwin").join("libengine.dylib").exists());
  assert_eq!(env.calls().len(), 5);
}

#[test]
fn build_passes_metadata_flags() {
  let env = TestEnv::new();

  env.natpack_cmd().args(["--target", "Linux-x86_64", "build"]).assert().success();

  let calls = env.calls();
  assert_eq!(calls.len(), 1);
  assert!(calls[0].starts_with("build x86_64-unknown-linux-gnu"));
  assert!(calls[0].contains("-Zlocation-detail=none -Zfmt-debug=none"));
}

#[test]
fn build_without_metadata_stripping() {
  let env = TestEnv::new();

  env
    .natpack_cmd()
    .args(["--no-strip-metadata", "--target", "Linux-x86_64", "build"])
    .assert()
    .success();

  assert!(!env.calls()[0].contains("-Zlocation-detail"));
}

#[test]
fn user_env_overrides_rustflags() {
  let env = TestEnv::new();

  env
    .natpack_cmd()
    .args(["--env", "RUSTFLAGS=-Copt-level=s", "--target", "Linux-x86_64", "build"])
    .assert()
    .success();

  assert!(env.calls()[0].ends_with("RUSTFLAGS=-Copt-level=s"));
}

#[test]
fn one_failing_target_is_named_and_others_build() {
  let env = TestEnv::new();

  env
    .natpack_cmd()
    .args(["--env", "FAKE_CARGO_FAIL=x86_64-pc-windows-gnu", "build"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("Succeeded: 4"))
    .stdout(predicate::str::contains("Failed: 1"))
    .stdout(predicate::str::contains("could not compile engine for x86_64-pc-windows-gnu"));

  assert!(!env.release_dir("x86_64-pc-windows-gnu").exists());
  assert!(env.release_dir("aarch64-unknown-linux-gnu").join("libengine.so").exists());
}

#[test]
fn build_json_reports_every_target() {
  let env = TestEnv::new();

  let output = env
    .natpack_cmd()
    .args(["--output", "json", "--env", "FAKE_CARGO_FAIL=aarch64-apple-darwin", "build"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["phase"], "build");
  assert_eq!(json["aggregate"], "failed");
  let outcomes = json["outcomes"].as_array().unwrap();
  assert_eq!(outcomes.len(), 5);

  let failed: Vec<&str> = outcomes
    .iter()
    .filter(|o| o["status"] == "failed")
    .map(|o| o["target"]["label"].as_str().unwrap())
    .collect();
  assert_eq!(failed, vec!["macOS-aarch64"]);
}

#[test]
fn fail_fast_with_one_job_leaves_later_targets_pending() {
  let env = TestEnv::new();

  let output = env
    .natpack_cmd()
    .args(["--output", "json", "--fail-fast", "--jobs", "1"])
    .args(["--env", "FAKE_CARGO_FAIL=x86_64-unknown-linux-gnu", "build"])
    .output()
    .unwrap();
  assert!(!output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let outcomes = json["outcomes"].as_array().unwrap();
  assert_eq!(outcomes[0]["status"], "failed");
  assert!(outcomes[1..].iter().all(|o| o["status"] == "pending"));
  assert_eq!(env.calls().len(), 1);
}

#[test]
fn clean_one_target_leaves_others() {
  let env = TestEnv::new();
  env.natpack_cmd().arg("build").assert().success();

  env
    .natpack_cmd()
    .args(["--target", "Linux-aarch64", "clean"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Linux-aarch64"));

  assert!(!env.native_root().join("target").join("aarch64-unknown-linux-gnu").exists());
  for (_, triple) in LABELS.iter().filter(|(label, _)| *label != "Linux-aarch64") {
    assert!(env.release_dir(triple).exists(), "{} was removed", triple);
  }
}

#[test]
fn clean_all_removes_every_target() {
  let env = TestEnv::new();
  env.natpack_cmd().arg("build").assert().success();

  env.natpack_cmd().arg("clean").assert().success();

  for (_, triple) in LABELS {
    assert!(!env.native_root().join("target").join(triple).exists());
  }
  assert_eq!(env.calls().iter().filter(|c| c.starts_with("clean")).count(), 5);
}

#[test]
fn sigterm_stops_the_toolchain_and_its_workers() {
  let env = TestEnv::new();

  let mut natpack = std::process::Command::new(env!("CARGO_BIN_EXE_natpack"))
    .arg("--native-root")
    .arg(env.native_root())
    .arg("--cargo")
    .arg(&env.cargo)
    .args(["--env", "FAKE_CARGO_HANG=1", "--target", "Linux-x86_64", "build"])
    .env_remove("NATPACK_NATIVE_ROOT")
    .env_remove("NATPACK_CARGO")
    .stdout(Stdio::null())
    .stderr(Stdio::piped())
    .spawn()
    .unwrap();

  let worker = wait_for_pid(&env.native_root().join("worker.pid"), Duration::from_secs(10));
  let Some(worker) = worker else {
    let _ = natpack.kill();
    panic!("fake cargo never started its worker");
  };

  let natpack_pid = Pid::from_raw(natpack.id() as i32).unwrap();
  kill_process(natpack_pid, Signal::TERM).unwrap();

  let deadline = Instant::now() + Duration::from_secs(10);
  let status = loop {
    if let Some(status) = natpack.try_wait().unwrap() {
      break status;
    }
    if Instant::now() > deadline {
      let _ = natpack.kill();
      panic!("natpack did not exit after SIGTERM");
    }
    std::thread::sleep(Duration::from_millis(50));
  };

  let output = natpack.wait_with_output().unwrap();
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(!status.success());
  assert!(stderr.contains("SIGTERM"), "stderr: {}", stderr);
  assert!(
    wait_for_exit(worker, Duration::from_secs(5)),
    "worker {} outlived natpack",
    worker
  );
}
