//! Shared test helpers for CLI integration tests.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

/// Stands in for cargo. `build` writes one library named after the target's
/// family into `target/<triple>/release`, `clean` removes `target/<triple>`.
/// Every call is appended to `calls.log` together with `RUSTFLAGS`. The
/// triple in `FAKE_CARGO_FAIL` exits 101. With `FAKE_CARGO_HANG` set, a
/// background worker is started, its pid written to `worker.pid`, and the
/// script waits for it.
const FAKE_CARGO: &str = r#"#!/bin/sh
cmd="$1"
shift
triple=""
while [ $# -gt 0 ]; do
  case "$1" in
    --target) triple="$2"; shift 2 ;;
    *) shift ;;
  esac
done
echo "$cmd $triple RUSTFLAGS=$RUSTFLAGS" >> calls.log
if [ -n "$FAKE_CARGO_HANG" ]; then
  sleep 30 &
  echo $! > worker.pid
  wait
fi
if [ -n "$FAKE_CARGO_FAIL" ] && [ "$FAKE_CARGO_FAIL" = "$triple" ]; then
  echo "error: could not compile engine for $triple" >&2
  exit 101
fi
case "$triple" in
  *windows*) file="engine.dll" ;;
  *apple*) file="libengine.dylib" ;;
  *) file="libengine.so" ;;
esac
case "$cmd" in
  build)
    mkdir -p "target/$triple/release/deps"
    printf 'engine for %s' "$triple" > "target/$triple/release/$file"
    printf 'intermediate' > "target/$triple/release/deps/$file"
    ;;
  clean)
    rm -rf "target/$triple"
    ;;
esac
"#;

pub const LABELS: [(&str, &str); 5] = [
  ("Linux-x86_64", "x86_64-unknown-linux-gnu"),
  ("Linux-aarch64", "aarch64-unknown-linux-gnu"),
  ("Windows-x86_64", "x86_64-pc-windows-gnu"),
  ("macOS-x86_64", "x86_64-apple-darwin"),
  ("macOS-aarch64", "aarch64-apple-darwin"),
];

/// Isolated test environment.
///
/// Each test gets its own native project root, fake toolchain and package
/// output directory.
pub struct TestEnv {
  pub temp: TempDir,
  pub cargo: PathBuf,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let cargo = temp.path().join("fake-cargo");
    std::fs::write(&cargo, FAKE_CARGO).unwrap();
    std::fs::set_permissions(&cargo, std::fs::Permissions::from_mode(0o755)).unwrap();
    std::fs::create_dir_all(temp.path().join("engine")).unwrap();
    Self { temp, cargo }
  }

  /// Native project root the toolchain runs in.
  pub fn native_root(&self) -> PathBuf {
    self.temp.path().join("engine")
  }

  /// Package root passed to `--out`.
  pub fn out(&self) -> PathBuf {
    self.temp.path().join("pkg")
  }

  pub fn release_dir(&self, triple: &str) -> PathBuf {
    self.native_root().join("target").join(triple).join("release")
  }

  pub fn calls(&self) -> Vec<String> {
    std::fs::read_to_string(self.native_root().join("calls.log"))
      .unwrap_or_default()
      .lines()
      .map(str::to_string)
      .collect()
  }

  /// Get a pre-configured Command for the natpack binary.
  ///
  /// Points `--native-root` and `--cargo` at this environment and clears
  /// the caller's `NATPACK_*` variables.
  pub fn natpack_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("natpack");
    for var in [
      "NATPACK_NATIVE_ROOT",
      "NATPACK_JOBS",
      "NATPACK_CARGO",
      "NATPACK_FAIL_FAST",
      "FAKE_CARGO_FAIL",
      "FAKE_CARGO_HANG",
    ] {
      cmd.env_remove(var);
    }
    cmd.arg("--native-root").arg(self.native_root());
    cmd.arg("--cargo").arg(&self.cargo);
    cmd
  }
}

/// Poll until `path` exists and holds a pid.
pub fn wait_for_pid(path: &Path, timeout: Duration) -> Option<i32> {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if let Some(pid) = std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok()) {
      return Some(pid);
    }
    std::thread::sleep(Duration::from_millis(50));
  }
  None
}

/// Whether `pid` has exited. Zombies count as exited.
pub fn process_exited(pid: i32) -> bool {
  if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
    // The state follows the parenthesized command name
    return stat
      .rsplit(')')
      .next()
      .is_some_and(|rest| rest.trim_start().starts_with('Z'));
  }
  if Path::new("/proc/self").exists() {
    return true;
  }
  let pid = rustix::process::Pid::from_raw(pid).unwrap();
  rustix::process::test_kill_process(pid).is_err()
}

/// Poll until `pid` has exited.
pub fn wait_for_exit(pid: i32, timeout: Duration) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if process_exited(pid) {
      return true;
    }
    std::thread::sleep(Duration::from_millis(50));
  }
  process_exited(pid)
}
