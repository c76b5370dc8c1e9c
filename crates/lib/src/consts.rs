/// Directory under the output root that receives collected libraries.
pub const NATIVE_DIR: &str = "native";

/// Package index written next to the collected libraries.
pub const INDEX_FILE: &str = "index.json";

/// Version of the package index format.
pub const INDEX_VERSION: u32 = 1;

/// Toolchain program used when none is configured.
pub const DEFAULT_PROGRAM: &str = "cargo";

/// `RUSTFLAGS` that drop panic locations and `Debug` formatting strings from
/// the emitted library. Both flags need a nightly toolchain.
pub const STRIP_METADATA_RUSTFLAGS: &str = "-Zlocation-detail=none -Zfmt-debug=none";

pub const ENV_NATIVE_ROOT: &str = "NATPACK_NATIVE_ROOT";
pub const ENV_JOBS: &str = "NATPACK_JOBS";
pub const ENV_PROGRAM: &str = "NATPACK_CARGO";
pub const ENV_FAIL_FAST: &str = "NATPACK_FAIL_FAST";
