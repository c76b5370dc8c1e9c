//! End-to-end tests that drive the CLI against a stand-in toolchain.

#![cfg(unix)]

mod build_tests;
mod common;
mod package_tests;
