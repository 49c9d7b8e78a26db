//! Build script for dynext-sdk.
//!
//! Captures the identity of the compiler building this crate so that hosts
//! and extension modules can compare the toolchains they were built with.

use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    let version = Command::new(&rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .map(|version| parse_rustc_version(&version))
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=DYNEXT_RUSTC_VERSION={}", version);
}

/// Strip the leading "rustc " from `rustc --version` output.
///
/// "rustc 1.85.0 (4d91de4e4 2025-02-17)" -> "1.85.0 (4d91de4e4 2025-02-17)"
fn parse_rustc_version(output: &str) -> String {
    output
        .strip_prefix("rustc ")
        .unwrap_or(output)
        .trim()
        .to_string()
}
