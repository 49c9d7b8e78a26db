//! Common test utilities for extension system tests.
//!
//! The fixture modules under `tests/test-extensions` are dev-dependencies of
//! this crate, so cargo builds their cdylibs next to the test binaries.

#![allow(dead_code)]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dynext_core::ExtensionSystem;
use parking_lot::Mutex;
use tempfile::TempDir;

/// Fixture module exporting `Ext1` v100 and `Ext2` v100.
pub const ALPHA: &str = "ext_alpha";
/// Fixture module exporting `Ext1` v110.
pub const BETA: &str = "ext_beta";
/// Fixture module built by a "test 1" compiler.
pub const FOREIGN: &str = "ext_foreign";
/// Fixture module with one "test 1" entry and one native entry.
pub const MIXED: &str = "ext_mixed";
/// Fixture module with an empty descriptor table.
pub const EMPTY: &str = "ext_empty";
/// Fixture module without a descriptor export.
pub const NO_DESCRIPTOR: &str = "test_interfaces";

/// Platform file name of a module, e.g. `libext_alpha.so`.
pub fn library_file_name(name: &str) -> String {
    format!("{DLL_PREFIX}{name}{DLL_SUFFIX}")
}

/// Path of a fixture module built by cargo.
pub fn fixture_library(name: &str) -> PathBuf {
    let exe = std::env::current_exe().unwrap();
    let deps = exe.parent().unwrap();
    let file_name = library_file_name(name);

    for dir in [deps, deps.parent().unwrap()] {
        let candidate = dir.join(&file_name);
        if candidate.is_file() {
            return candidate;
        }
    }

    // Fall back to a hashed artifact name, e.g. `libext_alpha-0123abcd.so`.
    let hashed_prefix = format!("{DLL_PREFIX}{name}-");
    fs::read_dir(deps)
        .unwrap()
        .flatten()
        .map(|entry| entry.path())
        .find(|path| {
            let file = path.file_name().unwrap().to_string_lossy().into_owned();
            file.starts_with(&hashed_prefix) && file.ends_with(DLL_SUFFIX)
        })
        .unwrap_or_else(|| panic!("fixture module {file_name} not found in {}", deps.display()))
}

/// Copy fixture modules into `dir` under their platform file names.
pub fn stage(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| stage_as(dir, name, &library_file_name(name)))
        .collect()
}

/// Copy one fixture module into `dir` as `file_name`.
pub fn stage_as(dir: &Path, name: &str, file_name: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let target = dir.join(file_name);
    fs::copy(fixture_library(name), &target).unwrap();
    target
}

/// Temporary directory holding the given fixture modules.
pub fn staged_dir(names: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    stage(dir.path(), names);
    dir
}

/// Collects every diagnostic delivered to a registry.
#[derive(Clone, Default)]
pub struct Messages(Arc<Mutex<Vec<String>>>);

impl Messages {
    pub fn attach(&self, system: &mut ExtensionSystem) {
        let sink = self.0.clone();
        system.set_message_handler(move |msg| sink.lock().push(msg.to_string()));
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn any(&self, needle: &str) -> bool {
        self.0.lock().iter().any(|msg| msg.contains(needle))
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Registry with a collecting message handler attached.
pub fn system_with_messages() -> (ExtensionSystem, Messages) {
    let mut system = ExtensionSystem::new();
    let messages = Messages::default();
    messages.attach(&mut system);
    (system, messages)
}
