//! Error types for the extension system.

use std::path::PathBuf;

/// Errors raised while loading, validating or instantiating extensions.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    #[error("Failed to load library {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("Symbol '{symbol}' not found in {}: {message}", .path.display())]
    Symbol {
        symbol: String,
        path: PathBuf,
        message: String,
    },

    #[error("Incompatible descriptor layout in {}: expected ABI version {expected}, got {found}", .path.display())]
    AbiVersion {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    #[error("Extension '{name}' in {} was built with {found}, host uses {expected}", .path.display())]
    AbiMismatch {
        name: String,
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Invalid descriptor in {}: {message}", .path.display())]
    InvalidDescriptor { path: PathBuf, message: String },

    #[error("No extension '{name}' for interface '{interface}'{}", version_suffix(.version))]
    NotFound {
        name: String,
        interface: String,
        version: Option<u32>,
    },

    #[error("Instance was not created by this extension system")]
    InvalidInstance,

    #[error("Factory '{symbol}' returned a null instance")]
    NullInstance { symbol: String },

    #[error("Failed to scan {}: {message}", .path.display())]
    Scan { path: PathBuf, message: String },
}

fn version_suffix(version: &Option<u32>) -> String {
    match version {
        Some(version) => format!(" with version {version}"),
        None => String::new(),
    }
}

/// Result type for extension operations.
pub type Result<T> = std::result::Result<T, ExtensionError>;
