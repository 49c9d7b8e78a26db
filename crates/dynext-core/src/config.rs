//! Registry configuration.

use serde::{Deserialize, Serialize};

/// Environment variable names.
pub mod env_vars {
    /// Switch the CLI log output to JSON when set to `true` or `1`
    pub const LOG_JSON: &str = "DYNEXT_LOG_JSON";
}

/// Default tracing filter for binaries built on the extension system.
pub const DEFAULT_LOG_FILTER: &str = "dynext=info";

/// Settings that shape how an [`ExtensionSystem`](crate::ExtensionSystem)
/// accepts and reports extensions.
///
/// Changing a setting affects subsequent operations only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reject entries whose compiler identity differs from the host's
    pub verify_compiler: bool,
    /// Deliver progress messages to the message handler
    pub debug_output: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            verify_compiler: true,
            debug_output: false,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verify_compiler(mut self, verify: bool) -> Self {
        self.verify_compiler = verify;
        self
    }

    pub fn with_debug_output(mut self, enabled: bool) -> Self {
        self.debug_output = enabled;
        self
    }
}
