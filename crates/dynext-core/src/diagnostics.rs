//! Diagnostic message delivery.
//!
//! Every message is emitted through `tracing`. In addition, failure messages
//! are always passed to the active message handler, while progress messages
//! only reach it when debug output is enabled. The active handler is the
//! registry's own handler if one is set, otherwise the process-wide handler.
//! With neither installed, delivery is silent.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

/// `tracing` target of every diagnostic event.
pub const TARGET: &str = "dynext::diagnostics";

/// Callback receiving diagnostic text.
pub type MessageHandler = Arc<dyn Fn(&str) + Send + Sync>;

static GLOBAL_HANDLER: Lazy<RwLock<Option<MessageHandler>>> = Lazy::new(|| RwLock::new(None));

/// Install (or remove, with `None`) the process-wide message handler.
pub fn set_global_message_handler(handler: Option<MessageHandler>) {
    *GLOBAL_HANDLER.write() = handler;
}

/// Currently installed process-wide message handler.
pub fn global_message_handler() -> Option<MessageHandler> {
    GLOBAL_HANDLER.read().clone()
}

/// Per-registry diagnostic sink.
#[derive(Clone, Default)]
pub struct Diagnostics {
    handler: Option<MessageHandler>,
    debug_output: bool,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("handler", &self.handler.is_some())
            .field("debug_output", &self.debug_output)
            .finish()
    }
}

impl Diagnostics {
    pub fn new(debug_output: bool) -> Self {
        Self {
            handler: None,
            debug_output,
        }
    }

    pub fn set_handler(&mut self, handler: Option<MessageHandler>) {
        self.handler = handler;
    }

    pub fn set_debug_output(&mut self, enabled: bool) {
        self.debug_output = enabled;
    }

    /// Report a failure. Always delivered.
    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::warn!(target: TARGET, "{}", message);
        self.deliver(message);
    }

    /// Report progress. Delivered only with debug output enabled.
    pub fn debug(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(target: TARGET, "{}", message);
        if self.debug_output {
            self.deliver(message);
        }
    }

    fn deliver(&self, message: &str) {
        match &self.handler {
            Some(handler) => handler(message),
            None => {
                if let Some(handler) = global_message_handler() {
                    handler(message);
                }
            }
        }
    }
}
