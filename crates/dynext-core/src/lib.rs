//! Dynext Core
//!
//! Discovers native extension modules on disk, verifies they were built
//! compatibly, catalogs the extensions they describe and instantiates them
//! behind interface traits.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dynext_core::{declare_interface, ExtensionSystem};
//!
//! pub trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//! declare_interface!(dyn Greeter, "example::Greeter");
//!
//! let mut system = ExtensionSystem::new();
//! system.set_message_handler(|msg| eprintln!("{msg}"));
//! system.search_directory("./extensions", true);
//!
//! for descriptor in system.extensions_of::<dyn Greeter>() {
//!     println!("{descriptor}");
//! }
//!
//! if let Some(greeter) = system.create_extension::<dyn Greeter>("English") {
//!     println!("{}", greeter.greet());
//! }
//! ```
//!
//! Extension modules are built with `dynext-sdk`.

pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod instance;
pub mod library;
pub mod registry;

pub use config::RegistryConfig;
pub use descriptor::{DescriptorFields, ExtensionDescriptor};
pub use diagnostics::{global_message_handler, set_global_message_handler, MessageHandler};
pub use error::{ExtensionError, Result};
pub use filter::MetadataFilter;
pub use instance::{Extension, InstanceId};
pub use library::{is_library_file, resolve_library_path, DynamicLibrary};
pub use registry::{ExtensionSystem, LoadedLibrary};

pub use dynext_sdk::{declare_interface, Interface};
