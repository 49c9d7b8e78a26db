//! Dynext Extension SDK
//!
//! Protocol types and macros for building native extension modules that can
//! be discovered and instantiated by `dynext-core`.
//!
//! # Quick Start
//!
//! ```ignore
//! use dynext_sdk::prelude::*;
//!
//! pub trait Counter: Send + Sync {
//!     fn count(&self) -> i32;
//! }
//! declare_interface!(dyn Counter, "example::Counter");
//!
//! #[derive(Default)]
//! struct Ten;
//!
//! impl Counter for Ten {
//!     fn count(&self) -> i32 {
//!         10
//!     }
//! }
//!
//! export_extensions! {
//!     Ten => dyn Counter as "example::Counter" {
//!         name: "Ten",
//!         version: 1,
//!         description: "always ten",
//!     }
//! }
//! ```
//!
//! The module must be built with `crate-type = ["cdylib"]`.

pub mod abi;
pub mod descriptor;
pub mod interface;
#[macro_use]
pub mod macros;

pub use abi::{
    destroy_symbol, factory_symbol, ABI_VERSION, COMPILER_ID, COMPILER_VERSION,
    DESCRIPTOR_SYMBOL, DESTROY_PREFIX, FACTORY_PREFIX, SYMBOL_SEPARATOR,
};
pub use descriptor::{
    CDescriptorTable, CExtensionEntry, CMetadataPair, DescriptorFn, DescriptorTable, DestroyFn,
    ExtensionEntry, FactoryFn,
};
pub use interface::Interface;

/// Prelude module with common imports
pub mod prelude {
    pub use crate::descriptor::{DescriptorTable, ExtensionEntry};
    pub use crate::interface::Interface;
    pub use crate::{declare_interface, export_extensions};
}
