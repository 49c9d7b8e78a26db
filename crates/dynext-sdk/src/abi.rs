//! Fixed names and build identity shared by hosts and extension modules.

/// Layout version of [`CDescriptorTable`](crate::CDescriptorTable).
/// Incremented whenever the `#[repr(C)]` protocol types change.
pub const ABI_VERSION: u32 = 1;

/// Name of the symbol every extension module exports.
///
/// Signature: `extern "C" fn() -> *const CDescriptorTable`.
pub const DESCRIPTOR_SYMBOL: &str = "dynext_extension_descriptors";

/// Prefix of the per-extension factory symbol.
pub const FACTORY_PREFIX: &str = "dynext_create__";

/// Prefix of the per-extension destroy symbol.
pub const DESTROY_PREFIX: &str = "dynext_destroy__";

/// Separator between the interface name and the extension name in
/// factory and destroy symbols.
pub const SYMBOL_SEPARATOR: &str = "__";

/// Identifier of the compiler that built this crate.
pub const COMPILER_ID: &str = "rustc";

/// Version of the compiler that built this crate, as reported by
/// `rustc --version` (without the leading `rustc`).
pub const COMPILER_VERSION: &str = env!("DYNEXT_RUSTC_VERSION");

/// Name of the factory symbol for an extension implementing an interface.
///
/// Must agree with the `export_name` generated by
/// [`export_extensions!`](crate::export_extensions).
pub fn factory_symbol(name: &str, interface_name: &str) -> String {
    format!("{FACTORY_PREFIX}{interface_name}{SYMBOL_SEPARATOR}{name}")
}

/// Name of the destroy symbol paired with [`factory_symbol`].
pub fn destroy_symbol(name: &str, interface_name: &str) -> String {
    format!("{DESTROY_PREFIX}{interface_name}{SYMBOL_SEPARATOR}{name}")
}

/// Byte-wise string comparison usable in constant evaluation.
#[doc(hidden)]
pub const fn str_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i] != b[i] {
            return false;
        }
        i += 1;
    }
    true
}
