//! Test module that claims to be built by another compiler.
//!
//! The table is written by hand and no factory is exported.

use std::sync::OnceLock;

use dynext_sdk::{CDescriptorTable, DescriptorTable, ExtensionEntry};

#[no_mangle]
pub extern "C" fn dynext_extension_descriptors() -> *const CDescriptorTable {
    static TABLE: OnceLock<DescriptorTable> = OnceLock::new();

    TABLE
        .get_or_init(|| {
            DescriptorTable::new(vec![ExtensionEntry::new("ext_name", "ext_interface", 1)
                .with_description("extension")
                .with_compiler("test", "1")])
        })
        .as_raw()
}
