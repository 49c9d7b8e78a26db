//! Test module mixing an entry from another compiler with a native one.
//!
//! The table is written by hand and no factory is exported.

use std::sync::OnceLock;

use dynext_sdk::{CDescriptorTable, DescriptorTable, ExtensionEntry};

#[no_mangle]
pub extern "C" fn dynext_extension_descriptors() -> *const CDescriptorTable {
    static TABLE: OnceLock<DescriptorTable> = OnceLock::new();

    TABLE
        .get_or_init(|| {
            DescriptorTable::new(vec![
                ExtensionEntry::new("legacy", "ext_interface", 1).with_compiler("test", "1"),
                ExtensionEntry::new("current", "ext_interface", 2).with_description("native"),
            ])
        })
        .as_raw()
}
