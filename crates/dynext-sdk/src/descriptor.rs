//! Descriptor table exported by extension modules.
//!
//! The table is plain `#[repr(C)]` data (NUL-terminated strings, counted
//! arrays) so that reading it never depends on the layout of Rust types.

use std::ffi::{c_char, c_void, CString};
use std::ptr;

use crate::abi::{ABI_VERSION, COMPILER_ID, COMPILER_VERSION};

/// Header returned by the descriptor export symbol.
#[repr(C)]
pub struct CDescriptorTable {
    /// Must match [`ABI_VERSION`]
    pub abi_version: u32,
    pub entries: *const CExtensionEntry,
    pub entry_count: usize,
}

/// One extension advertised by a module.
#[repr(C)]
pub struct CExtensionEntry {
    pub name: *const c_char,
    /// Stable interface name, see [`Interface::NAME`](crate::Interface::NAME)
    pub interface_name: *const c_char,
    pub version: u32,
    pub description: *const c_char,
    pub compiler: *const c_char,
    pub compiler_version: *const c_char,
    pub metadata: *const CMetadataPair,
    pub metadata_count: usize,
}

/// Extra key/value metadata attached to an entry.
#[repr(C)]
pub struct CMetadataPair {
    pub key: *const c_char,
    pub value: *const c_char,
}

impl CDescriptorTable {
    /// View the entries of the table.
    ///
    /// # Safety
    /// `entries` must point to `entry_count` initialized entries that stay
    /// valid for the lifetime of `self` (or be null with a count of zero).
    pub unsafe fn entries(&self) -> &[CExtensionEntry] {
        if self.entries.is_null() || self.entry_count == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.entries, self.entry_count)
    }
}

impl CExtensionEntry {
    /// View the metadata pairs of the entry.
    ///
    /// # Safety
    /// Same contract as [`CDescriptorTable::entries`].
    pub unsafe fn metadata(&self) -> &[CMetadataPair] {
        if self.metadata.is_null() || self.metadata_count == 0 {
            return &[];
        }
        std::slice::from_raw_parts(self.metadata, self.metadata_count)
    }
}

/// Signature of the [`DESCRIPTOR_SYMBOL`](crate::DESCRIPTOR_SYMBOL) export.
pub type DescriptorFn = unsafe extern "C" fn() -> *const CDescriptorTable;

/// Signature of a factory export. Returns a `*mut Box<dyn Interface>` or null.
pub type FactoryFn = unsafe extern "C" fn() -> *mut c_void;

/// Signature of a destroy export. Accepts a pointer returned by the paired factory.
pub type DestroyFn = unsafe extern "C" fn(*mut c_void);

/// Owned description of one extension, used to build a [`DescriptorTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionEntry {
    pub name: String,
    pub interface_name: String,
    pub version: u32,
    pub description: String,
    pub compiler: String,
    pub compiler_version: String,
    pub metadata: Vec<(String, String)>,
}

impl ExtensionEntry {
    /// Create an entry stamped with the identity of the current compiler.
    pub fn new(name: impl Into<String>, interface_name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            interface_name: interface_name.into(),
            version,
            description: String::new(),
            compiler: COMPILER_ID.to_string(),
            compiler_version: COMPILER_VERSION.to_string(),
            metadata: Vec::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a metadata pair
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }

    /// Override the advertised compiler identity.
    pub fn with_compiler(mut self, id: impl Into<String>, version: impl Into<String>) -> Self {
        self.compiler = id.into();
        self.compiler_version = version.into();
        self
    }
}

/// Owned storage behind a [`CDescriptorTable`].
///
/// Every pointer in the raw table points into heap allocations owned by this
/// value, so the table stays valid for as long as the `DescriptorTable` lives.
/// Modules keep it in a `static OnceLock`.
pub struct DescriptorTable {
    raw: Box<CDescriptorTable>,
    _entries: Vec<CExtensionEntry>,
    _pairs: Vec<Vec<CMetadataPair>>,
    _strings: Vec<CString>,
}

// SAFETY: the raw pointers only reference data owned by the table itself,
// which is never mutated after construction.
unsafe impl Send for DescriptorTable {}
unsafe impl Sync for DescriptorTable {}

impl DescriptorTable {
    /// Build the raw table for a list of entries.
    pub fn new(entries: Vec<ExtensionEntry>) -> Self {
        let mut strings = StringArena::default();
        let mut pairs = Vec::with_capacity(entries.len());
        let mut raw_entries = Vec::with_capacity(entries.len());

        for entry in &entries {
            let entry_pairs: Vec<CMetadataPair> = entry
                .metadata
                .iter()
                .map(|(key, value)| CMetadataPair {
                    key: strings.intern(key),
                    value: strings.intern(value),
                })
                .collect();

            raw_entries.push(CExtensionEntry {
                name: strings.intern(&entry.name),
                interface_name: strings.intern(&entry.interface_name),
                version: entry.version,
                description: strings.intern(&entry.description),
                compiler: strings.intern(&entry.compiler),
                compiler_version: strings.intern(&entry.compiler_version),
                metadata: if entry_pairs.is_empty() {
                    ptr::null()
                } else {
                    entry_pairs.as_ptr()
                },
                metadata_count: entry_pairs.len(),
            });
            // Moving the Vec keeps its heap buffer in place.
            pairs.push(entry_pairs);
        }

        let raw = Box::new(CDescriptorTable {
            abi_version: ABI_VERSION,
            entries: if raw_entries.is_empty() {
                ptr::null()
            } else {
                raw_entries.as_ptr()
            },
            entry_count: raw_entries.len(),
        });

        Self {
            raw,
            _entries: raw_entries,
            _pairs: pairs,
            _strings: strings.into_inner(),
        }
    }

    /// Pointer handed out by the descriptor export.
    pub fn as_raw(&self) -> *const CDescriptorTable {
        &*self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.raw.entry_count == 0
    }
}

#[derive(Default)]
struct StringArena {
    strings: Vec<CString>,
}

impl StringArena {
    fn intern(&mut self, value: &str) -> *const c_char {
        let value = to_cstring(value);
        let ptr = value.as_ptr();
        self.strings.push(value);
        ptr
    }

    fn into_inner(self) -> Vec<CString> {
        self.strings
    }
}

/// Convert to a C string, dropping interior NUL bytes.
fn to_cstring(value: &str) -> CString {
    CString::new(value).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}
