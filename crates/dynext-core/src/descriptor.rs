//! Extension descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::library::DynamicLibrary;

/// Built-in descriptor keys understood by [`ExtensionDescriptor::get`] and
/// [`MetadataFilter`](crate::MetadataFilter).
pub mod keys {
    pub const NAME: &str = "name";
    pub const INTERFACE_NAME: &str = "interface_name";
    pub const VERSION: &str = "version";
    pub const DESCRIPTION: &str = "description";
    pub const COMPILER: &str = "compiler";
    pub const COMPILER_VERSION: &str = "compiler_version";
    pub const LIBRARY_FILENAME: &str = "library_filename";
}

/// Decoded contents of one descriptor table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptorFields {
    pub name: String,
    pub interface_name: String,
    pub version: u32,
    pub description: String,
    pub compiler: String,
    pub compiler_version: String,
    /// Extra key/value metadata, ordered by key
    pub metadata: BTreeMap<String, String>,
}

impl DescriptorFields {
    /// Look up a built-in field or an extra metadata value.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            keys::NAME => Some(self.name.clone()),
            keys::INTERFACE_NAME => Some(self.interface_name.clone()),
            keys::VERSION => Some(self.version.to_string()),
            keys::DESCRIPTION => Some(self.description.clone()),
            keys::COMPILER => Some(self.compiler.clone()),
            keys::COMPILER_VERSION => Some(self.compiler_version.clone()),
            _ => self.metadata.get(key).cloned(),
        }
    }
}

static EMPTY_METADATA: BTreeMap<String, String> = BTreeMap::new();

struct DescriptorInner {
    fields: DescriptorFields,
    library: Arc<DynamicLibrary>,
}

/// Immutable description of one extension provided by a loaded module.
///
/// Cloning is cheap. Every clone keeps the owning module loaded.
/// [`ExtensionDescriptor::invalid`] is returned by lookups that fail.
#[derive(Clone, Default)]
pub struct ExtensionDescriptor {
    inner: Option<Arc<DescriptorInner>>,
}

impl ExtensionDescriptor {
    pub(crate) fn new(fields: DescriptorFields, library: Arc<DynamicLibrary>) -> Self {
        Self {
            inner: Some(Arc::new(DescriptorInner { fields, library })),
        }
    }

    /// The invalid descriptor.
    pub fn invalid() -> Self {
        Self { inner: None }
    }

    pub fn is_valid(&self) -> bool {
        self.inner.is_some()
    }

    /// Decoded fields, `None` for the invalid descriptor.
    pub fn fields(&self) -> Option<&DescriptorFields> {
        self.inner.as_ref().map(|inner| &inner.fields)
    }

    /// Owning module, `None` for the invalid descriptor.
    pub fn library(&self) -> Option<&Arc<DynamicLibrary>> {
        self.inner.as_ref().map(|inner| &inner.library)
    }

    pub fn name(&self) -> &str {
        self.fields().map_or("", |f| f.name.as_str())
    }

    pub fn interface_name(&self) -> &str {
        self.fields().map_or("", |f| f.interface_name.as_str())
    }

    pub fn version(&self) -> u32 {
        self.fields().map_or(0, |f| f.version)
    }

    pub fn description(&self) -> &str {
        self.fields().map_or("", |f| f.description.as_str())
    }

    pub fn compiler(&self) -> &str {
        self.fields().map_or("", |f| f.compiler.as_str())
    }

    pub fn compiler_version(&self) -> &str {
        self.fields().map_or("", |f| f.compiler_version.as_str())
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        self.fields().map_or(&EMPTY_METADATA, |f| &f.metadata)
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library().map(|library| library.path())
    }

    pub fn library_filename(&self) -> String {
        self.library()
            .map(|library| library.file_name())
            .unwrap_or_default()
    }

    /// Look up a built-in key (see [`keys`]) or an extra metadata value.
    pub fn get(&self, key: &str) -> Option<String> {
        if key == keys::LIBRARY_FILENAME {
            return self.library().map(|library| library.file_name());
        }
        self.fields()?.get(key)
    }

    /// Same (name, interface name, version) triple.
    pub fn same_identity(&self, other: &ExtensionDescriptor) -> bool {
        match (self.fields(), other.fields()) {
            (Some(a), Some(b)) => {
                a.name == b.name && a.interface_name == b.interface_name && a.version == b.version
            }
            _ => false,
        }
    }
}

impl PartialEq for ExtensionDescriptor {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (false, false) => true,
            (true, true) => self.same_identity(other) && self.library_path() == other.library_path(),
            _ => false,
        }
    }
}

impl Eq for ExtensionDescriptor {}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("ExtensionDescriptor")
                .field("fields", &inner.fields)
                .field("library", &inner.library.path())
                .finish(),
            None => f.write_str("ExtensionDescriptor(invalid)"),
        }
    }
}

impl fmt::Display for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(fields) = self.fields() else {
            return writeln!(f, "  <invalid>");
        };

        writeln!(f, "  {} = {}", keys::NAME, fields.name)?;
        writeln!(f, "  {} = {}", keys::INTERFACE_NAME, fields.interface_name)?;
        writeln!(f, "  {} = {}", keys::VERSION, fields.version)?;
        writeln!(f, "  {} = {}", keys::DESCRIPTION, fields.description)?;
        writeln!(f, "  {} = {}", keys::COMPILER, fields.compiler)?;
        writeln!(f, "  {} = {}", keys::COMPILER_VERSION, fields.compiler_version)?;
        writeln!(f, "  {} = {}", keys::LIBRARY_FILENAME, self.library_filename())?;
        for (key, value) in &fields.metadata {
            writeln!(f, "  {key} = {value}")?;
        }
        Ok(())
    }
}
