//! Extension registry.
//!
//! Scans directories for native modules, validates their descriptor tables,
//! keeps a catalog of accepted extensions and instantiates them by name,
//! version and interface.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dynext_sdk::{Interface, COMPILER_ID, COMPILER_VERSION};
use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::config::RegistryConfig;
use crate::descriptor::{DescriptorFields, ExtensionDescriptor};
use crate::diagnostics::{Diagnostics, MessageHandler};
use crate::error::{ExtensionError, Result};
use crate::filter::MetadataFilter;
use crate::instance::{Extension, InstanceTable};
use crate::library::{is_library_file, resolve_library_path, DynamicLibrary};

/// A module owned by the registry.
#[derive(Debug, Clone)]
pub struct LoadedLibrary {
    /// Path to the module file
    pub path: PathBuf,
    /// When the module was loaded
    pub loaded_at: DateTime<Utc>,
    /// Number of catalog entries contributed by the module
    pub extension_count: usize,
}

struct LibraryEntry {
    library: Arc<DynamicLibrary>,
    loaded_at: DateTime<Utc>,
    extension_count: usize,
}

/// Catalog of extensions discovered in native modules.
///
/// Catalog mutation takes `&mut self`; queries and instantiation take `&self`.
/// Wrap the registry in a lock to share it between threads.
pub struct ExtensionSystem {
    config: RegistryConfig,
    diagnostics: Diagnostics,
    catalog: Vec<ExtensionDescriptor>,
    libraries: Vec<LibraryEntry>,
    instances: Arc<InstanceTable>,
}

impl ExtensionSystem {
    /// Create an empty registry with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            diagnostics: Diagnostics::new(config.debug_output),
            config,
            catalog: Vec::new(),
            libraries: Vec::new(),
            instances: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Install a registry-specific message handler. It takes precedence over
    /// the process-wide handler.
    pub fn set_message_handler<F>(&mut self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let handler: MessageHandler = Arc::new(handler);
        self.diagnostics.set_handler(Some(handler));
    }

    /// Fall back to the process-wide message handler.
    pub fn clear_message_handler(&mut self) {
        self.diagnostics.set_handler(None);
    }

    /// Deliver progress messages to the message handler.
    pub fn set_enable_debug_output(&mut self, enabled: bool) {
        self.config.debug_output = enabled;
        self.diagnostics.set_debug_output(enabled);
    }

    pub fn debug_output(&self) -> bool {
        self.config.debug_output
    }

    /// Reject entries built by a different compiler (on by default).
    pub fn set_verify_compiler(&mut self, verify: bool) {
        self.config.verify_compiler = verify;
    }

    pub fn verify_compiler(&self) -> bool {
        self.config.verify_compiler
    }

    // ========================================================================
    // Discovery
    // ========================================================================

    /// Load every module under `root` and catalog the extensions they
    /// provide. Sub-directories are visited only when `recursive` is set.
    ///
    /// Files are visited in file name order. Failures are reported through
    /// the message handler and skipped. Returns the number of accepted
    /// extensions.
    pub fn search_directory(&mut self, root: impl AsRef<Path>, recursive: bool) -> usize {
        self.scan(root.as_ref(), None, recursive)
    }

    /// Like [`search_directory`](Self::search_directory), restricted to files
    /// whose name starts with `prefix`.
    pub fn search_directory_with_prefix(
        &mut self,
        root: impl AsRef<Path>,
        prefix: &str,
        recursive: bool,
    ) -> usize {
        self.scan(root.as_ref(), Some(prefix), recursive)
    }

    /// Load a single module file. The platform prefix and extension may be
    /// omitted. Returns the number of accepted extensions.
    pub fn add_library(&mut self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        match resolve_library_path(path) {
            Some(resolved) => self.load_candidate(&resolved),
            None => {
                self.diagnostics.error(
                    ExtensionError::Load {
                        path: path.to_path_buf(),
                        message: "file not found".to_string(),
                    }
                    .to_string(),
                );
                0
            }
        }
    }

    /// Remove the extensions contributed by the module at `path` and release
    /// the registry's hold on it. Live instances and descriptor clones keep
    /// the module loaded. Returns the number of removed extensions.
    pub fn remove_library(&mut self, path: impl AsRef<Path>) -> usize {
        let path = path.as_ref();
        let before = self.catalog.len();

        self.catalog.retain(|descriptor| {
            !descriptor
                .library_path()
                .is_some_and(|library_path| same_path(library_path, path))
        });
        self.libraries
            .retain(|entry| !same_path(entry.library.path(), path));

        let removed = before - self.catalog.len();
        if removed > 0 {
            self.diagnostics.debug(format!(
                "Removed {} extension(s) from {}",
                removed,
                path.display()
            ));
        }
        removed
    }

    /// Forget every cataloged extension and owned module.
    pub fn clear(&mut self) {
        self.catalog.clear();
        self.libraries.clear();
    }

    fn scan(&mut self, root: &Path, prefix: Option<&str>, recursive: bool) -> usize {
        self.diagnostics
            .debug(format!("Searching {} for extensions", root.display()));

        let mut walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut accepted = 0;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let err = ExtensionError::Scan {
                        path: e.path().unwrap_or(root).to_path_buf(),
                        message: e.to_string(),
                    };
                    self.diagnostics.error(err.to_string());
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !is_library_file(path) {
                continue;
            }
            if let Some(prefix) = prefix {
                let name = entry.file_name().to_string_lossy();
                if !name.starts_with(prefix) {
                    continue;
                }
            }

            accepted += self.load_candidate(path);
        }

        accepted
    }

    fn load_candidate(&mut self, path: &Path) -> usize {
        self.diagnostics.debug(format!("Loading {}", path.display()));

        let library = match DynamicLibrary::open(path) {
            Ok(library) => Arc::new(library),
            Err(e) => {
                self.diagnostics.error(e.to_string());
                return 0;
            }
        };

        let entries = match library.read_descriptor_table() {
            Ok(entries) => entries,
            Err(e) => {
                self.diagnostics.error(e.to_string());
                return 0;
            }
        };

        let mut accepted = 0;
        for entry in entries {
            let fields = match entry.and_then(|fields| self.check_compiler(fields, path)) {
                Ok(fields) => fields,
                Err(e) => {
                    self.diagnostics.error(e.to_string());
                    continue;
                }
            };

            let descriptor = ExtensionDescriptor::new(fields, library.clone());
            if let Some(existing) = self
                .catalog
                .iter()
                .find(|existing| existing.same_identity(&descriptor))
            {
                self.diagnostics.error(format!(
                    "Duplicate extension '{}' ({} version {}) in {}, already provided by {}",
                    descriptor.name(),
                    descriptor.interface_name(),
                    descriptor.version(),
                    path.display(),
                    existing.library_filename(),
                ));
            }

            self.diagnostics.debug(format!(
                "Found extension '{}' ({} version {})",
                descriptor.name(),
                descriptor.interface_name(),
                descriptor.version()
            ));
            self.catalog.push(descriptor);
            accepted += 1;
        }

        if accepted > 0 {
            self.libraries.push(LibraryEntry {
                library,
                loaded_at: Utc::now(),
                extension_count: accepted,
            });
        } else {
            self.diagnostics.debug(format!(
                "No extensions accepted from {}",
                path.display()
            ));
        }

        accepted
    }

    fn check_compiler(&self, fields: DescriptorFields, path: &Path) -> Result<DescriptorFields> {
        if !self.config.verify_compiler
            || (fields.compiler == COMPILER_ID && fields.compiler_version == COMPILER_VERSION)
        {
            return Ok(fields);
        }

        Err(ExtensionError::AbiMismatch {
            name: fields.name,
            path: path.to_path_buf(),
            expected: format!("{COMPILER_ID} {COMPILER_VERSION}"),
            found: format!("{} {}", fields.compiler, fields.compiler_version),
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// All cataloged extensions in registration order.
    pub fn extensions(&self) -> Vec<ExtensionDescriptor> {
        self.catalog.clone()
    }

    /// Cataloged extensions implementing `I`.
    pub fn extensions_of<I: ?Sized + Interface>(&self) -> Vec<ExtensionDescriptor> {
        self.catalog
            .iter()
            .filter(|descriptor| descriptor.interface_name() == I::NAME)
            .cloned()
            .collect()
    }

    /// Cataloged extensions matching `filter`.
    pub fn extensions_matching(&self, filter: &MetadataFilter) -> Vec<ExtensionDescriptor> {
        self.catalog
            .iter()
            .filter(|descriptor| filter.matches(descriptor))
            .cloned()
            .collect()
    }

    /// Modules currently owned by the registry.
    pub fn loaded_libraries(&self) -> Vec<LoadedLibrary> {
        self.libraries
            .iter()
            .map(|entry| LoadedLibrary {
                path: entry.library.path().to_path_buf(),
                loaded_at: entry.loaded_at,
                extension_count: entry.extension_count,
            })
            .collect()
    }

    /// Number of live instances created by this registry.
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    // ========================================================================
    // Instantiation
    // ========================================================================

    /// Create the highest version of extension `name` implementing `I`.
    ///
    /// Among entries with equal versions, the first registered wins.
    pub fn create_extension<I: ?Sized + Interface>(&self, name: &str) -> Option<Extension<I>> {
        self.report(self.try_create_extension(name, None))
    }

    /// Create extension `name` implementing `I` with exactly `version`.
    pub fn create_extension_version<I: ?Sized + Interface>(
        &self,
        name: &str,
        version: u32,
    ) -> Option<Extension<I>> {
        self.report(self.try_create_extension(name, Some(version)))
    }

    /// Create the extension described by `descriptor`.
    pub fn create_extension_from<I: ?Sized + Interface>(
        &self,
        descriptor: &ExtensionDescriptor,
    ) -> Option<Extension<I>> {
        self.report(self.try_create_extension_from(descriptor))
    }

    /// Fallible form of [`create_extension`](Self::create_extension) and
    /// [`create_extension_version`](Self::create_extension_version).
    pub fn try_create_extension<I: ?Sized + Interface>(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<Extension<I>> {
        let candidates = self.catalog.iter().filter(|descriptor| {
            descriptor.name() == name
                && descriptor.interface_name() == I::NAME
                && version.map_or(true, |version| descriptor.version() == version)
        });

        let descriptor = select_best(candidates, |descriptor| descriptor.version())
            .ok_or_else(|| ExtensionError::NotFound {
                name: name.to_string(),
                interface: I::NAME.to_string(),
                version,
            })?;

        self.try_create_extension_from(descriptor)
    }

    /// Fallible form of [`create_extension_from`](Self::create_extension_from).
    pub fn try_create_extension_from<I: ?Sized + Interface>(
        &self,
        descriptor: &ExtensionDescriptor,
    ) -> Result<Extension<I>> {
        let library = descriptor
            .library()
            .ok_or_else(|| ExtensionError::InvalidDescriptor {
                path: PathBuf::new(),
                message: "the invalid descriptor cannot be instantiated".to_string(),
            })?;

        if descriptor.interface_name() != I::NAME {
            return Err(ExtensionError::NotFound {
                name: descriptor.name().to_string(),
                interface: I::NAME.to_string(),
                version: Some(descriptor.version()),
            });
        }

        let (object, destroy) =
            library.instantiate::<I>(descriptor.name(), descriptor.interface_name())?;

        self.diagnostics.debug(format!(
            "Created extension '{}' ({} version {})",
            descriptor.name(),
            descriptor.interface_name(),
            descriptor.version()
        ));

        Ok(Extension::new(
            object,
            destroy,
            descriptor.clone(),
            &self.instances,
        ))
    }

    /// Descriptor an instance was created from, or the invalid descriptor if
    /// the instance was not created by this registry.
    pub fn find_description<I: ?Sized>(&self, instance: &Extension<I>) -> ExtensionDescriptor {
        self.describe(instance)
            .unwrap_or_else(|_| ExtensionDescriptor::invalid())
    }

    /// Fallible form of [`find_description`](Self::find_description).
    pub fn describe<I: ?Sized>(&self, instance: &Extension<I>) -> Result<ExtensionDescriptor> {
        self.instances
            .lock()
            .get(&instance.id())
            .cloned()
            .ok_or(ExtensionError::InvalidInstance)
    }

    fn report<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e @ ExtensionError::NotFound { .. }) => {
                self.diagnostics.debug(e.to_string());
                None
            }
            Err(e) => {
                self.diagnostics.error(e.to_string());
                None
            }
        }
    }
}

impl Default for ExtensionSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExtensionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionSystem")
            .field("config", &self.config)
            .field("diagnostics", &self.diagnostics)
            .field("extensions", &self.catalog.len())
            .field("libraries", &self.libraries.len())
            .field("instances", &self.instance_count())
            .finish()
    }
}

/// Pick the item with the highest version; the first one wins among equals.
fn select_best<T>(items: impl IntoIterator<Item = T>, version: impl Fn(&T) -> u32) -> Option<T> {
    let mut best: Option<T> = None;
    for item in items {
        let better = match &best {
            Some(current) => version(&item) > version(current),
            None => true,
        };
        if better {
            best = Some(item);
        }
    }
    best
}

fn same_path(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
