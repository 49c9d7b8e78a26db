//! Native module handle.
//!
//! Every conversion of a symbol address into a typed pointer, and every read
//! of the `#[repr(C)]` descriptor table, happens in this file.

use std::collections::BTreeMap;
use std::env::consts::{DLL_EXTENSION, DLL_PREFIX};
use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use dynext_sdk::{
    destroy_symbol, factory_symbol, CDescriptorTable, CExtensionEntry, DescriptorFn, DestroyFn,
    FactoryFn, Interface, ABI_VERSION, DESCRIPTOR_SYMBOL,
};
use libloading::{Library, Symbol};

use crate::descriptor::DescriptorFields;
use crate::error::{ExtensionError, Result};

/// A loaded native module.
///
/// The module stays loaded for as long as this value lives and is unloaded
/// exactly once when it is dropped. Share it through `Arc`.
#[derive(Debug)]
pub struct DynamicLibrary {
    path: PathBuf,
    library: Library,
}

impl DynamicLibrary {
    /// Load the module at `path`.
    ///
    /// Loading runs the module's initialization routines, which execute with
    /// the full privileges of the host process.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        // SAFETY: loading foreign code is inherently trusted; see above.
        let library = unsafe { Library::new(path) }.map_err(|e| ExtensionError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        tracing::trace!(path = %path.display(), "Loaded library");

        Ok(Self {
            path: path.to_path_buf(),
            library,
        })
    }

    /// Path the module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component of [`path`](Self::path).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Platform file extension of native modules, without the dot.
    pub fn file_extension() -> &'static str {
        DLL_EXTENSION
    }

    /// Platform file name prefix of native modules (`lib` on Unix).
    pub fn file_prefix() -> &'static str {
        DLL_PREFIX
    }

    /// Raw address of an exported symbol.
    pub fn resolve(&self, name: &str) -> Result<*mut c_void> {
        // SAFETY: the address is returned as an opaque pointer and never
        // dereferenced here.
        let symbol: Symbol<*mut c_void> = unsafe { self.library.get(name.as_bytes()) }
            .map_err(|e| self.symbol_error(name, e))?;
        Ok(*symbol)
    }

    /// Resolve an exported symbol as a value of type `T`, typically a
    /// function pointer.
    ///
    /// # Safety
    /// `T` must match the actual type of the exported symbol.
    pub unsafe fn get<T: Copy>(&self, name: &str) -> Result<T> {
        let symbol: Symbol<T> = self
            .library
            .get(name.as_bytes())
            .map_err(|e| self.symbol_error(name, e))?;
        Ok(*symbol)
    }

    /// Read every entry of the module's descriptor table.
    ///
    /// The outer error covers the table as a whole (missing export, null
    /// table, layout version). Entries that fail to decode are reported
    /// individually so the remaining ones can still be accepted.
    pub(crate) fn read_descriptor_table(&self) -> Result<Vec<Result<DescriptorFields>>> {
        // SAFETY: the descriptor export has this signature by protocol.
        let describe: DescriptorFn = unsafe { self.get(DESCRIPTOR_SYMBOL)? };
        // SAFETY: the table is owned by the module and lives as long as it.
        unsafe { decode_descriptor_table(&self.path, describe()) }
    }

    /// Invoke the factory of the named extension.
    ///
    /// The caller must have checked that the extension implements `I`, that
    /// is, that `interface_name == I::NAME` in the accepted descriptor.
    pub(crate) fn instantiate<I>(
        &self,
        name: &str,
        interface_name: &str,
    ) -> Result<(NonNull<Box<I>>, DestroyFn)>
    where
        I: ?Sized + Interface,
    {
        let factory_name = factory_symbol(name, interface_name);
        let destroy_name = destroy_symbol(name, interface_name);

        // SAFETY: factory and destroy exports have these signatures by protocol.
        let factory: FactoryFn = unsafe { self.get(&factory_name)? };
        let destroy: DestroyFn = unsafe { self.get(&destroy_name)? };

        // SAFETY: the factory returns either null or a `*mut Box<I>` for
        // the interface named in its symbol.
        let raw = unsafe { factory() };
        let object = NonNull::new(raw.cast::<Box<I>>())
            .ok_or(ExtensionError::NullInstance {
                symbol: factory_name,
            })?;

        Ok((object, destroy))
    }

    fn symbol_error(&self, symbol: &str, err: libloading::Error) -> ExtensionError {
        ExtensionError::Symbol {
            symbol: symbol.to_string(),
            path: self.path.clone(),
            message: err.to_string(),
        }
    }
}

impl Drop for DynamicLibrary {
    fn drop(&mut self) {
        tracing::trace!(path = %self.path.display(), "Unloading library");
    }
}

/// Decode a descriptor table returned by the module at `path`.
///
/// # Safety
/// `table` must be null or point to a table whose arrays and strings follow
/// the contract of [`CDescriptorTable`].
unsafe fn decode_descriptor_table(
    path: &Path,
    table: *const CDescriptorTable,
) -> Result<Vec<Result<DescriptorFields>>> {
    let table = table.as_ref().ok_or_else(|| {
        invalid_descriptor(path, "descriptor export returned a null table".to_string())
    })?;

    check_abi_version(path, table)?;

    Ok(table
        .entries()
        .iter()
        .enumerate()
        .map(|(index, entry)| read_entry(path, index, entry))
        .collect())
}

fn check_abi_version(path: &Path, table: &CDescriptorTable) -> Result<()> {
    if table.abi_version != ABI_VERSION {
        return Err(ExtensionError::AbiVersion {
            path: path.to_path_buf(),
            expected: ABI_VERSION,
            found: table.abi_version,
        });
    }
    Ok(())
}

/// # Safety
/// Non-null strings in `entry` must be NUL-terminated and its metadata
/// array must hold `metadata_count` pairs.
unsafe fn read_entry(
    path: &Path,
    index: usize,
    entry: &CExtensionEntry,
) -> Result<DescriptorFields> {
    let field = |ptr: *const c_char, what: &str| -> Result<String> {
        read_c_string(ptr).ok_or_else(|| {
            invalid_descriptor(path, format!("entry {index}: {what} is null or not UTF-8"))
        })
    };

    let mut metadata = BTreeMap::new();
    for pair in entry.metadata() {
        metadata.insert(field(pair.key, "metadata key")?, field(pair.value, "metadata value")?);
    }

    Ok(DescriptorFields {
        name: field(entry.name, "name")?,
        interface_name: field(entry.interface_name, "interface name")?,
        version: entry.version,
        description: field(entry.description, "description")?,
        compiler: field(entry.compiler, "compiler")?,
        compiler_version: field(entry.compiler_version, "compiler version")?,
        metadata,
    })
}

fn invalid_descriptor(path: &Path, message: String) -> ExtensionError {
    ExtensionError::InvalidDescriptor {
        path: path.to_path_buf(),
        message,
    }
}

/// Read a NUL-terminated UTF-8 string.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn read_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(str::to_string)
}

/// Whether `path` carries the platform extension of native modules.
pub fn is_library_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == DLL_EXTENSION)
}

/// Locate a module file.
///
/// Tries `path` as given, then with the platform extension appended, then
/// with the platform prefix and extension (`plugin` -> `libplugin.so`).
pub fn resolve_library_path(path: impl AsRef<Path>) -> Option<PathBuf> {
    let path = path.as_ref();
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    let file_name = path.file_name()?.to_string_lossy().into_owned();

    let with_extension = path.with_file_name(format!("{file_name}.{DLL_EXTENSION}"));
    if with_extension.is_file() {
        return Some(with_extension);
    }

    let with_prefix = path.with_file_name(format!("{DLL_PREFIX}{file_name}.{DLL_EXTENSION}"));
    with_prefix.is_file().then_some(with_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_library_file() {
        let name = format!("libsample.{DLL_EXTENSION}");
        assert!(is_library_file(Path::new(&name)));
        assert!(!is_library_file(Path::new("libsample.txt")));
        assert!(!is_library_file(Path::new("libsample")));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("missing.{DLL_EXTENSION}"));

        let err = DynamicLibrary::open(&path).unwrap_err();
        match err {
            ExtensionError::Load { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_open_garbage_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(format!("garbage.{DLL_EXTENSION}"));
        fs::write(&path, b"definitely not a shared library").unwrap();

        assert!(matches!(
            DynamicLibrary::open(&path),
            Err(ExtensionError::Load { .. })
        ));
    }

    #[test]
    fn test_resolve_library_path() {
        let dir = TempDir::new().unwrap();
        let exact = dir.path().join(format!("exact.{DLL_EXTENSION}"));
        let bare = dir.path().join(format!("bare.{DLL_EXTENSION}"));
        let prefixed = dir
            .path()
            .join(format!("{DLL_PREFIX}prefixed.{DLL_EXTENSION}"));
        for file in [&exact, &bare, &prefixed] {
            fs::write(file, b"").unwrap();
        }

        assert_eq!(resolve_library_path(&exact), Some(exact.clone()));
        assert_eq!(resolve_library_path(dir.path().join("bare")), Some(bare));
        assert_eq!(
            resolve_library_path(dir.path().join("prefixed")),
            Some(prefixed)
        );
        assert_eq!(resolve_library_path(dir.path().join("nothing")), None);
    }

    /// Entry plus the strings it points into.
    struct RawEntry {
        _strings: Vec<CString>,
        entry: CExtensionEntry,
    }

    fn raw_entry(name: Option<&[u8]>) -> RawEntry {
        let parts: [&[u8]; 5] = [name.unwrap_or(b"unused"), b"IExt1", b"", b"rustc", b"1"];
        let strings: Vec<CString> = parts
            .iter()
            .map(|bytes| CString::new(bytes.to_vec()).unwrap())
            .collect();
        let entry = CExtensionEntry {
            name: if name.is_some() {
                strings[0].as_ptr()
            } else {
                std::ptr::null()
            },
            interface_name: strings[1].as_ptr(),
            version: 100,
            description: strings[2].as_ptr(),
            compiler: strings[3].as_ptr(),
            compiler_version: strings[4].as_ptr(),
            metadata: std::ptr::null(),
            metadata_count: 0,
        };
        RawEntry {
            _strings: strings,
            entry,
        }
    }

    fn table(abi_version: u32, entries: &[CExtensionEntry]) -> CDescriptorTable {
        CDescriptorTable {
            abi_version,
            entries: entries.as_ptr(),
            entry_count: entries.len(),
        }
    }

    #[test]
    fn test_read_entry() {
        let raw = raw_entry(Some(b"Ext1".as_slice()));
        let fields = unsafe { read_entry(Path::new("m"), 0, &raw.entry) }.unwrap();
        assert_eq!(fields.name, "Ext1");
        assert_eq!(fields.interface_name, "IExt1");
        assert_eq!(fields.version, 100);
        assert_eq!(fields.compiler, "rustc");
        assert!(fields.metadata.is_empty());
    }

    #[test]
    fn test_read_entry_null_name() {
        let raw = raw_entry(None);
        let err = unsafe { read_entry(Path::new("m"), 3, &raw.entry) }.unwrap_err();
        match err {
            ExtensionError::InvalidDescriptor { path, message } => {
                assert_eq!(path, PathBuf::from("m"));
                assert_eq!(message, "entry 3: name is null or not UTF-8");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_entry_non_utf8_name() {
        let raw = raw_entry(Some([0xff, 0xfe].as_slice()));
        assert!(matches!(
            unsafe { read_entry(Path::new("m"), 0, &raw.entry) },
            Err(ExtensionError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_read_entry_null_metadata_value() {
        let mut raw = raw_entry(Some(b"Ext1".as_slice()));
        let key = CString::new("author").unwrap();
        let pairs = [dynext_sdk::CMetadataPair {
            key: key.as_ptr(),
            value: std::ptr::null(),
        }];
        raw.entry.metadata = pairs.as_ptr();
        raw.entry.metadata_count = pairs.len();

        let err = unsafe { read_entry(Path::new("m"), 0, &raw.entry) }.unwrap_err();
        assert!(err.to_string().contains("metadata value is null"));
    }

    #[test]
    fn test_decode_null_table() {
        let err = unsafe { decode_descriptor_table(Path::new("m"), std::ptr::null()) }.unwrap_err();
        assert!(matches!(err, ExtensionError::InvalidDescriptor { .. }));
        assert!(err.to_string().contains("null table"));
    }

    #[test]
    fn test_decode_wrong_abi_version() {
        let raw = raw_entry(Some(b"Ext1".as_slice()));
        let entries = [raw.entry];
        let table = table(ABI_VERSION + 1, &entries);

        let err = unsafe { decode_descriptor_table(Path::new("m"), &table) }.unwrap_err();
        match err {
            ExtensionError::AbiVersion {
                expected, found, ..
            } => {
                assert_eq!(expected, ABI_VERSION);
                assert_eq!(found, ABI_VERSION + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(check_abi_version(Path::new("m"), &table).is_err());
    }

    #[test]
    fn test_decode_keeps_valid_entries() {
        let good = raw_entry(Some(b"Ext1".as_slice()));
        let bad = raw_entry(None);
        let entries = [bad.entry, good.entry];
        let table = table(ABI_VERSION, &entries);

        let decoded = unsafe { decode_descriptor_table(Path::new("m"), &table) }.unwrap();
        assert_eq!(decoded.len(), 2);
        assert!(matches!(
            decoded[0],
            Err(ExtensionError::InvalidDescriptor { .. })
        ));
        assert_eq!(decoded[1].as_ref().unwrap().name, "Ext1");
    }

    #[test]
    fn test_read_c_string() {
        let value = CString::new("hello").unwrap();
        assert_eq!(
            unsafe { read_c_string(value.as_ptr()) },
            Some("hello".to_string())
        );
        assert_eq!(unsafe { read_c_string(std::ptr::null()) }, None);
    }
}
