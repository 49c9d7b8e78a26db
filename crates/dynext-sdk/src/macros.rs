//! Declarative macros for extension modules.

/// Export the extensions provided by a module.
///
/// Generates the descriptor export plus a factory/destroy pair per extension.
/// Every extension type must implement `Default` and the interface trait.
/// The interface name is checked at compile time against the name declared
/// with [`declare_interface!`](crate::declare_interface).
///
/// # Example
///
/// ```ignore
/// use dynext_sdk::prelude::*;
///
/// pub trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
/// declare_interface!(dyn Greeter, "example::Greeter");
///
/// #[derive(Default)]
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "Hello".to_string()
///     }
/// }
///
/// export_extensions! {
///     English => dyn Greeter as "example::Greeter" {
///         name: "English",
///         version: 100,
///         description: "greets in English",
///         metadata: { "author" => "Alice" },
///     }
/// }
/// ```
#[macro_export]
macro_rules! export_extensions {
    (
        $(
            $ty:ty => $iface:ty as $iface_name:literal {
                name: $name:literal,
                version: $version:expr,
                description: $description:literal
                $(, metadata: { $($key:literal => $value:literal),* $(,)? })?
                $(,)?
            }
        )*
    ) => {
        #[no_mangle]
        pub extern "C" fn dynext_extension_descriptors() -> *const $crate::CDescriptorTable {
            static TABLE: ::std::sync::OnceLock<$crate::DescriptorTable> =
                ::std::sync::OnceLock::new();

            TABLE
                .get_or_init(|| {
                    $crate::DescriptorTable::new(::std::vec![
                        $(
                            $crate::ExtensionEntry::new($name, $iface_name, $version)
                                .with_description($description)
                                $( $( .with_metadata($key, $value) )* )?
                        ),*
                    ])
                })
                .as_raw()
        }

        $(
            const _: () = {
                assert!(
                    $crate::abi::str_eq(<$iface as $crate::Interface>::NAME, $iface_name),
                    "interface name does not match the declared Interface::NAME"
                );

                #[export_name = concat!("dynext_create__", $iface_name, "__", $name)]
                extern "C" fn create() -> *mut ::std::ffi::c_void {
                    let created = ::std::panic::catch_unwind(|| {
                        let object: ::std::boxed::Box<$iface> =
                            ::std::boxed::Box::new(<$ty as ::std::default::Default>::default());
                        ::std::boxed::Box::into_raw(::std::boxed::Box::new(object))
                            as *mut ::std::ffi::c_void
                    });
                    created.unwrap_or(::std::ptr::null_mut())
                }

                #[export_name = concat!("dynext_destroy__", $iface_name, "__", $name)]
                extern "C" fn destroy(object: *mut ::std::ffi::c_void) {
                    if object.is_null() {
                        return;
                    }
                    let _ = ::std::panic::catch_unwind(move || {
                        // SAFETY: produced by `create` above for the same interface.
                        drop(unsafe {
                            ::std::boxed::Box::from_raw(object as *mut ::std::boxed::Box<$iface>)
                        });
                    });
                }
            };
        )*
    };
}
