//! Interface identity.
//!
//! Interfaces are identified across module boundaries by a stable string,
//! never by `TypeId`, which is not guaranteed to agree between separately
//! compiled binaries.

/// An abstract capability set that extensions can implement.
///
/// Implemented for `dyn Trait` types, usually through [`declare_interface!`](crate::declare_interface).
pub trait Interface {
    /// Stable, compiler independent name of the interface.
    const NAME: &'static str;
}

/// Declare the stable name of an interface trait.
///
/// ```ignore
/// pub trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// dynext_sdk::declare_interface!(dyn Greeter, "example::Greeter");
/// ```
#[macro_export]
macro_rules! declare_interface {
    ($iface:ty, $name:literal) => {
        impl $crate::Interface for $iface {
            const NAME: &'static str = $name;
        }
    };
}
