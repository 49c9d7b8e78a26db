//! Typed extension instances.

use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::{Arc, Weak};

use dynext_sdk::DestroyFn;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::descriptor::ExtensionDescriptor;

/// Identifier of a live instance.
pub type InstanceId = Uuid;

/// Registry-owned map from live instances to the descriptor they were
/// created from.
pub(crate) type InstanceTable = Mutex<HashMap<InstanceId, ExtensionDescriptor>>;

/// An object created by an extension module, used through interface `I`.
///
/// Dropping the handle destroys the object inside the module that created
/// it, then forgets its instance record, then releases the module. The handle
/// may outlive the [`ExtensionSystem`](crate::ExtensionSystem) that created it.
pub struct Extension<I: ?Sized> {
    object: NonNull<Box<I>>,
    destroy: DestroyFn,
    id: InstanceId,
    records: Weak<InstanceTable>,
    // Keeps the module loaded; dropped after `destroy` has run.
    descriptor: ExtensionDescriptor,
}

impl<I: ?Sized> Extension<I> {
    pub(crate) fn new(
        object: NonNull<Box<I>>,
        destroy: DestroyFn,
        descriptor: ExtensionDescriptor,
        records: &Arc<InstanceTable>,
    ) -> Self {
        let id = Uuid::new_v4();
        records.lock().insert(id, descriptor.clone());

        Self {
            object,
            destroy,
            id,
            records: Arc::downgrade(records),
            descriptor,
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Descriptor this instance was created from.
    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }
}

impl<I: ?Sized> Deref for Extension<I> {
    type Target = I;

    fn deref(&self) -> &I {
        // SAFETY: `object` is a live `Box<I>` until `drop`.
        unsafe { &**self.object.as_ref() }
    }
}

impl<I: ?Sized> Drop for Extension<I> {
    fn drop(&mut self) {
        // SAFETY: `object` came from the factory paired with `destroy` and
        // is destroyed exactly once.
        unsafe { (self.destroy)(self.object.as_ptr().cast::<c_void>()) };

        if let Some(records) = self.records.upgrade() {
            records.lock().remove(&self.id);
        }

        tracing::trace!(
            id = %self.id,
            extension = self.descriptor.name(),
            "Destroyed extension instance"
        );
    }
}

// SAFETY: the handle owns the object exclusively; thread safety follows `I`.
unsafe impl<I: ?Sized + Send> Send for Extension<I> {}
unsafe impl<I: ?Sized + Sync> Sync for Extension<I> {}

impl<I: ?Sized> fmt::Debug for Extension<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.id)
            .field("name", &self.descriptor.name())
            .field("interface", &self.descriptor.interface_name())
            .field("version", &self.descriptor.version())
            .finish()
    }
}
