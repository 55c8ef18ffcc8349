// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
GPU resource objects.

Every resource follows the same two-phase protocol:

1. *Construct* through a [`crate::device::Device`] `new_*` method.  This records the
   resource's immutable configuration.
2. [`Resource::create`] validates the configuration against the device and allocates backend
   storage.  Calling it again on a created resource recreates the storage.

Resources are released explicitly with [`Resource::release`], or all at once through a
[`ReleasePool`].  A resource that other created resources still reference (a buffer bound by
a binding set, a binding set used by a pipeline) cannot be released until they are.

Handles are cheap to clone.  When the last handle of an unreleased resource is dropped, its
storage is freed the next time the device is used.
*/

pub mod bindings;
pub mod buffer;
pub mod pipeline;
pub mod render_target;

use std::sync::Arc;

use crate::device::registry::{BufferRecord, ResourceState};
use crate::device::{Device, DeviceShared};
use crate::error::{Error, MisuseError};

/// Identifies a resource within its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ResourceKind {
    Buffer,
    ShaderResourceBindings,
    GraphicsPipeline,
    RenderTarget,
}

/// Shared state behind every handle of one resource.
#[derive(Debug)]
pub(crate) struct ResourceCore {
    pub(crate) id: ResourceId,
    pub(crate) label: String,
    pub(crate) device: Arc<DeviceShared>,
}

impl ResourceCore {
    pub(crate) fn new(
        device: &Device,
        kind: ResourceKind,
        label: String,
        buffer: Option<BufferRecord>,
    ) -> Arc<ResourceCore> {
        let id = device
            .shared
            .lock()
            .registry
            .insert(kind, label.clone(), buffer);
        Arc::new(ResourceCore {
            id,
            label,
            device: device.shared.clone(),
        })
    }

    pub(crate) fn state(&self) -> ResourceState {
        self.device.lock().registry.state(self.id)
    }

    pub(crate) fn release(&self) -> Result<(), Error> {
        let mut state = self.device.lock();
        match state.registry.release(self.id, &self.label) {
            Ok(true) => {
                state.backend.destroy(self.id);
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                drop(state);
                Err(e.logged())
            }
        }
    }

    pub(crate) fn belongs_to(&self, device: &Arc<DeviceShared>) -> bool {
        Arc::ptr_eq(&self.device, device)
    }
}

impl Drop for ResourceCore {
    fn drop(&mut self) {
        self.device.defer_drop(self.id);
    }
}

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Operations common to every resource handle.
pub trait Resource: sealed::Sealed + std::fmt::Debug {
    fn id(&self) -> ResourceId;
    fn resource_kind(&self) -> ResourceKind;
    fn label(&self) -> &str;
    /// Validates the configuration and allocates backend storage.
    fn create(&self) -> Result<(), Error>;
    /// Frees backend storage.  Releasing twice is a [`MisuseError::AlreadyReleased`].
    fn release(&self) -> Result<(), Error>;
    fn is_created(&self) -> bool;
    fn is_released(&self) -> bool;
}

macro_rules! resource_handle {
    ($ty:ty, $kind:expr) => {
        impl crate::resources::sealed::Sealed for $ty {}
        impl crate::resources::Resource for $ty {
            fn id(&self) -> crate::resources::ResourceId {
                self.core.id
            }
            fn resource_kind(&self) -> crate::resources::ResourceKind {
                $kind
            }
            fn label(&self) -> &str {
                &self.core.label
            }
            fn create(&self) -> Result<(), crate::error::Error> {
                <$ty>::create(self)
            }
            fn release(&self) -> Result<(), crate::error::Error> {
                <$ty>::release(self)
            }
            fn is_created(&self) -> bool {
                <$ty>::is_created(self)
            }
            fn is_released(&self) -> bool {
                <$ty>::is_released(self)
            }
        }
        impl PartialEq for $ty {
            fn eq(&self, other: &Self) -> bool {
                std::sync::Arc::ptr_eq(&self.core, &other.core)
            }
        }
        impl Eq for $ty {}
        impl std::hash::Hash for $ty {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                std::ptr::hash(std::sync::Arc::as_ptr(&self.core), state);
            }
        }
        impl $ty {
            pub fn id(&self) -> crate::resources::ResourceId {
                self.core.id
            }
            pub fn label(&self) -> &str {
                &self.core.label
            }
            /// Frees backend storage.  Fails if the resource was already released, or is
            /// still referenced by another created resource.
            pub fn release(&self) -> Result<(), crate::error::Error> {
                self.core.release()
            }
            pub fn is_created(&self) -> bool {
                self.core.state() == crate::device::registry::ResourceState::Created
            }
            pub fn is_released(&self) -> bool {
                self.core.state() == crate::device::registry::ResourceState::Released
            }
            #[allow(dead_code)]
            pub(crate) fn core(&self) -> &std::sync::Arc<crate::resources::ResourceCore> {
                &self.core
            }
        }
    };
}
pub(crate) use resource_handle;

/**
Tracks resources so they can be released together.

[`ReleasePool::release_all`] releases in reverse order of acquisition, so pushing resources
in the order they were created releases pipelines before the binding sets they use, and
binding sets before their buffers.  Resources released individually in the meantime are
skipped.

```
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::resources::ReleasePool;
use batches_and_passes::resources::buffer::{BufferKind, BufferUsage};
# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
let mut pool = ReleasePool::new();
let buffer = device.new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 16).unwrap();
buffer.create().unwrap();
pool.push(buffer.clone()).unwrap();

pool.release_all().unwrap();
assert!(buffer.is_released());
assert!(pool.release_all().unwrap_err().is_misuse());
# });
```
*/
#[derive(Debug, Default)]
pub struct ReleasePool {
    resources: Vec<Box<dyn Resource>>,
    released: bool,
}

impl ReleasePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `resource`.  Fails once the pool has been released.
    pub fn push<R: Resource + 'static>(&mut self, resource: R) -> Result<(), Error> {
        if self.released {
            return Err(MisuseError::PoolAlreadyReleased.logged());
        }
        self.resources.push(Box::new(resource));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /**
    Releases every tracked resource, newest first.

    Every resource is attempted even if an earlier one fails; the first failure is returned.
    Calling this a second time fails with [`MisuseError::PoolAlreadyReleased`] and releases
    nothing.
    */
    pub fn release_all(&mut self) -> Result<(), Error> {
        if self.released {
            return Err(MisuseError::PoolAlreadyReleased.logged());
        }
        self.released = true;
        let mut first_error = None;
        for resource in self.resources.drain(..).rev() {
            if resource.is_released() {
                continue;
            }
            if let Err(e) = resource.release() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
