// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Byte-addressable GPU buffers.
//!
//! A buffer's contents are only ever changed through a
//! [`crate::update_batch::ResourceUpdateBatch`].  The usage class decides which batch
//! operations are allowed:
//!
//! | Usage       | Writes                                      | Typical contents         |
//! |-------------|---------------------------------------------|--------------------------|
//! | `Immutable` | One static upload, before the first pass    | Mesh data                |
//! | `Static`    | Static uploads, any number of times         | Rarely-changing tables   |
//! | `Dynamic`   | Partial dynamic updates, every frame        | Uniform blocks           |

use std::sync::Arc;

use crate::device::registry::BufferRecord;
use crate::device::{Device, Feature};
use crate::error::{ConfigurationError, Error};
use crate::resources::{ResourceCore, ResourceKind, resource_handle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once by a static upload, then only read by the GPU.
    Immutable,
    /// Device-local, rewritten by static uploads.
    Static,
    /// Rewritten piecewise by dynamic updates.
    Dynamic,
}

/// What the buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Uniform,
    Index,
}

/// A GPU buffer handle.
#[derive(Debug, Clone)]
pub struct Buffer {
    core: Arc<ResourceCore>,
    usage: BufferUsage,
    kind: BufferKind,
    size: usize,
}

resource_handle!(Buffer, ResourceKind::Buffer);

impl Buffer {
    pub(crate) fn new(
        device: &Device,
        label: Option<&str>,
        usage: BufferUsage,
        kind: BufferKind,
        size: usize,
    ) -> Result<Buffer, Error> {
        let label = match label {
            Some(label) => label.to_string(),
            None => format!("{kind:?} buffer"),
        };
        if size == 0 {
            return Err(ConfigurationError::ZeroSizedBuffer { label }.into());
        }
        if kind == BufferKind::Uniform
            && usage != BufferUsage::Dynamic
            && !device.is_feature_supported(Feature::NonDynamicUniformBuffers)
        {
            return Err(ConfigurationError::UnsupportedBufferUsage { label, usage, kind }.into());
        }
        let core = ResourceCore::new(
            device,
            ResourceKind::Buffer,
            label,
            Some(BufferRecord::new(usage)),
        );
        Ok(Buffer {
            core,
            usage,
            kind,
            size,
        })
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Size in bytes, as requested.  Backends may allocate more.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Allocates storage.  Contents are zeroed.
    pub fn create(&self) -> Result<(), Error> {
        let mut state = self.core.device.lock();
        state.create_resource(&self.core, Vec::new(), |backend| {
            backend.create_buffer(self.core.id, self)
        })
    }
}
