// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Shader resource binding sets.
//!
//! A [`ShaderResourceBindings`] is an ordered list of `(slot, stages, resource)` entries.  It
//! is immutable once constructed and may be shared by any number of pipelines, which keep it
//! from being released while they are created.

use std::fmt::{Debug, Formatter};
use std::ops::BitOr;
use std::sync::Arc;

use crate::device::{Device, Feature};
use crate::error::{ConfigurationError, Error};
use crate::resources::buffer::{Buffer, BufferKind};
use crate::resources::{ResourceCore, ResourceId, ResourceKind, resource_handle};
use crate::shader::ShaderStageKind;

/// A set of shader stages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StageFlags(u8);

impl StageFlags {
    pub const NONE: StageFlags = StageFlags(0);
    pub const VERTEX: StageFlags = StageFlags(1 << 0);
    pub const TESSELLATION_CONTROL: StageFlags = StageFlags(1 << 1);
    pub const TESSELLATION_EVALUATION: StageFlags = StageFlags(1 << 2);
    pub const GEOMETRY: StageFlags = StageFlags(1 << 3);
    pub const FRAGMENT: StageFlags = StageFlags(1 << 4);

    pub const fn from_stage(kind: ShaderStageKind) -> StageFlags {
        match kind {
            ShaderStageKind::Vertex => StageFlags::VERTEX,
            ShaderStageKind::TessellationControl => StageFlags::TESSELLATION_CONTROL,
            ShaderStageKind::TessellationEvaluation => StageFlags::TESSELLATION_EVALUATION,
            ShaderStageKind::Geometry => StageFlags::GEOMETRY,
            ShaderStageKind::Fragment => StageFlags::FRAGMENT,
        }
    }

    pub const fn contains(self, other: StageFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: StageFlags) -> StageFlags {
        StageFlags(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The stages in the set, in pipeline order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStageKind> {
        ShaderStageKind::ALL
            .into_iter()
            .filter(move |k| self.contains(StageFlags::from_stage(*k)))
    }
}

impl BitOr for StageFlags {
    type Output = StageFlags;
    fn bitor(self, rhs: StageFlags) -> StageFlags {
        self.union(rhs)
    }
}

impl From<ShaderStageKind> for StageFlags {
    fn from(kind: ShaderStageKind) -> StageFlags {
        StageFlags::from_stage(kind)
    }
}

impl Debug for StageFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.stages()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum BoundResource {
    /// `size: None` extends to the end of the buffer.
    UniformBuffer {
        buffer: Buffer,
        offset: usize,
        size: Option<usize>,
    },
}

/// The kind of resource a slot expects, independent of which resource fills it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum BindingType {
    UniformBuffer,
}

/**
One entry of a binding set.

```
use batches_and_passes::resources::bindings::{ShaderResourceBinding, StageFlags};
# use batches_and_passes::device::{Device, DeviceConfig};
# use batches_and_passes::resources::buffer::{BufferKind, BufferUsage};
# test_executors::sleep_on(async {
# let device = Device::new(DeviceConfig::default()).await.unwrap();
let ubuf = device.new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 72).unwrap();
let binding = ShaderResourceBinding::uniform_buffer(0, StageFlags::TESSELLATION_EVALUATION, &ubuf);
assert_eq!(binding.range(), (0, 72));
# });
```
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderResourceBinding {
    slot: u32,
    stages: StageFlags,
    resource: BoundResource,
}

impl ShaderResourceBinding {
    pub fn uniform_buffer(slot: u32, stages: StageFlags, buffer: &Buffer) -> Self {
        ShaderResourceBinding {
            slot,
            stages,
            resource: BoundResource::UniformBuffer {
                buffer: buffer.clone(),
                offset: 0,
                size: None,
            },
        }
    }

    pub fn uniform_buffer_range(
        slot: u32,
        stages: StageFlags,
        buffer: &Buffer,
        offset: usize,
        size: usize,
    ) -> Self {
        ShaderResourceBinding {
            slot,
            stages,
            resource: BoundResource::UniformBuffer {
                buffer: buffer.clone(),
                offset,
                size: Some(size),
            },
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }

    pub fn stages(&self) -> StageFlags {
        self.stages
    }

    pub fn resource(&self) -> &BoundResource {
        &self.resource
    }

    pub fn binding_type(&self) -> BindingType {
        match self.resource {
            BoundResource::UniformBuffer { .. } => BindingType::UniformBuffer,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        match &self.resource {
            BoundResource::UniformBuffer { buffer, .. } => buffer,
        }
    }

    /// Resolved `(offset, size)` of the bound range.
    pub fn range(&self) -> (usize, usize) {
        match &self.resource {
            BoundResource::UniformBuffer {
                buffer,
                offset,
                size,
            } => (
                *offset,
                size.unwrap_or_else(|| buffer.size().saturating_sub(*offset)),
            ),
        }
    }
}

/// A binding set handle.
#[derive(Debug, Clone)]
pub struct ShaderResourceBindings {
    core: Arc<ResourceCore>,
    bindings: Arc<[ShaderResourceBinding]>,
}

resource_handle!(
    ShaderResourceBindings,
    ResourceKind::ShaderResourceBindings
);

impl ShaderResourceBindings {
    pub(crate) fn new(
        device: &Device,
        label: Option<&str>,
        bindings: Vec<ShaderResourceBinding>,
    ) -> Self {
        let label = label.unwrap_or("shader resource bindings").to_string();
        let core = ResourceCore::new(device, ResourceKind::ShaderResourceBindings, label, None);
        ShaderResourceBindings {
            core,
            bindings: bindings.into(),
        }
    }

    pub fn bindings(&self) -> &[ShaderResourceBinding] {
        &self.bindings
    }

    /// Union of the stages any entry is visible to.
    pub fn stages(&self) -> StageFlags {
        self.bindings
            .iter()
            .fold(StageFlags::NONE, |acc, b| acc | b.stages)
    }

    fn layout(&self) -> Vec<(u32, StageFlags, BindingType)> {
        let mut layout = self
            .bindings
            .iter()
            .map(|b| (b.slot, b.stages, b.binding_type()))
            .collect::<Vec<_>>();
        layout.sort_by_key(|l| l.0);
        layout
    }

    /// Whether `other` declares the same slots, stages and binding types, so either can be
    /// bound for a pipeline built with the other.
    pub fn is_layout_compatible(&self, other: &ShaderResourceBindings) -> bool {
        self.layout() == other.layout()
    }

    pub(crate) fn buffer_ids(&self) -> Vec<ResourceId> {
        let mut ids = self
            .bindings
            .iter()
            .map(|b| b.buffer().id())
            .collect::<Vec<_>>();
        ids.sort();
        ids.dedup();
        ids
    }

    fn validate_entries(&self) -> Result<(), Error> {
        let shared = &self.core.device;
        let limits = shared.limits();
        let mut seen = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings.iter() {
            if seen.contains(&binding.slot) {
                return Err(ConfigurationError::DuplicateBindingSlot { slot: binding.slot }.into());
            }
            seen.push(binding.slot);
            if binding.stages.is_empty() {
                return Err(ConfigurationError::BindingInvisible { slot: binding.slot }.into());
            }
            if binding.stages.stages().any(|s| s.is_tessellation()) {
                shared.require_feature(Feature::Tessellation)?;
            }
            if binding.stages.contains(StageFlags::GEOMETRY) {
                shared.require_feature(Feature::GeometryShader)?;
            }
            let buffer = binding.buffer();
            if !buffer.core().belongs_to(shared) {
                return Err(ConfigurationError::ForeignResource {
                    label: self.core.label.clone(),
                    resource: buffer.label().to_string(),
                }
                .into());
            }
            if buffer.kind() != BufferKind::Uniform {
                return Err(ConfigurationError::WrongBufferKind {
                    slot: binding.slot,
                    label: buffer.label().to_string(),
                    expected: BufferKind::Uniform,
                    found: buffer.kind(),
                }
                .into());
            }
            let (offset, size) = binding.range();
            let in_range = offset.checked_add(size).is_some_and(|end| end <= buffer.size());
            if size == 0 || !in_range {
                return Err(ConfigurationError::BindingOutOfRange {
                    slot: binding.slot,
                    label: buffer.label().to_string(),
                    offset,
                    size,
                    capacity: buffer.size(),
                }
                .into());
            }
            if size > limits.max_uniform_buffer_range {
                return Err(ConfigurationError::UniformRangeTooLarge {
                    slot: binding.slot,
                    size,
                    max: limits.max_uniform_buffer_range,
                }
                .into());
            }
            if offset % limits.uniform_offset_alignment != 0 {
                return Err(ConfigurationError::MisalignedUniformOffset {
                    slot: binding.slot,
                    offset,
                    alignment: limits.uniform_offset_alignment,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Validates the entries and creates the set.  Every bound buffer must be created.
    pub fn create(&self) -> Result<(), Error> {
        self.validate_entries()?;
        let mut state = self.core.device.lock();
        for binding in self.bindings.iter() {
            state.require_dependency(&self.core.label, binding.buffer().core())?;
        }
        state.create_resource(&self.core, self.buffer_ids(), |backend| {
            backend.create_bindings(self.core.id, self)
        })
    }
}
