// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex input layout descriptions.
//!
//! A layout has *bindings*, one per vertex buffer slot, each with a stride and a step rate,
//! and *attributes*, each reading one [`VertexFormat`] at a byte offset within a binding's
//! stride and feeding one shader input location.
//!
//! # Example
//!
//! ```
//! use batches_and_passes::vertex_layout::{VertexFormat, VertexInputLayout};
//!
//! // Interleaved position + color, 24 bytes per vertex
//! let mut layout = VertexInputLayout::new();
//! let binding = layout.add_binding(6 * 4);
//! layout.add_attribute(binding, 0, VertexFormat::Float3, 0);
//! layout.add_attribute(binding, 1, VertexFormat::Float3, 3 * 4);
//! assert_eq!(layout.fetch_extent(binding), 24);
//! ```

use crate::device::Limits;
use crate::error::ConfigurationError;

/// The data type of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum VertexFormat {
    Float,
    Float2,
    Float3,
    Float4,
    UInt,
    UInt2,
    UInt3,
    UInt4,
    SInt,
    SInt2,
    SInt3,
    SInt4,
    /// Four normalized bytes.
    UNormByte4,
}

impl VertexFormat {
    pub const fn byte_size(self) -> u32 {
        match self {
            VertexFormat::Float | VertexFormat::UInt | VertexFormat::SInt => 4,
            VertexFormat::UNormByte4 => 4,
            VertexFormat::Float2 | VertexFormat::UInt2 | VertexFormat::SInt2 => 8,
            VertexFormat::Float3 | VertexFormat::UInt3 | VertexFormat::SInt3 => 12,
            VertexFormat::Float4 | VertexFormat::UInt4 | VertexFormat::SInt4 => 16,
        }
    }
}

/// How often a binding advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepRate {
    PerVertex,
    /// Advance once every `n` instances.
    PerInstance(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInputBinding {
    pub stride: u32,
    pub step_rate: StepRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexInputAttribute {
    pub binding: u32,
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexInputLayout {
    bindings: Vec<VertexInputBinding>,
    attributes: Vec<VertexInputAttribute>,
}

impl VertexInputLayout {
    /// An empty layout, for pipelines that generate their vertices.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a per-vertex binding and returns its index.
    pub fn add_binding(&mut self, stride: u32) -> u32 {
        self.bindings.push(VertexInputBinding {
            stride,
            step_rate: StepRate::PerVertex,
        });
        (self.bindings.len() - 1) as u32
    }

    /// Adds a per-instance binding advancing every `rate` instances and returns its index.
    pub fn add_instanced_binding(&mut self, stride: u32, rate: u32) -> u32 {
        self.bindings.push(VertexInputBinding {
            stride,
            step_rate: StepRate::PerInstance(rate),
        });
        (self.bindings.len() - 1) as u32
    }

    pub fn add_attribute(&mut self, binding: u32, location: u32, format: VertexFormat, offset: u32) {
        self.attributes.push(VertexInputAttribute {
            binding,
            location,
            format,
            offset,
        });
    }

    pub fn bindings(&self) -> &[VertexInputBinding] {
        &self.bindings
    }

    pub fn attributes(&self) -> &[VertexInputAttribute] {
        &self.attributes
    }

    pub fn uses_instancing(&self) -> bool {
        self.bindings
            .iter()
            .any(|b| matches!(b.step_rate, StepRate::PerInstance(_)))
    }

    /// Bytes one element of `binding` reads, from the start of the element to the end of its
    /// furthest attribute.
    pub fn fetch_extent(&self, binding: u32) -> u32 {
        self.attributes
            .iter()
            .filter(|a| a.binding == binding)
            .map(|a| a.offset.saturating_add(a.format.byte_size()))
            .max()
            .unwrap_or(0)
    }

    pub(crate) fn validate(&self, limits: &Limits) -> Result<(), ConfigurationError> {
        if self.bindings.len() > limits.max_vertex_input_bindings {
            return Err(ConfigurationError::TooManyVertexBindings {
                count: self.bindings.len(),
                max: limits.max_vertex_input_bindings,
            });
        }
        if self.attributes.len() > limits.max_vertex_inputs {
            return Err(ConfigurationError::TooManyVertexAttributes {
                count: self.attributes.len(),
                max: limits.max_vertex_inputs,
            });
        }
        for (index, binding) in self.bindings.iter().enumerate() {
            if binding.step_rate == StepRate::PerInstance(0) {
                return Err(ConfigurationError::InvalidStepRate {
                    binding: index as u32,
                });
            }
        }
        let mut locations = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let Some(binding) = self.bindings.get(attribute.binding as usize) else {
                return Err(ConfigurationError::UnknownVertexBinding {
                    location: attribute.location,
                    binding: attribute.binding,
                });
            };
            if locations.contains(&attribute.location) {
                return Err(ConfigurationError::DuplicateVertexLocation {
                    location: attribute.location,
                });
            }
            locations.push(attribute.location);
            let end = attribute.offset.checked_add(attribute.format.byte_size());
            //a zero stride repeats one element for every vertex
            let fits = end.is_some_and(|end| binding.stride == 0 || end <= binding.stride);
            if !fits {
                return Err(ConfigurationError::AttributeExceedsStride {
                    location: attribute.location,
                    offset: attribute.offset,
                    end: end.unwrap_or(u32::MAX),
                    stride: binding.stride,
                });
            }
        }
        Ok(())
    }
}
