// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Optional device capabilities and numeric limits.

/// An optional capability.
///
/// Query with [`super::Device::is_feature_supported`] before relying on one.  Requests that
/// need an unsupported feature fail with [`crate::Error::UnsupportedFeature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Feature {
    /// Patch topology with tessellation control and evaluation stages.
    Tessellation,
    GeometryShader,
    /// Uniform buffers whose usage is not [`crate::resources::buffer::BufferUsage::Dynamic`].
    NonDynamicUniformBuffers,
    /// Draws with more than one instance, and per-instance vertex inputs.
    Instancing,
    /// Indexed draws with a non-zero vertex offset.
    BaseVertex,
    /// Draws with a non-zero first instance.
    BaseInstance,
    /// 32-bit index buffers.
    IndexUInt32,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Tessellation,
        Feature::GeometryShader,
        Feature::NonDynamicUniformBuffers,
        Feature::Instancing,
        Feature::BaseVertex,
        Feature::BaseInstance,
        Feature::IndexUInt32,
    ];
}

/// Numeric limits of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest range of a uniform buffer visible to one binding.
    pub max_uniform_buffer_range: usize,
    /// Alignment required of a uniform binding's offset.
    pub uniform_offset_alignment: usize,
    /// Attributes per vertex layout.
    pub max_vertex_inputs: usize,
    /// Buffer bindings per vertex layout.
    pub max_vertex_input_bindings: usize,
    pub max_patch_control_points: u32,
    /// Largest width or height of a render target.
    pub max_texture_size: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_uniform_buffer_range: 64 * 1024,
            uniform_offset_alignment: 256,
            max_vertex_inputs: 16,
            max_vertex_input_bindings: 8,
            max_patch_control_points: 32,
            max_texture_size: 8192,
        }
    }
}
