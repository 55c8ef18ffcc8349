// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Render targets and the pass descriptors pipelines are built against.

use std::sync::Arc;

use crate::device::Device;
use crate::error::{ConfigurationError, Error};
use crate::resources::{ResourceCore, ResourceKind, resource_handle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ColorFormat {
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba16Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DepthFormat {
    Depth24Stencil8,
    Depth32Float,
}

impl DepthFormat {
    pub fn has_stencil(self) -> bool {
        matches!(self, DepthFormat::Depth24Stencil8)
    }
}

/**
The attachment formats of a render pass.

A pipeline can only be bound in a pass whose descriptor equals the one it was built for.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassDescriptor {
    pub color: ColorFormat,
    pub depth: Option<DepthFormat>,
}

impl RenderPassDescriptor {
    pub fn is_compatible(&self, other: &RenderPassDescriptor) -> bool {
        self == other
    }
}

impl Default for RenderPassDescriptor {
    fn default() -> Self {
        RenderPassDescriptor {
            color: ColorFormat::Rgba8Unorm,
            depth: Some(DepthFormat::Depth24Stencil8),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> PixelSize {
        PixelSize { width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// An offscreen color (and optional depth) target.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    core: Arc<ResourceCore>,
    size: PixelSize,
    render_pass: RenderPassDescriptor,
}

resource_handle!(RenderTarget, ResourceKind::RenderTarget);

impl RenderTarget {
    pub(crate) fn new(
        device: &Device,
        label: Option<&str>,
        size: PixelSize,
        render_pass: RenderPassDescriptor,
    ) -> RenderTarget {
        let label = label.unwrap_or("render target").to_string();
        let core = ResourceCore::new(device, ResourceKind::RenderTarget, label, None);
        RenderTarget {
            core,
            size,
            render_pass,
        }
    }

    pub fn pixel_size(&self) -> PixelSize {
        self.size
    }

    pub fn render_pass_descriptor(&self) -> RenderPassDescriptor {
        self.render_pass
    }

    pub fn create(&self) -> Result<(), Error> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(ConfigurationError::ZeroSizedRenderTarget {
                label: self.core.label.clone(),
            }
            .into());
        }
        let max = self.core.device.limits().max_texture_size;
        if self.size.width > max || self.size.height > max {
            return Err(ConfigurationError::RenderTargetTooLarge {
                label: self.core.label.clone(),
                width: self.size.width,
                height: self.size.height,
                max,
            }
            .into());
        }
        let mut state = self.core.device.lock();
        state.create_resource(&self.core, Vec::new(), |backend| {
            backend.create_render_target(self.core.id, self)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;

    #[test]
    fn size_is_validated() {
        let device = test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap();
        let empty = device.new_render_target(PixelSize::new(0, 10), RenderPassDescriptor::default());
        assert!(empty.create().unwrap_err().is_configuration());
        let huge =
            device.new_render_target(PixelSize::new(100_000, 10), RenderPassDescriptor::default());
        assert!(huge.create().unwrap_err().is_configuration());
        let fine = device.new_render_target(PixelSize::new(640, 480), RenderPassDescriptor::default());
        fine.create().unwrap();
        assert!(fine.is_created());
    }
}
