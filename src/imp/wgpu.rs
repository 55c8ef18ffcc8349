// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
wgpu backend.

wgpu types never leave this module.  The core hands over ids, descriptors and byte slices;
this module keeps the matching wgpu objects in per-kind maps.
*/

mod adapter;
mod buffer;
mod formats;
mod pass;
mod pipeline;

use std::collections::HashMap;

use crate::command_buffer::RecordedPass;
use crate::device::{Feature, Limits};
use crate::error::{Error, MisuseError};
use crate::imp::Backend;
use crate::resources::ResourceId;
use crate::resources::bindings::ShaderResourceBindings;
use crate::resources::buffer::Buffer;
use crate::resources::pipeline::GraphicsPipelineDescriptor;
use crate::resources::render_target::RenderTarget;

use buffer::WgpuBuffer;
use pipeline::{WgpuBindings, WgpuPipeline};

#[derive(Debug)]
struct WgpuTarget {
    color: wgpu::TextureView,
    depth: Option<wgpu::TextureView>,
    height: u32,
    textures: Vec<wgpu::Texture>,
}

#[derive(Debug)]
pub(crate) struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: Limits,
    base_vertex: bool,
    buffers: HashMap<ResourceId, WgpuBuffer>,
    bindings: HashMap<ResourceId, WgpuBindings>,
    pipelines: HashMap<ResourceId, WgpuPipeline>,
    targets: HashMap<ResourceId, WgpuTarget>,
}

impl WgpuBackend {
    pub(crate) async fn new(debug_name: &str) -> Result<WgpuBackend, Error> {
        let acquired = adapter::acquire(debug_name).await?;
        let limits = Limits {
            max_uniform_buffer_range: acquired.limits.max_uniform_buffer_binding_size as usize,
            uniform_offset_alignment: acquired.limits.min_uniform_buffer_offset_alignment as usize,
            max_vertex_inputs: acquired.limits.max_vertex_attributes as usize,
            max_vertex_input_bindings: acquired.limits.max_vertex_buffers as usize,
            max_patch_control_points: 0,
            max_texture_size: acquired.limits.max_texture_dimension_2d,
        };
        Ok(WgpuBackend {
            device: acquired.device,
            queue: acquired.queue,
            limits,
            base_vertex: acquired.base_vertex,
            buffers: HashMap::new(),
            bindings: HashMap::new(),
            pipelines: HashMap::new(),
            targets: HashMap::new(),
        })
    }
}

pub(super) fn missing(id: ResourceId) -> Error {
    MisuseError::ResourceReleased {
        label: format!("resource {}", id.0),
    }
    .logged()
}

impl Backend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn is_feature_supported(&self, feature: Feature) -> bool {
        match feature {
            Feature::Tessellation | Feature::GeometryShader => false,
            Feature::NonDynamicUniformBuffers | Feature::Instancing | Feature::IndexUInt32 => true,
            Feature::BaseVertex | Feature::BaseInstance => self.base_vertex,
        }
    }

    fn limits(&self) -> Limits {
        self.limits
    }

    fn create_buffer(&mut self, id: ResourceId, buffer: &Buffer) -> Result<(), Error> {
        let created = WgpuBuffer::new(&self.device, buffer);
        self.buffers.insert(id, created);
        Ok(())
    }

    fn create_bindings(
        &mut self,
        id: ResourceId,
        bindings: &ShaderResourceBindings,
    ) -> Result<(), Error> {
        let created = WgpuBindings::new(&self.device, bindings, &self.buffers)?;
        self.bindings.insert(id, created);
        Ok(())
    }

    fn create_pipeline(
        &mut self,
        id: ResourceId,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<(), Error> {
        let created = WgpuPipeline::new(&self.device, descriptor, &self.bindings)?;
        self.pipelines.insert(id, created);
        Ok(())
    }

    fn create_render_target(
        &mut self,
        id: ResourceId,
        target: &RenderTarget,
    ) -> Result<(), Error> {
        let size = target.pixel_size();
        let extent = wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };
        let pass = target.render_pass_descriptor();
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(target.label()),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: formats::color_format(pass.color),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let mut textures = vec![color];
        let depth = pass.depth.map(|format| {
            let depth = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(target.label()),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: formats::depth_format(format),
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            });
            let view = depth.create_view(&wgpu::TextureViewDescriptor::default());
            textures.push(depth);
            view
        });
        self.targets.insert(
            id,
            WgpuTarget {
                color: color_view,
                depth,
                height: size.height,
                textures,
            },
        );
        Ok(())
    }

    fn destroy(&mut self, id: ResourceId) {
        if let Some(buffer) = self.buffers.remove(&id) {
            buffer.destroy();
        }
        self.bindings.remove(&id);
        self.pipelines.remove(&id);
        if let Some(target) = self.targets.remove(&id) {
            for texture in target.textures {
                texture.destroy();
            }
        }
    }

    fn write_buffer(&mut self, id: ResourceId, offset: usize, data: &[u8]) {
        if let Some(buffer) = self.buffers.get_mut(&id) {
            buffer.write(&self.queue, offset, data);
        }
    }

    fn read_buffer(&mut self, id: ResourceId, offset: usize, size: usize) -> Vec<u8> {
        self.buffers
            .get(&id)
            .map(|b| b.read(offset, size))
            .unwrap_or_default()
    }

    fn execute_pass(&mut self, recorded: &RecordedPass) -> Result<(), Error> {
        let target = self
            .targets
            .get(&recorded.target)
            .ok_or_else(|| missing(recorded.target))?;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("batches_and_passes pass"),
            });
        pass::encode(
            &mut encoder,
            recorded,
            target,
            &self.buffers,
            &self.bindings,
            &self.pipelines,
        )?;
        self.queue.submit([encoder.finish()]);
        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            logwise::warn_sync!("wgpu poll failed: {e}", e = logwise::privacy::LogIt(e));
        }
        Ok(())
    }
}
