// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;

use super::buffer::WgpuBuffer;
use super::{formats, missing};
use crate::error::{ConfigurationError, Error};
use crate::resources::ResourceId;
use crate::resources::bindings::ShaderResourceBindings;
use crate::resources::pipeline::{BlendMode, GraphicsPipelineDescriptor};
use crate::shader::{ShaderCode, ShaderStage, ShaderStageKind};
use crate::vertex_layout::StepRate;

#[derive(Debug)]
pub(super) struct WgpuBindings {
    layout: wgpu::BindGroupLayout,
    pub(super) group: wgpu::BindGroup,
}

impl WgpuBindings {
    pub(super) fn new(
        device: &wgpu::Device,
        bindings: &ShaderResourceBindings,
        buffers: &HashMap<ResourceId, WgpuBuffer>,
    ) -> Result<WgpuBindings, Error> {
        let layout_entries = bindings
            .bindings()
            .iter()
            .map(|b| wgpu::BindGroupLayoutEntry {
                binding: b.slot(),
                visibility: formats::stages(b.stages()),
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect::<Vec<_>>();
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(bindings.label()),
            entries: &layout_entries,
        });
        let mut entries = Vec::with_capacity(bindings.bindings().len());
        for binding in bindings.bindings() {
            let buffer = buffers
                .get(&binding.buffer().id())
                .ok_or_else(|| missing(binding.buffer().id()))?;
            let (offset, size) = binding.range();
            //WGSL uniform structs round up to 16 bytes; the allocation already does
            let available = buffer.wgpu_buffer().size().saturating_sub(offset as u64);
            let size = (size as u64).next_multiple_of(16).min(available);
            entries.push(wgpu::BindGroupEntry {
                binding: binding.slot(),
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: buffer.wgpu_buffer(),
                    offset: offset as u64,
                    size: NonZeroU64::new(size),
                }),
            });
        }
        let group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(bindings.label()),
            layout: &layout,
            entries: &entries,
        });
        Ok(WgpuBindings { layout, group })
    }
}

#[derive(Debug)]
pub(super) struct WgpuPipeline {
    pub(super) pipeline: wgpu::RenderPipeline,
}

fn shader_module(
    device: &wgpu::Device,
    descriptor: &GraphicsPipelineDescriptor,
    stage: Option<&ShaderStage>,
    kind: ShaderStageKind,
) -> Result<wgpu::ShaderModule, Error> {
    let Some(stage) = stage else {
        return Err(ConfigurationError::MissingShaderStage {
            label: descriptor.label.clone(),
            stage: kind,
        }
        .into());
    };
    match stage.shader.code() {
        ShaderCode::Wgsl(source) => Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(stage.shader.label()),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(source.as_str())),
        })),
        ShaderCode::Bytecode(_) => Err(ConfigurationError::UnsupportedShaderCode {
            label: descriptor.label.clone(),
            stage: kind,
            shader: stage.shader.label().to_string(),
        }
        .into()),
    }
}

impl WgpuPipeline {
    pub(super) fn new(
        device: &wgpu::Device,
        descriptor: &GraphicsPipelineDescriptor,
        bindings: &HashMap<ResourceId, WgpuBindings>,
    ) -> Result<WgpuPipeline, Error> {
        let Some(topology) = formats::topology(descriptor.topology) else {
            return Err(ConfigurationError::UnsupportedTopology {
                label: descriptor.label.clone(),
                topology: format!("{:?}", descriptor.topology),
            }
            .into());
        };
        let Some(render_pass) = descriptor.render_pass else {
            return Err(ConfigurationError::MissingRenderPass {
                label: descriptor.label.clone(),
            }
            .into());
        };
        let vertex_stage = descriptor.stage(ShaderStageKind::Vertex);
        let fragment_stage = descriptor.stage(ShaderStageKind::Fragment);
        let vertex = shader_module(device, descriptor, vertex_stage, ShaderStageKind::Vertex)?;
        let fragment =
            shader_module(device, descriptor, fragment_stage, ShaderStageKind::Fragment)?;

        let layouts = match &descriptor.shader_resource_bindings {
            Some(srb) => {
                let created = bindings.get(&srb.id()).ok_or_else(|| missing(srb.id()))?;
                vec![&created.layout]
            }
            None => Vec::new(),
        };
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&descriptor.label),
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        });

        let layout = &descriptor.vertex_input;
        let mut attributes = vec![Vec::new(); layout.bindings().len()];
        for attribute in layout.attributes() {
            attributes[attribute.binding as usize].push(wgpu::VertexAttribute {
                format: formats::vertex_format(attribute.format),
                offset: attribute.offset as u64,
                shader_location: attribute.location,
            });
        }
        let mut buffers = Vec::with_capacity(layout.bindings().len());
        for ((index, binding), attributes) in (0u32..).zip(layout.bindings()).zip(&attributes) {
            let step_mode = match binding.step_rate {
                StepRate::PerVertex => wgpu::VertexStepMode::Vertex,
                StepRate::PerInstance(1) => wgpu::VertexStepMode::Instance,
                StepRate::PerInstance(rate) => {
                    return Err(ConfigurationError::UnsupportedStepRate {
                        binding: index,
                        rate,
                    }
                    .into());
                }
            };
            buffers.push(wgpu::VertexBufferLayout {
                array_stride: binding.stride as u64,
                step_mode,
                attributes,
            });
        }

        let blend = match descriptor.blend {
            BlendMode::Opaque => None,
            BlendMode::Alpha => Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
        };
        let depth_stencil = render_pass.depth.map(|format| wgpu::DepthStencilState {
            format: formats::depth_format(format),
            depth_write_enabled: descriptor.depth_write,
            depth_compare: if descriptor.depth_test {
                formats::compare(descriptor.depth_compare)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: Default::default(),
            bias: Default::default(),
        });
        let targets = [Some(wgpu::ColorTargetState {
            format: formats::color_format(render_pass.color),
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&descriptor.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: vertex_stage.map(|s| s.shader.entry_point()),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: formats::front_face(descriptor.front_face),
                cull_mode: formats::cull_mode(descriptor.cull_mode),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: fragment_stage.map(|s| s.shader.entry_point()),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            multiview: None,
            cache: None,
        });
        Ok(WgpuPipeline { pipeline })
    }
}
