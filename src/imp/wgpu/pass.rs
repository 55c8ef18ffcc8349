// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use std::collections::HashMap;

use super::buffer::WgpuBuffer;
use super::pipeline::{WgpuBindings, WgpuPipeline};
use super::{WgpuTarget, formats, missing};
use crate::command_buffer::{PassCommand, RecordedPass};
use crate::error::Error;
use crate::resources::ResourceId;

/// wgpu places the viewport origin at the top left.
fn flip_y(target_height: u32, y: f32, height: f32) -> f32 {
    target_height as f32 - (y + height)
}

pub(super) fn encode(
    encoder: &mut wgpu::CommandEncoder,
    recorded: &RecordedPass,
    target: &WgpuTarget,
    buffers: &HashMap<ResourceId, WgpuBuffer>,
    bindings: &HashMap<ResourceId, WgpuBindings>,
    pipelines: &HashMap<ResourceId, WgpuPipeline>,
) -> Result<(), Error> {
    let clear = recorded.clear;
    let depth_stencil_attachment = target.depth.as_ref().map(|view| {
        let has_stencil = recorded
            .render_pass
            .depth
            .is_some_and(|format| format.has_stencil());
        wgpu::RenderPassDepthStencilAttachment {
            view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(recorded.depth_stencil.depth),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: has_stencil.then_some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(recorded.depth_stencil.stencil),
                store: wgpu::StoreOp::Store,
            }),
        }
    });
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("batches_and_passes render pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &target.color,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color {
                    r: clear.r as f64,
                    g: clear.g as f64,
                    b: clear.b as f64,
                    a: clear.a as f64,
                }),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    let buffer = |id: &ResourceId| buffers.get(id).ok_or_else(|| missing(*id));
    for command in &recorded.commands {
        match command {
            PassCommand::SetPipeline(id) => {
                let pipeline = pipelines.get(id).ok_or_else(|| missing(*id))?;
                pass.set_pipeline(&pipeline.pipeline);
            }
            PassCommand::SetViewport(viewport) => {
                pass.set_viewport(
                    viewport.x,
                    flip_y(target.height, viewport.y, viewport.height),
                    viewport.width,
                    viewport.height,
                    viewport.min_depth,
                    viewport.max_depth,
                );
            }
            PassCommand::SetScissor(scissor) => {
                let y = target.height.saturating_sub(scissor.y + scissor.height);
                pass.set_scissor_rect(scissor.x, y, scissor.width, scissor.height);
            }
            PassCommand::SetShaderResources(id) => {
                let group = bindings.get(id).ok_or_else(|| missing(*id))?;
                pass.set_bind_group(0, &group.group, &[]);
            }
            PassCommand::SetVertexInput {
                binding,
                buffer: id,
                offset,
            } => {
                let vertex = buffer(id)?;
                pass.set_vertex_buffer(*binding, vertex.wgpu_buffer().slice(*offset as u64..));
            }
            PassCommand::SetIndexBuffer {
                buffer: id,
                offset,
                format,
            } => {
                let index = buffer(id)?;
                pass.set_index_buffer(
                    index.wgpu_buffer().slice(*offset as u64..),
                    formats::index_format(*format),
                );
            }
            PassCommand::Draw {
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            } => {
                pass.draw(
                    *first_vertex..*first_vertex + *vertex_count,
                    *first_instance..*first_instance + *instance_count,
                );
            }
            PassCommand::DrawIndexed {
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            } => {
                pass.draw_indexed(
                    *first_index..*first_index + *index_count,
                    *vertex_offset,
                    *first_instance..*first_instance + *instance_count,
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::flip_y;

    #[test]
    fn viewport_origin_moves_to_the_top() {
        //bottom half of a 100 pixel target
        assert_eq!(flip_y(100, 0.0, 50.0), 50.0);
        assert_eq!(flip_y(100, 0.0, 100.0), 0.0);
        assert_eq!(flip_y(100, 25.0, 50.0), 25.0);
    }
}
