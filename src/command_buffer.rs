// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Render pass recording.

A [`CommandBuffer`] is either idle or recording one pass:

```text
Idle --begin_pass--> Recording --end_pass--> Idle
```

Every violation of this state machine, and every draw issued without the state it needs,
returns [`crate::Error::Misuse`] and leaves the command buffer usable.

```
use batches_and_passes::command_buffer::{ClearColor, DepthStencilClear};
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::resources::render_target::{PixelSize, RenderPassDescriptor};
# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
let target = device.new_render_target(PixelSize::new(64, 64), RenderPassDescriptor::default());
target.create().unwrap();

let mut cb = device.new_command_buffer();
assert!(cb.end_pass().unwrap_err().is_misuse());
cb.begin_pass(&target, ClearColor::BLACK, DepthStencilClear::default(), None).unwrap();
assert!(cb.begin_pass(&target, ClearColor::BLACK, DepthStencilClear::default(), None).unwrap_err().is_misuse());
cb.end_pass().unwrap();
# });
```
*/

use std::sync::Arc;

use crate::device::{Device, Feature};
use crate::error::{Error, MisuseError};
use crate::resources::bindings::ShaderResourceBindings;
use crate::resources::buffer::{Buffer, BufferKind, BufferUsage};
use crate::resources::pipeline::GraphicsPipeline;
use crate::resources::render_target::{PixelSize, RenderPassDescriptor, RenderTarget};
use crate::resources::{ResourceCore, ResourceId};
use crate::update_batch::ResourceUpdateBatch;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ClearColor {
    pub const BLACK: ClearColor = ClearColor::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: ClearColor = ClearColor::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: ClearColor = ClearColor::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> ClearColor {
        ClearColor { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStencilClear {
    pub depth: f32,
    pub stencil: u32,
}

impl Default for DepthStencilClear {
    fn default() -> Self {
        DepthStencilClear {
            depth: 1.0,
            stencil: 0,
        }
    }
}

/**
A viewport in pixels.

The origin is the bottom-left corner of the target.
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Viewport {
        Viewport {
            x,
            y,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    /// Covers the whole of a target of `size`.
    pub fn full(size: PixelSize) -> Viewport {
        Viewport::new(0.0, 0.0, size.width as f32, size.height as f32)
    }
}

/// A scissor rectangle in pixels, bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// A vertex buffer bound to one binding of the pipeline's vertex layout.
#[derive(Debug, Clone, Copy)]
pub struct VertexInput<'a> {
    pub buffer: &'a Buffer,
    pub offset: usize,
}

impl<'a> VertexInput<'a> {
    pub fn new(buffer: &'a Buffer) -> VertexInput<'a> {
        VertexInput { buffer, offset: 0 }
    }

    pub fn with_offset(buffer: &'a Buffer, offset: usize) -> VertexInput<'a> {
        VertexInput { buffer, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    UInt16,
    /// Requires [`Feature::IndexUInt32`].
    UInt32,
}

impl IndexFormat {
    pub const fn byte_size(self) -> usize {
        match self {
            IndexFormat::UInt16 => 2,
            IndexFormat::UInt32 => 4,
        }
    }
}

/// One command of a recorded pass, with resources replaced by their ids.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PassCommand {
    SetPipeline(ResourceId),
    SetViewport(Viewport),
    SetScissor(Scissor),
    SetShaderResources(ResourceId),
    SetVertexInput {
        binding: u32,
        buffer: ResourceId,
        offset: usize,
    },
    SetIndexBuffer {
        buffer: ResourceId,
        offset: usize,
        format: IndexFormat,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
}

/// A finished pass, as handed to the backend by [`CommandBuffer::end_pass`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedPass {
    pub(crate) target: ResourceId,
    pub(crate) size: PixelSize,
    pub(crate) render_pass: RenderPassDescriptor,
    pub(crate) clear: ClearColor,
    pub(crate) depth_stencil: DepthStencilClear,
    pub(crate) commands: Vec<PassCommand>,
}

impl RecordedPass {
    fn draw_statistics(&self) -> (u64, u64) {
        let mut draws = 0;
        let mut vertices = 0;
        for command in &self.commands {
            match command {
                PassCommand::Draw {
                    vertex_count,
                    instance_count,
                    ..
                } => {
                    draws += 1;
                    vertices += *vertex_count as u64 * *instance_count as u64;
                }
                PassCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    ..
                } => {
                    draws += 1;
                    vertices += *index_count as u64 * *instance_count as u64;
                }
                _ => {}
            }
        }
        (draws, vertices)
    }
}

#[derive(Debug)]
struct PassRecorder {
    pass: RecordedPass,
    target_label: String,
    pipeline: Option<GraphicsPipeline>,
    shader_resources: Option<ShaderResourceBindings>,
    vertex_inputs: Vec<Option<ResourceId>>,
    index_buffer: bool,
    //keeps every resource the pass references alive until it executes
    retained: Vec<Arc<ResourceCore>>,
}

impl PassRecorder {
    fn retain(&mut self, core: &Arc<ResourceCore>) {
        if !self.retained.iter().any(|r| Arc::ptr_eq(r, core)) {
            self.retained.push(core.clone());
        }
    }
}

#[derive(Debug)]
enum RecordState {
    Idle,
    Recording(Box<PassRecorder>),
}

/// Records render passes against one device.
#[derive(Debug)]
pub struct CommandBuffer {
    device: Device,
    state: RecordState,
}

impl CommandBuffer {
    pub(crate) fn new(device: Device) -> CommandBuffer {
        CommandBuffer {
            device,
            state: RecordState::Idle,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecordState::Recording(_))
    }

    fn recorder(&mut self, operation: &'static str) -> Result<&mut PassRecorder, Error> {
        match &mut self.state {
            RecordState::Recording(recorder) => Ok(&mut **recorder),
            RecordState::Idle => Err(MisuseError::NotRecording { operation }.logged()),
        }
    }

    fn require_usable(&self, core: &ResourceCore) -> Result<(), Error> {
        if !core.belongs_to(&self.device.shared) {
            return Err(MisuseError::ForeignResource {
                label: core.label.clone(),
            }
            .logged());
        }
        let state = self.device.shared.lock();
        let checked = state.registry.require_created(core.id, &core.label);
        drop(state);
        checked.map_err(MisuseError::logged)
    }

    fn apply_batch(&self, batch: ResourceUpdateBatch) -> Result<(), Error> {
        if !batch.belongs_to(&self.device.shared) {
            return Err(MisuseError::ForeignResource {
                label: "resource update batch".to_string(),
            }
            .logged());
        }
        batch.consume()
    }

    /**
    Applies `updates`, then begins a pass that clears `target`.

    On failure the command buffer stays idle.
    */
    pub fn begin_pass(
        &mut self,
        target: &RenderTarget,
        clear: ClearColor,
        depth_stencil: DepthStencilClear,
        updates: Option<ResourceUpdateBatch>,
    ) -> Result<(), Error> {
        if self.is_recording() {
            return Err(MisuseError::AlreadyRecording.logged());
        }
        self.require_usable(target.core())?;
        if let Some(batch) = updates {
            self.apply_batch(batch)?;
        }
        let label = target.label().to_string();
        logwise::trace_sync!("begin_pass {target}", target = label.clone());
        let mut recorder = PassRecorder {
            pass: RecordedPass {
                target: target.id(),
                size: target.pixel_size(),
                render_pass: target.render_pass_descriptor(),
                clear,
                depth_stencil,
                commands: Vec::new(),
            },
            target_label: label,
            pipeline: None,
            shader_resources: None,
            vertex_inputs: Vec::new(),
            index_buffer: false,
            retained: Vec::new(),
        };
        recorder.retain(target.core());
        self.state = RecordState::Recording(Box::new(recorder));
        Ok(())
    }

    /// Binds `pipeline` for subsequent draws.  Shader resources must be bound again.
    pub fn set_graphics_pipeline(&mut self, pipeline: &GraphicsPipeline) -> Result<(), Error> {
        self.recorder("set_graphics_pipeline")?;
        self.require_usable(pipeline.core())?;
        let recorder = self.recorder("set_graphics_pipeline")?;
        if pipeline.render_pass() != Some(recorder.pass.render_pass) {
            return Err(MisuseError::IncompatibleRenderPass {
                pipeline: pipeline.label().to_string(),
            }
            .logged());
        }
        if recorder.pipeline.as_ref() != Some(pipeline) {
            recorder.shader_resources = None;
        }
        recorder.retain(pipeline.core());
        recorder.pipeline = Some(pipeline.clone());
        recorder
            .pass
            .commands
            .push(PassCommand::SetPipeline(pipeline.id()));
        Ok(())
    }

    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), Error> {
        let recorder = self.recorder("set_viewport")?;
        recorder.pass.commands.push(PassCommand::SetViewport(viewport));
        Ok(())
    }

    pub fn set_scissor(&mut self, scissor: Scissor) -> Result<(), Error> {
        let recorder = self.recorder("set_scissor")?;
        recorder.pass.commands.push(PassCommand::SetScissor(scissor));
        Ok(())
    }

    /**
    Binds shader resources for subsequent draws.

    `None` binds the set the current pipeline was built with.  An explicit set must be layout
    compatible with it.
    */
    pub fn set_shader_resources(
        &mut self,
        bindings: Option<&ShaderResourceBindings>,
    ) -> Result<(), Error> {
        let recorder = self.recorder("set_shader_resources")?;
        let Some(pipeline) = recorder.pipeline.clone() else {
            return Err(MisuseError::NoPipelineBound.logged());
        };
        let bindings = match bindings {
            Some(bindings) => {
                let compatible = match pipeline.shader_resource_bindings() {
                    Some(own) => own.is_layout_compatible(bindings),
                    None => bindings.bindings().is_empty(),
                };
                if !compatible {
                    return Err(MisuseError::IncompatibleShaderResources {
                        bindings: bindings.label().to_string(),
                        pipeline: pipeline.label().to_string(),
                    }
                    .logged());
                }
                bindings.clone()
            }
            None => match pipeline.shader_resource_bindings() {
                Some(own) => own.clone(),
                None => return Ok(()),
            },
        };
        self.require_usable(bindings.core())?;
        let recorder = self.recorder("set_shader_resources")?;
        recorder.retain(bindings.core());
        for binding in bindings.bindings() {
            recorder.retain(binding.buffer().core());
        }
        recorder
            .pass
            .commands
            .push(PassCommand::SetShaderResources(bindings.id()));
        recorder.shader_resources = Some(bindings);
        Ok(())
    }

    /// Binds `inputs` to consecutive vertex bindings starting at `start_binding`.
    pub fn set_vertex_input(
        &mut self,
        start_binding: u32,
        inputs: &[VertexInput<'_>],
    ) -> Result<(), Error> {
        self.recorder("set_vertex_input")?;
        let max = self.device.limits().max_vertex_input_bindings;
        let end = start_binding as usize + inputs.len();
        if end > max {
            return Err(MisuseError::TooManyVertexInputs {
                start: start_binding,
                end: end as u32,
                max,
            }
            .logged());
        }
        for input in inputs {
            if input.buffer.kind() != BufferKind::Vertex {
                return Err(MisuseError::WrongBufferKind {
                    label: input.buffer.label().to_string(),
                    operation: "set_vertex_input",
                    expected: BufferKind::Vertex,
                    found: input.buffer.kind(),
                }
                .logged());
            }
            if input.offset > input.buffer.size() {
                return Err(MisuseError::OutOfBounds {
                    label: input.buffer.label().to_string(),
                    offset: input.offset,
                    size: 0,
                    capacity: input.buffer.size(),
                }
                .logged());
            }
            self.require_usable(input.buffer.core())?;
        }
        let recorder = self.recorder("set_vertex_input")?;
        if recorder.vertex_inputs.len() < end {
            recorder.vertex_inputs.resize(end, None);
        }
        for (binding, input) in (start_binding..).zip(inputs) {
            recorder.retain(input.buffer.core());
            recorder.vertex_inputs[binding as usize] = Some(input.buffer.id());
            recorder.pass.commands.push(PassCommand::SetVertexInput {
                binding,
                buffer: input.buffer.id(),
                offset: input.offset,
            });
        }
        Ok(())
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: &Buffer,
        offset: usize,
        format: IndexFormat,
    ) -> Result<(), Error> {
        self.recorder("set_index_buffer")?;
        if format == IndexFormat::UInt32 {
            self.device.shared.require_feature(Feature::IndexUInt32)?;
        }
        if buffer.kind() != BufferKind::Index {
            return Err(MisuseError::WrongBufferKind {
                label: buffer.label().to_string(),
                operation: "set_index_buffer",
                expected: BufferKind::Index,
                found: buffer.kind(),
            }
            .logged());
        }
        if offset > buffer.size() {
            return Err(MisuseError::OutOfBounds {
                label: buffer.label().to_string(),
                offset,
                size: 0,
                capacity: buffer.size(),
            }
            .logged());
        }
        self.require_usable(buffer.core())?;
        let recorder = self.recorder("set_index_buffer")?;
        recorder.retain(buffer.core());
        recorder.index_buffer = true;
        recorder.pass.commands.push(PassCommand::SetIndexBuffer {
            buffer: buffer.id(),
            offset,
            format,
        });
        Ok(())
    }

    fn check_draw(
        &mut self,
        operation: &'static str,
        instance_count: u32,
        first_instance: u32,
        vertex_offset: i32,
        indexed: bool,
    ) -> Result<(), Error> {
        self.recorder(operation)?;
        if instance_count > 1 {
            self.device.shared.require_feature(Feature::Instancing)?;
        }
        if first_instance != 0 {
            self.device.shared.require_feature(Feature::BaseInstance)?;
        }
        if vertex_offset != 0 {
            self.device.shared.require_feature(Feature::BaseVertex)?;
        }
        let recorder = self.recorder(operation)?;
        let Some(pipeline) = &recorder.pipeline else {
            return Err(MisuseError::NoPipelineBound.logged());
        };
        if pipeline.shader_resource_bindings().is_some() && recorder.shader_resources.is_none() {
            return Err(MisuseError::MissingShaderResources {
                pipeline: pipeline.label().to_string(),
            }
            .logged());
        }
        let bindings = pipeline.descriptor().vertex_input.bindings().len() as u32;
        for binding in 0..bindings {
            let bound = recorder
                .vertex_inputs
                .get(binding as usize)
                .is_some_and(|b| b.is_some());
            if !bound {
                return Err(MisuseError::MissingVertexInput { binding }.logged());
            }
        }
        if indexed && !recorder.index_buffer {
            return Err(MisuseError::MissingIndexBuffer.logged());
        }
        Ok(())
    }

    /// Draws `vertex_count` vertices with the current state.
    pub fn draw(&mut self, vertex_count: u32) -> Result<(), Error> {
        self.draw_instanced(vertex_count, 1, 0, 0)
    }

    pub fn draw_instanced(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) -> Result<(), Error> {
        self.check_draw("draw", instance_count, first_instance, 0, false)?;
        let recorder = self.recorder("draw")?;
        recorder.pass.commands.push(PassCommand::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
        Ok(())
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) -> Result<(), Error> {
        self.check_draw(
            "draw_indexed",
            instance_count,
            first_instance,
            vertex_offset,
            true,
        )?;
        let recorder = self.recorder("draw_indexed")?;
        recorder.pass.commands.push(PassCommand::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        });
        Ok(())
    }

    /**
    Ends the pass and hands it to the backend.

    The command buffer is idle afterwards whether or not execution succeeds.
    */
    pub fn end_pass(&mut self) -> Result<(), Error> {
        let recorder = match std::mem::replace(&mut self.state, RecordState::Idle) {
            RecordState::Recording(recorder) => recorder,
            RecordState::Idle => {
                return Err(MisuseError::NotRecording {
                    operation: "end_pass",
                }
                .logged());
            }
        };
        let target = recorder.target_label.clone();
        logwise::trace_sync!(
            "end_pass {target} with {commands} commands",
            target = target,
            commands = recorder.pass.commands.len()
        );
        let mut state = self.device.shared.lock();
        for core in &recorder.retained {
            if let Err(e) = state.registry.require_created(core.id, &core.label) {
                drop(state);
                return Err(e.logged());
            }
        }
        let executing = logwise::perfwarn_begin!("execute_pass");
        let executed = state.backend.execute_pass(&recorder.pass);
        drop(executing);
        if executed.is_ok() {
            for core in &recorder.retained {
                if let Some(buffer) = state
                    .registry
                    .get_mut(core.id)
                    .and_then(|r| r.buffer.as_mut())
                    && buffer.usage == BufferUsage::Immutable
                {
                    buffer.used_by_pass = true;
                }
            }
            let (draws, vertices) = recorder.pass.draw_statistics();
            state.statistics.passes_executed += 1;
            state.statistics.draw_calls += draws;
            state.statistics.vertices_submitted += vertices;
        }
        drop(state);
        drop(recorder);
        executed
    }

    /// Applies `batch` outside of a pass.
    pub fn resource_update(&mut self, batch: ResourceUpdateBatch) -> Result<(), Error> {
        if self.is_recording() {
            return Err(MisuseError::PassInProgress.logged());
        }
        self.apply_batch(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;

    fn setup() -> (Device, RenderTarget) {
        let device = test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap();
        let target =
            device.new_render_target(PixelSize::new(32, 32), RenderPassDescriptor::default());
        target.create().unwrap();
        (device, target)
    }

    #[test]
    fn recording_requires_a_pass() {
        let (device, _target) = setup();
        let mut cb = device.new_command_buffer();
        assert!(matches!(
            cb.set_viewport(Viewport::new(0.0, 0.0, 1.0, 1.0)),
            Err(Error::Misuse(MisuseError::NotRecording {
                operation: "set_viewport"
            }))
        ));
        assert!(matches!(
            cb.draw(3),
            Err(Error::Misuse(MisuseError::NotRecording { .. }))
        ));
    }

    #[test]
    fn draw_needs_a_pipeline() {
        let (device, target) = setup();
        let mut cb = device.new_command_buffer();
        cb.begin_pass(&target, ClearColor::BLACK, DepthStencilClear::default(), None)
            .unwrap();
        assert!(matches!(
            cb.draw(3),
            Err(Error::Misuse(MisuseError::NoPipelineBound))
        ));
        //still recording
        assert!(cb.is_recording());
        cb.end_pass().unwrap();
        assert!(!cb.is_recording());
        let stats = device.statistics();
        assert_eq!(stats.passes_executed, 1);
        assert_eq!(stats.draw_calls, 0);
    }

    #[test]
    fn updates_wait_for_the_pass() {
        let (device, target) = setup();
        let mut cb = device.new_command_buffer();
        cb.begin_pass(&target, ClearColor::BLACK, DepthStencilClear::default(), None)
            .unwrap();
        let batch = device.next_resource_update_batch();
        assert!(matches!(
            cb.resource_update(batch),
            Err(Error::Misuse(MisuseError::PassInProgress))
        ));
        cb.end_pass().unwrap();
        cb.resource_update(device.next_resource_update_batch())
            .unwrap();
        assert_eq!(device.statistics().batches_applied, 1);
    }

    #[test]
    fn released_target_cannot_begin() {
        let (device, target) = setup();
        target.release().unwrap();
        let mut cb = device.new_command_buffer();
        assert!(matches!(
            cb.begin_pass(&target, ClearColor::BLACK, DepthStencilClear::default(), None),
            Err(Error::Misuse(MisuseError::ResourceReleased { .. }))
        ));
        assert!(!cb.is_recording());
    }
}
