// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A tessellated, displaced triangle.

The scene draws one 3-control-point patch.  Its uniform block is read by the tessellation
evaluation stage:

| offset | size | contents |
|---|---|---|
| 0 | 64 | projection, column-major |
| 64 | 4 | time, `f32` |
| 68 | 4 | displacement amplitude, `f32` |

Each frame uploads the projection only when it differs from the last one uploaded, and
uploads the time unconditionally.  The vertex data and the amplitude are uploaded once, with
the first frame.

```
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::port::{Port, PortConfig};
use batches_and_passes::scenes::TessellationScene;
use batches_and_passes::shader::{Shader, ShaderLibrary};

let mut shaders = ShaderLibrary::new();
for (_, path) in TessellationScene::SHADERS {
    shaders.insert(path, Shader::bytecode(path, vec![0u8; 4]));
}
# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
let scene = TessellationScene::from_loader(&shaders).unwrap();
let mut port = Port::new(&device, PortConfig::default(), scene).unwrap();
port.render_frame().unwrap();
assert!((port.client().time() - 0.1).abs() < 1e-6);
port.release().unwrap();
# });
```
*/

use crate::command_buffer::{DepthStencilClear, VertexInput, Viewport};
use crate::device::{Device, Feature};
use crate::error::{Error, MisuseError};
use crate::port::{FrameContext, RenderClient};
use crate::projection::{self, Matrix4};
use crate::resources::ReleasePool;
use crate::resources::bindings::{ShaderResourceBinding, ShaderResourceBindings, StageFlags};
use crate::resources::buffer::{Buffer, BufferKind, BufferUsage};
use crate::resources::pipeline::{CullMode, GraphicsPipeline, GraphicsPipelineDescriptor, Topology};
use crate::resources::render_target::RenderTarget;
use crate::shader::{ShaderLoader, ShaderStage, ShaderStageKind};
use crate::update_batch::ResourceUpdateBatch;
use crate::vertex_layout::{VertexFormat, VertexInputLayout};

#[derive(Debug)]
struct SceneResources {
    vertex_buffer: Buffer,
    uniform_buffer: Buffer,
    pipeline: GraphicsPipeline,
}

#[derive(Debug)]
pub struct TessellationScene {
    stages: Vec<ShaderStage>,
    resources: Option<SceneResources>,
    initial_updates: Option<ResourceUpdateBatch>,
    projection: Option<Matrix4>,
    time: f32,
    pool: ReleasePool,
}

impl TessellationScene {
    /// Position then color, three floats each.
    pub const TRIANGLE: [f32; 18] = [
        0.0, 0.5, 0.0, 0.0, 0.0, 1.0, //
        -0.5, -0.5, 0.0, 1.0, 0.0, 0.0, //
        0.5, -0.5, 0.0, 0.0, 1.0, 0.0,
    ];
    pub const VERTEX_STRIDE: u32 = 6 * 4;
    pub const UNIFORM_SIZE: usize = 64 + 4 + 4;
    pub const TIME_OFFSET: usize = 64;
    pub const AMPLITUDE_OFFSET: usize = 68;
    pub const AMPLITUDE: f32 = 0.5;
    pub const TIME_STEP: f32 = 0.1;
    /// Shader paths [`Self::from_loader`] loads, by stage.
    pub const SHADERS: [(ShaderStageKind, &'static str); 4] = [
        (ShaderStageKind::Vertex, "tessellation.vert"),
        (ShaderStageKind::TessellationControl, "tessellation.tesc"),
        (ShaderStageKind::TessellationEvaluation, "tessellation.tese"),
        (ShaderStageKind::Fragment, "tessellation.frag"),
    ];

    /// A scene using `stages`, one per stage kind of [`Self::SHADERS`].
    pub fn new(stages: Vec<ShaderStage>) -> Self {
        TessellationScene {
            stages,
            resources: None,
            initial_updates: None,
            projection: None,
            time: 0.0,
            pool: ReleasePool::new(),
        }
    }

    pub fn from_loader(loader: &impl ShaderLoader) -> Result<Self, Error> {
        let mut stages = Vec::with_capacity(Self::SHADERS.len());
        for (kind, path) in Self::SHADERS {
            stages.push(ShaderStage::new(kind, loader.load(path)?));
        }
        Ok(Self::new(stages))
    }

    /// The time the next frame uploads.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// The projection most recently uploaded.
    pub fn last_projection(&self) -> Option<Matrix4> {
        self.projection
    }

    pub fn uniform_buffer(&self) -> Option<&Buffer> {
        self.resources.as_ref().map(|r| &r.uniform_buffer)
    }

    pub fn vertex_buffer(&self) -> Option<&Buffer> {
        self.resources.as_ref().map(|r| &r.vertex_buffer)
    }

    pub fn pipeline(&self) -> Option<&GraphicsPipeline> {
        self.resources.as_ref().map(|r| &r.pipeline)
    }

    /// Whether the one-time uploads are still waiting for a frame.
    pub fn has_pending_initial_updates(&self) -> bool {
        self.initial_updates.is_some()
    }

    fn triangle_bytes() -> Vec<u8> {
        Self::TRIANGLE.iter().flat_map(|f| f.to_ne_bytes()).collect()
    }

    fn vertex_layout() -> VertexInputLayout {
        let mut layout = VertexInputLayout::new();
        let binding = layout.add_binding(Self::VERTEX_STRIDE);
        layout.add_attribute(binding, 0, VertexFormat::Float3, 0);
        layout.add_attribute(binding, 1, VertexFormat::Float3, 3 * 4);
        layout
    }

    fn build(&mut self, device: &Device, target: &RenderTarget) -> Result<SceneResources, Error> {
        let vertex_buffer = device.new_labeled_buffer(
            "tessellation vertices",
            BufferUsage::Immutable,
            BufferKind::Vertex,
            std::mem::size_of_val(&Self::TRIANGLE),
        )?;
        vertex_buffer.create()?;
        self.pool.push(vertex_buffer.clone())?;

        let uniform_buffer = device.new_labeled_buffer(
            "tessellation uniforms",
            BufferUsage::Dynamic,
            BufferKind::Uniform,
            Self::UNIFORM_SIZE,
        )?;
        uniform_buffer.create()?;
        self.pool.push(uniform_buffer.clone())?;

        let bindings: ShaderResourceBindings = device.new_labeled_shader_resource_bindings(
            "tessellation bindings",
            vec![ShaderResourceBinding::uniform_buffer(
                0,
                StageFlags::TESSELLATION_EVALUATION,
                &uniform_buffer,
            )],
        );
        bindings.create()?;
        self.pool.push(bindings.clone())?;

        let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
            label: "tessellation".to_string(),
            topology: Topology::Patches { control_points: 3 },
            stages: self.stages.clone(),
            vertex_input: Self::vertex_layout(),
            cull_mode: CullMode::Back,
            depth_test: true,
            depth_write: true,
            shader_resource_bindings: Some(bindings),
            render_pass: Some(target.render_pass_descriptor()),
            ..Default::default()
        });
        pipeline.create()?;
        self.pool.push(pipeline.clone())?;

        let mut initial = device.next_resource_update_batch();
        initial.upload_static_buffer(&vertex_buffer, &Self::triangle_bytes())?;
        initial.update_dynamic_buffer(
            &uniform_buffer,
            Self::AMPLITUDE_OFFSET,
            &Self::AMPLITUDE.to_ne_bytes(),
        )?;
        self.initial_updates = Some(initial);

        Ok(SceneResources {
            vertex_buffer,
            uniform_buffer,
            pipeline,
        })
    }
}

impl RenderClient for TessellationScene {
    /// Fails with [`Error::UnsupportedFeature`] on devices without tessellation.
    fn init(&mut self, device: &Device, target: &RenderTarget) -> Result<(), Error> {
        device.shared.require_feature(Feature::Tessellation)?;
        let resources = self.build(device, target)?;
        self.resources = Some(resources);
        logwise::info_sync!(
            "tessellation scene ready on {backend}",
            backend = device.backend_name()
        );
        Ok(())
    }

    fn render(&mut self, frame: &mut FrameContext<'_>) -> Result<(), Error> {
        let Some(resources) = &self.resources else {
            return Err(MisuseError::ResourceNotCreated {
                label: "tessellation scene".to_string(),
            }
            .logged());
        };
        let mut updates = frame.device().next_resource_update_batch();
        let projection = frame.projection();
        let projection_changed = self.projection != Some(projection);
        if projection_changed {
            updates.update_dynamic_buffer(
                &resources.uniform_buffer,
                0,
                &projection::matrix_bytes(&projection),
            )?;
        }
        updates.update_dynamic_buffer(
            &resources.uniform_buffer,
            Self::TIME_OFFSET,
            &self.time.to_ne_bytes(),
        )?;

        let target = frame.render_target().clone();
        let clear = frame.clear_color();
        let viewport = Viewport::full(frame.pixel_size());
        let cb = frame.command_buffer();
        if cb.is_recording() {
            return Err(MisuseError::AlreadyRecording.logged());
        }
        //the initial batch stays pending until nothing before the pass can fail
        let updates = match self.initial_updates.take() {
            Some(mut initial) => {
                initial.merge(updates)?;
                initial
            }
            None => updates,
        };
        cb.begin_pass(&target, clear, DepthStencilClear::default(), Some(updates))?;
        if projection_changed {
            self.projection = Some(projection);
        }
        self.time += Self::TIME_STEP;

        cb.set_graphics_pipeline(&resources.pipeline)?;
        cb.set_viewport(viewport)?;
        cb.set_shader_resources(None)?;
        cb.set_vertex_input(0, &[VertexInput::new(&resources.vertex_buffer)])?;
        cb.draw(3)?;
        cb.end_pass()
    }

    fn release(&mut self) -> Result<(), Error> {
        if let Some(initial) = self.initial_updates.take() {
            initial.release();
        }
        self.resources = None;
        self.projection = None;
        std::mem::take(&mut self.pool).release_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;
    use crate::port::{Port, PortConfig};
    use crate::shader::{Shader, ShaderLibrary};

    fn shaders() -> ShaderLibrary {
        let mut library = ShaderLibrary::new();
        for (_, path) in TessellationScene::SHADERS {
            library.insert(path, Shader::bytecode(path, vec![7u8; 8]));
        }
        library
    }

    fn device(features: Option<Vec<Feature>>) -> Device {
        let config = DeviceConfig {
            software_features: features,
            ..Default::default()
        };
        test_executors::sleep_on(Device::new(config)).unwrap()
    }

    #[test]
    fn missing_shader_fails_to_load() {
        let mut library = ShaderLibrary::new();
        library.insert("tessellation.vert", Shader::bytecode("v", vec![1]));
        let err = TessellationScene::from_loader(&library).unwrap_err();
        assert!(matches!(err, Error::ShaderLoad(_)));
    }

    #[test]
    fn init_requires_tessellation() {
        let device = device(Some(vec![Feature::Instancing]));
        let scene = TessellationScene::from_loader(&shaders()).unwrap();
        let mut port = Port::new(&device, PortConfig::default(), scene).unwrap();
        assert!(port.render_frame().unwrap_err().is_unsupported_feature());
        assert!(port.client().uniform_buffer().is_none());
    }

    #[test]
    fn initial_updates_run_once() {
        let device = device(None);
        let scene = TessellationScene::from_loader(&shaders()).unwrap();
        let mut port = Port::new(&device, PortConfig::default(), scene).unwrap();
        port.render_frame().unwrap();
        assert!(!port.client().has_pending_initial_updates());
        let uploaded = device.statistics().bytes_uploaded;
        //vertices, amplitude, projection, time
        assert_eq!(uploaded, 72 + 4 + 64 + 4);
        port.render_frame().unwrap();
        assert_eq!(device.statistics().bytes_uploaded, uploaded + 4);
        assert_eq!(device.statistics().draw_calls, 2);
    }

    #[test]
    fn failed_first_frame_keeps_initial_updates() {
        let device = device(None);
        let config = PortConfig::default();
        let target = device.new_render_target(config.size, config.render_pass);
        target.create().unwrap();
        let mut scene = TessellationScene::from_loader(&shaders()).unwrap();
        scene.init(&device, &target).unwrap();

        let mut cb = device.new_command_buffer();
        cb.begin_pass(&target, config.clear_color, DepthStencilClear::default(), None)
            .unwrap();
        let projection = projection::frame_projection(config.size, config.field_of_view);
        let mut frame =
            FrameContext::new(&device, &target, &mut cb, projection, 0, config.clear_color);
        assert!(scene.render(&mut frame).is_err());
        assert!(scene.has_pending_initial_updates());
        assert_eq!(scene.last_projection(), None);
        assert_eq!(scene.time(), 0.0);

        cb.end_pass().unwrap();
        let mut frame =
            FrameContext::new(&device, &target, &mut cb, projection, 1, config.clear_color);
        scene.render(&mut frame).unwrap();
        assert!(!scene.has_pending_initial_updates());

        let mut batch = device.next_resource_update_batch();
        let vertices = batch
            .read_back_buffer(scene.vertex_buffer().unwrap(), 0, 72)
            .unwrap();
        let amplitude = batch
            .read_back_buffer(
                scene.uniform_buffer().unwrap(),
                TessellationScene::AMPLITUDE_OFFSET,
                4,
            )
            .unwrap();
        cb.resource_update(batch).unwrap();
        assert_eq!(vertices.take().unwrap(), TessellationScene::triangle_bytes());
        assert_eq!(
            amplitude.take().unwrap(),
            TessellationScene::AMPLITUDE.to_ne_bytes()
        );
    }

    #[test]
    fn resize_uploads_a_new_projection() {
        let device = device(None);
        let scene = TessellationScene::from_loader(&shaders()).unwrap();
        let mut port = Port::new(&device, PortConfig::default(), scene).unwrap();
        port.render_frame().unwrap();
        let first = port.client().last_projection().unwrap();
        port.resize(crate::resources::render_target::PixelSize::new(400, 400))
            .unwrap();
        let before = device.statistics().bytes_uploaded;
        port.render_frame().unwrap();
        assert_eq!(device.statistics().bytes_uploaded, before + 64 + 4);
        assert_ne!(port.client().last_projection().unwrap(), first);
    }

    #[test]
    fn failed_init_releases_partial_resources() {
        let device = device(None);
        let scene = TessellationScene::new(Vec::new());
        let mut port = Port::new(&device, PortConfig::default(), scene).unwrap();
        let err = port.render_frame().unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(crate::error::ConfigurationError::MissingShaderStage { .. })
        ));
        //only the port's render target is left
        assert_eq!(device.statistics().live_resources, 1);
        assert!(!port.client().has_pending_initial_updates());
    }

    #[test]
    fn release_frees_everything() {
        let device = device(None);
        let scene = TessellationScene::from_loader(&shaders()).unwrap();
        let mut port = Port::new(&device, PortConfig::default(), scene).unwrap();
        port.render_frame().unwrap();
        let buffer = port.client().uniform_buffer().unwrap().clone();
        port.release().unwrap();
        assert!(buffer.is_released());
        assert_eq!(device.statistics().live_resources, 0);
    }
}
