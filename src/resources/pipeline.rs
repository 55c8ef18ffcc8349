// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Graphics pipelines.

A [`GraphicsPipeline`] is an immutable compiled configuration.  Describe it with a
[`GraphicsPipelineDescriptor`], construct it with
[`crate::device::Device::new_graphics_pipeline`], then call [`GraphicsPipeline::create`]; to
change anything, build another one.

```
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::resources::pipeline::{GraphicsPipelineDescriptor, Topology};
use batches_and_passes::resources::render_target::RenderPassDescriptor;
use batches_and_passes::shader::{Shader, ShaderStage, ShaderStageKind};
# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
    label: "fullscreen".into(),
    topology: Topology::TriangleStrip,
    stages: vec![
        ShaderStage::new(ShaderStageKind::Vertex, Shader::bytecode("fs.vert", vec![1, 2, 3])),
        ShaderStage::new(ShaderStageKind::Fragment, Shader::bytecode("fs.frag", vec![4, 5, 6])),
    ],
    render_pass: Some(RenderPassDescriptor::default()),
    ..Default::default()
});
pipeline.create().unwrap();
# });
```
*/

use std::sync::Arc;

use crate::device::{Device, DeviceShared, Feature};
use crate::error::{ConfigurationError, Error};
use crate::resources::bindings::{ShaderResourceBindings, StageFlags};
use crate::resources::render_target::RenderPassDescriptor;
use crate::resources::{ResourceCore, ResourceKind, resource_handle};
use crate::shader::{ShaderStage, ShaderStageKind};
use crate::vertex_layout::VertexInputLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
    /// Patches of `control_points` vertices, consumed by tessellation stages.
    Patches { control_points: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareOp {
    Never,
    #[default]
    Less,
    Equal,
    LessOrEqual,
    Greater,
    NotEqual,
    GreaterOrEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// Premultiplied-alpha "over".
    Alpha,
}

/// Everything a [`GraphicsPipeline`] is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsPipelineDescriptor {
    pub label: String,
    pub topology: Topology,
    /// One entry per stage.  Vertex and fragment are required; patch topologies also need
    /// both tessellation stages.
    pub stages: Vec<ShaderStage>,
    pub vertex_input: VertexInputLayout,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub blend: BlendMode,
    /// The binding set the pipeline's shaders read.  It stays referenced while the pipeline
    /// is created.
    pub shader_resource_bindings: Option<ShaderResourceBindings>,
    /// Required.  The pass the pipeline will be bound in.
    pub render_pass: Option<RenderPassDescriptor>,
}

impl Default for GraphicsPipelineDescriptor {
    fn default() -> Self {
        GraphicsPipelineDescriptor {
            label: "graphics pipeline".to_string(),
            topology: Topology::default(),
            stages: Vec::new(),
            vertex_input: VertexInputLayout::new(),
            cull_mode: CullMode::default(),
            front_face: FrontFace::default(),
            depth_test: false,
            depth_write: false,
            depth_compare: CompareOp::default(),
            blend: BlendMode::default(),
            shader_resource_bindings: None,
            render_pass: None,
        }
    }
}

impl GraphicsPipelineDescriptor {
    pub fn stage(&self, kind: ShaderStageKind) -> Option<&ShaderStage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    pub fn stage_flags(&self) -> StageFlags {
        self.stages
            .iter()
            .fold(StageFlags::NONE, |acc, s| acc | StageFlags::from_stage(s.kind))
    }

    fn validate(&self, device: &DeviceShared) -> Result<(), Error> {
        let label = &self.label;
        let Some(render_pass) = self.render_pass else {
            return Err(ConfigurationError::MissingRenderPass {
                label: label.clone(),
            }
            .into());
        };

        let patches = match self.topology {
            Topology::Patches { control_points } => {
                device.require_feature(Feature::Tessellation)?;
                let max = device.limits().max_patch_control_points;
                if control_points == 0 || control_points > max {
                    return Err(ConfigurationError::InvalidPatchControlPoints {
                        label: label.clone(),
                        count: control_points,
                        max,
                    }
                    .into());
                }
                true
            }
            _ => false,
        };

        let mut seen = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            if seen.contains(&stage.kind) {
                return Err(ConfigurationError::DuplicateShaderStage {
                    label: label.clone(),
                    stage: stage.kind,
                }
                .into());
            }
            seen.push(stage.kind);
            if stage.kind.is_tessellation() && !patches {
                return Err(ConfigurationError::UnexpectedShaderStage {
                    label: label.clone(),
                    stage: stage.kind,
                }
                .into());
            }
            if stage.kind == ShaderStageKind::Geometry {
                device.require_feature(Feature::GeometryShader)?;
            }
        }
        let mut required = vec![ShaderStageKind::Vertex, ShaderStageKind::Fragment];
        if patches {
            required.push(ShaderStageKind::TessellationControl);
            required.push(ShaderStageKind::TessellationEvaluation);
        }
        for stage in required {
            if !seen.contains(&stage) {
                return Err(ConfigurationError::MissingShaderStage {
                    label: label.clone(),
                    stage,
                }
                .into());
            }
        }

        self.vertex_input.validate(&device.limits())?;
        if self.vertex_input.uses_instancing() {
            device.require_feature(Feature::Instancing)?;
        }

        if (self.depth_test || self.depth_write) && render_pass.depth.is_none() {
            return Err(ConfigurationError::DepthWithoutAttachment {
                label: label.clone(),
            }
            .into());
        }

        if let Some(bindings) = &self.shader_resource_bindings {
            let pipeline_stages = self.stage_flags();
            for binding in bindings.bindings() {
                if let Some(stage) = binding
                    .stages()
                    .stages()
                    .find(|s| !pipeline_stages.contains(StageFlags::from_stage(*s)))
                {
                    return Err(ConfigurationError::BindingStageMissing {
                        label: label.clone(),
                        slot: binding.slot(),
                        stage,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// A graphics pipeline handle.
#[derive(Debug, Clone)]
pub struct GraphicsPipeline {
    core: Arc<ResourceCore>,
    descriptor: Arc<GraphicsPipelineDescriptor>,
}

resource_handle!(GraphicsPipeline, ResourceKind::GraphicsPipeline);

impl GraphicsPipeline {
    pub(crate) fn new(device: &Device, descriptor: GraphicsPipelineDescriptor) -> GraphicsPipeline {
        let core = ResourceCore::new(
            device,
            ResourceKind::GraphicsPipeline,
            descriptor.label.clone(),
            None,
        );
        GraphicsPipeline {
            core,
            descriptor: Arc::new(descriptor),
        }
    }

    pub fn descriptor(&self) -> &GraphicsPipelineDescriptor {
        &self.descriptor
    }

    pub fn topology(&self) -> Topology {
        self.descriptor.topology
    }

    pub fn shader_resource_bindings(&self) -> Option<&ShaderResourceBindings> {
        self.descriptor.shader_resource_bindings.as_ref()
    }

    pub fn render_pass(&self) -> Option<RenderPassDescriptor> {
        self.descriptor.render_pass
    }

    /**
    Validates the descriptor and compiles the pipeline.

    Patch topologies fail with [`Error::UnsupportedFeature`] on devices without
    [`Feature::Tessellation`].  Everything else that is inconsistent fails with a
    [`ConfigurationError`].
    */
    pub fn create(&self) -> Result<(), Error> {
        let shared = &self.core.device;
        if let Err(e) = self.descriptor.validate(shared) {
            let label = self.core.label.clone();
            let message = e.to_string();
            logwise::warn_sync!(
                "pipeline {label} failed validation: {message}",
                label = label,
                message = message
            );
            return Err(e);
        }
        let mut state = shared.lock();
        let mut depends_on = Vec::new();
        if let Some(bindings) = &self.descriptor.shader_resource_bindings {
            if !bindings.core().belongs_to(shared) {
                return Err(ConfigurationError::ForeignResource {
                    label: self.core.label.clone(),
                    resource: bindings.label().to_string(),
                }
                .into());
            }
            state.require_dependency(&self.core.label, bindings.core())?;
            depends_on.push(bindings.id());
        }
        state.create_resource(&self.core, depends_on, |backend| {
            backend.create_pipeline(self.core.id, &self.descriptor)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceConfig;
    use crate::resources::bindings::ShaderResourceBinding;
    use crate::resources::buffer::{BufferKind, BufferUsage};
    use crate::shader::Shader;

    fn device(features: Option<Vec<Feature>>) -> Device {
        test_executors::sleep_on(Device::new(DeviceConfig {
            software_features: features,
            ..Default::default()
        }))
        .unwrap()
    }

    fn stage(kind: ShaderStageKind) -> ShaderStage {
        ShaderStage::new(kind, Shader::bytecode("test", vec![0u8; 4]))
    }

    fn basic() -> GraphicsPipelineDescriptor {
        GraphicsPipelineDescriptor {
            label: "basic".into(),
            stages: vec![
                stage(ShaderStageKind::Vertex),
                stage(ShaderStageKind::Fragment),
            ],
            render_pass: Some(RenderPassDescriptor::default()),
            ..Default::default()
        }
    }

    #[test]
    fn render_pass_is_required() {
        let device = device(None);
        let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
            render_pass: None,
            ..basic()
        });
        assert!(matches!(
            pipeline.create(),
            Err(Error::Configuration(ConfigurationError::MissingRenderPass { .. }))
        ));
    }

    #[test]
    fn fragment_stage_is_required() {
        let device = device(None);
        let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
            stages: vec![stage(ShaderStageKind::Vertex)],
            ..basic()
        });
        assert!(matches!(
            pipeline.create(),
            Err(Error::Configuration(ConfigurationError::MissingShaderStage {
                stage: ShaderStageKind::Fragment,
                ..
            }))
        ));
    }

    #[test]
    fn tessellation_stages_need_patches() {
        let device = device(None);
        let mut descriptor = basic();
        descriptor
            .stages
            .push(stage(ShaderStageKind::TessellationControl));
        let pipeline = device.new_graphics_pipeline(descriptor);
        assert!(matches!(
            pipeline.create(),
            Err(Error::Configuration(
                ConfigurationError::UnexpectedShaderStage { .. }
            ))
        ));
    }

    #[test]
    fn patch_control_points_are_bounded() {
        let device = device(None);
        let mut descriptor = basic();
        descriptor.topology = Topology::Patches { control_points: 33 };
        descriptor
            .stages
            .push(stage(ShaderStageKind::TessellationControl));
        descriptor
            .stages
            .push(stage(ShaderStageKind::TessellationEvaluation));
        let pipeline = device.new_graphics_pipeline(descriptor.clone());
        assert!(matches!(
            pipeline.create(),
            Err(Error::Configuration(
                ConfigurationError::InvalidPatchControlPoints { count: 33, max: 32, .. }
            ))
        ));
        descriptor.topology = Topology::Patches { control_points: 3 };
        device.new_graphics_pipeline(descriptor).create().unwrap();
    }

    #[test]
    fn depth_needs_an_attachment() {
        let device = device(None);
        let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
            depth_test: true,
            render_pass: Some(RenderPassDescriptor {
                depth: None,
                ..Default::default()
            }),
            ..basic()
        });
        assert!(matches!(
            pipeline.create(),
            Err(Error::Configuration(
                ConfigurationError::DepthWithoutAttachment { .. }
            ))
        ));
    }

    #[test]
    fn bindings_outlive_pipelines() {
        let device = device(None);
        let ubuf = device
            .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 64)
            .unwrap();
        ubuf.create().unwrap();
        let srb = device.new_shader_resource_bindings(vec![ShaderResourceBinding::uniform_buffer(
            0,
            StageFlags::VERTEX,
            &ubuf,
        )]);

        let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
            shader_resource_bindings: Some(srb.clone()),
            ..basic()
        });
        assert!(pipeline.create().unwrap_err().is_configuration());
        srb.create().unwrap();
        pipeline.create().unwrap();

        assert!(srb.release().unwrap_err().is_misuse());
        pipeline.release().unwrap();
        srb.release().unwrap();
    }

    #[test]
    fn binding_stages_must_exist_in_the_pipeline() {
        let device = device(None);
        let ubuf = device
            .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 64)
            .unwrap();
        ubuf.create().unwrap();
        let srb = device.new_shader_resource_bindings(vec![ShaderResourceBinding::uniform_buffer(
            0,
            StageFlags::TESSELLATION_EVALUATION,
            &ubuf,
        )]);
        srb.create().unwrap();
        let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
            shader_resource_bindings: Some(srb),
            ..basic()
        });
        assert!(matches!(
            pipeline.create(),
            Err(Error::Configuration(ConfigurationError::BindingStageMissing {
                stage: ShaderStageKind::TessellationEvaluation,
                ..
            }))
        ));
    }
}
