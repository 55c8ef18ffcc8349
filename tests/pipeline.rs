// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pipeline creation against device features.
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use batches_and_passes::Error;
use batches_and_passes::device::{Device, DeviceConfig, Feature};
use batches_and_passes::error::ConfigurationError;
use batches_and_passes::resources::bindings::{ShaderResourceBinding, StageFlags};
use batches_and_passes::resources::buffer::{BufferKind, BufferUsage};
use batches_and_passes::resources::pipeline::{GraphicsPipelineDescriptor, Topology};
use batches_and_passes::resources::render_target::RenderPassDescriptor;
use batches_and_passes::shader::{Shader, ShaderStage, ShaderStageKind};
use batches_and_passes::vertex_layout::{VertexFormat, VertexInputLayout};

fn device(features: Option<Vec<Feature>>) -> Device {
    test_executors::sleep_on(Device::new(DeviceConfig {
        software_features: features,
        ..Default::default()
    }))
    .unwrap()
}

fn stage(kind: ShaderStageKind) -> ShaderStage {
    ShaderStage::new(kind, Shader::bytecode(&format!("{kind:?}"), vec![0, 1, 2, 3]))
}

fn patches(stages: &[ShaderStageKind]) -> GraphicsPipelineDescriptor {
    GraphicsPipelineDescriptor {
        label: "patches".to_string(),
        topology: Topology::Patches { control_points: 3 },
        stages: stages.iter().map(|k| stage(*k)).collect(),
        render_pass: Some(RenderPassDescriptor::default()),
        ..Default::default()
    }
}

const ALL_STAGES: [ShaderStageKind; 4] = [
    ShaderStageKind::Vertex,
    ShaderStageKind::TessellationControl,
    ShaderStageKind::TessellationEvaluation,
    ShaderStageKind::Fragment,
];

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn patches_fail_without_tessellation() {
    let device = device(Some(vec![
        Feature::NonDynamicUniformBuffers,
        Feature::Instancing,
    ]));
    assert!(!device.is_feature_supported(Feature::Tessellation));
    let pipeline = device.new_graphics_pipeline(patches(&ALL_STAGES));
    let err = pipeline.create().unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedFeature {
            feature: Feature::Tessellation,
            ..
        }
    ));
    assert!(!pipeline.is_created());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn patches_succeed_with_tessellation() {
    let device = device(None);
    let pipeline = device.new_graphics_pipeline(patches(&ALL_STAGES));
    pipeline.create().unwrap();
    assert!(pipeline.is_created());
    assert_eq!(
        pipeline.topology(),
        Topology::Patches { control_points: 3 }
    );
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn patches_need_both_tessellation_stages() {
    let device = device(None);
    let pipeline = device.new_graphics_pipeline(patches(&[
        ShaderStageKind::Vertex,
        ShaderStageKind::TessellationControl,
        ShaderStageKind::Fragment,
    ]));
    assert!(matches!(
        pipeline.create(),
        Err(Error::Configuration(ConfigurationError::MissingShaderStage {
            stage: ShaderStageKind::TessellationEvaluation,
            ..
        }))
    ));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn control_points_are_limited() {
    let device = device(None);
    let mut descriptor = patches(&ALL_STAGES);
    descriptor.topology = Topology::Patches { control_points: 0 };
    let pipeline = device.new_graphics_pipeline(descriptor);
    assert!(matches!(
        pipeline.create(),
        Err(Error::Configuration(
            ConfigurationError::InvalidPatchControlPoints { count: 0, .. }
        ))
    ));
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn bindings_must_be_visible_to_a_pipeline_stage() {
    let device = device(None);
    let uniforms = device
        .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 72)
        .unwrap();
    uniforms.create().unwrap();
    let bindings = device.new_shader_resource_bindings(vec![ShaderResourceBinding::uniform_buffer(
        0,
        StageFlags::TESSELLATION_EVALUATION,
        &uniforms,
    )]);
    bindings.create().unwrap();

    let triangles = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
        stages: vec![
            stage(ShaderStageKind::Vertex),
            stage(ShaderStageKind::Fragment),
        ],
        shader_resource_bindings: Some(bindings.clone()),
        render_pass: Some(RenderPassDescriptor::default()),
        ..Default::default()
    });
    assert!(matches!(
        triangles.create(),
        Err(Error::Configuration(ConfigurationError::BindingStageMissing { slot: 0, .. }))
    ));

    let mut descriptor = patches(&ALL_STAGES);
    descriptor.shader_resource_bindings = Some(bindings.clone());
    let tessellated = device.new_graphics_pipeline(descriptor);
    tessellated.create().unwrap();

    //the pipeline holds the bindings
    assert!(bindings.release().unwrap_err().is_misuse());
    tessellated.release().unwrap();
    bindings.release().unwrap();
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn pipelines_need_a_render_pass() {
    let device = device(None);
    let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
        stages: vec![
            stage(ShaderStageKind::Vertex),
            stage(ShaderStageKind::Fragment),
        ],
        ..Default::default()
    });
    assert!(pipeline.create().unwrap_err().is_configuration());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn attribute_offset_past_u32_is_rejected() {
    let device = device(None);
    let mut vertex_input = VertexInputLayout::new();
    let binding = vertex_input.add_binding(24);
    vertex_input.add_attribute(binding, 0, VertexFormat::Float3, u32::MAX);
    let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
        vertex_input,
        ..patches(&ALL_STAGES)
    });
    assert!(matches!(
        pipeline.create(),
        Err(Error::Configuration(
            ConfigurationError::AttributeExceedsStride { .. }
        ))
    ));
    assert!(!pipeline.is_created());
}
