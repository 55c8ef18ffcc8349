// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The command buffer's Idle/Recording state machine and draw validation.
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use batches_and_passes::Error;
use batches_and_passes::command_buffer::{
    ClearColor, DepthStencilClear, IndexFormat, VertexInput, Viewport,
};
use batches_and_passes::device::{Device, DeviceConfig, Feature};
use batches_and_passes::error::MisuseError;
use batches_and_passes::resources::buffer::{Buffer, BufferKind, BufferUsage};
use batches_and_passes::resources::pipeline::{GraphicsPipeline, GraphicsPipelineDescriptor};
use batches_and_passes::resources::render_target::{PixelSize, RenderPassDescriptor, RenderTarget};
use batches_and_passes::shader::{Shader, ShaderStage, ShaderStageKind};
use batches_and_passes::vertex_layout::{VertexFormat, VertexInputLayout};

fn device(features: Option<Vec<Feature>>) -> Device {
    test_executors::sleep_on(Device::new(DeviceConfig {
        software_features: features,
        ..Default::default()
    }))
    .unwrap()
}

fn target(device: &Device) -> RenderTarget {
    let target = device.new_render_target(PixelSize::new(64, 64), RenderPassDescriptor::default());
    target.create().unwrap();
    target
}

/// A pipeline reading one Float3 per vertex from binding 0.
fn pipeline(device: &Device) -> GraphicsPipeline {
    let mut layout = VertexInputLayout::new();
    let binding = layout.add_binding(12);
    layout.add_attribute(binding, 0, VertexFormat::Float3, 0);
    let pipeline = device.new_graphics_pipeline(GraphicsPipelineDescriptor {
        label: "positions".to_string(),
        stages: vec![
            ShaderStage::new(ShaderStageKind::Vertex, Shader::bytecode("p.vert", vec![1])),
            ShaderStage::new(ShaderStageKind::Fragment, Shader::bytecode("p.frag", vec![2])),
        ],
        vertex_input: layout,
        render_pass: Some(RenderPassDescriptor::default()),
        ..Default::default()
    });
    pipeline.create().unwrap();
    pipeline
}

fn vertices(device: &Device, count: usize) -> Buffer {
    let buffer = device
        .new_buffer(BufferUsage::Immutable, BufferKind::Vertex, count * 12)
        .unwrap();
    buffer.create().unwrap();
    let mut batch = device.next_resource_update_batch();
    batch
        .upload_static_buffer(&buffer, &vec![0; count * 12])
        .unwrap();
    device.new_command_buffer().resource_update(batch).unwrap();
    buffer
}

fn begin(device: &Device, target: &RenderTarget) -> batches_and_passes::command_buffer::CommandBuffer {
    let mut cb = device.new_command_buffer();
    cb.begin_pass(target, ClearColor::BLACK, DepthStencilClear::default(), None)
        .unwrap();
    cb
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn double_begin_is_misuse() {
    let device = device(None);
    let target = target(&device);
    let mut cb = begin(&device, &target);
    let err = cb
        .begin_pass(&target, ClearColor::BLACK, DepthStencilClear::default(), None)
        .unwrap_err();
    assert!(matches!(err, Error::Misuse(MisuseError::AlreadyRecording)));
    //the first pass is still open
    assert!(cb.is_recording());
    cb.end_pass().unwrap();
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn end_without_begin_is_misuse() {
    let device = device(None);
    let mut cb = device.new_command_buffer();
    assert!(matches!(
        cb.end_pass(),
        Err(Error::Misuse(MisuseError::NotRecording { operation: "end_pass" }))
    ));
    let target = target(&device);
    cb.begin_pass(&target, ClearColor::WHITE, DepthStencilClear::default(), None)
        .unwrap();
    cb.end_pass().unwrap();
    assert!(cb.end_pass().unwrap_err().is_misuse());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn draw_requires_bound_state() {
    let device = device(None);
    let target = target(&device);
    let pipeline = pipeline(&device);
    let buffer = vertices(&device, 3);
    let mut cb = begin(&device, &target);

    assert!(matches!(
        cb.draw(3),
        Err(Error::Misuse(MisuseError::NoPipelineBound))
    ));
    cb.set_graphics_pipeline(&pipeline).unwrap();
    assert!(matches!(
        cb.draw(3),
        Err(Error::Misuse(MisuseError::MissingVertexInput { binding: 0 }))
    ));
    cb.set_viewport(Viewport::full(target.pixel_size())).unwrap();
    cb.set_vertex_input(0, &[VertexInput::new(&buffer)]).unwrap();
    cb.draw(3).unwrap();
    cb.end_pass().unwrap();

    let statistics = device.statistics();
    assert_eq!(statistics.passes_executed, 1);
    assert_eq!(statistics.draw_calls, 1);
    assert_eq!(statistics.vertices_submitted, 3);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn vertex_fetch_past_the_buffer_fails_the_pass() {
    let device = device(None);
    let target = target(&device);
    let pipeline = pipeline(&device);
    let buffer = vertices(&device, 2);
    let mut cb = begin(&device, &target);
    cb.set_graphics_pipeline(&pipeline).unwrap();
    cb.set_vertex_input(0, &[VertexInput::new(&buffer)]).unwrap();
    cb.draw(3).unwrap();
    assert!(matches!(
        cb.end_pass(),
        Err(Error::Misuse(MisuseError::VertexFetchOutOfBounds {
            binding: 0,
            needed: 36,
            available: 24,
            ..
        }))
    ));
    assert!(!cb.is_recording());
    assert_eq!(device.statistics().passes_executed, 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn updates_are_rejected_inside_a_pass() {
    let device = device(None);
    let target = target(&device);
    let mut cb = begin(&device, &target);
    let batch = device.next_resource_update_batch();
    assert!(matches!(
        cb.resource_update(batch),
        Err(Error::Misuse(MisuseError::PassInProgress))
    ));
    cb.end_pass().unwrap();
    cb.resource_update(device.next_resource_update_batch())
        .unwrap();
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn optional_draw_features_are_checked() {
    let device = device(Some(vec![Feature::NonDynamicUniformBuffers]));
    let target = target(&device);
    let pipeline = pipeline(&device);
    let buffer = vertices(&device, 3);
    let index = device
        .new_buffer(BufferUsage::Static, BufferKind::Index, 12)
        .unwrap();
    index.create().unwrap();

    let mut cb = begin(&device, &target);
    cb.set_graphics_pipeline(&pipeline).unwrap();
    cb.set_vertex_input(0, &[VertexInput::new(&buffer)]).unwrap();
    assert!(
        cb.draw_instanced(3, 2, 0, 0)
            .unwrap_err()
            .is_unsupported_feature()
    );
    assert!(
        cb.set_index_buffer(&index, 0, IndexFormat::UInt32)
            .unwrap_err()
            .is_unsupported_feature()
    );
    cb.set_index_buffer(&index, 0, IndexFormat::UInt16).unwrap();
    assert!(
        cb.draw_indexed(3, 1, 0, 1, 0)
            .unwrap_err()
            .is_unsupported_feature()
    );
    cb.draw_indexed(3, 1, 0, 0, 0).unwrap();
    cb.end_pass().unwrap();
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn pipelines_need_a_matching_pass() {
    let device = device(None);
    let pipeline = pipeline(&device);
    let other = device.new_render_target(
        PixelSize::new(16, 16),
        RenderPassDescriptor {
            depth: None,
            ..Default::default()
        },
    );
    other.create().unwrap();
    let mut cb = begin(&device, &other);
    assert!(matches!(
        cb.set_graphics_pipeline(&pipeline),
        Err(Error::Misuse(MisuseError::IncompatibleRenderPass { .. }))
    ));
    cb.end_pass().unwrap();
}
