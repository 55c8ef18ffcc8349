// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! batches_and_passes is a small immediate-mode GPU pipeline layer.

Where a scene-based engine hands you nodes and materials, and a low-level API hands you queues,
fences and command pools, batches_and_passes sits in between.  It exposes the handful of
concepts you need to put a tessellated triangle on screen and keep it animated:

| Concept                   | Type                                                   | Lifetime                          |
|---------------------------|--------------------------------------------------------|-----------------------------------|
| Device                    | [`device::Device`]                                     | Application                       |
| Buffer                    | [`resources::buffer::Buffer`]                          | Until released                    |
| Shader resource bindings  | [`resources::bindings::ShaderResourceBindings`]        | Until released, outlives pipelines|
| Graphics pipeline         | [`resources::pipeline::GraphicsPipeline`]              | Until released, immutable         |
| Resource update batch     | [`update_batch::ResourceUpdateBatch`]                  | Single use                        |
| Command buffer            | [`command_buffer::CommandBuffer`]                      | One frame                         |

# Two-phase resources

Every resource is first *constructed*, which records its configuration, and then *created*,
which validates that configuration against the device and allocates backend storage.

```
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::resources::buffer::{BufferKind, BufferUsage};
use batches_and_passes::resources::Resource;
# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
let buffer = device.new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 72).unwrap();
assert!(!buffer.is_created());
buffer.create().unwrap();
assert!(buffer.is_created());
# });
```

# Update batches

Writes are never applied directly.  They are staged into a [`update_batch::ResourceUpdateBatch`],
which is consumed exactly once, normally when a pass begins.

```
# use batches_and_passes::device::{Device, DeviceConfig};
# use batches_and_passes::resources::buffer::{BufferKind, BufferUsage};
# use batches_and_passes::resources::Resource;
# test_executors::sleep_on(async {
# let device = Device::new(DeviceConfig::default()).await.unwrap();
let buffer = device.new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 72).unwrap();
buffer.create().unwrap();

let mut batch = device.next_resource_update_batch();
batch.update_dynamic_buffer(&buffer, 68, &0.5f32.to_ne_bytes()).unwrap();
let readback = batch.read_back_buffer(&buffer, 68, 4).unwrap();

let mut cb = device.new_command_buffer();
cb.resource_update(batch).unwrap();
assert_eq!(readback.data().unwrap(), 0.5f32.to_ne_bytes());
# });
```

# Frames

A [`port::Port`] owns a render target and calls a [`port::RenderClient`] once per frame.
[`scenes::TessellationScene`] is a complete client: it uploads its mesh once, re-uploads its
projection only when the target is resized, and animates a time uniform every frame.

# Backends

A software backend is always available.  It keeps buffer contents in host memory, validates
every recorded pass (including vertex and index fetch bounds) and is what the test suite runs
against.  With the `backend_wgpu` feature, the same API drives [wgpu](https://wgpu.rs) and
so inherits its support for DX12, Vulkan, Metal, WebGPU and WebGL.

wgpu does not expose tessellation.  Check [`device::Device::is_feature_supported`] before
building a patch pipeline.
*/

logwise::declare_logging_domain!();

pub mod command_buffer;
pub mod device;
pub mod error;
pub mod port;
pub mod projection;
pub mod resources;
pub mod scenes;
pub mod shader;
pub mod update_batch;
pub mod vertex_layout;
mod bittricks;
mod imp;
mod sys;

pub use error::Error;
pub use vectormatrix;
