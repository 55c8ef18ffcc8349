// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Releasing resources, singly and through a [`ReleasePool`].
#[cfg(target_arch = "wasm32")]
wasm_bindgen_test::wasm_bindgen_test_configure!(run_in_browser);

use batches_and_passes::Error;
use batches_and_passes::device::{Device, DeviceConfig};
use batches_and_passes::error::MisuseError;
use batches_and_passes::resources::ReleasePool;
use batches_and_passes::resources::bindings::{ShaderResourceBinding, StageFlags};
use batches_and_passes::resources::buffer::{BufferKind, BufferUsage};

fn device() -> Device {
    test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap()
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn double_pool_release_is_misuse() {
    let device = device();
    let mut pool = ReleasePool::new();
    let uniforms = device
        .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 72)
        .unwrap();
    uniforms.create().unwrap();
    pool.push(uniforms.clone()).unwrap();
    let bindings = device.new_shader_resource_bindings(vec![ShaderResourceBinding::uniform_buffer(
        0,
        StageFlags::VERTEX,
        &uniforms,
    )]);
    bindings.create().unwrap();
    pool.push(bindings.clone()).unwrap();
    assert_eq!(device.statistics().live_resources, 2);

    //newest first, so the bindings go before the buffer they reference
    pool.release_all().unwrap();
    assert!(uniforms.is_released());
    assert!(bindings.is_released());
    assert_eq!(device.statistics().live_resources, 0);

    assert!(matches!(
        pool.release_all(),
        Err(Error::Misuse(MisuseError::PoolAlreadyReleased))
    ));
    assert!(pool.push(uniforms.clone()).unwrap_err().is_misuse());
    assert_eq!(device.statistics().live_resources, 0);
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn double_release_of_a_resource_is_misuse() {
    let device = device();
    let buffer = device
        .new_buffer(BufferUsage::Immutable, BufferKind::Vertex, 24)
        .unwrap();
    buffer.create().unwrap();
    buffer.release().unwrap();
    assert!(matches!(
        buffer.release(),
        Err(Error::Misuse(MisuseError::AlreadyReleased { .. }))
    ));
    //released resources cannot be used or recreated
    let mut batch = device.next_resource_update_batch();
    assert!(batch.upload_static_buffer(&buffer, &[0; 24]).is_err());
    assert!(buffer.create().is_err());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn pool_skips_resources_released_directly() {
    let device = device();
    let mut pool = ReleasePool::new();
    let a = device
        .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 16)
        .unwrap();
    a.create().unwrap();
    let b = device
        .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 16)
        .unwrap();
    b.create().unwrap();
    pool.push(a.clone()).unwrap();
    pool.push(b.clone()).unwrap();
    a.release().unwrap();
    pool.release_all().unwrap();
    assert!(b.is_released());
    assert!(pool.is_released());
    assert!(pool.is_empty());
}

#[test]
#[cfg_attr(target_arch = "wasm32", wasm_bindgen_test::wasm_bindgen_test)]
fn referenced_resources_stay_alive() {
    let device = device();
    let uniforms = device
        .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 16)
        .unwrap();
    uniforms.create().unwrap();
    let bindings = device.new_shader_resource_bindings(vec![ShaderResourceBinding::uniform_buffer(
        0,
        StageFlags::FRAGMENT,
        &uniforms,
    )]);
    bindings.create().unwrap();
    assert!(matches!(
        uniforms.release(),
        Err(Error::Misuse(MisuseError::ResourceInUse { dependents: 1, .. }))
    ));
    assert!(uniforms.is_created());
    bindings.release().unwrap();
    uniforms.release().unwrap();
}
