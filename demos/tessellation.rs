// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Tessellated triangle demo for batches_and_passes.
//!
//! Drives [`TessellationScene`] through a [`Port`] for a number of frames, then prints what
//! the device did and the final contents of the scene's uniform block.
//!
//! Shaders are loaded from `demos/shaders`.  The software backend treats them as opaque
//! bytecode, so the demo runs anywhere.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --example tessellation
//! # render more frames, at another size
//! cargo run --example tessellation -- 600 1920 1080
//! ```
//!
//! With `BATCHES_AND_PASSES_BACKEND=wgpu` the demo asks wgpu for a device instead; wgpu has
//! no tessellation, so it reports the missing feature and exits.

use batches_and_passes::Error;
use batches_and_passes::device::{BackendKind, Device, DeviceConfig};
use batches_and_passes::port::{Port, PortConfig};
use batches_and_passes::resources::render_target::PixelSize;
use batches_and_passes::scenes::TessellationScene;
use batches_and_passes::shader::DirectoryShaderLoader;

fn backend() -> BackendKind {
    match std::env::var("BATCHES_AND_PASSES_BACKEND").as_deref() {
        #[cfg(feature = "backend_wgpu")]
        Ok("wgpu") => BackendKind::Wgpu,
        _ => BackendKind::Software,
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let frames: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(120);
    let width: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(1280);
    let height: u32 = args.next().and_then(|a| a.parse().ok()).unwrap_or(720);

    let device = test_executors::sleep_on(Device::new(DeviceConfig {
        backend: backend(),
        debug_name: "tessellation demo",
        ..Default::default()
    }))
    .expect("no device");
    println!("running on the {} backend", device.backend_name());

    let loader = DirectoryShaderLoader::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/shaders"));
    let scene = TessellationScene::from_loader(&loader).expect("shaders");
    let config = PortConfig {
        size: PixelSize::new(width, height),
        debug_name: "tessellation demo",
        ..Default::default()
    };
    let mut port = Port::new(&device, config, scene).expect("port");

    for _ in 0..frames {
        match port.render_frame() {
            Ok(()) => {}
            Err(Error::UnsupportedFeature { feature, backend }) => {
                println!("{feature:?} is not available on {backend}; nothing to draw");
                port.release().expect("release");
                return;
            }
            Err(e) => panic!("frame failed: {e}"),
        }
    }

    let reporter = port.reporter();
    println!(
        "{} frames at {}x{}, {} fps, {} ms cpu",
        port.frames(),
        reporter.drawable_size().width,
        reporter.drawable_size().height,
        reporter.fps(),
        reporter.cpu_ms()
    );

    let buffer = port
        .client()
        .uniform_buffer()
        .expect("scene initialized")
        .clone();
    let mut batch = device.next_resource_update_batch();
    let readback = batch
        .read_back_buffer(&buffer, 0, TessellationScene::UNIFORM_SIZE)
        .expect("read back");
    device
        .new_command_buffer()
        .resource_update(batch)
        .expect("apply");
    let block = readback.take().expect("read back ready");
    let float_at = |offset: usize| {
        let mut raw = [0; 4];
        raw.copy_from_slice(&block[offset..offset + 4]);
        f32::from_ne_bytes(raw)
    };
    println!(
        "time {:.2}, amplitude {:.2}",
        float_at(TessellationScene::TIME_OFFSET),
        float_at(TessellationScene::AMPLITUDE_OFFSET)
    );
    println!("{:?}", device.statistics());

    port.release().expect("release");
}
