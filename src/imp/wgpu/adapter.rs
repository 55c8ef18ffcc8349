// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::imp::BackendError;

pub(super) struct Acquired {
    pub(super) device: wgpu::Device,
    pub(super) queue: wgpu::Queue,
    pub(super) limits: wgpu::Limits,
    pub(super) base_vertex: bool,
}

/// Picks an adapter and opens a device on it.
pub(super) async fn acquire(debug_name: &str) -> Result<Acquired, BackendError> {
    let descriptor = wgpu::InstanceDescriptor::from_env_or_default();
    let instance = wgpu::Instance::new(&descriptor);
    let options = wgpu::RequestAdapterOptions {
        power_preference: Default::default(),
        force_fallback_adapter: false,
        compatible_surface: None,
    };
    let adapter = instance
        .request_adapter(&options)
        .await
        .map_err(|_| BackendError::NoSuchAdapter)?;
    let info = adapter.get_info();
    let adapter_name = info.name.clone();
    logwise::info_sync!(
        "selected adapter {adapter} ({backend})",
        adapter = adapter_name,
        backend = logwise::privacy::LogIt(info.backend)
    );

    //webgl2 defaults, raised to the adapter's texture sizes and alignments
    let limits = wgpu::Limits::downlevel_webgl2_defaults()
        .using_resolution(adapter.limits())
        .using_alignment(adapter.limits());

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(debug_name),
            required_features: Default::default(),
            required_limits: limits.clone(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        })
        .await?;
    device.on_uncaptured_error(Box::new(|e| {
        let message = e.to_string();
        logwise::error_sync!("wgpu: {message}", message = message);
    }));
    let base_vertex = adapter
        .get_downlevel_capabilities()
        .flags
        .contains(wgpu::DownlevelFlags::BASE_VERTEX);
    Ok(Acquired {
        device,
        queue,
        limits,
        base_vertex,
    })
}
