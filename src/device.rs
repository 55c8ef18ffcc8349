// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The graphics device.
//!
//! A [`Device`] creates resources, hands out update batches and command buffers, and answers
//! feature queries.  Cloning a device is cheap; every clone refers to the same context.
//!
//! All device state lives in one lock-guarded context.  Each entry point acquires it for the
//! duration of the call only, and never while running caller code or dropping handles.

mod config;
mod features;
pub(crate) mod registry;

pub use config::{BackendKind, DeviceConfig};
pub use features::{Feature, Limits};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wasm_safe_mutex::{Guard, Mutex};

use crate::command_buffer::CommandBuffer;
use crate::error::{ConfigurationError, Error, MisuseError};
use crate::imp::Backend;
use crate::resources::bindings::{ShaderResourceBinding, ShaderResourceBindings};
use crate::resources::buffer::{Buffer, BufferKind, BufferUsage};
use crate::resources::pipeline::{GraphicsPipeline, GraphicsPipelineDescriptor};
use crate::resources::render_target::{PixelSize, RenderPassDescriptor, RenderTarget};
use crate::resources::{ResourceCore, ResourceId};
use crate::update_batch::{BufferOp, ResourceUpdateBatch};
use registry::{Registry, ResourceState};

/// Counters describing the work a device has performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatistics {
    pub passes_executed: u64,
    pub draw_calls: u64,
    /// Vertices (or indices) submitted across all draws, times their instance counts.
    pub vertices_submitted: u64,
    pub batches_applied: u64,
    pub bytes_uploaded: u64,
    pub bytes_read_back: u64,
    /// Resources that are constructed or created and not yet released.
    pub live_resources: usize,
}

#[derive(Debug)]
pub(crate) struct DeviceState {
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) registry: Registry,
    pub(crate) statistics: DeviceStatistics,
}

impl DeviceState {
    /// Runs the backend half of `create()` for a resource and records the result.
    pub(crate) fn create_resource<F>(
        &mut self,
        core: &ResourceCore,
        depends_on: Vec<ResourceId>,
        create: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut dyn Backend) -> Result<(), Error>,
    {
        match self.registry.state(core.id) {
            ResourceState::Released => {
                return Err(MisuseError::ResourceReleased {
                    label: core.label.clone(),
                }
                .logged());
            }
            ResourceState::Created => {
                let label = core.label.clone();
                logwise::warn_sync!("recreating {label}", label = label);
                self.backend.destroy(core.id);
                self.registry.uncreate(core.id);
            }
            ResourceState::Constructed => {}
        }
        create(self.backend.as_mut())?;
        self.registry.mark_created(core.id, depends_on);
        Ok(())
    }

    /// Checks that a resource referenced during `create()` of `owner` is usable.
    pub(crate) fn require_dependency(
        &self,
        owner: &str,
        dependency: &ResourceCore,
    ) -> Result<(), ConfigurationError> {
        match self.registry.state(dependency.id) {
            ResourceState::Created => Ok(()),
            ResourceState::Constructed => Err(ConfigurationError::ResourceNotCreated {
                label: owner.to_string(),
                resource: dependency.label.clone(),
            }),
            ResourceState::Released => Err(ConfigurationError::ResourceReleased {
                label: owner.to_string(),
                resource: dependency.label.clone(),
            }),
        }
    }
}

#[derive(Debug)]
pub(crate) struct DeviceShared {
    debug_name: &'static str,
    backend_name: &'static str,
    features: Vec<Feature>,
    limits: Limits,
    max_pooled_batches: usize,
    state: Mutex<DeviceState>,
    /// Ids whose last handle was dropped, waiting to be forgotten.
    dropped: Mutex<Vec<ResourceId>>,
    batch_pool: Mutex<Vec<Vec<BufferOp>>>,
    outstanding_batches: AtomicUsize,
}

impl DeviceShared {
    /// Acquires the device context, first retiring resources whose handles were dropped.
    pub(crate) fn lock(&self) -> Guard<'_, DeviceState> {
        let dropped = std::mem::take(&mut *self.dropped.lock_sync());
        let mut state = self.state.lock_sync();
        for id in dropped {
            if state.registry.forget(id) {
                state.backend.destroy(id);
            }
        }
        state
    }

    pub(crate) fn defer_drop(&self, id: ResourceId) {
        self.dropped.lock_sync().push(id);
    }

    pub(crate) fn is_feature_supported(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub(crate) fn require_feature(&self, feature: Feature) -> Result<(), Error> {
        if self.is_feature_supported(feature) {
            Ok(())
        } else {
            let backend = self.backend_name;
            logwise::error_sync!(
                "{feature} requested from the {backend} backend, which does not support it",
                feature = logwise::privacy::LogIt(feature),
                backend = backend
            );
            Err(Error::UnsupportedFeature {
                feature,
                backend: self.backend_name,
            })
        }
    }

    pub(crate) fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn take_pooled_ops(&self) -> Vec<BufferOp> {
        let outstanding = self.outstanding_batches.fetch_add(1, Ordering::Relaxed) + 1;
        if outstanding > self.max_pooled_batches {
            logwise::warn_sync!(
                "{outstanding} resource update batches are outstanding; are batches being leaked?",
                outstanding = outstanding
            );
        }
        self.batch_pool.lock_sync().pop().unwrap_or_default()
    }

    pub(crate) fn return_pooled_ops(&self, mut ops: Vec<BufferOp>) {
        self.outstanding_batches.fetch_sub(1, Ordering::Relaxed);
        //clear before locking; dropping ops may drop handles
        ops.clear();
        let mut pool = self.batch_pool.lock_sync();
        if pool.len() < self.max_pooled_batches {
            pool.push(ops);
        }
    }
}

/**
A graphics device.

```
use batches_and_passes::device::{Device, DeviceConfig, Feature};
# test_executors::sleep_on(async {
let device = Device::new(DeviceConfig::default()).await.unwrap();
assert_eq!(device.backend_name(), "software");
assert!(device.is_feature_supported(Feature::Tessellation));
# });
```
*/
#[derive(Debug, Clone)]
pub struct Device {
    pub(crate) shared: Arc<DeviceShared>,
}

impl Device {
    /// Brings up a device on the configured backend.
    pub async fn new(config: DeviceConfig) -> Result<Device, Error> {
        let backend: Box<dyn Backend> = match config.backend {
            BackendKind::Software => Box::new(crate::imp::software::SoftwareBackend::new(
                config.software_features.clone(),
                config.software_limits,
            )),
            #[cfg(feature = "backend_wgpu")]
            BackendKind::Wgpu => Box::new(crate::imp::wgpu::WgpuBackend::new(config.debug_name).await?),
        };
        let features = Feature::ALL
            .into_iter()
            .filter(|f| backend.is_feature_supported(*f))
            .collect::<Vec<_>>();
        let backend_name = backend.name();
        let limits = backend.limits();
        let debug_name = config.debug_name;
        logwise::info_sync!(
            "created {debug_name} on the {backend_name} backend with {features}",
            debug_name = debug_name,
            backend_name = backend_name,
            features = logwise::privacy::LogIt(&features)
        );
        Ok(Device {
            shared: Arc::new(DeviceShared {
                debug_name: config.debug_name,
                backend_name,
                features,
                limits,
                max_pooled_batches: config.max_pooled_batches,
                state: Mutex::new(DeviceState {
                    backend,
                    registry: Registry::default(),
                    statistics: DeviceStatistics::default(),
                }),
                dropped: Mutex::new(Vec::new()),
                batch_pool: Mutex::new(Vec::new()),
                outstanding_batches: AtomicUsize::new(0),
            }),
        })
    }

    pub fn debug_name(&self) -> &'static str {
        self.shared.debug_name
    }

    pub fn backend_name(&self) -> &'static str {
        self.shared.backend_name
    }

    /// Whether an optional capability may be used on this device.
    pub fn is_feature_supported(&self, feature: Feature) -> bool {
        self.shared.is_feature_supported(feature)
    }

    pub fn limits(&self) -> Limits {
        self.shared.limits
    }

    pub fn statistics(&self) -> DeviceStatistics {
        let state = self.shared.lock();
        DeviceStatistics {
            live_resources: state.registry.live(),
            ..state.statistics
        }
    }

    /**
    Constructs a buffer.

    Fails with a [`ConfigurationError`] when `size` is zero, or when a uniform buffer is not
    [`BufferUsage::Dynamic`] and the device lacks [`Feature::NonDynamicUniformBuffers`].
    The buffer has no storage until [`Buffer::create`] succeeds.
    */
    pub fn new_buffer(
        &self,
        usage: BufferUsage,
        kind: BufferKind,
        size: usize,
    ) -> Result<Buffer, Error> {
        Buffer::new(self, None, usage, kind, size)
    }

    /// Like [`Self::new_buffer`], with a label used in logs and errors.
    pub fn new_labeled_buffer(
        &self,
        label: &str,
        usage: BufferUsage,
        kind: BufferKind,
        size: usize,
    ) -> Result<Buffer, Error> {
        Buffer::new(self, Some(label), usage, kind, size)
    }

    pub fn new_shader_resource_bindings(
        &self,
        bindings: Vec<ShaderResourceBinding>,
    ) -> ShaderResourceBindings {
        ShaderResourceBindings::new(self, None, bindings)
    }

    pub fn new_labeled_shader_resource_bindings(
        &self,
        label: &str,
        bindings: Vec<ShaderResourceBinding>,
    ) -> ShaderResourceBindings {
        ShaderResourceBindings::new(self, Some(label), bindings)
    }

    pub fn new_graphics_pipeline(&self, descriptor: GraphicsPipelineDescriptor) -> GraphicsPipeline {
        GraphicsPipeline::new(self, descriptor)
    }

    pub fn new_render_target(
        &self,
        size: PixelSize,
        render_pass: RenderPassDescriptor,
    ) -> RenderTarget {
        RenderTarget::new(self, None, size, render_pass)
    }

    pub fn new_labeled_render_target(
        &self,
        label: &str,
        size: PixelSize,
        render_pass: RenderPassDescriptor,
    ) -> RenderTarget {
        RenderTarget::new(self, Some(label), size, render_pass)
    }

    /// Returns an empty batch, reusing pooled storage when available.
    pub fn next_resource_update_batch(&self) -> ResourceUpdateBatch {
        ResourceUpdateBatch::new(self.shared.clone(), self.shared.take_pooled_ops())
    }

    pub fn new_command_buffer(&self) -> CommandBuffer {
        CommandBuffer::new(self.clone())
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_features_are_configurable() {
        let config = DeviceConfig {
            software_features: Some(vec![Feature::Instancing]),
            ..Default::default()
        };
        let device = test_executors::sleep_on(Device::new(config)).unwrap();
        assert!(device.is_feature_supported(Feature::Instancing));
        assert!(!device.is_feature_supported(Feature::Tessellation));
        let err = device.shared.require_feature(Feature::Tessellation).unwrap_err();
        assert!(err.is_unsupported_feature());
    }

    #[test]
    fn dropped_handles_are_forgotten() {
        let device = test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap();
        let buffer = device
            .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 16)
            .unwrap();
        buffer.create().unwrap();
        assert_eq!(device.statistics().live_resources, 1);
        drop(buffer);
        assert_eq!(device.statistics().live_resources, 0);
    }

    #[test]
    fn batch_storage_is_pooled() {
        let device = test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap();
        let batch = device.next_resource_update_batch();
        assert_eq!(device.shared.outstanding_batches.load(Ordering::Relaxed), 1);
        drop(batch);
        assert_eq!(device.shared.outstanding_batches.load(Ordering::Relaxed), 0);
        assert_eq!(device.shared.batch_pool.lock_sync().len(), 1);
    }
}
