// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::{Feature, Limits};

/// Selects the backend a [`super::Device`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum BackendKind {
    /// Host-memory backend with a configurable feature set.  Always available.
    #[default]
    Software,
    /// GPU backend built on wgpu.
    #[cfg(feature = "backend_wgpu")]
    Wgpu,
}

/**
Configuration for [`super::Device::new`].

```
use batches_and_passes::device::{DeviceConfig, Feature};
let config = DeviceConfig {
    debug_name: "no tessellation",
    software_features: Some(vec![Feature::Instancing, Feature::IndexUInt32]),
    ..Default::default()
};
assert_eq!(config.max_pooled_batches, 64);
```
*/
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub backend: BackendKind,
    /// Appears in logs and backend debug labels.
    pub debug_name: &'static str,
    /// Features the software backend reports.  `None` reports every [`Feature`].
    ///
    /// Ignored by other backends, which report what the hardware supports.
    pub software_features: Option<Vec<Feature>>,
    /// Limits the software backend reports.
    pub software_limits: Limits,
    /// Cleared batch storage the device keeps for reuse.  Having more batches than this
    /// outstanding at once is legal but logs a warning.
    pub max_pooled_batches: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            backend: BackendKind::default(),
            debug_name: "batches_and_passes device",
            software_features: None,
            software_limits: Limits::default(),
            max_pooled_batches: 64,
        }
    }
}
