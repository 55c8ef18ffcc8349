// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

/// Failure to bring up a backend.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackendError {
    #[error("No such adapter")]
    NoSuchAdapter,
    #[cfg(feature = "backend_wgpu")]
    #[error("{0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}
