// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Backend seam.
//!
//! The core validates everything it can before calling through [`Backend`], so backends see
//! typed, already-checked requests keyed by [`ResourceId`].  Backend methods run while the
//! device lock is held and must not call back into handle methods that lock it.

use crate::command_buffer::RecordedPass;
use crate::device::{Feature, Limits};
use crate::error::Error;
use crate::resources::ResourceId;
use crate::resources::bindings::ShaderResourceBindings;
use crate::resources::buffer::Buffer;
use crate::resources::pipeline::GraphicsPipelineDescriptor;
use crate::resources::render_target::RenderTarget;

mod error;
pub(crate) mod software;
#[cfg(feature = "backend_wgpu")]
pub(crate) mod wgpu;

pub use error::BackendError;

#[cfg(not(target_arch = "wasm32"))]
pub trait BackendSend: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send> BackendSend for T {}

//on wasm, backend objects are bound to the thread that created them
#[cfg(target_arch = "wasm32")]
pub trait BackendSend {}
#[cfg(target_arch = "wasm32")]
impl<T> BackendSend for T {}

pub(crate) trait Backend: std::fmt::Debug + BackendSend {
    fn name(&self) -> &'static str;
    fn is_feature_supported(&self, feature: Feature) -> bool;
    fn limits(&self) -> Limits;

    fn create_buffer(&mut self, id: ResourceId, buffer: &Buffer) -> Result<(), Error>;
    fn create_bindings(
        &mut self,
        id: ResourceId,
        bindings: &ShaderResourceBindings,
    ) -> Result<(), Error>;
    fn create_pipeline(
        &mut self,
        id: ResourceId,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<(), Error>;
    fn create_render_target(&mut self, id: ResourceId, target: &RenderTarget)
    -> Result<(), Error>;
    /// Frees backend storage.  Unknown ids are ignored.
    fn destroy(&mut self, id: ResourceId);

    /// `offset..offset + data.len()` is in bounds.
    fn write_buffer(&mut self, id: ResourceId, offset: usize, data: &[u8]);
    /// `offset..offset + size` is in bounds.
    fn read_buffer(&mut self, id: ResourceId, offset: usize, size: usize) -> Vec<u8>;

    fn execute_pass(&mut self, pass: &RecordedPass) -> Result<(), Error>;
}
