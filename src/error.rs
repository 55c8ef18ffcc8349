// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error taxonomy.
//!
//! Three families of failure exist at this layer:
//!
//! * [`ConfigurationError`]: a resource was constructed with parameters that cannot be
//!   created.  Surfaced by `create()` (or by the constructor, for buffers).
//! * [`Error::UnsupportedFeature`]: the device lacks a capability the request relies on.
//!   Callers are expected to consult [`crate::device::Device::is_feature_supported`] first.
//! * [`MisuseError`]: a state-machine violation such as drawing without a pipeline.
//!
//! None of these are transient.  Retrying the same call produces the same error.

use crate::device::Feature;
use crate::resources::buffer::{BufferKind, BufferUsage};
use crate::shader::{ShaderLoadError, ShaderStageKind};

pub use crate::imp::BackendError;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("{feature:?} is not supported by the {backend} backend")]
    UnsupportedFeature {
        feature: Feature,
        backend: &'static str,
    },
    #[error("misuse: {0}")]
    Misuse(#[from] MisuseError),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("shader load error: {0}")]
    ShaderLoad(#[from] ShaderLoadError),
}

impl Error {
    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Misuse(_))
    }
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }
    pub fn is_unsupported_feature(&self) -> bool {
        matches!(self, Error::UnsupportedFeature { .. })
    }
}

/// A resource was configured in a way the device cannot create.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    #[error("buffer {label} has zero size")]
    ZeroSizedBuffer { label: String },
    #[error("buffer {label}: {usage:?} {kind:?} buffers are not supported by this device")]
    UnsupportedBufferUsage {
        label: String,
        usage: BufferUsage,
        kind: BufferKind,
    },
    #[error("{label}: {resource} has not been created")]
    ResourceNotCreated { label: String, resource: String },
    #[error("{label}: {resource} has been released")]
    ResourceReleased { label: String, resource: String },
    #[error("{label}: {resource} belongs to a different device")]
    ForeignResource { label: String, resource: String },
    #[error("binding slot {slot} is declared more than once")]
    DuplicateBindingSlot { slot: u32 },
    #[error("binding slot {slot} is not visible to any stage")]
    BindingInvisible { slot: u32 },
    #[error("binding slot {slot} expects a {expected:?} buffer but {label} is {found:?}")]
    WrongBufferKind {
        slot: u32,
        label: String,
        expected: BufferKind,
        found: BufferKind,
    },
    #[error(
        "binding slot {slot}: range {offset}+{size} exceeds {label} of {capacity} bytes"
    )]
    BindingOutOfRange {
        slot: u32,
        label: String,
        offset: usize,
        size: usize,
        capacity: usize,
    },
    #[error("binding slot {slot}: range of {size} bytes exceeds the uniform range limit of {max}")]
    UniformRangeTooLarge { slot: u32, size: usize, max: usize },
    #[error("binding slot {slot}: offset {offset} is not aligned to {alignment}")]
    MisalignedUniformOffset {
        slot: u32,
        offset: usize,
        alignment: usize,
    },
    #[error("pipeline {label} has no render pass descriptor")]
    MissingRenderPass { label: String },
    #[error("pipeline {label} is missing a {stage:?} stage")]
    MissingShaderStage {
        label: String,
        stage: ShaderStageKind,
    },
    #[error("pipeline {label} declares the {stage:?} stage more than once")]
    DuplicateShaderStage {
        label: String,
        stage: ShaderStageKind,
    },
    #[error("pipeline {label} has a {stage:?} stage but does not use patch topology")]
    UnexpectedShaderStage {
        label: String,
        stage: ShaderStageKind,
    },
    #[error("pipeline {label}: {count} patch control points is outside 1..={max}")]
    InvalidPatchControlPoints { label: String, count: u32, max: u32 },
    #[error("pipeline {label}: binding slot {slot} is visible to {stage:?}, which the pipeline does not have")]
    BindingStageMissing {
        label: String,
        slot: u32,
        stage: ShaderStageKind,
    },
    #[error("pipeline {label} enables depth testing or writing without a depth attachment")]
    DepthWithoutAttachment { label: String },
    #[error("pipeline {label}: {stage:?} shader {shader} is not in a format this backend accepts")]
    UnsupportedShaderCode {
        label: String,
        stage: ShaderStageKind,
        shader: String,
    },
    #[error("pipeline {label}: {topology} topology is not supported by this backend")]
    UnsupportedTopology { label: String, topology: String },
    #[error("vertex layout declares {count} bindings, the limit is {max}")]
    TooManyVertexBindings { count: usize, max: usize },
    #[error("vertex layout declares {count} attributes, the limit is {max}")]
    TooManyVertexAttributes { count: usize, max: usize },
    #[error("vertex attribute at location {location} references unknown binding {binding}")]
    UnknownVertexBinding { location: u32, binding: u32 },
    #[error("vertex location {location} is declared more than once")]
    DuplicateVertexLocation { location: u32 },
    #[error(
        "vertex attribute at location {location} spans {offset}..{end}, past the stride of {stride}"
    )]
    AttributeExceedsStride {
        location: u32,
        offset: u32,
        end: u32,
        stride: u32,
    },
    #[error("vertex binding {binding} has an instance step rate of zero")]
    InvalidStepRate { binding: u32 },
    #[error("vertex binding {binding}: step rate {rate} is not supported by this backend")]
    UnsupportedStepRate { binding: u32, rate: u32 },
    #[error("render target {label} has zero size")]
    ZeroSizedRenderTarget { label: String },
    #[error("render target {label} is {width}x{height}, the limit is {max}")]
    RenderTargetTooLarge {
        label: String,
        width: u32,
        height: u32,
        max: u32,
    },
}

/// A state-machine or ownership rule was violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum MisuseError {
    #[error("begin_pass called while a pass is already being recorded")]
    AlreadyRecording,
    #[error("{operation} requires a pass in progress")]
    NotRecording { operation: &'static str },
    #[error("resource updates outside a pass cannot be issued while a pass is being recorded")]
    PassInProgress,
    #[error("draw issued with no graphics pipeline bound")]
    NoPipelineBound,
    #[error("draw issued without binding shader resources for pipeline {pipeline}")]
    MissingShaderResources { pipeline: String },
    #[error("draw issued with no vertex input at binding {binding}")]
    MissingVertexInput { binding: u32 },
    #[error("indexed draw issued with no index buffer bound")]
    MissingIndexBuffer,
    #[error("pipeline {pipeline} was built for a different render pass than the current target")]
    IncompatibleRenderPass { pipeline: String },
    #[error("shader resources {bindings} are not layout compatible with pipeline {pipeline}")]
    IncompatibleShaderResources { bindings: String, pipeline: String },
    #[error("{label} has not been created")]
    ResourceNotCreated { label: String },
    #[error("{label} has been released")]
    ResourceReleased { label: String },
    #[error("{label} was already released")]
    AlreadyReleased { label: String },
    #[error("{label} is still referenced by {dependents} created resource(s)")]
    ResourceInUse { label: String, dependents: usize },
    #[error("{label} belongs to a different device")]
    ForeignResource { label: String },
    #[error("release pool was already released")]
    PoolAlreadyReleased,
    #[error("access {offset}+{size} is out of bounds for {label} of {capacity} bytes")]
    OutOfBounds {
        label: String,
        offset: usize,
        size: usize,
        capacity: usize,
    },
    #[error("{operation} is not valid for {usage:?} buffer {label}")]
    WrongBufferUsage {
        label: String,
        operation: &'static str,
        usage: BufferUsage,
    },
    #[error("{operation} requires a {expected:?} buffer but {label} is {found:?}")]
    WrongBufferKind {
        label: String,
        operation: &'static str,
        expected: BufferKind,
        found: BufferKind,
    },
    #[error("static upload into {label} provided {found} bytes, the buffer holds {expected}")]
    StaticUploadSizeMismatch {
        label: String,
        expected: usize,
        found: usize,
    },
    #[error("immutable buffer {label} was already initialized or used")]
    ImmutableBufferAlreadyInitialized { label: String },
    #[error("vertex bindings {start}..{end} exceed the limit of {max}")]
    TooManyVertexInputs { start: u32, end: u32, max: usize },
    #[error("draw reads {needed} bytes from {label} at binding {binding}, which holds {available}")]
    VertexFetchOutOfBounds {
        label: String,
        binding: u32,
        needed: u64,
        available: u64,
    },
    #[error("index {index} in {label} exceeds the {available} vertices available")]
    IndexOutOfRange {
        label: String,
        index: u64,
        available: u64,
    },
}

impl MisuseError {
    /// Logs the violation and wraps it.
    pub(crate) fn logged(self) -> Error {
        let message = self.to_string();
        logwise::error_sync!("{message}", message = message);
        Error::Misuse(self)
    }
}
