// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Host-memory backend.
//!
//! Buffers are plain byte vectors.  Passes are replayed command by command so that every
//! vertex and index fetch a draw would perform is checked against the bound buffers.

use std::collections::HashMap;

use crate::command_buffer::{ClearColor, IndexFormat, PassCommand, RecordedPass};
use crate::device::{Feature, Limits};
use crate::error::{Error, MisuseError};
use crate::imp::Backend;
use crate::resources::ResourceId;
use crate::resources::bindings::ShaderResourceBindings;
use crate::resources::buffer::Buffer;
use crate::resources::pipeline::{GraphicsPipelineDescriptor, Topology};
use crate::resources::render_target::{PixelSize, RenderTarget};
use crate::vertex_layout::{StepRate, VertexInputLayout};

#[derive(Debug)]
struct SoftwareBuffer {
    label: String,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct SoftwarePipeline {
    label: String,
    topology: Topology,
    layout: VertexInputLayout,
}

#[derive(Debug)]
struct SoftwareTarget {
    size: PixelSize,
    last_clear: Option<ClearColor>,
    draws: u64,
}

#[derive(Debug)]
pub(crate) struct SoftwareBackend {
    features: Vec<Feature>,
    limits: Limits,
    buffers: HashMap<ResourceId, SoftwareBuffer>,
    bindings: HashMap<ResourceId, Vec<ResourceId>>,
    pipelines: HashMap<ResourceId, SoftwarePipeline>,
    targets: HashMap<ResourceId, SoftwareTarget>,
}

impl SoftwareBackend {
    /// `features` of `None` enables every feature.
    pub(crate) fn new(features: Option<Vec<Feature>>, limits: Limits) -> SoftwareBackend {
        SoftwareBackend {
            features: features.unwrap_or_else(|| Feature::ALL.to_vec()),
            limits,
            buffers: HashMap::new(),
            bindings: HashMap::new(),
            pipelines: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    fn buffer(&self, id: ResourceId) -> Result<&SoftwareBuffer, Error> {
        self.buffers.get(&id).ok_or_else(|| missing(id))
    }
}

fn missing(id: ResourceId) -> Error {
    MisuseError::ResourceReleased {
        label: format!("resource {}", id.0),
    }
    .logged()
}

/// Elements of a binding a draw reads, or `None` when it reads nothing.
fn elements_read(
    step_rate: StepRate,
    vertices: std::ops::Range<u64>,
    instances: std::ops::Range<u64>,
) -> Option<u64> {
    match step_rate {
        StepRate::PerVertex if vertices.is_empty() => None,
        StepRate::PerVertex => Some(vertices.end),
        StepRate::PerInstance(_) if instances.is_empty() => None,
        StepRate::PerInstance(rate) => Some((instances.end - 1) / rate.max(1) as u64 + 1),
    }
}

/// Bytes of a buffer needed to read `elements` elements from `offset`.
fn bytes_needed(offset: usize, stride: u32, extent: u32, elements: u64) -> u64 {
    let repeats = if stride == 0 {
        0
    } else {
        elements.saturating_sub(1).saturating_mul(stride as u64)
    };
    (offset as u64)
        .saturating_add(repeats)
        .saturating_add(extent as u64)
}

#[derive(Debug, Default)]
struct ReplayState<'a> {
    pipeline: Option<&'a SoftwarePipeline>,
    vertex_inputs: HashMap<u32, (ResourceId, usize)>,
    index: Option<(ResourceId, usize, IndexFormat)>,
}

impl SoftwareBackend {
    fn check_fetch(
        &self,
        replay: &ReplayState<'_>,
        vertices: std::ops::Range<u64>,
        instances: std::ops::Range<u64>,
    ) -> Result<(), Error> {
        let Some(pipeline) = replay.pipeline else {
            return Err(MisuseError::NoPipelineBound.logged());
        };
        for (binding, input) in (0u32..).zip(pipeline.layout.bindings()) {
            let extent = pipeline.layout.fetch_extent(binding);
            if extent == 0 {
                continue;
            }
            let Some(elements) = elements_read(input.step_rate, vertices.clone(), instances.clone())
            else {
                continue;
            };
            let Some((id, offset)) = replay.vertex_inputs.get(&binding) else {
                return Err(MisuseError::MissingVertexInput { binding }.logged());
            };
            let buffer = self.buffer(*id)?;
            let needed = bytes_needed(*offset, input.stride, extent, elements);
            if needed > buffer.bytes.len() as u64 {
                return Err(MisuseError::VertexFetchOutOfBounds {
                    label: buffer.label.clone(),
                    binding,
                    needed,
                    available: buffer.bytes.len() as u64,
                }
                .logged());
            }
        }
        Ok(())
    }

    /// Reads the indices of an indexed draw and returns the largest.
    fn max_index(
        &self,
        replay: &ReplayState<'_>,
        first_index: u32,
        index_count: u32,
    ) -> Result<(String, u64), Error> {
        let Some((id, offset, format)) = replay.index else {
            return Err(MisuseError::MissingIndexBuffer.logged());
        };
        let buffer = self.buffer(id)?;
        let size = format.byte_size();
        let start = (first_index as u64)
            .saturating_mul(size as u64)
            .saturating_add(offset as u64);
        let len = (index_count as u64).saturating_mul(size as u64);
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        let len = usize::try_from(len).unwrap_or(usize::MAX);
        let Some(bytes) = start
            .checked_add(len)
            .and_then(|end| buffer.bytes.get(start..end))
        else {
            return Err(MisuseError::OutOfBounds {
                label: buffer.label.clone(),
                offset: start,
                size: len,
                capacity: buffer.bytes.len(),
            }
            .logged());
        };
        let max = match format {
            IndexFormat::UInt16 => bytes
                .chunks_exact(2)
                .map(|c| u16::from_ne_bytes([c[0], c[1]]) as u64)
                .max(),
            IndexFormat::UInt32 => bytes
                .chunks_exact(4)
                .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]) as u64)
                .max(),
        };
        Ok((buffer.label.clone(), max.unwrap_or(0)))
    }
}

impl Backend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn is_feature_supported(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    fn limits(&self) -> Limits {
        self.limits
    }

    fn create_buffer(&mut self, id: ResourceId, buffer: &Buffer) -> Result<(), Error> {
        self.buffers.insert(
            id,
            SoftwareBuffer {
                label: buffer.label().to_string(),
                bytes: vec![0; buffer.size()],
            },
        );
        Ok(())
    }

    fn create_bindings(
        &mut self,
        id: ResourceId,
        bindings: &ShaderResourceBindings,
    ) -> Result<(), Error> {
        self.bindings.insert(id, bindings.buffer_ids());
        Ok(())
    }

    fn create_pipeline(
        &mut self,
        id: ResourceId,
        descriptor: &GraphicsPipelineDescriptor,
    ) -> Result<(), Error> {
        self.pipelines.insert(
            id,
            SoftwarePipeline {
                label: descriptor.label.clone(),
                topology: descriptor.topology,
                layout: descriptor.vertex_input.clone(),
            },
        );
        Ok(())
    }

    fn create_render_target(
        &mut self,
        id: ResourceId,
        target: &RenderTarget,
    ) -> Result<(), Error> {
        self.targets.insert(
            id,
            SoftwareTarget {
                size: target.pixel_size(),
                last_clear: None,
                draws: 0,
            },
        );
        Ok(())
    }

    fn destroy(&mut self, id: ResourceId) {
        self.buffers.remove(&id);
        self.bindings.remove(&id);
        self.pipelines.remove(&id);
        self.targets.remove(&id);
    }

    fn write_buffer(&mut self, id: ResourceId, offset: usize, data: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(&id) else {
            return;
        };
        let end = offset.saturating_add(data.len());
        if let Some(dst) = buffer.bytes.get_mut(offset..end) {
            dst.copy_from_slice(data);
        }
    }

    fn read_buffer(&mut self, id: ResourceId, offset: usize, size: usize) -> Vec<u8> {
        self.buffers
            .get(&id)
            .and_then(|b| b.bytes.get(offset..offset.checked_add(size)?))
            .map(|b| b.to_vec())
            .unwrap_or_default()
    }

    fn execute_pass(&mut self, pass: &RecordedPass) -> Result<(), Error> {
        let target = self.targets.get(&pass.target).ok_or_else(|| missing(pass.target))?;
        if target.size != pass.size {
            logwise::warn_sync!(
                "pass recorded for a target of a different size; was the target recreated?"
            );
        }
        let mut replay = ReplayState::default();
        let mut draws = 0;
        for command in &pass.commands {
            match command {
                PassCommand::SetPipeline(id) => {
                    replay.pipeline = Some(self.pipelines.get(id).ok_or_else(|| missing(*id))?);
                }
                PassCommand::SetShaderResources(id) => {
                    let buffers = self.bindings.get(id).ok_or_else(|| missing(*id))?;
                    for buffer in buffers {
                        self.buffer(*buffer)?;
                    }
                }
                PassCommand::SetVertexInput {
                    binding,
                    buffer,
                    offset,
                } => {
                    self.buffer(*buffer)?;
                    replay.vertex_inputs.insert(*binding, (*buffer, *offset));
                }
                PassCommand::SetIndexBuffer {
                    buffer,
                    offset,
                    format,
                } => {
                    self.buffer(*buffer)?;
                    replay.index = Some((*buffer, *offset, *format));
                }
                PassCommand::SetViewport(_) | PassCommand::SetScissor(_) => {}
                PassCommand::Draw {
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                } => {
                    let vertices = *first_vertex as u64..*first_vertex as u64 + *vertex_count as u64;
                    let instances =
                        *first_instance as u64..*first_instance as u64 + *instance_count as u64;
                    self.check_fetch(&replay, vertices, instances)?;
                    draws += 1;
                }
                PassCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    first_index,
                    vertex_offset,
                    first_instance,
                } => {
                    let instances =
                        *first_instance as u64..*first_instance as u64 + *instance_count as u64;
                    if *index_count > 0 {
                        let (label, max) = self.max_index(&replay, *first_index, *index_count)?;
                        let last = max as i64 + *vertex_offset as i64;
                        if last < 0 {
                            return Err(MisuseError::IndexOutOfRange {
                                label,
                                index: max,
                                available: 0,
                            }
                            .logged());
                        }
                        let last = last as u64;
                        let available = self.vertices_available(&replay);
                        if last >= available {
                            return Err(MisuseError::IndexOutOfRange {
                                label,
                                index: last,
                                available,
                            }
                            .logged());
                        }
                        //per-instance inputs only
                        self.check_fetch(&replay, 0..0, instances)?;
                    }
                    draws += 1;
                }
            }
        }
        if let Some(pipeline) = replay.pipeline {
            let label = pipeline.label.clone();
            logwise::trace_sync!(
                "replayed pass, last pipeline {label} with {topology}",
                label = label,
                topology = logwise::privacy::LogIt(pipeline.topology)
            );
        }
        if let Some(target) = self.targets.get_mut(&pass.target) {
            target.last_clear = Some(pass.clear);
            target.draws += draws;
        }
        Ok(())
    }
}

impl SoftwareBackend {
    /// Vertices the bound per-vertex inputs can supply.
    fn vertices_available(&self, replay: &ReplayState<'_>) -> u64 {
        let Some(pipeline) = replay.pipeline else {
            return 0;
        };
        let mut available = u64::MAX;
        for (binding, input) in (0u32..).zip(pipeline.layout.bindings()) {
            let extent = pipeline.layout.fetch_extent(binding) as u64;
            if input.step_rate != StepRate::PerVertex || extent == 0 || input.stride == 0 {
                continue;
            }
            let Some(len) = replay
                .vertex_inputs
                .get(&binding)
                .and_then(|(id, offset)| {
                    self.buffers
                        .get(id)
                        .map(|b| (b.bytes.len() as u64).saturating_sub(*offset as u64))
                })
            else {
                return 0;
            };
            let count = if len < extent {
                0
            } else {
                (len - extent) / input.stride as u64 + 1
            };
            available = available.min(count);
        }
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_follow_step_rate() {
        assert_eq!(elements_read(StepRate::PerVertex, 0..3, 0..1), Some(3));
        assert_eq!(elements_read(StepRate::PerVertex, 2..2, 0..1), None);
        assert_eq!(elements_read(StepRate::PerInstance(1), 0..3, 0..4), Some(4));
        assert_eq!(elements_read(StepRate::PerInstance(2), 0..3, 0..4), Some(2));
        assert_eq!(elements_read(StepRate::PerInstance(2), 0..3, 0..5), Some(3));
    }

    #[test]
    fn needed_bytes() {
        //3 vertices of 24 bytes
        assert_eq!(bytes_needed(0, 24, 24, 3), 72);
        assert_eq!(bytes_needed(8, 24, 12, 3), 8 + 48 + 12);
        assert_eq!(bytes_needed(4, 0, 16, 100), 20);
        assert_eq!(bytes_needed(usize::MAX, u32::MAX, 12, u64::MAX), u64::MAX);
    }

    #[test]
    fn index_ranges_past_the_address_space_are_out_of_bounds() {
        let mut backend = SoftwareBackend::new(None, Limits::default());
        let id = ResourceId(1);
        backend.buffers.insert(
            id,
            SoftwareBuffer {
                label: "ibuf".to_string(),
                bytes: vec![0; 12],
            },
        );
        let replay = ReplayState {
            index: Some((id, 8, IndexFormat::UInt32)),
            ..Default::default()
        };
        assert!(matches!(
            backend.max_index(&replay, u32::MAX, u32::MAX),
            Err(Error::Misuse(MisuseError::OutOfBounds { .. }))
        ));
        assert_eq!(backend.max_index(&replay, 0, 1).unwrap(), ("ibuf".to_string(), 0));
        assert!(backend.read_buffer(id, usize::MAX, 2).is_empty());
    }

    #[test]
    fn writes_and_reads_in_bounds() {
        let mut backend = SoftwareBackend::new(None, Limits::default());
        let id = ResourceId(1);
        backend.buffers.insert(
            id,
            SoftwareBuffer {
                label: "b".to_string(),
                bytes: vec![0; 8],
            },
        );
        backend.write_buffer(id, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.read_buffer(id, 2, 4), vec![0, 0, 1, 2]);
        backend.destroy(id);
        assert!(backend.read_buffer(id, 0, 4).is_empty());
    }
}
