// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Buffers for the wgpu backend.
//!
//! Each buffer keeps a host shadow of its contents.  Passes never write buffers, so the
//! shadow always matches the GPU copy and read-backs are served from it without mapping.
//!
//! wgpu requires copies in multiples of [`wgpu::COPY_BUFFER_ALIGNMENT`].  Writes are widened
//! to the enclosing aligned range, filled from the shadow.

use crate::resources::buffer::{Buffer, BufferKind};

#[derive(Debug)]
pub(super) struct WgpuBuffer {
    buffer: wgpu::Buffer,
    shadow: Box<[u8]>,
}

const fn align_up(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl WgpuBuffer {
    pub(super) fn new(device: &wgpu::Device, buffer: &Buffer) -> WgpuBuffer {
        let (usage, alignment) = match buffer.kind() {
            BufferKind::Vertex => (wgpu::BufferUsages::VERTEX, wgpu::COPY_BUFFER_ALIGNMENT),
            BufferKind::Index => (wgpu::BufferUsages::INDEX, wgpu::COPY_BUFFER_ALIGNMENT),
            //std140 blocks round to 16 bytes
            BufferKind::Uniform => (wgpu::BufferUsages::UNIFORM, 16),
        };
        let size = align_up(buffer.size(), alignment as usize);
        let created = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(buffer.label()),
            size: size as u64,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        WgpuBuffer {
            buffer: created,
            shadow: vec![0; size].into_boxed_slice(),
        }
    }

    pub(super) fn wgpu_buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub(super) fn write(&mut self, queue: &wgpu::Queue, offset: usize, data: &[u8]) {
        let end = offset.saturating_add(data.len());
        let Some(dst) = self.shadow.get_mut(offset..end) else {
            return;
        };
        dst.copy_from_slice(data);
        let alignment = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        let start = offset / alignment * alignment;
        let end = align_up(end, alignment).min(self.shadow.len());
        queue.write_buffer(&self.buffer, start as u64, &self.shadow[start..end]);
    }

    pub(super) fn read(&self, offset: usize, size: usize) -> Vec<u8> {
        offset
            .checked_add(size)
            .and_then(|end| self.shadow.get(offset..end))
            .map(|b| b.to_vec())
            .unwrap_or_default()
    }

    pub(super) fn destroy(self) {
        self.buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::align_up;

    #[test]
    fn alignment() {
        assert_eq!(align_up(72, 16), 80);
        assert_eq!(align_up(64, 16), 64);
        assert_eq!(align_up(3, 4), 4);
        assert_eq!(align_up(0, 4), 0);
    }
}
