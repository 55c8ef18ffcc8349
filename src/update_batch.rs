// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Staged resource updates.

A [`ResourceUpdateBatch`] queues buffer writes (and read-backs) without touching any buffer.
Nothing happens until the batch is consumed, either by
[`crate::command_buffer::CommandBuffer::begin_pass`] or by
[`crate::command_buffer::CommandBuffer::resource_update`].  Operations then apply in the order
they were recorded, so a later write to an overlapping range wins.

Batches are single use.  Consuming, merging away, releasing or dropping a batch returns its
storage to the device's pool; [`crate::device::Device::next_resource_update_batch`] hands it
out again.

A batch that has been merged into another is gone:

```compile_fail
# use batches_and_passes::device::{Device, DeviceConfig};
# test_executors::sleep_on(async {
# let device = Device::new(DeviceConfig::default()).await.unwrap();
let mut frame = device.next_resource_update_batch();
let initial = device.next_resource_update_batch();
frame.merge(initial).unwrap();
assert!(initial.is_empty());
# });
```
*/

use std::collections::HashMap;
use std::sync::Arc;

use wasm_safe_mutex::Mutex;

use crate::device::{DeviceShared, DeviceState};
use crate::error::{Error, MisuseError};
use crate::resources::ResourceId;
use crate::resources::buffer::{Buffer, BufferUsage};

/// Receives the bytes of a read-back once its batch has been applied.
#[derive(Debug, Clone, Default)]
pub struct BufferReadback {
    data: Arc<Mutex<Option<Vec<u8>>>>,
}

impl BufferReadback {
    pub fn is_ready(&self) -> bool {
        self.data.with_sync(|d| d.is_some())
    }

    /// A copy of the read bytes, if the batch has been applied.
    pub fn data(&self) -> Option<Vec<u8>> {
        self.data.with_sync(|d| d.clone())
    }

    /// Takes the read bytes, leaving the readback empty.
    pub fn take(&self) -> Option<Vec<u8>> {
        self.data.with_mut_sync(|d| d.take())
    }

    fn fulfill(&self, bytes: Vec<u8>) {
        self.data.with_mut_sync(|d| *d = Some(bytes));
    }
}

#[derive(Debug)]
pub(crate) enum BufferOp {
    StaticUpload {
        buffer: Buffer,
        offset: usize,
        data: Vec<u8>,
    },
    DynamicUpdate {
        buffer: Buffer,
        offset: usize,
        data: Vec<u8>,
    },
    ReadBack {
        buffer: Buffer,
        offset: usize,
        size: usize,
        sink: BufferReadback,
    },
}

impl BufferOp {
    fn buffer(&self) -> &Buffer {
        match self {
            BufferOp::StaticUpload { buffer, .. }
            | BufferOp::DynamicUpdate { buffer, .. }
            | BufferOp::ReadBack { buffer, .. } => buffer,
        }
    }
}

/// A single-use queue of pending buffer operations.
#[derive(Debug)]
pub struct ResourceUpdateBatch {
    device: Arc<DeviceShared>,
    ops: Vec<BufferOp>,
}

impl ResourceUpdateBatch {
    pub(crate) fn new(device: Arc<DeviceShared>, ops: Vec<BufferOp>) -> Self {
        ResourceUpdateBatch { device, ops }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    fn check_buffer(&self, buffer: &Buffer) -> Result<(), Error> {
        if !buffer.core().belongs_to(&self.device) {
            return Err(MisuseError::ForeignResource {
                label: buffer.label().to_string(),
            }
            .logged());
        }
        let state = self.device.lock();
        let checked = state.registry.require_created(buffer.id(), buffer.label());
        drop(state);
        checked.map_err(MisuseError::logged)
    }

    fn check_bounds(buffer: &Buffer, offset: usize, size: usize) -> Result<(), Error> {
        match offset.checked_add(size) {
            Some(end) if end <= buffer.size() => Ok(()),
            _ => Err(MisuseError::OutOfBounds {
                label: buffer.label().to_string(),
                offset,
                size,
                capacity: buffer.size(),
            }
            .logged()),
        }
    }

    /**
    Schedules a write of the whole of `buffer`.

    `data` must be exactly [`Buffer::size`] bytes.  Valid for
    [`BufferUsage::Immutable`] buffers once, before any pass has used them, and for
    [`BufferUsage::Static`] buffers at any time.
    */
    pub fn upload_static_buffer(&mut self, buffer: &Buffer, data: &[u8]) -> Result<(), Error> {
        if data.len() != buffer.size() {
            return Err(MisuseError::StaticUploadSizeMismatch {
                label: buffer.label().to_string(),
                expected: buffer.size(),
                found: data.len(),
            }
            .logged());
        }
        self.upload_static_buffer_range(buffer, 0, data)
    }

    /// Schedules a static write of part of `buffer`.
    pub fn upload_static_buffer_range(
        &mut self,
        buffer: &Buffer,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Error> {
        self.check_buffer(buffer)?;
        if buffer.usage() == BufferUsage::Dynamic {
            return Err(MisuseError::WrongBufferUsage {
                label: buffer.label().to_string(),
                operation: "upload_static_buffer",
                usage: buffer.usage(),
            }
            .logged());
        }
        Self::check_bounds(buffer, offset, data.len())?;
        self.ops.push(BufferOp::StaticUpload {
            buffer: buffer.clone(),
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    /// Schedules a write of `data` at `offset` into a [`BufferUsage::Dynamic`] buffer.
    pub fn update_dynamic_buffer(
        &mut self,
        buffer: &Buffer,
        offset: usize,
        data: &[u8],
    ) -> Result<(), Error> {
        self.check_buffer(buffer)?;
        if buffer.usage() != BufferUsage::Dynamic {
            return Err(MisuseError::WrongBufferUsage {
                label: buffer.label().to_string(),
                operation: "update_dynamic_buffer",
                usage: buffer.usage(),
            }
            .logged());
        }
        Self::check_bounds(buffer, offset, data.len())?;
        self.ops.push(BufferOp::DynamicUpdate {
            buffer: buffer.clone(),
            offset,
            data: data.to_vec(),
        });
        Ok(())
    }

    /// Schedules a copy of `offset..offset + size` out of `buffer`, taken after every
    /// operation recorded before it.
    pub fn read_back_buffer(
        &mut self,
        buffer: &Buffer,
        offset: usize,
        size: usize,
    ) -> Result<BufferReadback, Error> {
        self.check_buffer(buffer)?;
        Self::check_bounds(buffer, offset, size)?;
        let sink = BufferReadback::default();
        self.ops.push(BufferOp::ReadBack {
            buffer: buffer.clone(),
            offset,
            size,
            sink: sink.clone(),
        });
        Ok(sink)
    }

    /**
    Appends every operation of `other` after this batch's own.

    `other` is consumed and its storage returns to the pool.
    */
    pub fn merge(&mut self, mut other: ResourceUpdateBatch) -> Result<(), Error> {
        if !Arc::ptr_eq(&self.device, &other.device) {
            return Err(MisuseError::ForeignResource {
                label: "resource update batch".to_string(),
            }
            .logged());
        }
        self.ops.append(&mut other.ops);
        Ok(())
    }

    /// Discards the batch without applying it.
    pub fn release(self) {
        drop(self)
    }

    pub(crate) fn belongs_to(&self, device: &Arc<DeviceShared>) -> bool {
        Arc::ptr_eq(&self.device, device)
    }

    /// Applies the batch now.  Its storage returns to the pool when it drops on return.
    pub(crate) fn consume(self) -> Result<(), Error> {
        let mut state = self.device.lock();
        let applied = apply(&mut state, &self.ops);
        drop(state);
        applied
    }
}

impl Drop for ResourceUpdateBatch {
    fn drop(&mut self) {
        let ops = std::mem::take(&mut self.ops);
        self.device.return_pooled_ops(ops);
    }
}

/**
Applies a batch's operations against the device.

The whole batch is checked first; if any operation is invalid, nothing is applied.
*/
pub(crate) fn apply(state: &mut DeviceState, ops: &[BufferOp]) -> Result<(), Error> {
    let mut pending_static: HashMap<ResourceId, u32> = HashMap::new();
    for op in ops {
        let buffer = op.buffer();
        state
            .registry
            .require_created(buffer.id(), buffer.label())
            .map_err(MisuseError::logged)?;
        if let BufferOp::StaticUpload { .. } = op
            && buffer.usage() == BufferUsage::Immutable
        {
            let pending = pending_static.entry(buffer.id()).or_insert(0);
            let already = state
                .registry
                .get(buffer.id())
                .and_then(|r| r.buffer.as_ref())
                .is_some_and(|b| b.static_uploads > 0 || b.used_by_pass);
            if already || *pending > 0 {
                return Err(MisuseError::ImmutableBufferAlreadyInitialized {
                    label: buffer.label().to_string(),
                }
                .logged());
            }
            *pending += 1;
        }
    }

    for op in ops {
        match op {
            BufferOp::StaticUpload {
                buffer,
                offset,
                data,
            } => {
                state.backend.write_buffer(buffer.id(), *offset, data);
                if let Some(record) = state
                    .registry
                    .get_mut(buffer.id())
                    .and_then(|r| r.buffer.as_mut())
                {
                    record.static_uploads += 1;
                }
                state.statistics.bytes_uploaded += data.len() as u64;
            }
            BufferOp::DynamicUpdate {
                buffer,
                offset,
                data,
            } => {
                state.backend.write_buffer(buffer.id(), *offset, data);
                state.statistics.bytes_uploaded += data.len() as u64;
            }
            BufferOp::ReadBack {
                buffer,
                offset,
                size,
                sink,
            } => {
                let read = logwise::perfwarn_begin!("read_back_buffer");
                let bytes = state.backend.read_buffer(buffer.id(), *offset, *size);
                drop(read);
                state.statistics.bytes_read_back += bytes.len() as u64;
                sink.fulfill(bytes);
            }
        }
    }
    state.statistics.batches_applied += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceConfig};
    use crate::resources::buffer::BufferKind;

    fn device() -> Device {
        test_executors::sleep_on(Device::new(DeviceConfig::default())).unwrap()
    }

    #[test]
    fn recording_checks_usage_and_bounds() {
        let device = device();
        let ubuf = device
            .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 72)
            .unwrap();
        let mut batch = device.next_resource_update_batch();
        //not created yet
        assert!(batch.update_dynamic_buffer(&ubuf, 0, &[0; 4]).is_err());
        ubuf.create().unwrap();
        batch.update_dynamic_buffer(&ubuf, 68, &[0; 4]).unwrap();
        assert!(matches!(
            batch.update_dynamic_buffer(&ubuf, 69, &[0; 4]),
            Err(Error::Misuse(MisuseError::OutOfBounds { .. }))
        ));
        assert!(matches!(
            batch.upload_static_buffer(&ubuf, &[0; 72]),
            Err(Error::Misuse(MisuseError::WrongBufferUsage { .. }))
        ));
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn static_upload_must_cover_the_buffer() {
        let device = device();
        let vbuf = device
            .new_buffer(BufferUsage::Immutable, BufferKind::Vertex, 72)
            .unwrap();
        vbuf.create().unwrap();
        let mut batch = device.next_resource_update_batch();
        assert!(matches!(
            batch.upload_static_buffer(&vbuf, &[0; 71]),
            Err(Error::Misuse(MisuseError::StaticUploadSizeMismatch {
                expected: 72,
                found: 71,
                ..
            }))
        ));
    }

    #[test]
    fn readback_is_fulfilled_in_order() {
        let device = device();
        let ubuf = device
            .new_buffer(BufferUsage::Dynamic, BufferKind::Uniform, 8)
            .unwrap();
        ubuf.create().unwrap();
        let mut batch = device.next_resource_update_batch();
        let before = batch.read_back_buffer(&ubuf, 0, 8).unwrap();
        batch.update_dynamic_buffer(&ubuf, 2, &[7, 7]).unwrap();
        let after = batch.read_back_buffer(&ubuf, 0, 8).unwrap();
        assert!(!after.is_ready());

        batch.consume().unwrap();

        assert_eq!(before.data().unwrap(), vec![0; 8]);
        assert_eq!(after.take().unwrap(), vec![0, 0, 7, 7, 0, 0, 0, 0]);
        assert!(!after.is_ready());
    }
}
