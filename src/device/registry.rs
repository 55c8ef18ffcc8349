// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Bookkeeping for every resource a device has handed out.
//!
//! Handles are cheap clones; the registry is the single source of truth for whether a
//! resource is constructed, created or released, and for how many created resources
//! still reference it.

use std::collections::HashMap;

use crate::error::MisuseError;
use crate::resources::buffer::BufferUsage;
use crate::resources::{ResourceId, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceState {
    Constructed,
    Created,
    Released,
}

#[derive(Debug)]
pub(crate) struct BufferRecord {
    pub(crate) usage: BufferUsage,
    /// Static uploads applied since the buffer was last created.
    pub(crate) static_uploads: u32,
    /// Referenced by a pass that was executed.
    pub(crate) used_by_pass: bool,
}

impl BufferRecord {
    pub(crate) fn new(usage: BufferUsage) -> Self {
        BufferRecord {
            usage,
            static_uploads: 0,
            used_by_pass: false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ResourceRecord {
    #[allow(dead_code)] //read in debug output
    pub(crate) kind: ResourceKind,
    pub(crate) label: String,
    pub(crate) state: ResourceState,
    /// Created resources that hold a reference on this one.
    pub(crate) dependents: usize,
    depends_on: Vec<ResourceId>,
    pub(crate) buffer: Option<BufferRecord>,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    records: HashMap<ResourceId, ResourceRecord>,
    next_id: u64,
}

impl Registry {
    pub(crate) fn insert(
        &mut self,
        kind: ResourceKind,
        label: String,
        buffer: Option<BufferRecord>,
    ) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            ResourceRecord {
                kind,
                label,
                state: ResourceState::Constructed,
                dependents: 0,
                depends_on: Vec::new(),
                buffer,
            },
        );
        id
    }

    pub(crate) fn get(&self, id: ResourceId) -> Option<&ResourceRecord> {
        self.records.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Option<&mut ResourceRecord> {
        self.records.get_mut(&id)
    }

    /// Forgotten resources report as released.
    pub(crate) fn state(&self, id: ResourceId) -> ResourceState {
        self.records
            .get(&id)
            .map(|r| r.state)
            .unwrap_or(ResourceState::Released)
    }

    pub(crate) fn require_created(&self, id: ResourceId, label: &str) -> Result<(), MisuseError> {
        match self.state(id) {
            ResourceState::Created => Ok(()),
            ResourceState::Constructed => Err(MisuseError::ResourceNotCreated {
                label: label.to_string(),
            }),
            ResourceState::Released => Err(MisuseError::ResourceReleased {
                label: label.to_string(),
            }),
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.state != ResourceState::Released)
            .count()
    }

    fn drop_references(&mut self, depends_on: Vec<ResourceId>) {
        for dep in depends_on {
            if let Some(record) = self.records.get_mut(&dep) {
                record.dependents = record.dependents.saturating_sub(1);
            }
        }
    }

    /// Returns a created resource to the constructed state, dropping its references.
    pub(crate) fn uncreate(&mut self, id: ResourceId) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        if record.state != ResourceState::Created {
            return;
        }
        record.state = ResourceState::Constructed;
        let depends_on = std::mem::take(&mut record.depends_on);
        self.drop_references(depends_on);
    }

    pub(crate) fn mark_created(&mut self, id: ResourceId, depends_on: Vec<ResourceId>) {
        for dep in &depends_on {
            if let Some(record) = self.records.get_mut(dep) {
                record.dependents += 1;
            }
        }
        if let Some(record) = self.records.get_mut(&id) {
            record.state = ResourceState::Created;
            record.depends_on = depends_on;
            if let Some(buffer) = &mut record.buffer {
                buffer.static_uploads = 0;
                buffer.used_by_pass = false;
            }
        }
    }

    /// Marks a resource released.  Returns whether backend storage must be freed.
    pub(crate) fn release(&mut self, id: ResourceId, label: &str) -> Result<bool, MisuseError> {
        let Some(record) = self.records.get_mut(&id) else {
            return Err(MisuseError::AlreadyReleased {
                label: label.to_string(),
            });
        };
        match record.state {
            ResourceState::Released => Err(MisuseError::AlreadyReleased {
                label: record.label.clone(),
            }),
            _ if record.dependents > 0 => Err(MisuseError::ResourceInUse {
                label: record.label.clone(),
                dependents: record.dependents,
            }),
            ResourceState::Constructed => {
                record.state = ResourceState::Released;
                Ok(false)
            }
            ResourceState::Created => {
                record.state = ResourceState::Released;
                let depends_on = std::mem::take(&mut record.depends_on);
                self.drop_references(depends_on);
                Ok(true)
            }
        }
    }

    /// Drops the record of a resource whose last handle went away.  Returns whether backend
    /// storage must be freed.
    pub(crate) fn forget(&mut self, id: ResourceId) -> bool {
        let Some(record) = self.records.remove(&id) else {
            return false;
        };
        if record.state == ResourceState::Created {
            let label = record.label.clone();
            logwise::debuginternal_sync!("{label} dropped without release", label = label);
            self.drop_references(record.depends_on);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependents_block_release() {
        let mut registry = Registry::default();
        let buffer = registry.insert(ResourceKind::Buffer, "ubuf".into(), None);
        let bindings = registry.insert(ResourceKind::ShaderResourceBindings, "srb".into(), None);
        registry.mark_created(buffer, Vec::new());
        registry.mark_created(bindings, vec![buffer]);

        assert_eq!(
            registry.release(buffer, "ubuf"),
            Err(MisuseError::ResourceInUse {
                label: "ubuf".into(),
                dependents: 1
            })
        );
        assert_eq!(registry.release(bindings, "srb"), Ok(true));
        assert_eq!(registry.release(buffer, "ubuf"), Ok(true));
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn double_release() {
        let mut registry = Registry::default();
        let id = registry.insert(ResourceKind::Buffer, "vbuf".into(), None);
        assert_eq!(registry.release(id, "vbuf"), Ok(false));
        assert!(matches!(
            registry.release(id, "vbuf"),
            Err(MisuseError::AlreadyReleased { .. })
        ));
    }

    #[test]
    fn forgetting_drops_references() {
        let mut registry = Registry::default();
        let buffer = registry.insert(ResourceKind::Buffer, "ubuf".into(), None);
        let bindings = registry.insert(ResourceKind::ShaderResourceBindings, "srb".into(), None);
        registry.mark_created(buffer, Vec::new());
        registry.mark_created(bindings, vec![buffer]);
        assert!(registry.forget(bindings));
        assert_eq!(registry.get(buffer).map(|r| r.dependents), Some(0));
        assert_eq!(registry.state(bindings), ResourceState::Released);
    }

    #[test]
    fn recreate_moves_references() {
        let mut registry = Registry::default();
        let a = registry.insert(ResourceKind::Buffer, "a".into(), None);
        let b = registry.insert(ResourceKind::Buffer, "b".into(), None);
        let set = registry.insert(ResourceKind::ShaderResourceBindings, "srb".into(), None);
        registry.mark_created(set, vec![a]);
        registry.uncreate(set);
        registry.mark_created(set, vec![b]);
        assert_eq!(registry.get(a).map(|r| r.dependents), Some(0));
        assert_eq!(registry.get(b).map(|r| r.dependents), Some(1));
    }
}
