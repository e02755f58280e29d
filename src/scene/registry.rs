//! Primitive Registry
//!
//! The scene collaborator owns primitive lifetimes; the pipeline only ever
//! sees an immutable snapshot taken at collection time. The registry keeps
//! explicit parent links instead of scanning a scene graph, and the snapshot
//! resolves everything hierarchical (parent scale, child lists) exactly
//! once, so downstream code works on flat data.

use glam::Vec3;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::errors::{PipelineError, Result};
use crate::scene::primitive::{Operation, PrimitiveDesc, PrimitiveKind, PrimitiveTransform};

slotmap::new_key_type! {
    /// Stable handle to a registered primitive.
    pub struct PrimitiveKey;
}

/// How a primitive hangs in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parentage {
    /// A top-level scene node. Only these may own collected children.
    Root,
    /// Child of a node that carries its own primitive.
    Primitive(PrimitiveKey),
    /// Child of a scene node that carries no primitive. Tracked, but never
    /// reaches the GPU.
    BareNode,
}

#[derive(Debug, Clone)]
struct Entry {
    desc: PrimitiveDesc,
    parentage: Parentage,
    /// Direct primitive-bearing children, registration order.
    children: Vec<PrimitiveKey>,
    /// Monotonic registration counter; snapshot order is discovery order.
    seq: u64,
}

/// Flat, hierarchy-resolved view of one primitive at collection time.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveSnapshot {
    pub kind: PrimitiveKind,
    pub operation: Operation,
    pub color: Vec3,
    pub blend_strength: f32,
    pub transform: PrimitiveTransform,
    /// The parent's local scale, resolved when the snapshot was built.
    /// `Vec3::ONE` for top-level primitives; hierarchy is one level deep.
    pub parent_scale: Vec3,
    /// True for primitives on top-level nodes.
    pub top_level: bool,
    /// Indices (into the snapshot list) of direct primitive-bearing
    /// children, registration order. Always empty for non-top-level
    /// entries.
    pub children: SmallVec<[usize; 4]>,
}

/// Registry of every SDF primitive the scene exposes to the pipeline.
#[derive(Debug, Default)]
pub struct PrimitiveRegistry {
    entries: SlotMap<PrimitiveKey, Entry>,
    next_seq: u64,
}

impl PrimitiveRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a primitive on a top-level scene node.
    pub fn register(&mut self, desc: PrimitiveDesc) -> PrimitiveKey {
        self.insert(desc, Parentage::Root)
    }

    /// Registers a primitive as a direct child of `parent`.
    ///
    /// One level of hierarchy reaches the GPU: children of children stay
    /// registered but are never collected.
    pub fn register_child(
        &mut self,
        parent: PrimitiveKey,
        desc: PrimitiveDesc,
    ) -> Result<PrimitiveKey> {
        if !self.entries.contains_key(parent) {
            return Err(PipelineError::UnknownPrimitive {
                context: "register_child: parent was removed".into(),
            });
        }
        let key = self.insert(desc, Parentage::Primitive(parent));
        self.entries[parent].children.push(key);
        Ok(key)
    }

    /// Registers a primitive whose scene parent carries no primitive.
    ///
    /// Such primitives are tracked so the scene can re-parent them later,
    /// but the collector silently omits them.
    pub fn register_under_bare_node(&mut self, desc: PrimitiveDesc) -> PrimitiveKey {
        self.insert(desc, Parentage::BareNode)
    }

    /// Removes a primitive.
    ///
    /// Children of a removed parent stay registered; with their parent link
    /// dead they no longer reach the GPU.
    pub fn remove(&mut self, key: PrimitiveKey) -> Result<()> {
        let entry = self
            .entries
            .remove(key)
            .ok_or_else(|| PipelineError::UnknownPrimitive {
                context: "remove: key not present".into(),
            })?;
        if let Parentage::Primitive(parent) = entry.parentage
            && let Some(parent_entry) = self.entries.get_mut(parent)
        {
            parent_entry.children.retain(|child| *child != key);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: PrimitiveKey) -> Option<&PrimitiveDesc> {
        self.entries.get(key).map(|entry| &entry.desc)
    }

    /// Mutable access to a primitive's description (transform, color,
    /// operation). Parent links are fixed at registration.
    #[must_use]
    pub fn get_mut(&mut self, key: PrimitiveKey) -> Option<&mut PrimitiveDesc> {
        self.entries.get_mut(key).map(|entry| &mut entry.desc)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the flat snapshot the collector consumes.
    ///
    /// Entries appear in registration order. Parent scale is resolved here,
    /// once; child lists only contain children that are still alive.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PrimitiveSnapshot> {
        let mut keys: Vec<PrimitiveKey> = self.entries.keys().collect();
        keys.sort_by_key(|key| self.entries[*key].seq);

        let index_of = |key: PrimitiveKey| keys.iter().position(|k| *k == key);

        let mut snapshots = Vec::with_capacity(keys.len());
        for key in &keys {
            let entry = &self.entries[*key];
            let (top_level, parent_scale) = match entry.parentage {
                Parentage::Root => (true, Vec3::ONE),
                Parentage::Primitive(parent) => match self.entries.get(parent) {
                    Some(parent_entry) => (false, parent_entry.desc.transform.scale),
                    // Parent removed: behaves like a bare-node child.
                    None => (false, Vec3::ONE),
                },
                Parentage::BareNode => (false, Vec3::ONE),
            };

            let children = if top_level {
                entry
                    .children
                    .iter()
                    .filter_map(|child| index_of(*child))
                    .collect()
            } else {
                SmallVec::new()
            };

            snapshots.push(PrimitiveSnapshot {
                kind: entry.desc.kind,
                operation: entry.desc.operation,
                color: entry.desc.color,
                blend_strength: entry.desc.blend_strength,
                transform: entry.desc.transform,
                parent_scale,
                top_level,
                children,
            });
        }
        snapshots
    }

    fn insert(&mut self, desc: PrimitiveDesc, parentage: Parentage) -> PrimitiveKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(Entry {
            desc,
            parentage,
            children: Vec::new(),
            seq,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sphere() -> PrimitiveDesc {
        PrimitiveDesc::default()
    }

    #[test]
    fn test_snapshot_preserves_registration_order() {
        let mut registry = PrimitiveRegistry::new();
        registry.register(PrimitiveDesc {
            kind: PrimitiveKind::Torus,
            ..PrimitiveDesc::default()
        });
        registry.register(PrimitiveDesc {
            kind: PrimitiveKind::Cube,
            ..PrimitiveDesc::default()
        });
        registry.register(sphere());

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].kind, PrimitiveKind::Torus);
        assert_eq!(snapshot[1].kind, PrimitiveKind::Cube);
        assert_eq!(snapshot[2].kind, PrimitiveKind::Sphere);
    }

    #[test]
    fn test_snapshot_resolves_parent_scale_once() {
        let mut registry = PrimitiveRegistry::new();
        let parent = registry.register(PrimitiveDesc {
            transform: PrimitiveTransform {
                scale: Vec3::new(2.0, 3.0, 4.0),
                ..PrimitiveTransform::default()
            },
            ..PrimitiveDesc::default()
        });
        registry
            .register_child(parent, sphere())
            .expect("parent is alive");

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].parent_scale, Vec3::ONE);
        assert_eq!(snapshot[1].parent_scale, Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(snapshot[0].children.as_slice(), &[1]);
        assert!(snapshot[1].children.is_empty());
    }

    #[test]
    fn test_bare_node_children_are_not_top_level() {
        let mut registry = PrimitiveRegistry::new();
        registry.register_under_bare_node(sphere());

        let snapshot = registry.snapshot();
        assert!(!snapshot[0].top_level);
        assert!(snapshot[0].children.is_empty());
    }

    #[test]
    fn test_removed_parent_orphans_children() {
        let mut registry = PrimitiveRegistry::new();
        let parent = registry.register(sphere());
        let child = registry.register_child(parent, sphere()).unwrap();
        registry.remove(parent).unwrap();

        assert!(registry.get(child).is_some());
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].top_level);
    }

    #[test]
    fn test_removed_child_leaves_parent_list() {
        let mut registry = PrimitiveRegistry::new();
        let parent = registry.register(sphere());
        let first = registry.register_child(parent, sphere()).unwrap();
        registry.register_child(parent, sphere()).unwrap();
        registry.remove(first).unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot[0].children.len(), 1);
    }

    #[test]
    fn test_register_child_rejects_dead_parent() {
        let mut registry = PrimitiveRegistry::new();
        let parent = registry.register(sphere());
        registry.remove(parent).unwrap();

        assert!(registry.register_child(parent, sphere()).is_err());
    }

    #[test]
    fn test_get_mut_updates_desc() {
        let mut registry = PrimitiveRegistry::new();
        let key = registry.register(sphere());
        registry.get_mut(key).unwrap().operation = Operation::Cut;

        assert_eq!(registry.get(key).unwrap().operation, Operation::Cut);
    }
}
