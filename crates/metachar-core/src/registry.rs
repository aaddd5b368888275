//! # Registry
//!
//! Append-only arena holding every node created in a session.
//!
//! A node's `NodeId` is its slot index. Removing a node leaves a tombstone,
//! so indices of later nodes never shift and are never reused. The document
//! writer asks for a compacted copy (`Registry::compact`) to get dense
//! indices; the live registry itself is never renumbered.

use crate::{MetaCharError, NodeBody, NodeId, StatNode};
use std::collections::BTreeSet;

/// One arena slot: the node plus the Sum that owns it, if any.
#[derive(Debug, Clone, PartialEq)]
struct Slot {
    node: StatNode,
    owner: Option<NodeId>,
}

/// Ordered, indexable collection of all nodes in a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    slots: Vec<Option<Slot>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its identity. Never fails.
    pub fn create(&mut self, node: StatNode) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Some(Slot { node, owner: None }));
        id
    }

    /// Append a node owned by `owner`.
    ///
    /// Records ownership on the slot only; the caller is responsible for
    /// listing the child in the owner's `owned_children`.
    pub(crate) fn create_owned(&mut self, node: StatNode, owner: NodeId) -> NodeId {
        let id = self.create(node);
        self.set_owner(id, Some(owner));
        id
    }

    /// Number of slots ever allocated, tombstones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of nodes that have not been removed.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Look up a live node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&StatNode> {
        self.slot(id).map(|slot| &slot.node)
    }

    /// Look up a live node, failing with `NotFound`.
    pub fn node(&self, id: NodeId) -> Result<&StatNode, MetaCharError> {
        self.get(id).ok_or(MetaCharError::NotFound(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut StatNode, MetaCharError> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|slot| &mut slot.node)
            .ok_or(MetaCharError::NotFound(id))
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.slot(id).is_some()
    }

    /// The Sum that owns `id`, if it is an owned child.
    #[must_use]
    pub fn owner(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).and_then(|slot| slot.owner)
    }

    pub(crate) fn set_owner(&mut self, id: NodeId, owner: Option<NodeId>) {
        if let Some(Some(slot)) = self.slots.get_mut(id.0) {
            slot.owner = owner;
        }
    }

    /// Registry index of a live node.
    pub fn index_of(&self, id: NodeId) -> Result<usize, MetaCharError> {
        if self.contains(id) {
            Ok(id.0)
        } else {
            Err(MetaCharError::NotFound(id))
        }
    }

    /// Node at registry index `index`.
    ///
    /// `OutOfRange` past the end, `NotFound` for a removed node.
    pub fn by_index(&self, index: usize) -> Result<NodeId, MetaCharError> {
        match self.slots.get(index) {
            None => Err(MetaCharError::OutOfRange {
                index,
                len: self.slots.len(),
            }),
            Some(None) => Err(MetaCharError::NotFound(NodeId(index))),
            Some(Some(_)) => Ok(NodeId(index)),
        }
    }

    /// Remove a node, detaching it from its owner's child list.
    ///
    /// References held elsewhere are left in place and become dangling.
    pub fn remove(&mut self, id: NodeId) -> Result<StatNode, MetaCharError> {
        let slot = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(MetaCharError::NotFound(id))?;

        if let Some(owner) = slot.owner
            && let Some(body) = self
                .node_mut(owner)
                .ok()
                .and_then(|node| node.body.as_sum_mut())
        {
            body.owned_children.retain(|child| *child != id);
        }

        Ok(slot.node)
    }

    /// Live nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &StatNode)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| (NodeId(index), &s.node)))
    }

    /// Nodes that sums and fractions may reference.
    #[must_use]
    pub fn calc_candidates(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, node)| node.calc_eligible)
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether making `from` read from `to` would close a dependency loop.
    #[must_use]
    pub fn would_cycle(&self, from: NodeId, to: NodeId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![to];

        while let Some(current) = stack.pop() {
            if current == from {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(node) = self.get(current) {
                stack.extend(node.body.dependencies());
            }
        }

        false
    }

    /// Copy of the live graph with dense indices.
    ///
    /// Returns the copy and a map from old slot index to new identity.
    /// References to removed nodes are dropped from the copy.
    #[must_use]
    pub fn compact(&self) -> (Self, Vec<Option<NodeId>>) {
        let mut remap = vec![None; self.slots.len()];
        let mut next = 0usize;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.is_some() {
                remap[index] = Some(NodeId(next));
                next = next.saturating_add(1);
            }
        }

        let translate = |id: NodeId| remap.get(id.0).copied().flatten();

        let mut compacted = Self::new();
        for (id, slot) in self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|s| (NodeId(index), s)))
        {
            let mut node = slot.node.clone();
            match &mut node.body {
                NodeBody::Sum(body) | NodeBody::Ability(body) => {
                    let before = body.external_refs.len();
                    body.external_refs = body
                        .external_refs
                        .iter()
                        .filter_map(|r| translate(*r))
                        .collect();
                    if body.external_refs.len() != before {
                        tracing::warn!(
                            node = id.0,
                            dropped = before.saturating_sub(body.external_refs.len()),
                            "dropping dangling references"
                        );
                    }
                    body.owned_children = body
                        .owned_children
                        .iter()
                        .filter_map(|c| translate(*c))
                        .collect();
                }
                NodeBody::Fraction(body) => {
                    if let Some(dividend) = body.dividend {
                        body.dividend = translate(dividend);
                        if body.dividend.is_none() {
                            tracing::warn!(node = id.0, "dropping dangling dividend");
                        }
                    }
                }
                _ => {}
            }
            compacted.slots.push(Some(Slot {
                node,
                owner: slot.owner.and_then(translate),
            }));
        }

        (compacted, remap)
    }

    fn slot(&self, id: NodeId) -> Option<&Slot> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }
}

// =============================================================================
// TESTS
// =============================================================================
