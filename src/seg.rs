//! The shared expression graph (SEG): every path tree of every verification
//! root, flattened into one node arena.
//!
//! Nodes are addressed by arena index, so parent/child edges are plain index
//! lists and node identity is index equality. No node-level deduplication is
//! performed: structurally identical subtrees remain separate allocations,
//! and only the *generated routines* are shared, keyed by fingerprint.

pub mod build;
pub mod cost;
pub mod decoder;
pub mod lower;

use std::fmt::{self, Display};

use slotmap::{new_key_type, SlotMap};

use crate::ir::OpId;
use crate::proj::SelectChoice;

new_key_type! {
    pub struct NodeId;
}

/// A shape-only structural hash: a pure function of arity and child
/// fingerprints, never of concrete leaf values. Computed with a fixed FNV-1a
/// fold so it is stable across runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub fn of_children(children: &[Fingerprint]) -> Self {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = OFFSET;
        let mut fold = |value: u64| {
            for byte in value.to_le_bytes() {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(PRIME);
            }
        };

        fold(children.len() as u64);

        for child in children {
            fold(child.0);
        }

        Self(hash)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SegNode {
    pub label: String,
    pub children: Vec<NodeId>,
    pub parents: Vec<NodeId>,
    pub source_op: Option<OpId>,
    pub fingerprint: Fingerprint,
    pub is_root: bool,

    /// Set by the cost analyzer: this node's lowering becomes a standalone
    /// routine instead of being inlined at every use site.
    pub extract: bool,

    pub inline_cost: u32,
    pub subtree_size: u32,

    /// Cleared when two distinct concrete operations were found to map to
    /// this node, which makes fingerprint-based sharing unsound for it.
    pub specializable: bool,
}

/// A root context: one concrete execution path through a verification root,
/// fixed by a select-choice assignment.
#[derive(Debug, Clone)]
pub struct Projection {
    pub vi: OpId,
    pub root_op: OpId,
    pub node: NodeId,
    pub choices: Vec<SelectChoice>,
}

#[derive(Debug, Default)]
pub struct SegGraph {
    pub nodes: SlotMap<NodeId, SegNode>,
    pub projections: Vec<Projection>,
}

impl SegGraph {
    /// Allocates a node over already-allocated children, computing its
    /// fingerprint and patching the children's parent back-references.
    pub fn alloc(&mut self, label: String, children: Vec<NodeId>, source_op: Option<OpId>) -> NodeId {
        let child_fps: Vec<_> = children
            .iter()
            .map(|&child| self.nodes[child].fingerprint)
            .collect();

        let id = self.nodes.insert(SegNode {
            label,
            children: children.clone(),
            parents: vec![],
            source_op,
            fingerprint: Fingerprint::of_children(&child_fps),
            is_root: false,
            extract: false,
            inline_cost: 0,
            subtree_size: 0,
            specializable: true,
        });

        for child in children {
            self.nodes[child].parents.push(id);
        }

        id
    }

    pub fn projections_for(&self, vi: OpId) -> impl Iterator<Item = &Projection> {
        self.projections.iter().filter(move |proj| proj.vi == vi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprints_depend_on_shape_only() {
        let mut graph = SegGraph::default();

        let a = graph.alloc("a".into(), vec![], None);
        let b = graph.alloc("b".into(), vec![], None);
        let first = graph.alloc("first".into(), vec![a, b], None);

        let c = graph.alloc("c".into(), vec![], None);
        let d = graph.alloc("d".into(), vec![], None);
        let second = graph.alloc("second".into(), vec![c, d], None);

        assert_eq!(graph.nodes[a].fingerprint, graph.nodes[c].fingerprint);
        assert_eq!(
            graph.nodes[first].fingerprint,
            graph.nodes[second].fingerprint
        );

        let solo = graph.alloc("solo".into(), vec![a], None);
        assert_ne!(graph.nodes[solo].fingerprint, graph.nodes[first].fingerprint);
        assert_ne!(graph.nodes[solo].fingerprint, graph.nodes[a].fingerprint);
    }

    #[test]
    fn alloc_patches_parent_back_references() {
        let mut graph = SegGraph::default();

        let leaf = graph.alloc("leaf".into(), vec![], None);
        let first = graph.alloc("first".into(), vec![leaf], None);
        let second = graph.alloc("second".into(), vec![leaf], None);

        assert_eq!(graph.nodes[leaf].parents, vec![first, second]);
        assert!(graph.nodes[first].parents.is_empty());
    }
}
