//! Cost analysis: decides which nodes are worth extracting into standalone
//! routines, and checks that every node stays isomorphic to its source
//! operation.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use log::warn;
use slotmap::SecondaryMap;

use crate::error::Error;
use crate::ir::{Circuit, OpId};
use crate::proj::{resolve, SelectChoice};
use crate::seg::{NodeId, SegGraph};

/// A node whose inlined cost reaches the cost of a call (1 unit) plus its own
/// evaluation is worth sharing.
pub const EXTRACT_THRESHOLD: u32 = 2;

pub fn analyze(graph: &mut SegGraph, circuit: &Circuit) -> Result<(), Error> {
    for node_id in postorder(graph) {
        let children = graph.nodes[node_id].children.clone();

        let mut inline_cost = 1;
        let mut subtree_size = 1;

        for &child_id in &children {
            let child = &graph.nodes[child_id];
            inline_cost += if child.extract { 1 } else { child.inline_cost };
            subtree_size += child.subtree_size;
        }

        let node = &mut graph.nodes[node_id];
        node.inline_cost = inline_cost;
        node.subtree_size = subtree_size;
        node.extract = inline_cost >= EXTRACT_THRESHOLD || node.is_root;
    }

    let mut specs = HashMap::new();
    let projections = graph.projections.clone();

    for proj in &projections {
        specialize(graph, circuit, &mut specs, proj.node, proj.root_op, &proj.choices)?;
    }

    Ok(())
}

/// Children-before-parents order over every projection tree.
fn postorder(graph: &SegGraph) -> Vec<NodeId> {
    struct Task {
        node: NodeId,
        next_child: usize,
    }

    let mut order = vec![];
    let mut discovered = SecondaryMap::<NodeId, ()>::new();
    let mut stack = vec![];

    for proj in &graph.projections {
        if discovered.insert(proj.node, ()).is_some() {
            continue;
        }

        stack.push(Task {
            node: proj.node,
            next_child: 0,
        });

        while let Some(&mut Task {
            node,
            ref mut next_child,
        }) = stack.last_mut()
        {
            if let Some(&child) = graph.nodes[node].children.get(*next_child) {
                *next_child += 1;

                if discovered.insert(child, ()).is_none() {
                    stack.push(Task {
                        node: child,
                        next_child: 0,
                    });
                }
            } else {
                order.push(node);
                stack.pop();
            }
        }
    }

    order
}

/// Walks a node tree in lockstep with its choice-resolved source operation.
/// A node already associated with a different operation loses its
/// `specializable` flag; an arity mismatch is a fatal isomorphism violation.
fn specialize(
    graph: &mut SegGraph,
    circuit: &Circuit,
    specs: &mut HashMap<NodeId, OpId>,
    node_id: NodeId,
    op: OpId,
    choices: &[SelectChoice],
) -> Result<(), Error> {
    let op = resolve(circuit, op, choices);

    match specs.entry(node_id) {
        Entry::Occupied(entry) if *entry.get() != op => {
            let node = &mut graph.nodes[node_id];
            warn!(
                "node {} maps to two distinct operations; sharing it would be unsound",
                node.label
            );
            node.specializable = false;
        }

        Entry::Occupied(_) => {}

        Entry::Vacant(entry) => {
            entry.insert(op);
        }
    }

    let operands = circuit.operands(op).to_vec();
    let children = graph.nodes[node_id].children.clone();

    if operands.len() != children.len() {
        return Err(Error::NotIsomorphic {
            label: graph.nodes[node_id].label.clone(),
            expected: operands.len(),
            found: children.len(),
        });
    }

    for (&child, &operand) in children.iter().zip(&operands) {
        specialize(graph, circuit, specs, child, operand, choices)?;
    }

    Ok(())
}
