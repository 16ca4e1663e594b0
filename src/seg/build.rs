//! Graph construction: flattens every path tree of every verification root
//! into the SEG arena.

use log::trace;

use crate::error::Error;
use crate::ir::{Circuit, OpId, OpKind};
use crate::proj::{extract_paths, resolve, SelectChoice};
use crate::seg::{NodeId, Projection, SegGraph};

pub fn build(circuit: &Circuit) -> Result<SegGraph, Error> {
    let mut graph = SegGraph::default();

    for (vi_index, &vi) in circuit.verify_roots.iter().enumerate() {
        let mut path_index = 0;

        for path in extract_paths(circuit, vi) {
            // an advice constraint has no standalone value: whatever consumes
            // the advice obtains it transitively
            if matches!(circuit.kind(path.root_op), OpKind::AdviceConstraint) {
                continue;
            }

            let prefix = format!("vi_{vi_index}_path{path_index}_node");
            let mut counter = 0;
            let node = materialize(
                &mut graph,
                circuit,
                path.root_op,
                &path.choices,
                &prefix,
                &mut counter,
            )?;

            graph.nodes[node].is_root = true;
            graph.projections.push(Projection {
                vi,
                root_op: path.root_op,
                node,
                choices: path.choices,
            });

            path_index += 1;
        }

        trace!("verification root {vi_index}: materialized {path_index} paths");
    }

    Ok(graph)
}

fn materialize(
    graph: &mut SegGraph,
    circuit: &Circuit,
    op: OpId,
    choices: &[SelectChoice],
    prefix: &str,
    counter: &mut u32,
) -> Result<NodeId, Error> {
    let op = resolve(circuit, op, choices);
    let operands = circuit.operands(op);

    let mut children = Vec::with_capacity(operands.len());

    for &operand in operands {
        children.push(materialize(graph, circuit, operand, choices, prefix, counter)?);
    }

    if children.len() != operands.len() {
        return Err(Error::NotIsomorphic {
            label: format!("{prefix}{counter}"),
            expected: operands.len(),
            found: children.len(),
        });
    }

    let label = format!("{prefix}{counter}");
    *counter += 1;

    Ok(graph.alloc(label, children, Some(op)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_tree_per_choice_combination() {
        let mut circuit = Circuit::new();
        let selector = circuit.input(1);
        let a = circuit.input(8);
        let b = circuit.input(8);
        let left = circuit.push(OpKind::Add, vec![a, b]);
        let right = circuit.push(OpKind::Sub, vec![a, b]);
        let sel = circuit.select(1, selector, vec![left, right]);
        let vi = circuit.verify(vec![sel]);

        let graph = build(&circuit).unwrap();

        assert_eq!(graph.projections.len(), 2);
        // each path materializes its own three-node copy
        assert_eq!(graph.nodes.len(), 6);

        for proj in &graph.projections {
            assert_eq!(proj.vi, vi);
            assert_eq!(proj.root_op, sel);
            assert!(graph.nodes[proj.node].is_root);
            assert_eq!(graph.nodes[proj.node].children.len(), 2);
        }

        let sources: Vec<_> = graph
            .projections
            .iter()
            .map(|proj| graph.nodes[proj.node].source_op.unwrap())
            .collect();
        assert_eq!(sources, vec![left, right]);
    }

    #[test]
    fn advice_only_paths_are_dropped() {
        let mut circuit = Circuit::new();
        let advice = circuit.push(OpKind::Advice, vec![]);
        let value = circuit.input(8);
        let constraint = circuit.push(OpKind::AdviceConstraint, vec![advice, value]);
        let a = circuit.input(8);
        let b = circuit.input(8);
        let sum = circuit.push(OpKind::Add, vec![a, b]);
        circuit.verify(vec![constraint, sum]);

        let graph = build(&circuit).unwrap();

        assert_eq!(graph.projections.len(), 1);
        assert_eq!(graph.projections[0].root_op, sum);

        let root = graph
            .nodes
            .iter()
            .find(|(_, node)| node.is_root)
            .map(|(id, _)| id)
            .unwrap();
        assert_eq!(graph.projections[0].node, root);
    }

    #[test]
    fn labels_are_locally_unique() {
        let mut circuit = Circuit::new();
        let a = circuit.input(8);
        let not = circuit.push(OpKind::Not, vec![a]);
        circuit.verify(vec![not]);

        let graph = build(&circuit).unwrap();

        let mut labels: Vec<_> = graph.nodes.values().map(|node| node.label.clone()).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), graph.nodes.len());
    }
}
