//! Projection extraction: enumerates the execution paths through a
//! verification root.
//!
//! A path fixes one choice for every select decision point reachable from a
//! constraint subtree. The SEG pipeline consumes paths through
//! [`extract_paths`] only; how they are enumerated is of no concern to it.

use log::trace;
use slotmap::SecondaryMap;

use crate::ir::{Circuit, OpId, OpKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectChoice {
    pub sel: OpId,
    pub bits: u8,
    pub chosen: u64,
}

#[derive(Debug, Clone)]
pub struct Path {
    pub root_op: OpId,
    pub choices: Vec<SelectChoice>,
}

/// Enumerates all distinct paths through the constraints of `vi`: one path
/// per combination of select choices reachable from each constraint subtree.
pub fn extract_paths(circuit: &Circuit, vi: OpId) -> Vec<Path> {
    let mut paths = vec![];

    for &constraint in circuit.operands(vi) {
        let selects = collect_selects(circuit, constraint);
        let total: u64 = selects.iter().map(|&(_, bits)| 1u64 << bits).product();

        for combination in 0..total {
            let mut rest = combination;
            let mut choices = Vec::with_capacity(selects.len());

            for &(sel, bits) in &selects {
                let options = 1u64 << bits;
                choices.push(SelectChoice {
                    sel,
                    bits,
                    chosen: rest % options,
                });
                rest /= options;
            }

            paths.push(Path {
                root_op: constraint,
                choices,
            });
        }

        trace!(
            "constraint {constraint:?}: {} selects, {total} paths",
            selects.len()
        );
    }

    paths
}

/// Resolves select decisions: while `op` is a select with a recorded choice,
/// steps into the chosen value operand.
pub fn resolve(circuit: &Circuit, mut op: OpId, choices: &[SelectChoice]) -> OpId {
    while let OpKind::Select { .. } = circuit.kind(op) {
        let Some(choice) = choices.iter().find(|choice| choice.sel == op) else {
            break;
        };

        op = circuit.operands(op)[1 + choice.chosen as usize];
    }

    op
}

fn collect_selects(circuit: &Circuit, root: OpId) -> Vec<(OpId, u8)> {
    let mut found = vec![];
    let mut discovered = SecondaryMap::<OpId, ()>::new();
    let mut stack = vec![root];

    while let Some(op) = stack.pop() {
        if discovered.insert(op, ()).is_some() {
            continue;
        }

        if let OpKind::Select { bits } = circuit.kind(op) {
            found.push((op, bits));
            // the selector operand is decode-time state, not semantics
            stack.extend(circuit.operands(op).iter().skip(1).copied());
        } else {
            stack.extend(circuit.operands(op).iter().copied());
        }
    }

    found
}
