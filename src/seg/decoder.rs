//! Decoder synthesis: one dispatch function per verification root, invoking
//! the extracted routines behind bit-level selection guards.

use hashbrown::{HashMap, HashSet};
use log::debug;

use crate::emit::{Expr, FunctionDecl, Param, Stmt};
use crate::error::Error;
use crate::ir::{Circuit, OpId};
use crate::names::Numbering;
use crate::proj::{resolve, SelectChoice};
use crate::seg::lower::RoutineRegistry;
use crate::seg::{NodeId, Projection, SegGraph};

pub fn synthesize(
    graph: &SegGraph,
    circuit: &Circuit,
    registry: &RoutineRegistry,
) -> Result<Vec<FunctionDecl>, Error> {
    let mut synth = Synthesizer {
        graph,
        circuit,
        registry,
        selects: Numbering::default(),
        op_refs: Numbering::default(),
    };

    let mut decoders = vec![];

    for (vi_index, &vi) in circuit.verify_roots.iter().enumerate() {
        decoders.push(synth.decoder_for(vi_index, vi)?);
    }

    Ok(decoders)
}

/// How a multi-member guard group relates to the full cross-product of its
/// selection variables. Computed for diagnostics only: emission always stays
/// one guarded branch per member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupShape {
    pub selects: usize,
    pub target_count: u64,
    pub independent: bool,
}

pub fn group_shape(members: &[&Projection]) -> GroupShape {
    let mut seen = HashSet::new();
    let mut target_count = 1u64;

    for proj in members {
        for choice in &proj.choices {
            if seen.insert(choice.sel) {
                target_count *= 1u64 << choice.bits;
            }
        }
    }

    GroupShape {
        selects: seen.len(),
        target_count,
        independent: members.len() as u64 == target_count,
    }
}

struct Synthesizer<'a> {
    graph: &'a SegGraph,
    circuit: &'a Circuit,
    registry: &'a RoutineRegistry,
    selects: Numbering<OpId>,
    op_refs: Numbering<OpId>,
}

impl Synthesizer<'_> {
    fn decoder_for(&mut self, vi_index: usize, vi: OpId) -> Result<FunctionDecl, Error> {
        let projections: Vec<&Projection> = self.graph.projections_for(vi).collect();

        if projections.is_empty() {
            return Err(Error::NoProjections { index: vi_index });
        }

        // group by concrete root operation, preserving first-seen order
        let mut groups = HashMap::<OpId, Vec<&Projection>>::new();
        let mut keys = vec![];

        for proj in projections {
            let members = groups.entry(proj.root_op).or_default();

            if members.is_empty() {
                keys.push(proj.root_op);
            }

            members.push(proj);
        }

        let mut body = vec![Stmt::typed_local("int", "stack_offset", Expr::int(0))];

        for key in keys {
            let members = &groups[&key];

            if members.len() > 1 {
                let shape = group_shape(members);

                if shape.independent {
                    debug!(
                        "root op {key:?}: {} members form an independent cross-product \
                         of {} selects",
                        members.len(),
                        shape.selects
                    );
                } else {
                    debug!(
                        "root op {key:?}: {} members are correlated ({} combinations expected)",
                        members.len(),
                        shape.target_count
                    );
                }
            }

            for &proj in members {
                body.extend(self.projection_branch(proj)?);
            }
        }

        Ok(FunctionDecl {
            name: format!("decode_vi{vi_index}"),
            ret: "void".into(),
            params: vec![
                Param::new("const Visitor&", "visitor"),
                Param::new("Value*", "stack"),
            ],
            body,
        })
    }

    /// Emits one branch for a projection: the leaf-value stack writes in
    /// lockstep traversal order, then the call into the root's registered
    /// routine, guarded by the projection's select choices if it has any.
    fn projection_branch(&mut self, proj: &Projection) -> Result<Vec<Stmt>, Error> {
        let mut body = vec![];
        self.push_operands(proj.node, proj.root_op, &proj.choices, &mut body)?;

        let fingerprint = self.graph.nodes[proj.node].fingerprint;
        let Some(routine) = self.registry.get(fingerprint) else {
            return Err(Error::MissingRoutine(fingerprint));
        };

        body.push(Stmt::Expr(Expr::call(
            routine.name.as_str(),
            vec![
                Expr::var("visitor"),
                Expr::var("stack"),
                Expr::addr_of(Expr::var("stack_offset")),
            ],
        )));

        if proj.choices.is_empty() {
            return Ok(body);
        }

        let mut cond: Option<Expr> = None;

        for choice in &proj.choices {
            let number = self.selects.number(choice.sel);
            let test = Expr::eq(
                Expr::var(format!("select_{number}")),
                Expr::int(choice.chosen as i64),
            );

            cond = Some(match cond {
                Some(acc) => Expr::and(acc, test),
                None => test,
            });
        }

        let Some(cond) = cond else {
            unreachable!("choices are non-empty");
        };

        Ok(vec![Stmt::if_(cond, body)])
    }

    fn push_operands(
        &mut self,
        node_id: NodeId,
        op: OpId,
        choices: &[SelectChoice],
        out: &mut Vec<Stmt>,
    ) -> Result<(), Error> {
        let op = resolve(self.circuit, op, choices);

        out.push(Stmt::assign(
            Expr::index(Expr::var("stack"), Expr::var("stack_offset")),
            Expr::var(self.op_ref(op)),
        ));
        out.push(Stmt::assign(
            Expr::var("stack_offset"),
            Expr::add(Expr::var("stack_offset"), Expr::int(1)),
        ));

        let operands = self.circuit.operands(op).to_vec();
        let children = self.graph.nodes[node_id].children.clone();

        if operands.len() != children.len() {
            return Err(Error::NotIsomorphic {
                label: self.graph.nodes[node_id].label.clone(),
                expected: operands.len(),
                found: children.len(),
            });
        }

        for (&child, &operand) in children.iter().zip(&operands) {
            self.push_operands(child, operand, choices, out)?;
        }

        Ok(())
    }

    /// Stable reference name for a concrete operation's value; resolving the
    /// name into an actual value expression is the outer emitter's job.
    fn op_ref(&mut self, op: OpId) -> String {
        format!("{}_{}", self.circuit.kind(op), self.op_refs.number(op))
    }
}

#[cfg(test)]
mod tests {
    use crate::ir::OpKind;
    use crate::names::NameGen;
    use crate::seg::build::build;
    use crate::seg::cost::analyze;
    use crate::seg::lower::Lowerer;

    use super::*;

    fn pipeline(circuit: &Circuit) -> (SegGraph, RoutineRegistry) {
        let mut graph = build(circuit).unwrap();
        analyze(&mut graph, circuit).unwrap();

        let mut registry = RoutineRegistry::default();
        let mut names = NameGen::new();
        let mut lowerer = Lowerer::new(&graph, &mut registry, &mut names);

        for proj in &graph.projections {
            lowerer.lower(proj.node);
        }

        (graph, registry)
    }

    fn projection(vi: OpId, root_op: OpId, node: NodeId, choices: Vec<SelectChoice>) -> Projection {
        Projection {
            vi,
            root_op,
            node,
            choices,
        }
    }

    #[test]
    fn complete_cross_products_classify_independent() {
        let mut circuit = Circuit::new();
        let sel_a = circuit.input(1);
        let sel_b = circuit.input(1);
        let vi = circuit.verify(vec![]);

        let mut graph = SegGraph::default();
        let node = graph.alloc("n".into(), vec![], None);

        let members: Vec<Projection> = (0..4u64)
            .map(|i| {
                projection(
                    vi,
                    vi,
                    node,
                    vec![
                        SelectChoice {
                            sel: sel_a,
                            bits: 1,
                            chosen: i & 1,
                        },
                        SelectChoice {
                            sel: sel_b,
                            bits: 1,
                            chosen: (i >> 1) & 1,
                        },
                    ],
                )
            })
            .collect();

        let refs: Vec<&Projection> = members.iter().collect();
        let shape = group_shape(&refs);
        assert_eq!(shape.selects, 2);
        assert_eq!(shape.target_count, 4);
        assert!(shape.independent);

        let shape = group_shape(&refs[..3]);
        assert_eq!(shape.target_count, 4);
        assert!(!shape.independent);
    }

    #[test]
    fn singleton_groups_emit_no_guard() {
        let mut circuit = Circuit::new();
        let a = circuit.input(8);
        let b = circuit.input(8);
        let sum = circuit.push(OpKind::Add, vec![a, b]);
        circuit.verify(vec![sum]);

        let (graph, registry) = pipeline(&circuit);
        let decoders = synthesize(&graph, &circuit, &registry).unwrap();

        assert_eq!(decoders.len(), 1);
        assert!(!decoders[0].to_string().contains("if "));
    }

    #[test]
    fn multi_member_groups_guard_every_member() {
        let mut circuit = Circuit::new();
        let selector = circuit.input(1);
        let a = circuit.input(8);
        let b = circuit.input(8);
        let left = circuit.push(OpKind::Add, vec![a, b]);
        let right = circuit.push(OpKind::Sub, vec![a, b]);
        let sel = circuit.select(1, selector, vec![left, right]);
        circuit.verify(vec![sel]);

        let (graph, registry) = pipeline(&circuit);
        let decoders = synthesize(&graph, &circuit, &registry).unwrap();
        let text = decoders[0].to_string();

        assert!(text.contains("if (select_0 == 0) {"));
        assert!(text.contains("if (select_0 == 1) {"));
    }

    #[test]
    fn unregistered_routines_are_fatal() {
        let mut circuit = Circuit::new();
        let a = circuit.input(8);
        let b = circuit.input(8);
        let sum = circuit.push(OpKind::Add, vec![a, b]);
        circuit.verify(vec![sum]);

        let mut graph = build(&circuit).unwrap();
        analyze(&mut graph, &circuit).unwrap();

        let registry = RoutineRegistry::default();
        let err = synthesize(&graph, &circuit, &registry).unwrap_err();
        assert!(matches!(err, Error::MissingRoutine(_)));
    }
}
