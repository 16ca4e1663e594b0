//! Postorder lowering of SEG nodes into emitted code, with fingerprint-keyed
//! memoization of extracted routines.

use hashbrown::HashMap;
use log::trace;

use crate::emit::{Expr, FunctionDecl, Param, Stmt};
use crate::error::Error;
use crate::ir::Circuit;
use crate::names::NameGen;
use crate::seg::{Fingerprint, NodeId, SegGraph};

#[derive(Debug, Clone)]
pub struct Routine {
    pub name: String,
    pub fingerprint: Fingerprint,

    /// The first node registered under this fingerprint was a projection
    /// root, so decoders call the routine directly.
    pub external: bool,

    pub decl: FunctionDecl,
}

/// At most one routine per distinct fingerprint; entries are immutable once
/// created and the registry never shrinks.
#[derive(Debug, Default)]
pub struct RoutineRegistry {
    routines: HashMap<Fingerprint, Routine>,
    order: Vec<Fingerprint>,
}

impl RoutineRegistry {
    pub fn get(&self, fingerprint: Fingerprint) -> Option<&Routine> {
        self.routines.get(&fingerprint)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn into_routines(self) -> Vec<Routine> {
        let mut routines = self.routines;

        self.order
            .into_iter()
            .filter_map(|fingerprint| routines.remove(&fingerprint))
            .collect()
    }

    fn insert(&mut self, routine: Routine) {
        debug_assert!(!self.routines.contains_key(&routine.fingerprint));

        self.order.push(routine.fingerprint);
        self.routines.insert(routine.fingerprint, routine);
    }
}

/// The shared evaluation stack must hold every leaf value of the largest
/// verification root: the maximum, over all roots, of the summed subtree
/// sizes of that root's projections.
pub fn stack_capacity(graph: &SegGraph, circuit: &Circuit) -> Result<u32, Error> {
    let mut max = 0;

    for (index, &vi) in circuit.verify_roots.iter().enumerate() {
        let mut sum = 0;
        let mut seen = false;

        for proj in graph.projections_for(vi) {
            seen = true;
            sum += graph.nodes[proj.node].subtree_size;
        }

        if !seen {
            return Err(Error::NoProjections { index });
        }

        max = max.max(sum);
    }

    Ok(max)
}

pub struct Lowerer<'a> {
    graph: &'a SegGraph,
    registry: &'a mut RoutineRegistry,
    names: &'a mut NameGen,
}

impl<'a> Lowerer<'a> {
    pub fn new(
        graph: &'a SegGraph,
        registry: &'a mut RoutineRegistry,
        names: &'a mut NameGen,
    ) -> Self {
        Self {
            graph,
            registry,
            names,
        }
    }

    /// Lowers `node_id` and returns the handle holding its result together
    /// with the setup code that computes it.
    ///
    /// The setup pops the next stack slot into a fresh local and applies the
    /// runtime dispatch primitive to it and the children's handles. For an
    /// extracted node the setup migrates into a registered routine (reusing
    /// an existing one when the fingerprint matches) and the caller only
    /// sees a single call.
    pub fn lower(&mut self, node_id: NodeId) -> (Expr, Vec<Stmt>) {
        let node = &self.graph.nodes[node_id];
        let children = node.children.clone();
        let fingerprint = node.fingerprint;
        let extract = node.extract;
        let is_root = node.is_root;
        let label = node.label.clone();

        let popped = self.names.local();
        let mut handles = vec![];
        let mut setup = vec![];

        for &child in &children {
            let (handle, child_setup) = self.lower(child);
            handles.push(handle);
            setup.extend(child_setup);
        }

        let offset = Expr::deref(Expr::var("stack_offset"));
        setup.push(Stmt::local(
            popped.as_str(),
            Expr::index(Expr::var("stack"), offset.clone()),
        ));
        setup.push(Stmt::assign(
            offset.clone(),
            Expr::add(offset, Expr::int(1)),
        ));

        let mut args = vec![Expr::var(popped.as_str())];
        args.extend(handles);

        let result = self.names.local();
        setup.push(Stmt::local(result.as_str(), Expr::call("visitor.apply", args)));

        if !extract {
            return (Expr::var(result.as_str()), setup);
        }

        let name = match self.registry.get(fingerprint) {
            Some(routine) => routine.name.clone(),

            None => {
                let name = self.names.routine();
                trace!("registering {name} for {label} (fingerprint {fingerprint})");

                let mut body = setup;
                body.push(Stmt::Return(Expr::var(result.as_str())));

                self.registry.insert(Routine {
                    name: name.clone(),
                    fingerprint,
                    external: is_root,
                    decl: FunctionDecl {
                        name: name.clone(),
                        ret: "Value".into(),
                        params: routine_params(),
                        body,
                    },
                });

                name
            }
        };

        // the routine owns the setup code now; the caller sees one call
        let var = self.names.local();
        let call = Expr::call(
            name,
            vec![
                Expr::var("visitor"),
                Expr::var("stack"),
                Expr::var("stack_offset"),
            ],
        );

        (Expr::var(var.as_str()), vec![Stmt::local(var.as_str(), call)])
    }
}

fn routine_params() -> Vec<Param> {
    vec![
        Param::new("const Visitor&", "visitor"),
        Param::new("Value*", "stack"),
        Param::new("int*", "stack_offset"),
    ]
}
