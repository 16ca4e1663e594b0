//! Compiles per-instruction verification conditions into shared
//! decoder/evaluator code.
//!
//! The pipeline runs four stages strictly in sequence: graph construction
//! ([`seg::build`]), cost analysis ([`seg::cost`]), routine extraction
//! ([`seg::lower`]) and decoder synthesis ([`seg::decoder`]). Identical
//! subtrees across all verification roots compile to a single routine,
//! invoked from every occurrence.

pub mod emit;
pub mod error;
pub mod ir;
pub mod names;
pub mod proj;
pub mod seg;

use std::fmt::{self, Display};

use log::debug;

use crate::emit::FunctionDecl;
use crate::ir::Circuit;
use crate::names::NameGen;
use crate::seg::lower::{Lowerer, Routine, RoutineRegistry};

pub use crate::error::Error;

/// The emitted program: the shared-stack capacity constant, every extracted
/// routine in registration order, and one decoder per verification root.
#[derive(Debug, Clone)]
pub struct Program {
    pub stack_capacity: u32,
    pub routines: Vec<Routine>,
    pub decoders: Vec<FunctionDecl>,
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "constexpr int MAX_SIZE_INSTR = {};", self.stack_capacity)?;

        for routine in &self.routines {
            writeln!(f)?;
            writeln!(
                f,
                "// called externally: {} hash: {}",
                routine.external, routine.fingerprint
            )?;
            write!(f, "{}", routine.decl)?;
        }

        for decoder in &self.decoders {
            writeln!(f)?;
            write!(f, "{decoder}")?;
        }

        Ok(())
    }
}

pub fn compile(circuit: &Circuit) -> Result<Program, Error> {
    let mut graph = seg::build::build(circuit)?;
    seg::cost::analyze(&mut graph, circuit)?;

    let stack_capacity = seg::lower::stack_capacity(&graph, circuit)?;
    debug!(
        "{} nodes, {} projections, stack capacity {stack_capacity}",
        graph.nodes.len(),
        graph.projections.len()
    );

    let mut registry = RoutineRegistry::default();
    let mut names = NameGen::new();

    {
        let mut lowerer = Lowerer::new(&graph, &mut registry, &mut names);

        for proj in &graph.projections {
            lowerer.lower(proj.node);
        }
    }

    debug!("{} routines extracted", registry.len());

    let decoders = seg::decoder::synthesize(&graph, circuit, &registry)?;

    Ok(Program {
        stack_capacity,
        routines: registry.into_routines(),
        decoders,
    })
}
