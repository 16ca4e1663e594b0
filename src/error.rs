use thiserror::Error;

use crate::seg::Fingerprint;

/// Fatal internal-consistency violations. Each of these indicates a
/// construction or pipeline-ordering bug, not a property of the input
/// circuit, and aborts the compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(
        "node {label} is not isomorphic to its source operation: \
         {expected} operands vs {found} children"
    )]
    NotIsomorphic {
        label: String,
        expected: usize,
        found: usize,
    },

    #[error("no routine registered for fingerprint {0}")]
    MissingRoutine(Fingerprint),

    #[error("verification root {index} has no projections")]
    NoProjections { index: usize },
}
