//! An arena-based circuit IR: the input surface consumed by the SEG pipeline.

use slotmap::{new_key_type, SlotMap};
use strum::Display;

new_key_type! {
    pub struct OpId;
}

/// The closed set of operation kinds a lifted circuit can contain.
///
/// `Select` carries the bit width of its decode-time selector; its first
/// operand is the selector, followed by `2^bits` value operands. `Verify`
/// operands are the constraint subtrees of one decoded instruction variant.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum OpKind {
    InputBits { width: u16 },
    Constant { bits: u64, width: u16 },
    Advice,
    AdviceConstraint,

    Not,
    Extract { lo: u16, hi: u16 },

    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
    Eq,
    Concat,

    Select { bits: u8 },
    Verify,
}

#[derive(Debug, Clone)]
pub struct Op {
    pub kind: OpKind,
    pub operands: Vec<OpId>,
}

#[derive(Debug, Default, Clone)]
pub struct Circuit {
    pub ops: SlotMap<OpId, Op>,
    pub verify_roots: Vec<OpId>,
}

impl Circuit {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, kind: OpKind, operands: Vec<OpId>) -> OpId {
        self.ops.insert(Op { kind, operands })
    }

    pub fn input(&mut self, width: u16) -> OpId {
        self.push(OpKind::InputBits { width }, vec![])
    }

    pub fn constant(&mut self, bits: u64, width: u16) -> OpId {
        self.push(OpKind::Constant { bits, width }, vec![])
    }

    pub fn select(&mut self, bits: u8, selector: OpId, values: Vec<OpId>) -> OpId {
        assert_eq!(
            values.len(),
            1usize << bits,
            "select must carry one value per selector pattern"
        );

        let mut operands = vec![selector];
        operands.extend(values);

        self.push(OpKind::Select { bits }, operands)
    }

    pub fn verify(&mut self, constraints: Vec<OpId>) -> OpId {
        let id = self.push(OpKind::Verify, constraints);
        self.verify_roots.push(id);

        id
    }

    pub fn kind(&self, op: OpId) -> OpKind {
        self.ops[op].kind
    }

    pub fn operands(&self, op: OpId) -> &[OpId] {
        &self.ops[op].operands
    }
}
