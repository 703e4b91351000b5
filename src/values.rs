use crate::block::BlockId;
use crate::instructions::Instruction;
use crate::types::Type;
use cranelift_entity::entity_impl;
use serde::{Deserialize, Serialize};

/// Stable handle into a function's value arena.
///
/// Handles replace the pointer-keyed identity of a conventional use-list IR:
/// caches and visited sets key on `ValueId` and never hold references into
/// the arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(u32);
entity_impl!(ValueId, "v");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueData {
    pub ty: Type,
    pub kind: ValueKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ValueKind {
    Argument { index: u32, attrs: ParamAttrs },
    Global(GlobalValue),
    Constant(Constant),
    Inst { inst: Instruction, block: BlockId },
}

impl ValueData {
    pub fn as_inst(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Inst { inst, .. } => Some(inst),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ValueKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.kind, ValueKind::Argument { .. })
    }
}

/// Attributes attached to function parameters and call-site arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamAttrs {
    pub noalias: bool,
    pub byval: bool,
    pub nonnull: bool,
    pub nocapture: bool,
    pub readonly: bool,
    pub readnone: bool,
}

impl ParamAttrs {
    pub fn noalias() -> Self {
        Self {
            noalias: true,
            ..Default::default()
        }
    }

    pub fn byval() -> Self {
        Self {
            byval: true,
            ..Default::default()
        }
    }

    pub fn nocapture() -> Self {
        Self {
            nocapture: true,
            ..Default::default()
        }
    }

    pub fn nonnull() -> Self {
        Self {
            nonnull: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalValue {
    pub name: String,
    pub kind: GlobalKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GlobalKind {
    Variable { is_constant: bool },
    /// A named alias of another global. An overridable alias may resolve to
    /// a different definition at link time, so nothing may look through it.
    Alias {
        aliasee: ValueId,
        may_be_overridden: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Int { bits: u16, value: i128 },
    NullPtr { addr_space: u32 },
    Undef,
}

impl Constant {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            Constant::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_null_ptr(&self) -> bool {
        matches!(self, Constant::NullPtr { .. })
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Constant::Undef)
    }
}
