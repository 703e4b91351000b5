use crate::block::BlockId;
use crate::types::Type;
use crate::values::{ParamAttrs, ValueId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Instruction {
    /// Stack allocation of one `allocated` object.
    Alloca {
        allocated: Type,
    },
    Load {
        ptr: ValueId,
    },
    Store {
        ptr: ValueId,
        value: ValueId,
    },
    /// Address arithmetic over `source_ty`, starting at `base`.
    Gep {
        base: ValueId,
        source_ty: Type,
        indices: Vec<GepIndex>,
    },
    Phi {
        incoming: Vec<(BlockId, ValueId)>,
    },
    Select {
        condition: ValueId,
        true_value: ValueId,
        false_value: ValueId,
    },
    BitCast {
        value: ValueId,
    },
    AddrSpaceCast {
        value: ValueId,
    },
    ZExt {
        value: ValueId,
    },
    SExt {
        value: ValueId,
    },
    Trunc {
        value: ValueId,
    },
    Binary {
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        nsw: bool,
        nuw: bool,
    },
    Call(CallInst),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Shl,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GepIndex {
    Const(i64),
    Value(ValueId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInst {
    pub callee: String,
    pub args: Vec<ValueId>,
    pub arg_attrs: Vec<ParamAttrs>,
    pub attrs: CallAttrs,
}

/// Declared memory behavior and return properties of a call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallAttrs {
    pub does_not_access_memory: bool,
    pub only_reads_memory: bool,
    pub only_accesses_arg_memory: bool,
    pub returns_noalias: bool,
    pub is_tail_call: bool,
}

impl CallInst {
    pub fn arg_attrs(&self, index: usize) -> ParamAttrs {
        self.arg_attrs.get(index).copied().unwrap_or_default()
    }
}

impl Instruction {
    /// Every value operand, in operand order.
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Instruction::Alloca { .. } => vec![],
            Instruction::Load { ptr } => vec![*ptr],
            Instruction::Store { ptr, value } => vec![*ptr, *value],
            Instruction::Gep { base, indices, .. } => {
                let mut ops = vec![*base];
                for index in indices {
                    if let GepIndex::Value(v) = index {
                        ops.push(*v);
                    }
                }
                ops
            }
            Instruction::Phi { incoming } => incoming.iter().map(|(_, v)| *v).collect(),
            Instruction::Select {
                condition,
                true_value,
                false_value,
            } => vec![*condition, *true_value, *false_value],
            Instruction::BitCast { value }
            | Instruction::AddrSpaceCast { value }
            | Instruction::ZExt { value }
            | Instruction::SExt { value }
            | Instruction::Trunc { value } => vec![*value],
            Instruction::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            Instruction::Call(call) => call.args.clone(),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Instruction::Call(_))
    }

    pub fn as_call(&self) -> Option<&CallInst> {
        match self {
            Instruction::Call(call) => Some(call),
            _ => None,
        }
    }

    pub fn is_phi(&self) -> bool {
        matches!(self, Instruction::Phi { .. })
    }
}
