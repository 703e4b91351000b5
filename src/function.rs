use crate::block::{BasicBlock, BlockId};
use crate::instructions::Instruction;
use crate::values::{Constant, ValueData, ValueId, ValueKind};
use cranelift_entity::PrimaryMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single function: the value arena plus its control-flow graph.
///
/// The arena owns every value the function can mention, including the
/// globals and constants it references; alias queries are scoped to one
/// function, so there is no cross-function value identity to maintain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub values: PrimaryMap<ValueId, ValueData>,
    pub params: Vec<ValueId>,
    pub entry_block: BlockId,
    pub blocks: IndexMap<BlockId, BasicBlock>,
    next_block_id: u32,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        let entry_block = BlockId(0);
        let mut blocks = IndexMap::new();
        blocks.insert(entry_block, BasicBlock::new(entry_block));
        Self {
            name: name.into(),
            values: PrimaryMap::new(),
            params: Vec::new(),
            entry_block,
            blocks,
            next_block_id: 1,
        }
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry_block
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.insert(id, BasicBlock::new(id));
        id
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    pub fn value(&self, v: ValueId) -> &ValueData {
        &self.values[v]
    }

    pub fn ty(&self, v: ValueId) -> &crate::types::Type {
        &self.values[v].ty
    }

    pub fn is_pointer(&self, v: ValueId) -> bool {
        self.values[v].ty.is_pointer()
    }

    pub fn as_inst(&self, v: ValueId) -> Option<&Instruction> {
        self.values[v].as_inst()
    }

    pub fn as_constant(&self, v: ValueId) -> Option<&Constant> {
        self.values[v].as_constant()
    }

    pub fn const_int_value(&self, v: ValueId) -> Option<i128> {
        self.as_constant(v).and_then(Constant::as_int)
    }

    pub fn is_undef(&self, v: ValueId) -> bool {
        self.as_constant(v).is_some_and(Constant::is_undef)
    }

    /// Block containing the definition of an instruction value.
    pub fn def_block(&self, v: ValueId) -> Option<BlockId> {
        match &self.values[v].kind {
            ValueKind::Inst { block, .. } => Some(*block),
            _ => None,
        }
    }

    /// `(block, index)` of an instruction value's definition.
    pub fn def_site(&self, v: ValueId) -> Option<(BlockId, usize)> {
        let block = self.def_block(v)?;
        let index = self.blocks.get(&block)?.position_of(v)?;
        Some((block, index))
    }

    /// All uses of `v` in instructions and terminators.
    pub fn uses_of(&self, v: ValueId) -> Vec<UseSite> {
        let mut uses = Vec::new();
        for (&block_id, block) in &self.blocks {
            for (index, &inst_value) in block.insts.iter().enumerate() {
                if let Some(inst) = self.as_inst(inst_value) {
                    for (operand_no, operand) in inst.operands().into_iter().enumerate() {
                        if operand == v {
                            uses.push(UseSite {
                                block: block_id,
                                index,
                                kind: UseKind::Inst {
                                    user: inst_value,
                                    operand_no,
                                },
                            });
                        }
                    }
                }
            }
            if let crate::block::Terminator::Return(Some(ret)) = block.terminator {
                if ret == v {
                    uses.push(UseSite {
                        block: block_id,
                        index: block.insts.len(),
                        kind: UseKind::Return,
                    });
                }
            }
        }
        uses
    }

    /// Whether `v` flows into a `Return` terminator anywhere.
    pub fn is_returned(&self, v: ValueId) -> bool {
        self.blocks.values().any(|block| {
            matches!(block.terminator, crate::block::Terminator::Return(Some(ret)) if ret == v)
        })
    }
}

/// One use of a value: where it sits and what kind of user it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseSite {
    pub block: BlockId,
    pub index: usize,
    pub kind: UseKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UseKind {
    Inst { user: ValueId, operand_no: usize },
    Return,
}
