use crate::block::{BlockId, Terminator};
use crate::function::Function;
use crate::instructions::{BinaryOp, CallAttrs, CallInst, GepIndex, Instruction};
use crate::types::{Type, TypeRegistry};
use crate::values::{Constant, GlobalKind, GlobalValue, ParamAttrs, ValueData, ValueId, ValueKind};
use crate::{IrError, Result};
use std::collections::HashSet;

/// Builds a `Function` one instruction at a time.
///
/// Instruction methods return the produced `ValueId` and append to the
/// current block; terminator methods close the block. `build` refuses
/// functions with unterminated blocks.
pub struct FunctionBuilder<'a> {
    function: Function,
    types: &'a TypeRegistry,
    current_block: BlockId,
    created_blocks: HashSet<BlockId>,
}

impl<'a> FunctionBuilder<'a> {
    pub fn new(name: impl Into<String>, types: &'a TypeRegistry) -> Self {
        let function = Function::new(name);
        let entry = function.entry_block();
        let mut created_blocks = HashSet::new();
        created_blocks.insert(entry);
        Self {
            function,
            types,
            current_block: entry,
            created_blocks,
        }
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = self.function.create_block();
        self.created_blocks.insert(id);
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) -> Result<()> {
        if !self.created_blocks.contains(&block) {
            return Err(IrError::BuilderError(format!(
                "Block {} does not exist in function",
                block
            )));
        }
        self.current_block = block;
        Ok(())
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    pub fn param(&mut self, ty: Type, attrs: ParamAttrs) -> ValueId {
        let index = self.function.params.len() as u32;
        let id = self.function.values.push(ValueData {
            ty,
            kind: ValueKind::Argument { index, attrs },
        });
        self.function.params.push(id);
        id
    }

    pub fn global(&mut self, name: impl Into<String>, pointee: Type, is_constant: bool) -> ValueId {
        self.function.values.push(ValueData {
            ty: Type::ptr_to(pointee),
            kind: ValueKind::Global(GlobalValue {
                name: name.into(),
                kind: GlobalKind::Variable { is_constant },
            }),
        })
    }

    pub fn global_alias(
        &mut self,
        name: impl Into<String>,
        aliasee: ValueId,
        may_be_overridden: bool,
    ) -> ValueId {
        let ty = self.function.ty(aliasee).clone();
        self.function.values.push(ValueData {
            ty,
            kind: ValueKind::Global(GlobalValue {
                name: name.into(),
                kind: GlobalKind::Alias {
                    aliasee,
                    may_be_overridden,
                },
            }),
        })
    }

    pub fn const_int(&mut self, bits: u16, value: i128) -> ValueId {
        self.function.values.push(ValueData {
            ty: Type::Int(bits),
            kind: ValueKind::Constant(Constant::Int { bits, value }),
        })
    }

    pub fn const_null(&mut self, pointee: Type, addr_space: u32) -> ValueId {
        self.function.values.push(ValueData {
            ty: Type::Ptr {
                pointee: Box::new(pointee),
                addr_space,
            },
            kind: ValueKind::Constant(Constant::NullPtr { addr_space }),
        })
    }

    pub fn undef(&mut self, ty: Type) -> ValueId {
        self.function.values.push(ValueData {
            ty,
            kind: ValueKind::Constant(Constant::Undef),
        })
    }

    fn push_inst(&mut self, ty: Type, inst: Instruction) -> ValueId {
        let block = self.current_block;
        let id = self.function.values.push(ValueData {
            ty,
            kind: ValueKind::Inst { inst, block },
        });
        self.function
            .blocks
            .get_mut(&block)
            .expect("current block exists")
            .insts
            .push(id);
        id
    }

    pub fn alloca(&mut self, allocated: Type) -> ValueId {
        let ty = Type::ptr_to(allocated.clone());
        self.push_inst(ty, Instruction::Alloca { allocated })
    }

    pub fn load(&mut self, ptr: ValueId) -> Result<ValueId> {
        let ty = self
            .function
            .ty(ptr)
            .pointee()
            .cloned()
            .ok_or_else(|| IrError::TypeError(format!("load from non-pointer {}", ptr)))?;
        Ok(self.push_inst(ty, Instruction::Load { ptr }))
    }

    pub fn store(&mut self, ptr: ValueId, value: ValueId) -> ValueId {
        self.push_inst(Type::Void, Instruction::Store { ptr, value })
    }

    pub fn gep(
        &mut self,
        base: ValueId,
        source_ty: Type,
        indices: Vec<GepIndex>,
    ) -> Result<ValueId> {
        let addr_space = self
            .function
            .ty(base)
            .addr_space()
            .ok_or_else(|| IrError::TypeError(format!("gep base {} is not a pointer", base)))?;
        let result_pointee = gep_result_type(&source_ty, &indices, self.types)?;
        let ty = Type::Ptr {
            pointee: Box::new(result_pointee),
            addr_space,
        };
        Ok(self.push_inst(
            ty,
            Instruction::Gep {
                base,
                source_ty,
                indices,
            },
        ))
    }

    pub fn phi(&mut self, ty: Type, incoming: Vec<(BlockId, ValueId)>) -> ValueId {
        self.push_inst(ty, Instruction::Phi { incoming })
    }

    /// Adds an incoming edge to an existing phi. Needed when a phi's inputs
    /// are only available after later blocks are built (loop carries).
    pub fn add_phi_incoming(&mut self, phi: ValueId, block: BlockId, value: ValueId) -> Result<()> {
        match &mut self.function.values[phi].kind {
            ValueKind::Inst {
                inst: Instruction::Phi { incoming },
                ..
            } => {
                incoming.push((block, value));
                Ok(())
            }
            _ => Err(IrError::BuilderError(format!("{} is not a phi", phi))),
        }
    }

    pub fn select(&mut self, condition: ValueId, true_value: ValueId, false_value: ValueId) -> ValueId {
        let ty = self.function.ty(true_value).clone();
        self.push_inst(
            ty,
            Instruction::Select {
                condition,
                true_value,
                false_value,
            },
        )
    }

    pub fn bitcast(&mut self, value: ValueId, to: Type) -> ValueId {
        self.push_inst(to, Instruction::BitCast { value })
    }

    pub fn addr_space_cast(&mut self, value: ValueId, to: Type) -> ValueId {
        self.push_inst(to, Instruction::AddrSpaceCast { value })
    }

    pub fn zext(&mut self, value: ValueId, to_bits: u16) -> ValueId {
        self.push_inst(Type::Int(to_bits), Instruction::ZExt { value })
    }

    pub fn sext(&mut self, value: ValueId, to_bits: u16) -> ValueId {
        self.push_inst(Type::Int(to_bits), Instruction::SExt { value })
    }

    pub fn trunc(&mut self, value: ValueId, to_bits: u16) -> ValueId {
        self.push_inst(Type::Int(to_bits), Instruction::Trunc { value })
    }

    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: ValueId,
        rhs: ValueId,
        nsw: bool,
        nuw: bool,
    ) -> ValueId {
        let ty = self.function.ty(lhs).clone();
        self.push_inst(ty, Instruction::Binary { op, lhs, rhs, nsw, nuw })
    }

    pub fn add(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Add, lhs, rhs, false, false)
    }

    pub fn sub(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Sub, lhs, rhs, false, false)
    }

    pub fn mul(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Mul, lhs, rhs, false, false)
    }

    pub fn shl(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Shl, lhs, rhs, false, false)
    }

    pub fn or(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.binary(BinaryOp::Or, lhs, rhs, false, false)
    }

    pub fn call(
        &mut self,
        callee: impl Into<String>,
        return_ty: Type,
        args: Vec<ValueId>,
        arg_attrs: Vec<ParamAttrs>,
        attrs: CallAttrs,
    ) -> ValueId {
        self.push_inst(
            return_ty,
            Instruction::Call(CallInst {
                callee: callee.into(),
                args,
                arg_attrs,
                attrs,
            }),
        )
    }

    fn terminate(&mut self, term: Terminator) -> Result<()> {
        let block = self
            .function
            .blocks
            .get_mut(&self.current_block)
            .expect("current block exists");
        if block.is_terminated() {
            return Err(IrError::BuilderError(format!(
                "{} is already terminated",
                self.current_block
            )));
        }
        block.terminator = term;
        Ok(())
    }

    pub fn jump(&mut self, target: BlockId) -> Result<()> {
        self.terminate(Terminator::Jump(target))
    }

    pub fn branch(
        &mut self,
        condition: ValueId,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<()> {
        self.terminate(Terminator::Branch {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn ret(&mut self, value: Option<ValueId>) -> Result<()> {
        self.terminate(Terminator::Return(value))
    }

    pub fn build(self) -> Result<Function> {
        for (id, block) in &self.function.blocks {
            if !block.is_terminated() {
                return Err(IrError::BuilderError(format!("{} is not terminated", id)));
            }
        }
        Ok(self.function)
    }
}

/// Walks GEP indices through `source_ty`, yielding the pointee type of the
/// resulting pointer. The first index steps over whole `source_ty` objects.
fn gep_result_type(source_ty: &Type, indices: &[GepIndex], types: &TypeRegistry) -> Result<Type> {
    let mut current = source_ty.clone();
    for index in indices.iter().skip(1) {
        current = match current {
            Type::Array(elem, _) => (*elem).clone(),
            Type::Struct(id) => {
                let field = match index {
                    GepIndex::Const(n) => *n,
                    GepIndex::Value(_) => {
                        return Err(IrError::TypeError(
                            "struct field index must be constant".into(),
                        ))
                    }
                };
                let def = types
                    .get_struct(id)
                    .ok_or_else(|| IrError::TypeError(format!("unknown struct {}", id.0)))?;
                def.fields
                    .get(field as usize)
                    .cloned()
                    .ok_or_else(|| IrError::TypeError(format!("struct field {} out of range", field)))?
            }
            other => {
                return Err(IrError::TypeError(format!(
                    "cannot index into {}",
                    other
                )))
            }
        };
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_simple_function() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let p = b.alloca(Type::Int(32));
        let c = b.const_int(32, 7);
        b.store(p, c);
        let loaded = b.load(p).unwrap();
        b.ret(Some(loaded)).unwrap();
        let f = b.build().unwrap();
        assert_eq!(f.blocks.len(), 1);
        assert_eq!(f.block(f.entry_block()).unwrap().insts.len(), 3);
    }

    #[test]
    fn test_unterminated_block_rejected() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        b.alloca(Type::Int(8));
        assert!(matches!(b.build(), Err(IrError::BuilderError(_))));
    }

    #[test]
    fn test_switch_to_unknown_block_rejected() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        assert!(b.switch_to_block(BlockId(99)).is_err());
    }

    #[test]
    fn test_gep_result_type_walk() {
        let mut types = TypeRegistry::new();
        let pair = types.add_struct(crate::types::StructDefinition {
            name: "pair".into(),
            fields: vec![Type::Int(32), Type::Int(64)],
        });
        let mut b = FunctionBuilder::new("f", &types);
        let base = b.alloca(Type::Struct(pair));
        let field = b
            .gep(
                base,
                Type::Struct(pair),
                vec![GepIndex::Const(0), GepIndex::Const(1)],
            )
            .unwrap();
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert_eq!(f.ty(field), &Type::ptr_to(Type::Int(64)));
    }

    #[test]
    fn test_double_terminate_rejected() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        b.ret(None).unwrap();
        assert!(b.ret(None).is_err());
    }
}
