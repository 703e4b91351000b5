/*!
Textual printing of functions for debugging and test assertions.

The output is not a parseable format; it exists so failures can be read.
*/

use crate::block::Terminator;
use crate::function::Function;
use crate::instructions::{BinaryOp, GepIndex, Instruction};
use crate::values::{Constant, GlobalKind, ValueId, ValueKind};
use std::fmt::Write;

/// Renders a whole function, one block per paragraph.
pub fn format_function(func: &Function) -> String {
    let mut out = String::new();
    let _ = write!(out, "fn {}(", func.name);
    for (i, param) in func.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}: {}", param, func.ty(*param));
    }
    out.push_str(") {\n");
    for (id, block) in &func.blocks {
        let _ = writeln!(out, "{}:", id);
        for inst_id in &block.insts {
            let _ = writeln!(out, "    {}", format_value_def(func, *inst_id));
        }
        let _ = writeln!(out, "    {}", format_terminator(&block.terminator));
    }
    out.push_str("}\n");
    out
}

fn format_terminator(term: &Terminator) -> String {
    match term {
        Terminator::Jump(target) => format!("jump {}", target),
        Terminator::Branch {
            condition,
            then_block,
            else_block,
        } => format!("br {}, {}, {}", condition, then_block, else_block),
        Terminator::Return(Some(v)) => format!("return {}", v),
        Terminator::Return(None) => "return".to_string(),
        Terminator::Invalid => "<invalid>".to_string(),
    }
}

/// Renders a single value definition, e.g. `v3: i32 = load v1`.
pub fn format_value_def(func: &Function, id: ValueId) -> String {
    let data = func.value(id);
    match &data.kind {
        ValueKind::Argument { index, .. } => {
            format!("{}: {} = arg {}", id, data.ty, index)
        }
        ValueKind::Global(g) => match &g.kind {
            GlobalKind::Variable { is_constant } => format!(
                "{}: {} = global {}{}",
                id,
                data.ty,
                g.name,
                if *is_constant { " const" } else { "" }
            ),
            GlobalKind::Alias { aliasee, .. } => {
                format!("{}: {} = alias {} -> {}", id, data.ty, g.name, aliasee)
            }
        },
        ValueKind::Constant(c) => match c {
            Constant::Int { bits, value } => format!("{}: i{} = const {}", id, bits, value),
            Constant::NullPtr { .. } => format!("{}: {} = null", id, data.ty),
            Constant::Undef => format!("{}: {} = undef", id, data.ty),
        },
        ValueKind::Inst { inst, .. } => {
            format!("{}: {} = {}", id, data.ty, format_instruction(inst))
        }
    }
}

fn format_instruction(inst: &Instruction) -> String {
    match inst {
        Instruction::Alloca { allocated } => format!("alloca {}", allocated),
        Instruction::Load { ptr } => format!("load {}", ptr),
        Instruction::Store { ptr, value } => format!("store {}, {}", ptr, value),
        Instruction::Gep {
            base,
            source_ty,
            indices,
        } => {
            let mut s = format!("gep {} ({})", base, source_ty);
            for index in indices {
                match index {
                    GepIndex::Const(n) => {
                        let _ = write!(s, ", {}", n);
                    }
                    GepIndex::Value(v) => {
                        let _ = write!(s, ", {}", v);
                    }
                }
            }
            s
        }
        Instruction::Phi { incoming } => {
            let mut s = String::from("phi");
            for (i, (block, value)) in incoming.iter().enumerate() {
                let _ = write!(s, "{} [{}, {}]", if i == 0 { "" } else { "," }, block, value);
            }
            s
        }
        Instruction::Select {
            condition,
            true_value,
            false_value,
        } => format!("select {}, {}, {}", condition, true_value, false_value),
        Instruction::BitCast { value } => format!("bitcast {}", value),
        Instruction::AddrSpaceCast { value } => format!("addrspacecast {}", value),
        Instruction::ZExt { value } => format!("zext {}", value),
        Instruction::SExt { value } => format!("sext {}", value),
        Instruction::Trunc { value } => format!("trunc {}", value),
        Instruction::Binary { op, lhs, rhs, nsw, nuw } => {
            let name = match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::Shl => "shl",
                BinaryOp::Or => "or",
            };
            let mut s = format!("{} {}, {}", name, lhs, rhs);
            if *nsw {
                s.push_str(" nsw");
            }
            if *nuw {
                s.push_str(" nuw");
            }
            s
        }
        Instruction::Call(call) => {
            let mut s = format!("call {}(", call.callee);
            for (i, arg) in call.args.iter().enumerate() {
                if i > 0 {
                    s.push_str(", ");
                }
                let _ = write!(s, "{}", arg);
            }
            s.push(')');
            s
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::types::{Type, TypeRegistry};
    use crate::values::ParamAttrs;

    #[test]
    fn test_format_simple_function() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("demo", &types);
        let p = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::default());
        let v = b.load(p).unwrap();
        b.ret(Some(v)).unwrap();
        let f = b.build().unwrap();

        let text = format_function(&f);
        assert!(text.contains("fn demo("));
        assert!(text.contains("load"));
        assert!(text.contains("return"));
    }

    #[test]
    fn test_format_gep_and_store() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("g", &types);
        let base = b.alloca(Type::Array(Box::new(Type::Int(8)), 16));
        let slot = b
            .gep(
                base,
                Type::Array(Box::new(Type::Int(8)), 16),
                vec![
                    crate::instructions::GepIndex::Const(0),
                    crate::instructions::GepIndex::Const(3),
                ],
            )
            .unwrap();
        let c = b.const_int(8, 1);
        b.store(slot, c);
        b.ret(None).unwrap();
        let f = b.build().unwrap();

        let text = format_function(&f);
        assert!(text.contains("gep"));
        assert!(text.contains("store"));
    }
}
