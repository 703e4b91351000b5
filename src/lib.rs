/*! Function-scoped SSA IR with byte-precise alias analysis.
 *
 * Optimizer passes need to know whether two memory accesses can touch the
 * same bytes before they can reorder, merge, or delete them. This crate
 * provides the IR building blocks and an alias-analysis engine that answers
 * that question conservatively: `MayAlias` is always a legal answer, while
 * `NoAlias` and `MustAlias` carry proofs.
 */

pub mod analysis;
pub mod block;
pub mod builder;
pub mod format;
pub mod function;
pub mod instructions;
pub mod ir_persist;
pub mod layout;
pub mod types;
pub mod values;

pub use analysis::alias::{
    AccessTag, AliasResult, MemoryBehavior, MemoryLocation, ModRefInfo, Size,
};
pub use analysis::basic::BasicAliasAnalysis;
pub use analysis::chain::{AliasChain, AliasProvider};
pub use analysis::objects::{
    is_identified_object, is_no_alias_argument, is_no_alias_call, underlying_object,
};
pub use block::{BasicBlock, BlockId, Terminator};
pub use builder::FunctionBuilder;
pub use function::Function;
pub use instructions::{CallAttrs, GepIndex, Instruction};
pub use layout::{DataLayout, StructLayout};
pub use types::{StructDefinition, StructId, Type, TypeRegistry};
pub use values::{Constant, ParamAttrs, ValueData, ValueId, ValueKind};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrError {
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),
    #[error("Builder error: {0}")]
    BuilderError(String),
}

pub type Result<T> = std::result::Result<T, IrError>;

#[cfg(test)]
mod tests;
