/*!
Composition of alias-analysis providers.

Providers answer conservatively and independently; `AliasChain` asks each
in turn and combines their answers, so adding a provider can only sharpen
results. The chain also owns the query forms that need to look at the
function itself: call-versus-location and call-versus-call mod/ref.
*/

use crate::analysis::alias::{
    AliasResult, MemoryBehavior, MemoryLocation, ModRefInfo, Size,
};
use crate::block::BlockId;
use crate::function::Function;
use crate::instructions::Instruction;
use crate::layout::DataLayout;
use crate::types::TypeRegistry;
use crate::values::ValueId;

/// One composable alias analysis. Every method has a sound conservative
/// default, so a provider only overrides what it can actually sharpen.
pub trait AliasProvider {
    fn alias(&mut self, _a: &MemoryLocation, _b: &MemoryLocation) -> AliasResult {
        AliasResult::MayAlias
    }

    fn points_to_constant_memory(&mut self, _loc: &MemoryLocation, _or_local: bool) -> bool {
        false
    }

    fn get_mod_ref_info(&mut self, _call: ValueId, _loc: &MemoryLocation) -> ModRefInfo {
        ModRefInfo::MOD_REF
    }

    fn call_behavior(&mut self, _call: ValueId) -> MemoryBehavior {
        MemoryBehavior::UNKNOWN
    }
}

/// Combines two providers' answers for the same query. `MayAlias` yields
/// to anything; a definite overlap claim meeting `MustAlias` keeps the
/// weaker overlap claim. `NoAlias` against an overlap claim means one
/// provider is unsound; the conservative answer papers over it in
/// release builds.
pub fn combine_alias_results(a: AliasResult, b: AliasResult) -> AliasResult {
    use AliasResult::*;
    match (a, b) {
        _ if a == b => a,
        (MayAlias, x) | (x, MayAlias) => x,
        (PartialAlias, MustAlias) | (MustAlias, PartialAlias) => PartialAlias,
        _ => {
            debug_assert!(false, "alias providers contradict each other: {:?} vs {:?}", a, b);
            MayAlias
        }
    }
}

/// An ordered list of providers answering as one analysis.
pub struct AliasChain<'a> {
    func: &'a Function,
    layout: &'a DataLayout,
    types: &'a TypeRegistry,
    providers: Vec<Box<dyn AliasProvider + 'a>>,
}

impl<'a> AliasChain<'a> {
    pub fn new(func: &'a Function, layout: &'a DataLayout, types: &'a TypeRegistry) -> Self {
        Self {
            func,
            layout,
            types,
            providers: Vec::new(),
        }
    }

    pub fn push(&mut self, provider: Box<dyn AliasProvider + 'a>) {
        self.providers.push(provider);
    }

    pub fn alias(&mut self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult {
        let mut result = AliasResult::MayAlias;
        for provider in &mut self.providers {
            result = combine_alias_results(result, provider.alias(a, b));
        }
        result
    }

    pub fn is_no_alias(&mut self, a: &MemoryLocation, b: &MemoryLocation) -> bool {
        self.alias(a, b) == AliasResult::NoAlias
    }

    pub fn points_to_constant_memory(&mut self, loc: &MemoryLocation, or_local: bool) -> bool {
        self.providers
            .iter_mut()
            .any(|p| p.points_to_constant_memory(loc, or_local))
    }

    /// Combined declared behavior of a call across providers.
    pub fn call_behavior(&mut self, call: ValueId) -> MemoryBehavior {
        let mut behavior = MemoryBehavior::UNKNOWN;
        for provider in &mut self.providers {
            behavior = behavior.intersect(provider.call_behavior(call));
            if behavior.does_not_access_memory() {
                break;
            }
        }
        behavior
    }

    /// What the call could do to the location: behavior mask, then the
    /// argument-pointee test for arg-only callees, then the constant-memory
    /// write exclusion, then each provider's own refinement.
    pub fn mod_ref_info(&mut self, call: ValueId, loc: &MemoryLocation) -> ModRefInfo {
        let behavior = self.call_behavior(call);
        if behavior.does_not_access_memory() {
            return ModRefInfo::NO;
        }

        let mut mask = ModRefInfo::MOD_REF;
        if behavior.only_reads_memory() {
            mask = ModRefInfo::REF;
        }

        if behavior.only_accesses_arg_pointees() {
            // Only argument pointees are reachable; fold together what the
            // overlapping arguments are allowed to do to theirs.
            let mut touches_loc = false;
            let mut args_mask = ModRefInfo::NO;
            if behavior.does_access_arg_pointees() {
                let args = match self.func.as_inst(call).and_then(Instruction::as_call) {
                    Some(c) => c.args.clone(),
                    None => return ModRefInfo::MOD_REF,
                };
                for (i, arg) in args.into_iter().enumerate() {
                    if !self.func.is_pointer(arg) {
                        continue;
                    }
                    let arg_loc = MemoryLocation::new(arg, Size::Unknown);
                    if !self.is_no_alias(&arg_loc, loc) {
                        touches_loc = true;
                        args_mask |= self.arg_mod_ref_info(call, i);
                    }
                }
            }
            if !touches_loc {
                return ModRefInfo::NO;
            }
            mask &= args_mask;
        }

        // Writes to immutable memory cannot happen, whatever the callee
        // declares.
        if mask.may_write() && self.points_to_constant_memory(loc, false) {
            mask &= ModRefInfo::REF;
        }

        for provider in &mut self.providers {
            mask &= provider.get_mod_ref_info(call, loc);
            if mask == ModRefInfo::NO {
                break;
            }
        }
        mask
    }

    /// What one call argument may do to its pointee, from its attributes.
    fn arg_mod_ref_info(&self, call: ValueId, arg_index: usize) -> ModRefInfo {
        match self.func.as_inst(call).and_then(Instruction::as_call) {
            Some(c) => {
                let attrs = c.arg_attrs(arg_index);
                if attrs.readnone {
                    ModRefInfo::NO
                } else if attrs.readonly {
                    ModRefInfo::REF
                } else {
                    ModRefInfo::MOD_REF
                }
            }
            None => ModRefInfo::MOD_REF,
        }
    }

    /// Mod/ref dependence of `call1` on `call2`.
    pub fn mod_ref_info_calls(&mut self, call1: ValueId, call2: ValueId) -> ModRefInfo {
        let b1 = self.call_behavior(call1);
        if b1.does_not_access_memory() {
            return ModRefInfo::NO;
        }
        let b2 = self.call_behavior(call2);
        if b2.does_not_access_memory() {
            return ModRefInfo::NO;
        }

        // Two readers cannot depend on each other.
        if b1.only_reads_memory() && b2.only_reads_memory() {
            return ModRefInfo::NO;
        }

        let mut result = ModRefInfo::MOD_REF;
        if b1.only_reads_memory() {
            result = ModRefInfo::REF;
        }

        // When the second call only touches its argument pointees, fold
        // together what the first call does to each of those pointees.
        if b2.only_accesses_arg_pointees() {
            let mut accumulated = ModRefInfo::NO;
            if b2.does_access_arg_pointees() {
                let args = match self.func.as_inst(call2).and_then(Instruction::as_call) {
                    Some(c) => c.args.clone(),
                    None => return result,
                };
                for (i, arg) in args.into_iter().enumerate() {
                    if !self.func.is_pointer(arg) {
                        continue;
                    }
                    let arg_loc = MemoryLocation::new(arg, Size::Unknown);

                    // call2 writing the pointee makes call1 both read and
                    // write dependent; call2 only reading it means call1
                    // matters only if it writes.
                    let mut arg_mask = self.arg_mod_ref_info(call2, i);
                    if arg_mask == ModRefInfo::MOD {
                        arg_mask = ModRefInfo::MOD_REF;
                    } else if arg_mask == ModRefInfo::REF {
                        arg_mask = ModRefInfo::MOD;
                    }

                    arg_mask &= self.mod_ref_info(call1, &arg_loc);
                    accumulated = (accumulated | arg_mask) & result;
                    if accumulated == result {
                        break;
                    }
                }
            }
            return accumulated;
        }

        // Symmetric: the first call only touches its own pointees; if the
        // second call never touches any of them, there is no dependence.
        if b1.only_accesses_arg_pointees() {
            let mut accumulated = ModRefInfo::NO;
            if b1.does_access_arg_pointees() {
                let args = match self.func.as_inst(call1).and_then(Instruction::as_call) {
                    Some(c) => c.args.clone(),
                    None => return result,
                };
                for (i, arg) in args.into_iter().enumerate() {
                    if !self.func.is_pointer(arg) {
                        continue;
                    }
                    let arg_loc = MemoryLocation::new(arg, Size::Unknown);
                    if self.mod_ref_info(call2, &arg_loc) != ModRefInfo::NO {
                        accumulated = (accumulated | self.arg_mod_ref_info(call1, i)) & result;
                        if accumulated == result {
                            break;
                        }
                    }
                }
            }
            return accumulated;
        }

        result
    }

    /// What a load instruction may do to the location.
    pub fn mod_ref_info_load(&mut self, load: ValueId, loc: &MemoryLocation) -> ModRefInfo {
        let Some(load_loc) = MemoryLocation::for_load(self.func, load, self.layout, self.types)
        else {
            return ModRefInfo::MOD_REF;
        };
        if self.is_no_alias(&load_loc, loc) {
            return ModRefInfo::NO;
        }
        ModRefInfo::REF
    }

    /// What a store instruction may do to the location.
    pub fn mod_ref_info_store(&mut self, store: ValueId, loc: &MemoryLocation) -> ModRefInfo {
        let Some(store_loc) = MemoryLocation::for_store(self.func, store, self.layout, self.types)
        else {
            return ModRefInfo::MOD_REF;
        };
        if self.is_no_alias(&store_loc, loc) {
            return ModRefInfo::NO;
        }
        if self.points_to_constant_memory(loc, false) {
            return ModRefInfo::NO;
        }
        ModRefInfo::MOD
    }

    /// What any instruction may do to the location.
    pub fn instruction_mod_ref(&mut self, inst: ValueId, loc: &MemoryLocation) -> ModRefInfo {
        match self.func.as_inst(inst) {
            Some(Instruction::Load { .. }) => self.mod_ref_info_load(inst, loc),
            Some(Instruction::Store { .. }) => self.mod_ref_info_store(inst, loc),
            Some(Instruction::Call(_)) => self.mod_ref_info(inst, loc),
            _ => ModRefInfo::NO,
        }
    }

    /// Whether any instruction in `block` could modify the location.
    pub fn can_block_modify(&mut self, block: BlockId, loc: &MemoryLocation) -> bool {
        let Some(bb) = self.func.block(block) else {
            return false;
        };
        let len = bb.insts.len();
        self.can_range_modify(block, 0, len, loc)
    }

    /// Whether any instruction in `[start, end)` of `block` could modify
    /// the location.
    pub fn can_range_modify(
        &mut self,
        block: BlockId,
        start: usize,
        end: usize,
        loc: &MemoryLocation,
    ) -> bool {
        let insts: Vec<ValueId> = match self.func.block(block) {
            Some(bb) => bb.insts.get(start..end.min(bb.insts.len())).map(|s| s.to_vec()).unwrap_or_default(),
            None => return false,
        };
        insts
            .into_iter()
            .any(|inst| self.instruction_mod_ref(inst, loc).may_write())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_precise_beats_may() {
        use AliasResult::*;
        assert_eq!(combine_alias_results(MayAlias, NoAlias), NoAlias);
        assert_eq!(combine_alias_results(MustAlias, MayAlias), MustAlias);
        assert_eq!(combine_alias_results(MayAlias, MayAlias), MayAlias);
        assert_eq!(combine_alias_results(NoAlias, NoAlias), NoAlias);
        assert_eq!(combine_alias_results(PartialAlias, MustAlias), PartialAlias);
    }
}
