/*!
Capture tracking: does a copy of a pointer outlive the places we can see?

A pointer is captured when it is stored somewhere, returned (optionally),
or handed to a call that does not promise `nocapture`. The walk follows
value-preserving users (casts, GEPs, phis, selects) and charges every use
against a budget so pathological use chains stay cheap.
*/

use crate::analysis::cfg::is_potentially_reachable;
use crate::analysis::dominator::DominatorTree;
use crate::block::BlockId;
use crate::function::{Function, UseKind, UseSite};
use crate::instructions::Instruction;
use crate::values::ValueId;
use std::collections::HashSet;

/// Uses examined before the tracker gives up and reports a capture.
const MAX_USES_TO_EXPLORE: usize = 20;

/// Customizes what counts as a capture and which uses to pursue.
pub trait CaptureTracker {
    /// Called when the use budget is exhausted. After this the result is
    /// treated as captured.
    fn too_many_uses(&mut self) {}

    /// Whether the walk should look through a value-preserving user.
    fn should_explore(&mut self, _use_site: &UseSite) -> bool {
        true
    }

    /// Called with each capturing use. Returning `true` stops the walk.
    fn captured(&mut self, use_site: &UseSite) -> bool;
}

struct SimpleTracker {
    return_captures: bool,
    captured: bool,
}

impl CaptureTracker for SimpleTracker {
    fn too_many_uses(&mut self) {
        self.captured = true;
    }

    fn captured(&mut self, use_site: &UseSite) -> bool {
        if matches!(use_site.kind, UseKind::Return) && !self.return_captures {
            return false;
        }
        self.captured = true;
        true
    }
}

/// Whether any copy of `v` escapes through a store, call, or (when
/// `return_captures`) a return. `store_captures` is accepted for parity
/// with callers that never pass pointers to memory; stores always capture
/// here since no tracking of the stored-to location is done.
pub fn pointer_may_be_captured(
    func: &Function,
    v: ValueId,
    return_captures: bool,
    _store_captures: bool,
) -> bool {
    let mut tracker = SimpleTracker {
        return_captures,
        captured: false,
    };
    pointer_may_be_captured_with(func, v, &mut tracker);
    tracker.captured
}

/// Runs the capture walk with a caller-supplied tracker.
pub fn pointer_may_be_captured_with(func: &Function, v: ValueId, tracker: &mut impl CaptureTracker) {
    let mut worklist = vec![v];
    let mut visited = HashSet::new();
    visited.insert(v);
    let mut budget = MAX_USES_TO_EXPLORE;

    while let Some(current) = worklist.pop() {
        for use_site in func.uses_of(current) {
            if budget == 0 {
                tracker.too_many_uses();
                return;
            }
            budget -= 1;

            match use_site.kind {
                UseKind::Return => {
                    if tracker.captured(&use_site) {
                        return;
                    }
                }
                UseKind::Inst { user, operand_no } => {
                    let Some(inst) = func.as_inst(user) else {
                        continue;
                    };
                    match inst {
                        // Loading through the pointer does not capture it.
                        Instruction::Load { .. } => {}
                        // Storing the pointer itself captures; storing
                        // through it does not.
                        Instruction::Store { value, .. } => {
                            if *value == current && tracker.captured(&use_site) {
                                return;
                            }
                        }
                        Instruction::Call(call) => {
                            let captured_here = call
                                .args
                                .iter()
                                .enumerate()
                                .any(|(i, &arg)| arg == current && !call.arg_attrs(i).nocapture);
                            if captured_here && tracker.captured(&use_site) {
                                return;
                            }
                        }
                        Instruction::Gep { .. }
                        | Instruction::BitCast { .. }
                        | Instruction::AddrSpaceCast { .. }
                        | Instruction::Phi { .. }
                        | Instruction::Select { .. } => {
                            if !tracker.should_explore(&use_site) {
                                if tracker.captured(&use_site) {
                                    return;
                                }
                            } else if visited.insert(user) {
                                worklist.push(user);
                            }
                        }
                        // Integer uses of a pointer (comparisons would land
                        // here too) are treated as captures.
                        _ => {
                            let _ = operand_no;
                            if tracker.captured(&use_site) {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Blocks walked by `has_path` before assuming a path exists.
const MAX_PATH_BLOCKS: usize = 5;

/// Whether control can flow from the point after `from` to the point
/// `to`, exploring at most a handful of blocks.
fn has_path(func: &Function, from: (BlockId, usize), to: (BlockId, usize)) -> bool {
    if from.0 == to.0 {
        if from.1 < to.1 {
            return true;
        }
        // Same block, use after def: only via a back edge through the CFG.
        return func
            .block(from.0)
            .map(|b| b.successors())
            .into_iter()
            .flatten()
            .any(|succ| is_potentially_reachable(func, succ, to.0));
    }
    let mut visited = HashSet::new();
    let mut worklist = vec![from.0];
    while let Some(block) = worklist.pop() {
        if visited.len() > MAX_PATH_BLOCKS {
            return true;
        }
        let Some(bb) = func.block(block) else {
            continue;
        };
        for succ in bb.successors() {
            if succ == to.0 {
                return true;
            }
            if visited.insert(succ) {
                worklist.push(succ);
            }
        }
    }
    false
}

/// Tracker that only counts captures which could be observed at a given
/// program point: a capturing use that cannot reach `point` is harmless
/// for queries about that point.
pub struct CapturesBefore<'a> {
    func: &'a Function,
    dom: &'a DominatorTree,
    point: (BlockId, usize),
    include_point: bool,
    pub captured: bool,
}

impl<'a> CapturesBefore<'a> {
    pub fn new(
        func: &'a Function,
        dom: &'a DominatorTree,
        point: (BlockId, usize),
        include_point: bool,
    ) -> Self {
        Self {
            func,
            dom,
            point,
            include_point,
            captured: false,
        }
    }

    fn use_reaches_point(&self, use_site: &UseSite) -> bool {
        let use_point = (use_site.block, use_site.index);
        if use_point == self.point {
            return self.include_point;
        }
        if self.dom.dominates_point(self.point, use_point)
            && !is_potentially_reachable(self.func, use_point.0, self.point.0)
        {
            // Use strictly after the point with no way back around.
            return false;
        }
        has_path(self.func, use_point, self.point)
            || self.dom.dominates_point(use_point, self.point)
    }
}

impl CaptureTracker for CapturesBefore<'_> {
    fn too_many_uses(&mut self) {
        self.captured = true;
    }

    fn captured(&mut self, use_site: &UseSite) -> bool {
        if !self.use_reaches_point(use_site) {
            return false;
        }
        self.captured = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::instructions::{CallAttrs, GepIndex};
    use crate::types::{Type, TypeRegistry};
    use crate::values::ParamAttrs;

    #[test]
    fn test_load_store_through_does_not_capture() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(32));
        let c = b.const_int(32, 1);
        b.store(a, c);
        let _ = b.load(a).unwrap();
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert!(!pointer_may_be_captured(&f, a, false, true));
    }

    #[test]
    fn test_storing_pointer_captures() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(32));
        let slot = b.alloca(Type::ptr_to(Type::Int(32)));
        b.store(slot, a);
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert!(pointer_may_be_captured(&f, a, false, true));
        assert!(!pointer_may_be_captured(&f, slot, false, true));
    }

    #[test]
    fn test_capture_through_gep() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Array(Box::new(Type::Int(8)), 4));
        let inner = b
            .gep(
                a,
                Type::Array(Box::new(Type::Int(8)), 4),
                vec![GepIndex::Const(0), GepIndex::Const(1)],
            )
            .unwrap();
        let slot = b.alloca(Type::ptr_to(Type::Int(8)));
        b.store(slot, inner);
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert!(pointer_may_be_captured(&f, a, false, true));
    }

    #[test]
    fn test_nocapture_call_does_not_capture() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(32));
        b.call(
            "observe",
            Type::Void,
            vec![a],
            vec![ParamAttrs::nocapture()],
            CallAttrs::default(),
        );
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert!(!pointer_may_be_captured(&f, a, false, true));
    }

    #[test]
    fn test_plain_call_captures() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(32));
        b.call("leak", Type::Void, vec![a], vec![], CallAttrs::default());
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert!(pointer_may_be_captured(&f, a, false, true));
    }

    #[test]
    fn test_return_capture_mode() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(32));
        b.ret(Some(a)).unwrap();
        let f = b.build().unwrap();
        assert!(!pointer_may_be_captured(&f, a, false, true));
        assert!(pointer_may_be_captured(&f, a, true, true));
    }

    #[test]
    fn test_captures_before_point() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(32));
        let call = b.call("probe", Type::Void, vec![], vec![], CallAttrs::default());
        let slot = b.alloca(Type::ptr_to(Type::Int(32)));
        b.store(slot, a);
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        let dom = DominatorTree::build(&f);

        // The capturing store sits after the probe call with no loop back,
        // so nothing observed at the call can alias the alloca yet.
        let point = f.def_site(call).unwrap();
        let mut tracker = CapturesBefore::new(&f, &dom, point, false);
        pointer_may_be_captured_with(&f, a, &mut tracker);
        assert!(!tracker.captured);
    }
}
