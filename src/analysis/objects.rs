/*!
Underlying-object reasoning: stripping pointer casts, classifying
identified allocations, escape sources, and object-size proofs.
*/

use crate::analysis::decompose::MAX_LOOKUP_DEPTH;
use crate::function::Function;
use crate::instructions::{GepIndex, Instruction};
use crate::layout::DataLayout;
use crate::types::TypeRegistry;
use crate::values::{Constant, GlobalKind, ValueId, ValueKind};

/// Looks through value-preserving pointer operations: bitcasts, address
/// space casts, all-zero GEPs, and non-overridable global aliases.
pub fn strip_pointer_casts(func: &Function, mut v: ValueId) -> ValueId {
    loop {
        match &func.value(v).kind {
            ValueKind::Inst { inst, .. } => match inst {
                Instruction::BitCast { value } | Instruction::AddrSpaceCast { value } => {
                    v = *value;
                }
                Instruction::Gep { base, indices, .. }
                    if indices.iter().all(|i| matches!(i, GepIndex::Const(0))) =>
                {
                    v = *base;
                }
                _ => return v,
            },
            ValueKind::Global(g) => match &g.kind {
                GlobalKind::Alias {
                    aliasee,
                    may_be_overridden: false,
                } => v = *aliasee,
                _ => return v,
            },
            _ => return v,
        }
    }
}

/// Walks back to the allocation or other source a pointer is derived
/// from, looking through casts and GEPs up to a fixed depth. Phis and
/// selects stop the walk; their incoming values may come from distinct
/// objects.
pub fn underlying_object(func: &Function, v: ValueId) -> ValueId {
    let mut current = v;
    for _ in 0..MAX_LOOKUP_DEPTH {
        let stripped = strip_pointer_casts(func, current);
        let next = match func.as_inst(stripped) {
            Some(Instruction::Gep { base, .. }) => *base,
            _ => return stripped,
        };
        if next == stripped {
            return stripped;
        }
        current = next;
    }
    strip_pointer_casts(func, current)
}

/// Calls whose result is guaranteed not to alias any pointer that existed
/// before the call (allocation functions and `noalias`-returning calls).
pub fn is_no_alias_call(func: &Function, v: ValueId) -> bool {
    func.as_inst(v)
        .and_then(Instruction::as_call)
        .is_some_and(|call| call.attrs.returns_noalias)
}

/// Arguments annotated `noalias`: within this function they do not alias
/// other objects visible at entry.
pub fn is_no_alias_argument(func: &Function, v: ValueId) -> bool {
    match &func.value(v).kind {
        ValueKind::Argument { attrs, .. } => attrs.noalias,
        _ => false,
    }
}

/// An identified object has a knowable base address distinct from every
/// other identified object: allocas, globals, byval arguments, noalias
/// calls and noalias arguments.
pub fn is_identified_object(func: &Function, v: ValueId) -> bool {
    if matches!(func.as_inst(v), Some(Instruction::Alloca { .. })) {
        return true;
    }
    match &func.value(v).kind {
        ValueKind::Global(g) => !matches!(g.kind, GlobalKind::Alias { .. }),
        ValueKind::Argument { attrs, .. } => attrs.byval || attrs.noalias,
        _ => is_no_alias_call(func, v),
    }
}

/// Identified objects that also cannot be visible outside this function
/// frame: everything identified except globals.
pub fn is_identified_function_local(func: &Function, v: ValueId) -> bool {
    if matches!(func.as_inst(v), Some(Instruction::Alloca { .. })) {
        return true;
    }
    match &func.value(v).kind {
        ValueKind::Argument { attrs, .. } => attrs.byval || attrs.noalias,
        _ => is_no_alias_call(func, v),
    }
}

/// An alloca, byval argument, or noalias call whose address is never
/// captured: no pointer to it can have been smuggled in from outside.
pub fn is_non_escaping_local_object(func: &Function, v: ValueId) -> bool {
    let local = matches!(func.as_inst(v), Some(Instruction::Alloca { .. }))
        || is_no_alias_call(func, v)
        || matches!(&func.value(v).kind, ValueKind::Argument { attrs, .. } if attrs.byval || attrs.noalias);
    if !local {
        return false;
    }
    !crate::analysis::capture::pointer_may_be_captured(func, v, false, true)
}

/// Values that can only produce a pointer to an escaped object: loads,
/// non-noalias arguments, and call results. If the other pointer is a
/// non-escaping local, such a source cannot alias it.
pub fn is_escape_source(func: &Function, v: ValueId) -> bool {
    match &func.value(v).kind {
        ValueKind::Argument { attrs, .. } => !attrs.noalias && !attrs.byval,
        ValueKind::Inst { inst, .. } => match inst {
            Instruction::Load { .. } => true,
            Instruction::Call(_) => !is_no_alias_call(func, v),
            _ => false,
        },
        _ => false,
    }
}

/// Allocated size of an identified object, when it can be computed from
/// type information.
pub fn object_size(
    func: &Function,
    v: ValueId,
    layout: &DataLayout,
    types: &TypeRegistry,
) -> Option<u64> {
    if let Some(Instruction::Alloca { allocated }) = func.as_inst(v) {
        return layout.alloc_size(allocated, types);
    }
    match &func.value(v).kind {
        ValueKind::Global(g) => match g.kind {
            GlobalKind::Variable { .. } => layout.alloc_size(func.ty(v).pointee()?, types),
            GlobalKind::Alias { .. } => None,
        },
        ValueKind::Argument { attrs, .. } if attrs.byval => {
            layout.alloc_size(func.ty(v).pointee()?, types)
        }
        _ => None,
    }
}

/// Whether the object `v` points at is provably smaller than `size`
/// bytes. Only meaningful for identified objects; anything else could be
/// an interior pointer into something larger.
pub fn is_object_smaller_than(
    func: &Function,
    v: ValueId,
    size: u64,
    layout: &DataLayout,
    types: &TypeRegistry,
) -> bool {
    if !is_identified_object(func, v) {
        return false;
    }
    object_size(func, v, layout, types).is_some_and(|obj| obj < size)
}

/// Whether `v` is an identified object of exactly `size` bytes.
pub fn is_object_size(
    func: &Function,
    v: ValueId,
    size: u64,
    layout: &DataLayout,
    types: &TypeRegistry,
) -> bool {
    if !is_identified_object(func, v) {
        return false;
    }
    object_size(func, v, layout, types) == Some(size)
}

/// Whether `v` is the null pointer in address space zero. Address spaces
/// other than zero may make null a valid object address.
pub fn is_null_in_default_space(func: &Function, v: ValueId) -> bool {
    matches!(
        func.as_constant(v),
        Some(Constant::NullPtr { addr_space: 0 })
    )
}

/// Whether `v` is the null pointer constant of any address space.
pub fn is_null_pointer(func: &Function, v: ValueId) -> bool {
    matches!(func.as_constant(v), Some(Constant::NullPtr { .. }))
}

/// Whether `v` is known to point somewhere other than address zero:
/// allocations and resolvable globals have real storage, and arguments can
/// promise it through `nonnull` (or implicitly through `byval`).
pub fn is_known_non_null(func: &Function, v: ValueId) -> bool {
    if matches!(func.as_inst(v), Some(Instruction::Alloca { .. })) {
        return true;
    }
    match &func.value(v).kind {
        ValueKind::Global(g) => !matches!(
            g.kind,
            GlobalKind::Alias {
                may_be_overridden: true,
                ..
            }
        ),
        ValueKind::Argument { attrs, .. } => attrs.nonnull || attrs.byval,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::instructions::CallAttrs;
    use crate::types::{Type, TypeRegistry};
    use crate::values::ParamAttrs;

    #[test]
    fn test_strip_casts_and_zero_gep() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Int(64));
        let cast = b.bitcast(a, Type::ptr_to(Type::Int(8)));
        let zero_gep = b
            .gep(
                cast,
                Type::Int(8),
                vec![GepIndex::Const(0)],
            )
            .unwrap();
        b.ret(None).unwrap();
        let f = b.build().unwrap();

        assert_eq!(strip_pointer_casts(&f, zero_gep), a);
        assert_eq!(underlying_object(&f, zero_gep), a);
    }

    #[test]
    fn test_underlying_object_through_gep_chain() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Array(Box::new(Type::Int(8)), 64));
        let mut p = a;
        for i in 0..4 {
            p = b
                .gep(
                    p,
                    Type::Int(8),
                    vec![GepIndex::Const(i)],
                )
                .unwrap();
        }
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert_eq!(underlying_object(&f, p), a);
    }

    #[test]
    fn test_underlying_object_stops_at_phi() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let a1 = b.alloca(Type::Int(32));
        let a2 = b.alloca(Type::Int(32));
        let entry = b.current_block();
        let phi = b.phi(Type::ptr_to(Type::Int(32)), vec![(entry, a1), (entry, a2)]);
        b.ret(None).unwrap();
        let f = b.build().unwrap();
        assert_eq!(underlying_object(&f, phi), phi);
    }

    #[test]
    fn test_object_classification() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let plain = b.param(Type::ptr_to(Type::Int(8)), ParamAttrs::default());
        let restrict = b.param(Type::ptr_to(Type::Int(8)), ParamAttrs::noalias());
        let a = b.alloca(Type::Int(8));
        let g = b.global("g", Type::Int(8), false);
        let malloc = b.call(
            "malloc",
            Type::ptr_to(Type::Int(8)),
            vec![],
            vec![],
            CallAttrs {
                returns_noalias: true,
                ..Default::default()
            },
        );
        b.ret(None).unwrap();
        let f = b.build().unwrap();

        assert!(is_identified_object(&f, a));
        assert!(is_identified_object(&f, g));
        assert!(is_identified_object(&f, restrict));
        assert!(is_identified_object(&f, malloc));
        assert!(!is_identified_object(&f, plain));

        assert!(is_identified_function_local(&f, a));
        assert!(!is_identified_function_local(&f, g));

        assert!(is_no_alias_call(&f, malloc));
        assert!(is_no_alias_argument(&f, restrict));
        assert!(!is_no_alias_argument(&f, plain));

        assert!(is_escape_source(&f, plain));
        assert!(!is_escape_source(&f, restrict));
        assert!(!is_escape_source(&f, a));
    }

    #[test]
    fn test_null_and_non_null_classification() {
        let types = TypeRegistry::new();
        let mut b = FunctionBuilder::new("f", &types);
        let plain = b.param(Type::ptr_to(Type::Int(8)), ParamAttrs::default());
        let promised = b.param(Type::ptr_to(Type::Int(8)), ParamAttrs::nonnull());
        let a = b.alloca(Type::Int(8));
        let g = b.global("g", Type::Int(8), false);
        let weak = b.global_alias("weak", g, true);
        let n0 = b.const_null(Type::Int(8), 0);
        let n1 = b.const_null(Type::Int(8), 1);
        b.ret(None).unwrap();
        let f = b.build().unwrap();

        assert!(is_null_in_default_space(&f, n0));
        assert!(!is_null_in_default_space(&f, n1));
        assert!(is_null_pointer(&f, n0));
        assert!(is_null_pointer(&f, n1));
        assert!(!is_null_pointer(&f, a));

        assert!(is_known_non_null(&f, a));
        assert!(is_known_non_null(&f, g));
        assert!(is_known_non_null(&f, promised));
        assert!(!is_known_non_null(&f, plain));
        // A weak alias may resolve to a null definition elsewhere.
        assert!(!is_known_non_null(&f, weak));
    }

    #[test]
    fn test_object_sizes() {
        let types = TypeRegistry::new();
        let layout = crate::layout::DataLayout::default();
        let mut b = FunctionBuilder::new("f", &types);
        let a = b.alloca(Type::Array(Box::new(Type::Int(8)), 8));
        b.ret(None).unwrap();
        let f = b.build().unwrap();

        assert_eq!(object_size(&f, a, &layout, &types), Some(8));
        assert!(is_object_smaller_than(&f, a, 16, &layout, &types));
        assert!(!is_object_smaller_than(&f, a, 8, &layout, &types));
        assert!(is_object_size(&f, a, 8, &layout, &types));
    }
}
