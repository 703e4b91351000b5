/*!
Basic alias queries: value identity, identified-object separation, and
the argument/escape rules that need no offset arithmetic.
*/

use crate::analysis::DominatorTree;
use crate::{
    AliasResult, BasicAliasAnalysis, DataLayout, FunctionBuilder, MemoryLocation, ParamAttrs,
    Size, Type, TypeRegistry, ValueId,
};
use pretty_assertions::assert_eq;

fn loc(ptr: ValueId, bytes: u64) -> MemoryLocation {
    MemoryLocation::new(ptr, Size::Exact(bytes))
}

#[test]
fn test_identical_pointers_must_alias() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(a, 4), &loc(a, 4)), AliasResult::MustAlias);
}

#[test]
fn test_distinct_allocas_no_alias_and_symmetric() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    let c = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(a, 4), &loc(c, 4)), AliasResult::NoAlias);
    assert_eq!(aa.alias(&loc(c, 4), &loc(a, 4)), AliasResult::NoAlias);
}

#[test]
fn test_zero_sized_access_never_aliases() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    // Even against itself; an empty byte range overlaps nothing.
    assert_eq!(aa.alias(&loc(a, 0), &loc(a, 4)), AliasResult::NoAlias);
    assert_eq!(aa.alias(&loc(a, 4), &loc(a, 0)), AliasResult::NoAlias);
}

#[test]
fn test_undef_pointer_no_alias() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    let u = b.undef(Type::ptr_to(Type::Int(32)));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(u, 4), &loc(a, 4)), AliasResult::NoAlias);
}

#[test]
fn test_null_in_default_space_no_alias() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    let n = b.const_null(Type::Int(32), 0);
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(n, 4), &loc(a, 4)), AliasResult::NoAlias);
}

#[test]
fn test_pointer_derived_from_null_no_alias() {
    use crate::GepIndex;

    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let n = b.const_null(Type::Int(8), 0);
    let past = b.gep(n, Type::Int(8), vec![GepIndex::Const(5)]).unwrap();
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    // Both sides resolve to the null object; the rule does not need the
    // underlying objects to differ.
    assert_eq!(
        aa.alias(
            &MemoryLocation::new(n, Size::Unknown),
            &MemoryLocation::new(past, Size::Unknown),
        ),
        AliasResult::NoAlias
    );
}

#[test]
fn test_nonnull_argument_vs_null_outside_default_space() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let ptr_as1 = Type::Ptr {
        pointee: Box::new(Type::Int(8)),
        addr_space: 1,
    };
    let mut b = FunctionBuilder::new("f", &types);
    let promised = b.param(ptr_as1.clone(), ParamAttrs::nonnull());
    let plain = b.param(ptr_as1, ParamAttrs::default());
    let n1 = b.const_null(Type::Int(8), 1);
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    // Outside address space zero null may be a real address, so only the
    // argument's promise separates it.
    assert_eq!(aa.alias(&loc(promised, 1), &loc(n1, 1)), AliasResult::NoAlias);
    assert_eq!(aa.alias(&loc(n1, 1), &loc(promised, 1)), AliasResult::NoAlias);
    assert_eq!(aa.alias(&loc(plain, 1), &loc(n1, 1)), AliasResult::MayAlias);
}

#[test]
fn test_noalias_arguments_are_separate_objects() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let p = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::noalias());
    let q = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::noalias());
    let r = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::default());
    let s = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::default());
    let a = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(p, 4), &loc(q, 4)), AliasResult::NoAlias);
    assert_eq!(aa.alias(&loc(p, 4), &loc(a, 4)), AliasResult::NoAlias);
    // Plain arguments carry no such promise against each other.
    assert_eq!(aa.alias(&loc(r, 4), &loc(s, 4)), AliasResult::MayAlias);
    // But an argument existed before the callee's frame did.
    assert_eq!(aa.alias(&loc(r, 4), &loc(a, 4)), AliasResult::NoAlias);
}

#[test]
fn test_argument_vs_global_stays_may() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let p = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::default());
    let g = b.global("counter", Type::Int(32), false);
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(p, 4), &loc(g, 4)), AliasResult::MayAlias);
}

#[test]
fn test_loaded_pointer_cannot_reach_non_escaping_local() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let pp = b.param(
        Type::ptr_to(Type::ptr_to(Type::Int(8))),
        ParamAttrs::default(),
    );
    let a = b.alloca(Type::Int(8));
    let l = b.load(pp).unwrap();
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    // `a`'s address never leaves the function, so nothing loaded from
    // memory can point at it.
    assert_eq!(aa.alias(&loc(l, 1), &loc(a, 1)), AliasResult::NoAlias);
}

#[test]
fn test_escaped_local_is_reachable_through_loads() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let pp = b.param(
        Type::ptr_to(Type::ptr_to(Type::Int(8))),
        ParamAttrs::default(),
    );
    let a = b.alloca(Type::Int(8));
    b.store(pp, a);
    let l = b.load(pp).unwrap();
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(l, 1), &loc(a, 1)), AliasResult::MayAlias);
}

#[test]
fn test_access_wider_than_object_no_alias() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let pp = b.param(
        Type::ptr_to(Type::ptr_to(Type::Int(8))),
        ParamAttrs::default(),
    );
    let a = b.alloca(Type::Int(32));
    b.store(pp, a);
    let l = b.load(pp).unwrap();
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    // `a` escaped, so the loaded pointer may reach it at matching sizes.
    assert_eq!(aa.alias(&loc(l, 4), &loc(a, 4)), AliasResult::MayAlias);
    // An 8-byte access cannot be an access to a 4-byte object.
    assert_eq!(aa.alias(&loc(l, 8), &loc(a, 4)), AliasResult::NoAlias);
}

#[test]
fn test_repeated_queries_are_deterministic() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let p = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::default());
    let q = b.param(Type::ptr_to(Type::Int(32)), ParamAttrs::default());
    let a = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    let first = aa.alias(&loc(p, 4), &loc(q, 4));
    // An unrelated query in between must not leak memo state into a rerun.
    aa.alias(&loc(p, 4), &loc(a, 4));
    let second = aa.alias(&loc(p, 4), &loc(q, 4));
    assert_eq!(first, second);
}

#[test]
fn test_bitcast_is_transparent() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    let cast = b.bitcast(a, Type::ptr_to(Type::Int(8)));
    let other = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    assert_eq!(aa.alias(&loc(cast, 4), &loc(a, 4)), AliasResult::MustAlias);
    assert_eq!(aa.alias(&loc(cast, 4), &loc(other, 4)), AliasResult::NoAlias);
}

#[test]
fn test_overridable_alias_is_opaque() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let g = b.global("impl_", Type::Int(32), false);
    let fixed = b.global_alias("fixed", g, false);
    let weak = b.global_alias("weak", g, true);
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    // A non-overridable alias is its aliasee.
    assert_eq!(aa.alias(&loc(fixed, 4), &loc(g, 4)), AliasResult::MustAlias);
    // An overridable one may bind elsewhere at link time.
    assert_eq!(aa.alias(&loc(weak, 4), &loc(g, 4)), AliasResult::MayAlias);
}

#[test]
fn test_tags_ride_along_without_changing_answers() {
    use crate::AccessTag;

    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let mut b = FunctionBuilder::new("f", &types);
    let a = b.alloca(Type::Int(32));
    let c = b.alloca(Type::Int(32));
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let mut aa = BasicAliasAnalysis::new(&f, &layout, &types);
    let tagged_a = MemoryLocation::with_tag(a, Size::Exact(4), AccessTag(1));
    let tagged_c = MemoryLocation::with_tag(c, Size::Exact(4), AccessTag(2));
    assert_eq!(aa.alias(&tagged_a, &tagged_c), AliasResult::NoAlias);
    assert_eq!(aa.alias(&tagged_a, &loc(a, 4)), AliasResult::MustAlias);
}
