#![allow(unused_imports)]
#![allow(unused_variables)]
#![allow(unused_must_use)]

use opalir::analysis::DominatorTree;
use opalir::{
    AliasChain, AliasResult, BasicAliasAnalysis, CallAttrs, DataLayout, FunctionBuilder,
    GepIndex, MemoryLocation, ModRefInfo, ParamAttrs, Size, StructDefinition, Type,
    TypeRegistry, ValueId,
};

fn loc(ptr: ValueId, bytes: u64) -> MemoryLocation {
    MemoryLocation::new(ptr, Size::Exact(bytes))
}

/// A function shaped like a real workload: a header struct filled in
/// field by field, a scratch buffer walked in a loop, and an opaque
/// callee observing the header.
#[test]
fn test_end_to_end_queries() {
    let mut types = TypeRegistry::new();
    let header = types.add_struct(StructDefinition {
        name: "header".into(),
        fields: vec![Type::Int(32), Type::Int(32), Type::Int(64)],
    });
    let layout = DataLayout::default();
    let buf_ty = Type::Array(Box::new(Type::Int(8)), 64);

    let mut b = FunctionBuilder::new("process", &types);
    let cond = b.param(Type::Int(1), ParamAttrs::default());
    let out = b.param(Type::ptr_to(Type::Int(64)), ParamAttrs::noalias());

    let hdr = b.alloca(Type::Struct(header));
    let buf = b.alloca(buf_ty.clone());
    let len_field = b
        .gep(hdr, Type::Struct(header), vec![GepIndex::Const(0), GepIndex::Const(0)])
        .unwrap();
    let crc_field = b
        .gep(hdr, Type::Struct(header), vec![GepIndex::Const(0), GepIndex::Const(1)])
        .unwrap();
    let zero = b.const_int(32, 0);
    b.store(len_field, zero);
    b.store(crc_field, zero);

    let inspect = b.call(
        "inspect_header",
        Type::Void,
        vec![hdr],
        vec![ParamAttrs {
            nocapture: true,
            readonly: true,
            ..Default::default()
        }],
        CallAttrs {
            only_accesses_arg_memory: true,
            ..Default::default()
        },
    );

    let loop_block = b.create_block();
    let exit = b.create_block();
    let entry = b.current_block();
    b.jump(loop_block).unwrap();

    b.switch_to_block(loop_block).unwrap();
    let start = b
        .gep(buf, buf_ty, vec![GepIndex::Const(0), GepIndex::Const(0)])
        .unwrap();
    let cursor = b.phi(Type::ptr_to(Type::Int(8)), vec![(entry, start)]);
    let advanced = b.gep(cursor, Type::Int(8), vec![GepIndex::Const(1)]).unwrap();
    b.add_phi_incoming(cursor, loop_block, advanced).unwrap();
    b.branch(cond, loop_block, exit).unwrap();

    b.switch_to_block(exit).unwrap();
    let total = b.load(len_field).unwrap();
    let wide = b.sext(total, 64);
    b.store(out, wide);
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let dom = DominatorTree::build(&f);
    let mut chain = AliasChain::new(&f, &layout, &types);
    chain.push(Box::new(
        BasicAliasAnalysis::new(&f, &layout, &types)
            .with_dominators(&dom)
            .with_recursive_phi(),
    ));

    // Distinct header fields never collide.
    assert!(chain.is_no_alias(&loc(len_field, 4), &loc(crc_field, 4)));
    // The loop cursor stays inside the buffer, away from the header.
    assert_eq!(
        chain.alias(&loc(cursor, 1), &loc(len_field, 4)),
        AliasResult::NoAlias
    );
    // The noalias output parameter is disjoint from both locals.
    assert!(chain.is_no_alias(&loc(out, 8), &loc(hdr, 16)));
    assert!(chain.is_no_alias(&loc(out, 8), &loc(buf, 64)));
    // The callee only reads its argument pointee: it can read the header
    // but never the buffer, and it writes nothing.
    let on_header = chain.mod_ref_info(inspect, &loc(len_field, 4));
    assert!(on_header.may_read());
    assert!(!on_header.may_write());
    assert_eq!(chain.mod_ref_info(inspect, &loc(buf, 64)), ModRefInfo::NO);
}

#[test]
fn test_queries_survive_persistence() {
    let types = TypeRegistry::new();
    let layout = DataLayout::default();
    let buf_ty = Type::Array(Box::new(Type::Int(8)), 16);

    let mut b = FunctionBuilder::new("persisted", &types);
    let buf = b.alloca(buf_ty.clone());
    let lo = b
        .gep(buf, buf_ty.clone(), vec![GepIndex::Const(0), GepIndex::Const(0)])
        .unwrap();
    let hi = b
        .gep(buf, buf_ty, vec![GepIndex::Const(0), GepIndex::Const(8)])
        .unwrap();
    b.ret(None).unwrap();
    let f = b.build().unwrap();

    let json = opalir::ir_persist::to_json(&f).unwrap();
    let reloaded = opalir::ir_persist::from_json(&json).unwrap();

    let mut before = BasicAliasAnalysis::new(&f, &layout, &types);
    let mut after = BasicAliasAnalysis::new(&reloaded, &layout, &types);
    for (x, y, n) in [(lo, hi, 8u64), (lo, buf, 4), (hi, hi, 1)] {
        assert_eq!(
            before.alias(&loc(x, n), &loc(y, n)),
            after.alias(&loc(x, n), &loc(y, n))
        );
    }
}
