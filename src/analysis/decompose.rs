/*!
Symbolic decomposition of pointer expressions.

A pointer is rewritten as `base + sum(scale_i * extend(value_i)) + offset`
so the alias engine can reason about byte distances instead of syntax.
Every walk here is depth-bounded; hitting a bound is reported to the
caller, never silently dropped.
*/

use crate::function::Function;
use crate::instructions::{BinaryOp, GepIndex, Instruction};
use crate::layout::DataLayout;
use crate::types::{Type, TypeRegistry};
use crate::values::{GlobalKind, ValueId, ValueKind};

/// Shared depth bound for pointer walks. `decompose_gep_expression` and
/// `underlying_object` must agree on this so they stop at the same base;
/// the alias engine checks that agreement and bails out otherwise.
pub const MAX_LOOKUP_DEPTH: u32 = 6;

/// One symbolic term `scale * extend(value)` of a decomposed pointer.
/// Extension widths are part of the term's identity: `sext(i)` and
/// `zext(i)` are different quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableGepIndex {
    pub value: ValueId,
    pub zext_bits: u32,
    pub sext_bits: u32,
    pub scale: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecomposedPointer {
    pub base: ValueId,
    pub base_offset: i64,
    pub var_indices: Vec<VariableGepIndex>,
    /// The walk ran out of depth budget. Callers must treat the result
    /// as unusable and answer conservatively.
    pub max_lookup_reached: bool,
}

/// Counters for one analysis instance. Replaces process-global statistics
/// so concurrent per-function analyses do not share state.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecomposeStats {
    pub search_times: u64,
    pub search_limit_reached: u64,
}

/// A value rewritten as `scale * value + offset` at some bit width, with
/// the extensions stripped on the way recorded as bit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearExpression {
    pub value: ValueId,
    pub scale: i128,
    pub offset: i128,
    pub zext_bits: u32,
    pub sext_bits: u32,
    pub nsw: bool,
    pub nuw: bool,
}

impl LinearExpression {
    fn identity(value: ValueId) -> Self {
        Self {
            value,
            scale: 1,
            offset: 0,
            zext_bits: 0,
            sext_bits: 0,
            nsw: true,
            nuw: true,
        }
    }
}

/// Truncates to `bits` and sign-extends back, i.e. two's-complement
/// wraparound at the given width.
pub fn wrap_to_bits(v: i128, bits: u32) -> i128 {
    if bits >= 128 {
        return v;
    }
    let shift = 128 - bits;
    (v << shift) >> shift
}

fn low_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Bits provably zero in `v`, from constants, zero extensions, and
/// left shifts. Small fixed depth; missing knowledge is just fewer bits.
fn known_zero_bits(func: &Function, v: ValueId, bits: u32, depth: u32) -> u128 {
    if depth >= 3 {
        return 0;
    }
    if let Some(c) = func.const_int_value(v) {
        return !(c as u128) & low_mask(bits);
    }
    match func.as_inst(v) {
        Some(Instruction::ZExt { value }) => {
            let inner_bits = func.ty(*value).int_bits().unwrap_or(0) as u32;
            let high = low_mask(bits) & !low_mask(inner_bits);
            high | known_zero_bits(func, *value, inner_bits, depth + 1)
        }
        Some(Instruction::Binary {
            op: BinaryOp::Shl,
            lhs,
            rhs,
            ..
        }) => match func.const_int_value(*rhs) {
            Some(k) if (0..bits as i128).contains(&k) => {
                let k = k as u32;
                let inner = known_zero_bits(func, *lhs, bits, depth + 1);
                (low_mask(k) | (inner << k)) & low_mask(bits)
            }
            _ => 0,
        },
        _ => 0,
    }
}

/// Whether every bit set in `mask` is provably zero in `v`. Lets an `or`
/// with disjoint operands be treated as an `add`.
pub fn masked_value_is_zero(func: &Function, v: ValueId, mask: i128, bits: u32) -> bool {
    let mask = (mask as u128) & low_mask(bits);
    known_zero_bits(func, v, bits, 0) & mask == mask
}

/// Rewrites `v` (an integer value of width `bits`) as `scale*value +
/// offset`, looking through add/sub/mul/shl with one constant operand and
/// through extensions whose wrap flags make folding sound. Unrecognized
/// shapes and the depth cap return the identity expression.
pub fn get_linear_expression(func: &Function, v: ValueId, bits: u32, depth: u32) -> LinearExpression {
    if depth >= MAX_LOOKUP_DEPTH {
        return LinearExpression::identity(v);
    }

    if let Some(c) = func.const_int_value(v) {
        return LinearExpression {
            value: v,
            scale: 0,
            offset: wrap_to_bits(c, bits),
            zext_bits: 0,
            sext_bits: 0,
            nsw: true,
            nuw: true,
        };
    }

    match func.as_inst(v) {
        Some(Instruction::Binary {
            op,
            lhs,
            rhs,
            nsw,
            nuw,
        }) => {
            let Some(c) = func.const_int_value(*rhs) else {
                return LinearExpression::identity(v);
            };
            let c = wrap_to_bits(c, bits);
            match op {
                BinaryOp::Add => {
                    let mut e = get_linear_expression(func, *lhs, bits, depth + 1);
                    e.offset = wrap_to_bits(e.offset + c, bits);
                    e.nsw &= nsw;
                    e.nuw &= nuw;
                    e
                }
                BinaryOp::Or => {
                    // No common bits makes or behave as add, and the sum
                    // cannot wrap.
                    if masked_value_is_zero(func, *lhs, c, bits) {
                        let mut e = get_linear_expression(func, *lhs, bits, depth + 1);
                        e.offset = wrap_to_bits(e.offset + c, bits);
                        e
                    } else {
                        LinearExpression::identity(v)
                    }
                }
                BinaryOp::Sub => {
                    let mut e = get_linear_expression(func, *lhs, bits, depth + 1);
                    e.offset = wrap_to_bits(e.offset - c, bits);
                    e.nsw &= nsw;
                    e
                }
                BinaryOp::Mul => {
                    let mut e = get_linear_expression(func, *lhs, bits, depth + 1);
                    e.offset = wrap_to_bits(e.offset * c, bits);
                    e.scale = wrap_to_bits(e.scale * c, bits);
                    e.nsw &= nsw;
                    e.nuw &= nuw;
                    e
                }
                BinaryOp::Shl => {
                    if !(0..bits as i128).contains(&c) {
                        return LinearExpression::identity(v);
                    }
                    let mut e = get_linear_expression(func, *lhs, bits, depth + 1);
                    e.offset = wrap_to_bits(e.offset << c, bits);
                    e.scale = wrap_to_bits(e.scale << c, bits);
                    e.nsw &= nsw;
                    e.nuw &= nuw;
                    e
                }
            }
        }
        Some(Instruction::SExt { value }) => {
            let inner_bits = match func.ty(*value).int_bits() {
                Some(b) => b as u32,
                None => return LinearExpression::identity(v),
            };
            let e = get_linear_expression(func, *value, inner_bits, depth + 1);
            if e.nsw {
                // sext distributes over a non-wrapping sum; offsets are
                // already sign-correct in the wide arithmetic.
                LinearExpression {
                    sext_bits: e.sext_bits + (bits - inner_bits),
                    ..e
                }
            } else {
                LinearExpression {
                    value: *value,
                    scale: 1,
                    offset: 0,
                    zext_bits: 0,
                    sext_bits: bits - inner_bits,
                    nsw: true,
                    nuw: true,
                }
            }
        }
        Some(Instruction::ZExt { value }) => {
            let inner_bits = match func.ty(*value).int_bits() {
                Some(b) => b as u32,
                None => return LinearExpression::identity(v),
            };
            let e = get_linear_expression(func, *value, inner_bits, depth + 1);
            if e.nuw {
                // zext of a non-wrapping sum: reinterpret the parts as
                // unsigned values of the narrow width.
                LinearExpression {
                    scale: (e.scale as u128 & low_mask(inner_bits)) as i128,
                    offset: (e.offset as u128 & low_mask(inner_bits)) as i128,
                    zext_bits: e.zext_bits + (bits - inner_bits),
                    ..e
                }
            } else {
                LinearExpression {
                    value: *value,
                    scale: 1,
                    offset: 0,
                    zext_bits: bits - inner_bits,
                    sext_bits: 0,
                    nsw: true,
                    nuw: true,
                }
            }
        }
        _ => LinearExpression::identity(v),
    }
}

/// Decomposes a pointer value into base, constant byte offset, and
/// symbolic index terms by peeling casts and GEPs. Charges one unit of
/// the shared depth budget per GEP; on exhaustion sets
/// `max_lookup_reached` and returns whatever was accumulated.
pub fn decompose_gep_expression(
    func: &Function,
    v: ValueId,
    layout: &DataLayout,
    types: &TypeRegistry,
    stats: &mut DecomposeStats,
) -> DecomposedPointer {
    stats.search_times += 1;

    let mut current = v;
    let mut offset: i128 = 0;
    let mut var_indices: Vec<VariableGepIndex> = Vec::new();
    let mut gep_steps = 0u32;
    let mut max_lookup_reached = false;

    loop {
        // Value-preserving wrappers are free.
        match &func.value(current).kind {
            ValueKind::Inst {
                inst: Instruction::BitCast { value } | Instruction::AddrSpaceCast { value },
                ..
            } => {
                current = *value;
                continue;
            }
            ValueKind::Global(g) => {
                if let GlobalKind::Alias {
                    aliasee,
                    may_be_overridden: false,
                } = g.kind
                {
                    current = aliasee;
                    continue;
                }
                break;
            }
            _ => {}
        }

        let Some(Instruction::Gep {
            base,
            source_ty,
            indices,
        }) = func.as_inst(current)
        else {
            break;
        };

        if gep_steps >= MAX_LOOKUP_DEPTH {
            max_lookup_reached = true;
            stats.search_limit_reached += 1;
            break;
        }
        gep_steps += 1;

        let pointer_bits = layout.pointer_bits(func.ty(current).addr_space().unwrap_or(0));

        if !accumulate_gep(
            func,
            source_ty,
            indices,
            pointer_bits,
            layout,
            types,
            &mut offset,
            &mut var_indices,
        ) {
            // An index over an unsized type; nothing sound can be said.
            max_lookup_reached = true;
            stats.search_limit_reached += 1;
            break;
        }

        current = *base;
    }

    let pointer_bits = layout.pointer_bits(func.ty(v).addr_space().unwrap_or(0));
    DecomposedPointer {
        base: current,
        base_offset: wrap_to_bits(offset, pointer_bits) as i64,
        var_indices,
        max_lookup_reached,
    }
}

#[allow(clippy::too_many_arguments)]
fn accumulate_gep(
    func: &Function,
    source_ty: &Type,
    indices: &[GepIndex],
    pointer_bits: u32,
    layout: &DataLayout,
    types: &TypeRegistry,
    offset: &mut i128,
    var_indices: &mut Vec<VariableGepIndex>,
) -> bool {
    let mut current_ty = source_ty.clone();

    for (position, index) in indices.iter().enumerate() {
        // The first index steps over whole source objects; later ones
        // descend into the type.
        let element_ty = if position == 0 {
            source_ty.clone()
        } else {
            match &current_ty {
                Type::Array(elem, _) => (**elem).clone(),
                Type::Struct(id) => {
                    let GepIndex::Const(field) = index else {
                        return false;
                    };
                    let Some(sl) = layout.struct_layout(*id, types) else {
                        return false;
                    };
                    let Some(field_offset) = sl.field_offset(*field as usize) else {
                        return false;
                    };
                    *offset += field_offset as i128;
                    let def = match types.get_struct(*id) {
                        Some(d) => d,
                        None => return false,
                    };
                    current_ty = def.fields[*field as usize].clone();
                    continue;
                }
                _ => return false,
            }
        };
        if position > 0 {
            current_ty = element_ty.clone();
        }

        let Some(element_size) = layout.alloc_size(&element_ty, types) else {
            return false;
        };

        match index {
            GepIndex::Const(n) => {
                *offset += (*n as i128) * element_size as i128;
            }
            GepIndex::Value(idx) => {
                if element_size == 0 {
                    continue;
                }
                let bits = func
                    .ty(*idx)
                    .int_bits()
                    .map(u32::from)
                    .unwrap_or(pointer_bits);
                let e = get_linear_expression(func, *idx, bits, 0);

                if e.scale == 0 {
                    // Constant in disguise.
                    *offset += e.offset * element_size as i128;
                    continue;
                }

                *offset += e.offset * element_size as i128;
                let mut scale = e.scale * element_size as i128;

                // Indices narrower than the pointer are implicitly
                // sign-extended to pointer width.
                let covered = bits + e.zext_bits + e.sext_bits;
                let sext_bits = e.sext_bits + pointer_bits.saturating_sub(covered);

                // Fold into an existing term for the same extended value,
                // so one induction variable used twice stays one degree
                // of freedom.
                scale = wrap_to_bits(scale, pointer_bits);
                if let Some(existing) = var_indices.iter_mut().find(|t| {
                    t.value == e.value && t.zext_bits == e.zext_bits && t.sext_bits == sext_bits
                }) {
                    let merged = wrap_to_bits(existing.scale as i128 + scale, pointer_bits);
                    if merged == 0 {
                        let value = e.value;
                        var_indices.retain(|t| {
                            !(t.value == value
                                && t.zext_bits == e.zext_bits
                                && t.sext_bits == sext_bits)
                        });
                    } else {
                        existing.scale = merged as i64;
                    }
                } else {
                    var_indices.push(VariableGepIndex {
                        value: e.value,
                        zext_bits: e.zext_bits,
                        sext_bits,
                        scale: scale as i64,
                    });
                }
            }
        }
    }
    true
}
