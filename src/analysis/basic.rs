/*!
The stateless local alias analysis.

`BasicAliasAnalysis` answers queries for one function by structural
reasoning: identified-object rules, decomposed GEP arithmetic, and
recursive comparison through phis and selects. All recursion is bounded
and memoized; the memo table seeds `MayAlias` so cyclic value graphs
terminate with the conservative answer instead of diverging.
*/

use crate::analysis::alias::{
    merge_alias_results, AccessTag, AliasResult, LocPair, MemoryBehavior, MemoryLocation,
    ModRefInfo, Size,
};
use crate::analysis::capture::{pointer_may_be_captured_with, CapturesBefore};
use crate::analysis::cfg::is_potentially_reachable;
use crate::analysis::chain::AliasProvider;
use crate::analysis::decompose::{
    decompose_gep_expression, get_linear_expression, wrap_to_bits, DecomposeStats,
    DecomposedPointer, VariableGepIndex,
};
use crate::analysis::dominator::DominatorTree;
use crate::analysis::objects::{
    is_escape_source, is_identified_function_local, is_identified_object, is_known_non_null,
    is_non_escaping_local_object, is_null_in_default_space, is_null_pointer, is_object_size,
    is_object_smaller_than, strip_pointer_casts, underlying_object,
};
use crate::block::BlockId;
use crate::function::Function;
use crate::instructions::{CallAttrs, GepIndex, Instruction};
use crate::layout::DataLayout;
use crate::types::{Type, TypeRegistry};
use crate::values::{ValueId, ValueKind};
use std::collections::{HashMap, HashSet};

/// Visited-phi-block cap for the value-equality-in-cycles check.
const MAX_PHI_BLOCKS_FOR_VALUE_EQUALITY: usize = 20;

/// Worklist budget for the constant-memory walk.
const MAX_CONSTANT_MEMORY_LOOKUPS: usize = 8;

/// Per-function alias analysis instance. One instance serves one
/// function; its memo state is private to each top-level query.
pub struct BasicAliasAnalysis<'a> {
    func: &'a Function,
    layout: &'a DataLayout,
    types: &'a TypeRegistry,
    dom: Option<&'a DominatorTree>,
    cache: HashMap<LocPair, AliasResult>,
    visited_phi_blocks: HashSet<BlockId>,
    stats: DecomposeStats,
    recursive_phi: bool,
}

impl<'a> BasicAliasAnalysis<'a> {
    pub fn new(func: &'a Function, layout: &'a DataLayout, types: &'a TypeRegistry) -> Self {
        Self {
            func,
            layout,
            types,
            dom: None,
            cache: HashMap::new(),
            visited_phi_blocks: HashSet::new(),
            stats: DecomposeStats::default(),
            recursive_phi: false,
        }
    }

    /// Supplies a dominator tree, enabling the capture-ordering queries.
    pub fn with_dominators(mut self, dom: &'a DominatorTree) -> Self {
        self.dom = Some(dom);
        self
    }

    /// Enables recognition of the loop pattern where a phi's incoming
    /// value is a constant-stride GEP off the phi itself.
    pub fn with_recursive_phi(mut self) -> Self {
        self.recursive_phi = true;
        self
    }

    pub fn stats(&self) -> DecomposeStats {
        self.stats
    }

    /// Top-level alias query. Memo state lives only for the duration of
    /// this call, so independent queries cannot observe each other's
    /// speculative entries.
    pub fn alias(&mut self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult {
        let result = self.alias_check(a.ptr, a.size, a.tag, b.ptr, b.size, b.tag);
        self.cache.clear();
        self.visited_phi_blocks.clear();
        result
    }

    fn alias_check(
        &mut self,
        v1: ValueId,
        size1: Size,
        tag1: Option<AccessTag>,
        v2: ValueId,
        size2: Size,
        tag2: Option<AccessTag>,
    ) -> AliasResult {
        // A zero-byte access overlaps nothing.
        if size1 == Size::Exact(0) || size2 == Size::Exact(0) {
            return AliasResult::NoAlias;
        }

        let v1 = strip_pointer_casts(self.func, v1);
        let v2 = strip_pointer_casts(self.func, v2);

        if self.func.is_undef(v1) || self.func.is_undef(v2) {
            return AliasResult::NoAlias;
        }

        if self.is_value_equal_in_potential_cycles(v1, v2) {
            return AliasResult::MustAlias;
        }

        if !self.func.is_pointer(v1) || !self.func.is_pointer(v2) {
            return AliasResult::NoAlias;
        }

        let o1 = underlying_object(self.func, v1);
        let o2 = underlying_object(self.func, v2);

        // Accessing through null in the default address space is undefined,
        // so it cannot overlap anything, its own derived pointers included.
        if is_null_in_default_space(self.func, o1) || is_null_in_default_space(self.func, o2) {
            return AliasResult::NoAlias;
        }

        if o1 != o2 {
            // Null compared against a pointer with real storage behind it,
            // in address spaces where null may otherwise be a valid object
            // address.
            if (is_null_pointer(self.func, o1) && is_known_non_null(self.func, o2))
                || (is_null_pointer(self.func, o2) && is_known_non_null(self.func, o1))
            {
                return AliasResult::NoAlias;
            }

            // Two different identified allocations occupy disjoint storage.
            if is_identified_object(self.func, o1) && is_identified_object(self.func, o2) {
                return AliasResult::NoAlias;
            }

            // Constant memory cannot overlap a distinct writable object.
            if (self.is_constant_object(o1)
                && is_identified_object(self.func, o2)
                && !self.is_constant_object(o2))
                || (self.is_constant_object(o2)
                    && is_identified_object(self.func, o1)
                    && !self.is_constant_object(o1))
            {
                return AliasResult::NoAlias;
            }

            // A plain argument existed before the frame's locals did.
            if (self.is_plain_argument(o1) && is_identified_function_local(self.func, o2))
                || (self.is_plain_argument(o2) && is_identified_function_local(self.func, o1))
            {
                return AliasResult::NoAlias;
            }

            // A value that can only come from escaped memory cannot reach
            // a local whose address never escaped.
            if (is_escape_source(self.func, o1) && is_non_escaping_local_object(self.func, o2))
                || (is_escape_source(self.func, o2)
                    && is_non_escaping_local_object(self.func, o1))
            {
                return AliasResult::NoAlias;
            }
        }

        // An access wider than the whole object on the other side cannot
        // be an access to that object.
        if let Size::Exact(s1) = size1 {
            if is_object_smaller_than(self.func, o2, s1, self.layout, self.types) {
                return AliasResult::NoAlias;
            }
        }
        if let Size::Exact(s2) = size2 {
            if is_object_smaller_than(self.func, o1, s2, self.layout, self.types) {
                return AliasResult::NoAlias;
            }
        }

        let key = LocPair::new(
            MemoryLocation { ptr: v1, size: size1, tag: tag1 },
            MemoryLocation { ptr: v2, size: size2, tag: tag2 },
        );
        if let Some(&cached) = self.cache.get(&key) {
            return cached;
        }
        // Seed the conservative answer so recursive re-entry on the same
        // pair terminates.
        self.cache.insert(key, AliasResult::MayAlias);

        let (v1, size1, tag1, o1, v2, size2, tag2, o2) =
            if self.is_gep(v2) && !self.is_gep(v1) {
                (v2, size2, tag2, o2, v1, size1, tag1, o1)
            } else {
                (v1, size1, tag1, o1, v2, size2, tag2, o2)
            };
        if self.is_gep(v1) {
            let result = self.alias_gep(v1, size1, tag1, v2, size2, tag2, o1, o2);
            if result != AliasResult::MayAlias {
                self.cache.insert(key, result);
                return result;
            }
        }

        let (v1, size1, tag1, o1, v2, size2, tag2, o2) = if self.is_phi(v2) && !self.is_phi(v1) {
            (v2, size2, tag2, o2, v1, size1, tag1, o1)
        } else {
            (v1, size1, tag1, o1, v2, size2, tag2, o2)
        };
        if self.is_phi(v1) {
            let result = self.alias_phi(v1, size1, tag1, v2, size2, tag2);
            if result != AliasResult::MayAlias {
                self.cache.insert(key, result);
                return result;
            }
        }

        let (v1, size1, tag1, o1, v2, size2, tag2, o2) =
            if self.is_select(v2) && !self.is_select(v1) {
                (v2, size2, tag2, o2, v1, size1, tag1, o1)
            } else {
                (v1, size1, tag1, o1, v2, size2, tag2, o2)
            };
        if self.is_select(v1) {
            let result = self.alias_select(v1, size1, tag1, v2, size2, tag2);
            if result != AliasResult::MayAlias {
                self.cache.insert(key, result);
                return result;
            }
        }

        // Same object, and one access covers it entirely: the other access
        // must land somewhere inside it.
        if o1 == o2 {
            let covers = match (size1, size2) {
                (Size::Exact(s1), _) if is_object_size(self.func, o1, s1, self.layout, self.types) => {
                    true
                }
                (_, Size::Exact(s2)) if is_object_size(self.func, o2, s2, self.layout, self.types) => {
                    true
                }
                _ => false,
            };
            if covers {
                self.cache.insert(key, AliasResult::PartialAlias);
                return AliasResult::PartialAlias;
            }
        }

        self.cache.insert(key, AliasResult::MayAlias);
        AliasResult::MayAlias
    }

    /// Value identity that stays honest inside phi cycles: once the query
    /// has descended through a phi block, an instruction defined in a
    /// block reachable from that phi may hold a different value on each
    /// loop iteration, so syntactic equality no longer proves equality.
    fn is_value_equal_in_potential_cycles(&self, v1: ValueId, v2: ValueId) -> bool {
        if v1 != v2 {
            return false;
        }
        if self.visited_phi_blocks.is_empty() {
            return true;
        }
        if self.visited_phi_blocks.len() > MAX_PHI_BLOCKS_FOR_VALUE_EQUALITY {
            return false;
        }
        let Some(def_block) = self.func.def_block(v1) else {
            // Arguments, globals, constants are loop-invariant.
            return true;
        };
        self.visited_phi_blocks
            .iter()
            .all(|&phi_block| !is_potentially_reachable(self.func, phi_block, def_block))
    }

    fn is_gep(&self, v: ValueId) -> bool {
        matches!(self.func.as_inst(v), Some(Instruction::Gep { .. }))
    }

    fn is_phi(&self, v: ValueId) -> bool {
        matches!(self.func.as_inst(v), Some(Instruction::Phi { .. }))
    }

    fn is_select(&self, v: ValueId) -> bool {
        matches!(self.func.as_inst(v), Some(Instruction::Select { .. }))
    }

    fn is_constant_object(&self, v: ValueId) -> bool {
        match &self.func.value(v).kind {
            ValueKind::Constant(_) => true,
            ValueKind::Global(g) => matches!(
                g.kind,
                crate::values::GlobalKind::Variable { is_constant: true }
            ),
            _ => false,
        }
    }

    fn is_plain_argument(&self, v: ValueId) -> bool {
        self.func.value(v).is_argument()
    }

    fn decompose(&mut self, v: ValueId) -> DecomposedPointer {
        decompose_gep_expression(self.func, v, self.layout, self.types, &mut self.stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn alias_gep(
        &mut self,
        gep1: ValueId,
        size1: Size,
        tag1: Option<AccessTag>,
        v2: ValueId,
        size2: Size,
        tag2: Option<AccessTag>,
        o1: ValueId,
        o2: ValueId,
    ) -> AliasResult {
        let mut d1 = self.decompose(gep1);
        if d1.base != o1 {
            // The decomposition and the underlying-object walk stopped at
            // different places; no conclusion is safe.
            return AliasResult::MayAlias;
        }

        if self.is_gep(v2) {
            let d2 = self.decompose(v2);
            if d2.base != o2 {
                return AliasResult::MayAlias;
            }

            let base_alias = self.alias_check(o1, Size::Unknown, None, o2, Size::Unknown, None);

            // Equal-size accesses off bases that are distinguishable once
            // sized: if the sized bases are disjoint and both pointers add
            // exactly the same offsets, the results are disjoint too.
            if base_alias == AliasResult::MayAlias && size1 == size2 {
                let precise_base_alias = self.alias_check(o1, size1, tag1, o2, size2, tag2);
                if precise_base_alias == AliasResult::NoAlias {
                    if d1.max_lookup_reached || d2.max_lookup_reached {
                        return AliasResult::MayAlias;
                    }
                    if d1.base_offset == d2.base_offset && d1.var_indices == d2.var_indices {
                        return AliasResult::NoAlias;
                    }
                }
            }

            if base_alias != AliasResult::MustAlias {
                return base_alias;
            }

            if d1.max_lookup_reached || d2.max_lookup_reached {
                return AliasResult::MayAlias;
            }

            if let (
                Some(Instruction::Gep { base: b1, .. }),
                Some(Instruction::Gep { base: b2, .. }),
            ) = (self.func.as_inst(gep1), self.func.as_inst(v2))
            {
                if b1 == b2 {
                    let r = self.alias_same_base_pointer_geps(gep1, size1, v2, size2);
                    if r != AliasResult::MayAlias {
                        return r;
                    }
                }
            }

            d1.base_offset = d1.base_offset.wrapping_sub(d2.base_offset);
            self.get_index_difference(&mut d1.var_indices, &d2.var_indices);
        } else {
            // One GEP against a plain pointer: if the other pointer does
            // not must-alias the GEP's base object, a pointer derived from
            // that base cannot alias it either.
            if size1 == Size::Unknown && size2 == Size::Unknown {
                return AliasResult::MayAlias;
            }

            let r = self.alias_check(o1, Size::Unknown, None, v2, size2, tag2);
            if r != AliasResult::MustAlias {
                return r;
            }

            if d1.max_lookup_reached {
                return AliasResult::MayAlias;
            }
        }

        let offset = d1.base_offset;
        if offset == 0 && d1.var_indices.is_empty() {
            return AliasResult::MustAlias;
        }

        if offset != 0 && d1.var_indices.is_empty() {
            if offset >= 0 {
                if let Size::Exact(s2) = size2 {
                    return if (offset as u64) < s2 {
                        AliasResult::PartialAlias
                    } else {
                        AliasResult::NoAlias
                    };
                }
            } else if let Size::Exact(s1) = size1 {
                return if (offset.unsigned_abs()) < s1 {
                    AliasResult::PartialAlias
                } else {
                    AliasResult::NoAlias
                };
            }
        }

        if !d1.var_indices.is_empty() {
            let mut modulo: u64 = 0;
            let mut all_positive = true;
            for term in &d1.var_indices {
                modulo |= term.scale as u64;
                if all_positive {
                    let sign_zero = self.sign_bit_known_zero(term);
                    let sign_one = self.sign_bit_known_one(term);
                    all_positive =
                        (sign_zero && term.scale >= 0) || (sign_one && term.scale < 0);
                }
            }
            // Lowest set bit across all scales: every dynamic contribution
            // is a multiple of this.
            modulo ^= modulo & modulo.wrapping_sub(1);

            if modulo != 0 {
                if let (Size::Exact(s1), Size::Exact(s2)) = (size1, size2) {
                    let mod_offset = (offset as u64) & (modulo - 1);
                    if mod_offset >= s2 && s1 <= modulo - mod_offset {
                        return AliasResult::NoAlias;
                    }
                }
            }

            // All variable terms push the GEP forward from its base, and
            // the base already starts past the other access.
            if all_positive && offset > 0 {
                if let Size::Exact(s2) = size2 {
                    if s2 <= offset as u64 {
                        return AliasResult::NoAlias;
                    }
                }
            }

            if let (Size::Exact(s1), Size::Exact(s2)) = (size1, size2) {
                if self.constant_offset_heuristic(&d1.var_indices, s1, s2, offset) {
                    return AliasResult::NoAlias;
                }
            }
        }

        // Same base object, dynamic offsets nothing above could resolve.
        // The shared base is proven, so the ranges live in one object.
        AliasResult::PartialAlias
    }

    /// Subtracts `src`'s symbolic terms from `dest` in place, cancelling
    /// terms whose value and extension widths match.
    fn get_index_difference(
        &self,
        dest: &mut Vec<VariableGepIndex>,
        src: &[VariableGepIndex],
    ) {
        for term in src {
            let found = dest.iter().position(|d| {
                d.zext_bits == term.zext_bits
                    && d.sext_bits == term.sext_bits
                    && self.is_value_equal_in_potential_cycles(d.value, term.value)
            });
            match found {
                Some(i) => {
                    let merged = dest[i].scale.wrapping_sub(term.scale);
                    if merged == 0 {
                        dest.remove(i);
                    } else {
                        dest[i].scale = merged;
                    }
                }
                None => dest.push(VariableGepIndex {
                    scale: term.scale.wrapping_neg(),
                    ..*term
                }),
            }
        }
    }

    fn sign_bit_known_zero(&self, term: &VariableGepIndex) -> bool {
        if term.zext_bits > 0 {
            return true;
        }
        if let Some(c) = self.func.const_int_value(term.value) {
            return c >= 0;
        }
        matches!(self.func.as_inst(term.value), Some(Instruction::ZExt { .. }))
    }

    fn sign_bit_known_one(&self, term: &VariableGepIndex) -> bool {
        if term.zext_bits > 0 {
            return false;
        }
        self.func
            .const_int_value(term.value)
            .is_some_and(|c| c < 0)
    }

    /// Disambiguates `base + scale*x + c1` against `base + scale*x + c2`:
    /// two residual terms with opposite scales over the same stripped
    /// value differ by a known constant number of bytes.
    fn constant_offset_heuristic(
        &self,
        var_indices: &[VariableGepIndex],
        size1: u64,
        size2: u64,
        base_offset: i64,
    ) -> bool {
        if var_indices.len() != 2 {
            return false;
        }
        let var0 = &var_indices[0];
        let var1 = &var_indices[1];
        if var0.zext_bits != var1.zext_bits
            || var0.sext_bits != var1.sext_bits
            || var0.scale != var1.scale.wrapping_neg()
        {
            return false;
        }

        let Some(width) = self.func.ty(var1.value).int_bits().map(u32::from) else {
            return false;
        };

        let e0 = get_linear_expression(self.func, var0.value, width, 0);
        let e1 = get_linear_expression(self.func, var1.value, width, 0);
        // The two stripped values must reach the residual terms through the
        // same extensions; a sext on one side and a zext on the other read
        // the same narrow bits as different numbers.
        if e0.scale != e1.scale
            || e0.zext_bits != e1.zext_bits
            || e0.sext_bits != e1.sext_bits
            || !self.is_value_equal_in_potential_cycles(e0.value, e1.value)
        {
            return false;
        }

        // Wrapping means "x" and "x + c" may be closer than c; the minimum
        // distance is the smaller of the two directions around the ring.
        let mask = if width >= 128 {
            u128::MAX
        } else {
            (1u128 << width) - 1
        };
        let diff = (wrap_to_bits(e0.offset - e1.offset, width) as u128) & mask;
        let wrapped = mask.wrapping_sub(diff).wrapping_add(1) & mask;
        let min_diff = diff.min(wrapped);
        let min_diff_bytes = min_diff.saturating_mul(var0.scale.unsigned_abs() as u128);

        let slack = base_offset.unsigned_abs() as u128;
        (size1 as u128) + slack <= min_diff_bytes && (size2 as u128) + slack <= min_diff_bytes
    }

    /// Two GEPs off the literally same pointer operand: prove field or
    /// element disjointness from the indexed types.
    fn alias_same_base_pointer_geps(
        &self,
        gep1: ValueId,
        size1: Size,
        gep2: ValueId,
        size2: Size,
    ) -> AliasResult {
        let (Size::Exact(s1), Size::Exact(s2)) = (size1, size2) else {
            return AliasResult::MayAlias;
        };
        let (
            Some(Instruction::Gep {
                source_ty: ty1,
                indices: idx1,
                ..
            }),
            Some(Instruction::Gep {
                source_ty: ty2,
                indices: idx2,
                ..
            }),
        ) = (self.func.as_inst(gep1), self.func.as_inst(gep2))
        else {
            return AliasResult::MayAlias;
        };

        if idx1.len() != idx2.len() || idx1.len() < 2 || ty1 != ty2 {
            return AliasResult::MayAlias;
        }

        // Walk to the type the last index indexes into; everything between
        // must be arrays, or differing indices could select different
        // final types.
        let mut last_ty = ty1.clone();
        for _ in 1..idx1.len() - 1 {
            match last_ty {
                Type::Array(elem, _) => last_ty = *elem,
                _ => return AliasResult::MayAlias,
            }
        }

        let last1 = idx1[idx1.len() - 1];
        let last2 = idx2[idx2.len() - 1];

        match &last_ty {
            Type::Struct(id) => {
                let (GepIndex::Const(c1), GepIndex::Const(c2)) = (last1, last2) else {
                    return AliasResult::MayAlias;
                };
                if c1 == c2 {
                    // Same field, but the leading array indices might still
                    // differ dynamically.
                    return AliasResult::MayAlias;
                }
                let Some(sl) = self.layout.struct_layout(*id, self.types) else {
                    return AliasResult::MayAlias;
                };
                let (Some(off1), Some(off2)) = (
                    sl.field_offset(c1 as usize),
                    sl.field_offset(c2 as usize),
                ) else {
                    return AliasResult::MayAlias;
                };
                let struct_size = sl.size_in_bytes();
                // The two struct instances either coincide exactly or are
                // disjoint, so distinct fields cannot overlap unless one
                // access runs past the end and wraps into the next
                // array element.
                let elts_dont_overlap = |o1: u64, s1: u64, o2: u64, s2: u64| {
                    let (Some(end1), Some(end2)) = (o1.checked_add(s1), o2.checked_add(s2))
                    else {
                        // An access this wide covers the whole object.
                        return false;
                    };
                    o1 < o2 && end1 <= o2 && (end2 <= struct_size || end2 - struct_size <= o1)
                };
                if elts_dont_overlap(off1, s1, off2, s2) || elts_dont_overlap(off2, s2, off1, s1)
                {
                    AliasResult::NoAlias
                } else {
                    AliasResult::MayAlias
                }
            }
            Type::Array(elem, _) => {
                // Out-of-range array indices are legal, so sibling array
                // instances may overlap unless every leading index agrees
                // and each access covers exactly one element.
                let Some(element_size) = self.layout.store_size(elem, self.types) else {
                    return AliasResult::MayAlias;
                };
                if s1 != element_size || s2 != element_size {
                    return AliasResult::MayAlias;
                }
                for i in 0..idx1.len() - 1 {
                    match (idx1[i], idx2[i]) {
                        (GepIndex::Const(a), GepIndex::Const(b)) if a == b => {}
                        (GepIndex::Value(a), GepIndex::Value(b))
                            if self.is_value_equal_in_potential_cycles(a, b) => {}
                        _ => return AliasResult::MayAlias,
                    }
                }
                match (last1, last2) {
                    (GepIndex::Const(c1), GepIndex::Const(c2)) => {
                        if c1 == c2 {
                            AliasResult::MustAlias
                        } else {
                            AliasResult::NoAlias
                        }
                    }
                    // Inside a visited cycle the same instruction can hold
                    // a different value on each iteration, so identity
                    // alone does not pin the element.
                    (GepIndex::Value(a), GepIndex::Value(b))
                        if self.is_value_equal_in_potential_cycles(a, b) =>
                    {
                        AliasResult::MustAlias
                    }
                    _ => AliasResult::MayAlias,
                }
            }
            _ => AliasResult::MayAlias,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn alias_phi(
        &mut self,
        phi: ValueId,
        phi_size: Size,
        phi_tag: Option<AccessTag>,
        v2: ValueId,
        v2_size: Size,
        v2_tag: Option<AccessTag>,
    ) -> AliasResult {
        let Some(Instruction::Phi { incoming }) = self.func.as_inst(phi) else {
            return AliasResult::MayAlias;
        };
        let incoming = incoming.clone();
        let Some(phi_block) = self.func.def_block(phi) else {
            return AliasResult::MayAlias;
        };
        // Value equality must stop trusting syntax inside this cycle.
        self.visited_phi_blocks.insert(phi_block);

        // Two phis in one block advance in lockstep, so compare them
        // edge-by-edge under the speculation that the phis themselves do
        // not alias. If an edge disproves it, undo the speculation.
        if let Some(Instruction::Phi { incoming: incoming2 }) = self.func.as_inst(v2) {
            if self.func.def_block(v2) == Some(phi_block) {
                let incoming2 = incoming2.clone();
                let key = LocPair::new(
                    MemoryLocation { ptr: phi, size: phi_size, tag: phi_tag },
                    MemoryLocation { ptr: v2, size: v2_size, tag: v2_tag },
                );
                let original = self.cache.insert(key, AliasResult::NoAlias);

                let mut alias = AliasResult::NoAlias;
                for (block, value) in &incoming {
                    let Some((_, value2)) =
                        incoming2.iter().find(|(b, _)| b == block).copied()
                    else {
                        alias = AliasResult::MayAlias;
                        break;
                    };
                    let this = self.alias_check(*value, phi_size, phi_tag, value2, v2_size, v2_tag);
                    alias = merge_alias_results(this, alias);
                    if alias == AliasResult::MayAlias {
                        break;
                    }
                }

                if alias != AliasResult::NoAlias {
                    match original {
                        Some(orig) => self.cache.insert(key, orig),
                        None => self.cache.remove(&key),
                    };
                }
                return alias;
            }
        }

        let mut sources: Vec<ValueId> = Vec::new();
        let mut seen = HashSet::new();
        let mut is_recursive = false;
        for (_, value) in &incoming {
            if self.is_phi(*value) {
                // Nested phi sources would multiply out the comparison;
                // give up rather than go quadratic.
                return AliasResult::MayAlias;
            }
            if self.recursive_phi {
                if let Some(Instruction::Gep { base, indices, .. }) = self.func.as_inst(*value) {
                    if *base == phi
                        && indices.len() == 1
                        && matches!(indices[0], GepIndex::Const(_))
                    {
                        // The phi advances itself by a constant stride each
                        // iteration; model it as reaching any offset.
                        is_recursive = true;
                        continue;
                    }
                }
            }
            if seen.insert(*value) {
                sources.push(*value);
            }
        }

        if sources.is_empty() {
            return AliasResult::MayAlias;
        }
        let phi_size = if is_recursive { Size::Unknown } else { phi_size };

        let mut alias =
            self.alias_check(v2, v2_size, v2_tag, sources[0], phi_size, phi_tag);
        if alias == AliasResult::MayAlias {
            return AliasResult::MayAlias;
        }
        for &source in &sources[1..] {
            let this = self.alias_check(v2, v2_size, v2_tag, source, phi_size, phi_tag);
            alias = merge_alias_results(this, alias);
            if alias == AliasResult::MayAlias {
                break;
            }
        }
        alias
    }

    #[allow(clippy::too_many_arguments)]
    fn alias_select(
        &mut self,
        select: ValueId,
        select_size: Size,
        select_tag: Option<AccessTag>,
        v2: ValueId,
        v2_size: Size,
        v2_tag: Option<AccessTag>,
    ) -> AliasResult {
        let Some(Instruction::Select {
            condition,
            true_value,
            false_value,
        }) = self.func.as_inst(select).cloned()
        else {
            return AliasResult::MayAlias;
        };

        // Selects over one condition pick the same arm; compare armwise.
        if let Some(Instruction::Select {
            condition: c2,
            true_value: t2,
            false_value: f2,
        }) = self.func.as_inst(v2).cloned()
        {
            if condition == c2 {
                let on_true =
                    self.alias_check(true_value, select_size, select_tag, t2, v2_size, v2_tag);
                if on_true == AliasResult::MayAlias {
                    return AliasResult::MayAlias;
                }
                let on_false =
                    self.alias_check(false_value, select_size, select_tag, f2, v2_size, v2_tag);
                return merge_alias_results(on_true, on_false);
            }
        }

        let on_true = self.alias_check(v2, v2_size, v2_tag, true_value, select_size, select_tag);
        if on_true == AliasResult::MayAlias {
            return AliasResult::MayAlias;
        }
        let on_false =
            self.alias_check(v2, v2_size, v2_tag, false_value, select_size, select_tag);
        merge_alias_results(on_true, on_false)
    }

    /// Whether every object the location can point at is immutable (or,
    /// with `or_local`, local to this frame). Walks through selects and
    /// phis under a small budget.
    pub fn points_to_constant_memory(&mut self, loc: &MemoryLocation, or_local: bool) -> bool {
        let mut worklist = vec![loc.ptr];
        let mut visited = HashSet::new();
        let mut budget = MAX_CONSTANT_MEMORY_LOOKUPS;

        while let Some(p) = worklist.pop() {
            let v = underlying_object(self.func, p);
            if !visited.insert(v) {
                return false;
            }

            match &self.func.value(v).kind {
                ValueKind::Inst {
                    inst: Instruction::Alloca { .. },
                    ..
                } if or_local => {}
                ValueKind::Global(g) => {
                    if !matches!(
                        g.kind,
                        crate::values::GlobalKind::Variable { is_constant: true }
                    ) {
                        return false;
                    }
                }
                ValueKind::Inst {
                    inst:
                        Instruction::Select {
                            true_value,
                            false_value,
                            ..
                        },
                    ..
                } => {
                    worklist.push(*true_value);
                    worklist.push(*false_value);
                }
                ValueKind::Inst {
                    inst: Instruction::Phi { incoming },
                    ..
                } => {
                    if incoming.len() > MAX_CONSTANT_MEMORY_LOOKUPS {
                        return false;
                    }
                    for (_, value) in incoming {
                        worklist.push(*value);
                    }
                }
                _ => return false,
            }

            budget -= 1;
            if budget == 0 && !worklist.is_empty() {
                return false;
            }
        }
        true
    }

    /// What this call could do to the given location, refined with local
    /// escape knowledge beyond the declared behavior.
    pub fn get_mod_ref_info(&mut self, call: ValueId, loc: &MemoryLocation) -> ModRefInfo {
        let Some(call_inst) = self.func.as_inst(call).and_then(Instruction::as_call) else {
            return ModRefInfo::MOD_REF;
        };
        let attrs = call_inst.attrs;
        let args = call_inst.args.clone();
        let arg_attrs: Vec<_> = (0..args.len()).map(|i| call_inst.arg_attrs(i)).collect();

        let object = underlying_object(self.func, loc.ptr);

        // A tail call runs after the caller's frame is notionally dead, so
        // it cannot touch the caller's stack slots.
        if matches!(self.func.as_inst(object), Some(Instruction::Alloca { .. }))
            && attrs.is_tail_call
        {
            return ModRefInfo::NO;
        }

        // A local object whose address never escaped can only be reached
        // through the call's own arguments, and only the nocapture/byval
        // ones could have been how it got there.
        let mut result = ModRefInfo::MOD_REF;
        if !self.is_constant_object(object)
            && call != object
            && is_non_escaping_local_object(self.func, object)
        {
            let mut passed_as_arg = false;
            for (i, &arg) in args.iter().enumerate() {
                if !self.func.is_pointer(arg) {
                    continue;
                }
                let a = arg_attrs[i];
                if !a.nocapture && !a.byval {
                    continue;
                }
                let alias =
                    self.alias_check(arg, Size::Unknown, None, object, Size::Unknown, None);
                if alias != AliasResult::NoAlias {
                    passed_as_arg = true;
                    break;
                }
            }
            if !passed_as_arg {
                result = ModRefInfo::NO;
            }
        }
        self.cache.clear();
        self.visited_phi_blocks.clear();

        if result == ModRefInfo::NO {
            return result;
        }
        behavior_from_attrs(&attrs).as_mod_ref()
    }

    /// Refines what a call could have done to a location using capture
    /// ordering: if the location's object was not captured before the
    /// call, only the call's own pointer arguments could reach it.
    pub fn call_captures_before(
        &mut self,
        call: ValueId,
        loc: &MemoryLocation,
    ) -> ModRefInfo {
        let Some(dom) = self.dom else {
            return ModRefInfo::MOD_REF;
        };
        let object = underlying_object(self.func, loc.ptr);
        if !is_identified_object(self.func, object)
            || matches!(
                self.func.value(object).kind,
                ValueKind::Global(_) | ValueKind::Constant(_)
            )
        {
            return ModRefInfo::MOD_REF;
        }
        let Some(call_inst) = self.func.as_inst(call).and_then(Instruction::as_call) else {
            return ModRefInfo::MOD_REF;
        };
        if call == object {
            return ModRefInfo::MOD_REF;
        }
        let args = call_inst.args.clone();
        let arg_attrs: Vec<_> = (0..args.len()).map(|i| call_inst.arg_attrs(i)).collect();

        let Some(point) = self.func.def_site(call) else {
            return ModRefInfo::MOD_REF;
        };
        let mut tracker = CapturesBefore::new(self.func, dom, point, true);
        pointer_may_be_captured_with(self.func, object, &mut tracker);
        if tracker.captured {
            return ModRefInfo::MOD_REF;
        }

        let mut result = ModRefInfo::NO;
        for (i, &arg) in args.iter().enumerate() {
            if !self.func.is_pointer(arg) {
                continue;
            }
            let a = arg_attrs[i];
            if !a.nocapture && !a.byval {
                continue;
            }
            let alias = self.alias_check(arg, Size::Unknown, None, object, Size::Unknown, None);
            self.cache.clear();
            self.visited_phi_blocks.clear();
            if alias == AliasResult::NoAlias {
                continue;
            }
            if a.readnone {
                continue;
            }
            if a.readonly {
                result = ModRefInfo::REF;
                continue;
            }
            return ModRefInfo::MOD_REF;
        }
        result
    }
}

/// Declared memory behavior of a call site, from its attributes alone.
pub fn behavior_from_attrs(attrs: &CallAttrs) -> MemoryBehavior {
    if attrs.does_not_access_memory {
        return MemoryBehavior::DOES_NOT_ACCESS;
    }
    match (attrs.only_reads_memory, attrs.only_accesses_arg_memory) {
        (true, true) => MemoryBehavior::ONLY_READS_ARG,
        (true, false) => MemoryBehavior::ONLY_READS,
        (false, true) => MemoryBehavior::ONLY_ACCESSES_ARG,
        (false, false) => MemoryBehavior::UNKNOWN,
    }
}

impl AliasProvider for BasicAliasAnalysis<'_> {
    fn alias(&mut self, a: &MemoryLocation, b: &MemoryLocation) -> AliasResult {
        BasicAliasAnalysis::alias(self, a, b)
    }

    fn points_to_constant_memory(&mut self, loc: &MemoryLocation, or_local: bool) -> bool {
        BasicAliasAnalysis::points_to_constant_memory(self, loc, or_local)
    }

    fn get_mod_ref_info(&mut self, call: ValueId, loc: &MemoryLocation) -> ModRefInfo {
        BasicAliasAnalysis::get_mod_ref_info(self, call, loc)
    }

    fn call_behavior(&mut self, call: ValueId) -> MemoryBehavior {
        match self.func.as_inst(call).and_then(Instruction::as_call) {
            Some(c) => behavior_from_attrs(&c.attrs),
            None => MemoryBehavior::UNKNOWN,
        }
    }
}
