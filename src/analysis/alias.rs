/*!
Core vocabulary of alias queries: memory locations, the alias lattice,
and mod/ref summaries.
*/

use crate::function::Function;
use crate::values::ValueId;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Byte size of a memory access, when known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Size {
    Exact(u64),
    Unknown,
}

impl Size {
    pub fn bytes(self) -> Option<u64> {
        match self {
            Size::Exact(n) => Some(n),
            Size::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Size::Unknown)
    }
}

/// Opaque access tag carried on a location. The engine carries tags
/// through queries and cache keys but never interprets them; a
/// type-aware provider in the chain could.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessTag(pub u32);

/// A pointer together with the byte extent accessed through it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryLocation {
    pub ptr: ValueId,
    pub size: Size,
    pub tag: Option<AccessTag>,
}

impl MemoryLocation {
    pub fn new(ptr: ValueId, size: Size) -> Self {
        Self {
            ptr,
            size,
            tag: None,
        }
    }

    pub fn with_tag(ptr: ValueId, size: Size, tag: AccessTag) -> Self {
        Self {
            ptr,
            size,
            tag: Some(tag),
        }
    }

    /// Location accessed by a `Load`, sized from the loaded type.
    pub fn for_load(
        func: &Function,
        load: ValueId,
        layout: &crate::layout::DataLayout,
        types: &crate::types::TypeRegistry,
    ) -> Option<Self> {
        match func.as_inst(load)? {
            crate::instructions::Instruction::Load { ptr } => {
                let size = layout
                    .store_size(func.ty(load), types)
                    .map_or(Size::Unknown, Size::Exact);
                Some(Self::new(*ptr, size))
            }
            _ => None,
        }
    }

    /// Location accessed by a `Store`, sized from the stored type.
    pub fn for_store(
        func: &Function,
        store: ValueId,
        layout: &crate::layout::DataLayout,
        types: &crate::types::TypeRegistry,
    ) -> Option<Self> {
        match func.as_inst(store)? {
            crate::instructions::Instruction::Store { ptr, value } => {
                let size = layout
                    .store_size(func.ty(*value), types)
                    .map_or(Size::Unknown, Size::Exact);
                Some(Self::new(*ptr, size))
            }
            _ => None,
        }
    }
}

/// Possible answers to an alias query, from strongest separation to
/// strongest identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AliasResult {
    /// The two ranges never overlap.
    NoAlias,
    /// Nothing is known either way.
    MayAlias,
    /// The ranges overlap but do not start at the same address.
    PartialAlias,
    /// Both ranges start at exactly the same address.
    MustAlias,
}

/// Combines two answers for the same query arrived at along different
/// control-flow paths (phi edges, select arms). Identical answers pass
/// through; `MustAlias` meeting `PartialAlias` still proves overlap;
/// every other disagreement decays to `MayAlias`, since one path
/// overlapping and another not means nothing definite holds overall.
pub fn merge_alias_results(a: AliasResult, b: AliasResult) -> AliasResult {
    use AliasResult::*;
    match (a, b) {
        _ if a == b => a,
        (PartialAlias, MustAlias) | (MustAlias, PartialAlias) => PartialAlias,
        _ => MayAlias,
    }
}

/// Unordered pair of locations, used as a cache key. Construction
/// normalizes operand order so `(a, b)` and `(b, a)` hit the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocPair {
    pub first: MemoryLocation,
    pub second: MemoryLocation,
}

impl LocPair {
    pub fn new(a: MemoryLocation, b: MemoryLocation) -> Self {
        if (a.ptr, a.size, a.tag) <= (b.ptr, b.size, b.tag) {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }
}

bitflags! {
    /// Whether an operation may read or write a location.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModRefInfo: u8 {
        const REF = 1;
        const MOD = 2;
        const MOD_REF = Self::REF.bits() | Self::MOD.bits();
    }
}

impl ModRefInfo {
    pub const NO: ModRefInfo = ModRefInfo::empty();

    pub fn may_read(self) -> bool {
        self.contains(ModRefInfo::REF)
    }

    pub fn may_write(self) -> bool {
        self.contains(ModRefInfo::MOD)
    }
}

bitflags! {
    /// Memory behavior of a whole call: which locations it can touch and
    /// how. Encoded so that intersecting two behaviors is a bitwise AND.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemoryBehavior: u8 {
        const REF = 1;
        const MOD = 2;
        const ARG_POINTEES = 4;
        const ANYWHERE = 8 | 4;
    }
}

impl MemoryBehavior {
    pub const DOES_NOT_ACCESS: MemoryBehavior = MemoryBehavior::empty();
    pub const ONLY_READS_ARG: MemoryBehavior = MemoryBehavior::ARG_POINTEES.union(MemoryBehavior::REF);
    pub const ONLY_ACCESSES_ARG: MemoryBehavior = MemoryBehavior::ARG_POINTEES
        .union(MemoryBehavior::REF)
        .union(MemoryBehavior::MOD);
    pub const ONLY_READS: MemoryBehavior = MemoryBehavior::ANYWHERE.union(MemoryBehavior::REF);
    pub const UNKNOWN: MemoryBehavior = MemoryBehavior::ANYWHERE
        .union(MemoryBehavior::REF)
        .union(MemoryBehavior::MOD);

    pub fn does_not_access_memory(self) -> bool {
        self == MemoryBehavior::DOES_NOT_ACCESS
    }

    pub fn only_reads_memory(self) -> bool {
        !self.contains(MemoryBehavior::MOD)
    }

    pub fn only_accesses_arg_pointees(self) -> bool {
        !self.intersects(MemoryBehavior::ANYWHERE.difference(MemoryBehavior::ARG_POINTEES))
    }

    pub fn does_access_arg_pointees(self) -> bool {
        self.contains(MemoryBehavior::ARG_POINTEES)
    }

    pub fn intersect(self, other: MemoryBehavior) -> MemoryBehavior {
        self & other
    }

    pub fn as_mod_ref(self) -> ModRefInfo {
        let mut m = ModRefInfo::NO;
        if self.contains(MemoryBehavior::REF) {
            m |= ModRefInfo::REF;
        }
        if self.contains(MemoryBehavior::MOD) {
            m |= ModRefInfo::MOD;
        }
        m
    }
}
