use crate::types::{StructId, Type, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Target data layout: pointer widths and type sizes.
///
/// Every size-based disjointness proof and every GEP offset computation goes
/// through here. All accessors return `Option` rather than panicking; a
/// missing size resolves to a conservative answer upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLayout {
    default_pointer_bits: u32,
    pointer_bits_by_space: HashMap<u32, u32>,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            default_pointer_bits: 64,
            pointer_bits_by_space: HashMap::new(),
        }
    }
}

impl DataLayout {
    pub fn new(default_pointer_bits: u32) -> Self {
        Self {
            default_pointer_bits,
            pointer_bits_by_space: HashMap::new(),
        }
    }

    pub fn set_pointer_bits(&mut self, addr_space: u32, bits: u32) {
        self.pointer_bits_by_space.insert(addr_space, bits);
    }

    pub fn pointer_bits(&self, addr_space: u32) -> u32 {
        self.pointer_bits_by_space
            .get(&addr_space)
            .copied()
            .unwrap_or(self.default_pointer_bits)
    }

    /// Number of bytes the value of `ty` occupies when stored.
    pub fn store_size(&self, ty: &Type, types: &TypeRegistry) -> Option<u64> {
        match ty {
            Type::Void => None,
            Type::Int(bits) => Some((u64::from(*bits) + 7) / 8),
            Type::Ptr { addr_space, .. } => Some(u64::from(self.pointer_bits(*addr_space)) / 8),
            Type::Array(elem, len) => self.alloc_size(elem, types).map(|s| s * len),
            Type::Struct(id) => self.struct_layout(*id, types).map(|l| l.size),
        }
    }

    /// Bytes between successive elements of `ty` in an array: the store size
    /// rounded up to the ABI alignment.
    pub fn alloc_size(&self, ty: &Type, types: &TypeRegistry) -> Option<u64> {
        let size = self.store_size(ty, types)?;
        let align = self.abi_align(ty, types)?;
        Some(size.div_ceil(align) * align)
    }

    pub fn abi_align(&self, ty: &Type, types: &TypeRegistry) -> Option<u64> {
        match ty {
            Type::Void => None,
            Type::Int(bits) => {
                let bytes = (u64::from(*bits) + 7) / 8;
                Some(bytes.next_power_of_two().min(8))
            }
            Type::Ptr { addr_space, .. } => Some(u64::from(self.pointer_bits(*addr_space)) / 8),
            Type::Array(elem, _) => self.abi_align(elem, types),
            Type::Struct(id) => {
                let def = types.get_struct(*id)?;
                let mut align = 1;
                for field in &def.fields {
                    align = align.max(self.abi_align(field, types)?);
                }
                Some(align)
            }
        }
    }

    /// Byte offsets of every field plus the padded total size.
    pub fn struct_layout(&self, id: StructId, types: &TypeRegistry) -> Option<StructLayout> {
        let def = types.get_struct(id)?;
        let mut offsets = Vec::with_capacity(def.fields.len());
        let mut offset = 0u64;
        let mut struct_align = 1u64;
        for field in &def.fields {
            let align = self.abi_align(field, types)?;
            struct_align = struct_align.max(align);
            offset = offset.div_ceil(align) * align;
            offsets.push(offset);
            offset += self.store_size(field, types)?;
        }
        let size = offset.div_ceil(struct_align) * struct_align;
        Some(StructLayout {
            size,
            align: struct_align,
            offsets,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructLayout {
    size: u64,
    align: u64,
    offsets: Vec<u64>,
}

impl StructLayout {
    pub fn size_in_bytes(&self) -> u64 {
        self.size
    }

    pub fn alignment(&self) -> u64 {
        self.align
    }

    pub fn field_offset(&self, field: usize) -> Option<u64> {
        self.offsets.get(field).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructDefinition;

    #[test]
    fn test_scalar_sizes() {
        let layout = DataLayout::default();
        let types = TypeRegistry::new();
        assert_eq!(layout.store_size(&Type::Int(32), &types), Some(4));
        assert_eq!(layout.store_size(&Type::Int(1), &types), Some(1));
        assert_eq!(layout.store_size(&Type::ptr_to(Type::Int(8)), &types), Some(8));
        assert_eq!(
            layout.store_size(&Type::Array(Box::new(Type::Int(32)), 4), &types),
            Some(16)
        );
    }

    #[test]
    fn test_struct_field_offsets() {
        let layout = DataLayout::default();
        let mut types = TypeRegistry::new();
        let id = types.add_struct(StructDefinition {
            name: "pair".into(),
            fields: vec![Type::Int(32), Type::Int(32)],
        });
        let sl = layout.struct_layout(id, &types).unwrap();
        assert_eq!(sl.field_offset(0), Some(0));
        assert_eq!(sl.field_offset(1), Some(4));
        assert_eq!(sl.size_in_bytes(), 8);
    }

    #[test]
    fn test_struct_padding() {
        let layout = DataLayout::default();
        let mut types = TypeRegistry::new();
        let id = types.add_struct(StructDefinition {
            name: "padded".into(),
            fields: vec![Type::Int(8), Type::Int(64), Type::Int(8)],
        });
        let sl = layout.struct_layout(id, &types).unwrap();
        assert_eq!(sl.field_offset(0), Some(0));
        assert_eq!(sl.field_offset(1), Some(8));
        assert_eq!(sl.field_offset(2), Some(16));
        assert_eq!(sl.size_in_bytes(), 24);
        assert_eq!(sl.alignment(), 8);
    }

    #[test]
    fn test_pointer_bits_per_space() {
        let mut layout = DataLayout::default();
        layout.set_pointer_bits(1, 32);
        assert_eq!(layout.pointer_bits(0), 64);
        assert_eq!(layout.pointer_bits(1), 32);
    }
}
