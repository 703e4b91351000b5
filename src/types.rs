use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    /// Integer of an arbitrary bit width.
    Int(u16),
    /// Typed pointer into a numbered address space.
    Ptr { pointee: Box<Type>, addr_space: u32 },
    /// Fixed-length array.
    Array(Box<Type>, u64),
    Struct(StructId),
}

impl Type {
    pub fn ptr_to(pointee: Type) -> Type {
        Type::Ptr {
            pointee: Box::new(pointee),
            addr_space: 0,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Ptr { .. })
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn int_bits(&self) -> Option<u16> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Ptr { pointee, .. } => Some(pointee),
            _ => None,
        }
    }

    pub fn addr_space(&self) -> Option<u32> {
        match self {
            Type::Ptr { addr_space, .. } => Some(*addr_space),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Ptr {
                pointee,
                addr_space: 0,
            } => write!(f, "{}*", pointee),
            Type::Ptr { pointee, addr_space } => {
                write!(f, "{} addrspace({})*", pointee, addr_space)
            }
            Type::Array(elem, len) => write!(f, "[{} x {}]", len, elem),
            Type::Struct(id) => write!(f, "%struct.{}", id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructId(pub u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<Type>,
}

/// Registry of named aggregates referenced by `Type::Struct`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRegistry {
    pub structs: IndexMap<StructId, StructDefinition>,
    next_struct_id: u32,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_struct(&mut self, def: StructDefinition) -> StructId {
        let id = StructId(self.next_struct_id);
        self.next_struct_id += 1;
        self.structs.insert(id, def);
        id
    }

    pub fn get_struct(&self, id: StructId) -> Option<&StructDefinition> {
        self.structs.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        assert_eq!(Type::Int(32).to_string(), "i32");
        assert_eq!(Type::ptr_to(Type::Int(8)).to_string(), "i8*");
        assert_eq!(
            Type::Array(Box::new(Type::Int(32)), 4).to_string(),
            "[4 x i32]"
        );
    }

    #[test]
    fn test_registry_ids_are_distinct() {
        let mut registry = TypeRegistry::new();
        let a = registry.add_struct(StructDefinition {
            name: "a".into(),
            fields: vec![Type::Int(32)],
        });
        let b = registry.add_struct(StructDefinition {
            name: "b".into(),
            fields: vec![Type::Int(64)],
        });
        assert_ne!(a, b);
        assert_eq!(registry.get_struct(a).unwrap().name, "a");
    }
}
