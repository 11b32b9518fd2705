//! Global Symbol Table
//!
//! Function signatures and global variables known for the program being lifted,
//! plus the C type model used for pointer scaling, field lookup and argument casts.

use crate::lifter::ast::node::{parse_int, WireInt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// C type as delivered by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeInfo {
    Void,
    Integer {
        signed: bool,
        size: u8,
    },
    Float {
        size: u8,
    },
    Pointer {
        pointee: Box<TypeInfo>,
    },
    Struct {
        name: String,
        #[serde(default)]
        size: u32,
        #[serde(default)]
        fields: Vec<FieldInfo>,
    },
    Array {
        element: Box<TypeInfo>,
        size: Option<usize>,
    },
    Function {
        params: Vec<TypeInfo>,
        return_type: Box<TypeInfo>,
    },
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub type_info: TypeInfo,
    pub offset: u32,
}

impl TypeInfo {
    pub fn int() -> Self {
        TypeInfo::Integer {
            signed: true,
            size: 4,
        }
    }

    pub fn char() -> Self {
        TypeInfo::Integer {
            signed: true,
            size: 1,
        }
    }

    pub fn pointer_to(pointee: TypeInfo) -> Self {
        TypeInfo::Pointer {
            pointee: Box::new(pointee),
        }
    }

    /// Size in bytes, if the type has one.
    pub fn size_in_bytes(&self) -> Option<u32> {
        match self {
            TypeInfo::Integer { size, .. } | TypeInfo::Float { size } => Some(u32::from(*size)),
            TypeInfo::Pointer { .. } => Some(4),
            TypeInfo::Struct { size, .. } if *size > 0 => Some(*size),
            TypeInfo::Array {
                element,
                size: Some(len),
            } => {
                let len: u32 = u32::try_from(*len).ok()?;
                element.size_in_bytes()?.checked_mul(len)
            }
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeInfo::Void)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeInfo::Pointer { .. })
    }

    pub fn pointee(&self) -> Option<&TypeInfo> {
        match self {
            TypeInfo::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    /// Size of the pointed-to type; `None` for non-pointers and unsized pointees.
    pub fn pointee_size(&self) -> Option<u32> {
        self.pointee().and_then(TypeInfo::size_in_bytes)
    }

    /// Field starting exactly at `offset` of a struct type.
    pub fn field_at(&self, offset: u32) -> Option<&FieldInfo> {
        match self {
            TypeInfo::Struct { fields, .. } => fields.iter().find(|f| f.offset == offset),
            _ => None,
        }
    }

    /// Element type of an array type.
    pub fn element(&self) -> Option<&TypeInfo> {
        match self {
            TypeInfo::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// C spelling used in casts.
    pub fn c_name(&self) -> String {
        match self {
            TypeInfo::Void => "void".to_string(),
            TypeInfo::Integer { signed, size } => {
                let base: &str = match size {
                    1 => "char",
                    2 => "short",
                    8 => "long long",
                    _ => "int",
                };
                if *signed {
                    base.to_string()
                } else {
                    format!("unsigned {}", base)
                }
            }
            TypeInfo::Float { size } => {
                if *size == 8 {
                    "double".to_string()
                } else {
                    "float".to_string()
                }
            }
            TypeInfo::Pointer { pointee } => format!("{} *", pointee.c_name()),
            TypeInfo::Struct { name, .. } => format!("struct {}", name),
            TypeInfo::Array { element, .. } => format!("{} *", element.c_name()),
            TypeInfo::Function { .. } => "void *".to_string(),
            TypeInfo::Unknown => "int".to_string(),
        }
    }

    /// Whether a value of type `self` can be passed where `other` is declared
    /// without a cast.
    pub fn is_compatible_with(&self, other: &TypeInfo) -> bool {
        match (self, other) {
            (TypeInfo::Unknown, _) | (_, TypeInfo::Unknown) => true,
            (TypeInfo::Integer { size: a, .. }, TypeInfo::Integer { size: b, .. }) => a == b,
            (TypeInfo::Float { size: a }, TypeInfo::Float { size: b }) => a == b,
            (TypeInfo::Pointer { pointee: a }, TypeInfo::Pointer { pointee: b }) => {
                a.is_void() || b.is_void() || a.is_compatible_with(b)
            }
            (TypeInfo::Array { element: a, .. }, TypeInfo::Pointer { pointee: b }) => {
                b.is_void() || a.is_compatible_with(b)
            }
            _ => self == other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub type_info: TypeInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSymbol {
    pub address: WireInt,
    pub name: String,
    #[serde(default)]
    pub return_type: Option<TypeInfo>,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    #[serde(default)]
    pub varargs: bool,
}

impl FunctionSymbol {
    pub fn returns_void(&self) -> bool {
        matches!(self.return_type, Some(TypeInfo::Void))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub address: WireInt,
    pub name: String,
    #[serde(default)]
    pub type_info: Option<TypeInfo>,
}

/// Wire form of the symbol table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTableRecord {
    #[serde(default)]
    pub functions: Vec<FunctionSymbol>,
    #[serde(default)]
    pub globals: Vec<GlobalVariable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "SymbolTableRecord")]
pub struct GlobalSymbolTable {
    functions: HashMap<i64, FunctionSymbol>,
    function_names: HashMap<String, i64>,
    globals: HashMap<i64, GlobalVariable>,
}

impl From<SymbolTableRecord> for GlobalSymbolTable {
    fn from(record: SymbolTableRecord) -> Self {
        let mut table: GlobalSymbolTable = GlobalSymbolTable::default();
        for function in record.functions {
            table.add_function(function);
        }
        for global in record.globals {
            table.add_global(global);
        }
        table
    }
}

impl GlobalSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: FunctionSymbol) {
        match function.address.as_i64() {
            Some(address) => {
                self.function_names.insert(function.name.clone(), address);
                self.functions.insert(address, function);
            }
            None => {
                log::warn!(
                    "function symbol '{}' has unreadable address {:?}; skipped",
                    function.name,
                    function.address
                );
            }
        }
    }

    pub fn add_global(&mut self, global: GlobalVariable) {
        match global.address.as_i64() {
            Some(address) => {
                self.globals.insert(address, global);
            }
            None => {
                log::warn!(
                    "global '{}' has unreadable address {:?}; skipped",
                    global.name,
                    global.address
                );
            }
        }
    }

    pub fn function_at(&self, address: i64) -> Option<&FunctionSymbol> {
        self.functions.get(&address)
    }

    /// Function symbol for a hex or decimal address string.
    pub fn function_at_text(&self, address: &str) -> Option<&FunctionSymbol> {
        parse_int(address).and_then(|a| self.function_at(a))
    }

    pub fn function_named(&self, name: &str) -> Option<&FunctionSymbol> {
        self.function_names
            .get(name)
            .and_then(|address| self.functions.get(address))
    }

    pub fn global_at(&self, address: i64) -> Option<&GlobalVariable> {
        self.globals.get(&address)
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointee_size() {
        let p = TypeInfo::pointer_to(TypeInfo::int());
        assert_eq!(p.pointee_size(), Some(4));
        assert_eq!(TypeInfo::pointer_to(TypeInfo::Void).pointee_size(), None);
    }

    #[test]
    fn test_array_size_saturates_to_unknown() {
        let small = TypeInfo::Array {
            element: Box::new(TypeInfo::int()),
            size: Some(3),
        };
        assert_eq!(small.size_in_bytes(), Some(12));
        let huge = TypeInfo::Array {
            element: Box::new(TypeInfo::int()),
            size: Some(0x4000_0000),
        };
        assert_eq!(huge.size_in_bytes(), None);
    }

    #[test]
    fn test_compatibility() {
        let int_ptr = TypeInfo::pointer_to(TypeInfo::int());
        let void_ptr = TypeInfo::pointer_to(TypeInfo::Void);
        assert!(int_ptr.is_compatible_with(&void_ptr));
        assert!(!TypeInfo::int().is_compatible_with(&int_ptr));
        assert!(TypeInfo::Unknown.is_compatible_with(&int_ptr));
    }

    #[test]
    fn test_symbol_table_from_json() {
        let table: GlobalSymbolTable = serde_json::from_str(
            r#"{"functions": [{"address": "0x10400", "name": "printf",
                 "return_type": {"integer": {"signed": true, "size": 4}}}]}"#,
        )
        .unwrap();
        assert_eq!(table.function_at(0x10400).map(|f| f.name.as_str()), Some("printf"));
        assert!(table.function_named("printf").is_some());
    }
}
