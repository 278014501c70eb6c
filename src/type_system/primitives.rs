use std::fmt;

use crate::target::Target;

/// Built-in scalar types known to every type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    NativeInt,
    NativeUInt,
    F32,
    F64,
    Vector64,
    Vector128,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 16] = [
        PrimitiveType::Bool,
        PrimitiveType::Char,
        PrimitiveType::I8,
        PrimitiveType::U8,
        PrimitiveType::I16,
        PrimitiveType::U16,
        PrimitiveType::I32,
        PrimitiveType::U32,
        PrimitiveType::I64,
        PrimitiveType::U64,
        PrimitiveType::NativeInt,
        PrimitiveType::NativeUInt,
        PrimitiveType::F32,
        PrimitiveType::F64,
        PrimitiveType::Vector64,
        PrimitiveType::Vector128,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Char => "char",
            PrimitiveType::I8 => "sbyte",
            PrimitiveType::U8 => "byte",
            PrimitiveType::I16 => "short",
            PrimitiveType::U16 => "ushort",
            PrimitiveType::I32 => "int",
            PrimitiveType::U32 => "uint",
            PrimitiveType::I64 => "long",
            PrimitiveType::U64 => "ulong",
            PrimitiveType::NativeInt => "nint",
            PrimitiveType::NativeUInt => "nuint",
            PrimitiveType::F32 => "float",
            PrimitiveType::F64 => "double",
            PrimitiveType::Vector64 => "Vector64",
            PrimitiveType::Vector128 => "Vector128",
        }
    }

    /// Resolve a primitive from its spelling or a common alias.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let primitive = match name.trim() {
            "bool" | "Boolean" => PrimitiveType::Bool,
            "char" | "Char" => PrimitiveType::Char,
            "sbyte" | "i8" | "SByte" => PrimitiveType::I8,
            "byte" | "u8" | "Byte" => PrimitiveType::U8,
            "short" | "i16" | "Int16" => PrimitiveType::I16,
            "ushort" | "u16" | "UInt16" => PrimitiveType::U16,
            "int" | "i32" | "Int32" => PrimitiveType::I32,
            "uint" | "u32" | "UInt32" => PrimitiveType::U32,
            "long" | "i64" | "Int64" => PrimitiveType::I64,
            "ulong" | "u64" | "UInt64" => PrimitiveType::U64,
            "nint" | "isize" | "IntPtr" => PrimitiveType::NativeInt,
            "nuint" | "usize" | "UIntPtr" => PrimitiveType::NativeUInt,
            "float" | "f32" | "Single" => PrimitiveType::F32,
            "double" | "f64" | "Double" => PrimitiveType::F64,
            "Vector64" => PrimitiveType::Vector64,
            "Vector128" => PrimitiveType::Vector128,
            _ => return None,
        };
        Some(primitive)
    }

    /// Size and natural alignment on `target`.
    #[must_use]
    pub fn size_align(self, target: &Target) -> (usize, usize) {
        match self {
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => (1, 1),
            PrimitiveType::Char | PrimitiveType::I16 | PrimitiveType::U16 => (2, 2),
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => (4, 4),
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => {
                (8, target.int64_align())
            }
            PrimitiveType::NativeInt | PrimitiveType::NativeUInt => {
                (target.pointer_size(), target.pointer_align())
            }
            PrimitiveType::Vector64 => (8, 8),
            PrimitiveType::Vector128 => (16, 16),
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
