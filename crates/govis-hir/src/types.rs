use govis_common::{Span, Symbol};
use smol_str::SmolStr;
use crate::item::Visibility;

/// Go's predeclared basic types. `byte` and `rune` are folded into their
/// underlying types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    String,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl PrimitiveType {
    pub fn from_name(name: &str) -> Option<Self> {
        let prim = match name {
            "bool" => PrimitiveType::Bool,
            "string" => PrimitiveType::String,
            "int" => PrimitiveType::Int,
            "int8" => PrimitiveType::Int8,
            "int16" => PrimitiveType::Int16,
            "int32" | "rune" => PrimitiveType::Int32,
            "int64" => PrimitiveType::Int64,
            "uint" => PrimitiveType::Uint,
            "uint8" | "byte" => PrimitiveType::Uint8,
            "uint16" => PrimitiveType::Uint16,
            "uint32" => PrimitiveType::Uint32,
            "uint64" => PrimitiveType::Uint64,
            "uintptr" => PrimitiveType::Uintptr,
            "float32" => PrimitiveType::Float32,
            "float64" => PrimitiveType::Float64,
            "complex64" => PrimitiveType::Complex64,
            "complex128" => PrimitiveType::Complex128,
            _ => return None,
        };
        Some(prim)
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::String => "string",
            PrimitiveType::Int => "int",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Uint => "uint",
            PrimitiveType::Uint8 => "uint8",
            PrimitiveType::Uint16 => "uint16",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Uint64 => "uint64",
            PrimitiveType::Uintptr => "uintptr",
            PrimitiveType::Float32 => "float32",
            PrimitiveType::Float64 => "float64",
            PrimitiveType::Complex64 => "complex64",
            PrimitiveType::Complex128 => "complex128",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            PrimitiveType::Bool
                | PrimitiveType::String
                | PrimitiveType::Float32
                | PrimitiveType::Float64
                | PrimitiveType::Complex64
                | PrimitiveType::Complex128
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveType::Float32 | PrimitiveType::Float64)
    }
}

/// A possibly package-qualified type name: `User` or `users.User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypePath {
    /// Import alias used at the reference site, if any.
    pub qualifier: Option<Symbol>,
    pub name: Symbol,
    pub span: Span,
}

/// A type expression as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(PrimitiveType),

    /// Declared or imported type name.
    Named(TypePath),

    /// `*T`
    Pointer(Box<Type>),

    /// `[]T`
    Slice(Box<Type>),

    /// `[N]T`, `[...]T` has no length.
    Array {
        inner: Box<Type>,
        len: Option<u64>,
    },

    /// `map[K]V`
    Map {
        key: Box<Type>,
        value: Box<Type>,
    },

    /// Anonymous `struct { ... }`
    Struct(Vec<Field>),

    /// Anything the checker does not look inside (interfaces, channels,
    /// function types, generics). Keeps the source text for display.
    Opaque(SmolStr),

    /// Error recovery.
    Error,
}

impl Type {
    pub fn string() -> Self {
        Type::Primitive(PrimitiveType::String)
    }

    pub fn int() -> Self {
        Type::Primitive(PrimitiveType::Int)
    }

    pub fn ptr(inner: Type) -> Self {
        Type::Pointer(Box::new(inner))
    }

    pub fn slice(inner: Type) -> Self {
        Type::Slice(Box::new(inner))
    }

    /// Element type for slices, arrays and maps; `None` otherwise.
    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Slice(inner) | Type::Array { inner, .. } => Some(inner),
            Type::Map { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// A struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: Symbol,
    pub ty: Type,
    pub vis: Visibility,
    /// Embedded fields are named after their type: `users.Base` declares `Base`.
    pub embedded: bool,
    pub span: Span,
}

/// A named struct type declaration: `type User struct { ... }`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: Symbol,
    pub vis: Visibility,
    pub fields: Vec<Field>,
    pub span: Span,
}

impl StructDef {
    pub fn field(&self, name: Symbol) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}
