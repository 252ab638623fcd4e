use std::cell::RefCell;
use std::rc::Rc;

use govis_common::Symbol;
use govis_hir::{PackageId, PrimitiveType, Type};
use govis_sema::FileScope;
use indexmap::IndexMap;
use smol_str::SmolStr;

/// A type as the evaluator needs it: enough to build zero values and to
/// print `%T` and `%#v`.
#[derive(Debug, Clone)]
pub enum RtType<'p> {
    Primitive(PrimitiveType),
    Struct(Rc<StructLayout<'p>>),
    Pointer(Box<RtType<'p>>),
    Slice(Box<RtType<'p>>),
    Array(Box<RtType<'p>>, usize),
    /// Maps, interfaces, funcs and channels. Only `nil` inhabits them here.
    Opaque(SmolStr),
}

impl RtType<'_> {
    pub fn display(&self) -> String {
        match self {
            RtType::Primitive(prim) => prim.name().to_string(),
            RtType::Struct(layout) => layout.display.to_string(),
            RtType::Pointer(inner) => format!("*{}", inner.display()),
            RtType::Slice(inner) => format!("[]{}", inner.display()),
            RtType::Array(inner, len) => format!("[{len}]{}", inner.display()),
            RtType::Opaque(text) => text.to_string(),
        }
    }
}

/// Field order and declared types of a struct. Field types stay unresolved
/// until a zero value needs them, so self-referential types are fine.
#[derive(Debug)]
pub struct StructLayout<'p> {
    /// `users.User`, or the literal type text for anonymous structs.
    pub display: SmolStr,
    /// Declaring package and name, for method lookup.
    pub named: Option<(PackageId, Symbol)>,
    pub fields: Vec<FieldLayout<'p>>,
}

#[derive(Debug, Clone)]
pub struct FieldLayout<'p> {
    pub name: SmolStr,
    pub symbol: Symbol,
    pub embedded: bool,
    pub ty: &'p Type,
    pub scope: FileScope,
}

/// A runtime value. Structs and arrays have value semantics; pointers share
/// their target.
#[derive(Debug, Clone)]
pub enum Value<'p> {
    Bool(bool),
    Int(i64, PrimitiveType),
    Float(f64, PrimitiveType),
    String(String),
    Struct(StructValue<'p>),
    Pointer(Pointer<'p>),
    Slice(SliceValue<'p>),
    /// Untyped `nil`, and nil maps, interfaces and funcs.
    Nil,
}

#[derive(Debug, Clone)]
pub struct StructValue<'p> {
    pub layout: Rc<StructLayout<'p>>,
    pub fields: IndexMap<SmolStr, Value<'p>>,
}

impl<'p> StructValue<'p> {
    /// A field by name, looking into embedded structs for promoted fields.
    pub fn field(&self, name: &str) -> Option<&Value<'p>> {
        let path = self.field_path(name)?;
        let (last, outer) = path.split_last()?;
        let mut current = self;
        for step in outer {
            match current.fields.get(step) {
                Some(Value::Struct(inner)) => current = inner,
                _ => return None,
            }
        }
        current.fields.get(last)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value<'p>> {
        let path = self.field_path(name)?;
        let (last, outer) = path.split_last()?;
        let mut current = self;
        for step in outer {
            match current.fields.get_mut(step) {
                Some(Value::Struct(inner)) => current = inner,
                _ => return None,
            }
        }
        current.fields.get_mut(last)
    }

    /// Field names leading from `self` to `name`, shallowest match first.
    fn field_path(&self, name: &str) -> Option<Vec<SmolStr>> {
        if self.fields.contains_key(name) {
            return Some(vec![SmolStr::new(name)]);
        }
        for embedded in self.layout.fields.iter().filter(|f| f.embedded) {
            if let Some(Value::Struct(inner)) = self.fields.get(&embedded.name) {
                if let Some(mut path) = inner.field_path(name) {
                    path.insert(0, embedded.name.clone());
                    return Some(path);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct Pointer<'p> {
    pub pointee: RtType<'p>,
    pub target: Option<Rc<RefCell<Value<'p>>>>,
}

#[derive(Debug, Clone)]
pub struct SliceValue<'p> {
    pub elem: RtType<'p>,
    pub items: Vec<Value<'p>>,
    /// Set for arrays.
    pub len: Option<usize>,
}

impl<'p> Value<'p> {
    pub fn int(v: i64) -> Self {
        Value::Int(v, PrimitiveType::Int)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn new_pointer(pointee: RtType<'p>, value: Value<'p>) -> Self {
        Value::Pointer(Pointer {
            pointee,
            target: Some(Rc::new(RefCell::new(value))),
        })
    }

    /// The dynamic type name, as `%T` prints it.
    pub fn type_name(&self) -> String {
        match self {
            Value::Bool(_) => "bool".to_string(),
            Value::Int(_, prim) | Value::Float(_, prim) => prim.name().to_string(),
            Value::String(_) => "string".to_string(),
            Value::Struct(s) => s.layout.display.to_string(),
            Value::Pointer(p) => format!("*{}", p.pointee.display()),
            Value::Slice(s) => match s.len {
                Some(len) => format!("[{len}]{}", s.elem.display()),
                None => format!("[]{}", s.elem.display()),
            },
            Value::Nil => "<nil>".to_string(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v, _) => Some(*v),
            _ => None,
        }
    }

    /// Go `==`. `None` when the operands are not comparable.
    pub fn equals(&self, other: &Value<'p>) -> Option<bool> {
        let eq = match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a, _), Value::Int(b, _)) => a == b,
            (Value::Float(a, _), Value::Float(b, _)) => a == b,
            (Value::Int(a, _), Value::Float(b, _)) | (Value::Float(b, _), Value::Int(a, _)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => {
                if a.fields.len() != b.fields.len() {
                    return Some(false);
                }
                for (x, y) in a.fields.values().zip(b.fields.values()) {
                    if !x.equals(y)? {
                        return Some(false);
                    }
                }
                true
            }
            (Value::Pointer(a), Value::Pointer(b)) => match (&a.target, &b.target) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (Value::Pointer(p), Value::Nil) | (Value::Nil, Value::Pointer(p)) => p.target.is_none(),
            (Value::Nil, Value::Nil) => true,
            (Value::Slice(s), Value::Nil) | (Value::Nil, Value::Slice(s)) => {
                s.len.is_none() && s.items.is_empty()
            }
            _ => return None,
        };
        Some(eq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::int(3).type_name(), "int");
        assert_eq!(Value::string("x").type_name(), "string");
        assert_eq!(Value::Float(1.5, PrimitiveType::Float64).type_name(), "float64");
        assert_eq!(Value::Nil.type_name(), "<nil>");

        let ptr = Value::Pointer(Pointer {
            pointee: RtType::Primitive(PrimitiveType::Int),
            target: None,
        });
        assert_eq!(ptr.type_name(), "*int");

        let slice = Value::Slice(SliceValue {
            elem: RtType::Pointer(Box::new(RtType::Primitive(PrimitiveType::String))),
            items: vec![],
            len: None,
        });
        assert_eq!(slice.type_name(), "[]*string");
    }

    #[test]
    fn test_equality() {
        assert_eq!(Value::int(1).equals(&Value::int(1)), Some(true));
        assert_eq!(Value::string("a").equals(&Value::string("b")), Some(false));
        assert_eq!(Value::int(1).equals(&Value::string("1")), None);

        let a = Value::new_pointer(RtType::Primitive(PrimitiveType::Int), Value::int(1));
        let b = Value::new_pointer(RtType::Primitive(PrimitiveType::Int), Value::int(1));
        assert_eq!(a.equals(&a.clone()), Some(true));
        assert_eq!(a.equals(&b), Some(false));
        assert_eq!(a.equals(&Value::Nil), Some(false));
    }
}
