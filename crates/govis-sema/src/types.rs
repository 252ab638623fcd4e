use govis_common::{Symbol, SymbolInterner};
use govis_hir::{Field, FnDef, PackageId, Type};
use crate::index::{FileScope, ProgramIndex, TypeEntry};

/// Nesting limit for alias chains and embedded-field promotion.
const MAX_DEPTH: u8 = 16;

/// The static type of an expression, as far as field lookups need it.
#[derive(Debug, Clone)]
pub enum SemType<'p> {
    Struct(StructType<'p>),
    Pointer(Box<SemType<'p>>),
    /// Slices and arrays: only the element type matters.
    Container(Box<SemType<'p>>),
    Map {
        key: Box<SemType<'p>>,
        value: Box<SemType<'p>>,
    },
    Unknown,
}

impl<'p> SemType<'p> {
    /// Selectors and elided literals see through any number of pointers.
    pub fn deref(&self) -> &SemType<'p> {
        let mut ty = self;
        while let SemType::Pointer(inner) = ty {
            ty = inner;
        }
        ty
    }

    pub fn as_struct(&self) -> Option<&StructType<'p>> {
        match self.deref() {
            SemType::Struct(st) => Some(st),
            _ => None,
        }
    }

    /// What `x[i]` yields, and the second variable of `range x`.
    pub fn element(&self) -> SemType<'p> {
        match self.deref() {
            SemType::Container(elem) => (**elem).clone(),
            SemType::Map { value, .. } => (**value).clone(),
            _ => SemType::Unknown,
        }
    }

    /// The first variable of `range x`. Only map keys are structs.
    pub fn range_key(&self) -> SemType<'p> {
        match self.deref() {
            SemType::Map { key, .. } => (**key).clone(),
            _ => SemType::Unknown,
        }
    }
}

/// Where a named struct type was declared.
#[derive(Debug, Clone, Copy)]
pub enum TypeName {
    Package(FileScope, Symbol),
    /// Declared inside a function body; it has no methods.
    Local(Symbol),
}

/// A struct type with the scope its fields were declared in.
#[derive(Debug, Clone, Copy)]
pub struct StructType<'p> {
    /// File holding the `struct { ... }` type literal. Its package owns the fields.
    pub fields_scope: FileScope,
    /// Absent for anonymous struct types.
    pub named: Option<TypeName>,
    pub fields: &'p [Field],
    /// The type literal sits in a function body, so field types may name
    /// types declared there.
    pub local_fields: bool,
}

impl StructType<'_> {
    pub fn declaring_package(&self) -> PackageId {
        self.fields_scope.pkg
    }
}

/// A field or method found through a selector.
#[derive(Debug, Clone, Copy)]
pub enum Member<'p> {
    Field {
        owner: StructType<'p>,
        field: &'p Field,
    },
    Method {
        scope: FileScope,
        def: &'p FnDef,
    },
}

/// Names declared inside the function being checked.
pub trait LocalScope<'p> {
    /// Type of a local variable. A local that is not a variable still
    /// answers, as `Unknown`, so it shadows package-level names.
    fn value(&self, name: Symbol) -> Option<SemType<'p>>;

    /// A type declared in the function body, resolved at `depth`.
    fn type_named(&self, name: Symbol, depth: u8) -> Option<SemType<'p>>;

    fn in_function(&self) -> bool {
        true
    }
}

/// Package-level declarations see no locals.
pub struct NoLocals;

impl<'p> LocalScope<'p> for NoLocals {
    fn value(&self, _: Symbol) -> Option<SemType<'p>> {
        None
    }

    fn type_named(&self, _: Symbol, _: u8) -> Option<SemType<'p>> {
        None
    }

    fn in_function(&self) -> bool {
        false
    }
}

/// Resolve a type written at package level in `scope`.
pub fn resolve_type<'p>(index: &ProgramIndex<'p>, ty: &'p Type, scope: FileScope) -> SemType<'p> {
    resolve_at_depth(index, ty, scope, &NoLocals, 0)
}

pub fn resolve_at_depth<'p>(
    index: &ProgramIndex<'p>,
    ty: &'p Type,
    scope: FileScope,
    locals: &dyn LocalScope<'p>,
    depth: u8,
) -> SemType<'p> {
    if depth > MAX_DEPTH {
        return SemType::Unknown;
    }

    match ty {
        Type::Named(path) => {
            if path.qualifier.is_none() {
                if let Some(local) = locals.type_named(path.name, depth + 1) {
                    return local;
                }
            }
            match index.lookup_type(path, scope) {
                Some((decl_scope, TypeEntry::Struct(def))) => SemType::Struct(StructType {
                    fields_scope: decl_scope,
                    named: Some(TypeName::Package(decl_scope, def.name)),
                    fields: &def.fields,
                    local_fields: false,
                }),
                Some((decl_scope, TypeEntry::Decl(decl))) => {
                    let underlying = resolve_at_depth(index, &decl.ty, decl_scope, &NoLocals, depth + 1);
                    match underlying {
                        // A defined type keeps the fields of its underlying struct
                        // but has its own name and method set.
                        SemType::Struct(mut st) if !decl.is_alias => {
                            st.named = Some(TypeName::Package(decl_scope, decl.name));
                            SemType::Struct(st)
                        }
                        other => other,
                    }
                }
                None => SemType::Unknown,
            }
        }
        Type::Pointer(inner) => SemType::Pointer(Box::new(resolve_at_depth(
            index,
            inner,
            scope,
            locals,
            depth + 1,
        ))),
        Type::Slice(inner) | Type::Array { inner, .. } => SemType::Container(Box::new(
            resolve_at_depth(index, inner, scope, locals, depth + 1),
        )),
        Type::Map { key, value } => SemType::Map {
            key: Box::new(resolve_at_depth(index, key, scope, locals, depth + 1)),
            value: Box::new(resolve_at_depth(index, value, scope, locals, depth + 1)),
        },
        Type::Struct(fields) => SemType::Struct(StructType {
            fields_scope: scope,
            named: None,
            fields,
            local_fields: locals.in_function(),
        }),
        Type::Primitive(_) | Type::Opaque(_) | Type::Error => SemType::Unknown,
    }
}

/// Declared type of `field`, one of the fields of `st`.
pub fn field_type<'p>(
    index: &ProgramIndex<'p>,
    st: &StructType<'p>,
    field: &'p Field,
    locals: &dyn LocalScope<'p>,
) -> SemType<'p> {
    if st.local_fields {
        resolve_at_depth(index, &field.ty, st.fields_scope, locals, 0)
    } else {
        resolve_type(index, &field.ty, st.fields_scope)
    }
}

/// Find `name` among the fields and methods of `st`, promoting through
/// embedded fields breadth-first like Go does.
pub fn lookup_member<'p>(
    index: &ProgramIndex<'p>,
    st: &StructType<'p>,
    name: Symbol,
    locals: &dyn LocalScope<'p>,
) -> Option<Member<'p>> {
    let mut level = vec![*st];

    for _ in 0..MAX_DEPTH {
        let mut next = vec![];

        for candidate in &level {
            if let Some(field) = candidate.fields.iter().find(|f| f.name == name) {
                return Some(Member::Field {
                    owner: *candidate,
                    field,
                });
            }
            if let Some(TypeName::Package(type_scope, type_name)) = candidate.named {
                let found = index
                    .methods(type_scope.pkg, type_name)
                    .iter()
                    .find(|(_, def)| def.name == name);
                if let Some(&(scope, def)) = found {
                    return Some(Member::Method { scope, def });
                }
            }
            for embedded in candidate.fields.iter().filter(|f| f.embedded) {
                let resolved = field_type(index, candidate, embedded, locals);
                if let Some(inner) = resolved.as_struct() {
                    next.push(*inner);
                }
            }
        }

        if next.is_empty() {
            break;
        }
        level = next;
    }

    None
}

/// `users.User` from outside package users, `User` from inside it.
pub fn display_struct(
    index: &ProgramIndex<'_>,
    interner: &SymbolInterner,
    st: &StructType<'_>,
    from: PackageId,
) -> String {
    match st.named {
        Some(TypeName::Local(name)) => interner.resolve(name).to_string(),
        Some(TypeName::Package(scope, name)) if scope.pkg == from => {
            interner.resolve(name).to_string()
        }
        Some(TypeName::Package(scope, name)) => {
            let package = index.program().package(scope.pkg);
            format!("{}.{}", interner.resolve(package.name), interner.resolve(name))
        }
        None => display_type(interner, &Type::Struct(st.fields.to_vec())),
    }
}

/// Render a type expression the way it was written.
pub fn display_type(interner: &SymbolInterner, ty: &Type) -> String {
    match ty {
        Type::Primitive(prim) => prim.name().to_string(),
        Type::Named(path) => match path.qualifier {
            Some(q) => format!("{}.{}", interner.resolve(q), interner.resolve(path.name)),
            None => interner.resolve(path.name).to_string(),
        },
        Type::Pointer(inner) => format!("*{}", display_type(interner, inner)),
        Type::Slice(inner) => format!("[]{}", display_type(interner, inner)),
        Type::Array { inner, len } => match len {
            Some(len) => format!("[{}]{}", len, display_type(interner, inner)),
            None => format!("[...]{}", display_type(interner, inner)),
        },
        Type::Map { key, value } => format!(
            "map[{}]{}",
            display_type(interner, key),
            display_type(interner, value)
        ),
        Type::Struct(fields) => {
            let fields: Vec<String> = fields
                .iter()
                .map(|f| {
                    if f.embedded {
                        display_type(interner, &f.ty)
                    } else {
                        format!("{} {}", interner.resolve(f.name), display_type(interner, &f.ty))
                    }
                })
                .collect();
            format!("struct{{{}}}", fields.join("; "))
        }
        Type::Opaque(text) => text.to_string(),
        Type::Error => "invalid type".to_string(),
    }
}
