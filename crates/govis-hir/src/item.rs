use govis_common::{Span, Symbol};
use crate::expr::Expr;
use crate::stmt::Block;
use crate::types::{StructDef, Type};

/// Visibility of a package-level name or struct field.
///
/// Go has no modifiers: an identifier is exported when its first character
/// is an uppercase letter. The frontend computes this once and the checker
/// only ever looks at the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    #[default]
    Private,
    Exported,
}

impl Visibility {
    pub fn from_ident(name: &str) -> Self {
        match name.chars().next() {
            Some(c) if c.is_uppercase() => Visibility::Exported,
            _ => Visibility::Private,
        }
    }

    pub fn is_exported(self) -> bool {
        self == Visibility::Exported
    }
}

/// A function parameter, result or method receiver.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// `None` for unnamed parameters (`func(int)`).
    pub name: Option<Symbol>,
    pub ty: Type,
    pub span: Span,
}

/// A function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub is_variadic: bool,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: Symbol,
    pub vis: Visibility,
    /// Set for methods.
    pub receiver: Option<Param>,
    pub sig: FnSig,
    pub body: Option<Block>,
    pub span: Span,
}

impl FnDef {
    /// The receiver's base type name with any pointer stripped.
    pub fn receiver_type_name(&self) -> Option<Symbol> {
        let mut ty = &self.receiver.as_ref()?.ty;
        while let Type::Pointer(inner) = ty {
            ty = inner;
        }
        match ty {
            Type::Named(path) if path.qualifier.is_none() => Some(path.name),
            _ => None,
        }
    }
}

/// `type Name T` or `type Name = T` where `T` is not a struct literal type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: Symbol,
    pub vis: Visibility,
    pub ty: Type,
    pub is_alias: bool,
    pub span: Span,
}

/// A package-level `var` or `const` spec.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub names: Vec<Symbol>,
    pub ty: Option<Type>,
    pub values: Vec<Expr>,
    pub is_const: bool,
    pub span: Span,
}

/// A top-level item.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Function(FnDef),
    Struct(StructDef),
    TypeDecl(TypeDecl),
    Var(VarDef),
}

impl Item {
    pub fn new(kind: ItemKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Names this item declares at package scope. Methods declare none.
    pub fn declared_names(&self) -> Vec<Symbol> {
        match &self.kind {
            ItemKind::Function(f) if f.receiver.is_none() => vec![f.name],
            ItemKind::Function(_) => vec![],
            ItemKind::Struct(s) => vec![s.name],
            ItemKind::TypeDecl(t) => vec![t.name],
            ItemKind::Var(v) => v.names.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_from_ident() {
        assert_eq!(Visibility::from_ident("Name"), Visibility::Exported);
        assert_eq!(Visibility::from_ident("password"), Visibility::Private);
        assert_eq!(Visibility::from_ident("_"), Visibility::Private);
        assert_eq!(Visibility::from_ident("_Hidden"), Visibility::Private);
        assert_eq!(Visibility::from_ident("Ünicode"), Visibility::Exported);
        assert_eq!(Visibility::from_ident("ñame"), Visibility::Private);
        assert_eq!(Visibility::from_ident(""), Visibility::Private);
    }
}
