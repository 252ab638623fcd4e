use govis_common::{Span, Symbol};
use crate::item::FnSig;
use crate::stmt::Block;
use crate::types::Type;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitClear,
    Shl,
    Shr,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,    // -x
    Not,    // !x
    Deref,  // *x
    AddrOf, // &x
    Recv,   // <-x
    Xor,    // ^x
    Plus,   // +x
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Bool(bool),
    Rune(char),
    String(String),
    Nil,
}

/// An expression in the HIR.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),

    /// A variable, constant, function or package name.
    Ident(Symbol),

    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    /// `x.field`, `x.Method` or `pkg.Name`.
    Selector {
        expr: Box<Expr>,
        field: Symbol,
        field_span: Span,
    },

    Index {
        expr: Box<Expr>,
        index: Box<Expr>,
    },

    /// `T{...}`, `pkg.T{...}` or an elided `{...}` nested in another literal.
    Composite(CompositeLit),

    /// `func(...) { ... }`
    FuncLit {
        sig: FnSig,
        body: Block,
    },

    /// A construct the checker does not model. Its subexpressions and
    /// blocks are kept so nested field references are still visited.
    Opaque {
        exprs: Vec<Expr>,
        blocks: Vec<Block>,
    },

    /// Error expression (for error recovery)
    Error,
}

/// A composite literal.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeLit {
    /// `None` when the type is elided inside an enclosing literal.
    pub ty: Option<Type>,
    pub elements: Vec<Element>,
    pub span: Span,
}

impl CompositeLit {
    pub fn is_keyed(&self) -> bool {
        self.elements.iter().any(|e| e.key.is_some())
    }

    pub fn is_positional(&self) -> bool {
        self.elements.iter().any(|e| e.key.is_none())
    }
}

/// One element of a composite literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub key: Option<ElementKey>,
    pub value: Expr,
    pub span: Span,
}

/// Key of a keyed element. Whether a bare name means a struct field or a
/// map key variable depends on the literal's type, so both are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKey {
    Name { name: Symbol, span: Span },
    Expr(Expr),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, span)
    }
}
