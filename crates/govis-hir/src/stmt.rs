use govis_common::{Span, Symbol};
use crate::expr::{BinOp, Expr};
use crate::item::Item;
use crate::types::Type;

/// A `{ ... }` block introducing a scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, span: Span) -> Self {
        Self { stmts, span }
    }
}

/// A statement in the HIR.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `a, b := x, y`
    ShortVarDecl {
        names: Vec<Symbol>,
        values: Vec<Expr>,
    },

    /// `var a, b T = x, y` inside a function.
    VarDecl {
        names: Vec<Symbol>,
        ty: Option<Type>,
        values: Vec<Expr>,
    },

    /// `a, b = x, y` and compound forms like `a += x`. `x++` is `x += 1`.
    Assign {
        lhs: Vec<Expr>,
        op: Option<BinOp>,
        rhs: Vec<Expr>,
    },

    Expr(Expr),

    Return(Vec<Expr>),

    Block(Block),

    If {
        init: Option<Box<Stmt>>,
        cond: Expr,
        then_branch: Block,
        else_branch: Option<Box<Stmt>>,
    },

    /// Every `for` form. Clause statements share the body's scope; a range
    /// clause becomes a `Range` init.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },

    /// `k, v := range x`, only ever the `init` of a `For`. With `define`
    /// false the clause assigns to the existing `lhs` operands.
    Range {
        lhs: Vec<Expr>,
        define: bool,
        expr: Expr,
    },

    /// `switch v := x.(type) { ... }`. `binding` is declared in each clause.
    TypeSwitch {
        init: Option<Box<Stmt>>,
        binding: Option<Symbol>,
        subject: Expr,
        clauses: Vec<TypeClause>,
    },

    /// One spec of a `type` declaration inside a function body.
    LocalType(Item),

    /// Statements the checker does not model (switch, select, go, defer...).
    /// Subexpressions and nested blocks are kept; `init` scopes over both.
    Opaque {
        init: Option<Box<Stmt>>,
        exprs: Vec<Expr>,
        blocks: Vec<Block>,
    },
}

/// `case A, B:` of a type switch; no types for `default`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeClause {
    pub types: Vec<Type>,
    pub body: Block,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn expr(e: Expr) -> Self {
        let span = e.span;
        Self { kind: StmtKind::Expr(e), span }
    }

    pub fn empty(span: Span) -> Self {
        let kind = StmtKind::Opaque {
            init: None,
            exprs: vec![],
            blocks: vec![],
        };
        Self { kind, span }
    }
}
