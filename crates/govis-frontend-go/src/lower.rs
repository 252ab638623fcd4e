use govis_common::{SourceFile, Span, Symbol, SymbolInterner};
use govis_hir::{
    BinOp, Block, CompositeLit, Element, ElementKey, Expr, ExprKind, Field, FnDef, FnSig, Import,
    ImportName, Item, ItemKind, Literal, Module, Param, PrimitiveType, Stmt, StmtKind, StructDef,
    Type, TypeClause, TypeDecl, TypePath, UnaryOp, VarDef, Visibility,
};
use miette::Result;
use smol_str::SmolStr;
use tree_sitter::{Node, Tree};

/// Lower a tree-sitter Tree to an HIR Module.
pub fn lower(tree: Tree, source: &SourceFile, interner: &SymbolInterner) -> Result<Module> {
    let ctx = LoweringContext::new(source, interner);
    ctx.lower_module(tree.root_node())
}

const STATEMENT_KINDS: &[&str] = &[
    "short_var_declaration",
    "assignment_statement",
    "expression_statement",
    "return_statement",
    "if_statement",
    "for_statement",
    "var_declaration",
    "const_declaration",
    "type_declaration",
    "inc_statement",
    "dec_statement",
    "go_statement",
    "defer_statement",
    "send_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
    "labeled_statement",
    "break_statement",
    "continue_statement",
    "goto_statement",
    "fallthrough_statement",
    "empty_statement",
    "block",
];

fn is_statement(kind: &str) -> bool {
    STATEMENT_KINDS.contains(&kind)
}

struct LoweringContext<'a> {
    source: &'a SourceFile,
    interner: &'a SymbolInterner,
}

impl<'a> LoweringContext<'a> {
    fn new(source: &'a SourceFile, interner: &'a SymbolInterner) -> Self {
        Self { source, interner }
    }

    fn span(&self, node: Node) -> Span {
        Span::new(
            self.source.id,
            node.start_byte() as u32,
            node.end_byte() as u32,
        )
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.content.as_bytes()).unwrap_or("")
    }

    fn intern(&self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect()
    }

    fn field_children<'t>(&self, node: Node<'t>, field: &str) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children_by_field_name(field, &mut cursor).collect()
    }

    fn lower_module(&self, node: Node) -> Result<Module> {
        let name = node
            .children(&mut node.walk())
            .find(|n| n.kind() == "package_clause")
            .and_then(|pkg| {
                pkg.children(&mut pkg.walk())
                    .find(|n| n.kind() == "package_identifier" || n.kind() == "identifier")
            })
            .map(|n| self.intern(self.text(n)))
            .ok_or_else(|| {
                miette::miette!("{}: missing package clause", self.source.display_name())
            })?;

        let mut module = Module::new(name, self.source.id);

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_declaration" => self.lower_imports(child, &mut module.imports),
                _ => {
                    for item in self.lower_item(child)? {
                        module.add_item(item);
                    }
                }
            }
        }

        Ok(module)
    }

    fn lower_imports(&self, node: Node, imports: &mut Vec<Import>) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_spec" => imports.push(self.lower_import_spec(child)),
                "import_spec_list" => self.lower_imports(child, imports),
                _ => {}
            }
        }
    }

    fn lower_import_spec(&self, node: Node) -> Import {
        let name = match node.child_by_field_name("name") {
            None => ImportName::Default,
            Some(n) => match n.kind() {
                "dot" => ImportName::Dot,
                "blank_identifier" => ImportName::Blank,
                _ => ImportName::Alias(self.intern(self.text(n))),
            },
        };
        let path = node
            .child_by_field_name("path")
            .map(|n| self.string_value(n))
            .unwrap_or_default();

        Import {
            name,
            path: SmolStr::new(path),
            span: self.span(node),
        }
    }

    fn lower_item(&self, node: Node) -> Result<Vec<Item>> {
        let span = self.span(node);

        match node.kind() {
            "function_declaration" | "method_declaration" => {
                let fn_def = self.lower_function(node)?;
                Ok(vec![Item::new(ItemKind::Function(fn_def), span)])
            }
            "type_declaration" => Ok(self
                .type_specs(node)
                .into_iter()
                .map(|spec| self.lower_type_spec(spec))
                .collect()),
            "var_declaration" | "const_declaration" => Ok(self
                .var_specs(node)
                .into_iter()
                .map(|spec| {
                    let span = self.span(spec);
                    Item::new(ItemKind::Var(self.lower_var_spec(spec)), span)
                })
                .collect()),
            _ => Ok(vec![]),
        }
    }

    fn type_specs<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        self.named_children(node)
            .into_iter()
            .filter(|n| n.kind() == "type_spec" || n.kind() == "type_alias")
            .collect()
    }

    fn lower_type_spec(&self, node: Node) -> Item {
        let span = self.span(node);
        let name_text = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or("_");
        let name = self.intern(name_text);
        let vis = Visibility::from_ident(name_text);
        let is_alias = node.kind() == "type_alias";

        match node.child_by_field_name("type") {
            Some(ty) if ty.kind() == "struct_type" && !is_alias => Item::new(
                ItemKind::Struct(StructDef {
                    name,
                    vis,
                    fields: self.lower_struct_fields(ty),
                    span,
                }),
                span,
            ),
            ty => Item::new(
                ItemKind::TypeDecl(TypeDecl {
                    name,
                    vis,
                    ty: ty.map(|n| self.lower_type(n)).unwrap_or(Type::Error),
                    is_alias,
                    span,
                }),
                span,
            ),
        }
    }

    fn lower_struct_fields(&self, node: Node) -> Vec<Field> {
        let mut fields = vec![];
        let Some(list) = node
            .children(&mut node.walk())
            .find(|n| n.kind() == "field_declaration_list")
        else {
            return fields;
        };

        for decl in self.named_children(list) {
            if decl.kind() != "field_declaration" {
                continue;
            }
            let span = self.span(decl);
            let Some(type_node) = decl.child_by_field_name("type") else {
                continue;
            };
            let mut ty = self.lower_type(type_node);
            let names = self.field_children(decl, "name");

            if names.is_empty() {
                let is_pointer = decl.children(&mut decl.walk()).any(|c| c.kind() == "*");
                let Some(name_text) = self.embedded_field_name(type_node) else {
                    continue;
                };
                if is_pointer {
                    ty = Type::ptr(ty);
                }
                fields.push(Field {
                    name: self.intern(name_text),
                    ty,
                    vis: Visibility::from_ident(name_text),
                    embedded: true,
                    span,
                });
                continue;
            }

            for name_node in names {
                let name_text = self.text(name_node);
                fields.push(Field {
                    name: self.intern(name_text),
                    ty: ty.clone(),
                    vis: Visibility::from_ident(name_text),
                    embedded: false,
                    span: self.span(name_node),
                });
            }
        }

        fields
    }

    /// `Base`, `*Base`, `pkg.Base` and `Base[T]` all embed a field named `Base`.
    fn embedded_field_name(&self, node: Node) -> Option<&'a str> {
        match node.kind() {
            "type_identifier" => Some(self.text(node)),
            "qualified_type" => node.child_by_field_name("name").map(|n| self.text(n)),
            "generic_type" => node
                .child_by_field_name("type")
                .and_then(|n| self.embedded_field_name(n)),
            "pointer_type" => self
                .named_children(node)
                .last()
                .and_then(|n| self.embedded_field_name(*n)),
            _ => None,
        }
    }

    fn var_specs<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut specs = vec![];
        for child in self.named_children(node) {
            match child.kind() {
                "var_spec" | "const_spec" => specs.push(child),
                "var_spec_list" | "const_spec_list" => specs.extend(self.var_specs(child)),
                _ => {}
            }
        }
        specs
    }

    fn lower_var_spec(&self, node: Node) -> VarDef {
        let names = self
            .field_children(node, "name")
            .into_iter()
            .map(|n| self.intern(self.text(n)))
            .collect();
        let ty = node.child_by_field_name("type").map(|n| self.lower_type(n));
        let values = node
            .child_by_field_name("value")
            .map(|n| self.lower_expr_list(n))
            .unwrap_or_default();

        VarDef {
            names,
            ty,
            values,
            is_const: node.kind() == "const_spec",
            span: self.span(node),
        }
    }

    fn lower_function(&self, node: Node) -> Result<FnDef> {
        let span = self.span(node);

        let name_node = node
            .child_by_field_name("name")
            .ok_or_else(|| miette::miette!("Function missing name"))?;
        let name_text = self.text(name_node);

        let receiver = node
            .child_by_field_name("receiver")
            .and_then(|n| self.lower_parameters(n).into_iter().next());

        let body = node
            .child_by_field_name("body")
            .map(|n| self.lower_block(n));

        Ok(FnDef {
            name: self.intern(name_text),
            vis: Visibility::from_ident(name_text),
            receiver,
            sig: self.lower_signature(node),
            body,
            span,
        })
    }

    fn lower_signature(&self, node: Node) -> FnSig {
        let params_node = node.child_by_field_name("parameters");
        let params = params_node
            .map(|n| self.lower_parameters(n))
            .unwrap_or_default();
        let is_variadic = params_node.is_some_and(|n| {
            n.children(&mut n.walk())
                .any(|c| c.kind() == "variadic_parameter_declaration")
        });

        let results = match node.child_by_field_name("result") {
            Some(n) if n.kind() == "parameter_list" => self.lower_parameters(n),
            Some(n) => vec![Param {
                name: None,
                ty: self.lower_type(n),
                span: self.span(n),
            }],
            None => vec![],
        };

        FnSig {
            params,
            results,
            is_variadic,
        }
    }

    fn lower_parameters(&self, node: Node) -> Vec<Param> {
        let mut params = vec![];

        for child in self.named_children(node) {
            if child.kind() != "parameter_declaration"
                && child.kind() != "variadic_parameter_declaration"
            {
                continue;
            }
            let span = self.span(child);
            let mut ty = child
                .child_by_field_name("type")
                .map(|n| self.lower_type(n))
                .unwrap_or(Type::Error);
            if child.kind() == "variadic_parameter_declaration" {
                ty = Type::slice(ty);
            }

            let names = self.field_children(child, "name");
            if names.is_empty() {
                params.push(Param { name: None, ty, span });
                continue;
            }
            for name_node in names {
                params.push(Param {
                    name: Some(self.intern(self.text(name_node))),
                    ty: ty.clone(),
                    span,
                });
            }
        }

        params
    }

    fn lower_type(&self, node: Node) -> Type {
        match node.kind() {
            "type_identifier" | "identifier" => {
                let text = self.text(node);
                match PrimitiveType::from_name(text) {
                    Some(prim) => Type::Primitive(prim),
                    None => Type::Named(TypePath {
                        qualifier: None,
                        name: self.intern(text),
                        span: self.span(node),
                    }),
                }
            }
            "qualified_type" => {
                let qualifier = node
                    .child_by_field_name("package")
                    .map(|n| self.intern(self.text(n)));
                match node.child_by_field_name("name") {
                    Some(name) => Type::Named(TypePath {
                        qualifier,
                        name: self.intern(self.text(name)),
                        span: self.span(node),
                    }),
                    None => Type::Error,
                }
            }
            "pointer_type" => {
                let inner = self
                    .named_children(node)
                    .last()
                    .map(|n| self.lower_type(*n))
                    .unwrap_or(Type::Error);
                Type::ptr(inner)
            }
            "slice_type" => {
                let inner = node
                    .child_by_field_name("element")
                    .map(|n| self.lower_type(n))
                    .unwrap_or(Type::Error);
                Type::slice(inner)
            }
            "array_type" | "implicit_length_array_type" => {
                let inner = node
                    .child_by_field_name("element")
                    .map(|n| self.lower_type(n))
                    .unwrap_or(Type::Error);
                let len = node
                    .child_by_field_name("length")
                    .and_then(|n| parse_int(self.text(n)))
                    .and_then(|v| u64::try_from(v).ok());
                Type::Array {
                    inner: Box::new(inner),
                    len,
                }
            }
            "map_type" => {
                let key = node
                    .child_by_field_name("key")
                    .map(|n| self.lower_type(n))
                    .unwrap_or(Type::Error);
                let value = node
                    .child_by_field_name("value")
                    .map(|n| self.lower_type(n))
                    .unwrap_or(Type::Error);
                Type::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                }
            }
            "struct_type" => Type::Struct(self.lower_struct_fields(node)),
            "parenthesized_type" => self
                .named_children(node)
                .first()
                .map(|n| self.lower_type(*n))
                .unwrap_or(Type::Error),
            _ => Type::Opaque(SmolStr::new(self.text(node))),
        }
    }

    fn lower_block(&self, node: Node) -> Block {
        let span = self.span(node);
        let mut stmts = vec![];
        self.lower_statements(node, &mut stmts);
        Block::new(stmts, span)
    }

    fn lower_statements(&self, node: Node, stmts: &mut Vec<Stmt>) {
        for child in self.named_children(node) {
            self.lower_statement_into(child, stmts);
        }
    }

    /// Lower `node` into `stmts` if it is a statement. Grouped declarations
    /// declare every spec into the enclosing scope.
    fn lower_statement_into(&self, node: Node, stmts: &mut Vec<Stmt>) -> bool {
        match node.kind() {
            "statement_list" => self.lower_statements(node, stmts),
            "var_declaration" | "const_declaration" => stmts.extend(self.lower_local_vars(node)),
            "type_declaration" => stmts.extend(self.lower_local_types(node)),
            kind if is_statement(kind) => stmts.push(self.lower_stmt(node)),
            _ => return false,
        }
        true
    }

    fn lower_stmt(&self, node: Node) -> Stmt {
        let span = self.span(node);

        let kind = match node.kind() {
            "short_var_declaration" => StmtKind::ShortVarDecl {
                names: self.lower_names(node.child_by_field_name("left")),
                values: node
                    .child_by_field_name("right")
                    .map(|n| self.lower_expr_list(n))
                    .unwrap_or_default(),
            },
            "var_declaration" | "const_declaration" | "type_declaration" => {
                let mut stmts = vec![];
                self.lower_statement_into(node, &mut stmts);
                if stmts.len() == 1 {
                    return stmts.remove(0);
                }
                StmtKind::Opaque {
                    init: None,
                    exprs: vec![],
                    blocks: vec![Block::new(stmts, span)],
                }
            }
            "assignment_statement" => StmtKind::Assign {
                lhs: node
                    .child_by_field_name("left")
                    .map(|n| self.lower_expr_list(n))
                    .unwrap_or_default(),
                op: node
                    .child_by_field_name("operator")
                    .and_then(|n| lower_binop(self.text(n).trim_end_matches('='))),
                rhs: node
                    .child_by_field_name("right")
                    .map(|n| self.lower_expr_list(n))
                    .unwrap_or_default(),
            },
            "expression_statement" => match self.named_children(node).first() {
                Some(expr) => StmtKind::Expr(self.lower_expr(*expr)),
                None => return Stmt::empty(span),
            },
            "return_statement" => StmtKind::Return(
                self.named_children(node)
                    .first()
                    .map(|n| self.lower_expr_list(*n))
                    .unwrap_or_default(),
            ),
            "inc_statement" | "dec_statement" => match self.named_children(node).first() {
                Some(target) => {
                    let target = self.lower_expr(*target);
                    let one = Expr::new(ExprKind::Literal(Literal::Int(1)), target.span);
                    let op = if node.kind() == "inc_statement" {
                        BinOp::Add
                    } else {
                        BinOp::Sub
                    };
                    StmtKind::Assign {
                        lhs: vec![target],
                        op: Some(op),
                        rhs: vec![one],
                    }
                }
                None => return Stmt::empty(span),
            },
            "block" => StmtKind::Block(self.lower_block(node)),
            "if_statement" => self.lower_if(node),
            "for_statement" => self.lower_for(node),
            "type_switch_statement" => self.lower_type_switch(node),
            _ => {
                let init = node
                    .child_by_field_name("initializer")
                    .map(|n| Box::new(self.lower_simple_stmt(n)));
                let (exprs, blocks) = self.lower_opaque(node);
                StmtKind::Opaque {
                    init,
                    exprs,
                    blocks,
                }
            }
        };

        Stmt::new(kind, span)
    }

    fn lower_local_vars(&self, node: Node) -> Vec<Stmt> {
        self.var_specs(node)
            .into_iter()
            .map(|spec| {
                let def = self.lower_var_spec(spec);
                Stmt::new(
                    StmtKind::VarDecl {
                        names: def.names,
                        ty: def.ty,
                        values: def.values,
                    },
                    self.span(spec),
                )
            })
            .collect()
    }

    fn lower_local_types(&self, node: Node) -> Vec<Stmt> {
        self.type_specs(node)
            .into_iter()
            .map(|spec| Stmt::new(StmtKind::LocalType(self.lower_type_spec(spec)), self.span(spec)))
            .collect()
    }

    fn lower_if(&self, node: Node) -> StmtKind {
        let span = self.span(node);
        let init = node
            .child_by_field_name("initializer")
            .map(|n| Box::new(self.lower_simple_stmt(n)));
        let cond = node
            .child_by_field_name("condition")
            .map(|n| self.lower_expr(n))
            .unwrap_or_else(|| Expr::error(span));
        let then_branch = node
            .child_by_field_name("consequence")
            .map(|n| self.lower_block(n))
            .unwrap_or_else(|| Block::new(vec![], span));
        let else_branch = node
            .child_by_field_name("alternative")
            .map(|n| Box::new(self.lower_stmt(n)));

        StmtKind::If {
            init,
            cond,
            then_branch,
            else_branch,
        }
    }

    fn lower_for(&self, node: Node) -> StmtKind {
        let span = self.span(node);
        let body = node
            .child_by_field_name("body")
            .map(|n| self.lower_block(n))
            .unwrap_or_else(|| Block::new(vec![], span));

        let mut init = None;
        let mut post = None;
        let mut cond = None;

        for child in self.named_children(node) {
            match child.kind() {
                "block" => {}
                "for_clause" => {
                    if let Some(init_node) = child.child_by_field_name("initializer") {
                        init = Some(Box::new(self.lower_simple_stmt(init_node)));
                    }
                    cond = child
                        .child_by_field_name("condition")
                        .map(|n| self.lower_expr(n));
                    if let Some(update) = child.child_by_field_name("update") {
                        post = Some(Box::new(self.lower_simple_stmt(update)));
                    }
                }
                "range_clause" => {
                    let kind = StmtKind::Range {
                        lhs: child
                            .child_by_field_name("left")
                            .map(|n| self.lower_expr_list(n))
                            .unwrap_or_default(),
                        define: self.has_token(child, ":="),
                        expr: child
                            .child_by_field_name("right")
                            .map(|n| self.lower_expr(n))
                            .unwrap_or_else(|| Expr::error(span)),
                    };
                    init = Some(Box::new(Stmt::new(kind, self.span(child))));
                }
                _ => cond = Some(self.lower_expr(child)),
            }
        }

        StmtKind::For {
            init,
            cond,
            post,
            body,
        }
    }

    fn lower_type_switch(&self, node: Node) -> StmtKind {
        let span = self.span(node);
        let clauses = self
            .named_children(node)
            .into_iter()
            .filter(|c| c.kind() == "type_case" || c.kind() == "default_case")
            .map(|clause| {
                let types = self
                    .field_children(clause, "type")
                    .into_iter()
                    .map(|n| self.lower_type(n))
                    .collect();
                let mut stmts = vec![];
                for child in self.named_children(clause) {
                    self.lower_statement_into(child, &mut stmts);
                }
                TypeClause {
                    types,
                    body: Block::new(stmts, self.span(clause)),
                }
            })
            .collect();

        StmtKind::TypeSwitch {
            init: node
                .child_by_field_name("initializer")
                .map(|n| Box::new(self.lower_simple_stmt(n))),
            binding: self
                .lower_names(node.child_by_field_name("alias"))
                .first()
                .copied(),
            subject: node
                .child_by_field_name("value")
                .map(|n| self.lower_expr(n))
                .unwrap_or_else(|| Expr::error(span)),
            clauses,
        }
    }

    /// `v, ok := <-ch` in a select case declares into the case body.
    fn lower_receive(&self, node: Node) -> Stmt {
        let span = self.span(node);
        let Some(right) = node.child_by_field_name("right").map(|n| self.lower_expr(n)) else {
            return Stmt::empty(span);
        };
        let kind = match node.child_by_field_name("left") {
            Some(left) if self.has_token(node, ":=") => StmtKind::ShortVarDecl {
                names: self.lower_names(Some(left)),
                values: vec![right],
            },
            Some(left) => StmtKind::Assign {
                lhs: self.lower_expr_list(left),
                op: None,
                rhs: vec![right],
            },
            None => StmtKind::Expr(right),
        };
        Stmt::new(kind, span)
    }

    fn has_token(&self, node: Node, token: &str) -> bool {
        node.children(&mut node.walk()).any(|c| c.kind() == token)
    }

    /// Initializers and updates are bare statements or expressions.
    fn lower_simple_stmt(&self, node: Node) -> Stmt {
        if is_statement(node.kind()) {
            self.lower_stmt(node)
        } else {
            Stmt::expr(self.lower_expr(node))
        }
    }

    /// Collect what a construct contains without modelling the construct.
    /// Case clauses become one block each so their declarations share a scope.
    /// The `initializer` field is left to the caller.
    fn lower_opaque(&self, node: Node) -> (Vec<Expr>, Vec<Block>) {
        let mut exprs = vec![];
        let mut blocks = vec![];
        let initializer = node.child_by_field_name("initializer").map(|n| n.id());

        for child in self.named_children(node) {
            let kind = child.kind();
            if Some(child.id()) == initializer {
                continue;
            }
            if kind == "block" {
                blocks.push(self.lower_block(child));
            } else if kind == "statement_list" || kind.ends_with("_case") {
                let mut stmts = vec![];
                for inner in self.named_children(child) {
                    if inner.kind() == "receive_statement" {
                        stmts.push(self.lower_receive(inner));
                    } else if !self.lower_statement_into(inner, &mut stmts) {
                        if let Some(expr) = self.lower_opaque_expr(inner) {
                            exprs.push(expr);
                        }
                    }
                }
                blocks.push(Block::new(stmts, self.span(child)));
            } else if is_statement(kind) {
                blocks.push(Block::new(vec![self.lower_stmt(child)], self.span(child)));
            } else if let Some(expr) = self.lower_opaque_expr(child) {
                exprs.push(expr);
            }
        }

        (exprs, blocks)
    }

    fn lower_opaque_expr(&self, node: Node) -> Option<Expr> {
        match node.kind() {
            "label_name" | "field_identifier" | "package_identifier" | "type_identifier" => None,
            "expression_list" => {
                let span = self.span(node);
                Some(Expr::new(
                    ExprKind::Opaque {
                        exprs: self.lower_expr_list(node),
                        blocks: vec![],
                    },
                    span,
                ))
            }
            _ => Some(self.lower_expr(node)),
        }
    }

    fn lower_names(&self, node: Option<Node>) -> Vec<Symbol> {
        let Some(node) = node else {
            return vec![];
        };
        if node.kind() == "identifier" {
            return vec![self.intern(self.text(node))];
        }
        self.named_children(node)
            .into_iter()
            .map(|n| self.intern(self.text(n)))
            .collect()
    }

    fn lower_expr_list(&self, node: Node) -> Vec<Expr> {
        if node.kind() != "expression_list" {
            return vec![self.lower_expr(node)];
        }
        self.named_children(node)
            .into_iter()
            .map(|n| self.lower_expr(n))
            .collect()
    }

    fn lower_expr(&self, node: Node) -> Expr {
        let span = self.span(node);

        let kind = match node.kind() {
            "int_literal" => match parse_int(self.text(node)) {
                Some(v) => ExprKind::Literal(Literal::Int(v)),
                None => ExprKind::Error,
            },

            "float_literal" => {
                let text = self.text(node).replace('_', "");
                match text.parse::<f64>() {
                    Ok(v) => ExprKind::Literal(Literal::Float(v)),
                    Err(_) => ExprKind::Error,
                }
            }

            "true" => ExprKind::Literal(Literal::Bool(true)),
            "false" => ExprKind::Literal(Literal::Bool(false)),
            "nil" => ExprKind::Literal(Literal::Nil),

            "interpreted_string_literal" | "raw_string_literal" => {
                ExprKind::Literal(Literal::String(self.string_value(node)))
            }

            "rune_literal" => {
                let text = self.text(node);
                let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
                match unescape(inner).chars().next() {
                    Some(c) => ExprKind::Literal(Literal::Rune(c)),
                    None => ExprKind::Error,
                }
            }

            "identifier" | "iota" => ExprKind::Ident(self.intern(self.text(node))),

            "binary_expression" => {
                let lhs = node.child_by_field_name("left");
                let rhs = node.child_by_field_name("right");
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|n| lower_binop(self.text(n)));
                match (lhs, rhs, op) {
                    (Some(lhs), Some(rhs), Some(op)) => ExprKind::Binary {
                        op,
                        lhs: Box::new(self.lower_expr(lhs)),
                        rhs: Box::new(self.lower_expr(rhs)),
                    },
                    _ => self.opaque_kind(node),
                }
            }

            "unary_expression" => {
                let operand = node.child_by_field_name("operand");
                let op = node
                    .child_by_field_name("operator")
                    .and_then(|n| lower_unop(self.text(n)));
                match (operand, op) {
                    (Some(operand), Some(op)) => ExprKind::Unary {
                        op,
                        operand: Box::new(self.lower_expr(operand)),
                    },
                    _ => self.opaque_kind(node),
                }
            }

            "call_expression" => match node.child_by_field_name("function") {
                Some(callee) => {
                    let args = node
                        .child_by_field_name("arguments")
                        .map(|n| {
                            self.named_children(n)
                                .into_iter()
                                .map(|a| self.lower_expr(a))
                                .collect()
                        })
                        .unwrap_or_default();
                    ExprKind::Call {
                        callee: Box::new(self.lower_expr(callee)),
                        args,
                    }
                }
                None => self.opaque_kind(node),
            },

            "selector_expression" => {
                let operand = node.child_by_field_name("operand");
                let field = node.child_by_field_name("field");
                match (operand, field) {
                    (Some(operand), Some(field)) => ExprKind::Selector {
                        expr: Box::new(self.lower_expr(operand)),
                        field: self.intern(self.text(field)),
                        field_span: self.span(field),
                    },
                    _ => self.opaque_kind(node),
                }
            }

            "index_expression" => {
                let operand = node.child_by_field_name("operand");
                let index = node.child_by_field_name("index");
                match (operand, index) {
                    (Some(operand), Some(index)) => ExprKind::Index {
                        expr: Box::new(self.lower_expr(operand)),
                        index: Box::new(self.lower_expr(index)),
                    },
                    _ => self.opaque_kind(node),
                }
            }

            "parenthesized_expression" => {
                if let Some(inner) = self.named_children(node).first() {
                    return self.lower_expr(*inner);
                }
                ExprKind::Error
            }

            "composite_literal" => {
                let ty = node.child_by_field_name("type").map(|n| self.lower_type(n));
                let elements = node
                    .child_by_field_name("body")
                    .map(|n| self.lower_elements(n))
                    .unwrap_or_default();
                ExprKind::Composite(CompositeLit { ty, elements, span })
            }

            "literal_value" => ExprKind::Composite(CompositeLit {
                ty: None,
                elements: self.lower_elements(node),
                span,
            }),

            "literal_element" => {
                if let Some(inner) = self.named_children(node).first() {
                    return self.lower_expr(*inner);
                }
                ExprKind::Error
            }

            "func_literal" => ExprKind::FuncLit {
                sig: self.lower_signature(node),
                body: node
                    .child_by_field_name("body")
                    .map(|n| self.lower_block(n))
                    .unwrap_or_else(|| Block::new(vec![], span)),
            },

            _ => self.opaque_kind(node),
        };

        Expr::new(kind, span)
    }

    fn opaque_kind(&self, node: Node) -> ExprKind {
        let (exprs, blocks) = self.lower_opaque(node);
        ExprKind::Opaque { exprs, blocks }
    }

    fn lower_elements(&self, node: Node) -> Vec<Element> {
        let mut elements = vec![];

        for child in self.named_children(node) {
            let span = self.span(child);
            match child.kind() {
                "keyed_element" => {
                    let parts = self.named_children(child);
                    let (Some(key), Some(value)) = (parts.first(), parts.get(1)) else {
                        continue;
                    };
                    elements.push(Element {
                        key: Some(self.lower_element_key(*key)),
                        value: self.lower_expr(*value),
                        span,
                    });
                }
                _ => elements.push(Element {
                    key: None,
                    value: self.lower_expr(child),
                    span,
                }),
            }
        }

        elements
    }

    fn lower_element_key(&self, node: Node) -> ElementKey {
        let inner = if node.kind() == "literal_element" {
            self.named_children(node).first().copied().unwrap_or(node)
        } else {
            node
        };
        match inner.kind() {
            "identifier" | "field_identifier" => ElementKey::Name {
                name: self.intern(self.text(inner)),
                span: self.span(inner),
            },
            _ => ElementKey::Expr(self.lower_expr(inner)),
        }
    }

    fn string_value(&self, node: Node) -> String {
        let text = self.text(node);
        let inner = text.get(1..text.len().saturating_sub(1)).unwrap_or("");
        if node.kind() == "raw_string_literal" {
            inner.replace('\r', "")
        } else {
            unescape(inner)
        }
    }
}

fn parse_int(text: &str) -> Option<i128> {
    let text = text.replace('_', "");
    let lower = text.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i128::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i128::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

/// Resolve Go escape sequences in an interpreted string or rune body.
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\u{07}'),
            Some('b') => out.push('\u{08}'),
            Some('f') => out.push('\u{0C}'),
            Some('v') => out.push('\u{0B}'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(kind @ ('x' | 'u' | 'U')) => {
                let width = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push('\\');
                        out.push(kind);
                        out.push_str(&digits);
                    }
                }
            }
            Some(d @ '0'..='7') => {
                let mut digits = String::from(d);
                for _ in 0..2 {
                    if let Some(&next) = chars.peek() {
                        if next.is_digit(8) {
                            digits.push(next);
                            chars.next();
                        }
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => out.push_str(&digits),
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

fn lower_binop(op: &str) -> Option<BinOp> {
    let binop = match op {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Rem,
        "&" => BinOp::BitAnd,
        "|" => BinOp::BitOr,
        "^" => BinOp::BitXor,
        "&^" => BinOp::BitClear,
        "<<" => BinOp::Shl,
        ">>" => BinOp::Shr,
        "==" => BinOp::Eq,
        "!=" => BinOp::Ne,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        "&&" => BinOp::And,
        "||" => BinOp::Or,
        _ => return None,
    };
    Some(binop)
}

fn lower_unop(op: &str) -> Option<UnaryOp> {
    let unop = match op {
        "-" => UnaryOp::Neg,
        "!" => UnaryOp::Not,
        "*" => UnaryOp::Deref,
        "&" => UnaryOp::AddrOf,
        "<-" => UnaryOp::Recv,
        "^" => UnaryOp::Xor,
        "+" => UnaryOp::Plus,
        _ => return None,
    };
    Some(unop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_file;
    use govis_common::SourceMap;

    fn lower_source(content: &str) -> (Module, SymbolInterner) {
        let map = SourceMap::new();
        let id = map.add_file("test.go", content.to_string()).unwrap();
        let source = map.get(id).unwrap();
        let interner = SymbolInterner::new();
        let module = parse_file(&source, &interner).unwrap();
        (module, interner)
    }

    fn struct_named<'m>(module: &'m Module, interner: &SymbolInterner, name: &str) -> &'m StructDef {
        module
            .items
            .iter()
            .find_map(|item| match &item.kind {
                ItemKind::Struct(s) if interner.resolve(s.name).as_str() == name => Some(s),
                _ => None,
            })
            .expect("struct not found")
    }

    fn main_body(module: &Module, interner: &SymbolInterner) -> Block {
        module
            .items
            .iter()
            .find_map(|item| match &item.kind {
                ItemKind::Function(f) if interner.resolve(f.name).as_str() == "main" => f.body.clone(),
                _ => None,
            })
            .expect("main not found")
    }

    #[test]
    fn test_struct_field_visibility() {
        let (module, interner) = lower_source(
            r#"
package users

type User struct {
    Name     string
    ID       int
    password string
}
"#,
        );

        assert_eq!(interner.resolve(module.package_name).as_str(), "users");
        let user = struct_named(&module, &interner, "User");
        let fields: Vec<_> = user
            .fields
            .iter()
            .map(|f| (interner.resolve(f.name).to_string(), f.vis))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("Name".to_string(), Visibility::Exported),
                ("ID".to_string(), Visibility::Exported),
                ("password".to_string(), Visibility::Private),
            ]
        );
        assert_eq!(user.fields[0].ty, Type::string());
        assert_eq!(user.fields[1].ty, Type::int());
    }

    #[test]
    fn test_grouped_and_embedded_fields() {
        let (module, interner) = lower_source(
            r#"
package users

import "example.com/demo/audit"

type Admin struct {
    *User
    audit.Trail
    level, rank int
}
"#,
        );

        let admin = struct_named(&module, &interner, "Admin");
        let names: Vec<_> = admin
            .fields
            .iter()
            .map(|f| interner.resolve(f.name).to_string())
            .collect();
        assert_eq!(names, vec!["User", "Trail", "level", "rank"]);
        assert!(admin.fields[0].embedded);
        assert!(matches!(admin.fields[0].ty, Type::Pointer(_)));
        assert!(admin.fields[1].embedded);
        assert!(matches!(
            admin.fields[1].ty,
            Type::Named(TypePath { qualifier: Some(_), .. })
        ));
        assert!(!admin.fields[2].embedded);
    }

    #[test]
    fn test_imports() {
        let (module, interner) = lower_source(
            r#"
package main

import (
    "fmt"
    u "example.com/demo/users"
    . "example.com/demo/dot"
    _ "example.com/demo/blank"
)
"#,
        );

        assert_eq!(module.imports.len(), 4);
        assert_eq!(module.imports[0].name, ImportName::Default);
        assert_eq!(module.imports[0].path.as_str(), "fmt");
        assert_eq!(
            module.imports[1].name,
            ImportName::Alias(interner.intern("u"))
        );
        assert_eq!(module.imports[2].name, ImportName::Dot);
        assert_eq!(module.imports[3].name, ImportName::Blank);
    }

    #[test]
    fn test_keyed_struct_literal() {
        let (module, interner) = lower_source(
            r#"
package main

func main() {
    u := users.User{
        Name: "doej",
        ID:   101,

        password: "xxxx",
    }
}
"#,
        );

        let body = main_body(&module, &interner);
        let StmtKind::ShortVarDecl { names, values } = &body.stmts[0].kind else {
            panic!("expected short var decl, got {:?}", body.stmts[0].kind);
        };
        assert_eq!(interner.resolve(names[0]).as_str(), "u");
        let ExprKind::Composite(lit) = &values[0].kind else {
            panic!("expected composite literal");
        };
        assert!(matches!(
            lit.ty,
            Some(Type::Named(TypePath { qualifier: Some(q), .. })) if interner.resolve(q).as_str() == "users"
        ));
        let keys: Vec<_> = lit
            .elements
            .iter()
            .map(|e| match &e.key {
                Some(ElementKey::Name { name, .. }) => interner.resolve(*name).to_string(),
                other => panic!("unexpected key {:?}", other),
            })
            .collect();
        assert_eq!(keys, vec!["Name", "ID", "password"]);
        assert_eq!(
            lit.elements[0].value.kind,
            ExprKind::Literal(Literal::String("doej".into()))
        );
        assert_eq!(lit.elements[1].value.kind, ExprKind::Literal(Literal::Int(101)));
    }

    #[test]
    fn test_elided_nested_literals() {
        let (module, interner) = lower_source(
            r#"
package main

func main() {
    xs := []users.User{{Name: "a"}, {"b", 2, "c"}}
}
"#,
        );

        let body = main_body(&module, &interner);
        let StmtKind::ShortVarDecl { values, .. } = &body.stmts[0].kind else {
            panic!("expected short var decl");
        };
        let ExprKind::Composite(outer) = &values[0].kind else {
            panic!("expected composite literal");
        };
        assert!(matches!(outer.ty, Some(Type::Slice(_))));
        assert_eq!(outer.elements.len(), 2);
        for element in &outer.elements {
            let ExprKind::Composite(inner) = &element.value.kind else {
                panic!("expected elided literal, got {:?}", element.value.kind);
            };
            assert!(inner.ty.is_none());
        }
    }

    #[test]
    fn test_selector_assignment_and_methods() {
        let (module, interner) = lower_source(
            r#"
package users

type User struct{ password string }

func (u *User) Reset() {
    u.password = ""
}
"#,
        );

        let reset = module
            .items
            .iter()
            .find_map(|item| match &item.kind {
                ItemKind::Function(f) => Some(f),
                _ => None,
            })
            .unwrap();
        assert_eq!(interner.resolve(reset.receiver_type_name().unwrap()).as_str(), "User");
        let body = reset.body.as_ref().unwrap();
        let StmtKind::Assign { lhs, .. } = &body.stmts[0].kind else {
            panic!("expected assignment");
        };
        assert!(matches!(
            &lhs[0].kind,
            ExprKind::Selector { field, .. } if interner.resolve(*field).as_str() == "password"
        ));
    }

    #[test]
    fn test_switch_bodies_are_kept() {
        let (module, interner) = lower_source(
            r#"
package main

func main() {
    switch x := 1; x {
    case 1:
        u := users.User{password: "p"}
        _ = u
    }
}
"#,
        );

        let body = main_body(&module, &interner);
        let StmtKind::Opaque { blocks, .. } = &body.stmts[0].kind else {
            panic!("expected opaque switch");
        };
        let found = blocks.iter().flat_map(|b| b.stmts.iter()).any(|s| {
            matches!(&s.kind, StmtKind::ShortVarDecl { values, .. }
                if matches!(values[0].kind, ExprKind::Composite(_)))
        });
        assert!(found, "case body should be lowered: {:?}", blocks);
    }

    #[test]
    fn test_scoped_declarations() {
        let (module, interner) = lower_source(
            r#"
package main

func main() {
    type Local struct{ secret string }
    for i, u := range us {
    }
    switch v := x.(type) {
    case Local, *Local:
    default:
    }
    select {
    case m, ok := <-ch:
        _ = m
    }
}
"#,
        );
        let body = main_body(&module, &interner);
        let kinds: Vec<_> = body.stmts.iter().map(|s| &s.kind).collect();

        let StmtKind::LocalType(item) = kinds[0] else {
            panic!("expected local type, got {:?}", kinds[0]);
        };
        assert!(matches!(&item.kind, ItemKind::Struct(def) if def.fields.len() == 1));

        let StmtKind::For { init: Some(init), .. } = kinds[1] else {
            panic!("expected for loop");
        };
        assert!(matches!(&init.kind, StmtKind::Range { lhs, define: true, .. } if lhs.len() == 2));

        let StmtKind::TypeSwitch { binding, clauses, .. } = kinds[2] else {
            panic!("expected type switch");
        };
        assert_eq!(binding.map(|b| interner.resolve(b)).as_deref(), Some("v"));
        let arity: Vec<_> = clauses.iter().map(|c| c.types.len()).collect();
        assert_eq!(arity, vec![2, 0]);

        let StmtKind::Opaque { blocks, .. } = kinds[3] else {
            panic!("expected opaque select");
        };
        assert!(matches!(
            &blocks[0].stmts[0].kind,
            StmtKind::ShortVarDecl { names, .. } if names.len() == 2
        ));
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r"User: %#v\n"), "User: %#v\n");
        assert_eq!(unescape(r#"say \"hi\"\t\x41é"#), "say \"hi\"\tAé");
        assert_eq!(parse_int("0x1F"), Some(31));
        assert_eq!(parse_int("1_000"), Some(1000));
        assert_eq!(parse_int("017"), Some(15));
    }
}
