//! The visibility checker.

use govis_common::{SourceFile, SourceMap, Span, Symbol, SymbolInterner};
use govis_hir::{
    Block, CompositeLit, ElementKey, Expr, ExprKind, FnSig, Item, ItemKind, PackageId, Param,
    Program, Stmt, StmtKind, Type, UnaryOp, Visibility,
};
use miette::NamedSource;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{CheckReport, VisibilityError};
use crate::index::{FileScope, ImportTarget, ProgramIndex};
use crate::types::{
    display_struct, field_type, lookup_member, resolve_at_depth, resolve_type, LocalScope, Member,
    NoLocals, SemType, StructType, TypeName,
};
use crate::visibility::{check_access, exported_spelling};

/// Which kinds of references are checked besides keyed struct literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// `x.f` selectors, including assignment targets.
    pub selectors: bool,
    /// Positional literals `T{a, b}`.
    pub positional: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            selectors: true,
            positional: true,
        }
    }
}

/// Check every package of `program`, collecting all errors.
pub fn check_program(
    program: &Program,
    sources: &SourceMap,
    interner: &SymbolInterner,
    options: &CheckOptions,
) -> CheckReport {
    let index = ProgramIndex::build(program, interner);
    let mut report = CheckReport::default();

    for pkg in program.package_ids() {
        let package = program.package(pkg);
        let before = report.errors.len();

        for (file, module) in package.files.iter().enumerate() {
            let Some(source) = sources.get(module.source) else {
                tracing::warn!(package = %package.path, "source file missing from source map");
                continue;
            };
            let mut checker = Checker {
                index: &index,
                interner,
                options,
                scope: FileScope { pkg, file },
                source,
                locals: vec![],
                errors: &mut report.errors,
            };
            checker.check_file();
        }

        tracing::debug!(
            package = %package.path,
            errors = report.errors.len() - before,
            "checked package"
        );
    }

    report
}

/// A name declared inside a function body.
#[derive(Debug, Clone)]
enum Local<'p> {
    Var(SemType<'p>),
    Type(&'p Item),
}

struct Checker<'a, 'p> {
    index: &'a ProgramIndex<'p>,
    interner: &'a SymbolInterner,
    options: &'a CheckOptions,
    scope: FileScope,
    source: SourceFile,
    locals: Vec<FxHashMap<Symbol, Local<'p>>>,
    errors: &'a mut Vec<VisibilityError>,
}

impl<'p> LocalScope<'p> for Checker<'_, 'p> {
    fn value(&self, name: Symbol) -> Option<SemType<'p>> {
        match self.local(name)? {
            Local::Var(ty) => Some(ty.clone()),
            Local::Type(_) => Some(SemType::Unknown),
        }
    }

    fn type_named(&self, name: Symbol, depth: u8) -> Option<SemType<'p>> {
        let item = match self.local(name)? {
            Local::Type(item) => *item,
            Local::Var(_) => return Some(SemType::Unknown),
        };
        let ty = match &item.kind {
            ItemKind::Struct(def) => SemType::Struct(StructType {
                fields_scope: self.scope,
                named: Some(TypeName::Local(def.name)),
                fields: &def.fields,
                local_fields: true,
            }),
            ItemKind::TypeDecl(decl) => {
                match resolve_at_depth(self.index, &decl.ty, self.scope, self, depth) {
                    SemType::Struct(mut st) if !decl.is_alias => {
                        st.named = Some(TypeName::Local(decl.name));
                        SemType::Struct(st)
                    }
                    other => other,
                }
            }
            ItemKind::Function(_) | ItemKind::Var(_) => SemType::Unknown,
        };
        Some(ty)
    }
}

impl<'a, 'p> Checker<'a, 'p> {
    fn check_file(&mut self) {
        let module = self.index.module(self.scope);

        for item in &module.items {
            match &item.kind {
                ItemKind::Function(f) => {
                    self.push_scope();
                    if let Some(receiver) = &f.receiver {
                        self.bind_param(receiver);
                    }
                    self.bind_signature(&f.sig);
                    if let Some(body) = &f.body {
                        self.check_stmts(&body.stmts);
                    }
                    self.pop_scope();
                }
                ItemKind::Struct(def) => {
                    for field in &def.fields {
                        self.check_type_ref(&field.ty);
                    }
                }
                ItemKind::TypeDecl(decl) => self.check_type_ref(&decl.ty),
                ItemKind::Var(def) => {
                    let expected = def.ty.as_ref().map(|ty| {
                        self.check_type_ref(ty);
                        resolve_type(self.index, ty, self.scope)
                    });
                    for value in &def.values {
                        self.check_expr(value, expected.as_ref());
                    }
                }
            }
        }
    }

    // Scopes

    fn push_scope(&mut self) {
        self.locals.push(FxHashMap::default());
    }

    fn pop_scope(&mut self) {
        self.locals.pop();
    }

    fn declare(&mut self, name: Symbol, local: Local<'p>) {
        if self.interner.resolve(name).as_str() == "_" {
            return;
        }
        if let Some(scope) = self.locals.last_mut() {
            scope.insert(name, local);
        }
    }

    fn bind(&mut self, name: Symbol, ty: SemType<'p>) {
        self.declare(name, Local::Var(ty));
    }

    fn bind_param(&mut self, param: &'p Param) {
        self.check_type_ref(&param.ty);
        if let Some(name) = param.name {
            let ty = self.resolve(&param.ty);
            self.bind(name, ty);
        }
    }

    fn bind_signature(&mut self, sig: &'p FnSig) {
        for param in sig.params.iter().chain(sig.results.iter()) {
            self.bind_param(param);
        }
    }

    fn local(&self, name: Symbol) -> Option<&Local<'p>> {
        self.locals.iter().rev().find_map(|scope| scope.get(&name))
    }

    /// Resolve a type written in the current function.
    fn resolve(&self, ty: &'p Type) -> SemType<'p> {
        resolve_at_depth(self.index, ty, self.scope, self, 0)
    }

    /// If `name` refers to an imported package here, where it points.
    fn qualifier_target(&self, name: Symbol) -> Option<ImportTarget> {
        if self.local(name).is_some() || self.index.declares(self.scope.pkg, name) {
            return None;
        }
        self.index.import(self.scope, name)
    }

    // Statements

    fn check_block(&mut self, block: &'p Block) {
        self.push_scope();
        self.check_stmts(&block.stmts);
        self.pop_scope();
    }

    fn check_stmts(&mut self, stmts: &'p [Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &'p Stmt) {
        match &stmt.kind {
            StmtKind::ShortVarDecl { names, values } => {
                for value in values {
                    self.check_expr(value, None);
                }
                let paired = names.len() == values.len();
                for (i, &name) in names.iter().enumerate() {
                    let ty = if paired {
                        self.type_of(&values[i])
                    } else {
                        SemType::Unknown
                    };
                    self.bind(name, ty);
                }
            }
            StmtKind::VarDecl { names, ty, values } => {
                let declared = ty.as_ref().map(|ty| {
                    self.check_type_ref(ty);
                    self.resolve(ty)
                });
                for value in values {
                    self.check_expr(value, declared.as_ref());
                }
                for (i, &name) in names.iter().enumerate() {
                    let ty = match (&declared, values.get(i)) {
                        (Some(declared), _) => declared.clone(),
                        (None, Some(value)) if names.len() == values.len() => self.type_of(value),
                        _ => SemType::Unknown,
                    };
                    self.bind(name, ty);
                }
            }
            StmtKind::Assign { lhs, rhs, .. } => {
                for target in lhs {
                    self.check_expr(target, None);
                }
                for value in rhs {
                    self.check_expr(value, None);
                }
            }
            StmtKind::Expr(expr) => self.check_expr(expr, None),
            StmtKind::Return(values) => {
                for value in values {
                    self.check_expr(value, None);
                }
            }
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::If {
                init,
                cond,
                then_branch,
                else_branch,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                self.check_expr(cond, None);
                self.check_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
                self.pop_scope();
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond, None);
                }
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                self.check_block(body);
                self.pop_scope();
            }
            StmtKind::Range { lhs, define, expr } => {
                self.check_expr(expr, None);
                if !*define {
                    for target in lhs {
                        self.check_expr(target, None);
                    }
                    return;
                }
                let ranged = self.type_of(expr);
                let types = [ranged.range_key(), ranged.element()];
                for (target, ty) in lhs.iter().zip(types) {
                    if let ExprKind::Ident(name) = target.kind {
                        self.bind(name, ty);
                    }
                }
            }
            StmtKind::TypeSwitch {
                init,
                binding,
                subject,
                clauses,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                self.check_expr(subject, None);
                for clause in clauses {
                    for ty in &clause.types {
                        self.check_type_ref(ty);
                    }
                    self.push_scope();
                    if let Some(name) = *binding {
                        // A single-type case narrows the binding; otherwise it
                        // keeps the subject's interface type.
                        let ty = match clause.types.as_slice() {
                            [single] => self.resolve(single),
                            _ => SemType::Unknown,
                        };
                        self.bind(name, ty);
                    }
                    self.check_stmts(&clause.body.stmts);
                    self.pop_scope();
                }
                self.pop_scope();
            }
            StmtKind::LocalType(item) => self.check_local_type(item),
            StmtKind::Opaque {
                init,
                exprs,
                blocks,
            } => {
                self.push_scope();
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                for expr in exprs {
                    self.check_expr(expr, None);
                }
                for block in blocks {
                    self.check_block(block);
                }
                self.pop_scope();
            }
        }
    }

    fn check_local_type(&mut self, item: &'p Item) {
        // The name is in scope inside its own declaration.
        match &item.kind {
            ItemKind::Struct(def) => {
                self.declare(def.name, Local::Type(item));
                for field in &def.fields {
                    self.check_type_ref(&field.ty);
                }
            }
            ItemKind::TypeDecl(decl) => {
                self.declare(decl.name, Local::Type(item));
                self.check_type_ref(&decl.ty);
            }
            ItemKind::Function(_) | ItemKind::Var(_) => {}
        }
    }

    // Expressions

    /// `expected` is the type an elided literal (`{...}` inside a slice
    /// literal, say) takes on.
    fn check_expr(&mut self, expr: &'p Expr, expected: Option<&SemType<'p>>) {
        match &expr.kind {
            ExprKind::Composite(lit) => {
                let ty = match &lit.ty {
                    Some(ty) => {
                        self.check_type_ref(ty);
                        self.resolve(ty)
                    }
                    None => expected.cloned().unwrap_or(SemType::Unknown),
                };
                self.check_composite(lit, &ty);
            }
            ExprKind::Selector {
                expr: base,
                field,
                field_span,
            } => self.check_selector(base, *field, *field_span),
            ExprKind::Unary { operand, .. } => self.check_expr(operand, None),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs, None);
                self.check_expr(rhs, None);
            }
            ExprKind::Call { callee, args } => {
                self.check_expr(callee, None);
                for arg in args {
                    self.check_expr(arg, None);
                }
            }
            ExprKind::Index { expr, index } => {
                self.check_expr(expr, None);
                self.check_expr(index, None);
            }
            ExprKind::FuncLit { sig, body } => {
                self.push_scope();
                self.bind_signature(sig);
                self.check_stmts(&body.stmts);
                self.pop_scope();
            }
            ExprKind::Opaque { exprs, blocks } => {
                for expr in exprs {
                    self.check_expr(expr, None);
                }
                for block in blocks {
                    self.check_block(block);
                }
            }
            ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Error => {}
        }
    }

    fn check_composite(&mut self, lit: &'p CompositeLit, ty: &SemType<'p>) {
        // `[]*T{{...}}` elides `&T`.
        let ty = if lit.ty.is_none() { ty.deref() } else { ty };

        match ty {
            SemType::Struct(st) => self.check_struct_literal(lit, st),
            SemType::Container(elem) => {
                for element in &lit.elements {
                    if let Some(ElementKey::Expr(key)) = &element.key {
                        self.check_expr(key, None);
                    }
                    self.check_expr(&element.value, Some(elem.as_ref()));
                }
            }
            SemType::Map { key, value } => {
                for element in &lit.elements {
                    if let Some(ElementKey::Expr(k)) = &element.key {
                        self.check_expr(k, Some(key.as_ref()));
                    }
                    self.check_expr(&element.value, Some(value.as_ref()));
                }
            }
            SemType::Pointer(_) | SemType::Unknown => {
                for element in &lit.elements {
                    if let Some(ElementKey::Expr(key)) = &element.key {
                        self.check_expr(key, None);
                    }
                    self.check_expr(&element.value, None);
                }
            }
        }
    }

    fn check_struct_literal(&mut self, lit: &'p CompositeLit, st: &StructType<'p>) {
        let ty_name = display_struct(self.index, self.interner, st, self.scope.pkg);
        let declaring = st.declaring_package();

        if lit.is_keyed() && lit.is_positional() {
            let error = VisibilityError::MixedLiteral {
                src: self.src(),
                span: lit.span.into(),
            };
            self.report(error);
        }

        if lit.is_keyed() {
            let mut seen = FxHashSet::default();
            for element in &lit.elements {
                let mut expected = None;
                match &element.key {
                    Some(ElementKey::Name { name, span }) => {
                        let field_name = self.interner.resolve(*name).to_string();
                        if !seen.insert(*name) {
                            let error = VisibilityError::DuplicateField {
                                field: field_name.clone(),
                                src: self.src(),
                                span: (*span).into(),
                            };
                            self.report(error);
                        }
                        match st.fields.iter().find(|f| f.name == *name) {
                            None => {
                                let error = VisibilityError::UnknownField {
                                    field: field_name,
                                    ty: ty_name.clone(),
                                    src: self.src(),
                                    span: (*span).into(),
                                };
                                self.report(error);
                            }
                            Some(field) => {
                                if !check_access(field.vis, declaring, self.scope.pkg).is_allowed() {
                                    let error = VisibilityError::PrivateFieldAccess {
                                        exported: exported_spelling(&field_name),
                                        field: field_name,
                                        ty: ty_name.clone(),
                                        package: self.package_name(declaring),
                                        src: self.src(),
                                        span: (*span).into(),
                                    };
                                    self.report(error);
                                }
                                expected = Some(field_type(self.index, st, field, self));
                            }
                        }
                    }
                    Some(ElementKey::Expr(key)) => self.check_expr(key, None),
                    None => {}
                }
                self.check_expr(&element.value, expected.as_ref());
            }
            return;
        }

        if self.options.positional && !lit.elements.is_empty() {
            for (field, element) in st.fields.iter().zip(&lit.elements) {
                if !check_access(field.vis, declaring, self.scope.pkg).is_allowed() {
                    let error = VisibilityError::ImplicitPrivateAssignment {
                        field: self.interner.resolve(field.name).to_string(),
                        ty: ty_name.clone(),
                        src: self.src(),
                        span: element.span.into(),
                    };
                    self.report(error);
                }
            }
            if lit.elements.len() < st.fields.len() {
                let error = VisibilityError::TooFewValues {
                    ty: ty_name.clone(),
                    expected: st.fields.len(),
                    found: lit.elements.len(),
                    src: self.src(),
                    span: lit.span.into(),
                };
                self.report(error);
            } else if let Some(extra) = lit.elements.get(st.fields.len()) {
                let error = VisibilityError::TooManyValues {
                    ty: ty_name.clone(),
                    expected: st.fields.len(),
                    src: self.src(),
                    span: extra.span.into(),
                };
                self.report(error);
            }
        }

        for (i, element) in lit.elements.iter().enumerate() {
            let expected = st
                .fields
                .get(i)
                .map(|f| field_type(self.index, st, f, self));
            self.check_expr(&element.value, expected.as_ref());
        }
    }

    fn check_selector(&mut self, base: &'p Expr, name: Symbol, name_span: Span) {
        if let ExprKind::Ident(qualifier) = base.kind {
            match self.qualifier_target(qualifier) {
                Some(ImportTarget::Loaded(pkg)) => {
                    let vis = Visibility::from_ident(&self.interner.resolve(name));
                    if !check_access(vis, pkg, self.scope.pkg).is_allowed() {
                        let error = VisibilityError::UnexportedName {
                            name: self.interner.resolve(name).to_string(),
                            package: self.package_name(pkg),
                            src: self.src(),
                            span: name_span.into(),
                        };
                        self.report(error);
                    }
                    return;
                }
                Some(ImportTarget::External) => return,
                None => {}
            }
        }

        self.check_expr(base, None);

        if !self.options.selectors {
            return;
        }
        let base_ty = self.type_of(base);
        let Some(st) = base_ty.as_struct() else {
            return;
        };

        let name_text = self.interner.resolve(name).to_string();
        match lookup_member(self.index, st, name, self) {
            Some(Member::Field { owner, field }) => {
                let declaring = owner.declaring_package();
                if !check_access(field.vis, declaring, self.scope.pkg).is_allowed() {
                    let error = VisibilityError::UnexportedSelector {
                        expr: self.snippet(base.span),
                        name: name_text,
                        member: "field",
                        package: self.package_name(declaring),
                        src: self.src(),
                        span: name_span.into(),
                    };
                    self.report(error);
                }
            }
            Some(Member::Method { scope, def }) => {
                if !check_access(def.vis, scope.pkg, self.scope.pkg).is_allowed() {
                    let error = VisibilityError::UnexportedSelector {
                        expr: self.snippet(base.span),
                        name: name_text,
                        member: "method",
                        package: self.package_name(scope.pkg),
                        src: self.src(),
                        span: name_span.into(),
                    };
                    self.report(error);
                }
            }
            None => {
                let error = VisibilityError::UnknownSelector {
                    expr: self.snippet(base.span),
                    name: name_text,
                    ty: display_struct(self.index, self.interner, st, self.scope.pkg),
                    src: self.src(),
                    span: name_span.into(),
                };
                self.report(error);
            }
        }
    }

    /// Report qualified references to unexported types: `users.secret`.
    fn check_type_ref(&mut self, ty: &'p Type) {
        match ty {
            Type::Named(path) => {
                let Some(qualifier) = path.qualifier else {
                    return;
                };
                if let Some(ImportTarget::Loaded(pkg)) = self.index.import(self.scope, qualifier) {
                    let name = self.interner.resolve(path.name);
                    if !check_access(Visibility::from_ident(&name), pkg, self.scope.pkg).is_allowed() {
                        let error = VisibilityError::UnexportedName {
                            name: name.to_string(),
                            package: self.package_name(pkg),
                            src: self.src(),
                            span: path.span.into(),
                        };
                        self.report(error);
                    }
                }
            }
            Type::Pointer(inner) | Type::Slice(inner) | Type::Array { inner, .. } => {
                self.check_type_ref(inner)
            }
            Type::Map { key, value } => {
                self.check_type_ref(key);
                self.check_type_ref(value);
            }
            Type::Struct(fields) => {
                for field in fields {
                    self.check_type_ref(&field.ty);
                }
            }
            Type::Primitive(_) | Type::Opaque(_) | Type::Error => {}
        }
    }

    // Typing

    fn type_of(&self, expr: &'p Expr) -> SemType<'p> {
        type_in_scope(self.index, self.scope, expr, 0, self)
    }

    // Reporting

    fn report(&mut self, error: VisibilityError) {
        tracing::trace!(%error, "visibility error");
        self.errors.push(error);
    }

    fn src(&self) -> NamedSource<String> {
        self.source.named_source()
    }

    fn snippet(&self, span: Span) -> String {
        self.source
            .content
            .get(span.start as usize..span.end as usize)
            .unwrap_or("?")
            .to_string()
    }

    fn package_name(&self, pkg: PackageId) -> String {
        let package = self.index.program().package(pkg);
        self.interner.resolve(package.name).to_string()
    }
}

const MAX_TYPING_DEPTH: u8 = 16;

/// Static type of `expr` written in `scope`. Names bound in the current
/// function come from `locals` and never fall through to package scope.
fn type_in_scope<'p>(
    index: &ProgramIndex<'p>,
    scope: FileScope,
    expr: &'p Expr,
    depth: u8,
    locals: &dyn LocalScope<'p>,
) -> SemType<'p> {
    if depth > MAX_TYPING_DEPTH {
        return SemType::Unknown;
    }

    let qualifier = |name: Symbol| -> Option<ImportTarget> {
        if locals.value(name).is_some() || index.declares(scope.pkg, name) {
            return None;
        }
        index.import(scope, name)
    };

    match &expr.kind {
        ExprKind::Ident(name) => match locals.value(*name) {
            Some(ty) => ty,
            None => package_var_type(index, scope.pkg, *name, depth + 1),
        },
        ExprKind::Composite(lit) => match &lit.ty {
            Some(ty) => resolve_at_depth(index, ty, scope, locals, 0),
            None => SemType::Unknown,
        },
        ExprKind::Unary { op, operand } => {
            let inner = type_in_scope(index, scope, operand, depth + 1, locals);
            match op {
                UnaryOp::AddrOf => SemType::Pointer(Box::new(inner)),
                UnaryOp::Deref => match inner {
                    SemType::Pointer(inner) => *inner,
                    _ => SemType::Unknown,
                },
                _ => SemType::Unknown,
            }
        }
        ExprKind::Selector { expr: base, field, .. } => {
            if let ExprKind::Ident(q) = base.kind {
                match qualifier(q) {
                    Some(ImportTarget::Loaded(pkg)) => {
                        return package_var_type(index, pkg, *field, depth + 1)
                    }
                    Some(ImportTarget::External) => return SemType::Unknown,
                    None => {}
                }
            }
            let base_ty = type_in_scope(index, scope, base, depth + 1, locals);
            let Some(st) = base_ty.as_struct() else {
                return SemType::Unknown;
            };
            match lookup_member(index, st, *field, locals) {
                Some(Member::Field { owner, field }) => field_type(index, &owner, field, locals),
                _ => SemType::Unknown,
            }
        }
        ExprKind::Call { callee, .. } => {
            let (fn_scope, sig) = match &callee.kind {
                ExprKind::Ident(name) if locals.value(*name).is_none() => {
                    match index.func(scope.pkg, *name) {
                        Some((fn_scope, def)) => (fn_scope, &def.sig),
                        None => return SemType::Unknown,
                    }
                }
                ExprKind::Selector { expr: base, field, .. } => {
                    let via_package = match base.kind {
                        ExprKind::Ident(q) => qualifier(q),
                        _ => None,
                    };
                    match via_package {
                        Some(ImportTarget::Loaded(pkg)) => match index.func(pkg, *field) {
                            Some((fn_scope, def)) => (fn_scope, &def.sig),
                            None => return SemType::Unknown,
                        },
                        Some(ImportTarget::External) => return SemType::Unknown,
                        None => {
                            let base_ty = type_in_scope(index, scope, base, depth + 1, locals);
                            let Some(st) = base_ty.as_struct() else {
                                return SemType::Unknown;
                            };
                            match lookup_member(index, st, *field, locals) {
                                Some(Member::Method { scope, def }) => (scope, &def.sig),
                                _ => return SemType::Unknown,
                            }
                        }
                    }
                }
                _ => return SemType::Unknown,
            };
            match sig.results.as_slice() {
                [single] => resolve_type(index, &single.ty, fn_scope),
                _ => SemType::Unknown,
            }
        }
        ExprKind::Index { expr: base, .. } => {
            type_in_scope(index, scope, base, depth + 1, locals).element()
        }
        _ => SemType::Unknown,
    }
}

fn package_var_type<'p>(
    index: &ProgramIndex<'p>,
    pkg: PackageId,
    name: Symbol,
    depth: u8,
) -> SemType<'p> {
    let Some(entry) = index.var(pkg, name) else {
        return SemType::Unknown;
    };
    if let Some(ty) = &entry.def.ty {
        return resolve_type(index, ty, entry.scope);
    }
    if entry.def.values.len() != entry.def.names.len() {
        return SemType::Unknown;
    }
    type_in_scope(
        index,
        entry.scope,
        &entry.def.values[entry.position],
        depth + 1,
        &NoLocals,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use govis_common::SourceMap;

    const USERS: &str = r#"
package users

type User struct {
    Name     string
    ID       int
    password string
}

func New(name string) *User {
    return &User{Name: name, password: "changeme"}
}

func (u *User) Check(p string) bool { return u.password == p }

func (u *User) reset() { u.password = "" }
"#;

    struct Fixture {
        sources: SourceMap,
        interner: SymbolInterner,
        program: Program,
    }

    impl Fixture {
        fn new(files: &[(&str, &str, &str)]) -> Self {
            let sources = SourceMap::new();
            let interner = SymbolInterner::new();
            let mut program = Program::new();

            for (import_path, file_name, content) in files {
                let id = sources
                    .add_file(format!("{import_path}/{file_name}"), content.to_string())
                    .unwrap();
                let source = sources.get(id).unwrap();
                let module = govis_frontend_go::parse_file(&source, &interner).unwrap();
                program.add_file(import_path, module);
            }

            Self {
                sources,
                interner,
                program,
            }
        }

        fn check(&self) -> CheckReport {
            self.check_with(&CheckOptions::default())
        }

        fn check_with(&self, options: &CheckOptions) -> CheckReport {
            check_program(&self.program, &self.sources, &self.interner, options)
        }
    }

    fn check_main(main: &str) -> CheckReport {
        Fixture::new(&[
            ("example.com/demo/users", "users.go", USERS),
            ("example.com/demo", "main.go", main),
        ])
        .check()
    }

    fn messages(report: &CheckReport) -> Vec<String> {
        report.errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn test_scenario_a_private_field_from_other_package() {
        let report = check_main(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    u := users.User{
        Name: "doej",
        ID:   101,

        password: "xxxx",
    }

    fmt.Printf("User: %#v\n", u)
}
"#,
        );

        assert_eq!(report.len(), 1, "{:?}", messages(&report));
        let error = &report.errors[0];
        assert!(matches!(error, VisibilityError::PrivateFieldAccess { .. }));
        assert_eq!(error.name(), Some("password"));
        insta::assert_snapshot!(
            error.to_string(),
            @"unknown field 'password' in struct literal of type users.User"
        );
    }

    #[test]
    fn test_scenario_b_omitting_private_field_compiles() {
        let report = check_main(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    u := users.User{Name: "doej", ID: 101}
    fmt.Printf("User: %#v\n", u)
}
"#,
        );
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_scenario_c_private_field_inside_declaring_package() {
        let fixture = Fixture::new(&[
            ("example.com/demo/users", "users.go", USERS),
            (
                "example.com/demo/users",
                "make.go",
                r#"
package users

func Make() User {
    return User{Name: "a", ID: 1, password: "b"}
}
"#,
            ),
        ]);
        let report = fixture.check();
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_unknown_field_is_reported_even_when_exported_spelling() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    _ = users.User{Email: "x"}
}
"#,
        );
        assert_eq!(report.len(), 1);
        assert!(matches!(report.errors[0], VisibilityError::UnknownField { .. }));
        insta::assert_snapshot!(
            report.errors[0].to_string(),
            @"unknown field 'Email' in struct literal of type users.User"
        );
    }

    #[test]
    fn test_import_alias_and_pointer_literal() {
        let report = check_main(
            r#"
package main

import u "example.com/demo/users"

func main() {
    p := &u.User{password: "x"}
    _ = p
}
"#,
        );
        assert_eq!(messages(&report), vec![
            "unknown field 'password' in struct literal of type users.User".to_string()
        ]);
    }

    #[test]
    fn test_dot_import_unqualified_type() {
        let report = check_main(
            r#"
package main

import . "example.com/demo/users"

func main() {
    _ = User{Name: "n", password: "x"}
}
"#,
        );
        assert_eq!(report.len(), 1);
        assert_eq!(report.errors[0].name(), Some("password"));
    }

    #[test]
    fn test_elided_literals_in_slices_and_maps() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    xs := []users.User{{Name: "a"}, {password: "b"}}
    ps := []*users.User{{password: "c"}}
    m := map[string]users.User{"k": {password: "d"}}
    _, _, _ = xs, ps, m
}
"#,
        );
        assert_eq!(report.len(), 3, "{:?}", messages(&report));
        assert!(report
            .errors
            .iter()
            .all(|e| matches!(e, VisibilityError::PrivateFieldAccess { .. })));
    }

    #[test]
    fn test_selector_read_and_assignment() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    u := users.User{Name: "doej"}
    u.password = "x"
    println(u.password, u.Name)
}
"#,
        );
        assert_eq!(report.len(), 2, "{:?}", messages(&report));
        insta::assert_snapshot!(
            report.errors[0].to_string(),
            @"u.password undefined (cannot refer to unexported field password)"
        );
    }

    #[test]
    fn test_selector_through_constructor_and_methods() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    u := users.New("doej")
    _ = u.Check("pw")
    u.reset()
    _ = u.Missing
}
"#,
        );
        let found = messages(&report);
        assert_eq!(found.len(), 2, "{found:?}");
        assert_eq!(found[0], "u.reset undefined (cannot refer to unexported method reset)");
        assert_eq!(
            found[1],
            "u.Missing undefined (type users.User has no field or method Missing)"
        );
    }

    #[test]
    fn test_selector_inside_declaring_package_is_allowed() {
        let report = Fixture::new(&[("example.com/demo/users", "users.go", USERS)]).check();
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_params_and_promoted_fields() {
        let report = Fixture::new(&[
            ("example.com/demo/users", "users.go", USERS),
            (
                "example.com/demo/admin",
                "admin.go",
                r#"
package admin

import "example.com/demo/users"

type Admin struct {
    users.User
    level int
}

func Promote(a *Admin) {
    a.level++
    a.Name = "root"
    a.password = "x"
    a.User.password = "y"
}
"#,
            ),
        ])
        .check();

        assert_eq!(
            messages(&report),
            vec![
                "a.password undefined (cannot refer to unexported field password)".to_string(),
                "a.User.password undefined (cannot refer to unexported field password)".to_string(),
            ]
        );
    }

    #[test]
    fn test_promoted_fields_are_not_literal_keys() {
        let report = Fixture::new(&[
            ("example.com/demo/users", "users.go", USERS),
            (
                "example.com/demo/admin",
                "admin.go",
                r#"
package admin

import "example.com/demo/users"

type Admin struct {
    users.User
    level int
}

var root = Admin{User: users.User{Name: "root"}, level: 1}
var bad = Admin{Name: "root"}
"#,
            ),
        ])
        .check();

        assert_eq!(report.len(), 1, "{:?}", messages(&report));
        assert!(matches!(report.errors[0], VisibilityError::UnknownField { .. }));
        assert_eq!(report.errors[0].name(), Some("Name"));
    }

    #[test]
    fn test_defined_type_keeps_field_owner() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

type Account users.User

func main() {
    _ = Account{Name: "n", password: "p"}
}
"#,
        );
        assert_eq!(
            messages(&report),
            vec!["unknown field 'password' in struct literal of type Account".to_string()]
        );
    }

    #[test]
    fn test_positional_literals() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    _ = users.User{"doej", 101, "xxxx"}
    _ = users.User{"doej", 101}
    _ = users.User{"doej", 101, "x", 4}
}
"#,
        );

        let found = messages(&report);
        assert_eq!(
            found,
            vec![
                "implicit assignment to unexported field 'password' in struct literal of type users.User",
                "too few values in struct literal of type users.User",
                "implicit assignment to unexported field 'password' in struct literal of type users.User",
                "too many values in struct literal of type users.User",
            ]
        );
    }

    #[test]
    fn test_options_disable_positional_and_selector_checks() {
        let fixture = Fixture::new(&[
            ("example.com/demo/users", "users.go", USERS),
            (
                "example.com/demo",
                "main.go",
                r#"
package main

import "example.com/demo/users"

func main() {
    u := users.User{"doej", 101, "xxxx"}
    u.password = "x"
    _ = users.User{password: "still checked"}
}
"#,
            ),
        ]);

        let report = fixture.check_with(&CheckOptions {
            selectors: false,
            positional: false,
        });
        assert_eq!(report.len(), 1, "{:?}", messages(&report));
        assert!(matches!(report.errors[0], VisibilityError::PrivateFieldAccess { .. }));
    }

    #[test]
    fn test_duplicate_and_mixed_elements() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    _ = users.User{Name: "a", Name: "b"}
    _ = users.User{Name: "a", 101}
}
"#,
        );
        let found = messages(&report);
        assert_eq!(
            found,
            vec![
                "duplicate field name 'Name' in struct literal",
                "mixture of field:value and value elements in struct literal",
            ]
        );
    }

    #[test]
    fn test_unexported_package_level_names() {
        let report = Fixture::new(&[
            (
                "example.com/demo/users",
                "users.go",
                r#"
package users

type secret struct{ v int }

var defaultName = "guest"

func hash(s string) string { return s }
"#,
            ),
            (
                "example.com/demo",
                "main.go",
                r#"
package main

import "example.com/demo/users"

var s users.secret

func main() {
    println(users.defaultName, users.hash("x"))
}
"#,
            ),
        ])
        .check();

        let found = messages(&report);
        assert_eq!(
            found,
            vec![
                "name secret not exported by package users",
                "name defaultName not exported by package users",
                "name hash not exported by package users",
            ]
        );
    }

    #[test]
    fn test_external_packages_and_shadowing_are_ignored() {
        let report = check_main(
            r#"
package main

import (
    "fmt"
    "strings"

    "example.com/demo/users"
)

type local struct{ users string }

func main() {
    fmt.println("not ours")
    _ = strings.toLower
    users := local{users: "shadow"}
    _ = users.users
}
"#,
        );
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_package_level_var_initializer_and_scopes() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

var admin = users.User{Name: "root"}

func main() {
    admin.password = "x"
    if ok := true; ok {
        v := users.New("n")
        v.password = "y"
    }
    for i := 0; i < 1; i++ {
        func() {
            w := &users.User{}
            w.password = "z"
        }()
    }
}
"#,
        );
        let names: Vec<_> = report.errors.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![Some("password"); 3], "{:?}", messages(&report));
    }

    #[test]
    fn test_unknown_types_are_not_diagnosed() {
        let report = check_main(
            r#"
package main

import "github.com/other/lib"

func main() {
    _ = lib.Thing{hidden: 1}
    var x interface{} = 1
    _ = x
}
"#,
        );
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_all_errors_are_collected_and_fail_the_build() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    _ = users.User{password: "a"}
    _ = users.User{password: "b"}
}
"#,
        );
        assert_eq!(report.len(), 2);
        let failed = report.into_result().unwrap_err();
        assert_eq!(failed.count, 2);
        insta::assert_snapshot!(failed.to_string(), @"could not compile due to 2 visibility error(s)");
    }

    #[test]
    fn test_type_switch_binding_is_local() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

var u = users.User{Name: "root"}

type T struct{ password string }

func main() {
    var x interface{} = T{}
    switch u := x.(type) {
    case T:
        _ = u.password
    case users.User:
        _ = u.password
    case T, *T:
        _ = u.password
    default:
        _ = u
    }
}
"#,
        );
        // Only the `users.User` case narrows `u` to a foreign type.
        assert_eq!(
            messages(&report),
            vec!["u.password undefined (cannot refer to unexported field password)"]
        );
    }

    #[test]
    fn test_select_receive_binding_is_local() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

var u = users.User{Name: "root"}

type T struct{ password string }

func main() {
    ch := make(chan T, 1)
    ch <- T{}
    select {
    case u := <-ch:
        _ = u.password
    case v, ok := <-ch:
        _, _ = v, ok
    default:
    }
}
"#,
        );
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_switch_initializer_scopes_over_cases() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

var v = users.User{Name: "root"}

type T struct{ password string }

func main() {
    switch v := (T{}); v.password {
    case "":
        v.password = "set"
    }
}
"#,
        );
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_local_types_shadow_package_types() {
        let report = check_main(
            r#"
package main

import . "example.com/demo/users"

func main() {
    type User struct{ password string }
    v := User{password: "x"}
    v.password = "y"
    _ = []User{{password: "z"}}
}
"#,
        );
        assert!(report.is_ok(), "{:?}", messages(&report));
    }

    #[test]
    fn test_local_types_over_foreign_structs() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    type Account users.User
    type Wrapper struct {
        users.User
        note string
    }
    a := Account{password: "x"}
    w := Wrapper{note: "n"}
    w.password = "y"
    _ = a
    {
        type Account struct{ password string }
        _ = Account{password: "inner"}
    }
}
"#,
        );
        assert_eq!(
            messages(&report),
            vec![
                "unknown field 'password' in struct literal of type Account",
                "w.password undefined (cannot refer to unexported field password)",
            ]
        );
    }

    #[test]
    fn test_range_variables_take_element_types() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    us := []users.User{}
    for _, u := range us {
        u.password = "x"
    }
    for i := range us {
        us[i].password = "y"
    }
    byOwner := map[*users.User]int{}
    for k, n := range byOwner {
        k.password = "z"
        _ = n
    }
    var u users.User
    for _, u = range us {
    }
    _ = u
}
"#,
        );
        let names: Vec<_> = report.errors.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec![Some("password"); 3], "{:?}", messages(&report));
    }

    #[test]
    fn test_elided_map_keys() {
        let report = check_main(
            r#"
package main

import "example.com/demo/users"

func main() {
    m := map[users.User]int{{password: "x"}: 1, {Name: "ok"}: 2}
    _ = m
}
"#,
        );
        assert_eq!(report.len(), 1, "{:?}", messages(&report));
        assert!(matches!(
            report.errors[0],
            VisibilityError::PrivateFieldAccess { .. }
        ));
    }
}
