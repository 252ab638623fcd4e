use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use govis_common::{SourceMap, Span, Symbol, SymbolInterner};
use govis_hir::{
    BinOp, CompositeLit, ElementKey, Expr, ExprKind, Field, FnDef, ImportName, Literal, PackageId,
    PrimitiveType, Program, Stmt, StmtKind, Type, UnaryOp, VarDef,
};
use govis_sema::{display_type, FileScope, ImportTarget, ProgramIndex, TypeEntry, VarEntry};
use indexmap::IndexMap;
use miette::NamedSource;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::error::{EvalError, EvalResult};
use crate::fmt::{sprint, sprintf, sprintln};
use crate::value::{FieldLayout, Pointer, RtType, SliceValue, StructLayout, StructValue, Value};

pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

/// Nesting limit for type resolution through declarations.
const MAX_TYPE_DEPTH: u8 = 16;

type Cell<'p> = Rc<RefCell<Value<'p>>>;

enum Flow<'p> {
    Normal,
    Return(Vec<Value<'p>>),
}

/// One step from a variable to the location an assignment writes.
#[derive(Debug)]
enum Step {
    Field(SmolStr),
    Index(usize),
}

struct Frame<'p> {
    scope: FileScope,
    locals: Vec<FxHashMap<Symbol, Cell<'p>>>,
    /// Named results, returned by a bare `return`.
    results: Vec<Symbol>,
}

/// Tree-walking evaluator over the HIR of a checked program.
pub struct Interpreter<'p, 'w> {
    index: ProgramIndex<'p>,
    sources: &'p SourceMap,
    interner: &'p SymbolInterner,
    out: &'w mut dyn Write,
    steps: u64,
    step_limit: u64,
    frames: Vec<Frame<'p>>,
    globals: FxHashMap<(PackageId, Symbol), Cell<'p>>,
    initializing: FxHashSet<(PackageId, Symbol)>,
    layouts: FxHashMap<(PackageId, Symbol), Rc<StructLayout<'p>>>,
}

impl<'p, 'w> Interpreter<'p, 'w> {
    pub fn new(
        program: &'p Program,
        sources: &'p SourceMap,
        interner: &'p SymbolInterner,
        out: &'w mut dyn Write,
    ) -> Self {
        Self {
            index: ProgramIndex::build(program, interner),
            sources,
            interner,
            out,
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            frames: vec![],
            globals: FxHashMap::default(),
            initializing: FxHashSet::default(),
            layouts: FxHashMap::default(),
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// Run `func main()` of the first package named `main`.
    pub fn run_main(&mut self) -> EvalResult<()> {
        let program = self.index.program();
        let pkg = program
            .package_ids()
            .find(|&pkg| self.interner.resolve(program.package(pkg).name).as_str() == "main")
            .ok_or(EvalError::NoMainPackage)?;
        self.run_package(pkg)
    }

    pub fn run_package(&mut self, pkg: PackageId) -> EvalResult<()> {
        let main = self.interner.intern("main");
        let (scope, def) = self.index.func(pkg, main).ok_or(EvalError::MissingMain)?;

        tracing::debug!(package = %self.index.program().package(pkg).path, "running main");
        self.call_function(scope, def, None, vec![], def.span)?;
        self.out.flush()?;
        tracing::debug!(steps = self.steps, "main returned");
        Ok(())
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.step_limit {
            return Err(EvalError::StepLimit(self.step_limit));
        }
        Ok(())
    }

    // Functions

    fn call_function(
        &mut self,
        scope: FileScope,
        def: &'p FnDef,
        receiver: Option<Value<'p>>,
        mut args: Vec<Value<'p>>,
        call_span: Span,
    ) -> EvalResult<Vec<Value<'p>>> {
        let Some(body) = &def.body else {
            return Err(self.unsupported("call of a function without a body", call_span));
        };
        tracing::trace!(function = %self.interner.resolve(def.name), "call");

        let mut locals = FxHashMap::default();
        if let (Some(param), Some(value)) = (&def.receiver, receiver) {
            if let Some(name) = param.name {
                locals.insert(name, Rc::new(RefCell::new(value)));
            }
        }

        let params = &def.sig.params;
        if def.sig.is_variadic && !params.is_empty() && args.len() + 1 >= params.len() {
            let fixed = params.len() - 1;
            let rest = args.split_off(fixed);
            let elem = match self.resolve(&params[fixed].ty, scope) {
                RtType::Slice(elem) => *elem,
                other => other,
            };
            let items = rest.into_iter().map(|v| convert(v, &elem)).collect();
            args.push(Value::Slice(SliceValue {
                elem,
                items,
                len: None,
            }));
        }
        if args.len() != params.len() {
            let message = format!(
                "call with {} arguments to a function taking {}",
                args.len(),
                params.len()
            );
            return Err(self.unsupported(message, call_span));
        }

        for (param, value) in params.iter().zip(args) {
            let ty = self.resolve(&param.ty, scope);
            if let Some(name) = param.name {
                locals.insert(name, Rc::new(RefCell::new(convert(value, &ty))));
            }
        }

        let mut results = vec![];
        for result in &def.sig.results {
            if let Some(name) = result.name {
                let ty = self.resolve(&result.ty, scope);
                let zero = self.zero(&ty);
                locals.insert(name, Rc::new(RefCell::new(zero)));
                results.push(name);
            }
        }

        self.frames.push(Frame {
            scope,
            locals: vec![locals],
            results,
        });
        let flow = self.exec_stmts(&body.stmts);
        let values = match flow {
            Ok(Flow::Return(values)) => Ok(values),
            Ok(Flow::Normal) => Ok(self.named_results()),
            Err(err) => Err(err),
        };
        self.frames.pop();
        values
    }

    fn call_method(
        &mut self,
        base: &'p Expr,
        name: Symbol,
        args: &'p [Expr],
        span: Span,
    ) -> EvalResult<Vec<Value<'p>>> {
        // Variables holding structs are addressable: pointer receivers see
        // the variable itself.
        let base_value = match &base.kind {
            ExprKind::Ident(var) => match self.lookup(*var, base.span)? {
                Some(cell) => {
                    let current = cell.borrow().clone();
                    match current {
                        Value::Struct(st) => Value::Pointer(Pointer {
                            pointee: RtType::Struct(st.layout.clone()),
                            target: Some(cell),
                        }),
                        other => other,
                    }
                }
                None => return Err(self.undefined(self.interner.resolve(*var), base.span)),
            },
            _ => self.eval(base)?,
        };

        let layout = match &base_value {
            Value::Struct(st) => Some(st.layout.clone()),
            Value::Pointer(Pointer {
                pointee: RtType::Struct(layout),
                ..
            }) => Some(layout.clone()),
            _ => None,
        };
        let method_name = self.interner.resolve(name);
        let method = layout.as_ref().and_then(|layout| {
            let (pkg, type_name) = layout.named?;
            self.index
                .methods(pkg, type_name)
                .iter()
                .find(|(_, def)| def.name == name)
                .copied()
        });
        let Some((scope, def)) = method else {
            let what = format!("method {method_name} on {}", base_value.type_name());
            return Err(self.unsupported(what, span));
        };

        let wants_pointer = matches!(
            def.receiver.as_ref().map(|r| &r.ty),
            Some(Type::Pointer(_))
        );
        let receiver = match base_value {
            Value::Pointer(ptr) if wants_pointer => Value::Pointer(ptr),
            Value::Pointer(Pointer {
                target: Some(target),
                ..
            }) => {
                let value = target.borrow().clone();
                value
            }
            Value::Pointer(Pointer { target: None, .. }) => {
                return Err(self.nil_dereference(base.span))
            }
            Value::Struct(st) if wants_pointer => {
                Value::new_pointer(RtType::Struct(st.layout.clone()), Value::Struct(st))
            }
            other => other,
        };

        let args = self.eval_list(args)?;
        self.call_function(scope, def, Some(receiver), args, span)
    }

    fn eval_call(
        &mut self,
        callee: &'p Expr,
        args: &'p [Expr],
        span: Span,
    ) -> EvalResult<Vec<Value<'p>>> {
        match &callee.kind {
            ExprKind::Ident(name) => self.call_ident(*name, args, span),
            ExprKind::Selector {
                expr: base, field, ..
            } => {
                if let ExprKind::Ident(qualifier) = base.kind {
                    match self.qualifier(qualifier) {
                        Some(ImportTarget::Loaded(pkg)) => {
                            let Some((scope, def)) = self.index.func(pkg, *field) else {
                                return Err(self.undefined(self.interner.resolve(*field), span));
                            };
                            let args = self.eval_list(args)?;
                            return self.call_function(scope, def, None, args, span);
                        }
                        Some(ImportTarget::External) => {
                            return self.call_external(qualifier, *field, args, span)
                        }
                        None => {}
                    }
                }
                self.call_method(base, *field, args, span)
            }
            _ => Err(self.unsupported("call of a function value", span)),
        }
    }

    fn call_ident(
        &mut self,
        name: Symbol,
        args: &'p [Expr],
        span: Span,
    ) -> EvalResult<Vec<Value<'p>>> {
        let text = self.interner.resolve(name);
        if self.local(name).is_some() {
            return Err(self.unsupported(format!("call of function value {text}"), span));
        }

        let pkg = self.scope().pkg;
        if let Some((scope, def)) = self.index.func(pkg, name) {
            let args = self.eval_list(args)?;
            return self.call_function(scope, def, None, args, span);
        }
        if self.index.declares(pkg, name) {
            return Err(self.unsupported(format!("conversion to {text}"), span));
        }
        if let Some(prim) = PrimitiveType::from_name(&text) {
            return self.convert_call(prim, args, span).map(|v| vec![v]);
        }

        match text.as_str() {
            "len" => {
                let values = self.eval_list(args)?;
                let len = match values.as_slice() {
                    [Value::String(s)] => s.len(),
                    [Value::Slice(slice)] => slice.items.len(),
                    [Value::Nil] => 0,
                    _ => return Err(self.unsupported("len of this operand", span)),
                };
                Ok(vec![Value::int(len as i64)])
            }
            "append" => {
                let mut values = self.eval_list(args)?.into_iter();
                match values.next() {
                    Some(Value::Slice(mut slice)) => {
                        for value in values {
                            slice.items.push(convert(value, &slice.elem));
                        }
                        slice.len = None;
                        Ok(vec![Value::Slice(slice)])
                    }
                    _ => Err(self.unsupported("append to a nil or non-slice value", span)),
                }
            }
            "panic" => {
                let values = self.eval_list(args)?;
                Err(EvalError::UserPanic {
                    message: sprint(&values),
                    src: self.src(span),
                    span: span.into(),
                })
            }
            _ => Err(self.undefined(text, span)),
        }
    }

    /// Calls into packages outside the program. Only `fmt` printing is known.
    fn call_external(
        &mut self,
        qualifier: Symbol,
        name: Symbol,
        args: &'p [Expr],
        span: Span,
    ) -> EvalResult<Vec<Value<'p>>> {
        let func = self.interner.resolve(name);
        if self.import_path(qualifier).as_deref() != Some("fmt") {
            let what = format!("{}.{func}", self.interner.resolve(qualifier));
            return Err(self.unsupported(what, span));
        }

        let values = self.eval_list(args)?;
        let text = match func.as_str() {
            "Print" | "Sprint" => sprint(&values),
            "Println" | "Sprintln" => sprintln(&values),
            "Printf" | "Sprintf" => match values.split_first() {
                Some((Value::String(format), rest)) => sprintf(format, rest),
                _ => return Err(self.unsupported("non-string format argument", span)),
            },
            _ => return Err(self.unsupported(format!("fmt.{func}"), span)),
        };

        if func.starts_with('S') {
            return Ok(vec![Value::String(text)]);
        }
        self.out.write_all(text.as_bytes())?;
        Ok(vec![Value::int(text.len() as i64), Value::Nil])
    }

    fn convert_call(
        &mut self,
        prim: PrimitiveType,
        args: &'p [Expr],
        span: Span,
    ) -> EvalResult<Value<'p>> {
        let [arg] = args else {
            return Err(self.unsupported("conversion with more than one argument", span));
        };
        let value = self.eval(arg)?;
        let converted = match (value, prim) {
            (Value::Int(v, _), p) if p.is_integer() => Value::Int(wrap(v, p), p),
            (Value::Int(v, _), p) if p.is_float() => Value::Float(v as f64, p),
            (Value::Float(v, _), p) if p.is_integer() => Value::Int(wrap(v as i64, p), p),
            (Value::Float(v, _), PrimitiveType::Float32) => {
                Value::Float(v as f32 as f64, PrimitiveType::Float32)
            }
            (Value::Float(v, _), p) if p.is_float() => Value::Float(v, p),
            (Value::Int(v, _), PrimitiveType::String) => {
                let c = u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Value::String(c.to_string())
            }
            (Value::String(s), PrimitiveType::String) => Value::String(s),
            (Value::Bool(b), PrimitiveType::Bool) => Value::Bool(b),
            (other, p) => {
                let what = format!("conversion from {} to {}", other.type_name(), p.name());
                return Err(self.unsupported(what, span));
            }
        };
        Ok(converted)
    }

    fn import_path(&self, qualifier: Symbol) -> Option<SmolStr> {
        let module = self.index.module(self.scope());
        let text = self.interner.resolve(qualifier);
        module
            .imports
            .iter()
            .find(|import| match import.name {
                ImportName::Alias(alias) => alias == qualifier,
                ImportName::Default => import.path.rsplit('/').next() == Some(text.as_str()),
                ImportName::Dot | ImportName::Blank => false,
            })
            .map(|import| import.path.clone())
    }

    // Statements

    fn exec_stmts(&mut self, stmts: &'p [Stmt]) -> EvalResult<Flow<'p>> {
        for stmt in stmts {
            if let Flow::Return(values) = self.exec_stmt(stmt)? {
                return Ok(Flow::Return(values));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, stmts: &'p [Stmt]) -> EvalResult<Flow<'p>> {
        self.push_scope();
        let flow = self.exec_stmts(stmts);
        self.pop_scope();
        flow
    }

    fn exec_stmt(&mut self, stmt: &'p Stmt) -> EvalResult<Flow<'p>> {
        self.tick()?;

        match &stmt.kind {
            StmtKind::ShortVarDecl { names, values } => {
                let values = self.eval_list(values)?;
                if values.len() != names.len() {
                    return Err(self.unsupported("assignment count mismatch", stmt.span));
                }
                for (&name, value) in names.iter().zip(values) {
                    match self.innermost(name) {
                        Some(cell) => {
                            let retagged = retag(&cell.borrow(), value);
                            *cell.borrow_mut() = retagged;
                        }
                        None => self.declare(name, value),
                    }
                }
            }
            StmtKind::VarDecl { names, ty, values } => {
                let scope = self.scope();
                let ty = ty.as_ref().map(|ty| self.resolve(ty, scope));
                let values = if values.is_empty() {
                    let mut zeros = Vec::with_capacity(names.len());
                    for _ in names {
                        zeros.push(match &ty {
                            Some(ty) => self.zero(ty),
                            None => Value::Nil,
                        });
                    }
                    zeros
                } else {
                    self.eval_list(values)?
                };
                if values.len() != names.len() {
                    return Err(self.unsupported("assignment count mismatch", stmt.span));
                }
                for (&name, value) in names.iter().zip(values) {
                    let value = match &ty {
                        Some(ty) => convert(value, ty),
                        None => value,
                    };
                    self.declare(name, value);
                }
            }
            StmtKind::Assign { lhs, op, rhs } => match op {
                Some(op) => {
                    let ([target], [operand]) = (lhs.as_slice(), rhs.as_slice()) else {
                        return Err(self.unsupported("compound assignment", stmt.span));
                    };
                    let current = self.eval(target)?;
                    let operand = self.eval(operand)?;
                    let value = self.binary(*op, current, operand, stmt.span)?;
                    self.store(target, value)?;
                }
                None => {
                    // Go evaluates every operand before assigning any of them.
                    let values = self.eval_list(rhs)?;
                    if values.len() != lhs.len() {
                        return Err(self.unsupported("assignment count mismatch", stmt.span));
                    }
                    for (target, value) in lhs.iter().zip(values) {
                        self.store(target, value)?;
                    }
                }
            },
            StmtKind::Expr(expr) => {
                self.eval_list(std::slice::from_ref(expr))?;
            }
            StmtKind::Return(values) => {
                if values.is_empty() {
                    return Ok(Flow::Return(self.named_results()));
                }
                let values = self.eval_list(values)?;
                return Ok(Flow::Return(values));
            }
            StmtKind::Block(block) => return self.exec_block(&block.stmts),
            StmtKind::If {
                init,
                cond,
                then_branch,
                else_branch,
            } => {
                self.push_scope();
                let flow = self.exec_if(
                    init.as_deref(),
                    cond,
                    &then_branch.stmts,
                    else_branch.as_deref(),
                );
                self.pop_scope();
                return flow;
            }
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => {
                self.push_scope();
                let flow = self.exec_for(
                    init.as_deref(),
                    cond.as_ref(),
                    post.as_deref(),
                    &body.stmts,
                );
                self.pop_scope();
                return flow;
            }
            StmtKind::Range { .. }
            | StmtKind::TypeSwitch { .. }
            | StmtKind::LocalType(_)
            | StmtKind::Opaque { .. } => {
                let what = format!("statement `{}`", self.snippet(stmt.span));
                return Err(self.unsupported(what, stmt.span));
            }
        }

        Ok(Flow::Normal)
    }

    fn exec_if(
        &mut self,
        init: Option<&'p Stmt>,
        cond: &'p Expr,
        then_branch: &'p [Stmt],
        else_branch: Option<&'p Stmt>,
    ) -> EvalResult<Flow<'p>> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        if self.eval_bool(cond)? {
            self.exec_block(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.exec_stmt(else_branch)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn exec_for(
        &mut self,
        init: Option<&'p Stmt>,
        cond: Option<&'p Expr>,
        post: Option<&'p Stmt>,
        body: &'p [Stmt],
    ) -> EvalResult<Flow<'p>> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.eval_bool(cond)? {
                    break;
                }
            }
            if let Flow::Return(values) = self.exec_block(body)? {
                return Ok(Flow::Return(values));
            }
            if let Some(post) = post {
                self.exec_stmt(post)?;
            }
            self.tick()?;
        }
        Ok(Flow::Normal)
    }

    // Assignment

    fn store(&mut self, target: &'p Expr, value: Value<'p>) -> EvalResult<()> {
        if let ExprKind::Ident(name) = target.kind {
            if self.interner.resolve(name).as_str() == "_" {
                return Ok(());
            }
        }

        let (root, path) = self.place(target)?;
        let result = match root.try_borrow_mut() {
            Ok(mut slot) => assign_at(&mut slot, &path, value),
            Err(_) => Err("assignment through an aliased value"),
        };
        result.map_err(|message| self.panic(message, target.span))
    }

    /// The variable an assignment target is rooted in and the path from it.
    fn place(&mut self, expr: &'p Expr) -> EvalResult<(Cell<'p>, Vec<Step>)> {
        match &expr.kind {
            ExprKind::Ident(name) => match self.lookup(*name, expr.span)? {
                Some(cell) => Ok((cell, vec![])),
                None => Err(self.undefined(self.interner.resolve(*name), expr.span)),
            },
            ExprKind::Selector {
                expr: base, field, ..
            } => {
                if let ExprKind::Ident(qualifier) = base.kind {
                    match self.qualifier(qualifier) {
                        Some(ImportTarget::Loaded(pkg)) => {
                            return Ok((self.global(pkg, *field, expr.span)?, vec![]))
                        }
                        Some(ImportTarget::External) => {
                            let what = "assignment to an external package";
                            return Err(self.unsupported(what, expr.span));
                        }
                        None => {}
                    }
                }
                let (root, mut path) = self.place(base)?;
                path.push(Step::Field(self.interner.resolve(*field)));
                Ok((root, path))
            }
            ExprKind::Index { expr: base, index } => {
                let index = self.eval(index)?;
                let Some(i) = index.as_int().and_then(|i| usize::try_from(i).ok()) else {
                    return Err(self.panic("index out of range", expr.span));
                };
                let (root, mut path) = self.place(base)?;
                path.push(Step::Index(i));
                Ok((root, path))
            }
            ExprKind::Unary {
                op: UnaryOp::Deref,
                operand,
            } => match self.eval(operand)? {
                Value::Pointer(Pointer {
                    target: Some(target),
                    ..
                }) => Ok((target, vec![])),
                Value::Pointer(_) => Err(self.nil_dereference(expr.span)),
                other => {
                    let what = format!("dereference of {}", other.type_name());
                    Err(self.unsupported(what, expr.span))
                }
            },
            _ => match self.eval(expr)? {
                // `New().Name = x` writes through the returned pointer.
                Value::Pointer(Pointer {
                    target: Some(target),
                    ..
                }) => Ok((target, vec![])),
                _ => Err(self.unsupported("assignment to this expression", expr.span)),
            },
        }
    }

    // Expressions

    fn eval(&mut self, expr: &'p Expr) -> EvalResult<Value<'p>> {
        self.eval_with(expr, None)
    }

    /// `hint` is the type an elided composite literal or an untyped
    /// constant takes on.
    fn eval_with(&mut self, expr: &'p Expr, hint: Option<&RtType<'p>>) -> EvalResult<Value<'p>> {
        match &expr.kind {
            ExprKind::Literal(lit) => {
                let value = self.literal(lit, expr.span)?;
                Ok(match hint {
                    Some(ty) => convert(value, ty),
                    None => value,
                })
            }
            ExprKind::Ident(name) => match self.lookup(*name, expr.span)? {
                Some(cell) => {
                    let value = cell.borrow().clone();
                    Ok(value)
                }
                None => Err(self.undefined(self.interner.resolve(*name), expr.span)),
            },
            ExprKind::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => Ok(Value::Bool(self.eval_bool(lhs)? && self.eval_bool(rhs)?)),
            ExprKind::Binary {
                op: BinOp::Or,
                lhs,
                rhs,
            } => Ok(Value::Bool(self.eval_bool(lhs)? || self.eval_bool(rhs)?)),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?;
                let rhs = self.eval(rhs)?;
                self.binary(*op, lhs, rhs, expr.span)
            }
            ExprKind::Unary { op, operand } => self.unary(*op, operand, expr.span),
            ExprKind::Call { callee, args } => {
                let mut values = self.eval_call(callee, args, expr.span)?;
                match values.len() {
                    1 => Ok(values.remove(0)),
                    n => {
                        let what = format!("{n}-valued call in single-value context");
                        Err(self.unsupported(what, expr.span))
                    }
                }
            }
            ExprKind::Selector {
                expr: base, field, ..
            } => self.select(base, *field, expr.span),
            ExprKind::Index { expr: base, index } => {
                let container = self.eval(base)?;
                let index = self.eval(index)?;
                self.index_value(container, index, expr.span)
            }
            ExprKind::Composite(lit) => {
                let ty = match (&lit.ty, hint) {
                    (Some(ty), _) => {
                        let scope = self.scope();
                        self.resolve(ty, scope)
                    }
                    (None, Some(hint)) => hint.clone(),
                    (None, None) => {
                        return Err(self.unsupported("composite literal without a type", lit.span))
                    }
                };
                self.composite(lit, &ty)
            }
            ExprKind::FuncLit { .. } => Err(self.unsupported("function literal", expr.span)),
            ExprKind::Opaque { .. } | ExprKind::Error => {
                let what = format!("expression `{}`", self.snippet(expr.span));
                Err(self.unsupported(what, expr.span))
            }
        }
    }

    /// Evaluate an expression list. A single call may yield several values.
    fn eval_list(&mut self, exprs: &'p [Expr]) -> EvalResult<Vec<Value<'p>>> {
        if let [expr] = exprs {
            if let ExprKind::Call { callee, args } = &expr.kind {
                return self.eval_call(callee, args, expr.span);
            }
        }
        exprs.iter().map(|expr| self.eval(expr)).collect()
    }

    fn eval_bool(&mut self, expr: &'p Expr) -> EvalResult<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => {
                let what = format!("non-boolean condition of type {}", other.type_name());
                Err(self.unsupported(what, expr.span))
            }
        }
    }

    fn literal(&self, lit: &Literal, span: Span) -> EvalResult<Value<'p>> {
        let value = match lit {
            Literal::Int(v) => match i64::try_from(*v) {
                Ok(v) => Value::int(v),
                Err(_) => return Err(self.panic("constant overflows int", span)),
            },
            Literal::Float(v) => Value::Float(*v, PrimitiveType::Float64),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Rune(c) => Value::Int(*c as i64, PrimitiveType::Int32),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Nil => Value::Nil,
        };
        Ok(value)
    }

    fn select(&mut self, base: &'p Expr, field: Symbol, span: Span) -> EvalResult<Value<'p>> {
        if let ExprKind::Ident(qualifier) = base.kind {
            match self.qualifier(qualifier) {
                Some(ImportTarget::Loaded(pkg)) => {
                    let cell = self.global(pkg, field, span)?;
                    let value = cell.borrow().clone();
                    return Ok(value);
                }
                Some(ImportTarget::External) => {
                    let what = format!(
                        "{}.{}",
                        self.interner.resolve(qualifier),
                        self.interner.resolve(field)
                    );
                    return Err(self.unsupported(what, span));
                }
                None => {}
            }
        }

        let value = self.eval(base)?;
        self.field_of(&value, &self.interner.resolve(field), span)
    }

    fn field_of(&self, value: &Value<'p>, name: &str, span: Span) -> EvalResult<Value<'p>> {
        match value {
            Value::Struct(st) => st
                .field(name)
                .cloned()
                .ok_or_else(|| self.undefined(name, span)),
            Value::Pointer(Pointer {
                target: Some(target),
                ..
            }) => self.field_of(&target.borrow(), name, span),
            Value::Pointer(Pointer { target: None, .. }) => Err(self.nil_dereference(span)),
            other => {
                let what = format!("selector .{name} on {}", other.type_name());
                Err(self.unsupported(what, span))
            }
        }
    }

    fn index_value(
        &self,
        container: Value<'p>,
        index: Value<'p>,
        span: Span,
    ) -> EvalResult<Value<'p>> {
        let Some(i) = index.as_int() else {
            let what = format!("index of type {}", index.type_name());
            return Err(self.unsupported(what, span));
        };
        let out_of_range = |len: usize| format!("index out of range [{i}] with length {len}");

        match container {
            Value::Slice(slice) => {
                let len = slice.items.len();
                usize::try_from(i)
                    .ok()
                    .and_then(|i| slice.items.into_iter().nth(i))
                    .ok_or_else(|| self.panic(out_of_range(len), span))
            }
            Value::String(s) => usize::try_from(i)
                .ok()
                .and_then(|i| s.as_bytes().get(i).copied())
                .map(|b| Value::Int(b as i64, PrimitiveType::Uint8))
                .ok_or_else(|| self.panic(out_of_range(s.len()), span)),
            Value::Pointer(Pointer {
                target: Some(target),
                ..
            }) => {
                let pointee = target.borrow().clone();
                self.index_value(pointee, index, span)
            }
            other => {
                let what = format!("indexing {}", other.type_name());
                Err(self.unsupported(what, span))
            }
        }
    }

    fn unary(&mut self, op: UnaryOp, operand: &'p Expr, span: Span) -> EvalResult<Value<'p>> {
        if op == UnaryOp::AddrOf {
            return self.address_of(operand, span);
        }

        let value = self.eval(operand)?;
        let result = match (op, value) {
            (UnaryOp::Deref, Value::Pointer(Pointer { target, .. })) => match target {
                Some(target) => {
                    let value = target.borrow().clone();
                    value
                }
                None => return Err(self.nil_dereference(span)),
            },
            (UnaryOp::Neg, Value::Int(v, p)) => Value::Int(wrap(v.wrapping_neg(), p), p),
            (UnaryOp::Neg, Value::Float(v, p)) => Value::Float(-v, p),
            (UnaryOp::Plus, value @ (Value::Int(..) | Value::Float(..))) => value,
            (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
            (UnaryOp::Xor, Value::Int(v, p)) => Value::Int(wrap(!v, p), p),
            (op, value) => {
                let what = format!("operator {op:?} on {}", value.type_name());
                return Err(self.unsupported(what, span));
            }
        };
        Ok(result)
    }

    fn address_of(&mut self, operand: &'p Expr, span: Span) -> EvalResult<Value<'p>> {
        match &operand.kind {
            ExprKind::Composite(_) => {
                let value = self.eval(operand)?;
                Ok(Value::new_pointer(rt_of(&value), value))
            }
            ExprKind::Ident(name) => match self.lookup(*name, operand.span)? {
                Some(cell) => {
                    let pointee = rt_of(&cell.borrow());
                    Ok(Value::Pointer(Pointer {
                        pointee,
                        target: Some(cell),
                    }))
                }
                None => Err(self.undefined(self.interner.resolve(*name), operand.span)),
            },
            _ => Err(self.unsupported("address of this expression", span)),
        }
    }

    fn binary(
        &self,
        op: BinOp,
        lhs: Value<'p>,
        rhs: Value<'p>,
        span: Span,
    ) -> EvalResult<Value<'p>> {
        if matches!(op, BinOp::Eq | BinOp::Ne) {
            let Some(eq) = lhs.equals(&rhs) else {
                let what = format!("comparison of {} and {}", lhs.type_name(), rhs.type_name());
                return Err(self.unsupported(what, span));
            };
            return Ok(Value::Bool(if op == BinOp::Eq { eq } else { !eq }));
        }

        let result = match (&lhs, &rhs) {
            (Value::Int(a, pa), Value::Int(b, pb)) => {
                // Untyped constants take the type of the other operand.
                let prim = if *pa == PrimitiveType::Int { *pb } else { *pa };
                self.int_op(op, *a, *b, prim, span)?
            }
            (Value::Float(a, p), Value::Float(b, _)) => float_op(op, *a, *b, *p),
            (Value::Float(a, p), Value::Int(b, _)) => float_op(op, *a, *b as f64, *p),
            (Value::Int(a, _), Value::Float(b, p)) => float_op(op, *a as f64, *b, *p),
            (Value::String(a), Value::String(b)) => match op {
                BinOp::Add => Some(Value::String(format!("{a}{b}"))),
                BinOp::Lt => Some(Value::Bool(a < b)),
                BinOp::Le => Some(Value::Bool(a <= b)),
                BinOp::Gt => Some(Value::Bool(a > b)),
                BinOp::Ge => Some(Value::Bool(a >= b)),
                _ => None,
            },
            (Value::Bool(a), Value::Bool(b)) => match op {
                BinOp::And => Some(Value::Bool(*a && *b)),
                BinOp::Or => Some(Value::Bool(*a || *b)),
                _ => None,
            },
            _ => None,
        };

        result.ok_or_else(|| {
            let what = format!(
                "operator {op:?} on {} and {}",
                lhs.type_name(),
                rhs.type_name()
            );
            self.unsupported(what, span)
        })
    }

    fn int_op(
        &self,
        op: BinOp,
        a: i64,
        b: i64,
        prim: PrimitiveType,
        span: Span,
    ) -> EvalResult<Option<Value<'p>>> {
        let int = |v: i64| -> Option<Value<'p>> { Some(Value::Int(wrap(v, prim), prim)) };
        let value = match op {
            BinOp::Add => int(a.wrapping_add(b)),
            BinOp::Sub => int(a.wrapping_sub(b)),
            BinOp::Mul => int(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Rem if b == 0 => {
                return Err(self.panic("integer divide by zero", span))
            }
            BinOp::Div => int(a.wrapping_div(b)),
            BinOp::Rem => int(a.wrapping_rem(b)),
            BinOp::BitAnd => int(a & b),
            BinOp::BitOr => int(a | b),
            BinOp::BitXor => int(a ^ b),
            BinOp::BitClear => int(a & !b),
            BinOp::Shl | BinOp::Shr if b < 0 => {
                return Err(self.panic("negative shift amount", span))
            }
            BinOp::Shl => int(if b >= 64 { 0 } else { a.wrapping_shl(b as u32) }),
            BinOp::Shr => int(if b >= 64 { a >> 63 } else { a >> b }),
            BinOp::Lt => Some(Value::Bool(a < b)),
            BinOp::Le => Some(Value::Bool(a <= b)),
            BinOp::Gt => Some(Value::Bool(a > b)),
            BinOp::Ge => Some(Value::Bool(a >= b)),
            BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or => None,
        };
        Ok(value)
    }

    // Composite literals

    fn composite(&mut self, lit: &'p CompositeLit, ty: &RtType<'p>) -> EvalResult<Value<'p>> {
        match ty {
            // `[]*T{{...}}` elides `&T`.
            RtType::Pointer(inner) if lit.ty.is_none() => {
                let value = self.composite(lit, inner)?;
                Ok(Value::new_pointer((**inner).clone(), value))
            }
            RtType::Struct(layout) => self.struct_literal(lit, layout),
            RtType::Slice(elem) => {
                let items = self.elements(lit, elem)?;
                Ok(Value::Slice(SliceValue {
                    elem: (**elem).clone(),
                    items,
                    len: None,
                }))
            }
            RtType::Array(elem, len) => {
                let mut items = self.elements(lit, elem)?;
                let len = match &lit.ty {
                    Some(Type::Array { len: None, .. }) => items.len(),
                    _ => *len,
                };
                if items.len() > len {
                    return Err(self.panic("array index out of bounds", lit.span));
                }
                while items.len() < len {
                    items.push(self.zero(elem));
                }
                Ok(Value::Slice(SliceValue {
                    elem: (**elem).clone(),
                    items,
                    len: Some(len),
                }))
            }
            _ => {
                let what = format!("composite literal of type {}", ty.display());
                Err(self.unsupported(what, lit.span))
            }
        }
    }

    fn elements(&mut self, lit: &'p CompositeLit, elem: &RtType<'p>) -> EvalResult<Vec<Value<'p>>> {
        let mut items = Vec::with_capacity(lit.elements.len());
        for element in &lit.elements {
            if element.key.is_some() {
                return Err(self.unsupported("indexed element", element.span));
            }
            let value = self.eval_with(&element.value, Some(elem))?;
            items.push(convert(value, elem));
        }
        Ok(items)
    }

    fn struct_literal(
        &mut self,
        lit: &'p CompositeLit,
        layout: &Rc<StructLayout<'p>>,
    ) -> EvalResult<Value<'p>> {
        let mut value = self.zero_struct(layout);

        for (i, element) in lit.elements.iter().enumerate() {
            let field = match &element.key {
                Some(ElementKey::Name { name, span }) => {
                    match layout.fields.iter().find(|f| f.symbol == *name) {
                        Some(field) => field,
                        None => return Err(self.undefined(self.interner.resolve(*name), *span)),
                    }
                }
                Some(ElementKey::Expr(key)) => {
                    return Err(self.unsupported("computed key in a struct literal", key.span))
                }
                None => match layout.fields.get(i) {
                    Some(field) => field,
                    None => {
                        let what = "too many values in struct literal";
                        return Err(self.unsupported(what, element.span));
                    }
                },
            };
            let ty = self.resolve(field.ty, field.scope);
            let field_value = self.eval_with(&element.value, Some(&ty))?;
            value.fields.insert(field.name.clone(), convert(field_value, &ty));
        }

        Ok(Value::Struct(value))
    }

    // Types and zero values

    fn resolve(&mut self, ty: &'p Type, scope: FileScope) -> RtType<'p> {
        self.resolve_at(ty, scope, 0)
    }

    fn resolve_at(&mut self, ty: &'p Type, scope: FileScope, depth: u8) -> RtType<'p> {
        if depth > MAX_TYPE_DEPTH {
            return RtType::Opaque("invalid recursive type".into());
        }

        match ty {
            Type::Primitive(prim) => RtType::Primitive(*prim),
            Type::Named(path) => match self.index.lookup_type(path, scope) {
                Some((decl_scope, TypeEntry::Struct(def))) => {
                    let key = (decl_scope.pkg, def.name);
                    if let Some(layout) = self.layouts.get(&key) {
                        return RtType::Struct(layout.clone());
                    }
                    let fields = self.field_layouts(&def.fields, decl_scope);
                    self.named_layout(key, fields)
                }
                Some((decl_scope, TypeEntry::Decl(decl))) => {
                    let underlying = self.resolve_at(&decl.ty, decl_scope, depth + 1);
                    match underlying {
                        RtType::Struct(layout) if !decl.is_alias => {
                            let key = (decl_scope.pkg, decl.name);
                            if let Some(layout) = self.layouts.get(&key) {
                                return RtType::Struct(layout.clone());
                            }
                            self.named_layout(key, layout.fields.clone())
                        }
                        other => other,
                    }
                }
                None => RtType::Opaque(display_type(self.interner, ty).into()),
            },
            Type::Pointer(inner) => {
                RtType::Pointer(Box::new(self.resolve_at(inner, scope, depth + 1)))
            }
            Type::Slice(inner) => RtType::Slice(Box::new(self.resolve_at(inner, scope, depth + 1))),
            Type::Array { inner, len } => {
                let elem = self.resolve_at(inner, scope, depth + 1);
                RtType::Array(Box::new(elem), len.unwrap_or(0) as usize)
            }
            Type::Struct(fields) => RtType::Struct(Rc::new(StructLayout {
                display: self.anonymous_display(fields).into(),
                named: None,
                fields: self.field_layouts(fields, scope),
            })),
            Type::Map { .. } => RtType::Opaque(display_type(self.interner, ty).into()),
            Type::Opaque(text) => RtType::Opaque(text.clone()),
            Type::Error => RtType::Opaque("invalid type".into()),
        }
    }

    fn named_layout(
        &mut self,
        key: (PackageId, Symbol),
        fields: Vec<FieldLayout<'p>>,
    ) -> RtType<'p> {
        let package = self.index.program().package(key.0);
        let display = format!(
            "{}.{}",
            self.interner.resolve(package.name),
            self.interner.resolve(key.1)
        );
        let layout = Rc::new(StructLayout {
            display: display.into(),
            named: Some(key),
            fields,
        });
        self.layouts.insert(key, layout.clone());
        RtType::Struct(layout)
    }

    fn field_layouts(&self, fields: &'p [Field], scope: FileScope) -> Vec<FieldLayout<'p>> {
        fields
            .iter()
            .map(|field| FieldLayout {
                name: self.interner.resolve(field.name),
                symbol: field.name,
                embedded: field.embedded,
                ty: &field.ty,
                scope,
            })
            .collect()
    }

    /// `struct { Name string; ID int }`, the way `%T` prints it.
    fn anonymous_display(&self, fields: &[Field]) -> String {
        let parts: Vec<String> = fields
            .iter()
            .map(|field| {
                let ty = display_type(self.interner, &field.ty);
                if field.embedded {
                    ty
                } else {
                    format!("{} {ty}", self.interner.resolve(field.name))
                }
            })
            .collect();
        if parts.is_empty() {
            "struct {}".to_string()
        } else {
            format!("struct {{ {} }}", parts.join("; "))
        }
    }

    fn zero(&mut self, ty: &RtType<'p>) -> Value<'p> {
        match ty {
            RtType::Primitive(prim) => zero_primitive(*prim),
            RtType::Struct(layout) => Value::Struct(self.zero_struct(layout)),
            RtType::Pointer(inner) => Value::Pointer(Pointer {
                pointee: (**inner).clone(),
                target: None,
            }),
            RtType::Slice(elem) => Value::Slice(SliceValue {
                elem: (**elem).clone(),
                items: vec![],
                len: None,
            }),
            RtType::Array(elem, len) => {
                let mut items = Vec::with_capacity(*len);
                for _ in 0..*len {
                    items.push(self.zero(elem));
                }
                Value::Slice(SliceValue {
                    elem: (**elem).clone(),
                    items,
                    len: Some(*len),
                })
            }
            RtType::Opaque(_) => Value::Nil,
        }
    }

    fn zero_struct(&mut self, layout: &Rc<StructLayout<'p>>) -> StructValue<'p> {
        let mut fields = IndexMap::with_capacity(layout.fields.len());
        for field in &layout.fields {
            let ty = self.resolve(field.ty, field.scope);
            let zero = self.zero(&ty);
            fields.insert(field.name.clone(), zero);
        }
        StructValue {
            layout: layout.clone(),
            fields,
        }
    }

    // Variables

    fn scope(&self) -> FileScope {
        self.frames.last().map_or(
            FileScope {
                pkg: PackageId(0),
                file: 0,
            },
            |frame| frame.scope,
        )
    }

    fn push_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.push(FxHashMap::default());
        }
    }

    fn pop_scope(&mut self) {
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.pop();
        }
    }

    fn declare(&mut self, name: Symbol, value: Value<'p>) {
        if self.interner.resolve(name).as_str() == "_" {
            return;
        }
        if let Some(scope) = self.frames.last_mut().and_then(|f| f.locals.last_mut()) {
            scope.insert(name, Rc::new(RefCell::new(value)));
        }
    }

    fn local(&self, name: Symbol) -> Option<Cell<'p>> {
        self.frames
            .last()?
            .locals
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .cloned()
    }

    /// A variable declared in the innermost block, which `:=` reassigns.
    fn innermost(&self, name: Symbol) -> Option<Cell<'p>> {
        self.frames.last()?.locals.last()?.get(&name).cloned()
    }

    fn named_results(&self) -> Vec<Value<'p>> {
        let Some(frame) = self.frames.last() else {
            return vec![];
        };
        frame
            .results
            .iter()
            .filter_map(|&name| self.local(name))
            .map(|cell| cell.borrow().clone())
            .collect()
    }

    fn lookup(&mut self, name: Symbol, span: Span) -> EvalResult<Option<Cell<'p>>> {
        if let Some(cell) = self.local(name) {
            return Ok(Some(cell));
        }
        let pkg = self.scope().pkg;
        if self.index.var(pkg, name).is_some() {
            return self.global(pkg, name, span).map(Some);
        }
        Ok(None)
    }

    /// If `name` is an import here, the package it refers to.
    fn qualifier(&self, name: Symbol) -> Option<ImportTarget> {
        let scope = self.scope();
        if self.local(name).is_some() || self.index.declares(scope.pkg, name) {
            return None;
        }
        self.index.import(scope, name)
    }

    /// A package-level variable, initialized on first use.
    fn global(&mut self, pkg: PackageId, name: Symbol, span: Span) -> EvalResult<Cell<'p>> {
        if let Some(cell) = self.globals.get(&(pkg, name)) {
            return Ok(cell.clone());
        }
        let Some(entry) = self.index.var(pkg, name) else {
            return Err(self.undefined(self.interner.resolve(name), span));
        };
        if !self.initializing.insert((pkg, name)) {
            let message = format!("initialization cycle at {}", self.interner.resolve(name));
            return Err(self.panic(message, span));
        }

        let result = self.init_global(pkg, entry);
        self.initializing.remove(&(pkg, name));
        result?;

        match self.globals.get(&(pkg, name)) {
            Some(cell) => Ok(cell.clone()),
            None => Err(self.undefined(self.interner.resolve(name), span)),
        }
    }

    fn init_global(&mut self, pkg: PackageId, entry: VarEntry<'p>) -> EvalResult<()> {
        tracing::trace!(
            package = %self.index.program().package(pkg).path,
            "initializing package variables"
        );
        self.frames.push(Frame {
            scope: entry.scope,
            locals: vec![FxHashMap::default()],
            results: vec![],
        });
        let values = self.global_values(entry.def, entry.scope);
        self.frames.pop();

        for (&name, value) in entry.def.names.iter().zip(values?) {
            self.globals.insert((pkg, name), Rc::new(RefCell::new(value)));
        }
        Ok(())
    }

    fn global_values(&mut self, def: &'p VarDef, scope: FileScope) -> EvalResult<Vec<Value<'p>>> {
        let ty = def.ty.as_ref().map(|ty| self.resolve(ty, scope));
        let values = if def.values.is_empty() {
            let mut zeros = Vec::with_capacity(def.names.len());
            for _ in &def.names {
                zeros.push(match &ty {
                    Some(ty) => self.zero(ty),
                    None => Value::Nil,
                });
            }
            zeros
        } else {
            self.eval_list(&def.values)?
        };
        if values.len() != def.names.len() {
            return Err(self.unsupported("assignment count mismatch", def.span));
        }
        Ok(values
            .into_iter()
            .map(|value| match &ty {
                Some(ty) => convert(value, ty),
                None => value,
            })
            .collect())
    }

    // Errors

    fn src(&self, span: Span) -> NamedSource<String> {
        match self.sources.get(span.source) {
            Some(file) => file.named_source(),
            None => NamedSource::new("<unknown>", String::new()),
        }
    }

    /// First line of the source text under `span`.
    fn snippet(&self, span: Span) -> String {
        let Some(file) = self.sources.get(span.source) else {
            return String::new();
        };
        let text = file
            .content
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default();
        text.lines().next().unwrap_or_default().trim().to_string()
    }

    fn unsupported(&self, what: impl Into<String>, span: Span) -> EvalError {
        EvalError::Unsupported {
            what: what.into(),
            src: self.src(span),
            span: span.into(),
        }
    }

    fn undefined(&self, name: impl Into<String>, span: Span) -> EvalError {
        EvalError::Undefined {
            name: name.into(),
            src: self.src(span),
            span: span.into(),
        }
    }

    fn panic(&self, message: impl Into<String>, span: Span) -> EvalError {
        EvalError::Panic {
            message: message.into(),
            src: self.src(span),
            span: span.into(),
        }
    }

    fn nil_dereference(&self, span: Span) -> EvalError {
        self.panic("invalid memory address or nil pointer dereference", span)
    }
}

fn assign_at<'p>(
    slot: &mut Value<'p>,
    path: &[Step],
    value: Value<'p>,
) -> Result<(), &'static str> {
    let Some((step, rest)) = path.split_first() else {
        let retagged = retag(slot, value);
        *slot = retagged;
        return Ok(());
    };

    match (slot, step) {
        (
            Value::Pointer(Pointer {
                target: Some(target),
                ..
            }),
            _,
        ) => {
            let mut inner = target
                .try_borrow_mut()
                .map_err(|_| "assignment through an aliased value")?;
            assign_at(&mut inner, path, value)
        }
        (Value::Pointer(Pointer { target: None, .. }), _) => {
            Err("invalid memory address or nil pointer dereference")
        }
        (Value::Struct(st), Step::Field(name)) => match st.field_mut(name) {
            Some(field) => assign_at(field, rest, value),
            None => Err("assignment to a missing field"),
        },
        (Value::Slice(slice), Step::Index(i)) => match slice.items.get_mut(*i) {
            Some(item) => assign_at(item, rest, value),
            None => Err("index out of range"),
        },
        _ => Err("assignment through a value that is not addressable"),
    }
}

/// Keep the declared type of a variable when a value of the same kind is
/// assigned to it.
fn retag<'p>(old: &Value<'p>, new: Value<'p>) -> Value<'p> {
    match (old, new) {
        (Value::Int(_, prim), Value::Int(v, _)) => Value::Int(wrap(v, *prim), *prim),
        (Value::Float(_, prim), Value::Int(v, _)) => Value::Float(v as f64, *prim),
        (Value::Float(_, prim), Value::Float(v, _)) => Value::Float(v, *prim),
        (Value::Pointer(old), Value::Nil) => Value::Pointer(Pointer {
            pointee: old.pointee.clone(),
            target: None,
        }),
        (Value::Slice(old), Value::Nil) => Value::Slice(SliceValue {
            elem: old.elem.clone(),
            items: vec![],
            len: None,
        }),
        (_, new) => new,
    }
}

/// Give an untyped constant or `nil` the type it is assigned to.
fn convert<'p>(value: Value<'p>, ty: &RtType<'p>) -> Value<'p> {
    match (value, ty) {
        (Value::Int(v, _), RtType::Primitive(p)) if p.is_integer() => Value::Int(wrap(v, *p), *p),
        (Value::Int(v, _), RtType::Primitive(p)) if p.is_float() => Value::Float(v as f64, *p),
        (Value::Float(v, _), RtType::Primitive(p)) if p.is_float() => Value::Float(v, *p),
        (Value::Nil, RtType::Pointer(inner)) => Value::Pointer(Pointer {
            pointee: (**inner).clone(),
            target: None,
        }),
        (Value::Nil, RtType::Slice(elem)) => Value::Slice(SliceValue {
            elem: (**elem).clone(),
            items: vec![],
            len: None,
        }),
        (value, _) => value,
    }
}

/// Truncate to the width of `prim`.
fn wrap(v: i64, prim: PrimitiveType) -> i64 {
    match prim {
        PrimitiveType::Int8 => v as i8 as i64,
        PrimitiveType::Int16 => v as i16 as i64,
        PrimitiveType::Int32 => v as i32 as i64,
        PrimitiveType::Uint8 => v as u8 as i64,
        PrimitiveType::Uint16 => v as u16 as i64,
        PrimitiveType::Uint32 => v as u32 as i64,
        _ => v,
    }
}

fn float_op<'p>(op: BinOp, a: f64, b: f64, prim: PrimitiveType) -> Option<Value<'p>> {
    let value = match op {
        BinOp::Add => Value::Float(a + b, prim),
        BinOp::Sub => Value::Float(a - b, prim),
        BinOp::Mul => Value::Float(a * b, prim),
        BinOp::Div => Value::Float(a / b, prim),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        _ => return None,
    };
    Some(value)
}

fn zero_primitive<'p>(prim: PrimitiveType) -> Value<'p> {
    match prim {
        PrimitiveType::Bool => Value::Bool(false),
        PrimitiveType::String => Value::String(String::new()),
        p if p.is_integer() => Value::Int(0, p),
        p => Value::Float(0.0, p),
    }
}

/// The static type of a value, for pointers created by `&`.
fn rt_of<'p>(value: &Value<'p>) -> RtType<'p> {
    match value {
        Value::Bool(_) => RtType::Primitive(PrimitiveType::Bool),
        Value::Int(_, p) | Value::Float(_, p) => RtType::Primitive(*p),
        Value::String(_) => RtType::Primitive(PrimitiveType::String),
        Value::Struct(st) => RtType::Struct(st.layout.clone()),
        Value::Pointer(ptr) => RtType::Pointer(Box::new(ptr.pointee.clone())),
        Value::Slice(slice) => match slice.len {
            Some(len) => RtType::Array(Box::new(slice.elem.clone()), len),
            None => RtType::Slice(Box::new(slice.elem.clone())),
        },
        Value::Nil => RtType::Opaque("nil".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"
package users

import "fmt"

const Version = "1.0"

type User struct {
    Name     string
    ID       int
    password string
}

func New(name string) *User {
    return &User{Name: name, password: "changeme"}
}

func Demo() {
    u := User{Name: "a", ID: 1, password: "b"}
    fmt.Printf("%+v\n", u)
}

func (u *User) Check(p string) bool { return u.password == p }

func (u *User) SetName(name string) { u.Name = name }

func (u User) Rename(name string) User {
    u.Name = name
    return u
}
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

        fn run(&self) -> EvalResult<String> {
            self.run_with_limit(DEFAULT_STEP_LIMIT)
        }

        fn run_with_limit(&self, limit: u64) -> EvalResult<String> {
            let mut out = Vec::new();
            Interpreter::new(&self.program, &self.sources, &self.interner, &mut out)
                .with_step_limit(limit)
                .run_main()?;
            Ok(String::from_utf8(out).unwrap())
        }
    }

    fn with_users(main: &str) -> Fixture {
        Fixture::new(&[
            ("example.com/demo/users", "users.go", USERS),
            ("example.com/demo", "main.go", main),
        ])
    }

    fn run_program(main: &str) -> String {
        with_users(main).run().unwrap()
    }

    fn run_err(main: &str) -> EvalError {
        with_users(main).run().unwrap_err()
    }

    #[test]
    fn test_scenario_b_omitted_private_field_prints_zero() {
        let out = run_program(
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
        insta::assert_snapshot!(out.trim_end(), @r#"User: users.User{Name:"doej", ID:101, password:""}"#);
    }

    #[test]
    fn test_scenario_c_literal_inside_declaring_package() {
        let out = run_program(
            r#"
package main

import "example.com/demo/users"

func main() {
    users.Demo()
}
"#,
        );
        assert_eq!(out, "{Name:a ID:1 password:b}\n");
    }

    #[test]
    fn test_pointer_receiver_methods() {
        let out = run_program(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    u := users.New("doej")
    fmt.Println(u.Check("changeme"), u.Check("x"))
    u.SetName("jane")
    fmt.Println(u.Name)
    fmt.Printf("%v\n", u)
}
"#,
        );
        assert_eq!(out, "true false\njane\n&{jane 0 changeme}\n");
    }

    #[test]
    fn test_value_receiver_gets_a_copy() {
        let out = run_program(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    u := users.User{Name: "a"}
    v := u.Rename("b")
    fmt.Println(u.Name, v.Name)

    // Pointer methods on an addressable variable change the variable.
    u.SetName("c")
    fmt.Println(u.Name)
}
"#,
        );
        assert_eq!(out, "a b\nc\n");
    }

    #[test]
    fn test_control_flow_and_multiple_results() {
        let out = run_program(
            r#"
package main

import "fmt"

func divmod(a, b int) (q, r int) {
    q = a / b
    r = a % b
    return
}

func main() {
    sum := 0
    for i := 1; i <= 10; i++ {
        if i%2 == 0 {
            sum += i
        } else if i == 5 {
            sum -= 100
        } else {
            sum *= 1
        }
    }
    q, r := divmod(17, 5)
    n := 3
    for n > 0 {
        n--
    }
    fmt.Println(sum, q, r, n)
}
"#,
        );
        assert_eq!(out, "-70 3 2 0\n");
    }

    #[test]
    fn test_slices_and_arrays() {
        let out = run_program(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    list := []users.User{{Name: "a"}, {Name: "b"}}
    list = append(list, users.User{Name: "c"})
    list[1] = list[2]
    list[0].ID = 7
    fmt.Println(len(list), list)

    ptrs := []*users.User{{Name: "p"}}
    fmt.Println(ptrs[0].Name)

    arr := [...]int{1, 2, 3}
    arr[0] = 9
    var zeros [2]string
    fmt.Println(arr, len(arr), len(zeros))
}
"#,
        );
        assert_eq!(out, "3 [{a 7 } {c 0 } {c 0 }]\np\n[9 2 3] 3 2\n");
    }

    #[test]
    fn test_promoted_fields() {
        let out = run_program(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

type Admin struct {
    users.User
    Level int
}

func main() {
    a := Admin{Level: 2}
    a.Name = "root"
    fmt.Printf("%+v %s\n", a, a.Name)
}
"#,
        );
        assert_eq!(out, "{User:{Name:root ID:0 password:} Level:2} root\n");
    }

    #[test]
    fn test_zero_values() {
        let out = run_program(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    var n int
    var s []string
    var p *users.User
    fmt.Println(n, s, p)
    fmt.Printf("%#v %T\n", p, p)
    fmt.Println(p == nil, users.Version)
}
"#,
        );
        assert_eq!(out, "0 [] <nil>\n(*users.User)(nil) *users.User\ntrue 1.0\n");
    }

    #[test]
    fn test_sized_integers_wrap() {
        let out = run_program(
            r#"
package main

import "fmt"

func main() {
    var x int8 = 127
    x++
    var b byte = 255
    b += 2
    fmt.Println(x, b)
}
"#,
        );
        assert_eq!(out, "-128 1\n");
    }

    #[test]
    fn test_package_vars_initialize_in_dependency_order() {
        let out = run_program(
            r#"
package main

import "fmt"

var greeting = "hi " + name

var name = "gopher"

func main() {
    fmt.Println(greeting)
    name = "there"
    fmt.Print(fmt.Sprintf("%d-%s", len(name), name), "\n")
}
"#,
        );
        assert_eq!(out, "hi gopher\n5-there\n");
    }

    #[test]
    fn test_missing_main() {
        let err = run_err(
            r#"
package main

func helper() {}
"#,
        );
        assert!(matches!(err, EvalError::MissingMain));

        let fixture = Fixture::new(&[("example.com/demo/users", "users.go", "package users\n")]);
        assert!(matches!(fixture.run(), Err(EvalError::NoMainPackage)));
    }

    #[test]
    fn test_unsupported_statement() {
        let err = run_err(
            r#"
package main

func main() {
    x := 1
    switch x {
    case 1:
    }
}
"#,
        );
        assert!(matches!(err, EvalError::Unsupported { .. }));
        insta::assert_snapshot!(err.to_string(), @"unsupported: statement `switch x {`");
    }

    #[test]
    fn test_runtime_panics() {
        let err = run_err(
            r#"
package main

import "fmt"

func main() {
    a := 0
    fmt.Println(1 / a)
}
"#,
        );
        assert_eq!(err.to_string(), "runtime error: integer divide by zero");

        let err = run_err(
            r#"
package main

import (
    "fmt"

    "example.com/demo/users"
)

func main() {
    var p *users.User
    fmt.Println(p.Name)
}
"#,
        );
        assert_eq!(
            err.to_string(),
            "runtime error: invalid memory address or nil pointer dereference"
        );

        let err = run_err(
            r#"
package main

func main() {
    panic("boom")
}
"#,
        );
        assert!(matches!(err, EvalError::UserPanic { .. }));
        assert_eq!(err.to_string(), "panic: boom");
    }

    #[test]
    fn test_step_limit() {
        let fixture = with_users(
            r#"
package main

func main() {
    for {
    }
}
"#,
        );
        let err = fixture.run_with_limit(1000).unwrap_err();
        assert!(matches!(err, EvalError::StepLimit(1000)));
    }
}
