#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::mem;

use quantel_ast::{
    Assign, BinOp, Block, CmpOp, DeclType, Expr, ExprKind, ForStmt, FuncDecl, Ident, Index,
    Literal, Loc, PointerDecl, Program, RecordDecl, ReturnStmt, Stmt, TypeSpec, UnaryOp, VarDecl,
};

use crate::error::SemanticError;
use crate::types::{shape_display, Family, Shape, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Variable,
    Function,
    Record,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Variable => "variable",
            Category::Function => "function",
            Category::Record => "record",
        }
    }
}

/// A record field or a function parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Type,
    pub shape: Option<Shape>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: String,
    /// Value type; the return type for functions.
    pub ty: Type,
    /// `None` when the extent cannot be known statically.
    pub shape: Option<Shape>,
    pub category: Category,
    pub initialized: bool,
    /// Record fields in declaration order.
    pub fields: Vec<Field>,
    /// Function parameters in declaration order.
    pub params: Vec<Field>,
    pub line: usize,
}

impl Symbol {
    fn variable(name: &Ident, ty: Type, shape: Option<Shape>, initialized: bool) -> Self {
        Self {
            name: name.node.clone(),
            ty,
            shape,
            category: Category::Variable,
            initialized,
            fields: Vec::new(),
            params: Vec::new(),
            line: name.loc.line,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn shape_text(&self) -> String {
        match &self.shape {
            Some(shape) => shape_display(shape),
            None => "unknown".to_string(),
        }
    }
}

/// Everything one analysis run produced.
#[derive(Debug)]
pub struct AnalysisReport {
    pub errors: Vec<SemanticError>,
    /// Every symbol ever defined, in definition order.
    pub symbols: Vec<Symbol>,
}

impl AnalysisReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn diagnostics(&self) -> Vec<quantel_ast::Diagnostic> {
        self.errors.iter().map(SemanticError::diagnostic).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Inferred {
    ty: Type,
    shape: Option<Shape>,
}

impl Inferred {
    fn unknown() -> Self {
        Self {
            ty: Type::Unknown,
            shape: None,
        }
    }

    fn scalar(ty: Type) -> Self {
        Self {
            ty,
            shape: Some(Vec::new()),
        }
    }
}

#[derive(Clone, Debug)]
struct FnContext {
    name: String,
    ret: Inferred,
}

/// Scope, type and shape checker.
///
/// Records and functions are hoisted into the global scope before the main
/// walk, so they may be used ahead of their declaration. Errors accumulate;
/// the walk never stops early.
pub struct Analyzer {
    scopes: Vec<HashMap<String, Symbol>>,
    history: Vec<Symbol>,
    errors: Vec<SemanticError>,
    // Hoisted function signatures keyed by declaration offset.
    signatures: HashMap<usize, Symbol>,
    functions: Vec<FnContext>,
    loop_depth: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
            history: Vec::new(),
            errors: Vec::new(),
            signatures: HashMap::new(),
            functions: Vec::new(),
            loop_depth: 0,
        }
    }

    pub fn analyze_program(mut self, program: &Program) -> AnalysisReport {
        self.hoist_declarations(&program.stmts);
        for stmt in &program.stmts {
            self.check_stmt(stmt);
        }
        AnalysisReport {
            errors: self.errors,
            symbols: self.history,
        }
    }

    fn hoist_declarations(&mut self, stmts: &[Stmt]) {
        let mut records = Vec::new();
        let mut funcs = Vec::new();
        collect_decls(stmts, &mut records, &mut funcs);

        // Names first, so record fields may refer to any record.
        let mut accepted = Vec::new();
        for rec in records {
            if self.scopes[0].contains_key(&rec.name.node) {
                self.error(rec.name.loc, format!("'{}' is already defined in this scope", rec.name.node));
                continue;
            }
            let sym = Symbol {
                name: rec.name.node.clone(),
                ty: Type::Record(rec.name.node.clone()),
                shape: None,
                category: Category::Record,
                initialized: true,
                fields: Vec::new(),
                params: Vec::new(),
                line: rec.name.loc.line,
            };
            self.scopes[0].insert(sym.name.clone(), sym);
            accepted.push(rec);
        }
        for rec in accepted {
            let fields = self.resolve_fields(rec);
            if let Some(sym) = self.scopes[0].get_mut(&rec.name.node) {
                sym.fields = fields;
                self.history.push(sym.clone());
            }
        }

        for func in funcs {
            let params = func
                .params
                .iter()
                .map(|p| {
                    let resolved = self.resolve_type_spec(&p.ty);
                    Field {
                        name: p.name.node.clone(),
                        ty: resolved.ty,
                        shape: resolved.shape,
                    }
                })
                .collect();
            let ret = self.resolve_type_spec(&func.ret);
            let sym = Symbol {
                name: func.name.node.clone(),
                ty: ret.ty,
                shape: ret.shape,
                category: Category::Function,
                initialized: true,
                fields: Vec::new(),
                params,
                line: func.name.loc.line,
            };
            self.signatures.insert(func.loc.span.offset(), sym.clone());
            self.define(sym, func.name.loc);
        }
    }

    fn resolve_fields(&mut self, rec: &RecordDecl) -> Vec<Field> {
        let mut fields: Vec<Field> = Vec::new();
        for decl in &rec.fields {
            let resolved = match &decl.ty {
                DeclType::Spec(spec) => self.resolve_type_spec(spec),
                DeclType::Auto => Inferred::unknown(),
            };
            if fields.iter().any(|f| f.name == decl.name.node) {
                self.error(
                    decl.name.loc,
                    format!("duplicate field '{}' in record '{}'", decl.name.node, rec.name.node),
                );
                continue;
            }
            fields.push(Field {
                name: decl.name.node.clone(),
                ty: resolved.ty,
                shape: resolved.shape,
            });
        }
        fields
    }

    fn resolve_type_spec(&mut self, spec: &TypeSpec) -> Inferred {
        match spec {
            TypeSpec::Builtin { dtype, shape } => Inferred {
                ty: Type::from_dtype(*dtype),
                shape: Some(shape.dims.clone()),
            },
            TypeSpec::Record(name) => match self.lookup(&name.node).map(|s| s.category) {
                Some(Category::Record) => Inferred {
                    ty: Type::Record(name.node.clone()),
                    shape: None,
                },
                Some(other) => {
                    self.error(
                        name.loc,
                        format!("'{}' is a {}, not a record type", name.node, other.name()),
                    );
                    Inferred::unknown()
                }
                None => {
                    self.error(name.loc, format!("unknown record type '{}'", name.node));
                    Inferred::unknown()
                }
            },
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => self.check_block(block),
            Stmt::VarDecl(decl) => self.check_var_decl(decl),
            Stmt::PointerDecl(decl) => self.check_pointer_decl(decl),
            Stmt::RecordDecl(rec) => self.check_record_inits(rec),
            Stmt::FuncDecl(func) => self.check_func(func),
            Stmt::Assign(assign) => self.check_assign(assign),
            Stmt::If(s) => {
                self.check_condition(&s.cond);
                self.check_block(&s.then_block);
                if let Some(else_block) = &s.else_block {
                    self.check_block(else_block);
                }
            }
            Stmt::While(s) => {
                self.check_condition(&s.cond);
                self.loop_depth += 1;
                self.check_block(&s.body);
                self.loop_depth -= 1;
            }
            Stmt::RepeatUntil(s) => {
                self.loop_depth += 1;
                self.check_block(&s.body);
                self.loop_depth -= 1;
                self.check_condition(&s.cond);
            }
            Stmt::For(s) => self.check_for(s),
            Stmt::Return(r) => self.check_return(r),
            Stmt::Break(loc) => {
                if self.loop_depth == 0 {
                    self.error(*loc, "'break' outside of a loop");
                }
            }
            Stmt::Continue(loc) => {
                if self.loop_depth == 0 {
                    self.error(*loc, "'continue' outside of a loop");
                }
            }
            Stmt::Probe(p) => {
                self.infer(&p.expr);
            }
            Stmt::Expr(e) => {
                self.infer(e);
            }
        }
    }

    fn check_block(&mut self, block: &Block) {
        self.push_scope();
        for stmt in &block.stmts {
            self.check_stmt(stmt);
        }
        self.pop_scope();
    }

    fn check_condition(&mut self, cond: &Expr) {
        let inferred = self.infer(cond);
        if let Some(Family::String | Family::Record | Family::Void | Family::Pointer) = inferred.ty.family() {
            self.error(
                cond.loc,
                format!("condition must be boolean or numeric, found {}", inferred.ty.display()),
            );
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) {
        let init = decl.init.as_ref().map(|e| self.infer(e));
        let what = format!("declaration of '{}'", decl.name.node);

        let declared = match &decl.ty {
            DeclType::Auto => {
                let inferred = init.clone().unwrap_or_else(Inferred::unknown);
                if inferred.ty == Type::Void {
                    self.error(decl.loc, format!("{what}: initializer produces no value"));
                }
                inferred
            }
            DeclType::Spec(spec) => {
                let declared = self.resolve_type_spec(spec);
                if let (Some(value), Some(expr)) = (&init, &decl.init) {
                    self.check_store(&what, &declared, value, expr.loc, true);
                }
                declared
            }
        };

        let sym = Symbol::variable(&decl.name, declared.ty, declared.shape, init.is_some());
        self.define(sym, decl.name.loc);
    }

    fn check_pointer_decl(&mut self, decl: &PointerDecl) {
        match self.lookup(&decl.target.node).map(|s| s.category) {
            None => self.error(
                decl.target.loc,
                format!("undefined pointer target '{}'", decl.target.node),
            ),
            Some(Category::Variable) => {}
            Some(other) => self.error(
                decl.target.loc,
                format!("pointer target '{}' is a {}, not a variable", decl.target.node, other.name()),
            ),
        }
        let ty = Type::Pointer(Box::new(Type::from_dtype(decl.dtype)));
        let sym = Symbol::variable(&decl.name, ty, Some(decl.shape.dims.clone()), true);
        self.define(sym, decl.name.loc);
    }

    fn check_record_inits(&mut self, rec: &RecordDecl) {
        let fields = self
            .lookup(&rec.name.node)
            .filter(|s| s.category == Category::Record)
            .map(|s| s.fields.clone())
            .unwrap_or_default();

        for decl in &rec.fields {
            let Some(init) = &decl.init else {
                continue;
            };
            let value = self.infer(init);
            if let Some(field) = fields.iter().find(|f| f.name == decl.name.node) {
                let slot = Inferred {
                    ty: field.ty.clone(),
                    shape: field.shape.clone(),
                };
                let what = format!("field '{}' of record '{}'", decl.name.node, rec.name.node);
                self.check_store(&what, &slot, &value, init.loc, true);
            }
        }
    }

    fn check_func(&mut self, func: &FuncDecl) {
        let Some(sig) = self.signatures.get(&func.loc.span.offset()).cloned() else {
            return;
        };

        self.push_scope();
        for (param, field) in func.params.iter().zip(&sig.params) {
            let sym = Symbol::variable(&param.name, field.ty.clone(), field.shape.clone(), true);
            self.define(sym, param.name.loc);
        }
        self.functions.push(FnContext {
            name: sig.name.clone(),
            ret: Inferred {
                ty: sig.ty.clone(),
                shape: sig.shape.clone(),
            },
        });
        // Loops around a declaration do not extend into its body.
        let saved_loops = mem::take(&mut self.loop_depth);

        for stmt in &func.body.stmts {
            self.check_stmt(stmt);
        }

        self.loop_depth = saved_loops;
        self.functions.pop();
        self.pop_scope();
    }

    fn check_assign(&mut self, assign: &Assign) {
        let value = self.infer(&assign.value);

        let target = match &assign.target.kind {
            ExprKind::Ident(id) => match self.lookup(&id.node).map(|s| (s.category, s.ty.clone(), s.shape.clone())) {
                Some((Category::Variable, ty, shape)) => Inferred { ty, shape },
                Some((other, _, _)) => {
                    self.error(id.loc, format!("cannot assign to {} '{}'", other.name(), id.node));
                    return;
                }
                None => {
                    self.error_with_hint(
                        id.loc,
                        format!("assignment to undeclared variable '{}'", id.node),
                        format!("declare it first, e.g. 'auto {} = ...;'", id.node),
                    );
                    return;
                }
            },
            _ => self.infer(&assign.target),
        };

        let what = format!("assignment to '{}'", assign.target.root_name().unwrap_or("value"));
        match assign.op.binary() {
            None => self.check_store(&what, &target, &value, assign.value.loc, false),
            Some(op) => {
                let result = self.binary_result(op, &target, &value, assign.loc);
                self.check_store(&what, &target, &result, assign.loc, false);
            }
        }

        if let ExprKind::Ident(id) = &assign.target.kind {
            if let Some(sym) = self.lookup_mut(&id.node) {
                sym.initialized = true;
            }
        }
    }

    fn check_for(&mut self, s: &ForStmt) {
        let bounds = [Some(&s.range.start), Some(&s.range.end), s.range.step.as_ref()];
        for bound in bounds.into_iter().flatten() {
            let inferred = self.infer(bound);
            if let Some(family) = inferred.ty.family() {
                if family != Family::Integer {
                    self.error(
                        bound.loc,
                        format!("range bounds must be integers, found {}", inferred.ty.display()),
                    );
                }
            }
        }

        self.push_scope();
        self.define(Symbol::variable(&s.var, Type::Int32, Some(Vec::new()), true), s.var.loc);
        self.loop_depth += 1;
        for stmt in &s.body.stmts {
            self.check_stmt(stmt);
        }
        self.loop_depth -= 1;
        self.pop_scope();
    }

    fn check_return(&mut self, ret: &ReturnStmt) {
        let value = ret.value.as_ref().map(|v| (v.loc, self.infer(v)));
        let Some(ctx) = self.functions.last().cloned() else {
            self.error(ret.loc, "'return' outside of a function");
            return;
        };
        match value {
            Some((loc, inferred)) => {
                let what = format!("return from '{}'", ctx.name);
                self.check_store(&what, &ctx.ret, &inferred, loc, false);
            }
            None => self.error(
                ret.loc,
                format!("'{}' must return a value of type {}", ctx.name, ctx.ret.ty.display()),
            ),
        }
    }

    /// Type and shape compatibility of storing `value` into `slot`. A scalar
    /// fills a larger shape only when `broadcast` is set (declarations).
    fn check_store(&mut self, what: &str, slot: &Inferred, value: &Inferred, loc: Loc, broadcast: bool) {
        if !slot.ty.accepts(&value.ty) {
            self.error(
                loc,
                format!(
                    "type mismatch in {what}: expected {}, found {}",
                    slot.ty.display(),
                    value.ty.display()
                ),
            );
            return;
        }
        if let (Some(expected), Some(found)) = (&slot.shape, &value.shape) {
            let fills = broadcast && found.is_empty();
            if expected != found && !fills {
                self.error(
                    loc,
                    format!(
                        "shape mismatch in {what}: expected {}, found {}",
                        shape_display(expected),
                        shape_display(found)
                    ),
                );
            }
        }
    }

    fn infer(&mut self, expr: &Expr) -> Inferred {
        match &expr.kind {
            ExprKind::Literal(lit) => Inferred::scalar(literal_type(lit)),
            ExprKind::Ident(id) => match self.lookup(&id.node).map(|s| (s.category, s.ty.clone(), s.shape.clone())) {
                Some((Category::Variable, ty, shape)) => Inferred { ty, shape },
                Some((other, _, _)) => {
                    self.error(id.loc, format!("'{}' is a {}, not a value", id.node, other.name()));
                    Inferred::unknown()
                }
                None => {
                    self.error(id.loc, format!("undefined identifier '{}'", id.node));
                    Inferred::unknown()
                }
            },
            ExprKind::Binary { left, op, right } => {
                let l = self.infer(left);
                let r = self.infer(right);
                self.binary_result(*op, &l, &r, expr.loc)
            }
            ExprKind::Compare { left, op, right } => {
                let l = self.infer(left);
                let r = self.infer(right);
                let ordering = !matches!(op, CmpOp::Eq | CmpOp::Ne);
                if let (true, Some(a), Some(b)) = (ordering, l.ty.family(), r.ty.family()) {
                    let comparable = (a.is_numeric() && b.is_numeric()) || a == b;
                    if !comparable {
                        self.error(
                            expr.loc,
                            format!(
                                "cannot compare {} with {} using '{}'",
                                l.ty.display(),
                                r.ty.display(),
                                op.symbol()
                            ),
                        );
                    }
                }
                let shape = self.elementwise_shape(op.symbol(), &l, &r, expr.loc);
                Inferred { ty: Type::Bool, shape }
            }
            ExprKind::Unary { op, expr: inner } => self.infer_unary(*op, inner, expr.loc),
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr.loc),
            ExprKind::Index { base, index } => self.infer_index(base, index, expr.loc),
            ExprKind::Member { base, field } => {
                let b = self.infer(base);
                match &b.ty {
                    Type::Record(name) => {
                        let found = self
                            .lookup(name)
                            .filter(|s| s.category == Category::Record)
                            .and_then(|s| s.field(&field.node))
                            .cloned();
                        match found {
                            Some(f) => Inferred {
                                ty: f.ty,
                                shape: f.shape,
                            },
                            None => {
                                self.error(
                                    field.loc,
                                    format!("record '{name}' has no field '{}'", field.node),
                                );
                                Inferred::unknown()
                            }
                        }
                    }
                    Type::Unknown => Inferred::unknown(),
                    other => {
                        self.error(
                            field.loc,
                            format!(
                                "cannot access field '{}' on a value of type {}",
                                field.node,
                                other.display()
                            ),
                        );
                        Inferred::unknown()
                    }
                }
            }
            ExprKind::Array(elems) => self.infer_array(elems, expr.loc),
        }
    }

    fn binary_result(&mut self, op: BinOp, l: &Inferred, r: &Inferred, loc: Loc) -> Inferred {
        if op.is_logical() {
            let shape = self.elementwise_shape(op.symbol(), l, r, loc);
            return Inferred { ty: Type::Bool, shape };
        }

        let ty = self.arith_type(op, &l.ty, &r.ty, loc);
        let shape = if op == BinOp::MatMul {
            self.matmul_shape(l, r, loc)
        } else {
            self.elementwise_shape(op.symbol(), l, r, loc)
        };
        Inferred { ty, shape }
    }

    fn arith_type(&mut self, op: BinOp, l: &Type, r: &Type, loc: Loc) -> Type {
        let (Some(lf), Some(rf)) = (l.family(), r.family()) else {
            return Type::Unknown;
        };
        if lf.is_numeric() && rf.is_numeric() {
            return l.widen(r);
        }
        if op == BinOp::Add && lf == Family::String && rf == Family::String {
            return Type::String;
        }
        if lf != rf {
            self.error(
                loc,
                format!("incompatible types for '{}': {} and {}", op.symbol(), l.display(), r.display()),
            );
        } else {
            self.error(loc, format!("operator '{}' is not defined for {}", op.symbol(), l.display()));
        }
        Type::Unknown
    }

    /// Elementwise operands must agree in shape unless one side is a scalar.
    fn elementwise_shape(&mut self, op: &str, l: &Inferred, r: &Inferred, loc: Loc) -> Option<Shape> {
        let (Some(a), Some(b)) = (&l.shape, &r.shape) else {
            return None;
        };
        if a.is_empty() {
            return Some(b.clone());
        }
        if b.is_empty() || a == b {
            return Some(a.clone());
        }
        self.error_with_hint(
            loc,
            format!("shape mismatch for '{op}': {} vs {}", shape_display(a), shape_display(b)),
            "elementwise operators need identical shapes or a scalar operand".to_string(),
        );
        None
    }

    fn matmul_shape(&mut self, l: &Inferred, r: &Inferred, loc: Loc) -> Option<Shape> {
        let (Some(a), Some(b)) = (&l.shape, &r.shape) else {
            return None;
        };
        let both = format!("left operand is {}, right operand is {}", shape_display(a), shape_display(b));

        if a.is_empty() || b.is_empty() {
            self.error_with_hint(loc, "matrix multiplication requires vector or matrix operands, found a scalar", both);
            return None;
        }
        if a.len() > 2 || b.len() > 2 {
            self.error_with_hint(loc, "matrix multiplication supports only vectors and matrices", both);
            return None;
        }

        let inner_l = a[a.len() - 1];
        let inner_r = b[0];
        if inner_l != inner_r {
            self.error_with_hint(
                loc,
                format!("matrix multiplication: inner dimension mismatch ({inner_l} vs {inner_r})"),
                both,
            );
            return None;
        }

        let mut out = a[..a.len() - 1].to_vec();
        out.extend_from_slice(&b[1..]);
        Some(out)
    }

    fn infer_unary(&mut self, op: UnaryOp, inner: &Expr, loc: Loc) -> Inferred {
        match op {
            UnaryOp::AddrOf => {
                let ExprKind::Ident(id) = &inner.kind else {
                    self.error(loc, "'&' can only take the address of a variable");
                    return Inferred::unknown();
                };
                match self.lookup(&id.node).map(|s| s.ty.clone()) {
                    Some(ty) => Inferred::scalar(Type::Pointer(Box::new(ty))),
                    None => {
                        self.error(id.loc, format!("undefined pointer target '{}'", id.node));
                        Inferred::scalar(Type::Pointer(Box::new(Type::Unknown)))
                    }
                }
            }
            UnaryOp::Neg => {
                let inferred = self.infer(inner);
                if inferred.ty.family().is_some_and(|f| !f.is_numeric()) {
                    self.error(loc, format!("unary '-' is not defined for {}", inferred.ty.display()));
                }
                inferred
            }
            UnaryOp::Not => {
                let inferred = self.infer(inner);
                Inferred {
                    ty: Type::Bool,
                    shape: inferred.shape,
                }
            }
        }
    }

    fn infer_call(&mut self, callee: &Ident, args: &[Expr], loc: Loc) -> Inferred {
        let inferred: Vec<Inferred> = args.iter().map(|a| self.infer(a)).collect();

        let sym = self.lookup(&callee.node).cloned();
        let sym = match sym {
            Some(sym) => sym,
            // `print` is a variadic builtin unless shadowed by a user function.
            None if callee.node == "print" => {
                return Inferred {
                    ty: Type::Void,
                    shape: None,
                };
            }
            None => {
                self.error(callee.loc, format!("undefined function '{}'", callee.node));
                return Inferred::unknown();
            }
        };

        if sym.category != Category::Function {
            self.error(
                callee.loc,
                format!("'{}' is a {}, not a function", callee.node, sym.category.name()),
            );
            return Inferred::unknown();
        }

        if sym.params.len() != args.len() {
            self.error(
                loc,
                format!(
                    "function '{}' expects {} argument(s), found {}",
                    callee.node,
                    sym.params.len(),
                    args.len()
                ),
            );
        }
        for (i, (param, (arg, value))) in sym.params.iter().zip(args.iter().zip(&inferred)).enumerate() {
            let slot = Inferred {
                ty: param.ty.clone(),
                shape: param.shape.clone(),
            };
            let what = format!("argument {} of '{}'", i + 1, callee.node);
            self.check_store(&what, &slot, value, arg.loc, false);
        }

        Inferred {
            ty: sym.ty,
            shape: sym.shape,
        }
    }

    fn infer_index(&mut self, base: &Expr, index: &Index, loc: Loc) -> Inferred {
        let b = self.infer(base);
        let name = base.root_name().unwrap_or("value").to_string();

        let shape = match index {
            Index::Elements(items) => {
                for item in items {
                    self.check_index_operand(item);
                }
                match &b.shape {
                    Some(dims) if dims.is_empty() => {
                        self.error(loc, format!("cannot index scalar '{name}'"));
                        None
                    }
                    Some(dims) if items.len() > dims.len() => {
                        self.error(
                            loc,
                            format!(
                                "too many indices for '{name}': {} has rank {}, found {}",
                                shape_display(dims),
                                dims.len(),
                                items.len()
                            ),
                        );
                        None
                    }
                    Some(dims) => Some(dims[items.len()..].to_vec()),
                    None => None,
                }
            }
            Index::Slice(slice) => {
                self.check_index_operand(&slice.start);
                self.check_index_operand(&slice.end);
                match &b.shape {
                    Some(dims) if dims.is_empty() => {
                        self.error(loc, format!("cannot index scalar '{name}'"));
                        None
                    }
                    Some(dims) => {
                        let lo = slice.start.as_literal().and_then(Literal::as_int);
                        let hi = slice.end.as_literal().and_then(Literal::as_int);
                        match (lo, hi) {
                            (Some(lo), Some(hi)) if lo >= 0 && hi >= 0 => {
                                let extent = dims[0];
                                let lo = (lo as usize).min(extent);
                                let hi = (hi as usize).min(extent);
                                let mut out = dims.clone();
                                out[0] = hi.saturating_sub(lo);
                                Some(out)
                            }
                            _ => None,
                        }
                    }
                    None => None,
                }
            }
        };

        Inferred { ty: b.ty, shape }
    }

    fn check_index_operand(&mut self, item: &Expr) {
        let inferred = self.infer(item);
        if inferred.ty.family().is_some_and(|f| f != Family::Integer) {
            self.error(
                item.loc,
                format!("index must be an integer, found {}", inferred.ty.display()),
            );
        }
    }

    fn infer_array(&mut self, elems: &[Expr], loc: Loc) -> Inferred {
        let items: Vec<Inferred> = elems.iter().map(|e| self.infer(e)).collect();
        let Some(first) = items.first() else {
            return Inferred {
                ty: Type::Unknown,
                shape: Some(vec![0]),
            };
        };

        let mut ty = Type::Unknown;
        for (elem, item) in elems.iter().zip(&items) {
            match (ty.family(), item.ty.family()) {
                (None, _) => ty = item.ty.clone(),
                (Some(a), Some(b)) if a.is_numeric() && b.is_numeric() => ty = ty.widen(&item.ty),
                (Some(a), Some(b)) if a != b => self.error(
                    elem.loc,
                    format!(
                        "incompatible element types in array literal: {} and {}",
                        ty.display(),
                        item.ty.display()
                    ),
                ),
                _ => {}
            }
        }

        if items.iter().any(|i| i.shape.is_none()) {
            return Inferred { ty, shape: None };
        }
        if let Some(odd) = items.iter().find(|i| i.shape != first.shape) {
            let hint = format!(
                "first element is {}, another is {}",
                first.shape.as_deref().map(shape_display).unwrap_or_default(),
                odd.shape.as_deref().map(shape_display).unwrap_or_default()
            );
            self.error_with_hint(loc, "ragged array literal: elements have different shapes", hint);
            return Inferred { ty, shape: None };
        }

        let mut shape = vec![elems.len()];
        shape.extend(first.shape.iter().flatten().copied());
        Inferred {
            ty,
            shape: Some(shape),
        }
    }

    fn define(&mut self, sym: Symbol, loc: Loc) {
        let exists = self.scopes.last().is_some_and(|s| s.contains_key(&sym.name));
        if exists {
            self.error(loc, format!("'{}' is already defined in this scope", sym.name));
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(sym.name.clone(), sym.clone());
        }
        self.history.push(sym);
    }

    fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        // The global scope outlives the run.
        if self.scopes.len() > 1 {
            let _ = self.scopes.pop();
        }
    }

    fn error(&mut self, loc: Loc, message: impl Into<String>) {
        self.errors.push(SemanticError {
            message: message.into(),
            hint: None,
            line: loc.line,
            span: loc.span,
        });
    }

    fn error_with_hint(&mut self, loc: Loc, message: impl Into<String>, hint: String) {
        self.errors.push(SemanticError {
            message: message.into(),
            hint: Some(hint),
            line: loc.line,
            span: loc.span,
        });
    }
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Int(_) => Type::Int32,
        Literal::Float(_) => Type::Float32,
        Literal::Str(_) => Type::String,
        Literal::Bool(_) => Type::Bool,
    }
}

/// Record and function declarations at any depth, in source order.
fn collect_decls<'a>(stmts: &'a [Stmt], records: &mut Vec<&'a RecordDecl>, funcs: &mut Vec<&'a FuncDecl>) {
    for stmt in stmts {
        match stmt {
            Stmt::RecordDecl(rec) => records.push(rec),
            Stmt::FuncDecl(func) => {
                funcs.push(func);
                collect_decls(&func.body.stmts, records, funcs);
            }
            Stmt::Block(block) => collect_decls(&block.stmts, records, funcs),
            Stmt::If(s) => {
                collect_decls(&s.then_block.stmts, records, funcs);
                if let Some(else_block) = &s.else_block {
                    collect_decls(&else_block.stmts, records, funcs);
                }
            }
            Stmt::While(s) => collect_decls(&s.body.stmts, records, funcs),
            Stmt::RepeatUntil(s) => collect_decls(&s.body.stmts, records, funcs),
            Stmt::For(s) => collect_decls(&s.body.stmts, records, funcs),
            _ => {}
        }
    }
}
