#![forbid(unsafe_code)]

use std::collections::{BTreeSet, HashMap};
use std::mem;

use quantel_ast::{
    fold, Assign, AssignOp, Block, DType, DeclType, Expr, ExprKind, ForStmt, IfStmt, Index, Literal,
    Program, Range, RepeatUntilStmt, Slice, Stmt, TypeSpec, UnaryOp, WhileStmt,
};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OptConfig {
    /// Upper bound on full rewrite passes.
    pub max_passes: usize,
    /// Largest trip count a `for` loop is unrolled for.
    pub unroll_limit: i64,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            max_passes: 10,
            unroll_limit: 10,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OptimizeOutcome {
    pub program: Program,
    /// Whether any rewrite fired during the run.
    pub changed: bool,
    pub passes: usize,
}

/// Rewrite `program` until a pass fires no rule or `max_passes` is reached.
pub fn optimize(program: &Program, config: &OptConfig) -> OptimizeOutcome {
    let mut program = program.clone();
    let mut changed = false;
    let mut passes = 0;

    for _ in 0..config.max_passes {
        passes += 1;
        let mut pass = Pass::new(config, &program.stmts);
        let stmts = mem::take(&mut program.stmts);
        program.stmts = pass.rewrite_stmts(stmts);
        debug!(pass = passes, rewrites = pass.rewrites, "optimizer pass");
        if pass.rewrites == 0 {
            break;
        }
        changed = true;
    }

    OptimizeOutcome {
        program,
        changed,
        passes,
    }
}

struct Pass<'c> {
    config: &'c OptConfig,
    /// Names currently known to hold a literal value.
    consts: HashMap<String, Literal>,
    user_functions: BTreeSet<String>,
    /// Names some function body assigns; a call may change any of them.
    func_writes: BTreeSet<String>,
    /// Names that may hold a float somewhere; an untracked one is not
    /// assumed to stay integer after `=`.
    maybe_float: BTreeSet<String>,
    rewrites: usize,
}

impl<'c> Pass<'c> {
    fn new(config: &'c OptConfig, stmts: &[Stmt]) -> Self {
        let mut user_functions = BTreeSet::new();
        let mut func_writes = BTreeSet::new();
        scan_functions(stmts, &mut user_functions, &mut func_writes);
        let mut maybe_float = BTreeSet::new();
        float_names(stmts, &mut maybe_float);
        Self {
            config,
            consts: HashMap::new(),
            user_functions,
            func_writes,
            maybe_float,
            rewrites: 0,
        }
    }

    fn rewrite_stmts(&mut self, stmts: Vec<Stmt>) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            self.rewrite_stmt(stmt, &mut out);
        }
        out
    }

    fn rewrite_block(&mut self, block: Block) -> Block {
        Block {
            loc: block.loc,
            stmts: self.rewrite_stmts(block.stmts),
        }
    }

    fn rewrite_stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) {
        match stmt {
            Stmt::Block(block) => {
                self.rewrites += 1;
                for inner in block.stmts {
                    self.rewrite_stmt(inner, out);
                }
            }
            Stmt::VarDecl(mut decl) => {
                decl.init = decl.init.map(|e| self.rewrite_expr(e));
                match decl.init.as_ref().and_then(Expr::as_literal) {
                    Some(lit) => match tracked_decl_value(&decl.ty, lit) {
                        Some(value) => {
                            self.consts.insert(decl.name.node.clone(), value);
                        }
                        None => {
                            self.consts.remove(&decl.name.node);
                        }
                    },
                    None => {
                        self.consts.remove(&decl.name.node);
                    }
                }
                out.push(Stmt::VarDecl(decl));
            }
            Stmt::PointerDecl(decl) => {
                self.consts.remove(&decl.name.node);
                out.push(Stmt::PointerDecl(decl));
            }
            // Field initializers run at instantiation time; left as written.
            Stmt::RecordDecl(rec) => out.push(Stmt::RecordDecl(rec)),
            Stmt::FuncDecl(mut func) => {
                let outer = mem::take(&mut self.consts);
                func.body = self.rewrite_block(func.body);
                self.consts = outer;
                out.push(Stmt::FuncDecl(func));
            }
            Stmt::Assign(assign) => {
                let assign = self.rewrite_assign(assign);
                out.push(Stmt::Assign(assign));
            }
            Stmt::If(s) => self.rewrite_if(s, out),
            Stmt::While(s) => {
                let s = self.rewrite_while(s);
                out.push(Stmt::While(s));
            }
            Stmt::RepeatUntil(s) => {
                let s = self.rewrite_repeat(s);
                out.push(Stmt::RepeatUntil(s));
            }
            Stmt::For(s) => self.rewrite_for(s, out),
            Stmt::Return(mut ret) => {
                ret.value = ret.value.map(|e| self.rewrite_expr(e));
                out.push(Stmt::Return(ret));
            }
            Stmt::Break(loc) => out.push(Stmt::Break(loc)),
            Stmt::Continue(loc) => out.push(Stmt::Continue(loc)),
            Stmt::Probe(mut probe) => {
                probe.expr = self.rewrite_expr(probe.expr);
                out.push(Stmt::Probe(probe));
            }
            Stmt::Expr(e) => {
                let e = self.rewrite_expr(e);
                out.push(Stmt::Expr(e));
            }
        }
    }

    fn rewrite_assign(&mut self, assign: Assign) -> Assign {
        let Assign {
            loc,
            target,
            op,
            value,
        } = assign;
        let value = self.rewrite_expr(value);
        let target = self.rewrite_target(target);

        match &target.kind {
            ExprKind::Ident(id) => {
                let name = id.node.clone();
                let next = match (op.binary(), value.as_literal()) {
                    // A float binding widens an integer store.
                    (None, Some(Literal::Int(n))) => match self.consts.get(&name) {
                        Some(Literal::Float(_)) => Some(Literal::Float(*n as f64)),
                        Some(_) => Some(Literal::Int(*n)),
                        None if self.maybe_float.contains(&name) => None,
                        None => Some(Literal::Int(*n)),
                    },
                    (None, Some(lit)) => Some(lit.clone()),
                    (Some(bin), Some(lit)) => self
                        .consts
                        .get(&name)
                        .and_then(|old| fold::binary(bin, old, lit).ok()),
                    _ => None,
                };
                match next {
                    Some(lit) => {
                        self.consts.insert(name, lit);
                    }
                    None => {
                        self.consts.remove(&name);
                    }
                }
            }
            _ => {
                if let Some(root) = target.root_name() {
                    self.consts.remove(root);
                }
            }
        }

        Assign {
            loc,
            target,
            op,
            value,
        }
    }

    /// Index expressions inside a target are ordinary reads; the written
    /// variable itself is never replaced.
    fn rewrite_target(&mut self, target: Expr) -> Expr {
        let Expr { loc, kind } = target;
        let kind = match kind {
            ExprKind::Index { base, index } => ExprKind::Index {
                base: Box::new(self.rewrite_target(*base)),
                index: self.rewrite_index(index),
            },
            ExprKind::Member { base, field } => ExprKind::Member {
                base: Box::new(self.rewrite_target(*base)),
                field,
            },
            other => other,
        };
        Expr { loc, kind }
    }

    fn rewrite_if(&mut self, s: IfStmt, out: &mut Vec<Stmt>) {
        let cond = self.rewrite_expr(s.cond);

        if let Some(lit) = cond.as_literal() {
            self.rewrites += 1;
            // The dropped branch still contributes its hoisted declarations,
            // kept in source order.
            let mut kept = Vec::new();
            if lit.truthy() {
                kept.extend(s.then_block.stmts);
                if let Some(b) = s.else_block {
                    take_hoisted(b.stmts, &mut kept);
                }
            } else {
                take_hoisted(s.then_block.stmts, &mut kept);
                kept.extend(s.else_block.into_iter().flat_map(|b| b.stmts));
            }
            for stmt in kept {
                self.rewrite_stmt(stmt, out);
            }
            return;
        }

        let before = self.consts.clone();
        let then_block = self.rewrite_block(s.then_block);
        let after_then = mem::replace(&mut self.consts, before);
        let else_block = s.else_block.map(|b| self.rewrite_block(b));
        let after_else = mem::take(&mut self.consts);

        // Only facts both paths agree on survive the join.
        self.consts = after_then
            .into_iter()
            .filter(|(name, lit)| after_else.get(name) == Some(lit))
            .collect();

        out.push(Stmt::If(IfStmt {
            loc: s.loc,
            cond,
            then_block,
            else_block,
        }));
    }

    fn rewrite_while(&mut self, s: WhileStmt) -> WhileStmt {
        let written = self.loop_writes(&s.body.stmts, &[&s.cond]);
        self.forget(&written);
        let cond = self.rewrite_expr(s.cond);
        let body = self.rewrite_block(s.body);
        self.forget(&written);
        WhileStmt {
            loc: s.loc,
            cond,
            body,
        }
    }

    fn rewrite_repeat(&mut self, s: RepeatUntilStmt) -> RepeatUntilStmt {
        let written = self.loop_writes(&s.body.stmts, &[&s.cond]);
        self.forget(&written);
        let body = self.rewrite_block(s.body);
        // `continue` may reach the condition from any point in the body.
        self.forget(&written);
        let cond = self.rewrite_expr(s.cond);
        self.forget(&written);
        RepeatUntilStmt {
            loc: s.loc,
            body,
            cond,
        }
    }

    fn rewrite_for(&mut self, s: ForStmt, out: &mut Vec<Stmt>) {
        let ForStmt {
            loc,
            var,
            range,
            body,
        } = s;
        let mut range = range;
        range.start = self.rewrite_expr(range.start);
        range.end = self.rewrite_expr(range.end);
        range.step = range.step.map(|e| self.rewrite_expr(e));

        if let Some(values) = self.unroll_values(&range, &body) {
            self.rewrites += 1;
            for k in values {
                let assign = Stmt::Assign(Assign {
                    loc: var.loc,
                    target: Expr {
                        loc: var.loc,
                        kind: ExprKind::Ident(var.clone()),
                    },
                    op: AssignOp::Set,
                    value: Expr::literal(var.loc, Literal::Int(k)),
                });
                self.rewrite_stmt(assign, out);
                for stmt in body.stmts.iter().cloned() {
                    self.rewrite_stmt(stmt, out);
                }
            }
            return;
        }

        let mut written = self.loop_writes(&body.stmts, &[]);
        written.insert(var.node.clone());
        self.forget(&written);
        let body = self.rewrite_block(body);
        self.forget(&written);

        out.push(Stmt::For(ForStmt {
            loc,
            var,
            range,
            body,
        }));
    }

    /// Iteration values when the loop is small, literal-bounded and has no
    /// exits of its own.
    fn unroll_values(&self, range: &Range, body: &Block) -> Option<Vec<i64>> {
        let start = range.start.as_literal()?.as_int()?;
        let end = range.end.as_literal()?.as_int()?;
        let step = match &range.step {
            Some(e) => e.as_literal()?.as_int()?,
            None => 1,
        };
        let span = end.checked_sub(start)?;
        if step <= 0 || span <= 0 || span > self.config.unroll_limit {
            return None;
        }
        if has_loop_exit(&body.stmts) || has_nested_decl(&body.stmts) {
            return None;
        }
        let mut values = Vec::new();
        let mut k = start;
        while k < end {
            values.push(k);
            k = k.checked_add(step)?;
        }
        Some(values)
    }

    fn loop_writes(&self, body: &[Stmt], extra: &[&Expr]) -> BTreeSet<String> {
        let mut written = BTreeSet::new();
        written_names(body, &mut written);

        let mut calls = BTreeSet::new();
        calls_in_stmts(body, &mut calls);
        for e in extra {
            calls_in_expr(e, &mut calls);
        }
        if calls.iter().any(|c| self.user_functions.contains(c)) {
            written.extend(self.func_writes.iter().cloned());
        }
        written
    }

    fn forget(&mut self, names: &BTreeSet<String>) {
        for name in names {
            self.consts.remove(name);
        }
    }

    fn rewrite_expr(&mut self, expr: Expr) -> Expr {
        let Expr { loc, kind } = expr;
        match kind {
            ExprKind::Ident(id) => match self.consts.get(&id.node) {
                Some(lit) => {
                    self.rewrites += 1;
                    Expr::literal(loc, lit.clone())
                }
                None => Expr {
                    loc,
                    kind: ExprKind::Ident(id),
                },
            },
            ExprKind::Binary { left, op, right } => {
                let left = self.rewrite_expr(*left);
                let right = self.rewrite_expr(*right);
                if let (Some(a), Some(b)) = (left.as_literal(), right.as_literal()) {
                    if let Ok(value) = fold::binary(op, a, b) {
                        self.rewrites += 1;
                        return Expr::literal(loc, value);
                    }
                }
                Expr {
                    loc,
                    kind: ExprKind::Binary {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                }
            }
            ExprKind::Compare { left, op, right } => {
                let left = self.rewrite_expr(*left);
                let right = self.rewrite_expr(*right);
                if let (Some(a), Some(b)) = (left.as_literal(), right.as_literal()) {
                    if let Ok(value) = fold::compare(op, a, b) {
                        self.rewrites += 1;
                        return Expr::literal(loc, value);
                    }
                }
                Expr {
                    loc,
                    kind: ExprKind::Compare {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                }
            }
            // `&x` names a binding, not its value.
            ExprKind::Unary {
                op: UnaryOp::AddrOf,
                expr,
            } => Expr {
                loc,
                kind: ExprKind::Unary {
                    op: UnaryOp::AddrOf,
                    expr,
                },
            },
            ExprKind::Unary { op, expr } => {
                let inner = self.rewrite_expr(*expr);
                if let Some(lit) = inner.as_literal() {
                    if let Ok(value) = fold::unary(op, lit) {
                        self.rewrites += 1;
                        return Expr::literal(loc, value);
                    }
                }
                Expr {
                    loc,
                    kind: ExprKind::Unary {
                        op,
                        expr: Box::new(inner),
                    },
                }
            }
            ExprKind::Call { callee, args } => {
                let args = args.into_iter().map(|a| self.rewrite_expr(a)).collect();
                if self.user_functions.contains(&callee.node) {
                    let writes = self.func_writes.clone();
                    self.forget(&writes);
                }
                Expr {
                    loc,
                    kind: ExprKind::Call { callee, args },
                }
            }
            ExprKind::Index { base, index } => {
                let base = self.rewrite_expr(*base);
                let index = self.rewrite_index(index);
                Expr {
                    loc,
                    kind: ExprKind::Index {
                        base: Box::new(base),
                        index,
                    },
                }
            }
            ExprKind::Member { base, field } => {
                let base = self.rewrite_expr(*base);
                Expr {
                    loc,
                    kind: ExprKind::Member {
                        base: Box::new(base),
                        field,
                    },
                }
            }
            ExprKind::Array(elems) => {
                let elems = elems.into_iter().map(|e| self.rewrite_expr(e)).collect();
                Expr {
                    loc,
                    kind: ExprKind::Array(elems),
                }
            }
            ExprKind::Literal(lit) => Expr::literal(loc, lit),
        }
    }

    fn rewrite_index(&mut self, index: Index) -> Index {
        match index {
            Index::Elements(items) => {
                Index::Elements(items.into_iter().map(|e| self.rewrite_expr(e)).collect())
            }
            Index::Slice(slice) => Index::Slice(Slice {
                loc: slice.loc,
                start: Box::new(self.rewrite_expr(*slice.start)),
                end: Box::new(self.rewrite_expr(*slice.end)),
            }),
        }
    }
}

/// The value a literal-initialized declaration holds at run time, if it is a
/// plain scalar. A float dtype widens an integer literal; a scalar filling a
/// larger shape is not tracked.
fn tracked_decl_value(ty: &DeclType, lit: &Literal) -> Option<Literal> {
    match ty {
        DeclType::Auto => Some(lit.clone()),
        DeclType::Spec(TypeSpec::Builtin { dtype, shape }) => {
            if !shape.dims.is_empty() {
                return None;
            }
            match (dtype, lit) {
                (d, Literal::Int(n)) if d.is_float() => Some(Literal::Float(*n as f64)),
                (DType::Bool, Literal::Bool(_)) => Some(lit.clone()),
                (DType::Bool, _) => None,
                _ => Some(lit.clone()),
            }
        }
        DeclType::Spec(TypeSpec::Record(_)) => None,
    }
}

fn scan_functions(stmts: &[Stmt], names: &mut BTreeSet<String>, writes: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::FuncDecl(func) => {
                names.insert(func.name.node.clone());
                assigned_names(&func.body.stmts, writes);
                scan_functions(&func.body.stmts, names, writes);
            }
            other => {
                for block in child_blocks(other) {
                    scan_functions(&block.stmts, names, writes);
                }
            }
        }
    }
}

/// Roots of every assignment target, at any depth.
fn assigned_names(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::Assign(a) => {
                if let Some(root) = a.target.root_name() {
                    out.insert(root.to_string());
                }
            }
            Stmt::For(s) => {
                out.insert(s.var.node.clone());
                assigned_names(&s.body.stmts, out);
            }
            other => {
                for block in child_blocks(other) {
                    assigned_names(&block.stmts, out);
                }
            }
        }
    }
}

/// Names a statement list may bind or overwrite, outside nested functions.
fn written_names(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(d) => {
                out.insert(d.name.node.clone());
            }
            Stmt::PointerDecl(d) => {
                out.insert(d.name.node.clone());
            }
            Stmt::Assign(a) => {
                if let Some(root) = a.target.root_name() {
                    out.insert(root.to_string());
                }
            }
            Stmt::For(s) => {
                out.insert(s.var.node.clone());
                written_names(&s.body.stmts, out);
            }
            Stmt::FuncDecl(_) => {}
            other => {
                for block in child_blocks(other) {
                    written_names(&block.stmts, out);
                }
            }
        }
    }
}

/// Names declared with a float dtype, float parameters, and names bound to
/// anything but an integer, boolean or string literal.
fn float_names(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    let non_float = |e: &Expr| {
        matches!(
            e.as_literal(),
            Some(Literal::Int(_) | Literal::Bool(_) | Literal::Str(_))
        )
    };
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(d) => {
                let float = match &d.ty {
                    DeclType::Spec(spec) => spec_is_float(spec),
                    DeclType::Auto => d.init.as_ref().is_some_and(|e| !non_float(e)),
                };
                if float {
                    out.insert(d.name.node.clone());
                }
            }
            Stmt::Assign(a) => {
                if let ExprKind::Ident(id) = &a.target.kind {
                    if !non_float(&a.value) {
                        out.insert(id.node.clone());
                    }
                }
            }
            Stmt::FuncDecl(f) => {
                for param in f.params.iter().filter(|p| spec_is_float(&p.ty)) {
                    out.insert(param.name.node.clone());
                }
                float_names(&f.body.stmts, out);
            }
            other => {
                for block in child_blocks(other) {
                    float_names(&block.stmts, out);
                }
            }
        }
    }
}

fn spec_is_float(spec: &TypeSpec) -> bool {
    matches!(spec, TypeSpec::Builtin { dtype, .. } if dtype.is_float())
}

fn child_blocks(stmt: &Stmt) -> Vec<&Block> {
    match stmt {
        Stmt::Block(b) => vec![b],
        Stmt::If(s) => {
            let mut blocks = vec![&s.then_block];
            blocks.extend(s.else_block.as_ref());
            blocks
        }
        Stmt::While(s) => vec![&s.body],
        Stmt::RepeatUntil(s) => vec![&s.body],
        Stmt::For(s) => vec![&s.body],
        Stmt::FuncDecl(f) => vec![&f.body],
        _ => Vec::new(),
    }
}

/// `break`/`continue` that would leave or restart *this* loop.
fn has_loop_exit(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::Break(_) | Stmt::Continue(_) => true,
        Stmt::Block(b) => has_loop_exit(&b.stmts),
        Stmt::If(s) => {
            has_loop_exit(&s.then_block.stmts)
                || s.else_block.as_ref().is_some_and(|b| has_loop_exit(&b.stmts))
        }
        _ => false,
    })
}

fn has_nested_decl(stmts: &[Stmt]) -> bool {
    stmts.iter().any(|stmt| match stmt {
        Stmt::FuncDecl(_) | Stmt::RecordDecl(_) => true,
        other => child_blocks(other).iter().any(|b| has_nested_decl(&b.stmts)),
    })
}

/// Pull every `func` and `record` declaration out of statements that are
/// about to be discarded.
fn take_hoisted(stmts: Vec<Stmt>, out: &mut Vec<Stmt>) {
    for stmt in stmts {
        match stmt {
            Stmt::FuncDecl(_) | Stmt::RecordDecl(_) => out.push(stmt),
            Stmt::Block(b) => take_hoisted(b.stmts, out),
            Stmt::If(s) => {
                take_hoisted(s.then_block.stmts, out);
                if let Some(b) = s.else_block {
                    take_hoisted(b.stmts, out);
                }
            }
            Stmt::While(s) => take_hoisted(s.body.stmts, out),
            Stmt::RepeatUntil(s) => take_hoisted(s.body.stmts, out),
            Stmt::For(s) => take_hoisted(s.body.stmts, out),
            _ => {}
        }
    }
}

fn calls_in_stmts(stmts: &[Stmt], out: &mut BTreeSet<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl(d) => {
                if let Some(init) = &d.init {
                    calls_in_expr(init, out);
                }
            }
            Stmt::Assign(a) => {
                calls_in_expr(&a.target, out);
                calls_in_expr(&a.value, out);
            }
            Stmt::If(s) => {
                calls_in_expr(&s.cond, out);
                calls_in_stmts(&s.then_block.stmts, out);
                if let Some(b) = &s.else_block {
                    calls_in_stmts(&b.stmts, out);
                }
            }
            Stmt::While(s) => {
                calls_in_expr(&s.cond, out);
                calls_in_stmts(&s.body.stmts, out);
            }
            Stmt::RepeatUntil(s) => {
                calls_in_expr(&s.cond, out);
                calls_in_stmts(&s.body.stmts, out);
            }
            Stmt::For(s) => {
                calls_in_expr(&s.range.start, out);
                calls_in_expr(&s.range.end, out);
                if let Some(step) = &s.range.step {
                    calls_in_expr(step, out);
                }
                calls_in_stmts(&s.body.stmts, out);
            }
            Stmt::Return(r) => {
                if let Some(v) = &r.value {
                    calls_in_expr(v, out);
                }
            }
            Stmt::Probe(p) => calls_in_expr(&p.expr, out),
            Stmt::Expr(e) => calls_in_expr(e, out),
            Stmt::Block(b) => calls_in_stmts(&b.stmts, out),
            Stmt::PointerDecl(_)
            | Stmt::RecordDecl(_)
            | Stmt::FuncDecl(_)
            | Stmt::Break(_)
            | Stmt::Continue(_) => {}
        }
    }
}

fn calls_in_expr(expr: &Expr, out: &mut BTreeSet<String>) {
    match &expr.kind {
        ExprKind::Call { callee, args } => {
            out.insert(callee.node.clone());
            for a in args {
                calls_in_expr(a, out);
            }
        }
        ExprKind::Binary { left, right, .. } | ExprKind::Compare { left, right, .. } => {
            calls_in_expr(left, out);
            calls_in_expr(right, out);
        }
        ExprKind::Unary { expr, .. } => calls_in_expr(expr, out),
        ExprKind::Index { base, index } => {
            calls_in_expr(base, out);
            match index {
                Index::Elements(items) => items.iter().for_each(|e| calls_in_expr(e, out)),
                Index::Slice(s) => {
                    calls_in_expr(&s.start, out);
                    calls_in_expr(&s.end, out);
                }
            }
        }
        ExprKind::Member { base, .. } => calls_in_expr(base, out),
        ExprKind::Array(elems) => elems.iter().for_each(|e| calls_in_expr(e, out)),
        ExprKind::Literal(_) | ExprKind::Ident(_) => {}
    }
}

