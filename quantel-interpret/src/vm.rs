#![forbid(unsafe_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::mem;
use std::rc::Rc;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice as AxisSlice};
use quantel_ast::{
    AssignOp, Assign, BinOp, Block, DType, DeclType, Expr, ExprKind, ForStmt, FuncDecl, Ident,
    Index, Loc, Program, RecordDecl, Stmt, TypeSpec, UnaryOp, VarDecl,
};
use serde::Serialize;
use tracing::debug;

use crate::error::RuntimeError;
use crate::ops;
use crate::value::{shape_text, ElemKind, Value};

#[derive(Clone, Debug)]
pub struct VmConfig {
    /// Calls nested deeper than this abort the run instead of exhausting the
    /// native stack.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self { max_call_depth: 200 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub line: usize,
    pub value: String,
    pub shape: String,
    pub dtype: String,
}

impl ProbeReport {
    pub fn render(&self) -> String {
        format!(
            "[probe] line {}: {} | shape: {} | dtype: {}",
            self.line, self.value, self.shape, self.dtype
        )
    }
}

/// One global binding as seen after the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryEntry {
    pub address: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub shape: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct ExecOutcome {
    pub stdout: String,
    pub probes: Vec<ProbeReport>,
    pub memory: Vec<MemoryEntry>,
    /// First runtime error; execution stopped there.
    pub error: Option<RuntimeError>,
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// Place inside a variable that an assignment writes to.
enum Step {
    Elements(Vec<i64>),
    Field(String),
}

const ADDRESS_BASE: u64 = 0x1000;
const ADDRESS_STRIDE: u64 = 0x10;

#[derive(Debug)]
pub struct Vm {
    cfg: VmConfig,
    globals: HashMap<String, Value>,
    locals: Option<HashMap<String, Value>>,
    // Names declared with a float dtype; `=` widens integers stored into them.
    global_floats: HashSet<String>,
    local_floats: HashSet<String>,

    functions: HashMap<String, Rc<FuncDecl>>,
    records: HashMap<String, Rc<RecordDecl>>,
    // Records currently being instantiated; catches self-containing records.
    instantiating: Vec<String>,

    addresses: HashMap<String, u64>,
    next_address: u64,

    stdout: String,
    probes: Vec<ProbeReport>,

    call_depth: usize,
    loop_depth: usize,
}

impl Vm {
    pub fn new(cfg: VmConfig) -> Self {
        Self {
            cfg,
            globals: HashMap::new(),
            locals: None,
            global_floats: HashSet::new(),
            local_floats: HashSet::new(),
            functions: HashMap::new(),
            records: HashMap::new(),
            instantiating: Vec::new(),
            addresses: HashMap::new(),
            next_address: ADDRESS_BASE,
            stdout: String::new(),
            probes: Vec::new(),
            call_depth: 0,
            loop_depth: 0,
        }
    }

    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        self.hoist(&program.stmts);
        debug!(
            statements = program.stmts.len(),
            functions = self.functions.len(),
            "executing program"
        );
        for stmt in &program.stmts {
            // `return`/`break`/`continue` at top level fail where they occur,
            // so only `Normal` reaches here.
            let _ = self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn probes(&self) -> &[ProbeReport] {
        &self.probes
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn memory_snapshot(&self) -> Vec<MemoryEntry> {
        let mut names: Vec<&String> = self.globals.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| {
                let value = self.globals.get(name)?;
                Some(MemoryEntry {
                    address: self
                        .addresses
                        .get(name.as_str())
                        .map_or_else(|| "0x0".to_string(), |a| format!("0x{a:x}")),
                    name: name.clone(),
                    ty: value.type_name(),
                    shape: shape_text(&value.shape()),
                    value: value.to_string(),
                })
            })
            .collect()
    }

    pub fn into_outcome(self, error: Option<RuntimeError>) -> ExecOutcome {
        let memory = self.memory_snapshot();
        ExecOutcome {
            stdout: self.stdout,
            probes: self.probes,
            memory,
            error,
        }
    }

    fn hoist(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            match stmt {
                Stmt::FuncDecl(func) => {
                    self.functions
                        .insert(func.name.node.clone(), Rc::new(func.clone()));
                    self.hoist(&func.body.stmts);
                }
                Stmt::RecordDecl(rec) => {
                    self.records.insert(rec.name.node.clone(), Rc::new(rec.clone()));
                }
                Stmt::Block(b) => self.hoist(&b.stmts),
                Stmt::If(s) => {
                    self.hoist(&s.then_block.stmts);
                    if let Some(b) = &s.else_block {
                        self.hoist(&b.stmts);
                    }
                }
                Stmt::While(s) => self.hoist(&s.body.stmts),
                Stmt::RepeatUntil(s) => self.hoist(&s.body.stmts),
                Stmt::For(s) => self.hoist(&s.body.stmts),
                _ => {}
            }
        }
    }

    fn error(&self, loc: Loc, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            message: message.into(),
            line: loc.line,
            op: None,
            span: loc.span,
        }
    }

    fn error_op(&self, loc: Loc, message: String, op: &str) -> RuntimeError {
        RuntimeError {
            message,
            line: loc.line,
            op: Some(op.to_string()),
            span: loc.span,
        }
    }

    // --- environment ---

    fn address_key(&self, name: &str) -> String {
        match &self.locals {
            Some(locals) if locals.contains_key(name) => format!("{name}#{}", self.call_depth),
            _ => name.to_string(),
        }
    }

    fn address_of(&mut self, name: &str) -> String {
        if self.lookup(name).is_none() {
            return "0x0".to_string();
        }
        let key = self.address_key(name);
        let next = &mut self.next_address;
        let addr = *self.addresses.entry(key).or_insert_with(|| {
            let a = *next;
            *next += ADDRESS_STRIDE;
            a
        });
        format!("0x{addr:x}")
    }

    fn declare(&mut self, name: &str, value: Value) {
        match self.locals.as_mut() {
            Some(locals) => {
                locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
        let _ = self.address_of(name);
    }

    /// Record whether `name` in the active environment holds a float dtype.
    fn mark_float(&mut self, name: &str, float: bool) {
        let set = match self.locals {
            Some(_) => &mut self.local_floats,
            None => &mut self.global_floats,
        };
        if float {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    fn holds_float(&self, name: &str) -> bool {
        if let Some(locals) = &self.locals {
            if let Some(v) = locals.get(name) {
                return is_float(v) || self.local_floats.contains(name);
            }
        }
        self.globals.get(name).is_some_and(is_float) || self.global_floats.contains(name)
    }

    /// `=` semantics: local binding, else global binding, else a new binding
    /// in the active environment. Float bindings widen integer values.
    fn assign(&mut self, name: &str, value: Value) {
        let value = if self.holds_float(name) { widen(value) } else { value };
        if let Some(slot) = self.lookup_mut(name) {
            *slot = value;
        } else {
            self.declare(name, value);
            self.mark_float(name, false);
        }
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.locals
            .as_ref()
            .and_then(|l| l.get(name))
            .or_else(|| self.globals.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        if let Some(locals) = self.locals.as_mut() {
            if locals.contains_key(name) {
                return locals.get_mut(name);
            }
        }
        self.globals.get_mut(name)
    }

    // --- statements ---

    fn exec_block(&mut self, block: &Block) -> Result<Flow, RuntimeError> {
        for stmt in &block.stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Block(b) => self.exec_block(b),
            Stmt::VarDecl(decl) => {
                let value = self.decl_value(decl)?;
                self.declare(&decl.name.node, value);
                let float = matches!(&decl.ty, DeclType::Spec(spec) if spec_is_float(spec));
                self.mark_float(&decl.name.node, float);
                Ok(Flow::Normal)
            }
            Stmt::PointerDecl(decl) => {
                let addr = self.address_of(&decl.target.node);
                self.declare(&decl.name.node, Value::Pointer(addr));
                self.mark_float(&decl.name.node, false);
                Ok(Flow::Normal)
            }
            // Hoisted before execution.
            Stmt::RecordDecl(_) | Stmt::FuncDecl(_) => Ok(Flow::Normal),
            Stmt::Assign(assign) => {
                self.exec_assign(assign)?;
                Ok(Flow::Normal)
            }
            Stmt::If(s) => {
                let cond = self.eval(&s.cond)?;
                if self.truthy(&cond, s.cond.loc)? {
                    self.exec_block(&s.then_block)
                } else if let Some(b) = &s.else_block {
                    self.exec_block(b)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While(s) => {
                self.loop_depth += 1;
                let out = self.run_while(&s.cond, &s.body);
                self.loop_depth -= 1;
                out
            }
            Stmt::RepeatUntil(s) => {
                self.loop_depth += 1;
                let out = self.run_repeat(&s.body, &s.cond);
                self.loop_depth -= 1;
                out
            }
            Stmt::For(s) => self.exec_for(s),
            Stmt::Return(ret) => {
                if self.call_depth == 0 {
                    return Err(self.error(ret.loc, "'return' outside of a function"));
                }
                let value = match &ret.value {
                    Some(v) => self.eval(v)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            Stmt::Break(loc) => {
                if self.loop_depth == 0 {
                    return Err(self.error(*loc, "'break' outside of a loop"));
                }
                Ok(Flow::Break)
            }
            Stmt::Continue(loc) => {
                if self.loop_depth == 0 {
                    return Err(self.error(*loc, "'continue' outside of a loop"));
                }
                Ok(Flow::Continue)
            }
            Stmt::Probe(p) => {
                let value = self.eval(&p.expr)?;
                let report = ProbeReport {
                    line: p.loc.line,
                    value: value.to_string(),
                    shape: shape_text(&value.shape()),
                    dtype: value.type_name(),
                };
                self.stdout.push_str(&report.render());
                self.stdout.push('\n');
                self.probes.push(report);
                Ok(Flow::Normal)
            }
            Stmt::Expr(e) => {
                let _ = self.eval(e)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn run_while(&mut self, cond: &Expr, body: &Block) -> Result<Flow, RuntimeError> {
        loop {
            let c = self.eval(cond)?;
            if !self.truthy(&c, cond.loc)? {
                return Ok(Flow::Normal);
            }
            match self.exec_block(body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal | Flow::Continue => {}
            }
        }
    }

    fn run_repeat(&mut self, body: &Block, cond: &Expr) -> Result<Flow, RuntimeError> {
        loop {
            match self.exec_block(body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal | Flow::Continue => {}
            }
            let c = self.eval(cond)?;
            if self.truthy(&c, cond.loc)? {
                return Ok(Flow::Normal);
            }
        }
    }

    fn exec_for(&mut self, s: &ForStmt) -> Result<Flow, RuntimeError> {
        let start = self.eval_int(&s.range.start, "range bounds must be integers")?;
        let end = self.eval_int(&s.range.end, "range bounds must be integers")?;
        let step = match &s.range.step {
            Some(e) => self.eval_int(e, "loop step must be an integer")?,
            None => 1,
        };
        if step == 0 {
            return Err(self.error(s.range.loc, "loop step must not be zero"));
        }

        self.loop_depth += 1;
        let out = self.run_for(&s.var, start, end, step, &s.body);
        self.loop_depth -= 1;
        out
    }

    fn run_for(
        &mut self,
        var: &Ident,
        start: i64,
        end: i64,
        step: i64,
        body: &Block,
    ) -> Result<Flow, RuntimeError> {
        let mut i = start;
        while (step > 0 && i < end) || (step < 0 && i > end) {
            self.assign(&var.node, Value::Int(i));
            match self.exec_block(body)? {
                Flow::Break => break,
                Flow::Return(v) => return Ok(Flow::Return(v)),
                Flow::Normal | Flow::Continue => {}
            }
            match i.checked_add(step) {
                Some(next) => i = next,
                None => break,
            }
        }
        Ok(Flow::Normal)
    }

    /// Initial value of a declaration: coerced initializer, or the type's
    /// default when there is none.
    fn decl_value(&mut self, decl: &VarDecl) -> Result<Value, RuntimeError> {
        match (&decl.ty, &decl.init) {
            (DeclType::Auto, Some(init)) => self.eval(init),
            (DeclType::Auto, None) => Ok(Value::Null),
            (DeclType::Spec(spec), Some(init)) => {
                let v = self.eval(init)?;
                Ok(coerce(spec, v))
            }
            (DeclType::Spec(spec), None) => self.default_value(spec, decl.loc),
        }
    }

    fn default_value(&mut self, spec: &TypeSpec, loc: Loc) -> Result<Value, RuntimeError> {
        match spec {
            TypeSpec::Builtin { dtype, shape } if !shape.dims.is_empty() => Ok(Value::Array {
                data: ArrayD::zeros(IxDyn(&shape.dims)),
                kind: dtype_kind(*dtype),
            }),
            TypeSpec::Builtin { .. } => Ok(Value::Null),
            TypeSpec::Record(name) => self.instantiate(&name.node, loc),
        }
    }

    fn instantiate(&mut self, name: &str, loc: Loc) -> Result<Value, RuntimeError> {
        let Some(record) = self.records.get(name).cloned() else {
            return Err(self.error(loc, format!("unknown record type '{name}'")));
        };
        if self.instantiating.iter().any(|n| n == name) {
            return Err(self.error(loc, format!("record '{name}' contains itself")));
        }

        self.instantiating.push(name.to_string());
        let mut fields = BTreeMap::new();
        let mut failure = None;
        for field in &record.fields {
            match self.decl_value(field) {
                Ok(v) => {
                    fields.insert(field.name.node.clone(), v);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.instantiating.pop();

        match failure {
            Some(e) => Err(e),
            None => Ok(Value::Record {
                type_name: name.to_string(),
                fields,
            }),
        }
    }

    fn exec_assign(&mut self, assign: &Assign) -> Result<(), RuntimeError> {
        let value = self.eval(&assign.value)?;
        match &assign.target.kind {
            ExprKind::Ident(id) => match assign.op.binary() {
                None => {
                    self.assign(&id.node, value);
                    Ok(())
                }
                Some(op) => {
                    let Some(old) = self.lookup(&id.node).cloned() else {
                        return Err(
                            self.error(assign.loc, format!("undefined variable '{}'", id.node))
                        );
                    };
                    let new = self.apply(op, &old, &value, assign.loc)?;
                    self.assign(&id.node, new);
                    Ok(())
                }
            },
            _ => {
                let mut steps = Vec::new();
                let root = self.lvalue_path(&assign.target, &mut steps)?;
                let value = match self.lookup(&root) {
                    Some(slot) if self.float_field(slot, &steps) => widen(value),
                    _ => value,
                };
                let Some(slot) = self.lookup_mut(&root) else {
                    return Err(self.error(assign.loc, format!("undefined variable '{root}'")));
                };
                let result = write_path(slot, &steps, assign.op, value);
                result.map_err(|m| self.error_op(assign.loc, m, assign.op.symbol()))
            }
        }
    }

    /// Whether `steps` end at a record field that is declared float or
    /// currently holds a float.
    fn float_field(&self, slot: &Value, steps: &[Step]) -> bool {
        let Some((Step::Field(last), prefix)) = steps.split_last() else {
            return false;
        };
        let mut cur = slot;
        for step in prefix {
            match (step, cur) {
                (Step::Field(name), Value::Record { fields, .. }) => match fields.get(name) {
                    Some(f) => cur = f,
                    None => return false,
                },
                _ => return false,
            }
        }
        let Value::Record { type_name, fields } = cur else {
            return false;
        };
        if fields.get(last).is_some_and(is_float) {
            return true;
        }
        self.records.get(type_name).is_some_and(|rec| {
            rec.fields.iter().any(|f| {
                f.name.node == *last && matches!(&f.ty, DeclType::Spec(spec) if spec_is_float(spec))
            })
        })
    }

    fn lvalue_path(&mut self, target: &Expr, steps: &mut Vec<Step>) -> Result<String, RuntimeError> {
        match &target.kind {
            ExprKind::Ident(id) => Ok(id.node.clone()),
            ExprKind::Index { base, index } => {
                let root = self.lvalue_path(base, steps)?;
                match index {
                    Index::Elements(items) => {
                        let mut idx = Vec::with_capacity(items.len());
                        for item in items {
                            idx.push(self.eval_int(item, "index must be an integer")?);
                        }
                        steps.push(Step::Elements(idx));
                    }
                    Index::Slice(slice) => {
                        return Err(self.error(slice.loc, "cannot assign to a slice"));
                    }
                }
                Ok(root)
            }
            ExprKind::Member { base, field } => {
                let root = self.lvalue_path(base, steps)?;
                steps.push(Step::Field(field.node.clone()));
                Ok(root)
            }
            _ => Err(self.error(target.loc, "invalid assignment target")),
        }
    }

    // --- expressions ---

    fn truthy(&self, v: &Value, loc: Loc) -> Result<bool, RuntimeError> {
        v.truthy().map_err(|m| self.error(loc, m))
    }

    fn apply(&self, op: BinOp, l: &Value, r: &Value, loc: Loc) -> Result<Value, RuntimeError> {
        ops::binary(op, l, r).map_err(|m| self.error_op(loc, m, op.symbol()))
    }

    fn eval_int(&mut self, expr: &Expr, what: &str) -> Result<i64, RuntimeError> {
        match self.eval(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(self.error(expr.loc, format!("{what}, found {}", other.type_name()))),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Value::from_literal(lit)),
            ExprKind::Ident(id) => match self.lookup(&id.node) {
                Some(Value::Null) => Err(self.error(
                    expr.loc,
                    format!("variable '{}' is used before it is initialized", id.node),
                )),
                Some(v) => Ok(v.clone()),
                None => Err(self.error(expr.loc, format!("undefined variable '{}'", id.node))),
            },
            ExprKind::Binary { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                self.apply(*op, &l, &r, expr.loc)
            }
            ExprKind::Compare { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                ops::compare(*op, &l, &r).map_err(|m| self.error_op(expr.loc, m, op.symbol()))
            }
            ExprKind::Unary {
                op: UnaryOp::AddrOf,
                expr: inner,
            } => {
                let addr = match inner.root_name() {
                    Some(name) => self.address_of(name),
                    None => "0x0".to_string(),
                };
                Ok(Value::Pointer(addr))
            }
            ExprKind::Unary { op, expr: inner } => {
                let v = self.eval(inner)?;
                ops::unary(*op, &v).map_err(|m| self.error_op(expr.loc, m, op.symbol()))
            }
            ExprKind::Call { callee, args } => self.call(callee, args, expr.loc),
            ExprKind::Index { base, index } => {
                let b = self.eval(base)?;
                match index {
                    Index::Elements(items) => {
                        let mut idx = Vec::with_capacity(items.len());
                        for item in items {
                            idx.push(self.eval_int(item, "index must be an integer")?);
                        }
                        index_value(&b, &idx).map_err(|m| self.error(expr.loc, m))
                    }
                    Index::Slice(slice) => {
                        let start = self.eval_int(&slice.start, "slice bounds must be integers")?;
                        let end = self.eval_int(&slice.end, "slice bounds must be integers")?;
                        slice_value(&b, start, end).map_err(|m| self.error(expr.loc, m))
                    }
                }
            }
            ExprKind::Member { base, field } => match self.eval(base)? {
                Value::Record { type_name, fields } => {
                    fields.get(&field.node).cloned().ok_or_else(|| {
                        self.error(
                            field.loc,
                            format!("record '{type_name}' has no field '{}'", field.node),
                        )
                    })
                }
                other => Err(self.error(
                    field.loc,
                    format!("cannot access field '{}' on {}", field.node, other.type_name()),
                )),
            },
            ExprKind::Array(elems) => {
                let mut values = Vec::with_capacity(elems.len());
                for e in elems {
                    values.push(self.eval(e)?);
                }
                build_array(values).map_err(|m| self.error(expr.loc, m))
            }
        }
    }

    fn call(&mut self, callee: &Ident, args: &[Expr], loc: Loc) -> Result<Value, RuntimeError> {
        let Some(func) = self.functions.get(&callee.node).cloned() else {
            if callee.node == "print" {
                let mut parts = Vec::with_capacity(args.len());
                for a in args {
                    parts.push(self.eval(a)?.to_string());
                }
                self.stdout.push_str(&parts.join(" "));
                self.stdout.push('\n');
                return Ok(Value::Null);
            }
            return Err(self.error(loc, format!("undefined function '{}'", callee.node)));
        };

        if args.len() != func.params.len() {
            return Err(self.error(
                loc,
                format!(
                    "function '{}' expects {} argument(s), found {}",
                    callee.node,
                    func.params.len(),
                    args.len()
                ),
            ));
        }

        // Arguments are evaluated in the caller's environment.
        let mut frame = HashMap::with_capacity(args.len());
        let mut floats = HashSet::new();
        for (param, arg) in func.params.iter().zip(args) {
            let v = self.eval(arg)?;
            if spec_is_float(&param.ty) {
                floats.insert(param.name.node.clone());
            }
            frame.insert(param.name.node.clone(), coerce(&param.ty, v));
        }

        if self.call_depth >= self.cfg.max_call_depth {
            return Err(self.error(
                loc,
                format!(
                    "maximum call depth of {} exceeded in '{}'",
                    self.cfg.max_call_depth, callee.node
                ),
            ));
        }

        debug!(function = %callee.node, depth = self.call_depth + 1, "call");
        let saved_locals = self.locals.replace(frame);
        let saved_floats = mem::replace(&mut self.local_floats, floats);
        let saved_loops = mem::replace(&mut self.loop_depth, 0);
        self.call_depth += 1;

        let result = self.exec_block(&func.body);

        self.call_depth -= 1;
        self.loop_depth = saved_loops;
        self.locals = saved_locals;
        self.local_floats = saved_floats;

        match result? {
            Flow::Return(v) => Ok(coerce(&func.ret, v)),
            Flow::Normal | Flow::Break | Flow::Continue => Ok(Value::Null),
        }
    }
}

fn dtype_kind(dtype: DType) -> ElemKind {
    if dtype.is_float() {
        ElemKind::Float
    } else if dtype.is_int() {
        ElemKind::Int
    } else {
        ElemKind::Bool
    }
}

fn spec_is_float(spec: &TypeSpec) -> bool {
    matches!(spec, TypeSpec::Builtin { dtype, .. } if dtype.is_float())
}

fn is_float(v: &Value) -> bool {
    matches!(
        v,
        Value::Float(_)
            | Value::Array {
                kind: ElemKind::Float,
                ..
            }
    )
}

/// Integer scalars and arrays stored into a float slot become float.
fn widen(value: Value) -> Value {
    match value {
        Value::Int(n) => Value::Float(n as f64),
        Value::Array {
            data,
            kind: ElemKind::Int,
        } => Value::Array {
            data,
            kind: ElemKind::Float,
        },
        other => other,
    }
}

/// Fit a value into a declared slot: float dtypes widen integers and a scalar
/// fills a declared non-scalar shape.
fn coerce(spec: &TypeSpec, value: Value) -> Value {
    let TypeSpec::Builtin { dtype, shape } = spec else {
        return value;
    };
    let kind = dtype_kind(*dtype);

    if !shape.dims.is_empty() {
        if let Some((x, _)) = value.as_element() {
            return Value::Array {
                data: ArrayD::from_elem(IxDyn(&shape.dims), x),
                kind,
            };
        }
    }

    match value {
        Value::Int(n) if kind == ElemKind::Float => Value::Float(n as f64),
        Value::Array { data, kind: k } if kind == ElemKind::Float && k != ElemKind::Float => {
            Value::Array {
                data,
                kind: ElemKind::Float,
            }
        }
        other => other,
    }
}

fn resolve_indices(shape: &[usize], idx: &[i64]) -> Result<Vec<usize>, String> {
    if idx.len() > shape.len() {
        return Err(format!(
            "too many indices: array has rank {}, found {}",
            shape.len(),
            idx.len()
        ));
    }
    idx.iter()
        .zip(shape)
        .enumerate()
        .map(|(axis, (&i, &len))| {
            let len = len as i64;
            let j = if i < 0 { i + len } else { i };
            if j < 0 || j >= len {
                Err(format!("index {i} is out of bounds for axis {axis} with size {len}"))
            } else {
                Ok(j as usize)
            }
        })
        .collect()
}

fn read_at(data: ArrayViewD<'_, f64>, kind: ElemKind, resolved: &[usize]) -> Value {
    let mut view = data;
    for &i in resolved {
        view = view.index_axis_move(Axis(0), i);
    }
    if view.ndim() == 0 {
        match view.iter().next() {
            Some(x) => Value::from_element(*x, kind),
            None => Value::Null,
        }
    } else {
        Value::Array {
            data: view.to_owned(),
            kind,
        }
    }
}

fn index_value(v: &Value, idx: &[i64]) -> Result<Value, String> {
    match v {
        Value::Array { data, kind } => {
            let resolved = resolve_indices(data.shape(), idx)?;
            Ok(read_at(data.view(), *kind, &resolved))
        }
        other => Err(format!("cannot index a value of type {}", other.type_name())),
    }
}

/// `x[a..b]` along the first axis; bounds wrap when negative and clamp to the
/// axis length.
fn slice_value(v: &Value, start: i64, end: i64) -> Result<Value, String> {
    let Value::Array { data, kind } = v else {
        return Err(format!("cannot slice a value of type {}", v.type_name()));
    };
    let Some(&len) = data.shape().first() else {
        return Err("cannot slice a scalar".to_string());
    };
    let len = len as i64;
    let clamp = |i: i64| {
        let i = if i < 0 { i + len } else { i };
        i.clamp(0, len) as usize
    };
    let (s, e) = (clamp(start), clamp(end));
    let e = e.max(s);
    Ok(Value::Array {
        data: data.slice_axis(Axis(0), AxisSlice::from(s..e)).to_owned(),
        kind: *kind,
    })
}

fn build_array(values: Vec<Value>) -> Result<Value, String> {
    if values.is_empty() {
        return Ok(Value::Array {
            data: ArrayD::zeros(IxDyn(&[0])),
            kind: ElemKind::Float,
        });
    }

    if values.iter().all(|v| v.as_element().is_some()) {
        let mut kind: Option<ElemKind> = None;
        let mut flat = Vec::with_capacity(values.len());
        for v in &values {
            if let Some((x, k)) = v.as_element() {
                kind = Some(kind.map_or(k, |acc| acc.join(k)));
                flat.push(x);
            }
        }
        let data = ArrayD::from_shape_vec(IxDyn(&[flat.len()]), flat).map_err(|e| e.to_string())?;
        return Ok(Value::Array {
            data,
            kind: kind.unwrap_or(ElemKind::Float),
        });
    }

    let mut inner: Option<Vec<usize>> = None;
    let mut kind: Option<ElemKind> = None;
    let mut flat = Vec::new();
    for v in &values {
        match v {
            Value::Array { data, kind: k } => {
                match &inner {
                    Some(shape) if shape.as_slice() != data.shape() => {
                        return Err("ragged array literal: elements have different shapes".into());
                    }
                    Some(_) => {}
                    None => inner = Some(data.shape().to_vec()),
                }
                kind = Some(kind.map_or(*k, |acc| acc.join(*k)));
                flat.extend(data.iter().copied());
            }
            other if other.as_element().is_some() => {
                return Err("ragged array literal: elements have different shapes".into());
            }
            other => {
                return Err(format!(
                    "array elements must be numeric or boolean, found {}",
                    other.type_name()
                ));
            }
        }
    }

    let mut shape = vec![values.len()];
    shape.extend(inner.unwrap_or_default());
    let data = ArrayD::from_shape_vec(IxDyn(&shape), flat).map_err(|e| e.to_string())?;
    Ok(Value::Array {
        data,
        kind: kind.unwrap_or(ElemKind::Float),
    })
}

fn write_path(slot: &mut Value, steps: &[Step], op: AssignOp, value: Value) -> Result<(), String> {
    let Some((last, prefix)) = steps.split_last() else {
        return Err("invalid assignment target".to_string());
    };

    let mut cur = slot;
    for step in prefix {
        cur = match (step, cur) {
            (Step::Field(name), Value::Record { type_name, fields }) => {
                match fields.get_mut(name) {
                    Some(f) => f,
                    None => return Err(format!("record '{type_name}' has no field '{name}'")),
                }
            }
            (Step::Field(name), other) => {
                return Err(format!("cannot access field '{name}' on {}", other.type_name()));
            }
            (Step::Elements(_), other) => {
                return Err(format!(
                    "cannot assign through an element of {}",
                    other.type_name()
                ));
            }
        };
    }

    match (last, cur) {
        (Step::Field(name), Value::Record { type_name, fields }) => {
            let Some(field) = fields.get_mut(name) else {
                return Err(format!("record '{type_name}' has no field '{name}'"));
            };
            let new = match op.binary() {
                None => value,
                Some(bin) => ops::binary(bin, field, &value)?,
            };
            *field = new;
            Ok(())
        }
        (Step::Field(name), other) => {
            Err(format!("cannot access field '{name}' on {}", other.type_name()))
        }
        (Step::Elements(idx), Value::Array { data, kind }) => {
            store_elements(data, kind, idx, op, value)
        }
        (Step::Elements(_), other) => {
            Err(format!("cannot index a value of type {}", other.type_name()))
        }
    }
}

fn store_elements(
    data: &mut ArrayD<f64>,
    kind: &mut ElemKind,
    idx: &[i64],
    op: AssignOp,
    value: Value,
) -> Result<(), String> {
    let resolved = resolve_indices(data.shape(), idx)?;
    let new = match op.binary() {
        None => value,
        Some(bin) => {
            let current = read_at(data.view(), *kind, &resolved);
            ops::binary(bin, &current, &value)?
        }
    };

    let mut view = data.view_mut();
    for &i in &resolved {
        view = view.index_axis_move(Axis(0), i);
    }
    match new {
        Value::Array { data: src, kind: k } => {
            if view.shape() != src.shape() {
                return Err(format!(
                    "shape mismatch in element assignment: expected {}, found {}",
                    shape_text(view.shape()),
                    shape_text(src.shape())
                ));
            }
            view.assign(&src);
            *kind = kind.join(k);
        }
        scalar => {
            let Some((x, k)) = scalar.as_element() else {
                return Err(format!("cannot store {} in an array", scalar.type_name()));
            };
            view.fill(x);
            *kind = kind.join(k);
        }
    }
    Ok(())
}
