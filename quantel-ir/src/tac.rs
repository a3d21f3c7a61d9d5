#![forbid(unsafe_code)]

use std::fmt;

use quantel_ast::{
    AssignOp, Block, DeclType, Expr, ExprKind, FuncDecl, Index, Literal, Program, Stmt, UnaryOp,
};

/// Right-hand side of an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Temp(u32),
    Name(String),
    Const(Literal),
    /// `&x`, only produced by pointer declarations.
    Addr(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(n) => write!(f, "t{n}"),
            Operand::Name(name) => f.write_str(name),
            Operand::Const(lit) => write!(f, "{lit}"),
            Operand::Addr(name) => write!(f, "&{name}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TacInstr {
    Import(String),
    Record(String),
    Func(String),
    EndFunc(String),
    Param(String),
    Alloc { name: String, ty: String },
    Assign { dst: String, src: Operand },
    Compound { dst: String, op: AssignOp, src: Operand },
    Binary { dst: u32, left: Operand, op: &'static str, right: Operand },
    Unary { dst: u32, op: &'static str, src: Operand },
    Call { dst: u32, callee: String, args: Vec<Operand> },
    Array { dst: u32, elems: Vec<Operand> },
    Index { dst: u32, base: Operand, indices: Vec<Operand> },
    Slice { dst: u32, base: Operand, start: Operand, end: Operand },
    Field { dst: u32, base: Operand, field: String },
    IndexStore { base: Operand, indices: Vec<Operand>, src: Operand },
    FieldStore { base: Operand, field: String, src: Operand },
    IfFalse { cond: Operand, label: String },
    /// `IF a >= b GOTO L`; loop exit test of a lowered `for`.
    CondGoto { left: Operand, op: &'static str, right: Operand, label: String },
    Goto(String),
    Label(String),
    Return(Option<Operand>),
    Probe(Operand),
}

fn join(items: &[Operand]) -> String {
    items
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for TacInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacInstr::Import(m) => write!(f, "IMPORT {m}"),
            TacInstr::Record(r) => write!(f, "RECORD {r}"),
            TacInstr::Func(name) => write!(f, "FUNC {name}:"),
            TacInstr::EndFunc(name) => write!(f, "ENDFUNC {name}"),
            TacInstr::Param(p) => write!(f, "PARAM {p}"),
            TacInstr::Alloc { name, ty } => write!(f, "ALLOC {name} ({ty})"),
            TacInstr::Assign { dst, src } => write!(f, "{dst} = {src}"),
            TacInstr::Compound { dst, op, src } => write!(f, "{dst} {} {src}", op.symbol()),
            TacInstr::Binary {
                dst,
                left,
                op,
                right,
            } => write!(f, "t{dst} = {left} {op} {right}"),
            TacInstr::Unary { dst, op, src } => write!(f, "t{dst} = {op}{src}"),
            TacInstr::Call { dst, callee, args } => {
                write!(f, "t{dst} = CALL {callee}({})", join(args))
            }
            TacInstr::Array { dst, elems } => write!(f, "t{dst} = ARRAY [{}]", join(elems)),
            TacInstr::Index { dst, base, indices } => {
                write!(f, "t{dst} = {base}[{}]", join(indices))
            }
            TacInstr::Slice {
                dst,
                base,
                start,
                end,
            } => write!(f, "t{dst} = {base}[{start}..{end}]"),
            TacInstr::Field { dst, base, field } => write!(f, "t{dst} = {base}.{field}"),
            TacInstr::IndexStore { base, indices, src } => {
                write!(f, "{base}[{}] = {src}", join(indices))
            }
            TacInstr::FieldStore { base, field, src } => write!(f, "{base}.{field} = {src}"),
            TacInstr::IfFalse { cond, label } => write!(f, "IF_FALSE {cond} GOTO {label}"),
            TacInstr::CondGoto {
                left,
                op,
                right,
                label,
            } => write!(f, "IF {left} {op} {right} GOTO {label}"),
            TacInstr::Goto(label) => write!(f, "GOTO {label}"),
            TacInstr::Label(label) => write!(f, "{label}:"),
            TacInstr::Return(Some(v)) => write!(f, "RETURN {v}"),
            TacInstr::Return(None) => f.write_str("RETURN"),
            TacInstr::Probe(v) => write!(f, "PROBE {v}"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TacProgram {
    pub instrs: Vec<TacInstr>,
}

impl TacProgram {
    pub fn lines(&self) -> Vec<String> {
        self.instrs.iter().map(|i| i.to_string()).collect()
    }
}

impl fmt::Display for TacProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.instrs {
            writeln!(f, "{instr}")?;
        }
        Ok(())
    }
}

/// Lower `program` to a linear instruction log. Counters start fresh on every
/// call, so equal programs give equal output.
pub fn generate(program: &Program) -> TacProgram {
    let mut generator = TacGen::default();
    for import in &program.imports {
        generator.emit(TacInstr::Import(import.name.node.clone()));
    }
    for stmt in &program.stmts {
        generator.lower_stmt(stmt);
    }
    TacProgram {
        instrs: generator.instrs,
    }
}

struct LoopLabels {
    continue_to: String,
    end: String,
}

#[derive(Default)]
struct TacGen {
    instrs: Vec<TacInstr>,
    next_temp: u32,
    next_label: u32,
    loops: Vec<LoopLabels>,
}

impl TacGen {
    fn emit(&mut self, instr: TacInstr) {
        self.instrs.push(instr);
    }

    fn fresh_temp(&mut self) -> u32 {
        self.next_temp += 1;
        self.next_temp
    }

    fn fresh_label_id(&mut self) -> u32 {
        self.next_label += 1;
        self.next_label
    }

    fn lower_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.lower_stmt(stmt);
        }
    }

    fn lower_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(b) => self.lower_block(b),
            Stmt::VarDecl(decl) => match &decl.init {
                Some(init) => {
                    let src = self.lower_expr(init);
                    self.emit(TacInstr::Assign {
                        dst: decl.name.node.clone(),
                        src,
                    });
                }
                None => {
                    let ty = match &decl.ty {
                        DeclType::Spec(spec) => spec.to_string(),
                        DeclType::Auto => "auto".to_string(),
                    };
                    self.emit(TacInstr::Alloc {
                        name: decl.name.node.clone(),
                        ty,
                    });
                }
            },
            Stmt::PointerDecl(decl) => self.emit(TacInstr::Assign {
                dst: decl.name.node.clone(),
                src: Operand::Addr(decl.target.node.clone()),
            }),
            Stmt::RecordDecl(rec) => self.emit(TacInstr::Record(rec.name.node.clone())),
            Stmt::FuncDecl(func) => self.lower_func(func),
            Stmt::Assign(assign) => self.lower_assign(&assign.target, assign.op, &assign.value),
            Stmt::If(s) => {
                let id = self.fresh_label_id();
                let end = format!("L_END_{id}");
                let cond = self.lower_expr(&s.cond);
                match &s.else_block {
                    Some(else_block) => {
                        let else_label = format!("L_ELSE_{id}");
                        self.emit(TacInstr::IfFalse {
                            cond,
                            label: else_label.clone(),
                        });
                        self.lower_block(&s.then_block);
                        self.emit(TacInstr::Goto(end.clone()));
                        self.emit(TacInstr::Label(else_label));
                        self.lower_block(else_block);
                    }
                    None => {
                        self.emit(TacInstr::IfFalse {
                            cond,
                            label: end.clone(),
                        });
                        self.lower_block(&s.then_block);
                    }
                }
                self.emit(TacInstr::Label(end));
            }
            Stmt::While(s) => {
                let id = self.fresh_label_id();
                let head = format!("L_WHILE_{id}");
                let end = format!("L_END_{id}");
                self.emit(TacInstr::Label(head.clone()));
                let cond = self.lower_expr(&s.cond);
                self.emit(TacInstr::IfFalse {
                    cond,
                    label: end.clone(),
                });
                self.lower_loop_body(&s.body, head.clone(), end.clone());
                self.emit(TacInstr::Goto(head));
                self.emit(TacInstr::Label(end));
            }
            Stmt::RepeatUntil(s) => {
                let id = self.fresh_label_id();
                let head = format!("L_REPEAT_{id}");
                let until = format!("L_UNTIL_{id}");
                let end = format!("L_END_{id}");
                self.emit(TacInstr::Label(head.clone()));
                self.lower_loop_body(&s.body, until.clone(), end.clone());
                self.emit(TacInstr::Label(until));
                let cond = self.lower_expr(&s.cond);
                self.emit(TacInstr::IfFalse { cond, label: head });
                self.emit(TacInstr::Label(end));
            }
            Stmt::For(s) => {
                let id = self.fresh_label_id();
                let head = format!("L_FOR_{id}");
                let step_label = format!("L_STEP_{id}");
                let end = format!("L_END_{id}");
                let var = s.var.node.clone();

                let start = self.lower_expr(&s.range.start);
                let limit = self.lower_expr(&s.range.end);
                let step = match &s.range.step {
                    Some(e) => self.lower_expr(e),
                    None => Operand::Const(Literal::Int(1)),
                };
                let exit_op = match &step {
                    Operand::Const(Literal::Int(n)) if *n < 0 => "<=",
                    _ => ">=",
                };

                self.emit(TacInstr::Assign {
                    dst: var.clone(),
                    src: start,
                });
                self.emit(TacInstr::Label(head.clone()));
                self.emit(TacInstr::CondGoto {
                    left: Operand::Name(var.clone()),
                    op: exit_op,
                    right: limit,
                    label: end.clone(),
                });
                self.lower_loop_body(&s.body, step_label.clone(), end.clone());
                self.emit(TacInstr::Label(step_label));
                self.emit(TacInstr::Compound {
                    dst: var,
                    op: AssignOp::Add,
                    src: step,
                });
                self.emit(TacInstr::Goto(head));
                self.emit(TacInstr::Label(end));
            }
            Stmt::Return(ret) => {
                let value = ret.value.as_ref().map(|v| self.lower_expr(v));
                self.emit(TacInstr::Return(value));
            }
            Stmt::Break(_) => {
                if let Some(target) = self.loops.last().map(|l| l.end.clone()) {
                    self.emit(TacInstr::Goto(target));
                }
            }
            Stmt::Continue(_) => {
                if let Some(target) = self.loops.last().map(|l| l.continue_to.clone()) {
                    self.emit(TacInstr::Goto(target));
                }
            }
            Stmt::Probe(p) => {
                let v = self.lower_expr(&p.expr);
                self.emit(TacInstr::Probe(v));
            }
            Stmt::Expr(e) => {
                let _ = self.lower_expr(e);
            }
        }
    }

    fn lower_loop_body(&mut self, body: &Block, continue_to: String, end: String) {
        self.loops.push(LoopLabels { continue_to, end });
        self.lower_block(body);
        self.loops.pop();
    }

    fn lower_func(&mut self, func: &FuncDecl) {
        let name = func.name.node.clone();
        self.emit(TacInstr::Func(name.clone()));
        for p in &func.params {
            self.emit(TacInstr::Param(p.name.node.clone()));
        }
        // Loop labels never cross a function boundary.
        let outer = std::mem::take(&mut self.loops);
        self.lower_block(&func.body);
        self.loops = outer;
        self.emit(TacInstr::EndFunc(name));
    }

    fn lower_assign(&mut self, target: &Expr, op: AssignOp, value: &Expr) {
        let src = self.lower_expr(value);
        match &target.kind {
            ExprKind::Ident(id) => {
                let dst = id.node.clone();
                match op {
                    AssignOp::Set => self.emit(TacInstr::Assign { dst, src }),
                    _ => self.emit(TacInstr::Compound { dst, op, src }),
                }
            }
            ExprKind::Index { base, index } => {
                let base = self.lower_expr(base);
                let indices = match index {
                    Index::Elements(items) => items.iter().map(|e| self.lower_expr(e)).collect(),
                    Index::Slice(slice) => {
                        // Slice stores are not part of the language; keep the
                        // bounds visible anyway.
                        vec![self.lower_expr(&slice.start), self.lower_expr(&slice.end)]
                    }
                };
                let load = |dst| TacInstr::Index {
                    dst,
                    base: base.clone(),
                    indices: indices.clone(),
                };
                let src = self.combine_for_store(op, load, src);
                self.emit(TacInstr::IndexStore { base, indices, src });
            }
            ExprKind::Member { base, field } => {
                let base = self.lower_expr(base);
                let field = field.node.clone();
                let load = |dst| TacInstr::Field {
                    dst,
                    base: base.clone(),
                    field: field.clone(),
                };
                let src = self.combine_for_store(op, load, src);
                self.emit(TacInstr::FieldStore { base, field, src });
            }
            // Rejected by the parser; nothing sensible to store into.
            _ => {}
        }
    }

    /// For a compound store, load the current element, apply the operator and
    /// return the temp holding the result.
    fn combine_for_store(
        &mut self,
        op: AssignOp,
        load: impl FnOnce(u32) -> TacInstr,
        src: Operand,
    ) -> Operand {
        let Some(bin) = op.binary() else {
            return src;
        };
        let loaded = self.fresh_temp();
        self.emit(load(loaded));
        let combined = self.fresh_temp();
        self.emit(TacInstr::Binary {
            dst: combined,
            left: Operand::Temp(loaded),
            op: bin.symbol(),
            right: src,
        });
        Operand::Temp(combined)
    }

    fn lower_expr(&mut self, expr: &Expr) -> Operand {
        match &expr.kind {
            ExprKind::Literal(lit) => Operand::Const(lit.clone()),
            ExprKind::Ident(id) => Operand::Name(id.node.clone()),
            ExprKind::Binary { left, op, right } => {
                let left = self.lower_expr(left);
                let right = self.lower_expr(right);
                let dst = self.fresh_temp();
                self.emit(TacInstr::Binary {
                    dst,
                    left,
                    op: op.symbol(),
                    right,
                });
                Operand::Temp(dst)
            }
            ExprKind::Compare { left, op, right } => {
                let left = self.lower_expr(left);
                let right = self.lower_expr(right);
                let dst = self.fresh_temp();
                self.emit(TacInstr::Binary {
                    dst,
                    left,
                    op: op.symbol(),
                    right,
                });
                Operand::Temp(dst)
            }
            ExprKind::Unary { op, expr: inner } => {
                let src = match (op, &inner.kind) {
                    (UnaryOp::AddrOf, ExprKind::Ident(id)) => Operand::Name(id.node.clone()),
                    _ => self.lower_expr(inner),
                };
                let dst = self.fresh_temp();
                self.emit(TacInstr::Unary {
                    dst,
                    op: op.symbol(),
                    src,
                });
                Operand::Temp(dst)
            }
            ExprKind::Call { callee, args } => {
                let args = args.iter().map(|a| self.lower_expr(a)).collect();
                let dst = self.fresh_temp();
                self.emit(TacInstr::Call {
                    dst,
                    callee: callee.node.clone(),
                    args,
                });
                Operand::Temp(dst)
            }
            ExprKind::Array(elems) => {
                let elems = elems.iter().map(|e| self.lower_expr(e)).collect();
                let dst = self.fresh_temp();
                self.emit(TacInstr::Array { dst, elems });
                Operand::Temp(dst)
            }
            ExprKind::Index { base, index } => {
                let base = self.lower_expr(base);
                match index {
                    Index::Elements(items) => {
                        let indices = items.iter().map(|e| self.lower_expr(e)).collect();
                        let dst = self.fresh_temp();
                        self.emit(TacInstr::Index { dst, base, indices });
                        Operand::Temp(dst)
                    }
                    Index::Slice(slice) => {
                        let start = self.lower_expr(&slice.start);
                        let end = self.lower_expr(&slice.end);
                        let dst = self.fresh_temp();
                        self.emit(TacInstr::Slice {
                            dst,
                            base,
                            start,
                            end,
                        });
                        Operand::Temp(dst)
                    }
                }
            }
            ExprKind::Member { base, field } => {
                let base = self.lower_expr(base);
                let dst = self.fresh_temp();
                self.emit(TacInstr::Field {
                    dst,
                    base,
                    field: field.node.clone(),
                });
                Operand::Temp(dst)
            }
        }
    }
}
