#![forbid(unsafe_code)]

use std::mem;

use quantel_ast::{
    Assign, AssignOp, BinOp, Block, CmpOp, DType, DeclType, Expr, ExprKind, ForStmt, FuncDecl,
    FuncParam, Ident, IfStmt, Import, Index, Literal, Loc, PointerDecl, ProbeStmt, Program, Range,
    RecordDecl, RepeatUntilStmt, ReturnStmt, ShapeKind, ShapeType, Slice, Stmt, TypeSpec, UnaryOp,
    VarDecl, WhileStmt,
};
use quantel_lex::{Token, TokenKind, KEYWORDS};

use crate::error::ParseError;

/// Deepest combined nesting of blocks, `else if` links, parentheses and
/// prefix operators.
const MAX_NESTING: usize = 128;

pub struct Parser<'a> {
    tokens: &'a [Token],
    idx: usize,
    errors: Vec<ParseError>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// `tokens` must end with `Eof`, as produced by the lexer.
    pub fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            idx: 0,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Run `f` one nesting level deeper, failing past `MAX_NESTING`.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_NESTING {
            let tok = self.peek();
            return Err(ParseError {
                message: "expression or block nested too deeply".to_string(),
                hint: Some(format!("at most {MAX_NESTING} levels of nesting are supported")),
                line: tok.line,
                span: tok.span,
            });
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let (program, mut errors) = self.parse_program_with_recovery();
        if errors.is_empty() {
            Ok(program)
        } else {
            Err(errors.remove(0))
        }
    }

    /// Parse a program while recovering from errors.
    ///
    /// On a malformed statement, one error is recorded and tokens are
    /// discarded up to the next `;` (or the end of a brace group the bad
    /// statement opened, or an enclosing `}`), then parsing resumes. Always
    /// returns a program.
    pub fn parse_program_with_recovery(&mut self) -> (Program, Vec<ParseError>) {
        let mut imports = Vec::new();
        while self.at(TokenKind::KwImport) {
            let start = self.idx;
            match self.parse_import() {
                Ok(import) => imports.push(import),
                Err(err) => self.record(err, start),
            }
        }

        let mut stmts = Vec::new();
        while !self.at(TokenKind::Eof) {
            let start = self.idx;
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => self.record(err, start),
            }
        }

        (Program { imports, stmts }, mem::take(&mut self.errors))
    }

    fn record(&mut self, mut err: ParseError, start: usize) {
        if err.hint.is_none() {
            err.hint = self.keyword_suggestion(start);
        }
        self.errors.push(err);
        self.recover_to_stmt_boundary(start);
    }

    fn recover_to_stmt_boundary(&mut self, start: usize) {
        let mut depth = 0usize;
        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Semi if depth == 0 => {
                    self.bump();
                    break;
                }
                TokenKind::LBrace => {
                    depth += 1;
                    self.bump();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        // Belongs to an enclosing block.
                        break;
                    }
                    depth -= 1;
                    self.bump();
                    if depth == 0 {
                        break;
                    }
                }
                _ => {
                    self.bump();
                }
            }
        }

        // Always make progress (e.g. a stray `}` at top level).
        if self.idx == start && !self.at(TokenKind::Eof) {
            self.bump();
        }
    }

    fn keyword_suggestion(&self, start: usize) -> Option<String> {
        let TokenKind::Ident(word) = &self.tokens.get(start)?.kind else {
            return None;
        };
        if word.len() < 3 {
            return None;
        }
        // `foo = ...` is an assignment, not a misspelt `for`.
        let assigns = matches!(
            self.tokens.get(start + 1).map(|t| &t.kind),
            Some(
                TokenKind::Eq
                    | TokenKind::PlusEq
                    | TokenKind::MinusEq
                    | TokenKind::StarEq
                    | TokenKind::SlashEq
                    | TokenKind::AtEq
            )
        );
        if assigns {
            return None;
        }
        KEYWORDS
            .iter()
            .map(|kw| (strsim::levenshtein(word, kw), *kw))
            .filter(|(dist, _)| *dist > 0 && *dist <= 2)
            .min_by_key(|(dist, _)| *dist)
            .map(|(_, kw)| format!("did you mean '{kw}'?"))
    }

    fn parse_import(&mut self) -> Result<Import, ParseError> {
        let kw = self.expect(TokenKind::KwImport)?;
        let name = self.expect_ident()?;
        self.expect_semi()?;
        Ok(Import {
            loc: loc_of(&kw).to(name.loc),
            name,
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            TokenKind::KwFunc => Ok(Stmt::FuncDecl(self.parse_func_decl()?)),
            TokenKind::KwRecord => Ok(Stmt::RecordDecl(self.parse_record_decl()?)),
            TokenKind::KwIf => Ok(Stmt::If(self.parse_if_stmt()?)),
            TokenKind::KwWhile => Ok(Stmt::While(self.parse_while_stmt()?)),
            TokenKind::KwRepeat => Ok(Stmt::RepeatUntil(self.parse_repeat_stmt()?)),
            TokenKind::KwFor => Ok(Stmt::For(self.parse_for_stmt()?)),
            TokenKind::KwReturn => {
                let kw = self.bump();
                let value = if self.at(TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect_semi()?;
                let loc = match &value {
                    Some(v) => loc_of(&kw).to(v.loc),
                    None => loc_of(&kw),
                };
                Ok(Stmt::Return(ReturnStmt { loc, value }))
            }
            TokenKind::KwBreak => {
                let kw = self.bump();
                self.expect_semi()?;
                Ok(Stmt::Break(loc_of(&kw)))
            }
            TokenKind::KwContinue => {
                let kw = self.bump();
                self.expect_semi()?;
                Ok(Stmt::Continue(loc_of(&kw)))
            }
            TokenKind::KwProbe => {
                let kw = self.bump();
                self.expect(TokenKind::LParen)?;
                let expr = self.parse_expr()?;
                let rp = self.expect(TokenKind::RParen)?;
                self.expect_semi()?;
                Ok(Stmt::Probe(ProbeStmt {
                    loc: loc_of(&kw).to(loc_of(&rp)),
                    expr,
                }))
            }
            TokenKind::KwAuto => {
                let kw = self.bump();
                let name = self.expect_ident()?;
                self.expect(TokenKind::Eq)?;
                let init = self.parse_expr()?;
                self.expect_semi()?;
                Ok(Stmt::VarDecl(VarDecl {
                    loc: loc_of(&kw).to(init.loc),
                    ty: DeclType::Auto,
                    name,
                    init: Some(init),
                }))
            }
            TokenKind::DType(_) | TokenKind::Shape(_) => self.parse_typed_decl(),
            TokenKind::Ident(_) if matches!(self.peek_kind_n(1), TokenKind::Ident(_)) => {
                Ok(Stmt::VarDecl(self.parse_record_typed_decl()?))
            }
            TokenKind::KwImport => {
                let tok = self.peek().clone();
                Err(ParseError {
                    message: "imports must appear before any other statement".to_string(),
                    hint: Some("move this import to the top of the file".to_string()),
                    line: tok.line,
                    span: tok.span,
                })
            }
            TokenKind::RBrace => {
                let tok = self.peek().clone();
                Err(ParseError {
                    message: "unexpected '}' without a matching '{'".to_string(),
                    hint: None,
                    line: tok.line,
                    span: tok.span,
                })
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    fn parse_expr_or_assign(&mut self) -> Result<Stmt, ParseError> {
        let expr = self.parse_expr()?;

        let op = match self.peek_kind() {
            TokenKind::Eq => Some(AssignOp::Set),
            TokenKind::PlusEq => Some(AssignOp::Add),
            TokenKind::MinusEq => Some(AssignOp::Sub),
            TokenKind::StarEq => Some(AssignOp::Mul),
            TokenKind::SlashEq => Some(AssignOp::Div),
            TokenKind::AtEq => Some(AssignOp::MatMul),
            _ => None,
        };

        let Some(op) = op else {
            self.expect_semi()?;
            return Ok(Stmt::Expr(expr));
        };

        let op_tok = self.bump();
        if !matches!(
            expr.kind,
            ExprKind::Ident(_) | ExprKind::Index { .. } | ExprKind::Member { .. }
        ) {
            return Err(ParseError {
                message: format!("invalid assignment target before '{}'", op.symbol()),
                hint: Some("only variables, elements and record fields can be assigned".to_string()),
                line: op_tok.line,
                span: expr.loc.span,
            });
        }

        let value = self.parse_expr()?;
        self.expect_semi()?;
        Ok(Stmt::Assign(Assign {
            loc: expr.loc.to(value.loc),
            target: expr,
            op,
            value,
        }))
    }

    /// `dtype shape name [= expr];` or `dtype shape *name = &target;`
    fn parse_typed_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = loc_of(self.peek());
        let (dtype, shape) = self.parse_builtin_type()?;

        if self.at(TokenKind::Star) {
            self.bump();
            let name = self.expect_ident()?;
            self.expect(TokenKind::Eq)?;
            self.expect(TokenKind::Amp)?;
            let target = self.expect_ident()?;
            self.expect_semi()?;
            return Ok(Stmt::PointerDecl(PointerDecl {
                loc: start.to(target.loc),
                dtype,
                shape,
                name,
                target,
            }));
        }

        let name = self.expect_ident()?;
        let init = if self.at(TokenKind::Eq) {
            self.bump();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_semi()?;
        let end = init.as_ref().map(|e| e.loc).unwrap_or(name.loc);
        Ok(Stmt::VarDecl(VarDecl {
            loc: start.to(end),
            ty: DeclType::Spec(TypeSpec::Builtin { dtype, shape }),
            name,
            init,
        }))
    }

    /// `RecordType name;`
    fn parse_record_typed_decl(&mut self) -> Result<VarDecl, ParseError> {
        let ty = self.expect_ident()?;
        let name = self.expect_ident()?;
        self.expect_semi()?;
        Ok(VarDecl {
            loc: ty.loc.to(name.loc),
            ty: DeclType::Spec(TypeSpec::Record(ty)),
            name,
            init: None,
        })
    }

    /// Optional dtype (defaults to `float32`) followed by an optional shape
    /// (defaults to `scalar`); at least one of the two must be present.
    fn parse_builtin_type(&mut self) -> Result<(DType, ShapeType), ParseError> {
        let first = self.peek().clone();
        let dtype = match first.kind {
            TokenKind::DType(d) => {
                self.bump();
                Some(d)
            }
            _ => None,
        };

        let shape = match self.peek_kind() {
            TokenKind::Shape(_) => self.parse_shape()?,
            _ if dtype.is_some() => ShapeType {
                loc: loc_of(&first),
                kind: ShapeKind::Scalar,
                dims: Vec::new(),
            },
            _ => {
                let tok = self.peek().clone();
                return Err(ParseError {
                    message: format!("expected a type, found '{}'", tok.kind),
                    hint: None,
                    line: tok.line,
                    span: tok.span,
                });
            }
        };

        Ok((dtype.unwrap_or(DType::Float32), shape))
    }

    fn parse_shape(&mut self) -> Result<ShapeType, ParseError> {
        let tok = self.bump();
        let TokenKind::Shape(kind) = tok.kind else {
            return Err(ParseError {
                message: format!("expected a shape, found '{}'", tok.kind),
                hint: Some("shapes are scalar, vector<n>, matrix<n,m> or tensor<...>".to_string()),
                line: tok.line,
                span: tok.span,
            });
        };

        let mut loc = loc_of(&tok);
        let mut dims = Vec::new();
        if kind != ShapeKind::Scalar {
            self.expect(TokenKind::Lt)?;
            loop {
                let dim_tok = self.bump();
                match dim_tok.kind {
                    TokenKind::Int(n) if n > 0 => dims.push(n as usize),
                    TokenKind::Int(_) => {
                        return Err(ParseError {
                            message: "shape dimensions must be positive".to_string(),
                            hint: None,
                            line: dim_tok.line,
                            span: dim_tok.span,
                        });
                    }
                    other => {
                        return Err(ParseError {
                            message: format!("expected a dimension, found '{other}'"),
                            hint: Some("dimensions are integer literals".to_string()),
                            line: dim_tok.line,
                            span: dim_tok.span,
                        });
                    }
                }
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            let gt = self.expect(TokenKind::Gt)?;
            loc = loc.to(loc_of(&gt));
        }

        let rank_ok = match kind.rank() {
            Some(rank) => dims.len() == rank,
            None => !dims.is_empty(),
        };
        if !rank_ok {
            return Err(ParseError {
                message: format!(
                    "{} expects {} dimension(s), found {}",
                    kind.keyword(),
                    kind.rank().map(|r| r.to_string()).unwrap_or_else(|| "at least 1".to_string()),
                    dims.len()
                ),
                hint: None,
                line: loc.line,
                span: loc.span,
            });
        }

        Ok(ShapeType { loc, kind, dims })
    }

    fn parse_type_spec(&mut self) -> Result<TypeSpec, ParseError> {
        if let TokenKind::Ident(_) = self.peek_kind() {
            return Ok(TypeSpec::Record(self.expect_ident()?));
        }
        let (dtype, shape) = self.parse_builtin_type()?;
        Ok(TypeSpec::Builtin { dtype, shape })
    }

    fn parse_func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        let kw = self.expect(TokenKind::KwFunc)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                let start = loc_of(self.peek());
                let ty = self.parse_type_spec()?;
                let pname = self.expect_ident()?;
                params.push(FuncParam {
                    loc: start.to(pname.loc),
                    ty,
                    name: pname,
                });
                if self.at(TokenKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        if !self.at(TokenKind::Arrow) {
            let tok = self.peek().clone();
            return Err(ParseError {
                message: format!("expected '->' after parameters of '{}'", name.node),
                hint: Some("functions declare a return type: func f(...) -> int32 scalar { ... }".to_string()),
                line: tok.line,
                span: tok.span,
            });
        }
        self.bump();
        let ret = self.parse_type_spec()?;
        let body = self.parse_block()?;

        Ok(FuncDecl {
            loc: loc_of(&kw).to(body.loc),
            name,
            params,
            ret,
            body,
        })
    }

    fn parse_record_decl(&mut self) -> Result<RecordDecl, ParseError> {
        let kw = self.expect(TokenKind::KwRecord)?;
        let name = self.expect_ident()?;
        let lb = self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RBrace => break,
                TokenKind::Eof => {
                    return Err(ParseError {
                        message: format!("unterminated record '{}'; expected '}}'", name.node),
                        hint: None,
                        line: lb.line,
                        span: lb.span,
                    });
                }
                _ => {}
            }

            let start = self.idx;
            let field = match self.peek_kind() {
                TokenKind::DType(_) | TokenKind::Shape(_) => match self.parse_typed_decl() {
                    Ok(Stmt::VarDecl(d)) => Ok(d),
                    Ok(other) => Err(ParseError {
                        message: "record fields cannot be pointers".to_string(),
                        hint: None,
                        line: other.loc().line,
                        span: other.loc().span,
                    }),
                    Err(e) => Err(e),
                },
                TokenKind::Ident(_) => self.parse_record_typed_decl(),
                _ => {
                    let tok = self.peek().clone();
                    Err(ParseError {
                        message: format!("expected a field declaration, found '{}'", tok.kind),
                        hint: None,
                        line: tok.line,
                        span: tok.span,
                    })
                }
            };
            match field {
                Ok(f) => fields.push(f),
                Err(err) => self.record(err, start),
            }
        }
        let rb = self.expect(TokenKind::RBrace)?;

        Ok(RecordDecl {
            loc: loc_of(&kw).to(loc_of(&rb)),
            name,
            fields,
        })
    }

    fn parse_if_stmt(&mut self) -> Result<IfStmt, ParseError> {
        let kw = self.expect(TokenKind::KwIf)?;
        let cond = self.parse_paren_cond()?;
        let then_block = self.parse_block()?;

        let else_block = if self.at(TokenKind::KwElse) {
            self.bump();
            if self.at(TokenKind::KwIf) {
                // `else if` chains nest as a one-statement else block.
                let nested = self.nested(Self::parse_if_stmt)?;
                Some(Block {
                    loc: nested.loc,
                    stmts: vec![Stmt::If(nested)],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        let end = else_block.as_ref().map(|b| b.loc).unwrap_or(then_block.loc);
        Ok(IfStmt {
            loc: loc_of(&kw).to(end),
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_while_stmt(&mut self) -> Result<WhileStmt, ParseError> {
        let kw = self.expect(TokenKind::KwWhile)?;
        let cond = self.parse_paren_cond()?;
        let body = self.parse_block()?;
        Ok(WhileStmt {
            loc: loc_of(&kw).to(body.loc),
            cond,
            body,
        })
    }

    fn parse_repeat_stmt(&mut self) -> Result<RepeatUntilStmt, ParseError> {
        let kw = self.expect(TokenKind::KwRepeat)?;
        let body = self.parse_block()?;
        self.expect(TokenKind::KwUntil)?;
        let cond = self.parse_paren_cond()?;
        self.expect_semi()?;
        Ok(RepeatUntilStmt {
            loc: loc_of(&kw).to(cond.loc),
            body,
            cond,
        })
    }

    fn parse_for_stmt(&mut self) -> Result<ForStmt, ParseError> {
        let kw = self.expect(TokenKind::KwFor)?;
        let var = self.expect_ident()?;
        self.expect(TokenKind::KwIn)?;

        let start = self.parse_add_expr()?;
        self.expect(TokenKind::DotDot)?;
        let end = self.parse_add_expr()?;
        let step = if self.at(TokenKind::KwStep) {
            self.bump();
            Some(self.parse_add_expr()?)
        } else {
            None
        };
        let range_end = step.as_ref().map(|s| s.loc).unwrap_or(end.loc);
        let range = Range {
            loc: start.loc.to(range_end),
            start,
            end,
            step,
        };

        let body = self.parse_block()?;
        Ok(ForStmt {
            loc: loc_of(&kw).to(body.loc),
            var,
            range,
            body,
        })
    }

    fn parse_paren_cond(&mut self) -> Result<Expr, ParseError> {
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(cond)
    }

    /// `{ stmt* }` with per-statement recovery inside the braces.
    fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.nested(Self::parse_block_body)
    }

    fn parse_block_body(&mut self) -> Result<Block, ParseError> {
        let lb = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::RBrace => {
                    let rb = self.bump();
                    return Ok(Block {
                        loc: loc_of(&lb).to(loc_of(&rb)),
                        stmts,
                    });
                }
                TokenKind::Eof => {
                    return Err(ParseError {
                        message: "unterminated block; expected '}'".to_string(),
                        hint: Some(format!("the block opened on line {} is never closed", lb.line)),
                        line: lb.line,
                        span: lb.span,
                    });
                }
                _ => {}
            }

            let start = self.idx;
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => self.record(err, start),
            }
        }
    }

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.nested(Self::parse_or_expr)
    }

    /// A single expression spanning the whole token stream.
    pub fn parse_expr_eof(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr()?;
        if !self.at(TokenKind::Eof) {
            return Err(expected("end of input", self.peek()));
        }
        Ok(expr)
    }

    fn parse_or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expr()?;
        while self.at(TokenKind::OrOr) {
            self.bump();
            let right = self.parse_and_expr()?;
            left = binary(left, BinOp::Or, right);
        }
        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_cmp_expr()?;
        while self.at(TokenKind::AndAnd) {
            self.bump();
            let right = self.parse_cmp_expr()?;
            left = binary(left, BinOp::And, right);
        }
        Ok(left)
    }

    fn parse_cmp_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_add_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => CmpOp::Eq,
                TokenKind::Neq => CmpOp::Ne,
                TokenKind::Lt => CmpOp::Lt,
                TokenKind::Gt => CmpOp::Gt,
                TokenKind::Le => CmpOp::Le,
                TokenKind::Ge => CmpOp::Ge,
                _ => break,
            };
            self.bump();
            let right = self.parse_add_expr()?;
            left = Expr {
                loc: left.loc.to(right.loc),
                kind: ExprKind::Compare {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
            };
        }
        Ok(left)
    }

    fn parse_add_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_mul_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_mul_expr(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_pow_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                TokenKind::At => BinOp::MatMul,
                _ => break,
            };
            self.bump();
            let right = self.parse_pow_expr()?;
            left = binary(left, op, right);
        }
        Ok(left)
    }

    /// `^` is right-associative: `a ^ b ^ c` is `a ^ (b ^ c)`.
    fn parse_pow_expr(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_unary_expr()?;
        if self.at(TokenKind::Caret) {
            self.bump();
            let exp = self.nested(Self::parse_pow_expr)?;
            return Ok(binary(base, BinOp::Pow, exp));
        }
        Ok(base)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_addr_expr(),
        };
        let tok = self.bump();
        let expr = self.nested(Self::parse_unary_expr)?;
        Ok(unary(loc_of(&tok), op, expr))
    }

    fn parse_addr_expr(&mut self) -> Result<Expr, ParseError> {
        if self.at(TokenKind::Amp) {
            let tok = self.bump();
            let expr = self.nested(Self::parse_addr_expr)?;
            return Ok(unary(loc_of(&tok), UnaryOp::AddrOf, expr));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let lp = self.peek().clone();
                    let ExprKind::Ident(callee) = &expr.kind else {
                        return Err(ParseError {
                            message: "only named functions can be called".to_string(),
                            hint: None,
                            line: lp.line,
                            span: lp.span,
                        });
                    };
                    let callee = callee.clone();
                    self.bump();
                    let args = self.parse_args(TokenKind::RParen)?;
                    let rp = self.expect(TokenKind::RParen)?;
                    expr = Expr {
                        loc: expr.loc.to(loc_of(&rp)),
                        kind: ExprKind::Call { callee, args },
                    };
                }
                TokenKind::LBracket => {
                    self.bump();
                    let first = self.parse_expr()?;
                    let index = if self.at(TokenKind::DotDot) {
                        self.bump();
                        let end = self.parse_expr()?;
                        Index::Slice(Slice {
                            loc: first.loc.to(end.loc),
                            start: Box::new(first),
                            end: Box::new(end),
                        })
                    } else {
                        let mut elems = vec![first];
                        while self.at(TokenKind::Comma) {
                            self.bump();
                            elems.push(self.parse_expr()?);
                        }
                        Index::Elements(elems)
                    };
                    let rb = self.expect(TokenKind::RBracket)?;
                    expr = Expr {
                        loc: expr.loc.to(loc_of(&rb)),
                        kind: ExprKind::Index {
                            base: Box::new(expr),
                            index,
                        },
                    };
                }
                TokenKind::Dot => {
                    self.bump();
                    let field = self.expect_ident()?;
                    expr = Expr {
                        loc: expr.loc.to(field.loc),
                        kind: ExprKind::Member {
                            base: Box::new(expr),
                            field,
                        },
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.at(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.at(TokenKind::Comma) {
                self.bump();
                continue;
            }
            break;
        }
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        let loc = loc_of(&tok);
        let lit = |l: Literal| -> Result<Expr, ParseError> { Ok(Expr::literal(loc, l)) };

        match tok.kind {
            TokenKind::Int(n) => {
                self.bump();
                lit(Literal::Int(n))
            }
            TokenKind::Float(x) => {
                self.bump();
                lit(Literal::Float(x))
            }
            TokenKind::String(s) => {
                self.bump();
                lit(Literal::Str(s))
            }
            TokenKind::Bool(b) => {
                self.bump();
                lit(Literal::Bool(b))
            }
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Expr {
                    loc,
                    kind: ExprKind::Ident(Ident::new(loc, name)),
                })
            }
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.bump();
                let elems = self.parse_args(TokenKind::RBracket)?;
                let rb = self.expect(TokenKind::RBracket)?;
                Ok(Expr {
                    loc: loc.to(loc_of(&rb)),
                    kind: ExprKind::Array(elems),
                })
            }
            ref kind => {
                let prev = self.prev();
                let hint = match prev {
                    Some(p) if kind.is_binary_operator() && p.kind.is_binary_operator() => Some(format!(
                        "consecutive operators '{}' '{}'; remove one of them",
                        p.kind, kind
                    )),
                    _ => None,
                };
                Err(ParseError {
                    message: format!("expected an expression, found '{kind}'"),
                    hint,
                    line: tok.line,
                    span: tok.span,
                })
            }
        }
    }

    /// A `;` on the same line is required; when the next token starts a new
    /// line (or closes the block) the omission is reported and parsing
    /// carries on as if it were there.
    fn expect_semi(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::Semi) {
            self.bump();
            return Ok(());
        }

        let tok = self.peek().clone();
        let Some(prev) = self.prev().cloned() else {
            return Err(expected(";", &tok));
        };
        let soft = tok.line > prev.line || matches!(tok.kind, TokenKind::RBrace | TokenKind::Eof);
        if soft {
            let end: usize = prev.span.offset() + prev.span.len();
            self.errors.push(ParseError {
                message: format!("expected ';' after '{}'", prev.kind),
                hint: Some(format!("missing ';' after line {}", prev.line)),
                line: prev.line,
                span: quantel_ast::span(end, 0),
            });
            return Ok(());
        }
        Err(expected(";", &tok))
    }

    fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(Ident::new(loc_of(&tok), name.clone()))
            }
            _ => Err(ParseError {
                message: format!("expected identifier, found '{}'", tok.kind),
                hint: None,
                line: tok.line,
                span: tok.span,
            }),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind.clone()) {
            Ok(self.bump())
        } else {
            Err(expected(&kind.to_string(), self.peek()))
        }
    }

    fn at(&self, kind: TokenKind) -> bool {
        mem::discriminant(self.peek_kind()) == mem::discriminant(&kind)
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with `Eof`.
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_kind_n(&self, n: usize) -> &TokenKind {
        let i = (self.idx + n).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn prev(&self) -> Option<&Token> {
        self.idx.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// Consume the current token; `Eof` is never consumed.
    fn bump(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.idx += 1;
        }
        tok
    }
}

fn loc_of(tok: &Token) -> Loc {
    Loc::new(tok.span, tok.line)
}

fn expected(what: &str, found: &Token) -> ParseError {
    ParseError {
        message: format!("expected '{what}', found '{}'", found.kind),
        hint: None,
        line: found.line,
        span: found.span,
    }
}

fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
    Expr {
        loc: left.loc.to(right.loc),
        kind: ExprKind::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        },
    }
}

fn unary(op_loc: Loc, op: UnaryOp, expr: Expr) -> Expr {
    Expr {
        loc: op_loc.to(expr.loc),
        kind: ExprKind::Unary {
            op,
            expr: Box::new(expr),
        },
    }
}
