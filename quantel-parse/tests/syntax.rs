use quantel_ast::{AssignOp, BinOp, CmpOp, DType, DeclType, ExprKind, Index, ShapeKind, Stmt, TypeSpec};
use quantel_parse::{parse_expr, parse_source, parse_source_with_recovery};

#[test]
fn typed_declaration_with_matrix_shape() {
    let program = parse_source("float64 matrix<2,3> w;").expect("declaration should parse");
    let Stmt::VarDecl(decl) = &program.stmts[0] else {
        panic!("expected a declaration, got {:?}", program.stmts[0]);
    };
    let DeclType::Spec(TypeSpec::Builtin { dtype, shape }) = &decl.ty else {
        panic!("expected a builtin type");
    };
    assert_eq!(*dtype, DType::Float64);
    assert_eq!(shape.kind, ShapeKind::Matrix);
    assert_eq!(shape.dims, vec![2, 3]);
    assert!(decl.init.is_none());
}

#[test]
fn dtype_and_shape_defaults() {
    let program = parse_source("matrix<2,2> a; int32 n = 1;").expect("should parse");
    let types: Vec<String> = program
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::VarDecl(d) => match &d.ty {
                DeclType::Spec(spec) => spec.to_string(),
                DeclType::Auto => "auto".into(),
            },
            other => panic!("unexpected statement {other:?}"),
        })
        .collect();
    assert_eq!(types, vec!["float32 matrix<2,2>", "int32 scalar"]);
}

#[test]
fn shape_rank_is_enforced() {
    let err = parse_source("matrix<2> a;").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("matrix expects 2"), "unexpected error message: {msg}");

    let err = parse_source("vector<0> v;").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("positive"), "unexpected error message: {msg}");
}

#[test]
fn precedence_and_associativity() {
    let expr = parse_expr("1 + 2 * 3").expect("expression");
    let ExprKind::Binary { op: BinOp::Add, right, .. } = expr.kind else {
        panic!("expected '+' at the root");
    };
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Mul, .. }));

    let expr = parse_expr("2 ^ 3 ^ 2").expect("expression");
    let ExprKind::Binary { op: BinOp::Pow, left, right } = expr.kind else {
        panic!("expected '^' at the root");
    };
    assert!(matches!(left.kind, ExprKind::Literal(_)));
    assert!(matches!(right.kind, ExprKind::Binary { op: BinOp::Pow, .. }));

    let expr = parse_expr("a @ b + c < d && e || f").expect("expression");
    let ExprKind::Binary { op: BinOp::Or, left, .. } = expr.kind else {
        panic!("expected '||' at the root");
    };
    let ExprKind::Binary { op: BinOp::And, left, .. } = left.kind else {
        panic!("expected '&&' under '||'");
    };
    assert!(matches!(left.kind, ExprKind::Compare { op: CmpOp::Lt, .. }));
}

#[test]
fn postfix_forms() {
    let expr = parse_expr("m[1, 2]").expect("expression");
    let ExprKind::Index { index: Index::Elements(items), .. } = expr.kind else {
        panic!("expected element access");
    };
    assert_eq!(items.len(), 2);

    let expr = parse_expr("v[0..2]").expect("expression");
    assert!(matches!(expr.kind, ExprKind::Index { index: Index::Slice(_), .. }));

    let expr = parse_expr("p.x").expect("expression");
    assert!(matches!(expr.kind, ExprKind::Member { .. }));

    let expr = parse_expr("&x").expect("expression");
    assert!(matches!(expr.kind, ExprKind::Unary { .. }));
}

#[test]
fn statements_of_every_kind_parse() {
    let src = r#"
import linalg;
record Point { float32 scalar x = 0.0; float32 scalar y; }
func dot(vector<3> a, vector<3> b) -> float32 scalar {
    return a @ b;
}
Point p;
p.x = 1.5;
auto m = [[1, 2], [3, 4]];
float32 scalar *ptr = &p;
int32 scalar total = 0;
for i in 0..10 step 2 { total += i; }
while (total > 0) { total -= 1; if (total == 3) { break; } else if (total == 4) { continue; } }
repeat { total = total + 1; } until (total >= 2);
{ probe(total); }
print("done", total);
"#;
    let program = parse_source(src).expect("program should parse");
    assert_eq!(program.imports.len(), 1);
    assert_eq!(program.imports[0].name.node, "linalg");
    assert_eq!(program.stmts.len(), 12);
    assert!(matches!(program.stmts[1], Stmt::FuncDecl(_)));
    assert!(matches!(program.stmts[5], Stmt::PointerDecl(_)));
    let Stmt::For(for_stmt) = &program.stmts[7] else {
        panic!("expected a for loop");
    };
    assert!(for_stmt.range.step.is_some());
}

#[test]
fn compound_assignment_ops() {
    let program = parse_source("x = 1; x += 2; x -= 1; x *= 3; x /= 2; m @= n;").expect("should parse");
    let ops: Vec<AssignOp> = program
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::Assign(a) => a.op,
            other => panic!("unexpected statement {other:?}"),
        })
        .collect();
    assert_eq!(
        ops,
        vec![AssignOp::Set, AssignOp::Add, AssignOp::Sub, AssignOp::Mul, AssignOp::Div, AssignOp::MatMul]
    );
}

#[test]
fn invalid_assignment_target_is_rejected() {
    let err = parse_source("1 + 2 = 3;").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("invalid assignment target"), "unexpected error message: {msg}");
}

#[test]
fn function_requires_return_arrow() {
    let err = parse_source("func f(int32 scalar a) { return a; }").expect_err("expected parse error");
    let msg = err.to_string();
    assert!(msg.contains("'->'"), "unexpected error message: {msg}");
}

#[test]
fn missing_semicolon_reports_once_and_keeps_next_statement() {
    let parsed = parse_source_with_recovery("int32 scalar x = 5\nint32 scalar y = 6;\nprobe(y);");
    assert_eq!(parsed.parse_errors.len(), 1, "{:?}", parsed.parse_errors);
    let err = &parsed.parse_errors[0];
    assert_eq!(err.line, 1);
    assert_eq!(err.hint.as_deref(), Some("missing ';' after line 1"));
    assert_eq!(parsed.program.stmts.len(), 3);
}

#[test]
fn recovery_skips_to_the_next_statement() {
    let parsed = parse_source_with_recovery("int32 scalar a = 1;\nint32 scalar b = (2;\nint32 scalar c = 3;");
    assert_eq!(parsed.parse_errors.len(), 1);
    assert_eq!(parsed.parse_errors[0].line, 2);
    let names: Vec<&str> = parsed
        .program
        .stmts
        .iter()
        .filter_map(|s| match s {
            Stmt::VarDecl(d) => Some(d.name.node.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["a", "c"]);
}

#[test]
fn recovery_inside_a_block_keeps_the_block() {
    let parsed = parse_source_with_recovery("if (true) {\n  x = ;\n  y = 2;\n}\nz = 3;");
    assert_eq!(parsed.parse_errors.len(), 1);
    assert_eq!(parsed.program.stmts.len(), 2);
    let Stmt::If(if_stmt) = &parsed.program.stmts[0] else {
        panic!("expected if statement");
    };
    assert_eq!(if_stmt.then_block.stmts.len(), 1);
}

#[test]
fn consecutive_operators_hint() {
    let parsed = parse_source_with_recovery("x = a + * b;");
    assert_eq!(parsed.parse_errors.len(), 1);
    let hint = parsed.parse_errors[0].hint.clone().unwrap_or_default();
    assert!(hint.contains("consecutive operators"), "unexpected hint: {hint}");
}

#[test]
fn keyword_typo_hint() {
    let parsed = parse_source_with_recovery("wihle (x < 3) { x += 1; }");
    assert!(!parsed.parse_errors.is_empty());
    assert_eq!(parsed.parse_errors[0].hint.as_deref(), Some("did you mean 'while'?"));
}

#[test]
fn late_import_is_reported() {
    let parsed = parse_source_with_recovery("x = 1;\nimport linalg;");
    assert_eq!(parsed.parse_errors.len(), 1);
    assert!(parsed.parse_errors[0].message.contains("imports"));
}

#[test]
fn stray_closing_brace_does_not_stall() {
    let parsed = parse_source_with_recovery("} x = 1;");
    assert_eq!(parsed.parse_errors.len(), 1);
    assert_eq!(parsed.program.stmts.len(), 1);
}

#[test]
fn lexer_errors_surface_alongside_the_ast() {
    let parsed = parse_source_with_recovery("int32 scalar x = 1 $;");
    assert_eq!(parsed.lex_errors.len(), 1);
    assert!(parsed.parse_errors.is_empty());
    assert!(!parsed.is_clean());
    let diags = parsed.diagnostics();
    assert_eq!(diags[0].to_string(), "[Lexer Error] line 1: Illegal character '$'");
}

#[test]
fn runaway_nesting_is_one_error_not_a_crash() {
    let depth = 10_000;
    let src = format!("auto x = {}1{};\nauto y = 2;\n", "(".repeat(depth), ")".repeat(depth));
    let parsed = parse_source_with_recovery(&src);
    assert_eq!(parsed.parse_errors.len(), 1, "{:?}", parsed.parse_errors);
    assert_eq!(parsed.parse_errors[0].message, "expression or block nested too deeply");
    assert_eq!(parsed.program.stmts.len(), 1);

    let negations = format!("auto z = {}1;", "-".repeat(depth));
    let parsed = parse_source_with_recovery(&negations);
    assert_eq!(parsed.parse_errors.len(), 1, "{:?}", parsed.parse_errors);

    let blocks = format!("{}{}", "{ ".repeat(depth), "} ".repeat(depth));
    let parsed = parse_source_with_recovery(&blocks);
    assert!(!parsed.parse_errors.is_empty());

    // Ordinary nesting is untouched.
    let shallow = format!("auto w = {}1{};", "(".repeat(40), ")".repeat(40));
    assert!(parse_source(&shallow).is_ok());
}
