use quantel_ast::{ExprKind, Literal, Program, Stmt, UnaryOp};
use quantel_ir::{optimize, OptConfig, OptimizeOutcome};

fn run(src: &str) -> OptimizeOutcome {
    let program = quantel_parse::parse_source(src).expect("parse");
    optimize(&program, &OptConfig::default())
}

fn probed(program: &Program) -> Vec<ExprKind> {
    program
        .stmts
        .iter()
        .filter_map(|s| match s {
            Stmt::Probe(p) => Some(p.expr.kind.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn folds_and_propagates_constants() {
    let out = run("auto a = 2 + 3 * 4;\nprobe(a);");
    assert!(out.changed);
    assert_eq!(out.passes, 2);
    assert_eq!(probed(&out.program), vec![ExprKind::Literal(Literal::Int(14))]);
}

#[test]
fn literal_conditions_collapse_branches() {
    let out = run("if (1 < 2) { auto x = 1; } else { auto x = 2; }\nif (false) { probe(0); }\nprobe(x);");
    assert_eq!(out.program.stmts.len(), 2, "{:?}", out.program.stmts);
    assert!(matches!(out.program.stmts[0], Stmt::VarDecl(_)));
    assert_eq!(probed(&out.program), vec![ExprKind::Literal(Literal::Int(1))]);
}

#[test]
fn collapsed_branches_keep_hoisted_declarations() {
    let out = run("if (false) { func f() -> int32 scalar { return 7; } probe(1); }\nauto r = f();\nprint(r);");
    let stmts = &out.program.stmts;
    assert!(matches!(stmts[0], Stmt::FuncDecl(_)), "{stmts:?}");
    assert!(!stmts.iter().any(|s| matches!(s, Stmt::If(_) | Stmt::Probe(_))));

    let out = run("if (true) { probe(1); } else { while (true) { record P { int32 scalar a; } } }\nP p;");
    let stmts = &out.program.stmts;
    assert!(matches!(stmts[0], Stmt::Probe(_)), "{stmts:?}");
    assert!(matches!(stmts[1], Stmt::RecordDecl(_)), "{stmts:?}");
    assert!(!stmts.iter().any(|s| matches!(s, Stmt::While(_))));
}

#[test]
fn integer_stores_into_float_names_stay_float() {
    let out = run("float32 scalar f = 1.0;\nf = 3;\nprobe(f / 2);");
    assert_eq!(probed(&out.program), vec![ExprKind::Literal(Literal::Float(1.5))]);

    // Declared float but never given a literal: the store is not tracked.
    let out = run("float32 scalar u;\nu = 4;\nprobe(u / 8);");
    assert!(matches!(probed(&out.program)[0], ExprKind::Binary { .. }));
}

#[test]
fn small_for_loops_are_unrolled() {
    let out = run("auto x = 0;\nfor i in 0..5 { x += i; }\nprobe(x);");
    let stmts = &out.program.stmts;
    assert_eq!(stmts.len(), 12);
    assert!(!stmts.iter().any(|s| matches!(s, Stmt::For(_))));
    assert_eq!(probed(&out.program), vec![ExprKind::Literal(Literal::Int(10))]);
}

#[test]
fn unrolling_respects_limit_and_exits() {
    let long = run("auto x = 0;\nfor i in 0..100 { x += i; }");
    assert!(matches!(long.program.stmts[1], Stmt::For(_)));

    let exits = run("for i in 0..3 { if (i == 1) { break; } }");
    assert!(matches!(exits.program.stmts[0], Stmt::For(_)));

    let custom = quantel_parse::parse_source("for i in 0..20 { probe(i); }").expect("parse");
    let config = OptConfig {
        unroll_limit: 32,
        ..OptConfig::default()
    };
    let out = optimize(&custom, &config);
    assert_eq!(probed(&out.program).len(), 20);
}

#[test]
fn loop_carried_names_are_not_propagated() {
    let out = run("auto n = 0;\nwhile (n < 3) { n += 1; }\nprobe(n);");
    let Stmt::While(w) = &out.program.stmts[1] else {
        panic!("expected the loop to survive");
    };
    assert!(matches!(w.cond.kind, ExprKind::Compare { .. }));
    assert!(matches!(probed(&out.program)[0], ExprKind::Ident(_)));
}

#[test]
fn branch_join_keeps_only_agreeing_facts() {
    let src = r#"
vector<2> v = [1.0, 2.0];
auto y = 1;
auto z = 5;
if (v[0] > 0.5) { y = 2; z = 5; } else { z = 5; }
probe(y);
probe(z);
"#;
    let probes = probed(&run(src).program);
    assert!(matches!(probes[0], ExprKind::Ident(_)));
    assert_eq!(probes[1], ExprKind::Literal(Literal::Int(5)));
}

#[test]
fn user_calls_evict_names_written_by_functions() {
    let src = "auto g = 1;\nfunc bump() -> int32 scalar { g += 1; return g; }\nauto r = bump();\nprobe(g);";
    let probes = probed(&run(src).program);
    assert!(matches!(probes[0], ExprKind::Ident(_)), "{probes:?}");
}

#[test]
fn faulting_folds_and_address_operands_are_left_alone() {
    let out = run("auto d = 1 / 0;\nauto x = 3;\nauto p = &x;");
    let Stmt::VarDecl(d) = &out.program.stmts[0] else {
        panic!("expected declaration");
    };
    assert!(matches!(d.init.as_ref().map(|e| &e.kind), Some(ExprKind::Binary { .. })));

    let Stmt::VarDecl(p) = &out.program.stmts[2] else {
        panic!("expected declaration");
    };
    let Some(ExprKind::Unary { op, expr }) = p.init.as_ref().map(|e| &e.kind) else {
        panic!("expected address-of");
    };
    assert_eq!(*op, UnaryOp::AddrOf);
    assert!(matches!(expr.kind, ExprKind::Ident(_)));
}

#[test]
fn second_run_reports_no_change() {
    let src = "auto x = 0;\nfor i in 0..4 { x += i * 2; }\nif (x > 3) { probe(x); }";
    let first = run(src);
    assert!(first.changed);
    let second = optimize(&first.program, &OptConfig::default());
    assert!(!second.changed);
    assert_eq!(second.passes, 1);
    assert_eq!(second.program, first.program);
}

#[test]
fn pass_cap_bounds_the_run() {
    let program = quantel_parse::parse_source("auto a = 2 + 3;\nprobe(a);").expect("parse");
    let config = OptConfig {
        max_passes: 1,
        ..OptConfig::default()
    };
    let out = optimize(&program, &config);
    assert_eq!(out.passes, 1);
    assert!(out.changed);
}
