use quantel_ir::generate;

fn tac(src: &str) -> Vec<String> {
    let program = quantel_parse::parse_source(src).expect("parse");
    generate(&program).lines()
}

#[test]
fn binary_operations_get_temporaries() {
    assert_eq!(tac("auto a = 1 + 2 * 3;"), vec!["t1 = 2 * 3", "t2 = 1 + t1", "a = t2"]);
}

#[test]
fn if_else_lowers_to_labels() {
    let lines = tac("auto x = 1;\nif (x > 0) { x = 2; } else { x = 3; }");
    assert_eq!(
        lines,
        vec![
            "x = 1",
            "t1 = x > 0",
            "IF_FALSE t1 GOTO L_ELSE_1",
            "x = 2",
            "GOTO L_END_1",
            "L_ELSE_1:",
            "x = 3",
            "L_END_1:",
        ]
    );
}

#[test]
fn for_loop_with_break_and_continue() {
    let lines = tac("for i in 0..3 { if (i == 1) { continue; } break; }");
    assert_eq!(
        lines,
        vec![
            "i = 0",
            "L_FOR_1:",
            "IF i >= 3 GOTO L_END_1",
            "t1 = i == 1",
            "IF_FALSE t1 GOTO L_END_2",
            "GOTO L_STEP_1",
            "L_END_2:",
            "GOTO L_END_1",
            "L_STEP_1:",
            "i += 1",
            "GOTO L_FOR_1",
            "L_END_1:",
        ]
    );
}

#[test]
fn while_and_repeat_loops() {
    let lines = tac("auto n = 0;\nwhile (n < 2) { n += 1; }\nrepeat { n -= 1; } until (n <= 0);");
    assert_eq!(
        lines,
        vec![
            "n = 0",
            "L_WHILE_1:",
            "t1 = n < 2",
            "IF_FALSE t1 GOTO L_END_1",
            "n += 1",
            "GOTO L_WHILE_1",
            "L_END_1:",
            "L_REPEAT_2:",
            "n -= 1",
            "L_UNTIL_2:",
            "t2 = n <= 0",
            "IF_FALSE t2 GOTO L_REPEAT_2",
            "L_END_2:",
        ]
    );
}

#[test]
fn functions_calls_and_probes() {
    let src = "func add(int32 scalar a, int32 scalar b) -> int32 scalar { return a + b; }\nauto r = add(2, 3);\nprobe(r);";
    assert_eq!(
        tac(src),
        vec![
            "FUNC add:",
            "PARAM a",
            "PARAM b",
            "t1 = a + b",
            "RETURN t1",
            "ENDFUNC add",
            "t2 = CALL add(2, 3)",
            "r = t2",
            "PROBE r",
        ]
    );
}

#[test]
fn declarations_imports_and_records() {
    let src = "import linalg;\nmatrix<2,3> w;\nfloat32 scalar x = 1.5;\nfloat32 scalar *p = &x;\nrecord P { float32 scalar a; }";
    assert_eq!(
        tac(src),
        vec!["IMPORT linalg", "ALLOC w (float32 matrix<2,3>)", "x = 1.5", "p = &x", "RECORD P"]
    );
}

#[test]
fn compound_element_store_loads_first() {
    let lines = tac("vector<3> v;\nv[0] += 2.0;\nv[1] = v[0];");
    assert_eq!(
        lines,
        vec![
            "ALLOC v (float32 vector<3>)",
            "t1 = v[0]",
            "t2 = t1 + 2.0",
            "v[0] = t2",
            "t3 = v[0]",
            "v[1] = t3",
        ]
    );
}

#[test]
fn generation_is_reproducible() {
    let program = quantel_parse::parse_source("auto a = [1, 2];\nif (a[0] > 0) { probe(a[1..2]); }")
        .expect("parse");
    let first = generate(&program).to_string();
    let second = generate(&program).to_string();
    assert_eq!(first, second);
    assert!(first.starts_with("t1 = ARRAY [1, 2]\n"));
    assert!(first.contains("t4 = a[1..2]"));
}
