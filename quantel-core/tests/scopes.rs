use quantel_core::{analyze, AnalysisReport, Category, Type};

fn check(src: &str) -> AnalysisReport {
    let program = quantel_parse::parse_source(src).expect("parse");
    analyze(&program)
}

fn messages(report: &AnalysisReport) -> Vec<String> {
    report.errors.iter().map(|e| e.message.clone()).collect()
}

#[test]
fn function_call_end_to_end_is_clean() {
    let src = "func add(int32 scalar a, int32 scalar b) -> int32 scalar { return a + b; }\nauto r = add(2, 3);\nprobe(r);";
    let report = check(src);
    assert!(report.is_ok(), "{:?}", messages(&report));
    let r = report.symbols.iter().find(|s| s.name == "r").expect("r");
    assert_eq!(r.ty, Type::Int32);
    let add = report.symbols.iter().find(|s| s.name == "add").expect("add");
    assert_eq!(add.category, Category::Function);
    assert_eq!(add.params.len(), 2);
}

#[test]
fn branch_locals_do_not_escape() {
    let report = check("if (true) { int32 scalar t = 1; }\nprobe(t);");
    assert_eq!(messages(&report), vec!["undefined identifier 't'"]);
    assert_eq!(report.errors[0].line, 2);
    // History keeps the symbol even after its scope closed.
    assert!(report.symbols.iter().any(|s| s.name == "t"));
}

#[test]
fn redeclaration_and_shadowing() {
    let report = check("int32 scalar x = 1;\nint32 scalar x = 2;\n{ float32 scalar x = 0.5; }");
    assert_eq!(messages(&report), vec!["'x' is already defined in this scope"]);
}

#[test]
fn functions_and_records_are_hoisted() {
    let src = r#"
auto n = twice(4);
Point p;
p.x = 2.0;
func twice(int32 scalar v) -> int32 scalar { return v * 2; }
record Point { float32 scalar x; float32 scalar y = 0.0; }
"#;
    let report = check(src);
    assert!(report.is_ok(), "{:?}", messages(&report));
}

#[test]
fn call_validation() {
    let src = r#"
func f(int32 scalar a) -> int32 scalar { return a; }
int32 scalar v = 1;
auto a = g(1);
auto b = f(1, 2);
auto c = v(1);
print("variadic", 1, 2.0, true);
"#;
    let report = check(src);
    let msgs = messages(&report);
    assert_eq!(msgs.len(), 3, "{msgs:?}");
    assert!(msgs[0].contains("undefined function 'g'"));
    assert!(msgs[1].contains("expects 1 argument(s), found 2"));
    assert!(msgs[2].contains("not a function"));
}

#[test]
fn incompatible_types_and_numeric_promotion() {
    let report = check("auto a = 1 + 2.5;\nauto b = \"x\" + 1;\nauto c = \"x\" + \"y\";");
    assert_eq!(report.errors.len(), 1, "{:?}", messages(&report));
    assert!(report.errors[0].message.contains("incompatible types"));
    let a = report.symbols.iter().find(|s| s.name == "a").expect("a");
    assert_eq!(a.ty, Type::Float32);
}

#[test]
fn assignability() {
    let report = check("float32 scalar f = 1;\nint32 scalar i = 1.5;\nbool flag = true;\nflag = 3;");
    let msgs = messages(&report);
    assert_eq!(msgs.len(), 2, "{msgs:?}");
    assert!(msgs[0].contains("expected int32, found float32"));
    assert!(msgs[1].contains("expected bool, found int32"));
}

#[test]
fn undefined_pointer_target_reports_once() {
    let report = check("float32 scalar *p = &missing;\nauto q = &ghost;");
    assert_eq!(
        messages(&report),
        vec!["undefined pointer target 'missing'", "undefined pointer target 'ghost'"]
    );
    let q = report.symbols.iter().find(|s| s.name == "q").expect("q");
    assert_eq!(q.ty.display(), "unknown*");
}

#[test]
fn record_validation() {
    let src = "record Point { float32 scalar x; }\nPoint p;\nauto a = p.z;\nShape s;";
    let msgs = messages(&check(src));
    assert_eq!(msgs, vec!["record 'Point' has no field 'z'", "unknown record type 'Shape'"]);
}

#[test]
fn return_must_match_declared_type() {
    let src = "func f() -> int32 scalar { return \"nope\"; }\nreturn 1;";
    let msgs = messages(&check(src));
    assert_eq!(msgs.len(), 2, "{msgs:?}");
    assert!(msgs[0].contains("return from 'f'"));
    assert_eq!(msgs[1], "'return' outside of a function");
}

#[test]
fn loop_variable_is_scoped_and_integer() {
    let report = check("for i in 0..3 { probe(i); }\nprobe(i);\nwhile (true) { break; }\ncontinue;");
    assert_eq!(
        messages(&report),
        vec!["undefined identifier 'i'", "'continue' outside of a loop"]
    );
}

#[test]
fn assignment_to_undeclared_name_suggests_auto() {
    let report = check("total += 1;");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        report.errors[0].hint.as_deref(),
        Some("declare it first, e.g. 'auto total = ...;'")
    );
}

#[test]
fn symbol_history_is_in_definition_order() {
    let report = check("int32 scalar a = 1;\nfunc f(int32 scalar p) -> int32 scalar { return p; }\nauto b = f(a);");
    let names: Vec<&str> = report.symbols.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["f", "a", "p", "b"]);
}
