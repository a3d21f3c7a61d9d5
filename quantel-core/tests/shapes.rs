use quantel_core::{analyze, AnalysisReport};

fn check(src: &str) -> AnalysisReport {
    let program = quantel_parse::parse_source(src).expect("parse");
    analyze(&program)
}

fn messages(report: &AnalysisReport) -> Vec<String> {
    report.errors.iter().map(|e| e.message.clone()).collect()
}

#[test]
fn matmul_inner_dimension_mismatch_is_one_error() {
    let report = check("matrix<2,3> a;\nmatrix<5,5> b;\nauto c = a @ b;");
    assert_eq!(report.errors.len(), 1, "{:?}", messages(&report));
    let err = &report.errors[0];
    assert!(err.message.contains("3 vs 5"), "unexpected message: {}", err.message);
    assert_eq!(err.line, 3);
    let hint = err.hint.clone().unwrap_or_default();
    assert!(hint.contains("matrix<2,3>") && hint.contains("matrix<5,5>"), "unexpected hint: {hint}");
}

#[test]
fn matmul_composes_shapes() {
    let src = r#"
matrix<2,3> a;
matrix<3,4> b;
vector<3> v;
matrix<2,4> c = a @ b;
vector<2> d = a @ v;
scalar e = v @ v;
vector<4> f = v @ b;
"#;
    let report = check(src);
    assert!(report.is_ok(), "{:?}", messages(&report));
    let c = report.symbols.iter().find(|s| s.name == "c").expect("c");
    assert_eq!(c.shape, Some(vec![2, 4]));
}

#[test]
fn matmul_rejects_scalars() {
    let report = check("scalar s = 1.0;\nmatrix<2,2> m;\nauto r = s @ m;");
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].message.contains("scalar"));
}

#[test]
fn elementwise_requires_identical_shapes() {
    let report = check("matrix<2,2> a;\nvector<3> b;\nauto c = a + b;\nauto d = a * 2.0;");
    assert_eq!(report.errors.len(), 1, "{:?}", messages(&report));
    assert!(report.errors[0].message.contains("shape mismatch for '+'"));
    let d = report.symbols.iter().find(|s| s.name == "d").expect("d");
    assert_eq!(d.shape, Some(vec![2, 2]));
}

#[test]
fn array_literals_carry_their_shape() {
    let report = check("auto m = [[1, 2, 3], [4, 5, 6]];\nmatrix<2,3> n = m;");
    assert!(report.is_ok(), "{:?}", messages(&report));
    let m = report.symbols.iter().find(|s| s.name == "m").expect("m");
    assert_eq!(m.shape, Some(vec![2, 3]));
    assert_eq!(m.ty.display(), "int32");
}

#[test]
fn ragged_array_literal_is_reported() {
    let report = check("auto m = [[1, 2], [3]];");
    assert_eq!(messages(&report), vec!["ragged array literal: elements have different shapes"]);
}

#[test]
fn declared_shape_must_match_initializer() {
    let report = check("vector<3> v = [1.0, 2.0];\nmatrix<2,2> z = 0.0;");
    assert_eq!(report.errors.len(), 1, "{:?}", messages(&report));
    assert!(report.errors[0].message.contains("expected vector<3>, found vector<2>"));
}

#[test]
fn indexing_rules() {
    let src = "matrix<2,3> m;\nauto row = m[1];\nauto x = m[0, 2];\nauto part = m[0..1];\nscalar s = 1.0;\nauto bad = s[0];\nauto worse = m[0, 1, 2];";
    let report = check(src);
    let msgs = messages(&report);
    assert_eq!(msgs.len(), 2, "{msgs:?}");
    assert!(msgs[0].contains("cannot index scalar 's'"));
    assert!(msgs[1].contains("too many indices"));

    let shape_of = |name: &str| report.symbols.iter().find(|s| s.name == name).and_then(|s| s.shape.clone());
    assert_eq!(shape_of("row"), Some(vec![3]));
    assert_eq!(shape_of("x"), Some(vec![]));
    assert_eq!(shape_of("part"), Some(vec![1, 3]));
}

#[test]
fn argument_shapes_are_checked() {
    let src = r#"
func norm(vector<3> v) -> float32 scalar { return v @ v; }
vector<3> a;
vector<4> b;
auto ok = norm(a);
auto bad = norm(b);
"#;
    let report = check(src);
    assert_eq!(report.errors.len(), 1, "{:?}", messages(&report));
    assert!(report.errors[0].message.contains("argument 1 of 'norm'"));
}
