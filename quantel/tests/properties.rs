use proptest::prelude::*;
use quantel::{run, Options};

fn no_opt() -> Options {
    Options {
        optimize: false,
        ..Options::default()
    }
}

/// Straight-line integer program: each variable combines earlier ones and
/// literals, and every variable is printed.
fn straight_line() -> impl Strategy<Value = String> {
    prop::collection::vec((0usize..3, 0i64..20, 0usize..3), 1..8).prop_map(|steps| {
        let mut src = String::new();
        for (i, (op, lit, pick)) in steps.iter().enumerate() {
            let op = ["+", "-", "*"][*op];
            let rhs = if i == 0 {
                format!("{lit} {op} {}", lit + 1)
            } else {
                format!("v{} {op} {lit}", pick % i)
            };
            src.push_str(&format!("auto v{i} = {rhs};\nprint(v{i});\n"));
        }
        src
    })
}

/// A counted loop the optimizer may or may not unroll.
fn counted_loop() -> impl Strategy<Value = String> {
    (0i64..4, 0i64..16, 1i64..4, -3i64..4).prop_map(|(start, len, step, scale)| {
        format!(
            "auto acc = 0;\nfor i in {start}..{} step {step} {{ acc += i * {scale}; }}\nprint(acc);\n",
            start + len
        )
    })
}

proptest! {
    #[test]
    fn repeated_runs_agree(src in straight_line()) {
        let a = run(&src, &Options::default());
        let b = run(&src, &Options::default());
        prop_assert_eq!(a.diagnostics(), b.diagnostics());
        let (oa, ob) = (a.outcome.expect("ran"), b.outcome.expect("ran"));
        prop_assert_eq!(oa.stdout, ob.stdout);
        prop_assert_eq!(oa.memory, ob.memory);
    }

    #[test]
    fn optimizing_never_changes_output(src in straight_line()) {
        let optimized = run(&src, &Options::default());
        let plain = run(&src, &no_opt());
        prop_assert!(optimized.is_ok(), "{:?}", optimized.diagnostics());
        prop_assert!(plain.is_ok(), "{:?}", plain.diagnostics());
        let (o, p) = (optimized.outcome.expect("ran"), plain.outcome.expect("ran"));
        prop_assert_eq!(o.stdout, p.stdout);
    }

    #[test]
    fn unrolling_matches_the_loop(src in counted_loop()) {
        let optimized = run(&src, &Options::default());
        let plain = run(&src, &no_opt());
        prop_assert!(optimized.is_ok(), "{:?}", optimized.diagnostics());
        prop_assert!(plain.is_ok(), "{:?}", plain.diagnostics());
        let (o, p) = (optimized.outcome.expect("ran"), plain.outcome.expect("ran"));
        prop_assert_eq!(o.stdout, p.stdout);
    }
}
