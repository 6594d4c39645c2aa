use std::{path::PathBuf, sync::Arc};

use assertflow_ir::{
    parser::parse, run_dataflow_analysis, Context, DataflowOptions, FormulaArena, Function,
};
use assertflow_models::{
    analyze_module, CallPatternCatalog, CheckKind, CheckModel, CheckModelConfig, Truth,
};
use itertools::Itertools;
use tracing_test::traced_test;

// -------------------------------------------------------------------------------------------------
// Utility for finding test files and running FileCheck over the printed reports.

fn run_report_tests(sub_dir: &str) {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let dir: PathBuf = format!("{manifest_dir}/tests/{sub_dir}").into();
    let model = CheckModel::default();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();

        let input_bytes = std::fs::read(&path).unwrap();
        let input = String::from_utf8_lossy(&input_bytes);

        let ir = parse(&input).unwrap_or_else(|parse_err| {
            println!("{}: {parse_err}", path.display());
            panic!()
        });

        let output = ir
            .module_iter()
            .flat_map(|module| analyze_module(&ir, module, &model, &DataflowOptions::default()))
            .map(|report| report.to_string())
            .join("");

        let chkr = filecheck::CheckerBuilder::new()
            .text(&input)
            .unwrap()
            .finish();
        if chkr.is_empty() {
            println!("{output}");
            panic!("No filecheck directives found in test: {}", path.display());
        }

        match chkr.explain(&output, filecheck::NO_VARIABLES) {
            Ok((success, report)) if !success => {
                println!("--- FILECHECK FAILED FOR {}", path.display());
                println!("{report}");
                panic!()
            }
            Err(e) => {
                panic!("filecheck directive error while checking: {e}");
            }
            _ => (),
        }
    }
}

#[test]
fn reports() {
    run_report_tests("inputs")
}

// -------------------------------------------------------------------------------------------------
// Scenarios driven through environment queries.

struct PointFacts {
    foo: Truth,
    reachable: bool,
}

fn get_target(context: &Context) -> Function {
    context
        .module_iter()
        .flat_map(|module| module.function_iter(context))
        .find(|function| function.get_name(context) == "target")
        .unwrap()
}

fn facts_at(ir: &str, model: &CheckModel, point: &str) -> PointFacts {
    let context = parse(ir).unwrap_or_else(|err| panic!("{err}\n{ir}"));
    let target = get_target(&context);
    let arena = FormulaArena::new();
    let results =
        run_dataflow_analysis(&context, target, &arena, model, &DataflowOptions::default())
            .unwrap();

    let env = results.state_at(point).unwrap();
    let foo = arena.make_atom_ref(arena.value_atom(target.get_arg(&context, "Foo").unwrap()));
    let foo = if env.proves(foo) {
        Truth::ProvenTrue
    } else if env.proves(arena.make_not(foo)) {
        Truth::ProvenFalse
    } else {
        Truth::Unknown
    };
    PointFacts {
        foo,
        reachable: env.is_feasible(),
    }
}

fn declaration(kind: CheckKind) -> String {
    let variant = kind.variant();
    let params = ["file: str", "line: u64", "errno: u64"]
        .into_iter()
        .take(variant.arity - usize::from(variant.condition_arg_index.is_some()))
        .chain(variant.condition_arg_index.map(|_| "condition: bool"))
        .join(", ");
    format!("fn {}({params}) -> ()", variant.qualified_name.join("::"))
}

fn call(kind: CheckKind, dest: &str, condition: &str) -> String {
    let variant = kind.variant();
    let args = ["v_file", "v_line", "v_errno"]
        .into_iter()
        .take(variant.arity - usize::from(variant.condition_arg_index.is_some()))
        .chain(variant.condition_arg_index.map(|_| condition))
        .join(", ");
    format!(
        "{dest} = call {}({args})",
        variant.qualified_name.join("::")
    )
}

fn target_calling(kind: CheckKind, num_calls: usize) -> String {
    let calls = (0..num_calls)
        .map(|idx| call(kind, &format!("c{idx}"), "Foo"))
        .join("\n        ");
    format!(
        r#"
module {{
    {}

    fn target(Foo: bool) -> () {{
        entry():
        v_file = const str "target.cc"
        v_line = const u64 10
        v_errno = const u64 0
        annotate before
        {calls}
        annotate after
        v_unit = const () ()
        ret () v_unit
    }}
}}
"#,
        declaration(kind)
    )
}

const CONDITIONED: [CheckKind; 4] = [
    CheckKind::Check,
    CheckKind::DCheck,
    CheckKind::PCheck,
    CheckKind::DPCheck,
];

#[test]
fn check_success_implies_condition_holds() {
    let model = CheckModel::default();
    for kind in CONDITIONED {
        for num_calls in [1, 4] {
            let ir = target_calling(kind, num_calls);
            let before = facts_at(&ir, &model, "before");
            assert_eq!(before.foo, Truth::Unknown, "{kind:?}");

            let after = facts_at(&ir, &model, "after");
            assert_eq!(after.foo, Truth::ProvenTrue, "{kind:?} x{num_calls}");
            assert!(after.reachable);
        }
    }
}

#[test]
fn unconditional_check_asserts_nothing() {
    let ir = target_calling(CheckKind::PCheckNoCond, 1);
    let after = facts_at(&ir, &CheckModel::default(), "after");
    assert_eq!(after.foo, Truth::Unknown);
    assert!(after.reachable);
}

fn lookalike(callee: &str) -> String {
    format!(
        r#"
module {{
    fn {callee}(file: str, line: u64, condition: bool) -> ()

    fn target(Foo: bool) -> () {{
        entry():
        v0 = not Foo
        cbr v0, fail(), done()

        fail():
        v1 = const str "target.cc"
        v2 = const u64 20
        v3 = call {callee}(v1, v2, Foo)
        br done()

        done():
        annotate after
        v4 = const () ()
        ret () v4
    }}
}}
"#
    )
}

#[test]
fn unrelated_check_does_not_imply_condition() {
    let model = CheckModel::default();
    let after = facts_at(&lookalike("other::logging::CheckError::Check"), &model, "after");
    assert_eq!(after.foo, Truth::Unknown);

    // The real check on the failing path only returns if `Foo` holds after all.
    let after = facts_at(&lookalike("logging::CheckError::Check"), &model, "after");
    assert_eq!(after.foo, Truth::ProvenTrue);
}

#[test]
fn custom_catalogs_replace_the_default() {
    let model = CheckModel::new(
        Arc::new(CallPatternCatalog::new(vec![CheckKind::DCheck.variant()])),
        CheckModelConfig::default(),
    );
    let after = facts_at(&target_calling(CheckKind::Check, 1), &model, "after");
    assert_eq!(after.foo, Truth::Unknown);
    let after = facts_at(&target_calling(CheckKind::DCheck, 1), &model, "after");
    assert_eq!(after.foo, Truth::ProvenTrue);
}

#[test]
fn synthesized_conditions_are_reused() {
    let ir = r#"
module {
    fn logging::CheckError::Check(file: str, line: u64, condition: bool) -> ()

    fn target(Foo: bool, n: u64) -> () {
        entry():
        v0 = const u64 10
        v1 = cmp lt n v0
        v2 = const str "target.cc"
        v3 = call logging::CheckError::Check(v2, v0, v1)
        cbr v1, small(), big()

        small():
        annotate small
        br done()

        big():
        annotate big
        br done()

        done():
        v4 = const () ()
        ret () v4
    }
}
"#;
    let model = CheckModel::default();
    assert!(facts_at(ir, &model, "small").reachable);
    assert!(!facts_at(ir, &model, "big").reachable);
}

#[test]
fn checks_in_loops_converge() {
    let ir = r#"
module {
    fn logging::CheckError::Check(file: str, line: u64, condition: bool) -> ()

    fn ext::more() -> bool

    fn target(Foo: bool) -> () {
        entry():
        v0 = const str "loop.cc"
        v1 = const u64 3
        br header()

        header():
        v2 = call ext::more()
        cbr v2, body(), exit()

        body():
        v3 = call logging::CheckError::Check(v0, v1, Foo)
        annotate in_body
        br header()

        exit():
        annotate after_loop
        v4 = const () ()
        ret () v4
    }
}
"#;
    let model = CheckModel::default();
    let in_body = facts_at(ir, &model, "in_body");
    assert_eq!(in_body.foo, Truth::ProvenTrue);
    assert!(in_body.reachable);

    let after_loop = facts_at(ir, &model, "after_loop");
    assert_eq!(after_loop.foo, Truth::Unknown);
    assert!(after_loop.reachable);
}

// -------------------------------------------------------------------------------------------------
// Malformed matches.

const STRINGIFIED_CONDITION: &str = r#"
module {
    fn logging::CheckError::Check(file: str, line: u64, condition: str) -> ()

    fn target(Foo: bool) -> () {
        entry():
        v0 = const str "target.cc"
        v1 = const u64 40
        v2 = const str "Foo"
        v3 = call logging::CheckError::Check(v0, v1, v2)
        annotate after
        ret () v3
    }
}
"#;

#[traced_test]
#[test]
fn malformed_checks_are_quiet_by_default() {
    let after = facts_at(STRINGIFIED_CONDITION, &CheckModel::default(), "after");
    assert_eq!(after.foo, Truth::Unknown);
    assert!(after.reachable);
    assert!(!logs_contain("doesn't fit its convention"));
}

#[traced_test]
#[test]
fn malformed_checks_warn_in_strict_mode() {
    let model = CheckModel::new(
        Arc::new(CallPatternCatalog::default()),
        CheckModelConfig { strict: true },
    );
    let after = facts_at(STRINGIFIED_CONDITION, &model, "after");
    assert_eq!(after.foo, Truth::Unknown);
    assert!(after.reachable);
    assert!(logs_contain(
        "call to logging::CheckError::Check/3 doesn't fit its convention, condition argument 2 \
         has type str instead of bool"
    ));
}
