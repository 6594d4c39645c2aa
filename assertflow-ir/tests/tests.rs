use std::path::PathBuf;

use assertflow_ir::{
    run_dataflow_analysis, BinaryOpKind, Constant, Context, DataflowOptions, FormulaArena,
    Function, IrError, Module, NoopModel, Predicate, Type,
};
use itertools::Itertools;

// -------------------------------------------------------------------------------------------------
// Utility for finding test files and running FileCheck over the printed IR.

fn run_printer_tests(sub_dir: &str) {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let dir: PathBuf = format!("{manifest_dir}/tests/{sub_dir}").into();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();

        let input_bytes = std::fs::read(&path).unwrap();
        let input = String::from_utf8_lossy(&input_bytes);

        let ir = assertflow_ir::parser::parse(&input).unwrap_or_else(|parse_err| {
            println!("{}: {parse_err}", path.display());
            panic!()
        });

        let output = assertflow_ir::printer::to_string(&ir);

        // Whatever is printed must parse back to the same IR.
        let reparsed = assertflow_ir::parser::parse(&output).unwrap_or_else(|parse_err| {
            println!("{output}");
            println!("{}: reparse failed: {parse_err}", path.display());
            panic!()
        });
        pretty_assertions::assert_eq!(output, assertflow_ir::printer::to_string(&reparsed));

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

// Utility for finding test files and running IR verifier tests.
// Each test file must contain an IR code that is parsable,
// but does not pass IR verification.
// Each test file must contain exactly one `// error: ...` line
// that specifies the expected IR verification error.
fn run_ir_verifier_tests(sub_dir: &str) {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let dir: PathBuf = format!("{manifest_dir}/tests/{sub_dir}").into();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();

        let input_bytes = std::fs::read(&path).unwrap();
        let input = String::from_utf8_lossy(&input_bytes);

        let expected_errors = input
            .lines()
            .filter(|line| line.starts_with("// error: "))
            .collect_vec();

        let expected_error = match expected_errors[..] {
            [] => {
                println!(
                    "--- IR verifier test does not contain the expected error: {}",
                    path.display()
                );
                println!("The expected error must be specified by using the `// error: ` comment.");
                panic!();
            }
            [err] => err.replace("// error: ", ""),
            _ => {
                println!(
                    "--- IR verifier test contains more then one expected error: {}",
                    path.display()
                );
                println!("The specified expected errors were:");
                println!("{}", expected_errors.join("\n"));
                panic!();
            }
        };

        match assertflow_ir::parser::parse(&input) {
            Ok(_) => {
                println!(
                    "--- Parsing and validating an IR verifier test passed without errors: {}",
                    path.display()
                );
                println!("The expected IR validation error was: {expected_error}");
                panic!();
            }
            Err(err @ IrError::ParseFailure(_, _)) => {
                println!(
                    "--- Parsing of an IR verifier test failed: {}",
                    path.display()
                );
                println!("The parsing error was: {err}");
                panic!();
            }
            Err(err) => {
                let err = format!("{err}");
                if !err.contains(&expected_error) {
                    println!("--- IR verifier test failed: {}", path.display());
                    println!("The expected error was: {expected_error}");
                    println!("The actual IR verification error was: {err}");
                    panic!();
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[test]
fn printer() {
    run_printer_tests("printer")
}

#[test]
fn verify() {
    run_ir_verifier_tests("verify")
}

#[test]
fn parse_failure() {
    let Err(err) = assertflow_ir::parser::parse("module { fn f( -> () }") else {
        panic!("malformed IR was accepted");
    };
    assert!(matches!(err, IrError::ParseFailure(_, _)));
}

// -------------------------------------------------------------------------------------------------
// The builder API produces the same IR as the parser.

fn build_target(context: &mut Context) -> Function {
    let module = Module::new(context);
    let decl = Function::new(
        context,
        module,
        vec!["ext".to_owned(), "flag".to_owned()],
        vec![],
        Type::Bool,
        true,
    );
    let function = Function::new(
        context,
        module,
        vec!["target".to_owned()],
        vec![("a".to_owned(), Type::Bool), ("n".to_owned(), Type::Uint64)],
        Type::Bool,
        false,
    );

    let entry = function.get_entry_block(context);
    let yes = function.create_block(context, Some("yes".to_owned()));
    let join = function.create_block(context, None);
    let join_arg = join.new_arg(context, Type::Bool);
    let join_arg = join.get_arg(context, join_arg).unwrap();

    let a = function.get_arg(context, "a").unwrap();
    let n = function.get_arg(context, "n").unwrap();
    let flag = entry.append(context).call(decl, &[]);
    let both = entry.append(context).binary_op(BinaryOpKind::And, a, flag);
    entry
        .append(context)
        .conditional_branch(both, yes, join, vec![], vec![a]);

    let ten = Constant::get_uint(context, 10);
    let small = yes.append(context).cmp(Predicate::LessThan, n, ten);
    yes.append(context).annotation("in_yes");
    yes.append(context).branch(join, vec![small]);

    join.append(context).annotation("joined");
    join.append(context).ret(join_arg, Type::Bool);

    function
}

#[test]
fn built_ir_verifies_and_round_trips() {
    let mut context = Context::default();
    let function = build_target(&mut context);
    context.verify().unwrap();

    assert_eq!(function.num_blocks(&context), 3);
    assert_eq!(function.get_name(&context), "target");

    let printed = context.to_string();
    let reparsed = assertflow_ir::parser::parse(&printed).unwrap();
    pretty_assertions::assert_eq!(printed, reparsed.to_string());
}

#[test]
fn built_ir_analysis() {
    let mut context = Context::default();
    let function = build_target(&mut context);

    let arena = FormulaArena::new();
    let results = run_dataflow_analysis(
        &context,
        function,
        &arena,
        &NoopModel,
        &DataflowOptions::default(),
    )
    .unwrap();

    let a = arena.make_atom_ref(arena.value_atom(function.get_arg(&context, "a").unwrap()));
    let in_yes = results.state_at("in_yes").unwrap();
    assert!(in_yes.proves(a));

    let joined = results.state_at("joined").unwrap();
    assert!(!joined.proves(a));
    assert!(joined.is_feasible());
    assert_eq!(
        results.annotations().map(|(name, _)| name).collect_vec(),
        vec!["in_yes", "joined"]
    );
}
