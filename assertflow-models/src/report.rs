//! Running the check model over whole modules and summarizing what it proved.
//!
//! For every annotated program point the report says whether the point is reachable and, for each
//! boolean argument of the function, whether it is proven true, proven false or unknown there.

use std::fmt;

use assertflow_ir::{
    run_dataflow_analysis, Context, DataflowOptions, Environment, FormulaArena, Function, IrError,
    Module,
};
use rayon::prelude::*;
use tracing::debug;

use crate::check_model::CheckModel;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truth {
    ProvenTrue,
    ProvenFalse,
    Unknown,
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Truth::ProvenTrue => "true",
            Truth::ProvenFalse => "false",
            Truth::Unknown => "unknown",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArgumentFact {
    pub name: String,
    pub truth: Truth,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationReport {
    pub name: String,
    pub reachable: bool,
    /// Empty when the point is unreachable, everything would be proven there.
    pub arguments: Vec<ArgumentFact>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionReport {
    pub function: String,
    pub outcome: Result<Vec<AnnotationReport>, IrError>,
}

impl FunctionReport {
    pub fn annotation(&self, name: &str) -> Option<&AnnotationReport> {
        self.outcome
            .as_ref()
            .ok()
            .and_then(|annotations| annotations.iter().find(|annotation| annotation.name == name))
    }
}

impl fmt::Display for FunctionReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.outcome {
            Err(err) => writeln!(f, "fn {}: {err}", self.function),
            Ok(annotations) => {
                writeln!(f, "fn {}:", self.function)?;
                for annotation in annotations {
                    if !annotation.reachable {
                        writeln!(f, "    {}: unreachable", annotation.name)?;
                        continue;
                    }
                    writeln!(f, "    {}: reachable", annotation.name)?;
                    for argument in &annotation.arguments {
                        writeln!(f, "        {}: {}", argument.name, argument.truth)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// The truth of each boolean argument of `function` in `env`.
pub fn argument_facts(context: &Context, function: Function, env: &Environment) -> Vec<ArgumentFact> {
    let arena = env.arena();
    function
        .args_iter(context)
        .filter(|(_, arg)| arg.is_bool_ty(context))
        .map(|(name, arg)| {
            let formula = env
                .get_value(*arg)
                .map(|bool_value| bool_value.formula())
                .unwrap_or_else(|| arena.make_atom_ref(arena.value_atom(*arg)));
            let truth = if env.proves(formula) {
                Truth::ProvenTrue
            } else if env.proves(arena.make_not(formula)) {
                Truth::ProvenFalse
            } else {
                Truth::Unknown
            };
            ArgumentFact {
                name: name.clone(),
                truth,
            }
        })
        .collect()
}

/// Analyze a single function with `model` attached and summarize every annotated point.
pub fn analyze_function(
    context: &Context,
    function: Function,
    model: &CheckModel,
    options: &DataflowOptions,
) -> FunctionReport {
    let arena = FormulaArena::new();
    let outcome = run_dataflow_analysis(context, function, &arena, model, options).map(|results| {
        results
            .annotations()
            .map(|(name, env)| {
                let reachable = env.is_feasible();
                AnnotationReport {
                    name: name.to_owned(),
                    reachable,
                    arguments: if reachable {
                        argument_facts(context, function, env)
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    });
    debug!(
        function = %function.get_name(context),
        num_formulas = arena.num_formulas(),
        "analyzed"
    );
    FunctionReport {
        function: function.get_name(context),
        outcome,
    }
}

/// Analyze every function with a body in `module`, in parallel.  Each run owns its own formula
/// arena and all of them share `model`.  The reports are in module order.
pub fn analyze_module(
    context: &Context,
    module: Module,
    model: &CheckModel,
    options: &DataflowOptions,
) -> Vec<FunctionReport> {
    let functions: Vec<Function> = module
        .function_iter(context)
        .filter(|function| !function.is_declaration(context))
        .collect();
    functions
        .par_iter()
        .map(|function| analyze_function(context, *function, model, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertflow_ir::parser::parse;
    use pretty_assertions::assert_eq;

    #[test]
    fn unreachable_points_have_no_facts() {
        let context = parse(
            r#"
module {
    fn target(Foo: bool) -> () {
        entry():
        v0 = const bool false
        cbr v0, never(), always()

        never():
        annotate never
        br always()

        always():
        annotate always
        v1 = const () ()
        ret () v1
    }
}
"#,
        )
        .unwrap();
        let module = context.module_iter().next().unwrap();
        let reports = analyze_module(
            &context,
            module,
            &CheckModel::default(),
            &DataflowOptions::default(),
        );
        assert_eq!(reports.len(), 1);

        let never = reports[0].annotation("never").unwrap();
        assert!(!never.reachable);
        assert!(never.arguments.is_empty());

        let always = reports[0].annotation("always").unwrap();
        assert!(always.reachable);
        assert_eq!(
            always.arguments,
            vec![ArgumentFact {
                name: "Foo".to_owned(),
                truth: Truth::Unknown
            }]
        );
        assert_eq!(
            reports[0].to_string(),
            "fn target:\n    never: unreachable\n    always: reachable\n        Foo: unknown\n"
        );
    }
}
