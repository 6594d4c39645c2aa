//! The flow-fact model for fatal-assertion calls.
//!
//! After a call to a cataloged assertion returns, its condition holds: the model assumes it in the
//! environment and the engine carries it to every later program point.  Calls which don't match,
//! or which match but don't fit the variant, contribute nothing.

use std::sync::Arc;

use assertflow_ir::{instruction_to_string, Context, DataflowModel, Environment, InstOp, Value};
use tracing::{debug, trace, warn};

use crate::{
    catalog::CallPatternCatalog,
    config::CheckModelConfig,
    extractor::extract_condition,
    locator::{locate_condition, LocatedCondition},
};

#[derive(Clone, Debug, Default)]
pub struct CheckModel {
    catalog: Arc<CallPatternCatalog>,
    config: CheckModelConfig,
}

impl CheckModel {
    pub fn new(catalog: Arc<CallPatternCatalog>, config: CheckModelConfig) -> Self {
        CheckModel { catalog, config }
    }

    pub fn catalog(&self) -> &CallPatternCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &CheckModelConfig {
        &self.config
    }
}

impl DataflowModel for CheckModel {
    fn transfer(&self, context: &Context, element: Value, env: &mut Environment<'_>) {
        let Some(InstOp::Call(callee, args)) = element.get_inst_op(context) else {
            return;
        };
        let Some(variant) = self.catalog.lookup_callee(context, *callee) else {
            return;
        };

        match locate_condition(context, variant, args) {
            LocatedCondition::Condition(condition) => {
                let formula = extract_condition(context, condition, env);
                debug!(
                    callee = %variant,
                    condition = %env.arena().to_string(formula),
                    "assuming checked condition"
                );
                env.assume(formula);
            }
            LocatedCondition::NoCondition => {
                trace!(callee = %variant, "check has no condition");
            }
            LocatedCondition::Malformed(reason) => {
                if self.config.strict {
                    warn!(
                        "call to {variant} doesn't fit its convention, {reason}: {}",
                        instruction_to_string(context, &element)
                    );
                } else {
                    trace!(callee = %variant, %reason, "ignoring malformed check");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertflow_ir::{parser::parse, FormulaArena, Function};

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn model_is_shareable() {
        assert_send_sync::<CheckModel>();
    }

    #[test]
    fn transfer_assumes_condition_of_matched_calls() {
        let context = parse(
            r#"
module {
    fn logging::CheckError::Check(file: str, line: u64, cond: bool) -> ()

    fn target(Foo: bool) -> () {
        entry():
        v0 = const str "a.cc"
        v1 = const u64 1
        v2 = call logging::CheckError::Check(v0, v1, Foo)
        ret () v2
    }
}
"#,
        )
        .unwrap();
        let module = context.module_iter().next().unwrap();
        let target: Function = module.lookup_function_by_name(&context, "target", 1).unwrap();
        let foo = target.get_arg(&context, "Foo").unwrap();
        let call = target
            .instruction_iter(&context)
            .map(|(_, ins)| ins)
            .find(|ins| matches!(ins.get_inst_op(&context), Some(InstOp::Call(..))))
            .unwrap();

        let arena = FormulaArena::new();
        let mut env = Environment::new(&arena);
        let foo_formula = env.make_opaque_value(foo).formula();

        let model = CheckModel::default();
        model.transfer(&context, call, &mut env);
        assert!(env.proves(foo_formula));

        // Assuming it again changes nothing.
        let before = env.flow_condition();
        model.transfer(&context, call, &mut env);
        assert_eq!(env.flow_condition(), before);
    }
}
