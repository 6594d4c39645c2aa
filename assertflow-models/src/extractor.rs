//! Turning a located condition into a proposition over the environment's values.

use assertflow_ir::{operand_formula, Context, Environment, Formula, Value};

/// The proposition that `condition` is true.
///
/// If the engine already computed a value for the condition that value is used, so e.g. a
/// condition `not Foo` yields the negation of `Foo`'s atom.  Otherwise a value is made up for the
/// condition and associated with it in `env`, so that later uses of the same condition (a branch
/// on it, another check) refer to the same atom.  The synthesized atom is the condition's stable
/// atom, which keeps the state of a loop revisiting the call from growing.
pub fn extract_condition(context: &Context, condition: Value, env: &mut Environment<'_>) -> Formula {
    match operand_formula(context, env, condition) {
        Some(formula) => formula,
        // Only reachable for a condition the locator didn't type check.
        None => env.make_opaque_value(condition).formula(),
    }
}
