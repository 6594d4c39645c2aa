//! The abstract state at a program point.
//!
//! An [`Environment`] maps IR values to boolean abstract values and carries the flow condition:
//! the formula which holds on every path reaching the point.  Facts are only ever added to the
//! flow condition, with one exception: when an IR value is redefined (a block revisited in a
//! loop, or a block argument bound on a back edge) the facts about its previous instance are
//! existentially eliminated before the new instance is described.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::value::Value;

use super::{
    formula::{Atom, BoolValue, Formula, FormulaArena},
    solver::is_satisfiable,
};

#[derive(Clone)]
pub struct Environment<'a> {
    arena: &'a FormulaArena,
    values: BTreeMap<Value, BoolValue>,
    flow_condition: Formula,
}

impl<'a> Environment<'a> {
    /// An environment which knows nothing: no values and a `true` flow condition.
    pub fn new(arena: &'a FormulaArena) -> Self {
        Environment {
            arena,
            values: BTreeMap::new(),
            flow_condition: arena.make_literal(true),
        }
    }

    /// The formula arena owned by this analysis run.
    pub fn arena(&self) -> &'a FormulaArena {
        self.arena
    }

    /// The value associated with the IR `value`, if one was computed.
    pub fn get_value(&self, value: Value) -> Option<BoolValue> {
        self.values.get(&value).copied()
    }

    /// Associate `bool_value` with the IR `value`, replacing any previous association.
    pub fn set_value(&mut self, value: Value, bool_value: BoolValue) {
        self.values.insert(value, bool_value);
    }

    /// Forget the association for the IR `value`.
    pub fn clear_value(&mut self, value: Value) {
        self.values.remove(&value);
    }

    /// A value for a fresh atom, unrelated to anything else in the run.
    pub fn make_atom_value(&self) -> BoolValue {
        BoolValue::new(self.arena.make_atom_ref(self.arena.make_atom()))
    }

    /// Describe a new instance of the opaque IR `value` by its stable atom.
    ///
    /// Whatever the flow condition said about a previous instance is eliminated first, along with
    /// the values defined in terms of it, so the new instance starts unconstrained.
    pub fn make_opaque_value(&mut self, value: Value) -> BoolValue {
        let atom = self.arena.value_atom(value);
        self.forget_atom(atom);
        let bool_value = BoolValue::new(self.arena.make_atom_ref(atom));
        self.set_value(value, bool_value);
        bool_value
    }

    fn forget_atom(&mut self, atom: Atom) {
        self.flow_condition = self.arena.eliminate(self.flow_condition, atom);
        let arena = self.arena;
        self.values
            .retain(|_, bool_value| !arena.mentions(bool_value.formula(), atom));
    }

    /// The formula which holds on every path reaching this point.
    pub fn flow_condition(&self) -> Formula {
        self.flow_condition
    }

    /// Add `formula` to the flow condition.
    pub fn assume(&mut self, formula: Formula) {
        self.flow_condition = self.arena.make_and(self.flow_condition, formula);
    }

    /// Whether `formula` holds on every path reaching this point.
    pub fn proves(&self, formula: Formula) -> bool {
        !is_satisfiable(
            self.arena,
            self.arena
                .make_and(self.flow_condition, self.arena.make_not(formula)),
        )
    }

    /// Whether `formula` holds on some path reaching this point.
    pub fn allows(&self, formula: Formula) -> bool {
        is_satisfiable(self.arena, self.arena.make_and(self.flow_condition, formula))
    }

    /// Whether any path reaches this point at all.
    pub fn is_feasible(&self) -> bool {
        is_satisfiable(self.arena, self.flow_condition)
    }

    /// Bind each block parameter to the value passed for it along an edge.
    ///
    /// `bindings` pairs each boolean parameter with the passed value, or `None` when the passed
    /// value is unknown.  The parameters' stable atoms may already appear in the flow condition
    /// or in the passed values (a back edge passing `not p` to `p`), so they're renamed to fresh
    /// atoms which are eliminated once the new bindings are in place.
    pub fn bind_parameters(&mut self, bindings: &[(Value, Option<BoolValue>)]) {
        if bindings.is_empty() {
            return;
        }

        let arena = self.arena;
        let mut renaming = FxHashMap::default();
        let mut renamed_atoms = Vec::with_capacity(bindings.len());
        let mut param_atoms = Vec::with_capacity(bindings.len());
        for (param, _) in bindings {
            let param_atom = arena.value_atom(*param);
            let old_instance = arena.make_atom();
            renaming.insert(param_atom, arena.make_atom_ref(old_instance));
            renamed_atoms.push(old_instance);
            param_atoms.push(param_atom);
        }

        let mut flow_condition = arena.substitute(self.flow_condition, &renaming);
        for ((param, passed), param_atom) in bindings.iter().zip(param_atoms.iter()) {
            let param_formula = arena.make_atom_ref(*param_atom);
            if let Some(passed) = passed {
                let passed = arena.substitute(passed.formula(), &renaming);
                flow_condition =
                    arena.make_and(flow_condition, arena.make_equals(param_formula, passed));
            }
            self.values.remove(param);
        }
        for old_instance in renamed_atoms {
            flow_condition = arena.eliminate(flow_condition, old_instance);
        }
        self.flow_condition = flow_condition;

        self.values.retain(|_, bool_value| {
            param_atoms
                .iter()
                .all(|atom| !arena.mentions(bool_value.formula(), *atom))
        });
        for ((param, _), param_atom) in bindings.iter().zip(param_atoms) {
            self.values
                .insert(*param, BoolValue::new(arena.make_atom_ref(param_atom)));
        }
    }

    /// The least upper bound of two environments, at a point where their paths meet.
    ///
    /// Values which agree are kept.  Values which disagree are represented by the value's merge
    /// atom `m`, with the flow condition `(FC1 AND m <-> v1) OR (FC2 AND m <-> v2)`.  Values known
    /// on only one side are dropped.
    pub fn join(&self, other: &Environment<'a>) -> Environment<'a> {
        let arena = self.arena;

        let mut agreed = BTreeMap::new();
        let mut disagreed = Vec::new();
        for (value, lhs) in &self.values {
            match other.values.get(value) {
                Some(rhs) if rhs == lhs => {
                    agreed.insert(*value, *lhs);
                }
                Some(rhs) => disagreed.push((*value, *lhs, *rhs)),
                None => (),
            }
        }

        if disagreed.is_empty() {
            return Environment {
                arena,
                values: agreed,
                flow_condition: arena.make_or(self.flow_condition, other.flow_condition),
            };
        }

        // A merge atom may already describe an earlier meeting of the same value, so the old
        // meaning is renamed away and eliminated like a redefined parameter.
        let mut renaming = FxHashMap::default();
        let mut renamed_atoms = Vec::with_capacity(disagreed.len());
        let mut merge_atoms = Vec::with_capacity(disagreed.len());
        for (value, _, _) in &disagreed {
            let merge_atom = arena.merge_atom(*value);
            let old_instance = arena.make_atom();
            renaming.insert(merge_atom, arena.make_atom_ref(old_instance));
            renamed_atoms.push(old_instance);
            merge_atoms.push(merge_atom);
        }

        let mut lhs_condition = arena.substitute(self.flow_condition, &renaming);
        let mut rhs_condition = arena.substitute(other.flow_condition, &renaming);
        let mut values = agreed;
        values.retain(|_, bool_value| {
            merge_atoms
                .iter()
                .all(|atom| !arena.mentions(bool_value.formula(), *atom))
        });
        for ((value, lhs, rhs), merge_atom) in disagreed.into_iter().zip(merge_atoms) {
            let merged = arena.make_atom_ref(merge_atom);
            let lhs = arena.substitute(lhs.formula(), &renaming);
            let rhs = arena.substitute(rhs.formula(), &renaming);
            lhs_condition = arena.make_and(lhs_condition, arena.make_equals(merged, lhs));
            rhs_condition = arena.make_and(rhs_condition, arena.make_equals(merged, rhs));
            values.insert(value, BoolValue::new(merged));
        }

        let mut flow_condition = arena.make_or(lhs_condition, rhs_condition);
        for old_instance in renamed_atoms {
            flow_condition = arena.eliminate(flow_condition, old_instance);
        }

        Environment {
            arena,
            values,
            flow_condition,
        }
    }

    /// Whether the two environments describe the same state: identical values and semantically
    /// equivalent flow conditions.
    pub fn equivalent_to(&self, other: &Environment<'a>) -> bool {
        if self.values != other.values {
            return false;
        }
        if self.flow_condition == other.flow_condition {
            return true;
        }
        let differ = self.arena.make_not(
            self.arena
                .make_equals(self.flow_condition, other.flow_condition),
        );
        !is_satisfiable(self.arena, differ)
    }
}

impl std::fmt::Debug for Environment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field(
                "values",
                &self
                    .values
                    .iter()
                    .map(|(value, bool_value)| (value, self.arena.to_string(bool_value.formula())))
                    .collect::<Vec<_>>(),
            )
            .field("flow_condition", &self.arena.to_string(self.flow_condition))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constant, Context};

    fn values(count: usize) -> (Context, Vec<Value>) {
        let mut context = Context::default();
        let values = (0..count)
            .map(|idx| Constant::get_uint(&mut context, idx as u64))
            .collect();
        (context, values)
    }

    #[test]
    fn assume_then_prove() {
        let arena = FormulaArena::new();
        let mut env = Environment::new(&arena);
        let foo = env.make_atom_value().formula();

        assert!(!env.proves(foo));
        assert!(env.allows(foo));
        env.assume(foo);
        assert!(env.proves(foo));
        assert!(!env.allows(arena.make_not(foo)));
        assert!(env.is_feasible());

        env.assume(arena.make_not(foo));
        assert!(!env.is_feasible());
    }

    #[test]
    fn join_keeps_common_facts_only() {
        let (_context, vals) = values(1);
        let arena = FormulaArena::new();
        let mut base = Environment::new(&arena);
        let a = base.make_opaque_value(vals[0]).formula();
        let b = base.make_atom_value().formula();

        let mut lhs = base.clone();
        lhs.assume(a);
        lhs.assume(b);
        let mut rhs = base.clone();
        rhs.assume(a);
        rhs.assume(arena.make_not(b));

        let joined = lhs.join(&rhs);
        assert!(joined.proves(a));
        assert!(!joined.proves(b));
        assert!(!joined.proves(arena.make_not(b)));
        assert_eq!(joined.get_value(vals[0]), Some(BoolValue::new(a)));
    }

    #[test]
    fn join_merges_disagreeing_values() {
        let (_context, vals) = values(1);
        let arena = FormulaArena::new();
        let base = Environment::new(&arena);
        let c = base.make_atom_value().formula();

        let mut lhs = base.clone();
        lhs.assume(c);
        lhs.set_value(vals[0], BoolValue::new(arena.make_literal(true)));
        let mut rhs = base.clone();
        rhs.assume(arena.make_not(c));
        rhs.set_value(vals[0], BoolValue::new(arena.make_literal(false)));

        let joined = lhs.join(&rhs);
        let merged = joined.get_value(vals[0]).unwrap().formula();
        assert!(joined.proves(arena.make_equals(merged, c)));
    }

    #[test]
    fn opaque_values_forget_their_previous_instance() {
        let (_context, vals) = values(1);
        let arena = FormulaArena::new();
        let mut env = Environment::new(&arena);
        let first = env.make_opaque_value(vals[0]).formula();
        env.assume(first);
        assert!(env.proves(first));

        let second = env.make_opaque_value(vals[0]).formula();
        assert_eq!(first, second);
        assert!(!env.proves(second));
        assert!(env.is_feasible());
    }

    #[test]
    fn parameters_may_be_bound_in_terms_of_themselves() {
        let (_context, vals) = values(1);
        let arena = FormulaArena::new();
        let mut env = Environment::new(&arena);
        let p = env.make_opaque_value(vals[0]).formula();
        env.assume(p);

        // A back edge passing `not p` for `p`.
        env.bind_parameters(&[(vals[0], Some(BoolValue::new(arena.make_not(p))))]);
        let new_p = env.get_value(vals[0]).unwrap().formula();
        assert!(env.proves(arena.make_not(new_p)));
        assert!(env.is_feasible());
    }

    #[test]
    fn equivalence_is_semantic() {
        let arena = FormulaArena::new();
        let base = Environment::new(&arena);
        let a = base.make_atom_value().formula();
        let b = base.make_atom_value().formula();

        let mut lhs = base.clone();
        lhs.assume(arena.make_or(a, b));
        let mut rhs = base.clone();
        rhs.assume(arena.make_not(arena.make_and(arena.make_not(a), arena.make_not(b))));

        assert_ne!(lhs.flow_condition(), rhs.flow_condition());
        assert!(lhs.equivalent_to(&rhs));
        assert!(!lhs.equivalent_to(&base));
    }
}
