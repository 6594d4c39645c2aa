//! Hash-consed propositional formulas over boolean atoms.
//!
//! Every [`Formula`] is a `Copy` handle into a [`FormulaArena`].  Structurally equal formulas are
//! interned to the same handle, so comparing handles is comparing structure.  The constructors
//! perform local simplifications only; semantic questions go to the [solver](super::solver).

use std::{
    cell::{Cell, RefCell},
    collections::BTreeSet,
};

use rustc_hash::FxHashMap;

use crate::value::Value;

/// A propositional variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// A handle to an interned formula in a [`FormulaArena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Formula(u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormulaContent {
    AtomRef(Atom),
    Literal(bool),
    Not(Formula),
    And(Formula, Formula),
    Or(Formula, Formula),
    Implies(Formula, Formula),
    Equals(Formula, Formula),
}

/// The owner of every formula and atom created during one analysis run.
///
/// The arena is shared by reference between all the environments of a run, so interning goes
/// through interior mutability.
#[derive(Default)]
pub struct FormulaArena {
    formulas: RefCell<Vec<FormulaContent>>,
    interned: RefCell<FxHashMap<FormulaContent, Formula>>,
    next_atom: Cell<u32>,
    value_atoms: RefCell<FxHashMap<Value, Atom>>,
    merge_atoms: RefCell<FxHashMap<Value, Atom>>,
}

/// A boolean abstract value: the formula which holds exactly when the value is `true`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoolValue {
    formula: Formula,
}

impl BoolValue {
    pub fn new(formula: Formula) -> Self {
        BoolValue { formula }
    }

    pub fn formula(&self) -> Formula {
        self.formula
    }
}

impl FormulaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the content of `formula`.
    pub fn get(&self, formula: Formula) -> FormulaContent {
        self.formulas.borrow()[formula.0 as usize]
    }

    /// Total number of distinct formulas interned so far.
    pub fn num_formulas(&self) -> usize {
        self.formulas.borrow().len()
    }

    fn intern(&self, content: FormulaContent) -> Formula {
        if let Some(formula) = self.interned.borrow().get(&content) {
            return *formula;
        }
        let mut formulas = self.formulas.borrow_mut();
        let formula = Formula(formulas.len() as u32);
        formulas.push(content);
        self.interned.borrow_mut().insert(content, formula);
        formula
    }

    /// Create a fresh atom, distinct from every other atom of this arena.
    pub fn make_atom(&self) -> Atom {
        let atom = Atom(self.next_atom.get());
        self.next_atom.set(atom.0 + 1);
        atom
    }

    /// The stable atom standing for an opaque IR `value`.  Every request for the same value
    /// returns the same atom, so revisits of a block reuse it.
    pub fn value_atom(&self, value: Value) -> Atom {
        if let Some(atom) = self.value_atoms.borrow().get(&value) {
            return *atom;
        }
        let atom = self.make_atom();
        self.value_atoms.borrow_mut().insert(value, atom);
        atom
    }

    /// The stable atom standing for `value` where two paths with different values for it meet.
    pub fn merge_atom(&self, value: Value) -> Atom {
        if let Some(atom) = self.merge_atoms.borrow().get(&value) {
            return *atom;
        }
        let atom = self.make_atom();
        self.merge_atoms.borrow_mut().insert(value, atom);
        atom
    }

    pub fn make_atom_ref(&self, atom: Atom) -> Formula {
        self.intern(FormulaContent::AtomRef(atom))
    }

    pub fn make_literal(&self, value: bool) -> Formula {
        self.intern(FormulaContent::Literal(value))
    }

    /// Return the literal value of `formula` if it is one.
    pub fn as_literal(&self, formula: Formula) -> Option<bool> {
        match self.get(formula) {
            FormulaContent::Literal(b) => Some(b),
            _ => None,
        }
    }

    fn is_negation_of(&self, lhs: Formula, rhs: Formula) -> bool {
        self.get(lhs) == FormulaContent::Not(rhs) || self.get(rhs) == FormulaContent::Not(lhs)
    }

    pub fn make_not(&self, operand: Formula) -> Formula {
        match self.get(operand) {
            FormulaContent::Literal(b) => self.make_literal(!b),
            FormulaContent::Not(inner) => inner,
            _ => self.intern(FormulaContent::Not(operand)),
        }
    }

    pub fn make_and(&self, lhs: Formula, rhs: Formula) -> Formula {
        match (self.as_literal(lhs), self.as_literal(rhs)) {
            (Some(false), _) | (_, Some(false)) => self.make_literal(false),
            (Some(true), _) => rhs,
            (_, Some(true)) => lhs,
            _ if lhs == rhs => lhs,
            _ if self.is_negation_of(lhs, rhs) => self.make_literal(false),
            _ if self.conjuncts_contain(lhs, rhs) => lhs,
            _ if self.conjuncts_contain(rhs, lhs) => rhs,
            _ => self.intern(FormulaContent::And(lhs.min(rhs), lhs.max(rhs))),
        }
    }

    // Whether `needle` is one of the top level conjuncts of `haystack`, i.e., whether
    // `haystack AND needle` is just `haystack`.
    fn conjuncts_contain(&self, haystack: Formula, needle: Formula) -> bool {
        let mut stack = vec![haystack];
        while let Some(formula) = stack.pop() {
            if formula == needle {
                return true;
            }
            if let FormulaContent::And(lhs, rhs) = self.get(formula) {
                stack.push(lhs);
                stack.push(rhs);
            }
        }
        false
    }

    /// Conjoin every formula in `formulas`, `true` if there are none.
    pub fn make_and_all(&self, formulas: impl IntoIterator<Item = Formula>) -> Formula {
        formulas
            .into_iter()
            .fold(self.make_literal(true), |acc, formula| self.make_and(acc, formula))
    }

    pub fn make_or(&self, lhs: Formula, rhs: Formula) -> Formula {
        match (self.as_literal(lhs), self.as_literal(rhs)) {
            (Some(true), _) | (_, Some(true)) => self.make_literal(true),
            (Some(false), _) => rhs,
            (_, Some(false)) => lhs,
            _ if lhs == rhs => lhs,
            _ if self.is_negation_of(lhs, rhs) => self.make_literal(true),
            _ => self.intern(FormulaContent::Or(lhs.min(rhs), lhs.max(rhs))),
        }
    }

    pub fn make_implies(&self, lhs: Formula, rhs: Formula) -> Formula {
        match (self.as_literal(lhs), self.as_literal(rhs)) {
            (Some(false), _) | (_, Some(true)) => self.make_literal(true),
            (Some(true), _) => rhs,
            (_, Some(false)) => self.make_not(lhs),
            _ if lhs == rhs => self.make_literal(true),
            _ => self.intern(FormulaContent::Implies(lhs, rhs)),
        }
    }

    pub fn make_equals(&self, lhs: Formula, rhs: Formula) -> Formula {
        match (self.as_literal(lhs), self.as_literal(rhs)) {
            (Some(true), _) => rhs,
            (_, Some(true)) => lhs,
            (Some(false), _) => self.make_not(rhs),
            (_, Some(false)) => self.make_not(lhs),
            _ if lhs == rhs => self.make_literal(true),
            _ if self.is_negation_of(lhs, rhs) => self.make_literal(false),
            _ => self.intern(FormulaContent::Equals(lhs.min(rhs), lhs.max(rhs))),
        }
    }

    /// Replace each atom in `formula` found in `substitution` by the formula it maps to.
    pub fn substitute(&self, formula: Formula, substitution: &FxHashMap<Atom, Formula>) -> Formula {
        let mut memo = FxHashMap::default();
        self.substitute_memo(formula, substitution, &mut memo)
    }

    fn substitute_memo(
        &self,
        formula: Formula,
        substitution: &FxHashMap<Atom, Formula>,
        memo: &mut FxHashMap<Formula, Formula>,
    ) -> Formula {
        if let Some(result) = memo.get(&formula) {
            return *result;
        }
        let result = match self.get(formula) {
            FormulaContent::AtomRef(atom) => substitution.get(&atom).copied().unwrap_or(formula),
            FormulaContent::Literal(_) => formula,
            FormulaContent::Not(operand) => {
                let operand = self.substitute_memo(operand, substitution, memo);
                self.make_not(operand)
            }
            FormulaContent::And(lhs, rhs) => {
                let lhs = self.substitute_memo(lhs, substitution, memo);
                let rhs = self.substitute_memo(rhs, substitution, memo);
                self.make_and(lhs, rhs)
            }
            FormulaContent::Or(lhs, rhs) => {
                let lhs = self.substitute_memo(lhs, substitution, memo);
                let rhs = self.substitute_memo(rhs, substitution, memo);
                self.make_or(lhs, rhs)
            }
            FormulaContent::Implies(lhs, rhs) => {
                let lhs = self.substitute_memo(lhs, substitution, memo);
                let rhs = self.substitute_memo(rhs, substitution, memo);
                self.make_implies(lhs, rhs)
            }
            FormulaContent::Equals(lhs, rhs) => {
                let lhs = self.substitute_memo(lhs, substitution, memo);
                let rhs = self.substitute_memo(rhs, substitution, memo);
                self.make_equals(lhs, rhs)
            }
        };
        memo.insert(formula, result);
        result
    }

    /// Existentially quantify `atom` away: `formula[atom := true] OR formula[atom := false]`.
    ///
    /// The result mentions no occurrence of `atom` and is satisfiable exactly when `formula` is.
    pub fn eliminate(&self, formula: Formula, atom: Atom) -> Formula {
        if !self.mentions(formula, atom) {
            return formula;
        }
        let when_true =
            self.substitute(formula, &FxHashMap::from_iter([(atom, self.make_literal(true))]));
        let when_false =
            self.substitute(formula, &FxHashMap::from_iter([(atom, self.make_literal(false))]));
        self.make_or(when_true, when_false)
    }

    /// Every atom occurring in `formula`.
    pub fn atoms(&self, formula: Formula) -> BTreeSet<Atom> {
        let mut atoms = BTreeSet::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![formula];
        while let Some(formula) = stack.pop() {
            if !seen.insert(formula) {
                continue;
            }
            match self.get(formula) {
                FormulaContent::AtomRef(atom) => {
                    atoms.insert(atom);
                }
                FormulaContent::Literal(_) => (),
                FormulaContent::Not(operand) => stack.push(operand),
                FormulaContent::And(lhs, rhs)
                | FormulaContent::Or(lhs, rhs)
                | FormulaContent::Implies(lhs, rhs)
                | FormulaContent::Equals(lhs, rhs) => {
                    stack.push(lhs);
                    stack.push(rhs);
                }
            }
        }
        atoms
    }

    /// Whether `atom` occurs anywhere in `formula`.
    pub fn mentions(&self, formula: Formula, atom: Atom) -> bool {
        self.atoms(formula).contains(&atom)
    }

    /// Render `formula` for diagnostics, e.g. `(A0 & !A1)`.
    pub fn to_string(&self, formula: Formula) -> String {
        match self.get(formula) {
            FormulaContent::AtomRef(atom) => format!("A{}", atom.0),
            FormulaContent::Literal(b) => b.to_string(),
            FormulaContent::Not(operand) => format!("!{}", self.to_string(operand)),
            FormulaContent::And(lhs, rhs) => {
                format!("({} & {})", self.to_string(lhs), self.to_string(rhs))
            }
            FormulaContent::Or(lhs, rhs) => {
                format!("({} | {})", self.to_string(lhs), self.to_string(rhs))
            }
            FormulaContent::Implies(lhs, rhs) => {
                format!("({} => {})", self.to_string(lhs), self.to_string(rhs))
            }
            FormulaContent::Equals(lhs, rhs) => {
                format!("({} = {})", self.to_string(lhs), self.to_string(rhs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structurally_equal_formulas_share_a_handle() {
        let arena = FormulaArena::new();
        let a = arena.make_atom_ref(arena.make_atom());
        let b = arena.make_atom_ref(arena.make_atom());

        assert_eq!(arena.make_and(a, b), arena.make_and(b, a));
        assert_eq!(arena.make_or(a, b), arena.make_or(b, a));
        assert_eq!(arena.make_equals(a, b), arena.make_equals(b, a));
        assert_ne!(arena.make_implies(a, b), arena.make_implies(b, a));
    }

    #[test]
    fn local_simplifications() {
        let arena = FormulaArena::new();
        let t = arena.make_literal(true);
        let f = arena.make_literal(false);
        let a = arena.make_atom_ref(arena.make_atom());
        let b = arena.make_atom_ref(arena.make_atom());

        assert_eq!(arena.make_and(a, a), a);
        assert_eq!(arena.make_and(a, t), a);
        assert_eq!(arena.make_and(f, a), f);
        assert_eq!(arena.make_not(arena.make_not(a)), a);
        assert_eq!(arena.make_and(a, arena.make_not(a)), f);
        assert_eq!(arena.make_or(a, arena.make_not(a)), t);
        assert_eq!(arena.make_implies(f, a), t);
        assert_eq!(arena.make_equals(a, t), a);
        assert_eq!(arena.make_equals(f, a), arena.make_not(a));

        let ab = arena.make_and(a, b);
        assert_eq!(arena.make_and(ab, a), ab);
        assert_eq!(arena.make_and(b, ab), ab);
    }

    #[test]
    fn elimination_removes_the_atom() {
        let arena = FormulaArena::new();
        let x = arena.make_atom();
        let y = arena.make_atom();
        let fx = arena.make_atom_ref(x);
        let fy = arena.make_atom_ref(y);

        // (x <-> y) AND x, with x eliminated, is y.
        let formula = arena.make_and(arena.make_equals(fx, fy), fx);
        let eliminated = arena.eliminate(formula, x);
        assert!(!arena.mentions(eliminated, x));
        assert_eq!(eliminated, fy);
    }

    #[test]
    fn stable_value_atoms() {
        let mut context = crate::Context::default();
        let v = crate::Constant::get_bool(&mut context, true);
        let w = crate::Constant::get_bool(&mut context, false);
        let arena = FormulaArena::new();

        assert_eq!(arena.value_atom(v), arena.value_atom(v));
        assert_ne!(arena.value_atom(v), arena.value_atom(w));
        assert_ne!(arena.value_atom(v), arena.merge_atom(v));
    }
}
