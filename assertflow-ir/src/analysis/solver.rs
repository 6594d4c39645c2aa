//! Satisfiability of [`Formula`]s.
//!
//! Formulas are Tseitin encoded into CNF, one variable per atom and per distinct compound
//! sub-formula, then decided by a DPLL search with unit propagation.  The flow conditions built by
//! the engine are small, so the search is kept simple: chronological backtracking and naive
//! propagation over every clause.

use rustc_hash::FxHashMap;

use super::formula::{Atom, Formula, FormulaArena, FormulaContent};

/// Decide whether some assignment of the atoms makes `formula` true.
pub fn is_satisfiable(arena: &FormulaArena, formula: Formula) -> bool {
    if let Some(b) = arena.as_literal(formula) {
        return b;
    }
    let mut encoder = CnfEncoder::default();
    let root = encoder.encode(arena, formula);
    encoder.clauses.push(vec![root]);
    Dpll::new(encoder.num_vars, encoder.clauses).solve()
}

/// Decide whether `formula` is true under every assignment.
pub fn is_valid(arena: &FormulaArena, formula: Formula) -> bool {
    !is_satisfiable(arena, arena.make_not(formula))
}

// Literals are DIMACS style: variable `n` is `n` when true and `-n` when false, `n > 0`.
type Lit = i32;

#[derive(Default)]
struct CnfEncoder {
    num_vars: i32,
    clauses: Vec<Vec<Lit>>,
    atom_vars: FxHashMap<Atom, Lit>,
    formula_lits: FxHashMap<Formula, Lit>,
}

impl CnfEncoder {
    fn new_var(&mut self) -> Lit {
        self.num_vars += 1;
        self.num_vars
    }

    fn encode(&mut self, arena: &FormulaArena, formula: Formula) -> Lit {
        if let Some(lit) = self.formula_lits.get(&formula) {
            return *lit;
        }
        let lit = match arena.get(formula) {
            FormulaContent::AtomRef(atom) => match self.atom_vars.get(&atom) {
                Some(var) => *var,
                None => {
                    let var = self.new_var();
                    self.atom_vars.insert(atom, var);
                    var
                }
            },
            FormulaContent::Literal(b) => {
                let var = self.new_var();
                self.clauses.push(vec![var]);
                if b {
                    var
                } else {
                    -var
                }
            }
            FormulaContent::Not(operand) => -self.encode(arena, operand),
            FormulaContent::And(lhs, rhs) => {
                let (x, y) = (self.encode(arena, lhs), self.encode(arena, rhs));
                let v = self.new_var();
                self.clauses.push(vec![-v, x]);
                self.clauses.push(vec![-v, y]);
                self.clauses.push(vec![v, -x, -y]);
                v
            }
            FormulaContent::Or(lhs, rhs) => {
                let (x, y) = (self.encode(arena, lhs), self.encode(arena, rhs));
                self.encode_or(x, y)
            }
            FormulaContent::Implies(lhs, rhs) => {
                let (x, y) = (self.encode(arena, lhs), self.encode(arena, rhs));
                self.encode_or(-x, y)
            }
            FormulaContent::Equals(lhs, rhs) => {
                let (x, y) = (self.encode(arena, lhs), self.encode(arena, rhs));
                let v = self.new_var();
                self.clauses.push(vec![-v, -x, y]);
                self.clauses.push(vec![-v, x, -y]);
                self.clauses.push(vec![v, x, y]);
                self.clauses.push(vec![v, -x, -y]);
                v
            }
        };
        self.formula_lits.insert(formula, lit);
        lit
    }

    fn encode_or(&mut self, x: Lit, y: Lit) -> Lit {
        let v = self.new_var();
        self.clauses.push(vec![-v, x, y]);
        self.clauses.push(vec![v, -x]);
        self.clauses.push(vec![v, -y]);
        v
    }
}

struct Decision {
    trail_len: usize,
    lit: Lit,
    flipped: bool,
}

struct Dpll {
    clauses: Vec<Vec<Lit>>,
    // Indexed by variable, slot 0 is unused.
    assignment: Vec<Option<bool>>,
    trail: Vec<Lit>,
    decisions: Vec<Decision>,
}

enum ClauseState {
    Satisfied,
    Conflict,
    Unit(Lit),
    Unresolved,
}

impl Dpll {
    fn new(num_vars: i32, clauses: Vec<Vec<Lit>>) -> Self {
        Dpll {
            clauses,
            assignment: vec![None; num_vars as usize + 1],
            trail: Vec::new(),
            decisions: Vec::new(),
        }
    }

    fn value_of(&self, lit: Lit) -> Option<bool> {
        self.assignment[lit.unsigned_abs() as usize].map(|b| if lit > 0 { b } else { !b })
    }

    fn assign(&mut self, lit: Lit) {
        self.assignment[lit.unsigned_abs() as usize] = Some(lit > 0);
        self.trail.push(lit);
    }

    fn undo_to(&mut self, trail_len: usize) {
        while self.trail.len() > trail_len {
            if let Some(lit) = self.trail.pop() {
                self.assignment[lit.unsigned_abs() as usize] = None;
            }
        }
    }

    fn clause_state(&self, clause: &[Lit]) -> ClauseState {
        let mut unassigned = None;
        let mut num_unassigned = 0;
        for lit in clause {
            match self.value_of(*lit) {
                Some(true) => return ClauseState::Satisfied,
                Some(false) => (),
                None => {
                    num_unassigned += 1;
                    unassigned = Some(*lit);
                }
            }
        }
        match (num_unassigned, unassigned) {
            (0, _) => ClauseState::Conflict,
            (1, Some(lit)) => ClauseState::Unit(lit),
            _ => ClauseState::Unresolved,
        }
    }

    // Returns false on conflict.
    fn propagate(&mut self) -> bool {
        loop {
            let mut changed = false;
            for idx in 0..self.clauses.len() {
                match self.clause_state(&self.clauses[idx]) {
                    ClauseState::Conflict => return false,
                    ClauseState::Unit(lit) => {
                        self.assign(lit);
                        changed = true;
                    }
                    ClauseState::Satisfied | ClauseState::Unresolved => (),
                }
            }
            if !changed {
                return true;
            }
        }
    }

    fn solve(mut self) -> bool {
        loop {
            if !self.propagate() {
                // Backtrack to the most recent decision which hasn't tried both polarities.
                loop {
                    let Some(decision) = self.decisions.pop() else {
                        return false;
                    };
                    self.undo_to(decision.trail_len);
                    if !decision.flipped {
                        self.decisions.push(Decision {
                            trail_len: decision.trail_len,
                            lit: -decision.lit,
                            flipped: true,
                        });
                        self.assign(-decision.lit);
                        break;
                    }
                }
                continue;
            }

            let Some(var) = (1..self.assignment.len()).find(|var| self.assignment[*var].is_none())
            else {
                return true;
            };
            let lit = var as Lit;
            self.decisions.push(Decision {
                trail_len: self.trail.len(),
                lit,
                flipped: false,
            });
            self.assign(lit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tautologies_and_contradictions() {
        let arena = FormulaArena::new();
        let a = arena.make_atom_ref(arena.make_atom());
        let b = arena.make_atom_ref(arena.make_atom());

        // (a -> b) AND a AND NOT b
        let contradiction = arena.make_and_all([arena.make_implies(a, b), a, arena.make_not(b)]);
        assert!(!is_satisfiable(&arena, contradiction));

        // ((a -> b) AND a) -> b
        let modus_ponens = arena.make_implies(arena.make_and(arena.make_implies(a, b), a), b);
        assert!(is_valid(&arena, modus_ponens));

        assert!(is_satisfiable(&arena, arena.make_or(a, b)));
        assert!(!is_valid(&arena, arena.make_or(a, b)));
    }

    #[test]
    fn equivalences_need_search() {
        let arena = FormulaArena::new();
        let a = arena.make_atom_ref(arena.make_atom());
        let b = arena.make_atom_ref(arena.make_atom());
        let c = arena.make_atom_ref(arena.make_atom());

        // (a OR b) AND (a OR c) is equivalent to a OR (b AND c).
        let lhs = arena.make_and(arena.make_or(a, b), arena.make_or(a, c));
        let rhs = arena.make_or(a, arena.make_and(b, c));
        assert!(is_valid(&arena, arena.make_equals(lhs, rhs)));

        // The parity of three atoms can be either.
        let xor = |x, y| arena.make_not(arena.make_equals(x, y));
        let parity = xor(xor(a, b), c);
        assert!(is_satisfiable(&arena, parity));
        assert!(is_satisfiable(&arena, arena.make_not(parity)));
    }
}
