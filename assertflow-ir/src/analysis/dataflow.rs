//! A forward, flow-sensitive dataflow analysis over the CFG of a single function.
//!
//! Blocks are visited from a worklist ordered by reverse post-order.  A block's input is the join
//! of the states flowing along its incoming edges; the block is only revisited when that join is
//! not equivalent to the input it was last visited with.  Each instruction is first given to the
//! built-in transfer function, which models the boolean instructions, and then to the attached
//! [`DataflowModel`].

use std::collections::BTreeSet;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::{
    block::Block,
    context::Context,
    error::IrError,
    function::Function,
    instruction::{BinaryOpKind, BranchToWithArgs, InstOp, Predicate, UnaryOpKind},
    printer::instruction_to_string,
    value::Value,
};

use super::{
    environment::Environment,
    formula::{BoolValue, Formula, FormulaArena},
    postorder::compute_post_order,
};

/// The default bound on the number of times a single block may be visited.
pub const DEFAULT_MAX_BLOCK_VISITS: usize = 64;

/// A transfer function contributing flow facts on top of the built-in one.
pub trait DataflowModel {
    /// Update `env` for the instruction `element`.  Called once per instruction each time its
    /// block is visited, after the built-in transfer for the same instruction.
    fn transfer(&self, context: &Context, element: Value, env: &mut Environment<'_>);
}

/// A model which contributes nothing; the analysis then only sees the built-in transfer.
pub struct NoopModel;

impl DataflowModel for NoopModel {
    fn transfer(&self, _context: &Context, _element: Value, _env: &mut Environment<'_>) {}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataflowOptions {
    pub max_block_visits: usize,
}

impl Default for DataflowOptions {
    fn default() -> Self {
        DataflowOptions {
            max_block_visits: DEFAULT_MAX_BLOCK_VISITS,
        }
    }
}

/// The converged states of an analysis run.
pub struct DataflowResults<'a> {
    annotations: IndexMap<String, Environment<'a>>,
    num_block_visits: usize,
}

impl<'a> DataflowResults<'a> {
    /// The state immediately before the `annotate name` instruction, if its block was reached.
    pub fn state_at(&self, name: &str) -> Option<&Environment<'a>> {
        self.annotations.get(name)
    }

    /// Every recorded annotation in reverse post-order of their blocks.
    pub fn annotations(&self) -> impl Iterator<Item = (&str, &Environment<'a>)> {
        self.annotations
            .iter()
            .map(|(name, env)| (name.as_str(), env))
    }

    /// The total number of block visits it took to converge.
    pub fn num_block_visits(&self) -> usize {
        self.num_block_visits
    }
}

/// Run the analysis over `function` with `model` attached.
///
/// Every formula of the run is created in `arena`, which must outlive the results.
pub fn run_dataflow_analysis<'a>(
    context: &Context,
    function: Function,
    arena: &'a FormulaArena,
    model: &dyn DataflowModel,
    options: &DataflowOptions,
) -> Result<DataflowResults<'a>, IrError> {
    if function.is_declaration(context) {
        return Err(IrError::AnalysisOfDeclaration(function.get_name(context)));
    }

    let po = compute_post_order(context, &function);
    let rpo: Vec<Block> = po.reverse_post_order().copied().collect();
    let rpo_idx: FxHashMap<Block, usize> = rpo
        .iter()
        .enumerate()
        .map(|(idx, block)| (*block, idx))
        .collect();

    let entry = function.get_entry_block(context);
    let mut entry_input = Environment::new(arena);
    for (_, arg) in function.args_iter(context) {
        if arg.is_bool_ty(context) {
            entry_input.make_opaque_value(*arg);
        }
    }

    let mut edge_states: FxHashMap<(Block, Block), Environment<'a>> = FxHashMap::default();
    let mut block_inputs: FxHashMap<Block, Environment<'a>> = FxHashMap::default();
    let mut visits: FxHashMap<Block, usize> = FxHashMap::default();
    let mut num_block_visits = 0;

    let mut worklist = BTreeSet::from([0]);
    while let Some(idx) = worklist.pop_first() {
        let block = rpo[idx];
        let input = if block == entry {
            entry_input.clone()
        } else {
            match join_incoming(context, &rpo_idx, &edge_states, block) {
                Some(input) => input,
                None => continue,
            }
        };

        if block_inputs
            .get(&block)
            .is_some_and(|previous| previous.equivalent_to(&input))
        {
            continue;
        }

        let count = visits.entry(block).or_insert(0);
        *count += 1;
        if *count > options.max_block_visits {
            return Err(IrError::AnalysisMaxBlockVisits(
                function.get_name(context),
                block.get_label(context),
                options.max_block_visits,
            ));
        }
        num_block_visits += 1;
        debug!(
            function = %function.get_name(context),
            block = %block.get_label(context),
            visit = *count,
            "visiting block"
        );

        let mut env = input.clone();
        block_inputs.insert(block, input);
        for ins in block.instruction_iter(context) {
            transfer(context, model, ins, &mut env);
        }

        for (succ, out) in outgoing_edges(context, block, env) {
            edge_states.insert((block, succ), out);
            if let Some(succ_idx) = rpo_idx.get(&succ) {
                worklist.insert(*succ_idx);
            }
        }
    }

    // The states at the annotations are taken from one more pass over the converged inputs.
    let mut annotations = IndexMap::new();
    for block in &rpo {
        let Some(input) = block_inputs.get(block) else {
            continue;
        };
        let mut env = input.clone();
        for ins in block.instruction_iter(context) {
            if let Some(InstOp::Annotation(name)) = ins.get_inst_op(context) {
                annotations.insert(name.clone(), env.clone());
            }
            transfer(context, model, ins, &mut env);
        }
    }

    debug!(
        function = %function.get_name(context),
        num_block_visits, "analysis converged"
    );
    Ok(DataflowResults {
        annotations,
        num_block_visits,
    })
}

fn transfer(context: &Context, model: &dyn DataflowModel, ins: Value, env: &mut Environment<'_>) {
    trace!(instruction = %instruction_to_string(context, &ins), "transfer");
    builtin_transfer(context, ins, env);
    model.transfer(context, ins, env);
}

fn join_incoming<'a>(
    context: &Context,
    rpo_idx: &FxHashMap<Block, usize>,
    edge_states: &FxHashMap<(Block, Block), Environment<'a>>,
    block: Block,
) -> Option<Environment<'a>> {
    let mut preds: Vec<(usize, Block)> = block
        .pred_iter(context)
        .filter_map(|pred| rpo_idx.get(pred).map(|idx| (*idx, *pred)))
        .collect();
    preds.sort();

    preds
        .into_iter()
        .filter_map(|(_, pred)| edge_states.get(&(pred, block)))
        .fold(None, |joined: Option<Environment<'a>>, state| match joined {
            None => Some(state.clone()),
            Some(joined) => Some(joined.join(state)),
        })
}

/// The formula for a boolean operand, if it has one.
///
/// Boolean constants are literals.  A boolean value with nothing known about it, e.g. one defined
/// by an instruction the analysis doesn't model, is described by its stable atom.
pub fn operand_formula(context: &Context, env: &mut Environment<'_>, value: Value) -> Option<Formula> {
    if let Some(bool_value) = env.get_value(value) {
        return Some(bool_value.formula());
    }
    if let Some(b) = value.get_constant(context).and_then(|c| c.as_bool()) {
        return Some(env.arena().make_literal(b));
    }
    if value.is_bool_ty(context) {
        return Some(env.make_opaque_value(value).formula());
    }
    None
}

fn builtin_transfer(context: &Context, ins: Value, env: &mut Environment<'_>) {
    let Some(instruction) = ins.get_instruction(context) else {
        return;
    };
    let arena = env.arena();
    let formula = match &instruction.op {
        InstOp::UnaryOp {
            op: UnaryOpKind::Not,
            arg,
        } => operand_formula(context, env, *arg).map(|arg| arena.make_not(arg)),
        InstOp::BinaryOp { op, arg1, arg2 } if op.is_logical() => {
            let lhs = operand_formula(context, env, *arg1);
            let rhs = operand_formula(context, env, *arg2);
            lhs.zip(rhs).map(|(lhs, rhs)| match op {
                BinaryOpKind::And => arena.make_and(lhs, rhs),
                BinaryOpKind::Or => arena.make_or(lhs, rhs),
                _ => arena.make_not(arena.make_equals(lhs, rhs)),
            })
        }
        InstOp::Cmp(pred @ (Predicate::Equal | Predicate::NotEqual), lhs, rhs)
            if lhs.is_bool_ty(context) =>
        {
            let lhs = operand_formula(context, env, *lhs);
            let rhs = operand_formula(context, env, *rhs);
            lhs.zip(rhs).map(|(lhs, rhs)| {
                let equals = arena.make_equals(lhs, rhs);
                if *pred == Predicate::Equal {
                    equals
                } else {
                    arena.make_not(equals)
                }
            })
        }
        InstOp::Call(..) if ins.is_bool_ty(context) => {
            // Each call may return something new.
            env.make_opaque_value(ins);
            return;
        }
        InstOp::Annotation(_)
        | InstOp::Branch(_)
        | InstOp::ConditionalBranch { .. }
        | InstOp::Nop
        | InstOp::Ret(..) => return,
        _ => None,
    };
    match formula {
        Some(formula) => env.set_value(ins, BoolValue::new(formula)),
        None => env.clear_value(ins),
    }
}

fn outgoing_edges<'a>(
    context: &Context,
    block: Block,
    mut env: Environment<'a>,
) -> Vec<(Block, Environment<'a>)> {
    let Some(terminator) = block.get_terminator(context) else {
        return Vec::new();
    };
    match &terminator.op {
        InstOp::Branch(to) => {
            bind_branch_args(context, to, &mut env);
            vec![(to.block, env)]
        }
        InstOp::ConditionalBranch {
            cond_value,
            true_block,
            false_block,
        } => {
            let arena = env.arena();
            let cond = operand_formula(context, &mut env, *cond_value)
                .unwrap_or_else(|| env.make_atom_value().formula());

            let mut true_env = env.clone();
            true_env.assume(cond);
            bind_branch_args(context, true_block, &mut true_env);

            let mut false_env = env;
            false_env.assume(arena.make_not(cond));
            bind_branch_args(context, false_block, &mut false_env);

            if true_block.block == false_block.block {
                vec![(true_block.block, true_env.join(&false_env))]
            } else {
                vec![(true_block.block, true_env), (false_block.block, false_env)]
            }
        }
        _ => Vec::new(),
    }
}

fn bind_branch_args(context: &Context, to: &BranchToWithArgs, env: &mut Environment<'_>) {
    let mut bindings = Vec::new();
    for (param, arg) in to.block.arg_iter(context).zip(to.args.iter()) {
        if param.is_bool_ty(context) {
            let passed = operand_formula(context, env, *arg).map(BoolValue::new);
            bindings.push((*param, passed));
        } else {
            env.clear_value(*param);
        }
    }
    env.bind_parameters(&bindings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn get_function(context: &Context, name: &str, arity: usize) -> Function {
        context
            .module_iter()
            .next()
            .unwrap()
            .lookup_function_by_name(context, name, arity)
            .unwrap()
    }

    fn arg_formula(context: &Context, function: Function, env: &Environment, name: &str) -> Formula {
        env.get_value(function.get_arg(context, name).unwrap())
            .unwrap()
            .formula()
    }

    #[test]
    fn branch_conditions_flow_into_successors() {
        let context = parse(
            r#"
module {
    fn f(a: bool, b: bool) -> () {
        entry():
        v0 = and a, b
        cbr v0, yes(), no()

        yes():
        annotate both
        br done()

        no():
        annotate not_both
        br done()

        done():
        annotate done
        v1 = const () ()
        ret () v1
    }
}
"#,
        )
        .unwrap();
        let function = get_function(&context, "f", 2);
        let arena = FormulaArena::new();
        let results = run_dataflow_analysis(
            &context,
            function,
            &arena,
            &NoopModel,
            &DataflowOptions::default(),
        )
        .unwrap();

        let both = results.state_at("both").unwrap();
        let a = arg_formula(&context, function, both, "a");
        let b = arg_formula(&context, function, both, "b");
        assert!(both.proves(a));
        assert!(both.proves(b));

        let not_both = results.state_at("not_both").unwrap();
        assert!(not_both.proves(arena.make_not(arena.make_and(a, b))));
        assert!(!not_both.proves(arena.make_not(a)));

        let done = results.state_at("done").unwrap();
        assert!(!done.proves(a));
        assert!(done.allows(a));
        assert!(done.is_feasible());
    }

    #[test]
    fn same_target_branches_learn_nothing() {
        let context = parse(
            r#"
module {
    fn f(c: bool) -> () {
        entry():
        cbr c, done(), done()

        done():
        annotate done
        v0 = const () ()
        ret () v0
    }
}
"#,
        )
        .unwrap();
        let function = get_function(&context, "f", 1);
        let arena = FormulaArena::new();
        let results = run_dataflow_analysis(
            &context,
            function,
            &arena,
            &NoopModel,
            &DataflowOptions::default(),
        )
        .unwrap();

        let done = results.state_at("done").unwrap();
        let c = arg_formula(&context, function, done, "c");
        assert!(!done.proves(c));
        assert!(!done.proves(arena.make_not(c)));
    }

    const LOOP: &str = r#"
module {
    fn ext::stop() -> bool

    fn f(c: bool) -> () {
        entry():
        br header(c)

        header(p: bool):
        annotate in_loop
        v0 = not p
        v1 = call ext::stop()
        cbr v1, exit(), header(v0)

        exit():
        annotate after
        v2 = const () ()
        ret () v2
    }
}
"#;

    #[test]
    fn loops_converge() {
        let context = parse(LOOP).unwrap();
        let function = get_function(&context, "f", 1);
        let arena = FormulaArena::new();
        let results = run_dataflow_analysis(
            &context,
            function,
            &arena,
            &NoopModel,
            &DataflowOptions::default(),
        )
        .unwrap();

        let in_loop = results.state_at("in_loop").unwrap();
        let c = arg_formula(&context, function, in_loop, "c");
        let header = function
            .block_iter(&context)
            .find(|block| block.get_label(&context) == "header")
            .unwrap();
        let p = in_loop
            .get_value(header.get_arg(&context, 0).unwrap())
            .unwrap()
            .formula();
        // `p` alternates between `c` and `not c`.
        assert!(!in_loop.proves(arena.make_equals(p, c)));
        assert!(in_loop.allows(arena.make_equals(p, c)));
        assert!(results.state_at("after").unwrap().is_feasible());
        assert!(results.num_block_visits() > 3);
    }

    #[test]
    fn visits_are_bounded() {
        let context = parse(LOOP).unwrap();
        let function = get_function(&context, "f", 1);
        let arena = FormulaArena::new();
        let err = run_dataflow_analysis(
            &context,
            function,
            &arena,
            &NoopModel,
            &DataflowOptions {
                max_block_visits: 1,
            },
        )
        .err()
        .unwrap();
        assert_eq!(
            err,
            IrError::AnalysisMaxBlockVisits("f".to_owned(), "header".to_owned(), 1)
        );
    }

    #[test]
    fn declarations_cannot_be_analyzed() {
        let context = parse(LOOP).unwrap();
        let function = get_function(&context, "ext::stop", 0);
        let arena = FormulaArena::new();
        assert!(matches!(
            run_dataflow_analysis(
                &context,
                function,
                &arena,
                &NoopModel,
                &DataflowOptions::default()
            ),
            Err(IrError::AnalysisOfDeclaration(_))
        ));
    }

    struct AssumeModel;

    impl DataflowModel for AssumeModel {
        fn transfer(&self, context: &Context, element: Value, env: &mut Environment<'_>) {
            if let Some(InstOp::Call(callee, args)) = element.get_inst_op(context) {
                if callee.get_name(context) == "assume" {
                    if let Some(cond) = operand_formula(context, env, args[0]) {
                        env.assume(cond);
                    }
                }
            }
        }
    }

    #[test]
    fn models_contribute_facts() {
        let context = parse(
            r#"
module {
    fn assume(c: bool) -> ()

    fn f(a: bool, b: bool) -> () {
        entry():
        v0 = or a, b
        v1 = call assume(v0)
        v2 = not a
        v3 = call assume(v2)
        annotate checked
        ret () v1
    }
}
"#,
        )
        .unwrap();
        let function = get_function(&context, "f", 2);
        let arena = FormulaArena::new();
        let results = run_dataflow_analysis(
            &context,
            function,
            &arena,
            &AssumeModel,
            &DataflowOptions::default(),
        )
        .unwrap();

        let checked = results.state_at("checked").unwrap();
        let b = arg_formula(&context, function, checked, "b");
        assert!(checked.proves(b));

        let unchecked = run_dataflow_analysis(
            &context,
            function,
            &arena,
            &NoopModel,
            &DataflowOptions::default(),
        )
        .unwrap();
        assert!(!unchecked.state_at("checked").unwrap().proves(b));
    }
}
