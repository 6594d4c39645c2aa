//! Instructions for data manipulation, but mostly control flow.
//!
//! Calls are opaque to the analyses: the callee is only ever identified by its qualified path and
//! the number of arguments, and its body (if any) is never inspected.  The `annotate` instruction
//! names a program point so that the state of an analysis may be queried there afterwards.

use crate::{block::Block, context::Context, function::Function, irtype::Type, value::Value};

#[derive(Debug, Clone)]
pub struct Instruction {
    pub parent: Block,
    pub op: InstOp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchToWithArgs {
    pub block: Block,
    pub args: Vec<Value>,
}

#[derive(Debug, Clone)]
pub enum InstOp {
    /// Names the program point immediately before it.
    Annotation(String),
    /// Unary logical operations.
    UnaryOp { op: UnaryOpKind, arg: Value },
    /// Binary logical and arithmetic operations.
    BinaryOp {
        op: BinaryOpKind,
        arg1: Value,
        arg2: Value,
    },
    /// An unconditional jump.
    Branch(BranchToWithArgs),
    /// A function call with a list of arguments.
    Call(Function, Vec<Value>),
    /// Comparison between two values using various comparators and returning a boolean.
    Cmp(Predicate, Value, Value),
    /// A conditional jump with the boolean condition value and true or false destinations.
    ConditionalBranch {
        cond_value: Value,
        true_block: BranchToWithArgs,
        false_block: BranchToWithArgs,
    },
    /// No-op, handy as a placeholder instruction.
    Nop,
    /// Return from a function.
    Ret(Value, Type),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOpKind {
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOpKind {
    And,
    Or,
    Xor,
    Add,
    Sub,
    Mul,
}

impl BinaryOpKind {
    /// Whether this operation is defined over `bool` operands.
    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOpKind::And | BinaryOpKind::Or | BinaryOpKind::Xor)
    }
}

impl Instruction {
    /// Some [`Instruction`]s can return a value, but for some a return value doesn't make sense.
    ///
    /// Those which perform side effects such as branching or naming a point do not return a
    /// value.
    pub fn get_type(&self, context: &Context) -> Option<Type> {
        match &self.op {
            InstOp::UnaryOp { arg, .. } => arg.get_type(context),
            InstOp::BinaryOp { arg1, .. } => arg1.get_type(context),
            InstOp::Call(function, _) => Some(function.get_return_type(context)),
            InstOp::Cmp(..) => Some(Type::Bool),

            InstOp::Annotation(_)
            | InstOp::Branch(_)
            | InstOp::ConditionalBranch { .. }
            | InstOp::Nop
            | InstOp::Ret(..) => None,
        }
    }
}

impl InstOp {
    pub fn get_operands(&self) -> Vec<Value> {
        match self {
            InstOp::Annotation(_) | InstOp::Nop => vec![],
            InstOp::UnaryOp { op: _, arg } => vec![*arg],
            InstOp::BinaryOp { op: _, arg1, arg2 } => vec![*arg1, *arg2],
            InstOp::Branch(BranchToWithArgs { args, .. }) => args.clone(),
            InstOp::Call(_, vs) => vs.clone(),
            InstOp::Cmp(_, lhs, rhs) => vec![*lhs, *rhs],
            InstOp::ConditionalBranch {
                cond_value,
                true_block,
                false_block,
            } => {
                let mut v = vec![*cond_value];
                v.extend_from_slice(&true_block.args);
                v.extend_from_slice(&false_block.args);
                v
            }
            InstOp::Ret(v, _) => vec![*v],
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            InstOp::Branch(_) | InstOp::ConditionalBranch { .. } | InstOp::Ret(..)
        )
    }
}

/// Iterate over all [`Instruction`]s in a specific [`Block`].
pub struct InstructionIterator {
    instructions: Vec<slotmap::DefaultKey>,
    next: usize,
}

impl InstructionIterator {
    pub fn new(context: &Context, block: &Block) -> Self {
        // Copy all the current instruction indices, so they may be modified in the context during
        // iteration.
        InstructionIterator {
            instructions: context.blocks[block.0]
                .instructions
                .iter()
                .map(|val| val.0)
                .collect(),
            next: 0,
        }
    }
}

impl Iterator for InstructionIterator {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if self.next < self.instructions.len() {
            let idx = self.next;
            self.next += 1;
            Some(Value(self.instructions[idx]))
        } else {
            None
        }
    }
}

/// Provide a context for appending new [`Instruction`]s to a [`Block`].
pub struct InstructionInserter<'a> {
    context: &'a mut Context,
    block: Block,
}

macro_rules! make_instruction {
    ($self: ident, $ctor: expr) => {{
        let instruction_val = Value::new_instruction(
            $self.context,
            Instruction {
                parent: $self.block,
                op: $ctor,
            },
        );
        $self.context.blocks[$self.block.0]
            .instructions
            .push(instruction_val);
        instruction_val
    }};
}

impl<'a> InstructionInserter<'a> {
    /// Return a new [`InstructionInserter`] context for `block`.
    pub fn new(context: &'a mut Context, block: Block) -> InstructionInserter<'a> {
        InstructionInserter { context, block }
    }

    pub fn annotation(self, name: impl Into<String>) -> Value {
        make_instruction!(self, InstOp::Annotation(name.into()))
    }

    pub fn unary_op(self, op: UnaryOpKind, arg: Value) -> Value {
        make_instruction!(self, InstOp::UnaryOp { op, arg })
    }

    pub fn binary_op(self, op: BinaryOpKind, arg1: Value, arg2: Value) -> Value {
        make_instruction!(self, InstOp::BinaryOp { op, arg1, arg2 })
    }

    pub fn branch(self, to_block: Block, dest_params: Vec<Value>) -> Value {
        to_block.add_pred(self.context, &self.block);
        make_instruction!(
            self,
            InstOp::Branch(BranchToWithArgs {
                block: to_block,
                args: dest_params,
            })
        )
    }

    pub fn call(self, function: Function, args: &[Value]) -> Value {
        make_instruction!(self, InstOp::Call(function, args.to_vec()))
    }

    pub fn cmp(self, pred: Predicate, lhs_value: Value, rhs_value: Value) -> Value {
        make_instruction!(self, InstOp::Cmp(pred, lhs_value, rhs_value))
    }

    pub fn conditional_branch(
        self,
        cond_value: Value,
        true_block: Block,
        false_block: Block,
        true_dest_params: Vec<Value>,
        false_dest_params: Vec<Value>,
    ) -> Value {
        true_block.add_pred(self.context, &self.block);
        false_block.add_pred(self.context, &self.block);
        make_instruction!(
            self,
            InstOp::ConditionalBranch {
                cond_value,
                true_block: BranchToWithArgs {
                    block: true_block,
                    args: true_dest_params,
                },
                false_block: BranchToWithArgs {
                    block: false_block,
                    args: false_dest_params,
                },
            }
        )
    }

    pub fn nop(self) -> Value {
        make_instruction!(self, InstOp::Nop)
    }

    pub fn ret(self, value: Value, ty: Type) -> Value {
        make_instruction!(self, InstOp::Ret(value, ty))
    }
}
