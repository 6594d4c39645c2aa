//! The base descriptor for various values within the IR.
//!
//! [`Value`]s can be block arguments, constants and instructions.  [`Instruction`]s generally
//! refer to each other and to constants via the [`Value`] wrapper.
//!
//! Like most IR data structures they are `Copy` and cheap to pass around by value.  They are also
//! `Ord` so that analyses may key ordered maps with them and iterate deterministically.

use crate::{
    block::BlockArgument,
    constant::Constant,
    context::Context,
    instruction::{InstOp, Instruction},
    irtype::Type,
};

/// A wrapper around an [ECS](https://github.com/orlp/slotmap) handle into the [`Context`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Value(pub slotmap::DefaultKey);

#[doc(hidden)]
#[derive(Debug, Clone)]
pub enum ValueContent {
    Argument(BlockArgument),
    Constant(Constant),
    Instruction(Instruction),
}

impl Value {
    /// Return a new argument [`Value`].
    pub fn new_argument(context: &mut Context, arg: BlockArgument) -> Value {
        let content = ValueContent::Argument(arg);
        Value(context.values.insert(content))
    }

    /// Return a new constant [`Value`].
    pub fn new_constant(context: &mut Context, constant: Constant) -> Value {
        let content = ValueContent::Constant(constant);
        Value(context.values.insert(content))
    }

    /// Return a new instruction [`Value`].
    pub fn new_instruction(context: &mut Context, instruction: Instruction) -> Value {
        let content = ValueContent::Instruction(instruction);
        Value(context.values.insert(content))
    }

    /// Return whether this is a constant value.
    pub fn is_constant(&self, context: &Context) -> bool {
        matches!(context.values[self.0], ValueContent::Constant(_))
    }

    /// Return whether this value is an instruction, and specifically a 'terminator'.
    ///
    /// A terminator is always the last instruction in a block (and may not appear anywhere else)
    /// and is either a branch or return.
    pub fn is_terminator(&self, context: &Context) -> bool {
        match &context.values[self.0] {
            ValueContent::Instruction(ins) => ins.op.is_terminator(),
            _ => false,
        }
    }

    /// Get a reference to this value as an instruction, iff it is one.
    pub fn get_instruction<'a>(&self, context: &'a Context) -> Option<&'a Instruction> {
        if let ValueContent::Instruction(instruction) = &context.values[self.0] {
            Some(instruction)
        } else {
            None
        }
    }

    pub(crate) fn get_instruction_mut<'a>(
        &self,
        context: &'a mut Context,
    ) -> Option<&'a mut Instruction> {
        if let ValueContent::Instruction(instruction) = &mut context.values[self.0] {
            Some(instruction)
        } else {
            None
        }
    }

    /// Get the operation of this value, iff it is an instruction.
    pub fn get_inst_op<'a>(&self, context: &'a Context) -> Option<&'a InstOp> {
        self.get_instruction(context).map(|ins| &ins.op)
    }

    /// Get a reference to this value as a constant, iff it is one.
    pub fn get_constant<'a>(&self, context: &'a Context) -> Option<&'a Constant> {
        if let ValueContent::Constant(c) = &context.values[self.0] {
            Some(c)
        } else {
            None
        }
    }

    /// Get the type for this value, if found.
    ///
    /// Arguments and constants always have a type, but only some instructions do.
    pub fn get_type(&self, context: &Context) -> Option<Type> {
        match &context.values[self.0] {
            ValueContent::Argument(BlockArgument { ty, .. }) => Some(*ty),
            ValueContent::Constant(c) => Some(c.ty),
            ValueContent::Instruction(ins) => ins.get_type(context),
        }
    }

    /// Return whether this value is known to be a `bool`.
    pub fn is_bool_ty(&self, context: &Context) -> bool {
        self.get_type(context).is_some_and(|ty| ty.is_bool())
    }
}
