//! Code to validate the IR in a [`Context`].
//!
//! Both parsed and API-built IR should be verified before it is handed to an analysis, using the
//! functions in this module.

use rustc_hash::FxHashSet;

use crate::{
    block::{Block, BlockArgument, BlockContent},
    context::Context,
    error::IrError,
    function::{Function, FunctionContent},
    instruction::{BinaryOpKind, BranchToWithArgs, InstOp, Predicate, UnaryOpKind},
    irtype::Type,
    module::ModuleContent,
    value::{Value, ValueContent},
};

impl Context {
    /// Verify the contents of this [`Context`] is valid.
    pub fn verify(&self) -> Result<(), IrError> {
        for (_, module) in &self.modules {
            self.verify_module(module)?;
        }
        Ok(())
    }

    fn verify_module(&self, module: &ModuleContent) -> Result<(), IrError> {
        let mut signatures = FxHashSet::default();
        for function in &module.functions {
            let content = &self.functions[function.0];
            if !signatures.insert((content.path.clone(), content.arguments.len())) {
                return Err(IrError::DuplicateFunction(
                    content.path.join("::"),
                    content.arguments.len(),
                ));
            }
            self.verify_function(*function, content)?;
        }
        Ok(())
    }

    fn verify_function(
        &self,
        function: Function,
        content: &FunctionContent,
    ) -> Result<(), IrError> {
        if content.is_declaration {
            return if content
                .blocks
                .iter()
                .any(|block| !self.blocks[block.0].instructions.is_empty())
            {
                Err(IrError::VerifyDeclarationHasBody(content.path.join("::")))
            } else {
                Ok(())
            };
        }

        let entry = function.get_entry_block(self);
        if entry.num_predecessors(self) != 0 {
            return Err(IrError::VerifyEntryBlockHasPredecessors(
                content.path.join("::"),
                entry
                    .pred_iter(self)
                    .map(|block| block.get_label(self))
                    .collect(),
            ));
        }

        let mut annotations = FxHashSet::default();
        for block in &content.blocks {
            self.verify_block(content, *block, &mut annotations)?;
        }
        Ok(())
    }

    fn verify_block(
        &self,
        cur_function: &FunctionContent,
        block: Block,
        annotations: &mut FxHashSet<String>,
    ) -> Result<(), IrError> {
        let block_content = &self.blocks[block.0];

        for (arg_idx, arg_val) in block_content.args.iter().enumerate() {
            match self.values[arg_val.0] {
                ValueContent::Argument(BlockArgument { block: arg_block, idx, .. })
                    if idx == arg_idx && arg_block == block => {}
                _ => return Err(IrError::VerifyBlockArgMalformed(block_content.label.clone())),
            }
        }

        InstructionVerifier {
            context: self,
            cur_function,
            cur_block: block_content,
        }
        .verify_instructions(annotations)?;

        let (last_is_term, num_terms) =
            block_content
                .instructions
                .iter()
                .fold((false, 0), |(_, n), ins| {
                    if ins.is_terminator(self) {
                        (true, n + 1)
                    } else {
                        (false, n)
                    }
                });
        if num_terms == 0 {
            Err(IrError::MissingTerminator(block_content.label.clone()))
        } else if !last_is_term || num_terms != 1 {
            Err(IrError::MisplacedTerminator(block_content.label.clone()))
        } else {
            Ok(())
        }
    }
}

struct InstructionVerifier<'a> {
    context: &'a Context,
    cur_function: &'a FunctionContent,
    cur_block: &'a BlockContent,
}

impl<'a> InstructionVerifier<'a> {
    fn verify_instructions(&self, annotations: &mut FxHashSet<String>) -> Result<(), IrError> {
        for ins in &self.cur_block.instructions {
            let Some(instruction) = ins.get_instruction(self.context) else {
                continue;
            };
            match &instruction.op {
                InstOp::Annotation(name) => {
                    if !annotations.insert(name.clone()) {
                        return Err(IrError::VerifyDuplicateAnnotation(
                            self.cur_function.path.join("::"),
                            name.clone(),
                        ));
                    }
                }
                InstOp::UnaryOp { op, arg } => self.verify_unary_op(op, arg)?,
                InstOp::BinaryOp { op, arg1, arg2 } => self.verify_binary_op(op, arg1, arg2)?,
                InstOp::Branch(block) => self.verify_br(block)?,
                InstOp::Call(func, args) => self.verify_call(func, args)?,
                InstOp::Cmp(pred, lhs_value, rhs_value) => {
                    self.verify_cmp(pred, lhs_value, rhs_value)?
                }
                InstOp::ConditionalBranch {
                    cond_value,
                    true_block,
                    false_block,
                } => self.verify_cbr(cond_value, true_block, false_block)?,
                InstOp::Nop => (),
                InstOp::Ret(val, ty) => self.verify_ret(val, ty)?,
            }
        }
        Ok(())
    }

    fn verify_unary_op(&self, op: &UnaryOpKind, arg: &Value) -> Result<(), IrError> {
        let arg_ty = arg
            .get_type(self.context)
            .ok_or(IrError::VerifyUnaryOpIncorrectArgType)?;
        match op {
            UnaryOpKind::Not => {
                if !arg_ty.is_bool() {
                    return Err(IrError::VerifyUnaryOpIncorrectArgType);
                }
            }
        }
        Ok(())
    }

    fn verify_binary_op(
        &self,
        op: &BinaryOpKind,
        arg1: &Value,
        arg2: &Value,
    ) -> Result<(), IrError> {
        let arg1_ty = arg1
            .get_type(self.context)
            .ok_or(IrError::VerifyBinaryOpIncorrectArgType)?;
        let arg2_ty = arg2
            .get_type(self.context)
            .ok_or(IrError::VerifyBinaryOpIncorrectArgType)?;
        let operands_ok = if op.is_logical() {
            arg1_ty.is_bool() && arg2_ty.is_bool()
        } else {
            arg1_ty.is_uint() && arg2_ty.is_uint()
        };
        if !operands_ok {
            return Err(IrError::VerifyBinaryOpIncorrectArgType);
        }
        Ok(())
    }

    fn verify_br(&self, dest_block: &BranchToWithArgs) -> Result<(), IrError> {
        if !self.cur_function.blocks.contains(&dest_block.block) {
            Err(IrError::VerifyBranchToMissingBlock(
                self.context.blocks[dest_block.block.0].label.clone(),
            ))
        } else {
            self.verify_dest_args(dest_block)
        }
    }

    fn verify_call(&self, callee: &Function, args: &[Value]) -> Result<(), IrError> {
        let callee_content = &self.context.functions[callee.0];
        let callee_name = callee_content.path.join("::");
        if callee_content.arguments.len() != args.len() {
            return Err(IrError::VerifyCallArgCountMismatch(
                callee_name,
                callee_content.arguments.len(),
                args.len(),
            ));
        }
        for (opt_caller_arg_type, (_, callee_arg)) in args
            .iter()
            .map(|val| val.get_type(self.context))
            .zip(callee_content.arguments.iter())
        {
            let callee_arg_type = callee_arg.get_type(self.context);
            if opt_caller_arg_type != callee_arg_type {
                return Err(IrError::VerifyCallArgTypeMismatch(
                    callee_name,
                    opt_caller_arg_type
                        .map(|ty| ty.as_string())
                        .unwrap_or_else(|| "untyped".to_owned()),
                    callee_arg_type
                        .map(|ty| ty.as_string())
                        .unwrap_or_else(|| "untyped".to_owned()),
                ));
            }
        }
        Ok(())
    }

    fn verify_cbr(
        &self,
        cond_val: &Value,
        true_block: &BranchToWithArgs,
        false_block: &BranchToWithArgs,
    ) -> Result<(), IrError> {
        if !cond_val.is_bool_ty(self.context) {
            Err(IrError::VerifyConditionExprNotABool)
        } else if !self.cur_function.blocks.contains(&true_block.block) {
            Err(IrError::VerifyBranchToMissingBlock(
                self.context.blocks[true_block.block.0].label.clone(),
            ))
        } else if !self.cur_function.blocks.contains(&false_block.block) {
            Err(IrError::VerifyBranchToMissingBlock(
                self.context.blocks[false_block.block.0].label.clone(),
            ))
        } else {
            self.verify_dest_args(true_block)
                .and_then(|()| self.verify_dest_args(false_block))
        }
    }

    fn verify_cmp(
        &self,
        pred: &Predicate,
        lhs_value: &Value,
        rhs_value: &Value,
    ) -> Result<(), IrError> {
        match (
            lhs_value.get_type(self.context),
            rhs_value.get_type(self.context),
        ) {
            (Some(lhs_ty), Some(rhs_ty)) => {
                if lhs_ty != rhs_ty {
                    Err(IrError::VerifyCmpTypeMismatch(
                        lhs_ty.as_string(),
                        rhs_ty.as_string(),
                    ))
                } else if matches!(pred, Predicate::LessThan | Predicate::GreaterThan)
                    && !lhs_ty.is_uint()
                {
                    Err(IrError::VerifyCmpBadTypes(
                        lhs_ty.as_string(),
                        rhs_ty.as_string(),
                    ))
                } else {
                    Ok(())
                }
            }
            _otherwise => Err(IrError::VerifyCmpUnknownTypes),
        }
    }

    fn verify_ret(&self, val: &Value, ty: &Type) -> Result<(), IrError> {
        if self.cur_function.return_type != *ty
            || val
                .get_type(self.context)
                .is_some_and(|val_ty| val_ty != *ty)
        {
            Err(IrError::VerifyReturnMismatchedTypes(
                self.cur_function.path.join("::"),
            ))
        } else {
            Ok(())
        }
    }

    fn verify_dest_args(&self, dest: &BranchToWithArgs) -> Result<(), IrError> {
        let dest_content = &self.context.blocks[dest.block.0];
        if dest.args.len() != dest_content.args.len() {
            return Err(IrError::VerifyBranchParamsMismatch(dest_content.label.clone()));
        }
        for (arg_idx, dest_param) in dest_content.args.iter().enumerate() {
            match dest.args.get(arg_idx) {
                Some(actual)
                    if dest_param.get_type(self.context) == actual.get_type(self.context) => {}
                _ => return Err(IrError::VerifyBranchParamsMismatch(dest_content.label.clone())),
            }
        }
        Ok(())
    }
}
