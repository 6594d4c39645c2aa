//! A parser for the printed IR, used by the tests and by the command line tool to load the
//! procedures under analysis.

use crate::{context::Context, error::IrError};

// -------------------------------------------------------------------------------------------------
/// Parse a string produced by [`crate::printer::to_string`] into a new [`Context`].
///
/// The resulting context is verified before it is returned.
pub fn parse(input: &str) -> Result<Context, IrError> {
    let irmod = ir_builder::parser::ir_descrs(input).map_err(|err| {
        let found = if input.len() - err.location.offset <= 20 {
            &input[err.location.offset..]
        } else {
            &input[err.location.offset..][..20]
        };
        IrError::ParseFailure(err.to_string(), found.into())
    })?;
    let ir = ir_builder::build_context(irmod)?;
    ir.verify()?;
    Ok(ir)
}

// -------------------------------------------------------------------------------------------------

mod ir_builder {
    peg::parser! {
        pub(in crate::parser) grammar parser() for str {
            pub(in crate::parser) rule ir_descrs() -> IrAstModule
                = _ "module" _ "{" _ fn_decls:fn_decl()* "}" _ eoi() {
                    IrAstModule {
                        fn_decls
                    }
                }

            rule fn_decl() -> IrAstFnDecl
                = "fn" _ path:path() "(" _ args:(fn_arg() ** comma()) ")" _ "->" _ ret_type:ast_ty()
                    blocks:fn_body()? {
                    IrAstFnDecl {
                        path,
                        args,
                        ret_type,
                        blocks,
                    }
                }

            rule fn_arg() -> (String, IrAstTy)
                = name:id() ":" _ ty:ast_ty() {
                    (name, ty)
                }

            rule fn_body() -> Vec<IrAstBlock>
                = "{" _ blocks:block_decl()* "}" _ {
                    blocks
                }

            rule block_decl() -> IrAstBlock
                = label:id() "(" _ args:(fn_arg() ** comma()) ")" _
                    ":" _ instructions: instr_decl()* {
                    IrAstBlock {
                        label,
                        args,
                        instructions
                    }
                }

            rule instr_decl() -> IrAstInstruction
                = value_name:value_assign()? op:operation() {
                    IrAstInstruction {
                        value_name,
                        op,
                    }
                }

            rule value_assign() -> String
                = name:id() "=" _ {
                    name
                }

            rule unary_op_kind() -> UnaryOpKind
                = "not" !id_char() _ { UnaryOpKind::Not }

            rule binary_op_kind() -> BinaryOpKind
                = "and" !id_char() _ { BinaryOpKind::And }
                / "or" !id_char() _ { BinaryOpKind::Or }
                / "xor" !id_char() _ { BinaryOpKind::Xor }
                / "add" !id_char() _ { BinaryOpKind::Add }
                / "sub" !id_char() _ { BinaryOpKind::Sub }
                / "mul" !id_char() _ { BinaryOpKind::Mul }

            rule operation() -> IrAstOperation
                = op_annotate()
                / op_branch()
                / op_call()
                / op_cbr()
                / op_cmp()
                / op_const()
                / op_nop()
                / op_ret()
                / op_unary()
                / op_binary()

            rule op_annotate() -> IrAstOperation
                = "annotate" !id_char() _ name:id() {
                    IrAstOperation::Annotate(name)
                }

            rule op_unary() -> IrAstOperation
                = op:unary_op_kind() arg1:id() {
                    IrAstOperation::UnaryOp(op, arg1)
                }

            rule op_binary() -> IrAstOperation
                = op:binary_op_kind() arg1:id() comma() arg2:id() {
                    IrAstOperation::BinaryOp(op, arg1, arg2)
                }

            rule op_branch() -> IrAstOperation
                = "br" !id_char() _ to_block:id() "(" _ args:(id() ** comma()) ")" _ {
                    IrAstOperation::Br(to_block, args)
                }

            rule op_call() -> IrAstOperation
                = "call" !id_char() _ callee:path() "(" _ args:(id() ** comma()) ")" _ {
                    IrAstOperation::Call(callee, args)
                }

            rule op_cbr() -> IrAstOperation
                = "cbr" !id_char() _ cond:id() comma() tblock:id()
                "(" _ targs:(id() ** comma()) ")" _
                 comma() fblock:id() "(" _ fargs:(id() ** comma()) ")" _ {
                    IrAstOperation::Cbr(cond, tblock, targs, fblock, fargs)
                }

            rule op_cmp() -> IrAstOperation
                = "cmp" !id_char() _ p:cmp_pred() l:id() r:id() {
                    IrAstOperation::Cmp(p, l, r)
                }

            rule op_const() -> IrAstOperation
                = "const" !id_char() _ val_ty:ast_ty() cv:constant() {
                    IrAstOperation::Const(val_ty, cv)
                }

            rule op_nop() -> IrAstOperation
                = "nop" !id_char() _ {
                    IrAstOperation::Nop
                }

            rule op_ret() -> IrAstOperation
                = "ret" !id_char() _ ty:ast_ty() vn:id() {
                    IrAstOperation::Ret(ty, vn)
                }

            rule cmp_pred() -> Predicate
                = "eq" _ { Predicate::Equal }
                / "ne" _ { Predicate::NotEqual }
                / "gt" _ { Predicate::GreaterThan }
                / "lt" _ { Predicate::LessThan }

            rule constant() -> IrAstConstValue
                = "()" _ { IrAstConstValue::Unit }
                / "true" _ { IrAstConstValue::Bool(true) }
                / "false" _ { IrAstConstValue::Bool(false) }
                / n:decimal() { IrAstConstValue::Number(n) }
                / string_const()

            rule string_const() -> IrAstConstValue
                = ['"'] chs:str_char()* ['"'] _ {
                    IrAstConstValue::String(chs)
                }

            rule str_char() -> u8
                // Match any of the printable characters except '"' and '\'.
                = c:$([' ' | '!' | '#'..='[' | ']'..='~']) {
                    c.as_bytes()[0]
                }
                / "\\x" h:hex_digit() l:hex_digit() {
                    (h << 4) | l
                }

            rule hex_digit() -> u8
                = d:$(['0'..='9']) {
                    d.as_bytes()[0] - b'0'
                }
                / d:$(['a'..='f' | 'A'..='F']) {
                    (d.as_bytes()[0] | 0x20) - b'a' + 10
                }

            rule ast_ty() -> IrAstTy
                = ("unit" / "()") _ { IrAstTy::Unit }
                / "bool" !id_char() _ { IrAstTy::Bool }
                / "u64" !id_char() _ { IrAstTy::U64 }
                / "str" !id_char() _ { IrAstTy::Str }

            rule id() -> String
                = !(("bool" / "u64" / "str") !id_char()) id:$(id_char0() id_char()*) _ {
                    id.to_owned()
                }

            rule path() -> Vec<String>
                = (id() ++ ("::" _))

            rule id_char0()
                = quiet!{ ['A'..='Z' | 'a'..='z' | '_'] }

            rule id_char()
                = quiet!{ id_char0() / ['0'..='9'] }

            rule decimal() -> u64
                = d:$("0" / ['1'..='9'] ['0'..='9']*) _ {?
                    d.parse::<u64>().or(Err("u64 literal"))
                }

            rule comma()
                = quiet!{ "," _ }

            rule _()
                = quiet!{ (space() / nl() / comment())* }

            rule space()
                = [' ' | '\t']

            rule nl()
                = ['\n' | '\r']

            rule comment()
                = "//" (!nl() [_])*

            rule eoi()
                = ![_] / expected!("end of input")
        }
    }

    // - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - - -

    use rustc_hash::FxHashMap;

    use crate::{
        block::Block,
        constant::Constant,
        context::Context,
        error::IrError,
        function::Function,
        instruction::{BinaryOpKind, InstOp, Instruction, Predicate, UnaryOpKind},
        irtype::Type,
        module::Module,
        value::Value,
    };

    #[derive(Debug)]
    pub(super) struct IrAstModule {
        fn_decls: Vec<IrAstFnDecl>,
    }

    #[derive(Debug)]
    struct IrAstFnDecl {
        path: Vec<String>,
        args: Vec<(String, IrAstTy)>,
        ret_type: IrAstTy,
        blocks: Option<Vec<IrAstBlock>>,
    }

    #[derive(Debug)]
    struct IrAstBlock {
        label: String,
        args: Vec<(String, IrAstTy)>,
        instructions: Vec<IrAstInstruction>,
    }

    #[derive(Debug)]
    struct IrAstInstruction {
        value_name: Option<String>,
        op: IrAstOperation,
    }

    #[derive(Debug)]
    enum IrAstOperation {
        Annotate(String),
        UnaryOp(UnaryOpKind, String),
        BinaryOp(BinaryOpKind, String, String),
        Br(String, Vec<String>),
        Call(Vec<String>, Vec<String>),
        Cbr(String, String, Vec<String>, String, Vec<String>),
        Cmp(Predicate, String, String),
        Const(IrAstTy, IrAstConstValue),
        Nop,
        Ret(IrAstTy, String),
    }

    #[derive(Debug)]
    enum IrAstConstValue {
        Unit,
        Bool(bool),
        Number(u64),
        String(Vec<u8>),
    }

    #[derive(Clone, Copy, Debug)]
    enum IrAstTy {
        Unit,
        Bool,
        U64,
        Str,
    }

    impl IrAstTy {
        fn to_ir_type(self) -> Type {
            match self {
                IrAstTy::Unit => Type::Unit,
                IrAstTy::Bool => Type::Bool,
                IrAstTy::U64 => Type::Uint64,
                IrAstTy::Str => Type::StringSlice,
            }
        }
    }

    impl IrAstConstValue {
        fn as_constant(&self, val_ty: IrAstTy) -> Result<Constant, IrError> {
            match (self, val_ty) {
                (IrAstConstValue::Unit, IrAstTy::Unit) => Ok(Constant::new_unit()),
                (IrAstConstValue::Bool(b), IrAstTy::Bool) => Ok(Constant::new_bool(*b)),
                (IrAstConstValue::Number(n), IrAstTy::U64) => Ok(Constant::new_uint(*n)),
                (IrAstConstValue::String(s), IrAstTy::Str) => Ok(Constant::new_string(s.clone())),
                (cv, ty) => Err(IrError::ParseFailure(
                    format!("constant of type {}", ty.to_ir_type()),
                    format!("{cv:?}"),
                )),
            }
        }
    }

    pub(super) fn build_context(ir_ast_mod: IrAstModule) -> Result<Context, IrError> {
        let mut ctx = Context::default();
        let module = Module::new(&mut ctx);
        let mut builder = IrBuilder {
            module,
            unresolved_calls: Vec::new(),
        };

        for fn_decl in ir_ast_mod.fn_decls {
            builder.add_fn_decl(&mut ctx, fn_decl)?;
        }

        builder.resolve_calls(&mut ctx)?;

        Ok(ctx)
    }

    struct IrBuilder {
        module: Module,
        unresolved_calls: Vec<PendingCall>,
    }

    struct PendingCall {
        call_val: Value,
        callee: Vec<String>,
        arity: usize,
    }

    impl IrBuilder {
        fn add_fn_decl(
            &mut self,
            context: &mut Context,
            fn_decl: IrAstFnDecl,
        ) -> Result<(), IrError> {
            let arity = fn_decl.args.len();
            if self
                .module
                .lookup_function(context, &fn_decl.path, arity)
                .is_some()
            {
                return Err(IrError::DuplicateFunction(fn_decl.path.join("::"), arity));
            }

            let args: Vec<(String, Type)> = fn_decl
                .args
                .into_iter()
                .map(|(name, ty)| (name, ty.to_ir_type()))
                .collect();
            let func = Function::new(
                context,
                self.module,
                fn_decl.path.clone(),
                args,
                fn_decl.ret_type.to_ir_type(),
                fn_decl.blocks.is_none(),
            );

            let Some(blocks) = fn_decl.blocks else {
                return Ok(());
            };
            if blocks.is_empty() {
                return Err(IrError::MissingBlock(format!(
                    "entry of {}",
                    func.get_name(context)
                )));
            }

            let mut val_map: FxHashMap<String, Value> = func
                .args_iter(context)
                .map(|(name, val)| (name.clone(), *val))
                .collect();

            // The entry block is already created, we just give it the parsed label.  Its
            // arguments are the function arguments which were created with it.
            let mut named_blocks = FxHashMap::<String, Block>::default();
            for (idx, block) in blocks.iter().enumerate() {
                let irblock = if idx == 0 {
                    if !block.args.is_empty() {
                        return Err(IrError::VerifyBlockArgMalformed(block.label.clone()));
                    }
                    let entry = func.get_entry_block(context);
                    context.blocks[entry.0].label = block.label.clone();
                    entry
                } else {
                    let irblock = func.create_block(context, Some(block.label.clone()));
                    for (name, arg_ty) in &block.args {
                        let arg_idx = irblock.new_arg(context, arg_ty.to_ir_type());
                        val_map.insert(name.clone(), context.blocks[irblock.0].args[arg_idx]);
                    }
                    irblock
                };
                if named_blocks.insert(block.label.clone(), irblock).is_some() {
                    return Err(IrError::ParseFailure(
                        "unique block label".to_owned(),
                        block.label.clone(),
                    ));
                }
            }

            for block in blocks {
                self.add_block_instructions(context, block, &named_blocks, &mut val_map)?;
            }
            Ok(())
        }

        fn add_block_instructions(
            &mut self,
            context: &mut Context,
            ir_block: IrAstBlock,
            named_blocks: &FxHashMap<String, Block>,
            val_map: &mut FxHashMap<String, Value>,
        ) -> Result<(), IrError> {
            let block = named_blocks[&ir_block.label];
            for ins in ir_block.instructions {
                let ins_val = match ins.op {
                    IrAstOperation::Annotate(name) => block.append(context).annotation(name),
                    IrAstOperation::UnaryOp(op, arg) => {
                        let arg = lookup_value(val_map, &arg)?;
                        block.append(context).unary_op(op, arg)
                    }
                    IrAstOperation::BinaryOp(op, arg1, arg2) => {
                        let arg1 = lookup_value(val_map, &arg1)?;
                        let arg2 = lookup_value(val_map, &arg2)?;
                        block.append(context).binary_op(op, arg1, arg2)
                    }
                    IrAstOperation::Br(to_block_name, args) => {
                        let to_block = lookup_block(named_blocks, &to_block_name)?;
                        let args = lookup_values(val_map, &args)?;
                        block.append(context).branch(to_block, args)
                    }
                    IrAstOperation::Call(callee, args) => {
                        // We can't resolve calls to other functions until we've done a first pass
                        // and created them first.  So we insert a call to the current function
                        // here and update it with the proper callee in a second pass.
                        let dummy_func = block.get_function(context);
                        let args = lookup_values(val_map, &args)?;
                        let arity = args.len();
                        let call_val = block.append(context).call(dummy_func, &args);
                        self.unresolved_calls.push(PendingCall {
                            call_val,
                            callee,
                            arity,
                        });
                        call_val
                    }
                    IrAstOperation::Cbr(
                        cond_val_name,
                        true_block_name,
                        true_args,
                        false_block_name,
                        false_args,
                    ) => {
                        let cond_val = lookup_value(val_map, &cond_val_name)?;
                        let true_block = lookup_block(named_blocks, &true_block_name)?;
                        let false_block = lookup_block(named_blocks, &false_block_name)?;
                        let true_args = lookup_values(val_map, &true_args)?;
                        let false_args = lookup_values(val_map, &false_args)?;
                        block.append(context).conditional_branch(
                            cond_val,
                            true_block,
                            false_block,
                            true_args,
                            false_args,
                        )
                    }
                    IrAstOperation::Cmp(pred, lhs, rhs) => {
                        let lhs = lookup_value(val_map, &lhs)?;
                        let rhs = lookup_value(val_map, &rhs)?;
                        block.append(context).cmp(pred, lhs, rhs)
                    }
                    IrAstOperation::Const(ty, val) => {
                        Value::new_constant(context, val.as_constant(ty)?)
                    }
                    IrAstOperation::Nop => block.append(context).nop(),
                    IrAstOperation::Ret(ty, ret_val_name) => {
                        let ret_val = lookup_value(val_map, &ret_val_name)?;
                        block.append(context).ret(ret_val, ty.to_ir_type())
                    }
                };
                if let Some(vn) = ins.value_name {
                    val_map.insert(vn, ins_val);
                }
            }
            Ok(())
        }

        fn resolve_calls(self, context: &mut Context) -> Result<(), IrError> {
            // All of the call instructions are currently invalid (recursive) CALLs to their own
            // function, which need to be replaced with the proper callee function.  Calls are
            // matched on the full path and the number of arguments, so overloads by arity are
            // resolved here too.
            for pending_call in self.unresolved_calls {
                let call_func = self
                    .module
                    .lookup_function(context, &pending_call.callee, pending_call.arity)
                    .ok_or_else(|| {
                        IrError::VerifyCallToMissingFunction(format!(
                            "{}/{}",
                            pending_call.callee.join("::"),
                            pending_call.arity
                        ))
                    })?;

                if let Some(Instruction {
                    op: InstOp::Call(dummy_func, _args),
                    ..
                }) = pending_call.call_val.get_instruction_mut(context)
                {
                    *dummy_func = call_func;
                }
            }
            Ok(())
        }
    }

    fn lookup_value(val_map: &FxHashMap<String, Value>, name: &str) -> Result<Value, IrError> {
        val_map
            .get(name)
            .copied()
            .ok_or_else(|| IrError::ValueNotFound(format!("'{name}' is not defined")))
    }

    fn lookup_values(
        val_map: &FxHashMap<String, Value>,
        names: &[String],
    ) -> Result<Vec<Value>, IrError> {
        names
            .iter()
            .map(|name| lookup_value(val_map, name))
            .collect()
    }

    fn lookup_block(
        named_blocks: &FxHashMap<String, Block>,
        label: &str,
    ) -> Result<Block, IrError> {
        named_blocks
            .get(label)
            .copied()
            .ok_or_else(|| IrError::VerifyBranchToMissingBlock(label.to_owned()))
    }
}
