//! Print (or serialize) IR to human and machine readable text.
//!
//! This module implements a document based pretty-printer.  The output is always suitable for
//! [`crate::parser::parse`], which is how the textual IR round trips.

use rustc_hash::FxHashMap;

use crate::{
    block::Block,
    context::Context,
    function::{Function, FunctionContent},
    instruction::{BinaryOpKind, InstOp, Predicate, UnaryOpKind},
    module::ModuleContent,
    value::{Value, ValueContent},
    BranchToWithArgs,
};

#[derive(Debug)]
pub(crate) enum Doc {
    Empty,
    Comma,

    Text(String),
    Line(Box<Doc>),

    Pair(Box<Doc>, Box<Doc>),

    List(Vec<Doc>),
    ListSep(Vec<Doc>, Box<Doc>),

    Parens(Box<Doc>),

    Indent(i64, Box<Doc>),
}

impl Doc {
    pub(crate) fn text<S: Into<String>>(s: S) -> Self {
        Doc::Text(s.into())
    }

    fn line(doc: Doc) -> Self {
        Doc::Line(Box::new(doc))
    }

    pub(crate) fn text_line<S: Into<String>>(s: S) -> Self {
        Doc::Line(Box::new(Doc::Text(s.into())))
    }

    fn indent(n: i64, doc: Doc) -> Doc {
        Doc::Indent(n, Box::new(doc))
    }

    fn list_sep(docs: Vec<Doc>, sep: Doc) -> Doc {
        Doc::ListSep(docs, Box::new(sep))
    }

    fn in_parens_comma_sep(docs: Vec<Doc>) -> Doc {
        Doc::Parens(Box::new(Doc::list_sep(docs, Doc::Comma)))
    }

    pub(crate) fn append(self, doc: Doc) -> Doc {
        match (&self, &doc) {
            (Doc::Empty, _) => doc,
            (_, Doc::Empty) => self,
            _ => Doc::Pair(Box::new(self), Box::new(doc)),
        }
    }

    pub(crate) fn build(self) -> String {
        build_doc(self, 0)
    }
}

/// Pretty-print a whole [`Context`] to a string.
///
/// The output from this function must always be suitable for [crate::parser::parse].
pub fn to_string(context: &Context) -> String {
    context
        .modules
        .iter()
        .fold(Doc::Empty, |doc, (_, module)| {
            doc.append(module_to_doc(context, module))
        })
        .build()
}

/// Pretty-print a single instruction, for diagnostics.  Operands are named as they would be when
/// printing the whole function.
pub fn instruction_to_string(context: &Context, ins_value: &Value) -> String {
    let Some(instruction) = ins_value.get_instruction(context) else {
        return String::new();
    };
    let function = instruction.parent.get_function(context);
    let mut namer = Namer::new(function);
    // Name every value in the function first so the names line up with the full listing.
    function_to_doc(context, &mut namer, &context.functions[function.0]);
    instruction_to_doc(context, &mut namer, ins_value)
        .build()
        .trim()
        .to_owned()
}

fn module_to_doc(context: &Context, module: &ModuleContent) -> Doc {
    Doc::line(Doc::text("module {"))
        .append(Doc::indent(
            4,
            Doc::list_sep(
                module
                    .functions
                    .iter()
                    .map(|function| {
                        function_to_doc(
                            context,
                            &mut Namer::new(*function),
                            &context.functions[function.0],
                        )
                    })
                    .collect(),
                Doc::line(Doc::Empty),
            ),
        ))
        .append(Doc::text_line("}"))
}

fn function_to_doc(context: &Context, namer: &mut Namer, function: &FunctionContent) -> Doc {
    let header = Doc::text(format!("fn {}", function.path.join("::")))
        .append(Doc::in_parens_comma_sep(
            function
                .arguments
                .iter()
                .map(|(name, arg_val)| {
                    let ty = arg_val
                        .get_type(context)
                        .map(|ty| ty.as_string())
                        .unwrap_or_default();
                    Doc::text(format!("{name}: {ty}"))
                })
                .collect(),
        ))
        .append(Doc::text(format!(
            " -> {}",
            function.return_type.as_string()
        )));

    if function.is_declaration {
        return Doc::line(header);
    }

    Doc::line(header.append(Doc::text(" {")))
        .append(Doc::indent(
            4,
            Doc::list_sep(
                function
                    .blocks
                    .iter()
                    .map(|block| block_to_doc(context, namer, block))
                    .collect(),
                Doc::line(Doc::Empty),
            ),
        ))
        .append(Doc::text_line("}"))
}

fn block_to_doc(context: &Context, namer: &mut Namer, block: &Block) -> Doc {
    let block_content = &context.blocks[block.0];
    // The entry block arguments are the function arguments, already printed in the header.
    let is_entry = block.get_function(context).get_entry_block(context) == *block;
    let args = if is_entry {
        Vec::new()
    } else {
        block
            .arg_iter(context)
            .map(|arg_val| {
                let ty = arg_val
                    .get_type(context)
                    .map(|ty| ty.as_string())
                    .unwrap_or_default();
                Doc::text(format!("{}: {ty}", namer.name(context, arg_val)))
            })
            .collect()
    };
    Doc::line(
        Doc::text(block_content.label.to_string())
            .append(Doc::in_parens_comma_sep(args))
            .append(Doc::text(":")),
    )
    .append(Doc::List(
        block
            .instruction_iter(context)
            .map(|current_value| instruction_to_doc(context, namer, &current_value))
            .collect(),
    ))
}

fn constant_to_doc(context: &Context, namer: &mut Namer, const_val: &Value) -> Doc {
    match const_val.get_constant(context) {
        Some(constant) => Doc::line(Doc::text(format!(
            "{} = const {}",
            namer.name(context, const_val),
            constant.as_lit_string()
        ))),
        None => Doc::Empty,
    }
}

fn maybe_constant_to_doc(context: &Context, namer: &mut Namer, maybe_const_val: &Value) -> Doc {
    // Create a new doc only if value is new and unknown, and is a constant.
    if !namer.is_known(maybe_const_val) && maybe_const_val.is_constant(context) {
        constant_to_doc(context, namer, maybe_const_val)
    } else {
        Doc::Empty
    }
}

fn operands_to_doc(context: &Context, namer: &mut Namer, operands: &[Value]) -> Doc {
    operands.iter().fold(Doc::Empty, |doc, operand| {
        doc.append(maybe_constant_to_doc(context, namer, operand))
    })
}

fn branch_target_to_string(context: &Context, namer: &mut Namer, to: &BranchToWithArgs) -> String {
    format!(
        "{}({})",
        context.blocks[to.block.0].label,
        to.args
            .iter()
            .map(|arg| namer.name(context, arg))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

fn instruction_to_doc(context: &Context, namer: &mut Namer, ins_value: &Value) -> Doc {
    let Some(instruction) = ins_value.get_instruction(context) else {
        return Doc::Empty;
    };
    let operands = operands_to_doc(context, namer, &instruction.op.get_operands());
    let text = match &instruction.op {
        InstOp::Annotation(name) => format!("annotate {name}"),
        InstOp::UnaryOp { op, arg } => {
            let op_str = match op {
                UnaryOpKind::Not => "not",
            };
            format!(
                "{} = {op_str} {}",
                namer.name(context, ins_value),
                namer.name(context, arg),
            )
        }
        InstOp::BinaryOp { op, arg1, arg2 } => {
            let op_str = match op {
                BinaryOpKind::And => "and",
                BinaryOpKind::Or => "or",
                BinaryOpKind::Xor => "xor",
                BinaryOpKind::Add => "add",
                BinaryOpKind::Sub => "sub",
                BinaryOpKind::Mul => "mul",
            };
            format!(
                "{} = {op_str} {}, {}",
                namer.name(context, ins_value),
                namer.name(context, arg1),
                namer.name(context, arg2),
            )
        }
        InstOp::Branch(to_block) => {
            format!("br {}", branch_target_to_string(context, namer, to_block))
        }
        InstOp::Call(func, args) => format!(
            "{} = call {}({})",
            namer.name(context, ins_value),
            func.get_name(context),
            args.iter()
                .map(|arg| namer.name(context, arg))
                .collect::<Vec<_>>()
                .join(", "),
        ),
        InstOp::Cmp(pred, lhs_value, rhs_value) => {
            let pred_str = match pred {
                Predicate::Equal => "eq",
                Predicate::NotEqual => "ne",
                Predicate::LessThan => "lt",
                Predicate::GreaterThan => "gt",
            };
            format!(
                "{} = cmp {pred_str} {} {}",
                namer.name(context, ins_value),
                namer.name(context, lhs_value),
                namer.name(context, rhs_value),
            )
        }
        InstOp::ConditionalBranch {
            cond_value,
            true_block,
            false_block,
        } => format!(
            "cbr {}, {}, {}",
            namer.name(context, cond_value),
            branch_target_to_string(context, namer, true_block),
            branch_target_to_string(context, namer, false_block),
        ),
        InstOp::Nop => "nop".to_owned(),
        InstOp::Ret(v, t) => format!("ret {} {}", t.as_string(), namer.name(context, v)),
    };
    operands.append(Doc::text_line(text))
}

struct Namer {
    function: Function,
    names: FxHashMap<Value, String>,
    next_value_idx: u64,
}

impl Namer {
    fn new(function: Function) -> Self {
        Namer {
            function,
            names: FxHashMap::default(),
            next_value_idx: 0,
        }
    }

    fn name(&mut self, context: &Context, value: &Value) -> String {
        match &context.values[value.0] {
            ValueContent::Argument(_) => self
                .function
                .lookup_arg_name(context, value)
                .cloned()
                .unwrap_or_else(|| self.default_name(value)),
            ValueContent::Constant(_) => self.default_name(value),
            ValueContent::Instruction(_) => self.default_name(value),
        }
    }

    fn default_name(&mut self, value: &Value) -> String {
        self.names.get(value).cloned().unwrap_or_else(|| {
            let new_name = format!("v{}", self.next_value_idx);
            self.next_value_idx += 1;
            self.names.insert(*value, new_name.clone());
            new_name
        })
    }

    fn is_known(&self, value: &Value) -> bool {
        self.names.contains_key(value)
    }
}

/// There will be a much more efficient way to do this, but for now this will do.
fn build_doc(doc: Doc, indent: i64) -> String {
    match doc {
        Doc::Empty => "".into(),
        Doc::Comma => ", ".into(),

        Doc::Text(t) => t,
        Doc::Line(d) => {
            if matches!(*d, Doc::Empty) {
                "\n".into()
            } else {
                format!("{}{}\n", " ".repeat(indent as usize), build_doc(*d, indent))
            }
        }

        Doc::Pair(l, r) => [build_doc(*l, indent), build_doc(*r, indent)].concat(),

        Doc::List(v) => v
            .into_iter()
            .map(|d| build_doc(d, indent))
            .collect::<Vec<String>>()
            .concat(),
        Doc::ListSep(v, s) => v
            .into_iter()
            .filter_map(|d| match &d {
                Doc::Empty => None,
                Doc::List(vs) => {
                    if vs.is_empty() {
                        None
                    } else {
                        Some(build_doc(d, indent))
                    }
                }
                _ => Some(build_doc(d, indent)),
            })
            .collect::<Vec<String>>()
            .join(&build_doc(*s, indent)),

        Doc::Parens(d) => format!("({})", build_doc(*d, indent)),

        Doc::Indent(n, d) => build_doc(*d, indent + n),
    }
}
