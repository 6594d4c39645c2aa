//! Finding the condition among the arguments of a matched call.

use std::fmt;

use assertflow_ir::{Context, Type, Value};

use crate::catalog::CallVariant;

/// Where the condition of a matched call is, if anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocatedCondition {
    Condition(Value),
    /// The variant has no condition argument.
    NoCondition,
    /// The variant has a condition argument but the call doesn't fit it.
    Malformed(MalformedReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MalformedReason {
    IndexOutOfRange { index: usize, num_args: usize },
    NotBoolean { index: usize, ty: Option<Type> },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MalformedReason::IndexOutOfRange { index, num_args } => write!(
                f,
                "condition argument {index} is out of range for {num_args} argument(s)"
            ),
            MalformedReason::NotBoolean { index, ty } => write!(
                f,
                "condition argument {index} has type {} instead of bool",
                ty.map(|ty| ty.as_string())
                    .unwrap_or_else(|| "untyped".to_owned())
            ),
        }
    }
}

/// Locate the condition of `variant` in the actual `args` of a call.
pub fn locate_condition(
    context: &Context,
    variant: &CallVariant,
    args: &[Value],
) -> LocatedCondition {
    let Some(index) = variant.condition_arg_index else {
        return LocatedCondition::NoCondition;
    };
    let Some(arg) = args.get(index) else {
        return LocatedCondition::Malformed(MalformedReason::IndexOutOfRange {
            index,
            num_args: args.len(),
        });
    };
    if !arg.is_bool_ty(context) {
        return LocatedCondition::Malformed(MalformedReason::NotBoolean {
            index,
            ty: arg.get_type(context),
        });
    }
    LocatedCondition::Condition(*arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CheckKind;
    use assertflow_ir::Constant;

    #[test]
    fn conditions_are_found_by_index() {
        let mut context = Context::default();
        let file = Constant::get_string(&mut context, b"a.cc".to_vec());
        let line = Constant::get_uint(&mut context, 3);
        let errno = Constant::get_uint(&mut context, 0);
        let cond = Constant::get_bool(&mut context, true);

        assert_eq!(
            locate_condition(&context, &CheckKind::Check.variant(), &[file, line, cond]),
            LocatedCondition::Condition(cond)
        );
        assert_eq!(
            locate_condition(
                &context,
                &CheckKind::DPCheck.variant(),
                &[file, line, errno, cond]
            ),
            LocatedCondition::Condition(cond)
        );
        assert_eq!(
            locate_condition(&context, &CheckKind::PCheckNoCond.variant(), &[file, line]),
            LocatedCondition::NoCondition
        );
    }

    #[test]
    fn misshapen_calls_are_malformed() {
        let mut context = Context::default();
        let file = Constant::get_string(&mut context, b"a.cc".to_vec());
        let line = Constant::get_uint(&mut context, 3);
        let stringified = Constant::get_string(&mut context, b"foo".to_vec());

        let located = locate_condition(
            &context,
            &CheckKind::Check.variant(),
            &[file, line, stringified],
        );
        assert_eq!(
            located,
            LocatedCondition::Malformed(MalformedReason::NotBoolean {
                index: 2,
                ty: Some(Type::StringSlice)
            })
        );
        let LocatedCondition::Malformed(reason) = located else {
            unreachable!()
        };
        assert_eq!(
            reason.to_string(),
            "condition argument 2 has type str instead of bool"
        );

        assert_eq!(
            locate_condition(&context, &CheckKind::DCheck.variant(), &[file, line]),
            LocatedCondition::Malformed(MalformedReason::IndexOutOfRange {
                index: 2,
                num_args: 2
            })
        );
    }
}
