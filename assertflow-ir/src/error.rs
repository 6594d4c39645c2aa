/// These errors are for internal IR failures and engine failures, not designed to be useful to
/// the author of the analysed procedures, but more for users of the `assertflow-ir` crate.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    DuplicateFunction(String, usize),
    MisplacedTerminator(String),
    MissingBlock(String),
    MissingTerminator(String),
    ParseFailure(String, String),
    ValueNotFound(String),

    VerifyBinaryOpIncorrectArgType,
    VerifyBlockArgMalformed(String),
    VerifyBranchParamsMismatch(String),
    VerifyBranchToMissingBlock(String),
    VerifyCallArgCountMismatch(String, usize, usize),
    VerifyCallArgTypeMismatch(String, String, String),
    VerifyCallToMissingFunction(String),
    VerifyCmpBadTypes(String, String),
    VerifyCmpTypeMismatch(String, String),
    VerifyCmpUnknownTypes,
    VerifyConditionExprNotABool,
    VerifyDeclarationHasBody(String),
    VerifyDuplicateAnnotation(String, String),
    VerifyEntryBlockHasPredecessors(String, Vec<String>),
    VerifyReturnMismatchedTypes(String),
    VerifyUnaryOpIncorrectArgType,

    AnalysisOfDeclaration(String),
    AnalysisMaxBlockVisits(String, String, usize),
}

impl std::error::Error for IrError {}

use std::fmt;

use itertools::Itertools;

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            IrError::DuplicateFunction(fn_str, arity) => write!(
                f,
                "Function {fn_str} with {arity} argument(s) is defined more than once."
            ),
            IrError::MisplacedTerminator(blk_str) => {
                write!(f, "Block {blk_str} has a misplaced terminator.")
            }
            IrError::MissingBlock(blk_str) => write!(f, "Unable to find block {blk_str}."),
            IrError::MissingTerminator(blk_str) => {
                write!(f, "Block {blk_str} is missing its terminator.")
            }
            IrError::ParseFailure(expecting, found) => {
                write!(
                    f,
                    "Parse failure: expecting '{expecting}', found '{found}'."
                )
            }
            IrError::ValueNotFound(reason) => {
                write!(f, "Invalid value: {reason}.")
            }
            IrError::VerifyBinaryOpIncorrectArgType => {
                write!(
                    f,
                    "Verification failed: Incorrect argument type(s) for binary op."
                )
            }
            IrError::VerifyBlockArgMalformed(blk_str) => {
                write!(
                    f,
                    "Verification failed: Block argument of {blk_str} is malformed."
                )
            }
            IrError::VerifyBranchParamsMismatch(label) => {
                write!(
                    f,
                    "Verification failed: Branch to block '{label}' passes arguments which \
                    don't match its parameters."
                )
            }
            IrError::VerifyBranchToMissingBlock(label) => {
                write!(
                    f,
                    "Verification failed: \
                    Branch to block '{label}' is not a block in the current function."
                )
            }
            IrError::VerifyCallArgCountMismatch(callee, expected, found) => {
                write!(
                    f,
                    "Verification failed: Call to '{callee}' expects {expected} argument(s), \
                    found {found}."
                )
            }
            IrError::VerifyCallArgTypeMismatch(callee, caller_ty, callee_ty) => {
                write!(
                    f,
                    "Verification failed: Type mismatch found for call to '{callee}': \
                    {caller_ty} is not a {callee_ty}."
                )
            }
            IrError::VerifyCallToMissingFunction(callee) => {
                write!(
                    f,
                    "Verification failed: Call to invalid function '{callee}'."
                )
            }
            IrError::VerifyCmpBadTypes(lhs_ty, rhs_ty) => {
                write!(
                    f,
                    "Verification failed: Cannot order values of types {lhs_ty} and {rhs_ty}."
                )
            }
            IrError::VerifyCmpTypeMismatch(lhs_ty, rhs_ty) => {
                write!(
                    f,
                    "Verification failed: Cannot compare values of different types {lhs_ty} \
                    and {rhs_ty}."
                )
            }
            IrError::VerifyCmpUnknownTypes => {
                write!(
                    f,
                    "Verification failed: Unable to determine type(s) of compared value(s)."
                )
            }
            IrError::VerifyConditionExprNotABool => {
                write!(
                    f,
                    "Verification failed: Expression used for conditional is not a boolean."
                )
            }
            IrError::VerifyDeclarationHasBody(fn_str) => {
                write!(
                    f,
                    "Verification failed: Declaration of {fn_str} must not have instructions."
                )
            }
            IrError::VerifyDuplicateAnnotation(fn_str, name) => {
                write!(
                    f,
                    "Verification failed: Function {fn_str} annotates '{name}' more than once."
                )
            }
            IrError::VerifyEntryBlockHasPredecessors(function_name, predecessors) => {
                let plural_s = if predecessors.len() == 1 { "" } else { "s" };
                write!(
                    f,
                    "Verification failed: Entry block of the function \"{function_name}\" has {}predecessor{}. \
                     The predecessor{} {} {}.",
                    if predecessors.len() == 1 {
                        "a "
                    } else {
                        ""
                    },
                    plural_s,
                    plural_s,
                    if predecessors.len() == 1 {
                        "is"
                    } else {
                        "are"
                    },
                    predecessors.iter().map(|block_label| format!("\"{block_label}\"")).collect_vec().join(", ")
                )
            }
            IrError::VerifyReturnMismatchedTypes(fn_str) => write!(
                f,
                "Verification failed: \
                Function {fn_str} return type must match its RET instructions."
            ),
            IrError::VerifyUnaryOpIncorrectArgType => {
                write!(
                    f,
                    "Verification failed: Incorrect argument type for unary op."
                )
            }
            IrError::AnalysisOfDeclaration(fn_str) => {
                write!(
                    f,
                    "Analysis failed: Function {fn_str} is a declaration and has no body."
                )
            }
            IrError::AnalysisMaxBlockVisits(fn_str, blk_str, limit) => {
                write!(
                    f,
                    "Analysis failed: Block {blk_str} of function {fn_str} was visited more than \
                    {limit} times without the analysis converging."
                )
            }
        }
    }
}
