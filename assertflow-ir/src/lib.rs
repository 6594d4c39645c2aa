//! assertflow-ir: a small CFG intermediate representation and the forward dataflow engine which
//! flow-fact models plug into.
//!
//! For now it's easiest to just export absolutely everything, we can refine the public API when
//! the models settle.

pub mod analysis;
pub use analysis::*;
pub mod block;
pub use block::*;
pub mod constant;
pub use constant::*;
pub mod context;
pub use context::*;
pub mod error;
pub use error::*;
pub mod function;
pub use function::*;
pub mod instruction;
pub use instruction::*;
pub mod irtype;
pub use irtype::*;
pub mod module;
pub use module::*;
pub mod parser;
pub use parser::*;
pub mod printer;
pub use printer::*;
pub mod value;
pub use value::*;
pub mod verify;
